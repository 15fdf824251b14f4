//! Ladder configuration and the codec that admits untrusted payloads.
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use thiserror::Error;

use crate::ladder::{
    DEFAULT_DENSITY, DEFAULT_ROWS, DrawParams, Ladder, Mapping, Rung, check_rungs, generate_ladder,
};
use crate::numbers::{number_label, number_to_i64, number_to_u32};

/// Widest ladder the codec admits.
pub const MAX_STORED_LANES: usize = 64;
/// Tallest ladder the codec admits.
pub const MAX_STORED_ROWS: u32 = 256;

/// A complete, shareable ladder draw. Never mutated once persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LadderConfig {
    /// Top labels, one per lane.
    pub names: Vec<String>,
    /// Bottom labels, one per lane.
    pub results: Vec<String>,
    pub rows: u32,
    pub density: f64,
    pub rungs: Vec<Rung>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<i64>,
    /// Epoch milliseconds.
    pub created_at: i64,
}

/// One rejected field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldIssue {
    pub field: String,
    pub problem: String,
}

impl FieldIssue {
    pub fn new(field: impl Into<String>, problem: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            problem: problem.into(),
        }
    }
}

impl fmt::Display for FieldIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.problem)
    }
}

/// Every reason a payload was refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid payload ({})", format_issues(.issues))]
pub struct ValidationError {
    pub issues: Vec<FieldIssue>,
}

fn format_issues(issues: &[FieldIssue]) -> String {
    issues
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl ValidationError {
    /// Refusal with a single failing field.
    pub fn single(field: impl Into<String>, problem: impl Into<String>) -> Self {
        Self {
            issues: vec![FieldIssue::new(field, problem)],
        }
    }

    /// Names of the failing fields, in report order.
    #[must_use]
    pub fn fields(&self) -> Vec<&str> {
        self.issues.iter().map(|issue| issue.field.as_str()).collect()
    }
}

/// Coerce any JSON value to the label a browser would show for it.
fn label_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Number(number) => number_label(number),
        Value::Bool(flag) => flag.to_string(),
        Value::Null => "null".to_string(),
        composite => composite.to_string(),
    }
}

/// Absent and `null` both mean "use the default".
fn present<'a>(object: &'a Map<String, Value>, field: &str) -> Option<&'a Value> {
    object.get(field).filter(|value| !value.is_null())
}

fn decode_labels(
    object: &Map<String, Value>,
    field: &str,
    issues: &mut Vec<FieldIssue>,
) -> Vec<String> {
    match present(object, field) {
        None => Vec::new(),
        Some(Value::Array(items)) => items.iter().map(label_text).collect(),
        Some(_) => {
            issues.push(FieldIssue::new(field, "expected an array"));
            Vec::new()
        }
    }
}

fn decode_rows(object: &Map<String, Value>, issues: &mut Vec<FieldIssue>) -> u32 {
    match present(object, "rows") {
        None => DEFAULT_ROWS,
        Some(Value::Number(number)) => match number_to_u32(number) {
            Some(0) => {
                issues.push(FieldIssue::new("rows", "must be at least 1"));
                0
            }
            Some(rows) if rows > MAX_STORED_ROWS => {
                issues.push(FieldIssue::new(
                    "rows",
                    format!("must be at most {MAX_STORED_ROWS}"),
                ));
                rows
            }
            Some(rows) => rows,
            None => {
                issues.push(FieldIssue::new("rows", "expected a non-negative integer"));
                0
            }
        },
        Some(_) => {
            issues.push(FieldIssue::new("rows", "expected a number"));
            0
        }
    }
}

fn decode_density(object: &Map<String, Value>, issues: &mut Vec<FieldIssue>) -> f64 {
    match present(object, "density") {
        None => DEFAULT_DENSITY,
        Some(Value::Number(number)) => match number.as_f64() {
            Some(density) if (0.0..=1.0).contains(&density) => density,
            _ => {
                issues.push(FieldIssue::new("density", "must lie within [0, 1]"));
                0.0
            }
        },
        Some(_) => {
            issues.push(FieldIssue::new("density", "expected a number"));
            0.0
        }
    }
}

fn decode_rung(index: usize, value: &Value, issues: &mut Vec<FieldIssue>) -> Option<Rung> {
    let field = format!("rungs[{index}]");
    let Value::Object(object) = value else {
        issues.push(FieldIssue::new(field, "expected an object with row and col"));
        return None;
    };
    let coord = |name: &str| match object.get(name) {
        Some(Value::Number(number)) => number_to_u32(number),
        _ => None,
    };
    match (coord("row"), coord("col")) {
        (Some(row), Some(col)) => Some(Rung::new(row, col)),
        _ => {
            issues.push(FieldIssue::new(
                field,
                "row and col must be non-negative integers",
            ));
            None
        }
    }
}

fn decode_rungs(object: &Map<String, Value>, issues: &mut Vec<FieldIssue>) -> Vec<Rung> {
    match present(object, "rungs") {
        None => Vec::new(),
        Some(Value::Array(items)) => items
            .iter()
            .enumerate()
            .filter_map(|(index, value)| decode_rung(index, value, issues))
            .collect(),
        Some(_) => {
            issues.push(FieldIssue::new("rungs", "expected an array"));
            Vec::new()
        }
    }
}

fn decode_seed(object: &Map<String, Value>, issues: &mut Vec<FieldIssue>) -> Option<i64> {
    match present(object, "seed") {
        None => None,
        Some(Value::Number(number)) => {
            let seed = number_to_i64(number);
            if seed.is_none() {
                issues.push(FieldIssue::new("seed", "expected an integer"));
            }
            seed
        }
        Some(_) => {
            issues.push(FieldIssue::new("seed", "expected a number"));
            None
        }
    }
}

impl LadderConfig {
    /// Admit an untrusted payload, filling absent fields with draw defaults.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] listing every field with the wrong shape,
    /// mismatched label counts, and any rung that breaks the ladder shape.
    pub fn from_payload(payload: &Value, created_at: i64) -> Result<Self, ValidationError> {
        let Value::Object(object) = payload else {
            return Err(ValidationError::single("payload", "expected a JSON object"));
        };
        let mut issues = Vec::new();
        let names = decode_labels(object, "names", &mut issues);
        let results = decode_labels(object, "results", &mut issues);
        let rows = decode_rows(object, &mut issues);
        let density = decode_density(object, &mut issues);
        let rungs = decode_rungs(object, &mut issues);
        let seed = decode_seed(object, &mut issues);

        if names.len() != results.len() {
            issues.push(FieldIssue::new(
                "results",
                format!("has {} labels but names has {}", results.len(), names.len()),
            ));
        }
        if names.len() > MAX_STORED_LANES {
            issues.push(FieldIssue::new(
                "names",
                format!("at most {MAX_STORED_LANES} lanes are supported"),
            ));
        }

        let config = Self {
            names,
            results,
            rows,
            density,
            rungs,
            seed,
            created_at,
        };
        if issues.is_empty() {
            issues.extend(
                check_rungs(config.cols(), config.rows, &config.rungs)
                    .into_iter()
                    .map(|violation| FieldIssue::new("rungs", violation.to_string())),
            );
        }
        if issues.is_empty() {
            Ok(config)
        } else {
            Err(ValidationError { issues })
        }
    }

    /// Draw a fresh ladder for the given labels. Lane count follows `names`.
    #[must_use]
    pub fn draw(
        names: Vec<String>,
        results: Vec<String>,
        params: DrawParams,
        seed: Option<i64>,
        created_at: i64,
    ) -> Self {
        let rungs = generate_ladder(names.len(), params.rows, params.density, seed);
        Self {
            names,
            results,
            rows: params.rows,
            density: params.density,
            rungs,
            seed,
            created_at,
        }
    }

    /// Lane count.
    #[must_use]
    pub fn cols(&self) -> usize {
        self.names.len()
    }

    #[must_use]
    pub fn ladder(&self) -> Ladder {
        Ladder::new(self.cols(), self.rows, &self.rungs)
    }

    #[must_use]
    pub fn mapping(&self) -> Mapping {
        self.ladder().mapping()
    }

    /// Canonical stored form.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Decode a stored record and re-apply the payload checks.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] when the text is not JSON or no longer
    /// satisfies the config shape.
    pub fn from_json(json: &str) -> Result<Self, ValidationError> {
        let value: Value = serde_json::from_str(json)
            .map_err(|err| ValidationError::single("payload", err.to_string()))?;
        let created_at = value
            .get("createdAt")
            .and_then(Value::as_i64)
            .ok_or_else(|| ValidationError::single("createdAt", "expected epoch milliseconds"))?;
        Self::from_payload(&value, created_at)
    }
}
