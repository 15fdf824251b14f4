//! Offline ladder draws for the command line.
use anyhow::{Result, ensure};
use colored::Colorize;
use serde_json::json;

use sadari_game::ladder::MAX_LANES;
use sadari_game::{DrawParams, LadderConfig, Move, PathStep, assignments};

pub fn split_csv(s: &str) -> Vec<String> {
    s.split(',')
        .map(|x| x.trim().to_string())
        .filter(|x| !x.is_empty())
        .collect()
}

/// Labels for exactly `lanes` lanes; missing or blank slots get `{prefix}{n}`.
fn fill_labels(mut labels: Vec<String>, lanes: usize, prefix: &str) -> Vec<String> {
    labels.resize(lanes, String::new());
    labels
        .into_iter()
        .enumerate()
        .map(|(i, label)| {
            if label.trim().is_empty() {
                format!("{prefix}{}", i + 1)
            } else {
                label
            }
        })
        .collect()
}

/// Draw a ladder. The lane count follows the longer label list when labels
/// are given, otherwise `lanes`; every bound is clamped to playable values.
///
/// # Errors
///
/// Returns an error when more labels are given than a ladder has lanes.
pub fn draw(
    names: Vec<String>,
    results: Vec<String>,
    lanes: usize,
    rows: u32,
    density: f64,
    seed: Option<i64>,
    created_at: i64,
) -> Result<LadderConfig> {
    let labelled = names.len().max(results.len());
    ensure!(
        labelled <= MAX_LANES,
        "a ladder has at most {MAX_LANES} lanes, got {} names and {} results",
        names.len(),
        results.len()
    );
    let wanted = if labelled == 0 { lanes } else { labelled };
    let params = DrawParams::new(wanted, rows, density);
    let names = fill_labels(names, params.lanes, "P");
    let results = fill_labels(results, params.lanes, "R");
    Ok(LadderConfig::draw(names, results, params, seed, created_at))
}

/// Zero-based lane for a one-based `--reveal` argument.
///
/// # Errors
///
/// Returns an error when the lane is not on the ladder.
pub fn reveal_lane(config: &LadderConfig, lane: usize) -> Result<usize> {
    let cols = config.cols();
    ensure!(
        (1..=cols).contains(&lane),
        "cannot reveal lane {lane}: the ladder has lanes 1 to {cols}"
    );
    Ok(lane - 1)
}

/// Config, mapping, and pairings as pretty JSON, plus the traced path of
/// `reveal` when one lane is singled out.
///
/// # Errors
///
/// Returns an error if serialization fails.
pub fn render_json(
    config: &LadderConfig,
    reveal: Option<usize>,
) -> Result<String, serde_json::Error> {
    let mapping = config.mapping();
    let pairs = assignments(&config.names, &config.results, &mapping);
    let mut body = json!({
        "config": config,
        "mapping": mapping.as_slice(),
        "assignments": pairs,
    });
    if let Some(start) = reveal {
        body["reveal"] = json!({
            "lane": start,
            "path": config.ladder().path(start),
        });
    }
    serde_json::to_string_pretty(&body)
}

/// One ladder row; posts and the rung on the revealed path are drawn with `#` and `=`.
fn render_row(gaps: &[bool], step: Option<&PathStep>) -> String {
    let on_path = |lane: usize| step.is_some_and(|step| step.from == lane || step.to == lane);
    let crossed = |gap: usize| {
        step.is_some_and(|step| step.movement != Move::Down && step.from.min(step.to) == gap)
    };
    let post = |lane: usize| {
        if on_path(lane) {
            "#".bright_yellow().bold().to_string()
        } else {
            "|".to_string()
        }
    };

    let mut line = post(0);
    for (gap, &has_rung) in gaps.iter().enumerate() {
        let span = match (has_rung, crossed(gap)) {
            (true, true) => "===".bright_yellow().bold().to_string(),
            (true, false) => "---".to_string(),
            (false, _) => "   ".to_string(),
        };
        line.push_str(&span);
        line.push_str(&post(gap + 1));
    }
    line
}

/// ASCII ladder followed by the pairings; `reveal` highlights one lane's path.
pub fn render_console(config: &LadderConfig, reveal: Option<usize>) -> String {
    let ladder = config.ladder();
    let cols = config.cols();
    let mut rungs_by_row = vec![vec![false; cols.saturating_sub(1)]; config.rows as usize];
    for rung in &config.rungs {
        if let Some(slot) = rungs_by_row
            .get_mut(rung.row as usize)
            .and_then(|row| row.get_mut(rung.col as usize))
        {
            *slot = true;
        }
    }

    let path = reveal.map(|start| ladder.path(start)).unwrap_or_default();
    let mut out = String::new();
    for (row, gaps) in rungs_by_row.iter().enumerate() {
        out.push_str(&render_row(gaps, path.get(row)));
        out.push('\n');
    }
    out.push('\n');
    let mapping = ladder.mapping();
    for pair in assignments(&config.names, &config.results, &mapping) {
        out.push_str(&format!(
            "{} {} {}\n",
            pair.from_name.bright_cyan().bold(),
            "->".dimmed(),
            pair.to_name.bright_green()
        ));
    }
    let revealed = reveal
        .zip(path.last())
        .and_then(|(start, last)| config.names.get(start).zip(config.results.get(last.to)));
    if let Some((name, result)) = revealed {
        out.push_str(&format!(
            "{} {name} {} {result}\n",
            "reveal".yellow(),
            "->".dimmed()
        ));
    }
    if let Some(seed) = config.seed {
        out.push_str(&format!("{} {seed}\n", "seed".yellow()));
    }
    out
}
