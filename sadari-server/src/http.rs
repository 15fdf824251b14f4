//! HTTP surface over the arcade services.
use actix_web::http::StatusCode;
use actix_web::middleware::Logger;
use actix_web::{App, HttpRequest, HttpResponse, HttpServer, Responder, web};
use serde::Deserialize;
use serde_json::{Value, json};

use sadari_game::{Arcade, ServiceError, ValidationError, bearer_token};

/// Caller identity for rate limiting: first `X-Forwarded-For` hop, then the
/// socket peer, then `unknown`.
pub fn client_id(req: &HttpRequest) -> String {
    let forwarded = req
        .headers()
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|hop| !hop.is_empty());
    if let Some(hop) = forwarded {
        return hop.to_string();
    }
    req.peer_addr()
        .map_or_else(|| "unknown".to_string(), |addr| addr.ip().to_string())
}

const fn status_of(err: &ServiceError) -> StatusCode {
    match err {
        ServiceError::InvalidPayload(_) => StatusCode::BAD_REQUEST,
        ServiceError::NotFound => StatusCode::NOT_FOUND,
        ServiceError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
        ServiceError::DuplicateSubmission => StatusCode::CONFLICT,
        ServiceError::StorageUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        ServiceError::Unauthorized => StatusCode::UNAUTHORIZED,
    }
}

fn failure(err: &ServiceError) -> HttpResponse {
    let mut response = HttpResponse::build(status_of(err));
    if let Some(secs) = err.retry_after_secs() {
        response.insert_header(("Retry-After", secs.to_string()));
    }
    response.json(json!({
        "ok": false,
        "error": err.code(),
        "detail": err.to_string(),
    }))
}

async fn save_ladder(
    arcade: web::Data<Arcade>,
    req: HttpRequest,
    body: web::Bytes,
) -> impl Responder {
    let client = client_id(&req);
    match arcade.save_ladder_body(&body, &client).await {
        Ok(saved) => HttpResponse::Created().json(json!({
            "ok": true,
            "id": saved.id,
            "url": saved.url,
        })),
        Err(err) => failure(&err),
    }
}

async fn load_ladder(arcade: web::Data<Arcade>, path: web::Path<String>) -> impl Responder {
    let id = path.into_inner();
    match arcade.load_ladder(&id).await {
        Ok(config) => HttpResponse::Ok().json(json!({
            "ok": true,
            "id": id,
            "config": config,
        })),
        Err(err) => failure(&err),
    }
}

async fn submit_score(
    arcade: web::Data<Arcade>,
    req: HttpRequest,
    body: web::Bytes,
) -> impl Responder {
    let client = client_id(&req);
    match arcade.submit_score_body(&body, &client).await {
        Ok(outcome) => HttpResponse::Ok().json(json!({ "ok": true, "updated": outcome.updated })),
        Err(err) => failure(&err),
    }
}

#[derive(Debug, Deserialize)]
struct BoardQuery {
    game: Option<String>,
    limit: Option<String>,
}

/// Non-numeric limits fall back to the default; negatives clamp to one entry.
fn requested_limit(raw: Option<&str>) -> Option<usize> {
    let limit = raw?.trim().parse::<i64>().ok()?;
    Some(usize::try_from(limit).unwrap_or(0))
}

async fn leaderboard(
    arcade: web::Data<Arcade>,
    query: web::Query<BoardQuery>,
) -> impl Responder {
    let game = query.game.as_deref().unwrap_or_default();
    match arcade
        .leaderboard(game, requested_limit(query.limit.as_deref()))
        .await
    {
        Ok(entries) => HttpResponse::Ok().json(entries),
        Err(err) => failure(&err),
    }
}

/// Unreadable bodies count as "no game", which resets every board.
fn reset_target(body: &[u8]) -> Result<Option<String>, ServiceError> {
    let Ok(Value::Object(fields)) = serde_json::from_slice::<Value>(body) else {
        return Ok(None);
    };
    match fields.get("game") {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(game)) if game.is_empty() => Ok(None),
        Some(Value::String(game)) => Ok(Some(game.clone())),
        Some(_) => Err(ValidationError::single("game", "expected a string").into()),
    }
}

async fn admin_reset(
    arcade: web::Data<Arcade>,
    req: HttpRequest,
    body: web::Bytes,
) -> impl Responder {
    let bearer = req
        .headers()
        .get("authorization")
        .and_then(|value| value.to_str().ok())
        .and_then(bearer_token)
        .map(str::to_string);
    let target = match reset_target(&body) {
        Ok(target) => target,
        Err(err) => return failure(&err),
    };
    match arcade.reset(bearer.as_deref(), target.as_deref()).await {
        Ok(()) => HttpResponse::Ok().json(json!({ "ok": true })),
        Err(err) => failure(&err),
    }
}

async fn health() -> impl Responder {
    HttpResponse::Ok().body("ok")
}

/// Register every arcade route on an app.
pub fn routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(health)).service(
        web::scope("/api")
            .route("/ladder/save", web::post().to(save_ladder))
            .route("/ladder/{id}", web::get().to(load_ladder))
            .route("/submit", web::post().to(submit_score))
            .route("/leaderboard", web::get().to(leaderboard))
            .route("/admin/reset", web::post().to(admin_reset)),
    );
}

/// Serve the arcade until the process is stopped.
///
/// # Errors
///
/// Returns an error if the address cannot be bound.
pub async fn serve(arcade: Arcade, bind: &str) -> std::io::Result<()> {
    let arcade = web::Data::new(arcade);
    log::info!("listening on {bind}");
    HttpServer::new(move || {
        App::new()
            .wrap(Logger::new("%r %s %Ts"))
            .app_data(arcade.clone())
            .configure(routes)
    })
    .bind(bind)?
    .run()
    .await
}
