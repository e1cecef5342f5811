use actix_web::{web, HttpRequest, HttpResponse};
use actix_web_actors::ws;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::auth::verify_jwt;
use crate::error::{AppError, AppResult};
use crate::state::AppState;
use crate::websocket::session::WsSession;

#[derive(Debug, Deserialize)]
pub struct WsParams {
    pub token: Option<String>,
}

fn ws_token(params: &WsParams, req: &HttpRequest) -> Option<String> {
    params.token.clone().or_else(|| {
        req.headers()
            .get(actix_web::http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.strip_prefix("Bearer "))
            .map(|s| s.to_string())
    })
}

/// Upgrade to the push channel.
///
/// GET /ws?token=...
pub async fn ws_handler(
    req: HttpRequest,
    stream: web::Payload,
    state: web::Data<AppState>,
    query: web::Query<WsParams>,
) -> Result<HttpResponse, actix_web::Error> {
    let token = ws_token(&query, &req).ok_or(AppError::Unauthorized)?;
    let claims = verify_jwt(&token, &state.config.auth.jwt_secret)?;

    let session = WsSession::new(claims.sub, state.get_ref().clone());
    ws::start(session, &req, stream)
}

/// Live-connection status for a user.
///
/// GET /api/v1/ws/status/{user_id}
pub async fn ws_status(
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
) -> AppResult<HttpResponse> {
    let user_id = path.into_inner();
    let connection_count = state.registry.connection_count(user_id).await;

    Ok(HttpResponse::Ok().json(json!({
        "userId": user_id.to_string(),
        "connected": connection_count > 0,
        "connectionCount": connection_count,
    })))
}

pub fn register_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/ws", web::get().to(ws_handler)).service(
        web::scope("/api/v1/ws").route("/status/{user_id}", web::get().to(ws_status)),
    );
}
