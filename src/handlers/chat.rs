use actix_web::{web, HttpResponse};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::AuthenticatedUser;
use crate::error::AppResult;
use crate::state::AppState;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessagePayload {
    pub receiver_id: Uuid,
    #[serde(default)]
    pub book_id: Option<Uuid>,
    pub content: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryQuery {
    #[serde(default)]
    pub book_id: Option<Uuid>,
    #[serde(default)]
    pub limit: Option<usize>,
    /// Smallest sequence already held by the client; absent on page one.
    #[serde(default)]
    pub before: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkReadPayload {
    pub sender_id: Uuid,
    #[serde(default)]
    pub book_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkReadResponse {
    pub updated_count: usize,
}

/// Send a chat message.
///
/// POST /api/v1/chat/send
pub async fn send_message(
    user: AuthenticatedUser,
    state: web::Data<AppState>,
    payload: web::Json<SendMessagePayload>,
) -> AppResult<HttpResponse> {
    let message = state
        .messages
        .append(user.id, payload.receiver_id, payload.book_id, &payload.content)
        .await?;

    state.fanout.message_created(&message).await;

    Ok(HttpResponse::Ok().json(message))
}

/// Page of message history with another user, newest-first.
///
/// GET /api/v1/chat/history/{other_user_id}
pub async fn history(
    user: AuthenticatedUser,
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
    query: web::Query<HistoryQuery>,
) -> AppResult<HttpResponse> {
    let other_user_id = path.into_inner();
    let limit = query
        .limit
        .unwrap_or(state.config.realtime.default_page_limit)
        .min(state.config.realtime.max_page_limit)
        .max(1);

    let page = state
        .messages
        .history(user.id, other_user_id, query.book_id, limit, query.before)
        .await;

    Ok(HttpResponse::Ok().json(page))
}

/// Mark every unread message from `sender_id` as read.
///
/// PUT /api/v1/chat/messages/mark-as-read
pub async fn mark_as_read(
    user: AuthenticatedUser,
    state: web::Data<AppState>,
    payload: web::Json<MarkReadPayload>,
) -> AppResult<HttpResponse> {
    let affected = state
        .messages
        .mark_read(user.id, payload.sender_id, payload.book_id)
        .await;

    // One summarizing fan-out per mark, and none for a no-op.
    if !affected.is_empty() {
        state
            .fanout
            .messages_read(user.id, payload.sender_id, payload.book_id)
            .await;
    }

    Ok(HttpResponse::Ok().json(MarkReadResponse {
        updated_count: affected.len(),
    }))
}

/// Conversation summaries for the caller's inbox.
///
/// GET /api/v1/chat/conversations
pub async fn conversations(
    user: AuthenticatedUser,
    state: web::Data<AppState>,
) -> AppResult<HttpResponse> {
    let summaries = state.messages.conversations(user.id).await;
    Ok(HttpResponse::Ok().json(summaries))
}

pub fn register_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/v1/chat")
            .route("/send", web::post().to(send_message))
            .route("/history/{other_user_id}", web::get().to(history))
            .route("/messages/mark-as-read", web::put().to(mark_as_read))
            .route("/conversations", web::get().to(conversations)),
    );
}
