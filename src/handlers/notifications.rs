use actix_web::{web, HttpResponse};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::auth::AuthenticatedUser;
use crate::error::AppResult;
use crate::models::NotificationKind;
use crate::state::AppState;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedQuery {
    #[serde(default)]
    pub page: Option<usize>,
    #[serde(default)]
    pub limit: Option<usize>,
}

/// Producer endpoint used by the other marketplace subsystems (orders,
/// listings) to raise a notification for a user.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateNotificationPayload {
    pub user_id: Uuid,
    pub kind: NotificationKind,
    pub message: String,
    #[serde(default)]
    pub related_entity: Option<Uuid>,
}

/// Paged notification feed for the caller.
///
/// GET /api/v1/notifications
pub async fn feed(
    user: AuthenticatedUser,
    state: web::Data<AppState>,
    query: web::Query<FeedQuery>,
) -> AppResult<HttpResponse> {
    let page = query.page.unwrap_or(1);
    let limit = query
        .limit
        .unwrap_or(state.config.realtime.default_page_limit)
        .min(state.config.realtime.max_page_limit);

    let result = state.notifications.page(user.id, page, limit).await;
    Ok(HttpResponse::Ok().json(result))
}

/// Create a notification and push it to the recipient's connections.
///
/// POST /api/v1/notifications
///
/// Producer surface: callers are the other marketplace services behind
/// the gateway and may target any `user_id`. The remaining routes in
/// this scope only ever act on the caller's own feed.
pub async fn create(
    _caller: AuthenticatedUser,
    state: web::Data<AppState>,
    payload: web::Json<CreateNotificationPayload>,
) -> AppResult<HttpResponse> {
    let notification = state
        .notifications
        .push(
            payload.user_id,
            payload.kind,
            &payload.message,
            payload.related_entity,
        )
        .await?;

    state.fanout.notification_created(&notification).await;

    Ok(HttpResponse::Ok().json(notification))
}

/// Mark one notification read.
///
/// POST /api/v1/notifications/{id}/mark-read
pub async fn mark_one(
    user: AuthenticatedUser,
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
) -> AppResult<HttpResponse> {
    let notification_id = path.into_inner();
    let outcome = state.notifications.mark_one(user.id, notification_id).await?;

    if outcome.newly_read > 0 {
        state
            .fanout
            .notification_read(user.id, notification_id, outcome.unread_count)
            .await;
    }

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "unreadCount": outcome.unread_count,
    })))
}

/// Mark the whole feed read.
///
/// POST /api/v1/notifications/mark-all-read
pub async fn mark_all(
    user: AuthenticatedUser,
    state: web::Data<AppState>,
) -> AppResult<HttpResponse> {
    let outcome = state.notifications.mark_all(user.id).await;

    if outcome.newly_read > 0 {
        state.fanout.all_notifications_read(user.id).await;
    }

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "updatedCount": outcome.newly_read,
        "unreadCount": 0,
    })))
}

pub fn register_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/v1/notifications")
            .route("", web::get().to(feed))
            .route("", web::post().to(create))
            .route("/mark-all-read", web::post().to(mark_all))
            .route("/{id}/mark-read", web::post().to(mark_one)),
    );
}
