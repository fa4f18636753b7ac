//! Route handlers.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;

use super::error::{bad_request, internal, ApiError};
use super::types::{
    CredentialsRequest, LoginResponse, MessageResponse, SendNotificationRequest,
    SendNotificationResponse, StudentEntry, SubscribeRequest, UnsubscribeRequest,
    VapidPublicKeyResponse,
};
use super::AppState;
use crate::notifications::NotificationRequest;
use crate::short_id;

type ApiResult<T> = Result<T, ApiError>;

/// Identity from a request body, trimmed; `None` if absent or blank.
fn required_identity(identity: Option<String>) -> Option<String> {
    identity
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty())
}

/// `GET /vapidPublicKey`.
pub async fn vapid_public_key(State(state): State<AppState>) -> Json<VapidPublicKeyResponse> {
    Json(VapidPublicKeyResponse {
        public_key: state.vapid.public_key_base64url().to_string(),
    })
}

/// `GET /students`: registered identities, never credentials.
pub async fn list_students(State(state): State<AppState>) -> ApiResult<Json<Vec<StudentEntry>>> {
    let identities = state
        .identities
        .list()
        .await
        .map_err(|e| internal("Error fetching students", &e))?;
    Ok(Json(
        identities
            .into_iter()
            .map(|identity| StudentEntry { identity })
            .collect(),
    ))
}

/// `POST /register`: 201 on success, 409 if the identity exists.
pub async fn register(
    State(state): State<AppState>,
    payload: Result<Json<CredentialsRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<MessageResponse>)> {
    let Json(request) = payload?;
    let identity = request.identity.unwrap_or_default();
    let credential = request.credential.unwrap_or_default();

    state.identities.register(identity.trim(), &credential).await?;
    Ok((
        StatusCode::CREATED,
        Json(MessageResponse::new("Student registered successfully")),
    ))
}

/// `POST /login`: token on success, 401 on any mismatch.
pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<CredentialsRequest>, JsonRejection>,
) -> ApiResult<Json<LoginResponse>> {
    let Json(request) = payload?;
    let identity = request.identity.unwrap_or_default();
    let credential = request.credential.unwrap_or_default();

    let token = state.identities.verify(identity.trim(), &credential).await?;
    Ok(Json(LoginResponse {
        message: "Login successful".to_string(),
        token,
    }))
}

/// `POST /subscribe`: create or replace the identity's record.
pub async fn subscribe(
    State(state): State<AppState>,
    payload: Result<Json<SubscribeRequest>, JsonRejection>,
) -> ApiResult<Json<MessageResponse>> {
    let Json(request) = payload?;
    let (Some(identity), Some(subscription)) =
        (required_identity(request.identity), request.subscription)
    else {
        return Err(bad_request("Missing identity or subscription"));
    };
    subscription.validate().map_err(bad_request)?;

    log::info!(
        "[Server] Subscription for {} at {}",
        short_id(&identity),
        short_id(subscription.endpoint.trim_start_matches("https://"))
    );
    state.store.upsert(&identity, subscription).await?;
    Ok(Json(MessageResponse::new("Subscription successful")))
}

/// `POST /unsubscribe`: idempotent removal.
pub async fn unsubscribe(
    State(state): State<AppState>,
    payload: Result<Json<UnsubscribeRequest>, JsonRejection>,
) -> ApiResult<Json<MessageResponse>> {
    let Json(request) = payload?;
    let Some(identity) = required_identity(request.identity) else {
        return Err(bad_request("Missing identity"));
    };

    state
        .store
        .delete(&identity)
        .await
        .map_err(|e| internal("Error removing subscription", &e))?;
    log::info!("[Server] Unsubscribed {}", short_id(&identity));
    Ok(Json(MessageResponse::new("Unsubscribed")))
}

/// `POST /sendNotification`: dispatch and report the counts.
pub async fn send_notification(
    State(state): State<AppState>,
    payload: Result<Json<SendNotificationRequest>, JsonRejection>,
) -> ApiResult<Json<SendNotificationResponse>> {
    let Json(request) = payload?;
    let mut notification = NotificationRequest::new(
        request.identities.unwrap_or_default(),
        request.title.unwrap_or_default(),
        request.body.unwrap_or_default(),
    );
    if let Some(url) = request.url.filter(|u| !u.trim().is_empty()) {
        notification = notification.with_url(url);
    }

    let outcome = state.dispatcher.dispatch(&notification).await?;
    Ok(Json(SendNotificationResponse {
        message: format!(
            "Notifications sent: {}, Failed notifications: {}",
            outcome.succeeded, outcome.failed
        ),
        succeeded: outcome.succeeded,
        failed: outcome.failed,
        pruned: outcome.pruned,
    }))
}
