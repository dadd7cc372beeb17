// Copyright (c) Sabq Platform Team
// SPDX-License-Identifier: Apache-2.0

use axum::{
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use tracing::{debug, error};

use crate::api::routes::resolve_user_id;
use crate::api::AppState;
use crate::models::{InteractionMetadata, InteractionType};
use crate::tracking::recorder::flag_field;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordRequest {
    /// Optional explicit user id for trusted service-to-service calls; the
    /// request headers win when both are present.
    pub user_id: Option<String>,
    pub article_id: String,
    pub interaction_type: InteractionType,
    pub metadata: Option<InteractionMetadata>,
}

/// Record an interaction and grant loyalty points.
pub async fn record_interaction(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<RecordRequest>,
) -> impl IntoResponse {
    let Some(user_id) = resolve_user_id(&headers).or(request.user_id) else {
        return (
            StatusCode::UNAUTHORIZED,
            Json(serde_json::json!({
                "success": false,
                "error": "Authentication required"
            })),
        );
    };

    debug!(
        %user_id,
        article_id = %request.article_id,
        kind = request.interaction_type.as_str(),
        "Recording interaction"
    );

    let outcome = state
        .recorder
        .record(
            &user_id,
            &request.article_id,
            request.interaction_type,
            request.metadata,
        )
        .await;

    let status = if outcome.not_found {
        StatusCode::NOT_FOUND
    } else {
        StatusCode::OK
    };
    match serde_json::to_value(&outcome) {
        Ok(body) => (status, Json(body)),
        Err(e) => {
            error!("Failed to serialize record outcome: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({
                    "success": false,
                    "error": "Internal error"
                })),
            )
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToggleRequest {
    pub article_id: String,
    #[serde(rename = "type")]
    pub kind: InteractionType,
    /// Always "toggle" in the current client contract; kept for forward
    /// compatibility.
    #[allow(dead_code)]
    pub action: Option<String>,
}

/// Toggle a like/save/share for the authenticated user. The response carries
/// the authoritative flag under the kind's field name (`liked`, `saved` or
/// `shared`).
pub async fn toggle_interaction(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<ToggleRequest>,
) -> impl IntoResponse {
    let Some(user_id) = resolve_user_id(&headers) else {
        return (
            StatusCode::UNAUTHORIZED,
            Json(serde_json::json!({
                "success": false,
                "error": "Authentication required"
            })),
        );
    };

    let outcome = state
        .recorder
        .toggle(&user_id, &request.article_id, request.kind)
        .await;

    let status = if outcome.not_found {
        StatusCode::NOT_FOUND
    } else {
        StatusCode::OK
    };

    let mut body = serde_json::Map::new();
    body.insert("success".into(), serde_json::json!(outcome.success));
    if let Some(field) = flag_field(outcome.kind) {
        body.insert(field.into(), serde_json::json!(outcome.state));
    }
    if let Some(action) = outcome.action {
        body.insert("action".into(), serde_json::json!(action));
    }
    body.insert("message".into(), serde_json::json!(outcome.message));

    (status, Json(serde_json::Value::Object(body)))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserFlagsQuery {
    /// Comma-separated article ids.
    pub article_ids: String,
}

/// Bulk-fetch the caller's interaction flags for a set of articles.
pub async fn get_user_flags(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<UserFlagsQuery>,
) -> impl IntoResponse {
    let Some(user_id) = resolve_user_id(&headers) else {
        return (
            StatusCode::UNAUTHORIZED,
            Json(serde_json::json!({
                "error": "Authentication required"
            })),
        );
    };

    let article_ids: Vec<String> = query
        .article_ids
        .split(',')
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .collect();

    match state.recorder.user_flags(&user_id, &article_ids).await {
        Ok(flags) => match serde_json::to_value(flags) {
            Ok(body) => (StatusCode::OK, Json(body)),
            Err(e) => {
                error!("Failed to serialize user flags: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(serde_json::json!({ "error": "Internal error" })),
                )
            }
        },
        Err(e) => {
            error!(%user_id, "Failed to fetch user flags: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({
                    "error": "Failed to fetch interaction flags"
                })),
            )
        }
    }
}
