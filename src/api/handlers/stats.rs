// Copyright (c) Sabq Platform Team
// SPDX-License-Identifier: Apache-2.0

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use tracing::error;

use crate::api::AppState;
use crate::config::Config;
use crate::tracking::ledger;

/// Aggregate statistics for a user: per-type interaction counts, total
/// points, level and a bounded slice of recent history.
pub async fn get_user_stats(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> impl IntoResponse {
    let mut conn = match state.db.get_connection().await {
        Ok(conn) => conn,
        Err(e) => {
            error!("Database connection error: {}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({
                    "error": format!("Database error: {}", e)
                })),
            );
        }
    };

    let history_limit = Config::get().tracking.recent_history_limit;
    match ledger::user_stats(&mut conn, &user_id, history_limit).await {
        Ok(Some(stats)) => match serde_json::to_value(stats) {
            Ok(body) => (StatusCode::OK, Json(body)),
            Err(e) => {
                error!("Failed to serialize user stats: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(serde_json::json!({
                        "error": "Internal error"
                    })),
                )
            }
        },
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({
                "error": "User not found"
            })),
        ),
        Err(e) => {
            error!(%user_id, "Failed to fetch user stats: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({
                    "error": "Failed to fetch user stats"
                })),
            )
        }
    }
}
