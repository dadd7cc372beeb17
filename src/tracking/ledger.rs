// Copyright (c) Sabq Platform Team
// SPDX-License-Identifier: Apache-2.0

//! Ledger reads: running totals, derived levels and the aggregate user
//! statistics view. Totals are always recomputed from the ledger; callers
//! needing caching must invalidate on their own writes.

use diesel::dsl::sum;
use diesel::prelude::*;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use serde::Serialize;
use std::collections::HashMap;

use crate::models::{Interaction, LoyaltyPointEntry, User};
use crate::policy::{self, Level};
use crate::schema::{interactions, loyalty_point_entries, users};
use crate::tracking::TrackingError;

/// Sum of all ledger entries for a user. An empty ledger sums to zero.
pub async fn total_points(
    conn: &mut AsyncPgConnection,
    user_id: &str,
) -> Result<i64, TrackingError> {
    let total: Option<i64> = loyalty_point_entries::table
        .filter(loyalty_point_entries::user_id.eq(user_id))
        .select(sum(loyalty_point_entries::points))
        .get_result(conn)
        .await?;
    Ok(total.unwrap_or(0))
}

/// Derived level for a user, a pure function of their ledger sum.
pub async fn level(conn: &mut AsyncPgConnection, user_id: &str) -> Result<Level, TrackingError> {
    Ok(policy::level_for(total_points(conn, user_id).await?))
}

/// Loyalty level as presented to clients.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LevelInfo {
    pub name: &'static str,
    pub label_ar: &'static str,
    pub min_points: i64,
}

impl From<Level> for LevelInfo {
    fn from(level: Level) -> Self {
        LevelInfo {
            name: level.name(),
            label_ar: level.label_ar(),
            min_points: level.min_points(),
        }
    }
}

/// Aggregate statistics for one user, bounded history for UI display.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserStats {
    pub user_id: String,
    pub username: String,
    pub total_points: i64,
    pub level: LevelInfo,
    pub joined_at: chrono::NaiveDateTime,
    pub last_active_at: chrono::NaiveDateTime,
    pub interaction_counts: HashMap<String, i64>,
    pub recent_interactions: Vec<Interaction>,
    pub recent_points: Vec<LoyaltyPointEntry>,
}

/// Build the stats view for a user. Returns `None` when the user does not
/// exist.
pub async fn user_stats(
    conn: &mut AsyncPgConnection,
    user_id: &str,
    history_limit: i64,
) -> Result<Option<UserStats>, TrackingError> {
    let user: Option<User> = users::table
        .find(user_id)
        .first::<User>(conn)
        .await
        .optional()?;
    let Some(user) = user else {
        return Ok(None);
    };

    let counts: Vec<(String, i64)> = interactions::table
        .filter(interactions::user_id.eq(user_id))
        .group_by(interactions::interaction_type)
        .select((interactions::interaction_type, diesel::dsl::count_star()))
        .load(conn)
        .await?;

    let recent_interactions = interactions::table
        .filter(interactions::user_id.eq(user_id))
        .order_by(interactions::created_at.desc())
        .limit(history_limit)
        .load::<Interaction>(conn)
        .await?;

    let recent_points = loyalty_point_entries::table
        .filter(loyalty_point_entries::user_id.eq(user_id))
        .order_by(loyalty_point_entries::created_at.desc())
        .limit(history_limit)
        .load::<LoyaltyPointEntry>(conn)
        .await?;

    let total = total_points(conn, user_id).await?;

    Ok(Some(UserStats {
        user_id: user.id,
        username: user.username,
        total_points: total,
        level: policy::level_for(total).into(),
        joined_at: user.created_at,
        last_active_at: user.last_active_at,
        interaction_counts: counts.into_iter().collect(),
        recent_interactions,
        recent_points,
    }))
}
