// Copyright (c) Sabq Platform Team
// SPDX-License-Identifier: Apache-2.0

//! Milestone bonuses evaluated on every interaction write. Both checks are
//! idempotent per period: the streak bonus is granted at most once per local
//! day and the monthly activity bonus at most once per local month.

use chrono::{DateTime, Duration, FixedOffset, Utc};
use diesel::prelude::*;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use tracing::{debug, info};

use crate::models::{InteractionType, NewLoyaltyPointEntry, PointAction};
use crate::policy;
use crate::schema::{interactions, loyalty_point_entries};
use crate::tracking::{day_start_utc, month_start_utc, TrackingError};

/// A read streak milestone is hit at every positive multiple of the
/// configured streak size.
pub fn streak_milestone_reached(reads_in_window: i64) -> bool {
    reads_in_window > 0 && reads_in_window % policy::STREAK_MILESTONE == 0
}

/// Whether the monthly activity threshold has been met.
pub fn monthly_threshold_reached(interactions_this_month: i64) -> bool {
    interactions_this_month >= policy::MONTHLY_ACTIVITY_THRESHOLD
}

/// Evaluate milestone bonuses for a user who just recorded an interaction of
/// `kind`. Runs inside the recorder's transaction; returns the bonus points
/// granted by this call (0 when no milestone fired).
pub async fn evaluate(
    conn: &mut AsyncPgConnection,
    user_id: &str,
    kind: InteractionType,
    now: DateTime<Utc>,
    tz: FixedOffset,
) -> Result<i32, TrackingError> {
    let mut granted = 0;

    granted += evaluate_streak(conn, user_id, kind, now, tz).await?;
    granted += evaluate_monthly(conn, user_id, now, tz).await?;

    Ok(granted)
}

/// Streak bonus: after a read, count the user's reads in the trailing window
/// and grant once per local day when the count sits on a milestone multiple.
/// Later milestones the same day are deliberately skipped.
async fn evaluate_streak(
    conn: &mut AsyncPgConnection,
    user_id: &str,
    kind: InteractionType,
    now: DateTime<Utc>,
    tz: FixedOffset,
) -> Result<i32, TrackingError> {
    if kind != InteractionType::Read {
        return Ok(0);
    }

    let window_start = (now - Duration::minutes(policy::STREAK_WINDOW_MINUTES)).naive_utc();
    let reads_in_window: i64 = interactions::table
        .filter(interactions::user_id.eq(user_id))
        .filter(interactions::interaction_type.eq(InteractionType::Read.as_str()))
        .filter(interactions::created_at.ge(window_start))
        .count()
        .get_result(conn)
        .await?;

    if !streak_milestone_reached(reads_in_window) {
        return Ok(0);
    }

    let day_start = day_start_utc(now, tz);
    let already_granted_today: i64 = loyalty_point_entries::table
        .filter(loyalty_point_entries::user_id.eq(user_id))
        .filter(loyalty_point_entries::action.eq(PointAction::StreakBonus.as_str()))
        .filter(loyalty_point_entries::created_at.ge(day_start))
        .count()
        .get_result(conn)
        .await?;

    if already_granted_today > 0 {
        debug!(
            user_id,
            reads_in_window, "Streak milestone reached but bonus already granted today"
        );
        return Ok(0);
    }

    let entry = NewLoyaltyPointEntry {
        user_id: user_id.to_string(),
        points: policy::STREAK_BONUS_POINTS,
        action: PointAction::StreakBonus.as_str().to_string(),
        reference_id: None,
        reference_type: None,
        metadata: Some(serde_json::json!({ "reads_in_window": reads_in_window })),
        created_at: now.naive_utc(),
    };
    diesel::insert_into(loyalty_point_entries::table)
        .values(&entry)
        .execute(conn)
        .await?;

    info!(user_id, reads_in_window, "Granted read streak bonus");
    Ok(policy::STREAK_BONUS_POINTS)
}

/// Monthly activity bonus: grant once per local calendar month when the
/// user's interaction count for the month reaches the threshold.
async fn evaluate_monthly(
    conn: &mut AsyncPgConnection,
    user_id: &str,
    now: DateTime<Utc>,
    tz: FixedOffset,
) -> Result<i32, TrackingError> {
    let month_start = month_start_utc(now, tz);
    let interactions_this_month: i64 = interactions::table
        .filter(interactions::user_id.eq(user_id))
        .filter(interactions::created_at.ge(month_start))
        .count()
        .get_result(conn)
        .await?;

    if !monthly_threshold_reached(interactions_this_month) {
        return Ok(0);
    }

    let already_granted_this_month: i64 = loyalty_point_entries::table
        .filter(loyalty_point_entries::user_id.eq(user_id))
        .filter(loyalty_point_entries::action.eq(PointAction::MonthlyActivity.as_str()))
        .filter(loyalty_point_entries::created_at.ge(month_start))
        .count()
        .get_result(conn)
        .await?;

    if already_granted_this_month > 0 {
        return Ok(0);
    }

    let entry = NewLoyaltyPointEntry {
        user_id: user_id.to_string(),
        points: policy::MONTHLY_BONUS_POINTS,
        action: PointAction::MonthlyActivity.as_str().to_string(),
        reference_id: None,
        reference_type: None,
        metadata: Some(serde_json::json!({ "interactions_this_month": interactions_this_month })),
        created_at: now.naive_utc(),
    };
    diesel::insert_into(loyalty_point_entries::table)
        .values(&entry)
        .execute(conn)
        .await?;

    info!(
        user_id,
        interactions_this_month, "Granted monthly activity bonus"
    );
    Ok(policy::MONTHLY_BONUS_POINTS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn streak_fires_on_positive_multiples_only() {
        assert!(!streak_milestone_reached(0));
        assert!(!streak_milestone_reached(4));
        assert!(streak_milestone_reached(5));
        assert!(!streak_milestone_reached(6));
        assert!(streak_milestone_reached(10));
        assert!(streak_milestone_reached(15));
    }

    #[test]
    fn monthly_threshold_is_inclusive() {
        assert!(!monthly_threshold_reached(29));
        assert!(monthly_threshold_reached(30));
        assert!(monthly_threshold_reached(31));
    }
}
