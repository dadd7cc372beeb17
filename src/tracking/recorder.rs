// Copyright (c) Sabq Platform Team
// SPDX-License-Identifier: Apache-2.0

//! The interaction recorder: validates an incoming interaction, enforces the
//! per-article and daily caps, persists the event, bumps the article's
//! denormalized counter and appends the loyalty ledger entries. Every write
//! path runs in one transaction; the partial unique index on one-shot kinds
//! backstops concurrent duplicates.

use chrono::{DateTime, FixedOffset, Utc};
use diesel::prelude::*;
use diesel_async::scoped_futures::ScopedFutureExt;
use diesel_async::{AsyncConnection, AsyncPgConnection, RunQueryDsl};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error, info};

use crate::config::Config;
use crate::db::{Database, DbConnection};
use crate::models::loyalty::REFERENCE_TYPE_INTERACTION;
use crate::models::{
    InteractionMetadata, InteractionType, NewInteraction, NewLoyaltyPointEntry, PointAction,
};
use crate::policy::{self, Level};
use crate::schema::{articles, interactions, loyalty_point_entries, users};
use crate::tracking::{bonus, day_start_utc, ledger, ArticleFlags, TrackingError};

const MSG_USER_NOT_FOUND: &str = "المستخدم غير موجود";
const MSG_ARTICLE_NOT_FOUND: &str = "المقال غير موجود";
const MSG_ALREADY_EXISTS: &str = "تم تسجيل هذا التفاعل مسبقاً";
const MSG_LIMIT_REACHED: &str = "تم بلوغ الحد اليومي لهذا النوع من التفاعل";
const MSG_REMOVED: &str = "تمت إزالة التفاعل";
const MSG_NOT_TOGGLABLE: &str = "هذا النوع من التفاعل غير قابل للتبديل";
const MSG_FAILURE: &str = "حدث خطأ غير متوقع، يرجى المحاولة لاحقاً";

/// Structured result of a record call. Failures are ordinary results, never
/// errors; the optional flags distinguish the rejection reasons.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordOutcome {
    pub success: bool,
    pub points_awarded: i32,
    pub total_points: i64,
    pub level: Level,
    pub message: String,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub limit_reached: bool,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub already_exists: bool,
    /// Set when the user or article was missing; drives the HTTP status
    /// mapping and is not part of the wire contract.
    #[serde(skip)]
    pub not_found: bool,
}

impl RecordOutcome {
    fn recorded(points_awarded: i32, total_points: i64) -> Self {
        let message = if points_awarded > 0 {
            format!("تم تسجيل التفاعل وحصلت على {} نقطة", points_awarded)
        } else {
            "تم تسجيل التفاعل بنجاح".to_string()
        };
        RecordOutcome {
            success: true,
            points_awarded,
            total_points,
            level: policy::level_for(total_points),
            message,
            limit_reached: false,
            already_exists: false,
            not_found: false,
        }
    }

    fn not_found(message: &str) -> Self {
        RecordOutcome {
            success: false,
            points_awarded: 0,
            total_points: 0,
            level: Level::Bronze,
            message: message.to_string(),
            limit_reached: false,
            already_exists: false,
            not_found: true,
        }
    }

    fn duplicate(total_points: i64) -> Self {
        RecordOutcome {
            success: false,
            points_awarded: 0,
            total_points,
            level: policy::level_for(total_points),
            message: MSG_ALREADY_EXISTS.to_string(),
            limit_reached: false,
            already_exists: true,
            not_found: false,
        }
    }

    fn limit_reached(total_points: i64) -> Self {
        RecordOutcome {
            success: false,
            points_awarded: 0,
            total_points,
            level: policy::level_for(total_points),
            message: MSG_LIMIT_REACHED.to_string(),
            limit_reached: true,
            already_exists: false,
            not_found: false,
        }
    }

    fn failure() -> Self {
        RecordOutcome {
            success: false,
            points_awarded: 0,
            total_points: 0,
            level: Level::Bronze,
            message: MSG_FAILURE.to_string(),
            limit_reached: false,
            already_exists: false,
            not_found: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ToggleAction {
    Added,
    Removed,
}

/// Result of a toggle call. `state` is the authoritative flag value after
/// the call, which the client store reconciles against.
#[derive(Debug, Clone)]
pub struct ToggleOutcome {
    pub success: bool,
    pub kind: InteractionType,
    pub state: bool,
    pub action: Option<ToggleAction>,
    pub message: String,
    pub not_found: bool,
}

impl ToggleOutcome {
    fn removed(kind: InteractionType) -> Self {
        ToggleOutcome {
            success: true,
            kind,
            state: false,
            action: Some(ToggleAction::Removed),
            message: MSG_REMOVED.to_string(),
            not_found: false,
        }
    }

    fn from_record(kind: InteractionType, outcome: RecordOutcome) -> Self {
        ToggleOutcome {
            success: outcome.success,
            kind,
            // A raced duplicate still means the flag is set server-side.
            state: outcome.success || outcome.already_exists,
            action: outcome.success.then_some(ToggleAction::Added),
            not_found: outcome.not_found,
            message: outcome.message,
        }
    }

    fn rejected(kind: InteractionType, outcome: RecordOutcome, state: bool) -> Self {
        ToggleOutcome {
            success: false,
            kind,
            state,
            action: None,
            not_found: outcome.not_found,
            message: outcome.message,
        }
    }

    fn failure(kind: InteractionType, message: &str) -> Self {
        ToggleOutcome {
            success: false,
            kind,
            state: false,
            action: None,
            message: message.to_string(),
            not_found: false,
        }
    }
}

/// JSON field name carrying the flag for a togglable kind, or `None` when
/// the kind cannot be toggled.
pub fn flag_field(kind: InteractionType) -> Option<&'static str> {
    match kind {
        InteractionType::Like => Some("liked"),
        InteractionType::Save | InteractionType::Bookmark => Some("saved"),
        InteractionType::Share => Some("shared"),
        _ => None,
    }
}

pub struct InteractionRecorder {
    db: Arc<Database>,
    tz: FixedOffset,
}

impl InteractionRecorder {
    pub fn new(db: Arc<Database>) -> Self {
        let config = Config::get();
        let tz = FixedOffset::east_opt(config.tracking.timezone_offset_hours * 3600)
            .unwrap_or_else(|| FixedOffset::east_opt(0).expect("zero offset is valid"));
        Self { db, tz }
    }

    async fn connection(&self) -> Result<DbConnection, TrackingError> {
        self.db
            .get_connection()
            .await
            .map_err(|e| TrackingError::Pool(e.to_string()))
    }

    /// Record an interaction. All failures, including storage errors, come
    /// back as a structured outcome; nothing escapes as an error.
    pub async fn record(
        &self,
        user_id: &str,
        article_id: &str,
        kind: InteractionType,
        metadata: Option<InteractionMetadata>,
    ) -> RecordOutcome {
        match self.try_record(user_id, article_id, kind, metadata).await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(user_id, article_id, kind = kind.as_str(), "Failed to record interaction: {}", e);
                RecordOutcome::failure()
            }
        }
    }

    async fn try_record(
        &self,
        user_id: &str,
        article_id: &str,
        kind: InteractionType,
        metadata: Option<InteractionMetadata>,
    ) -> Result<RecordOutcome, TrackingError> {
        let mut conn = self.connection().await?;
        let now = Utc::now();
        let tz = self.tz;
        let metadata_value = metadata.as_ref().and_then(|m| serde_json::to_value(m).ok());

        conn.transaction::<RecordOutcome, TrackingError, _>(|conn| {
            async move { record_in_txn(conn, user_id, article_id, kind, metadata_value, now, tz).await }
                .scope_boxed()
        })
        .await
    }

    /// Toggle a like/save/bookmark/share for a (user, article). One-shot
    /// kinds flip between recorded and removed; a share toggle always
    /// records.
    pub async fn toggle(
        &self,
        user_id: &str,
        article_id: &str,
        kind: InteractionType,
    ) -> ToggleOutcome {
        if flag_field(kind).is_none() {
            return ToggleOutcome::failure(kind, MSG_NOT_TOGGLABLE);
        }
        match self.try_toggle(user_id, article_id, kind).await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(user_id, article_id, kind = kind.as_str(), "Failed to toggle interaction: {}", e);
                ToggleOutcome::failure(kind, MSG_FAILURE)
            }
        }
    }

    async fn try_toggle(
        &self,
        user_id: &str,
        article_id: &str,
        kind: InteractionType,
    ) -> Result<ToggleOutcome, TrackingError> {
        let mut conn = self.connection().await?;
        let now = Utc::now();
        let tz = self.tz;

        conn.transaction::<ToggleOutcome, TrackingError, _>(|conn| {
            async move {
                if policy::one_shot(kind) {
                    let existing: Option<i32> = interactions::table
                        .filter(interactions::user_id.eq(user_id))
                        .filter(interactions::article_id.eq(article_id))
                        .filter(interactions::interaction_type.eq(kind.as_str()))
                        .select(interactions::id)
                        .first::<i32>(conn)
                        .await
                        .optional()?;

                    if let Some(row_id) = existing {
                        let removed =
                            remove_in_txn(conn, user_id, article_id, kind, row_id, now).await?;
                        if removed {
                            info!(user_id, article_id, kind = kind.as_str(), "Interaction removed");
                        } else {
                            debug!(
                                user_id,
                                article_id,
                                kind = kind.as_str(),
                                "Lost toggle-off race, interaction already removed"
                            );
                        }
                        return Ok(ToggleOutcome::removed(kind));
                    }
                }

                let outcome =
                    record_in_txn(conn, user_id, article_id, kind, None, now, tz).await?;
                if outcome.limit_reached {
                    // The cap rejection says nothing about the flag; report
                    // the actual server-side state so clients don't adopt a
                    // stale false.
                    let state = flag_state_in_txn(conn, user_id, article_id, kind).await?;
                    return Ok(ToggleOutcome::rejected(kind, outcome, state));
                }
                Ok(ToggleOutcome::from_record(kind, outcome))
            }
            .scope_boxed()
        })
        .await
    }

    /// Bulk interaction flags for a user over a set of articles, as consumed
    /// by the client store on load and resync.
    pub async fn user_flags(
        &self,
        user_id: &str,
        article_ids: &[String],
    ) -> Result<HashMap<String, ArticleFlags>, TrackingError> {
        let mut conn = self.connection().await?;

        let toggle_kinds = [
            InteractionType::Like.as_str(),
            InteractionType::Save.as_str(),
            InteractionType::Bookmark.as_str(),
            InteractionType::Share.as_str(),
        ];
        let rows: Vec<(String, String)> = interactions::table
            .filter(interactions::user_id.eq(user_id))
            .filter(interactions::article_id.eq_any(article_ids))
            .filter(interactions::interaction_type.eq_any(toggle_kinds))
            .select((interactions::article_id, interactions::interaction_type))
            .load(&mut conn)
            .await?;

        let mut flags: HashMap<String, ArticleFlags> = article_ids
            .iter()
            .map(|id| (id.clone(), ArticleFlags::default()))
            .collect();
        for (article_id, kind) in rows {
            let entry = flags.entry(article_id).or_default();
            match kind.as_str() {
                "like" => entry.liked = true,
                "save" | "bookmark" => entry.saved = true,
                "share" => entry.shared = true,
                _ => {}
            }
        }
        Ok(flags)
    }
}

/// The full record path, runnable inside an existing transaction.
async fn record_in_txn(
    conn: &mut AsyncPgConnection,
    user_id: &str,
    article_id: &str,
    kind: InteractionType,
    metadata: Option<serde_json::Value>,
    now: DateTime<Utc>,
    tz: FixedOffset,
) -> Result<RecordOutcome, TrackingError> {
    // 1. Both entities must exist; rejections make no writes.
    let user_exists: i64 = users::table
        .filter(users::id.eq(user_id))
        .count()
        .get_result(conn)
        .await?;
    if user_exists == 0 {
        debug!(user_id, "Interaction rejected: unknown user");
        return Ok(RecordOutcome::not_found(MSG_USER_NOT_FOUND));
    }
    let article_exists: i64 = articles::table
        .filter(articles::id.eq(article_id))
        .count()
        .get_result(conn)
        .await?;
    if article_exists == 0 {
        debug!(article_id, "Interaction rejected: unknown article");
        return Ok(RecordOutcome::not_found(MSG_ARTICLE_NOT_FOUND));
    }

    // 2. One-shot kinds may exist at most once per (user, article).
    if policy::one_shot(kind) {
        let existing: i64 = interactions::table
            .filter(interactions::user_id.eq(user_id))
            .filter(interactions::article_id.eq(article_id))
            .filter(interactions::interaction_type.eq(kind.as_str()))
            .count()
            .get_result(conn)
            .await?;
        if existing > 0 {
            let total = ledger::total_points(conn, user_id).await?;
            return Ok(RecordOutcome::duplicate(total));
        }
    }

    // 3. Daily cap, counted from local midnight.
    if let Some(cap) = policy::daily_cap(kind) {
        let day_start = day_start_utc(now, tz);
        let today: i64 = interactions::table
            .filter(interactions::user_id.eq(user_id))
            .filter(interactions::interaction_type.eq(kind.as_str()))
            .filter(interactions::created_at.ge(day_start))
            .count()
            .get_result(conn)
            .await?;
        if today >= cap {
            info!(user_id, kind = kind.as_str(), cap, "Daily interaction cap reached");
            let total = ledger::total_points(conn, user_id).await?;
            return Ok(RecordOutcome::limit_reached(total));
        }
    }

    // 4. Persist the interaction. The partial unique index turns a raced
    //    duplicate into a zero-row insert instead of a constraint error.
    let new_interaction = NewInteraction {
        user_id: user_id.to_string(),
        article_id: article_id.to_string(),
        interaction_type: kind.as_str().to_string(),
        metadata,
        created_at: now.naive_utc(),
    };
    let inserted: Option<i32> = diesel::insert_into(interactions::table)
        .values(&new_interaction)
        .on_conflict_do_nothing()
        .returning(interactions::id)
        .get_result::<i32>(conn)
        .await
        .optional()?;
    let Some(interaction_id) = inserted else {
        debug!(user_id, article_id, kind = kind.as_str(), "Lost one-shot insert race");
        let total = ledger::total_points(conn, user_id).await?;
        return Ok(RecordOutcome::duplicate(total));
    };

    // 5. Atomic counter bump on the article.
    bump_article_counter(conn, article_id, kind, now).await?;

    // 6. Base point grant referencing this interaction.
    let base = policy::base_points(kind);
    if base > 0 {
        let entry = NewLoyaltyPointEntry {
            user_id: user_id.to_string(),
            points: base,
            action: PointAction::Interaction(kind).as_str().to_string(),
            reference_id: Some(interaction_id),
            reference_type: Some(REFERENCE_TYPE_INTERACTION.to_string()),
            metadata: Some(serde_json::json!({ "article_id": article_id })),
            created_at: now.naive_utc(),
        };
        diesel::insert_into(loyalty_point_entries::table)
            .values(&entry)
            .execute(conn)
            .await?;
    }

    // 7. Milestone bonuses run on every write, even zero-point kinds.
    let bonus_points = bonus::evaluate(conn, user_id, kind, now, tz).await?;

    // 8. Touch activity and report the canonical totals.
    diesel::update(users::table.find(user_id))
        .set(users::last_active_at.eq(now.naive_utc()))
        .execute(conn)
        .await?;
    let total = ledger::total_points(conn, user_id).await?;

    info!(
        user_id,
        article_id,
        kind = kind.as_str(),
        points = base + bonus_points,
        "Interaction recorded"
    );
    Ok(RecordOutcome::recorded(base + bonus_points, total))
}

/// Reversal of a previously recorded one-shot interaction: delete the row,
/// decrement the counter floored at zero, and append a compensating negative
/// ledger entry. The ledger itself is never mutated.
///
/// Returns `false` when the row was already gone. A concurrent toggle-off
/// can delete the row between the caller's read and this delete; the loser
/// must not decrement or compensate a second time.
async fn remove_in_txn(
    conn: &mut AsyncPgConnection,
    user_id: &str,
    article_id: &str,
    kind: InteractionType,
    row_id: i32,
    now: DateTime<Utc>,
) -> Result<bool, TrackingError> {
    let deleted = diesel::delete(interactions::table.find(row_id))
        .execute(conn)
        .await?;
    if deleted == 0 {
        return Ok(false);
    }

    decrement_article_counter(conn, article_id, kind, now).await?;

    if let Some(action) = PointAction::removal_for(kind) {
        let base = policy::base_points(kind);
        if base > 0 {
            let entry = NewLoyaltyPointEntry {
                user_id: user_id.to_string(),
                points: -base,
                action: action.as_str().to_string(),
                reference_id: Some(row_id),
                reference_type: Some(REFERENCE_TYPE_INTERACTION.to_string()),
                metadata: Some(serde_json::json!({ "article_id": article_id })),
                created_at: now.naive_utc(),
            };
            diesel::insert_into(loyalty_point_entries::table)
                .values(&entry)
                .execute(conn)
                .await?;
        }
    }
    Ok(true)
}

/// Whether the flag for a togglable kind is currently set for
/// (user, article). Save and bookmark share the `saved` flag.
async fn flag_state_in_txn(
    conn: &mut AsyncPgConnection,
    user_id: &str,
    article_id: &str,
    kind: InteractionType,
) -> Result<bool, TrackingError> {
    let kinds: &[&str] = match kind {
        InteractionType::Like => &["like"],
        InteractionType::Save | InteractionType::Bookmark => &["save", "bookmark"],
        InteractionType::Share => &["share"],
        _ => return Ok(false),
    };
    let present: i64 = interactions::table
        .filter(interactions::user_id.eq(user_id))
        .filter(interactions::article_id.eq(article_id))
        .filter(interactions::interaction_type.eq_any(kinds.iter().copied()))
        .count()
        .get_result(conn)
        .await?;
    Ok(present > 0)
}

async fn bump_article_counter(
    conn: &mut AsyncPgConnection,
    article_id: &str,
    kind: InteractionType,
    now: DateTime<Utc>,
) -> Result<(), TrackingError> {
    use crate::schema::articles::dsl;

    let touched = now.naive_utc();
    match kind {
        InteractionType::Like => {
            diesel::update(dsl::articles.find(article_id))
                .set((
                    dsl::likes_count.eq(dsl::likes_count + 1),
                    dsl::updated_at.eq(touched),
                ))
                .execute(conn)
                .await?;
        }
        InteractionType::Save | InteractionType::Bookmark => {
            diesel::update(dsl::articles.find(article_id))
                .set((
                    dsl::saves_count.eq(dsl::saves_count + 1),
                    dsl::updated_at.eq(touched),
                ))
                .execute(conn)
                .await?;
        }
        InteractionType::Share => {
            diesel::update(dsl::articles.find(article_id))
                .set((
                    dsl::shares_count.eq(dsl::shares_count + 1),
                    dsl::updated_at.eq(touched),
                ))
                .execute(conn)
                .await?;
        }
        InteractionType::View | InteractionType::Read => {
            diesel::update(dsl::articles.find(article_id))
                .set((
                    dsl::views_count.eq(dsl::views_count + 1),
                    dsl::updated_at.eq(touched),
                ))
                .execute(conn)
                .await?;
        }
        // No counter mapping for these kinds.
        InteractionType::Comment
        | InteractionType::ReadLong
        | InteractionType::NotificationOpen => {}
    }
    Ok(())
}

async fn decrement_article_counter(
    conn: &mut AsyncPgConnection,
    article_id: &str,
    kind: InteractionType,
    now: DateTime<Utc>,
) -> Result<(), TrackingError> {
    use crate::schema::articles::dsl;
    use diesel::dsl::sql;
    use diesel::sql_types::Integer;

    let touched = now.naive_utc();
    match kind {
        InteractionType::Like => {
            diesel::update(dsl::articles.find(article_id))
                .set((
                    dsl::likes_count.eq(sql::<Integer>("GREATEST(likes_count - 1, 0)")),
                    dsl::updated_at.eq(touched),
                ))
                .execute(conn)
                .await?;
        }
        InteractionType::Save | InteractionType::Bookmark => {
            diesel::update(dsl::articles.find(article_id))
                .set((
                    dsl::saves_count.eq(sql::<Integer>("GREATEST(saves_count - 1, 0)")),
                    dsl::updated_at.eq(touched),
                ))
                .execute(conn)
                .await?;
        }
        _ => {}
    }
    Ok(())
}
