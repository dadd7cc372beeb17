// Copyright (c) Sabq Platform Team
// SPDX-License-Identifier: Apache-2.0

use chrono::NaiveDateTime;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};

use crate::models::interaction::InteractionType;
use crate::schema::loyalty_point_entries;

/// Reference type recorded on ledger entries that point back at an
/// interaction row.
pub const REFERENCE_TYPE_INTERACTION: &str = "interaction";

/// The closed set of ledger actions. Base grants carry the interaction kind
/// that earned them; removals and bonuses are their own actions so the
/// ledger stays append-only (a removal is a new negative entry, never an
/// update of the original grant).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointAction {
    Interaction(InteractionType),
    LikeRemoved,
    SaveRemoved,
    BookmarkRemoved,
    StreakBonus,
    MonthlyActivity,
}

impl PointAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            PointAction::Interaction(kind) => kind.as_str(),
            PointAction::LikeRemoved => "like_removed",
            PointAction::SaveRemoved => "save_removed",
            PointAction::BookmarkRemoved => "bookmark_removed",
            PointAction::StreakBonus => "streak_bonus",
            PointAction::MonthlyActivity => "monthly_activity",
        }
    }

    /// The compensating action for removing a previously recorded one-shot
    /// interaction, if removal is supported for that kind.
    pub fn removal_for(kind: InteractionType) -> Option<PointAction> {
        match kind {
            InteractionType::Like => Some(PointAction::LikeRemoved),
            InteractionType::Save => Some(PointAction::SaveRemoved),
            InteractionType::Bookmark => Some(PointAction::BookmarkRemoved),
            _ => None,
        }
    }
}

/// A loyalty point ledger entry. Entries are never updated or deleted; a
/// user's total is always the sum over their entries.
#[derive(Debug, Clone, Queryable, Selectable, Serialize, Deserialize)]
#[diesel(table_name = loyalty_point_entries)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct LoyaltyPointEntry {
    pub id: i32,
    pub user_id: String,
    pub points: i32,
    pub action: String,
    pub reference_id: Option<i32>,
    pub reference_type: Option<String>,
    pub metadata: Option<serde_json::Value>,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = loyalty_point_entries)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct NewLoyaltyPointEntry {
    pub user_id: String,
    pub points: i32,
    pub action: String,
    pub reference_id: Option<i32>,
    pub reference_type: Option<String>,
    pub metadata: Option<serde_json::Value>,
    pub created_at: NaiveDateTime,
}
