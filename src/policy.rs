// Copyright (c) Sabq Platform Team
// SPDX-License-Identifier: Apache-2.0

//! Static interaction policy: point values, daily caps, per-article caps and
//! the loyalty level thresholds. Everything here is an exhaustive match over
//! the closed [`InteractionType`] set, so a new interaction kind cannot be
//! added without deciding its policy.

use serde::{Deserialize, Serialize};

use crate::models::InteractionType;

/// Trailing window inspected for read streaks, in minutes.
pub const STREAK_WINDOW_MINUTES: i64 = 60;
/// A streak milestone is reached at every positive multiple of this count.
pub const STREAK_MILESTONE: i64 = 5;
/// Points granted for a read streak milestone (at most once per day).
pub const STREAK_BONUS_POINTS: i32 = 5;

/// Interactions since the start of the month required for the monthly bonus.
pub const MONTHLY_ACTIVITY_THRESHOLD: i64 = 30;
/// Points granted for monthly activity (at most once per month).
pub const MONTHLY_BONUS_POINTS: i32 = 25;

/// Base points granted for a single interaction of the given kind. A zero
/// value means the interaction is recorded without a ledger entry.
pub fn base_points(kind: InteractionType) -> i32 {
    match kind {
        InteractionType::Like => 1,
        InteractionType::Save => 2,
        InteractionType::Share => 3,
        InteractionType::Comment => 4,
        InteractionType::View => 0,
        InteractionType::Read => 1,
        InteractionType::ReadLong => 3,
        InteractionType::Bookmark => 2,
        InteractionType::NotificationOpen => 1,
    }
}

/// Maximum number of interactions of this kind a user may record per local
/// calendar day. `None` means uncapped.
pub fn daily_cap(kind: InteractionType) -> Option<i64> {
    match kind {
        InteractionType::Like => Some(20),
        InteractionType::Save => Some(15),
        InteractionType::Share => Some(10),
        InteractionType::Comment => Some(10),
        InteractionType::Read => Some(50),
        InteractionType::Bookmark => Some(15),
        InteractionType::View
        | InteractionType::ReadLong
        | InteractionType::NotificationOpen => None,
    }
}

/// Maximum number of interactions of this kind per (user, article). `None`
/// means uncapped; `Some(1)` marks the one-shot kinds.
pub fn per_article_cap(kind: InteractionType) -> Option<i64> {
    match kind {
        InteractionType::Like
        | InteractionType::Save
        | InteractionType::Read
        | InteractionType::Bookmark => Some(1),
        InteractionType::Share
        | InteractionType::Comment
        | InteractionType::View
        | InteractionType::ReadLong
        | InteractionType::NotificationOpen => None,
    }
}

/// Whether the kind may appear at most once per (user, article).
pub fn one_shot(kind: InteractionType) -> bool {
    per_article_cap(kind) == Some(1)
}

/// Loyalty level, derived from the ledger sum at read time. Never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Bronze,
    Silver,
    Gold,
    Platinum,
}

impl Level {
    pub fn name(&self) -> &'static str {
        match self {
            Level::Bronze => "bronze",
            Level::Silver => "silver",
            Level::Gold => "gold",
            Level::Platinum => "platinum",
        }
    }

    /// Arabic display label, as shown to readers.
    pub fn label_ar(&self) -> &'static str {
        match self {
            Level::Bronze => "برونزي",
            Level::Silver => "فضي",
            Level::Gold => "ذهبي",
            Level::Platinum => "بلاتيني",
        }
    }

    /// Minimum total points required for this level.
    pub fn min_points(&self) -> i64 {
        match self {
            Level::Bronze => 0,
            Level::Silver => 100,
            Level::Gold => 500,
            Level::Platinum => 2000,
        }
    }
}

/// Level thresholds: Bronze [0, 100), Silver [100, 500), Gold [500, 2000),
/// Platinum [2000, ∞). Totals below zero clamp to Bronze.
pub fn level_for(total_points: i64) -> Level {
    if total_points >= 2000 {
        Level::Platinum
    } else if total_points >= 500 {
        Level::Gold
    } else if total_points >= 100 {
        Level::Silver
    } else {
        Level::Bronze
    }
}
