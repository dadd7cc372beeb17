// Copyright (c) Sabq Platform Team
// SPDX-License-Identifier: Apache-2.0

//! Unified interaction tracking: the recorder, the bonus evaluator and the
//! loyalty point ledger. All writes for one recorded interaction happen in a
//! single database transaction so the one-shot uniqueness and counter
//! invariants hold under concurrent requests.

pub mod bonus;
pub mod ledger;
pub mod recorder;

pub use recorder::{InteractionRecorder, RecordOutcome, ToggleAction, ToggleOutcome};

use chrono::{DateTime, Datelike, Duration, FixedOffset, NaiveDateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TrackingError {
    #[error("database error: {0}")]
    Database(#[from] diesel::result::Error),
    #[error("connection pool error: {0}")]
    Pool(String),
}

/// Per-article interaction flags for one user, as consumed by the
/// client-side store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArticleFlags {
    pub liked: bool,
    pub saved: bool,
    pub shared: bool,
}

/// Start of the current calendar day in the given fixed offset, expressed as
/// a naive UTC timestamp (the storage representation of `created_at`).
pub fn day_start_utc(now: DateTime<Utc>, tz: FixedOffset) -> NaiveDateTime {
    let local_midnight = NaiveDateTime::new(now.with_timezone(&tz).date_naive(), NaiveTime::MIN);
    local_midnight - Duration::seconds(tz.local_minus_utc() as i64)
}

/// Start of the current calendar month in the given fixed offset, as a naive
/// UTC timestamp.
pub fn month_start_utc(now: DateTime<Utc>, tz: FixedOffset) -> NaiveDateTime {
    let local_date = now.with_timezone(&tz).date_naive();
    let first_of_month = local_date.with_day(1).unwrap_or(local_date);
    let local_midnight = NaiveDateTime::new(first_of_month, NaiveTime::MIN);
    local_midnight - Duration::seconds(tz.local_minus_utc() as i64)
}
