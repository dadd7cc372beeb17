// Copyright (c) Sabq Platform Team
// SPDX-License-Identifier: Apache-2.0

use chrono::NaiveDateTime;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::schema::interactions;

/// The closed set of interaction kinds the platform tracks. Adding a kind
/// here forces the policy tables to be extended (exhaustive matches).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InteractionType {
    Like,
    Save,
    Share,
    Comment,
    View,
    Read,
    ReadLong,
    Bookmark,
    NotificationOpen,
}

impl InteractionType {
    pub const ALL: [InteractionType; 9] = [
        InteractionType::Like,
        InteractionType::Save,
        InteractionType::Share,
        InteractionType::Comment,
        InteractionType::View,
        InteractionType::Read,
        InteractionType::ReadLong,
        InteractionType::Bookmark,
        InteractionType::NotificationOpen,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            InteractionType::Like => "like",
            InteractionType::Save => "save",
            InteractionType::Share => "share",
            InteractionType::Comment => "comment",
            InteractionType::View => "view",
            InteractionType::Read => "read",
            InteractionType::ReadLong => "read_long",
            InteractionType::Bookmark => "bookmark",
            InteractionType::NotificationOpen => "notification_open",
        }
    }
}

impl fmt::Display for InteractionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InteractionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "like" => Ok(InteractionType::Like),
            "save" => Ok(InteractionType::Save),
            "share" => Ok(InteractionType::Share),
            "comment" => Ok(InteractionType::Comment),
            "view" => Ok(InteractionType::View),
            "read" => Ok(InteractionType::Read),
            "read_long" => Ok(InteractionType::ReadLong),
            "bookmark" => Ok(InteractionType::Bookmark),
            "notification_open" => Ok(InteractionType::NotificationOpen),
            other => Err(format!("Unknown interaction type: {}", other)),
        }
    }
}

/// Optional client-supplied context recorded alongside an interaction.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InteractionMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reading_time: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scroll_percentage: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

/// An interaction event. Rows are created once and never mutated; the only
/// removal path is an explicit toggle-off of a one-shot kind.
#[derive(Debug, Clone, Queryable, Selectable, Serialize, Deserialize)]
#[diesel(table_name = interactions)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Interaction {
    pub id: i32,
    pub user_id: String,
    pub article_id: String,
    pub interaction_type: String,
    pub metadata: Option<serde_json::Value>,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = interactions)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct NewInteraction {
    pub user_id: String,
    pub article_id: String,
    pub interaction_type: String,
    pub metadata: Option<serde_json::Value>,
    pub created_at: NaiveDateTime,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interaction_type_parses_every_kind() {
        for kind in InteractionType::ALL {
            assert_eq!(kind.as_str().parse::<InteractionType>(), Ok(kind));
        }
    }

    #[test]
    fn unknown_interaction_type_is_rejected() {
        assert!("downvote".parse::<InteractionType>().is_err());
    }
}
