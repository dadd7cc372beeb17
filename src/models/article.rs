// Copyright (c) Sabq Platform Team
// SPDX-License-Identifier: Apache-2.0

use chrono::NaiveDateTime;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};

use crate::schema::articles;

/// An article with its denormalized interaction counters. The counters are
/// only ever bumped with atomic `column = column + 1` updates so concurrent
/// recordings cannot lose increments.
#[derive(Debug, Clone, Queryable, Selectable, Serialize, Deserialize)]
#[diesel(table_name = articles)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Article {
    pub id: String,
    pub title: String,
    pub views_count: i32,
    pub likes_count: i32,
    pub saves_count: i32,
    pub shares_count: i32,
    pub published_at: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = articles)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct NewArticle {
    pub id: String,
    pub title: String,
    pub published_at: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}
