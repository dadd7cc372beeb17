// Copyright (c) Sabq Platform Team
// SPDX-License-Identifier: Apache-2.0

// Import diesel table macros
use diesel::table;
use diesel::allow_tables_to_appear_in_same_query;

// Define users table
table! {
    users (id) {
        id -> Varchar,
        username -> Varchar,
        created_at -> Timestamp,
        last_active_at -> Timestamp,
    }
}

// Define articles table with denormalized interaction counters
table! {
    articles (id) {
        id -> Varchar,
        title -> Varchar,
        views_count -> Integer,
        likes_count -> Integer,
        saves_count -> Integer,
        shares_count -> Integer,
        published_at -> Nullable<Timestamp>,
        created_at -> Timestamp,
        updated_at -> Timestamp,
    }
}

// Define interactions table (append-only event log)
table! {
    interactions (id) {
        id -> Integer,
        user_id -> Varchar,
        article_id -> Varchar,
        interaction_type -> Varchar,
        metadata -> Nullable<Jsonb>,
        created_at -> Timestamp,
    }
}

// Define loyalty point ledger table (append-only)
table! {
    loyalty_point_entries (id) {
        id -> Integer,
        user_id -> Varchar,
        points -> Integer,
        action -> Varchar,
        reference_id -> Nullable<Integer>,
        reference_type -> Nullable<Varchar>,
        metadata -> Nullable<Jsonb>,
        created_at -> Timestamp,
    }
}

// Allow joining the tables if needed
allow_tables_to_appear_in_same_query!(
    users,
    articles,
    interactions,
    loyalty_point_entries,
);
