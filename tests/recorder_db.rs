// Copyright (c) Sabq Platform Team
// SPDX-License-Identifier: Apache-2.0

//! End-to-end recorder tests against a real PostgreSQL database. These are
//! ignored by default; run them with a local database via
//! `DATABASE_URL=... cargo test -- --ignored`.

use chrono::Utc;
use diesel_async::RunQueryDsl;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use sabq_interactions::db::Database;
use sabq_interactions::models::article::NewArticle;
use sabq_interactions::models::user::NewUser;
use sabq_interactions::models::InteractionType;
use sabq_interactions::policy::Level;
use sabq_interactions::schema::{articles, users};
use sabq_interactions::tracking::{ledger, InteractionRecorder, ToggleAction};

fn unique_id(prefix: &str) -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock before epoch")
        .as_nanos();
    format!("{}-{}", prefix, nanos)
}

async fn seed(db: &Database) -> (String, String) {
    let mut conn = db.get_connection().await.expect("connection");
    let now = Utc::now().naive_utc();

    let user_id = unique_id("user");
    diesel::insert_into(users::table)
        .values(&NewUser {
            id: user_id.clone(),
            username: "qarie".to_string(),
            created_at: now,
            last_active_at: now,
        })
        .execute(&mut conn)
        .await
        .expect("seed user");

    let article_id = seed_article(db).await;
    (user_id, article_id)
}

async fn seed_article(db: &Database) -> String {
    let mut conn = db.get_connection().await.expect("connection");
    let now = Utc::now().naive_utc();
    let article_id = unique_id("article");
    diesel::insert_into(articles::table)
        .values(&NewArticle {
            id: article_id.clone(),
            title: "عنوان تجريبي".to_string(),
            published_at: Some(now),
            created_at: now,
            updated_at: now,
        })
        .execute(&mut conn)
        .await
        .expect("seed article");
    article_id
}

async fn article_counters(db: &Database, article_id: &str) -> (i32, i32, i32, i32) {
    use diesel::QueryDsl;
    let mut conn = db.get_connection().await.expect("connection");
    articles::table
        .find(article_id)
        .select((
            articles::views_count,
            articles::likes_count,
            articles::saves_count,
            articles::shares_count,
        ))
        .first(&mut conn)
        .await
        .expect("article row")
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn one_shot_likes_record_once_and_bump_the_counter() {
    let db = Arc::new(Database::new().await.expect("database"));
    let (user_id, article_id) = seed(&db).await;
    let recorder = InteractionRecorder::new(db.clone());

    let first = recorder
        .record(&user_id, &article_id, InteractionType::Like, None)
        .await;
    assert!(first.success);
    assert_eq!(first.points_awarded, 1);
    assert_eq!(first.total_points, 1);
    assert_eq!(first.level, Level::Bronze);

    let second = recorder
        .record(&user_id, &article_id, InteractionType::Like, None)
        .await;
    assert!(!second.success);
    assert!(second.already_exists);
    assert_eq!(second.total_points, 1);

    let (_, likes, _, _) = article_counters(&db, &article_id).await;
    assert_eq!(likes, 1);
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn unknown_entities_are_rejected_without_writes() {
    let db = Arc::new(Database::new().await.expect("database"));
    let (user_id, article_id) = seed(&db).await;
    let recorder = InteractionRecorder::new(db.clone());

    let missing_user = recorder
        .record("no-such-user", &article_id, InteractionType::Like, None)
        .await;
    assert!(!missing_user.success);

    let missing_article = recorder
        .record(&user_id, "no-such-article", InteractionType::Like, None)
        .await;
    assert!(!missing_article.success);

    let (_, likes, _, _) = article_counters(&db, &article_id).await;
    assert_eq!(likes, 0);
    let mut conn = db.get_connection().await.expect("connection");
    assert_eq!(ledger::total_points(&mut conn, &user_id).await.unwrap(), 0);
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn daily_share_cap_rejects_the_eleventh_share() {
    let db = Arc::new(Database::new().await.expect("database"));
    let (user_id, article_id) = seed(&db).await;
    let recorder = InteractionRecorder::new(db.clone());

    for _ in 0..10 {
        let outcome = recorder
            .record(&user_id, &article_id, InteractionType::Share, None)
            .await;
        assert!(outcome.success);
    }

    let over_cap = recorder
        .record(&user_id, &article_id, InteractionType::Share, None)
        .await;
    assert!(!over_cap.success);
    assert!(over_cap.limit_reached);

    let (_, _, _, shares) = article_counters(&db, &article_id).await;
    assert_eq!(shares, 10);
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn read_streak_grants_a_single_daily_bonus() {
    let db = Arc::new(Database::new().await.expect("database"));
    let (user_id, _) = seed(&db).await;
    let recorder = InteractionRecorder::new(db.clone());

    let mut fifth_outcome = None;
    for i in 0..10 {
        let article_id = seed_article(&db).await;
        let outcome = recorder
            .record(&user_id, &article_id, InteractionType::Read, None)
            .await;
        assert!(outcome.success);
        if i == 4 {
            fifth_outcome = Some(outcome);
        }
    }

    // The 5th read hits the milestone: 1 base point plus the streak bonus.
    let fifth = fifth_outcome.expect("fifth read");
    assert_eq!(fifth.points_awarded, 6);

    // 10 reads yield 10 base points and exactly one streak bonus today,
    // even though read 10 is also a multiple of five.
    let mut conn = db.get_connection().await.expect("connection");
    assert_eq!(ledger::total_points(&mut conn, &user_id).await.unwrap(), 15);
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn toggle_round_trip_removes_the_like_and_compensates_the_ledger() {
    let db = Arc::new(Database::new().await.expect("database"));
    let (user_id, article_id) = seed(&db).await;
    let recorder = InteractionRecorder::new(db.clone());

    let added = recorder
        .toggle(&user_id, &article_id, InteractionType::Like)
        .await;
    assert!(added.success);
    assert!(added.state);
    assert_eq!(added.action, Some(ToggleAction::Added));

    let removed = recorder
        .toggle(&user_id, &article_id, InteractionType::Like)
        .await;
    assert!(removed.success);
    assert!(!removed.state);
    assert_eq!(removed.action, Some(ToggleAction::Removed));

    // Counter back to zero, ledger netted out by a compensating entry.
    let (_, likes, _, _) = article_counters(&db, &article_id).await;
    assert_eq!(likes, 0);
    let mut conn = db.get_connection().await.expect("connection");
    assert_eq!(ledger::total_points(&mut conn, &user_id).await.unwrap(), 0);

    let flags = recorder
        .user_flags(&user_id, &[article_id.clone()])
        .await
        .expect("flags");
    assert!(!flags[&article_id].liked);
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn concurrent_toggle_offs_remove_the_like_exactly_once() {
    let db = Arc::new(Database::new().await.expect("database"));
    let (user_id, article_id) = seed(&db).await;
    let recorder = InteractionRecorder::new(db.clone());

    let added = recorder
        .toggle(&user_id, &article_id, InteractionType::Like)
        .await;
    assert!(added.success);

    let (first, second) = tokio::join!(
        recorder.toggle(&user_id, &article_id, InteractionType::Like),
        recorder.toggle(&user_id, &article_id, InteractionType::Like)
    );
    assert!(first.success);
    assert!(second.success);

    // Whatever the interleaving, the counter and the ledger must agree with
    // the final flag. A lost removal race must not decrement or append a
    // second compensating entry.
    let flags = recorder
        .user_flags(&user_id, &[article_id.clone()])
        .await
        .expect("flags");
    let (_, likes, _, _) = article_counters(&db, &article_id).await;
    let mut conn = db.get_connection().await.expect("connection");
    let total = ledger::total_points(&mut conn, &user_id).await.unwrap();
    if flags[&article_id].liked {
        // One toggle removed, the other re-added after it committed.
        assert_eq!(likes, 1);
        assert_eq!(total, 1);
    } else {
        assert_eq!(likes, 0);
        assert_eq!(total, 0);
    }
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn capped_share_toggle_still_reports_the_set_flag() {
    let db = Arc::new(Database::new().await.expect("database"));
    let (user_id, article_id) = seed(&db).await;
    let recorder = InteractionRecorder::new(db.clone());

    let shared = recorder
        .toggle(&user_id, &article_id, InteractionType::Share)
        .await;
    assert!(shared.success);
    assert!(shared.state);

    // Exhaust the rest of the daily share cap on other articles.
    for _ in 0..9 {
        let other = seed_article(&db).await;
        let outcome = recorder
            .record(&user_id, &other, InteractionType::Share, None)
            .await;
        assert!(outcome.success);
    }

    // The rejected toggle must report the article's real shared state, not
    // a blanket false the client would adopt.
    let rejected = recorder
        .toggle(&user_id, &article_id, InteractionType::Share)
        .await;
    assert!(!rejected.success);
    assert!(rejected.state);
    assert_eq!(rejected.action, None);
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn user_stats_aggregate_counts_points_and_level() {
    let db = Arc::new(Database::new().await.expect("database"));
    let (user_id, article_id) = seed(&db).await;
    let recorder = InteractionRecorder::new(db.clone());

    recorder
        .record(&user_id, &article_id, InteractionType::Like, None)
        .await;
    recorder
        .record(&user_id, &article_id, InteractionType::Comment, None)
        .await;
    recorder
        .record(&user_id, &article_id, InteractionType::Comment, None)
        .await;

    let mut conn = db.get_connection().await.expect("connection");
    let stats = ledger::user_stats(&mut conn, &user_id, 20)
        .await
        .expect("stats query")
        .expect("user exists");

    assert_eq!(stats.interaction_counts.get("like"), Some(&1));
    assert_eq!(stats.interaction_counts.get("comment"), Some(&2));
    assert_eq!(stats.total_points, 9);
    assert_eq!(stats.level.name, "bronze");
    assert_eq!(stats.level.label_ar, "برونزي");
    assert_eq!(stats.recent_interactions.len(), 3);
}
