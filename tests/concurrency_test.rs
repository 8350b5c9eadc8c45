//! Concurrent retrievals must never exceed the download quota.

mod common;

use std::future::IntoFuture;

use axum::http::StatusCode;
use futures::future::join_all;
use tempfile::TempDir;

use common::TestApp;
use dropgate::file::QuotaLedger;
use dropgate::{Database, Role};

const PARALLEL_REQUESTS: usize = 8;

async fn file_database(dir: &TempDir) -> Database {
    Database::open(dir.path().join("dropgate.db"), 8)
        .await
        .expect("Failed to open database")
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_last_download_goes_to_exactly_one_request() {
    let dir = TempDir::new().unwrap();
    let app = TestApp::with_database(file_database(&dir).await).await;
    let (_, token) = app.user_with_token("owner", Role::User).await;
    let file_id = app
        .upload(&token, "race.txt", b"one copy", &[("downloads", "1".to_string())])
        .await;

    let path = format!("/d/{}", file_id);
    let requests = (0..PARALLEL_REQUESTS).map(|_| app.server.get(&path).into_future());
    let responses = join_all(requests).await;

    let ok = responses
        .iter()
        .filter(|r| r.status_code() == StatusCode::OK)
        .count();
    let gone = responses
        .iter()
        .filter(|r| r.status_code() == StatusCode::GONE)
        .count();
    assert_eq!(ok, 1);
    assert_eq!(gone, PARALLEL_REQUESTS - 1);

    let (remaining, count): (i64, i64) =
        sqlx::query_as("SELECT downloads_remaining, download_count FROM files WHERE id = ?")
            .bind(&file_id)
            .fetch_one(app.db.pool())
            .await
            .unwrap();
    assert_eq!(remaining, 0);
    assert_eq!(count, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_ledger_under_contention() {
    let dir = TempDir::new().unwrap();
    let db = file_database(&dir).await;
    let app = TestApp::with_database(db.clone()).await;
    let (_, token) = app.user_with_token("owner", Role::User).await;
    let file_id = app
        .upload(&token, "a.txt", b"x", &[("downloads", "3".to_string())])
        .await;

    let ledger = QuotaLedger::new(db.pool().clone());
    let handles: Vec<_> = (0..10)
        .map(|_| {
            let ledger = ledger.clone();
            let file_id = file_id.clone();
            tokio::spawn(async move { ledger.record_download(&file_id).await.is_ok() })
        })
        .collect();

    let mut granted = 0;
    for handle in handles {
        if handle.await.unwrap() {
            granted += 1;
        }
    }
    assert_eq!(granted, 3);

    let remaining: i64 = sqlx::query_scalar("SELECT downloads_remaining FROM files WHERE id = ?")
        .bind(&file_id)
        .fetch_one(db.pool())
        .await
        .unwrap();
    assert_eq!(remaining, 0);
}
