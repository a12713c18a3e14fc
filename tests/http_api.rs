//! HTTP API tests
//!
//! Requests go through the full router (trace and CORS layers included)
//! with `tower::ServiceExt::oneshot`; the vault underneath runs against the
//! fake cluster.

mod harness;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use dbvault::http_server::HttpServer;
use dbvault::ledger::{BackupKind, Ledger, RecordMetadata};
use harness::{dump_of, Harness, LIVE_DB};
use serde_json::{json, Value};
use tower::ServiceExt;

fn router(h: &Harness) -> Router {
    HttpServer::new(h.vault.clone()).router()
}

async fn send(router: Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = router.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

// =============================================================================
// Backups
// =============================================================================

#[tokio::test]
async fn test_create_backup() {
    let h = Harness::new();

    let (status, body) = send(router(&h), "POST", "/db-backup", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Backup completed successfully");
    assert!(body["artifactUrl"].as_str().unwrap().starts_with("memory://db_backups/"));
    let id = body["id"].as_str().unwrap();
    assert!(h.ledger.get(id).await.is_ok());
}

#[tokio::test]
async fn test_create_backup_with_note() {
    let h = Harness::new();

    let (status, body) = send(
        router(&h),
        "POST",
        "/db-backup",
        Some(json!({ "note": "before migration" })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let record = h.ledger.get(body["id"].as_str().unwrap()).await.unwrap();
    assert_eq!(record.metadata.note.as_deref(), Some("before migration"));
}

/// A pending record makes the endpoint answer 400 with the busy message.
#[tokio::test]
async fn test_create_backup_busy() {
    let h = Harness::new();
    h.ledger
        .create(RecordMetadata::for_kind(BackupKind::Auto))
        .await
        .unwrap();

    let (status, body) = send(router(&h), "POST", "/db-backup", None).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Backup is already in progress. Please wait.");
    assert!(body["code"].as_str().is_some());
}

#[tokio::test]
async fn test_create_backup_failure() {
    let h = Harness::new();
    h.cluster.fail_when(
        |cmd| cmd.starts_with("pg_dump"),
        "pg_dump: error: connection to server failed",
    );

    let (status, body) = send(router(&h), "POST", "/db-backup", None).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["error"].as_str().unwrap().starts_with("Backup failed: "));
}

#[tokio::test]
async fn test_list_and_delete_backups() {
    let h = Harness::new();
    let receipt = h.vault.backup(None).await.unwrap();

    let (status, body) = send(router(&h), "GET", "/db-backup", None).await;
    assert_eq!(status, StatusCode::OK);
    let backups = body["backups"].as_array().unwrap();
    assert_eq!(backups.len(), 1);
    assert_eq!(backups[0]["id"], receipt.id.as_str());

    let uri = format!("/db-backup/{}", receipt.id);
    let (status, _) = send(router(&h), "DELETE", &uri, None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(router(&h), "DELETE", &uri, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].as_str().unwrap().contains(&receipt.id));
}

// =============================================================================
// Restore
// =============================================================================

#[tokio::test]
async fn test_restore_requires_url() {
    let h = Harness::new();

    let (status, body) = send(router(&h), "POST", "/db-restore", Some(json!({}))).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Backup URL is required");
    assert_eq!(body["status"], "unchanged");
    assert!(h.cluster.commands().is_empty());
}

#[tokio::test]
async fn test_restore_success() {
    let h = Harness::new();
    let artifact = h.store_snapshot(
        "db_backups/snap.tar.gz",
        &dump_of(&[("orders", "order-9"), ("db_backups", "ledger-old")]),
    );

    let (status, body) = send(
        router(&h),
        "POST",
        "/db-restore",
        Some(json!({ "url": artifact.artifact_url })),
    )
    .await;

    assert_eq!(status, StatusCode::OK, "{}", body);
    let preserved = body["backupDatabase"].as_str().unwrap();
    assert!(preserved.starts_with("shop_backup_"));
    assert_eq!(body["dropHint"], format!("DROP DATABASE \"{}\";", preserved));
    assert_eq!(body["ledgerRestored"], true);
    assert_eq!(h.cluster.table(LIVE_DB, "orders").as_deref(), Some("order-9"));
}

/// A rolled-back restore is still a 500, but says the data is safe.
#[tokio::test]
async fn test_restore_rolled_back() {
    let h = Harness::new();
    let artifact = h.store_snapshot("db_backups/snap.tar.gz", &dump_of(&[("orders", "order-9")]));
    h.cluster.fail_when(
        |cmd| cmd.contains("ALTER DATABASE \"shop\" RENAME TO"),
        "ERROR:  database \"shop\" is being accessed by other users",
    );

    let (status, body) = send(
        router(&h),
        "POST",
        "/db-restore",
        Some(json!({ "url": artifact.artifact_url })),
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["rollback"], "successful");
    assert_eq!(body["status"], "rolled-back");
    assert_eq!(body["code"], "VAULT_RESTORE_SWAP");
    assert!(body["error"].as_str().unwrap().contains("being accessed"));
    assert!(body.get("manualRecovery").is_none());
    assert_eq!(h.cluster.table(LIVE_DB, "orders").as_deref(), Some("order-1,order-2"));
}

// =============================================================================
// Metadata and status
// =============================================================================

#[tokio::test]
async fn test_update_metadata_requires_id_and_object() {
    let h = Harness::new();

    for body in [
        json!({ "metadata": { "note": "x" } }),
        json!({ "id": "abc" }),
        json!({ "id": "abc", "metadata": "not an object" }),
    ] {
        let (status, response) = send(router(&h), "POST", "/update-metadata", Some(body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(response["error"], "'id' and full 'metadata' object are required.");
    }
}

#[tokio::test]
async fn test_update_metadata() {
    let h = Harness::new();
    let receipt = h.vault.backup(Some("first".into())).await.unwrap();

    let (status, body) = send(
        router(&h),
        "POST",
        "/update-metadata",
        Some(json!({
            "id": receipt.id,
            "metadata": { "note": "keep forever", "ticket": "OPS-12" }
        })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Metadata updated successfully.");
    let record = h.ledger.get(&receipt.id).await.unwrap();
    assert_eq!(record.metadata.note.as_deref(), Some("keep forever"));
    assert_eq!(record.metadata.extra["ticket"], "OPS-12");
}

#[tokio::test]
async fn test_update_metadata_unknown_id() {
    let h = Harness::new();

    let (status, _) = send(
        router(&h),
        "POST",
        "/update-metadata",
        Some(json!({ "id": "missing", "metadata": {} })),
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_auto_status() {
    let h = Harness::new();
    let (status, body) = send(router(&h), "GET", "/auto-status", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], false);

    let h = Harness::with_config(|c| c.backup.auto = true);
    let (_, body) = send(router(&h), "GET", "/auto-status", None).await;
    assert_eq!(body["status"], true);
}
