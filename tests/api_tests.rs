mod common;

use std::sync::Arc;

use reqwest::StatusCode;
use serde_json::json;

use common::*;
use order_sync::models::Store;

// ── Health ──

#[tokio::test]
async fn health_and_status_respond_without_key() {
    let app = spawn_app().await;

    let resp = app.client.get(app.url("/health")).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(
        resp.headers().get("x-content-type-options").unwrap(),
        "nosniff"
    );
    assert_eq!(resp.text().await.unwrap(), "ok");

    let (body, status) = app.get("/").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "status": "healthy" }));
}

// ── Access ──

#[tokio::test]
async fn wrong_or_missing_key_is_denied() {
    let app = spawn_app().await;

    let resp = app
        .client
        .post(app.url("/webhook?key=nope&action=addNewOrders"))
        .body(order_body("#MLP1", &["EVE-1"]))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    let (body, status) = app.get("/queue").await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "Access Denied");

    let (_, status) = app.get(&format!("/queue?key={KEY}")).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn webhook_without_sheets_reports_not_initialized() {
    let app = spawn_app_with(Options {
        with_sheets: false,
        ..Options::default()
    })
    .await;

    let (body, status) = app
        .post_webhook("addNewOrders", None, &order_body("#MLP1", &["EVE-1"]))
        .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "Google Sheets service not initialized");

    let (body, _) = app.get(&format!("/queue?key={KEY}")).await;
    assert_eq!(body["queue_size"], 0);
}

// ── Webhook intake ──

#[tokio::test]
async fn new_order_is_queued_then_applied() {
    let app = spawn_app().await;

    let (body, status) = app
        .post_webhook("addNewOrders", None, &order_body("#MLP1001", &["EVE-1"]))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "queued");
    assert_eq!(body["message"], "Order #MLP1001 added to queue");
    assert_eq!(body["parked"], false);

    let (queue, _) = app.get(&format!("/queue?key={KEY}")).await;
    assert_eq!(queue["queue_size"], 1);
    assert_eq!(queue["orders"][0]["order_number"], "#MLP1001");

    let report = app.drain().await;
    assert_eq!(report.processed, 1);

    let rows = app.orders(Store::Uk);
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[1][1], "#MLP1001");
    assert_eq!(rows[1][3], "EVE-1");
    assert_eq!(rows[1][10], "15/01/2024");

    let (queue, _) = app.get(&format!("/queue?key={KEY}")).await;
    assert_eq!(queue["queue_size"], 0);
}

#[tokio::test]
async fn store_parameter_selects_sheet() {
    let app = spawn_app().await;

    app.post_webhook("addNewOrders", Some("US"), &order_body("#MLPUS7", &["EVE-1"]))
        .await;
    app.drain().await;

    assert_eq!(app.orders(Store::Us).len(), 2);
    assert_eq!(app.orders(Store::Uk).len(), 1);
}

#[tokio::test]
async fn trailing_commas_are_tolerated() {
    let app = spawn_app().await;

    let body = r##"{
        "order_number": "#MLP55",
        "order_created": "2024-01-01",
        "line_items": [
            {"sku": "EVE-1", "vendor": "Eventuri", "quantity": 1},
        ],
    }"##;
    let (resp, status) = app.post_webhook("addNewOrders", None, body).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(resp["parked"], false);

    app.drain().await;
    assert_eq!(app.orders(Store::Uk)[1][1], "#MLP55");
}

#[tokio::test]
async fn unusable_webhooks_are_parked_not_rejected() {
    let app = spawn_app().await;

    let (body, status) = app.post_webhook("addNewOrders", None, "{not json").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["parked"], true);
    assert!(body["message"]
        .as_str()
        .unwrap()
        .starts_with("Order Unknown queued with error: Invalid JSON"));

    let (body, _) = app
        .post_webhook("archiveOrder", None, &order_body("#MLP9", &["EVE-1"]))
        .await;
    assert_eq!(body["parked"], true);
    assert_eq!(
        body["message"],
        "Order #MLP9 queued with error: Invalid action: archiveOrder"
    );

    let (body, _) = app.post_webhook("addNewOrders", None, "{}").await;
    assert_eq!(body["parked"], true);

    let report = app.drain().await;
    assert_eq!(report.parked, 3);
    assert_eq!(report.processed, 0);

    let (queue, _) = app.get(&format!("/queue?key={KEY}")).await;
    assert_eq!(queue["queue_size"], 3);
    assert_eq!(queue["orders"][0]["raw_data"], "{not json");
    assert_eq!(app.orders(Store::Uk).len(), 1);
}

#[tokio::test]
async fn repeated_order_is_written_once() {
    let app = spawn_app().await;

    let body = order_body("#MLP1001", &["EVE-1"]);
    app.post_webhook("addNewOrders", None, &body).await;
    app.post_webhook("addNewOrders", None, &body).await;

    let report = app.drain().await;
    assert_eq!(report.processed, 2);
    assert_eq!(app.orders(Store::Uk).len(), 2);
}

// ── Retries ──

#[tokio::test]
async fn persistent_failures_end_in_failed_orders() {
    let app = spawn_app().await;
    app.sheets.fail_next(1000);

    app.post_webhook("addNewOrders", None, &order_body("#MLP77", &["EVE-1"]))
        .await;

    for _ in 0..3 {
        let report = app.drain().await;
        assert_eq!(report.failed, 1);
    }

    let (queue, _) = app.get(&format!("/queue?key={KEY}")).await;
    assert_eq!(queue["orders"][0]["retries"], 3);
    assert!(queue["orders"][0]["last_error"].as_str().unwrap().contains("503"));

    let report = app.drain().await;
    assert_eq!(report.dead_lettered, 1);

    let (failed, status) = app.get(&format!("/failed_orders?key={KEY}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(failed["failed_orders_count"], 1);
    assert_eq!(failed["failed_orders"][0]["order_number"], "#MLP77");

    let (queue, _) = app.get(&format!("/queue?key={KEY}")).await;
    assert_eq!(queue["queue_size"], 0);
}

#[tokio::test]
async fn transient_failure_recovers_on_next_drain() {
    let app = spawn_app().await;
    // Two failures exhaust the client's two attempts for the first write.
    app.sheets.fail_next(2);

    app.post_webhook("addNewOrders", None, &order_body("#MLP78", &["EVE-1"]))
        .await;

    assert_eq!(app.drain().await.failed, 1);
    assert_eq!(app.drain().await.processed, 1);
    assert_eq!(app.orders(Store::Uk)[1][1], "#MLP78");
}

// ── Fulfilment ──

#[tokio::test]
async fn fulfilled_items_leave_the_sheet() {
    let app = spawn_app().await;

    app.post_webhook("addNewOrders", None, &order_body("#MLP300", &["EVE-1", "EVE-2"]))
        .await;
    app.drain().await;
    assert_eq!(app.orders(Store::Uk)[1][3], "EVE-1, EVE-2");

    let (body, _) = app
        .post_webhook("removeFulfilledSKU", None, &order_body("#MLP300", &["EVE-1"]))
        .await;
    assert_eq!(body["action"], "remove_fulfilled");

    let (pending, _) = app.get(&format!("/queue_fulfilled?key={KEY}")).await;
    assert_eq!(pending["queue_size"], 1);
    let (orders, _) = app.get(&format!("/queue?key={KEY}")).await;
    assert_eq!(orders["queue_size"], 0);

    app.drain().await;
    let rows = app.orders(Store::Uk);
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[1][3], "EVE-2");

    app.post_webhook("removeFulfilledSKU", None, &order_body("#MLP300", &["EVE-2"]))
        .await;
    app.drain().await;
    assert_eq!(app.orders(Store::Uk).len(), 1);
}

// ── Notifications ──

#[tokio::test]
async fn customer_is_emailed_when_enabled() {
    let app = spawn_app_with(Options {
        notifications: true,
        ..Options::default()
    })
    .await;

    app.post_webhook("addNewOrders", None, &order_body("#MLP400", &["EVE-1"]))
        .await;
    app.drain().await;

    let subjects = app.outbox.subjects();
    assert_eq!(subjects.len(), 1);
    assert!(subjects[0].contains("#MLP400"));

    // A duplicate is not announced twice.
    app.post_webhook("addNewOrders", None, &order_body("#MLP400", &["EVE-1"]))
        .await;
    app.drain().await;
    assert_eq!(app.outbox.subjects().len(), 1);
}

#[tokio::test]
async fn no_email_when_disabled() {
    let app = spawn_app().await;

    app.post_webhook("addNewOrders", None, &order_body("#MLP401", &["EVE-1"]))
        .await;
    app.drain().await;
    assert!(app.outbox.subjects().is_empty());
}

// ── Gmail ETA scan ──

#[tokio::test]
async fn gmail_mentions_update_the_eta_column() {
    let inbox = Inbox {
        messages: vec![
            mention(
                "m1",
                "Alex mentioned you on order #MLPUK12: EVE-88123 is now 2 weeks out",
                "2025-02-03T10:00:00Z",
            ),
            mention("m2", "Lunch on Friday?", "2025-02-03T11:00:00Z"),
        ],
    };
    let app = spawn_app_with(Options {
        mailbox: Some(Arc::new(inbox)),
        ..Options::default()
    })
    .await;

    app.post_webhook("addNewOrders", None, &order_body("#MLPUK12", &["EVE-88123"]))
        .await;
    app.drain().await;

    let (body, status) = app.post(&format!("/gmail-eta-update?key={KEY}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "success");
    assert_eq!(body["message"], "Checked Gmail. Found 1 updates.");
    assert_eq!(body["updates"][0]["order_number"], "MLPUK12");
    assert_eq!(body["updates"][0]["sku"], "88123");
    assert_eq!(body["updates"][0]["exact_eta_date"], "17/02/2025");
    assert_eq!(body["updates"][0]["recorded"], true);

    assert_eq!(app.orders(Store::Uk)[1][10], "17/02/2025");
}

#[tokio::test]
async fn gmail_scan_requires_a_mailbox() {
    let app = spawn_app().await;

    let (body, status) = app.post(&format!("/gmail-eta-update?key={KEY}")).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "Gmail service not initialized");
}

#[tokio::test]
async fn oversized_body_is_rejected() {
    let app = spawn_app().await;

    let big = format!("{{\"order_number\": \"#MLP1\", \"pad\": \"{}\"}}", "x".repeat(70 * 1024));
    let (_, status) = app.post_webhook("addNewOrders", None, &big).await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);

    let (queue, _) = app.get(&format!("/queue?key={KEY}")).await;
    assert_eq!(queue["queue_size"], 0);
}

#[tokio::test]
async fn non_utf8_body_is_parked() {
    let app = spawn_app().await;

    let (body, status) = app
        .post_webhook_bytes("addNewOrders", None, vec![b'{', 0xff, b'}'])
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["parked"], true);
    assert!(body["message"].as_str().unwrap().contains("not valid UTF-8"));

    let (queue, _) = app.get(&format!("/queue?key={KEY}")).await;
    assert_eq!(queue["queue_size"], 1);
    assert_eq!(queue["orders"][0]["order_number"], "Unknown");
}

// ── ETA refresh ──

#[tokio::test]
async fn eta_refresh_is_listed_in_the_queue() {
    let app = spawn_app().await;

    let (body, status) = app
        .post_webhook("checkEtaUpdates", None, &order_body("#MLP500", &["EVE-1"]))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["action"], "refresh_eta");
    assert_eq!(body["parked"], false);

    let (queue, _) = app.get(&format!("/queue?key={KEY}")).await;
    assert_eq!(queue["queue_size"], 1);
    assert_eq!(queue["orders"][0]["action"], "refresh_eta");
    assert_eq!(queue["orders"][0]["order_number"], "#MLP500");

    let (fulfilled, _) = app.get(&format!("/queue_fulfilled?key={KEY}")).await;
    assert_eq!(fulfilled["queue_size"], 0);
}

#[tokio::test]
async fn outdated_eta_is_rewritten_and_customer_told() {
    let app = spawn_app_with(Options {
        notifications: true,
        ..Options::default()
    })
    .await;
    app.sheets.set_sheet(
        "Orders UK",
        vec![
            HEADER.to_vec(),
            vec![
                "2024-01-01", "#MLP500", "", "EVE-1", "Eventuri", "GB", "", "", "", "",
                "Awaiting Update",
            ],
        ],
    );

    app.post_webhook("checkEtaUpdates", None, &order_body("#MLP500", &["EVE-1"]))
        .await;
    let report = app.drain().await;
    assert_eq!(report.processed, 1);

    let rows = app.orders(Store::Uk);
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[1][10], "15/01/2024");

    let subjects = app.outbox.subjects();
    assert_eq!(subjects.len(), 1);
    assert!(subjects[0].starts_with("Order #MLP500 Update"));

    // Already current: nothing to announce.
    app.post_webhook("checkEtaUpdates", None, &order_body("#MLP500", &["EVE-1"]))
        .await;
    app.drain().await;
    assert_eq!(app.outbox.subjects().len(), 1);
}

#[tokio::test]
async fn backup_shipping_note_lands_in_note_column() {
    let app = spawn_app().await;

    let body = json!({
        "order_number": "#MLP510",
        "order_country": "GB",
        "order_created": "2024-01-01T09:00:00Z",
        "backup_shipping_note": "Ship to depot",
        "line_items": [{ "sku": "EVE-1", "vendor": "Eventuri", "title": "Intake", "quantity": 1 }],
    });
    let (resp, status) = app
        .post_webhook("addBackupShippingNote", None, &body.to_string())
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(resp["parked"], false);
    app.drain().await;

    let rows = app.orders(Store::Uk);
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[1][1], "#MLP510");
    assert_eq!(rows[1][12], "Ship to depot");
}
