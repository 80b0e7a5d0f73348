//! Order notification tests against mock Shopify/EditionGuard servers.

use httpmock::prelude::*;
use serde_json::json;

use ebook_drm_sync::config::Config;
use ebook_drm_sync::editionguard::EditionGuardClient;
use ebook_drm_sync::notify::notify_orders;
use ebook_drm_sync::shopify::ShopifyClient;

fn test_config() -> Config {
    Config {
        shop_name: "testshop".into(),
        shopify_token: "shpat_test".into(),
        editionguard_api_key: "eg_test".into(),
        aws_access_key: None,
        aws_secret_key: None,
        s3_bucket: "press-ebooks".into(),
        s3_region: "eu-west-1".into(),
        s3_prefix: "ebooks".into(),
        local_ebooks_dir: "/tmp/ebooks".into(),
        http_timeout_secs: 5,
    }
}

fn clients(server: &MockServer) -> (ShopifyClient, EditionGuardClient) {
    let cfg = test_config();
    let catalog = ShopifyClient::new(&cfg)
        .expect("shopify client")
        .with_base_url(&server.base_url());
    let drm = EditionGuardClient::new(&cfg)
        .expect("editionguard client")
        .with_base_url(&server.base_url());
    (catalog, drm)
}

fn order_json(name: &str, email: &str, line_items: serde_json::Value) -> serde_json::Value {
    json!({
        "name": name,
        "customer": { "email": email },
        "line_items": line_items,
    })
}

#[tokio::test]
async fn missing_order_is_logged_and_loop_continues() {
    let server = MockServer::start_async().await;

    server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/orders.json")
                .query_param("name", "#1001")
                .query_param("status", "any");
            then.status(200).json_body(json!({ "orders": [] }));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/orders.json")
                .query_param("name", "#1002");
            then.status(200).json_body(json!({
                "orders": [order_json(
                    "#1002",
                    "buyer@example.com",
                    json!([
                        { "title": "Ethics of AI", "variant_title": "eBook", "product_id": 42 },
                        { "title": "Ethics of AI", "variant_title": "Hardback", "product_id": 42 },
                    ]),
                )]
            }));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/products/42/metafields.json");
            then.status(200).json_body(json!({
                "metafields": [{
                    "namespace": "editionguard",
                    "key": "resource_id",
                    "value": "res-abc",
                }]
            }));
        })
        .await;
    let deliver = server
        .mock_async(|when, then| {
            when.method(POST).path("/deliver-book-link").json_body(json!({
                "resource_id": "res-abc",
                "email": "buyer@example.com",
            }));
            then.status(200).json_body(json!({ "status": "ok" }));
        })
        .await;

    let (catalog, drm) = clients(&server);
    let names = vec!["#1001".to_string(), "#1002".to_string()];
    let summary = notify_orders(&catalog, &drm, &names).await.expect("notify");

    assert_eq!(summary.orders_missing, 1);
    assert_eq!(summary.orders_processed, 1);
    assert_eq!(summary.emails_sent, 1, "only the eBook line item is delivered");
    assert_eq!(deliver.hits_async().await, 1);
}

#[tokio::test]
async fn variant_title_match_is_exact_not_substring() {
    let server = MockServer::start_async().await;

    server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/orders.json")
                .query_param("name", "#1003");
            then.status(200).json_body(json!({
                "orders": [order_json(
                    "#1003",
                    "buyer@example.com",
                    json!([
                        { "title": "Ethics of AI", "variant_title": "eBook Bundle", "product_id": 42 },
                    ]),
                )]
            }));
        })
        .await;
    let deliver = server
        .mock_async(|when, then| {
            when.method(POST).path("/deliver-book-link");
            then.status(200).json_body(json!({ "status": "ok" }));
        })
        .await;

    let (catalog, drm) = clients(&server);
    let summary = notify_orders(&catalog, &drm, &["#1003".to_string()])
        .await
        .expect("notify");

    assert_eq!(summary.emails_sent, 0);
    assert_eq!(deliver.hits_async().await, 0, "\"eBook Bundle\" must not match");
}

#[tokio::test]
async fn line_item_without_stored_resource_is_skipped() {
    let server = MockServer::start_async().await;

    server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/orders.json")
                .query_param("name", "#1004");
            then.status(200).json_body(json!({
                "orders": [order_json(
                    "#1004",
                    "buyer@example.com",
                    json!([
                        { "title": "Unregistered Title", "variant_title": "eBook", "product_id": 99 },
                    ]),
                )]
            }));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/products/99/metafields.json");
            then.status(200).json_body(json!({ "metafields": [] }));
        })
        .await;
    let deliver = server
        .mock_async(|when, then| {
            when.method(POST).path("/deliver-book-link");
            then.status(200).json_body(json!({ "status": "ok" }));
        })
        .await;

    let (catalog, drm) = clients(&server);
    let summary = notify_orders(&catalog, &drm, &["#1004".to_string()])
        .await
        .expect("notify");

    assert_eq!(summary.items_skipped, 1);
    assert_eq!(summary.emails_sent, 0);
    assert_eq!(deliver.hits_async().await, 0, "no partial notification");
}

#[tokio::test]
async fn delivery_failure_does_not_abort_remaining_orders() {
    let server = MockServer::start_async().await;

    for name in ["#1005", "#1006"] {
        server
            .mock_async(|when, then| {
                when.method(GET).path("/orders.json").query_param("name", name);
                then.status(200).json_body(json!({
                    "orders": [order_json(
                        name,
                        "buyer@example.com",
                        json!([
                            { "title": "Ethics of AI", "variant_title": "eBook", "product_id": 42 },
                        ]),
                    )]
                }));
            })
            .await;
    }
    server
        .mock_async(|when, then| {
            when.method(GET).path("/products/42/metafields.json");
            then.status(200).json_body(json!({
                "metafields": [{
                    "namespace": "editionguard",
                    "key": "resource_id",
                    "value": "res-abc",
                }]
            }));
        })
        .await;
    let deliver = server
        .mock_async(|when, then| {
            when.method(POST).path("/deliver-book-link");
            then.status(500).body("mail backend down");
        })
        .await;

    let (catalog, drm) = clients(&server);
    let names = vec!["#1005".to_string(), "#1006".to_string()];
    let summary = notify_orders(&catalog, &drm, &names).await.expect("notify");

    assert_eq!(summary.orders_processed, 2, "second order still processed");
    assert_eq!(summary.send_failures, 2);
    assert_eq!(summary.emails_sent, 0);
    assert_eq!(deliver.hits_async().await, 2);
}
