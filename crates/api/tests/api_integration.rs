//! Integration tests for the API server.

use std::sync::OnceLock;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use common::{Actor, CommissionId, CommissionRate, Money, OrderId, ProductId, Role, UserId};
use domain::{BroadcastEventChannel, EventChannel, MarketplaceEvent};
use metrics_exporter_prometheus::PrometheusHandle;
use serde_json::{Value, json};
use store::{
    CatalogStore, DownloadGrant, GrantStore, InMemoryStore, LedgerStore, Product,
    MAX_CART_QUANTITY, SettledOrderItem, VendorAccount,
};
use tower::ServiceExt;

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

fn get_metrics_handle() -> PrometheusHandle {
    METRICS_HANDLE
        .get_or_init(|| {
            let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
            builder
                .install_recorder()
                .expect("failed to install Prometheus recorder")
        })
        .clone()
}

const CUSTOMER: &str = "customer-token";
const VENDOR: &str = "vendor-token";
const ADMIN: &str = "admin-token";

struct TestApp {
    router: Router,
    store: InMemoryStore,
    channel: BroadcastEventChannel,
    customer: Actor,
    vendor: Actor,
}

fn setup() -> TestApp {
    let customer = Actor::customer(UserId::new());
    let vendor = Actor::vendor(UserId::new());
    let admin = Actor::admin(UserId::new());
    let config = api::config::Config {
        tokens: vec![
            (CUSTOMER.to_string(), customer),
            (VENDOR.to_string(), vendor),
            (ADMIN.to_string(), admin),
        ],
        ..Default::default()
    };

    let store = InMemoryStore::new();
    let (state, channel) = api::create_default_state(store.clone(), &config);
    let router = api::create_app(state, get_metrics_handle());
    TestApp {
        router,
        store,
        channel,
        customer,
        vendor,
    }
}

impl TestApp {
    async fn send(
        &self,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {token}"));
        }
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(serde_json::to_vec(&body).unwrap()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, json)
    }

    async fn product(&self, price: i64) -> ProductId {
        let product = Product::new(self.vendor.user_id, "Poster", Money::new(price));
        let id = product.id;
        self.store.upsert_product(product).await.unwrap();
        id
    }
}

#[tokio::test]
async fn test_health_check() {
    let app = setup();
    let (status, json) = app.send("GET", "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let app = setup();
    let response = app
        .router
        .clone()
        .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_missing_or_unknown_token_is_401() {
    let app = setup();

    let (status, json) = app.send("GET", "/cart", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["kind"], "unauthenticated");

    let (status, _) = app.send("GET", "/cart", Some("forged"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_cart_pricing_flow() {
    let app = setup();
    let product_id = app.product(3000).await;

    let (status, line) = app
        .send(
            "POST",
            "/cart/items",
            Some(CUSTOMER),
            Some(json!({ "product_id": product_id, "quantity": 2 })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(line["quantity"], 2);

    let (status, summary) = app.send("GET", "/cart", Some(CUSTOMER), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(summary["subtotal"], 6000);
    assert_eq!(summary["shipping"], 0);
    assert_eq!(summary["tax"], 1080);
    assert_eq!(summary["total"], 7080);

    let uri = format!("/cart/items/{product_id}");
    let (status, _) = app
        .send("PUT", &uri, Some(CUSTOMER), Some(json!({ "quantity": 0 })))
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, summary) = app.send("GET", "/cart", Some(CUSTOMER), None).await;
    assert_eq!(summary["lines"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn test_cart_quantity_limit_is_400() {
    let app = setup();
    let product_id = app.product(3_000_000_000).await;

    let (status, json) = app
        .send(
            "POST",
            "/cart/items",
            Some(CUSTOMER),
            Some(json!({ "product_id": product_id, "quantity": u32::MAX })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["kind"], "validation_failure");

    let (status, _) = app
        .send(
            "POST",
            "/cart/items",
            Some(CUSTOMER),
            Some(json!({ "product_id": product_id, "quantity": MAX_CART_QUANTITY })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, summary) = app.send("GET", "/cart", Some(CUSTOMER), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(summary["subtotal"], 3_000_000_000_i64 * i64::from(MAX_CART_QUANTITY));
}

#[tokio::test]
async fn test_cart_rejects_unknown_product_and_bad_id() {
    let app = setup();

    let (status, json) = app
        .send(
            "POST",
            "/cart/items",
            Some(CUSTOMER),
            Some(json!({ "product_id": ProductId::new(), "quantity": 1 })),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["kind"], "not_found");

    let (status, _) = app
        .send("DELETE", "/cart/items/not-a-uuid", Some(CUSTOMER), None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_wishlist_toggle() {
    let app = setup();
    let product_id = ProductId::new();
    let uri = format!("/wishlist/{product_id}/toggle");

    let (_, first) = app.send("POST", &uri, Some(CUSTOMER), None).await;
    assert_eq!(first["added"], true);
    let (_, list) = app.send("GET", "/wishlist", Some(CUSTOMER), None).await;
    assert_eq!(list.as_array().unwrap().len(), 1);

    let (_, second) = app.send("POST", &uri, Some(CUSTOMER), None).await;
    assert_eq!(second["added"], false);
}

#[tokio::test]
async fn test_commission_lifecycle() {
    let app = setup();

    let (status, created) = app
        .send(
            "POST",
            "/commissions",
            Some(CUSTOMER),
            Some(json!({
                "vendor_id": app.vendor.user_id,
                "title": "Character sheet",
                "budget": 8000
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["status"], "REQUESTED");
    let id = created["id"].as_str().unwrap().to_string();
    let transitions = format!("/commissions/{id}/transitions");
    let mut notifications = app.channel.subscribe();

    // The customer cannot accept on the vendor's behalf.
    let (status, json) = app
        .send("POST", &transitions, Some(CUSTOMER), Some(json!({ "verb": "accept" })))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(json["kind"], "forbidden");

    for verb in ["accept", "start"] {
        let (status, _) = app
            .send("POST", &transitions, Some(VENDOR), Some(json!({ "verb": verb })))
            .await;
        assert_eq!(status, StatusCode::OK);
    }

    let (status, delivered) = app
        .send(
            "POST",
            &transitions,
            Some(VENDOR),
            Some(json!({ "verb": "deliver", "delivery_files": ["sheet.png"], "notes": "v1" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(delivered["status"], "DELIVERED");
    assert_eq!(delivered["delivery_files"][0], "sheet.png");

    let notification = notifications.recv().await.unwrap();
    assert_eq!(notification.target, app.customer.user_id);
    assert_eq!(notification.event.event_type(), "CommissionDelivered");

    let (_, completed) = app
        .send("POST", &transitions, Some(CUSTOMER), Some(json!({ "verb": "accept" })))
        .await;
    assert_eq!(completed["status"], "COMPLETED");

    let (status, json) = app
        .send("POST", &transitions, Some(ADMIN), Some(json!({ "verb": "cancel" })))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["kind"], "invalid_transition");

    let (_, mine) = app.send("GET", "/commissions", Some(VENDOR), None).await;
    assert_eq!(mine.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_admin_override() {
    let app = setup();
    let (_, created) = app
        .send(
            "POST",
            "/commissions",
            Some(CUSTOMER),
            Some(json!({ "vendor_id": app.vendor.user_id, "title": "Logo", "budget": 3000 })),
        )
        .await;
    let uri = format!("/commissions/{}/status", created["id"].as_str().unwrap());

    let (status, _) = app
        .send("PUT", &uri, Some(VENDOR), Some(json!({ "status": "COMPLETED" })))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, updated) = app
        .send(
            "PUT",
            &uri,
            Some(ADMIN),
            Some(json!({ "status": "IN_PROGRESS", "notes": "dispute resolved" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["status"], "IN_PROGRESS");
}

#[tokio::test]
async fn test_download_redeem_until_exhausted() {
    let app = setup();
    let grant = DownloadGrant::new(
        app.customer.user_id,
        ProductId::new(),
        "https://cdn.example.com/font.otf",
        1,
        None,
    );
    let uri = format!("/downloads/{}/redeem", grant.id);
    app.store.insert_grant(grant).await.unwrap();

    let (status, _) = app.send("POST", &uri, Some(VENDOR), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, locator) = app.send("POST", &uri, Some(CUSTOMER), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(locator["url"], "https://cdn.example.com/font.otf");
    assert_eq!(locator["downloads_remaining"], 0);

    let (status, json) = app.send("POST", &uri, Some(CUSTOMER), None).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(json["kind"], "quota_exceeded");

    let (_, grants) = app.send("GET", "/downloads", Some(CUSTOMER), None).await;
    assert_eq!(grants[0]["download_count"], 1);
}

#[tokio::test]
async fn test_expired_grant_is_410() {
    let app = setup();
    let grant = DownloadGrant::new(
        app.customer.user_id,
        ProductId::new(),
        "https://cdn.example.com/old.zip",
        5,
        Some(chrono::Utc::now() - chrono::Duration::days(1)),
    );
    let uri = format!("/downloads/{}/redeem", grant.id);
    app.store.insert_grant(grant).await.unwrap();

    let (status, json) = app.send("POST", &uri, Some(CUSTOMER), None).await;
    assert_eq!(status, StatusCode::GONE);
    assert_eq!(json["kind"], "expired");
}

#[tokio::test]
async fn test_vendor_earnings() {
    let app = setup();
    let vendor_id = app.vendor.user_id;
    app.store
        .upsert_vendor_account(VendorAccount {
            vendor_id,
            commission_rate: CommissionRate::from_percent(15),
            total_sales: Money::new(10000),
        })
        .await
        .unwrap();
    app.store
        .record_settled_item(SettledOrderItem {
            order_id: OrderId::new(),
            product_id: ProductId::new(),
            vendor_id,
            product_name: "Poster".to_string(),
            quantity: 4,
            unit_price: Money::new(2500),
            commission_rate: CommissionRate::from_percent(15),
            settled_at: chrono::Utc::now(),
        })
        .await
        .unwrap();
    let uri = format!("/vendors/{vendor_id}/earnings");

    let (status, summary) = app.send("GET", &uri, Some(VENDOR), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(summary["gross_revenue"], 10000);
    assert_eq!(summary["platform_fee"], 1500);
    assert_eq!(summary["net_earnings"], 8500);

    let (status, _) = app.send("GET", &uri, Some(CUSTOMER), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let rate_uri = format!("/vendors/{vendor_id}/commission-rate");
    let body = json!({ "commission_rate_bps": 1000 });
    let (status, account) = app.send("PUT", &rate_uri, Some(ADMIN), Some(body)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(account["commission_rate"], 1000);

    // Already-settled sales keep the rate they settled at.
    let (_, summary) = app.send("GET", &uri, Some(ADMIN), None).await;
    assert_eq!(summary["commission_rate"], 1000);
    assert_eq!(summary["platform_fee"], 1500);
    assert_eq!(summary["transactions"][0]["commission_rate"], 1500);
}

#[tokio::test]
async fn test_log_notifications_drains_until_closed() {
    let channel = BroadcastEventChannel::default();
    let relay = tokio::spawn(api::log_notifications(channel.subscribe()));

    for _ in 0..2 {
        let event = MarketplaceEvent::CommissionCancelled {
            commission_id: CommissionId::new(),
            title: "Banner".to_string(),
            cancelled_by: Role::Customer,
            occurred_at: chrono::Utc::now(),
        };
        channel.publish(UserId::new(), event).await.unwrap();
    }
    drop(channel);

    assert_eq!(relay.await.unwrap(), 2);
}
