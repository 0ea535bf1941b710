//! Shared fixtures for `shelfsync-api` router tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::body::{to_bytes, Body};
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use shelfsync_api::{build_app_router, AppContext};
use shelfsync_domain::{
    AppConfig, DatabaseConfig, ProxyConfig, ServerConfig, TakealotConfig,
};
use tempfile::TempDir;
use tower::ServiceExt;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const CRON_SECRET: &str = "cron-s3cret";
pub const OFFERS_PATH: &str = "/v2/offers";

/// Router over a fresh database; the temp dir lives as long as the app.
pub struct TestApp {
    pub ctx: Arc<AppContext>,
    pub router: Router,
    _temp_dir: TempDir,
}

impl TestApp {
    /// App whose Takealot client talks to `takealot_base_url` directly.
    pub fn new(takealot_base_url: &str) -> Self {
        let temp_dir = TempDir::new().expect("temp dir should be created");
        let config = AppConfig {
            database: DatabaseConfig {
                path: temp_dir.path().join("api.db").to_string_lossy().into_owned(),
                pool_size: 4,
            },
            takealot: TakealotConfig {
                base_url: takealot_base_url.to_string(),
                request_timeout_secs: 5,
                page_size: 20,
            },
            proxy: ProxyConfig { allow_direct: true, ..ProxyConfig::default() },
            server: ServerConfig { cron_secret: Some(CRON_SECRET.into()), ..ServerConfig::default() },
            ..AppConfig::default()
        };

        let ctx = Arc::new(AppContext::new(config).expect("context should build"));
        let router = build_app_router(ctx.clone());
        Self { ctx, router, _temp_dir: temp_dir }
    }

    /// Send one request and decode the JSON body.
    pub async fn send(
        &self,
        method: Method,
        uri: &str,
        user: Option<&str>,
        bearer: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(user) = user {
            builder = builder.header("x-user-id", user);
        }
        if let Some(token) = bearer {
            builder = builder.header("authorization", format!("Bearer {token}"));
        }
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("request should build");

        let response = self.router.clone().oneshot(request).await.expect("router should respond");
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body should read");
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).expect("body should be JSON")
        };
        (status, json)
    }

    /// Create the user's integration and return its id.
    pub async fn create_integration(&self, user: &str, api_key: &str) -> String {
        let (status, body) = self
            .send(
                Method::POST,
                "/api/v1/takealot/integrations",
                Some(user),
                None,
                Some(json!({ "name": "My store", "apiKey": api_key })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "create failed: {body}");
        body["data"]["id"].as_str().expect("integration id").to_string()
    }
}

/// Serve `total` offers on a single page.
pub async fn mount_offers(server: &MockServer, total: u32) {
    mount_offers_delayed(server, total, Duration::ZERO).await;
}

/// Same single page, answered after `delay`.
pub async fn mount_offers_delayed(server: &MockServer, total: u32, delay: Duration) {
    let offers: Vec<Value> = (1..=total)
        .map(|id| {
            json!({
                "offer_id": id,
                "tsin_id": 50_000 + id,
                "sku": format!("SKU-{id}"),
                "title": format!("Product {id}"),
                "selling_price": 99.0,
                "status": "Buyable",
            })
        })
        .collect();

    Mock::given(method("GET"))
        .and(path(OFFERS_PATH))
        .and(query_param("page_number", "1"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({
                    "offers": offers,
                    "page_summary": { "total": total },
                }))
                .set_delay(delay),
        )
        .mount(server)
        .await;
}
