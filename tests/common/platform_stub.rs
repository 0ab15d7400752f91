//! In-process stand-in for the commerce platform admin API.
//!
//! Serves the authenticated shop endpoints the sync server fetches from,
//! with small fixed feeds. Only [`GOOD_TOKEN`] is accepted; flipping
//! `reject_all` makes every endpoint answer 401, which is how tests
//! simulate revoked credentials.

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use shoplens_sync_server::platform::{CatalogItem, Customer, LineItem, Order, ShopProfile};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::net::TcpListener;

use super::constants::*;

#[derive(Default)]
pub struct PlatformControls {
    /// Authenticated requests seen, across all endpoints.
    pub requests: AtomicUsize,
    /// When set, every endpoint answers 401 regardless of token.
    pub reject_all: AtomicBool,
}

pub struct PlatformStub {
    /// Base URL to hand the sync server as its platform_url.
    pub base_url: String,

    pub controls: Arc<PlatformControls>,

    _shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
}

impl PlatformStub {
    pub async fn spawn() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind platform stub port");
        let port = listener
            .local_addr()
            .expect("Failed to get platform stub address")
            .port();

        let controls = Arc::new(PlatformControls::default());

        let app = Router::new()
            .route("/shops/{domain}/profile", get(get_profile))
            .route("/shops/{domain}/products", get(get_products))
            .route("/shops/{domain}/orders", get(get_orders))
            .route("/shops/{domain}/customers", get(get_customers))
            .with_state(controls.clone());

        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    shutdown_rx.await.ok();
                })
                .await
                .expect("Platform stub failed");
        });

        Self {
            base_url: format!("http://127.0.0.1:{}", port),
            controls,
            _shutdown_tx: Some(shutdown_tx),
        }
    }

    pub fn request_count(&self) -> usize {
        self.controls.requests.load(Ordering::SeqCst)
    }

    pub fn set_reject_all(&self, reject: bool) {
        self.controls.reject_all.store(reject, Ordering::SeqCst);
    }
}

impl Drop for PlatformStub {
    fn drop(&mut self) {
        if let Some(tx) = self._shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

fn check_auth(controls: &PlatformControls, headers: &HeaderMap) -> Result<(), Response> {
    controls.requests.fetch_add(1, Ordering::SeqCst);

    if controls.reject_all.load(Ordering::SeqCst) {
        return Err(StatusCode::UNAUTHORIZED.into_response());
    }

    let expected = format!("Bearer {}", GOOD_TOKEN);
    match headers.get("authorization").and_then(|v| v.to_str().ok()) {
        Some(value) if value == expected => Ok(()),
        _ => Err(StatusCode::UNAUTHORIZED.into_response()),
    }
}

async fn get_profile(
    State(controls): State<Arc<PlatformControls>>,
    Path(domain): Path<String>,
    headers: HeaderMap,
) -> Response {
    if let Err(response) = check_auth(&controls, &headers) {
        return response;
    }

    Json(ShopProfile {
        id: format!("shop-{domain}"),
        name: PROFILE_NAME.to_string(),
        domain,
        email: Some("owner@acme-e2e.example.com".to_string()),
        currency: "EUR".to_string(),
        timezone: Some(PROFILE_TIMEZONE.to_string()),
        plan: Some("advanced".to_string()),
    })
    .into_response()
}

async fn get_products(
    State(controls): State<Arc<PlatformControls>>,
    Path(_domain): Path<String>,
    headers: HeaderMap,
) -> Response {
    if let Err(response) = check_auth(&controls, &headers) {
        return response;
    }

    Json(vec![
        CatalogItem {
            id: "p-1".to_string(),
            title: "Blue enamel mug".to_string(),
            description: Some("Camping mug, 350ml".to_string()),
            product_type: Some("kitchenware".to_string()),
            vendor: Some("Acme".to_string()),
            price: 14.5,
            inventory_quantity: 120,
            tags: vec!["camping".to_string(), "mug".to_string()],
        },
        CatalogItem {
            id: "p-2".to_string(),
            title: "Two person tent".to_string(),
            description: None,
            product_type: Some("tent".to_string()),
            vendor: Some("Acme".to_string()),
            price: 189.0,
            inventory_quantity: 8,
            tags: vec![],
        },
        CatalogItem {
            id: "p-3".to_string(),
            title: "Headlamp".to_string(),
            description: Some("300 lumen, USB-C".to_string()),
            product_type: None,
            vendor: None,
            price: 29.9,
            inventory_quantity: 45,
            tags: vec!["lighting".to_string()],
        },
    ])
    .into_response()
}

async fn get_orders(
    State(controls): State<Arc<PlatformControls>>,
    Path(_domain): Path<String>,
    headers: HeaderMap,
) -> Response {
    if let Err(response) = check_auth(&controls, &headers) {
        return response;
    }

    Json(vec![
        Order {
            id: "o-1".to_string(),
            order_number: 1001,
            total_price: 43.0,
            currency: "EUR".to_string(),
            financial_status: Some("paid".to_string()),
            created_at: "2024-03-02T09:15:00+00:00".to_string(),
            customer_id: Some("c-1".to_string()),
            line_items: vec![
                LineItem {
                    product_id: Some("p-1".to_string()),
                    title: "Blue enamel mug".to_string(),
                    quantity: 2,
                    price: 14.5,
                },
                LineItem {
                    product_id: Some("p-3".to_string()),
                    title: "Headlamp".to_string(),
                    quantity: 1,
                    price: 14.0,
                },
            ],
        },
        Order {
            id: "o-2".to_string(),
            order_number: 1002,
            total_price: 189.0,
            currency: "EUR".to_string(),
            financial_status: Some("pending".to_string()),
            created_at: "2024-03-20T17:40:00+00:00".to_string(),
            customer_id: Some("c-2".to_string()),
            line_items: vec![LineItem {
                product_id: Some("p-2".to_string()),
                title: "Two person tent".to_string(),
                quantity: 1,
                price: 189.0,
            }],
        },
    ])
    .into_response()
}

async fn get_customers(
    State(controls): State<Arc<PlatformControls>>,
    Path(_domain): Path<String>,
    headers: HeaderMap,
) -> Response {
    if let Err(response) = check_auth(&controls, &headers) {
        return response;
    }

    Json(vec![
        Customer {
            id: "c-1".to_string(),
            email: Some("giulia@example.com".to_string()),
            first_name: Some("Giulia".to_string()),
            last_name: Some("Rossi".to_string()),
            orders_count: 4,
            total_spent: 212.4,
            city: Some("Milano".to_string()),
            country: Some("IT".to_string()),
        },
        Customer {
            id: "c-2".to_string(),
            email: None,
            first_name: Some("Sam".to_string()),
            last_name: None,
            orders_count: 1,
            total_spent: 189.0,
            city: None,
            country: Some("NL".to_string()),
        },
    ])
    .into_response()
}
