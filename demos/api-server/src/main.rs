use axum::extract::rejection::JsonRejection;
use axum::routing::{get, post};
use errata::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

#[derive(Clone, Serialize)]
struct Order {
    id: u64,
    sku: String,
}

#[derive(Deserialize)]
struct NewOrder {
    sku: String,
    quantity: u32,
}

#[derive(Clone)]
struct AppState {
    orders: Arc<Vec<Order>>,
    http: reqwest::Client,
    inventory_url: String,
}

async fn show_order(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> Result<ApiResponse<Order>, Exception> {
    state
        .orders
        .iter()
        .find(|order| order.id == id)
        .cloned()
        .map(ApiResponse::success)
        .ok_or_else(|| Exception::model_not_found_for::<Order>().with_ids([id]))
}

async fn create_order(
    payload: Result<Json<NewOrder>, JsonRejection>,
) -> Result<ApiResponse<Order>, Exception> {
    let Json(order) = payload?;

    let mut errors = ValidationErrors::new();
    if order.sku.trim().is_empty() {
        errors.add("sku", "The sku field is required.");
    }
    if order.quantity == 0 {
        errors.add("quantity", "The quantity must be at least 1.");
    }
    if !errors.is_empty() {
        return Err(Exception::validation(errors));
    }

    Ok(ApiResponse::with_status(
        Order {
            id: 3,
            sku: order.sku,
        },
        StatusCode::CREATED,
    ))
}

async fn delete_order(Path(_id): Path<u64>) -> Result<StatusCode, Exception> {
    Err(Exception::authorization("Orders can only be cancelled by their owner."))
}

async fn current_user() -> Result<Json<serde_json::Value>, Exception> {
    Err(Exception::unauthenticated().with_guards(["api"]))
}

async fn stock(
    State(state): State<AppState>,
    Path(sku): Path<String>,
) -> Result<String, Exception> {
    let response = state
        .http
        .get(format!("{}/stock/{sku}", state.inventory_url))
        .send()
        .await?
        .error_for_upstream()
        .await?;
    Ok(response.text().await?)
}

async fn reconcile() -> Result<StatusCode, Exception> {
    let ledger = std::fs::read_to_string("/var/lib/orders/ledger.csv")
        .map_err(|e| anyhow::Error::new(e).context("reading order ledger"))?;
    tracing::info!(bytes = ledger.len(), "ledger reconciled");
    Ok(StatusCode::NO_CONTENT)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let config = TranslatorConfig::from_env()?;
    tracing::info!(debug = config.debug, "Starting api-server");

    let state = AppState {
        orders: Arc::new(vec![
            Order {
                id: 1,
                sku: "TEA-001".to_string(),
            },
            Order {
                id: 2,
                sku: "MUG-014".to_string(),
            },
        ]),
        http: reqwest::Client::new(),
        inventory_url: std::env::var("INVENTORY_URL")
            .unwrap_or_else(|_| "http://127.0.0.1:4000".to_string()),
    };

    let router = Router::new()
        .route("/orders", post(create_order))
        .route("/orders/{id}", get(show_order).delete(delete_order))
        .route("/me", get(current_user))
        .route("/stock/{sku}", get(stock))
        .route("/reconcile", post(reconcile))
        .with_state(state);

    let app = ExceptionLayer::new(HttpExceptionFilter::new(config))
        .attach(router)
        .layer(TraceLayer::new_for_http());

    let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
    let port = std::env::var("PORT").unwrap_or_else(|_| "3000".to_string());
    let addr = format!("{}:{}", host, port);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server running on http://{}", addr);
    axum::serve(listener, app).await?;

    Ok(())
}
