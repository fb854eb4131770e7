//! Order creation, retrieval, listing and cancellation endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use chrono::{DateTime, Utc};
use common::OrderId;
use domain::{CustomerId, Money, NewOrder, Order, OrderItem, OrderStatus};
use ingestion::{InMemoryDeadLetterQueue, InMemoryQueue};
use order_store::{OrderStore, StatusQuery};
use serde::{Deserialize, Serialize};
use workflow::OrderIntake;

use crate::error::ApiError;

/// Shared application state accessible from all handlers.
pub struct AppState<S: OrderStore> {
    pub intake: OrderIntake<S, InMemoryQueue>,
    pub store: S,
    pub queue: InMemoryQueue,
    pub dead_letters: InMemoryDeadLetterQueue,
}

// -- Request types --

#[derive(Deserialize)]
pub struct CreateOrderRequest {
    pub customer_id: Option<String>,
    pub items: Vec<OrderItemRequest>,
    pub idempotency_key: Option<String>,
}

#[derive(Deserialize)]
pub struct OrderItemRequest {
    pub product_id: String,
    pub quantity: u32,
    pub unit_price_cents: i64,
}

#[derive(Debug, Deserialize)]
pub struct ListParams {
    pub status: Option<String>,
    pub limit: Option<usize>,
}

// -- Response types --

#[derive(Serialize)]
pub struct OrderCreatedResponse {
    pub order_id: String,
    pub status: String,
    pub total_cents: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Serialize)]
pub struct OrderItemResponse {
    pub product_id: String,
    pub quantity: u32,
    pub unit_price_cents: i64,
}

#[derive(Serialize)]
pub struct OrderResponse {
    pub order_id: String,
    pub customer_id: String,
    pub status: String,
    pub items: Vec<OrderItemResponse>,
    pub total_cents: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub payment_reference: Option<String>,
    pub failure_reason: Option<String>,
}

#[derive(Serialize)]
pub struct OrderListResponse {
    pub orders: Vec<OrderResponse>,
    pub count: usize,
}

impl From<Order> for OrderResponse {
    fn from(order: Order) -> Self {
        OrderResponse {
            order_id: order.order_id.to_string(),
            customer_id: order.customer_id.to_string(),
            status: order.status.to_string(),
            items: order
                .items
                .iter()
                .map(|item| OrderItemResponse {
                    product_id: item.product_id.to_string(),
                    quantity: item.quantity,
                    unit_price_cents: item.unit_price.cents(),
                })
                .collect(),
            total_cents: order.total_amount.cents(),
            created_at: order.created_at,
            updated_at: order.updated_at,
            payment_reference: order.payment_reference,
            failure_reason: order.failure_reason,
        }
    }
}

// -- Handlers --

/// POST /orders — accept an order for asynchronous processing.
#[tracing::instrument(skip(state, req))]
pub async fn create<S: OrderStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Json(req): Json<CreateOrderRequest>,
) -> Result<(axum::http::StatusCode, Json<OrderCreatedResponse>), ApiError> {
    let customer_id = if let Some(ref id_str) = req.customer_id {
        let uuid = uuid::Uuid::parse_str(id_str)
            .map_err(|e| ApiError::BadRequest(format!("Invalid customer_id: {e}")))?;
        CustomerId::from_uuid(uuid)
    } else {
        CustomerId::new()
    };

    let items: Vec<OrderItem> = req
        .items
        .iter()
        .map(|item| {
            OrderItem::new(
                item.product_id.as_str(),
                item.quantity,
                Money::from_cents(item.unit_price_cents),
            )
        })
        .collect();

    let mut request = NewOrder::new(customer_id, items);
    if let Some(key) = req.idempotency_key {
        request = request.with_idempotency_key(key);
    }

    let order = state.intake.submit(request).await?;

    let response = OrderCreatedResponse {
        order_id: order.order_id.to_string(),
        status: order.status.to_string(),
        total_cents: order.total_amount.cents(),
        created_at: order.created_at,
    };

    Ok((axum::http::StatusCode::CREATED, Json(response)))
}

/// GET /orders/{id} — load an order by ID.
#[tracing::instrument(skip(state))]
pub async fn get<S: OrderStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order_id = parse_order_id(&id)?;
    let order = state
        .store
        .get(order_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Order {id} not found")))?;

    Ok(Json(order.into()))
}

/// GET /orders — list orders, optionally filtered by status, newest first.
#[tracing::instrument(skip(state))]
pub async fn list<S: OrderStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Query(params): Query<ListParams>,
) -> Result<Json<OrderListResponse>, ApiError> {
    let limit = params.limit.unwrap_or(50).min(100);

    let orders = match params.status.as_deref() {
        Some(status_str) => {
            let status = OrderStatus::parse(status_str).ok_or_else(|| {
                ApiError::BadRequest(format!(
                    "Status must be one of: PENDING, PROCESSING, COMPLETED, FAILED, CANCELLED, got '{status_str}'"
                ))
            })?;
            state
                .store
                .query_by_status(StatusQuery::new(status).with_limit(limit))
                .await?
        }
        None => state.store.list_recent(limit).await?,
    };

    let orders: Vec<OrderResponse> = orders.into_iter().map(Into::into).collect();
    let count = orders.len();

    Ok(Json(OrderListResponse { orders, count }))
}

/// POST /orders/{id}/cancel — cancel an order before payment capture.
#[tracing::instrument(skip(state))]
pub async fn cancel<S: OrderStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order_id = parse_order_id(&id)?;
    let cancelled = state.intake.cancel(order_id).await?;
    Ok(Json(cancelled.into()))
}

fn parse_order_id(id: &str) -> Result<OrderId, ApiError> {
    uuid::Uuid::parse_str(id)
        .map(OrderId::from_uuid)
        .map_err(|e| ApiError::BadRequest(format!("Invalid order id: {e}")))
}
