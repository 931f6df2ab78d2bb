//! Order lifecycle endpoints.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::HeaderMap;
use chrono::{DateTime, Utc};
use common::{LineItemId, LocationId, OrderId, UserId};
use domain::{
    CustomerInfo, DiscountSpec, DiscountType, HistoryEntry, Money, Order, OrderStatus,
    PaymentStatus, Quantity, RefundStatus,
};
use order_store::OrderStore;
use reconciliation::{
    CreateOrderRequest, InMemoryCatalog, InMemoryIdentity, InMemoryLocations, LineRequest,
    ReconciliationService,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ApiError;

/// Shared application state accessible from all handlers.
///
/// The lookup collaborators are the in-memory reference implementations;
/// handles are kept so they can be seeded (tests, demo data).
pub struct AppState<S: OrderStore> {
    pub service: ReconciliationService<S, InMemoryCatalog, InMemoryIdentity, InMemoryLocations>,
    pub catalog: InMemoryCatalog,
    pub identity: InMemoryIdentity,
    pub locations: InMemoryLocations,
}

// -- Request types --

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateOrderDto {
    pub customer_name: Option<String>,
    pub customer_phone: Option<String>,
    pub customer_email: Option<String>,
    pub items: Vec<OrderItemDto>,
    pub tax_amount: Option<Money>,
    pub discount_amount: Option<Money>,
    pub order_date: Option<DateTime<Utc>>,
    pub payment_method: Option<String>,
    pub notes: Option<String>,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OrderItemDto {
    pub item_id: Uuid,
    pub quantity: u32,
    /// Price override; catalog price is snapshotted when absent.
    pub unit_price: Option<Money>,
    pub discount_amount: Option<Money>,
    pub discount_percent: Option<u8>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CapturePaymentDto {
    pub amount: Money,
    pub method: String,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChangeStatusDto {
    pub status: OrderStatus,
    pub notes: Option<String>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RefundLineDto {
    pub line_item_id: Uuid,
    pub quantity: u32,
    pub reason: String,
}

// -- Response types --

#[derive(Serialize)]
pub struct OrderResponse {
    pub id: OrderId,
    pub order_number: String,
    pub location_id: LocationId,
    pub business_id: common::BusinessId,
    pub customer_name: Option<String>,
    pub customer_phone: Option<String>,
    pub customer_email: Option<String>,
    pub order_date: DateTime<Utc>,
    pub status: OrderStatus,
    pub subtotal: Money,
    pub tax_amount: Money,
    pub discount_amount: Money,
    pub total_amount: Money,
    pub payment_status: PaymentStatus,
    pub payment_method: Option<String>,
    pub paid_amount: Money,
    pub remaining_amount: Money,
    pub refund_status: Option<RefundStatus>,
    pub refund_reason: Option<String>,
    pub notes: Option<String>,
    pub tags: BTreeMap<String, String>,
    pub items: Vec<OrderItemResponse>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Serialize)]
pub struct OrderItemResponse {
    pub id: LineItemId,
    pub item_id: common::ItemId,
    pub name: String,
    pub quantity: Quantity,
    pub unit_price: Money,
    pub subtotal: Money,
    pub discount_amount: Money,
    pub discount_type: Option<DiscountType>,
    pub returned_quantity: Quantity,
    pub refunded_amount: Money,
}

#[derive(Serialize)]
pub struct HistoryEntryResponse {
    pub id: String,
    pub user_id: UserId,
    pub action: String,
    pub previous_status: Option<OrderStatus>,
    pub new_status: OrderStatus,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<&Order> for OrderResponse {
    fn from(order: &Order) -> Self {
        OrderResponse {
            id: order.id(),
            order_number: order.order_number().to_string(),
            location_id: order.location_id(),
            business_id: order.business_id(),
            customer_name: order.customer().name.clone(),
            customer_phone: order.customer().phone.clone(),
            customer_email: order.customer().email.clone(),
            order_date: order.order_date(),
            status: order.status(),
            subtotal: order.subtotal(),
            tax_amount: order.tax_amount(),
            discount_amount: order.discount_amount(),
            total_amount: order.total_amount(),
            payment_status: order.payment_status(),
            payment_method: order.payment_method().map(String::from),
            paid_amount: order.paid_amount(),
            remaining_amount: order.remaining_amount(),
            refund_status: order.refund_status(),
            refund_reason: order.refund_reason().map(String::from),
            notes: order.notes().map(String::from),
            tags: order.tags().clone(),
            items: order
                .lines()
                .iter()
                .map(|line| OrderItemResponse {
                    id: line.id(),
                    item_id: line.item_id(),
                    name: line.name().to_string(),
                    quantity: line.quantity(),
                    unit_price: line.unit_price(),
                    subtotal: line.subtotal(),
                    discount_amount: line.discount_amount(),
                    discount_type: line.discount_type(),
                    returned_quantity: line.returned_quantity(),
                    refunded_amount: line.refunded_amount(),
                })
                .collect(),
            created_at: order.created_at(),
            updated_at: order.updated_at(),
        }
    }
}

impl From<&HistoryEntry> for HistoryEntryResponse {
    fn from(entry: &HistoryEntry) -> Self {
        HistoryEntryResponse {
            id: entry.id.to_string(),
            user_id: entry.user_id,
            action: entry.action.clone(),
            previous_status: entry.previous_status,
            new_status: entry.new_status,
            notes: entry.notes.clone(),
            created_at: entry.created_at,
        }
    }
}

// -- Handlers --

/// POST /locations/{location_id}/orders — create an order from a cart.
#[tracing::instrument(skip(state, headers, dto))]
pub async fn create<S: OrderStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(location_id): Path<Uuid>,
    headers: HeaderMap,
    Json(dto): Json<CreateOrderDto>,
) -> Result<(axum::http::StatusCode, Json<OrderResponse>), ApiError> {
    let user_id = actor_id(&headers)?;

    let mut lines = Vec::with_capacity(dto.items.len());
    for item in &dto.items {
        let mut line = LineRequest::new(common::ItemId::from_uuid(item.item_id), item.quantity);
        if let Some(price) = item.unit_price {
            line = line.with_price(price);
        }
        match (item.discount_amount, item.discount_percent) {
            (Some(_), Some(_)) => {
                return Err(ApiError::BadRequest(
                    "specify discount_amount or discount_percent, not both".to_string(),
                ));
            }
            (Some(amount), None) => line = line.with_discount(DiscountSpec::Fixed(amount)),
            (None, Some(percent)) => line = line.with_discount(DiscountSpec::Percent(percent)),
            (None, None) => {}
        }
        lines.push(line);
    }

    let request = CreateOrderRequest {
        customer: CustomerInfo {
            name: dto.customer_name,
            phone: dto.customer_phone,
            email: dto.customer_email,
        },
        lines,
        tax_amount: dto.tax_amount.unwrap_or_else(Money::zero),
        discount_amount: dto.discount_amount.unwrap_or_else(Money::zero),
        order_date: dto.order_date,
        payment_method: dto.payment_method,
        notes: dto.notes,
        tags: dto.tags,
    };

    let order = state
        .service
        .create_order(user_id, LocationId::from_uuid(location_id), request)
        .await?;

    Ok((
        axum::http::StatusCode::CREATED,
        Json(OrderResponse::from(&order)),
    ))
}

/// GET /orders/{id} — load an order with its line items.
#[tracing::instrument(skip(state, headers))]
pub async fn get<S: OrderStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<Json<OrderResponse>, ApiError> {
    let user_id = actor_id(&headers)?;
    let order = state
        .service
        .get_order(user_id, OrderId::from_uuid(id))
        .await?;
    Ok(Json(OrderResponse::from(&order)))
}

/// GET /locations/{location_id}/orders — list a location's orders.
#[tracing::instrument(skip(state, headers))]
pub async fn list<S: OrderStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(location_id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<Json<Vec<OrderResponse>>, ApiError> {
    let user_id = actor_id(&headers)?;
    let orders = state
        .service
        .list_orders_by_location(user_id, LocationId::from_uuid(location_id))
        .await?;
    Ok(Json(orders.iter().map(OrderResponse::from).collect()))
}

/// POST /orders/{id}/payments — capture a payment.
#[tracing::instrument(skip(state, headers, dto))]
pub async fn capture_payment<S: OrderStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
    Json(dto): Json<CapturePaymentDto>,
) -> Result<Json<OrderResponse>, ApiError> {
    let user_id = actor_id(&headers)?;
    let order = state
        .service
        .capture_payment(user_id, OrderId::from_uuid(id), dto.amount, &dto.method)
        .await?;
    Ok(Json(OrderResponse::from(&order)))
}

/// POST /orders/{id}/status — move an order along its lifecycle.
#[tracing::instrument(skip(state, headers, dto))]
pub async fn change_status<S: OrderStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
    Json(dto): Json<ChangeStatusDto>,
) -> Result<Json<OrderResponse>, ApiError> {
    let user_id = actor_id(&headers)?;
    let order = state
        .service
        .change_status(user_id, OrderId::from_uuid(id), dto.status, dto.notes)
        .await?;
    Ok(Json(OrderResponse::from(&order)))
}

/// POST /orders/{id}/refunds — record a return on one line.
#[tracing::instrument(skip(state, headers, dto))]
pub async fn refund_line<S: OrderStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
    Json(dto): Json<RefundLineDto>,
) -> Result<Json<OrderResponse>, ApiError> {
    let user_id = actor_id(&headers)?;
    let order = state
        .service
        .refund_line(
            user_id,
            OrderId::from_uuid(id),
            LineItemId::from_uuid(dto.line_item_id),
            Quantity::new(dto.quantity),
            &dto.reason,
        )
        .await?;
    Ok(Json(OrderResponse::from(&order)))
}

/// GET /orders/{id}/history — the order's audit trail.
#[tracing::instrument(skip(state, headers))]
pub async fn history<S: OrderStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<Json<Vec<HistoryEntryResponse>>, ApiError> {
    let user_id = actor_id(&headers)?;
    let entries = state
        .service
        .get_history(user_id, OrderId::from_uuid(id))
        .await?;
    Ok(Json(entries.iter().map(HistoryEntryResponse::from).collect()))
}

/// Extracts the already-authenticated actor from the `x-user-id` header.
fn actor_id(headers: &HeaderMap) -> Result<UserId, ApiError> {
    let raw = headers
        .get("x-user-id")
        .ok_or_else(|| ApiError::BadRequest("missing x-user-id header".to_string()))?
        .to_str()
        .map_err(|_| ApiError::BadRequest("invalid x-user-id header".to_string()))?;
    let uuid = Uuid::parse_str(raw)
        .map_err(|e| ApiError::BadRequest(format!("invalid x-user-id header: {e}")))?;
    Ok(UserId::from_uuid(uuid))
}
