//! services/api/src/web/orders.rs
//!
//! Handlers for order preparation, payment confirmation, and cancellation.

use crate::error::{ApiError, ErrorBody};
use crate::web::{
    dto::{
        CancelPaymentRequest, CancelReceiptDto, ConfirmPaymentRequest, OrderDto,
        PrepareOrderRequest,
    },
    middleware::Caller,
    state::AppState,
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    Extension,
};
use smart_cart_core::services::{PaymentConfirmation, PrepareOrder};
use std::sync::Arc;

/// Create a pending order from the checkout screen.
#[utoipa::path(
    post,
    path = "/orders",
    tag = "orders",
    request_body = PrepareOrderRequest,
    params(("x-account-id" = String, Header, description = "The calling account.")),
    responses(
        (status = 201, description = "Pending order created", body = OrderDto),
        (status = 400, description = "Invalid items or discount", body = ErrorBody),
        (status = 402, description = "Not enough points", body = ErrorBody)
    )
)]
pub async fn prepare_order_handler(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    Json(request): Json<PrepareOrderRequest>,
) -> Result<(StatusCode, Json<OrderDto>), ApiError> {
    let order = state
        .orders
        .prepare(
            &caller.0,
            PrepareOrder {
                items: request.items.into_iter().map(Into::into).collect(),
                total: request.total,
                used_points: request.used_points,
            },
        )
        .await?;
    Ok((StatusCode::CREATED, Json(order.into())))
}

/// The caller's orders, newest first.
#[utoipa::path(
    get,
    path = "/orders",
    tag = "orders",
    params(("x-account-id" = String, Header, description = "The calling account.")),
    responses((status = 200, description = "Order history", body = [OrderDto]))
)]
pub async fn list_orders_handler(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
) -> Result<Json<Vec<OrderDto>>, ApiError> {
    let orders = state.orders.orders(&caller.0).await?;
    Ok(Json(orders.into_iter().map(OrderDto::from).collect()))
}

#[utoipa::path(
    get,
    path = "/orders/{order_id}",
    tag = "orders",
    params(
        ("order_id" = String, Path, description = "The order id."),
        ("x-account-id" = String, Header, description = "The calling account.")
    ),
    responses(
        (status = 200, description = "The order", body = OrderDto),
        (status = 404, description = "No such order for this account", body = ErrorBody)
    )
)]
pub async fn get_order_handler(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    Path(order_id): Path<String>,
) -> Result<Json<OrderDto>, ApiError> {
    let order = state.orders.order(&caller.0, &order_id).await?;
    Ok(Json(order.into()))
}

/// Confirm payment with the gateway. Safe to retry.
#[utoipa::path(
    post,
    path = "/orders/{order_id}/confirm",
    tag = "orders",
    request_body = ConfirmPaymentRequest,
    params(
        ("order_id" = String, Path, description = "The order id."),
        ("x-account-id" = String, Header, description = "The calling account.")
    ),
    responses(
        (status = 200, description = "Order completed", body = OrderDto),
        (status = 400, description = "Amount mismatch or missing payment key", body = ErrorBody),
        (status = 404, description = "No such order for this account", body = ErrorBody),
        (status = 502, description = "Payment rejected by the gateway", body = ErrorBody),
        (status = 500, description = "Paid, but a follow-up step failed", body = ErrorBody)
    )
)]
pub async fn confirm_order_handler(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    Path(order_id): Path<String>,
    Json(request): Json<ConfirmPaymentRequest>,
) -> Result<Json<OrderDto>, ApiError> {
    let order = state
        .orders
        .confirm(
            &caller.0,
            &order_id,
            PaymentConfirmation {
                payment_key: request.payment_key,
                amount: request.amount,
            },
        )
        .await?;
    Ok(Json(order.into()))
}

/// Cancel a payment at the gateway. Stock and points are not restored.
#[utoipa::path(
    post,
    path = "/payments/cancel",
    tag = "orders",
    request_body = CancelPaymentRequest,
    params(("x-account-id" = String, Header, description = "The calling account.")),
    responses(
        (status = 200, description = "Cancellation accepted", body = CancelReceiptDto),
        (status = 400, description = "Missing payment key or reason", body = ErrorBody),
        (status = 502, description = "Cancellation rejected by the gateway", body = ErrorBody)
    )
)]
pub async fn cancel_payment_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CancelPaymentRequest>,
) -> Result<Json<CancelReceiptDto>, ApiError> {
    let receipt = state
        .orders
        .cancel(&request.payment_key, &request.cancel_reason)
        .await?;
    Ok(Json(receipt.into()))
}
