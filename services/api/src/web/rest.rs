//! services/api/src/web/rest.rs
//!
//! Contains the router, the cart and catalog handlers, and the master
//! definition for the OpenAPI specification.

use crate::error::{ApiError, ErrorBody};
use crate::web::{
    dto::{
        BindingDto, CartItemDto, CartLineDto, CartLocationDto, CartViewDto, DetectionRequest,
        LocationRequest, ProductDto, QuantityDto, SetQuantityRequest,
    },
    middleware::{require_account, Caller},
    orders, points,
    state::AppState,
    ws_handler::ws_handler,
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    middleware as axum_middleware,
    response::Json,
    routing::{delete, get, post},
    Extension, Router,
};
use std::sync::Arc;
use utoipa::OpenApi;

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        bind_cart_handler,
        release_cart_handler,
        update_location_handler,
        view_cart_handler,
        set_quantity_handler,
        remove_item_handler,
        record_detection_handler,
        product_handler,
        points::balance_handler,
        points::history_handler,
        points::accrue_distance_handler,
        points::check_location_handler,
        orders::prepare_order_handler,
        orders::list_orders_handler,
        orders::get_order_handler,
        orders::confirm_order_handler,
        orders::cancel_payment_handler,
    ),
    components(
        schemas(
            ErrorBody, BindingDto, CartLocationDto, CartViewDto, CartLineDto, CartItemDto,
            QuantityDto, ProductDto, LocationRequest, SetQuantityRequest, DetectionRequest,
        )
    ),
    tags(
        (name = "carts", description = "Cart binding and the live cart contents."),
        (name = "points", description = "Loyalty point balance and accrual."),
        (name = "orders", description = "Order preparation and payment confirmation.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// Router
//=========================================================================================

/// Builds every API route. Cart devices post detections and look up products
/// without an account; everything else requires the `x-account-id` header.
pub fn router(state: Arc<AppState>) -> Router {
    let device_routes = Router::new()
        .route("/carts/{cart_id}/items", post(record_detection_handler))
        .route("/products/{barcode}", get(product_handler));

    let protected_routes = Router::new()
        .route("/carts/location", post(update_location_handler))
        .route("/carts/{cart_id}/bind", post(bind_cart_handler))
        .route("/carts/{cart_id}/release", post(release_cart_handler))
        .route("/carts/{cart_id}/view", get(view_cart_handler))
        .route(
            "/carts/{cart_id}/items/{barcode}",
            delete(remove_item_handler).put(set_quantity_handler),
        )
        .route("/points", get(points::balance_handler))
        .route("/points/history", get(points::history_handler))
        .route("/points/distance", post(points::accrue_distance_handler))
        .route("/points/location", post(points::check_location_handler))
        .route(
            "/orders",
            post(orders::prepare_order_handler).get(orders::list_orders_handler),
        )
        .route("/orders/{order_id}", get(orders::get_order_handler))
        .route("/orders/{order_id}/confirm", post(orders::confirm_order_handler))
        .route("/payments/cancel", post(orders::cancel_payment_handler))
        .route("/ws", get(ws_handler))
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            require_account,
        ));

    Router::new()
        .merge(device_routes)
        .merge(protected_routes)
        .with_state(state)
}

/// Rejects callers that do not currently own `cart_id`.
async fn ensure_owner(state: &AppState, caller: &Caller, cart_id: &str) -> Result<(), ApiError> {
    let binding = state.sessions.binding(cart_id).await?;
    if binding.owner_account_id.as_deref() != Some(caller.0.as_str()) {
        return Err(ApiError::Forbidden(format!(
            "cart {} is not bound to this account",
            cart_id
        )));
    }
    Ok(())
}

//=========================================================================================
// Cart Handlers
//=========================================================================================

/// Bind a cart to the calling account.
#[utoipa::path(
    post,
    path = "/carts/{cart_id}/bind",
    tag = "carts",
    params(
        ("cart_id" = String, Path, description = "The code printed on the cart."),
        ("x-account-id" = String, Header, description = "The calling account.")
    ),
    responses(
        (status = 200, description = "Cart bound", body = BindingDto),
        (status = 400, description = "Account already holds another cart", body = ErrorBody),
        (status = 404, description = "Cart does not exist", body = ErrorBody),
        (status = 409, description = "Cart is in use by another account", body = ErrorBody)
    )
)]
pub async fn bind_cart_handler(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    Path(cart_id): Path<String>,
) -> Result<Json<BindingDto>, ApiError> {
    let binding = state.sessions.bind_cart(&caller.0, &cart_id).await?;
    Ok(Json(binding.into()))
}

/// Release the caller's cart. Its items are cleared.
#[utoipa::path(
    post,
    path = "/carts/{cart_id}/release",
    tag = "carts",
    params(
        ("cart_id" = String, Path, description = "The code printed on the cart."),
        ("x-account-id" = String, Header, description = "The calling account.")
    ),
    responses(
        (status = 200, description = "Cart released", body = BindingDto),
        (status = 403, description = "Cart is not bound to the caller", body = ErrorBody),
        (status = 404, description = "Cart does not exist", body = ErrorBody)
    )
)]
pub async fn release_cart_handler(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    Path(cart_id): Path<String>,
) -> Result<Json<BindingDto>, ApiError> {
    ensure_owner(&state, &caller, &cart_id).await?;
    let binding = state.sessions.release_cart(&cart_id).await?;
    Ok(Json(binding.into()))
}

/// Record the position of the caller's bound cart.
#[utoipa::path(
    post,
    path = "/carts/location",
    tag = "carts",
    request_body = LocationRequest,
    params(("x-account-id" = String, Header, description = "The calling account.")),
    responses(
        (status = 200, description = "Location stored", body = CartLocationDto),
        (status = 400, description = "No cart bound or invalid coordinates", body = ErrorBody)
    )
)]
pub async fn update_location_handler(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    Json(request): Json<LocationRequest>,
) -> Result<Json<CartLocationDto>, ApiError> {
    let location = state
        .sessions
        .update_location(&caller.0, request.x, request.y)
        .await?;
    Ok(Json(location.into()))
}

/// The priced contents of the caller's cart.
#[utoipa::path(
    get,
    path = "/carts/{cart_id}/view",
    tag = "carts",
    params(
        ("cart_id" = String, Path, description = "The code printed on the cart."),
        ("x-account-id" = String, Header, description = "The calling account.")
    ),
    responses(
        (status = 200, description = "Priced cart view", body = CartViewDto),
        (status = 403, description = "Cart is not bound to the caller", body = ErrorBody)
    )
)]
pub async fn view_cart_handler(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    Path(cart_id): Path<String>,
) -> Result<Json<CartViewDto>, ApiError> {
    ensure_owner(&state, &caller, &cart_id).await?;
    let view = state.inventory.view(&cart_id).await?;
    Ok(Json(view.into()))
}

/// Change the quantity of an item already in the cart.
#[utoipa::path(
    put,
    path = "/carts/{cart_id}/items/{barcode}",
    tag = "carts",
    request_body = SetQuantityRequest,
    params(
        ("cart_id" = String, Path, description = "The code printed on the cart."),
        ("barcode" = String, Path, description = "The item's barcode."),
        ("x-account-id" = String, Header, description = "The calling account.")
    ),
    responses(
        (status = 200, description = "Quantity stored (clamped to at least 1)", body = QuantityDto),
        (status = 403, description = "Cart is not bound to the caller", body = ErrorBody),
        (status = 404, description = "Item is not in the cart", body = ErrorBody)
    )
)]
pub async fn set_quantity_handler(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    Path((cart_id, barcode)): Path<(String, String)>,
    Json(request): Json<SetQuantityRequest>,
) -> Result<Json<QuantityDto>, ApiError> {
    ensure_owner(&state, &caller, &cart_id).await?;
    let quantity = state
        .inventory
        .set_quantity(&cart_id, &barcode, request.quantity)
        .await?;
    Ok(Json(QuantityDto {
        cart_id,
        barcode,
        quantity,
    }))
}

/// Take an item out of the cart.
#[utoipa::path(
    delete,
    path = "/carts/{cart_id}/items/{barcode}",
    tag = "carts",
    params(
        ("cart_id" = String, Path, description = "The code printed on the cart."),
        ("barcode" = String, Path, description = "The item's barcode."),
        ("x-account-id" = String, Header, description = "The calling account.")
    ),
    responses(
        (status = 204, description = "Item removed (or was not there)"),
        (status = 403, description = "Cart is not bound to the caller", body = ErrorBody)
    )
)]
pub async fn remove_item_handler(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    Path((cart_id, barcode)): Path<(String, String)>,
) -> Result<StatusCode, ApiError> {
    ensure_owner(&state, &caller, &cart_id).await?;
    state.inventory.remove_item(&cart_id, &barcode).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Sensor ingest: a cart reports a product placed in its basket.
#[utoipa::path(
    post,
    path = "/carts/{cart_id}/items",
    tag = "carts",
    request_body = DetectionRequest,
    params(("cart_id" = String, Path, description = "The reporting cart.")),
    responses(
        (status = 201, description = "Item recorded", body = CartItemDto),
        (status = 400, description = "Product is out of stock", body = ErrorBody),
        (status = 404, description = "Cart or product does not exist", body = ErrorBody)
    )
)]
pub async fn record_detection_handler(
    State(state): State<Arc<AppState>>,
    Path(cart_id): Path<String>,
    Json(request): Json<DetectionRequest>,
) -> Result<(StatusCode, Json<CartItemDto>), ApiError> {
    let item = state
        .inventory
        .record_detection(&cart_id, &request.barcode, request.quantity)
        .await?;
    Ok((StatusCode::CREATED, Json(item.into())))
}

//=========================================================================================
// Catalog Handlers
//=========================================================================================

/// Look up a product by barcode.
#[utoipa::path(
    get,
    path = "/products/{barcode}",
    tag = "carts",
    params(("barcode" = String, Path, description = "The product's barcode.")),
    responses(
        (status = 200, description = "The product", body = ProductDto),
        (status = 404, description = "Unknown barcode", body = ErrorBody)
    )
)]
pub async fn product_handler(
    State(state): State<Arc<AppState>>,
    Path(barcode): Path<String>,
) -> Result<Json<ProductDto>, ApiError> {
    let product = state.inventory.product(&barcode).await?;
    Ok(Json(product.into()))
}
