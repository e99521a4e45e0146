mod common;

use api_lib::web::{router, ACCOUNT_HEADER};
use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use common::{Harness, COLA, RAMYUN};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

fn app(h: &Harness) -> Router {
    router(h.state.clone())
}

fn request(method: Method, uri: &str, account: Option<&str>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(account) = account {
        builder = builder.header(ACCOUNT_HEADER, account);
    }
    match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

async fn send(h: &Harness, req: Request<Body>) -> (StatusCode, Value) {
    let response = app(h).oneshot(req).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

#[tokio::test]
async fn account_routes_require_the_account_header() {
    let h = Harness::new().await;

    let (status, body) = send(&h, request(Method::GET, "/points", None, None)).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error_kind"], "Unauthorized");
}

#[tokio::test]
async fn binding_over_http_returns_the_binding() {
    let h = Harness::new().await;

    let (status, body) = send(
        &h,
        request(Method::POST, "/carts/3/bind", Some("alice"), None),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["cart_id"], "3");
    assert_eq!(body["owner_account_id"], "alice");
    assert_eq!(body["in_use"], true);
}

#[tokio::test]
async fn binding_a_taken_cart_is_a_conflict() {
    let h = Harness::new().await;
    send(&h, request(Method::POST, "/carts/3/bind", Some("alice"), None)).await;

    let (status, body) = send(&h, request(Method::POST, "/carts/3/bind", Some("bob"), None)).await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error_kind"], "AlreadyBound");
}

#[tokio::test]
async fn only_the_owner_may_view_a_cart() {
    let h = Harness::new().await;
    send(&h, request(Method::POST, "/carts/3/bind", Some("alice"), None)).await;

    let (status, _) = send(&h, request(Method::GET, "/carts/3/view", Some("bob"), None)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = send(&h, request(Method::GET, "/carts/3/view", Some("alice"), None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 0);
}

#[tokio::test]
async fn cart_sensors_post_detections_without_an_account() {
    let h = Harness::new().await;
    send(&h, request(Method::POST, "/carts/3/bind", Some("alice"), None)).await;

    let (status, _) = send(
        &h,
        request(
            Method::POST,
            "/carts/3/items",
            None,
            Some(json!({ "barcode": COLA })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (_, view) = send(&h, request(Method::GET, "/carts/3/view", Some("alice"), None)).await;
    assert_eq!(view["lines"][0]["barcode"], COLA);
    assert_eq!(view["lines"][0]["quantity"], 1);
    assert_eq!(view["total"], 1500);
}

#[tokio::test]
async fn unknown_products_are_not_found() {
    let h = Harness::new().await;

    let (status, body) = send(&h, request(Method::GET, "/products/000", None, None)).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error_kind"], "NotFound");

    let (status, body) = send(&h, request(Method::GET, &format!("/products/{}", RAMYUN), None, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["in_stock"], true);
}

#[tokio::test]
async fn preparing_with_too_many_points_is_payment_required() {
    let h = Harness::new().await;
    h.account_with_points("alice", 5).await;

    let (status, body) = send(
        &h,
        request(
            Method::POST,
            "/orders",
            Some("alice"),
            Some(json!({
                "items": [{ "barcode": COLA, "name": "Coca-Cola", "price": 1500, "quantity": 1 }],
                "total": 1500,
                "used_points": 10
            })),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::PAYMENT_REQUIRED);
    assert_eq!(body["error_kind"], "InsufficientPoints");
}

#[tokio::test]
async fn an_order_can_be_prepared_and_confirmed_over_http() {
    let h = Harness::new().await;
    send(&h, request(Method::POST, "/carts/3/bind", Some("alice"), None)).await;

    let (status, order) = send(
        &h,
        request(
            Method::POST,
            "/orders",
            Some("alice"),
            Some(json!({
                "items": [{ "barcode": COLA, "name": "Coca-Cola", "price": 1500, "quantity": 2 }],
                "total": 3000
            })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(order["status"], "pending");
    let order_id = order["order_id"].as_str().unwrap().to_string();

    let (status, confirmed) = send(
        &h,
        request(
            Method::POST,
            &format!("/orders/{}/confirm", order_id),
            Some("alice"),
            Some(json!({ "payment_key": "pk_http", "amount": 3000 })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(confirmed["status"], "completed");

    let (status, _) = send(
        &h,
        request(Method::GET, &format!("/orders/{}", order_id), Some("bob"), None),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
