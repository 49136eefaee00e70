mod common;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

use shop_orders::api;
use shop_orders::auth::Principal;

use common::{buyer, harness, Harness};

const BOUNDARY: &str = "feed-boundary";

fn app(h: &Harness) -> Router {
    api::router(h.state.clone(), 1024 * 1024)
}

fn as_user(builder: axum::http::request::Builder, user: &Principal) -> axum::http::request::Builder {
    let builder = builder.header("x-user-id", user.user_id.to_string());
    let builder = match &user.email {
        Some(email) => builder.header("x-user-email", email.as_str()),
        None => builder,
    };
    builder.header("x-user-supplier", if user.supplier { "true" } else { "false" })
}

fn json_request(method: &str, uri: &str) -> axum::http::request::Builder {
    Request::builder().method(method).uri(uri).header(header::CONTENT_TYPE, "application/json")
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap() };
    (status, body)
}

fn multipart(filename: &str, content: &str) -> (String, Body) {
    let body = format!(
        "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\nContent-Type: application/octet-stream\r\n\r\n{content}\r\n--{BOUNDARY}--\r\n"
    );
    (format!("multipart/form-data; boundary={BOUNDARY}"), Body::from(body))
}

async fn import(h: &Harness, user: &Principal, filename: &str, content: &str) -> (StatusCode, Value) {
    let (content_type, body) = multipart(filename, content);
    let request = as_user(Request::builder().method("POST").uri("/api/v1/import"), user)
        .header(header::CONTENT_TYPE, content_type)
        .body(body)
        .unwrap();
    send(app(h), request).await
}

const FEED: &str = r#"{"shop": {"name": "TechStore"}, "products": [{"name": "Laptop", "category": "Computers", "quantity": 3, "price": "1000.00", "parameters": {"RAM": "16GB"}}]}"#;

#[tokio::test]
async fn health_is_open() {
    let h = harness();
    let (status, body) = send(app(&h), Request::builder().uri("/health").body(Body::empty()).unwrap()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn supplier_import_then_browse_catalog() {
    let h = harness();
    let (status, report) = import(&h, &common::supplier(), "feed.json", FEED).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["created"], 1);
    assert_eq!(report["skipped"], json!([]));

    let (status, catalog) = send(app(&h), Request::builder().uri("/api/v1/catalog").body(Body::empty()).unwrap()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(catalog.as_array().map(Vec::len), Some(1));
    let id = catalog[0]["id"].as_str().unwrap().to_string();
    assert_eq!(catalog[0]["shop"], "TechStore");

    let (status, detail) = send(app(&h), Request::builder().uri(format!("/api/v1/catalog/{id}")).body(Body::empty()).unwrap()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(detail["name"], "Laptop");
    assert_eq!(detail["parameters"]["RAM"], "16GB");

    let (status, body) = send(app(&h), Request::builder().uri(format!("/api/v1/catalog/{}", Uuid::now_v7())).body(Body::empty()).unwrap()).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "not_found");
}

#[tokio::test]
async fn import_rejections() {
    let h = harness();
    let (status, body) = import(&h, &buyer(), "feed.json", FEED).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "forbidden");

    let (status, body) = import(&h, &common::supplier(), "feed.csv", "name\nLaptop\n").await;
    assert_eq!(status, StatusCode::UNSUPPORTED_MEDIA_TYPE);
    assert_eq!(body["error"], "unsupported_format");

    let request = Request::builder().method("POST").uri("/api/v1/import").body(Body::empty()).unwrap();
    let (status, body) = send(app(&h), request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "unauthenticated");
}

#[tokio::test]
async fn cart_to_order_flow() {
    let h = harness();
    import(&h, &common::supplier(), "feed.json", FEED).await;
    let laptop = h.listing("Laptop").await.id;
    let user = buyer();

    let add = |quantity: u32| {
        let body = json!({"product_info": laptop, "quantity": quantity});
        json_request("POST", "/api/v1/cart")
            .header("x-session-key", "sess-42")
            .body(Body::from(body.to_string()))
            .unwrap()
    };
    let (status, body) = send(app(&h), add(0)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation_error");

    let (status, cart) = send(app(&h), add(2)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cart[0]["quantity"], 2);
    assert_eq!(cart[0]["shop"], "TechStore");

    let contact = json!({"type": "address", "value": "Moscow, Arbat 10"});
    let request = as_user(json_request("POST", "/api/v1/contacts"), &user)
        .body(Body::from(contact.to_string()))
        .unwrap();
    let (status, contact) = send(app(&h), request).await;
    assert_eq!(status, StatusCode::CREATED);
    let contact_id = contact["id"].as_str().unwrap().to_string();

    let order = json!({"contact": contact_id});
    let request = as_user(json_request("POST", "/api/v1/orders"), &user)
        .header("x-session-key", "sess-42")
        .body(Body::from(order.to_string()))
        .unwrap();
    let (status, created) = send(app(&h), request).await;
    assert_eq!(status, StatusCode::CREATED);
    assert!(created["order_id"].is_string());

    let request = Request::builder().uri("/api/v1/cart").header("x-session-key", "sess-42").body(Body::empty()).unwrap();
    let (_, cart) = send(app(&h), request).await;
    assert_eq!(cart, json!([]));

    let request = as_user(Request::builder().uri("/api/v1/orders"), &user).body(Body::empty()).unwrap();
    let (status, orders) = send(app(&h), request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(orders[0]["status"], "new");
    assert_eq!(orders[0]["items"][0]["quantity"], 2);
    assert_eq!(h.stock(laptop).await, 1);
}

#[tokio::test]
async fn oversized_order_reports_available_stock() {
    let h = harness();
    import(&h, &common::supplier(), "feed.json", FEED).await;
    let laptop = h.listing("Laptop").await.id;
    let user = buyer();
    let contact = h.contact_for(&user).await;

    let order = json!({"contact": contact, "items": [{"product_info": laptop, "quantity": 5}]});
    let request = as_user(json_request("POST", "/api/v1/orders"), &user)
        .body(Body::from(order.to_string()))
        .unwrap();
    let (status, body) = send(app(&h), request).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "insufficient_stock");
    assert_eq!(body["product_info"], laptop.to_string());
    assert_eq!(body["available"], 3);
}

#[tokio::test]
async fn malformed_session_header_rejects_the_order() {
    let h = harness();
    import(&h, &common::supplier(), "feed.json", FEED).await;
    let laptop = h.listing("Laptop").await.id;
    let user = buyer();
    let contact = h.contact_for(&user).await;

    let order = json!({"contact": contact, "items": [{"product_info": laptop, "quantity": 1}]});
    let request = as_user(json_request("POST", "/api/v1/orders"), &user)
        .header("x-session-key", "s".repeat(200))
        .body(Body::from(order.to_string()))
        .unwrap();
    let (status, body) = send(app(&h), request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation_error");
    assert_eq!(h.stock(laptop).await, 3);
    assert!(h.state.orders.orders_for(&user).await.unwrap().is_empty());
}

#[tokio::test]
async fn contacts_are_scoped_to_the_caller() {
    let h = harness();
    let owner = buyer();
    let other = buyer();
    let contact = h.contact_for(&owner).await;

    let request = as_user(Request::builder().uri(format!("/api/v1/contacts/{contact}")), &other).body(Body::empty()).unwrap();
    let (status, _) = send(app(&h), request).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let request = as_user(Request::builder().method("DELETE").uri(format!("/api/v1/contacts/{contact}")), &owner)
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(app(&h), request).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let request = as_user(Request::builder().uri("/api/v1/contacts"), &owner).body(Body::empty()).unwrap();
    let (_, list) = send(app(&h), request).await;
    assert_eq!(list, json!([]));
}
