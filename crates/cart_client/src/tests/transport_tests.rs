use std::{collections::BTreeMap, sync::Arc};

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::post,
    Json, Router,
};
use cart_shared::{error::FailureKind, protocol::SaveResponse};
use serde_json::{json, Value};
use tokio::{net::TcpListener, sync::Mutex};

use super::*;
use crate::page::InputElement;

#[derive(Debug, Clone)]
struct CapturedRequest {
    csrf_token: Option<String>,
    content_type: Option<String>,
    body: Value,
}

#[derive(Clone)]
struct CartServerState {
    captured: Arc<Mutex<Vec<CapturedRequest>>>,
    status: StatusCode,
    reply: Value,
}

async fn handle_save(
    State(state): State<CartServerState>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };
    state.captured.lock().await.push(CapturedRequest {
        csrf_token: header("x-csrftoken"),
        content_type: header("content-type"),
        body,
    });
    (state.status, Json(state.reply.clone()))
}

async fn spawn_cart_server(
    status: StatusCode,
    reply: Value,
) -> anyhow::Result<(String, Arc<Mutex<Vec<CapturedRequest>>>)> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let captured = Arc::new(Mutex::new(Vec::new()));
    let state = CartServerState {
        captured: captured.clone(),
        status,
        reply,
    };
    let app = Router::new()
        .route("/admin/api/save-cart-option/", post(handle_save))
        .route("/shop/cart/update-multiple/", post(handle_save))
        .with_state(state);
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    Ok((format!("http://{addr}"), captured))
}

fn page_with_quantity(value: &str) -> Arc<MemoryPage> {
    let mut attributes = BTreeMap::new();
    attributes.insert("data-option-id".to_string(), "31".to_string());
    attributes.insert("data-max-stock".to_string(), "6".to_string());
    attributes.insert("data-price-krw".to_string(), "15000".to_string());
    Arc::new(MemoryPage::new(PageSnapshot {
        cookie: Some("csrftoken=abc%3D%3D; lang=ko".into()),
        total_display: Some(String::new()),
        save_button: Some(SaveButton::enabled("Save all")),
        inputs: vec![InputElement {
            attributes,
            value: value.to_string(),
            row_cells: Vec::new(),
            container: None,
            border: Border::Plain,
        }],
        ..PageSnapshot::default()
    }))
}

#[tokio::test]
async fn http_transport_posts_json_with_csrf_header() {
    let (server_url, captured) = spawn_cart_server(StatusCode::OK, json!({"success": true}))
        .await
        .expect("spawn server");
    let transport = HttpTransport::new(&server_url).expect("transport");

    let response = transport
        .post_json(
            "/admin/api/save-cart-option/",
            "tok",
            &json!({"cart_option_id": "1", "quantity": 2}),
        )
        .await
        .expect("post");

    assert_eq!(response, SaveResponse::ok());
    let captured = captured.lock().await;
    assert_eq!(captured.len(), 1);
    assert_eq!(captured[0].csrf_token.as_deref(), Some("tok"));
    assert!(captured[0]
        .content_type
        .as_deref()
        .is_some_and(|ct| ct.starts_with("application/json")));
    assert_eq!(captured[0].body, json!({"cart_option_id": "1", "quantity": 2}));
}

#[tokio::test]
async fn http_transport_reports_non_success_status() {
    let (server_url, _captured) =
        spawn_cart_server(StatusCode::FORBIDDEN, json!({"detail": "CSRF failed"}))
            .await
            .expect("spawn server");
    let transport = HttpTransport::new(&server_url).expect("transport");

    let err = transport
        .post_json("/admin/api/save-cart-option/", "", &json!({}))
        .await
        .expect_err("forbidden");

    assert!(matches!(err, TransportError::Status(StatusCode::FORBIDDEN)));
}

#[tokio::test]
async fn unreachable_server_is_a_request_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    drop(listener);
    let transport = HttpTransport::new(&format!("http://{addr}")).expect("transport");

    let err = transport
        .post_json("/admin/api/save-cart-option/", "", &json!({}))
        .await
        .expect_err("connection refused");

    assert!(matches!(err, TransportError::Request(_)));
}

#[test]
fn invalid_base_url_is_rejected_up_front() {
    assert!(HttpTransport::new("not a url").is_err());
}

#[tokio::test]
async fn save_all_round_trips_through_http() {
    let (server_url, captured) = spawn_cart_server(StatusCode::OK, json!({"success": true}))
        .await
        .expect("spawn server");
    let page = page_with_quantity("4");
    let transport = Arc::new(HttpTransport::new(&server_url).expect("transport"));
    let reconciler = CartReconciler::attach(
        page.clone(),
        transport,
        ReconcilerConfig::admin_cart_option(),
    );
    assert_eq!(page.total_text(&Scope::Page).as_deref(), Some("Total: ₩60,000"));

    assert_eq!(reconciler.save_all().await, SaveOutcome::Saved);

    let captured = captured.lock().await;
    assert_eq!(captured[0].csrf_token.as_deref(), Some("abc=="));
    assert_eq!(
        captured[0].body,
        json!({"items": [{"cart_option_id": "31", "quantity": 4}]})
    );
    assert_eq!(page.reload_count(), 1);
}

#[tokio::test]
async fn server_rejection_over_http_keeps_page_interactive() {
    let (server_url, _captured) = spawn_cart_server(
        StatusCode::OK,
        json!({"success": false, "error": "stock exceeded"}),
    )
    .await
    .expect("spawn server");
    let page = page_with_quantity("5");
    let transport = Arc::new(HttpTransport::new(&server_url).expect("transport"));
    let reconciler = CartReconciler::attach(
        page.clone(),
        transport,
        ReconcilerConfig::admin_cart_option(),
    );

    let outcome = reconciler.save_single(&cart_shared::domain::OptionId::new("31")).await;

    assert_eq!(
        outcome,
        SaveOutcome::Failed {
            kind: FailureKind::ServerRejection,
            message: "stock exceeded".into(),
        }
    );
    assert_eq!(page.input_value(InputKey(0)).as_deref(), Some("5"));
    assert_eq!(page.border(InputKey(0)), Some(Border::Error));
    assert_eq!(
        page.save_button(&Scope::Page),
        Some(SaveButton::enabled("Save all"))
    );
}

#[tokio::test]
async fn malformed_json_reply_is_a_transport_failure() {
    let (server_url, _captured) = spawn_cart_server(StatusCode::OK, json!("not an object"))
        .await
        .expect("spawn server");
    let page = page_with_quantity("1");
    let transport = Arc::new(HttpTransport::new(&server_url).expect("transport"));
    let reconciler = CartReconciler::attach(
        page.clone(),
        transport,
        ReconcilerConfig::shop_update_multiple(),
    );

    let outcome = reconciler.save_all().await;

    assert!(matches!(
        outcome,
        SaveOutcome::Failed {
            kind: FailureKind::Transport,
            ..
        }
    ));
    assert_eq!(page.console_lines().len(), 1);
}
