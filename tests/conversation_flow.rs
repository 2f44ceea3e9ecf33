use async_trait::async_trait;
use axum::{Json, Router, http::StatusCode, routing::post};
use serde_json::{Value, json};
use std::sync::{Arc, Mutex};

use product_copywriter::copywriter::YandexCopywriter;
use product_copywriter::dialogue::{
    ASK_FOR_INFO, DialogueController, GENERATION_FAILED, GREETING, Messenger, WORKING,
};
use product_copywriter::error::Result;
use product_copywriter::models::{Stage, UserId};
use product_copywriter::observe::MemoryObserver;
use product_copywriter::session::SessionStore;
use product_copywriter::transport::YandexTransport;

#[derive(Default)]
struct Outbox {
    sent: Mutex<Vec<(UserId, String)>>,
}

impl Outbox {
    fn for_user(&self, user_id: UserId) -> Vec<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|(u, _)| *u == user_id)
            .map(|(_, t)| t.clone())
            .collect()
    }
}

#[async_trait]
impl Messenger for Outbox {
    async fn send_text(&self, user_id: UserId, text: &str) -> Result<()> {
        self.sent.lock().unwrap().push((user_id, text.to_string()));
        Ok(())
    }
}

struct Harness {
    controller: DialogueController,
    sessions: Arc<SessionStore>,
    outbox: Arc<Outbox>,
    observer: MemoryObserver,
}

async fn harness(backend: Router) -> Harness {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, backend).await.unwrap();
    });

    let transport = YandexTransport::new(
        format!("http://{addr}/foundationModels/v1/completion"),
        "iam-test".to_string(),
    )
    .unwrap();
    let observer = MemoryObserver::new();
    let generator = YandexCopywriter::new(
        Arc::new(transport),
        Arc::new(observer.clone()),
        "gpt://folder/yandexgpt/latest".to_string(),
    );
    let sessions = Arc::new(SessionStore::new());
    let outbox = Arc::new(Outbox::default());
    let controller = DialogueController::new(
        sessions.clone(),
        Arc::new(generator),
        outbox.clone(),
        Arc::new(observer.clone()),
    );

    Harness {
        controller,
        sessions,
        outbox,
        observer,
    }
}

/// Backend answering with the user-role restatement so replies identify their inputs
fn echo_backend() -> Router {
    Router::new().route(
        "/foundationModels/v1/completion",
        post(|Json(body): Json<Value>| async move {
            let echo = body["messages"][1]["text"].clone();
            Json(json!({
                "result": {
                    "alternatives": [{"message": {"role": "assistant", "text": echo}, "status": "ALTERNATIVE_STATUS_FINAL"}],
                    "usage": {"inputTextTokens": "900", "completionTokens": "40", "totalTokens": "940"},
                    "modelVersion": "23.10.2024"
                }
            }))
        }),
    )
}

fn fixed_backend(status: StatusCode, body: Value) -> Router {
    Router::new().route(
        "/foundationModels/v1/completion",
        post(move || {
            let body = body.clone();
            async move { (status, Json(body)) }
        }),
    )
}

#[tokio::test]
async fn full_cycle_returns_generated_text_verbatim() {
    let h = harness(fixed_backend(
        StatusCode::OK,
        json!({"result":{"alternatives":[{"message":{"text":"**Название товара:** ..."}}]}}),
    ))
    .await;
    let user = UserId(42);

    h.controller.handle_start(user).await;
    h.controller.handle_text(user, "Термокружка").await;
    h.controller
        .handle_text(user, "объём 500мл, нержавеющая сталь")
        .await;

    assert_eq!(
        h.outbox.for_user(user),
        vec![
            GREETING.to_string(),
            ASK_FOR_INFO.to_string(),
            WORKING.to_string(),
            "**Название товара:** ...".to_string(),
        ]
    );
    assert_eq!(h.sessions.get_or_create(user).await.stage, Stage::AwaitingName);

    // Backend call nested under the controller's generation attempt
    let recorded = h.observer.recorded();
    assert_eq!(recorded.len(), 2);
    let (inner, outer) = (&recorded[0], &recorded[1]);
    assert_eq!(inner.name, "yandex_call");
    assert_eq!(
        inner.input["payload"]["messages"][1]["text"],
        "Термокружка: объём 500мл, нержавеющая сталь"
    );
    assert_eq!(inner.input["payload"]["completionOptions"]["temperature"], json!(0.3));
    assert_eq!(outer.name, "yandex_bot_call");
    assert_eq!(outer.input, json!({"user_text": "объём 500мл, нержавеющая сталь"}));
    assert!(outer.parent_id.is_none());
    assert_eq!(inner.parent_id, Some(outer.id));
    assert_eq!(inner.trace_id, outer.trace_id);
}

#[tokio::test]
async fn backend_500_yields_fixed_error_and_reset() {
    let h = harness(fixed_backend(
        StatusCode::INTERNAL_SERVER_ERROR,
        json!({"error": "internal"}),
    ))
    .await;
    let user = UserId(7);

    h.controller.handle_text(user, "Термокружка").await;
    h.controller.handle_text(user, "500мл").await;

    assert_eq!(
        h.outbox.for_user(user).last().map(String::as_str),
        Some(GENERATION_FAILED)
    );
    let session = h.sessions.get_or_create(user).await;
    assert_eq!(session.stage, Stage::AwaitingName);
    assert!(session.product_name.is_none());
    let recorded = h.observer.recorded();
    assert_eq!(recorded.len(), 2);
    assert!(recorded.iter().all(|o| o.error.is_some()));
}

#[tokio::test]
async fn malformed_response_handled_like_backend_error() {
    let h = harness(fixed_backend(StatusCode::OK, json!({"result": {}}))).await;
    let user = UserId(8);

    h.controller.handle_text(user, "Лампа").await;
    h.controller.handle_text(user, "LED").await;

    assert_eq!(
        h.outbox.for_user(user).last().map(String::as_str),
        Some(GENERATION_FAILED)
    );
    assert_eq!(h.sessions.get_or_create(user).await.stage, Stage::AwaitingName);
}

#[tokio::test]
async fn interleaved_users_receive_independent_completions() {
    let h = harness(echo_backend()).await;
    let (u1, u2) = (UserId(1), UserId(2));

    h.controller.handle_text(u1, "Термокружка").await;
    h.controller.handle_text(u2, "Рюкзак").await;
    // Both generations in flight at once
    futures::join!(
        h.controller.handle_text(u1, "объём 500мл"),
        h.controller.handle_text(u2, "30 литров"),
    );

    assert_eq!(
        h.outbox.for_user(u1).last().map(String::as_str),
        Some("Термокружка: объём 500мл")
    );
    assert_eq!(
        h.outbox.for_user(u2).last().map(String::as_str),
        Some("Рюкзак: 30 литров")
    );
    assert_eq!(h.sessions.len().await, 2);
    assert_eq!(h.observer.recorded().len(), 4);
}
