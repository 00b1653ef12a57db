//! End-to-end tests for `POST /chat`: routing, error mapping, and catalog
//! augmentation, against mock Ollama and Gemini upstreams.

mod common;

use common::{
    gemini_reply, insert, is_interpretation, ollama_reply, spawn_proxy, test_config, test_db,
    MockUpstream,
};
use reqwest::StatusCode;
use serde_json::{json, Value};

async fn post_chat(proxy: &str, body: Value) -> (StatusCode, Value) {
    let resp = reqwest::Client::new()
        .post(format!("{}/chat", proxy))
        .json(&body)
        .send()
        .await
        .unwrap();
    let status = resp.status();
    (status, resp.json().await.unwrap())
}

async fn seed_hardware(pool: &sqlx::SqlitePool) {
    insert(pool, "Budget Graphics Card", "Components", 150.0, "Entry level", 4).await;
    insert(pool, "Elite Graphics Card", "Components", 900.0, "Flagship", 2).await;
    insert(pool, "Gaming Mouse", "Peripherals", 49.99, "RGB lighting", 30).await;
}

#[tokio::test]
async fn ollama_error_becomes_502_with_status_and_body() {
    let db = test_db().await;
    let ollama = MockUpstream::start(|_, _| (500, json!({"error": "model 'nope' not found"}))).await;
    let gemini = MockUpstream::start(|_, _| (200, gemini_reply("unused"))).await;
    let proxy = spawn_proxy(
        test_config(&db.url, &ollama.url, &gemini.url, None),
        db.pool.clone(),
    )
    .await;

    let (status, body) = post_chat(
        &proxy,
        json!({"model": "nope", "messages": [{"role": "user", "content": "hi"}], "use_database": false}),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["error"]["code"], "upstream_error");
    let message = body["error"]["message"].as_str().unwrap();
    assert!(message.contains("500"), "{}", message);
    assert!(message.contains("model 'nope' not found"), "{}", message);

    assert_eq!(ollama.calls().len(), 1);
    assert!(gemini.calls().is_empty());
}

#[tokio::test]
async fn ollama_reply_is_normalized() {
    let db = test_db().await;
    let ollama = MockUpstream::start(|_, _| (200, ollama_reply("Hello there"))).await;
    let proxy = spawn_proxy(
        test_config(&db.url, &ollama.url, "http://127.0.0.1:9", None),
        db.pool.clone(),
    )
    .await;

    let (status, body) = post_chat(
        &proxy,
        json!({"messages": [{"role": "user", "content": "hi"}], "useDatabase": false}),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"]["role"], "assistant");
    assert_eq!(body["message"]["content"], "Hello there");
    assert_eq!(body["provider"], "ollama");
    assert_eq!(body["done"], true);
    assert_eq!(body["total_duration"], 1000);

    let calls = ollama.calls();
    assert_eq!(calls[0].path, "/api/chat");
    assert_eq!(calls[0].body["model"], "llama3.2");
    assert_eq!(calls[0].body["stream"], false);
}

#[tokio::test]
async fn gemini_hint_without_model_uses_default_model() {
    let db = test_db().await;
    let gemini = MockUpstream::start(|_, _| (200, gemini_reply("from gemini"))).await;
    let proxy = spawn_proxy(
        test_config(&db.url, "http://127.0.0.1:9", &gemini.url, Some("test-key")),
        db.pool.clone(),
    )
    .await;

    let (status, body) = post_chat(
        &proxy,
        json!({"provider": "gemini", "messages": [{"role": "user", "content": "hi"}], "use_database": false}),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["provider"], "gemini");
    assert_eq!(body["model"], "gemini-2.5-flash");
    assert_eq!(body["message"]["content"], "from gemini");
    assert!(body.get("total_duration").is_none());

    let calls = gemini.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].path, "/models/gemini-2.5-flash:generateContent");
    assert_eq!(calls[0].api_key.as_deref(), Some("test-key"));
    assert_eq!(calls[0].body["contents"][0]["role"], "user");
}

#[tokio::test]
async fn gemini_model_prefix_is_stripped() {
    let db = test_db().await;
    let gemini = MockUpstream::start(|_, _| (200, gemini_reply("ok"))).await;
    let proxy = spawn_proxy(
        test_config(&db.url, "http://127.0.0.1:9", &gemini.url, Some("test-key")),
        db.pool.clone(),
    )
    .await;

    let (status, _) = post_chat(
        &proxy,
        json!({
            "model": "models/gemini-2.5-pro",
            "provider": "gemini",
            "messages": [{"role": "user", "content": "hi"}],
            "use_database": false
        }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(gemini.calls()[0].path, "/models/gemini-2.5-pro:generateContent");
}

#[tokio::test]
async fn gemini_model_with_path_segments_is_rejected() {
    let db = test_db().await;
    let gemini = MockUpstream::start(|_, _| (200, gemini_reply("unused"))).await;
    let proxy = spawn_proxy(
        test_config(&db.url, "http://127.0.0.1:9", &gemini.url, Some("test-key")),
        db.pool.clone(),
    )
    .await;

    let (status, body) = post_chat(
        &proxy,
        json!({
            "model": "gemini/../../files",
            "messages": [{"role": "user", "content": "hi"}],
            "use_database": false
        }),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "bad_request");
    assert!(gemini.calls().is_empty());
}

#[tokio::test]
async fn gemini_without_key_is_a_configuration_error() {
    let db = test_db().await;
    let gemini = MockUpstream::start(|_, _| (200, gemini_reply("unused"))).await;
    let proxy = spawn_proxy(
        test_config(&db.url, "http://127.0.0.1:9", &gemini.url, None),
        db.pool.clone(),
    )
    .await;

    let (status, body) = post_chat(
        &proxy,
        json!({"model": "gemini-2.0-flash", "messages": [{"role": "user", "content": "hi"}]}),
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"]["code"], "configuration_error");
    assert!(gemini.calls().is_empty());
}

#[tokio::test]
async fn unreachable_provider_is_request_failed() {
    let db = test_db().await;
    // Nothing listens on the discard port.
    let proxy = spawn_proxy(
        test_config(&db.url, "http://127.0.0.1:9", "http://127.0.0.1:9", None),
        db.pool.clone(),
    )
    .await;

    let (status, body) = post_chat(
        &proxy,
        json!({"messages": [{"role": "user", "content": "hi"}], "use_database": false}),
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"]["code"], "request_failed");
}

#[tokio::test]
async fn augmentation_prepends_filtered_catalog_context() {
    let db = test_db().await;
    seed_hardware(&db.pool).await;

    let ollama = MockUpstream::start(|_, _| (200, ollama_reply("We have one card."))).await;
    let gemini = MockUpstream::start(|_, body| {
        if is_interpretation(body) {
            (
                200,
                gemini_reply(
                    "```json\n{\"categoryKeywords\": [\"graphics card\", \"gpu\"], \"maxPrice\": 200, \"limit\": 20}\n```",
                ),
            )
        } else {
            (200, gemini_reply("unexpected chat call"))
        }
    })
    .await;
    let proxy = spawn_proxy(
        test_config(&db.url, &ollama.url, &gemini.url, Some("test-key")),
        db.pool.clone(),
    )
    .await;

    let (status, body) = post_chat(
        &proxy,
        json!({"model": "llama3.2", "messages": [{"role": "user", "content": "graphics cards under $200"}]}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"]["content"], "We have one card.");

    let interpreter_calls = gemini.calls();
    assert_eq!(interpreter_calls.len(), 1);
    assert!(is_interpretation(&interpreter_calls[0].body));
    assert_eq!(
        interpreter_calls[0].path,
        "/models/gemini-2.5-flash:generateContent"
    );

    let calls = ollama.calls();
    let sent = calls[0].body["messages"].as_array().unwrap();
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[0]["role"], "system");
    let context = sent[0]["content"].as_str().unwrap();
    assert!(context.contains("1 matching product(s) out of 3"), "{}", context);
    assert!(context.contains("Budget Graphics Card"), "{}", context);
    assert!(!context.contains("Elite Graphics Card"), "{}", context);
    assert!(!context.contains("Gaming Mouse"), "{}", context);
    assert_eq!(sent[1]["role"], "user");
    assert_eq!(sent[1]["content"], "graphics cards under $200");
}

#[tokio::test]
async fn malformed_interpretation_falls_back_to_default_filter() {
    let db = test_db().await;
    seed_hardware(&db.pool).await;

    let ollama = MockUpstream::start(|_, _| (200, ollama_reply("ok"))).await;
    let gemini = MockUpstream::start(|_, _| (200, gemini_reply("```json\n{\"limit\": 5"))).await;
    let proxy = spawn_proxy(
        test_config(&db.url, &ollama.url, &gemini.url, Some("test-key")),
        db.pool.clone(),
    )
    .await;

    let (status, _) = post_chat(
        &proxy,
        json!({"messages": [{"role": "user", "content": "what do you sell?"}]}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let sent = ollama.calls()[0].body["messages"].clone();
    let context = sent[0]["content"].as_str().unwrap();
    assert!(context.contains("3 matching product(s) out of 3"), "{}", context);
}

#[tokio::test]
async fn missing_key_still_augments_with_default_filter() {
    let db = test_db().await;
    seed_hardware(&db.pool).await;

    let ollama = MockUpstream::start(|_, _| (200, ollama_reply("ok"))).await;
    let gemini = MockUpstream::start(|_, _| (200, gemini_reply("unused"))).await;
    let proxy = spawn_proxy(
        test_config(&db.url, &ollama.url, &gemini.url, None),
        db.pool.clone(),
    )
    .await;

    let (status, _) = post_chat(
        &proxy,
        json!({"messages": [{"role": "user", "content": "mice please"}]}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(gemini.calls().is_empty());

    let sent = ollama.calls()[0].body["messages"].clone();
    assert_eq!(sent[0]["role"], "system");
    assert!(sent[0]["content"].as_str().unwrap().contains("Gaming Mouse"));
}

#[tokio::test]
async fn database_flag_off_skips_augmentation_and_drops_empty_messages() {
    let db = test_db().await;
    seed_hardware(&db.pool).await;

    let ollama = MockUpstream::start(|_, _| (200, ollama_reply("ok"))).await;
    let gemini = MockUpstream::start(|_, _| (200, gemini_reply("unused"))).await;
    let proxy = spawn_proxy(
        test_config(&db.url, &ollama.url, &gemini.url, Some("test-key")),
        db.pool.clone(),
    )
    .await;

    let (status, _) = post_chat(
        &proxy,
        json!({
            "messages": [
                {"role": "system", "content": ""},
                {"role": "user", "content": "hello"}
            ],
            "use_database": false
        }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(gemini.calls().is_empty());

    let sent = ollama.calls()[0].body["messages"].clone();
    assert_eq!(sent, json!([{"role": "user", "content": "hello"}]));
}

#[tokio::test]
async fn conversation_without_user_turn_is_not_augmented() {
    let db = test_db().await;
    seed_hardware(&db.pool).await;

    let ollama = MockUpstream::start(|_, _| (200, ollama_reply("ok"))).await;
    let proxy = spawn_proxy(
        test_config(&db.url, &ollama.url, "http://127.0.0.1:9", None),
        db.pool.clone(),
    )
    .await;

    let (status, _) = post_chat(
        &proxy,
        json!({"messages": [{"role": "assistant", "content": "How can I help?"}]}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let sent = ollama.calls()[0].body["messages"].clone();
    assert_eq!(sent.as_array().unwrap().len(), 1);
    assert_eq!(sent[0]["role"], "assistant");
}

#[tokio::test]
async fn malformed_requests_are_rejected() {
    let db = test_db().await;
    let ollama = MockUpstream::start(|_, _| (200, ollama_reply("ok"))).await;
    let proxy = spawn_proxy(
        test_config(&db.url, &ollama.url, "http://127.0.0.1:9", None),
        db.pool.clone(),
    )
    .await;

    let (status, body) = post_chat(
        &proxy,
        json!({"messages": [{"role": "tool", "content": "x"}]}),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "bad_request");

    let (status, _) = post_chat(&proxy, json!({"model": "llama3.2"})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    assert!(ollama.calls().is_empty());
}

#[tokio::test]
async fn health_models_and_key_status() {
    let db = test_db().await;
    let proxy = spawn_proxy(
        test_config(&db.url, "http://127.0.0.1:9", "http://127.0.0.1:9", Some("abcd1234")),
        db.pool.clone(),
    )
    .await;
    let client = reqwest::Client::new();

    let health: Value = client
        .get(format!("{}/health", proxy))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health["status"], "ok");
    assert_eq!(health["version"], env!("CARGO_PKG_VERSION"));

    let models: Value = client
        .get(format!("{}/models", proxy))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let ids: Vec<&str> = models["models"]
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["id"].as_str().unwrap())
        .collect();
    assert_eq!(
        ids,
        vec!["llama3.2", "gemini-2.5-flash", "gemini-2.5-pro", "gemini-2.0-flash"]
    );

    let key: Value = client
        .get(format!("{}/debug/gemini-key", proxy))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(key, json!({"key_exists": true, "key_length": 8}));
}

#[tokio::test]
async fn upstream_model_listing_keeps_generate_content_models() {
    let db = test_db().await;
    let gemini = MockUpstream::start(|path, _| {
        if path == "/models" {
            (
                200,
                json!({"models": [
                    {"name": "models/gemini-2.5-flash", "displayName": "Gemini 2.5 Flash",
                     "supportedGenerationMethods": ["generateContent", "countTokens"]},
                    {"name": "models/text-embedding-004", "displayName": "Text Embedding 004",
                     "supportedGenerationMethods": ["embedContent"]}
                ]}),
            )
        } else {
            (404, json!({}))
        }
    })
    .await;
    let proxy = spawn_proxy(
        test_config(&db.url, "http://127.0.0.1:9", &gemini.url, Some("test-key")),
        db.pool.clone(),
    )
    .await;

    let listing: Value = reqwest::get(format!("{}/test/list-gemini-models", proxy))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(
        listing,
        json!({"models": [{"name": "models/gemini-2.5-flash", "displayName": "Gemini 2.5 Flash"}]})
    );
    assert_eq!(gemini.calls()[0].api_key.as_deref(), Some("test-key"));
}

#[tokio::test]
async fn upstream_model_listing_reports_errors() {
    let db = test_db().await;
    let gemini = MockUpstream::start(|_, _| (403, json!({"error": "forbidden"}))).await;
    let proxy = spawn_proxy(
        test_config(&db.url, "http://127.0.0.1:9", &gemini.url, Some("test-key")),
        db.pool.clone(),
    )
    .await;

    let listing: Value = reqwest::get(format!("{}/test/list-gemini-models", proxy))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(listing["status"], 403);
    assert!(listing["error"].as_str().unwrap().contains("forbidden"));
}
