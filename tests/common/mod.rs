//! Helpers shared by the integration tests: temporary catalogs, mock LLM
//! upstreams, and the proxy itself served on ephemeral ports.

#![allow(dead_code)]

use axum::body::Bytes;
use axum::http::{HeaderMap, Method, StatusCode, Uri};
use axum::response::IntoResponse;
use axum::{Json, Router};
use catalog_chat::config::{Config, DbConfig};
use catalog_chat::{db, migrate, server};
use serde_json::Value;
use sqlx::SqlitePool;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

pub struct TestDb {
    _tmp: TempDir,
    pub pool: SqlitePool,
    pub url: String,
}

pub async fn test_db() -> TestDb {
    let tmp = TempDir::new().unwrap();
    let url = format!("sqlite:{}", tmp.path().join("catalog.sqlite").display());
    let pool = db::connect(&DbConfig {
        url: url.clone(),
        ..DbConfig::default()
    })
    .await
    .unwrap();
    migrate::run_migrations(&pool).await.unwrap();
    TestDb {
        _tmp: tmp,
        pool,
        url,
    }
}

pub async fn insert(
    pool: &SqlitePool,
    name: &str,
    category: &str,
    price: f64,
    description: &str,
    stock: i64,
) -> i64 {
    sqlx::query(
        "INSERT INTO products (name, category, price, description, stock) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(name)
    .bind(category)
    .bind(price)
    .bind(description)
    .bind(stock)
    .execute(pool)
    .await
    .unwrap()
    .last_insert_rowid()
}

/// Serves `app` on an ephemeral port and returns its base URL.
pub async fn spawn(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

/// Config pointing at the given catalog and upstreams. Never reads the
/// environment.
pub fn test_config(db_url: &str, ollama_url: &str, gemini_url: &str, api_key: Option<&str>) -> Config {
    let mut config = Config::default();
    config.db.url = db_url.to_string();
    config.ollama.url = ollama_url.to_string();
    config.gemini.base_url = gemini_url.to_string();
    config.gemini.api_key = api_key.map(str::to_string);
    config
}

pub async fn spawn_proxy(config: Config, pool: SqlitePool) -> String {
    let state = server::AppState::new(config, pool).unwrap();
    spawn(server::router(state)).await
}

// ─── Mock upstream ──────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct Recorded {
    pub method: Method,
    pub path: String,
    pub api_key: Option<String>,
    pub body: Value,
}

type Responder = dyn Fn(&str, &Value) -> (u16, Value) + Send + Sync;

/// An HTTP server that records every request and answers through `respond`.
pub struct MockUpstream {
    pub url: String,
    calls: Arc<Mutex<Vec<Recorded>>>,
}

impl MockUpstream {
    pub async fn start<F>(respond: F) -> Self
    where
        F: Fn(&str, &Value) -> (u16, Value) + Send + Sync + 'static,
    {
        let calls: Arc<Mutex<Vec<Recorded>>> = Arc::new(Mutex::new(Vec::new()));
        let respond: Arc<Responder> = Arc::new(respond);

        let recorder = calls.clone();
        let app = Router::new().fallback(
            move |method: Method, uri: Uri, headers: HeaderMap, body: Bytes| {
                let recorder = recorder.clone();
                let respond = respond.clone();
                async move {
                    let body: Value = serde_json::from_slice(&body).unwrap_or(Value::Null);
                    let path = uri.path().to_string();
                    let (status, reply) = respond(&path, &body);
                    recorder.lock().unwrap().push(Recorded {
                        method,
                        path,
                        api_key: headers
                            .get("x-goog-api-key")
                            .and_then(|v| v.to_str().ok())
                            .map(str::to_string),
                        body,
                    });
                    (StatusCode::from_u16(status).unwrap(), Json(reply)).into_response()
                }
            },
        );

        Self {
            url: spawn(app).await,
            calls,
        }
    }

    pub fn calls(&self) -> Vec<Recorded> {
        self.calls.lock().unwrap().clone()
    }
}

/// An Ollama `/api/chat` reply.
pub fn ollama_reply(content: &str) -> Value {
    serde_json::json!({
        "model": "llama3.2",
        "message": { "role": "assistant", "content": content },
        "done": true,
        "total_duration": 1000
    })
}

/// A Gemini `generateContent` reply.
pub fn gemini_reply(text: &str) -> Value {
    serde_json::json!({
        "candidates": [{ "content": { "role": "model", "parts": [{ "text": text }] } }]
    })
}

/// Whether a Gemini request body is the query-interpretation prompt.
pub fn is_interpretation(body: &Value) -> bool {
    body["contents"][0]["parts"][0]["text"]
        .as_str()
        .is_some_and(|t| t.contains("You translate shopping questions"))
}
