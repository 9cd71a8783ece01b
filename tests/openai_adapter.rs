// tests/openai_adapter.rs
// The OpenAI adapter against an in-process mock of the HTTP API.

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crypto_sentiment_agent::analyze::openai::OpenAiAdapter;
use crypto_sentiment_agent::analyze::{AnalysisAdapter, AnalysisError};
use crypto_sentiment_agent::config::ai::AiConfig;
use crypto_sentiment_agent::model::{Article, SentimentAnalysis, SignalType, TradingSignal};
use crypto_sentiment_agent::retry::RetryPolicy;

#[derive(Default)]
struct Mock {
    base: Mutex<String>,
    chat_calls: AtomicUsize,
    /// Status codes returned, in order, before answering normally.
    failures: Mutex<Vec<u16>>,
    last_chat: Mutex<Option<Value>>,
    auth_headers: Mutex<Vec<String>>,
}

async fn chat(
    State(m): State<Arc<Mock>>,
    headers: axum::http::HeaderMap,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    m.chat_calls.fetch_add(1, Ordering::SeqCst);
    if let Some(h) = headers.get("authorization").and_then(|v| v.to_str().ok()) {
        m.auth_headers.lock().push(h.to_string());
    }
    let forced = {
        let mut f = m.failures.lock();
        (!f.is_empty()).then(|| f.remove(0))
    };
    if let Some(code) = forced {
        return (
            StatusCode::from_u16(code).unwrap(),
            Json(json!({ "error": { "message": "mock failure" } })),
        );
    }
    *m.last_chat.lock() = Some(body.clone());

    let tool = body
        .pointer("/tool_choice/function/name")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let args = match tool.as_str() {
        "analyze_crypto_sentiment" => json!({ "analyses": [
            { "headline": "Bitcoin ETF inflows", "source": "Cointelegraph", "sentiment_score": 1.7,
              "confidence": 0.9, "entities": ["Bitcoin", "Bitcoin"], "summary": "Inflows rise." },
            { "headline": "missing fields" }
        ]}),
        "generate_trading_signals" => json!({ "signals": [
            { "cryptocurrency": "Bitcoin", "signal_type": "BUY", "confidence": 1.3,
              "sentiment_score": 0.62, "reasoning": "Strong inflows.", "sources": ["Cointelegraph"] },
            { "cryptocurrency": "Ethereum", "signal_type": "moon", "confidence": 0.5, "sentiment_score": 0.1 }
        ]}),
        _ => json!({}),
    };
    (
        StatusCode::OK,
        Json(json!({ "choices": [{ "message": { "tool_calls": [{
            "type": "function",
            "function": { "name": tool, "arguments": args.to_string() }
        }]}}]})),
    )
}

async fn images(State(m): State<Arc<Mock>>, Json(body): Json<Value>) -> Json<Value> {
    assert_eq!(body["model"], "dall-e-3");
    let base = m.base.lock().clone();
    Json(json!({ "data": [{ "url": format!("{base}/files/card.png") }] }))
}

async fn start() -> (Arc<Mock>, String) {
    let mock = Arc::new(Mock::default());
    let app = Router::new()
        .route("/v1/chat/completions", post(chat))
        .route("/v1/images/generations", post(images))
        .route("/files/card.png", get(|| async { vec![0x89u8, b'P', b'N', b'G'] }))
        .with_state(mock.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());
    *mock.base.lock() = base.clone();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (mock, base)
}

fn adapter(base: &str, archive_dir: Option<std::path::PathBuf>) -> OpenAiAdapter {
    let cfg = AiConfig {
        api_key: "sk-test".into(),
        base_url: format!("{base}/v1"),
        model: "gpt-test".into(),
        image_model: "dall-e-3".into(),
        archive_dir,
    };
    OpenAiAdapter::new(&cfg, Duration::from_secs(5))
        .unwrap()
        .with_retry(RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(5),
        })
}

fn articles() -> Vec<Article> {
    vec![
        Article::new("a", "Bitcoin ETF inflows").with_source("Cointelegraph"),
        Article::new("b", "Ethereum upgrade date set").with_source("Cointelegraph"),
    ]
}

#[tokio::test]
async fn sentiment_batch_is_one_forced_tool_call() {
    let (mock, base) = start().await;
    let out = adapter(&base, None).analyze_sentiment(&articles()).await.unwrap();

    // second item lacks required fields and is dropped on its own
    assert_eq!(out.len(), 1);
    assert_eq!(out[0].sentiment_score, 1.0);
    assert_eq!(out[0].entities.len(), 1);
    assert_eq!(mock.chat_calls.load(Ordering::SeqCst), 1);

    let req = mock.last_chat.lock().clone().unwrap();
    assert_eq!(req["model"], "gpt-test");
    assert_eq!(req["tools"][0]["function"]["name"], "analyze_crypto_sentiment");
    let user = req["messages"][1]["content"].as_str().unwrap();
    assert!(user.contains("Ethereum upgrade date set"));
    assert_eq!(mock.auth_headers.lock()[0], "Bearer sk-test");
}

#[tokio::test]
async fn signals_are_clamped_and_unknown_types_dropped() {
    let (mock, base) = start().await;
    let analyses = vec![SentimentAnalysis::new("Bitcoin ETF inflows", "Cointelegraph", 0.7, 0.9)];
    let tracked = vec!["Bitcoin".to_string(), "Ethereum".to_string()];
    let out = adapter(&base, None)
        .generate_signals(&analyses, &tracked)
        .await
        .unwrap();

    assert_eq!(out.len(), 1);
    assert_eq!(out[0].signal_type, SignalType::Buy);
    assert_eq!(out[0].confidence, 1.0);
    assert_eq!(out[0].sentiment_score, 0.62);
    assert_eq!(out[0].sources, vec!["Cointelegraph"]);

    let req = mock.last_chat.lock().clone().unwrap();
    let system = req["messages"][0]["content"].as_str().unwrap();
    assert!(system.contains("Bitcoin, Ethereum"));
}

#[tokio::test]
async fn empty_input_makes_no_request() {
    let (mock, base) = start().await;
    assert!(adapter(&base, None).analyze_sentiment(&[]).await.unwrap().is_empty());
    assert_eq!(mock.chat_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn server_errors_are_retried_within_the_call() {
    let (mock, base) = start().await;
    *mock.failures.lock() = vec![503, 429];
    let out = adapter(&base, None).analyze_sentiment(&articles()).await.unwrap();
    assert_eq!(out.len(), 1);
    assert_eq!(mock.chat_calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn client_errors_are_not_retried() {
    let (mock, base) = start().await;
    *mock.failures.lock() = vec![400];
    let err = adapter(&base, None).analyze_sentiment(&articles()).await.unwrap_err();
    assert!(matches!(err, AnalysisError::Status { status: 400, .. }));
    assert_eq!(mock.chat_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn rejected_key_is_fatal() {
    let (mock, base) = start().await;
    *mock.failures.lock() = vec![401];
    let err = adapter(&base, None).analyze_sentiment(&articles()).await.unwrap_err();
    assert!(err.is_fatal());
    assert_eq!(mock.chat_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn visual_url_is_returned_and_archived() {
    let (_mock, base) = start().await;
    let dir = tempfile::tempdir().unwrap();
    let signal = TradingSignal::new("Bitcoin", SignalType::Buy, 0.9, 0.7);

    let url = adapter(&base, Some(dir.path().to_path_buf()))
        .generate_visual(&signal)
        .await
        .unwrap();
    assert_eq!(url, Some(format!("{base}/files/card.png")));

    let folders: Vec<_> = std::fs::read_dir(dir.path()).unwrap().flatten().collect();
    assert_eq!(folders.len(), 1);
    let saved = folders[0].path().join("Bitcoin_buy.png");
    assert_eq!(std::fs::read(saved).unwrap(), vec![0x89u8, b'P', b'N', b'G']);
}
