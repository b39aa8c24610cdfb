use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{Method, Request, StatusCode},
};
use chrono::Utc;
use finboard_market_data::provider::{BatchFetch, FetchOutcome, FetchStatus};
use finboard_market_data::{
    AggregatorConfig, MarketDataCache, ProviderCapabilities, Quote, QuoteAggregator,
    QuoteProvider, QuoteSource, StaticFallbackProvider,
};
use finboard_server::{api::app_router, config::Config, AppState};
use rust_decimal_macros::dec;
use tower::ServiceExt;

/// Serves VALE3 only; rate limits once asked for RATE.
struct StubProvider {
    calls: AtomicUsize,
}

#[async_trait]
impl QuoteProvider for StubProvider {
    fn id(&self) -> &'static str {
        "BRAPI"
    }

    fn source(&self) -> QuoteSource {
        QuoteSource::Primary
    }

    fn capabilities(&self) -> ProviderCapabilities {
        ProviderCapabilities {
            supports_top_movers: true,
            ..Default::default()
        }
    }

    async fn fetch_batch(&self, symbols: &[String]) -> BatchFetch {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if symbols.iter().any(|s| s == "RATE") {
            return BatchFetch::failed(FetchStatus::RateLimited);
        }

        let quotes = symbols
            .iter()
            .filter(|s| *s == "VALE3")
            .map(|s| {
                let mut quote = Quote::new(s.clone(), QuoteSource::Primary, Utc::now());
                quote.price = Some(dec!(61.20));
                quote.change_percent = Some(dec!(1.5));
                quote
            })
            .collect();
        BatchFetch::from_quotes(symbols, quotes)
    }

    async fn fetch_top_movers(&self) -> FetchOutcome<Vec<Quote>> {
        let mut quote = Quote::new("PETR4", QuoteSource::Primary, Utc::now());
        quote.change_percent = Some(dec!(4.2));
        FetchOutcome::ok(vec![quote])
    }
}

fn build_test_router() -> (axum::Router, Arc<StubProvider>) {
    let provider = Arc::new(StubProvider {
        calls: AtomicUsize::new(0),
    });
    let aggregator = QuoteAggregator::new(
        vec![provider.clone() as Arc<dyn QuoteProvider>],
        Arc::new(MarketDataCache::new()),
        AggregatorConfig::default(),
    )
    .with_fallback(StaticFallbackProvider::builtin());

    let state = Arc::new(AppState {
        aggregator: Arc::new(aggregator),
        request_timeout: Duration::from_secs(2),
    });
    let config = Config::from_lookup(|_| None).unwrap();
    (app_router(state, &config), provider)
}

async fn send(app: &axum::Router, method: Method, uri: &str) -> (StatusCode, serde_json::Value) {
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method(method)
                .uri(uri)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = if body.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null)
    };
    (status, json)
}

#[tokio::test]
async fn healthz_works() {
    let (app, _) = build_test_router();
    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/v1/healthz")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
}

#[tokio::test]
async fn quote_found_and_cached() {
    let (app, provider) = build_test_router();

    let (status, json) = send(&app, Method::GET, "/api/v1/market/quote/vale3").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["symbol"], "VALE3");
    assert_eq!(json["source"], "PRIMARY");
    assert_eq!(json["changePercent"], "1.5");
    assert!(json["retrievedAt"].is_string());

    let (status, _) = send(&app, Method::GET, "/api/v1/market/quote/VALE3").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn unknown_quote_is_404() {
    let (app, _) = build_test_router();

    let (status, json) = send(&app, Method::GET, "/api/v1/market/quote/XPTO3").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["code"], 404);
    assert!(json["message"].as_str().unwrap().contains("XPTO3"));
}

#[tokio::test]
async fn batch_marks_each_symbol() {
    let (app, _) = build_test_router();

    let (status, json) = send(
        &app,
        Method::GET,
        "/api/v1/market/quotes?symbols=VALE3,KNRI11,XPTO3",
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let batch: HashMap<String, serde_json::Value> = serde_json::from_value(json).unwrap();
    assert_eq!(batch.len(), 3);
    assert_eq!(batch["VALE3"]["status"], "resolved");
    assert_eq!(batch["VALE3"]["source"], "PRIMARY");
    assert_eq!(batch["KNRI11"]["source"], "STATIC");
    assert_eq!(batch["XPTO3"]["status"], "unresolved");
}

#[tokio::test]
async fn batch_without_symbols_is_bad_request() {
    let (app, _) = build_test_router();

    let (status, _) = send(&app, Method::GET, "/api/v1/market/quotes").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, json) = send(&app, Method::GET, "/api/v1/market/quotes?symbols=").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json, serde_json::json!({}));
}

#[tokio::test]
async fn movers_fixed_income_and_indices() {
    let (app, _) = build_test_router();

    let (status, json) = send(&app, Method::GET, "/api/v1/market/movers").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json[0]["symbol"], "PETR4");

    // The stub has no fixed income, so the static list is served
    let (status, json) = send(&app, Method::GET, "/api/v1/market/fixed-income").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json[0]["name"], "Tesouro Selic");
    assert_eq!(json[0]["source"], "STATIC");

    let (status, json) = send(&app, Method::GET, "/api/v1/market/indices").await;
    assert_eq!(status, StatusCode::OK);
    assert!(json.get("^BVSP").is_some());
    assert!(json.get("IFIX").is_some());
}

#[tokio::test]
async fn sources_report_and_reset_degradation() {
    let (app, _) = build_test_router();

    let _ = send(&app, Method::GET, "/api/v1/market/quote/RATE").await;

    let (status, json) = send(&app, Method::GET, "/api/v1/market/sources").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json[0]["id"], "BRAPI");
    assert_eq!(json[0]["degraded"], true);

    let (status, _) = send(
        &app,
        Method::POST,
        "/api/v1/market/sources/reset?source=brapi",
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, json) = send(&app, Method::GET, "/api/v1/market/sources").await;
    assert_eq!(json[0]["degraded"], false);

    let (status, _) = send(
        &app,
        Method::POST,
        "/api/v1/market/sources/reset?source=nope",
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&app, Method::POST, "/api/v1/market/sources/reset").await;
    assert_eq!(status, StatusCode::NO_CONTENT);
}
