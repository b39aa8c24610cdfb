use std::time::Duration;

use chrono::NaiveDate;
use finboard_market_data::provider::tesouro::{TesouroConfig, DEFAULT_RESOURCE_ID};
use finboard_market_data::{FetchStatus, QuoteProvider, QuoteSource, TesouroDiretoProvider};
use rust_decimal_macros::dec;
use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const DATASTORE_PATH: &str = "/ckan/api/3/action/datastore_search";

fn provider(server: &MockServer) -> TesouroDiretoProvider {
    TesouroDiretoProvider::new(TesouroConfig {
        base_url: format!("{}{}", server.uri(), DATASTORE_PATH),
        timeout: Duration::from_secs(2),
        ..Default::default()
    })
    .unwrap()
}

#[tokio::test]
async fn parses_treasury_records() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(DATASTORE_PATH))
        .and(query_param("resource_id", DEFAULT_RESOURCE_ID))
        .and(query_param("limit", "10"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "result": {
                "records": [
                    {
                        "Tipo Titulo": "Tesouro IPCA+",
                        "Data Vencimento": "15/05/2035",
                        "Taxa Compra Manha": "6,12",
                        "Taxa Venda Manha": "6,24",
                        "PU Compra Manha": "2345,67",
                        "PU Venda Manha": "2301,10"
                    },
                    {
                        "Tipo Titulo": "Tesouro Prefixado",
                        "Data Vencimento": "2027-01-01T00:00:00",
                        "Taxa Compra Manha": 11.5
                    }
                ]
            }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let outcome = provider(&server).fetch_fixed_income().await;
    assert_eq!(outcome.status, FetchStatus::Ok);
    assert_eq!(outcome.data.len(), 2);

    let ipca = &outcome.data[0];
    assert_eq!(ipca.name, "Tesouro IPCA+");
    assert_eq!(ipca.maturity, NaiveDate::from_ymd_opt(2035, 5, 15));
    assert_eq!(ipca.buy_rate, Some(dec!(6.12)));
    assert_eq!(ipca.sell_price, Some(dec!(2301.10)));
    assert_eq!(ipca.source, QuoteSource::Primary);

    let prefixado = &outcome.data[1];
    assert_eq!(prefixado.maturity, NaiveDate::from_ymd_opt(2027, 1, 1));
    assert_eq!(prefixado.buy_rate, Some(dec!(11.5)));
    assert!(prefixado.sell_rate.is_none());
}

#[tokio::test]
async fn reported_failure_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(DATASTORE_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "success": false })))
        .mount(&server)
        .await;

    let outcome = provider(&server).fetch_fixed_income().await;
    assert!(outcome.data.is_empty());
    assert!(matches!(outcome.status, FetchStatus::Error(_)));
}

#[tokio::test]
async fn throttling_and_outages() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(DATASTORE_PATH))
        .respond_with(ResponseTemplate::new(429))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(DATASTORE_PATH))
        .respond_with(ResponseTemplate::new(502))
        .mount(&server)
        .await;

    let provider = provider(&server);
    assert_eq!(
        provider.fetch_fixed_income().await.status,
        FetchStatus::RateLimited
    );
    assert_eq!(
        provider.fetch_fixed_income().await.status,
        FetchStatus::Unavailable
    );
}

#[tokio::test]
async fn empty_dataset_is_not_success() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(DATASTORE_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "success": true, "result": { "records": [] } })),
        )
        .mount(&server)
        .await;

    let outcome = provider(&server).fetch_fixed_income().await;
    assert!(!outcome.status.is_success());
}
