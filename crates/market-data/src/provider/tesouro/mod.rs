//! Tesouro Direto (Brazilian Treasury) fixed-income provider.
//!
//! Reads Treasury bond rates and unit prices from the Tesouro Transparente
//! open data portal through the CKAN `datastore_search` action. Records use
//! Brazilian number notation (`14512,78`) and `dd/mm/yyyy` dates.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::errors::MarketDataError;
use crate::models::{FixedIncomeInstrument, QuoteSource};
use crate::provider::{
    parse_decimal, BatchFetch, FetchOutcome, FetchStatus, ProviderCapabilities, QuoteProvider,
    DEFAULT_PROVIDER_TIMEOUT,
};

pub const DEFAULT_BASE_URL: &str =
    "https://www.tesourotransparente.gov.br/ckan/api/3/action/datastore_search";
pub const DEFAULT_RESOURCE_ID: &str = "796d2059-14e9-44e3-80c9-2d9e30b405c1";
const PROVIDER_ID: &str = "TESOURO";

/// Wiring for the Tesouro Direto adapter.
#[derive(Clone, Debug)]
pub struct TesouroConfig {
    pub base_url: String,
    pub resource_id: String,
    pub limit: usize,
    pub timeout: Duration,
}

impl Default for TesouroConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            resource_id: DEFAULT_RESOURCE_ID.to_string(),
            limit: 10,
            timeout: DEFAULT_PROVIDER_TIMEOUT,
        }
    }
}

/// CKAN action envelope
#[derive(Debug, Deserialize)]
struct DatastoreResponse {
    success: bool,
    result: Option<DatastoreResult>,
}

#[derive(Debug, Deserialize)]
struct DatastoreResult {
    #[serde(default)]
    records: Vec<TreasuryRecord>,
}

/// One row of the Treasury rates dataset
#[derive(Debug, Deserialize)]
struct TreasuryRecord {
    #[serde(rename = "Tipo Titulo")]
    title: Option<String>,
    #[serde(rename = "Data Vencimento")]
    maturity: Option<String>,
    #[serde(rename = "Taxa Compra Manha")]
    buy_rate: Option<Value>,
    #[serde(rename = "Taxa Venda Manha")]
    sell_rate: Option<Value>,
    #[serde(rename = "PU Compra Manha")]
    buy_price: Option<Value>,
    #[serde(rename = "PU Venda Manha")]
    sell_price: Option<Value>,
}

/// Tesouro Direto fixed-income provider.
pub struct TesouroDiretoProvider {
    client: Client,
    config: TesouroConfig,
}

impl TesouroDiretoProvider {
    pub fn new(config: TesouroConfig) -> Result<Self, MarketDataError> {
        if config.resource_id.trim().is_empty() {
            return Err(MarketDataError::Config(
                "Tesouro Direto requires a dataset resource id".to_string(),
            ));
        }

        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| MarketDataError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    async fn fetch_records(&self) -> Result<Vec<FixedIncomeInstrument>, MarketDataError> {
        let limit = self.config.limit.to_string();

        let response = self
            .client
            .get(&self.config.base_url)
            .query(&[
                ("resource_id", self.config.resource_id.as_str()),
                ("limit", limit.as_str()),
            ])
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    MarketDataError::Timeout {
                        provider: PROVIDER_ID.to_string(),
                    }
                } else {
                    MarketDataError::Unavailable {
                        provider: PROVIDER_ID.to_string(),
                        message: format!("Request failed: {}", e),
                    }
                }
            })?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(MarketDataError::RateLimited {
                provider: PROVIDER_ID.to_string(),
            });
        }
        if status.is_server_error() {
            return Err(MarketDataError::Unavailable {
                provider: PROVIDER_ID.to_string(),
                message: format!("HTTP {}", status),
            });
        }
        if !status.is_success() {
            return Err(MarketDataError::ProviderError {
                provider: PROVIDER_ID.to_string(),
                message: format!("HTTP {}", status),
            });
        }

        let body: DatastoreResponse =
            response.json().await.map_err(|e| MarketDataError::ParseError {
                provider: PROVIDER_ID.to_string(),
                message: format!("Failed to parse datastore response: {}", e),
            })?;

        if !body.success {
            return Err(MarketDataError::ProviderError {
                provider: PROVIDER_ID.to_string(),
                message: "datastore_search reported failure".to_string(),
            });
        }

        let retrieved_at = Utc::now();
        let records = body.result.map(|r| r.records).unwrap_or_default();
        Ok(records
            .into_iter()
            .filter_map(|record| map_record(record, retrieved_at))
            .collect())
    }
}

fn map_record(record: TreasuryRecord, retrieved_at: DateTime<Utc>) -> Option<FixedIncomeInstrument> {
    let name = record.title?.trim().to_string();
    if name.is_empty() {
        return None;
    }

    let mut instrument = FixedIncomeInstrument::new(name, QuoteSource::Primary, retrieved_at);
    instrument.kind = Some("Tesouro Direto".to_string());
    instrument.maturity = record.maturity.as_deref().and_then(parse_maturity);
    instrument.buy_rate = record.buy_rate.as_ref().and_then(value_to_decimal);
    instrument.sell_rate = record.sell_rate.as_ref().and_then(value_to_decimal);
    instrument.buy_price = record.buy_price.as_ref().and_then(value_to_decimal);
    instrument.sell_price = record.sell_price.as_ref().and_then(value_to_decimal);
    Some(instrument)
}

fn value_to_decimal(value: &Value) -> Option<rust_decimal::Decimal> {
    match value {
        Value::String(s) => parse_decimal(s),
        Value::Number(n) => parse_decimal(&n.to_string()),
        _ => None,
    }
}

fn parse_maturity(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%d/%m/%Y") {
        return Some(date);
    }
    // ISO dates, optionally followed by a time part
    raw.get(..10)
        .and_then(|prefix| NaiveDate::parse_from_str(prefix, "%Y-%m-%d").ok())
}

#[async_trait]
impl QuoteProvider for TesouroDiretoProvider {
    fn id(&self) -> &'static str {
        PROVIDER_ID
    }

    fn source(&self) -> QuoteSource {
        QuoteSource::Primary
    }

    fn capabilities(&self) -> ProviderCapabilities {
        ProviderCapabilities {
            supports_batch_quotes: false,
            supports_top_movers: false,
            supports_fixed_income: true,
            max_batch_size: 0,
        }
    }

    async fn fetch_batch(&self, _symbols: &[String]) -> BatchFetch {
        BatchFetch::failed(
            MarketDataError::NotSupported {
                operation: "batch quotes".to_string(),
                provider: PROVIDER_ID.to_string(),
            }
            .fetch_status(),
        )
    }

    async fn fetch_fixed_income(&self) -> FetchOutcome<Vec<FixedIncomeInstrument>> {
        match self.fetch_records().await {
            Ok(items) if items.is_empty() => {
                FetchOutcome::failed(FetchStatus::Error("no Treasury records".to_string()))
            }
            Ok(items) => {
                debug!("Tesouro: fetched {} instruments", items.len());
                FetchOutcome::ok(items)
            }
            Err(e) => {
                warn!("Tesouro: fixed income fetch failed: {}", e);
                FetchOutcome::failed(e.fetch_status())
            }
        }
    }
}
