use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::quote::QuoteSource;

/// A fixed-income instrument such as a Treasury bond or a bank deposit.
///
/// Live Treasury records carry rates and unit prices; the static list only
/// carries descriptive fields.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FixedIncomeInstrument {
    /// Title name (e.g. "Tesouro Selic")
    pub name: String,

    /// Category (e.g. "Renda Fixa")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,

    /// Maturity date
    #[serde(skip_serializing_if = "Option::is_none")]
    pub maturity: Option<NaiveDate>,

    /// Annual rate offered when buying
    pub buy_rate: Option<Decimal>,

    /// Annual rate offered when selling
    pub sell_rate: Option<Decimal>,

    /// Unit price when buying
    pub buy_price: Option<Decimal>,

    /// Unit price when selling
    pub sell_price: Option<Decimal>,

    /// Free-form expected yield (e.g. "12.5% ao ano")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub annual_yield: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub risk: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub liquidity: Option<String>,

    pub retrieved_at: DateTime<Utc>,

    pub source: QuoteSource,
}

impl FixedIncomeInstrument {
    pub fn new(name: impl Into<String>, source: QuoteSource, retrieved_at: DateTime<Utc>) -> Self {
        Self {
            name: name.into(),
            kind: None,
            maturity: None,
            buy_rate: None,
            sell_rate: None,
            buy_price: None,
            sell_price: None,
            annual_yield: None,
            risk: None,
            liquidity: None,
            retrieved_at,
            source,
        }
    }
}
