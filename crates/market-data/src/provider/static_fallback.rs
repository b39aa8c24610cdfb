//! Hardcoded last-resort data.
//!
//! Consulted by the aggregator after every live source has been tried.
//! Everything served from here is tagged [`QuoteSource::Static`] and stamped
//! with the lookup time.

use std::collections::HashMap;

use chrono::Utc;
use lazy_static::lazy_static;
use rust_decimal::Decimal;

use crate::models::{normalize_symbol, FixedIncomeInstrument, Quote, QuoteSource};

/// (symbol, name, reference price in BRL)
type ReferenceQuote = (&'static str, &'static str, Option<Decimal>);

/// (name, kind, annual yield, risk, liquidity)
type ReferenceInstrument = (&'static str, &'static str, &'static str, &'static str, &'static str);

lazy_static! {
    static ref REFERENCE_QUOTES: Vec<ReferenceQuote> = vec![
        ("^BVSP", "Ibovespa", None),
        ("IFIX", "Índice de Fundos de Investimentos Imobiliários", None),
        ("PETR4", "Petróleo Brasileiro S.A. - Petrobras", Some(Decimal::new(3840, 2))),
        ("VALE3", "Vale S.A.", Some(Decimal::new(6120, 2))),
        ("ITUB4", "Itaú Unibanco Holding S.A.", Some(Decimal::new(3250, 2))),
        ("BBDC4", "Banco Bradesco S.A.", Some(Decimal::new(1350, 2))),
        ("KNRI11", "Kinea Renda Imobiliária FII", Some(Decimal::new(15800, 2))),
        ("MXRF11", "Maxi Renda FII", Some(Decimal::new(1030, 2))),
    ];

    /// (symbol, daily change in percent), ranked best first.
    static ref REFERENCE_MOVERS: Vec<(&'static str, Decimal)> = vec![
        ("PETR4", Decimal::new(210, 2)),
        ("VALE3", Decimal::new(150, 2)),
        ("ITUB4", Decimal::new(85, 2)),
        ("BBDC4", Decimal::new(-40, 2)),
    ];

    static ref REFERENCE_FIXED_INCOME: Vec<ReferenceInstrument> = vec![
        ("Tesouro Selic", "Renda Fixa", "12.5% ao ano", "Baixo", "Diária"),
        ("CDB", "Renda Fixa", "13% ao ano", "Baixo", "90 dias"),
    ];
}

/// In-memory last-resort provider.
#[derive(Clone, Debug, Default)]
pub struct StaticFallbackProvider {
    quotes: HashMap<String, Quote>,
    movers: Vec<Quote>,
    fixed_income: Vec<FixedIncomeInstrument>,
}

impl StaticFallbackProvider {
    /// A provider with no data; every lookup misses.
    pub fn empty() -> Self {
        Self::default()
    }

    /// The reference data set shipped with the crate.
    pub fn builtin() -> Self {
        let now = Utc::now();

        let quotes = REFERENCE_QUOTES
            .iter()
            .map(|(symbol, name, price)| {
                let mut quote = Quote::new(*symbol, QuoteSource::Static, now);
                quote.name = Some(name.to_string());
                quote.price = *price;
                quote.currency = Some("BRL".to_string());
                quote
            })
            .collect::<Vec<_>>();

        let fixed_income = REFERENCE_FIXED_INCOME
            .iter()
            .map(|(name, kind, annual_yield, risk, liquidity)| {
                let mut instrument = FixedIncomeInstrument::new(*name, QuoteSource::Static, now);
                instrument.kind = Some(kind.to_string());
                instrument.annual_yield = Some(annual_yield.to_string());
                instrument.risk = Some(risk.to_string());
                instrument.liquidity = Some(liquidity.to_string());
                instrument
            })
            .collect::<Vec<_>>();

        let provider = quotes
            .into_iter()
            .fold(Self::empty(), |provider, quote| provider.with_quote(quote));

        let movers = REFERENCE_MOVERS
            .iter()
            .filter_map(|(symbol, change_percent)| {
                let mut quote = provider.quotes.get(*symbol)?.clone();
                quote.change_percent = Some(*change_percent);
                Some(quote)
            })
            .collect();

        provider.with_movers(movers).with_fixed_income(fixed_income)
    }

    /// Add or replace the entry for `quote.symbol`.
    pub fn with_quote(mut self, mut quote: Quote) -> Self {
        if let Some(symbol) = normalize_symbol(&quote.symbol) {
            quote.symbol = symbol.clone();
            quote.source = QuoteSource::Static;
            self.quotes.insert(symbol, quote);
        }
        self
    }

    pub fn with_movers(mut self, movers: Vec<Quote>) -> Self {
        self.movers = movers;
        self
    }

    pub fn with_fixed_income(mut self, instruments: Vec<FixedIncomeInstrument>) -> Self {
        self.fixed_income = instruments;
        self
    }

    /// Static quote for a normalized symbol.
    pub fn quote(&self, symbol: &str) -> Option<Quote> {
        self.quotes.get(symbol).map(|template| {
            let mut quote = template.clone();
            quote.retrieved_at = Utc::now();
            quote
        })
    }

    pub fn top_movers(&self) -> Vec<Quote> {
        let now = Utc::now();
        self.movers
            .iter()
            .cloned()
            .map(|mut quote| {
                quote.source = QuoteSource::Static;
                quote.retrieved_at = now;
                quote
            })
            .collect()
    }

    pub fn fixed_income(&self) -> Vec<FixedIncomeInstrument> {
        let now = Utc::now();
        self.fixed_income
            .iter()
            .cloned()
            .map(|mut instrument| {
                instrument.source = QuoteSource::Static;
                instrument.retrieved_at = now;
                instrument
            })
            .collect()
    }
}
