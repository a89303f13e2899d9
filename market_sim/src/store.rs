//! Instrument storage seam.
//!
//! The simulator reads the full instrument set at the start of every cycle and writes
//! the repriced set back in one batch. `InMemoryInstrumentStore` is the store used by
//! the binary; it is seeded from a JSON file or from a built-in list of symbols.
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use market_common::{Instrument, InstrumentId, MarketError, Result};
use rust_decimal::Decimal;
use serde::Deserialize;

/// Symbols listed when no seed file is given, all starting at 100.00.
const DEFAULT_LISTING: &[(&str, &str)] = &[
    ("AAPL", "Apple Inc."),
    ("MSFT", "Microsoft Corporation"),
    ("GOOGL", "Alphabet Inc."),
    ("AMZN", "Amazon.com Inc."),
    ("NVDA", "NVIDIA Corporation"),
    ("META", "Meta Platforms Inc."),
    ("TSLA", "Tesla Inc."),
    ("JPM", "JPMorgan Chase & Co."),
];

/// Durable (or not) list of instruments the simulator reprices.
pub trait InstrumentStore: Send + Sync {
    /// Read every instrument, ordered by id.
    fn list_all(&self) -> Result<Vec<Instrument>>;

    /// Write the price fields of `updates` atomically: all or nothing.
    fn apply_batch(&self, updates: &[Instrument]) -> Result<()>;
}

/// One entry of an instrument seed file.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstrumentSeed {
    /// Ticker symbol.
    pub symbol: String,
    /// Display name; defaults to the symbol.
    #[serde(default)]
    pub name: Option<String>,
    /// Opening price.
    #[serde(alias = "currentPrice")]
    pub price: Decimal,
}

/// Parse a JSON array of seeds.
pub fn read_seeds<R: Read>(reader: R) -> Result<Vec<InstrumentSeed>> {
    let seeds: Vec<InstrumentSeed> = serde_json::from_reader(reader)?;
    if let Some(bad) = seeds.iter().find(|s| s.price.is_sign_negative() && !s.price.is_zero()) {
        return Err(MarketError::Format(format!(
            "seed price for {} must be >= 0, got {}",
            bad.symbol, bad.price
        )));
    }
    Ok(seeds)
}

/// Load seeds from a JSON file.
pub fn load_seeds(path: &Path) -> Result<Vec<InstrumentSeed>> {
    let file = File::open(path)?;
    read_seeds(BufReader::new(file))
}

/// Thread-safe in-memory store keyed by instrument id.
#[derive(Debug, Default)]
pub struct InMemoryInstrumentStore {
    instruments: Mutex<BTreeMap<InstrumentId, Instrument>>,
}

impl InMemoryInstrumentStore {
    /// Creates a store holding `instruments`. Later duplicates of an id win.
    pub fn new(instruments: Vec<Instrument>) -> Self {
        let instruments = instruments.into_iter().map(|i| (i.id, i)).collect();
        Self {
            instruments: Mutex::new(instruments),
        }
    }

    /// Lists `seeds` with ids assigned from 1 in file order.
    pub fn from_seeds(seeds: Vec<InstrumentSeed>, listed_at: DateTime<Utc>) -> Self {
        let instruments = seeds
            .into_iter()
            .zip(1..)
            .map(|(seed, id)| {
                let name = seed.name.unwrap_or_else(|| seed.symbol.clone());
                Instrument::new(id, &seed.symbol, &name, seed.price, listed_at)
            })
            .collect();
        Self::new(instruments)
    }

    /// Store holding the default listing at 100.00.
    pub fn with_default_listing(listed_at: DateTime<Utc>) -> Self {
        let seeds = DEFAULT_LISTING
            .iter()
            .map(|(symbol, name)| InstrumentSeed {
                symbol: String::from(*symbol),
                name: Some(String::from(*name)),
                price: Decimal::ONE_HUNDRED,
            })
            .collect();
        Self::from_seeds(seeds, listed_at)
    }

    /// Number of listed instruments.
    pub fn len(&self) -> Result<usize> {
        Ok(self.instruments.lock()?.len())
    }

    /// Whether nothing is listed.
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}

impl InstrumentStore for InMemoryInstrumentStore {
    fn list_all(&self) -> Result<Vec<Instrument>> {
        let instruments = self.instruments.lock()?;
        Ok(instruments.values().cloned().collect())
    }

    fn apply_batch(&self, updates: &[Instrument]) -> Result<()> {
        let mut instruments = self.instruments.lock()?;
        if let Some(unknown) = updates.iter().find(|u| !instruments.contains_key(&u.id)) {
            return Err(MarketError::InstrumentNotFound(unknown.id));
        }
        for update in updates {
            if let Some(stored) = instruments.get_mut(&update.id) {
                stored.current_price = update.current_price;
                stored.previous_price = update.previous_price;
                stored.last_updated_at = update.last_updated_at;
            }
        }
        Ok(())
    }
}
