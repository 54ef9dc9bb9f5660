//! In-memory market data source.
//!
//! Backs tests and dry runs with the same trait surface as `LocalStorage`.

use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::{BTreeMap, HashMap};
use tokio::sync::RwLock;

use super::provider::{BarArchive, BaselineStore, ProviderError, SnapshotSource};
use super::{BaselineRecord, IntradayBar, SnapshotRecord};

/// In-memory implementation of every screener data source.
#[derive(Default)]
pub struct MemoryMarketData {
    baselines: RwLock<BTreeMap<(NaiveDate, String), BaselineRecord>>,
    snapshots: RwLock<BTreeMap<NaiveDate, Vec<SnapshotRecord>>>,
    bars: RwLock<HashMap<String, Vec<IntradayBar>>>,
}

impl MemoryMarketData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the snapshot for a date.
    pub async fn insert_snapshot(&self, date: NaiveDate, records: Vec<SnapshotRecord>) {
        self.snapshots.write().await.insert(date, records);
    }

    /// Append bars for a symbol. Bars are kept sorted by time.
    pub async fn insert_bars(&self, symbol: &str, bars: Vec<IntradayBar>) {
        let mut guard = self.bars.write().await;
        let series = guard.entry(symbol.to_string()).or_default();
        series.extend(bars);
        series.sort_by_key(|b| b.bar_time);
        series.dedup_by_key(|b| b.bar_time);
    }
}

#[async_trait]
impl BaselineStore for MemoryMarketData {
    async fn get_baseline(&self, date: NaiveDate) -> Result<Vec<BaselineRecord>, ProviderError> {
        let guard = self.baselines.read().await;
        Ok(guard
            .range((date, String::new())..)
            .take_while(|((d, _), _)| *d == date)
            .map(|(_, r)| r.clone())
            .collect())
    }

    async fn save_baseline(&self, records: &[BaselineRecord]) -> Result<usize, ProviderError> {
        let mut guard = self.baselines.write().await;
        for record in records {
            guard
                .entry((record.trade_date, record.symbol.clone()))
                .and_modify(|existing| existing.merge(record))
                .or_insert_with(|| record.clone());
        }
        Ok(records.len())
    }
}

#[async_trait]
impl SnapshotSource for MemoryMarketData {
    async fn get_daily_snapshot(
        &self,
        date: NaiveDate,
    ) -> Result<Vec<SnapshotRecord>, ProviderError> {
        Ok(self
            .snapshots
            .read()
            .await
            .get(&date)
            .cloned()
            .unwrap_or_default())
    }
}

#[async_trait]
impl BarArchive for MemoryMarketData {
    async fn get_intraday_bars(
        &self,
        symbol: &str,
        date: NaiveDate,
    ) -> Result<Vec<IntradayBar>, ProviderError> {
        Ok(self
            .bars
            .read()
            .await
            .get(symbol)
            .map(|series| {
                series
                    .iter()
                    .filter(|b| b.bar_time.date() == date)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }
}
