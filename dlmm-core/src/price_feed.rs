//! Spot-price feed with last-known-good fallback
//!
//! The feed is the only asynchronous piece of the crate. It polls a
//! [`PriceSource`] on a fixed interval and publishes a snapshot map; a failed
//! fetch never clears a price, it only leaves the previous value in place.

use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use reqwest::Client;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;

use crate::reference;
use crate::LiquidityResult;

/// Polling interval, conservative to stay within public API rate limits
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(60);

pub const COINGECKO_API_URL: &str = "https://api.coingecko.com/api/v3";

/// Anything that can quote USD prices for a set of symbols
pub trait PriceSource: Send + Sync + 'static {
    /// Prices for the symbols the source knows; unknown symbols are omitted
    fn fetch_prices(
        &self,
        symbols: &[String],
    ) -> impl Future<Output = LiquidityResult<BTreeMap<String, Decimal>>> + Send;
}

#[derive(Debug, Deserialize)]
struct UsdQuote {
    usd: Option<Decimal>,
}

/// CoinGecko `simple/price` client
#[derive(Debug, Clone)]
pub struct CoinGeckoSource {
    client: Client,
    base_url: String,
    /// symbol -> coingecko id
    ids: BTreeMap<String, String>,
}

impl CoinGeckoSource {
    pub fn new(base_url: impl Into<String>) -> Self {
        let ids = [
            ("ETH", "ethereum"),
            ("USDC", "usd-coin"),
            ("BRETT", "based-brett"),
            ("DEGEN", "degen-base"),
        ]
        .into_iter()
        .map(|(symbol, id)| (symbol.to_string(), id.to_string()))
        .collect();

        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            ids,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> LiquidityResult<Self> {
        self.client = Client::builder().timeout(timeout).build()?;
        Ok(self)
    }

    /// Map an extra symbol to its CoinGecko id
    pub fn with_id(mut self, symbol: &str, coingecko_id: &str) -> Self {
        self.ids.insert(symbol.to_uppercase(), coingecko_id.to_string());
        self
    }
}

impl Default for CoinGeckoSource {
    fn default() -> Self {
        Self::new(COINGECKO_API_URL)
    }
}

impl PriceSource for CoinGeckoSource {
    async fn fetch_prices(&self, symbols: &[String]) -> LiquidityResult<BTreeMap<String, Decimal>> {
        let wanted: Vec<(&String, &String)> = symbols
            .iter()
            .filter_map(|symbol| self.ids.get(symbol).map(|id| (symbol, id)))
            .collect();
        if wanted.is_empty() {
            return Ok(BTreeMap::new());
        }

        let ids = wanted
            .iter()
            .map(|(_, id)| id.as_str())
            .collect::<Vec<_>>()
            .join(",");
        let url = format!("{}/simple/price", self.base_url);
        debug!("Fetching prices for {}", ids);

        let quotes: HashMap<String, UsdQuote> = self
            .client
            .get(&url)
            .query(&[("ids", ids.as_str()), ("vs_currencies", "usd")])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(wanted
            .into_iter()
            .filter_map(|(symbol, id)| {
                let price = quotes.get(id)?.usd?;
                Some((symbol.clone(), price))
            })
            .collect())
    }
}

/// Fixed quotes, for offline runs
#[derive(Debug, Clone, Default)]
pub struct StaticPriceSource {
    prices: BTreeMap<String, Decimal>,
}

impl StaticPriceSource {
    pub fn new(prices: BTreeMap<String, Decimal>) -> Self {
        Self { prices }
    }
}

impl PriceSource for StaticPriceSource {
    async fn fetch_prices(&self, symbols: &[String]) -> LiquidityResult<BTreeMap<String, Decimal>> {
        Ok(symbols
            .iter()
            .filter_map(|symbol| self.prices.get(symbol).map(|price| (symbol.clone(), *price)))
            .collect())
    }
}

/// Prices as of the last successful refresh
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceSnapshot {
    pub prices: BTreeMap<String, Decimal>,
    /// `None` until the first successful fetch
    pub updated_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

impl PriceSnapshot {
    pub fn price(&self, symbol: &str) -> Option<Decimal> {
        self.prices.get(symbol).copied()
    }

    pub fn is_stale(&self) -> bool {
        self.last_error.is_some() || self.updated_at.is_none()
    }
}

/// Shared, periodically refreshed spot prices
pub struct SpotPriceFeed<S> {
    source: Arc<S>,
    symbols: Arc<Vec<String>>,
    snapshot: Arc<RwLock<PriceSnapshot>>,
    interval: Duration,
}

impl<S> Clone for SpotPriceFeed<S> {
    fn clone(&self) -> Self {
        Self {
            source: Arc::clone(&self.source),
            symbols: Arc::clone(&self.symbols),
            snapshot: Arc::clone(&self.snapshot),
            interval: self.interval,
        }
    }
}

impl<S: PriceSource> SpotPriceFeed<S> {
    /// Feed seeded with the catalog's fallback prices
    pub fn new(source: S, symbols: Vec<String>) -> Self {
        Self::with_initial_prices(source, symbols, reference::fallback_prices().clone())
    }

    pub fn with_initial_prices(
        source: S,
        symbols: Vec<String>,
        initial: BTreeMap<String, Decimal>,
    ) -> Self {
        let symbols = symbols.into_iter().map(|s| s.to_uppercase()).collect();
        Self {
            source: Arc::new(source),
            symbols: Arc::new(symbols),
            snapshot: Arc::new(RwLock::new(PriceSnapshot {
                prices: initial,
                updated_at: None,
                last_error: None,
            })),
            interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub async fn snapshot(&self) -> PriceSnapshot {
        self.snapshot.read().await.clone()
    }

    pub async fn price(&self, symbol: &str) -> Option<Decimal> {
        self.snapshot.read().await.price(&symbol.to_uppercase())
    }

    /// Fetch once and merge. Returns whether the fetch succeeded; on failure
    /// every previous price is kept.
    pub async fn refresh(&self) -> bool {
        match self.source.fetch_prices(&self.symbols).await {
            Ok(fresh) => {
                let mut snapshot = self.snapshot.write().await;
                for symbol in self.symbols.iter() {
                    match fresh.get(symbol) {
                        Some(price) if *price > Decimal::ZERO => {
                            snapshot.prices.insert(symbol.clone(), *price);
                        }
                        _ => debug!("No fresh quote for {}, keeping previous value", symbol),
                    }
                }
                snapshot.updated_at = Some(Utc::now());
                snapshot.last_error = None;
                true
            }
            Err(e) => {
                warn!("Using fallback prices due to price feed error: {}", e);
                self.snapshot.write().await.last_error = Some(e.to_string());
                false
            }
        }
    }

    /// Refresh immediately, then every `interval`, until the handle is aborted
    pub fn spawn_polling(&self) -> JoinHandle<()> {
        let feed = self.clone();
        info!(
            "Polling {} prices every {}s",
            feed.symbols.len(),
            feed.interval.as_secs()
        );

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(feed.interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                feed.refresh().await;
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LiquidityError;
    use rust_decimal_macros::dec;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Replays queued responses, failing once the queue is empty
    struct ScriptedSource {
        responses: Mutex<VecDeque<LiquidityResult<BTreeMap<String, Decimal>>>>,
    }

    impl ScriptedSource {
        fn new(responses: Vec<LiquidityResult<BTreeMap<String, Decimal>>>) -> Self {
            Self {
                responses: Mutex::new(responses.into()),
            }
        }
    }

    impl PriceSource for ScriptedSource {
        async fn fetch_prices(
            &self,
            _symbols: &[String],
        ) -> LiquidityResult<BTreeMap<String, Decimal>> {
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(unavailable("script exhausted")))
        }
    }

    fn unavailable(reason: &str) -> LiquidityError {
        LiquidityError::PriceFeed(reason.to_string())
    }

    fn quotes(pairs: &[(&str, Decimal)]) -> BTreeMap<String, Decimal> {
        pairs.iter().map(|(s, p)| (s.to_string(), *p)).collect()
    }

    fn symbols() -> Vec<String> {
        vec!["ETH".to_string(), "USDC".to_string()]
    }

    #[tokio::test]
    async fn test_starts_with_fallback_prices() {
        let feed = SpotPriceFeed::new(ScriptedSource::new(vec![]), symbols());
        assert_eq!(feed.price("eth").await, Some(dec!(2450.50)));
        assert!(feed.snapshot().await.is_stale());
    }

    #[tokio::test]
    async fn test_successful_refresh_merges() {
        let source = ScriptedSource::new(vec![Ok(quotes(&[("ETH", dec!(2600))]))]);
        let feed = SpotPriceFeed::new(source, symbols());

        assert!(feed.refresh().await);

        let snapshot = feed.snapshot().await;
        assert_eq!(snapshot.price("ETH"), Some(dec!(2600)));
        // USDC missing from the response keeps its previous value
        assert_eq!(snapshot.price("USDC"), Some(dec!(1.00)));
        assert!(snapshot.updated_at.is_some());
        assert!(!snapshot.is_stale());
    }

    #[tokio::test]
    async fn test_failed_refresh_keeps_last_good_value() {
        let source = ScriptedSource::new(vec![
            Ok(quotes(&[("ETH", dec!(2600)), ("USDC", dec!(0.999))])),
            Err(unavailable("HTTP 429")),
        ]);
        let feed = SpotPriceFeed::new(source, symbols());

        assert!(feed.refresh().await);
        assert!(!feed.refresh().await);

        let snapshot = feed.snapshot().await;
        assert_eq!(snapshot.price("ETH"), Some(dec!(2600)));
        assert_eq!(snapshot.price("USDC"), Some(dec!(0.999)));
        assert_eq!(snapshot.last_error.as_deref(), Some("Price feed error: HTTP 429"));
    }

    #[tokio::test]
    async fn test_zero_quotes_are_ignored() {
        let source = ScriptedSource::new(vec![Ok(quotes(&[("ETH", Decimal::ZERO)]))]);
        let feed = SpotPriceFeed::new(source, symbols());

        feed.refresh().await;
        assert_eq!(feed.price("ETH").await, Some(dec!(2450.50)));
    }

    #[tokio::test]
    async fn test_static_source() {
        let source = StaticPriceSource::new(quotes(&[("ETH", dec!(3000)), ("SOL", dec!(150))]));
        let fetched = source.fetch_prices(&symbols()).await.unwrap();
        assert_eq!(fetched, quotes(&[("ETH", dec!(3000))]));
    }

    #[tokio::test(start_paused = true)]
    async fn test_polling_refreshes_on_interval() {
        let source = ScriptedSource::new(vec![
            Ok(quotes(&[("ETH", dec!(2500))])),
            Ok(quotes(&[("ETH", dec!(2700))])),
        ]);
        let feed = SpotPriceFeed::new(source, symbols()).with_interval(Duration::from_secs(60));

        let handle = feed.spawn_polling();
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(feed.price("ETH").await, Some(dec!(2500)));

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(feed.price("ETH").await, Some(dec!(2700)));

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(feed.price("ETH").await, Some(dec!(2700)));

        handle.abort();
    }

    #[test]
    fn test_coingecko_extra_ids() {
        let source = CoinGeckoSource::default().with_id("sol", "solana");
        assert_eq!(source.ids.get("SOL").map(String::as_str), Some("solana"));
        assert_eq!(source.ids.get("ETH").map(String::as_str), Some("ethereum"));
        assert_eq!(source.base_url, COINGECKO_API_URL);
    }

    #[tokio::test]
    async fn test_coingecko_skips_unknown_symbols() {
        let source = CoinGeckoSource::new("http://127.0.0.1:9");
        let fetched = source.fetch_prices(&["SOL".to_string()]).await.unwrap();
        assert!(fetched.is_empty());
    }
}
