use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Position of an asset in the reference list, stable for the session.
pub type AssetIndex = usize;
/// Index into the asset-type label list.
pub type TypeIndex = usize;
/// Index into the algorithm list.
pub type AlgoIndex = usize;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DashError {
    #[error("unresolved {kind} reference: index {index} of {len}")]
    UnresolvedReference {
        kind: &'static str,
        index: usize,
        len: usize,
    },
    #[error("no asset selected")]
    NoAssetSelected,
    #[error("no algorithm selected")]
    NoAlgorithmSelected,
}

/// One tradable asset as served by `/data`. The wire field for the type
/// index is `type`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Asset {
    pub ticker: String,
    #[serde(rename = "type")]
    pub type_index: TypeIndex,
}

/// An algorithm entry from `/data`. The server sends bare names.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct AlgorithmRef {
    pub name: String,
}

/// Ticker-list filter: either everything or one asset type.
/// Replaces the `"-1"` select-value sentinel past the DOM boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetTypeFilter {
    All,
    Specific(TypeIndex),
}

impl AssetTypeFilter {
    /// Parse a `<select>` value; `-1` is the "All" option.
    pub fn from_select_value(value: &str) -> Option<Self> {
        match value.trim().parse::<i64>() {
            Ok(-1) => Some(AssetTypeFilter::All),
            Ok(n) if n >= 0 => Some(AssetTypeFilter::Specific(n as TypeIndex)),
            _ => None,
        }
    }

    pub fn matches(&self, type_index: TypeIndex) -> bool {
        match *self {
            AssetTypeFilter::All => true,
            AssetTypeFilter::Specific(t) => t == type_index,
        }
    }
}

/// The `/data` payload: asset list, type labels, algorithm names.
/// Loaded once at startup; owns every reference record for the session.
/// Everything else holds indices into it, never copies.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReferenceData {
    #[serde(default)]
    pub assets: Vec<Asset>,
    #[serde(default)]
    pub types: Vec<String>,
    #[serde(default)]
    pub algorithms: Vec<AlgorithmRef>,
}

impl ReferenceData {
    pub fn is_empty(&self) -> bool {
        self.assets.is_empty() && self.algorithms.is_empty()
    }

    pub fn asset(&self, index: AssetIndex) -> Result<&Asset, DashError> {
        self.assets
            .get(index)
            .ok_or(DashError::UnresolvedReference {
                kind: "asset",
                index,
                len: self.assets.len(),
            })
    }

    pub fn type_label(&self, index: TypeIndex) -> Result<&str, DashError> {
        self.types
            .get(index)
            .map(String::as_str)
            .ok_or(DashError::UnresolvedReference {
                kind: "type",
                index,
                len: self.types.len(),
            })
    }

    pub fn algorithm(&self, index: AlgoIndex) -> Result<&AlgorithmRef, DashError> {
        self.algorithms
            .get(index)
            .ok_or(DashError::UnresolvedReference {
                kind: "algorithm",
                index,
                len: self.algorithms.len(),
            })
    }

    /// Tickers visible under `filter`, each with its session-stable index.
    pub fn tickers_for(&self, filter: AssetTypeFilter) -> Vec<(AssetIndex, &str)> {
        self.assets
            .iter()
            .enumerate()
            .filter(|(_, a)| filter.matches(a.type_index))
            .map(|(i, a)| (i, a.ticker.as_str()))
            .collect()
    }
}

/// Live-trading status attached to a watch snapshot.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct AssetStatus {
    pub live: bool,
    pub paper: bool,
    pub shares: f64,
    pub risk: f64,
}

/// Per-indicator series aligned to the snapshot's `x` axis.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IndicatorSeries {
    pub label: String,
    #[serde(default)]
    pub data: Vec<f64>,
}

/// One `/watch` response: OHLCV + indicator series for a single asset.
/// Invariant: every series has the same length as `x`; a response that
/// breaks this is malformed and must be rejected whole, not truncated.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WatchSnapshot {
    pub ticker: String,
    /// Candle interval in seconds.
    pub interval: u32,
    #[serde(default)]
    pub x: Vec<f64>,
    #[serde(default)]
    pub open: Vec<f64>,
    #[serde(default)]
    pub high: Vec<f64>,
    #[serde(default)]
    pub low: Vec<f64>,
    #[serde(default)]
    pub close: Vec<f64>,
    #[serde(default)]
    pub volume: Vec<f64>,
    #[serde(default)]
    pub indicators: Vec<IndicatorSeries>,
    #[serde(default)]
    pub asset: Option<AssetStatus>,
}

/// `/accinfo` response, scoped to one asset type.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct AccountInfo {
    pub balance: f64,
    pub buying_power: f64,
    pub equity: f64,
}

/// One entry of the `/backtest` response. Individual parameter combinations
/// can fail server-side, in which case `ranges` is absent.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BacktestRunResult {
    pub buys: u32,
    pub sells: u32,
    pub interval: u32,
    #[serde(default)]
    pub ranges: Option<Vec<i64>>,
    pub elapsedhrs: f64,
    pub initial: f64,
    pub shares: f64,
    pub balance: f64,
    pub equity: f64,
    pub netreturn: f64,
    pub preturn: f64,
    pub hrreturn: f64,
    pub phrreturn: f64,
    pub winrate: f64,
    pub bwinrate: f64,
    pub swinrate: f64,
}

/// Endpoint URL construction for the backend collaborator. Plain
/// query-parameterized GETs; the fetch itself lives with the caller.
pub mod api {
    use super::{AlgoIndex, AssetIndex, TypeIndex};

    fn base(api_base: &str) -> &str {
        api_base.trim_end_matches('/')
    }

    pub fn data_url(api_base: &str) -> String {
        format!("{}/data", base(api_base))
    }

    pub fn watch_url(api_base: &str, asset: AssetIndex) -> String {
        format!("{}/watch?index={}", base(api_base), asset)
    }

    pub fn backtest_url(
        api_base: &str,
        asset: AssetIndex,
        algorithm: AlgoIndex,
        ranges: Option<&str>,
    ) -> String {
        let mut url = format!(
            "{}/backtest?asset={}&algorithm={}",
            base(api_base),
            asset,
            algorithm
        );
        if let Some(r) = ranges {
            let r = r.trim();
            if !r.is_empty() {
                url.push_str("&ranges=");
                url.push_str(&r.replace(' ', ""));
            }
        }
        url
    }

    pub fn accinfo_url(api_base: &str, asset_type: TypeIndex) -> String {
        format!("{}/accinfo?asset_type={}", base(api_base), asset_type)
    }

    pub fn shutdown_url(api_base: &str) -> String {
        format!("{}/shutdown", base(api_base))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reference() -> ReferenceData {
        ReferenceData {
            assets: vec![
                Asset {
                    ticker: "AAA".into(),
                    type_index: 0,
                },
                Asset {
                    ticker: "BBB".into(),
                    type_index: 1,
                },
            ],
            types: vec!["stock".into(), "crypto".into()],
            algorithms: vec![AlgorithmRef {
                name: "simplema".into(),
            }],
        }
    }

    #[test]
    fn data_payload_decodes() {
        let json = r#"{
            "assets": [{"ticker": "AAA", "type": 0}, {"ticker": "BBB", "type": 1}],
            "types": ["stock", "crypto"],
            "algorithms": ["simplema"]
        }"#;
        let data: ReferenceData = serde_json::from_str(json).unwrap();
        assert_eq!(data.assets.len(), 2);
        assert_eq!(data.assets[1].type_index, 1);
        assert_eq!(data.algorithms[0].name, "simplema");
    }

    #[test]
    fn filter_round_trip() {
        let data = reference();
        let stocks = data.tickers_for(AssetTypeFilter::Specific(0));
        assert_eq!(stocks, vec![(0, "AAA")]);
        let all = data.tickers_for(AssetTypeFilter::All);
        assert_eq!(all, vec![(0, "AAA"), (1, "BBB")]);
    }

    #[test]
    fn filter_parses_select_values() {
        assert_eq!(
            AssetTypeFilter::from_select_value("-1"),
            Some(AssetTypeFilter::All)
        );
        assert_eq!(
            AssetTypeFilter::from_select_value("2"),
            Some(AssetTypeFilter::Specific(2))
        );
        assert_eq!(AssetTypeFilter::from_select_value("x"), None);
    }

    #[test]
    fn out_of_range_indices_are_errors() {
        let data = reference();
        assert!(data.asset(1).is_ok());
        assert_eq!(
            data.asset(7),
            Err(DashError::UnresolvedReference {
                kind: "asset",
                index: 7,
                len: 2,
            })
        );
        assert!(data.type_label(2).is_err());
        assert!(data.algorithm(1).is_err());
    }

    #[test]
    fn empty_reference_resolves_nothing() {
        let data = ReferenceData::default();
        assert!(data.is_empty());
        assert!(data.asset(0).is_err());
        assert!(data.tickers_for(AssetTypeFilter::All).is_empty());
    }

    #[test]
    fn api_urls() {
        assert_eq!(api::data_url("http://h:8080/"), "http://h:8080/data");
        assert_eq!(api::watch_url("http://h", 3), "http://h/watch?index=3");
        assert_eq!(
            api::backtest_url("http://h", 1, 2, None),
            "http://h/backtest?asset=1&algorithm=2"
        );
        assert_eq!(
            api::backtest_url("http://h", 1, 2, Some("10, 20,30")),
            "http://h/backtest?asset=1&algorithm=2&ranges=10,20,30"
        );
        assert_eq!(
            api::accinfo_url("http://h", 1),
            "http://h/accinfo?asset_type=1"
        );
        assert_eq!(api::shutdown_url("http://h"), "http://h/shutdown");
    }

    #[test]
    fn backtest_result_tolerates_missing_ranges() {
        let json = r#"{
            "buys": 3, "sells": 2, "interval": 300,
            "elapsedhrs": 48.0, "initial": 500.0, "shares": 0.0,
            "balance": 512.5, "equity": 512.5, "netreturn": 12.5,
            "preturn": 2.5, "hrreturn": 0.26, "phrreturn": 0.05,
            "winrate": 0.6, "bwinrate": 0.66, "swinrate": 0.5
        }"#;
        let result: BacktestRunResult = serde_json::from_str(json).unwrap();
        assert_eq!(result.ranges, None);
    }
}
