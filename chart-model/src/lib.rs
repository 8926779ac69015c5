use dash_core::{BacktestRunResult, WatchSnapshot};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ShapeError {
    /// A series length disagrees with `x`; the snapshot is rejected whole.
    #[error("malformed snapshot: {series} has {len} samples, expected {expected}")]
    MalformedSnapshot {
        series: String,
        len: usize,
        expected: usize,
    },
}

/// Per-entry backtest warning; the batch keeps going.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ShapeWarning {
    #[error("incomplete backtest result at index {index}: no ranges")]
    IncompleteResult { index: usize },
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum AxisSide {
    Left,
    Right,
}

/// One axis of the chart. Scale is always linear for this dashboard.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AxisSpec {
    pub title: String,
    pub range: Option<(f64, f64)>,
    pub side: AxisSide,
    /// Drawn on top of the volume axis instead of owning its own lane.
    pub overlay: bool,
}

/// Time axis + a volume axis scaled so price action is not obscured by
/// volume bars + a price axis overlaying it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AxisConfig {
    pub time: AxisSpec,
    pub volume: AxisSpec,
    pub price: AxisSpec,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum SeriesKind {
    Candlestick {
        open: Vec<f64>,
        high: Vec<f64>,
        low: Vec<f64>,
        close: Vec<f64>,
    },
    Bars {
        y: Vec<f64>,
    },
    Line {
        y: Vec<f64>,
    },
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum AxisAssignment {
    Price,
    Volume,
}

/// One renderer-agnostic trace.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Series {
    pub name: String,
    pub x: Vec<f64>,
    pub kind: SeriesKind,
    pub axis: AxisAssignment,
}

/// Everything a rendering layer needs to draw one watch snapshot.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChartModel {
    pub title: String,
    pub series: Vec<Series>,
    pub axes: AxisConfig,
}

fn axes(max_volume: f64) -> AxisConfig {
    AxisConfig {
        time: AxisSpec {
            title: "Time".into(),
            range: None,
            side: AxisSide::Left,
            overlay: false,
        },
        volume: AxisSpec {
            title: "Volume".into(),
            range: Some((0.0, max_volume * 2.0)),
            side: AxisSide::Right,
            overlay: false,
        },
        price: AxisSpec {
            title: "Price".into(),
            range: None,
            side: AxisSide::Left,
            overlay: true,
        },
    }
}

fn check_len(expected: usize, series: &str, len: usize) -> Result<(), ShapeError> {
    if len == expected {
        Ok(())
    } else {
        Err(ShapeError::MalformedSnapshot {
            series: series.to_string(),
            len,
            expected,
        })
    }
}

/// Turn a `/watch` snapshot into chart series and axis configuration.
///
/// Rejects snapshots whose series lengths disagree with `x` instead of
/// truncating. An empty `x` yields an empty model rather than an error so
/// the renderer can draw a blank chart.
pub fn shape_snapshot(snapshot: &WatchSnapshot) -> Result<ChartModel, ShapeError> {
    let n = snapshot.x.len();
    check_len(n, "open", snapshot.open.len())?;
    check_len(n, "high", snapshot.high.len())?;
    check_len(n, "low", snapshot.low.len())?;
    check_len(n, "close", snapshot.close.len())?;
    check_len(n, "volume", snapshot.volume.len())?;
    for ind in &snapshot.indicators {
        check_len(n, &ind.label, ind.data.len())?;
    }

    let title = format!("{} @ {}sec", snapshot.ticker, snapshot.interval);
    if n == 0 {
        return Ok(ChartModel {
            title,
            series: Vec::new(),
            axes: axes(0.0),
        });
    }

    // Full-sequence reduction, not a running max pinned to index 0.
    let max_volume = snapshot
        .volume
        .iter()
        .copied()
        .fold(snapshot.volume[0], f64::max);

    let mut series = Vec::with_capacity(2 + snapshot.indicators.len());
    series.push(Series {
        name: "OHLC".into(),
        x: snapshot.x.clone(),
        kind: SeriesKind::Candlestick {
            open: snapshot.open.clone(),
            high: snapshot.high.clone(),
            low: snapshot.low.clone(),
            close: snapshot.close.clone(),
        },
        axis: AxisAssignment::Price,
    });
    series.push(Series {
        name: "Volume".into(),
        x: snapshot.x.clone(),
        kind: SeriesKind::Bars {
            y: snapshot.volume.clone(),
        },
        axis: AxisAssignment::Volume,
    });
    for ind in &snapshot.indicators {
        series.push(Series {
            name: ind.label.clone(),
            x: snapshot.x.clone(),
            kind: SeriesKind::Line {
                y: ind.data.clone(),
            },
            axis: AxisAssignment::Price,
        });
    }

    Ok(ChartModel {
        title,
        series,
        axes: axes(max_volume),
    })
}

/// One labelled value in a backtest summary.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct SummaryRow {
    pub label: &'static str,
    pub value: String,
}

/// Display-ready summary of one backtest run.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct SummaryBlock {
    pub heading: String,
    pub rows: Vec<SummaryRow>,
}

fn fmt4(v: f64) -> String {
    format!("{v:.4}")
}

fn summarize_one(n: usize, result: &BacktestRunResult, ranges: &[i64]) -> SummaryBlock {
    let joined = ranges
        .iter()
        .map(|r| r.to_string())
        .collect::<Vec<_>>()
        .join(", ");
    let rows = vec![
        SummaryRow {
            label: "ranges",
            value: joined,
        },
        SummaryRow {
            label: "buys",
            value: result.buys.to_string(),
        },
        SummaryRow {
            label: "sells",
            value: result.sells.to_string(),
        },
        SummaryRow {
            label: "interval (sec)",
            value: result.interval.to_string(),
        },
        SummaryRow {
            label: "elapsed (hrs)",
            value: fmt4(result.elapsedhrs),
        },
        SummaryRow {
            label: "elapsed (days)",
            value: fmt4(result.elapsedhrs / 24.0),
        },
        SummaryRow {
            label: "initial",
            value: fmt4(result.initial),
        },
        SummaryRow {
            label: "shares",
            value: fmt4(result.shares),
        },
        SummaryRow {
            label: "balance",
            value: fmt4(result.balance),
        },
        SummaryRow {
            label: "equity",
            value: fmt4(result.equity),
        },
        SummaryRow {
            label: "net return",
            value: fmt4(result.netreturn),
        },
        SummaryRow {
            label: "% return",
            value: fmt4(result.preturn),
        },
        SummaryRow {
            label: "net return / hr",
            value: fmt4(result.hrreturn),
        },
        SummaryRow {
            label: "% return / hr",
            value: fmt4(result.phrreturn),
        },
        SummaryRow {
            label: "win rate",
            value: fmt4(result.winrate),
        },
        SummaryRow {
            label: "buy win rate",
            value: fmt4(result.bwinrate),
        },
        SummaryRow {
            label: "sell win rate",
            value: fmt4(result.swinrate),
        },
    ];
    SummaryBlock {
        heading: format!("Run {n}"),
        rows,
    }
}

/// Turn a `/backtest` batch into display blocks. Entries without `ranges`
/// failed server-side for their parameter combination; they are skipped
/// with a warning while the rest of the batch renders in order.
pub fn summarize_backtests(
    results: &[BacktestRunResult],
) -> (Vec<SummaryBlock>, Vec<ShapeWarning>) {
    let mut blocks = Vec::with_capacity(results.len());
    let mut warnings = Vec::new();
    for (i, result) in results.iter().enumerate() {
        match &result.ranges {
            Some(ranges) => blocks.push(summarize_one(blocks.len() + 1, result, ranges)),
            None => warnings.push(ShapeWarning::IncompleteResult { index: i }),
        }
    }
    (blocks, warnings)
}
