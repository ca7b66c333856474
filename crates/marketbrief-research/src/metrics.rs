//! Trend metric derivation from daily bars

use crate::models::{HistoricalBar, TrendMetrics};

/// Derive trend metrics from an ascending-by-date bar window
///
/// Change fields require at least two non-null closes and a non-zero first
/// close; otherwise they are absent rather than zero. Average volume, period
/// high, and period low are computed from whatever non-null fields exist,
/// with closes as the fallback range source. Returns `None` for an empty
/// window.
pub fn trend_metrics(bars: &[HistoricalBar]) -> Option<TrendMetrics> {
    if bars.is_empty() {
        return None;
    }

    let closes: Vec<f64> = bars.iter().filter_map(|bar| bar.close).collect();
    let volumes: Vec<f64> = bars.iter().filter_map(|bar| bar.volume).collect();
    let highs: Vec<f64> = bars.iter().filter_map(|bar| bar.high).collect();
    let lows: Vec<f64> = bars.iter().filter_map(|bar| bar.low).collect();

    let mut absolute_change = None;
    let mut percent_change = None;
    if closes.len() >= 2 {
        let start = closes[0];
        let end = closes[closes.len() - 1];
        if start != 0.0 {
            let change = end - start;
            absolute_change = Some(change);
            percent_change = Some(change / start * 100.0);
        }
    }

    let average_volume = if volumes.is_empty() {
        None
    } else {
        Some(volumes.iter().sum::<f64>() / volumes.len() as f64)
    };
    let period_high = max_of(&highs).or_else(|| max_of(&closes));
    let period_low = min_of(&lows).or_else(|| min_of(&closes));

    Some(TrendMetrics {
        period_days: bars.len(),
        absolute_change,
        percent_change,
        average_volume,
        high: period_high,
        low: period_low,
    })
}

fn max_of(values: &[f64]) -> Option<f64> {
    values.iter().copied().reduce(f64::max)
}

fn min_of(values: &[f64]) -> Option<f64> {
    values.iter().copied().reduce(f64::min)
}
