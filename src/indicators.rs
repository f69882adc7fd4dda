//! # Indicator Engine
//! Pure, total functions over a chronological closing-price series (oldest first).
//! No I/O and no hidden state: the same input always yields bit-identical output.

use serde::{Deserialize, Serialize};

pub const RSI_PERIOD: usize = 14;
pub const RSI_NEUTRAL: f64 = 50.0;
pub const MACD_FAST: usize = 12;
pub const MACD_SLOW: usize = 26;
pub const MACD_SIGNAL: usize = 9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Bullish,
    Bearish,
    Neutral,
}

impl Trend {
    pub fn as_str(self) -> &'static str {
        match self {
            Trend::Bullish => "bullish",
            Trend::Bearish => "bearish",
            Trend::Neutral => "neutral",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Macd {
    pub value: f64,
    pub signal: f64,
    pub histogram: f64,
}

/// Indicators derived from one price series. Fields are absent when the
/// series is too short for their window.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndicatorSet {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rsi: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sma20: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sma50: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ema12: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ema26: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub macd: Option<Macd>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trend: Option<Trend>,
}

/// RSI over the trailing `period` deltas using simple averages.
///
/// Returns 50 when the series has fewer than `period + 1` points and 100 when
/// the average loss is exactly zero. Always within `[0, 100]`.
pub fn rsi(series: &[f64], period: usize) -> f64 {
    if period == 0 || series.len() < period + 1 {
        return RSI_NEUTRAL;
    }

    let tail = &series[series.len() - (period + 1)..];
    let (mut gains, mut losses) = (0.0f64, 0.0f64);
    for w in tail.windows(2) {
        let delta = w[1] - w[0];
        if delta > 0.0 {
            gains += delta;
        } else {
            losses -= delta;
        }
    }
    let avg_gain = gains / period as f64;
    let avg_loss = losses / period as f64;

    if avg_loss == 0.0 {
        return 100.0;
    }
    let out = 100.0 - 100.0 / (1.0 + avg_gain / avg_loss);
    if out.is_finite() {
        out.clamp(0.0, 100.0)
    } else {
        RSI_NEUTRAL
    }
}

/// Arithmetic mean of the trailing `period` values.
pub fn sma(series: &[f64], period: usize) -> Option<f64> {
    if period == 0 || series.len() < period {
        return None;
    }
    let tail = &series[series.len() - period..];
    Some(tail.iter().sum::<f64>() / period as f64)
}

/// Full EMA path: element 0 is the SMA seed of the first `period` values,
/// followed by one value per remaining point. Empty when the series is too short.
pub fn ema_series(series: &[f64], period: usize) -> Vec<f64> {
    if period == 0 || series.len() < period {
        return Vec::new();
    }
    let k = 2.0 / (period as f64 + 1.0);
    let seed = series[..period].iter().sum::<f64>() / period as f64;

    let mut out = Vec::with_capacity(series.len() - period + 1);
    out.push(seed);
    let mut prev = seed;
    for &price in &series[period..] {
        prev = (price - prev) * k + prev;
        out.push(prev);
    }
    out
}

/// Latest EMA value.
pub fn ema(series: &[f64], period: usize) -> Option<f64> {
    ema_series(series, period).last().copied()
}

/// MACD(12, 26, 9) with a true 9-period EMA signal line.
///
/// The MACD line exists from the 26th point onward, so a signal needs at
/// least 34 points; shorter series yield `None`.
pub fn macd(series: &[f64]) -> Option<Macd> {
    let fast = ema_series(series, MACD_FAST);
    let slow = ema_series(series, MACD_SLOW);
    if slow.is_empty() {
        return None;
    }

    // fast[i] is aligned to series[i + FAST - 1], slow[j] to series[j + SLOW - 1].
    let offset = MACD_SLOW - MACD_FAST;
    let line: Vec<f64> = slow
        .iter()
        .enumerate()
        .map(|(j, s)| fast[j + offset] - s)
        .collect();

    let signal = ema(&line, MACD_SIGNAL)?;
    let value = *line.last()?;
    Some(Macd {
        value,
        signal,
        histogram: value - signal,
    })
}

/// Bullish iff `price > sma20 > sma50`. Bearish when price sits below both
/// averages (this includes `price < sma20 < sma50`). Anything else is Neutral.
pub fn classify_trend(price: f64, sma20: f64, sma50: f64) -> Trend {
    if price > sma20 && sma20 > sma50 {
        Trend::Bullish
    } else if price < sma20 && price < sma50 {
        Trend::Bearish
    } else {
        Trend::Neutral
    }
}

pub fn compute_indicators(series: &[f64]) -> IndicatorSet {
    let price = series.last().copied();
    let sma20 = sma(series, 20);
    let sma50 = sma(series, 50);
    let trend = match (price, sma20, sma50) {
        (Some(p), Some(s20), Some(s50)) => Some(classify_trend(p, s20, s50)),
        _ => None,
    };

    IndicatorSet {
        price,
        rsi: price.map(|_| rsi(series, RSI_PERIOD)),
        sma20,
        sma50,
        ema12: ema(series, MACD_FAST),
        ema26: ema(series, MACD_SLOW),
        macd: macd(series),
        trend,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(n: usize) -> Vec<f64> {
        (1..=n).map(|i| i as f64).collect()
    }

    #[test]
    fn rsi_short_series_is_neutral() {
        assert_eq!(rsi(&ramp(14), 14), 50.0);
        assert_eq!(rsi(&[], 14), 50.0);
        assert_eq!(rsi(&ramp(30), 0), 50.0);
    }

    #[test]
    fn rsi_all_gains_is_100_and_all_losses_is_0() {
        assert_eq!(rsi(&ramp(15), 14), 100.0);
        let down: Vec<f64> = ramp(15).into_iter().rev().collect();
        assert_eq!(rsi(&down, 14), 0.0);
        // flat series: avg loss is zero
        assert_eq!(rsi(&[5.0; 20], 14), 100.0);
    }

    #[test]
    fn rsi_uses_only_trailing_window() {
        // first 10 points fall hard; the last 15 alternate +2 / -1
        let mut s: Vec<f64> = (0..10).map(|i| 100.0 - i as f64 * 5.0).collect();
        let mut p = 50.0;
        for i in 0..15 {
            p += if i % 2 == 0 { 2.0 } else { -1.0 };
            s.push(p);
        }
        // expected value from the last 15 points only
        let tail = &s[s.len() - 15..];
        let (g, l) = tail.windows(2).fold((0.0, 0.0), |(g, l), w| {
            let d = w[1] - w[0];
            if d > 0.0 {
                (g + d, l)
            } else {
                (g, l - d)
            }
        });
        let expected = 100.0 - 100.0 / (1.0 + g / l);
        assert!((rsi(&s, 14) - expected).abs() < 1e-12);
    }

    #[test]
    fn sma_matches_trailing_mean() {
        let s = ramp(25);
        assert_eq!(sma(&s, 20), Some((6..=25).sum::<usize>() as f64 / 20.0));
        assert_eq!(sma(&ramp(19), 20), None);
        assert_eq!(sma(&s, 0), None);
    }

    #[test]
    fn ema_seed_and_recurrence() {
        let s = ramp(14);
        let path = ema_series(&s, 12);
        assert_eq!(path.len(), 3);
        assert_eq!(path[0], 6.5);
        let k = 2.0 / 13.0;
        let e1 = (13.0 - 6.5) * k + 6.5;
        assert!((path[1] - e1).abs() < 1e-12);
        assert!((path[2] - ((14.0 - e1) * k + e1)).abs() < 1e-12);
        assert_eq!(ema(&ramp(11), 12), None);
    }

    #[test]
    fn macd_requires_34_points_and_uses_ema_signal() {
        assert!(macd(&ramp(33)).is_none());
        let s: Vec<f64> = (0..60).map(|i| 100.0 + (i as f64 * 0.3).sin() * 5.0).collect();
        let m = macd(&s).unwrap();
        assert!((m.value - (ema(&s, 12).unwrap() - ema(&s, 26).unwrap())).abs() < 1e-9);
        assert!((m.histogram - (m.value - m.signal)).abs() < 1e-12);
    }

    #[test]
    fn macd_of_linear_ramp_has_signal_equal_to_line() {
        // On a linear ramp both EMAs lag by a constant, so the MACD line is flat.
        let m = macd(&ramp(80)).unwrap();
        assert!((m.value - 7.0).abs() < 1e-6);
        assert!((m.signal - m.value).abs() < 1e-6);
    }

    #[test]
    fn trend_classification() {
        assert_eq!(classify_trend(105.0, 100.0, 95.0), Trend::Bullish);
        assert_eq!(classify_trend(90.0, 100.0, 95.0), Trend::Bearish);
        assert_eq!(classify_trend(90.0, 95.0, 100.0), Trend::Bearish);
        assert_eq!(classify_trend(97.0, 100.0, 95.0), Trend::Neutral);
        // price above both but averages not stacked
        assert_eq!(classify_trend(105.0, 95.0, 100.0), Trend::Neutral);
    }

    #[test]
    fn compute_indicators_on_30_points() {
        let set = compute_indicators(&ramp(30));
        assert_eq!(set.price, Some(30.0));
        assert_eq!(set.rsi, Some(100.0));
        assert!(set.sma20.is_some());
        assert!(set.sma50.is_none());
        assert!(set.ema26.is_some());
        assert!(set.macd.is_none());
        assert!(set.trend.is_none());

        assert_eq!(compute_indicators(&[]), IndicatorSet::default());
    }
}
