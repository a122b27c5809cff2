//! Whole-slice indicator computations.
//!
//! Every function takes complete input columns and returns a series of the same length,
//! with `NaN` for bars inside the lookback window.

use std::collections::VecDeque;
use std::hint::black_box;

use crate::dataset::Dataset;
use crate::provider::{CaseSpec, Operation, Provider};

pub fn sma(src: &[f64], length: usize) -> Vec<f64> {
    let mut out = vec![f64::NAN; src.len()];
    if length == 0 || src.len() < length {
        return out;
    }
    let mut sum: f64 = src[..length].iter().sum();
    out[length - 1] = sum / length as f64;
    for i in length..src.len() {
        sum += src[i] - src[i - length];
        out[i] = sum / length as f64;
    }
    out
}

/// Exponential smoothing seeded with the simple average of the first `length` values.
fn smooth(src: &[f64], length: usize, alpha: f64) -> Vec<f64> {
    let mut out = vec![f64::NAN; src.len()];
    let first = match src.iter().position(|v| !v.is_nan()) {
        Some(p) => p,
        None => return out,
    };
    if length == 0 || src.len() < first + length {
        return out;
    }
    let seed_end = first + length - 1;
    let mut prev = src[first..=seed_end].iter().sum::<f64>() / length as f64;
    out[seed_end] = prev;
    for i in seed_end + 1..src.len() {
        prev = alpha * src[i] + (1.0 - alpha) * prev;
        out[i] = prev;
    }
    out
}

pub fn ema(src: &[f64], length: usize) -> Vec<f64> {
    smooth(src, length, 2.0 / (length as f64 + 1.0))
}

/// Wilder's moving average.
pub fn rma(src: &[f64], length: usize) -> Vec<f64> {
    smooth(src, length, 1.0 / length as f64)
}

pub fn rsi(src: &[f64], length: usize) -> Vec<f64> {
    let n = src.len();
    let mut gains = vec![f64::NAN; n];
    let mut losses = vec![f64::NAN; n];
    for i in 1..n {
        let change = src[i] - src[i - 1];
        gains[i] = change.max(0.0);
        losses[i] = (-change).max(0.0);
    }
    let up = rma(&gains, length);
    let down = rma(&losses, length);
    up.iter()
        .zip(&down)
        .map(|(u, d)| {
            if u.is_nan() || d.is_nan() {
                f64::NAN
            } else if *d == 0.0 {
                100.0
            } else if *u == 0.0 {
                0.0
            } else {
                100.0 - 100.0 / (1.0 + u / d)
            }
        })
        .collect()
}

/// Rolling extreme over `length` bars using a monotonic deque.
fn rolling_extreme(src: &[f64], length: usize, keep: impl Fn(f64, f64) -> bool) -> Vec<f64> {
    let mut out = vec![f64::NAN; src.len()];
    let mut window: VecDeque<usize> = VecDeque::with_capacity(length + 1);
    for i in 0..src.len() {
        while window.back().is_some_and(|&j| !keep(src[j], src[i])) {
            window.pop_back();
        }
        window.push_back(i);
        if window.front().is_some_and(|&j| j + length <= i) {
            window.pop_front();
        }
        if i + 1 >= length {
            if let Some(&j) = window.front() {
                out[i] = src[j];
            }
        }
    }
    out
}

pub fn highest(src: &[f64], length: usize) -> Vec<f64> {
    rolling_extreme(src, length, |kept, new| kept > new)
}

pub fn lowest(src: &[f64], length: usize) -> Vec<f64> {
    rolling_extreme(src, length, |kept, new| kept < new)
}

pub fn stoch(high: &[f64], low: &[f64], close: &[f64], length: usize) -> Vec<f64> {
    let hh = highest(high, length);
    let ll = lowest(low, length);
    close
        .iter()
        .zip(hh.iter().zip(&ll))
        .map(|(c, (h, l))| {
            let range = h - l;
            if range.is_nan() || range == 0.0 {
                f64::NAN
            } else {
                100.0 * (c - l) / range
            }
        })
        .collect()
}

pub fn true_range(high: &[f64], low: &[f64], close: &[f64]) -> Vec<f64> {
    (0..close.len())
        .map(|i| {
            if i == 0 {
                high[0] - low[0]
            } else {
                let prev = close[i - 1];
                (high[i] - low[i])
                    .max((high[i] - prev).abs())
                    .max((low[i] - prev).abs())
            }
        })
        .collect()
}

pub fn atr(high: &[f64], low: &[f64], close: &[f64], length: usize) -> Vec<f64> {
    rma(&true_range(high, low, close), length)
}

pub struct Macd {
    pub macd: Vec<f64>,
    pub signal: Vec<f64>,
    pub histogram: Vec<f64>,
}

pub fn macd(src: &[f64], fast: usize, slow: usize, signal: usize) -> Macd {
    let fast = ema(src, fast);
    let slow = ema(src, slow);
    let line: Vec<f64> = fast.iter().zip(&slow).map(|(f, s)| f - s).collect();
    let signal = ema(&line, signal);
    let histogram = line.iter().zip(&signal).map(|(m, s)| m - s).collect();
    Macd {
        macd: line,
        signal,
        histogram,
    }
}

/// Aroon up/down over `length + 1` bars; ties resolve to the most recent extreme.
pub fn aroon(high: &[f64], low: &[f64], length: usize) -> (Vec<f64>, Vec<f64>) {
    let n = high.len();
    let mut up = vec![f64::NAN; n];
    let mut down = vec![f64::NAN; n];
    for i in length..n {
        let start = i - length;
        let mut hi_at = start;
        let mut lo_at = start;
        for j in start..=i {
            if high[j] >= high[hi_at] {
                hi_at = j;
            }
            if low[j] <= low[lo_at] {
                lo_at = j;
            }
        }
        up[i] = 100.0 * (length - (i - hi_at)) as f64 / length as f64;
        down[i] = 100.0 * (length - (i - lo_at)) as f64 / length as f64;
    }
    (up, down)
}

/// Computes each case over complete columns in one call.
#[derive(Clone, Copy, Debug, Default)]
pub struct BatchProvider;

impl Provider for BatchProvider {
    fn id(&self) -> &str {
        "batch"
    }

    fn cases(&self) -> Vec<CaseSpec> {
        vec![
            CaseSpec::new("sma_14").option("length", "14"),
            CaseSpec::new("ema_14").option("length", "14"),
            CaseSpec::new("rsi_14").option("length", "14"),
            CaseSpec::new("stoch_14").option("length", "14"),
            CaseSpec::new("atr_14").option("length", "14"),
            CaseSpec::new("macd_12_26")
                .option("fast", "12")
                .option("slow", "26")
                .option("signal", "9"),
            CaseSpec::new("macd_12_26_rsi_14"),
            CaseSpec::new("aroon_14").option("length", "14"),
        ]
    }

    fn operation<'a>(&self, case_id: &str, ds: &'a Dataset) -> Option<Operation<'a>> {
        let op: Operation<'a> = match case_id {
            "sma_14" => Box::new(move || {
                black_box(sma(&ds.close, 14));
            }),
            "ema_14" => Box::new(move || {
                black_box(ema(&ds.close, 14));
            }),
            "rsi_14" => Box::new(move || {
                black_box(rsi(&ds.close, 14));
            }),
            "stoch_14" => Box::new(move || {
                black_box(stoch(&ds.high, &ds.low, &ds.close, 14));
            }),
            "atr_14" => Box::new(move || {
                black_box(atr(&ds.high, &ds.low, &ds.close, 14));
            }),
            "macd_12_26" => Box::new(move || {
                black_box(macd(&ds.close, 12, 26, 9));
            }),
            "macd_12_26_rsi_14" => Box::new(move || {
                black_box(macd(&ds.close, 12, 26, 9));
                black_box(rsi(&ds.close, 14));
            }),
            "aroon_14" => Box::new(move || {
                black_box(aroon(&ds.high, &ds.low, 14));
            }),
            _ => return None,
        };
        Some(op)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close_enough(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_sma_basic() {
        let out = sma(&[1.0, 2.0, 3.0, 4.0, 5.0], 3);
        assert!(out[0].is_nan() && out[1].is_nan());
        assert!(close_enough(out[2], 2.0));
        assert!(close_enough(out[4], 4.0));
    }

    #[test]
    fn test_ema_seeded_with_sma() {
        let out = ema(&[1.0, 2.0, 3.0, 4.0], 3);
        assert!(close_enough(out[2], 2.0));
        assert!(close_enough(out[3], 0.5 * 4.0 + 0.5 * 2.0));
    }

    #[test]
    fn test_rsi_monotonic_rise_is_100() {
        let src: Vec<f64> = (0..40).map(|i| i as f64).collect();
        let out = rsi(&src, 14);
        assert!(out[13].is_nan());
        assert_eq!(out[14], 100.0);
        assert_eq!(out[39], 100.0);
    }

    #[test]
    fn test_rolling_extremes() {
        let src = [3.0, 1.0, 4.0, 1.0, 5.0, 9.0, 2.0, 6.0];
        let hi = highest(&src, 3);
        let lo = lowest(&src, 3);
        assert_eq!(&hi[2..], &[4.0, 4.0, 5.0, 9.0, 9.0, 9.0]);
        assert_eq!(&lo[2..], &[1.0, 1.0, 1.0, 1.0, 2.0, 2.0]);
    }

    #[test]
    fn test_stoch_range() {
        let high = [2.0, 3.0, 4.0, 5.0];
        let low = [1.0, 1.5, 2.0, 2.5];
        let close = [1.5, 2.0, 4.0, 3.0];
        let out = stoch(&high, &low, &close, 2);
        assert!(out[0].is_nan());
        assert!(close_enough(out[2], 100.0 * (4.0 - 1.5) / (4.0 - 1.5)));
        assert!(close_enough(out[3], 100.0 * (3.0 - 2.0) / (5.0 - 2.0)));
    }

    #[test]
    fn test_aroon_latest_high() {
        let high = [1.0, 2.0, 3.0, 4.0];
        let low = [4.0, 3.0, 2.0, 1.0];
        let (up, down) = aroon(&high, &low, 2);
        assert_eq!(up[3], 100.0);
        assert_eq!(down[3], 100.0);
        assert!(up[1].is_nan());
    }

    #[test]
    fn test_every_case_has_an_operation() {
        let ds = crate::dataset::generate_linear(64);
        let provider = BatchProvider;
        for spec in provider.cases() {
            let mut op = provider.operation(&spec.id, &ds).unwrap();
            op();
        }
        assert!(provider.operation("dmi_14", &ds).is_none());
    }
}
