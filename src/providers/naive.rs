//! Window-recomputing indicators.
//!
//! Every output bar rescans its whole lookback window, so cost grows with
//! `bars * length`. Only a subset of the cases is implemented.

use std::hint::black_box;

use crate::dataset::Dataset;
use crate::provider::{CaseSpec, Operation, Provider};

fn windows(len: usize, length: usize) -> impl Iterator<Item = (usize, std::ops::Range<usize>)> {
    (0..len).filter(move |&i| i + 1 >= length).map(move |i| (i, i + 1 - length..i + 1))
}

pub fn sma(src: &[f64], length: usize) -> Vec<f64> {
    let mut out = vec![f64::NAN; src.len()];
    for (i, w) in windows(src.len(), length) {
        out[i] = src[w].iter().sum::<f64>() / length as f64;
    }
    out
}

/// Cutler's RSI: simple averages of gains and losses over the window.
pub fn rsi(src: &[f64], length: usize) -> Vec<f64> {
    let mut out = vec![f64::NAN; src.len()];
    for i in length..src.len() {
        let (mut up, mut down) = (0.0, 0.0);
        for j in i + 1 - length..=i {
            let change = src[j] - src[j - 1];
            if change > 0.0 {
                up += change;
            } else {
                down -= change;
            }
        }
        out[i] = if down == 0.0 {
            100.0
        } else {
            100.0 - 100.0 / (1.0 + up / down)
        };
    }
    out
}

pub fn stoch(high: &[f64], low: &[f64], close: &[f64], length: usize) -> Vec<f64> {
    let mut out = vec![f64::NAN; close.len()];
    for (i, w) in windows(close.len(), length) {
        let hh = high[w.clone()].iter().copied().fold(f64::MIN, f64::max);
        let ll = low[w].iter().copied().fold(f64::MAX, f64::min);
        if hh > ll {
            out[i] = 100.0 * (close[i] - ll) / (hh - ll);
        }
    }
    out
}

/// Simple average of the true range over the window.
pub fn atr(high: &[f64], low: &[f64], close: &[f64], length: usize) -> Vec<f64> {
    let mut out = vec![f64::NAN; close.len()];
    for (i, w) in windows(close.len(), length) {
        let mut total = 0.0;
        for j in w {
            total += if j == 0 {
                high[0] - low[0]
            } else {
                (high[j] - low[j])
                    .max((high[j] - close[j - 1]).abs())
                    .max((low[j] - close[j - 1]).abs())
            };
        }
        out[i] = total / length as f64;
    }
    out
}

pub fn aroon(high: &[f64], low: &[f64], length: usize) -> (Vec<f64>, Vec<f64>) {
    let mut up = vec![f64::NAN; high.len()];
    let mut down = vec![f64::NAN; high.len()];
    for (i, w) in windows(high.len(), length + 1) {
        let start = w.start;
        let hi_at = w
            .clone()
            .fold(start, |best, j| if high[j] >= high[best] { j } else { best });
        let lo_at = w.fold(start, |best, j| if low[j] <= low[best] { j } else { best });
        up[i] = 100.0 * (hi_at - start) as f64 / length as f64;
        down[i] = 100.0 * (lo_at - start) as f64 / length as f64;
    }
    (up, down)
}

/// Recomputes every window from scratch; expensive cases run fewer trials.
#[derive(Clone, Copy, Debug, Default)]
pub struct NaiveProvider;

impl Provider for NaiveProvider {
    fn id(&self) -> &str {
        "naive"
    }

    fn cases(&self) -> Vec<CaseSpec> {
        vec![
            CaseSpec::new("sma_14").option("length", "14"),
            CaseSpec::new("rsi_14").scaled(10.0).option("length", "14"),
            CaseSpec::new("stoch_14").option("length", "14"),
            CaseSpec::new("atr_14").scaled(100.0).option("length", "14"),
            CaseSpec::new("aroon_14").scaled(10.0).option("length", "14"),
        ]
    }

    fn operation<'a>(&self, case_id: &str, ds: &'a Dataset) -> Option<Operation<'a>> {
        let op: Operation<'a> = match case_id {
            "sma_14" => Box::new(move || {
                black_box(sma(&ds.close, 14));
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
            "aroon_14" => Box::new(move || {
                black_box(aroon(&ds.high, &ds.low, 14));
            }),
            _ => return None,
        };
        Some(op)
    }
}
