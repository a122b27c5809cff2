//! Bar-by-bar streaming indicators.
//!
//! Each indicator keeps just enough state to produce its value for the newest bar, the
//! way a live feed would consume them. Outputs are `NaN` until the lookback is filled.

use std::collections::VecDeque;
use std::hint::black_box;

use crate::dataset::Dataset;
use crate::provider::{CaseSpec, Operation, Provider};

pub trait Incremental<I, O> {
    fn next(&mut self, input: I) -> O;
}

pub struct Sma {
    length: usize,
    window: VecDeque<f64>,
    sum: f64,
}

impl Sma {
    pub fn new(length: usize) -> Self {
        Self {
            length,
            window: VecDeque::with_capacity(length + 1),
            sum: 0.0,
        }
    }
}

impl Incremental<f64, f64> for Sma {
    fn next(&mut self, value: f64) -> f64 {
        self.window.push_back(value);
        self.sum += value;
        if self.window.len() > self.length {
            if let Some(old) = self.window.pop_front() {
                self.sum -= old;
            }
        }
        if self.window.len() == self.length {
            self.sum / self.length as f64
        } else {
            f64::NAN
        }
    }
}

/// Exponential smoothing seeded with a simple average of the first `length` inputs.
pub struct Smoothed {
    alpha: f64,
    seed: Sma,
    prev: Option<f64>,
}

impl Smoothed {
    pub fn ema(length: usize) -> Self {
        Self {
            alpha: 2.0 / (length as f64 + 1.0),
            seed: Sma::new(length),
            prev: None,
        }
    }

    /// Wilder's moving average.
    pub fn rma(length: usize) -> Self {
        Self {
            alpha: 1.0 / length as f64,
            seed: Sma::new(length),
            prev: None,
        }
    }
}

impl Incremental<f64, f64> for Smoothed {
    fn next(&mut self, value: f64) -> f64 {
        if value.is_nan() {
            return self.prev.unwrap_or(f64::NAN);
        }
        let out = match self.prev {
            Some(prev) => self.alpha * value + (1.0 - self.alpha) * prev,
            None => self.seed.next(value),
        };
        if !out.is_nan() {
            self.prev = Some(out);
        }
        out
    }
}

pub struct Rsi {
    prev: Option<f64>,
    up: Smoothed,
    down: Smoothed,
}

impl Rsi {
    pub fn new(length: usize) -> Self {
        Self {
            prev: None,
            up: Smoothed::rma(length),
            down: Smoothed::rma(length),
        }
    }
}

impl Incremental<f64, f64> for Rsi {
    fn next(&mut self, value: f64) -> f64 {
        let Some(prev) = self.prev.replace(value) else {
            return f64::NAN;
        };
        let change = value - prev;
        let u = self.up.next(change.max(0.0));
        let d = self.down.next((-change).max(0.0));
        if u.is_nan() || d.is_nan() {
            f64::NAN
        } else if d == 0.0 {
            100.0
        } else if u == 0.0 {
            0.0
        } else {
            100.0 - 100.0 / (1.0 + u / d)
        }
    }
}

/// Fixed-size ring of the latest values.
struct Window {
    length: usize,
    values: VecDeque<f64>,
}

impl Window {
    fn new(length: usize) -> Self {
        Self {
            length,
            values: VecDeque::with_capacity(length + 1),
        }
    }

    fn push(&mut self, value: f64) -> bool {
        self.values.push_back(value);
        if self.values.len() > self.length {
            self.values.pop_front();
        }
        self.values.len() == self.length
    }
}

pub struct Stoch {
    high: Window,
    low: Window,
}

impl Stoch {
    pub fn new(length: usize) -> Self {
        Self {
            high: Window::new(length),
            low: Window::new(length),
        }
    }
}

impl Incremental<(f64, f64, f64), f64> for Stoch {
    fn next(&mut self, (high, low, close): (f64, f64, f64)) -> f64 {
        let full = self.high.push(high) & self.low.push(low);
        if !full {
            return f64::NAN;
        }
        let hh = self.high.values.iter().copied().fold(f64::MIN, f64::max);
        let ll = self.low.values.iter().copied().fold(f64::MAX, f64::min);
        let range = hh - ll;
        if range == 0.0 {
            f64::NAN
        } else {
            100.0 * (close - ll) / range
        }
    }
}

pub struct Atr {
    prev_close: Option<f64>,
    rma: Smoothed,
}

impl Atr {
    pub fn new(length: usize) -> Self {
        Self {
            prev_close: None,
            rma: Smoothed::rma(length),
        }
    }
}

impl Incremental<(f64, f64, f64), f64> for Atr {
    fn next(&mut self, (high, low, close): (f64, f64, f64)) -> f64 {
        let tr = match self.prev_close.replace(close) {
            Some(prev) => (high - low)
                .max((high - prev).abs())
                .max((low - prev).abs()),
            None => high - low,
        };
        self.rma.next(tr)
    }
}

pub struct Macd {
    fast: Smoothed,
    slow: Smoothed,
    signal: Smoothed,
}

impl Macd {
    pub fn new(fast: usize, slow: usize, signal: usize) -> Self {
        Self {
            fast: Smoothed::ema(fast),
            slow: Smoothed::ema(slow),
            signal: Smoothed::ema(signal),
        }
    }
}

impl Incremental<f64, (f64, f64, f64)> for Macd {
    fn next(&mut self, value: f64) -> (f64, f64, f64) {
        let line = self.fast.next(value) - self.slow.next(value);
        let signal = self.signal.next(line);
        (line, signal, line - signal)
    }
}

pub struct Aroon {
    length: usize,
    high: Window,
    low: Window,
}

impl Aroon {
    pub fn new(length: usize) -> Self {
        Self {
            length,
            high: Window::new(length + 1),
            low: Window::new(length + 1),
        }
    }
}

impl Incremental<(f64, f64), (f64, f64)> for Aroon {
    fn next(&mut self, (high, low): (f64, f64)) -> (f64, f64) {
        let full = self.high.push(high) & self.low.push(low);
        if !full {
            return (f64::NAN, f64::NAN);
        }
        let mut hi_at = 0;
        let mut lo_at = 0;
        for (j, (h, l)) in self.high.values.iter().zip(&self.low.values).enumerate() {
            if *h >= self.high.values[hi_at] {
                hi_at = j;
            }
            if *l <= self.low.values[lo_at] {
                lo_at = j;
            }
        }
        let n = self.length as f64;
        let up = 100.0 * (hi_at as f64) / n;
        let down = 100.0 * (lo_at as f64) / n;
        (up, down)
    }
}

/// Feeds every bar through freshly constructed streaming indicators.
#[derive(Clone, Copy, Debug, Default)]
pub struct IncrementalProvider;

impl Provider for IncrementalProvider {
    fn id(&self) -> &str {
        "incremental"
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
                let mut sma = Sma::new(14);
                for &c in &ds.close {
                    black_box(sma.next(c));
                }
            }),
            "ema_14" => Box::new(move || {
                let mut ema = Smoothed::ema(14);
                for &c in &ds.close {
                    black_box(ema.next(c));
                }
            }),
            "rsi_14" => Box::new(move || {
                let mut rsi = Rsi::new(14);
                for &c in &ds.close {
                    black_box(rsi.next(c));
                }
            }),
            "stoch_14" => Box::new(move || {
                let mut stoch = Stoch::new(14);
                for i in 0..ds.bars() {
                    black_box(stoch.next((ds.high[i], ds.low[i], ds.close[i])));
                }
            }),
            "atr_14" => Box::new(move || {
                let mut atr = Atr::new(14);
                for i in 0..ds.bars() {
                    black_box(atr.next((ds.high[i], ds.low[i], ds.close[i])));
                }
            }),
            "macd_12_26" => Box::new(move || {
                let mut macd = Macd::new(12, 26, 9);
                for &c in &ds.close {
                    black_box(macd.next(c));
                }
            }),
            "macd_12_26_rsi_14" => Box::new(move || {
                let mut macd = Macd::new(12, 26, 9);
                let mut rsi = Rsi::new(14);
                for &c in &ds.close {
                    black_box(macd.next(c));
                    black_box(rsi.next(c));
                }
            }),
            "aroon_14" => Box::new(move || {
                let mut aroon = Aroon::new(14);
                for i in 0..ds.bars() {
                    black_box(aroon.next((ds.high[i], ds.low[i])));
                }
            }),
            _ => return None,
        };
        Some(op)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::generate_random_walk;
    use crate::providers::batch;

    fn assert_series_eq(streamed: &[f64], sliced: &[f64]) {
        assert_eq!(streamed.len(), sliced.len());
        for (i, (a, b)) in streamed.iter().zip(sliced).enumerate() {
            if a.is_nan() || b.is_nan() {
                assert!(a.is_nan() && b.is_nan(), "bar {i}: {a} vs {b}");
            } else {
                assert!((a - b).abs() < 1e-9, "bar {i}: {a} vs {b}");
            }
        }
    }

    #[test]
    fn test_matches_batch_computations() {
        let ds = generate_random_walk(300, 11);

        let mut sma = Sma::new(14);
        let mut ema = Smoothed::ema(14);
        let mut rsi = Rsi::new(14);
        let mut atr = Atr::new(14);
        let mut stoch = Stoch::new(14);
        let streamed: Vec<[f64; 5]> = (0..ds.bars())
            .map(|i| {
                let bar = (ds.high[i], ds.low[i], ds.close[i]);
                [
                    sma.next(ds.close[i]),
                    ema.next(ds.close[i]),
                    rsi.next(ds.close[i]),
                    atr.next(bar),
                    stoch.next(bar),
                ]
            })
            .collect();

        let column = |k: usize| streamed.iter().map(|row| row[k]).collect::<Vec<_>>();
        assert_series_eq(&column(0), &batch::sma(&ds.close, 14));
        assert_series_eq(&column(1), &batch::ema(&ds.close, 14));
        assert_series_eq(&column(2), &batch::rsi(&ds.close, 14));
        assert_series_eq(&column(3), &batch::atr(&ds.high, &ds.low, &ds.close, 14));
        assert_series_eq(&column(4), &batch::stoch(&ds.high, &ds.low, &ds.close, 14));
    }

    #[test]
    fn test_aroon_matches_batch() {
        let ds = generate_random_walk(120, 5);
        let mut aroon = Aroon::new(14);
        let (up, down): (Vec<f64>, Vec<f64>) = (0..ds.bars())
            .map(|i| aroon.next((ds.high[i], ds.low[i])))
            .unzip();
        let (b_up, b_down) = batch::aroon(&ds.high, &ds.low, 14);
        assert_series_eq(&up, &b_up);
        assert_series_eq(&down, &b_down);
    }

    #[test]
    fn test_macd_signal_warmup() {
        let mut macd = Macd::new(12, 26, 9);
        let out: Vec<(f64, f64, f64)> = (0..60).map(|i| macd.next(i as f64)).collect();
        assert!(out[24].0.is_nan());
        assert!(!out[25].0.is_nan());
        assert!(out[32].1.is_nan());
        assert!(!out[33].1.is_nan());
    }
}
