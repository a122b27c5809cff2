use std::collections::BTreeMap;

use crate::dataset::Dataset;

/// A zero-argument timed callback, closed over a borrowed dataset.
pub type Operation<'a> = Box<dyn FnMut() + 'a>;

/// Declaration of one benchmarked operation.
#[derive(Clone, Debug, PartialEq)]
pub struct CaseSpec {
    pub id: String,
    /// Nominal count is divided by this before truncation.
    pub divisor: f64,
    pub options: BTreeMap<String, String>,
}

impl CaseSpec {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            divisor: 1.0,
            options: BTreeMap::new(),
        }
    }

    pub fn scaled(mut self, divisor: f64) -> Self {
        self.divisor = divisor;
        self
    }

    pub fn option(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }

    pub fn iterations(&self, nominal: f64) -> f64 {
        nominal / self.divisor
    }
}

/// An interchangeable implementation of a set of indicator computations.
pub trait Provider {
    /// Stable id used as the persisted report id and the registry key.
    fn id(&self) -> &str;

    /// Cases in the order they are benchmarked.
    fn cases(&self) -> Vec<CaseSpec>;

    /// Build the timed callback for `case_id`, or `None` if the provider does not know it.
    fn operation<'a>(&self, case_id: &str, dataset: &'a Dataset) -> Option<Operation<'a>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_case_spec_scaling() {
        let spec = CaseSpec::new("atr_14").scaled(100.0).option("length", "14");
        assert_eq!(spec.iterations(1.0), 0.01);
        assert_eq!(spec.iterations(1_000.0), 10.0);
        assert_eq!(spec.options.get("length").map(String::as_str), Some("14"));
        assert_eq!(CaseSpec::new("sma_14").iterations(100.0), 100.0);
    }
}
