//! Built-in indicator providers.

pub mod batch;
pub mod incremental;
pub mod naive;

use clap::ValueEnum;

use crate::provider::Provider;

pub use batch::BatchProvider;
pub use incremental::IncrementalProvider;
pub use naive::NaiveProvider;

/// Provider selection for the runner.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum ProviderKind {
    Incremental,
    Batch,
    Naive,
}

impl ProviderKind {
    pub fn all() -> [ProviderKind; 3] {
        [ProviderKind::Incremental, ProviderKind::Batch, ProviderKind::Naive]
    }

    pub fn build(&self) -> Box<dyn Provider> {
        match self {
            ProviderKind::Incremental => Box::new(IncrementalProvider),
            ProviderKind::Batch => Box::new(BatchProvider),
            ProviderKind::Naive => Box::new(NaiveProvider),
        }
    }
}
