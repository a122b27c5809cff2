pub mod aggregate;
pub mod chart;
pub mod dataset;
pub mod error;
pub mod harness;
pub mod provider;
pub mod providers;
pub mod report;
pub mod schema;
pub mod suite;

pub use error::{Error, Result};
