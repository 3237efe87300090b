pub mod cache;
pub mod cli;
pub mod config;
pub mod embedding;
pub mod error;
pub mod export;
pub mod matcher;

pub use boq_matcher_common as common;
pub use error::{BoqMatchError, Result};
pub use matcher::{FallbackReason, MatchStep, MatchingService};
