pub mod about;
pub mod annotation;
pub mod config;
pub mod ensembl;
pub mod error;
pub mod gene;
pub mod karyotype;
pub mod occurrences;
pub mod pipeline;
pub mod resolver;
pub mod tables;
pub mod tie_breaker;

#[cfg(test)]
pub(crate) mod testing;

pub use error::{ErrorCode, ResolveError, ResolveResult};
pub use gene::{GeneAnnotation, GeneId, Resolution, Species};
