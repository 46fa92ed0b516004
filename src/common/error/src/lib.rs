//! Error types and result aliases for Sieve.

mod error;

pub use error::{SieveError, SieveResult};
