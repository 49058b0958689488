//! Storage layer: DuckDB (durable) and in-memory registry stores.

mod error;
pub use error::StoreError;

mod memory;
pub use memory::MemoryStore;

pub mod query;
pub use query::{ListingFilter, ListingPage, Near};

#[cfg(feature = "duckdb")]
mod duck;
#[cfg(feature = "duckdb")]
pub use duck::DuckStore;
