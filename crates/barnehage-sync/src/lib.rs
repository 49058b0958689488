//! Sync layer: the availability page fetch and the barnehagefakta bootstrap.

#[cfg(feature = "http")]
pub mod http;

#[cfg(feature = "http")]
pub mod bootstrap;

#[cfg(feature = "http")]
pub use bootstrap::{BootstrapClient, map_kindergarten};
#[cfg(feature = "http")]
pub use http::{PageClient, SyncError};
