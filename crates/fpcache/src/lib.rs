//! Fingerprint-based cache invalidation for pipeline functions.
//!
//! [`CacheSession`] ties the pieces together: it registers function sources,
//! builds the dependency graph, fingerprints functions on demand and decides
//! whether a stored result may be reused.
//!
//! ```no_run
//! use fpcache::{CacheConfig, CacheSession, LookupRequest};
//! use fpcache_core::FunctionSource;
//!
//! # fn main() -> Result<(), fpcache::CacheError> {
//! fpcache::logging::init_tracing();
//! let config = CacheConfig::from_env()?;
//! let session = CacheSession::new(
//!     vec![
//!         FunctionSource::new("readData", "function() { x <- 1 }"),
//!         FunctionSource::new("calcExample", "function() { readData() }"),
//!     ],
//!     config,
//! )?;
//! let mut store = session.open_store()?;
//! let lookup = session.lookup(&store, &LookupRequest::new("calcExample"))?;
//! if lookup.entry.is_none() {
//!     session.store_result(&mut store, &LookupRequest::new("calcExample"), serde_json::json!(42))?;
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod decision;
pub mod error;
pub mod logging;
pub mod session;

pub use config::CacheConfig;
pub use decision::{CacheDecision, CacheDecisionEngine, CacheKind};
pub use error::CacheError;
pub use session::{CacheLookup, CacheSession, LookupRequest};
