//! # warden-sync: Registry gateway
//!
//! Translates committed policies and policy sets into registry
//! create/replace/delete calls and serves cached reads.
//!
//! ```text
//! Gateway<T: Transport, C: ReadCache>
//!   │  compile (warden_abac::wire)
//!   ▼
//! Transport ──► registry (/policy-set, /admin/policy-set)
//!   │
//!   ▼  2xx
//! ReadCache::invalidate(keys)  ──►  decode echoed entity  ──►  Result<Option<Entity>, SyncError>
//! ```
//!
//! Reads go through the cache: a miss fetches, parses and stores unless an
//! invalidation ran while the fetch was in flight. A parse failure on a read
//! is returned as [`SyncError::Parse`] and nothing is cached.

pub mod cache;
pub mod error;
pub mod gateway;
pub mod http;
pub mod transport;

#[cfg(any(test, feature = "testing"))]
pub mod testing;


pub use cache::{CacheKey, CachedRead, ReadCache, SieveReadCache};
pub use error::{Result, SyncError, TransportError};
pub use gateway::{Gateway, ListFilter, Scope};
pub use http::{HttpConfig, HttpTransport};
pub use transport::{Method, Request, Response, Transport};
