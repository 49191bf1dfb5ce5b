//! Price oracle and HTTP transport
//!
//! Features:
//! - `HttpFetch` seam over REST/GraphQL endpoints
//! - Batched spot price lookups from a public price API
//! - Per-symbol TTL cache with lock-free reads
//! - Stale-cache and static-table fallback so lookups never fail

pub mod http;
pub mod state;
pub mod oracle;
pub mod mock;

pub use http::{decode_json, HttpFetch, ReqwestHttp};
pub use state::{PriceCache, PriceEntry};
pub use oracle::{price_or, PriceOracle};
pub use mock::MockHttp;
