//! # Cache Module
//!
//! Storage for fallback results and the published health summary.
//!
//! ## Architecture
//!
//! ```text
//! ResultCache                     <- two-tier cache used by the fallback executor
//!   ├── moka in-process tier      <- bounded, entries fresh for ≤ 5 minutes
//!   └── Arc<dyn CacheService>     <- external store, "fallback:<cacheKey>"
//!         └── CacheProvider (enum)
//!               ├── Redis(RedisCacheService)   <- feature "cache-redis"
//!               ├── Moka(MokaCacheService)
//!               └── NoOp(NoOpCacheService)     <- always-miss default
//! ```
//!
//! ## Design Decisions
//!
//! - **Graceful degradation**: unreachable backend → NoOp, never blocks startup
//! - **Best-effort writes**: cache errors logged through [`best_effort`], never propagated
//! - **Bounded I/O**: every external call runs under a short timeout

pub mod errors;
pub mod provider;
pub mod providers;
pub mod result_cache;
pub mod traits;

pub use errors::{CacheError, CacheResult};
pub use provider::CacheProvider;
pub use providers::{MokaCacheService, NoOpCacheService};
pub use result_cache::{best_effort, fallback_key, ResultCache, FALLBACK_KEY_PREFIX};
pub use traits::CacheService;

#[cfg(feature = "cache-redis")]
pub use providers::RedisCacheService;
