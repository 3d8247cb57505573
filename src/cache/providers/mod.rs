//! Cache provider implementations

pub mod moka;
pub mod noop;

#[cfg(feature = "cache-redis")]
pub mod redis;

pub use self::moka::MokaCacheService;
pub use noop::NoOpCacheService;

#[cfg(feature = "cache-redis")]
pub use self::redis::RedisCacheService;
