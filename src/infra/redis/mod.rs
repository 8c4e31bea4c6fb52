pub mod cache;
pub mod expiry;

pub use cache::RedisCache;
pub use expiry::RedisExpirySubscriber;
