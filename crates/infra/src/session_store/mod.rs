//! Session store backends beyond the in-process one shipped by
//! `sessiongate-auth`.

#[cfg(feature = "redis")]
pub mod redis;

#[cfg(feature = "redis")]
pub use self::redis::RedisSessionStore;
