#![allow(clippy::result_large_err)]

pub mod driver;
pub mod sources;
pub mod stream;

pub use driver::{RedisConnection, RedisDriver, RedisProfile, sanitize_uri};
pub use sources::{RedisHashSource, RedisZSetSource};
pub use stream::RedisStreamApi;
