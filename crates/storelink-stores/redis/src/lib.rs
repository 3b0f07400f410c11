mod factory;
mod redis_store;

pub use factory::RedisConnectorFactory;
pub use redis_store::{parse_logical_index, PoolConfig, RedisConfig, RedisConnector, RedisStore};
