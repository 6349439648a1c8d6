pub mod broadcast;
pub mod fanout;
pub mod redis_stream;

pub use broadcast::{BroadcastEventPublisher, PublishedEvent};
pub use fanout::FanoutPublisher;
pub use redis_stream::RedisEventPublisher;
