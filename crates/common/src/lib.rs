pub mod cache;
pub mod channel_config;
pub mod clock;
pub mod config;
pub mod metrics;
pub mod routing;
pub mod types;

pub use channel_config::ChannelConfig;
pub use routing::{distribute, distribute_all, DistributionMap, Targets};
pub use types::{ChannelType, DeliveryReport, FailureEntry, Subscription};
