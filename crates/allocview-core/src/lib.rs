pub mod config;
pub mod duration;

pub use config::{
    AllocviewConfig, ClusterConfig, DecidersConfig, ExplainConfig, ServerConfig, TenancyConfig,
    TenancyMode,
};
pub use duration::parse_duration;
