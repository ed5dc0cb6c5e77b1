pub mod cron;
pub mod error;
pub mod model;
pub mod paths;
pub mod persist;
pub mod render;
pub mod service;

pub use cron::{parse_cron, CronField, CronSchedule};
pub use error::{Result, ServiceError};
pub use model::{
    CommandLine, KeepAlive, KeepAliveConditions, Platform, ProcessType, RunSpec, RunType, Sockets,
};
pub use paths::{expand_tilde, LocalPaths, Owner};
pub use persist::{deserialize, serialize, PersistedService};
pub use render::{Dictionary, PlistValue};
pub use service::{Service, ServiceBuilder, ServiceSettings};

// Placeholder tokens written into persisted services in place of local paths
pub const PREFIX_PLACEHOLDER: &str = "$SVCDEF_PREFIX";
pub const HOME_PLACEHOLDER: &str = "$HOME";

// Installation root used when none is configured
pub const DEFAULT_PREFIX: &str = "/usr/local";
