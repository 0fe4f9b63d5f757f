mod builder;
mod context;
mod error;
mod handler;
mod server;
mod signal;

pub mod compatibility;
pub mod resource;
pub mod rest;

pub use self::builder::merge_versioned_resources_storage_map;
pub use self::builder::Builder;
pub use self::builder::RecommendedConfigFn;
pub use self::builder::DEFAULT_COMPONENT_VERSION;
pub use self::context::RequestContext;
pub use self::error::ApiError;
pub use self::error::BuildError;
pub use self::handler::resource;
pub use self::handler::ApiGroupFn;
pub use self::handler::ResourceHandler;
pub use self::server::ApiGroupInfo;
pub use self::server::ApiServer;
pub use self::server::CompletedConfig;
pub use self::server::PostStartHookContext;
pub use self::server::PostStartHookFn;
pub use self::server::RecommendedConfig;
pub use self::server::SharedInformerFactory;
pub use self::signal::StopSignal;
pub use k8_config::RecommendedOptions;
