pub mod announcement;
pub mod cluster_name;
pub mod error;
pub mod invoker_cache;
pub mod routing;
pub mod store;
pub mod strategy;
