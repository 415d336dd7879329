mod channel_factory_fake;
mod error_classifier;
mod relationship_store_impl;
mod rpc_executor_impl;

pub use channel_factory_fake::*;
pub use error_classifier::*;
pub use relationship_store_impl::*;
pub use rpc_executor_impl::*;
