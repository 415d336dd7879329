mod relationship_store;
mod remote_operation;

pub use relationship_store::*;
pub use remote_operation::*;
