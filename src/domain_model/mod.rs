mod failure;
mod relationship;
mod session;

pub use failure::*;
pub use relationship::*;
pub use session::*;
