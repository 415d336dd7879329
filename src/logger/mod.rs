//! Thin wrapper over `tracing-subscriber`. See `bin/loopback_demo.rs` for it
//! running against a real endpoint.

mod logger;
pub use logger::*;

pub use tracing::{debug, error, info, trace, warn};
