mod tcp_channel;
mod wire;

pub use tcp_channel::*;
pub use wire::*;
