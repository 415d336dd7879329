mod client;
mod event_consumer_impl;
mod event_handler_impl;
mod port;

pub use client::*;
pub use event_consumer_impl::*;
pub use event_handler_impl::*;
pub use port::*;
