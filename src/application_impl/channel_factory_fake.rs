use crate::domain_port::{Channel, ChannelFactory, ChannelFault};
use serde_json::Value;
use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Scripted reaction of every channel the fake factory hands out.
#[derive(Debug, Clone)]
pub enum FakeBehavior {
    /// Replies with the request payload.
    Echo,
    Respond(Value),
    RemoteFault { code: String, message: String },
    /// Invocation fails as if the peer refused the connection.
    Refuse,
    /// Invocation never completes.
    Hang,
    /// The factory cannot produce a channel at all.
    FailOpen,
    /// The server turns the connection down with a business fault.
    RejectOpen { code: String, message: String },
    /// Replies, then fails the graceful close.
    FailClose(Value),
}

#[derive(Debug, Default, Clone, Copy, Eq, PartialEq)]
pub struct FakeStats {
    pub opened: usize,
    pub invoked: usize,
    pub closed: usize,
    pub aborted: usize,
}

#[derive(Debug, Default)]
struct Counters {
    opened: AtomicUsize,
    invoked: AtomicUsize,
    closed: AtomicUsize,
    aborted: AtomicUsize,
}

#[derive(Debug)]
pub struct FakeChannelFactory {
    behavior: FakeBehavior,
    counters: Arc<Counters>,
}

impl FakeChannelFactory {
    pub fn new(behavior: FakeBehavior) -> Self {
        Self {
            behavior,
            counters: Arc::new(Counters::default()),
        }
    }

    pub fn stats(&self) -> FakeStats {
        FakeStats {
            opened: self.counters.opened.load(Ordering::SeqCst),
            invoked: self.counters.invoked.load(Ordering::SeqCst),
            closed: self.counters.closed.load(Ordering::SeqCst),
            aborted: self.counters.aborted.load(Ordering::SeqCst),
        }
    }
}

#[async_trait::async_trait]
impl ChannelFactory for FakeChannelFactory {
    async fn open(&self, _endpoint: &str) -> Result<Box<dyn Channel>, ChannelFault> {
        match &self.behavior {
            FakeBehavior::FailOpen => {
                return Err(ChannelFault::Other(anyhow::anyhow!(
                    "simulated channel factory failure"
                )));
            }
            FakeBehavior::RejectOpen { code, message } => {
                return Err(ChannelFault::Remote {
                    code: code.clone(),
                    message: message.clone(),
                });
            }
            _ => {}
        }
        self.counters.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeChannel {
            behavior: self.behavior.clone(),
            counters: self.counters.clone(),
            released: false,
        }))
    }
}

struct FakeChannel {
    behavior: FakeBehavior,
    counters: Arc<Counters>,
    released: bool,
}

#[async_trait::async_trait]
impl Channel for FakeChannel {
    async fn invoke(&mut self, _operation: &str, payload: Value) -> Result<Value, ChannelFault> {
        if self.released {
            return Err(ChannelFault::Faulted("channel already released".into()));
        }
        self.counters.invoked.fetch_add(1, Ordering::SeqCst);
        match &self.behavior {
            FakeBehavior::Echo => Ok(payload),
            FakeBehavior::Respond(value) | FakeBehavior::FailClose(value) => Ok(value.clone()),
            FakeBehavior::RemoteFault { code, message } => Err(ChannelFault::Remote {
                code: code.clone(),
                message: message.clone(),
            }),
            FakeBehavior::Refuse => Err(ChannelFault::Transport(io::Error::from(
                io::ErrorKind::ConnectionRefused,
            ))),
            FakeBehavior::Hang => std::future::pending().await,
            FakeBehavior::FailOpen | FakeBehavior::RejectOpen { .. } => Err(ChannelFault::InvalidState(
                "channel should never have been opened".into(),
            )),
        }
    }

    async fn close(&mut self) -> Result<(), ChannelFault> {
        if let FakeBehavior::FailClose(_) = self.behavior {
            return Err(ChannelFault::Transport(io::Error::from(
                io::ErrorKind::BrokenPipe,
            )));
        }
        self.released = true;
        self.counters.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn abort(&mut self) {
        if !self.released {
            self.released = true;
            self.counters.aborted.fetch_add(1, Ordering::SeqCst);
        }
    }
}
