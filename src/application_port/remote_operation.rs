use crate::domain_port::{Channel, ChannelFault};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::marker::PhantomData;

/// A named invocation executed over one channel.
///
/// Carries no mutable state of its own; the executor owns the deadline and
/// the channel lifetime.
#[async_trait::async_trait]
pub trait RemoteOperation: Send {
    type Output: Send;

    /// Operation name, used for routing and logging.
    fn name(&self) -> &str;

    async fn invoke(self, channel: &mut dyn Channel) -> Result<Self::Output, ChannelFault>;
}

/// Request with a JSON payload whose reply decodes into `T`.
pub struct JsonCall<T> {
    name: String,
    payload: Value,
    _reply: PhantomData<fn() -> T>,
}

impl<T> JsonCall<T> {
    pub fn new(name: impl Into<String>, payload: Value) -> Self {
        Self {
            name: name.into(),
            payload,
            _reply: PhantomData,
        }
    }

    pub fn with_payload<P: Serialize>(
        name: impl Into<String>,
        payload: &P,
    ) -> Result<Self, serde_json::Error> {
        Ok(Self::new(name, serde_json::to_value(payload)?))
    }
}

#[async_trait::async_trait]
impl<T> RemoteOperation for JsonCall<T>
where
    T: DeserializeOwned + Send,
{
    type Output = T;

    fn name(&self) -> &str {
        &self.name
    }

    async fn invoke(self, channel: &mut dyn Channel) -> Result<T, ChannelFault> {
        let reply = channel.invoke(&self.name, self.payload).await?;
        serde_json::from_value(reply)
            .map_err(|e| ChannelFault::Protocol(format!("undecodable reply to {}: {e}", self.name)))
    }
}
