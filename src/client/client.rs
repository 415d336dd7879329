use crate::application_impl::*;
use crate::application_port::*;
use crate::client::*;
use crate::domain_model::SessionContext;
use crate::domain_port::ChannelFactory;
use crate::infra_tcp::TcpChannelFactory;
use crate::logger::*;
use crate::settings::Settings;
use serde_json::json;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Everything one authenticated session needs: the RPC executor, the
/// pending-request store and the notification pipeline feeding it.
pub struct Client {
    pub rpc_executor: Arc<RpcExecutor>,
    pub relationship_store: Arc<dyn RelationshipStore>,
    session: SessionContext,
    notifications: mpsc::Sender<Vec<u8>>,
    consumer_handle: Mutex<Option<JoinHandle<()>>>,
    cancel: CancellationToken,
}

impl Client {
    pub async fn try_new(settings: &Settings, session: SessionContext) -> anyhow::Result<Self> {
        if session.user_id.is_empty() {
            return Err(anyhow::anyhow!("session user id must not be empty"));
        }

        let channel_factory: Arc<dyn ChannelFactory> = match settings.rpc.backend.as_str() {
            "fake" => Arc::new(FakeChannelFactory::new(FakeBehavior::Echo)),
            "tcp" => Arc::new(TcpChannelFactory::new()),
            other => return Err(anyhow::anyhow!("Unknown rpc backend: {}", other)),
        };

        let rpc_config = RpcConfig {
            endpoint: settings.rpc.endpoint.clone(),
            default_deadline: Duration::from_millis(settings.rpc.default_deadline_ms),
            close_timeout: Duration::from_millis(settings.rpc.close_timeout_ms),
        };
        let rpc_executor = Arc::new(RpcExecutor::new(
            channel_factory,
            rpc_config,
            Handle::current(),
        ));

        let relationship_store: Arc<dyn RelationshipStore> =
            match settings.relationship.pending_ttl_secs {
                Some(ttl) => Arc::new(InMemoryRelationshipStore::with_expiry(
                    Duration::from_secs(ttl),
                )),
                None => Arc::new(InMemoryRelationshipStore::new()),
            };

        // region notification pipeline
        let cancel = CancellationToken::new();

        let (notifications, queue) = mpsc::channel(settings.relationship.notification_buffer.max(1));
        let consumer: Arc<dyn EventConsumer> =
            Arc::new(ChannelEventConsumer::new(queue, cancel.clone()));
        let handler: Arc<dyn EventHandler> = Arc::new(RelationshipEventHandler::new(
            relationship_store.clone(),
            session.clone(),
        ));

        let consumer_handle = tokio::spawn(async move {
            if let Err(e) = consumer.run(handler).await {
                tracing::error!(error = ?e, "notification consumer stopped");
            }
        });
        // endregion

        info!(backend = %settings.rpc.backend, "client session started");

        Ok(Self {
            rpc_executor,
            relationship_store,
            session,
            notifications,
            consumer_handle: Mutex::new(Some(consumer_handle)),
            cancel,
        })
    }

    pub fn session(&self) -> &SessionContext {
        &self.session
    }

    /// Entry point for the notification dispatcher.
    pub fn notification_sender(&self) -> mpsc::Sender<Vec<u8>> {
        self.notifications.clone()
    }

    /// Round trip used to check the endpoint is reachable.
    pub async fn ping(&self) -> Result<serde_json::Value, crate::domain_model::ServiceFailure> {
        self.rpc_executor
            .call(JsonCall::new("session.ping", json!({})))
            .await
    }

    /// Stops the notification pipeline and forgets every pending request.
    pub async fn logout(&self) {
        self.shutdown().await;
        self.relationship_store.clear();
        info!("client session logged out");
    }

    pub async fn shutdown(&self) {
        self.cancel.cancel();

        let handle = match self.consumer_handle.lock() {
            Ok(mut lock) => lock.take(),
            Err(_) => None,
        };
        if let Some(handle) = handle {
            let r = handle.await;
            debug!("notification consumer joined: {:?}", r);
        }
    }
}
