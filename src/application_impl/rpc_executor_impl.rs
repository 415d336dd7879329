use crate::application_impl::error_classifier::{classify, into_failure};
use crate::application_port::RemoteOperation;
use crate::domain_model::{FailureCategory, ServiceFailure};
use crate::domain_port::{Channel, ChannelFactory};
use crate::logger::*;
use nanoid::nanoid;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::runtime::Handle;
use tokio::time::sleep_until;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone)]
pub struct RpcConfig {
    pub endpoint: String,
    pub default_deadline: Duration,
    pub close_timeout: Duration,
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            endpoint: "127.0.0.1:7100".to_string(),
            default_deadline: Duration::from_secs(10),
            close_timeout: Duration::from_secs(2),
        }
    }
}

/// Runs one remote operation end-to-end.
///
/// Every call opens its own channel and releases it before returning, so
/// concurrent calls share nothing mutable. Callers only ever see the
/// operation's output or a `ServiceFailure`.
pub struct RpcExecutor {
    channel_factory: Arc<dyn ChannelFactory>,
    config: RpcConfig,
    runtime: Handle,
}

enum Race<T> {
    Completed(T),
    TimedOut,
    Cancelled,
}

/// Aborts the channel unless it was released explicitly, which covers
/// panics and callers dropping the `execute` future.
struct ChannelGuard {
    channel: Box<dyn Channel>,
    released: bool,
}

impl ChannelGuard {
    fn new(channel: Box<dyn Channel>) -> Self {
        Self {
            channel,
            released: false,
        }
    }

    fn channel(&mut self) -> &mut dyn Channel {
        self.channel.as_mut()
    }

    fn abort(&mut self) {
        self.channel.abort();
        self.released = true;
    }
}

impl Drop for ChannelGuard {
    fn drop(&mut self) {
        if !self.released {
            self.channel.abort();
        }
    }
}

impl RpcExecutor {
    pub fn new(channel_factory: Arc<dyn ChannelFactory>, config: RpcConfig, runtime: Handle) -> Self {
        Self {
            channel_factory,
            config,
            runtime,
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.config.endpoint
    }

    pub fn default_deadline(&self) -> Duration {
        self.config.default_deadline
    }

    pub async fn call<O: RemoteOperation>(&self, operation: O) -> Result<O::Output, ServiceFailure> {
        self.execute(operation, self.config.default_deadline).await
    }

    pub async fn execute<O: RemoteOperation>(
        &self,
        operation: O,
        deadline: Duration,
    ) -> Result<O::Output, ServiceFailure> {
        self.execute_with_cancel(operation, deadline, &CancellationToken::new())
            .await
    }

    /// Like `execute`, but `cancel` aborts the call as soon as it fires.
    ///
    /// A cancelled call reports `Timeout`: the server may or may not have
    /// run the operation.
    pub async fn execute_with_cancel<O: RemoteOperation>(
        &self,
        operation: O,
        deadline: Duration,
        cancel: &CancellationToken,
    ) -> Result<O::Output, ServiceFailure> {
        let call_id = nanoid!(10);
        let operation_name = operation.name().to_owned();
        let started = Instant::now();

        let result = self.run(operation, deadline, cancel, &call_id).await;

        log_outcome(&call_id, &operation_name, started.elapsed(), &result);
        result
    }

    /// Blocking form of `execute`, for threads outside the runtime.
    ///
    /// Needs a multi-thread runtime. Any thread that has entered the runtime
    /// context is refused with `InvalidState`, including `spawn_blocking`
    /// pool threads; synchronous callers there should use
    /// `Handle::block_on` on a dedicated thread or switch to `execute`.
    pub fn execute_blocking<O: RemoteOperation>(
        &self,
        operation: O,
        deadline: Duration,
    ) -> Result<O::Output, ServiceFailure> {
        if Handle::try_current().is_ok() {
            let failure =
                ServiceFailure::invalid_state("blocking call issued from inside an async context");
            warn!(
                operation = operation.name(),
                category = %failure.category,
                "rpc refused"
            );
            return Err(failure);
        }
        self.runtime.block_on(self.execute(operation, deadline))
    }

    async fn run<O: RemoteOperation>(
        &self,
        operation: O,
        deadline: Duration,
        cancel: &CancellationToken,
        call_id: &str,
    ) -> Result<O::Output, ServiceFailure> {
        let expires_at = expiry(deadline);

        let opened = tokio::select! {
            biased;
            _ = cancel.cancelled() => Race::Cancelled,
            r = self.channel_factory.open(&self.config.endpoint) => Race::Completed(r),
            _ = sleep_until(expires_at) => Race::TimedOut,
        };
        let mut guard = match opened {
            Race::Completed(Ok(channel)) => ChannelGuard::new(channel),
            Race::Completed(Err(fault)) => {
                // server text stays in the cause, out of the message
                let detail = match classify(&fault) {
                    (FailureCategory::ServiceLogic, _) => "rejected by server".to_string(),
                    (_, detail) => detail,
                };
                return Err(ServiceFailure::communication(format!(
                    "could not acquire channel: {detail}"
                ))
                .with_cause(fault));
            }
            Race::TimedOut => {
                return Err(ServiceFailure::timeout(format!(
                    "no channel within {deadline:?}"
                )));
            }
            Race::Cancelled => return Err(ServiceFailure::timeout("call cancelled")),
        };

        // The in-flight call is dropped with this scope when it loses the race.
        let race = {
            let call = operation.invoke(guard.channel());
            tokio::select! {
                biased;
                _ = cancel.cancelled() => Race::Cancelled,
                r = call => Race::Completed(r),
                _ = sleep_until(expires_at) => Race::TimedOut,
            }
        };

        match race {
            Race::Completed(Ok(output)) => {
                self.release_gracefully(&mut guard, call_id).await;
                Ok(output)
            }
            Race::Completed(Err(fault)) => {
                guard.abort();
                Err(into_failure(fault))
            }
            Race::TimedOut => {
                guard.abort();
                Err(ServiceFailure::timeout(format!("no reply within {deadline:?}")))
            }
            Race::Cancelled => {
                guard.abort();
                Err(ServiceFailure::timeout("call cancelled"))
            }
        }
    }

    /// The call already succeeded; a failing close is logged, not returned.
    async fn release_gracefully(&self, guard: &mut ChannelGuard, call_id: &str) {
        match tokio::time::timeout(self.config.close_timeout, guard.channel().close()).await {
            Ok(Ok(())) => guard.released = true,
            Ok(Err(fault)) => {
                guard.abort();
                warn!(call_id, error = %fault, "graceful close failed, channel aborted");
            }
            Err(_) => {
                guard.abort();
                warn!(call_id, "graceful close timed out, channel aborted");
            }
        }
    }
}

/// Deadlines past the clock's range, such as `Duration::MAX`, never fire.
fn expiry(deadline: Duration) -> tokio::time::Instant {
    let now = tokio::time::Instant::now();
    now.checked_add(deadline)
        .unwrap_or_else(|| now + Duration::from_secs(86_400 * 365 * 30))
}

/// One line per call. Payloads, identities and server messages stay out of
/// the log; only unclassified faults carry their full detail.
fn log_outcome<T>(
    call_id: &str,
    operation: &str,
    elapsed: Duration,
    result: &Result<T, ServiceFailure>,
) {
    let elapsed_ms = elapsed.as_millis() as u64;
    let failure = match result {
        Ok(_) => {
            debug!(call_id, operation, elapsed_ms, "rpc succeeded");
            return;
        }
        Err(failure) => failure,
    };

    let category = failure.category;
    match category {
        FailureCategory::ServiceLogic => {
            info!(call_id, operation, elapsed_ms, %category, "rpc rejected by server");
        }
        FailureCategory::Communication | FailureCategory::Timeout | FailureCategory::InvalidState => {
            warn!(call_id, operation, elapsed_ms, %category, detail = %failure.message, "rpc failed");
        }
        FailureCategory::Unknown | FailureCategory::None => {
            error!(
                call_id,
                operation,
                elapsed_ms,
                %category,
                detail = %failure.message,
                cause = ?failure.cause(),
                "rpc failed with unclassified fault"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application_impl::{FakeBehavior, FakeChannelFactory};
    use crate::application_port::JsonCall;
    use serde_json::json;

    fn executor(factory: Arc<FakeChannelFactory>) -> RpcExecutor {
        RpcExecutor::new(factory, RpcConfig::default(), Handle::current())
    }

    fn ping() -> JsonCall<serde_json::Value> {
        JsonCall::new("session.ping", json!({}))
    }

    #[tokio::test]
    async fn success_closes_channel() {
        let factory = Arc::new(FakeChannelFactory::new(FakeBehavior::Respond(json!({"pong": 1}))));
        let reply = executor(factory.clone())
            .execute(ping(), Duration::from_secs(1))
            .await
            .unwrap();

        assert_eq!(reply, json!({"pong": 1}));
        assert_eq!(factory.stats().opened, 1);
        assert_eq!(factory.stats().closed, 1);
        assert_eq!(factory.stats().aborted, 0);
    }

    #[tokio::test]
    async fn unbounded_deadline_completes() {
        let factory = Arc::new(FakeChannelFactory::new(FakeBehavior::Echo));
        let reply = executor(factory.clone())
            .execute(JsonCall::<u32>::new("lobby.count", json!(3)), Duration::MAX)
            .await
            .unwrap();

        assert_eq!(reply, 3);
        assert_eq!(factory.stats().closed, 1);
    }

    #[tokio::test]
    async fn refused_connection_is_communication() {
        let factory = Arc::new(FakeChannelFactory::new(FakeBehavior::Refuse));
        let failure = executor(factory.clone())
            .execute(ping(), Duration::from_secs(1))
            .await
            .unwrap_err();

        assert_eq!(failure.category, FailureCategory::Communication);
        assert_eq!(factory.stats().aborted, 1);
    }

    #[tokio::test]
    async fn business_fault_keeps_server_message() {
        let factory = Arc::new(FakeChannelFactory::new(FakeBehavior::RemoteFault {
            code: "USERNAME_TAKEN".into(),
            message: "username already exists".into(),
        }));
        let failure = executor(factory)
            .execute(ping(), Duration::from_secs(1))
            .await
            .unwrap_err();

        assert_eq!(failure.category, FailureCategory::ServiceLogic);
        assert_eq!(failure.message, "username already exists");
        assert_eq!(failure.user_message(), "username already exists");
    }

    #[tokio::test]
    async fn hanging_call_times_out_and_aborts() {
        let factory = Arc::new(FakeChannelFactory::new(FakeBehavior::Hang));
        let started = Instant::now();
        let failure = executor(factory.clone())
            .execute(ping(), Duration::from_millis(50))
            .await
            .unwrap_err();

        assert_eq!(failure.category, FailureCategory::Timeout);
        assert!(started.elapsed() < Duration::from_secs(5));
        assert_eq!(factory.stats().aborted, 1);
        assert_eq!(factory.stats().closed, 0);
    }

    #[tokio::test]
    async fn failed_open_never_invokes() {
        let factory = Arc::new(FakeChannelFactory::new(FakeBehavior::FailOpen));
        let failure = executor(factory.clone())
            .execute(ping(), Duration::from_secs(1))
            .await
            .unwrap_err();

        assert_eq!(failure.category, FailureCategory::Communication);
        assert_eq!(factory.stats().opened, 0);
        assert_eq!(factory.stats().invoked, 0);
    }

    #[tokio::test]
    async fn rejected_open_keeps_server_text_out_of_message() {
        let factory = Arc::new(FakeChannelFactory::new(FakeBehavior::RejectOpen {
            code: "BANNED".into(),
            message: "account alice suspended".into(),
        }));
        let failure = executor(factory.clone())
            .execute(ping(), Duration::from_secs(1))
            .await
            .unwrap_err();

        assert_eq!(failure.category, FailureCategory::Communication);
        assert!(!failure.message.contains("alice"), "{}", failure.message);
        assert!(failure.cause().is_some());
        assert_eq!(factory.stats().opened, 0);
    }

    #[tokio::test]
    async fn failing_close_does_not_fail_the_call() {
        let factory = Arc::new(FakeChannelFactory::new(FakeBehavior::FailClose(json!(7))));
        let reply = executor(factory.clone())
            .execute(JsonCall::<u32>::new("lobby.count", json!(null)), Duration::from_secs(1))
            .await
            .unwrap();

        assert_eq!(reply, 7);
        assert_eq!(factory.stats().aborted, 1);
    }

    #[tokio::test]
    async fn undecodable_reply_is_communication() {
        let factory = Arc::new(FakeChannelFactory::new(FakeBehavior::Respond(json!("nope"))));
        let failure = executor(factory)
            .execute(JsonCall::<u32>::new("lobby.count", json!(null)), Duration::from_secs(1))
            .await
            .unwrap_err();

        assert_eq!(failure.category, FailureCategory::Communication);
    }

    #[tokio::test]
    async fn cancellation_aborts_immediately() {
        let factory = Arc::new(FakeChannelFactory::new(FakeBehavior::Hang));
        let executor = executor(factory.clone());
        let cancel = CancellationToken::new();

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let failure = executor
            .execute_with_cancel(ping(), Duration::from_secs(30), &cancel)
            .await
            .unwrap_err();

        assert_eq!(failure.category, FailureCategory::Timeout);
        assert_eq!(failure.message, "call cancelled");
        assert_eq!(factory.stats().aborted, 1);
    }

    #[tokio::test]
    async fn blocking_form_refuses_inside_runtime() {
        let factory = Arc::new(FakeChannelFactory::new(FakeBehavior::Respond(json!(1))));
        let failure = executor(factory.clone())
            .execute_blocking(ping(), Duration::from_secs(1))
            .unwrap_err();

        assert_eq!(failure.category, FailureCategory::InvalidState);
        assert_eq!(factory.stats().opened, 0);
    }

    #[test]
    fn blocking_form_outside_runtime() {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .enable_all()
            .build()
            .unwrap();
        let factory = Arc::new(FakeChannelFactory::new(FakeBehavior::Respond(json!(1))));
        let executor = RpcExecutor::new(factory.clone(), RpcConfig::default(), runtime.handle().clone());

        let reply = executor
            .execute_blocking(JsonCall::<u8>::new("session.ping", json!({})), Duration::from_secs(1))
            .unwrap();
        assert_eq!(reply, 1);

        let factory = Arc::new(FakeChannelFactory::new(FakeBehavior::Hang));
        let executor = RpcExecutor::new(factory, RpcConfig::default(), runtime.handle().clone());
        let failure = executor
            .execute_blocking(ping(), Duration::from_millis(30))
            .unwrap_err();
        assert_eq!(failure.category, FailureCategory::Timeout);
    }

    #[test]
    fn blocking_form_refuses_on_blocking_pool() {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .enable_all()
            .build()
            .unwrap();
        let factory = Arc::new(FakeChannelFactory::new(FakeBehavior::Echo));
        let executor = RpcExecutor::new(factory.clone(), RpcConfig::default(), runtime.handle().clone());

        let failure = runtime
            .block_on(runtime.spawn_blocking(move || {
                executor.execute_blocking(ping(), Duration::from_secs(1))
            }))
            .unwrap()
            .unwrap_err();

        assert_eq!(failure.category, FailureCategory::InvalidState);
        assert_eq!(factory.stats().opened, 0);
    }
}
