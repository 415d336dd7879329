use crate::domain_model::{FailureCategory, ServiceFailure};
use crate::domain_port::ChannelFault;
use std::io;

/// Maps a channel fault to its category and a descriptive message.
///
/// Pure and total: the same fault always lands in the same category.
pub fn classify(fault: &ChannelFault) -> (FailureCategory, String) {
    match fault {
        ChannelFault::Remote { message, .. } => (FailureCategory::ServiceLogic, message.clone()),
        ChannelFault::Transport(e) => classify_io(e),
        ChannelFault::Protocol(detail) => (
            FailureCategory::Communication,
            format!("protocol fault: {detail}"),
        ),
        ChannelFault::Faulted(detail) => (
            FailureCategory::Communication,
            format!("channel faulted: {detail}"),
        ),
        ChannelFault::InvalidState(detail) => (FailureCategory::InvalidState, detail.clone()),
        ChannelFault::Other(e) => classify_foreign(e),
    }
}

/// Classifies and keeps the fault as the failure's cause.
pub fn into_failure(fault: ChannelFault) -> ServiceFailure {
    let (category, message) = classify(&fault);
    ServiceFailure::new(category, message).with_cause(fault)
}

fn classify_io(e: &io::Error) -> (FailureCategory, String) {
    match e.kind() {
        io::ErrorKind::TimedOut => (
            FailureCategory::Timeout,
            format!("transport timed out: {e}"),
        ),
        _ => (
            FailureCategory::Communication,
            format!("transport failure ({:?}): {e}", e.kind()),
        ),
    }
}

fn classify_foreign(e: &anyhow::Error) -> (FailureCategory, String) {
    for cause in e.chain() {
        if let Some(inner) = cause.downcast_ref::<ChannelFault>() {
            return classify(inner);
        }
        if let Some(io) = cause.downcast_ref::<io::Error>() {
            return classify_io(io);
        }
        if cause.is::<tokio::time::error::Elapsed>() {
            return (FailureCategory::Timeout, format!("timed out: {cause}"));
        }
    }
    (FailureCategory::Unknown, format!("unclassified fault: {e:#}"))
}
