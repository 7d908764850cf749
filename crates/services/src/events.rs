//! Event sinks for deployments without a live broadcast collaborator.

use async_trait::async_trait;

use domains::{DomainEvent, EventSink};

/// Traces every emitted event. The default sink when no real-time
/// transport is wired in.
pub struct LogSink;

#[async_trait]
impl EventSink for LogSink {
    async fn emit(&self, event: DomainEvent) {
        tracing::info!(?event, "domain event");
    }
}
