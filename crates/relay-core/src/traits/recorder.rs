//! Fire-and-forget sink for gateway events.

use crate::events::GatewayEvent;

/// Consumes gateway events for metrics and logging.
///
/// Implementations must not block; `record` is called from inside the
/// admission and subscription paths.
pub trait EventRecorder: Send + Sync + std::fmt::Debug + 'static {
    /// Record an event.
    fn record(&self, event: GatewayEvent);
}

/// Recorder that drops every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopRecorder;

impl EventRecorder for NoopRecorder {
    fn record(&self, _event: GatewayEvent) {}
}
