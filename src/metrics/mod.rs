use std::sync::OnceLock;

use prometheus::{Encoder, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};

// ============================================================================
// Metrics Module - Prometheus metrics for the actor runtime
// ============================================================================
//
// Provides counters for:
// - Actor lifecycle (started, stopped by reason)
// - Message throughput
// - Panics, restarts and failing signal handlers
// - Signals sent (shutdown vs panic)
//
// The runtime records into one process-wide instance; render() produces the
// Prometheus text exposition format for whatever surface scrapes it.
// ============================================================================

static GLOBAL: OnceLock<RuntimeMetrics> = OnceLock::new();

/// Process-wide metrics instance used by the runtime
pub fn global() -> &'static RuntimeMetrics {
    GLOBAL.get_or_init(RuntimeMetrics::default)
}

/// Counters describing actor runtime activity
pub struct RuntimeMetrics {
    registry: Registry,

    // Lifecycle
    pub actors_started: IntCounter,
    pub actors_stopped: IntCounterVec,

    // Processing
    pub messages_processed: IntCounter,

    // Supervision
    pub panics: IntCounter,
    pub restarts: IntCounter,
    pub handler_failures: IntCounter,
    pub signals_sent: IntCounterVec,
}

impl RuntimeMetrics {
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        // Lifecycle
        let actors_started = IntCounter::new("actors_started_total", "Total actors started")?;
        registry.register(Box::new(actors_started.clone()))?;

        let actors_stopped = IntCounterVec::new(
            Opts::new("actors_stopped_total", "Total actors shut down, by terminating signal"),
            &["reason"],
        )?;
        registry.register(Box::new(actors_stopped.clone()))?;

        // Processing
        let messages_processed = IntCounter::new(
            "actor_messages_processed_total",
            "Total messages dispatched to behaviors",
        )?;
        registry.register(Box::new(messages_processed.clone()))?;

        // Supervision
        let panics = IntCounter::new("actor_panics_total", "Total actor panics")?;
        registry.register(Box::new(panics.clone()))?;

        let restarts = IntCounter::new("actor_restarts_total", "Total actor restarts")?;
        registry.register(Box::new(restarts.clone()))?;

        let handler_failures = IntCounter::new(
            "signal_handler_failures_total",
            "Total signal handlers that failed or panicked",
        )?;
        registry.register(Box::new(handler_failures.clone()))?;

        let signals_sent = IntCounterVec::new(
            Opts::new("actor_signals_sent_total", "Total signals sent, by kind"),
            &["kind"],
        )?;
        registry.register(Box::new(signals_sent.clone()))?;

        Ok(Self {
            registry,
            actors_started,
            actors_stopped,
            messages_processed,
            panics,
            restarts,
            handler_failures,
            signals_sent,
        })
    }

    /// Get the Prometheus registry
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Prometheus text exposition of every runtime metric
    pub fn render(&self) -> anyhow::Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }

    pub fn record_actor_started(&self) {
        self.actors_started.inc();
    }

    pub fn record_actor_stopped(&self, reason: &str) {
        self.actors_stopped.with_label_values(&[reason]).inc();
    }

    pub fn record_message_processed(&self) {
        self.messages_processed.inc();
    }

    pub fn record_panic(&self) {
        self.panics.inc();
    }

    pub fn record_restart(&self) {
        self.restarts.inc();
    }

    pub fn record_handler_failure(&self) {
        self.handler_failures.inc();
    }

    pub fn record_signal_sent(&self, kind: &str) {
        self.signals_sent.with_label_values(&[kind]).inc();
    }
}

impl Default for RuntimeMetrics {
    fn default() -> Self {
        Self::new().expect("Failed to create runtime metrics")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_creation() {
        let metrics = RuntimeMetrics::new().unwrap();
        assert!(!metrics.registry().gather().is_empty());
    }

    #[test]
    fn test_record_lifecycle() {
        let metrics = RuntimeMetrics::new().unwrap();
        metrics.record_actor_started();
        metrics.record_actor_started();
        metrics.record_actor_stopped("shutdown");
        metrics.record_actor_stopped("panic");
        metrics.record_actor_stopped("panic");

        assert_eq!(metrics.actors_started.get(), 2);
        assert_eq!(metrics.actors_stopped.with_label_values(&["shutdown"]).get(), 1);
        assert_eq!(metrics.actors_stopped.with_label_values(&["panic"]).get(), 2);
    }

    #[test]
    fn test_record_supervision() {
        let metrics = RuntimeMetrics::new().unwrap();
        metrics.record_panic();
        metrics.record_restart();
        metrics.record_handler_failure();
        metrics.record_signal_sent("shutdown");

        assert_eq!(metrics.panics.get(), 1);
        assert_eq!(metrics.restarts.get(), 1);
        assert_eq!(metrics.handler_failures.get(), 1);
        assert_eq!(metrics.signals_sent.with_label_values(&["shutdown"]).get(), 1);
    }

    #[test]
    fn test_render_text_format() {
        let metrics = RuntimeMetrics::new().unwrap();
        metrics.record_message_processed();

        let text = metrics.render().unwrap();
        assert!(text.contains("actor_messages_processed_total 1"));
        assert!(text.contains("# TYPE actors_started_total counter"));
    }
}
