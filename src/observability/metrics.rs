use prometheus::{
    Encoder, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
};

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    pub orders_created_total: IntCounter,
    pub status_transitions_total: IntCounterVec,
    pub assignments_total: IntCounterVec,
    pub assignment_latency_seconds: HistogramVec,
    pub orders_in_dispatch_queue: IntGauge,
    pub notification_failures_total: IntCounter,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let orders_created_total =
            IntCounter::new("orders_created_total", "Total orders created")
                .expect("valid orders_created_total metric");

        let status_transitions_total = IntCounterVec::new(
            Opts::new(
                "status_transitions_total",
                "Committed order status transitions by target status",
            ),
            &["status"],
        )
        .expect("valid status_transitions_total metric");

        let assignments_total = IntCounterVec::new(
            Opts::new("assignments_total", "Total assignments by outcome"),
            &["outcome"],
        )
        .expect("valid assignments_total metric");

        let assignment_latency_seconds = HistogramVec::new(
            prometheus::HistogramOpts::new(
                "assignment_latency_seconds",
                "Latency of automatic assignment in seconds",
            ),
            &["outcome"],
        )
        .expect("valid assignment_latency_seconds metric");

        let orders_in_dispatch_queue = IntGauge::new(
            "orders_in_dispatch_queue",
            "Orders waiting for automatic dispatch",
        )
        .expect("valid orders_in_dispatch_queue metric");

        let notification_failures_total = IntCounter::new(
            "notification_failures_total",
            "Notification triggers that failed after commit",
        )
        .expect("valid notification_failures_total metric");

        registry
            .register(Box::new(orders_created_total.clone()))
            .expect("register orders_created_total");
        registry
            .register(Box::new(status_transitions_total.clone()))
            .expect("register status_transitions_total");
        registry
            .register(Box::new(assignments_total.clone()))
            .expect("register assignments_total");
        registry
            .register(Box::new(assignment_latency_seconds.clone()))
            .expect("register assignment_latency_seconds");
        registry
            .register(Box::new(orders_in_dispatch_queue.clone()))
            .expect("register orders_in_dispatch_queue");
        registry
            .register(Box::new(notification_failures_total.clone()))
            .expect("register notification_failures_total");

        Self {
            registry,
            orders_created_total,
            status_transitions_total,
            assignments_total,
            assignment_latency_seconds,
            orders_in_dispatch_queue,
            notification_failures_total,
        }
    }

    pub fn encode(&self) -> Result<String, String> {
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();

        TextEncoder::new()
            .encode(&metric_families, &mut buffer)
            .map_err(|err| format!("failed to encode metrics: {err}"))?;

        String::from_utf8(buffer).map_err(|err| format!("metrics are not valid utf8: {err}"))
    }
}
