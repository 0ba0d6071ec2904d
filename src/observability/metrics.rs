use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
};

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    pub order_transitions_total: IntCounterVec,
    pub claim_attempts_total: IntCounterVec,
    pub location_updates_total: IntCounterVec,
    pub route_lookups_total: IntCounterVec,
    pub fanout_deliveries_total: IntCounterVec,
    pub fanout_duration_seconds: HistogramVec,
    pub tracked_orders: IntGauge,
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let order_transitions_total = IntCounterVec::new(
            Opts::new("order_transitions_total", "Order status transitions by target status"),
            &["status"],
        )
        .expect("valid order_transitions_total metric");

        let claim_attempts_total = IntCounterVec::new(
            Opts::new("claim_attempts_total", "Driver claim attempts by outcome"),
            &["outcome"],
        )
        .expect("valid claim_attempts_total metric");

        let location_updates_total = IntCounterVec::new(
            Opts::new("location_updates_total", "Driver location fixes by outcome"),
            &["outcome"],
        )
        .expect("valid location_updates_total metric");

        let route_lookups_total = IntCounterVec::new(
            Opts::new("route_lookups_total", "Routing distance lookups by outcome"),
            &["outcome"],
        )
        .expect("valid route_lookups_total metric");

        let fanout_deliveries_total = IntCounterVec::new(
            Opts::new(
                "fanout_deliveries_total",
                "Broadcast deliveries by channel and outcome",
            ),
            &["channel", "outcome"],
        )
        .expect("valid fanout_deliveries_total metric");

        let fanout_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "fanout_duration_seconds",
                "Duration of a broadcast fan-out in seconds",
            ),
            &["outcome"],
        )
        .expect("valid fanout_duration_seconds metric");

        let tracked_orders = IntGauge::new(
            "tracked_orders",
            "Orders currently carrying live driver tracking",
        )
        .expect("valid tracked_orders metric");

        registry
            .register(Box::new(order_transitions_total.clone()))
            .expect("register order_transitions_total");
        registry
            .register(Box::new(claim_attempts_total.clone()))
            .expect("register claim_attempts_total");
        registry
            .register(Box::new(location_updates_total.clone()))
            .expect("register location_updates_total");
        registry
            .register(Box::new(route_lookups_total.clone()))
            .expect("register route_lookups_total");
        registry
            .register(Box::new(fanout_deliveries_total.clone()))
            .expect("register fanout_deliveries_total");
        registry
            .register(Box::new(fanout_duration_seconds.clone()))
            .expect("register fanout_duration_seconds");
        registry
            .register(Box::new(tracked_orders.clone()))
            .expect("register tracked_orders");

        Self {
            registry,
            order_transitions_total,
            claim_attempts_total,
            location_updates_total,
            route_lookups_total,
            fanout_deliveries_total,
            fanout_duration_seconds,
            tracked_orders,
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

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
