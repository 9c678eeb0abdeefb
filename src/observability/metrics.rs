use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    pub polls_total: IntCounterVec,
    pub poll_latency_seconds: Histogram,
    pub offers_received_total: IntCounter,
    pub offer_resolutions_total: IntCounterVec,
    pub countdown_remaining_seconds: IntGauge,
    pub driver_online: IntGauge,
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let polls_total = IntCounterVec::new(
            Opts::new("polls_total", "Order polls by outcome"),
            &["outcome"],
        )
        .expect("valid polls_total metric");

        let poll_latency_seconds = Histogram::with_opts(HistogramOpts::new(
            "poll_latency_seconds",
            "Latency of applied order polls in seconds",
        ))
        .expect("valid poll_latency_seconds metric");

        let offers_received_total =
            IntCounter::new("offers_received_total", "Distinct offers shown to the driver")
                .expect("valid offers_received_total metric");

        let offer_resolutions_total = IntCounterVec::new(
            Opts::new("offer_resolutions_total", "Offer resolutions by outcome"),
            &["resolution"],
        )
        .expect("valid offer_resolutions_total metric");

        let countdown_remaining_seconds = IntGauge::new(
            "countdown_remaining_seconds",
            "Seconds left on the current offer",
        )
        .expect("valid countdown_remaining_seconds metric");

        let driver_online = IntGauge::new("driver_online", "1 while the driver is online")
            .expect("valid driver_online metric");

        registry
            .register(Box::new(polls_total.clone()))
            .expect("register polls_total");
        registry
            .register(Box::new(poll_latency_seconds.clone()))
            .expect("register poll_latency_seconds");
        registry
            .register(Box::new(offers_received_total.clone()))
            .expect("register offers_received_total");
        registry
            .register(Box::new(offer_resolutions_total.clone()))
            .expect("register offer_resolutions_total");
        registry
            .register(Box::new(countdown_remaining_seconds.clone()))
            .expect("register countdown_remaining_seconds");
        registry
            .register(Box::new(driver_online.clone()))
            .expect("register driver_online");

        Self {
            registry,
            polls_total,
            poll_latency_seconds,
            offers_received_total,
            offer_resolutions_total,
            countdown_remaining_seconds,
            driver_online,
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
