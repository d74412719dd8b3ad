//! # Prometheus Metrics
//!
//! Offering-level gauges and call counters for the replay host. Rendered
//! in the Prometheus text exposition format after a run (`--metrics`).
//!
//! All metrics are registered in a dedicated [`prometheus::Registry`] with
//! the `tessera` prefix so they do not collide with any default global
//! registry consumers. Token and value amounts are exported in whole units.

use prometheus::{
    Encoder, Gauge, GaugeVec, IntCounter, IntCounterVec, IntGaugeVec, Opts, Registry, TextEncoder,
};
use tessera_contracts::{ErrorKind, Ledger, Sale};
use tessera_protocol::config::UNIT;
use tessera_protocol::Amount;

/// Holds all Prometheus metric handles for one replay.
#[derive(Clone)]
pub struct OfferingMetrics {
    /// Prometheus registry that owns all metrics below.
    registry: Registry,
    /// Current ledger supply.
    pub total_supply: Gauge,
    /// Supply migrated to the successor ledger.
    pub total_upgraded: Gauge,
    /// Value accepted per sale.
    pub wei_raised: GaugeVec,
    /// Tokens minted to purchasers per sale.
    pub sold_tokens: GaugeVec,
    /// Distinct purchasers per sale.
    pub purchasers: IntGaugeVec,
    /// Calls that committed.
    pub calls_accepted_total: IntCounter,
    /// Calls that were rejected, by error kind.
    pub calls_rejected_total: IntCounterVec,
}

impl OfferingMetrics {
    /// Creates and registers all metrics.
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new_custom(Some("tessera".into()), None)?;

        let total_supply = Gauge::new("total_supply", "Ledger token supply in whole tokens")?;
        registry.register(Box::new(total_supply.clone()))?;

        let total_upgraded = Gauge::new(
            "total_upgraded",
            "Tokens migrated to the successor ledger in whole tokens",
        )?;
        registry.register(Box::new(total_upgraded.clone()))?;

        let wei_raised = GaugeVec::new(
            Opts::new("wei_raised", "Value accepted by a sale in whole units"),
            &["sale"],
        )?;
        registry.register(Box::new(wei_raised.clone()))?;

        let sold_tokens = GaugeVec::new(
            Opts::new("sold_tokens", "Tokens minted to purchasers by a sale"),
            &["sale"],
        )?;
        registry.register(Box::new(sold_tokens.clone()))?;

        let purchasers = IntGaugeVec::new(
            Opts::new("purchasers", "Distinct purchasers of a sale"),
            &["sale"],
        )?;
        registry.register(Box::new(purchasers.clone()))?;

        let calls_accepted_total =
            IntCounter::new("calls_accepted_total", "Calls that committed")?;
        registry.register(Box::new(calls_accepted_total.clone()))?;

        let calls_rejected_total = IntCounterVec::new(
            Opts::new("calls_rejected_total", "Calls rejected, by error kind"),
            &["kind"],
        )?;
        registry.register(Box::new(calls_rejected_total.clone()))?;

        Ok(Self {
            registry,
            total_supply,
            total_upgraded,
            wei_raised,
            sold_tokens,
            purchasers,
            calls_accepted_total,
            calls_rejected_total,
        })
    }

    /// Counts one call outcome.
    pub fn record_call(&self, outcome: Result<(), ErrorKind>) {
        match outcome {
            Ok(()) => self.calls_accepted_total.inc(),
            Err(kind) => self
                .calls_rejected_total
                .with_label_values(&[&kind.to_string()])
                .inc(),
        }
    }

    /// Refreshes the gauges from contract state.
    pub fn observe<'a>(&self, ledger: &Ledger, sales: impl IntoIterator<Item = &'a Sale>) {
        self.total_supply.set(whole(ledger.total_supply()));
        self.total_upgraded.set(whole(ledger.total_upgraded()));
        for sale in sales {
            let label = sale.address().to_hex();
            self.wei_raised
                .with_label_values(&[&label])
                .set(whole(sale.wei_raised()));
            self.sold_tokens
                .with_label_values(&[&label])
                .set(whole(sale.sold_tokens()));
            self.purchasers
                .with_label_values(&[&label])
                .set(i64::try_from(sale.purchaser_count()).unwrap_or(i64::MAX));
        }
    }

    /// Encodes all registered metrics into the Prometheus text exposition format.
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

/// Lossy conversion to whole units for export.
fn whole(amount: Amount) -> f64 {
    amount as f64 / UNIT as f64
}
