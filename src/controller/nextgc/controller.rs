//! NextGC controller loop.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{self, Instant};

use crate::backpressure::{Operator, DEFAULT_GC_PERCENT, NO_THROTTLING};
use crate::breaker::{Breaker, BreakerError, BreakerGuard};
use crate::controller::nextgc::component_p::ComponentP;
use crate::controller::nextgc::config::ControllerConfig;
use crate::controller::{Controller, ControllerError};
use crate::observability::metrics;
use crate::stats::{
    ConsumptionReport, ConsumptionReporter, ControlParameters, ControllerNextGcStats,
    ControllerStats, MemoryBudgetStats, MemorySnapshot, ServiceStatsSubscription,
    SpecialConsumersStats,
};
use crate::utils::{clamp_f64, ApplicationTerminator};

const PERCENTS: f64 = 100.0;

/// Output bounds. The upper bound keeps the GC pacing target above zero.
const OUTPUT_LOWER_BOUND: f64 = 0.0;
const OUTPUT_UPPER_BOUND: f64 = 99.0;

type StatsRequest = oneshot::Sender<ControllerStats>;

/// Handle to a running NextGC control loop.
///
/// Dropping the handle stops the loop without waiting for it.
pub struct ControllerImpl {
    stats_tx: mpsc::Sender<StatsRequest>,
    breaker: Arc<Breaker>,
}

/// Builds the controller, applies the default control signal to `operator`
/// and starts the loop.
///
/// Takes the telemetry stream from `subscription`. When `reporter` is set, its
/// report replaces the one carried by snapshots. Must be called from within a
/// Tokio runtime.
pub fn new_controller_from_config(
    cfg: &ControllerConfig,
    subscription: &dyn ServiceStatsSubscription,
    reporter: Option<Arc<dyn ConsumptionReporter>>,
    operator: Arc<dyn Operator>,
    terminator: Arc<dyn ApplicationTerminator>,
) -> Result<ControllerImpl, ControllerError> {
    cfg.validate().map_err(|errors| {
        let message = errors
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ");
        ControllerError::InvalidConfig(message)
    })?;

    let updates = subscription
        .updates()
        .ok_or(ControllerError::TelemetryUnavailable)?;

    let initial = ControlParameters::default();
    operator
        .set_control_parameters(initial.clone())
        .map_err(|source| ControllerError::ApplyControlParameters {
            params: initial.to_string(),
            source,
        })?;

    let state = ControllerState::new(cfg.clone(), reporter, operator, terminator);
    let (stats_tx, stats_rx) = mpsc::channel(1);
    let breaker = Arc::new(Breaker::with_init_value(1));

    tokio::spawn(state.run(breaker.clone(), updates, stats_rx));

    tracing::info!(
        rss_limit = cfg.rss_limit.as_u64(),
        danger_zone_gogc = cfg.danger_zone_gogc,
        danger_zone_throttling = cfg.danger_zone_throttling,
        period = ?cfg.period,
        "NextGC controller started"
    );

    Ok(ControllerImpl { stats_tx, breaker })
}

#[async_trait]
impl Controller for ControllerImpl {
    async fn get_stats(&self) -> Result<ControllerStats, ControllerError> {
        if let Some(err) = self.breaker.err() {
            return Err(err.into());
        }

        let (tx, rx) = oneshot::channel();

        tokio::select! {
            res = self.stats_tx.send(tx) => res.map_err(|_| ControllerError::Stopped)?,
            _ = self.breaker.done() => return Err(BreakerError::NotOperational.into()),
        }

        tokio::select! {
            res = rx => res.map_err(|_| ControllerError::Stopped),
            _ = self.breaker.done() => Err(BreakerError::NotOperational.into()),
        }
    }

    async fn quit(&self) {
        self.breaker.shutdown_and_wait_async().await;
    }
}

impl Drop for ControllerImpl {
    fn drop(&mut self) {
        self.breaker.shutdown();
    }
}

/// State owned by the loop task.
struct ControllerState {
    cfg: ControllerConfig,
    reporter: Option<Arc<dyn ConsumptionReporter>>,
    operator: Arc<dyn Operator>,
    terminator: Arc<dyn ApplicationTerminator>,

    component_p: ComponentP,

    p_value: f64,
    sum_value: f64,
    allocation_budget: u64,
    utilization: f64,
    rss: u64,
    consumption_report: Option<ConsumptionReport>,
    control_parameters: Option<ControlParameters>,
}

impl ControllerState {
    fn new(
        cfg: ControllerConfig,
        reporter: Option<Arc<dyn ConsumptionReporter>>,
        operator: Arc<dyn Operator>,
        terminator: Arc<dyn ApplicationTerminator>,
    ) -> Self {
        Self {
            component_p: ComponentP::new(&cfg.component_proportional),
            cfg,
            reporter,
            operator,
            terminator,
            p_value: 0.0,
            sum_value: 0.0,
            allocation_budget: 0,
            utilization: 0.0,
            rss: 0,
            consumption_report: None,
            control_parameters: None,
        }
    }

    async fn run(
        mut self,
        breaker: Arc<Breaker>,
        mut updates: mpsc::Receiver<MemorySnapshot>,
        mut stats_rx: mpsc::Receiver<StatsRequest>,
    ) {
        let _guard = BreakerGuard::adopt(breaker.clone());

        let period = self.cfg.period;
        let mut ticker = time::interval_at(Instant::now() + period, period);

        loop {
            tokio::select! {
                snapshot = updates.recv() => {
                    let Some(snapshot) = snapshot else {
                        if breaker.is_operational() {
                            self.fail(&breaker, ControllerError::TelemetryClosed);
                        }
                        return;
                    };

                    if let Err(e) = self.update_state(snapshot) {
                        self.fail(&breaker, e);
                        return;
                    }
                }
                _ = ticker.tick() => {
                    if let Err(e) = self.apply_control_value() {
                        self.fail(&breaker, e);
                        return;
                    }
                }
                Some(reply) = stats_rx.recv() => {
                    // The caller may have given up already.
                    let _ = reply.send(self.aggregate_stats());
                }
                _ = breaker.done() => {
                    tracing::debug!("NextGC controller loop stopped");
                    return;
                }
            }
        }
    }

    fn fail(&self, breaker: &Breaker, err: ControllerError) {
        tracing::error!(error = %err, "NextGC controller failed");
        breaker.shutdown();
        self.terminator.terminate(Box::new(err));
    }

    fn update_state(&mut self, snapshot: MemorySnapshot) -> Result<(), ControllerError> {
        self.consumption_report = match &self.reporter {
            Some(reporter) => reporter
                .predefined_consumers()
                .map_err(ControllerError::ConsumptionReport)?,
            None => snapshot.consumption_report,
        };

        self.update_utilization(snapshot.next_gc, snapshot.rss)?;
        self.update_control_values()?;
        self.update_control_parameters();

        Ok(())
    }

    fn update_utilization(&mut self, next_gc: u64, rss: Option<u64>) -> Result<(), ControllerError> {
        // Only the managed allocator responds to pacing and throttling, so
        // everything outside of it shrinks its share of the limit.
        let unmanaged = self
            .consumption_report
            .as_ref()
            .map(ConsumptionReport::unmanaged_total)
            .unwrap_or(0);
        let limit = self.cfg.rss_limit.as_u64();

        self.allocation_budget = limit
            .checked_sub(unmanaged)
            .filter(|budget| *budget > 0)
            .ok_or(ControllerError::Budget { limit, unmanaged })?;

        self.utilization = next_gc as f64 / self.allocation_budget as f64;

        if let Some(rss) = rss {
            self.rss = rss;
        }

        Ok(())
    }

    fn update_control_values(&mut self) -> Result<(), ControllerError> {
        self.p_value = self.component_p.value(self.utilization)?;
        self.sum_value = clamp_f64(self.p_value, OUTPUT_LOWER_BOUND, OUTPUT_UPPER_BOUND);
        Ok(())
    }

    fn update_control_parameters(&mut self) {
        // Zone test truncates, output rounds.
        let zone = (self.utilization * PERCENTS) as u32;
        let rounded = self.sum_value.round() as u32;

        let gc_percent = if zone < self.cfg.danger_zone_gogc {
            DEFAULT_GC_PERCENT
        } else {
            DEFAULT_GC_PERCENT - rounded as i32
        };

        let throttling_percentage = if zone < self.cfg.danger_zone_throttling {
            NO_THROTTLING
        } else {
            rounded
        };

        let stats = self.aggregate_stats();
        metrics::record_controller_state(&stats);

        tracing::debug!(
            utilization = self.utilization,
            allocation_budget = self.allocation_budget,
            p = self.p_value,
            output = self.sum_value,
            gc_percent,
            throttling_percentage,
            "Controller state updated"
        );

        self.control_parameters =
            Some(ControlParameters::new(gc_percent, throttling_percentage).with_controller_stats(stats));
    }

    fn apply_control_value(&self) -> Result<(), ControllerError> {
        let Some(params) = &self.control_parameters else {
            tracing::debug!("No telemetry received yet, nothing to apply");
            return Ok(());
        };

        self.operator
            .set_control_parameters(params.clone())
            .map_err(|source| ControllerError::ApplyControlParameters {
                params: params.to_string(),
                source,
            })
    }

    fn aggregate_stats(&self) -> ControllerStats {
        let special_consumers = self.consumption_report.as_ref().map(|report| SpecialConsumersStats {
            managed: report.managed.iter().map(|(k, v)| (k.clone(), *v)).collect::<BTreeMap<_, _>>(),
            unmanaged: report.unmanaged.iter().map(|(k, v)| (k.clone(), *v)).collect::<BTreeMap<_, _>>(),
        });

        ControllerStats {
            memory_budget: MemoryBudgetStats {
                special_consumers,
                rss_actual: self.rss,
                rss_limit: self.cfg.rss_limit.as_u64(),
                allocation_budget: self.allocation_budget,
                utilization: self.utilization,
            },
            nextgc: ControllerNextGcStats {
                p: self.p_value,
                output: self.sum_value,
            },
        }
    }
}
