//! Application supervisor.
//!
//! Owns the connection pool and the lean source, bootstraps the
//! [`QuoteController`] and keeps it cycling. Failed cycles are triaged by
//! [`FailureKind`](crate::error::FailureKind): configuration failures stop
//! the process, everything else restarts from INIT after `restart_delay_ms`.

use std::sync::Arc;
use std::time::Duration;

use midspread_executor::{ConnectionPool, DynExchangeClient, KrakenPublicClient, PaperExchange};
use midspread_telemetry::Metrics;
use tracing::{error, info, warn};

use crate::config::AppConfig;
use crate::controller::{CycleReport, QuoteController};
use crate::error::{AppError, AppResult};
use crate::lean_feed::{FileLeanFeed, LeanSource};

/// Counters returned when the supervisor stops on its own.
#[derive(Debug, Clone, Default)]
pub struct SupervisorStats {
    pub cycles_completed: u64,
    pub restarts: u64,
    pub last_report: Option<CycleReport>,
}

impl SupervisorStats {
    fn attempts(&self) -> u64 {
        self.cycles_completed + self.restarts
    }
}

pub struct Application {
    config: AppConfig,
    pool: Arc<ConnectionPool>,
    lean_source: Arc<dyn LeanSource>,
}

impl Application {
    pub fn new(
        config: AppConfig,
        pool: Arc<ConnectionPool>,
        lean_source: Arc<dyn LeanSource>,
    ) -> Self {
        Self {
            config,
            pool,
            lean_source,
        }
    }

    /// Paper trading over live public market data.
    ///
    /// Every pooled connection shares one simulated account so that orders
    /// posted through one of them are visible through the others.
    pub fn paper(config: AppConfig) -> AppResult<Self> {
        let market = KrakenPublicClient::new(config.public_url.clone(), config.call_timeout())?;
        let venue: DynExchangeClient = Arc::new(PaperExchange::new(market, config.paper.balances()));
        let clients = vec![venue; config.connections];
        let pool = Arc::new(ConnectionPool::new(clients, config.call_timeout())?);
        let lean_source: Arc<dyn LeanSource> = Arc::new(FileLeanFeed::new(&config.lean_feed));

        info!(
            public_url = %config.public_url,
            connections = config.connections,
            lean_feed = %config.lean_feed,
            "Paper venue ready"
        );
        Ok(Self::new(config, pool, lean_source))
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Bootstrap and cycle until `max_cycles` attempts have been made or a
    /// fatal failure occurs. `None` cycles forever.
    ///
    /// Failed bootstraps and failed cycles both count as attempts.
    pub async fn supervise(&self, max_cycles: Option<u64>) -> AppResult<SupervisorStats> {
        let mut stats = SupervisorStats::default();
        let limit_reached = |stats: &SupervisorStats| {
            max_cycles.is_some_and(|max| stats.attempts() >= max)
        };

        let mut controller = loop {
            match QuoteController::bootstrap(
                &self.config,
                self.pool.clone(),
                self.lean_source.clone(),
            )
            .await
            {
                Ok(controller) => break controller,
                Err(e) => {
                    self.triage(e, &mut stats, "Bootstrap failed")?;
                    if limit_reached(&stats) {
                        return Ok(stats);
                    }
                    tokio::time::sleep(self.restart_delay()).await;
                }
            }
        };
        info!("Quote controller bootstrapped");

        while !limit_reached(&stats) {
            match controller.run_cycle().await {
                Ok(report) => {
                    stats.cycles_completed += 1;
                    info!(
                        cycle = stats.cycles_completed,
                        mode = %report.mode,
                        posted = report.posted,
                        post_failures = report.post_failures,
                        cancelled = report.cancelled,
                        cancel_failures = report.cancel_failures,
                        "Cycle complete"
                    );
                    stats.last_report = Some(report);
                    if !limit_reached(&stats) {
                        tokio::time::sleep(Duration::from_millis(self.config.cycle_sleep_ms))
                            .await;
                    }
                }
                Err(e) => {
                    self.triage(e, &mut stats, "Cycle failed")?;
                    controller.reset_after_failure();
                    if !limit_reached(&stats) {
                        tokio::time::sleep(self.restart_delay()).await;
                    }
                }
            }
        }

        Ok(stats)
    }

    /// Record a recoverable failure, or hand a fatal one back.
    fn triage(
        &self,
        e: AppError,
        stats: &mut SupervisorStats,
        context: &'static str,
    ) -> AppResult<()> {
        let kind = e.kind();
        if kind.is_fatal() {
            error!(error = %e, kind = %kind, "{context}; stopping");
            return Err(e);
        }

        stats.restarts += 1;
        Metrics::cycle_restarted(kind.as_str());
        warn!(
            error = %e,
            kind = %kind,
            restarts = stats.restarts,
            "{context}; restarting from INIT"
        );
        Ok(())
    }

    fn restart_delay(&self) -> Duration {
        Duration::from_millis(self.config.restart_delay_ms)
    }

    /// Run until Ctrl-C or a fatal failure.
    pub async fn run(self) -> AppResult<()> {
        info!(
            pair = %format!("{}{}", self.config.market1, self.config.market2),
            "Starting quote loop"
        );

        let result = tokio::select! {
            result = self.supervise(None) => result.map(|_| ()),
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown signal received");
                Ok(())
            }
        };

        if self.config.telemetry.log_metrics_on_exit {
            match Metrics::render() {
                Ok(text) => info!(metrics = %text, "Final metrics"),
                Err(e) => warn!(error = %e, "Failed to render metrics"),
            }
        }

        if let Err(ref e) = result {
            error!(error = %e, kind = %e.kind(), "Quote loop stopped");
        }
        result
    }
}

