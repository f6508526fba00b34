//! Quote cycle controller.
//!
//! One cycle walks INIT → RELOAD_CONFIG → FETCH_MARKET_STATE → COMPUTE →
//! DISPATCH → SLEEP. Every exchange read happens at the top of the cycle
//! and is frozen into a [`CycleContext`]; each tier is then priced from
//! that context and dispatched strictly in sequence, asks before bids.
//!
//! Any error returned from [`QuoteController::run_cycle`] aborts the cycle.
//! The supervisor decides whether to restart from INIT or give up.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use midspread_core::{MarketPair, OrderBook, OrderSide, Price, Size, TickSize};
use midspread_executor::{ConnectionPool, OrderLifecycleManager, PostOutcome};
use midspread_quoting::{
    balance_ratio, compose_price, cross_pair, local_lean, mid_price, min_volume, reconcile,
    volume_bands, BalanceRatio, LeanSign, LeanState, PriceGuard, QuoteError, ReferencePrice,
    VolumeDistribution, VolumeStack, VolumeTier,
};
use midspread_telemetry::Metrics;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use tracing::{debug, info, warn};

use crate::config::AppConfig;
use crate::error::AppResult;
use crate::lean_feed::{LeanSource, ReloadSchedule};

/// Controller state, narrated on every transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleState {
    Init,
    ReloadConfig,
    FetchMarketState,
    Compute,
    Dispatch(DispatchMode),
    Sleep,
}

impl fmt::Display for CycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Init => write!(f, "INIT"),
            Self::ReloadConfig => write!(f, "RELOAD_CONFIG"),
            Self::FetchMarketState => write!(f, "FETCH_MARKET_STATE"),
            Self::Compute => write!(f, "COMPUTE"),
            Self::Dispatch(mode) => write!(f, "DISPATCH({mode})"),
            Self::Sleep => write!(f, "SLEEP"),
        }
    }
}

/// Which tiers a cycle re-quotes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchMode {
    /// First `shallow_depth` tiers only.
    Shallow,
    /// Every tier.
    Full,
}

impl DispatchMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Shallow => "shallow",
            Self::Full => "full",
        }
    }
}

impl fmt::Display for DispatchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Alternates cheap shallow dispatches with periodic full ones.
///
/// While the count is below `deep_reload_counter` the dispatch is shallow
/// and the count increments; otherwise it is full and the count resets.
#[derive(Debug, Clone)]
pub struct DispatchCounter {
    count: u32,
    deep_reload_counter: u32,
}

impl DispatchCounter {
    pub fn new(deep_reload_counter: u32) -> Self {
        Self {
            count: 0,
            deep_reload_counter,
        }
    }

    pub fn next_mode(&mut self) -> DispatchMode {
        if self.count < self.deep_reload_counter {
            self.count += 1;
            DispatchMode::Shallow
        } else {
            self.count = 0;
            DispatchMode::Full
        }
    }

    pub fn reset(&mut self) {
        self.count = 0;
    }
}

/// Static quoting parameters, resolved once from config.
#[derive(Debug, Clone)]
pub struct QuoteSettings {
    pub pair: MarketPair,
    pub symbol: String,
    pub tick: TickSize,
    pub dust: Decimal,
    pub volume: Size,
    pub odepth: u32,
    pub local_defense: Decimal,
    pub shallow_depth: usize,
    pub price_change: Decimal,
}

impl QuoteSettings {
    pub fn from_config(config: &AppConfig) -> AppResult<Self> {
        let pair = config.pair()?;
        Ok(Self {
            symbol: pair.symbol(),
            pair,
            tick: config.tick()?,
            dust: config.dust,
            volume: Size::new(config.volume),
            odepth: config.odepth,
            local_defense: config.local_defense,
            shallow_depth: config.shallow_depth,
            price_change: config.price_change,
        })
    }
}

/// Market state frozen for one cycle.
#[derive(Debug, Clone)]
pub struct CycleContext {
    pub reference: ReferencePrice,
    pub book: OrderBook,
    pub ratio: BalanceRatio,
    pub lean: LeanState,
    pub mode: DispatchMode,
}

/// What one completed cycle did.
#[derive(Debug, Clone, PartialEq)]
pub struct CycleReport {
    pub mode: DispatchMode,
    pub reference: Price,
    pub ratio: Decimal,
    pub tiers: usize,
    pub posted: usize,
    pub post_failures: usize,
    pub cancelled: usize,
    pub cancel_failures: usize,
}

pub struct QuoteController {
    settings: QuoteSettings,
    pool: Arc<ConnectionPool>,
    lifecycle: OrderLifecycleManager,
    lean_source: Arc<dyn LeanSource>,
    reload: ReloadSchedule,
    lean: LeanState,
    stack: VolumeStack,
    guard: PriceGuard,
    counter: DispatchCounter,
    state: CycleState,
}

impl QuoteController {
    /// Build the stack, load lean parameters and seed the price guard.
    ///
    /// A distribution file is read and validated before any network call,
    /// so a bad file fails startup without touching the exchange.
    pub async fn bootstrap(
        config: &AppConfig,
        pool: Arc<ConnectionPool>,
        lean_source: Arc<dyn LeanSource>,
    ) -> AppResult<Self> {
        let settings = QuoteSettings::from_config(config)?;

        let distribution = match config.stacking_path() {
            Some(path) => Some(VolumeDistribution::load(path, settings.volume)?),
            None => None,
        };
        let cross = match distribution {
            Some(_) => cross_pair(&settings.pair.base)?,
            None => None,
        };

        let lean = lean_source.load(&settings.symbol)?;
        let reload = ReloadSchedule::loaded_at(config.reload_interval(), Instant::now());

        let stack = match distribution {
            Some(dist) => {
                let conversion = match cross {
                    Some(cross) => {
                        let book = pool.get_order_book(cross.symbol, settings.odepth).await?;
                        let mid = mid_price(&book)?;
                        let conversion = cross.conversion(mid)?;
                        info!(
                            cross_pair = cross.symbol,
                            mid = %mid,
                            conversion = %conversion,
                            "Converting distribution volumes"
                        );
                        conversion
                    }
                    None => Decimal::ONE,
                };
                dist.build(conversion)
            }
            None => VolumeStack::static_stack(lean.displacement, settings.volume),
        };

        for tier in stack.tiers() {
            debug!(displacement = %tier.displacement, volume = %tier.volume, "Stack tier");
        }
        info!(
            pair = %settings.symbol,
            mode = ?stack.mode(),
            tiers = stack.len(),
            total = %stack.total_volume(),
            "Volume stack built"
        );

        let book = pool.get_order_book(&settings.symbol, settings.odepth).await?;
        let mid = mid_price(&book)?;
        let mut guard = PriceGuard::new(settings.price_change);
        guard.seed(mid, Utc::now());

        let lifecycle = OrderLifecycleManager::new(
            pool.clone(),
            settings.symbol.clone(),
            settings.tick,
            config.timing(),
        );

        Ok(Self {
            counter: DispatchCounter::new(config.deep_reload_counter),
            settings,
            pool,
            lifecycle,
            lean_source,
            reload,
            lean,
            stack,
            guard,
            state: CycleState::Init,
        })
    }

    pub fn state(&self) -> CycleState {
        self.state
    }

    pub fn stack(&self) -> &VolumeStack {
        &self.stack
    }

    pub fn lean(&self) -> &LeanState {
        &self.lean
    }

    pub fn guard(&self) -> &PriceGuard {
        &self.guard
    }

    /// Drop back to INIT after a failed cycle.
    ///
    /// The dispatch counter restarts and the lean feed is re-read on the
    /// next cycle; the guard window and the stack are kept.
    pub fn reset_after_failure(&mut self) {
        self.counter.reset();
        self.reload.force();
        self.transition(CycleState::Init);
    }

    fn transition(&mut self, next: CycleState) {
        debug!(from = %self.state, to = %next, "Cycle state");
        self.state = next;
    }

    fn reload_lean_if_due(&mut self) -> AppResult<()> {
        let now = Instant::now();
        if !self.reload.is_due(now) {
            return Ok(());
        }

        let lean = self.lean_source.load(&self.settings.symbol)?;
        self.reload.mark(now);
        self.lean = lean;

        if self.stack.set_static_displacement(lean.displacement) {
            info!(displacement = %lean.displacement, "Static tier re-keyed");
        }
        info!(
            lean = lean.lean,
            tier_width = %lean.tier_width,
            displacement = %lean.displacement,
            "Lean parameters reloaded"
        );
        Ok(())
    }

    /// Run one full cycle.
    pub async fn run_cycle(&mut self) -> AppResult<CycleReport> {
        let started = Instant::now();
        self.transition(CycleState::Init);

        self.transition(CycleState::ReloadConfig);
        self.reload_lean_if_due()?;

        self.transition(CycleState::FetchMarketState);
        let book = self
            .pool
            .get_order_book(&self.settings.symbol, self.settings.odepth)
            .await?;
        let reference = ReferencePrice::from_book(&book, Utc::now())?;
        if let Some(value) = reference.value.inner().to_f64() {
            Metrics::reference_price(value);
        }

        if let Err(e) = self.guard.check(reference.value, reference.timestamp) {
            if matches!(e, QuoteError::PriceOutOfRange { .. }) {
                Metrics::guard_breached();
            }
            return Err(e.into());
        }

        let balances = self.pool.get_account_balance().await?;

        self.transition(CycleState::Compute);
        let ratio = balance_ratio(&balances, &self.settings.pair, reference.value)?;
        if let Some(value) = ratio.to_f64() {
            Metrics::balance_ratio(value);
        }
        let sign = LeanSign::classify(self.lean.lean)?;
        let mode = self.counter.next_mode();
        info!(
            pair = %self.settings.symbol,
            reference = %reference.value,
            ratio = %ratio,
            lean_sign = ?sign,
            mode = %mode,
            "Cycle computed"
        );

        let ctx = CycleContext {
            reference,
            book,
            ratio,
            lean: self.lean,
            mode,
        };

        self.transition(CycleState::Dispatch(mode));
        Metrics::dispatched(mode.as_str());
        let tiers = match mode {
            DispatchMode::Shallow => self.stack.shallow(self.settings.shallow_depth),
            DispatchMode::Full => self.stack.tiers(),
        };

        let mut report = CycleReport {
            mode,
            reference: reference.value,
            ratio: ratio.value(),
            tiers: tiers.len(),
            posted: 0,
            post_failures: 0,
            cancelled: 0,
            cancel_failures: 0,
        };
        for side in [OrderSide::Sell, OrderSide::Buy] {
            self.dispatch_side(side, tiers, &ctx, &mut report).await?;
        }

        self.transition(CycleState::Sleep);
        Metrics::cycle_completed(started.elapsed().as_secs_f64() * 1000.0);
        Ok(report)
    }

    async fn dispatch_side(
        &self,
        side: OrderSide,
        tiers: &[VolumeTier],
        ctx: &CycleContext,
        report: &mut CycleReport,
    ) -> AppResult<()> {
        if tiers.is_empty() {
            return Ok(());
        }
        // Expiry scales against the whole stack, not the dispatched slice.
        let smallest = min_volume(self.stack.tiers()).unwrap_or(Size::ZERO);

        let open = self.lifecycle.open_orders(side).await?;
        let bands = volume_bands(tiers);
        let local = local_lean(side, ctx.ratio, self.settings.local_defense)?;
        debug!(side = %side, local_lean = %local, "Local lean");

        for (tier, band) in tiers.iter().zip(&bands) {
            let raw = compose_price(
                side,
                ctx.reference.value,
                tier.displacement,
                &ctx.lean,
                local,
                &self.settings.tick,
            )?;
            let price = reconcile(
                side,
                raw,
                tier.volume,
                self.settings.dust,
                &ctx.book,
                &self.settings.tick,
            );
            info!(
                side = %side,
                displacement = %tier.displacement,
                volume = %tier.volume,
                raw = %raw,
                price = %price,
                "Tier priced"
            );

            let summary = self.lifecycle.cancel_band(&open, band).await;
            Metrics::cancels(summary.cancelled.len(), summary.failed.len());
            report.cancelled += summary.cancelled.len();
            report.cancel_failures += summary.failed.len();

            let factor = if smallest.is_zero() {
                Decimal::ONE
            } else {
                tier.volume.inner() / smallest.inner()
            };
            match self.lifecycle.post(side, price, tier.volume, factor).await? {
                PostOutcome::Posted { .. } => {
                    Metrics::order_posted(side.as_str());
                    report.posted += 1;
                }
                PostOutcome::Failed { reason, .. } => {
                    warn!(side = %side, volume = %tier.volume, reason = %reason, "Tier skipped");
                    Metrics::order_post_failed(side.as_str());
                    report.post_failures += 1;
                }
            }
        }
        Ok(())
    }
}
