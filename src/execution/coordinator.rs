use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::watch;

use super::reconciler::decide;
use super::tracker::SignalTracker;
use crate::account;
use crate::api::KrakenClient;
use crate::config::{BackoffConfig, CadenceConfig, LoopConfig};
use crate::error::BotError;
use crate::models::{Action, OrderRequest, OrderSide, OrderType};
use crate::strategy::Strategy;

/// Pipeline stage a cycle was in when it ended, for logs and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Fetching,
    Evaluating,
    Deciding,
    Submitting,
}

/// How one polling cycle ended. Errors are folded in rather than
/// propagated: the loop never dies, it only logs and re-times.
#[derive(Debug)]
pub enum CycleOutcome {
    /// No actionable decision this cycle.
    Held { reason: String },
    /// Exactly one order was submitted and acknowledged.
    Submitted { txid: String },
    /// The cycle stopped early; the loop continues.
    Aborted { stage: Stage, error: BotError },
}

/// Perpetual polling loop for one (pair, interval, strategy) key.
///
/// Owns its `SignalTracker` exclusively; cycles run strictly
/// sequentially, so cycle N+1 never starts before cycle N has fully
/// settled. At most one order is submitted per cycle, and a failed
/// submission is never retried in-cycle; the next poll re-reads
/// balances and may re-decide.
pub struct Coordinator {
    exchange: Arc<KrakenClient>,
    strategy: Box<dyn Strategy>,
    tracker: SignalTracker,
    loop_config: LoopConfig,
    trade_volume: f64,
    fee_rate: f64,
    backoff: BackoffConfig,
}

impl Coordinator {
    pub fn new(
        exchange: Arc<KrakenClient>,
        strategy: Box<dyn Strategy>,
        loop_config: LoopConfig,
        trade_volume: f64,
        fee_rate: f64,
        backoff: BackoffConfig,
    ) -> Self {
        Self {
            exchange,
            strategy,
            tracker: SignalTracker::new(),
            loop_config,
            trade_volume,
            fee_rate,
            backoff,
        }
    }

    /// Run until the shutdown signal is raised. A raised signal prevents
    /// the next cycle from starting; an in-flight exchange call finishes
    /// or times out first, so no submission is abandoned mid-flight.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        tracing::info!(
            pair = %self.loop_config.pair,
            strategy = self.strategy.name(),
            interval = self.loop_config.interval_minutes,
            "loop starting"
        );

        let mut backoff_secs = self.backoff.initial_secs;

        loop {
            if *shutdown.borrow() {
                break;
            }

            let outcome = self.run_cycle().await;
            let delay = match &outcome {
                CycleOutcome::Held { reason } => {
                    tracing::debug!(pair = %self.loop_config.pair, %reason, "cycle held");
                    backoff_secs = self.backoff.initial_secs;
                    self.cadence_delay()
                }
                CycleOutcome::Submitted { txid } => {
                    tracing::info!(pair = %self.loop_config.pair, %txid, "✓ order submitted");
                    backoff_secs = self.backoff.initial_secs;
                    self.cadence_delay()
                }
                CycleOutcome::Aborted { stage, error } => self.delay_for_error(
                    *stage,
                    error,
                    &mut backoff_secs,
                ),
            };

            // Sleep, but wake immediately when shutdown is raised.
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                changed = shutdown.changed() => {
                    // A dropped sender means the process is going away.
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        tracing::info!(pair = %self.loop_config.pair, "loop stopped");
    }

    /// Execute exactly one Fetch → Evaluate → Decide → Submit pass.
    pub async fn run_cycle(&mut self) -> CycleOutcome {
        match self.cycle().await {
            Ok(outcome) => outcome,
            Err((stage, error)) => CycleOutcome::Aborted { stage, error },
        }
    }

    async fn cycle(&mut self) -> std::result::Result<CycleOutcome, (Stage, BotError)> {
        let pair = self.loop_config.pair.clone();
        let base = self.loop_config.base.clone();

        // Fetching: no partial state is committed on failure.
        let series = self
            .exchange
            .get_ohlc(&pair, self.loop_config.interval_minutes)
            .await
            .map_err(|e| (Stage::Fetching, e))?;
        let balances = self
            .exchange
            .get_balances()
            .await
            .map_err(|e| (Stage::Fetching, e))?;
        let closed_orders = self
            .exchange
            .get_closed_orders()
            .await
            .map_err(|e| (Stage::Fetching, e))?;
        // Depth is valuation-only; a missing book prices the position at
        // zero instead of aborting the cycle.
        let depth = match self.exchange.get_order_book_depth(&pair).await {
            Ok(depth) => Some(depth),
            Err(error) => {
                tracing::warn!(%pair, %error, "depth unavailable, valuing position at zero");
                None
            }
        };

        // Evaluating: pure given the fetched series.
        let evaluation = self
            .strategy
            .evaluate(&series)
            .map_err(|e| (Stage::Evaluating, e))?;

        // Deciding.
        let closes = series.closes();
        let state = self.tracker.update(&evaluation.signals, &closes).clone();
        let balance = balances.get(&base).copied().unwrap_or(0.0);
        let position =
            account::build_position(&base, balance, &closed_orders, depth.as_ref(), self.fee_rate);
        let decision = decide(&state, position.as_ref(), self.trade_volume);

        tracing::info!(
            %pair,
            balance,
            last_signal = ?state.last_signal,
            last_non_zero = ?state.last_non_zero,
            periods_since = ?state.periods_since_non_zero,
            signal_price = ?state.last_non_zero_price,
            close = series.last().map(|c| c.close).unwrap_or_default(),
            pnl_after_fees = ?position.as_ref().map(|p| p.pnl_after_fees),
            now = %Utc::now().format("%Y-%m-%d %H:%M:%S"),
            "trade update"
        );

        // Submitting: at most one order per cycle.
        match decision.action {
            Action::NoAction => Ok(CycleOutcome::Held {
                reason: decision.reason,
            }),
            Action::PlaceBuy { volume } => self.submit(OrderSide::Buy, volume, &decision.reason).await,
            Action::PlaceSell { volume } => {
                self.submit(OrderSide::Sell, volume, &decision.reason).await
            }
        }
    }

    async fn submit(
        &self,
        side: OrderSide,
        volume: f64,
        reason: &str,
    ) -> std::result::Result<CycleOutcome, (Stage, BotError)> {
        let request = OrderRequest {
            side,
            order_type: OrderType::Market,
            volume,
            pair: self.loop_config.pair.clone(),
            limit_price: None,
        };
        tracing::info!(
            pair = %request.pair,
            side = side.as_str(),
            volume,
            reason,
            "submitting order"
        );

        let receipt = self
            .exchange
            .place_order(&request)
            .await
            .map_err(|e| (Stage::Submitting, e))?;

        Ok(CycleOutcome::Submitted {
            txid: receipt.txids.first().cloned().unwrap_or_default(),
        })
    }

    /// Apply the per-variant error policy and pick the next delay.
    fn delay_for_error(
        &self,
        stage: Stage,
        error: &BotError,
        backoff_secs: &mut u64,
    ) -> Duration {
        match error {
            BotError::Transport(_) | BotError::OrderRejected(_) => {
                tracing::warn!(
                    pair = %self.loop_config.pair,
                    ?stage,
                    %error,
                    backoff_secs = *backoff_secs,
                    "✗ cycle failed, backing off"
                );
                let delay = Duration::from_secs(*backoff_secs);
                *backoff_secs = (*backoff_secs * 2).min(self.backoff.max_secs.max(1));
                delay
            }
            BotError::Auth(_) => {
                // Critical but not fatal: credentials may recover.
                tracing::error!(pair = %self.loop_config.pair, ?stage, %error, "authentication failure");
                self.cadence_delay()
            }
            _ => {
                // Data problems abort only this cycle's evaluation; the
                // cycle degrades to a no-decision hold.
                tracing::warn!(pair = %self.loop_config.pair, ?stage, %error, "cycle degraded to hold");
                self.cadence_delay()
            }
        }
    }

    fn cadence_delay(&self) -> Duration {
        match self.loop_config.cadence {
            CadenceConfig::Fixed { secs } => Duration::from_secs(secs.max(1)),
            CadenceConfig::Aligned {
                period_secs,
                offset_secs,
            } => {
                let period = period_secs.max(1);
                let offset = offset_secs % period;
                let into = Utc::now().timestamp().rem_euclid(period as i64) as u64;
                let wait = if into < offset {
                    offset - into
                } else {
                    period - into + offset
                };
                Duration::from_secs(wait.max(1))
            }
        }
    }
}
