use super::strategy::{Strategy, StrategyOutcome, StrategyStep};
use crate::analyzer::{AnalysisEngine, History};
use crate::config::SchedulerConfig;
use crate::market::MarketApi;
use crate::model::{ActionSignal, ItemError, ItemIdentity, MarketError, PriceSnapshot};
use crate::parser::{HistoryParser, Parser};
use crate::scheduler::{NextAction, Schedulable};
use crate::storage::SqliteStorage;

use chrono::Utc;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{timeout, Instant};
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemState {
    NoHistory,
    HasHistory,
    HasStrategy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemAction {
    FetchAndAnalyzeHistory,
    ChooseStrategy,
    Strategy(StrategyStep),
}

/// Bounded exponential backoff for failing actions.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base: Duration,
    pub max: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &SchedulerConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            base: Duration::from_secs(config.backoff_base_seconds),
            max: Duration::from_secs(config.backoff_max_seconds),
        }
    }

    /// Pause after the `failures`-th consecutive failure: `base * 2^(failures-1)`, capped.
    pub fn backoff(&self, failures: u32) -> Duration {
        let factor = 2u32.saturating_pow(failures.saturating_sub(1));
        self.base.saturating_mul(factor).min(self.max)
    }
}

/// Collaborators shared by every watched item.
pub struct ItemContext {
    market: Arc<dyn MarketApi>,
    storage: Arc<Mutex<SqliteStorage>>,
    engine: AnalysisEngine,
    parser: HistoryParser,
    retry: RetryPolicy,
    call_timeout: Duration,
    history_max_age: Duration,
}

impl ItemContext {
    pub fn new(
        market: Arc<dyn MarketApi>,
        storage: Arc<Mutex<SqliteStorage>>,
        engine: AnalysisEngine,
        config: &SchedulerConfig,
    ) -> Self {
        Self {
            market,
            storage,
            engine,
            parser: HistoryParser::new(),
            retry: RetryPolicy::from_config(config),
            call_timeout: Duration::from_secs(config.action_timeout_seconds),
            history_max_age: Duration::from_secs(config.history_max_age_seconds),
        }
    }

    async fn call<T, F>(&self, request: F) -> Result<T, MarketError>
    where
        F: Future<Output = Result<T, MarketError>>,
    {
        timeout(self.call_timeout, request)
            .await
            .map_err(|_| MarketError::Timeout)?
    }
}

/// One market item moving through fetch, strategy choice and strategy steps.
pub struct WatchedItem {
    identity: ItemIdentity,
    history: Option<History>,
    history_id: Option<i64>,
    strategy: Option<Strategy>,
    failures: u32,
    retry_at: Option<Instant>,
    ctx: Arc<ItemContext>,
}

impl WatchedItem {
    pub fn new(identity: ItemIdentity, ctx: Arc<ItemContext>) -> Self {
        Self {
            identity,
            history: None,
            history_id: None,
            strategy: None,
            failures: 0,
            retry_at: None,
            ctx,
        }
    }

    pub fn state(&self) -> ItemState {
        match (&self.history, &self.strategy) {
            (None, _) => ItemState::NoHistory,
            (Some(_), None) => ItemState::HasHistory,
            (Some(_), Some(_)) => ItemState::HasStrategy,
        }
    }

    /// Latest stored history of this item if it is younger than the configured age.
    async fn stored_history(&self) -> Result<Option<(i64, History)>, ItemError> {
        let ctx = &self.ctx;
        if ctx.history_max_age.is_zero() {
            return Ok(None);
        }
        let Some(stored) = ctx.storage.lock().await.latest_history(self.identity.item_name_id)? else {
            return Ok(None);
        };

        let age = (Utc::now() - stored.created_at).to_std().unwrap_or_default();
        if age >= ctx.history_max_age {
            debug!("Stored history of {} is {:?} old, refetching", self.identity, age);
            return Ok(None);
        }

        let (id, created_at) = (stored.id, stored.created_at);
        let mut history = History::new(stored.into_series()?);
        history.created_at = created_at;
        Ok(Some((id, history)))
    }

    async fn fetch_and_analyze_history(&mut self) -> Result<ActionSignal, ItemError> {
        let ctx = self.ctx.clone();
        let stored = self.stored_history().await?;
        let (stored_id, mut history) = match stored {
            Some((id, history)) => {
                info!("Reusing stored history #{} of {}", id, self.identity);
                (Some(id), history)
            }
            None => {
                let raw = ctx
                    .call(ctx.market.fetch_price_history(&self.identity.market_hash_name))
                    .await?;
                let series = ctx.parser.parse(&raw)?;
                debug!("Parsed {} samples for {}", series.len(), self.identity);
                (None, History::new(series))
            }
        };

        let shortcuts = ctx.engine.analyze(&mut history)?;

        let history_id = {
            let storage = ctx.storage.lock().await;
            match stored_id {
                Some(id) => {
                    storage.update_statistics(id, &history)?;
                    id
                }
                None => {
                    storage.save_item(&self.identity)?;
                    storage.save_history(&self.identity, &history)?
                }
            }
        };

        info!(
            "History of {} analyzed: daily={:?} week={:?} month={:?} over {} days",
            self.identity,
            shortcuts.daily_trend,
            shortcuts.week_trend,
            shortcuts.month_trend,
            shortcuts.days_count
        );
        self.history = Some(history);
        self.history_id = Some(history_id);
        Ok(ActionSignal::Ok)
    }

    fn choose_strategy(&mut self) -> ActionSignal {
        match self.history.as_ref().and_then(|h| h.shortcuts) {
            Some(shortcuts) => {
                let strategy = Strategy::choose(&shortcuts);
                info!("Strategy {:?} chosen for {}", strategy.kind(), self.identity);
                self.strategy = Some(strategy);
                ActionSignal::Ok
            }
            None => {
                warn!("History of {} was never analyzed, fetching again", self.identity);
                self.history = None;
                self.history_id = None;
                ActionSignal::Next
            }
        }
    }

    async fn run_step(&mut self, step: StrategyStep) -> Result<ActionSignal, ItemError> {
        match step {
            StrategyStep::RecordPrice => self.record_price().await,
            StrategyStep::Reanalyze => self.reanalyze().await,
            StrategyStep::Release => {
                info!("Releasing {}", self.identity);
                Ok(ActionSignal::Delete)
            }
        }
    }

    async fn record_price(&mut self) -> Result<ActionSignal, ItemError> {
        let ctx = self.ctx.clone();
        let histogram = ctx
            .call(ctx.market.fetch_price_histogram(self.identity.item_name_id))
            .await?;
        let snapshot =
            PriceSnapshot::from_histogram(self.identity.item_name_id, &histogram, ctx.market.currency())?;

        ctx.storage.lock().await.save_price(&snapshot)?;
        debug!(
            "Recorded price of {}: buy={:?} sell={:?}",
            self.identity, snapshot.highest_buy_order, snapshot.lowest_sell_order
        );

        self.advance();
        Ok(ActionSignal::Ok)
    }

    async fn reanalyze(&mut self) -> Result<ActionSignal, ItemError> {
        let ctx = self.ctx.clone();
        let Some(history) = self.history.as_mut() else {
            self.strategy = None;
            return Ok(ActionSignal::Next);
        };

        let shortcuts = ctx.engine.analyze(history)?;
        if let Some(id) = self.history_id {
            ctx.storage.lock().await.update_statistics(id, history)?;
        }

        let fresh = Strategy::choose(&shortcuts);
        let unchanged = self
            .strategy
            .as_ref()
            .is_some_and(|current| current.kind() == fresh.kind());
        if unchanged {
            self.advance();
        } else {
            info!("Strategy of {} switched to {:?}", self.identity, fresh.kind());
            self.strategy = Some(fresh);
        }
        Ok(ActionSignal::Ok)
    }

    fn advance(&mut self) {
        if let Some(strategy) = self.strategy.as_mut() {
            strategy.advance();
        }
    }

    fn on_failure(&mut self, action: ItemAction, e: ItemError) -> ActionSignal {
        self.failures += 1;
        let retry = self.ctx.retry;
        if self.failures >= retry.max_attempts {
            error!(
                "{:?} failed for {} ({} attempts), giving up: {}",
                action, self.identity, self.failures, e
            );
            return ActionSignal::Delete;
        }

        let pause = retry.backoff(self.failures);
        self.retry_at = Some(Instant::now() + pause);
        warn!(
            "{:?} failed for {} (attempt {}/{}), retrying in {:?}: {}",
            action, self.identity, self.failures, retry.max_attempts, pause, e
        );
        ActionSignal::Next
    }
}

#[async_trait::async_trait]
impl Schedulable for WatchedItem {
    type Action = ItemAction;

    fn get_action(&self) -> NextAction<ItemAction> {
        match self.state() {
            ItemState::NoHistory => NextAction::Run(ItemAction::FetchAndAnalyzeHistory),
            ItemState::HasHistory => NextAction::Run(ItemAction::ChooseStrategy),
            ItemState::HasStrategy => match self.strategy.as_ref().map(Strategy::next_action) {
                Some(StrategyOutcome::Action(step)) => NextAction::Run(ItemAction::Strategy(step)),
                _ => NextAction::Exhausted,
            },
        }
    }

    async fn execute(&mut self, action: ItemAction) -> ActionSignal {
        if let Some(at) = self.retry_at {
            if Instant::now() < at {
                debug!("{} is backing off, skipping its turn", self.identity);
                return ActionSignal::Next;
            }
        }

        let result = match action {
            ItemAction::FetchAndAnalyzeHistory => self.fetch_and_analyze_history().await,
            ItemAction::ChooseStrategy => Ok(self.choose_strategy()),
            ItemAction::Strategy(step) => self.run_step(step).await,
        };

        match result {
            Ok(signal) => {
                self.failures = 0;
                self.retry_at = None;
                signal
            }
            Err(e) => self.on_failure(action, e),
        }
    }

    fn label(&self) -> String {
        self.identity.to_string()
    }

    fn ready_at(&self) -> Option<Instant> {
        self.retry_at
    }
}
