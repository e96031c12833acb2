// Cooperative round-robin over watched items
use crate::model::ActionSignal;
use std::collections::VecDeque;
use std::time::Duration;
use tokio::time::{sleep, sleep_until, Instant};
use tracing::{debug, info, warn};

/// What an item wants to do on its turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NextAction<A> {
    Run(A),
    /// Nothing left to do; the item leaves the queue.
    Exhausted,
}

/// Anything the scheduler can drive.
#[async_trait::async_trait]
pub trait Schedulable: Send {
    type Action: Send;

    /// Pure: asking must not change the item.
    fn get_action(&self) -> NextAction<Self::Action>;

    async fn execute(&mut self, action: Self::Action) -> ActionSignal;

    fn label(&self) -> String;

    /// Earliest instant the item can make progress; `None` when it is ready now.
    fn ready_at(&self) -> Option<Instant> {
        None
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    Rotated,
    Deleted,
    Exhausted,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerReport {
    pub steps: usize,
    pub rotated: usize,
    pub deleted: usize,
    pub exhausted: usize,
}

pub struct Scheduler<T> {
    items: VecDeque<T>,
    step_delay: Duration,
}

impl<T: Schedulable> Scheduler<T> {
    pub fn new(step_delay: Duration) -> Self {
        Self {
            items: VecDeque::new(),
            step_delay,
        }
    }

    /// Appends an item behind everything already queued.
    pub fn push(&mut self, item: T) {
        self.items.push_back(item);
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// When every queued item is waiting, the instant the first one wakes up.
    fn idle_until(&self) -> Option<Instant> {
        let now = Instant::now();
        self.items
            .iter()
            .map(|item| item.ready_at().filter(|at| *at > now))
            .collect::<Option<Vec<_>>>()?
            .into_iter()
            .min()
    }

    /// Serves the front item once. `None` when the queue is empty.
    pub async fn step(&mut self) -> Option<StepOutcome> {
        let item = self.items.front_mut()?;
        let label = item.label();
        debug!("Picked {}", label);

        let action = match item.get_action() {
            NextAction::Run(action) => action,
            NextAction::Exhausted => {
                info!("No more actions for {}, removing", label);
                self.items.pop_front();
                return Some(StepOutcome::Exhausted);
            }
        };

        match item.execute(action).await {
            ActionSignal::Ok | ActionSignal::Next => {
                debug!("Done {}, rotating", label);
                self.items.rotate_left(1);
                Some(StepOutcome::Rotated)
            }
            ActionSignal::Delete => {
                warn!("Removing {} on request", label);
                self.items.pop_front();
                Some(StepOutcome::Deleted)
            }
        }
    }

    /// Serves items until the queue is empty.
    pub async fn run(&mut self) -> SchedulerReport {
        let mut report = SchedulerReport::default();
        info!("Scheduler started with {} items", self.len());

        loop {
            if let Some(wake) = self.idle_until() {
                debug!("All {} items are waiting, sleeping until the first is due", self.len());
                sleep_until(wake).await;
            }
            let Some(outcome) = self.step().await else {
                break;
            };
            report.steps += 1;
            match outcome {
                StepOutcome::Rotated => report.rotated += 1,
                StepOutcome::Deleted => report.deleted += 1,
                StepOutcome::Exhausted => report.exhausted += 1,
            }
            if !self.step_delay.is_zero() && !self.is_empty() {
                sleep(self.step_delay).await;
            }
        }

        info!(
            "Queue drained after {} steps ({} deleted, {} exhausted)",
            report.steps, report.deleted, report.exhausted
        );
        report
    }
}
