use crate::analyzer::Shortcuts;
use crate::model::{ExtremaSignal, TrendSignal};

/// One action a strategy can ask its item to perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrategyStep {
    /// Fetch the order book summary and store it.
    RecordPrice,
    /// Re-run the analysis on the item's history and re-evaluate the strategy.
    Reanalyze,
    /// Stop watching the item.
    Release,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrategyKind {
    /// Rising market: record, re-check, then let go.
    Alpha,
    /// No clear direction: record and re-check until the sequence runs out.
    Observe,
    /// Falling on both month and week: not worth watching.
    Decline,
}

impl StrategyKind {
    pub fn for_shortcuts(shortcuts: &Shortcuts) -> Self {
        match (shortcuts.month_trend, shortcuts.week_trend) {
            (TrendSignal::Down, TrendSignal::Down) => StrategyKind::Decline,
            (TrendSignal::Up, TrendSignal::Up | TrendSignal::None) => StrategyKind::Alpha,
            (TrendSignal::None, TrendSignal::Up) if shortcuts.month_last_extremum == Some(ExtremaSignal::Min) => {
                StrategyKind::Alpha
            }
            _ => StrategyKind::Observe,
        }
    }

    fn steps(&self) -> &'static [StrategyStep] {
        use StrategyStep::*;
        match self {
            StrategyKind::Alpha => &[RecordPrice, Reanalyze, Release],
            StrategyKind::Observe => &[RecordPrice, Reanalyze],
            StrategyKind::Decline => &[Release],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrategyOutcome {
    Action(StrategyStep),
    EndOfSequence,
}

/// A fixed sequence of steps walked by a cursor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Strategy {
    kind: StrategyKind,
    cursor: usize,
}

impl Strategy {
    pub fn new(kind: StrategyKind) -> Self {
        Self { kind, cursor: 0 }
    }

    pub fn choose(shortcuts: &Shortcuts) -> Self {
        Self::new(StrategyKind::for_shortcuts(shortcuts))
    }

    pub fn kind(&self) -> StrategyKind {
        self.kind
    }

    /// The step to run next. Does not move the cursor.
    pub fn next_action(&self) -> StrategyOutcome {
        match self.kind.steps().get(self.cursor) {
            Some(step) => StrategyOutcome::Action(*step),
            None => StrategyOutcome::EndOfSequence,
        }
    }

    /// Marks the current step as done.
    pub fn advance(&mut self) {
        self.cursor = (self.cursor + 1).min(self.kind.steps().len());
    }
}
