//! Per-run merge configuration and the log of applied operations.

use crate::error::{MergeError, Result};
use crate::matcher::{LabelSimilarity, NodeSimilarity};
use crate::operations::Operation;
use crate::types::StrategyTable;

/// Default likelihood threshold below which a matching is ignored by pairing.
pub const DEFAULT_THRESHOLD: f64 = 0.2;

/// Read-only configuration of a merge run.
#[derive(Debug, Clone, PartialEq)]
pub struct MergeConfig {
    /// Matchings whose percentage is below this are treated as no matching.
    pub threshold: f64,
    /// Emit choice nodes instead of conflict nodes. Applies to every node of
    /// the run; there is no per-kind or per-subtree switch.
    pub conditional_merge: bool,
    pub strategies: StrategyTable,
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            conditional_merge: false,
            strategies: StrategyTable::new(),
        }
    }
}

impl MergeConfig {
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.threshold) {
            return Err(MergeError::InvalidThreshold(self.threshold));
        }
        Ok(())
    }
}

/// Counts of applied operations by kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeStats {
    pub adds: usize,
    pub deletes: usize,
    /// Conflict operations that produced a conflict node.
    pub conflicts: usize,
    /// Conflict operations resolved into a choice node by conditional merging.
    pub choices: usize,
    pub merges: usize,
}

impl MergeStats {
    pub fn from_operations<'a>(ops: impl IntoIterator<Item = &'a Operation>) -> Self {
        let mut stats = Self::default();
        for op in ops {
            match op {
                Operation::Add(_) => stats.adds += 1,
                Operation::Delete(_) => stats.deletes += 1,
                Operation::Conflict(op) if op.as_choice => stats.choices += 1,
                Operation::Conflict(_) => stats.conflicts += 1,
                Operation::Merge(_) => stats.merges += 1,
            }
        }
        stats
    }

    pub fn has_conflicts(&self) -> bool {
        self.conflicts > 0
    }
}

/// State shared by every step of one merge run.
pub struct MergeContext {
    config: MergeConfig,
    similarity: Box<dyn NodeSimilarity>,
    applied: Vec<Operation>,
}

impl MergeContext {
    pub fn new(config: MergeConfig) -> Self {
        Self::with_similarity(config, Box::new(LabelSimilarity))
    }

    pub fn with_similarity(config: MergeConfig, similarity: Box<dyn NodeSimilarity>) -> Self {
        Self {
            config,
            similarity,
            applied: Vec::new(),
        }
    }

    pub fn config(&self) -> &MergeConfig {
        &self.config
    }

    pub fn threshold(&self) -> f64 {
        self.config.threshold
    }

    pub fn is_conditional_merge(&self) -> bool {
        self.config.conditional_merge
    }

    pub fn strategies(&self) -> &StrategyTable {
        &self.config.strategies
    }

    pub fn similarity(&self) -> &dyn NodeSimilarity {
        self.similarity.as_ref()
    }

    /// Append an operation to the run log.
    pub fn record(&mut self, op: Operation) {
        self.applied.push(op);
    }

    /// Every operation applied so far, in application order.
    pub fn operations(&self) -> &[Operation] {
        &self.applied
    }

    pub fn stats(&self) -> MergeStats {
        MergeStats::from_operations(&self.applied)
    }
}

impl Default for MergeContext {
    fn default() -> Self {
        Self::new(MergeConfig::default())
    }
}
