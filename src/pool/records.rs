//! Pooled result record shapes
//!
//! The three record types that churn fastest during progression changes.
//! Each implements [`PoolItem`](super::PoolItem) with an explicit reset
//! restoring the zero-value shape.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::{CharacterId, JobId, Rank, SkillId, StatModifierSet, UpdateKind};

use super::PoolItem;

/// Reusable carrier for a computed stat-modifier result
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatModifierRecord {
    /// Character the modifiers were computed for
    pub character: CharacterId,
    /// Job the modifiers were computed for
    pub job: JobId,
    /// Rank the modifiers were computed for
    pub rank: Rank,
    /// The computed modifiers
    pub modifiers: StatModifierSet,
}

impl PoolItem for StatModifierRecord {
    fn reset(&mut self) {
        self.character = 0;
        self.job.clear();
        self.rank = 0;
        self.modifiers = StatModifierSet::default();
    }
}

/// Reusable carrier for the outcome of a rank-up or job change
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChangeResultRecord {
    /// Whether the change was applied
    pub success: bool,
    /// Essence deducted by the change
    pub essence_spent: u64,
    /// Rank before the change
    pub previous_rank: Rank,
    /// Rank after the change
    pub new_rank: Rank,
    /// Skills newly unlocked by the change
    pub unlocked_skills: Vec<SkillId>,
    /// Net stat delta produced by the change
    pub stat_changes: StatModifierSet,
    /// Human-readable notes accumulated while resolving the change
    pub messages: Vec<String>,
}

impl PoolItem for ChangeResultRecord {
    fn reset(&mut self) {
        self.success = false;
        self.essence_spent = 0;
        self.previous_rank = 0;
        self.new_rank = 0;
        self.unlocked_skills.clear();
        self.stat_changes = StatModifierSet::default();
        self.messages.clear();
    }
}

/// Reusable carrier for a group of UI refresh instructions
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UiBatchRecord {
    /// Element targets to refresh
    pub targets: Vec<String>,
    /// The kind of refresh per target
    pub kinds: Vec<UpdateKind>,
    /// Per-target payloads
    pub payloads: Vec<Value>,
    /// Estimated execution cost in microseconds
    pub estimated_cost_us: u64,
}

impl PoolItem for UiBatchRecord {
    fn reset(&mut self) {
        self.targets.clear();
        self.kinds.clear();
        self.payloads.clear();
        self.estimated_cost_us = 0;
    }
}
