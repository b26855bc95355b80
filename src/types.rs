//! Core data types shared across the progression performance layer
//!
//! This module defines the fundamental data structures used across the system:
//!
//! # Key Types
//!
//! - **`CharacterId`**: Unique identifier for a character (64-bit integer)
//! - **`JobId`**: Job (class) name, e.g. `"warrior"`
//! - **`Rank`**: A job's progression tier
//! - **`StatModifierSet`**: Derived stat modifiers for a (character, job, rank)
//! - **`DerivedData`**: The value type stored in the cache, one variant per category
//! - **`CacheCategory`**: The closed set of independent cache categories
//! - **`UpdateKind`** / **`UpdatePriority`**: Tags carried by UI update requests
//!
//! # Example
//!
//! ```rust
//! use progression_perf::types::{derived_key, CacheCategory, UpdatePriority};
//!
//! let key = derived_key(1, "warrior", 3);
//! assert_eq!(key, "1-warrior-3");
//!
//! // Lower numeric value means more urgent
//! assert!(UpdatePriority::High < UpdatePriority::Low);
//! assert_eq!(CacheCategory::StatModifiers.as_str(), "stat_modifiers");
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique identifier for a character
pub type CharacterId = u64;

/// Job (class) identifier, e.g. `"warrior"` or `"sage"`
pub type JobId = String;

/// A job's progression tier
pub type Rank = u8;

/// Skill identifier, e.g. `"cleave"`
pub type SkillId = String;

/// Build the canonical cache key for a (character, job, rank) triple.
///
/// All derived-data categories share this key shape so that a single
/// invalidation sweep can address every cached view of one progression state.
pub fn derived_key(character: CharacterId, job: &str, rank: Rank) -> String {
    format!("{}-{}-{}", character, job, rank)
}

/// Derived stat modifiers for one (character, job, rank) combination
///
/// Produced by out-of-scope domain rules; this layer only caches and pools
/// the records.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct StatModifierSet {
    /// Hit point modifier
    pub hp: i32,
    /// Magic point modifier
    pub mp: i32,
    /// Physical attack modifier
    pub attack: i32,
    /// Physical defense modifier
    pub defense: i32,
    /// Turn-order agility modifier
    pub agility: i32,
    /// Magic power modifier
    pub magic: i32,
}

impl StatModifierSet {
    /// Sum two modifier sets field by field
    pub fn combined(&self, other: &StatModifierSet) -> StatModifierSet {
        StatModifierSet {
            hp: self.hp + other.hp,
            mp: self.mp + other.mp,
            attack: self.attack + other.attack,
            defense: self.defense + other.defense,
            agility: self.agility + other.agility,
            magic: self.magic + other.magic,
        }
    }
}

/// What a character must spend and satisfy to advance a job by one rank
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RankUpRequirement {
    /// Essence cost for the rank-up
    pub essence_cost: u64,
    /// Minimum character level required
    pub required_level: u8,
    /// Jobs that must be held at any rank before this rank-up is offered
    pub prerequisite_jobs: Vec<JobId>,
}

/// Cached value type, one variant per cache category
///
/// The cache stores whichever view domain code asked for; the variant and the
/// category it is stored under are expected to agree, but the store itself
/// never inspects the payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DerivedData {
    /// Stat modifiers for a (character, job, rank)
    StatModifiers(StatModifierSet),
    /// Unlocked skill list for a (character, job, rank)
    SkillList(Vec<SkillId>),
    /// Requirements for the next rank-up
    RankUpRequirement(RankUpRequirement),
    /// Job compatibility score in `[0.0, 1.0]`
    Compatibility(f64),
}

/// The independent cache categories
///
/// Each category owns its own entry map and `{max_entries, ttl}`; eviction in
/// one never affects another.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CacheCategory {
    /// Derived stat modifiers
    StatModifiers,
    /// Unlocked skill lists
    SkillList,
    /// Rank-up requirements
    RankUpRequirements,
    /// Job compatibility scores
    Compatibility,
}

impl CacheCategory {
    /// Every category, in declaration order
    pub const ALL: [CacheCategory; 4] = [
        CacheCategory::StatModifiers,
        CacheCategory::SkillList,
        CacheCategory::RankUpRequirements,
        CacheCategory::Compatibility,
    ];

    /// Stable snake_case name used in metrics labels and reports
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheCategory::StatModifiers => "stat_modifiers",
            CacheCategory::SkillList => "skill_list",
            CacheCategory::RankUpRequirements => "rank_up_requirements",
            CacheCategory::Compatibility => "compatibility",
        }
    }
}

impl fmt::Display for CacheCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The kind of UI element an update request targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UpdateKind {
    /// Character stat panel
    StatPanel,
    /// Job skill list widget
    SkillList,
    /// Essence / resource bar
    ResourceBar,
    /// Job badge and rank pips
    JobBadge,
    /// Rank-up or job-change animation
    Animation,
    /// Hover tooltip contents
    Tooltip,
}

impl UpdateKind {
    /// Animation-class updates run even for elements marked not visible,
    /// since the animation itself is what brings the element on screen.
    pub fn ignores_visibility(&self) -> bool {
        matches!(self, UpdateKind::Animation)
    }

    /// Stable snake_case name used in metrics labels and logs
    pub fn as_str(&self) -> &'static str {
        match self {
            UpdateKind::StatPanel => "stat_panel",
            UpdateKind::SkillList => "skill_list",
            UpdateKind::ResourceBar => "resource_bar",
            UpdateKind::JobBadge => "job_badge",
            UpdateKind::Animation => "animation",
            UpdateKind::Tooltip => "tooltip",
        }
    }
}

impl fmt::Display for UpdateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Priority carried by an update request
///
/// Lower numeric value means more urgent. `Immediate` bypasses batching
/// entirely and executes synchronously at request time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum UpdatePriority {
    /// Execute synchronously, never queued
    Immediate = 0,
    /// Front of the next tick
    High = 1,
    /// Default priority
    Normal = 2,
    /// Runs after everything else fits in the budget
    Low = 3,
}

impl UpdatePriority {
    /// Numeric rank used for sorting (lower runs first)
    pub fn rank(&self) -> u8 {
        *self as u8
    }
}

impl fmt::Display for UpdatePriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            UpdatePriority::Immediate => "immediate",
            UpdatePriority::High => "high",
            UpdatePriority::Normal => "normal",
            UpdatePriority::Low => "low",
        };
        f.write_str(s)
    }
}
