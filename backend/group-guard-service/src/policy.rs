//! Per-group moderation policy, read-only from the engine's point of view.

use crate::models::{GroupId, ViolationKind, DEFAULT_WARNING_THRESHOLD};
use dashmap::DashMap;
use std::collections::{HashMap, HashSet};

/// Default number of distinct mentions treated as excessive tagging
pub const DEFAULT_MAX_MENTIONS: usize = 5;

pub trait PolicySource: Send + Sync {
    fn is_enabled(&self, group_id: &GroupId, kind: ViolationKind) -> bool;

    /// Configured threshold; the ledger clamps it into the kind's allowed range
    fn warning_threshold(&self, group_id: &GroupId, kind: ViolationKind) -> u32;

    fn max_mentions(&self, group_id: &GroupId) -> usize;
}

/// Policy overrides for a single group
#[derive(Debug, Clone, Default)]
pub struct GroupPolicy {
    pub enabled: Option<HashSet<ViolationKind>>,
    pub warning_threshold: Option<u32>,
    /// Per-kind thresholds; take precedence over `warning_threshold`
    pub thresholds: HashMap<ViolationKind, u32>,
    pub max_mentions: Option<usize>,
}

/// Policy resolved from configuration, with optional per-group overrides.
///
/// Thresholds resolve as: group per-kind, group default, global per-kind,
/// global default.
pub struct StaticPolicy {
    enabled: HashSet<ViolationKind>,
    warning_threshold: u32,
    kind_thresholds: HashMap<ViolationKind, u32>,
    max_mentions: usize,
    overrides: DashMap<GroupId, GroupPolicy>,
}

impl StaticPolicy {
    pub fn new(
        enabled: impl IntoIterator<Item = ViolationKind>,
        warning_threshold: u32,
        max_mentions: usize,
    ) -> Self {
        Self {
            enabled: enabled.into_iter().collect(),
            warning_threshold,
            kind_thresholds: HashMap::new(),
            max_mentions,
            overrides: DashMap::new(),
        }
    }

    pub fn with_kind_thresholds(
        mut self,
        thresholds: impl IntoIterator<Item = (ViolationKind, u32)>,
    ) -> Self {
        self.kind_thresholds.extend(thresholds);
        self
    }

    /// Every detector enabled with default limits
    pub fn permissive_defaults() -> Self {
        Self::new(
            ViolationKind::ALL,
            DEFAULT_WARNING_THRESHOLD,
            DEFAULT_MAX_MENTIONS,
        )
    }

    pub fn set_group_policy(&self, group_id: GroupId, policy: GroupPolicy) {
        self.overrides.insert(group_id, policy);
    }
}

impl PolicySource for StaticPolicy {
    fn is_enabled(&self, group_id: &GroupId, kind: ViolationKind) -> bool {
        match self
            .overrides
            .get(group_id)
            .and_then(|p| p.enabled.as_ref().map(|e| e.contains(&kind)))
        {
            Some(enabled) => enabled,
            None => self.enabled.contains(&kind),
        }
    }

    fn warning_threshold(&self, group_id: &GroupId, kind: ViolationKind) -> u32 {
        let group = self.overrides.get(group_id).and_then(|p| {
            p.thresholds
                .get(&kind)
                .copied()
                .or(p.warning_threshold)
        });

        group
            .or_else(|| self.kind_thresholds.get(&kind).copied())
            .unwrap_or(self.warning_threshold)
    }

    fn max_mentions(&self, group_id: &GroupId) -> usize {
        self.overrides
            .get(group_id)
            .and_then(|p| p.max_mentions)
            .unwrap_or(self.max_mentions)
    }
}
