//! Search configuration and the per-search environment handed to nodes.

use crate::game::{Game, Heuristic, SelectionPolicy};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Configuration errors, surfaced immediately when a component is built.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("num_workers must be > 0")]
    ZeroWorkers,

    #[error("table index bits must be in 1..=30, got {0}")]
    TableBits(u32),
}

/// Value assigned to children that have never been visited, selected by the
/// driver's initialization policy.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueInit {
    /// Treat unvisited children as a draw.
    Draw,
    /// Infinite estimate so every unvisited child wins selection once.
    Optimistic,
    Loss,
    Win,
    /// Inherit the expanding node's current average.
    ParentAverage,
}

/// Node variant used throughout one tree. Chosen at construction, never
/// switched at runtime.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TreeKind {
    /// One owned state snapshot per node, fixed child array.
    Deterministic,
    /// Deterministic plus a mutable alpha/beta window per node.
    AlphaBeta,
    /// Deterministic plus pessimistic/optimistic solving bounds.
    ScoreBounds,
    /// No owned per-node state; per-worker iteration contexts.
    OpenLoop,
}

/// Driver-tunable settings consumed by the node family.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SearchSettings {
    pub value_init: ValueInit,
    /// Allocate all-moves-as-first statistics tables on every node.
    pub use_amaf: bool,
    /// Number of concurrent search workers; sizes the open-loop iteration
    /// slot arenas.
    pub num_workers: usize,
}

impl SearchSettings {
    pub fn validated(self) -> Result<Self, ConfigError> {
        if self.num_workers == 0 {
            return Err(ConfigError::ZeroWorkers);
        }
        Ok(self)
    }
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            value_init: ValueInit::Draw,
            use_amaf: false,
            num_workers: 1,
        }
    }
}

/// Everything a node needs from its owning driver: the rules evaluator, the
/// validated settings and the currently configured learned policies.
///
/// Handed to every node as an `Arc` at construction. Policies are fixed for
/// the lifetime of a tree; swapping them mid-search is not supported (cached
/// per-node distributions would go stale).
pub struct SearchEnv<G: Game> {
    pub game: Arc<G>,
    pub settings: SearchSettings,
    pub selection_policy: Option<Arc<dyn SelectionPolicy<G>>>,
    pub playout_policy: Option<Arc<dyn SelectionPolicy<G>>>,
    pub heuristic: Option<Arc<dyn Heuristic<G>>>,
}

impl<G: Game> SearchEnv<G> {
    /// Environment with no learned policies and no heuristic.
    pub fn new(game: Arc<G>, settings: SearchSettings) -> Result<Arc<Self>, ConfigError> {
        Ok(Arc::new(Self {
            game,
            settings: settings.validated()?,
            selection_policy: None,
            playout_policy: None,
            heuristic: None,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_validation() {
        let bad = SearchSettings {
            num_workers: 0,
            ..SearchSettings::default()
        };
        assert!(matches!(bad.validated(), Err(ConfigError::ZeroWorkers)));

        let ok = SearchSettings::default().validated().unwrap();
        assert_eq!(ok.num_workers, 1);
    }
}
