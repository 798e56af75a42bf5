//! State-owning node storage: one game-state snapshot per node and a
//! fixed, index-addressed child array.
//!
//! Legal moves are computed once at construction and never re-queried; the
//! cached learned-selection distribution is likewise computed at most once
//! per node (policies are not hot-swapped mid-search).

use crate::config::SearchEnv;
use crate::game::Game;
use once_cell::sync::OnceCell;
use std::sync::Arc;

use super::Node;

/// Outcome of traversing a legal-move index from a state-owning node.
pub enum Step<G: Game> {
    /// The child was already expanded; continue with it (no state
    /// recomputation).
    Descend(Arc<Node<G>>),
    /// The slot is empty; `state` was derived by copying this node's state
    /// and applying the move, `played` is the move with its consequences
    /// resolved.
    Expand { state: G::State, played: G::Move },
}

pub(crate) struct DetNode<G: Game> {
    pub(crate) state: G::State,
    /// Agent to move in `state`, frozen at construction.
    pub(crate) mover: usize,
    /// Empty when `state` is terminal.
    pub(crate) legal: Box<[G::Move]>,
    /// `legal` with consequential sub-moves stripped, for child matching.
    pub(crate) bare: Box<[G::Move]>,
    /// One insert-once slot per legal move; an unset cell is an unexpanded
    /// child.
    pub(crate) children: Box<[OnceCell<Arc<Node<G>>>]>,
    pub(crate) cached_policy: OnceCell<Vec<f32>>,
}

impl<G: Game> DetNode<G> {
    pub(crate) fn new(env: &SearchEnv<G>, state: G::State) -> Self {
        let legal: Box<[G::Move]> = if env.game.is_over(&state) {
            Vec::new().into_boxed_slice()
        } else {
            env.game.legal_moves(&state).into_vec().into_boxed_slice()
        };
        let bare: Box<[G::Move]> = legal
            .iter()
            .map(|m| env.game.without_consequences(m))
            .collect();
        let children: Box<[OnceCell<Arc<Node<G>>>]> =
            legal.iter().map(|_| OnceCell::new()).collect();
        let mover = env.game.mover(&state);
        Self {
            state,
            mover,
            legal,
            bare,
            children,
            cached_policy: OnceCell::new(),
        }
    }

    pub(crate) fn visit_counts(&self) -> Vec<u32> {
        self.children
            .iter()
            .map(|cell| cell.get().map_or(0, |child| child.visits()))
            .collect()
    }

    /// Learned-selection distribution over the fixed legal-move list,
    /// computed lazily and cached for the life of the node. `None` when no
    /// selection policy is configured.
    pub(crate) fn selection_distribution(&self, env: &SearchEnv<G>) -> Option<&[f32]> {
        let policy = env.selection_policy.as_ref()?;
        Some(
            self.cached_policy
                .get_or_init(|| policy.distribution(&self.state, &self.legal))
                .as_slice(),
        )
    }
}
