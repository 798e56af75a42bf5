//! Collaborator traits consumed by the search core.
//!
//! The core never evaluates game rules or learned policies itself; it talks
//! to a rules evaluator (`Game`), optional learned move policies
//! (`SelectionPolicy`) and an optional per-agent state evaluator
//! (`Heuristic`). Drivers supply implementations of these when building a
//! [`SearchEnv`](crate::config::SearchEnv).

use smallvec::SmallVec;
use std::hash::Hash;

/// Legal-move list with inline storage for typical branching factors.
pub type MoveList<M> = SmallVec<[M; 16]>;

/// Rules evaluator for a (possibly stochastic, possibly hidden-information)
/// game.
///
/// Agents are indexed 1-based; index 0 is reserved and unused, so vectors
/// returned per-agent have length `num_agents() + 1`.
pub trait Game: Send + Sync + 'static {
    /// Full game state. Cloning a state must yield an independent copy.
    type State: Clone + Send + Sync;

    /// A move as produced by move generation or by applying one. Equality is
    /// structural; distinct-but-equal moves are not distinguished.
    type Move: Clone + PartialEq + Send + Sync;

    /// Abstraction of a move that ignores consequential sub-moves, used to
    /// aggregate statistics for "the same move" across different tree paths.
    type MoveKey: Clone + Eq + Hash + Send + Sync;

    fn num_agents(&self) -> usize;

    /// Legal moves in `state`. Never called on terminal states by this crate.
    fn legal_moves(&self, state: &Self::State) -> MoveList<Self::Move>;

    /// Apply `mv` to `state` in place, returning the move as actually played
    /// (with any consequential sub-moves resolved by the rules).
    fn apply(&self, state: &mut Self::State, mv: &Self::Move) -> Self::Move;

    fn is_over(&self, state: &Self::State) -> bool;

    /// Agent to move in `state` (1-based).
    fn mover(&self, state: &Self::State) -> usize;

    /// `mv` with consequential sub-moves stripped. Used for all cross-path
    /// move matching.
    fn without_consequences(&self, mv: &Self::Move) -> Self::Move;

    /// Aggregation key for all-moves-as-first statistics.
    fn move_key(&self, mv: &Self::Move) -> Self::MoveKey;

    /// Per-agent utilities in `state` (index 0 unused). Entries are only
    /// meaningful for agents whose outcome is decided.
    fn utilities(&self, state: &Self::State) -> Vec<f64>;

    /// Whether `agent`'s final outcome is already determined in `state`.
    fn is_decided(&self, state: &Self::State, agent: usize) -> bool;

    /// Best utility `agent` can still achieve from `state` (derived from the
    /// next win rank still open).
    fn best_reachable_utility(&self, state: &Self::State, agent: usize) -> f64;

    /// Worst utility `agent` can still be forced into from `state`.
    fn worst_reachable_utility(&self, state: &Self::State, agent: usize) -> f64;
}

/// A learned move-evaluation policy: turns a state plus candidate moves into
/// a distribution, or a single move into a raw logit.
pub trait SelectionPolicy<G: Game>: Send + Sync {
    /// Probability distribution over `moves` (same length, sums to 1).
    fn distribution(&self, state: &G::State, moves: &[G::Move]) -> Vec<f32>;

    /// Unnormalized log-weight of a single move.
    fn logit(&self, state: &G::State, mv: &G::Move) -> f32;
}

/// Optional per-agent value estimator consulted at node construction.
pub trait Heuristic<G: Game>: Send + Sync {
    /// Per-agent value estimates for `state` (index 0 unused).
    fn estimates(&self, state: &G::State) -> Vec<f64>;
}
