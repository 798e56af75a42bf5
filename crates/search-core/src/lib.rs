//! # search-core
//!
//! Search-tree and memoization core for a general game-playing engine:
//! a polymorphic node family for Monte-Carlo tree search that works
//! uniformly across deterministic, stochastic and hidden-information games,
//! exact game-theoretic solving via score bounds, and hash-indexed
//! transposition tables for alpha-beta and best-first searches.
//!
//! The search driver (selection/expansion/simulation/backpropagation loop),
//! the game-rules evaluator and any learned policies are external
//! collaborators; this crate only defines the seams they plug into.
//!
//! ## Module structure
//!
//! - `game`: collaborator traits (rules evaluator, learned policies,
//!   heuristic)
//! - `config`: driver-tunable settings and the per-search environment
//! - `node`: the search-node family and per-node statistics
//! - `tt`: transposition tables
//! - `util`: atomic float cells

pub mod config;
pub mod game;
pub mod node;
pub mod tt;
pub mod util;

pub use config::{ConfigError, SearchEnv, SearchSettings, TreeKind, ValueInit};
pub use game::{Game, Heuristic, MoveList, SelectionPolicy};
pub use node::{ExItExperience, GraveTable, Node, NodeStatistics, Step, WindowBounds};
pub use tt::{
    AlphaBetaTable, BestFirstTable, ScoredMove, UnboundedTable, ValueKind,
};
