//! Shared test fixtures: a tiny two-player race game.
//!
//! Players alternate adding a step of 1..=`max_step` to a shared counter;
//! overshooting the target is illegal, and whoever lands exactly on it wins.
//! Deterministic, two agents, shrinking branching factor near the end.

use crate::config::{SearchEnv, SearchSettings};
use crate::game::{Game, MoveList};
use std::sync::Arc;

pub(crate) struct RaceGame {
    pub target: u32,
    pub max_step: u32,
}

#[derive(Clone, Debug, PartialEq)]
pub(crate) struct RaceState {
    pub total: u32,
    /// Agent to move, 1-based.
    pub mover: usize,
    pub last_mover: usize,
}

impl Game for RaceGame {
    type State = RaceState;
    type Move = u32;
    type MoveKey = u32;

    fn num_agents(&self) -> usize {
        2
    }

    fn legal_moves(&self, state: &RaceState) -> MoveList<u32> {
        (1..=self.max_step)
            .filter(|step| state.total + step <= self.target)
            .collect()
    }

    fn apply(&self, state: &mut RaceState, mv: &u32) -> u32 {
        state.total += mv;
        state.last_mover = state.mover;
        state.mover = 3 - state.mover;
        *mv
    }

    fn is_over(&self, state: &RaceState) -> bool {
        state.total >= self.target
    }

    fn mover(&self, state: &RaceState) -> usize {
        state.mover
    }

    fn without_consequences(&self, mv: &u32) -> u32 {
        *mv
    }

    fn move_key(&self, mv: &u32) -> u32 {
        *mv
    }

    fn utilities(&self, state: &RaceState) -> Vec<f64> {
        if !self.is_over(state) {
            return vec![0.0; 3];
        }
        let mut utilities = vec![0.0; 3];
        utilities[state.last_mover] = 1.0;
        utilities[3 - state.last_mover] = -1.0;
        utilities
    }

    fn is_decided(&self, state: &RaceState, _agent: usize) -> bool {
        self.is_over(state)
    }

    fn best_reachable_utility(&self, state: &RaceState, agent: usize) -> f64 {
        if self.is_over(state) {
            self.utilities(state)[agent]
        } else {
            1.0
        }
    }

    fn worst_reachable_utility(&self, state: &RaceState, agent: usize) -> f64 {
        if self.is_over(state) {
            self.utilities(state)[agent]
        } else {
            -1.0
        }
    }
}

pub(crate) fn race_state(total: u32) -> RaceState {
    RaceState {
        total,
        mover: 1,
        last_mover: 2,
    }
}

pub(crate) fn race_env(
    target: u32,
    max_step: u32,
    settings: SearchSettings,
) -> Arc<SearchEnv<RaceGame>> {
    Arc::new(SearchEnv {
        game: Arc::new(RaceGame { target, max_step }),
        settings: settings.validated().expect("valid test settings"),
        selection_policy: None,
        playout_policy: None,
        heuristic: None,
    })
}
