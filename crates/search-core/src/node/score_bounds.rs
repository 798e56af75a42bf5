//! Exact-solving bounds: per-agent pessimistic floors and optimistic
//! ceilings, tightened by backward induction as subtrees resolve.
//!
//! Pessimistic bounds only ever rise, optimistic bounds only ever fall; when
//! the two meet at a node its exact game value is proven and the driver can
//! short-circuit backpropagation through it.

use crate::config::SearchEnv;
use crate::game::Game;
use crate::util::AtomicF64;

use super::{Node, Variant};

pub(crate) struct BoundsCells {
    /// Guaranteed-achievable utility per agent (index 0 unused).
    pub(crate) pessimistic: Box<[AtomicF64]>,
    /// Guaranteed-unavoidable ceiling per agent (index 0 unused).
    pub(crate) optimistic: Box<[AtomicF64]>,
}

impl BoundsCells {
    /// Seed from the realized utility where an agent's outcome is already
    /// decided, otherwise from the best/worst utilities still reachable.
    pub(crate) fn seeded<G: Game>(env: &SearchEnv<G>, state: &G::State) -> Self {
        let num_agents = env.game.num_agents();
        let over = env.game.is_over(state);
        let utilities = env.game.utilities(state);

        let mut pessimistic = Vec::with_capacity(num_agents + 1);
        let mut optimistic = Vec::with_capacity(num_agents + 1);
        pessimistic.push(AtomicF64::new(0.0));
        optimistic.push(AtomicF64::new(0.0));

        for agent in 1..=num_agents {
            if over || env.game.is_decided(state, agent) {
                pessimistic.push(AtomicF64::new(utilities[agent]));
                optimistic.push(AtomicF64::new(utilities[agent]));
            } else {
                pessimistic.push(AtomicF64::new(
                    env.game.worst_reachable_utility(state, agent),
                ));
                optimistic.push(AtomicF64::new(
                    env.game.best_reachable_utility(state, agent),
                ));
            }
        }

        Self {
            pessimistic: pessimistic.into_boxed_slice(),
            optimistic: optimistic.into_boxed_slice(),
        }
    }
}

impl<G: Game> Node<G> {
    /// Proven floor for `agent`, or `-inf` on non-solving nodes.
    pub fn pessimistic_bound(&self, agent: usize) -> f64 {
        match &self.variant {
            Variant::ScoreBounds(_, cells) => cells.pessimistic[agent].load(),
            _ => f64::NEG_INFINITY,
        }
    }

    /// Proven ceiling for `agent`, or `+inf` on non-solving nodes.
    pub fn optimistic_bound(&self, agent: usize) -> f64 {
        match &self.variant {
            Variant::ScoreBounds(_, cells) => cells.optimistic[agent].load(),
            _ => f64::INFINITY,
        }
    }

    /// Exact value for `agent` once both bounds coincide.
    pub fn proven_value(&self, agent: usize) -> Option<f64> {
        let Variant::ScoreBounds(_, cells) = &self.variant else {
            return None;
        };
        let pessimistic = cells.pessimistic[agent].load();
        if pessimistic == cells.optimistic[agent].load() {
            Some(pessimistic)
        } else {
            None
        }
    }

    /// Raise the pessimistic bound for `agent` to `new_bound` if that is
    /// provable here, walking the proof up through the ancestors.
    ///
    /// The recursion is bounded by the tree depth. No-op on non-solving
    /// nodes and whenever `new_bound` does not exceed the current bound.
    pub fn update_pess_bounds(&self, agent: usize, new_bound: f64) {
        let Variant::ScoreBounds(det, cells) = &self.variant else {
            return;
        };
        if new_bound <= cells.pessimistic[agent].load() {
            return;
        }
        if det.legal.is_empty() {
            // Terminal: bounds were fixed at construction.
            return;
        }

        if agent == det.mover {
            // The mover controls which child is chosen, so a guaranteed
            // outcome in one child is guaranteed achievable here.
            cells.pessimistic[agent].fetch_max(new_bound);
            if let Some(parent) = self.core.parent.upgrade() {
                parent.update_pess_bounds(agent, new_bound);
            }
        } else {
            // A non-mover floor is only proven once every child guarantees
            // it. With more than two players this scans all children rather
            // than only those consistent with the mover's proven-optimal
            // choice; the resulting bound is conservative.
            let current = cells.pessimistic[agent].load();
            let mut proven = f64::INFINITY;
            for slot in det.children.iter() {
                match slot.get() {
                    None => return,
                    Some(child) => proven = proven.min(child.pessimistic_bound(agent)),
                }
            }
            if proven > current {
                cells.pessimistic[agent].fetch_max(proven);
                if let Some(parent) = self.core.parent.upgrade() {
                    parent.update_pess_bounds(agent, proven);
                }
            }
        }
    }

    /// Lower the optimistic bound for `agent` if the children now prove a
    /// smaller ceiling. Agent-agnostic of the mover: no agent can be held
    /// above the best any child still offers.
    pub fn update_opt_bounds(&self, agent: usize, new_bound: f64) {
        let Variant::ScoreBounds(det, cells) = &self.variant else {
            return;
        };
        let current = cells.optimistic[agent].load();
        if new_bound >= current {
            return;
        }
        if det.legal.is_empty() {
            return;
        }

        let mut proven = f64::NEG_INFINITY;
        for slot in det.children.iter() {
            match slot.get() {
                None => return,
                Some(child) => proven = proven.max(child.optimistic_bound(agent)),
            }
        }
        if proven < current {
            cells.optimistic[agent].fetch_min(proven);
            if let Some(parent) = self.core.parent.upgrade() {
                parent.update_opt_bounds(agent, proven);
            }
        }
    }

    /// Called once a freshly constructed solving node is linked under its
    /// parent: offer the seeded bounds upward so existing ancestors tighten
    /// immediately.
    pub(crate) fn offer_bounds_upward(&self) {
        let Variant::ScoreBounds(_, cells) = &self.variant else {
            return;
        };
        let Some(parent) = self.core.parent.upgrade() else {
            return;
        };
        for agent in 1..cells.pessimistic.len() {
            parent.update_pess_bounds(agent, cells.pessimistic[agent].load());
            parent.update_opt_bounds(agent, cells.optimistic[agent].load());
        }
    }
}
