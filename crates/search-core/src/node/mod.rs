//! The search-node family.
//!
//! One shared statistics core ([`NodeCore`]) plus a variant tag selected at
//! tree construction and never switched at runtime:
//!
//! - `Deterministic`: owned state snapshot, fixed child array
//! - `AlphaBeta`: deterministic plus a driver-mutable score window
//! - `ScoreBounds`: deterministic plus exact-solving bounds
//! - `OpenLoop`: no owned state, per-worker iteration contexts
//!
//! Statistics fields are atomic and shared by all workers; everything else a
//! worker touches during one iteration is either immutable after
//! construction or private to that iteration.

pub mod alpha_beta;
pub mod deterministic;
pub mod open_loop;
pub mod policy;
pub mod score_bounds;
pub mod stats;

#[cfg(test)]
pub(crate) mod testing;

pub use alpha_beta::WindowBounds;
pub use deterministic::Step;
pub use policy::ExItExperience;
pub use stats::{GraveTable, NodeStatistics};

use crate::config::{SearchEnv, TreeKind, ValueInit};
use crate::game::Game;
use crate::util::AtomicF64;
use deterministic::DetNode;
use open_loop::OpenLoopNode;
use score_bounds::BoundsCells;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Weak};

/// Statistics and bookkeeping shared by every node variant.
pub(crate) struct NodeCore<G: Game> {
    pub(crate) env: Arc<SearchEnv<G>>,
    /// Non-owning: subtree lifetime is governed by the root.
    pub(crate) parent: Weak<Node<G>>,
    /// Move that produced this node, with consequences resolved.
    pub(crate) move_from_parent: Option<G::Move>,
    /// Same move with consequences stripped; all child matching uses this.
    pub(crate) bare_move: Option<G::Move>,
    pub(crate) visits: AtomicU32,
    pub(crate) virtual_visits: AtomicU32,
    /// Accumulated score per agent; index 0 unused.
    pub(crate) score_sums: Box<[AtomicF64]>,
    /// Element-wise min or max of backpropagated utilities; NaN until the
    /// first `update_min_max`. Index 0 unused.
    pub(crate) score_minmax: Box<[AtomicF64]>,
    /// Per-agent heuristic estimates; absent when no heuristic is
    /// configured.
    pub(crate) heuristic: Option<Box<[f64]>>,
    /// All-moves-as-first statistics; allocated only when the driver enables
    /// them.
    pub(crate) amaf: Option<GraveTable<G::MoveKey>>,
}

impl<G: Game> NodeCore<G> {
    pub(crate) fn new(
        env: Arc<SearchEnv<G>>,
        parent: Weak<Node<G>>,
        played: Option<G::Move>,
        heuristic: Option<Box<[f64]>>,
    ) -> Self {
        let bare_move = played.as_ref().map(|m| env.game.without_consequences(m));
        let num_agents = env.game.num_agents();
        let score_sums: Box<[AtomicF64]> =
            (0..=num_agents).map(|_| AtomicF64::new(0.0)).collect();
        let score_minmax: Box<[AtomicF64]> =
            (0..=num_agents).map(|_| AtomicF64::new(f64::NAN)).collect();
        let amaf = env.settings.use_amaf.then(GraveTable::new);
        Self {
            env,
            parent,
            move_from_parent: played,
            bare_move,
            visits: AtomicU32::new(0),
            virtual_visits: AtomicU32::new(0),
            score_sums,
            score_minmax,
            heuristic,
            amaf,
        }
    }
}

pub(crate) enum Variant<G: Game> {
    Deterministic(DetNode<G>),
    AlphaBeta(DetNode<G>, WindowBounds),
    ScoreBounds(DetNode<G>, BoundsCells),
    OpenLoop(OpenLoopNode<G>),
}

/// A node in the shared search tree.
pub struct Node<G: Game> {
    pub(crate) core: NodeCore<G>,
    pub(crate) variant: Variant<G>,
}

impl<G: Game> Node<G> {
    /// Build a tree root of the given kind. Open-loop roots are initialized
    /// for worker 0; other workers start via `start_new_iteration`.
    pub fn new_root(env: Arc<SearchEnv<G>>, kind: TreeKind, state: G::State) -> Arc<Self> {
        match kind {
            TreeKind::OpenLoop => {
                let node = Arc::new(Self {
                    core: NodeCore::new(env.clone(), Weak::new(), None, None),
                    variant: Variant::OpenLoop(OpenLoopNode::new(&env)),
                });
                node.root_init(0, &state);
                node
            }
            _ => Arc::new(Self::build_closed(env, Weak::new(), None, kind, state)),
        }
    }

    fn build_closed(
        env: Arc<SearchEnv<G>>,
        parent: Weak<Node<G>>,
        played: Option<G::Move>,
        kind: TreeKind,
        state: G::State,
    ) -> Self {
        let heuristic = env
            .heuristic
            .as_ref()
            .map(|h| h.estimates(&state).into_boxed_slice());
        let core = NodeCore::new(env.clone(), parent, played, heuristic);
        let variant = match kind {
            TreeKind::Deterministic => Variant::Deterministic(DetNode::new(&env, state)),
            TreeKind::AlphaBeta => {
                Variant::AlphaBeta(DetNode::new(&env, state), WindowBounds::new())
            }
            TreeKind::ScoreBounds => {
                let det = DetNode::new(&env, state);
                let cells = BoundsCells::seeded(&env, &det.state);
                Variant::ScoreBounds(det, cells)
            }
            TreeKind::OpenLoop => unreachable!("open-loop nodes own no state snapshot"),
        };
        Self { core, variant }
    }

    pub(crate) fn det(&self) -> Option<&DetNode<G>> {
        match &self.variant {
            Variant::Deterministic(det)
            | Variant::AlphaBeta(det, _)
            | Variant::ScoreBounds(det, _) => Some(det),
            Variant::OpenLoop(_) => None,
        }
    }

    pub(crate) fn open(&self) -> Option<&OpenLoopNode<G>> {
        match &self.variant {
            Variant::OpenLoop(open) => Some(open),
            _ => None,
        }
    }

    pub fn kind(&self) -> TreeKind {
        match &self.variant {
            Variant::Deterministic(_) => TreeKind::Deterministic,
            Variant::AlphaBeta(..) => TreeKind::AlphaBeta,
            Variant::ScoreBounds(..) => TreeKind::ScoreBounds,
            Variant::OpenLoop(_) => TreeKind::OpenLoop,
        }
    }

    // ---- traversal and expansion (state-owning variants) ----

    /// Traverse the `move_index`-th legal move: reuse the expanded child, or
    /// derive a fresh state by copying this node's state and applying the
    /// move.
    pub fn traverse(&self, move_index: usize) -> Step<G> {
        let Some(det) = self.det() else {
            panic!("traverse requires a state-owning node; open-loop trees use step_in_place");
        };
        if let Some(child) = det.children[move_index].get() {
            return Step::Descend(Arc::clone(child));
        }
        let mut state = det.state.clone();
        let played = self.core.env.game.apply(&mut state, &det.legal[move_index]);
        Step::Expand { state, played }
    }

    /// Expand the `move_index`-th legal move into a child of the same
    /// variant, or return the child that already occupies the slot. Safe
    /// under concurrent expansion: the slot is insert-once and losers adopt
    /// the winner.
    pub fn expand(self: &Arc<Self>, move_index: usize) -> Arc<Self> {
        let Some(det) = self.det() else {
            panic!("expand requires a state-owning node; open-loop trees use expand_from_move");
        };
        if let Some(existing) = det.children[move_index].get() {
            return Arc::clone(existing);
        }
        let mut state = det.state.clone();
        let played = self.core.env.game.apply(&mut state, &det.legal[move_index]);
        let child = Arc::new(Self::build_closed(
            self.core.env.clone(),
            Arc::downgrade(self),
            Some(played),
            self.kind(),
            state,
        ));
        match det.children[move_index].set(Arc::clone(&child)) {
            Ok(()) => {
                child.offer_bounds_upward();
                child
            }
            Err(_) => det.children[move_index]
                .get()
                .cloned()
                .unwrap_or(child),
        }
    }

    /// Linear scan of the expanded children for the one whose stored move
    /// (stripped of consequences) equals `mv`. First match wins.
    pub fn find_child_for_move(&self, mv: &G::Move) -> Option<Arc<Node<G>>> {
        let target = self.core.env.game.without_consequences(mv);
        match &self.variant {
            Variant::OpenLoop(open) => open
                .children
                .read()
                .iter()
                .find(|c| c.core.bare_move.as_ref() == Some(&target))
                .cloned(),
            _ => self.det().and_then(|det| {
                det.children
                    .iter()
                    .filter_map(|cell| cell.get())
                    .find(|c| c.core.bare_move.as_ref() == Some(&target))
                    .cloned()
            }),
        }
    }

    // ---- accessors ----

    pub fn parent(&self) -> Option<Arc<Node<G>>> {
        self.core.parent.upgrade()
    }

    /// Move that produced this node, with consequences resolved. `None` at
    /// the root.
    pub fn move_from_parent(&self) -> Option<&G::Move> {
        self.core.move_from_parent.as_ref()
    }

    /// Same move with consequential sub-moves stripped.
    pub fn move_without_consequences(&self) -> Option<&G::Move> {
        self.core.bare_move.as_ref()
    }

    /// Owned state snapshot; `None` for open-loop nodes.
    pub fn state(&self) -> Option<&G::State> {
        self.det().map(|det| &det.state)
    }

    /// Alpha/beta window; `None` on other variants.
    pub fn window(&self) -> Option<&WindowBounds> {
        match &self.variant {
            Variant::AlphaBeta(_, window) => Some(window),
            _ => None,
        }
    }

    pub fn heuristic_estimate(&self, agent: usize) -> Option<f64> {
        self.core.heuristic.as_ref().and_then(|h| h.get(agent).copied())
    }

    pub fn num_legal_moves(&self, worker: usize) -> usize {
        match &self.variant {
            Variant::OpenLoop(open) => open.slots[worker].lock().legal.len(),
            _ => self.det().map_or(0, |det| det.legal.len()),
        }
    }

    pub fn nth_legal_move(&self, worker: usize, n: usize) -> Option<G::Move> {
        match &self.variant {
            Variant::OpenLoop(open) => open.slots[worker].lock().legal.get(n).cloned(),
            _ => self.det().and_then(|det| det.legal.get(n).cloned()),
        }
    }

    pub fn child_for_nth_legal_move(&self, worker: usize, n: usize) -> Option<Arc<Node<G>>> {
        match &self.variant {
            Variant::OpenLoop(open) => {
                open.slots[worker].lock().child_map.get(n).cloned().flatten()
            }
            _ => self
                .det()
                .and_then(|det| det.children.get(n))
                .and_then(|cell| cell.get())
                .cloned(),
        }
    }

    /// Expanded children, across all variants.
    pub fn num_children(&self) -> usize {
        match &self.variant {
            Variant::OpenLoop(open) => open.children.read().len(),
            _ => self.det().map_or(0, |det| {
                det.children.iter().filter(|cell| cell.get().is_some()).count()
            }),
        }
    }

    // ---- statistics contract ----

    #[inline]
    pub fn visits(&self) -> u32 {
        self.core.visits.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn virtual_visits(&self) -> u32 {
        self.core.virtual_visits.load(Ordering::Relaxed)
    }

    /// Record a provisional visit before the simulation runs, biasing other
    /// workers away from re-selecting a node that is already in flight.
    pub fn add_virtual_visit(&self) {
        self.core.virtual_visits.fetch_add(1, Ordering::Relaxed);
    }

    /// Mean score for `agent`, with outstanding virtual visits counted as
    /// provisional losses. 0 when the node has never been visited.
    pub fn average_score(&self, agent: usize) -> f64 {
        let visits = f64::from(self.visits());
        let virtual_visits = f64::from(self.virtual_visits());
        let denominator = visits + virtual_visits;
        if denominator == 0.0 {
            return 0.0;
        }
        (self.core.score_sums[agent].load() - virtual_visits) / denominator
    }

    /// Backpropagate one completed simulation: bump the visit counter, add
    /// each agent's utility, and release one virtual visit.
    ///
    /// Callers accumulate through either `update` or `update_min_max` for a
    /// given search configuration, never both (the visit would be counted
    /// twice).
    pub fn update(&self, utilities: &[f64]) {
        self.core.visits.fetch_add(1, Ordering::Relaxed);
        let last = utilities.len().min(self.core.score_sums.len());
        for agent in 1..last {
            self.core.score_sums[agent].fetch_add(utilities[agent]);
        }
        if self
            .core
            .virtual_visits
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |v| v.checked_sub(1))
            .is_err()
        {
            log::error!("backpropagation released a virtual visit that was never added");
        }
    }

    /// Backpropagate into the min-max accumulator instead of the running
    /// sum: element-wise max (or min) of the utilities seen so far.
    pub fn update_min_max(&self, utilities: &[f64], use_max: bool) {
        self.core.visits.fetch_add(1, Ordering::Relaxed);
        let last = utilities.len().min(self.core.score_minmax.len());
        for agent in 1..last {
            let utility = utilities[agent];
            self.core.score_minmax[agent].fetch_transform(|current| {
                if current.is_nan() {
                    Some(utility)
                } else if (use_max && utility > current) || (!use_max && utility < current) {
                    Some(utility)
                } else {
                    None
                }
            });
        }
    }

    /// Min-max accumulator for `agent`; NaN before the first
    /// `update_min_max`.
    pub fn min_max_score(&self, agent: usize) -> f64 {
        self.core.score_minmax[agent].load()
    }

    /// Placeholder value for children that have never been visited, chosen
    /// by the driver's initialization policy.
    pub fn value_estimate_unvisited(&self, agent: usize) -> f64 {
        match self.core.env.settings.value_init {
            ValueInit::Draw => 0.0,
            ValueInit::Optimistic => f64::INFINITY,
            ValueInit::Loss => -1.0,
            ValueInit::Win => 1.0,
            ValueInit::ParentAverage => self.average_score(agent),
        }
    }

    // ---- policies over the current legal children ----

    pub(crate) fn child_visit_counts(&self, worker: usize) -> Vec<u32> {
        match &self.variant {
            Variant::OpenLoop(open) => open.slots[worker]
                .lock()
                .child_map
                .iter()
                .map(|child| child.as_ref().map_or(0, |c| c.visits()))
                .collect(),
            _ => self.det().map(DetNode::visit_counts).unwrap_or_default(),
        }
    }

    /// Distribution over the legal-move index space derived from child visit
    /// counts, temperature-scaled by `tau` (see
    /// [`policy::visit_count_policy`]).
    pub fn visit_count_policy(&self, worker: usize, tau: f64) -> Vec<f32> {
        policy::visit_count_policy(&self.child_visit_counts(worker), tau)
    }

    /// Normalised Shannon entropy of the visit-count policy.
    pub fn normalised_entropy(&self, worker: usize) -> f64 {
        policy::normalised_entropy(&self.visit_count_policy(worker, 1.0))
    }

    /// Learned-selection distribution over the current legal moves: the
    /// per-node cached distribution for state-owning variants, the
    /// per-iteration softmaxed logits for open-loop nodes. `None` when no
    /// selection policy is configured.
    pub fn selection_policy_distribution(&self, worker: usize) -> Option<Vec<f32>> {
        match &self.variant {
            Variant::OpenLoop(open) => {
                let slot = open.slots[worker].lock();
                if slot.policy.is_empty() {
                    None
                } else {
                    Some(slot.policy.clone())
                }
            }
            _ => self
                .det()
                .and_then(|det| det.selection_distribution(&self.core.env))
                .map(<[f32]>::to_vec),
        }
    }

    /// Normalised entropy of the cached learned-selection distribution; 0
    /// when no selection policy is configured.
    pub fn selection_policy_normalised_entropy(&self, worker: usize) -> f64 {
        match &self.variant {
            Variant::OpenLoop(open) => {
                policy::normalised_entropy(&open.slots[worker].lock().policy)
            }
            _ => self
                .det()
                .and_then(|det| det.selection_distribution(&self.core.env))
                .map(policy::normalised_entropy)
                .unwrap_or(0.0),
        }
    }

    /// Normalised entropy of the learned playout policy's distribution for
    /// the current state; 0 when no playout policy is configured.
    pub fn playout_policy_normalised_entropy(&self, worker: usize) -> f64 {
        let Some(playout) = self.core.env.playout_policy.as_ref() else {
            return 0.0;
        };
        match &self.variant {
            Variant::OpenLoop(open) => {
                let (handle, legal) = {
                    let slot = open.slots[worker].lock();
                    let Some(handle) = slot.state.clone() else {
                        return 0.0;
                    };
                    (handle, slot.legal.clone())
                };
                if legal.len() <= 1 {
                    return 0.0;
                }
                let dist = {
                    let state = handle.lock();
                    playout.distribution(&state, &legal)
                };
                policy::normalised_entropy(&dist)
            }
            _ => {
                let Some(det) = self.det() else { return 0.0 };
                if det.legal.len() <= 1 {
                    return 0.0;
                }
                policy::normalised_entropy(&playout.distribution(&det.state, &det.legal))
            }
        }
    }

    /// Export one training sample: bare legal moves, the `tau = 1`
    /// visit-count policy, and per-move child averages for the mover (-1.0
    /// for unexpanded children).
    pub fn exit_experience(&self, worker: usize) -> ExItExperience<G::Move> {
        match &self.variant {
            Variant::OpenLoop(open) => {
                let slot = open.slots[worker].lock();
                let game = &self.core.env.game;
                let mover = slot
                    .state
                    .as_ref()
                    .map_or(0, |handle| game.mover(&handle.lock()));
                let moves: Vec<G::Move> = slot
                    .legal
                    .iter()
                    .map(|m| game.without_consequences(m))
                    .collect();
                let counts: Vec<u32> = slot
                    .child_map
                    .iter()
                    .map(|child| child.as_ref().map_or(0, |c| c.visits()))
                    .collect();
                let value_estimates: Vec<f64> = slot
                    .child_map
                    .iter()
                    .map(|child| child.as_ref().map_or(-1.0, |c| c.average_score(mover)))
                    .collect();
                ExItExperience {
                    moves,
                    policy: policy::visit_count_policy(&counts, 1.0),
                    value_estimates,
                }
            }
            _ => {
                let Some(det) = self.det() else {
                    unreachable!("all closed-loop variants carry a state");
                };
                let counts = det.visit_counts();
                let value_estimates: Vec<f64> = det
                    .children
                    .iter()
                    .map(|cell| {
                        cell.get()
                            .map_or(-1.0, |child| child.average_score(det.mover))
                    })
                    .collect();
                ExItExperience {
                    moves: det.bare.to_vec(),
                    policy: policy::visit_count_policy(&counts, 1.0),
                    value_estimates,
                }
            }
        }
    }

    // ---- all-moves-as-first statistics ----

    /// Create-or-get the statistics record aggregated under `key`. `None`
    /// when the driver did not enable all-moves-as-first features.
    pub fn amaf_stats_entry(&self, key: &G::MoveKey) -> Option<Arc<NodeStatistics>> {
        self.core.amaf.as_ref().map(|table| table.get_or_create(key))
    }

    /// Existing record for `key`, if the table exists and has one.
    pub fn amaf_stats(&self, key: &G::MoveKey) -> Option<Arc<NodeStatistics>> {
        self.core.amaf.as_ref().and_then(|table| table.get(key))
    }
}
