//! Open-loop node storage for nondeterministic and hidden-information
//! games: no owned per-node state, a growing children list matched by move
//! equality, and per-worker iteration contexts.
//!
//! Each concurrently-running iteration owns one slot in a worker-indexed
//! arena; the slot carries the iteration's shared state handle, the
//! legal-move list recomputed for that state, the move-slot-to-child mapping
//! and the softmaxed per-move logits. Only the node's statistics core is
//! shared between iterations.
//!
//! Context flow: `root_init`, `start_new_iteration` and
//! `adopt_parent_context` install a state handle and refresh the move
//! dependencies; `step_in_place` mutates the shared state without a copy and
//! leaves the refresh to the node the iteration moves to next.

use crate::game::Game;
use crate::node::policy;
use once_cell::sync::OnceCell;
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use super::{Node, NodeCore, SearchEnv, Variant};

/// Per-iteration scratch. Exclusively owned by one worker while its
/// iteration passes through the node.
pub(crate) struct IterationSlot<G: Game> {
    /// Shared handle to the iteration's working state. Adopted from the
    /// parent during descent; never copied between nodes.
    pub(crate) state: Option<Arc<Mutex<G::State>>>,
    pub(crate) legal: Vec<G::Move>,
    /// Legal-move index to already-existing child, `None` where unexpanded.
    pub(crate) child_map: Vec<Option<Arc<Node<G>>>>,
    pub(crate) logits: Vec<f32>,
    /// Softmaxed `logits`; empty when no selection policy is configured.
    pub(crate) policy: Vec<f32>,
}

impl<G: Game> IterationSlot<G> {
    fn new() -> Self {
        Self {
            state: None,
            legal: Vec::new(),
            child_map: Vec::new(),
            logits: Vec::new(),
            policy: Vec::new(),
        }
    }

    fn clear(&mut self) {
        self.legal.clear();
        self.child_map.clear();
        self.logits.clear();
        self.policy.clear();
    }
}

pub(crate) struct OpenLoopNode<G: Game> {
    /// Dynamically-growing children list, matched by move equality rather
    /// than index. Guarded so concurrent first expansions cannot race.
    pub(crate) children: RwLock<Vec<Arc<Node<G>>>>,
    /// Persistent canonical state, used only while this node is the root.
    pub(crate) root_state: Mutex<Option<G::State>>,
    pub(crate) is_root: AtomicBool,
    /// Selection-policy logit of the move leading to this node, computed at
    /// most once and reused by the parent's dependency refreshes.
    pub(crate) cached_logit: OnceCell<f32>,
    pub(crate) slots: Box<[Mutex<IterationSlot<G>>]>,
}

impl<G: Game> OpenLoopNode<G> {
    pub(crate) fn new(env: &SearchEnv<G>) -> Self {
        let slots: Box<[Mutex<IterationSlot<G>>]> = (0..env.settings.num_workers)
            .map(|_| Mutex::new(IterationSlot::new()))
            .collect();
        Self {
            children: RwLock::new(Vec::new()),
            root_state: Mutex::new(None),
            is_root: AtomicBool::new(false),
            cached_logit: OnceCell::new(),
            slots,
        }
    }
}

impl<G: Game> Node<G> {
    fn open_variant(&self, op: &str) -> &OpenLoopNode<G> {
        match &self.variant {
            Variant::OpenLoop(open) => open,
            _ => panic!("{op} requires an open-loop node"),
        }
    }

    /// Make this node the tree root for `state`: store it as the canonical
    /// state, install a working copy for `worker`, and drop retained
    /// children whose originating move is no longer legal (a nondeterministic
    /// root state can change game to game).
    pub fn root_init(&self, worker: usize, state: &G::State) {
        let open = self.open_variant("root_init");
        let game = &self.core.env.game;

        *open.root_state.lock() = Some(state.clone());
        open.is_root.store(true, Ordering::Relaxed);

        let legal = game.legal_moves(state);
        let bare: Vec<G::Move> = legal.iter().map(|m| game.without_consequences(m)).collect();
        open.children.write().retain(|child| {
            child
                .core
                .bare_move
                .as_ref()
                .is_some_and(|m| bare.contains(m))
        });

        open.slots[worker].lock().state = Some(Arc::new(Mutex::new(state.clone())));
        self.refresh_move_dependencies(worker);
    }

    /// Begin a fresh iteration for `worker` from a copy of `state`. Children
    /// are untouched.
    pub fn start_new_iteration(&self, worker: usize, state: &G::State) {
        let open = self.open_variant("start_new_iteration");
        open.slots[worker].lock().state = Some(Arc::new(Mutex::new(state.clone())));
        self.refresh_move_dependencies(worker);
    }

    /// Adopt the parent's current-iteration state handle directly, without
    /// copying: open-loop search mutates one shared state object per
    /// iteration as it walks down.
    pub fn adopt_parent_context(&self, parent: &Node<G>, worker: usize) {
        let parent_open = parent.open_variant("adopt_parent_context");
        let handle = parent_open.slots[worker].lock().state.clone();
        let open = self.open_variant("adopt_parent_context");
        open.slots[worker].lock().state = handle;
        self.refresh_move_dependencies(worker);
    }

    /// Apply the `move_index`-th legal move to the iteration state in place
    /// (no copy) and return the move as actually played.
    pub fn step_in_place(&self, worker: usize, move_index: usize) -> G::Move {
        let open = self.open_variant("step_in_place");
        let (mv, handle) = {
            let slot = open.slots[worker].lock();
            let Some(handle) = slot.state.clone() else {
                panic!("step_in_place without an active iteration context");
            };
            (slot.legal[move_index].clone(), handle)
        };
        let mut state = handle.lock();
        self.core.env.game.apply(&mut state, &mv)
    }

    /// Recompute everything that depends on the current iteration state:
    /// the legal-move list, the move-slot-to-child mapping (by equality on
    /// moves stripped of consequences), and the per-move logits with their
    /// softmax, reusing each matched child's cached logit when available.
    pub fn refresh_move_dependencies(&self, worker: usize) {
        let open = self.open_variant("refresh_move_dependencies");
        let env = &self.core.env;
        let mut slot = open.slots[worker].lock();

        let Some(handle) = slot.state.clone() else {
            log::error!("move-dependency refresh without an active iteration context");
            slot.clear();
            return;
        };

        let legal: Vec<G::Move> = {
            let state = handle.lock();
            env.game.legal_moves(&state).into_vec()
        };

        let children = open.children.read();
        let mut child_map = Vec::with_capacity(legal.len());
        for mv in &legal {
            let bare = env.game.without_consequences(mv);
            child_map.push(
                children
                    .iter()
                    .find(|c| c.core.bare_move.as_ref() == Some(&bare))
                    .cloned(),
            );
        }
        drop(children);

        if let Some(policy_fn) = env.selection_policy.as_ref() {
            let state = handle.lock();
            let logits: Vec<f32> = legal
                .iter()
                .zip(&child_map)
                .map(|(mv, child)| match child.as_ref().and_then(|c| c.open()) {
                    Some(child_open) => {
                        *child_open.cached_logit.get_or_init(|| policy_fn.logit(&state, mv))
                    }
                    None => policy_fn.logit(&state, mv),
                })
                .collect();
            drop(state);
            slot.policy = policy::softmax(&logits);
            slot.logits = logits;
        } else {
            slot.logits.clear();
            slot.policy.clear();
        }

        slot.legal = legal;
        slot.child_map = child_map;
    }

    /// Append a child. While this node acts as root the legal-move mapping
    /// is refreshed immediately so the new child becomes addressable.
    pub fn add_child(&self, child: Arc<Node<G>>, worker: usize) {
        let open = self.open_variant("add_child");
        open.children.write().push(child);
        if open.is_root.load(Ordering::Relaxed) {
            self.refresh_move_dependencies(worker);
        }
    }

    /// Create (or, if another worker won the race, fetch) the child for
    /// `played`. Insert-if-absent runs under the children lock so concurrent
    /// first expansions of the same parent cannot duplicate a move.
    pub fn expand_from_move(self: &Arc<Self>, worker: usize, played: G::Move) -> Arc<Node<G>> {
        let open = self.open_variant("expand_from_move");
        let env = &self.core.env;
        let bare = env.game.without_consequences(&played);

        let child = {
            let mut children = open.children.write();
            if let Some(existing) = children
                .iter()
                .find(|c| c.core.bare_move.as_ref() == Some(&bare))
            {
                return Arc::clone(existing);
            }
            let child = Arc::new(Node {
                core: NodeCore::new(env.clone(), Arc::downgrade(self), Some(played), None),
                variant: Variant::OpenLoop(OpenLoopNode::new(env)),
            });
            children.push(Arc::clone(&child));
            child
        };

        if open.is_root.load(Ordering::Relaxed) {
            self.refresh_move_dependencies(worker);
        }
        child
    }

    /// The iteration state handle `worker` currently shares along its path,
    /// if an iteration is active.
    pub fn current_state_handle(&self, worker: usize) -> Option<Arc<Mutex<G::State>>> {
        self.open()
            .and_then(|open| open.slots[worker].lock().state.clone())
    }

    /// Raw per-move selection-policy logits for `worker`'s current legal
    /// moves; empty when no selection policy is configured.
    pub fn cached_logits(&self, worker: usize) -> Vec<f32> {
        self.open()
            .map_or_else(Vec::new, |open| open.slots[worker].lock().logits.clone())
    }

    /// The persistent canonical root state, when this open-loop node acts as
    /// root.
    pub fn root_state(&self) -> Option<G::State> {
        self.open().and_then(|open| open.root_state.lock().clone())
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::{race_env, race_state};
    use crate::config::{SearchSettings, TreeKind};
    use crate::node::Node;
    use std::sync::Arc;

    #[test]
    fn test_root_init_matches_game_legal_moves() {
        let env = race_env(10, 4, SearchSettings::default());
        let root = Node::new_root(env, TreeKind::OpenLoop, race_state(0));
        assert_eq!(root.num_legal_moves(0), 4);
    }

    #[test]
    fn test_root_init_prunes_stale_children() {
        let env = race_env(10, 4, SearchSettings::default());
        let root = Node::new_root(env, TreeKind::OpenLoop, race_state(0));
        root.expand_from_move(0, 1);
        root.expand_from_move(0, 3);
        root.expand_from_move(0, 4);
        assert_eq!(root.num_children(), 3);

        // Near the end of the race only steps 1 and 2 stay legal; retained
        // children for steps 3 and 4 must go.
        root.root_init(0, &race_state(8));
        assert_eq!(root.num_children(), 1);
        assert!(root.find_child_for_move(&1).is_some());
        assert!(root.find_child_for_move(&3).is_none());
    }

    #[test]
    fn test_adopt_shares_the_iteration_state() {
        let env = race_env(10, 4, SearchSettings::default());
        let root = Node::new_root(env, TreeKind::OpenLoop, race_state(0));

        let played = root.step_in_place(0, 0); // step 1
        assert_eq!(played, 1);
        let child = root.expand_from_move(0, played);
        child.adopt_parent_context(&root, 0);

        let root_handle = root.current_state_handle(0).unwrap();
        let child_handle = child.current_state_handle(0).unwrap();
        assert!(Arc::ptr_eq(&root_handle, &child_handle));

        // A step at the child is visible through the root's handle: the
        // iteration mutates one shared state object.
        child.step_in_place(0, 1); // step 2
        assert_eq!(root_handle.lock().total, 3);
    }

    #[test]
    fn test_start_new_iteration_takes_a_fresh_copy() {
        let env = race_env(10, 4, SearchSettings::default());
        let root = Node::new_root(env, TreeKind::OpenLoop, race_state(0));
        let first = root.current_state_handle(0).unwrap();
        root.start_new_iteration(0, &race_state(0));
        let second = root.current_state_handle(0).unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_children_matched_by_move_not_index() {
        let env = race_env(10, 4, SearchSettings::default());
        let root = Node::new_root(env, TreeKind::OpenLoop, race_state(0));
        let child = root.expand_from_move(0, 2);
        root.start_new_iteration(0, &race_state(0));
        // Legal list is [1, 2, 3, 4]; the step-2 child maps to slot 1.
        let mapped = root.child_for_nth_legal_move(0, 1).unwrap();
        assert!(Arc::ptr_eq(&mapped, &child));
        assert!(root.child_for_nth_legal_move(0, 0).is_none());
    }

    #[test]
    fn test_expand_from_move_deduplicates() {
        let env = race_env(10, 4, SearchSettings::default());
        let root = Node::new_root(env, TreeKind::OpenLoop, race_state(0));
        let first = root.expand_from_move(0, 2);
        let second = root.expand_from_move(0, 2);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(root.num_children(), 1);
    }

    #[test]
    fn test_workers_never_observe_each_other() {
        let settings = SearchSettings {
            num_workers: 2,
            ..SearchSettings::default()
        };
        let env = race_env(10, 4, settings);
        let root = Node::new_root(env, TreeKind::OpenLoop, race_state(0));
        root.start_new_iteration(1, &race_state(0));

        root.step_in_place(0, 3); // worker 0: step 4
        let w0 = root.current_state_handle(0).unwrap();
        let w1 = root.current_state_handle(1).unwrap();
        assert_eq!(w0.lock().total, 4);
        assert_eq!(w1.lock().total, 0);
    }

    #[test]
    fn test_root_state_is_persistent() {
        let env = race_env(10, 4, SearchSettings::default());
        let root = Node::new_root(env, TreeKind::OpenLoop, race_state(0));
        root.step_in_place(0, 0);
        // The canonical root state is separate from iteration working
        // copies.
        assert_eq!(root.root_state().unwrap().total, 0);
    }
}
