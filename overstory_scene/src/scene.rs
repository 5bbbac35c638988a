// Copyright 2025 the Overstory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The scene container: node arena, tree structure, lifecycle, and dispatch.

use kurbo::{Affine, Point};
use smallvec::SmallVec;

use overstory_events::{Event, EventKind, Observer, ObserverId, Observers, Phase};

use crate::sprite::{Behavior, DrawHook, Sprite, UpdateHook};
use crate::types::{CapturePolicy, ContextId, NodeId, SceneError};

pub(crate) struct Node {
    pub(crate) generation: u32,
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: SmallVec<[NodeId; 4]>,
    pub(crate) sprite: Sprite,
    pub(crate) observers: Observers<NodeId>,
    pub(crate) behavior: Option<Box<dyn Behavior>>,
    pub(crate) update_hook: Option<Box<UpdateHook>>,
    pub(crate) draw_hook: Option<Box<DrawHook>>,
    /// Explicit drawing-context override; `None` inherits through the parent chain.
    pub(crate) context: Option<ContextId>,
    /// Cached local-to-root affine, refreshed each frame. Never authoritative.
    pub(crate) world: Affine,
    /// Cached position of the local origin in root space, refreshed each frame.
    pub(crate) screen: Point,
    /// Cached pointer position in local space, refreshed each frame.
    /// NaN when an ancestor's scale is degenerate.
    pub(crate) pointer_local: Point,
}

impl Node {
    fn new(generation: u32, sprite: Sprite) -> Self {
        Self {
            generation,
            parent: None,
            children: SmallVec::new(),
            sprite,
            observers: Observers::new(),
            behavior: None,
            update_hook: None,
            draw_hook: None,
            context: None,
            world: Affine::IDENTITY,
            screen: Point::ORIGIN,
            pointer_local: Point::ORIGIN,
        }
    }
}

/// A retained scene of sprites.
///
/// The scene owns every node — attached or detached — in a generational slot
/// arena and exposes the whole public contract: tree structure, per-frame
/// traversal ([`Scene::advance`]), raw input entry points, coordinate
/// conversion, hit testing, and the per-node publish/subscribe dispatch.
///
/// A root node exists from construction and is owned by the scene for its
/// whole lifetime; nodes receive frame callbacks and input only while they
/// are linked into the tree below it.
///
/// ```
/// use overstory_scene::{Scene, Sprite};
///
/// let mut scene = Scene::new();
/// let child = scene.spawn(Sprite::sized(40.0, 40.0));
/// scene.add_child(scene.root(), child).unwrap();
/// assert!(scene.is_on_scene(child));
/// ```
pub struct Scene {
    nodes: Vec<Option<Node>>,
    /// Last generation per slot (persists across frees).
    generations: Vec<u32>,
    free_list: Vec<usize>,
    root: NodeId,
    /// Raw pointer position in root space, as last delivered by the host.
    pub(crate) pointer: Point,
    pub(crate) focus: Option<NodeId>,
    pub(crate) capture_policy: CapturePolicy,
}

impl core::fmt::Debug for Scene {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let total = self.nodes.len();
        let alive = self.nodes.iter().filter(|n| n.is_some()).count();
        f.debug_struct("Scene")
            .field("nodes_total", &total)
            .field("nodes_alive", &alive)
            .field("free_list", &self.free_list.len())
            .field("root", &self.root)
            .finish_non_exhaustive()
    }
}

impl Default for Scene {
    fn default() -> Self {
        Self::new()
    }
}

impl Scene {
    /// A new scene with its root installed.
    pub fn new() -> Self {
        let mut scene = Self {
            nodes: Vec::new(),
            generations: Vec::new(),
            free_list: Vec::new(),
            root: NodeId::new(0, 0),
            pointer: Point::ORIGIN,
            focus: None,
            capture_policy: CapturePolicy::default(),
        };
        scene.root = scene.spawn(Sprite::new());
        scene
    }

    /// The root node. Always live; everything on the scene descends from it.
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Create a detached node from the given sprite state.
    ///
    /// The node joins the live tree — and starts receiving frame callbacks
    /// and input — only once linked under the root via [`Scene::add_child`].
    pub fn spawn(&mut self, sprite: Sprite) -> NodeId {
        let (idx, generation) = if let Some(idx) = self.free_list.pop() {
            let generation = self.generations[idx].saturating_add(1);
            self.generations[idx] = generation;
            self.nodes[idx] = Some(Node::new(generation, sprite));
            #[allow(
                clippy::cast_possible_truncation,
                reason = "NodeId uses 32-bit indices by design."
            )]
            (idx as u32, generation)
        } else {
            let generation = 1_u32;
            self.nodes.push(Some(Node::new(generation, sprite)));
            self.generations.push(generation);
            #[allow(
                clippy::cast_possible_truncation,
                reason = "NodeId uses 32-bit indices by design."
            )]
            ((self.nodes.len() - 1) as u32, generation)
        };
        NodeId::new(idx, generation)
    }

    /// Create a node and immediately link it as the top child of `parent`.
    pub fn spawn_child(&mut self, parent: NodeId, sprite: Sprite) -> Result<NodeId, SceneError> {
        let id = self.spawn(sprite);
        self.add_child(parent, id)?;
        Ok(id)
    }

    // --- arena internals ---

    pub(crate) fn get(&self, id: NodeId) -> Option<&Node> {
        let n = self.nodes.get(id.idx())?.as_ref()?;
        (n.generation == id.1).then_some(n)
    }

    pub(crate) fn get_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        let n = self.nodes.get_mut(id.idx())?.as_mut()?;
        (n.generation == id.1).then_some(n)
    }

    /// Returns true if `id` refers to a live node.
    pub fn is_alive(&self, id: NodeId) -> bool {
        self.get(id).is_some()
    }

    /// The parent of a live node, or `None` for the root, detached roots, and stale ids.
    pub fn parent_of(&self, id: NodeId) -> Option<NodeId> {
        self.get(id)?.parent
    }

    /// The children of a node, bottom (painted first) to top; empty for stale ids.
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.get(id).map_or(&[], |n| &n.children)
    }

    /// Number of children of a node.
    pub fn child_count(&self, id: NodeId) -> usize {
        self.get(id).map_or(0, |n| n.children.len())
    }

    /// The child at `index`, or `None` when out of range or `id` is stale.
    pub fn child_at(&self, id: NodeId, index: usize) -> Option<NodeId> {
        self.get(id)?.children.get(index).copied()
    }

    /// The index of `child` in `parent`'s child list, or `None` when absent.
    pub fn child_index(&self, parent: NodeId, child: NodeId) -> Option<usize> {
        self.get(parent)?.children.iter().position(|&c| c == child)
    }

    /// Whether `id` is live and part of the tree rooted at the scene root.
    pub fn is_on_scene(&self, id: NodeId) -> bool {
        if !self.is_alive(id) {
            return false;
        }
        let mut cur = Some(id);
        while let Some(c) = cur {
            if c == self.root {
                return true;
            }
            cur = self.parent_of(c);
        }
        false
    }

    /// Shared access to a node's local state.
    pub fn sprite(&self, id: NodeId) -> Option<&Sprite> {
        self.get(id).map(|n| &n.sprite)
    }

    /// Mutable access to a node's local state.
    ///
    /// Placement, bounds, flags, and blend take effect at the next traversal
    /// that reads them; there is no commit step.
    pub fn sprite_mut(&mut self, id: NodeId) -> Option<&mut Sprite> {
        self.get_mut(id).map(|n| &mut n.sprite)
    }

    /// The raw pointer position in root space, as last delivered by the host.
    pub fn pointer(&self) -> Point {
        self.pointer
    }

    /// The node receiving path-routed keyboard input, if any.
    pub fn focus(&self) -> Option<NodeId> {
        self.focus
    }

    /// Route keyboard input along the root-to-`focus` path instead of the
    /// full tree traversal. `None` restores whole-tree key delivery.
    pub fn set_focus(&mut self, focus: Option<NodeId>) {
        self.focus = focus;
    }

    /// The active capture-phase hit-test policy.
    pub fn capture_policy(&self) -> CapturePolicy {
        self.capture_policy
    }

    /// Choose how capture-phase opt-ins hit test the pointer.
    pub fn set_capture_policy(&mut self, policy: CapturePolicy) {
        self.capture_policy = policy;
    }

    // --- behavior and hook storage ---

    /// Install (or replace) the node's behavior object.
    pub fn set_behavior(&mut self, id: NodeId, behavior: Box<dyn Behavior>) {
        if let Some(node) = self.get_mut(id) {
            node.behavior = Some(behavior);
        }
    }

    /// Replace the node's update step with a closure, or clear it with `None`.
    ///
    /// A set hook takes precedence over the behavior's `update`.
    pub fn set_update_hook(&mut self, id: NodeId, hook: Option<Box<UpdateHook>>) {
        if let Some(node) = self.get_mut(id) {
            node.update_hook = hook;
        }
    }

    /// Replace the node's draw step with a closure, or clear it with `None`.
    ///
    /// A set hook takes precedence over the behavior's `draw`.
    pub fn set_draw_hook(&mut self, id: NodeId, hook: Option<Box<DrawHook>>) {
        if let Some(node) = self.get_mut(id) {
            node.draw_hook = hook;
        }
    }

    pub(crate) fn take_behavior(&mut self, id: NodeId) -> Option<Box<dyn Behavior>> {
        self.get_mut(id)?.behavior.take()
    }

    pub(crate) fn restore_behavior(&mut self, id: NodeId, behavior: Box<dyn Behavior>) {
        // Keep a replacement installed mid-call over the one we took out.
        if let Some(node) = self.get_mut(id)
            && node.behavior.is_none()
        {
            node.behavior = Some(behavior);
        }
    }

    pub(crate) fn take_update_hook(&mut self, id: NodeId) -> Option<Box<UpdateHook>> {
        self.get_mut(id)?.update_hook.take()
    }

    pub(crate) fn restore_update_hook(&mut self, id: NodeId, hook: Box<UpdateHook>) {
        if let Some(node) = self.get_mut(id)
            && node.update_hook.is_none()
        {
            node.update_hook = Some(hook);
        }
    }

    pub(crate) fn take_draw_hook(&mut self, id: NodeId) -> Option<Box<DrawHook>> {
        self.get_mut(id)?.draw_hook.take()
    }

    pub(crate) fn restore_draw_hook(&mut self, id: NodeId, hook: Box<DrawHook>) {
        if let Some(node) = self.get_mut(id)
            && node.draw_hook.is_none()
        {
            node.draw_hook = Some(hook);
        }
    }

    // --- tree structure ---

    /// Link `child` as the top (frontmost) child of `parent`.
    ///
    /// A child already parented elsewhere is atomically detached from there
    /// first (its `Removed` notification fires). Re-adding under the same
    /// parent is a no-op. Fires `Added` on the child, and `AddedToScene` on
    /// the child and each descendant once the subtree is rooted at the scene
    /// root.
    pub fn add_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), SceneError> {
        self.add_child_at(parent, usize::MAX, child)
    }

    /// Link `child` into `parent`'s child list at `index`, clamped to the
    /// valid range. Index 0 paints first (bottom); the last index paints last
    /// (top) and is hit tested first.
    pub fn add_child_at(
        &mut self,
        parent: NodeId,
        index: usize,
        child: NodeId,
    ) -> Result<(), SceneError> {
        if !self.is_alive(parent) || !self.is_alive(child) {
            return Err(SceneError::Stale);
        }
        if parent == child {
            return Err(SceneError::SelfChild);
        }
        // A node cannot be made its own descendant.
        let mut cur = self.parent_of(parent);
        while let Some(c) = cur {
            if c == child {
                return Err(SceneError::Cycle);
            }
            cur = self.parent_of(c);
        }
        if self.parent_of(child) == Some(parent) {
            return Ok(());
        }
        if let Some(old) = self.parent_of(child) {
            self.unlink(old, child);
            // An observer of the detach may have torn things down.
            if !self.is_alive(parent) || !self.is_alive(child) {
                return Err(SceneError::Stale);
            }
        }
        let node = self.get_mut(parent).expect("parent liveness checked above");
        let index = index.min(node.children.len());
        node.children.insert(index, child);
        self.get_mut(child).expect("child liveness checked above").parent = Some(parent);

        let mut added = Event::new(EventKind::Added);
        self.dispatch(child, &mut added);
        if self.is_on_scene(child) {
            self.attach_subtree(child);
        }
        Ok(())
    }

    /// Detach `child` from `parent`. Fires `Removed` on the detached node.
    ///
    /// Removal only unlinks: the subtree stays intact and can be re-added.
    pub fn remove_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), SceneError> {
        if !self.is_alive(parent) || !self.is_alive(child) {
            return Err(SceneError::Stale);
        }
        if self.parent_of(child) != Some(parent) {
            return Err(SceneError::NotAChild);
        }
        self.unlink(parent, child);
        Ok(())
    }

    /// Detach and return the child at `index`.
    pub fn remove_child_at(&mut self, parent: NodeId, index: usize) -> Result<NodeId, SceneError> {
        let len = self.child_count(parent);
        if !self.is_alive(parent) {
            return Err(SceneError::Stale);
        }
        let Some(child) = self.child_at(parent, index) else {
            return Err(SceneError::IndexOutOfRange { index, len });
        };
        self.unlink(parent, child);
        Ok(child)
    }

    /// Move an existing child to `index` in the child list.
    pub fn set_child_index(
        &mut self,
        parent: NodeId,
        child: NodeId,
        index: usize,
    ) -> Result<(), SceneError> {
        if !self.is_alive(parent) || !self.is_alive(child) {
            return Err(SceneError::Stale);
        }
        let Some(pos) = self.child_index(parent, child) else {
            return Err(SceneError::NotAChild);
        };
        let len = self.child_count(parent);
        if index >= len {
            return Err(SceneError::IndexOutOfRange { index, len });
        }
        let node = self.get_mut(parent).expect("parent liveness checked above");
        node.children.remove(pos);
        node.children.insert(index, child);
        Ok(())
    }

    /// Swap the z-order positions of two children.
    pub fn swap_children(
        &mut self,
        parent: NodeId,
        a: NodeId,
        b: NodeId,
    ) -> Result<(), SceneError> {
        if !self.is_alive(parent) {
            return Err(SceneError::Stale);
        }
        let Some(i) = self.child_index(parent, a) else {
            return Err(SceneError::NotAChild);
        };
        let Some(j) = self.child_index(parent, b) else {
            return Err(SceneError::NotAChild);
        };
        self.get_mut(parent)
            .expect("child lookup implies a live parent")
            .children
            .swap(i, j);
        Ok(())
    }

    /// Swap the children at two indices.
    pub fn swap_children_at(
        &mut self,
        parent: NodeId,
        i: usize,
        j: usize,
    ) -> Result<(), SceneError> {
        let len = self.child_count(parent);
        if !self.is_alive(parent) {
            return Err(SceneError::Stale);
        }
        for index in [i, j] {
            if index >= len {
                return Err(SceneError::IndexOutOfRange { index, len });
            }
        }
        self.get_mut(parent)
            .expect("parent liveness checked above")
            .children
            .swap(i, j);
        Ok(())
    }

    fn unlink(&mut self, parent: NodeId, child: NodeId) {
        if let Some(p) = self.get_mut(parent) {
            p.children.retain(|c| *c != child);
        }
        if let Some(c) = self.get_mut(child) {
            c.parent = None;
        }
        let mut removed = Event::new(EventKind::Removed);
        self.dispatch(child, &mut removed);
    }

    /// Depth-first `AddedToScene` notification over a freshly rooted subtree.
    ///
    /// Reaches every descendant exactly once; tolerates observers mutating
    /// the subtree mid-walk by re-checking liveness at each visit.
    fn attach_subtree(&mut self, id: NodeId) {
        let mut stack: SmallVec<[NodeId; 16]> = SmallVec::new();
        stack.push(id);
        while let Some(n) = stack.pop() {
            if !self.is_alive(n) {
                continue;
            }
            let mut event = Event::new(EventKind::AddedToScene);
            self.dispatch(n, &mut event);
            if let Some(node) = self.get(n) {
                stack.extend(node.children.iter().copied());
            }
        }
    }

    // --- dispatch ---

    /// Register an observer on a node's dispatch point.
    ///
    /// Returns `None` for stale ids. Subscription order is delivery order.
    pub fn subscribe(&mut self, id: NodeId, observer: Observer<NodeId>) -> Option<ObserverId> {
        Some(self.get_mut(id)?.observers.subscribe(observer))
    }

    /// Register a plain callback observer on a node.
    pub fn subscribe_fn(
        &mut self,
        id: NodeId,
        f: impl FnMut(&mut Event<NodeId>) + 'static,
    ) -> Option<ObserverId> {
        Some(self.get_mut(id)?.observers.subscribe_fn(f))
    }

    /// Register another node as an observer; it receives deliveries through
    /// its behavior's `on_event` hook.
    pub fn subscribe_node(&mut self, id: NodeId, observer: NodeId) -> Option<ObserverId> {
        Some(self.get_mut(id)?.observers.subscribe_node(observer))
    }

    /// Remove a subscription by handle.
    pub fn unsubscribe(&mut self, id: NodeId, observer: ObserverId) -> bool {
        self.get_mut(id)
            .is_some_and(|n| n.observers.unsubscribe(observer))
    }

    /// Remove every subscription pointing at `observer` from `id`'s registry.
    pub fn unsubscribe_node(&mut self, id: NodeId, observer: NodeId) -> bool {
        self.get_mut(id)
            .is_some_and(|n| n.observers.unsubscribe_node(&observer))
    }

    /// Dispatch an event from a node.
    ///
    /// Stamps the event's target, notifies the node's observers synchronously
    /// in subscription order, then — for bubbling events — repeats delivery up
    /// the parent chain until a parent is absent or propagation is stopped.
    /// There is no re-entrancy guard: an observer may itself dispatch, and
    /// those events are delivered immediately, not queued.
    pub fn dispatch(&mut self, id: NodeId, event: &mut Event<NodeId>) {
        if !self.is_alive(id) {
            return;
        }
        event.target = Some(id);
        event.phase = Phase::Target;
        self.notify_observers(id, event);
        if event.bubbles() {
            event.phase = Phase::Bubble;
            let mut cur = self.parent_of(id);
            while let Some(p) = cur {
                if event.propagation_stopped() {
                    break;
                }
                self.notify_observers(p, event);
                cur = self.parent_of(p);
            }
        }
    }

    /// Notify the current observers of one node, in subscription order.
    ///
    /// Works against a snapshot of subscription handles: observers removed
    /// mid-dispatch are skipped, observers added mid-dispatch wait for the
    /// next one.
    pub(crate) fn notify_observers(&mut self, id: NodeId, event: &mut Event<NodeId>) {
        enum Step {
            Skip,
            Done,
            Deliver(NodeId),
        }

        event.current = Some(id);
        let Some(node) = self.get(id) else { return };
        let snapshot: SmallVec<[ObserverId; 8]> = node.observers.ids().collect();
        for oid in snapshot {
            let step = {
                // The node may have been disposed by a previous observer.
                let Some(node) = self.get_mut(id) else { return };
                match node.observers.entry_mut(oid) {
                    None => Step::Skip,
                    Some(Observer::Callback(f)) => {
                        guard("observer callback", || f(event));
                        Step::Done
                    }
                    Some(Observer::Node(k)) => Step::Deliver(*k),
                }
            };
            match step {
                Step::Skip | Step::Done => {}
                Step::Deliver(k) => self.deliver_observed(k, event),
            }
        }
    }

    fn deliver_observed(&mut self, id: NodeId, event: &mut Event<NodeId>) {
        let Some(mut behavior) = self.take_behavior(id) else {
            return;
        };
        guard("observer delivery", || behavior.on_event(self, id, event));
        self.restore_behavior(id, behavior);
    }

    // --- hit testing ---

    /// Whether `point` (in `id`'s local space) lies within the node's bounds
    /// or, when `include_descendants`, within any live descendant's bounds.
    ///
    /// Descendants are probed front to back and the first hit wins.
    /// Descendants with a degenerate scale cannot localize the point and are
    /// skipped.
    pub fn hit_test(&self, id: NodeId, point: Point, include_descendants: bool) -> bool {
        let Some(node) = self.get(id) else {
            return false;
        };
        if node.sprite.bounds.rect().contains(point) {
            return true;
        }
        if include_descendants {
            for &child in node.children.iter().rev() {
                let Some(c) = self.get(child) else { continue };
                let Some(inv) = c.sprite.placement.inverse_affine() else {
                    continue;
                };
                if self.hit_test(child, inv * point, true) {
                    return true;
                }
            }
        }
        false
    }

    // --- drawing context ---

    /// Explicitly bind a drawing context to `id`, or `None` to inherit again.
    ///
    /// Inheritance resolves through the parent chain at render time, so an
    /// override takes effect for all current descendants immediately —
    /// except those carrying their own explicit override.
    pub fn set_context(&mut self, id: NodeId, context: Option<ContextId>) {
        if let Some(node) = self.get_mut(id) {
            node.context = context;
        }
    }

    /// The drawing context `id` resolves to, following the parent chain.
    ///
    /// `None` on the live tree means the host's main surface. For a node that
    /// is not on the scene and resolves nothing, the lookup is logged and
    /// `None` returned; the binding exists only once the node is attached.
    pub fn context(&self, id: NodeId) -> Option<ContextId> {
        let mut cur = Some(id);
        while let Some(c) = cur {
            if let Some(ctx) = self.get(c)?.context {
                return Some(ctx);
            }
            cur = self.parent_of(c);
        }
        if !self.is_on_scene(id) {
            tracing::warn!(
                "drawing context is unresolved until the node is added to the scene"
            );
        }
        None
    }

    // --- teardown ---

    /// Idempotent teardown of a node.
    ///
    /// With `recursive`, owned children are torn down first; otherwise the
    /// surviving children are silently detached and stay re-addable. The
    /// node is then unlinked from its parent (`Removed` fires), its hooks are
    /// cleared, a terminal `Disposed` notification reaches its observers, the
    /// observer list is cleared, and the slot is freed — the id is stale from
    /// then on. Safe to call from within any hook of this node or an
    /// ancestor: in-flight traversals detect the stale id and bail out.
    pub fn dispose(&mut self, id: NodeId, recursive: bool) {
        if !self.is_alive(id) {
            return;
        }
        if id == self.root {
            tracing::warn!("the scene root cannot be disposed");
            return;
        }
        if recursive {
            while let Some(&child) = self.get(id).and_then(|n| n.children.last()) {
                if !self.is_alive(child) {
                    // Defensive: drop a stale entry rather than spin on it.
                    if let Some(n) = self.get_mut(id) {
                        n.children.pop();
                    }
                    continue;
                }
                self.dispose(child, true);
                if !self.is_alive(id) {
                    return;
                }
            }
        } else if let Some(node) = self.get_mut(id) {
            let children = core::mem::take(&mut node.children);
            for c in children {
                if let Some(n) = self.get_mut(c) {
                    n.parent = None;
                }
            }
        }
        if let Some(parent) = self.parent_of(id) {
            self.unlink(parent, id);
            // Observers of the detach may have re-entered dispose.
            if !self.is_alive(id) {
                return;
            }
        }
        if let Some(node) = self.get_mut(id) {
            node.behavior = None;
            node.update_hook = None;
            node.draw_hook = None;
        }
        let mut disposed = Event::new(EventKind::Disposed);
        disposed.target = Some(id);
        self.notify_observers(id, &mut disposed);
        let Some(node) = self.get_mut(id) else { return };
        node.observers.clear();
        if self.focus == Some(id) {
            self.focus = None;
        }
        self.nodes[id.idx()] = None;
        self.free_list.push(id.idx());
    }
}

/// Run a behavior hook, containing any panic it raises.
///
/// One faulty node must not abort the frame: the failure is reported and the
/// traversal continues with the remaining siblings and ancestors.
pub(crate) fn guard(what: &str, f: impl FnOnce()) {
    if std::panic::catch_unwind(std::panic::AssertUnwindSafe(f)).is_err() {
        tracing::error!("{what} panicked; the frame continues without it");
    }
}
