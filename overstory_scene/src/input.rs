// Copyright 2025 the Overstory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Input propagation: the capture → target → bubble traversal.
//!
//! Each input event runs one full traversal, entering at the scene root in
//! the capture phase. Descent visits children front to back (highest index
//! first — the topmost node gets first refusal); every recursive call reports
//! whether the pointer fell within that child's subtree, and the node then
//! resolves its own phase: a descendant hit makes it a bubble stop, its own
//! bounds containing the pointer make it the target. Handlers run for the
//! target and bubble cases alike; [`Event::stop_propagation`] is honored
//! between every delivery step and aborts the remainder of the traversal,
//! capture descent included.
//!
//! Hit decisions read the pointer-local points cached by the per-frame
//! refresh, so moved/dragged input re-runs the geometric refresh before
//! propagating. Handlers may mutate the tree mid-traversal; the descent
//! clamps its child index against shrinkage and re-checks liveness before
//! every recursion and bounds access.

use kurbo::Point;
use smallvec::SmallVec;

use overstory_events::{
    Event, EventKind, KeyData, KeyKind, Phase, PointerButton, PointerData, PointerKind,
};

use crate::scene::{Scene, guard};
use crate::types::{CapturePolicy, NodeId, SpriteFlags};

impl Scene {
    /// Deliver a raw pointer event from the host.
    ///
    /// `position` is in root space. Moved and dragged events refresh the
    /// cached transforms first so bounds checks see the new position.
    pub fn pointer_input(&mut self, kind: PointerKind, position: Point, button: PointerButton) {
        self.pointer = position;
        if matches!(kind, PointerKind::Moved | PointerKind::Dragged) {
            let root = self.root();
            self.prerender(root, true);
        }
        let mut event = Event::bubbling(EventKind::Pointer(kind))
            .with_pointer(PointerData::new(position, button));
        event.phase = Phase::Capture;
        let root = self.root();
        self.propagate(root, &mut event);
    }

    /// Deliver a raw keyboard event from the host.
    ///
    /// With a focus node set (and on the scene), delivery follows the
    /// root-to-focus path; otherwise the event traverses the whole tree and
    /// every visible, input-enabled node receives it.
    pub fn key_input(&mut self, kind: KeyKind, code: u32, character: Option<char>) {
        let mut event =
            Event::bubbling(EventKind::Key(kind)).with_key(KeyData { code, character });
        event.phase = Phase::Capture;
        match self.focus {
            Some(focus) if self.is_on_scene(focus) => self.propagate_focused(focus, &mut event),
            _ => {
                let root = self.root();
                self.propagate(root, &mut event);
            }
        }
    }

    /// Inject a pointer-clicked event at a node-relative location.
    ///
    /// The point is converted to root space and the event re-enters the
    /// traversal at the root exactly as a host-generated click would. While
    /// the synthetic coordinate is in use, the scene's cached pointer
    /// position is overridden, and restored afterwards.
    pub fn trigger_click(&mut self, id: NodeId, local: Point) {
        if !self.is_on_scene(id) {
            tracing::warn!("trigger_click requires the node to be on the scene");
            return;
        }
        let Some(global) = self.local_to_global(id, local) else {
            return;
        };
        let saved = self.pointer;
        let root = self.root();
        self.pointer = global;
        self.prerender(root, true);

        let mut event = Event::bubbling(EventKind::Pointer(PointerKind::Clicked))
            .with_pointer(PointerData::new(global, PointerButton::Left));
        event.phase = Phase::Capture;
        self.propagate(root, &mut event);

        self.pointer = saved;
        self.prerender(root, true);
    }

    /// One traversal step. Returns whether the pointer fell within this
    /// node's (or one of its descendants') bounds.
    fn propagate(&mut self, id: NodeId, event: &mut Event<NodeId>) -> bool {
        let Some(node) = self.get(id) else {
            return false;
        };

        if node.sprite.flags.contains(SpriteFlags::CAPTURE_INPUT) {
            // Capture opt-in: react now, before any descendant handles it.
            let hit = match self.capture_policy {
                CapturePolicy::Subtree => self
                    .get(id)
                    .is_some_and(|n| self.hit_test(id, n.pointer_local, true)),
                CapturePolicy::SelfBounds => self.pointer_in_bounds(id),
            };
            self.deliver_input(id, event, hit);
        }
        if event.propagation_stopped() {
            return false;
        }
        let Some(node) = self.get(id) else {
            // The capture handler disposed this node.
            return false;
        };

        let mut in_child = false;
        if node
            .sprite
            .flags
            .contains(SpriteFlags::VISIBLE | SpriteFlags::INPUT_CHILDREN)
        {
            // Front to back, tolerating structural mutation by handlers.
            let mut i = self.child_count(id);
            loop {
                let len = self.child_count(id);
                if i > len {
                    i = len;
                }
                if i == 0 {
                    break;
                }
                i -= 1;
                let Some(child) = self.child_at(id, i) else {
                    continue;
                };
                event.phase = Phase::Capture;
                if self.propagate(child, event) {
                    in_child = true;
                }
                if event.propagation_stopped() {
                    return false;
                }
                if !self.is_alive(id) {
                    return false;
                }
            }
        }

        let in_self = self.pointer_in_bounds(id);
        let Some(node) = self.get(id) else {
            return false;
        };
        if node
            .sprite
            .flags
            .contains(SpriteFlags::VISIBLE | SpriteFlags::INPUT_ENABLED)
        {
            if in_child {
                // A descendant claimed the hit; this node bubbles.
                event.phase = Phase::Bubble;
            } else if in_self {
                event.phase = Phase::Target;
                event.target = Some(id);
            }
            self.deliver_input(id, event, in_child)
        } else {
            // Not input-enabled: a descendant hit propagates upward
            // unchanged so ancestors can bubble; otherwise report no hit.
            in_child
        }
    }

    /// Capture → target → bubble along the root-to-`target` path, for
    /// focus-routed keyboard input.
    fn propagate_focused(&mut self, target: NodeId, event: &mut Event<NodeId>) {
        let mut path: SmallVec<[NodeId; 8]> = SmallVec::new();
        let mut cur = Some(target);
        while let Some(c) = cur {
            path.push(c);
            cur = self.parent_of(c);
        }
        path.reverse();
        let ancestors = path.len() - 1;

        event.phase = Phase::Capture;
        for &node in &path[..ancestors] {
            if event.propagation_stopped() {
                return;
            }
            let Some(n) = self.get(node) else { return };
            if n.sprite.flags.contains(SpriteFlags::CAPTURE_INPUT) {
                self.deliver_input(node, event, false);
            }
        }

        if event.propagation_stopped() {
            return;
        }
        if let Some(n) = self.get(target)
            && n.sprite
                .flags
                .contains(SpriteFlags::VISIBLE | SpriteFlags::INPUT_ENABLED)
        {
            event.phase = Phase::Target;
            event.target = Some(target);
            self.deliver_input(target, event, false);
        }

        event.phase = Phase::Bubble;
        for idx in (0..ancestors).rev() {
            if event.propagation_stopped() {
                return;
            }
            let node = path[idx];
            let Some(n) = self.get(node) else { continue };
            if n.sprite
                .flags
                .contains(SpriteFlags::VISIBLE | SpriteFlags::INPUT_ENABLED)
            {
                self.deliver_input(node, event, false);
            }
        }
    }

    fn pointer_in_bounds(&self, id: NodeId) -> bool {
        self.get(id)
            .is_some_and(|n| n.sprite.bounds.rect().contains(n.pointer_local))
    }

    /// Invoke a node's input handlers for one event, keyed by kind.
    ///
    /// Returns whether the pointer fell within the node's bounds or a
    /// descendant's (`in_child`).
    fn deliver_input(&mut self, id: NodeId, event: &mut Event<NodeId>, in_child: bool) -> bool {
        let Some(node) = self.get(id) else {
            return false;
        };
        event.current = Some(id);
        let pointer_local = node.pointer_local;
        let in_bounds = in_child || node.sprite.bounds.rect().contains(pointer_local);
        if let Some(pointer) = event.pointer_mut() {
            pointer.local = pointer_local;
        }

        let kind = event.kind();
        let Some(mut b) = self.take_behavior(id) else {
            return in_bounds;
        };
        guard("input handler", || match kind {
            EventKind::Pointer(PointerKind::Clicked) if in_bounds => {
                b.pointer_clicked(self, id, event);
            }
            EventKind::Pointer(PointerKind::Entered) if in_bounds => {
                b.pointer_entered(self, id, event);
            }
            EventKind::Pointer(PointerKind::Exited) if !in_bounds => {
                b.pointer_exited(self, id, event);
            }
            EventKind::Pointer(PointerKind::Pressed) => {
                b.pointer_down(self, id, event);
                if in_bounds {
                    b.pointer_pressed(self, id, event);
                }
            }
            EventKind::Pointer(PointerKind::Released) => {
                b.pointer_up(self, id, event);
                if in_bounds {
                    b.pointer_released(self, id, event);
                }
            }
            EventKind::Pointer(PointerKind::Dragged) => b.pointer_dragged(self, id, event),
            EventKind::Pointer(PointerKind::Moved) => b.pointer_moved(self, id, event),
            EventKind::Key(KeyKind::Pressed) => b.key_pressed(self, id, event),
            EventKind::Key(KeyKind::Released) => b.key_released(self, id, event),
            EventKind::Key(KeyKind::Typed) => b.key_typed(self, id, event),
            _ => {}
        });
        self.restore_behavior(id, b);
        in_bounds
    }
}
