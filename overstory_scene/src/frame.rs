// Copyright 2025 the Overstory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Per-frame traversal: the update pass and the render pass.
//!
//! One host tick drives [`Scene::advance`]: every node updates (self before
//! descendants, with the transform refresh interleaved so each node reads
//! only its direct parent's fresh values), then the tree renders back to
//! front (self below children). Hooks may freely mutate the tree they are
//! being called from; both passes iterate child lists by index and re-examine
//! the same index whenever the element there changes identity, and they
//! re-check liveness before touching anything a hook might have disposed.
//!
//! The active blend mode is threaded through the render traversal as a
//! parameter and restored on subtree exit; there is no process-wide blend
//! state.

use crate::scene::{Scene, guard};
use crate::sprite::BlendMode;
use crate::surface::Surface;
use crate::types::{ContextId, NodeId, SpriteFlags};

impl Scene {
    /// Advance one frame: update pass, transform refresh, then render pass.
    ///
    /// Called once per host frame tick. All traversal happens synchronously
    /// within this call, on the caller's thread.
    pub fn advance(&mut self, surface: &mut dyn Surface) {
        let root = self.root();
        self.prerender(root, false);
        self.render_node(root, surface, BlendMode::default(), None);
    }

    /// Update (unless suppressed) and refresh transforms, self then
    /// descendants.
    ///
    /// `suppress_updates` re-runs only the geometric refresh; input delivery
    /// uses it to bring pointer-local caches up to date without re-entering
    /// user code.
    pub(crate) fn prerender(&mut self, id: NodeId, suppress_updates: bool) {
        if !self.is_alive(id) {
            return;
        }
        if !suppress_updates {
            // An assigned update hook replaces the behavior's update.
            if let Some(mut hook) = self.take_update_hook(id) {
                guard("update hook", || hook(self, id));
                self.restore_update_hook(id, hook);
            } else if let Some(mut behavior) = self.take_behavior(id) {
                guard("update", || behavior.update(self, id));
                self.restore_behavior(id, behavior);
            }
            // The hook may have disposed this node; nothing further to do.
            if !self.is_alive(id) {
                return;
            }
        }
        self.refresh_transform(id);

        let mut i = 0;
        while let Some(child) = self.child_at(id, i) {
            self.prerender(child, suppress_updates);
            if !self.is_alive(id) {
                return;
            }
            if self.child_at(id, i) == Some(child) {
                i += 1;
            }
            // Otherwise the element at `i` changed identity (the child
            // removed or reparented itself or a sibling); re-examine the
            // same index so no element is skipped.
        }
    }

    fn render_node(
        &mut self,
        id: NodeId,
        surface: &mut dyn Surface,
        parent_blend: BlendMode,
        parent_ctx: Option<ContextId>,
    ) {
        let Some(node) = self.get(id) else { return };
        if !node.sprite.flags.contains(SpriteFlags::VISIBLE) {
            return;
        }
        let placement = node.sprite.placement;
        let in_front = node.sprite.flags.contains(SpriteFlags::IN_FRONT);
        let blend = node.sprite.blend.unwrap_or(parent_blend);
        let ctx = node.context.or(parent_ctx);
        // An off-screen layer begins where the resolved context changes.
        let layer = match node.context {
            Some(c) if Some(c) != parent_ctx => Some(c),
            _ => None,
        };

        if let Some(c) = layer {
            surface.begin_layer(c);
        }
        let three_d = surface.is_3d();
        if in_front && three_d {
            surface.set_depth_test(false);
        }
        if blend != parent_blend {
            surface.set_blend_mode(blend);
        }
        if three_d {
            surface.push_transform_3d(&placement);
        } else {
            surface.push_transform_2d(placement.position, placement.scale, placement.rotation_z);
        }

        // Draw self below children.
        if let Some(mut hook) = self.take_draw_hook(id) {
            guard("draw hook", || hook(self, id, surface));
            self.restore_draw_hook(id, hook);
        } else if let Some(mut behavior) = self.take_behavior(id) {
            guard("draw", || behavior.draw(self, id, surface));
            self.restore_behavior(id, behavior);
        }

        // Draw children above self, unless the draw hook disposed this node.
        if self.is_alive(id) {
            let mut i = 0;
            while let Some(child) = self.child_at(id, i) {
                self.render_node(child, surface, blend, ctx);
                if !self.is_alive(id) {
                    break;
                }
                if self.child_at(id, i) == Some(child) {
                    i += 1;
                }
            }
        }

        surface.pop_transform();
        if blend != parent_blend {
            surface.set_blend_mode(parent_blend);
        }
        if in_front && three_d {
            surface.set_depth_test(true);
        }
        if let Some(c) = layer {
            surface.end_layer(c);
            if surface.supports_pixel_sync() {
                surface.composite_layer(c);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sprite::{Placement, Sprite};
    use kurbo::{Point, Vec2};
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Op {
        Push,
        Pop,
        Blend(BlendMode),
        Depth(bool),
        BeginLayer(u32),
        EndLayer(u32),
        Composite(u32),
        Draw(&'static str),
        Update(&'static str),
    }

    #[derive(Clone)]
    struct Log(Rc<RefCell<Vec<Op>>>);

    impl Log {
        fn new() -> Self {
            Self(Rc::new(RefCell::new(Vec::new())))
        }

        fn push(&self, op: Op) {
            self.0.borrow_mut().push(op);
        }

        fn ops(&self) -> Vec<Op> {
            self.0.borrow().clone()
        }
    }

    struct RecordingSurface {
        log: Log,
        three_d: bool,
        pixel_sync: bool,
    }

    impl RecordingSurface {
        fn new(log: Log) -> Self {
            Self {
                log,
                three_d: false,
                pixel_sync: true,
            }
        }
    }

    impl Surface for RecordingSurface {
        fn is_3d(&self) -> bool {
            self.three_d
        }

        fn supports_pixel_sync(&self) -> bool {
            self.pixel_sync
        }

        fn push_transform_2d(&mut self, _position: Point, _scale: Vec2, _rotation_z: f64) {
            self.log.push(Op::Push);
        }

        fn push_transform_3d(&mut self, _placement: &Placement) {
            self.log.push(Op::Push);
        }

        fn pop_transform(&mut self) {
            self.log.push(Op::Pop);
        }

        fn set_blend_mode(&mut self, mode: BlendMode) {
            self.log.push(Op::Blend(mode));
        }

        fn set_depth_test(&mut self, enabled: bool) {
            self.log.push(Op::Depth(enabled));
        }

        fn begin_layer(&mut self, context: ContextId) {
            self.log.push(Op::BeginLayer(context.0));
        }

        fn end_layer(&mut self, context: ContextId) {
            self.log.push(Op::EndLayer(context.0));
        }

        fn composite_layer(&mut self, context: ContextId) {
            self.log.push(Op::Composite(context.0));
        }
    }

    fn draw_label(scene: &mut Scene, id: NodeId, log: &Log, label: &'static str) {
        let log = log.clone();
        scene.set_draw_hook(
            id,
            Some(Box::new(move |_, _, _| log.push(Op::Draw(label)))),
        );
    }

    fn draws(ops: &[Op]) -> Vec<&'static str> {
        ops.iter()
            .filter_map(|op| match op {
                Op::Draw(label) => Some(*label),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn children_paint_bottom_to_top_above_their_parent() {
        let mut scene = Scene::new();
        let log = Log::new();
        let parent = scene.spawn_child(scene.root(), Sprite::new()).unwrap();
        draw_label(&mut scene, parent, &log, "parent");
        for label in ["c0", "c1", "c2"] {
            let c = scene.spawn_child(parent, Sprite::new()).unwrap();
            draw_label(&mut scene, c, &log, label);
        }

        scene.advance(&mut RecordingSurface::new(log.clone()));
        assert_eq!(draws(&log.ops()), vec!["parent", "c0", "c1", "c2"]);
    }

    #[test]
    fn update_runs_self_then_descendants_before_any_draw() {
        let mut scene = Scene::new();
        let log = Log::new();
        let parent = scene.spawn_child(scene.root(), Sprite::new()).unwrap();
        let child = scene.spawn_child(parent, Sprite::new()).unwrap();
        for (id, label) in [(parent, "parent"), (child, "child")] {
            let log = log.clone();
            scene.set_update_hook(id, Some(Box::new(move |_, _| log.push(Op::Update(label)))));
        }
        draw_label(&mut scene, parent, &log, "parent");

        scene.advance(&mut RecordingSurface::new(log.clone()));
        let ops = log.ops();
        let updates: Vec<_> = ops
            .iter()
            .filter(|op| matches!(op, Op::Update(_)))
            .collect();
        assert_eq!(updates, vec![&Op::Update("parent"), &Op::Update("child")]);
        let first_draw = ops.iter().position(|op| matches!(op, Op::Draw(_))).unwrap();
        let last_update = ops
            .iter()
            .rposition(|op| matches!(op, Op::Update(_)))
            .unwrap();
        assert!(last_update < first_draw, "updates precede the render pass");
    }

    #[test]
    fn invisible_subtrees_are_not_painted() {
        let mut scene = Scene::new();
        let log = Log::new();
        let hidden = scene.spawn_child(scene.root(), Sprite::new()).unwrap();
        scene.sprite_mut(hidden).unwrap().flags -= SpriteFlags::VISIBLE;
        draw_label(&mut scene, hidden, &log, "hidden");
        let inner = scene.spawn_child(hidden, Sprite::new()).unwrap();
        draw_label(&mut scene, inner, &log, "inner");
        let shown = scene.spawn_child(scene.root(), Sprite::new()).unwrap();
        draw_label(&mut scene, shown, &log, "shown");

        scene.advance(&mut RecordingSurface::new(log.clone()));
        assert_eq!(draws(&log.ops()), vec!["shown"]);
    }

    #[test]
    fn blend_override_is_set_once_and_restored_after_the_subtree() {
        let mut scene = Scene::new();
        let log = Log::new();
        let tinted = scene.spawn_child(scene.root(), Sprite::new()).unwrap();
        scene.sprite_mut(tinted).unwrap().blend = Some(BlendMode::Add);
        draw_label(&mut scene, tinted, &log, "tinted");
        // Same explicit mode deeper down: already active, no surface call.
        let inner = scene.spawn_child(tinted, Sprite::new()).unwrap();
        scene.sprite_mut(inner).unwrap().blend = Some(BlendMode::Add);
        draw_label(&mut scene, inner, &log, "inner");
        let plain = scene.spawn_child(scene.root(), Sprite::new()).unwrap();
        draw_label(&mut scene, plain, &log, "plain");

        scene.advance(&mut RecordingSurface::new(log.clone()));
        let blends: Vec<_> = log
            .ops()
            .iter()
            .filter_map(|op| match op {
                Op::Blend(m) => Some(*m),
                _ => None,
            })
            .collect();
        assert_eq!(blends, vec![BlendMode::Add, BlendMode::Blend]);

        let ops = log.ops();
        let set = ops.iter().position(|o| *o == Op::Blend(BlendMode::Add)).unwrap();
        let restore = ops
            .iter()
            .position(|o| *o == Op::Blend(BlendMode::Blend))
            .unwrap();
        let tinted_draw = ops.iter().position(|o| *o == Op::Draw("tinted")).unwrap();
        let inner_draw = ops.iter().position(|o| *o == Op::Draw("inner")).unwrap();
        assert!(set < tinted_draw && inner_draw < restore);
    }

    #[test]
    fn context_override_brackets_an_offscreen_layer() {
        let mut scene = Scene::new();
        let log = Log::new();
        let buffered = scene.spawn_child(scene.root(), Sprite::new()).unwrap();
        scene.set_context(buffered, Some(ContextId(3)));
        draw_label(&mut scene, buffered, &log, "buffered");
        // Sharing the inherited context must not re-open the layer.
        let inner = scene.spawn_child(buffered, Sprite::new()).unwrap();
        draw_label(&mut scene, inner, &log, "inner");

        scene.advance(&mut RecordingSurface::new(log.clone()));
        let ops = log.ops();
        let layered: Vec<_> = ops
            .iter()
            .filter(|op| {
                matches!(op, Op::BeginLayer(_) | Op::EndLayer(_) | Op::Composite(_))
            })
            .collect();
        assert_eq!(
            layered,
            vec![&Op::BeginLayer(3), &Op::EndLayer(3), &Op::Composite(3)]
        );
        let begin = ops.iter().position(|o| *o == Op::BeginLayer(3)).unwrap();
        let end = ops.iter().position(|o| *o == Op::EndLayer(3)).unwrap();
        let inner_draw = ops.iter().position(|o| *o == Op::Draw("inner")).unwrap();
        assert!(begin < inner_draw && inner_draw < end);
    }

    #[test]
    fn composite_back_is_skipped_without_pixel_sync() {
        let mut scene = Scene::new();
        let log = Log::new();
        let buffered = scene.spawn_child(scene.root(), Sprite::new()).unwrap();
        scene.set_context(buffered, Some(ContextId(3)));

        let mut surface = RecordingSurface::new(log.clone());
        surface.pixel_sync = false;
        scene.advance(&mut surface);
        let ops = log.ops();
        assert!(ops.contains(&Op::EndLayer(3)));
        assert!(!ops.iter().any(|o| matches!(o, Op::Composite(_))));
    }

    #[test]
    fn in_front_toggles_depth_testing_only_on_3d_surfaces() {
        let mut scene = Scene::new();
        let log = Log::new();
        let front = scene.spawn_child(scene.root(), Sprite::new()).unwrap();
        scene.sprite_mut(front).unwrap().flags |= SpriteFlags::IN_FRONT;
        draw_label(&mut scene, front, &log, "front");

        scene.advance(&mut RecordingSurface::new(log.clone()));
        assert!(!log.ops().iter().any(|o| matches!(o, Op::Depth(_))));

        let log = Log::new();
        draw_label(&mut scene, front, &log, "front");
        let mut surface = RecordingSurface::new(log.clone());
        surface.three_d = true;
        scene.advance(&mut surface);
        let ops = log.ops();
        let off = ops.iter().position(|o| *o == Op::Depth(false)).unwrap();
        let draw = ops.iter().position(|o| *o == Op::Draw("front")).unwrap();
        let on = ops.iter().position(|o| *o == Op::Depth(true)).unwrap();
        assert!(off < draw && draw < on);
    }

    #[test]
    fn disposing_a_node_in_its_own_update_keeps_it_out_of_the_render_pass() {
        let mut scene = Scene::new();
        let log = Log::new();
        let doomed = scene.spawn_child(scene.root(), Sprite::new()).unwrap();
        scene.set_update_hook(
            doomed,
            Some(Box::new(move |scene, id| scene.dispose(id, true))),
        );
        draw_label(&mut scene, doomed, &log, "doomed");
        let sibling = scene.spawn_child(scene.root(), Sprite::new()).unwrap();
        draw_label(&mut scene, sibling, &log, "sibling");

        scene.advance(&mut RecordingSurface::new(log.clone()));
        assert!(!scene.is_alive(doomed));
        assert_eq!(draws(&log.ops()), vec!["sibling"]);
    }

    #[test]
    fn removing_yourself_during_update_does_not_skip_siblings() {
        let mut scene = Scene::new();
        let log = Log::new();
        let root = scene.root();
        let quitter = scene.spawn_child(root, Sprite::new()).unwrap();
        {
            let log = log.clone();
            scene.set_update_hook(
                quitter,
                Some(Box::new(move |scene, id| {
                    log.push(Op::Update("quitter"));
                    let parent = scene.parent_of(id).unwrap();
                    scene.remove_child(parent, id).unwrap();
                })),
            );
        }
        for label in ["next", "last"] {
            let c = scene.spawn_child(root, Sprite::new()).unwrap();
            let log = log.clone();
            scene.set_update_hook(c, Some(Box::new(move |_, _| log.push(Op::Update(label)))));
        }

        scene.advance(&mut RecordingSurface::new(log.clone()));
        let updates: Vec<_> = log
            .ops()
            .iter()
            .filter_map(|op| match op {
                Op::Update(label) => Some(*label),
                _ => None,
            })
            .collect();
        assert_eq!(updates, vec!["quitter", "next", "last"]);
    }

    #[test]
    fn a_panicking_hook_does_not_abort_the_frame() {
        let mut scene = Scene::new();
        let log = Log::new();
        let faulty = scene.spawn_child(scene.root(), Sprite::new()).unwrap();
        scene.set_update_hook(faulty, Some(Box::new(|_, _| panic!("misbehaving node"))));
        let healthy = scene.spawn_child(scene.root(), Sprite::new()).unwrap();
        draw_label(&mut scene, healthy, &log, "healthy");

        scene.advance(&mut RecordingSurface::new(log.clone()));
        assert_eq!(draws(&log.ops()), vec!["healthy"]);
        assert!(scene.is_alive(faulty), "the faulty node is contained, not torn down");
    }

    #[test]
    fn update_hook_takes_precedence_over_behavior_update() {
        struct Counting(Log);
        impl crate::Behavior for Counting {
            fn update(&mut self, _scene: &mut Scene, _id: NodeId) {
                self.0.push(Op::Update("behavior"));
            }
        }

        let mut scene = Scene::new();
        let log = Log::new();
        let node = scene.spawn_child(scene.root(), Sprite::new()).unwrap();
        scene.set_behavior(node, Box::new(Counting(log.clone())));
        scene.advance(&mut RecordingSurface::new(log.clone()));

        {
            let log = log.clone();
            scene.set_update_hook(node, Some(Box::new(move |_, _| log.push(Op::Update("hook")))));
        }
        scene.advance(&mut RecordingSurface::new(log.clone()));
        scene.set_update_hook(node, None);
        scene.advance(&mut RecordingSurface::new(log.clone()));

        let updates: Vec<_> = log
            .ops()
            .iter()
            .filter_map(|op| match op {
                Op::Update(label) => Some(*label),
                _ => None,
            })
            .collect();
        assert_eq!(updates, vec!["behavior", "hook", "behavior"]);
    }
}
