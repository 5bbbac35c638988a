// Copyright 2025 the Overstory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Coordinate conversion between local, root, and pointer spaces.
//!
//! Two mechanisms coexist, as the frame lifecycle requires:
//!
//! - A cached per-frame refresh, computed top-down one level at a time during
//!   the update traversal: each node composes its own
//!   translate ∘ scale ∘ rotate-z onto the parent's already-fresh world
//!   affine, and applies the inverse of its own transform to the parent's
//!   pointer-in-local point. Root: identity world, screen `(0, 0)`, raw
//!   pointer.
//! - On-demand chain walks ([`Scene::local_to_global`] /
//!   [`Scene::global_to_local`]) usable at any time, for example to place a
//!   synthetic pointer event at a node-relative location.
//!
//! A zero scale on either axis makes the inverse undefined; the pointer-local
//! point becomes NaN for that node and its descendants, bounds containment on
//! NaN is false, and nothing panics.

use kurbo::{Affine, Point};

use crate::scene::Scene;
use crate::types::NodeId;

impl Scene {
    /// Refresh one node's cached world affine, screen position, and
    /// pointer-in-local point from its parent's already-fresh values.
    pub(crate) fn refresh_transform(&mut self, id: NodeId) {
        let Some(node) = self.get(id) else { return };
        let parent = match node.parent {
            // The root of a traversal has no parent: identity world, origin
            // screen position, and the raw pointer as its local pointer.
            None => {
                let pointer = self.pointer;
                let node = self.get_mut(id).expect("liveness checked above");
                node.world = Affine::IDENTITY;
                node.screen = Point::ORIGIN;
                node.pointer_local = pointer;
                return;
            }
            Some(p) => p,
        };
        let Some(parent) = self.get(parent) else { return };
        let (parent_world, parent_pointer) = (parent.world, parent.pointer_local);

        let node = self.get_mut(id).expect("liveness checked above");
        node.world = parent_world * node.sprite.placement.affine();
        node.screen = node.world * Point::ORIGIN;
        node.pointer_local = match node.sprite.placement.inverse_affine() {
            Some(inv) => inv * parent_pointer,
            None => Point::new(f64::NAN, f64::NAN),
        };
    }

    /// The node's position in root space, as of the last refresh.
    pub fn screen_position(&self, id: NodeId) -> Option<Point> {
        self.get(id).map(|n| n.screen)
    }

    /// The pointer position in the node's local space, as of the last
    /// refresh. NaN coordinates when an ancestor's scale is degenerate.
    pub fn pointer_local(&self, id: NodeId) -> Option<Point> {
        self.get(id).map(|n| n.pointer_local)
    }

    /// The node's cached local-to-root affine, as of the last refresh.
    pub fn world_transform(&self, id: NodeId) -> Option<Affine> {
        self.get(id).map(|n| n.world)
    }

    /// Transform a point from the node's local space to root space.
    ///
    /// Walks the ancestor chain on demand, composing each level's
    /// translate ∘ scale ∘ rotate-z; independent of the per-frame refresh.
    /// `None` for stale ids.
    pub fn local_to_global(&self, id: NodeId, point: Point) -> Option<Point> {
        self.get(id)?;
        let mut acc = Affine::IDENTITY;
        let mut cur = Some(id);
        while let Some(c) = cur {
            let node = self.get(c)?;
            acc = node.sprite.placement.affine() * acc;
            cur = node.parent;
        }
        Some(acc * point)
    }

    /// Transform a point from root space to the node's local space.
    ///
    /// `None` for stale ids, or when any node on the chain has a degenerate
    /// scale (the inverse is undefined there).
    pub fn global_to_local(&self, id: NodeId, point: Point) -> Option<Point> {
        self.get(id)?;
        let mut acc = Affine::IDENTITY;
        let mut cur = Some(id);
        while let Some(c) = cur {
            let node = self.get(c)?;
            acc = acc * node.sprite.placement.inverse_affine()?;
            cur = node.parent;
        }
        Some(acc * point)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sprite::{Placement, Sprite};
    use kurbo::Vec2;

    /// Three nested nodes: A (root child) ⊃ B (translated +50,+50) ⊃
    /// C (translated +25,+25, scaled 2×).
    fn nested_scene() -> (Scene, NodeId, NodeId, NodeId) {
        let mut scene = Scene::new();
        let a = scene.spawn_child(scene.root(), Sprite::new()).unwrap();
        let b = scene.spawn_child(a, Sprite::new()).unwrap();
        scene.sprite_mut(b).unwrap().placement = Placement::at(50.0, 50.0);
        let c = scene.spawn_child(b, Sprite::new()).unwrap();
        scene.sprite_mut(c).unwrap().placement = Placement {
            position: Point::new(25.0, 25.0),
            scale: Vec2::new(2.0, 2.0),
            ..Placement::default()
        };
        (scene, a, b, c)
    }

    #[test]
    fn nested_local_origin_maps_to_global_75_75() {
        let (scene, _, _, c) = nested_scene();
        let global = scene.local_to_global(c, Point::ORIGIN).unwrap();
        assert!((global - Point::new(75.0, 75.0)).hypot() < 1e-9);
        let local = scene.global_to_local(c, Point::new(75.0, 75.0)).unwrap();
        assert!(local.to_vec2().hypot() < 1e-9);
    }

    #[test]
    fn global_to_local_inverts_local_to_global_under_rotation_and_scale() {
        let mut scene = Scene::new();
        let a = scene.spawn_child(scene.root(), Sprite::new()).unwrap();
        scene.sprite_mut(a).unwrap().placement = Placement {
            position: Point::new(-14.0, 3.5),
            scale: Vec2::new(3.0, 0.25),
            rotation_z: 1.1,
            ..Placement::default()
        };
        let b = scene.spawn_child(a, Sprite::new()).unwrap();
        scene.sprite_mut(b).unwrap().placement = Placement {
            position: Point::new(8.0, 8.0),
            rotation_z: -0.4,
            ..Placement::default()
        };

        for p in [
            Point::ORIGIN,
            Point::new(10.0, -2.0),
            Point::new(-7.25, 19.0),
        ] {
            let global = scene.local_to_global(b, p).unwrap();
            let back = scene.global_to_local(b, global).unwrap();
            assert!((back - p).hypot() < 1e-9, "round trip drifted for {p:?}");
        }
    }

    #[test]
    fn degenerate_scale_reports_unavailable_not_a_crash() {
        let (mut scene, _, b, c) = nested_scene();
        scene.sprite_mut(b).unwrap().placement.scale = Vec2::new(0.0, 1.0);
        assert_eq!(scene.global_to_local(c, Point::ORIGIN), None);
        // The forward direction still composes.
        assert!(scene.local_to_global(c, Point::ORIGIN).is_some());
    }

    #[test]
    fn refresh_caches_screen_positions_top_down() {
        let (mut scene, a, b, c) = nested_scene();
        let root = scene.root();
        scene.prerender(root, true);

        assert_eq!(scene.screen_position(root).unwrap(), Point::ORIGIN);
        assert_eq!(scene.screen_position(a).unwrap(), Point::ORIGIN);
        assert_eq!(scene.screen_position(b).unwrap(), Point::new(50.0, 50.0));
        assert_eq!(scene.screen_position(c).unwrap(), Point::new(75.0, 75.0));
    }

    #[test]
    fn refresh_expresses_the_pointer_in_each_local_space() {
        let (mut scene, a, b, c) = nested_scene();
        scene.pointer = Point::new(75.0, 75.0);
        let root = scene.root();
        scene.prerender(root, true);

        assert_eq!(scene.pointer_local(root).unwrap(), Point::new(75.0, 75.0));
        assert_eq!(scene.pointer_local(a).unwrap(), Point::new(75.0, 75.0));
        assert_eq!(scene.pointer_local(b).unwrap(), Point::new(25.0, 25.0));
        // C sits at B-local (25, 25) with scale 2: the pointer is its origin.
        assert!(scene.pointer_local(c).unwrap().to_vec2().hypot() < 1e-9);
    }

    #[test]
    fn degenerate_ancestor_poisons_descendant_pointer_with_nan() {
        let (mut scene, _, b, c) = nested_scene();
        scene.sprite_mut(b).unwrap().placement.scale = Vec2::new(0.0, 0.0);
        scene.pointer = Point::new(10.0, 10.0);
        let root = scene.root();
        scene.prerender(root, true);

        assert!(scene.pointer_local(b).unwrap().x.is_nan());
        assert!(scene.pointer_local(c).unwrap().x.is_nan());
        // NaN never hits bounds.
        assert!(!scene.hit_test(b, scene.pointer_local(b).unwrap(), true));
    }
}
