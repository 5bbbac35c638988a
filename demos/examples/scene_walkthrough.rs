// Copyright 2025 the Overstory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! A tour of the scene graph: frames, input routing, and teardown.
//!
//! Builds a small tree over a println surface, drives a few frames, routes
//! pointer input through capture → target → bubble, injects a synthetic
//! click, and disposes a subtree mid-flight.
//!
//! Run:
//! - `cargo run -p overstory_demos --example scene_walkthrough`

use kurbo::{Point, Vec2};
use overstory_events::{Event, PointerButton, PointerKind};
use overstory_scene::{
    Behavior, BlendMode, NodeId, Placement, Scene, Sprite, SpriteFlags, Surface,
};

/// Surface that narrates what the render traversal asks of it.
struct PrintSurface;

impl Surface for PrintSurface {
    fn push_transform_2d(&mut self, position: Point, scale: Vec2, rotation_z: f64) {
        println!(
            "  surface: push translate({:.0}, {:.0}) scale({:.1}, {:.1}) rotate({:.2})",
            position.x, position.y, scale.x, scale.y, rotation_z
        );
    }

    fn push_transform_3d(&mut self, placement: &Placement) {
        println!("  surface: push 3d {placement:?}");
    }

    fn pop_transform(&mut self) {
        println!("  surface: pop");
    }

    fn set_blend_mode(&mut self, mode: BlendMode) {
        println!("  surface: blend {mode:?}");
    }
}

/// A sprite that spins a little every frame and reports clicks.
struct SpinningPanel {
    name: &'static str,
}

impl Behavior for SpinningPanel {
    fn update(&mut self, scene: &mut Scene, id: NodeId) {
        if let Some(sprite) = scene.sprite_mut(id) {
            sprite.placement.rotation_z += 0.01;
        }
    }

    fn draw(&mut self, _scene: &mut Scene, _id: NodeId, _surface: &mut dyn Surface) {
        println!("  draw: {}", self.name);
    }

    fn pointer_clicked(&mut self, _scene: &mut Scene, _id: NodeId, event: &mut Event<NodeId>) {
        let local = event.pointer().map(|p| p.local).unwrap_or_default();
        println!(
            "  {}: clicked at local ({:.1}, {:.1}) in phase {:?}",
            self.name, local.x, local.y, event.phase
        );
    }
}

fn main() {
    tracing_subscriber::fmt::init();

    let mut scene = Scene::new();
    let mut surface = PrintSurface;

    // A panel holding a smaller pad, both clickable.
    let panel = scene
        .spawn_child(scene.root(), Sprite::sized(200.0, 120.0))
        .unwrap();
    scene.sprite_mut(panel).unwrap().placement = Placement::at(20.0, 20.0);
    scene.set_behavior(panel, Box::new(SpinningPanel { name: "panel" }));

    let pad = scene.spawn_child(panel, Sprite::sized(40.0, 40.0)).unwrap();
    scene.sprite_mut(pad).unwrap().placement = Placement::at(10.0, 10.0);
    scene.sprite_mut(pad).unwrap().blend = Some(BlendMode::Add);
    scene.set_behavior(pad, Box::new(SpinningPanel { name: "pad" }));

    // The panel wants first refusal on the way down.
    scene.sprite_mut(panel).unwrap().flags |= SpriteFlags::CAPTURE_INPUT;

    println!("== two frames ==");
    scene.advance(&mut surface);
    scene.advance(&mut surface);

    println!("\n== click inside the pad ==");
    scene.pointer_input(PointerKind::Moved, Point::new(45.0, 45.0), PointerButton::Left);
    scene.pointer_input(
        PointerKind::Clicked,
        Point::new(45.0, 45.0),
        PointerButton::Left,
    );

    println!("\n== synthetic click at the pad's center ==");
    scene.trigger_click(pad, Point::new(20.0, 20.0));

    println!("\n== dispose the pad, then one more frame ==");
    scene.dispose(pad, true);
    scene.advance(&mut surface);
}
