// Copyright 2025 the Overstory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Per-sprite local state and the behavior hook trait.

use kurbo::{Affine, Point, Rect, Vec2};
use overstory_events::Event;

use crate::scene::Scene;
use crate::surface::Surface;
use crate::types::{NodeId, SpriteFlags};

/// A sprite's local transform relative to its parent.
///
/// Only `position.x/y`, `scale.x/y`, and `rotation_z` participate in the 2-D
/// coordinate math (screen/pointer conversion, hit testing). The depth
/// components and the x/y rotations are visual-only: they are forwarded to a
/// 3-D surface when one is in use and ignored otherwise.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Placement {
    /// Position of the sprite's origin in its parent's space.
    pub position: Point,
    /// Position on the parent's z-axis (visual-only).
    pub z: f64,
    /// Scale along the x and y axes.
    pub scale: Vec2,
    /// Scale along the z-axis (visual-only).
    pub scale_z: f64,
    /// Rotation around the x-axis, in radians (visual-only).
    pub rotation_x: f64,
    /// Rotation around the y-axis, in radians (visual-only).
    pub rotation_y: f64,
    /// Rotation around the z-axis, in radians. The primary rotation.
    pub rotation_z: f64,
}

impl Default for Placement {
    fn default() -> Self {
        Self {
            position: Point::ORIGIN,
            z: 0.0,
            scale: Vec2::new(1.0, 1.0),
            scale_z: 1.0,
            rotation_x: 0.0,
            rotation_y: 0.0,
            rotation_z: 0.0,
        }
    }
}

impl Placement {
    /// A placement translated to `(x, y)`, otherwise default.
    pub fn at(x: f64, y: f64) -> Self {
        Self {
            position: Point::new(x, y),
            ..Self::default()
        }
    }

    /// The local-to-parent affine: translate ∘ scale ∘ rotate-z.
    pub fn affine(&self) -> Affine {
        Affine::translate(self.position.to_vec2())
            * Affine::scale_non_uniform(self.scale.x, self.scale.y)
            * Affine::rotate(self.rotation_z)
    }

    /// The parent-to-local affine, or `None` when the scale is degenerate.
    ///
    /// A zero scale on either axis has no inverse; callers treat the point as
    /// unavailable rather than failing.
    pub fn inverse_affine(&self) -> Option<Affine> {
        if self.scale.x == 0.0 || self.scale.y == 0.0 {
            return None;
        }
        Some(
            Affine::rotate(-self.rotation_z)
                * Affine::scale_non_uniform(self.scale.x.recip(), self.scale.y.recip())
                * Affine::translate(-self.position.to_vec2()),
        )
    }
}

/// A sprite's bounds rectangle in its own coordinate space.
///
/// The four fields are independent edit surfaces: assigning any of them moves
/// that edge or dimension alone, and [`Bounds::rect`] / [`Bounds::set_rect`]
/// convert to and from a [`Rect`] without drift. The bounds are used both as
/// a rendering-size hint and for hit testing; they are not derived from what
/// a behavior draws.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct Bounds {
    /// Left edge.
    pub left: f64,
    /// Top edge.
    pub top: f64,
    /// Width, measured rightward from `left`.
    pub width: f64,
    /// Height, measured downward from `top`.
    pub height: f64,
}

impl Bounds {
    /// Bounds from all four fields.
    pub fn new(left: f64, top: f64, width: f64, height: f64) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }

    /// Bounds of the given size with the upper-left corner at the origin.
    pub fn sized(width: f64, height: f64) -> Self {
        Self::new(0.0, 0.0, width, height)
    }

    /// The bounds as a [`Rect`].
    pub fn rect(&self) -> Rect {
        Rect::new(
            self.left,
            self.top,
            self.left + self.width,
            self.top + self.height,
        )
    }

    /// Replace the bounds from a [`Rect`].
    pub fn set_rect(&mut self, rect: Rect) {
        self.left = rect.x0;
        self.top = rect.y0;
        self.width = rect.width();
        self.height = rect.height();
    }
}

/// Renderer compositing mode for a subtree.
///
/// The core never interprets these beyond equality; they are handed to the
/// [`Surface`] when a subtree with an explicit mode begins rendering and the
/// previous mode is restored when it finishes.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
pub enum BlendMode {
    /// The surface's default source-over blend.
    #[default]
    Blend,
    /// Additive.
    Add,
    /// Subtractive.
    Subtract,
    /// Keep the lightest component.
    Lightest,
    /// Keep the darkest component.
    Darkest,
    /// Multiply.
    Multiply,
    /// Screen.
    Screen,
}

/// Local state of one scene node.
#[derive(Clone, Debug, Default)]
pub struct Sprite {
    /// Transform relative to the parent.
    pub placement: Placement,
    /// Bounds rectangle in local space.
    pub bounds: Bounds,
    /// Visibility and input flags.
    pub flags: SpriteFlags,
    /// Explicit blend mode, or `None` to inherit the nearest ancestor's.
    pub blend: Option<BlendMode>,
}

impl Sprite {
    /// A sprite with default placement and zero bounds.
    pub fn new() -> Self {
        Self::default()
    }

    /// A sprite with the given bounds.
    pub fn with_bounds(bounds: Bounds) -> Self {
        Self {
            bounds,
            ..Self::default()
        }
    }

    /// A sprite with bounds of the given size at the origin.
    pub fn sized(width: f64, height: f64) -> Self {
        Self::with_bounds(Bounds::sized(width, height))
    }
}

/// Boxed replacement for a node's update step.
pub type UpdateHook = dyn FnMut(&mut Scene, NodeId);
/// Boxed replacement for a node's draw step.
pub type DrawHook = dyn FnMut(&mut Scene, NodeId, &mut dyn Surface);

/// Per-node behavior: frame hooks and input handlers.
///
/// Every method is a default no-op; implementors override the ones they care
/// about, the strategy-object replacement for subclassing a sprite. The
/// receiver is stored on the node and taken out for the duration of each
/// call, so handlers get full mutable access to the scene — including the
/// freedom to add, remove, reorder, or dispose nodes, their own included.
///
/// Pointer handlers are invoked by the input traversal according to the event
/// kind and the node's hit state: `pointer_down`/`pointer_up` fire on every
/// press/release, the bounded variants only when the pointer is within the
/// node's (or a hit descendant's) bounds, `pointer_moved`/`pointer_dragged`
/// always, and enter/exit on bounds-crossing, best-effort. Key handlers fire
/// unconditionally. [`Behavior::on_event`] is the delivery hook for events
/// observed through a subscription, independent of tree traversal.
pub trait Behavior: 'static {
    /// Per-frame update, before transforms refresh and anything draws.
    fn update(&mut self, _scene: &mut Scene, _id: NodeId) {}

    /// Per-frame draw, inside this node's transform, below its children.
    fn draw(&mut self, _scene: &mut Scene, _id: NodeId, _surface: &mut dyn Surface) {}

    /// A press within bounds.
    fn pointer_pressed(&mut self, _scene: &mut Scene, _id: NodeId, _event: &mut Event<NodeId>) {}
    /// A release within bounds.
    fn pointer_released(&mut self, _scene: &mut Scene, _id: NodeId, _event: &mut Event<NodeId>) {}
    /// A press and release within bounds with no intervening hit-state change.
    fn pointer_clicked(&mut self, _scene: &mut Scene, _id: NodeId, _event: &mut Event<NodeId>) {}
    /// The pointer crossed into bounds. Best-effort.
    fn pointer_entered(&mut self, _scene: &mut Scene, _id: NodeId, _event: &mut Event<NodeId>) {}
    /// The pointer crossed out of bounds. Best-effort.
    fn pointer_exited(&mut self, _scene: &mut Scene, _id: NodeId, _event: &mut Event<NodeId>) {}
    /// A press, within bounds or not.
    fn pointer_down(&mut self, _scene: &mut Scene, _id: NodeId, _event: &mut Event<NodeId>) {}
    /// A release, within bounds or not.
    fn pointer_up(&mut self, _scene: &mut Scene, _id: NodeId, _event: &mut Event<NodeId>) {}
    /// The pointer moved, delivered regardless of bounds.
    fn pointer_moved(&mut self, _scene: &mut Scene, _id: NodeId, _event: &mut Event<NodeId>) {}
    /// The pointer moved with a button held, delivered regardless of bounds.
    fn pointer_dragged(&mut self, _scene: &mut Scene, _id: NodeId, _event: &mut Event<NodeId>) {}

    /// A key went down.
    fn key_pressed(&mut self, _scene: &mut Scene, _id: NodeId, _event: &mut Event<NodeId>) {}
    /// A key came up.
    fn key_released(&mut self, _scene: &mut Scene, _id: NodeId, _event: &mut Event<NodeId>) {}
    /// A key press produced a character.
    fn key_typed(&mut self, _scene: &mut Scene, _id: NodeId, _event: &mut Event<NodeId>) {}

    /// An event observed through a subscription on some dispatching node.
    fn on_event(&mut self, _scene: &mut Scene, _id: NodeId, _event: &mut Event<NodeId>) {}
}
