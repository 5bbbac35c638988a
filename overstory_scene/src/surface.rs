// Copyright 2025 the Overstory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The drawing-surface capability set the core renders against.

use kurbo::{Point, Vec2};

use crate::sprite::{BlendMode, Placement};
use crate::types::ContextId;

/// Abstract drawing surface provided by the host.
///
/// This trait is the render traversal's entire view of the rasterization
/// backend: transform push/pop, a settable blend mode with a known default,
/// an optional depth-test toggle, and off-screen layer bracketing keyed by
/// host-allocated [`ContextId`]s. What a behavior actually draws is opaque to
/// the core — concrete backends expose their primitive operations on the
/// implementing type and leaf behaviors downcast or wrap it themselves.
///
/// The two capability flags are consulted each pass: [`Surface::is_3d`]
/// selects the transform-application branch, and
/// [`Surface::supports_pixel_sync`] decides whether an off-screen layer is
/// composited back onto its parent when its subtree finishes.
pub trait Surface {
    /// Whether the surface models depth (enables the 3-D transform branch).
    fn is_3d(&self) -> bool {
        false
    }

    /// Whether off-screen layers can be copied back incrementally.
    fn supports_pixel_sync(&self) -> bool {
        true
    }

    /// Push a 2-D affine: translate ∘ scale ∘ rotate-z.
    fn push_transform_2d(&mut self, position: Point, scale: Vec2, rotation_z: f64);

    /// Push the full 3-D transform of a placement.
    ///
    /// Only called when [`Surface::is_3d`] is true; the depth components and
    /// x/y rotations are meaningful here and nowhere else.
    fn push_transform_3d(&mut self, placement: &Placement);

    /// Pop the most recently pushed transform.
    fn pop_transform(&mut self);

    /// Set the active blend mode.
    ///
    /// The traversal only calls this on changes and restores the previous
    /// mode when the overriding subtree finishes.
    fn set_blend_mode(&mut self, mode: BlendMode);

    /// Enable or disable depth testing. Ignored by 2-D surfaces.
    fn set_depth_test(&mut self, enabled: bool) {
        let _ = enabled;
    }

    /// Redirect drawing into the given off-screen context.
    fn begin_layer(&mut self, context: ContextId) {
        let _ = context;
    }

    /// Finish drawing into the given off-screen context.
    fn end_layer(&mut self, context: ContextId) {
        let _ = context;
    }

    /// Composite a finished off-screen context back onto the parent target.
    ///
    /// Only called when [`Surface::supports_pixel_sync`] is true.
    fn composite_layer(&mut self, context: ContextId) {
        let _ = context;
    }
}
