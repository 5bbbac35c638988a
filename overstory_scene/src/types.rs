// Copyright 2025 the Overstory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Public types for the scene: node identifiers, flags, policies, and errors.

/// Identifier for a node in the scene (generational).
///
/// A `NodeId` becomes stale when its node is disposed; stale identifiers are
/// rejected by every scene operation rather than resolving to a reused slot.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct NodeId(pub(crate) u32, pub(crate) u32);

impl NodeId {
    pub(crate) const fn new(idx: u32, generation: u32) -> Self {
        Self(idx, generation)
    }

    pub(crate) const fn idx(self) -> usize {
        self.0 as usize
    }
}

/// Opaque handle to a host-allocated drawing context (an off-screen buffer).
///
/// The core never inspects the value; it only compares handles to decide
/// where an off-screen layer begins and hands them back to the
/// [`Surface`](crate::Surface) for layer bracketing and composite-back.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct ContextId(pub u32);

bitflags::bitflags! {
    /// Per-sprite flags controlling visibility and input routing.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct SpriteFlags: u8 {
        /// On-screen visibility of the sprite and its descendants.
        ///
        /// An invisible sprite is neither painted nor reached by input, and
        /// neither are its descendants.
        const VISIBLE        = 0b0000_0001;
        /// The sprite itself receives input events.
        const INPUT_ENABLED  = 0b0000_0010;
        /// Descendants of the sprite receive input events.
        const INPUT_CHILDREN = 0b0000_0100;
        /// Opt into reacting to input events during the capture descent,
        /// before any descendant handles them.
        const CAPTURE_INPUT  = 0b0000_1000;
        /// Hint to disable depth testing while this subtree renders on a 3-D
        /// surface. Does not reorder anything; it only suppresses z-fighting.
        const IN_FRONT       = 0b0001_0000;
    }
}

impl Default for SpriteFlags {
    fn default() -> Self {
        Self::VISIBLE | Self::INPUT_ENABLED | Self::INPUT_CHILDREN
    }
}

/// How a capture-phase opt-in decides whether the pointer concerns it.
///
/// See [`Scene::set_capture_policy`](crate::Scene::set_capture_policy).
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
pub enum CapturePolicy {
    /// Hit test the node's own bounds and every descendant's bounds.
    ///
    /// This matches the intent of capture handling: the node reacts before
    /// any descendant that would ultimately be the target.
    #[default]
    Subtree,
    /// Hit test only the node's own bounds.
    SelfBounds,
}

/// Structural-usage errors. The scene is left unmodified when one is returned.
#[derive(Copy, Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum SceneError {
    /// A child index does not exist in the child list.
    #[error("index {index} is out of range for a child list of length {len}")]
    IndexOutOfRange {
        /// The offending index.
        index: usize,
        /// The child list length at the time of the call.
        len: usize,
    },
    /// The referenced node is not a child of the given parent.
    #[error("node is not a child of the given parent")]
    NotAChild,
    /// A node cannot be added as a child of itself.
    #[error("a node cannot be a child of itself")]
    SelfChild,
    /// Linking would make a node its own descendant.
    #[error("linking would create a cycle through an ancestor")]
    Cycle,
    /// A stale identifier was passed (the node has been disposed).
    #[error("stale node identifier")]
    Stale,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_flags_are_visible_and_input_enabled() {
        let flags = SpriteFlags::default();
        assert!(flags.contains(SpriteFlags::VISIBLE));
        assert!(flags.contains(SpriteFlags::INPUT_ENABLED));
        assert!(flags.contains(SpriteFlags::INPUT_CHILDREN));
        assert!(!flags.contains(SpriteFlags::CAPTURE_INPUT));
        assert!(!flags.contains(SpriteFlags::IN_FRONT));
    }

    #[test]
    fn errors_render_messages() {
        let e = SceneError::IndexOutOfRange { index: 9, len: 2 };
        assert_eq!(
            e.to_string(),
            "index 9 is out of range for a child list of length 2"
        );
    }
}
