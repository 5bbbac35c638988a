// Copyright 2025 the Overstory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Overstory Scene: a retained-mode scene graph.
//!
//! ## Overview
//!
//! A [`Scene`] owns a tree of positioned, transformable sprites. Each host
//! frame tick drives one [`Scene::advance`] call: every node runs its update
//! hook (self before descendants, with the transform caches refreshed one
//! level at a time), then the tree paints back to front against an abstract
//! [`Surface`]. Raw pointer and keyboard input enters through
//! [`Scene::pointer_input`] / [`Scene::key_input`] and traverses the tree in
//! a capture → target → bubble sequence, honoring per-node visibility and
//! input flags and stop-propagation at every step.
//!
//! ## Structure and ownership
//!
//! Nodes live in a generational slot arena; a [`NodeId`] is a copyable
//! handle that goes stale when its node is disposed, and the parent link is
//! a plain id, never an owning reference. Child-list order encodes z-order:
//! index 0 paints first (bottom), the last index paints last (top) and is
//! offered input first. Nodes are created detached ([`Scene::spawn`]) and
//! participate in frames and input only while linked under [`Scene::root`].
//!
//! ## Behaviors
//!
//! Per-node logic lives in a [`Behavior`] object (update/draw plus per-kind
//! input handlers, all default no-ops), or in closure hooks assigned with
//! [`Scene::set_update_hook`] / [`Scene::set_draw_hook`] that replace the
//! behavior's frame steps. Hooks get `&mut Scene` and may mutate the tree
//! they are being traversed from — including disposing their own node; every
//! traversal tolerates this. A panicking hook is contained and reported; it
//! never aborts the frame.
//!
//! ## Events
//!
//! Each node is also a dispatch point for [`overstory_events`] envelopes,
//! independent of tree structure: arbitrary observers subscribe to a node,
//! and bubbling events climb the parent chain. Lifecycle notifications
//! (added, added-to-scene, removed, disposed) flow through the same channel.
//!
//! ## Minimal example
//!
//! ```
//! use kurbo::Point;
//! use overstory_scene::{Scene, Sprite};
//!
//! let mut scene = Scene::new();
//! let panel = scene.spawn_child(scene.root(), Sprite::sized(80.0, 24.0)).unwrap();
//!
//! // Coordinate conversion works on demand, outside the frame loop.
//! assert_eq!(
//!     scene.local_to_global(panel, Point::ORIGIN),
//!     Some(Point::ORIGIN),
//! );
//! assert!(scene.hit_test(panel, Point::new(40.0, 12.0), true));
//! ```

mod frame;
mod input;
mod scene;
mod sprite;
mod surface;
mod transform;
mod types;

pub use overstory_events as events;

pub use scene::Scene;
pub use sprite::{Behavior, BlendMode, Bounds, DrawHook, Placement, Sprite, UpdateHook};
pub use surface::Surface;
pub use types::{CapturePolicy, ContextId, NodeId, SceneError, SpriteFlags};
