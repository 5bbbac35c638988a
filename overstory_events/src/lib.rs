// Copyright 2025 the Overstory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Overstory Events: the typed event envelope and per-node observer registry.
//!
//! ## Overview
//!
//! This crate defines the [`Event`] envelope carried through an Overstory
//! scene — kind, target, current handler, phase, bubbling and cancellation
//! flags, plus pointer/keyboard payloads — and the [`Observers`] registry that
//! gives every node a publish/subscribe point independent of tree structure.
//!
//! It deliberately knows nothing about the tree itself. The envelope is
//! generic over the node key `K` (a scene hands in its node identifier type),
//! and bubbling up the parent chain is driven by the scene, which checks
//! [`Event::propagation_stopped`] between delivery steps.
//!
//! ## Phases
//!
//! Input events traverse a scene twice: down from the root toward the deepest
//! hit node ([`Phase::Capture`]), then at that node ([`Phase::Target`]), then
//! back up toward the root ([`Phase::Bubble`]). Non-input events dispatched
//! directly on a node start at [`Phase::Target`] and, when constructed with
//! [`Event::bubbling`], continue upward in [`Phase::Bubble`].
//!
//! ## Minimal example
//!
//! ```
//! use overstory_events::{Event, EventKind, Observers};
//!
//! let mut observers: Observers<u32> = Observers::new();
//! observers.subscribe_fn(|event| {
//!     if event.kind() == EventKind::Custom("ping") {
//!         event.stop_propagation();
//!     }
//! });
//!
//! let mut event = Event::bubbling(EventKind::Custom("ping"));
//! event.target = Some(7_u32);
//! observers.notify(&mut event, |_node, _event| {});
//! assert!(event.propagation_stopped());
//! ```
//!
//! This crate is `no_std` and uses `alloc`.

#![no_std]

extern crate alloc;

mod event;
mod observers;

pub use event::{Event, EventKind, KeyData, KeyKind, Phase, PointerButton, PointerData, PointerKind};
pub use observers::{Observer, ObserverId, Observers};
