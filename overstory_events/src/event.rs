// Copyright 2025 the Overstory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The event envelope: kinds, phases, and input payloads.

use kurbo::Point;

/// Propagation phase of an event traversing a scene.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Phase {
    /// Root-to-target descent; only nodes that opted into capture handling react here.
    Capture,
    /// Delivery at the deepest node whose bounds contain the input point.
    Target,
    /// Target-to-root ascent.
    Bubble,
}

/// Raw pointer event kinds as delivered by the host.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PointerKind {
    /// A button was pressed.
    Pressed,
    /// A button was released.
    Released,
    /// A press and release with no intervening hit-state change.
    Clicked,
    /// The pointer moved with no button held.
    Moved,
    /// The pointer moved with a button held.
    Dragged,
    /// The pointer crossed into bounds. Best-effort; no persistent hover state is kept.
    Entered,
    /// The pointer crossed out of bounds. Best-effort; no persistent hover state is kept.
    Exited,
}

/// Keyboard event kinds as delivered by the host.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum KeyKind {
    /// A key went down.
    Pressed,
    /// A key came up.
    Released,
    /// A key press produced a character.
    Typed,
}

/// The kind tag of an [`Event`].
///
/// The tag is open: alongside the built-in input and lifecycle kinds, callers
/// may dispatch arbitrary [`EventKind::Custom`] events through the same
/// envelope and observer machinery.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum EventKind {
    /// A pointer input event; the envelope carries [`PointerData`].
    Pointer(PointerKind),
    /// A keyboard input event; the envelope carries [`KeyData`].
    Key(KeyKind),
    /// The node was linked into a parent's child list.
    Added,
    /// The node became part of a tree rooted at the scene root.
    AddedToScene,
    /// The node was unlinked from its parent.
    Removed,
    /// Terminal notification emitted while a node's observer list is torn down.
    Disposed,
    /// An application-defined kind.
    Custom(&'static str),
}

impl EventKind {
    /// Whether this kind is routed through the input propagation traversal.
    pub fn is_input(self) -> bool {
        matches!(self, Self::Pointer(_) | Self::Key(_))
    }
}

/// Pointer button identifier.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
pub enum PointerButton {
    /// The primary button.
    #[default]
    Left,
    /// The middle button or wheel.
    Middle,
    /// The secondary button.
    Right,
    /// Any other button, by host-assigned index.
    Other(u8),
}

/// Payload of a pointer event.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct PointerData {
    /// Position in the coordinate space the event was generated in (root space).
    pub position: Point,
    /// Position re-expressed in the current handler's local space.
    ///
    /// Rewritten before each delivery while the event traverses the tree;
    /// outside a traversal it equals [`PointerData::position`].
    pub local: Point,
    /// The button involved, where the kind has one.
    pub button: PointerButton,
}

impl PointerData {
    /// Payload at a root-space position, local initially equal to it.
    pub fn new(position: Point, button: PointerButton) -> Self {
        Self {
            position,
            local: position,
            button,
        }
    }
}

/// Payload of a keyboard event.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct KeyData {
    /// Host key code.
    pub code: u32,
    /// The character produced, for kinds that produce one.
    pub character: Option<char>,
}

#[derive(Clone, Debug, PartialEq)]
enum EventData {
    None,
    Pointer(PointerData),
    Key(KeyData),
}

/// An event flowing through a scene, generic over the node key `K`.
///
/// The envelope carries a kind, the target node (the deepest node whose bounds
/// contained the input point, or the dispatching node), the node currently
/// handling it, the traversal [`Phase`], a bubbling flag fixed at
/// construction, and a one-way propagation-stopped flag.
///
/// ```
/// use overstory_events::{Event, EventKind, Phase};
///
/// let mut event: Event<u32> = Event::bubbling(EventKind::Custom("select"));
/// assert!(event.bubbles());
/// assert_eq!(event.phase, Phase::Target);
/// event.stop_propagation();
/// assert!(event.propagation_stopped());
/// ```
#[derive(Clone, Debug)]
pub struct Event<K> {
    kind: EventKind,
    data: EventData,
    /// The node this event is targeted at.
    pub target: Option<K>,
    /// The node whose handlers or observers are being notified right now.
    pub current: Option<K>,
    /// The current traversal phase.
    pub phase: Phase,
    bubbles: bool,
    stopped: bool,
}

impl<K> Event<K> {
    /// A non-bubbling event of the given kind.
    pub fn new(kind: EventKind) -> Self {
        Self {
            kind,
            data: EventData::None,
            target: None,
            current: None,
            phase: Phase::Target,
            bubbles: false,
            stopped: false,
        }
    }

    /// A bubbling event of the given kind.
    ///
    /// The bubbling flag is fixed for the lifetime of the event.
    pub fn bubbling(kind: EventKind) -> Self {
        Self {
            bubbles: true,
            ..Self::new(kind)
        }
    }

    /// Attach a pointer payload.
    pub fn with_pointer(mut self, data: PointerData) -> Self {
        self.data = EventData::Pointer(data);
        self
    }

    /// Attach a keyboard payload.
    pub fn with_key(mut self, data: KeyData) -> Self {
        self.data = EventData::Key(data);
        self
    }

    /// The kind tag of this event.
    pub fn kind(&self) -> EventKind {
        self.kind
    }

    /// Whether this event continues up the parent chain after local delivery.
    pub fn bubbles(&self) -> bool {
        self.bubbles
    }

    /// Stop this event from reaching any further node in the traversal.
    ///
    /// Checked between every delivery step: the remainder of a capture
    /// descent, the target delivery, and the bubble ascent are all skipped
    /// once set. Observers already being notified at the current node still
    /// run to completion.
    pub fn stop_propagation(&mut self) {
        self.stopped = true;
    }

    /// Whether [`Event::stop_propagation`] has been called.
    pub fn propagation_stopped(&self) -> bool {
        self.stopped
    }

    /// The pointer payload, for pointer events.
    pub fn pointer(&self) -> Option<&PointerData> {
        match &self.data {
            EventData::Pointer(p) => Some(p),
            _ => None,
        }
    }

    /// Mutable access to the pointer payload, for pointer events.
    pub fn pointer_mut(&mut self) -> Option<&mut PointerData> {
        match &mut self.data {
            EventData::Pointer(p) => Some(p),
            _ => None,
        }
    }

    /// The keyboard payload, for key events.
    pub fn key(&self) -> Option<&KeyData> {
        match &self.data {
            EventData::Key(k) => Some(k),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bubbling_flag_is_fixed_at_construction() {
        let plain: Event<u32> = Event::new(EventKind::Added);
        assert!(!plain.bubbles());
        let bubbling: Event<u32> = Event::bubbling(EventKind::Removed);
        assert!(bubbling.bubbles());
    }

    #[test]
    fn stop_propagation_is_one_way() {
        let mut event: Event<u32> = Event::bubbling(EventKind::Custom("x"));
        assert!(!event.propagation_stopped());
        event.stop_propagation();
        event.stop_propagation();
        assert!(event.propagation_stopped());
    }

    #[test]
    fn payload_accessors_match_kind() {
        let p = PointerData::new(Point::new(3.0, 4.0), PointerButton::Left);
        let event: Event<u32> =
            Event::bubbling(EventKind::Pointer(PointerKind::Pressed)).with_pointer(p);
        assert_eq!(event.pointer().unwrap().position, Point::new(3.0, 4.0));
        assert_eq!(event.pointer().unwrap().local, Point::new(3.0, 4.0));
        assert!(event.key().is_none());

        let event: Event<u32> = Event::new(EventKind::Key(KeyKind::Typed)).with_key(KeyData {
            code: 65,
            character: Some('a'),
        });
        assert_eq!(event.key().unwrap().character, Some('a'));
        assert!(event.pointer().is_none());
    }

    #[test]
    fn input_kinds_are_input() {
        assert!(EventKind::Pointer(PointerKind::Moved).is_input());
        assert!(EventKind::Key(KeyKind::Pressed).is_input());
        assert!(!EventKind::Added.is_input());
        assert!(!EventKind::Custom("tick").is_input());
    }
}
