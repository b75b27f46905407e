//! Slot editing state machine
//!
//! Independent of any window system: the GUI translates pointer input into
//! [`PointerEvent`]s in frame-pixel coordinates and renders the session.

use tracing::debug;

use crate::config::EditorSettings;
use crate::slots::{Point, Slot, SlotCollection};

/// Primary-button pointer input in frame pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerEvent {
    Press(Point),
    Move(Point),
    Release(Point),
}

/// Current gesture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Gesture {
    #[default]
    Idle,
    /// Sizing a new rectangle from `anchor`; `shape` is set on the first move
    Drawing { anchor: Point, shape: Option<Slot> },
    /// Moving corner `point` of slot `slot`
    Dragging { slot: usize, point: usize },
}

/// Editor state for one video
#[derive(Debug, Clone)]
pub struct EditorSession {
    slots: SlotCollection,
    gesture: Gesture,
    settings: EditorSettings,
}

impl EditorSession {
    pub fn new(slots: SlotCollection, settings: EditorSettings) -> Self {
        Self {
            slots,
            gesture: Gesture::Idle,
            settings,
        }
    }

    pub fn slots(&self) -> &SlotCollection {
        &self.slots
    }

    pub fn into_slots(self) -> SlotCollection {
        self.slots
    }

    pub fn gesture(&self) -> Gesture {
        self.gesture
    }

    pub fn is_idle(&self) -> bool {
        self.gesture == Gesture::Idle
    }

    /// The rectangle being drawn, if it has any size yet
    pub fn in_progress(&self) -> Option<Slot> {
        match self.gesture {
            Gesture::Drawing { shape, .. } => shape,
            _ => None,
        }
    }

    /// First corner within the hit radius, scanning slots then corners in order
    pub fn hit_test(&self, point: Point) -> Option<(usize, usize)> {
        self.slots.iter().enumerate().find_map(|(slot_idx, slot)| {
            slot.points()
                .iter()
                .position(|corner| corner.distance(point) < self.settings.hit_radius)
                .map(|point_idx| (slot_idx, point_idx))
        })
    }

    /// Feed one pointer event through the gesture state machine
    pub fn handle(&mut self, event: PointerEvent) {
        self.gesture = match (self.gesture, event) {
            (Gesture::Idle, PointerEvent::Press(p)) => match self.hit_test(p) {
                Some((slot, point)) => {
                    debug!("Dragging corner {} of slot {}", point, slot + 1);
                    Gesture::Dragging { slot, point }
                }
                None => Gesture::Drawing {
                    anchor: p,
                    shape: None,
                },
            },
            (Gesture::Drawing { anchor, .. }, PointerEvent::Move(p)) => Gesture::Drawing {
                anchor,
                shape: Some(Slot::rectangle(anchor, p)),
            },
            (Gesture::Dragging { slot, point }, PointerEvent::Move(p)) => {
                if let Some(target) = self.slots.get_mut(slot) {
                    target.set_point(point, p);
                }
                Gesture::Dragging { slot, point }
            }
            (Gesture::Drawing { shape, .. }, PointerEvent::Release(_)) => {
                if let Some(slot) = shape {
                    self.slots.push(slot);
                    debug!("Added slot {}", self.slots.len());
                }
                Gesture::Idle
            }
            (Gesture::Dragging { .. }, PointerEvent::Release(_)) => Gesture::Idle,
            (gesture, _) => gesture,
        };
    }

    /// Remove the most recent slot; ignored mid-gesture
    pub fn delete_last(&mut self) -> Option<Slot> {
        if !self.is_idle() {
            return None;
        }
        self.slots.pop()
    }

    /// Append a copy of the most recent slot shifted by the copy offset
    pub fn copy_last(&mut self) -> Option<Slot> {
        if !self.is_idle() {
            return None;
        }
        let [dx, dy] = self.settings.copy_offset;
        let copy = self.slots.last()?.translated(dx, dy);
        self.slots.push(copy);
        Some(copy)
    }
}
