//! Parking slot data model
//!
//! A slot is a quadrilateral in frame-pixel coordinates. A collection of
//! slots for one video is the unit of persistence shared by the editor and
//! the occupancy monitor.

pub mod geometry;
pub mod store;

use serde::{Deserialize, Serialize};

pub use store::{storage_key, SlotStore, SlotStoreError};

/// Number of corners every slot has
pub const SLOT_CORNERS: usize = 4;

/// Integer point in frame-pixel coordinates
///
/// Serialized as a two-element `[x, y]` array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "[i32; 2]", into = "[i32; 2]")]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to another point
    pub fn distance(&self, other: Point) -> f32 {
        let dx = (self.x - other.x) as f32;
        let dy = (self.y - other.y) as f32;
        (dx * dx + dy * dy).sqrt()
    }

    /// Point shifted by (dx, dy)
    pub fn offset(&self, dx: i32, dy: i32) -> Point {
        Point::new(self.x + dx, self.y + dy)
    }
}

impl From<[i32; 2]> for Point {
    fn from(value: [i32; 2]) -> Self {
        Point::new(value[0], value[1])
    }
}

impl From<Point> for [i32; 2] {
    fn from(value: Point) -> Self {
        [value.x, value.y]
    }
}

impl From<(i32, i32)> for Point {
    fn from(value: (i32, i32)) -> Self {
        Point::new(value.0, value.1)
    }
}

/// One parking space: an ordered ring of exactly four corners
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Slot {
    points: [Point; SLOT_CORNERS],
}

impl Slot {
    pub fn new(points: [Point; SLOT_CORNERS]) -> Self {
        Self { points }
    }

    /// Axis-aligned rectangle anchored at `anchor` with the opposite corner at `corner`
    ///
    /// Corners are ordered anchor, (corner.x, anchor.y), corner, (anchor.x, corner.y).
    pub fn rectangle(anchor: Point, corner: Point) -> Self {
        Self::new(rectangle_corners(anchor, corner))
    }

    pub fn points(&self) -> &[Point; SLOT_CORNERS] {
        &self.points
    }

    /// Corner where the slot label is anchored
    pub fn first_point(&self) -> Point {
        self.points[0]
    }

    /// Overwrite a single corner. Out-of-range indices are ignored.
    pub fn set_point(&mut self, index: usize, point: Point) {
        if let Some(p) = self.points.get_mut(index) {
            *p = point;
        }
    }

    /// Copy of this slot with every corner shifted by (dx, dy)
    pub fn translated(&self, dx: i32, dy: i32) -> Slot {
        Slot::new(self.points.map(|p| p.offset(dx, dy)))
    }

    /// Whether `point` lies inside or on the boundary of this slot
    pub fn contains(&self, point: Point) -> bool {
        geometry::polygon_contains(&self.points, point)
    }
}

impl TryFrom<Vec<Point>> for Slot {
    type Error = Vec<Point>;

    fn try_from(points: Vec<Point>) -> Result<Self, Self::Error> {
        let points: [Point; SLOT_CORNERS] = points.try_into()?;
        Ok(Slot::new(points))
    }
}

/// Corner order used for every rectangle the editor produces
pub fn rectangle_corners(anchor: Point, corner: Point) -> [Point; SLOT_CORNERS] {
    [
        anchor,
        Point::new(corner.x, anchor.y),
        corner,
        Point::new(anchor.x, corner.y),
    ]
}

/// Ordered slots for one video. Index order is the 1-based display order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SlotCollection {
    slots: Vec<Slot>,
}

impl SlotCollection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn push(&mut self, slot: Slot) {
        self.slots.push(slot);
    }

    /// Remove and return the most recently added slot
    pub fn pop(&mut self) -> Option<Slot> {
        self.slots.pop()
    }

    pub fn last(&self) -> Option<&Slot> {
        self.slots.last()
    }

    pub fn get(&self, index: usize) -> Option<&Slot> {
        self.slots.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut Slot> {
        self.slots.get_mut(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Slot> {
        self.slots.iter()
    }

    pub fn as_slice(&self) -> &[Slot] {
        &self.slots
    }
}

impl From<Vec<Slot>> for SlotCollection {
    fn from(slots: Vec<Slot>) -> Self {
        Self { slots }
    }
}

impl FromIterator<Slot> for SlotCollection {
    fn from_iter<T: IntoIterator<Item = Slot>>(iter: T) -> Self {
        Self {
            slots: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a SlotCollection {
    type Item = &'a Slot;
    type IntoIter = std::slice::Iter<'a, Slot>;

    fn into_iter(self) -> Self::IntoIter {
        self.slots.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rectangle_corner_order() {
        let slot = Slot::rectangle(Point::new(10, 20), Point::new(50, 60));
        assert_eq!(
            slot.points(),
            &[
                Point::new(10, 20),
                Point::new(50, 20),
                Point::new(50, 60),
                Point::new(10, 60),
            ]
        );
    }

    #[test]
    fn test_translated_shifts_every_point() {
        let slot = Slot::rectangle(Point::new(0, 0), Point::new(10, 10));
        let moved = slot.translated(40, 20);
        for (a, b) in slot.points().iter().zip(moved.points()) {
            assert_eq!(b.x, a.x + 40);
            assert_eq!(b.y, a.y + 20);
        }
    }

    #[test]
    fn test_set_point_ignores_out_of_range() {
        let mut slot = Slot::rectangle(Point::new(0, 0), Point::new(10, 10));
        let before = slot;
        slot.set_point(7, Point::new(99, 99));
        assert_eq!(slot, before);

        slot.set_point(2, Point::new(30, 15));
        assert_eq!(slot.points()[2], Point::new(30, 15));
    }

    #[test]
    fn test_try_from_requires_four_points() {
        let three = vec![Point::new(0, 0), Point::new(1, 0), Point::new(1, 1)];
        assert!(Slot::try_from(three).is_err());

        let four = vec![
            Point::new(0, 0),
            Point::new(1, 0),
            Point::new(1, 1),
            Point::new(0, 1),
        ];
        assert!(Slot::try_from(four).is_ok());
    }

    #[test]
    fn test_point_serializes_as_pair() {
        let json = serde_json::to_string(&Point::new(3, -4)).unwrap();
        assert_eq!(json, "[3,-4]");

        let slot = Slot::rectangle(Point::new(1, 2), Point::new(3, 4));
        let json = serde_json::to_string(&slot).unwrap();
        assert_eq!(json, "[[1,2],[3,2],[3,4],[1,4]]");
    }

    #[test]
    fn test_point_distance() {
        let a = Point::new(10, 10);
        let b = Point::new(13, 14);
        assert!((a.distance(b) - 5.0).abs() < 1e-6);
    }
}
