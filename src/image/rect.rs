use std::fmt;

use embedded_graphics::prelude::*;

/// An axis-aligned rectangle with integer pixel coordinates.
///
/// Rectangles are allowed to have zero height and/or width.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Rect {
    pub(crate) rect: embedded_graphics::primitives::Rectangle,
}

impl Rect {
    /// Creates a rectangle extending outwards from a center point.
    pub fn from_center(x_center: i32, y_center: i32, width: u32, height: u32) -> Self {
        Self::from_top_left(
            x_center - (width / 2) as i32,
            y_center - (height / 2) as i32,
            width,
            height,
        )
    }

    /// Creates a rectangle extending downwards and right from a point.
    #[inline]
    pub const fn from_top_left(top_left_x: i32, top_left_y: i32, width: u32, height: u32) -> Self {
        Self {
            rect: embedded_graphics::primitives::Rectangle {
                top_left: Point {
                    x: top_left_x,
                    y: top_left_y,
                },
                size: Size { width, height },
            },
        }
    }

    /// Creates a rectangle spanning `(x1, y1)` (inclusive) to `(x2, y2)` (exclusive).
    ///
    /// This is the `xyxy` box format used by detection networks. Inverted corners produce an
    /// empty rectangle at `(x1, y1)`.
    pub fn from_corners(x1: i32, y1: i32, x2: i32, y2: i32) -> Self {
        let width = (i64::from(x2) - i64::from(x1)).max(0) as u32;
        let height = (i64::from(y2) - i64::from(y1)).max(0) as u32;
        Self::from_top_left(x1, y1, width, height)
    }

    /// Returns the X coordinate of the left side of the rectangle.
    #[inline]
    pub fn x(&self) -> i32 {
        self.rect.top_left.x
    }

    /// Returns the Y coordinate of the top side of the rectangle.
    #[inline]
    pub fn y(&self) -> i32 {
        self.rect.top_left.y
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.rect.size.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.rect.size.height
    }

    /// Returns the exclusive X coordinate of the right side.
    #[inline]
    pub fn right(&self) -> i32 {
        self.x() + self.width() as i32
    }

    /// Returns the exclusive Y coordinate of the bottom side.
    #[inline]
    pub fn bottom(&self) -> i32 {
        self.y() + self.height() as i32
    }

    /// Returns the corner coordinates as `(x1, y1, x2, y2)`.
    pub fn corners(&self) -> (i32, i32, i32, i32) {
        (self.x(), self.y(), self.right(), self.bottom())
    }

    pub fn center(&self) -> (i32, i32) {
        (
            self.x() + (self.width() / 2) as i32,
            self.y() + (self.height() / 2) as i32,
        )
    }

    #[inline]
    pub fn area(&self) -> u64 {
        u64::from(self.width()) * u64::from(self.height())
    }

    #[must_use]
    pub fn move_by(&self, x: i32, y: i32) -> Rect {
        Rect::from_top_left(self.x() + x, self.y() + y, self.width(), self.height())
    }

    /// Computes the intersection of `self` and `other`.
    ///
    /// Returns `None` when the rectangles do not overlap.
    pub fn intersection(&self, other: &Rect) -> Option<Rect> {
        let x1 = self.x().max(other.x());
        let y1 = self.y().max(other.y());
        let x2 = self.right().min(other.right());
        let y2 = self.bottom().min(other.bottom());
        if x1 >= x2 || y1 >= y2 {
            return None;
        }
        Some(Rect::from_corners(x1, y1, x2, y2))
    }

    /// Computes the intersection over union of two rectangles.
    ///
    /// Returns a value between 0.0 (disjoint) and 1.0 (identical).
    pub fn iou(&self, other: &Rect) -> f32 {
        let inter = match self.intersection(other) {
            Some(rect) => rect.area(),
            None => return 0.0,
        };
        let union = self.area() + other.area() - inter;
        if union == 0 {
            return 0.0;
        }
        inter as f32 / union as f32
    }
}

impl fmt::Debug for Rect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (x1, y1, x2, y2) = self.corners();
        write!(f, "Rect @ ({x1},{y1})-({x2},{y2})/{}x{}", self.width(), self.height())
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    #[test]
    fn test_from_corners() {
        let rect = Rect::from_corners(10, 20, 110, 220);
        assert_eq!(rect.corners(), (10, 20, 110, 220));
        assert_eq!(rect.width(), 100);
        assert_eq!(rect.height(), 200);

        let inverted = Rect::from_corners(10, 10, 5, 5);
        assert_eq!(inverted.area(), 0);
    }

    #[test]
    fn test_intersection() {
        let a = Rect::from_corners(0, 0, 10, 10);
        assert_eq!(
            a.intersection(&Rect::from_corners(5, 5, 20, 20)),
            Some(Rect::from_corners(5, 5, 10, 10))
        );
        assert_eq!(a.intersection(&Rect::from_corners(10, 0, 20, 10)), None);
    }

    #[test]
    fn test_iou() {
        let a = Rect::from_corners(0, 0, 10, 10);
        assert_relative_eq!(a.iou(&a), 1.0);
        assert_relative_eq!(a.iou(&Rect::from_corners(20, 20, 30, 30)), 0.0);
        // 50 px overlap, 150 px union
        assert_relative_eq!(a.iou(&Rect::from_corners(5, 0, 15, 10)), 50.0 / 150.0);
    }
}
