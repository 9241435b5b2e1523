//! Integer desktop geometry.
//!
//! Windows always live on whole pixels. Interpolation during animations happens
//! in `f64` ([`FRect`]) and is rounded back with [`Round`].

use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const fn new(x: i32, y: i32) -> Self { Self { x, y } }

    pub fn delta_from(self, origin: Point) -> Point {
        Point::new(self.x - origin.x, self.y - origin.y)
    }
}

#[derive(Serialize, Deserialize, Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Size {
    pub width: i32,
    pub height: i32,
}

impl Size {
    pub const fn new(width: i32, height: i32) -> Self { Self { width, height } }
}

#[derive(Serialize, Deserialize, Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Rect {
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self { x, y, width, height }
    }

    pub const fn from_parts(origin: Point, size: Size) -> Self {
        Self::new(origin.x, origin.y, size.width, size.height)
    }

    pub fn origin(&self) -> Point { Point::new(self.x, self.y) }

    pub fn size(&self) -> Size { Size::new(self.width, self.height) }

    pub fn max_x(&self) -> i32 { self.x + self.width }

    pub fn max_y(&self) -> i32 { self.y + self.height }

    pub fn area(&self) -> i64 { i64::from(self.width.max(0)) * i64::from(self.height.max(0)) }

    pub fn is_empty(&self) -> bool { self.width <= 0 || self.height <= 0 }

    /// Half-open containment: the right and bottom edges belong to the neighbour.
    pub fn contains(&self, point: Point) -> bool {
        (self.x..self.max_x()).contains(&point.x) && (self.y..self.max_y()).contains(&point.y)
    }

    pub fn contains_rect(&self, other: Rect) -> bool {
        self.x <= other.x
            && self.y <= other.y
            && self.max_x() >= other.max_x()
            && self.max_y() >= other.max_y()
    }

    pub fn intersection(&self, other: &Rect) -> Rect {
        let min_x = self.x.max(other.x);
        let max_x = self.max_x().min(other.max_x());
        let min_y = self.y.max(other.y);
        let max_y = self.max_y().min(other.max_y());
        Rect::new(min_x, min_y, (max_x - min_x).max(0), (max_y - min_y).max(0))
    }

    pub fn offset(&self, dx: i32, dy: i32) -> Rect {
        Rect::new(self.x + dx, self.y + dy, self.width, self.height)
    }

    pub fn with_origin(&self, origin: Point) -> Rect {
        Rect::from_parts(origin, self.size())
    }

    pub fn with_size(&self, size: Size) -> Rect {
        Rect::from_parts(self.origin(), size)
    }

    /// Shrinks the rect by the given insets, never below zero size.
    pub fn inset(&self, left: i32, right: i32, top: i32, bottom: i32) -> Rect {
        Rect::new(
            self.x + left,
            self.y + top,
            (self.width - left - right).max(0),
            (self.height - top - bottom).max(0),
        )
    }
}

/// Floating point rect used while interpolating.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct FRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl From<Rect> for FRect {
    fn from(r: Rect) -> Self {
        FRect {
            x: f64::from(r.x),
            y: f64::from(r.y),
            width: f64::from(r.width),
            height: f64::from(r.height),
        }
    }
}

pub trait Round {
    type Output;
    fn round(&self) -> Self::Output;
}

impl Round for FRect {
    type Output = Rect;

    /// Rounds the corners rather than origin and size separately so adjacent
    /// rects keep sharing an edge.
    fn round(&self) -> Rect {
        let min_x = self.x.round() as i32;
        let min_y = self.y.round() as i32;
        let max_x = (self.x + self.width).round() as i32;
        let max_y = (self.y + self.height).round() as i32;
        Rect::new(min_x, min_y, max_x - min_x, max_y - min_y)
    }
}
