// Copyright 2026 the Scanout Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Integer rectangles and normalized rectangle sets.
//!
//! [`Region`] is the currency for damage and clip areas. It stores a set of
//! non-empty, pairwise disjoint [`Rect`]s; every mutating operation keeps that
//! invariant, so iterating [`Region::rects`] visits each covered pixel exactly
//! once.

use alloc::vec::Vec;
use core::fmt;

/// An axis-aligned integer rectangle in pixel coordinates.
///
/// A rectangle with a non-positive width or height is empty.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Rect {
    /// Left edge.
    pub x: i32,
    /// Top edge.
    pub y: i32,
    /// Width in pixels.
    pub width: i32,
    /// Height in pixels.
    pub height: i32,
}

impl Rect {
    /// The empty rectangle at the origin.
    pub const ZERO: Self = Self::new(0, 0, 0, 0);

    /// A rectangle large enough to stand for "the whole plane".
    ///
    /// Unbounded damage rings use this when asked to damage everything. The
    /// edges are chosen so that `right()` and `bottom()` never overflow.
    pub const EVERYTHING: Self = Self::new(i32::MIN / 2, i32::MIN / 2, i32::MAX, i32::MAX);

    /// Creates a rectangle from its origin and size.
    #[inline]
    #[must_use]
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Creates a rectangle at the origin with the given size.
    #[inline]
    #[must_use]
    pub const fn from_size(width: i32, height: i32) -> Self {
        Self::new(0, 0, width, height)
    }

    /// Creates a rectangle from its edges. Inverted edges produce an empty rectangle.
    #[inline]
    #[must_use]
    pub const fn from_edges(x0: i32, y0: i32, x1: i32, y1: i32) -> Self {
        Self::new(x0, y0, x1.saturating_sub(x0), y1.saturating_sub(y0))
    }

    /// Returns `true` if the rectangle covers no pixels.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.width <= 0 || self.height <= 0
    }

    /// Right edge (exclusive).
    #[inline]
    #[must_use]
    pub const fn right(&self) -> i32 {
        self.x.saturating_add(self.width)
    }

    /// Bottom edge (exclusive).
    #[inline]
    #[must_use]
    pub const fn bottom(&self) -> i32 {
        self.y.saturating_add(self.height)
    }

    /// Returns the number of covered pixels.
    #[inline]
    #[must_use]
    pub fn area(&self) -> u64 {
        if self.is_empty() {
            0
        } else {
            u64::from(self.width.unsigned_abs()) * u64::from(self.height.unsigned_abs())
        }
    }

    /// Returns the overlap of two rectangles, or `None` if they are disjoint.
    #[must_use]
    pub fn intersect(&self, other: &Self) -> Option<Self> {
        let r = Self::from_edges(
            self.x.max(other.x),
            self.y.max(other.y),
            self.right().min(other.right()),
            self.bottom().min(other.bottom()),
        );
        (!r.is_empty()).then_some(r)
    }

    /// Returns `true` if `other` lies entirely inside `self`.
    #[must_use]
    pub fn contains_rect(&self, other: &Self) -> bool {
        !other.is_empty()
            && other.x >= self.x
            && other.y >= self.y
            && other.right() <= self.right()
            && other.bottom() <= self.bottom()
    }

    /// Returns `true` if the pixel at `(x, y)` lies inside the rectangle.
    #[must_use]
    pub fn contains_point(&self, x: i32, y: i32) -> bool {
        x >= self.x && x < self.right() && y >= self.y && y < self.bottom()
    }

    /// Returns the rectangle moved by `(dx, dy)`.
    #[must_use]
    pub const fn translate(self, dx: i32, dy: i32) -> Self {
        Self::new(
            self.x.saturating_add(dx),
            self.y.saturating_add(dy),
            self.width,
            self.height,
        )
    }

    /// Converts to a floating-point [`kurbo::Rect`].
    #[must_use]
    pub fn to_kurbo(self) -> kurbo::Rect {
        kurbo::Rect::new(
            f64::from(self.x),
            f64::from(self.y),
            f64::from(self.right()),
            f64::from(self.bottom()),
        )
    }

    /// Splits `self` into the (up to four) pieces not covered by `hole`.
    fn subtract_into(&self, hole: &Self, out: &mut Vec<Self>) {
        let Some(cut) = self.intersect(hole) else {
            out.push(*self);
            return;
        };
        // Full-width bands above and below the cut, then the left and right
        // remainders of the cut's own rows.
        let bands = [
            Self::from_edges(self.x, self.y, self.right(), cut.y),
            Self::from_edges(self.x, cut.bottom(), self.right(), self.bottom()),
            Self::from_edges(self.x, cut.y, cut.x, cut.bottom()),
            Self::from_edges(cut.right(), cut.y, self.right(), cut.bottom()),
        ];
        out.extend(bands.into_iter().filter(|r| !r.is_empty()));
    }
}

impl fmt::Debug for Rect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Rect({}, {}, {}x{})",
            self.x, self.y, self.width, self.height
        )
    }
}

/// A set of pixels described by disjoint rectangles.
///
/// Two regions compare equal when they cover the same pixels, regardless of
/// how each one happens to be decomposed into rectangles.
#[derive(Clone, Default)]
pub struct Region {
    rects: Vec<Rect>,
}

impl Region {
    /// Creates an empty region.
    #[must_use]
    pub const fn new() -> Self {
        Self { rects: Vec::new() }
    }

    /// Creates a region covering a single rectangle.
    #[must_use]
    pub fn from_rect(rect: Rect) -> Self {
        let mut region = Self::new();
        region.union_rect(rect);
        region
    }

    /// Creates a region covering the union of `rects`.
    #[must_use]
    pub fn from_rects(rects: impl IntoIterator<Item = Rect>) -> Self {
        let mut region = Self::new();
        for r in rects {
            region.union_rect(r);
        }
        region
    }

    /// Returns `true` if the region covers no pixels.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rects.is_empty()
    }

    /// Returns the disjoint rectangles making up the region.
    #[inline]
    #[must_use]
    pub fn rects(&self) -> &[Rect] {
        &self.rects
    }

    /// Returns the number of covered pixels.
    #[must_use]
    pub fn area(&self) -> u64 {
        self.rects.iter().map(Rect::area).sum()
    }

    /// Returns the bounding box, or [`Rect::ZERO`] if the region is empty.
    #[must_use]
    pub fn extents(&self) -> Rect {
        let mut it = self.rects.iter();
        let Some(first) = it.next() else {
            return Rect::ZERO;
        };
        let (x0, y0, x1, y1) = it.fold(
            (first.x, first.y, first.right(), first.bottom()),
            |(x0, y0, x1, y1), r| (x0.min(r.x), y0.min(r.y), x1.max(r.right()), y1.max(r.bottom())),
        );
        Rect::from_edges(x0, y0, x1, y1)
    }

    /// Returns `true` if the pixel at `(x, y)` is covered.
    #[must_use]
    pub fn contains_point(&self, x: i32, y: i32) -> bool {
        self.rects.iter().any(|r| r.contains_point(x, y))
    }

    /// Removes every rectangle.
    pub fn clear(&mut self) {
        self.rects.clear();
    }

    /// Replaces the contents with a copy of `other`, reusing the allocation.
    pub fn copy_from(&mut self, other: &Self) {
        self.rects.clear();
        self.rects.extend_from_slice(&other.rects);
    }

    /// Adds `rect` to the region.
    pub fn union_rect(&mut self, rect: Rect) {
        if rect.is_empty() || self.rects.iter().any(|r| r.contains_rect(&rect)) {
            return;
        }
        self.rects.retain(|r| !rect.contains_rect(r));

        let mut pieces = alloc::vec![rect];
        let mut scratch = Vec::new();
        for existing in &self.rects {
            scratch.clear();
            for piece in &pieces {
                piece.subtract_into(existing, &mut scratch);
            }
            core::mem::swap(&mut pieces, &mut scratch);
            if pieces.is_empty() {
                return;
            }
        }
        self.rects.extend(pieces);
    }

    /// Adds every pixel of `other` to the region.
    pub fn union(&mut self, other: &Self) {
        for r in &other.rects {
            self.union_rect(*r);
        }
    }

    /// Restricts the region to the pixels inside `rect`.
    pub fn intersect_rect(&mut self, rect: Rect) {
        self.rects = self
            .rects
            .iter()
            .filter_map(|r| r.intersect(&rect))
            .collect();
    }

    /// Restricts the region to the pixels also covered by `other`.
    pub fn intersect(&mut self, other: &Self) {
        // Pairwise overlaps of two disjoint sets are themselves disjoint.
        self.rects = self
            .rects
            .iter()
            .flat_map(|a| other.rects.iter().filter_map(|b| a.intersect(b)))
            .collect();
    }

    /// Removes the pixels inside `rect`.
    pub fn subtract_rect(&mut self, rect: Rect) {
        if rect.is_empty() {
            return;
        }
        let mut out = Vec::with_capacity(self.rects.len());
        for r in &self.rects {
            r.subtract_into(&rect, &mut out);
        }
        self.rects = out;
    }

    /// Removes the pixels covered by `other`.
    pub fn subtract(&mut self, other: &Self) {
        for r in &other.rects {
            self.subtract_rect(*r);
        }
    }

    /// Moves every rectangle by `(dx, dy)`.
    pub fn translate(&mut self, dx: i32, dy: i32) {
        for r in &mut self.rects {
            *r = r.translate(dx, dy);
        }
    }

    /// Returns `true` if every pixel of `self` is also in `other`.
    #[must_use]
    pub fn is_subset_of(&self, other: &Self) -> bool {
        let mut rest = self.clone();
        rest.subtract(other);
        rest.is_empty()
    }
}

impl From<Rect> for Region {
    fn from(rect: Rect) -> Self {
        Self::from_rect(rect)
    }
}

impl PartialEq for Region {
    fn eq(&self, other: &Self) -> bool {
        self.area() == other.area() && self.is_subset_of(other)
    }
}

impl Eq for Region {}

impl fmt::Debug for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.rects.iter()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_disjoint(region: &Region) {
        let rects = region.rects();
        for (i, a) in rects.iter().enumerate() {
            assert!(!a.is_empty(), "empty rect stored: {a:?}");
            for b in &rects[i + 1..] {
                assert!(a.intersect(b).is_none(), "{a:?} overlaps {b:?}");
            }
        }
    }

    #[test]
    fn rect_intersection() {
        let a = Rect::new(0, 0, 10, 10);
        let b = Rect::new(5, 5, 10, 10);
        assert_eq!(a.intersect(&b), Some(Rect::new(5, 5, 5, 5)));
        assert_eq!(a.intersect(&Rect::new(10, 0, 5, 5)), None);
    }

    #[test]
    fn everything_does_not_overflow() {
        let e = Rect::EVERYTHING;
        assert!(e.right() > 1 << 29);
        assert!(e.bottom() > 1 << 29);
        assert!(e.contains_rect(&Rect::new(-1000, -1000, 5000, 5000)));
    }

    #[test]
    fn union_of_overlapping_rects_is_normalized() {
        let mut region = Region::new();
        region.union_rect(Rect::new(0, 0, 10, 10));
        region.union_rect(Rect::new(5, 5, 10, 10));
        region.union_rect(Rect::new(2, 2, 3, 3));
        assert_disjoint(&region);
        assert_eq!(region.area(), 100 + 100 - 25);
        assert_eq!(region.extents(), Rect::new(0, 0, 15, 15));
    }

    #[test]
    fn union_swallows_contained_rects() {
        let mut region = Region::from_rects([Rect::new(1, 1, 2, 2), Rect::new(5, 5, 1, 1)]);
        region.union_rect(Rect::new(0, 0, 10, 10));
        assert_eq!(region.rects(), &[Rect::new(0, 0, 10, 10)]);
    }

    #[test]
    fn empty_rects_are_ignored() {
        let mut region = Region::new();
        region.union_rect(Rect::new(3, 3, 0, 10));
        region.union_rect(Rect::new(3, 3, 10, -1));
        assert!(region.is_empty());
    }

    #[test]
    fn intersect_regions() {
        let mut a = Region::from_rects([Rect::new(0, 0, 10, 10), Rect::new(20, 0, 10, 10)]);
        let b = Region::from_rect(Rect::new(5, 0, 20, 5));
        a.intersect(&b);
        assert_disjoint(&a);
        assert_eq!(
            a,
            Region::from_rects([Rect::new(5, 0, 5, 5), Rect::new(20, 0, 5, 5)])
        );
    }

    #[test]
    fn subtract_punches_hole() {
        let mut region = Region::from_rect(Rect::new(0, 0, 10, 10));
        region.subtract_rect(Rect::new(3, 3, 4, 4));
        assert_disjoint(&region);
        assert_eq!(region.area(), 84);
        assert!(!region.contains_point(4, 4));
        assert!(region.contains_point(0, 0));
        assert!(region.contains_point(9, 9));
    }

    #[test]
    fn equality_ignores_decomposition() {
        let split = Region::from_rects([Rect::new(0, 0, 5, 10), Rect::new(5, 0, 5, 10)]);
        let whole = Region::from_rect(Rect::new(0, 0, 10, 10));
        assert_eq!(split, whole);
        assert_ne!(split, Region::from_rect(Rect::new(0, 0, 10, 9)));
    }

    #[test]
    fn translate_moves_all_rects() {
        let mut region = Region::from_rect(Rect::new(0, 0, 4, 4));
        region.translate(10, -2);
        assert_eq!(region.extents(), Rect::new(10, -2, 4, 4));
    }

    #[test]
    fn subset_check() {
        let inner = Region::from_rect(Rect::new(2, 2, 2, 2));
        let outer = Region::from_rect(Rect::new(0, 0, 10, 10));
        assert!(inner.is_subset_of(&outer));
        assert!(!outer.is_subset_of(&inner));
        assert!(Region::new().is_subset_of(&inner));
    }
}
