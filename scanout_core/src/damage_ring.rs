// Copyright 2026 the Scanout Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Damage history for buffer reuse.
//!
//! A [`DamageRing`] answers "which pixels must be redrawn on this back buffer?"
//! When a compositor recycles back buffers (double or triple buffering), a
//! buffer that was last rendered `age` frames ago is missing exactly the
//! damage of the frames in between.
//!
//! Two ways of asking are supported:
//!
//! - **By age**: [`get_buffer_damage`](DamageRing::get_buffer_damage) with
//!   the buffer age reported by the swapchain, using the last
//!   [`DAMAGE_RING_PREVIOUS_LEN`] rotated regions.
//! - **By buffer**: [`rotate_buffer`](DamageRing::rotate_buffer) keeps one
//!   entry per buffer and works even when buffers come back out of order.
//!
//! Entries hold a [`WeakBuffer`]; destroyed buffers are detected and dropped
//! the next time the ring looks at its entries.
//!
//! # Frame order
//!
//! ```text
//!   add / add_box / add_whole   (scene changes this frame)
//!           │
//!           ▼
//!   get_buffer_damage(age)  or  rotate_buffer(buffer)
//!           │
//!           ▼
//!   render + present ──(failure)──► add_whole()
//!           │
//!           ▼
//!   rotate()   (skip when rotate_buffer already rotated)
//! ```

use hashbrown::HashMap;

use crate::buffer::{Buffer, BufferId, WeakBuffer};
use crate::region::{Rect, Region};

/// Number of previous frames whose damage is remembered.
///
/// Two frames of history cover triple-buffered presentation.
pub const DAMAGE_RING_PREVIOUS_LEN: usize = 2;

#[derive(Debug)]
struct DamageRingEntry {
    buffer: WeakBuffer,
    /// Damage accumulated since this buffer was last the render target.
    damage: Region,
}

/// Tracks damage across a bounded history of frames.
#[derive(Debug)]
pub struct DamageRing {
    width: i32,
    height: i32,
    current: Region,
    /// Rotated regions, newest first.
    previous: [Region; DAMAGE_RING_PREVIOUS_LEN],
    buffers: HashMap<BufferId, DamageRingEntry>,
}

impl Default for DamageRing {
    fn default() -> Self {
        Self::new()
    }
}

impl DamageRing {
    /// Creates an unbounded ring with no damage.
    #[must_use]
    pub fn new() -> Self {
        Self {
            width: 0,
            height: 0,
            current: Region::new(),
            previous: [Region::new(), Region::new()],
            buffers: HashMap::new(),
        }
    }

    /// Creates a ring bounded to `width × height` with no pending damage.
    ///
    /// Buffers without history still get full damage, so starting clean is
    /// safe.
    #[must_use]
    pub fn with_bounds(width: i32, height: i32) -> Self {
        let mut ring = Self::new();
        if width > 0 && height > 0 {
            ring.width = width;
            ring.height = height;
        }
        ring
    }

    /// Returns the bounds, or `None` if the ring is unbounded.
    #[must_use]
    pub fn bounds(&self) -> Option<Rect> {
        (self.width > 0 && self.height > 0).then(|| Rect::from_size(self.width, self.height))
    }

    /// Returns the damage accumulated since the last rotation.
    #[must_use]
    pub fn current(&self) -> &Region {
        &self.current
    }

    /// Returns the rotated regions, newest first.
    #[must_use]
    pub fn history(&self) -> &[Region] {
        &self.previous
    }

    /// Returns the number of buffers with a live entry.
    #[must_use]
    pub fn tracked_buffers(&self) -> usize {
        self.buffers
            .values()
            .filter(|e| !e.buffer.is_destroyed())
            .count()
    }

    /// The area "everything" stands for: the bounds, or [`Rect::EVERYTHING`].
    fn whole(&self) -> Rect {
        self.bounds().unwrap_or(Rect::EVERYTHING)
    }

    /// Replaces the bounds. A zero dimension makes the ring unbounded.
    ///
    /// Changing the bounds invalidates every buffer's contents, so the ring
    /// becomes fully damaged. Setting the current bounds again does nothing.
    pub fn set_bounds(&mut self, width: i32, height: i32) {
        let (width, height) = if width <= 0 || height <= 0 {
            (0, 0)
        } else {
            (width, height)
        };
        if (self.width, self.height) == (width, height) {
            return;
        }
        tracing::debug!(width, height, "damage ring bounds changed");
        self.width = width;
        self.height = height;
        self.add_whole();
    }

    /// Adds `region` (clipped to the bounds) to the current damage.
    ///
    /// Returns `false` if nothing was added because the region is empty or
    /// lies entirely outside the bounds.
    pub fn add(&mut self, region: &Region) -> bool {
        let mut clipped = region.clone();
        if let Some(bounds) = self.bounds() {
            clipped.intersect_rect(bounds);
        }
        if clipped.is_empty() {
            return false;
        }
        self.current.union(&clipped);
        true
    }

    /// Adds `rect` (clipped to the bounds) to the current damage.
    ///
    /// Returns `false` if nothing was added.
    pub fn add_box(&mut self, rect: Rect) -> bool {
        let clipped = match self.bounds() {
            Some(bounds) => rect.intersect(&bounds),
            None => (!rect.is_empty()).then_some(rect),
        };
        match clipped {
            Some(r) => {
                self.current.union_rect(r);
                true
            }
            None => false,
        }
    }

    /// Damages everything inside the bounds.
    pub fn add_whole(&mut self) {
        let whole = self.whole();
        self.current.clear();
        self.current.union_rect(whole);
    }

    /// Pushes the current damage into the history and clears it.
    ///
    /// Call once per frame after the damage has been consumed. An empty
    /// current region still rotates, shifting the history.
    pub fn rotate(&mut self) {
        self.previous.rotate_right(1);
        self.previous[0].copy_from(&self.current);
        self.current.clear();
    }

    /// Computes the damage of a buffer last rendered `age` frames ago.
    ///
    /// Ages outside `1..=DAMAGE_RING_PREVIOUS_LEN` (0 for a fresh buffer, or
    /// older than the history) produce full damage. Otherwise `out` is the
    /// current damage plus the `age` newest rotated regions.
    pub fn get_buffer_damage(&self, age: u32, out: &mut Region) {
        out.clear();
        let age = age as usize;
        if !(1..=DAMAGE_RING_PREVIOUS_LEN).contains(&age) {
            out.union_rect(self.whole());
            return;
        }
        out.copy_from(&self.current);
        for region in &self.previous[..age] {
            out.union(region);
        }
    }

    /// Computes the damage for rendering into `buffer`, then rotates.
    ///
    /// The ring keeps one entry per buffer, so this stays correct when
    /// buffers are recycled out of order. A buffer seen for the first time
    /// gets full damage. Entries of destroyed buffers are dropped here.
    ///
    /// The ring has advanced once this returns; if rendering or presenting
    /// the buffer fails, call [`add_whole`](Self::add_whole) so the next frame
    /// redraws everything.
    pub fn rotate_buffer(&mut self, buffer: &Buffer, out: &mut Region) {
        self.buffers.retain(|_, e| !e.buffer.is_destroyed());

        out.clear();
        let id = buffer.id();
        match self.buffers.get_mut(&id) {
            Some(entry) => {
                out.copy_from(&entry.damage);
                out.union(&self.current);
                entry.damage.clear();
            }
            None => {
                out.union_rect(self.whole());
                self.buffers.insert(
                    id,
                    DamageRingEntry {
                        buffer: buffer.downgrade(),
                        damage: Region::new(),
                    },
                );
            }
        }

        for (other, entry) in &mut self.buffers {
            if *other != id {
                entry.damage.union(&self.current);
            }
        }

        self.rotate();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::PixelFormat;

    fn full(ring: &DamageRing) -> Region {
        Region::from_rect(ring.whole())
    }

    fn damage_for(ring: &DamageRing, age: u32) -> Region {
        let mut out = Region::new();
        ring.get_buffer_damage(age, &mut out);
        out
    }

    #[test]
    fn add_box_clips_to_bounds() {
        let mut ring = DamageRing::with_bounds(800, 600);
        assert!(ring.add_box(Rect::new(0, 0, 100, 100)));
        assert!(!ring.add_box(Rect::new(1000, 0, 50, 50)), "outside bounds");
        assert_eq!(
            ring.current(),
            &Region::from_rect(Rect::new(0, 0, 100, 100))
        );

        assert!(ring.add_box(Rect::new(750, 550, 100, 100)));
        assert!(ring.current().contains_point(799, 599));
        assert!(!ring.current().contains_point(800, 600));
    }

    #[test]
    fn add_region_clips_to_bounds() {
        let mut ring = DamageRing::with_bounds(100, 100);
        let region = Region::from_rects([Rect::new(-10, -10, 20, 20), Rect::new(200, 0, 5, 5)]);
        assert!(ring.add(&region));
        assert_eq!(ring.current(), &Region::from_rect(Rect::new(0, 0, 10, 10)));
        assert!(!ring.add(&Region::from_rect(Rect::new(200, 200, 5, 5))));
        assert!(!ring.add(&Region::new()), "empty input adds nothing");
    }

    #[test]
    fn unbounded_ring_accepts_anything() {
        let mut ring = DamageRing::new();
        assert!(ring.add_box(Rect::new(-5000, 10_000, 3, 3)));
        ring.add_whole();
        assert_eq!(ring.current(), &Region::from_rect(Rect::EVERYTHING));
    }

    #[test]
    fn history_ages() {
        let mut ring = DamageRing::with_bounds(800, 600);
        let a = Rect::new(10, 10, 20, 20);
        let b = Rect::new(300, 300, 40, 40);

        ring.add_whole();
        ring.rotate();
        ring.add_box(a);
        ring.rotate();
        ring.add_box(b);
        ring.rotate();

        assert_eq!(damage_for(&ring, 1), Region::from_rect(b));
        assert_eq!(damage_for(&ring, 2), Region::from_rects([a, b]));
        assert_eq!(damage_for(&ring, 3), full(&ring), "beyond history");
        assert_eq!(damage_for(&ring, 0), full(&ring), "unknown age");
    }

    #[test]
    fn buffer_damage_includes_pending() {
        let mut ring = DamageRing::with_bounds(100, 100);
        ring.add_box(Rect::new(0, 0, 10, 10));
        ring.rotate();
        ring.add_box(Rect::new(50, 50, 10, 10));
        assert_eq!(
            damage_for(&ring, 1),
            Region::from_rects([Rect::new(0, 0, 10, 10), Rect::new(50, 50, 10, 10)])
        );
    }

    #[test]
    fn empty_rotation_shifts_history() {
        let mut ring = DamageRing::with_bounds(100, 100);
        ring.add_box(Rect::new(0, 0, 10, 10));
        ring.rotate();
        ring.rotate();
        assert!(damage_for(&ring, 1).is_empty());
        assert_eq!(
            damage_for(&ring, 2),
            Region::from_rect(Rect::new(0, 0, 10, 10))
        );
        ring.rotate();
        assert!(damage_for(&ring, 2).is_empty(), "oldest slot evicted");
    }

    #[test]
    fn set_bounds_damages_everything() {
        let mut ring = DamageRing::with_bounds(100, 100);
        ring.set_bounds(100, 100);
        assert!(ring.current().is_empty(), "same bounds is a no-op");

        ring.set_bounds(200, 50);
        assert_eq!(ring.current(), &Region::from_rect(Rect::new(0, 0, 200, 50)));

        ring.set_bounds(0, 50);
        assert_eq!(ring.bounds(), None);
        assert_eq!(ring.current(), &Region::from_rect(Rect::EVERYTHING));
    }

    #[test]
    fn rotate_buffer_first_use_is_full() {
        let mut ring = DamageRing::with_bounds(64, 64);
        let buf = Buffer::new(64, 64, PixelFormat::Argb8888);
        let mut out = Region::new();
        ring.rotate_buffer(&buf, &mut out);
        assert_eq!(out, Region::from_rect(Rect::new(0, 0, 64, 64)));
        assert_eq!(ring.tracked_buffers(), 1);
    }

    #[test]
    fn rotate_buffer_out_of_order() {
        let mut ring = DamageRing::with_bounds(100, 100);
        let bufs = [
            Buffer::new(100, 100, PixelFormat::Argb8888),
            Buffer::new(100, 100, PixelFormat::Argb8888),
            Buffer::new(100, 100, PixelFormat::Argb8888),
        ];
        let mut out = Region::new();
        for b in &bufs {
            ring.rotate_buffer(b, &mut out);
        }

        let a = Rect::new(0, 0, 10, 10);
        let b = Rect::new(20, 20, 10, 10);
        let c = Rect::new(40, 40, 10, 10);

        ring.add_box(a);
        ring.rotate_buffer(&bufs[0], &mut out);
        assert_eq!(out, Region::from_rect(a));

        ring.add_box(b);
        ring.rotate_buffer(&bufs[0], &mut out);
        assert_eq!(out, Region::from_rect(b), "same buffer again");

        ring.add_box(c);
        ring.rotate_buffer(&bufs[2], &mut out);
        assert_eq!(out, Region::from_rects([a, b, c]));

        ring.rotate_buffer(&bufs[1], &mut out);
        assert_eq!(out, Region::from_rects([a, b, c]));

        ring.rotate_buffer(&bufs[0], &mut out);
        assert_eq!(out, Region::from_rect(c));
    }

    #[test]
    fn destroyed_buffers_are_forgotten() {
        let mut ring = DamageRing::with_bounds(10, 10);
        let mut out = Region::new();
        let keep = Buffer::new(10, 10, PixelFormat::Argb8888);
        {
            let gone = Buffer::new(10, 10, PixelFormat::Argb8888);
            ring.rotate_buffer(&gone, &mut out);
            ring.rotate_buffer(&keep, &mut out);
            assert_eq!(ring.tracked_buffers(), 2);
        }
        assert_eq!(ring.tracked_buffers(), 1);
        ring.rotate_buffer(&keep, &mut out);
        assert!(out.is_empty());
        assert_eq!(ring.buffers.len(), 1, "stale entry removed");
    }
}
