// Copyright 2026 the Scanout Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Output transforms: the eight rotation/mirror variants.
//!
//! The numeric values match `wl_output.transform`, so backends, protocol
//! bindings and scene code can exchange them bit-for-bit.
//!
//! # Geometry convention
//!
//! A transform is a horizontal mirror (for the flipped variants) followed by
//! a rotation in 90-degree steps. Coordinates are y-down, so a positive
//! rotation turns content clockwise on screen: under [`OutputTransform::Rotate90`]
//! the top-left pixel of a `w × h` image lands in the top-right corner of the
//! resulting `h × w` image.
//!
//! [`OutputTransform::orientation`] builds the matching [`Affine`] from exact
//! integer coefficients; the cosine and sine of a quarter turn are always
//! `0` or `±1`, so no trigonometric rounding error enters the pipeline.

use kurbo::Affine;
#[cfg(not(feature = "std"))]
use kurbo::common::FloatFuncs as _;

use crate::region::Rect;

/// One of the eight output transforms.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum OutputTransform {
    /// No transform.
    #[default]
    Normal = 0,
    /// Rotated by 90 degrees.
    Rotate90 = 1,
    /// Rotated by 180 degrees.
    Rotate180 = 2,
    /// Rotated by 270 degrees.
    Rotate270 = 3,
    /// Mirrored around the vertical axis.
    Flipped = 4,
    /// Mirrored, then rotated by 90 degrees.
    Flipped90 = 5,
    /// Mirrored, then rotated by 180 degrees.
    Flipped180 = 6,
    /// Mirrored, then rotated by 270 degrees.
    Flipped270 = 7,
}

const FLIPPED_BIT: u32 = 4;
const ROTATION_MASK: u32 = 3;

impl OutputTransform {
    /// All eight transforms in numeric order.
    pub const ALL: [Self; 8] = [
        Self::Normal,
        Self::Rotate90,
        Self::Rotate180,
        Self::Rotate270,
        Self::Flipped,
        Self::Flipped90,
        Self::Flipped180,
        Self::Flipped270,
    ];

    /// Converts from the wire value.
    #[must_use]
    pub const fn from_raw(raw: u32) -> Option<Self> {
        if raw < 8 {
            Some(Self::ALL[raw as usize])
        } else {
            None
        }
    }

    /// Returns the wire value.
    #[inline]
    #[must_use]
    pub const fn raw(self) -> u32 {
        self as u32
    }

    /// Whether this is one of the mirrored variants.
    #[inline]
    #[must_use]
    pub const fn is_flipped(self) -> bool {
        self.raw() & FLIPPED_BIT != 0
    }

    /// Number of clockwise quarter turns (0–3) applied after the mirror.
    #[inline]
    #[must_use]
    pub const fn quarter_turns(self) -> u32 {
        self.raw() & ROTATION_MASK
    }

    /// Whether the transform swaps width and height.
    #[inline]
    #[must_use]
    pub const fn swaps_axes(self) -> bool {
        self.quarter_turns() % 2 == 1
    }

    /// Returns the transform that undoes this one.
    #[must_use]
    pub const fn invert(self) -> Self {
        let raw = self.raw();
        if !self.is_flipped() && self.swaps_axes() {
            Self::ALL[(raw ^ 2) as usize]
        } else {
            self
        }
    }

    /// Returns the transform equivalent to applying `self` and then `next`.
    #[must_use]
    pub const fn compose(self, next: Self) -> Self {
        let flipped = (self.raw() ^ next.raw()) & FLIPPED_BIT;
        // A rotation followed by a mirror equals the mirror followed by the
        // opposite rotation.
        let rotation = if next.is_flipped() {
            next.quarter_turns().wrapping_sub(self.quarter_turns()) & ROTATION_MASK
        } else {
            (next.quarter_turns() + self.quarter_turns()) & ROTATION_MASK
        };
        Self::ALL[(flipped | rotation) as usize]
    }

    /// Returns the size of a `width × height` image after the transform.
    #[must_use]
    pub const fn transform_size(self, width: i32, height: i32) -> (i32, i32) {
        if self.swaps_axes() {
            (height, width)
        } else {
            (width, height)
        }
    }

    /// Exact `(cos, sin)` of the rotation part.
    #[must_use]
    pub const fn cos_sin(self) -> (f64, f64) {
        match self.quarter_turns() {
            0 => (1.0, 0.0),
            1 => (0.0, 1.0),
            2 => (-1.0, 0.0),
            _ => (0.0, -1.0),
        }
    }

    /// Maps points of a `width × height` image to the transformed image.
    ///
    /// The result is the composition of the mirror (which keeps the image in
    /// `[0, width]`), the exact rotation about the origin, and the pivot
    /// translation that moves the rotated image back to the positive
    /// quadrant. The pivot comes from `height` for 90°, from `width` for 270°,
    /// and from both for 180°.
    #[must_use]
    pub fn orientation(self, width: f64, height: f64) -> Affine {
        let mirror = if self.is_flipped() {
            Affine::new([-1.0, 0.0, 0.0, 1.0, width, 0.0])
        } else {
            Affine::IDENTITY
        };
        let (cos, sin) = self.cos_sin();
        let rotate = Affine::new([cos, sin, -sin, cos, 0.0, 0.0]);
        let pivot = match self.quarter_turns() {
            0 => (0.0, 0.0),
            1 => (height, 0.0),
            2 => (width, height),
            _ => (0.0, width),
        };
        Affine::translate(pivot) * rotate * mirror
    }

    /// Maps a rectangle inside a `width × height` area into the transformed
    /// area.
    #[must_use]
    #[expect(
        clippy::cast_possible_truncation,
        reason = "orientation has integer coefficients, so the corners are exact integers"
    )]
    pub fn transform_rect(self, rect: Rect, width: i32, height: i32) -> Rect {
        if self == Self::Normal {
            return rect;
        }
        let bbox = self
            .orientation(f64::from(width), f64::from(height))
            .transform_rect_bbox(rect.to_kurbo());
        Rect::from_edges(
            bbox.x0.round() as i32,
            bbox.y0.round() as i32,
            bbox.x1.round() as i32,
            bbox.y1.round() as i32,
        )
    }
}
