// Copyright 2026 the Scanout Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Geometry of a textured draw.
//!
//! A draw maps the integer source rectangle `src` of a texture onto the
//! destination box `dst`, rotated and mirrored by an [`OutputTransform`]. The
//! forward mapping from texel space to destination pixels is
//!
//! ```text
//!   translate(dst.x, dst.y)
//!     · scale(dst.w / tw, dst.h / th)
//!     · orientation(transform, src.w, src.h)
//!     · translate(-src.x, -src.y)
//! ```
//!
//! where `(tw, th)` is the transformed size of `src`. The orientation step is
//! [`OutputTransform::orientation`]: an optional mirror, an exact rotation
//! with cosine and sine in `{0, ±1}`, and the pivot translation that brings
//! the rotated rectangle back to the origin. No trigonometric rounding error
//! enters, so pixel centers land exactly on pixel centers when `dst` has the
//! transformed size of `src`.
//!
//! # Convention
//!
//! Coordinates are y-down and rotations turn content clockwise. For a
//! full-buffer [`OutputTransform::Rotate90`] draw of an `H × W` texture onto a
//! `W × H` destination, texel `(0, 0)` lands on destination pixel
//! `(W - 1, 0)`, and in general destination `(x, y)` shows texel
//! `(y, W - 1 - x)`.

use kurbo::{Affine, Point};

use scanout_core::region::Rect;
use scanout_core::transform::OutputTransform;

/// Returns the mapping from texel space to destination pixels.
#[must_use]
pub fn texture_to_dst(transform: OutputTransform, src: Rect, dst: Rect) -> Affine {
    let (tw, th) = transform.transform_size(src.width, src.height);
    let scale = Affine::scale_non_uniform(
        f64::from(dst.width) / f64::from(tw),
        f64::from(dst.height) / f64::from(th),
    );
    Affine::translate((f64::from(dst.x), f64::from(dst.y)))
        * scale
        * transform.orientation(f64::from(src.width), f64::from(src.height))
        * Affine::translate((-f64::from(src.x), -f64::from(src.y)))
}

/// Whether a draw is a plain copy: no transform and no scaling.
#[must_use]
pub fn is_unscaled_identity(transform: OutputTransform, src: Rect, dst: Rect) -> bool {
    transform == OutputTransform::Normal && src.width == dst.width && src.height == dst.height
}

/// Center of destination pixel `(x, y)`.
#[inline]
#[must_use]
pub fn pixel_center(x: i32, y: i32) -> Point {
    Point::new(f64::from(x) + 0.5, f64::from(y) + 0.5)
}
