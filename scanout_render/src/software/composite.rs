// Copyright 2026 the Scanout Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Pixel-level compositing and sampling on premultiplied RGBA8.

#[cfg(not(feature = "std"))]
use kurbo::common::FloatFuncs as _;

use scanout_core::format::PixelFormat;
use scanout_core::region::Rect;

use crate::pass::{BlendMode, FilterMode};

/// `a * b / 255`, correctly rounded.
#[inline]
#[expect(
    clippy::cast_possible_truncation,
    reason = "the product of two bytes divided by 255 fits a byte"
)]
pub(crate) fn mul_div_255(a: u8, b: u8) -> u8 {
    let t = u32::from(a) * u32::from(b) + 128;
    ((t + (t >> 8)) >> 8) as u8
}

/// Scales every channel of a premultiplied pixel by `mask / 255`.
#[inline]
pub(crate) fn apply_mask(px: [u8; 4], mask: u8) -> [u8; 4] {
    if mask == 255 {
        px
    } else {
        px.map(|c| mul_div_255(c, mask))
    }
}

/// Combines `src` with `dst`.
#[inline]
pub(crate) fn blend(src: [u8; 4], dst: [u8; 4], mode: BlendMode) -> [u8; 4] {
    match mode {
        BlendMode::None => src,
        BlendMode::Premultiplied => match src[3] {
            255 => src,
            0 => [
                dst[0].saturating_add(src[0]),
                dst[1].saturating_add(src[1]),
                dst[2].saturating_add(src[2]),
                dst[3],
            ],
            a => {
                let inv = 255 - a;
                [0, 1, 2, 3].map(|i| src[i].saturating_add(mul_div_255(dst[i], inv)))
            }
        },
    }
}

/// A read-only view of texture pixels.
pub(crate) struct Image<'a> {
    pub(crate) pixels: &'a [u8],
    pub(crate) stride: usize,
    pub(crate) format: PixelFormat,
}

impl Image<'_> {
    /// Reads texel `(x, y)`, which must be in bounds.
    #[inline]
    pub(crate) fn texel(&self, x: i32, y: i32) -> [u8; 4] {
        let offset = y as usize * self.stride + x as usize * self.format.bytes_per_pixel();
        self.format.read(&self.pixels[offset..])
    }

    /// Samples at texel-space point `(u, v)`, or `None` if the point lies
    /// outside `src`.
    #[expect(
        clippy::cast_possible_truncation,
        reason = "coordinates are floored inside an i32 rectangle"
    )]
    pub(crate) fn sample(&self, u: f64, v: f64, src: Rect, filter: FilterMode) -> Option<[u8; 4]> {
        if u < f64::from(src.x)
            || v < f64::from(src.y)
            || u >= f64::from(src.right())
            || v >= f64::from(src.bottom())
        {
            return None;
        }
        match filter {
            FilterMode::Nearest => Some(self.texel(u.floor() as i32, v.floor() as i32)),
            FilterMode::Bilinear => {
                let x = u - 0.5;
                let y = v - 0.5;
                let x0 = x.floor();
                let y0 = y.floor();
                let fx = x - x0;
                let fy = y - y0;
                let clamp_x = |x: f64| (x as i32).clamp(src.x, src.right() - 1);
                let clamp_y = |y: f64| (y as i32).clamp(src.y, src.bottom() - 1);
                let (xa, xb) = (clamp_x(x0), clamp_x(x0 + 1.0));
                let (ya, yb) = (clamp_y(y0), clamp_y(y0 + 1.0));
                Some(bilerp(
                    [
                        self.texel(xa, ya),
                        self.texel(xb, ya),
                        self.texel(xa, yb),
                        self.texel(xb, yb),
                    ],
                    fx,
                    fy,
                ))
            }
        }
    }
}

/// Interpolates four premultiplied texels (top-left, top-right,
/// bottom-left, bottom-right).
#[expect(
    clippy::cast_possible_truncation,
    reason = "the weighted mean of bytes stays within [0, 255]"
)]
fn bilerp(t: [[u8; 4]; 4], fx: f64, fy: f64) -> [u8; 4] {
    let w = [
        (1.0 - fx) * (1.0 - fy),
        fx * (1.0 - fy),
        (1.0 - fx) * fy,
        fx * fy,
    ];
    [0, 1, 2, 3].map(|c| {
        let v = t
            .iter()
            .zip(w)
            .map(|(px, w)| f64::from(px[c]) * w)
            .sum::<f64>();
        (v + 0.5).floor().clamp(0.0, 255.0) as u8
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mul_div_255_rounds() {
        assert_eq!(mul_div_255(255, 255), 255);
        assert_eq!(mul_div_255(255, 0), 0);
        assert_eq!(mul_div_255(128, 255), 128);
        assert_eq!(mul_div_255(255, 128), 128);
        assert_eq!(mul_div_255(100, 128), 50);
    }

    #[test]
    fn source_over() {
        let dst = [0, 0, 200, 255];
        assert_eq!(blend([10, 20, 30, 255], dst, BlendMode::Premultiplied), [10, 20, 30, 255]);
        assert_eq!(blend([0, 0, 0, 0], dst, BlendMode::Premultiplied), dst);
        // Half-transparent red over opaque blue.
        assert_eq!(
            blend([128, 0, 0, 128], dst, BlendMode::Premultiplied),
            [128, 0, 100, 255]
        );
        assert_eq!(blend([0, 0, 0, 0], dst, BlendMode::None), [0, 0, 0, 0]);
    }

    #[test]
    fn mask_scales_all_channels() {
        assert_eq!(apply_mask([255, 128, 0, 255], 128), [128, 64, 0, 128]);
        assert_eq!(apply_mask([1, 2, 3, 4], 255), [1, 2, 3, 4]);
    }

    fn checker() -> ([u8; 16], Rect) {
        // 2x2 Abgr8888: black, white / white, black.
        let mut px = [0_u8; 16];
        for (i, v) in [0_u8, 255, 255, 0].into_iter().enumerate() {
            PixelFormat::Abgr8888.write(&mut px[i * 4..], [v, v, v, 255]);
        }
        (px, Rect::new(0, 0, 2, 2))
    }

    #[test]
    fn nearest_and_bilinear_sampling() {
        let (px, src) = checker();
        let img = Image {
            pixels: &px,
            stride: 8,
            format: PixelFormat::Abgr8888,
        };
        assert_eq!(img.sample(1.5, 0.5, src, FilterMode::Nearest), Some([255, 255, 255, 255]));
        assert_eq!(img.sample(2.0, 0.5, src, FilterMode::Nearest), None, "outside");

        // Texel centers are exact.
        assert_eq!(img.sample(0.5, 0.5, src, FilterMode::Bilinear), Some([0, 0, 0, 255]));
        // The middle blends all four texels equally.
        assert_eq!(img.sample(1.0, 1.0, src, FilterMode::Bilinear), Some([128, 128, 128, 255]));
        // Edges clamp instead of reading past the rectangle.
        assert_eq!(img.sample(0.1, 0.5, src, FilterMode::Bilinear), Some([0, 0, 0, 255]));
    }
}
