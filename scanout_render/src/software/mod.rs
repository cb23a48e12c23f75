// Copyright 2026 the Scanout Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! CPU rasterizer.
//!
//! [`SoftwareRenderer`] draws into CPU-mappable buffers. Every pixel goes
//! through a premultiplied RGBA8 working representation, so any combination
//! of source and destination [`PixelFormat`] works.
//!
//! Textured draws take one of two paths:
//!
//! - **Copy**: no transform and no scaling. Texels are read at integer
//!   offsets, so the destination reproduces the source exactly.
//! - **Mapped**: every other case. Each destination pixel center inside the
//!   clipped destination box is mapped back through the inverse of
//!   [`transform::texture_to_dst`] and sampled with the requested filter.
//!   Pixels whose center maps outside the source rectangle are left alone.

mod composite;
pub mod transform;

use alloc::rc::Rc;
use core::fmt;

#[cfg(not(feature = "std"))]
use kurbo::common::FloatFuncs as _;

use scanout_core::buffer::{AccessFlags, Buffer, BufferAccess};
use scanout_core::format::PixelFormat;
use scanout_core::region::{Rect, Region};
use scanout_core::time::{Clock, HostTime};

use crate::pass::{
    BlendMode, PassOptions, PassStats, RectOptions, RenderError, RenderPass, RenderTimer,
    Renderer, TextureOptions,
};
use composite::{Image, apply_mask, blend};

/// A [`Renderer`] that rasterizes on the CPU.
pub struct SoftwareRenderer {
    formats: &'static [PixelFormat],
    clock: Option<Rc<dyn Clock>>,
}

impl fmt::Debug for SoftwareRenderer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SoftwareRenderer")
            .field("formats", &self.formats)
            .field("timed", &self.clock.is_some())
            .finish()
    }
}

impl Default for SoftwareRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl SoftwareRenderer {
    /// Creates a renderer for every [`PixelFormat`], without pass timing.
    #[must_use]
    pub fn new() -> Self {
        Self {
            formats: &PixelFormat::ALL,
            clock: None,
        }
    }

    /// Restricts the destination formats the renderer accepts.
    #[must_use]
    pub fn with_formats(mut self, formats: &'static [PixelFormat]) -> Self {
        self.formats = formats;
        self
    }

    /// Measures passes with `clock` and reports them to [`RenderTimer`]s.
    #[must_use]
    pub fn with_clock(mut self, clock: Rc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Destination formats this renderer accepts.
    #[must_use]
    pub fn formats(&self) -> &'static [PixelFormat] {
        self.formats
    }
}

impl Renderer for SoftwareRenderer {
    type Pass = SoftwarePass;

    fn begin_pass(
        &mut self,
        buffer: &Buffer,
        options: PassOptions,
    ) -> Result<SoftwarePass, RenderError> {
        if !self.formats.contains(&buffer.format()) {
            return Err(RenderError::FormatUnsupported);
        }
        let target = buffer
            .begin_access(AccessFlags::READ | AccessFlags::WRITE)
            .map_err(RenderError::DestinationAccess)?;
        let started = self.clock.as_ref().map(|c| c.now());
        tracing::debug!(
            buffer = buffer.id().get(),
            width = buffer.width(),
            height = buffer.height(),
            "software pass begin"
        );
        Ok(SoftwarePass {
            bounds: Rect::from_size(
                i32::try_from(buffer.width()).unwrap_or(i32::MAX),
                i32::try_from(buffer.height()).unwrap_or(i32::MAX),
            ),
            target,
            timer: options.timer,
            clock: self.clock.clone(),
            started,
            stats: PassStats::default(),
        })
    }
}

/// A pass of the [`SoftwareRenderer`].
///
/// Holds the destination locked for writing until it is submitted or
/// dropped.
pub struct SoftwarePass {
    target: BufferAccess,
    bounds: Rect,
    timer: Option<Rc<RenderTimer>>,
    clock: Option<Rc<dyn Clock>>,
    started: Option<HostTime>,
    stats: PassStats,
}

impl fmt::Debug for SoftwarePass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SoftwarePass")
            .field("target", &self.target)
            .field("bounds", &self.bounds)
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

impl SoftwarePass {
    /// The destination buffer.
    #[must_use]
    pub fn buffer(&self) -> &Buffer {
        self.target.buffer()
    }

    /// The pixels an operation may touch: its box within the buffer,
    /// limited by its clip.
    fn coverage(&self, dst_box: Rect, clip: Option<&Region>) -> Region {
        let Some(visible) = dst_box.intersect(&self.bounds) else {
            return Region::new();
        };
        let mut region = Region::from_rect(visible);
        if let Some(clip) = clip {
            region.intersect(clip);
        }
        region
    }

    fn skip(&mut self, reason: &'static str) {
        self.stats.skipped += 1;
        tracing::warn!(
            buffer = self.target.buffer().id().get(),
            reason,
            "skipping texture draw"
        );
    }
}

/// Rounds a float source box to whole texels inside the texture.
#[expect(
    clippy::cast_possible_truncation,
    reason = "the box is clamped to the texture size, which fits an i32"
)]
fn texel_box(src: kurbo::Rect, width: u32, height: u32) -> Option<Rect> {
    let tex = Rect::from_size(
        i32::try_from(width).unwrap_or(i32::MAX),
        i32::try_from(height).unwrap_or(i32::MAX),
    );
    let (w, h) = (f64::from(tex.width), f64::from(tex.height));
    let rounded = Rect::from_edges(
        src.x0.round().clamp(0.0, w) as i32,
        src.y0.round().clamp(0.0, h) as i32,
        src.x1.round().clamp(0.0, w) as i32,
        src.y1.round().clamp(0.0, h) as i32,
    );
    rounded.intersect(&tex)
}

/// Byte offset of pixel `(x, y)` in a tightly packed 32-bit image.
#[inline]
fn offset(x: i32, y: i32, stride: usize) -> usize {
    y as usize * stride + x as usize * 4
}

impl RenderPass for SoftwarePass {
    fn add_texture(&mut self, options: &TextureOptions<'_>) {
        let texture = options.texture;
        let Some(source) = texture.buffer() else {
            self.skip("texture has no CPU storage");
            return;
        };
        let access = match source.begin_access(AccessFlags::READ) {
            Ok(access) => access,
            Err(err) => {
                self.stats.skipped += 1;
                tracing::warn!(
                    buffer = self.target.buffer().id().get(),
                    texture = source.id().get(),
                    %err,
                    "skipping texture draw"
                );
                return;
            }
        };

        let dst_box = options.resolved_dst_box();
        let Some(src) = texel_box(options.resolved_src_box(), source.width(), source.height())
        else {
            tracing::trace!("texture draw with an empty source box");
            self.stats.ops += 1;
            return;
        };
        let region = self.coverage(dst_box, options.clip);
        self.stats.ops += 1;
        if region.is_empty() {
            return;
        }

        #[expect(
            clippy::cast_possible_truncation,
            reason = "alpha is clamped to [0, 1]"
        )]
        let mask = (options.resolved_alpha() * 255.0 + 0.5) as u8;
        let pixels = access.pixels();
        let image = Image {
            pixels: &pixels,
            stride: source.stride(),
            format: source.format(),
        };
        let format = self.target.buffer().format();
        let stride = self.target.buffer().stride();
        let mut dst = self.target.pixels_mut();
        let blend_mode = options.blend_mode;

        tracing::trace!(
            texture = source.id().get(),
            ?src,
            ?dst_box,
            transform = ?options.transform,
            "texture draw"
        );

        if transform::is_unscaled_identity(options.transform, src, dst_box) {
            let (dx, dy) = (src.x - dst_box.x, src.y - dst_box.y);
            for r in region.rects() {
                for y in r.y..r.bottom() {
                    for x in r.x..r.right() {
                        let s = apply_mask(image.texel(x + dx, y + dy), mask);
                        let o = offset(x, y, stride);
                        let px = &mut dst[o..o + 4];
                        let out = blend(s, format.read(px), blend_mode);
                        format.write(px, out);
                    }
                }
            }
            return;
        }

        let to_src = transform::texture_to_dst(options.transform, src, dst_box).inverse();
        for r in region.rects() {
            for y in r.y..r.bottom() {
                for x in r.x..r.right() {
                    let p = to_src * transform::pixel_center(x, y);
                    let Some(s) = image.sample(p.x, p.y, src, options.filter_mode) else {
                        continue;
                    };
                    let s = apply_mask(s, mask);
                    let o = offset(x, y, stride);
                    let px = &mut dst[o..o + 4];
                    let out = blend(s, format.read(px), blend_mode);
                    format.write(px, out);
                }
            }
        }
    }

    fn add_rect(&mut self, options: &RectOptions<'_>) {
        self.stats.ops += 1;
        let region = self.coverage(options.dst_box(), options.clip());
        tracing::trace!(dst_box = ?options.dst_box(), "rect fill");
        if region.is_empty() {
            return;
        }
        let color = options.color().to_rgba8();
        let blend_mode = if options.blend_mode() == BlendMode::Premultiplied && color[3] == 255 {
            BlendMode::None
        } else {
            options.blend_mode()
        };
        let format = self.target.buffer().format();
        let stride = self.target.buffer().stride();
        let mut dst = self.target.pixels_mut();
        for r in region.rects() {
            for y in r.y..r.bottom() {
                for x in r.x..r.right() {
                    let o = offset(x, y, stride);
                    let px = &mut dst[o..o + 4];
                    let out = blend(color, format.read(px), blend_mode);
                    format.write(px, out);
                }
            }
        }
    }

    fn stats(&self) -> PassStats {
        self.stats
    }

    fn submit(self) -> Result<(), RenderError> {
        let elapsed = match (&self.clock, self.started) {
            (Some(clock), Some(started)) => Some(clock.now().saturating_duration_since(started)),
            _ => None,
        };
        if let (Some(timer), Some(elapsed)) = (&self.timer, elapsed) {
            timer.record(elapsed);
        }
        tracing::debug!(
            buffer = self.target.buffer().id().get(),
            ops = self.stats.ops,
            skipped = self.stats.skipped,
            "software pass submit"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use alloc::vec::Vec;

    #[cfg(not(feature = "std"))]
    use kurbo::common::FloatFuncs as _;

    use scanout_core::time::{Duration, ManualClock};
    use scanout_core::transform::OutputTransform;

    use super::*;
    use crate::pass::{BufferTexture, Color, FilterMode};

    const RED: [u8; 4] = [255, 0, 0, 255];
    const BLUE: [u8; 4] = [0, 0, 255, 255];

    fn byte(v: i32) -> u8 {
        u8::try_from(v).expect("small coordinate")
    }

    /// A texture whose texel `(x, y)` encodes its own coordinates.
    fn coordinate_texture(width: i32, height: i32, format: PixelFormat) -> Buffer {
        let mut pixels = Vec::new();
        for y in 0..height {
            for x in 0..width {
                let mut px = [0; 4];
                format.write(&mut px, [byte(x), byte(y), 7, 255]);
                pixels.extend_from_slice(&px);
            }
        }
        Buffer::from_pixels(width.unsigned_abs(), height.unsigned_abs(), format, pixels)
    }

    fn read(buffer: &Buffer, x: i32, y: i32) -> [u8; 4] {
        let access = buffer.begin_access(AccessFlags::READ).expect("mappable");
        let o = offset(x, y, buffer.stride());
        buffer.format().read(&access.pixels()[o..o + 4])
    }

    fn fill(buffer: &Buffer, color: Color) {
        let mut pass = SoftwareRenderer::new()
            .begin_pass(buffer, PassOptions::default())
            .expect("destination is free");
        let w = i32::try_from(buffer.width()).expect("small");
        let h = i32::try_from(buffer.height()).expect("small");
        pass.add_rect(&RectOptions::new(Rect::new(0, 0, w, h), color).expect("non-empty"));
        pass.submit().expect("software submit");
    }

    #[test]
    fn identity_draw_copies_exactly() {
        let src = coordinate_texture(6, 4, PixelFormat::Argb8888);
        let dst = Buffer::new(6, 4, PixelFormat::Xbgr8888);
        let texture = BufferTexture::new(src.clone());

        let mut pass = SoftwareRenderer::new()
            .begin_pass(&dst, PassOptions::default())
            .expect("destination is free");
        pass.add_texture(&TextureOptions::new(&texture));
        assert_eq!(pass.stats(), PassStats { ops: 1, skipped: 0 });
        pass.submit().expect("software submit");

        for y in 0..4 {
            for x in 0..6 {
                assert_eq!(read(&dst, x, y), read(&src, x, y), "pixel ({x}, {y})");
            }
        }
    }

    #[test]
    fn identity_draw_with_offset_and_sub_rect() {
        let src = coordinate_texture(8, 8, PixelFormat::Abgr8888);
        let dst = Buffer::new(10, 10, PixelFormat::Argb8888);
        let texture = BufferTexture::new(src);

        let mut pass = SoftwareRenderer::new()
            .begin_pass(&dst, PassOptions::default())
            .expect("destination is free");
        pass.add_texture(
            &TextureOptions::new(&texture)
                .with_src_box(kurbo::Rect::new(2.0, 3.0, 5.0, 5.0))
                .with_dst_box(Rect::new(4, 1, 3, 2))
                .with_filter_mode(FilterMode::Nearest),
        );
        pass.submit().expect("software submit");

        assert_eq!(read(&dst, 4, 1), [2, 3, 7, 255]);
        assert_eq!(read(&dst, 6, 2), [4, 4, 7, 255]);
        assert_eq!(read(&dst, 3, 1), [0; 4], "left of the box");
        assert_eq!(read(&dst, 7, 1), [0; 4], "right of the box");
    }

    #[test]
    fn rotate90_full_buffer() {
        let (w, h) = (5_i32, 3_i32);
        // H wide, W tall; rotated it covers the W x H destination.
        let src = coordinate_texture(h, w, PixelFormat::Argb8888);
        let dst = Buffer::new(w.unsigned_abs(), h.unsigned_abs(), PixelFormat::Argb8888);
        let texture = BufferTexture::new(src);

        let mut pass = SoftwareRenderer::new()
            .begin_pass(&dst, PassOptions::default())
            .expect("destination is free");
        pass.add_texture(
            &TextureOptions::new(&texture)
                .with_transform(OutputTransform::Rotate90)
                .with_dst_box(Rect::new(0, 0, w, h))
                .with_filter_mode(FilterMode::Nearest),
        );
        pass.submit().expect("software submit");

        assert_eq!(read(&dst, w - 1, 0), [0, 0, 7, 255], "texel (0, 0)");
        for y in 0..h {
            for x in 0..w {
                let (sx, sy) = (y, w - 1 - x);
                assert_eq!(
                    read(&dst, x, y),
                    [byte(sx), byte(sy), 7, 255],
                    "destination ({x}, {y})"
                );
            }
        }
    }

    #[test]
    fn every_transform_lands_texels_where_expected() {
        // 4x3 texture; texels at destination (0, 0), (1, 0) and (0, 1).
        let cases: [(_, (i32, i32), _); 8] = [
            (OutputTransform::Normal, (4, 3), [(0, 0), (1, 0), (0, 1)]),
            (OutputTransform::Rotate90, (3, 4), [(0, 2), (0, 1), (1, 2)]),
            (OutputTransform::Rotate180, (4, 3), [(3, 2), (2, 2), (3, 1)]),
            (OutputTransform::Rotate270, (3, 4), [(3, 0), (3, 1), (2, 0)]),
            (OutputTransform::Flipped, (4, 3), [(3, 0), (2, 0), (3, 1)]),
            (OutputTransform::Flipped90, (3, 4), [(3, 2), (3, 1), (2, 2)]),
            (OutputTransform::Flipped180, (4, 3), [(0, 2), (1, 2), (0, 1)]),
            (OutputTransform::Flipped270, (3, 4), [(0, 0), (0, 1), (1, 0)]),
        ];
        let texture = BufferTexture::new(coordinate_texture(4, 3, PixelFormat::Argb8888));
        for (t, (w, h), expected) in cases {
            let dst = Buffer::new(w.unsigned_abs(), h.unsigned_abs(), PixelFormat::Argb8888);
            let mut pass = SoftwareRenderer::new()
                .begin_pass(&dst, PassOptions::default())
                .expect("destination is free");
            pass.add_texture(
                &TextureOptions::new(&texture)
                    .with_transform(t)
                    .with_dst_box(Rect::new(0, 0, w, h)),
            );
            pass.submit().expect("software submit");

            for ((x, y), (sx, sy)) in [(0, 0), (1, 0), (0, 1)].into_iter().zip(expected) {
                assert_eq!(
                    read(&dst, x, y),
                    [sx, sy, 7, 255],
                    "{t:?} at ({x}, {y})"
                );
            }
        }
    }

    #[test]
    fn scaled_draw_covers_dst_box() {
        let src = Buffer::new(2, 2, PixelFormat::Argb8888);
        fill(&src, Color::WHITE);
        let dst = Buffer::new(8, 8, PixelFormat::Argb8888);
        let texture = BufferTexture::new(src);

        let mut pass = SoftwareRenderer::new()
            .begin_pass(&dst, PassOptions::default())
            .expect("destination is free");
        pass.add_texture(&TextureOptions::new(&texture).with_dst_box(Rect::new(2, 2, 4, 4)));
        pass.submit().expect("software submit");

        let covered = (0..8)
            .flat_map(|y| (0..8).map(move |x| (x, y)))
            .filter(|&(x, y)| read(&dst, x, y) == [255; 4])
            .count();
        assert_eq!(covered, 16);
        assert_eq!(read(&dst, 2, 2), [255; 4]);
        assert_eq!(read(&dst, 5, 5), [255; 4]);
    }

    #[test]
    fn alpha_and_clip() {
        let src = Buffer::new(4, 1, PixelFormat::Argb8888);
        fill(&src, Color::new(1.0, 0.0, 0.0, 1.0));
        let dst = Buffer::new(4, 1, PixelFormat::Argb8888);
        fill(&dst, Color::new(0.0, 0.0, 1.0, 1.0));
        let texture = BufferTexture::new(src);
        let clip = Region::from_rect(Rect::new(0, 0, 2, 1));

        let mut pass = SoftwareRenderer::new()
            .begin_pass(&dst, PassOptions::default())
            .expect("destination is free");
        pass.add_texture(&TextureOptions::new(&texture).with_alpha(0.5).with_clip(&clip));
        pass.submit().expect("software submit");

        assert_eq!(read(&dst, 0, 0), [128, 0, 127, 255]);
        assert_eq!(read(&dst, 1, 0), [128, 0, 127, 255]);
        assert_eq!(read(&dst, 2, 0), BLUE, "outside the clip");
    }

    #[test]
    fn clip_does_not_leak_between_ops() {
        let dst = Buffer::new(4, 1, PixelFormat::Argb8888);
        let clip = Region::from_rect(Rect::new(0, 0, 1, 1));
        let mut pass = SoftwareRenderer::new()
            .begin_pass(&dst, PassOptions::default())
            .expect("destination is free");
        let full = Rect::new(0, 0, 4, 1);
        pass.add_rect(
            &RectOptions::new(full, Color::new(0.0, 0.0, 1.0, 1.0))
                .expect("non-empty")
                .with_clip(&clip),
        );
        pass.add_rect(
            &RectOptions::new(Rect::new(3, 0, 1, 1), Color::new(1.0, 0.0, 0.0, 1.0))
                .expect("non-empty"),
        );
        pass.submit().expect("software submit");

        assert_eq!(read(&dst, 0, 0), BLUE);
        assert_eq!(read(&dst, 1, 0), [0; 4]);
        assert_eq!(read(&dst, 3, 0), RED);
    }

    #[test]
    fn blend_none_replaces() {
        let dst = Buffer::new(1, 1, PixelFormat::Argb8888);
        fill(&dst, Color::WHITE);
        let mut pass = SoftwareRenderer::new()
            .begin_pass(&dst, PassOptions::default())
            .expect("destination is free");
        pass.add_rect(
            &RectOptions::new(Rect::new(0, 0, 1, 1), Color::new(0.0, 0.0, 0.0, 0.5))
                .expect("non-empty")
                .with_blend_mode(BlendMode::None),
        );
        pass.submit().expect("software submit");
        assert_eq!(read(&dst, 0, 0), [0, 0, 0, 128]);
    }

    #[test]
    fn unmappable_texture_is_skipped() {
        let dst = Buffer::new(2, 2, PixelFormat::Argb8888);
        let texture = BufferTexture::new(Buffer::new_unmappable(2, 2, PixelFormat::Argb8888));
        let mut pass = SoftwareRenderer::new()
            .begin_pass(&dst, PassOptions::default())
            .expect("destination is free");
        pass.add_texture(&TextureOptions::new(&texture));
        pass.add_rect(&RectOptions::new(Rect::new(0, 0, 1, 1), Color::WHITE).expect("non-empty"));
        assert_eq!(pass.stats(), PassStats { ops: 1, skipped: 1 });
        pass.submit().expect("pass continues after a skipped draw");
        assert_eq!(read(&dst, 0, 0), [255; 4]);
    }

    #[test]
    fn drawing_a_buffer_into_itself_is_skipped() {
        let dst = Buffer::new(2, 2, PixelFormat::Argb8888);
        let texture = BufferTexture::new(dst.clone());
        let mut pass = SoftwareRenderer::new()
            .begin_pass(&dst, PassOptions::default())
            .expect("destination is free");
        pass.add_texture(&TextureOptions::new(&texture));
        assert_eq!(pass.stats().skipped, 1, "destination is locked for writing");
    }

    #[test]
    fn destination_locked_for_pass_lifetime() {
        let dst = Buffer::new(2, 2, PixelFormat::Argb8888);
        let mut renderer = SoftwareRenderer::new();
        let pass = renderer
            .begin_pass(&dst, PassOptions::default())
            .expect("destination is free");
        assert!(dst.is_accessed());
        assert!(matches!(
            renderer.begin_pass(&dst, PassOptions::default()),
            Err(RenderError::DestinationAccess(_))
        ));
        drop(pass);
        assert!(!dst.is_accessed(), "dropping a pass releases the buffer");
        assert_eq!(dst.strong_count(), 1);
    }

    #[test]
    fn unsupported_format() {
        let dst = Buffer::new(1, 1, PixelFormat::Xrgb8888);
        let mut renderer = SoftwareRenderer::new().with_formats(&[PixelFormat::Argb8888]);
        assert!(matches!(
            renderer.begin_pass(&dst, PassOptions::default()),
            Err(RenderError::FormatUnsupported)
        ));
        assert!(!dst.is_accessed());
    }

    #[test]
    fn timer_receives_pass_duration() {
        let clock = Rc::new(ManualClock::new(HostTime(0)));
        let mut renderer = SoftwareRenderer::new().with_clock(clock.clone());
        let timer = Rc::new(RenderTimer::new());
        let dst = Buffer::new(1, 1, PixelFormat::Argb8888);

        let pass = renderer
            .begin_pass(
                &dst,
                PassOptions {
                    timer: Some(timer.clone()),
                },
            )
            .expect("destination is free");
        clock.advance(Duration::from_micros(250));
        pass.submit().expect("software submit");
        assert_eq!(timer.duration(), Some(Duration::from_micros(250)));
    }
}
