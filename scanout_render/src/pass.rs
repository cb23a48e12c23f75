// Copyright 2026 the Scanout Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Render passes: draw operations recorded into one destination buffer.
//!
//! A [`Renderer`] opens a [`RenderPass`] on a destination [`Buffer`]. The
//! pass keeps the buffer locked for writing until [`RenderPass::submit`]
//! consumes it, so a submitted pass can never be drawn into again. Dropping a
//! pass without submitting releases the buffer as well.
//!
//! Draw operations apply in call order. Each carries its own clip; nothing
//! leaks from one operation to the next.

use alloc::rc::Rc;
use core::cell::Cell;
use core::fmt;

use scanout_core::buffer::{Buffer, BufferError};
use scanout_core::region::{Rect, Region};
use scanout_core::time::Duration;
use scanout_core::transform::OutputTransform;

/// A premultiplied RGBA color with `f32` channels in `[0, 1]`.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Color {
    /// Red, premultiplied.
    pub r: f32,
    /// Green, premultiplied.
    pub g: f32,
    /// Blue, premultiplied.
    pub b: f32,
    /// Alpha.
    pub a: f32,
}

impl Color {
    /// Fully transparent.
    pub const TRANSPARENT: Self = Self::new(0.0, 0.0, 0.0, 0.0);
    /// Opaque black.
    pub const BLACK: Self = Self::new(0.0, 0.0, 0.0, 1.0);
    /// Opaque white.
    pub const WHITE: Self = Self::new(1.0, 1.0, 1.0, 1.0);

    /// Creates a color from premultiplied channels.
    #[must_use]
    pub const fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    /// Quantizes to premultiplied 8-bit `[r, g, b, a]`.
    #[must_use]
    #[expect(
        clippy::cast_possible_truncation,
        reason = "channels are clamped to [0, 255] before the cast"
    )]
    pub fn to_rgba8(self) -> [u8; 4] {
        [self.r, self.g, self.b, self.a].map(|c| (c.clamp(0.0, 1.0) * 255.0 + 0.5) as u8)
    }
}

/// How a draw operation combines with the destination.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum BlendMode {
    /// Premultiplied source-over.
    #[default]
    Premultiplied,
    /// Replace the destination.
    None,
}

/// How textures are sampled.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum FilterMode {
    /// Interpolate between the four nearest texels.
    #[default]
    Bilinear,
    /// Take the nearest texel.
    Nearest,
}

/// Errors from opening or submitting a render pass.
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
pub enum RenderError {
    /// The destination buffer could not be locked for writing.
    #[error("destination buffer is not accessible: {0}")]
    DestinationAccess(#[source] BufferError),
    /// The renderer cannot draw into the destination's pixel format.
    #[error("destination pixel format is not supported by this renderer")]
    FormatUnsupported,
}

/// Something a render pass can sample from.
pub trait Texture: fmt::Debug {
    /// Width in pixels.
    fn width(&self) -> u32;

    /// Height in pixels.
    fn height(&self) -> u32;

    /// CPU-mappable storage backing the texture, if there is any.
    fn buffer(&self) -> Option<&Buffer>;
}

/// A texture that samples straight from a [`Buffer`].
#[derive(Clone, Debug)]
pub struct BufferTexture {
    buffer: Buffer,
}

impl BufferTexture {
    /// Wraps `buffer`, keeping a strong reference.
    #[must_use]
    pub fn new(buffer: Buffer) -> Self {
        Self { buffer }
    }
}

impl Texture for BufferTexture {
    fn width(&self) -> u32 {
        self.buffer.width()
    }

    fn height(&self) -> u32 {
        self.buffer.height()
    }

    fn buffer(&self) -> Option<&Buffer> {
        Some(&self.buffer)
    }
}

/// A textured draw.
///
/// Empty boxes mean "default": the whole texture for
/// [`src_box`](Self::src_box), and the texture's size at the destination
/// origin for a zero-sized [`dst_box`](Self::dst_box).
#[derive(Clone, Copy, Debug)]
pub struct TextureOptions<'a> {
    /// The texture to draw.
    pub texture: &'a dyn Texture,
    /// Region of the texture to sample, in texels.
    pub src_box: kurbo::Rect,
    /// Where the sampled region lands in the destination.
    pub dst_box: Rect,
    /// Opacity in `[0, 1]`; `None` is opaque.
    pub alpha: Option<f32>,
    /// Limits the draw to this destination region.
    pub clip: Option<&'a Region>,
    /// Rotation and mirroring applied to the sampled region.
    pub transform: OutputTransform,
    /// Sampling filter.
    pub filter_mode: FilterMode,
    /// Compositing mode.
    pub blend_mode: BlendMode,
}

impl<'a> TextureOptions<'a> {
    /// Draws all of `texture` at the destination origin.
    #[must_use]
    pub fn new(texture: &'a dyn Texture) -> Self {
        Self {
            texture,
            src_box: kurbo::Rect::ZERO,
            dst_box: Rect::ZERO,
            alpha: None,
            clip: None,
            transform: OutputTransform::Normal,
            filter_mode: FilterMode::Bilinear,
            blend_mode: BlendMode::Premultiplied,
        }
    }

    /// Sets the source box.
    #[must_use]
    pub fn with_src_box(mut self, src_box: kurbo::Rect) -> Self {
        self.src_box = src_box;
        self
    }

    /// Sets the destination box.
    #[must_use]
    pub fn with_dst_box(mut self, dst_box: Rect) -> Self {
        self.dst_box = dst_box;
        self
    }

    /// Sets the opacity.
    #[must_use]
    pub fn with_alpha(mut self, alpha: f32) -> Self {
        self.alpha = Some(alpha);
        self
    }

    /// Sets the clip region.
    #[must_use]
    pub fn with_clip(mut self, clip: &'a Region) -> Self {
        self.clip = Some(clip);
        self
    }

    /// Sets the transform.
    #[must_use]
    pub fn with_transform(mut self, transform: OutputTransform) -> Self {
        self.transform = transform;
        self
    }

    /// Sets the sampling filter.
    #[must_use]
    pub fn with_filter_mode(mut self, filter_mode: FilterMode) -> Self {
        self.filter_mode = filter_mode;
        self
    }

    /// Sets the compositing mode.
    #[must_use]
    pub fn with_blend_mode(mut self, blend_mode: BlendMode) -> Self {
        self.blend_mode = blend_mode;
        self
    }

    /// The source box with the default applied.
    #[must_use]
    pub fn resolved_src_box(&self) -> kurbo::Rect {
        if self.src_box.width() <= 0.0 || self.src_box.height() <= 0.0 {
            kurbo::Rect::new(
                0.0,
                0.0,
                f64::from(self.texture.width()),
                f64::from(self.texture.height()),
            )
        } else {
            self.src_box
        }
    }

    /// The destination box with the default applied.
    ///
    /// A box with zero width and zero height takes the texture's own size at
    /// its origin, regardless of the transform.
    #[must_use]
    pub fn resolved_dst_box(&self) -> Rect {
        if self.dst_box.width == 0 && self.dst_box.height == 0 {
            Rect::new(
                self.dst_box.x,
                self.dst_box.y,
                i32::try_from(self.texture.width()).unwrap_or(i32::MAX),
                i32::try_from(self.texture.height()).unwrap_or(i32::MAX),
            )
        } else {
            self.dst_box
        }
    }

    /// The opacity with the default applied, clamped to `[0, 1]`.
    #[must_use]
    pub fn resolved_alpha(&self) -> f32 {
        self.alpha.map_or(1.0, |a| a.clamp(0.0, 1.0))
    }
}

/// A solid-color fill.
#[derive(Clone, Copy, Debug)]
pub struct RectOptions<'a> {
    dst_box: Rect,
    color: Color,
    clip: Option<&'a Region>,
    blend_mode: BlendMode,
}

impl<'a> RectOptions<'a> {
    /// Fills `dst_box` with `color`. Returns `None` for an empty box.
    #[must_use]
    pub fn new(dst_box: Rect, color: Color) -> Option<Self> {
        (!dst_box.is_empty()).then_some(Self {
            dst_box,
            color,
            clip: None,
            blend_mode: BlendMode::Premultiplied,
        })
    }

    /// Limits the fill to `clip`.
    #[must_use]
    pub fn with_clip(mut self, clip: &'a Region) -> Self {
        self.clip = Some(clip);
        self
    }

    /// Sets the compositing mode.
    #[must_use]
    pub fn with_blend_mode(mut self, blend_mode: BlendMode) -> Self {
        self.blend_mode = blend_mode;
        self
    }

    /// The filled box; never empty.
    #[must_use]
    pub fn dst_box(&self) -> Rect {
        self.dst_box
    }

    /// The fill color.
    #[must_use]
    pub fn color(&self) -> Color {
        self.color
    }

    /// The clip region, if any.
    #[must_use]
    pub fn clip(&self) -> Option<&'a Region> {
        self.clip
    }

    /// The compositing mode.
    #[must_use]
    pub fn blend_mode(&self) -> BlendMode {
        self.blend_mode
    }
}

/// Receives the duration of a pass once it has been submitted.
#[derive(Debug, Default)]
pub struct RenderTimer {
    duration: Cell<Option<Duration>>,
}

impl RenderTimer {
    /// Creates a timer with no measurement.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The measured duration, if the renderer reported one.
    #[must_use]
    pub fn duration(&self) -> Option<Duration> {
        self.duration.get()
    }

    /// Stores a measurement. Called by renderers.
    pub fn record(&self, duration: Duration) {
        self.duration.set(Some(duration));
    }
}

/// Options for [`Renderer::begin_pass`].
#[derive(Clone, Debug, Default)]
pub struct PassOptions {
    /// Timer to fill in when the pass is submitted.
    pub timer: Option<Rc<RenderTimer>>,
}

/// Counters for the operations recorded into a pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PassStats {
    /// Operations that were drawn.
    pub ops: u32,
    /// Operations dropped because their source was unavailable.
    pub skipped: u32,
}

/// Opens render passes.
pub trait Renderer {
    /// The pass type this renderer produces.
    type Pass: RenderPass;

    /// Starts a pass drawing into `buffer`.
    ///
    /// # Errors
    ///
    /// Fails if the buffer cannot be locked for writing or has a format the
    /// renderer cannot draw into.
    fn begin_pass(&mut self, buffer: &Buffer, options: PassOptions)
    -> Result<Self::Pass, RenderError>;
}

/// A single-use drawing session bound to one destination buffer.
pub trait RenderPass {
    /// Draws a texture.
    ///
    /// If the texture cannot be read the operation is skipped and the pass
    /// carries on.
    fn add_texture(&mut self, options: &TextureOptions<'_>);

    /// Fills a rectangle.
    fn add_rect(&mut self, options: &RectOptions<'_>);

    /// Operation counters so far.
    fn stats(&self) -> PassStats;

    /// Finishes the pass and releases the destination.
    ///
    /// # Errors
    ///
    /// Fails if the backend could not complete the recorded work.
    fn submit(self) -> Result<(), RenderError>;
}
