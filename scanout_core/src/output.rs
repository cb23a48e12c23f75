// Copyright 2026 the Scanout Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Atomic output configuration.
//!
//! Every change to an output (a new buffer, a mode switch, a gamma ramp) is
//! staged in an [`OutputStateBuilder`] and handed to the backend as one
//! immutable [`OutputState`]. The state records which fields were touched in
//! an [`OutputStateFields`] mask, so a commit only changes what the caller
//! asked for.
//!
//! ```text
//!   OutputStateBuilder ──build()──► OutputState ──► OutputBackend::test / commit
//!          ▲                              │
//!          └──────── into_builder() ──────┘
//! ```
//!
//! Both types own what they hold: a strong reference to the pending
//! [`Buffer`], a copy of the damage [`Region`] and the gamma table. Dropping
//! either releases all of it. Copies made with `try_clone` are deep and
//! independent of the original.

use alloc::rc::Rc;
use alloc::vec::Vec;
use core::cell::Cell;
use core::fmt;

use bitflags::bitflags;

use crate::buffer::Buffer;
use crate::format::PixelFormat;
use crate::region::{Rect, Region};
use crate::transform::OutputTransform;

/// Identifies a display output.
///
/// Backends assign output IDs; the core passes them through without
/// interpreting the value.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct OutputId(pub u32);

impl fmt::Debug for OutputId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "OutputId({})", self.0)
    }
}

bitflags! {
    /// Which fields of an [`OutputState`] carry a value.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct OutputStateFields: u32 {
        /// The output is being enabled or disabled.
        const ENABLED = 1 << 0;
        /// A fixed or custom mode is requested.
        const MODE = 1 << 1;
        /// The scale factor changes.
        const SCALE = 1 << 2;
        /// The output transform changes.
        const TRANSFORM = 1 << 3;
        /// Adaptive sync is toggled.
        const ADAPTIVE_SYNC_ENABLED = 1 << 4;
        /// The format used for rendering changes.
        const RENDER_FORMAT = 1 << 5;
        /// The subpixel layout changes.
        const SUBPIXEL = 1 << 6;
        /// A new buffer is attached (or the buffer is detached).
        const BUFFER = 1 << 7;
        /// The damage of the attached buffer is supplied.
        const DAMAGE = 1 << 8;
        /// A gamma ramp is set or cleared.
        const GAMMA_LUT = 1 << 9;
        /// The set of hardware layers changes.
        const LAYERS = 1 << 10;
    }
}

/// Errors from building or copying an output state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
pub enum OutputError {
    /// The gamma table could not be allocated.
    #[error("failed to allocate a gamma table of {ramp_size} entries per channel")]
    GammaAlloc {
        /// Requested entries per channel.
        ramp_size: usize,
    },
    /// A gamma plane does not hold `ramp_size` entries.
    #[error("gamma planes must each hold exactly ramp_size entries")]
    GammaPlaneLength,
    /// A deep copy could not allocate its storage.
    #[error("failed to allocate an output state copy")]
    CopyAlloc,
}

/// A display timing advertised by the output.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct OutputMode {
    /// Width in pixels.
    pub width: i32,
    /// Height in pixels.
    pub height: i32,
    /// Refresh rate in mHz.
    pub refresh: i32,
    /// Whether the output reports this mode as preferred.
    pub preferred: bool,
}

/// The mode requested by an output state.
///
/// A state asks either for one of the output's advertised modes or for a
/// custom timing, never both.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ModeSetting {
    /// One of the modes the output advertises.
    Fixed(OutputMode),
    /// An arbitrary timing.
    Custom {
        /// Width in pixels.
        width: i32,
        /// Height in pixels.
        height: i32,
        /// Refresh rate in mHz, or 0 to let the backend pick.
        refresh: i32,
    },
}

impl ModeSetting {
    /// Returns the pixel size of the mode.
    #[must_use]
    pub const fn size(&self) -> (i32, i32) {
        match *self {
            Self::Fixed(mode) => (mode.width, mode.height),
            Self::Custom { width, height, .. } => (width, height),
        }
    }

    /// Returns the refresh rate in mHz.
    #[must_use]
    pub const fn refresh(&self) -> i32 {
        match *self {
            Self::Fixed(mode) => mode.refresh,
            Self::Custom { refresh, .. } => refresh,
        }
    }
}

/// Physical arrangement of the color elements of a pixel.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Subpixel {
    /// Not known.
    #[default]
    Unknown,
    /// No subpixel geometry.
    None,
    /// Red, green, blue from left to right.
    HorizontalRgb,
    /// Blue, green, red from left to right.
    HorizontalBgr,
    /// Red, green, blue from top to bottom.
    VerticalRgb,
    /// Blue, green, red from top to bottom.
    VerticalBgr,
}

/// Desired state of one hardware layer.
///
/// The backend reports through [`accepted`](Self::accepted) whether it could
/// put the layer on a plane; rejected layers must be composited by the
/// caller.
#[derive(Debug)]
pub struct OutputLayerState {
    /// Caller-chosen layer identity.
    pub layer: u32,
    /// Buffer to scan out, or `None` to disable the layer.
    pub buffer: Option<Buffer>,
    /// Region of the buffer to sample, in buffer pixels.
    pub src_box: kurbo::Rect,
    /// Where the layer lands on the output.
    pub dst_rect: Rect,
    accepted: Cell<bool>,
}

impl OutputLayerState {
    /// Creates a layer state that has not been accepted yet.
    #[must_use]
    pub fn new(layer: u32, buffer: Option<Buffer>, src_box: kurbo::Rect, dst_rect: Rect) -> Self {
        Self {
            layer,
            buffer,
            src_box,
            dst_rect,
            accepted: Cell::new(false),
        }
    }

    /// Whether the backend placed this layer on a plane.
    #[must_use]
    pub fn accepted(&self) -> bool {
        self.accepted.get()
    }

    /// Records the backend's decision.
    pub fn set_accepted(&self, accepted: bool) {
        self.accepted.set(accepted);
    }
}

#[derive(Debug)]
struct Fields {
    committed: OutputStateFields,
    allow_reconfiguration: bool,
    enabled: bool,
    mode: Option<ModeSetting>,
    scale: f32,
    transform: OutputTransform,
    adaptive_sync_enabled: bool,
    render_format: PixelFormat,
    subpixel: Subpixel,
    buffer: Option<Buffer>,
    damage: Region,
    /// `3 * gamma_lut_size` samples: red, then green, then blue.
    gamma_lut: Vec<u16>,
    gamma_lut_size: usize,
    layers: Option<Rc<[OutputLayerState]>>,
}

impl Default for Fields {
    fn default() -> Self {
        Self {
            committed: OutputStateFields::empty(),
            allow_reconfiguration: false,
            enabled: false,
            mode: None,
            scale: 1.0,
            transform: OutputTransform::Normal,
            adaptive_sync_enabled: false,
            render_format: PixelFormat::Xrgb8888,
            subpixel: Subpixel::Unknown,
            buffer: None,
            damage: Region::new(),
            gamma_lut: Vec::new(),
            gamma_lut_size: 0,
            layers: None,
        }
    }
}

impl Fields {
    /// Deep copy. The buffer reference is re-acquired and the gamma table
    /// re-allocated; layers alias the same shared array.
    fn try_clone(&self) -> Result<Self, OutputError> {
        let mut gamma_lut = Vec::new();
        gamma_lut
            .try_reserve_exact(self.gamma_lut.len())
            .map_err(|_| OutputError::CopyAlloc)?;
        gamma_lut.extend_from_slice(&self.gamma_lut);
        Ok(Self {
            committed: self.committed,
            allow_reconfiguration: self.allow_reconfiguration,
            enabled: self.enabled,
            mode: self.mode,
            scale: self.scale,
            transform: self.transform,
            adaptive_sync_enabled: self.adaptive_sync_enabled,
            render_format: self.render_format,
            subpixel: self.subpixel,
            buffer: self.buffer.clone(),
            damage: self.damage.clone(),
            gamma_lut,
            gamma_lut_size: self.gamma_lut_size,
            layers: self.layers.clone(),
        })
    }
}

/// A pending output state under construction.
///
/// Each setter stores its value and marks the matching bit in
/// [`fields`](Self::fields); setting a field again replaces the value.
#[derive(Debug, Default)]
pub struct OutputStateBuilder {
    fields: Fields,
}

impl OutputStateBuilder {
    /// Creates an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the fields set so far.
    #[must_use]
    pub fn fields(&self) -> OutputStateFields {
        self.fields.committed
    }

    /// Whether the state may require a full modeset.
    #[must_use]
    pub fn allow_reconfiguration(&self) -> bool {
        self.fields.allow_reconfiguration
    }

    /// Returns the builder to its freshly created state, releasing the
    /// buffer, damage and gamma table.
    pub fn reset(&mut self) {
        self.fields = Fields::default();
    }

    /// Enables or disables the output.
    pub fn set_enabled(&mut self, enabled: bool) -> &mut Self {
        self.fields.committed |= OutputStateFields::ENABLED;
        self.fields.allow_reconfiguration = true;
        self.fields.enabled = enabled;
        self
    }

    /// Requests one of the output's advertised modes.
    ///
    /// Replaces a custom mode set earlier.
    pub fn set_mode(&mut self, mode: OutputMode) -> &mut Self {
        self.set_mode_setting(ModeSetting::Fixed(mode))
    }

    /// Requests a custom timing.
    ///
    /// Replaces a fixed mode set earlier.
    pub fn set_custom_mode(&mut self, width: i32, height: i32, refresh: i32) -> &mut Self {
        self.set_mode_setting(ModeSetting::Custom {
            width,
            height,
            refresh,
        })
    }

    fn set_mode_setting(&mut self, mode: ModeSetting) -> &mut Self {
        self.fields.committed |= OutputStateFields::MODE;
        self.fields.allow_reconfiguration = true;
        self.fields.mode = Some(mode);
        self
    }

    /// Sets the scale factor.
    pub fn set_scale(&mut self, scale: f32) -> &mut Self {
        self.fields.committed |= OutputStateFields::SCALE;
        self.fields.scale = scale;
        self
    }

    /// Sets the output transform.
    pub fn set_transform(&mut self, transform: OutputTransform) -> &mut Self {
        self.fields.committed |= OutputStateFields::TRANSFORM;
        self.fields.transform = transform;
        self
    }

    /// Toggles adaptive sync.
    pub fn set_adaptive_sync_enabled(&mut self, enabled: bool) -> &mut Self {
        self.fields.committed |= OutputStateFields::ADAPTIVE_SYNC_ENABLED;
        self.fields.adaptive_sync_enabled = enabled;
        self
    }

    /// Sets the format the output renders in.
    pub fn set_render_format(&mut self, format: PixelFormat) -> &mut Self {
        self.fields.committed |= OutputStateFields::RENDER_FORMAT;
        self.fields.render_format = format;
        self
    }

    /// Sets the subpixel layout.
    pub fn set_subpixel(&mut self, subpixel: Subpixel) -> &mut Self {
        self.fields.committed |= OutputStateFields::SUBPIXEL;
        self.fields.subpixel = subpixel;
        self
    }

    /// Attaches `buffer`, or detaches with `None`.
    ///
    /// The previously attached buffer reference is released.
    pub fn set_buffer(&mut self, buffer: Option<Buffer>) -> &mut Self {
        self.fields.committed |= OutputStateFields::BUFFER;
        self.fields.buffer = buffer;
        self
    }

    /// Sets the damage of the attached buffer.
    ///
    /// The region replaces any damage set earlier; it is not merged.
    pub fn set_damage(&mut self, damage: &Region) -> &mut Self {
        self.fields.committed |= OutputStateFields::DAMAGE;
        self.fields.damage.copy_from(damage);
        self
    }

    /// Sets the hardware layers.
    pub fn set_layers(&mut self, layers: Rc<[OutputLayerState]>) -> &mut Self {
        self.fields.committed |= OutputStateFields::LAYERS;
        self.fields.layers = Some(layers);
        self
    }

    /// Sets the gamma ramp from three planes of `ramp_size` entries.
    ///
    /// A `ramp_size` of zero clears the ramp. On error the builder is left
    /// exactly as it was.
    pub fn set_gamma_lut(
        &mut self,
        ramp_size: usize,
        r: &[u16],
        g: &[u16],
        b: &[u16],
    ) -> Result<(), OutputError> {
        if ramp_size == 0 {
            self.fields.gamma_lut = Vec::new();
        } else {
            let len = ramp_size
                .checked_mul(3)
                .ok_or(OutputError::GammaAlloc { ramp_size })?;
            let mut lut = Vec::new();
            lut.try_reserve_exact(len)
                .map_err(|_| OutputError::GammaAlloc { ramp_size })?;
            if r.len() != ramp_size || g.len() != ramp_size || b.len() != ramp_size {
                return Err(OutputError::GammaPlaneLength);
            }
            lut.extend_from_slice(r);
            lut.extend_from_slice(g);
            lut.extend_from_slice(b);
            self.fields.gamma_lut = lut;
        }
        self.fields.committed |= OutputStateFields::GAMMA_LUT;
        self.fields.gamma_lut_size = ramp_size;
        Ok(())
    }

    /// Makes a deep, independent copy.
    pub fn try_clone(&self) -> Result<Self, OutputError> {
        Ok(Self {
            fields: self.fields.try_clone()?,
        })
    }

    /// Replaces this builder's content with a deep copy of `src`.
    ///
    /// On error `self` is unmodified.
    pub fn copy_from(&mut self, src: &Self) -> Result<(), OutputError> {
        self.fields = src.fields.try_clone()?;
        Ok(())
    }

    /// Freezes the pending state.
    #[must_use]
    pub fn build(self) -> OutputState {
        OutputState {
            fields: self.fields,
        }
    }
}

/// An immutable output state, ready to be tested or committed.
#[derive(Debug)]
pub struct OutputState {
    fields: Fields,
}

impl OutputState {
    /// Returns which fields carry a value.
    #[must_use]
    pub fn committed(&self) -> OutputStateFields {
        self.fields.committed
    }

    /// Whether the state may require a full modeset.
    #[must_use]
    pub fn allow_reconfiguration(&self) -> bool {
        self.fields.allow_reconfiguration
    }

    /// Whether the output should be enabled.
    #[must_use]
    pub fn enabled(&self) -> bool {
        self.fields.enabled
    }

    /// Requested mode, if any.
    #[must_use]
    pub fn mode(&self) -> Option<&ModeSetting> {
        self.fields.mode.as_ref()
    }

    /// Requested scale factor.
    #[must_use]
    pub fn scale(&self) -> f32 {
        self.fields.scale
    }

    /// Requested transform.
    #[must_use]
    pub fn transform(&self) -> OutputTransform {
        self.fields.transform
    }

    /// Whether adaptive sync should be enabled.
    #[must_use]
    pub fn adaptive_sync_enabled(&self) -> bool {
        self.fields.adaptive_sync_enabled
    }

    /// Requested render format.
    #[must_use]
    pub fn render_format(&self) -> PixelFormat {
        self.fields.render_format
    }

    /// Requested subpixel layout.
    #[must_use]
    pub fn subpixel(&self) -> Subpixel {
        self.fields.subpixel
    }

    /// Attached buffer, if any.
    #[must_use]
    pub fn buffer(&self) -> Option<&Buffer> {
        self.fields.buffer.as_ref()
    }

    /// Damage of the attached buffer.
    #[must_use]
    pub fn damage(&self) -> &Region {
        &self.fields.damage
    }

    /// Entries per channel of the gamma ramp (0 when cleared or unset).
    #[must_use]
    pub fn gamma_lut_size(&self) -> usize {
        self.fields.gamma_lut_size
    }

    /// The gamma ramp: red, then green, then blue.
    #[must_use]
    pub fn gamma_lut(&self) -> &[u16] {
        &self.fields.gamma_lut
    }

    /// Requested hardware layers.
    #[must_use]
    pub fn layers(&self) -> Option<&[OutputLayerState]> {
        self.fields.layers.as_deref()
    }

    /// Makes a deep, independent copy.
    pub fn try_clone(&self) -> Result<Self, OutputError> {
        Ok(Self {
            fields: self.fields.try_clone()?,
        })
    }

    /// Turns the state back into a builder for further changes.
    #[must_use]
    pub fn into_builder(self) -> OutputStateBuilder {
        OutputStateBuilder {
            fields: self.fields,
        }
    }

    /// Folds the fields this state carries into `config`.
    pub fn apply_to(&self, config: &mut OutputConfig) {
        let f = &self.fields;
        let set = f.committed;
        if set.contains(OutputStateFields::ENABLED) {
            config.enabled = f.enabled;
        }
        if set.contains(OutputStateFields::MODE) {
            config.mode = f.mode;
        }
        if set.contains(OutputStateFields::SCALE) {
            config.scale = f.scale;
        }
        if set.contains(OutputStateFields::TRANSFORM) {
            config.transform = f.transform;
        }
        if set.contains(OutputStateFields::ADAPTIVE_SYNC_ENABLED) {
            config.adaptive_sync_enabled = f.adaptive_sync_enabled;
        }
        if set.contains(OutputStateFields::RENDER_FORMAT) {
            config.render_format = f.render_format;
        }
        if set.contains(OutputStateFields::SUBPIXEL) {
            config.subpixel = f.subpixel;
        }
        if set.contains(OutputStateFields::BUFFER) {
            config.front_buffer.clone_from(&f.buffer);
        }
        if set.contains(OutputStateFields::GAMMA_LUT) {
            config.gamma_lut_size = f.gamma_lut_size;
        }
    }
}

/// The configuration an output currently runs with.
#[derive(Debug)]
pub struct OutputConfig {
    /// Whether the output is on.
    pub enabled: bool,
    /// Current mode.
    pub mode: Option<ModeSetting>,
    /// Current scale factor.
    pub scale: f32,
    /// Current transform.
    pub transform: OutputTransform,
    /// Whether adaptive sync is on.
    pub adaptive_sync_enabled: bool,
    /// Format the output renders in.
    pub render_format: PixelFormat,
    /// Subpixel layout.
    pub subpixel: Subpixel,
    /// Buffer currently on screen.
    pub front_buffer: Option<Buffer>,
    /// Entries per channel of the active gamma ramp.
    pub gamma_lut_size: usize,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            mode: None,
            scale: 1.0,
            transform: OutputTransform::Normal,
            adaptive_sync_enabled: false,
            render_format: PixelFormat::Xrgb8888,
            subpixel: Subpixel::Unknown,
            front_buffer: None,
            gamma_lut_size: 0,
        }
    }
}
