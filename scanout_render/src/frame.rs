// Copyright 2026 the Scanout Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Frame production for one output.
//!
//! [`FrameDriver`] owns the pieces that turn scene damage into a committed
//! frame: a swapchain of buffers, a [`DamageRing`], a [`Renderer`] and an
//! [`OutputBackend`].
//!
//! ```text
//!   next swapchain buffer
//!       │
//!       ▼
//!   DamageRing::rotate_buffer ──► damage
//!       │
//!       ▼
//!   Renderer::begin_pass ──► draw(pass, damage) ──► submit
//!       │
//!       ▼
//!   OutputState { buffer, damage } ──► OutputBackend::commit
//! ```
//!
//! If any step after the ring rotated fails, the ring is fully re-damaged so
//! the next frame redraws everything instead of trusting stale pixels.

use alloc::rc::Rc;
use alloc::vec::Vec;

use scanout_core::backend::OutputBackend;
use scanout_core::buffer::Buffer;
use scanout_core::damage_ring::DamageRing;
use scanout_core::format::PixelFormat;
use scanout_core::output::{OutputId, OutputStateBuilder};
use scanout_core::region::{Rect, Region};
use scanout_core::time::Clock;
use scanout_core::trace::{
    CommitEvent, DamageEvent, DrawSkippedEvent, FrameSummaryBuilder, PassBeginEvent,
    PassSubmitEvent, PhaseBeginEvent, PhaseEndEvent, PhaseKind, Tracer,
};

use crate::pass::{PassOptions, RenderError, RenderPass, RenderTimer, Renderer};

/// Shape of the swapchain a [`FrameDriver`] allocates.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SwapchainConfig {
    /// Number of buffers, at least one.
    pub buffers: usize,
    /// Pixel format of every buffer.
    pub format: PixelFormat,
}

impl SwapchainConfig {
    /// Two buffers.
    pub const DOUBLE: Self = Self {
        buffers: 2,
        format: PixelFormat::Xrgb8888,
    };

    /// Three buffers.
    pub const TRIPLE: Self = Self {
        buffers: 3,
        format: PixelFormat::Xrgb8888,
    };
}

impl Default for SwapchainConfig {
    fn default() -> Self {
        Self::DOUBLE
    }
}

/// Drives frame production for one output.
#[derive(Debug)]
pub struct FrameDriver<R, B, C> {
    output: OutputId,
    swapchain: SwapchainConfig,
    width: u32,
    height: u32,
    buffers: Vec<Buffer>,
    next: usize,
    ring: DamageRing,
    renderer: R,
    backend: B,
    clock: C,
    frame_index: u64,
}

impl<R: Renderer, B: OutputBackend, C: Clock> FrameDriver<R, B, C> {
    /// Creates a driver for a `width × height` output.
    #[must_use]
    pub fn new(
        output: OutputId,
        width: u32,
        height: u32,
        swapchain: SwapchainConfig,
        renderer: R,
        backend: B,
        clock: C,
    ) -> Self {
        let mut driver = Self {
            output,
            swapchain,
            width: 0,
            height: 0,
            buffers: Vec::new(),
            next: 0,
            ring: DamageRing::new(),
            renderer,
            backend,
            clock,
            frame_index: 0,
        };
        driver.resize(width, height);
        driver
    }

    /// Reallocates the swapchain for a new output size.
    ///
    /// Every buffer is new, so the next frame is fully damaged.
    pub fn resize(&mut self, width: u32, height: u32) {
        if (width, height) == (self.width, self.height) && !self.buffers.is_empty() {
            return;
        }
        self.width = width;
        self.height = height;
        let count = self.swapchain.buffers.max(1);
        self.buffers = (0..count)
            .map(|_| Buffer::new(width, height, self.swapchain.format))
            .collect();
        self.next = 0;
        self.ring.set_bounds(
            i32::try_from(width).unwrap_or(i32::MAX),
            i32::try_from(height).unwrap_or(i32::MAX),
        );
        tracing::debug!(
            output = self.output.0,
            width,
            height,
            buffers = count,
            "swapchain allocated"
        );
    }

    /// Adds scene damage for the next frame.
    pub fn add_damage(&mut self, damage: &Region) -> bool {
        self.ring.add(damage)
    }

    /// Adds a damaged rectangle for the next frame.
    pub fn add_damage_box(&mut self, rect: Rect) -> bool {
        self.ring.add_box(rect)
    }

    /// The damage ring.
    #[must_use]
    pub fn damage_ring(&self) -> &DamageRing {
        &self.ring
    }

    /// The swapchain buffers, in the order they are used.
    #[must_use]
    pub fn swapchain(&self) -> &[Buffer] {
        &self.buffers
    }

    /// The backend.
    #[must_use]
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// The renderer.
    #[must_use]
    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    /// Number of frames attempted so far.
    #[must_use]
    pub fn frame_index(&self) -> u64 {
        self.frame_index
    }

    /// Renders and commits one frame.
    ///
    /// `draw` receives the open pass and the region of the buffer that must be
    /// redrawn. Returns `Ok(true)` if the backend accepted the frame and
    /// `Ok(false)` if it rejected it.
    ///
    /// # Errors
    ///
    /// Fails if the pass could not be opened or submitted. The ring is
    /// re-damaged on every failure, including a rejected commit.
    pub fn render_frame<F>(&mut self, tracer: &mut Tracer<'_>, draw: F) -> Result<bool, RenderError>
    where
        F: FnOnce(&mut R::Pass, &Region),
    {
        let frame_index = self.frame_index;
        self.frame_index += 1;
        let mut summary = FrameSummaryBuilder::new(frame_index, self.output, self.clock.now());

        // Damage.
        self.phase_begin(tracer, &mut summary, frame_index, PhaseKind::Damage);
        let buffer = self.buffers[self.next].clone();
        self.next = (self.next + 1) % self.buffers.len();
        let mut damage = Region::new();
        self.ring.rotate_buffer(&buffer, &mut damage);
        let full = self
            .ring
            .bounds()
            .is_some_and(|b| damage.area() == b.area());
        tracer.damage(&DamageEvent {
            frame_index,
            output: self.output,
            buffer: buffer.id(),
            rects: u32::try_from(damage.rects().len()).unwrap_or(u32::MAX),
            area: damage.area(),
            full,
        });
        summary.set_damaged_area(damage.area());
        self.phase_end(tracer, &mut summary, frame_index, PhaseKind::Damage);

        // Render.
        self.phase_begin(tracer, &mut summary, frame_index, PhaseKind::Render);
        let timer = Rc::new(RenderTimer::new());
        let options = PassOptions {
            timer: Some(timer.clone()),
        };
        let mut pass = match self.renderer.begin_pass(&buffer, options) {
            Ok(pass) => pass,
            Err(err) => {
                tracing::warn!(output = self.output.0, frame_index, %err, "frame failed to begin");
                return Err(self.fail(tracer, summary, err));
            }
        };
        tracer.pass_begin(&PassBeginEvent {
            frame_index,
            buffer: buffer.id(),
            width: buffer.width(),
            height: buffer.height(),
        });
        draw(&mut pass, &damage);
        let stats = pass.stats();
        self.phase_end(tracer, &mut summary, frame_index, PhaseKind::Render);

        // Submit.
        self.phase_begin(tracer, &mut summary, frame_index, PhaseKind::Submit);
        if let Err(err) = pass.submit() {
            tracing::warn!(output = self.output.0, frame_index, %err, "frame failed to submit");
            return Err(self.fail(tracer, summary, err));
        }
        tracer.pass_submit(&PassSubmitEvent {
            frame_index,
            buffer: buffer.id(),
            ops: stats.ops,
            skipped: stats.skipped,
            duration: timer.duration(),
        });
        if stats.skipped > 0 {
            tracer.draw_skipped(&DrawSkippedEvent {
                frame_index,
                buffer: buffer.id(),
                count: stats.skipped,
            });
        }
        self.phase_end(tracer, &mut summary, frame_index, PhaseKind::Submit);

        // Commit.
        self.phase_begin(tracer, &mut summary, frame_index, PhaseKind::Commit);
        let buffer_id = buffer.id();
        let mut state = OutputStateBuilder::new();
        state.set_buffer(Some(buffer)).set_damage(&damage);
        let state = state.build();
        let fields = state.committed();
        let accepted = self.backend.commit(state);
        if accepted {
            tracing::debug!(
                output = self.output.0,
                frame_index,
                damaged = damage.area(),
                "frame committed"
            );
        } else {
            tracing::warn!(output = self.output.0, frame_index, "frame rejected by backend");
            self.ring.add_whole();
        }
        tracer.commit(&CommitEvent {
            frame_index,
            output: self.output,
            buffer: Some(buffer_id),
            fields,
            accepted,
            timestamp: self.clock.now(),
        });
        self.phase_end(tracer, &mut summary, frame_index, PhaseKind::Commit);

        summary.set_committed(accepted);
        tracer.frame_summary(&summary.finish());
        Ok(accepted)
    }

    fn phase_begin(
        &self,
        tracer: &mut Tracer<'_>,
        summary: &mut FrameSummaryBuilder,
        frame_index: u64,
        phase: PhaseKind,
    ) {
        let timestamp = self.clock.now();
        summary.phase_begin(phase, timestamp);
        tracer.phase_begin(&PhaseBeginEvent {
            frame_index,
            phase,
            timestamp,
        });
    }

    fn phase_end(
        &self,
        tracer: &mut Tracer<'_>,
        summary: &mut FrameSummaryBuilder,
        frame_index: u64,
        phase: PhaseKind,
    ) {
        let timestamp = self.clock.now();
        summary.phase_end(phase, timestamp);
        tracer.phase_end(&PhaseEndEvent {
            frame_index,
            phase,
            timestamp,
        });
    }

    /// Re-damages the ring and closes the frame summary.
    fn fail(
        &mut self,
        tracer: &mut Tracer<'_>,
        summary: FrameSummaryBuilder,
        err: RenderError,
    ) -> RenderError {
        self.ring.add_whole();
        tracer.frame_summary(&summary.finish());
        err
    }
}
