// Copyright 2026 the Scanout Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Frame-loop instrumentation.
//!
//! A [`TraceSink`] receives one call per event. Every method has a no-op
//! default, so a sink only overrides what it records.
//!
//! [`Tracer`] wraps an optional `&mut dyn TraceSink`. Without the `trace`
//! feature every `Tracer` method compiles to nothing; with it, each call is a
//! single `Option` branch before dispatch.
//!
//! [`FrameSummaryBuilder`] collects phase timestamps while a frame is
//! produced and turns them into a [`FrameSummary`].
//!
//! ```text
//!   Damage ──► Render ──► Submit ──► Commit
//!     │          │          │          │
//!  DamageEvent  PassBegin  PassSubmit  CommitEvent
//!                         DrawSkipped
//! ```

use crate::buffer::BufferId;
use crate::output::{OutputId, OutputStateFields};
use crate::time::{Duration, HostTime};

/// Which phase of frame production is being measured.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PhaseKind {
    /// Picking a buffer and computing its damage.
    Damage,
    /// Recording draw operations into a pass.
    Render,
    /// Submitting the pass.
    Submit,
    /// Handing the output state to the backend.
    Commit,
}

impl PhaseKind {
    /// All phases in frame order.
    pub const ALL: [Self; 4] = [Self::Damage, Self::Render, Self::Submit, Self::Commit];

    /// Short lowercase name, used by the debug sinks.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Damage => "damage",
            Self::Render => "render",
            Self::Submit => "submit",
            Self::Commit => "commit",
        }
    }

    const fn index(self) -> usize {
        self as usize
    }
}

/// Emitted once the damage for the frame's buffer is known.
#[derive(Clone, Copy, Debug)]
pub struct DamageEvent {
    /// Frame counter.
    pub frame_index: u64,
    /// Output being drawn.
    pub output: OutputId,
    /// Buffer that will be rendered into.
    pub buffer: BufferId,
    /// Number of rectangles in the damage region.
    pub rects: u32,
    /// Damaged area in pixels.
    pub area: u64,
    /// Whether the whole buffer is damaged.
    pub full: bool,
}

/// Marks the beginning of a phase.
#[derive(Clone, Copy, Debug)]
pub struct PhaseBeginEvent {
    /// Frame counter.
    pub frame_index: u64,
    /// Which phase is starting.
    pub phase: PhaseKind,
    /// Time at the start of the phase.
    pub timestamp: HostTime,
}

/// Marks the end of a phase.
#[derive(Clone, Copy, Debug)]
pub struct PhaseEndEvent {
    /// Frame counter.
    pub frame_index: u64,
    /// Which phase is ending.
    pub phase: PhaseKind,
    /// Time at the end of the phase.
    pub timestamp: HostTime,
}

/// Emitted when a render pass has been started on a buffer.
#[derive(Clone, Copy, Debug)]
pub struct PassBeginEvent {
    /// Frame counter.
    pub frame_index: u64,
    /// Destination buffer.
    pub buffer: BufferId,
    /// Destination width in pixels.
    pub width: u32,
    /// Destination height in pixels.
    pub height: u32,
}

/// Emitted after a render pass was submitted.
#[derive(Clone, Copy, Debug)]
pub struct PassSubmitEvent {
    /// Frame counter.
    pub frame_index: u64,
    /// Destination buffer.
    pub buffer: BufferId,
    /// Draw operations applied.
    pub ops: u32,
    /// Draw operations dropped because their source was unavailable.
    pub skipped: u32,
    /// Time the backend spent on the pass, if it measured it.
    pub duration: Option<Duration>,
}

/// Emitted when draw operations of a pass were dropped.
#[derive(Clone, Copy, Debug)]
pub struct DrawSkippedEvent {
    /// Frame counter.
    pub frame_index: u64,
    /// Destination buffer.
    pub buffer: BufferId,
    /// Number of dropped operations.
    pub count: u32,
}

/// Emitted after the backend answered a commit.
#[derive(Clone, Copy, Debug)]
pub struct CommitEvent {
    /// Frame counter.
    pub frame_index: u64,
    /// Output committed to.
    pub output: OutputId,
    /// Buffer attached to the commit, if any.
    pub buffer: Option<BufferId>,
    /// Fields carried by the committed state.
    pub fields: OutputStateFields,
    /// Whether the backend accepted the state.
    pub accepted: bool,
    /// Time the backend answered.
    pub timestamp: HostTime,
}

/// Per-frame timing summary produced by [`FrameSummaryBuilder`].
#[derive(Clone, Copy, Debug)]
pub struct FrameSummary {
    /// Frame counter.
    pub frame_index: u64,
    /// Output the frame was produced for.
    pub output: OutputId,
    /// Time the frame started.
    pub start: HostTime,
    /// Damage phase duration (zero if not measured).
    pub damage: Duration,
    /// Render phase duration (zero if not measured).
    pub render: Duration,
    /// Submit phase duration (zero if not measured).
    pub submit: Duration,
    /// Commit phase duration (zero if not measured).
    pub commit: Duration,
    /// Damaged area in pixels.
    pub damaged_area: u64,
    /// Whether the frame reached the display.
    pub committed: bool,
}

/// Receives trace events from frame production.
pub trait TraceSink {
    /// Called once the frame's damage is known.
    fn on_damage(&mut self, e: &DamageEvent) {
        _ = e;
    }

    /// Called at the beginning of a phase.
    fn on_phase_begin(&mut self, e: &PhaseBeginEvent) {
        _ = e;
    }

    /// Called at the end of a phase.
    fn on_phase_end(&mut self, e: &PhaseEndEvent) {
        _ = e;
    }

    /// Called when a pass was started.
    fn on_pass_begin(&mut self, e: &PassBeginEvent) {
        _ = e;
    }

    /// Called when a pass was submitted.
    fn on_pass_submit(&mut self, e: &PassSubmitEvent) {
        _ = e;
    }

    /// Called when draw operations were dropped.
    fn on_draw_skipped(&mut self, e: &DrawSkippedEvent) {
        _ = e;
    }

    /// Called after a commit.
    fn on_commit(&mut self, e: &CommitEvent) {
        _ = e;
    }

    /// Called with the per-frame summary.
    fn on_frame_summary(&mut self, s: &FrameSummary) {
        _ = s;
    }
}

/// A [`TraceSink`] that discards all events.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopSink;

impl TraceSink for NoopSink {}

/// Thin wrapper around an optional [`TraceSink`].
pub struct Tracer<'a> {
    #[cfg(feature = "trace")]
    sink: Option<&'a mut dyn TraceSink>,
    #[cfg(not(feature = "trace"))]
    _marker: core::marker::PhantomData<&'a mut dyn TraceSink>,
}

impl core::fmt::Debug for Tracer<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Tracer").finish_non_exhaustive()
    }
}

/// Expands to a `Tracer` method forwarding one event to the sink.
macro_rules! forward {
    ($(#[$doc:meta])* $name:ident => $sink_fn:ident($ty:ty)) => {
        $(#[$doc])*
        #[inline]
        pub fn $name(&mut self, e: &$ty) {
            #[cfg(feature = "trace")]
            if let Some(s) = &mut self.sink {
                s.$sink_fn(e);
            }
            #[cfg(not(feature = "trace"))]
            {
                _ = e;
            }
        }
    };
}

impl<'a> Tracer<'a> {
    /// Creates a tracer that dispatches to the given sink.
    #[inline]
    #[must_use]
    pub fn new(sink: &'a mut dyn TraceSink) -> Self {
        #[cfg(feature = "trace")]
        {
            Self { sink: Some(sink) }
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = sink;
            Self {
                _marker: core::marker::PhantomData,
            }
        }
    }

    /// Creates a tracer that discards all events.
    #[inline]
    #[must_use]
    pub fn none() -> Self {
        #[cfg(feature = "trace")]
        {
            Self { sink: None }
        }
        #[cfg(not(feature = "trace"))]
        {
            Self {
                _marker: core::marker::PhantomData,
            }
        }
    }

    forward!(
        /// Emits a [`DamageEvent`].
        damage => on_damage(DamageEvent)
    );
    forward!(
        /// Emits a [`PhaseBeginEvent`].
        phase_begin => on_phase_begin(PhaseBeginEvent)
    );
    forward!(
        /// Emits a [`PhaseEndEvent`].
        phase_end => on_phase_end(PhaseEndEvent)
    );
    forward!(
        /// Emits a [`PassBeginEvent`].
        pass_begin => on_pass_begin(PassBeginEvent)
    );
    forward!(
        /// Emits a [`PassSubmitEvent`].
        pass_submit => on_pass_submit(PassSubmitEvent)
    );
    forward!(
        /// Emits a [`DrawSkippedEvent`].
        draw_skipped => on_draw_skipped(DrawSkippedEvent)
    );
    forward!(
        /// Emits a [`CommitEvent`].
        commit => on_commit(CommitEvent)
    );
    forward!(
        /// Emits a [`FrameSummary`].
        frame_summary => on_frame_summary(FrameSummary)
    );
}

/// Collects phase timestamps during a frame and produces a [`FrameSummary`].
#[derive(Debug)]
pub struct FrameSummaryBuilder {
    frame_index: u64,
    output: OutputId,
    start: HostTime,
    phase_starts: [Option<HostTime>; 4],
    phase_ends: [Option<HostTime>; 4],
    damaged_area: u64,
    committed: bool,
}

impl FrameSummaryBuilder {
    /// Starts a summary for frame `frame_index` begun at `start`.
    #[must_use]
    pub fn new(frame_index: u64, output: OutputId, start: HostTime) -> Self {
        Self {
            frame_index,
            output,
            start,
            phase_starts: [None; 4],
            phase_ends: [None; 4],
            damaged_area: 0,
            committed: false,
        }
    }

    /// Records the start of a phase.
    pub fn phase_begin(&mut self, phase: PhaseKind, t: HostTime) {
        self.phase_starts[phase.index()] = Some(t);
    }

    /// Records the end of a phase.
    pub fn phase_end(&mut self, phase: PhaseKind, t: HostTime) {
        self.phase_ends[phase.index()] = Some(t);
    }

    /// Records the damaged area.
    pub fn set_damaged_area(&mut self, area: u64) {
        self.damaged_area = area;
    }

    /// Records whether the frame reached the display.
    pub fn set_committed(&mut self, committed: bool) {
        self.committed = committed;
    }

    /// Consumes the builder and produces the final [`FrameSummary`].
    #[must_use]
    pub fn finish(self) -> FrameSummary {
        FrameSummary {
            frame_index: self.frame_index,
            output: self.output,
            start: self.start,
            damage: self.phase_duration(PhaseKind::Damage),
            render: self.phase_duration(PhaseKind::Render),
            submit: self.phase_duration(PhaseKind::Submit),
            commit: self.phase_duration(PhaseKind::Commit),
            damaged_area: self.damaged_area,
            committed: self.committed,
        }
    }

    fn phase_duration(&self, phase: PhaseKind) -> Duration {
        match (
            self.phase_starts[phase.index()],
            self.phase_ends[phase.index()],
        ) {
            (Some(start), Some(end)) => end.saturating_duration_since(start),
            _ => Duration::ZERO,
        }
    }
}
