// Copyright 2026 the Scanout Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Human-readable trace output.
//!
//! [`PrettyPrintSink`] implements [`TraceSink`] and writes one line per event
//! to a [`Write`](std::io::Write) destination (default: stderr). Timestamps
//! and durations are printed in microseconds.

use std::io::Write;

use scanout_core::time::{Duration, HostTime};
use scanout_core::trace::{
    CommitEvent, DamageEvent, DrawSkippedEvent, FrameSummary, PassBeginEvent, PassSubmitEvent,
    PhaseBeginEvent, PhaseEndEvent, TraceSink,
};

/// Writes human-readable trace lines to a [`Write`](std::io::Write) destination.
pub struct PrettyPrintSink<W: Write = Box<dyn Write>> {
    writer: W,
}

impl<W: Write> std::fmt::Debug for PrettyPrintSink<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrettyPrintSink").finish_non_exhaustive()
    }
}

impl PrettyPrintSink {
    /// Creates a sink that writes to stderr.
    #[must_use]
    pub fn stderr() -> Self {
        Self {
            writer: Box::new(std::io::stderr()),
        }
    }

    /// Creates a sink that writes to a boxed writer.
    #[must_use]
    pub fn new(writer: Box<dyn Write>) -> Self {
        Self { writer }
    }
}

impl<W: Write> PrettyPrintSink<W> {
    /// Creates a sink that writes to the given destination.
    #[must_use]
    pub fn with_writer(writer: W) -> Self {
        Self { writer }
    }

    /// Consumes the sink and returns the writer.
    pub fn into_inner(self) -> W {
        self.writer
    }
}

fn us(t: HostTime) -> f64 {
    t.nanos() as f64 / 1000.0
}

fn dur_us(d: Duration) -> f64 {
    d.nanos() as f64 / 1000.0
}

impl<W: Write> TraceSink for PrettyPrintSink<W> {
    fn on_damage(&mut self, e: &DamageEvent) {
        let full = if e.full { " full" } else { "" };
        let _ = writeln!(
            self.writer,
            "[damage] frame={} output={} buffer={} rects={} area={}{full}",
            e.frame_index,
            e.output.0,
            e.buffer.get(),
            e.rects,
            e.area,
        );
    }

    fn on_phase_begin(&mut self, e: &PhaseBeginEvent) {
        let _ = writeln!(
            self.writer,
            "[phase:begin] frame={} {} at {:.1}µs",
            e.frame_index,
            e.phase.name(),
            us(e.timestamp),
        );
    }

    fn on_phase_end(&mut self, e: &PhaseEndEvent) {
        let _ = writeln!(
            self.writer,
            "[phase:end] frame={} {} at {:.1}µs",
            e.frame_index,
            e.phase.name(),
            us(e.timestamp),
        );
    }

    fn on_pass_begin(&mut self, e: &PassBeginEvent) {
        let _ = writeln!(
            self.writer,
            "[pass:begin] frame={} buffer={} {}x{}",
            e.frame_index,
            e.buffer.get(),
            e.width,
            e.height,
        );
    }

    fn on_pass_submit(&mut self, e: &PassSubmitEvent) {
        let duration = match e.duration {
            Some(d) => format!("{:.1}µs", dur_us(d)),
            None => "?".into(),
        };
        let _ = writeln!(
            self.writer,
            "[pass:submit] frame={} buffer={} ops={} skipped={} took={duration}",
            e.frame_index,
            e.buffer.get(),
            e.ops,
            e.skipped,
        );
    }

    fn on_draw_skipped(&mut self, e: &DrawSkippedEvent) {
        let _ = writeln!(
            self.writer,
            "[skipped] frame={} buffer={} count={}",
            e.frame_index,
            e.buffer.get(),
            e.count,
        );
    }

    fn on_commit(&mut self, e: &CommitEvent) {
        let verdict = if e.accepted { "ok" } else { "REJECTED" };
        let buffer = e
            .buffer
            .map_or_else(|| "none".into(), |b| b.get().to_string());
        let _ = writeln!(
            self.writer,
            "[commit] frame={} output={} buffer={buffer} fields={:#x} {verdict} at {:.1}µs",
            e.frame_index,
            e.output.0,
            e.fields.bits(),
            us(e.timestamp),
        );
    }

    fn on_frame_summary(&mut self, s: &FrameSummary) {
        let committed = if s.committed { "committed" } else { "dropped" };
        let _ = writeln!(
            self.writer,
            "[summary] frame={} output={} damage={:.1}µs render={:.1}µs \
             submit={:.1}µs commit={:.1}µs area={} {committed}",
            s.frame_index,
            s.output.0,
            dur_us(s.damage),
            dur_us(s.render),
            dur_us(s.submit),
            dur_us(s.commit),
            s.damaged_area,
        );
    }
}
