// Copyright 2026 the Scanout Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Chrome Trace Event Format exporter.
//!
//! [`ChromeTraceSink`] collects events as they are emitted and writes them as
//! [Chrome Trace Event Format][spec] JSON, suitable for loading into
//! `chrome://tracing` or [Perfetto](https://ui.perfetto.dev/).
//!
//! Phases become duration events (`B`/`E`) on the output's track. Everything
//! else is an instant event (`i`). Events that carry no timestamp of their
//! own are placed at the most recent timestamp the sink has seen.
//!
//! [spec]: https://docs.google.com/document/d/1CvAClvFfyA5R-PhYUmn5OOQtYMH4h6I0nSsKchNAySU

use std::io::{self, Write};

use serde_json::{Value, json};

use scanout_core::time::{Duration, HostTime};
use scanout_core::trace::{
    CommitEvent, DamageEvent, DrawSkippedEvent, FrameSummary, PassBeginEvent, PassSubmitEvent,
    PhaseBeginEvent, PhaseEndEvent, TraceSink,
};

/// Collects trace events as Chrome Trace Event Format objects.
#[derive(Debug, Default)]
pub struct ChromeTraceSink {
    events: Vec<Value>,
    last: HostTime,
}

impl ChromeTraceSink {
    /// Creates an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The collected events.
    #[must_use]
    pub fn events(&self) -> &[Value] {
        &self.events
    }

    /// Writes the collected events as a JSON array.
    ///
    /// # Errors
    ///
    /// Returns any error from the writer.
    pub fn write_to(&self, writer: &mut dyn Write) -> io::Result<()> {
        serde_json::to_writer_pretty(writer, &self.events)?;
        Ok(())
    }

    fn seen(&mut self, t: HostTime) -> f64 {
        self.last = self.last.max(t);
        us(t)
    }

    fn instant(&mut self, name: &str, cat: &str, pid: u32, args: Value) {
        self.events.push(json!({
            "ph": "i",
            "name": name,
            "cat": cat,
            "ts": us(self.last),
            "pid": pid,
            "tid": 0,
            "s": "t",
            "args": args,
        }));
    }
}

fn us(t: HostTime) -> f64 {
    t.nanos() as f64 / 1000.0
}

fn dur_us(d: Duration) -> f64 {
    d.nanos() as f64 / 1000.0
}

impl TraceSink for ChromeTraceSink {
    fn on_damage(&mut self, e: &DamageEvent) {
        self.instant(
            "Damage",
            "Frame",
            e.output.0,
            json!({
                "frame_index": e.frame_index,
                "buffer": e.buffer.get(),
                "rects": e.rects,
                "area": e.area,
                "full": e.full,
            }),
        );
    }

    fn on_phase_begin(&mut self, e: &PhaseBeginEvent) {
        let ts = self.seen(e.timestamp);
        self.events.push(json!({
            "ph": "B",
            "name": e.phase.name(),
            "cat": "Frame",
            "ts": ts,
            "pid": 0,
            "tid": 0,
            "args": {
                "frame_index": e.frame_index,
            }
        }));
    }

    fn on_phase_end(&mut self, e: &PhaseEndEvent) {
        let ts = self.seen(e.timestamp);
        self.events.push(json!({
            "ph": "E",
            "name": e.phase.name(),
            "cat": "Frame",
            "ts": ts,
            "pid": 0,
            "tid": 0,
            "args": {
                "frame_index": e.frame_index,
            }
        }));
    }

    fn on_pass_begin(&mut self, e: &PassBeginEvent) {
        self.instant(
            "PassBegin",
            "Render",
            0,
            json!({
                "frame_index": e.frame_index,
                "buffer": e.buffer.get(),
                "width": e.width,
                "height": e.height,
            }),
        );
    }

    fn on_pass_submit(&mut self, e: &PassSubmitEvent) {
        self.instant(
            "PassSubmit",
            "Render",
            0,
            json!({
                "frame_index": e.frame_index,
                "buffer": e.buffer.get(),
                "ops": e.ops,
                "skipped": e.skipped,
                "gpu_us": e.duration.map(dur_us),
            }),
        );
    }

    fn on_draw_skipped(&mut self, e: &DrawSkippedEvent) {
        self.instant(
            "DrawSkipped",
            "Render",
            0,
            json!({
                "frame_index": e.frame_index,
                "buffer": e.buffer.get(),
                "count": e.count,
            }),
        );
    }

    fn on_commit(&mut self, e: &CommitEvent) {
        self.seen(e.timestamp);
        self.instant(
            "Commit",
            "Output",
            e.output.0,
            json!({
                "frame_index": e.frame_index,
                "buffer": e.buffer.map(|b| b.get()),
                "fields": e.fields.bits(),
                "accepted": e.accepted,
            }),
        );
    }

    fn on_frame_summary(&mut self, s: &FrameSummary) {
        self.seen(s.start);
        self.instant(
            "FrameSummary",
            "Summary",
            s.output.0,
            json!({
                "frame_index": s.frame_index,
                "start_us": us(s.start),
                "damage_us": dur_us(s.damage),
                "render_us": dur_us(s.render),
                "submit_us": dur_us(s.submit),
                "commit_us": dur_us(s.commit),
                "damaged_area": s.damaged_area,
                "committed": s.committed,
            }),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scanout_core::backend::{HeadlessBackend, HeadlessSettings};
    use scanout_core::output::OutputId;
    use scanout_core::time::ManualClock;
    use scanout_core::trace::{PhaseKind, Tracer};
    use scanout_render::{FrameDriver, SoftwareRenderer, SwapchainConfig};

    fn parse(sink: &ChromeTraceSink) -> Vec<Value> {
        let mut out = Vec::new();
        sink.write_to(&mut out).unwrap();
        let json_str = String::from_utf8(out).unwrap();
        serde_json::from_str(&json_str).unwrap()
    }

    #[test]
    fn phases_become_duration_events() {
        let mut sink = ChromeTraceSink::new();
        sink.on_phase_begin(&PhaseBeginEvent {
            frame_index: 0,
            phase: PhaseKind::Damage,
            timestamp: HostTime(1_000_000),
        });
        sink.on_phase_end(&PhaseEndEvent {
            frame_index: 0,
            phase: PhaseKind::Damage,
            timestamp: HostTime(1_000_100),
        });

        let parsed = parse(&sink);
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0]["ph"], "B");
        assert_eq!(parsed[0]["name"], "damage");
        assert_eq!(parsed[0]["ts"], 1000.0);
        assert_eq!(parsed[1]["ph"], "E");
        assert_eq!(parsed[1]["ts"], 1000.1);
    }

    #[test]
    fn empty_sink_writes_empty_array() {
        let parsed = parse(&ChromeTraceSink::new());
        assert!(parsed.is_empty());
    }

    #[test]
    fn frame_driver_trace() {
        let clock = ManualClock::new(HostTime(0));
        let mut driver = FrameDriver::new(
            OutputId(1),
            8,
            8,
            SwapchainConfig::DOUBLE,
            SoftwareRenderer::new(),
            HeadlessBackend::new(OutputId(1), HeadlessSettings::default()),
            clock,
        );
        let mut sink = ChromeTraceSink::new();
        let mut tracer = Tracer::new(&mut sink);
        assert_eq!(driver.render_frame(&mut tracer, |_, _| {}), Ok(true));

        let parsed = parse(&sink);
        let names: Vec<&str> = parsed
            .iter()
            .map(|e| e["name"].as_str().unwrap())
            .collect();
        assert_eq!(
            names,
            [
                "damage",
                "Damage",
                "damage",
                "render",
                "PassBegin",
                "render",
                "submit",
                "PassSubmit",
                "submit",
                "commit",
                "Commit",
                "commit",
                "FrameSummary",
            ]
        );
        let damage = &parsed[1];
        assert_eq!(damage["args"]["full"], true);
        assert_eq!(damage["args"]["area"], 64);
        assert_eq!(parsed[10]["args"]["accepted"], true);
        assert_eq!(parsed[12]["args"]["committed"], true);
    }
}
