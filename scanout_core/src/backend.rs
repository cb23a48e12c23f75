// Copyright 2026 the Scanout Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Backend contract for display outputs.
//!
//! A backend turns an [`OutputState`] into hardware configuration: a DRM
//! atomic commit, a nested compositor surface, or nothing at all for
//! [`HeadlessBackend`]. Plane allocation and kernel interfaces live in the
//! backend crates; the core only sees this trait.
//!
//! Rejection is not an error. [`OutputBackend::test`] and
//! [`OutputBackend::commit`] answer with a `bool`, and the per-layer
//! [`accepted`](crate::output::OutputLayerState::accepted) flags tell the
//! caller which layers it still has to composite itself.

use crate::output::{OutputConfig, OutputId, OutputState, OutputStateFields};

/// Applies output states to a display.
///
/// # Frame loop pseudocode
///
/// ```rust,ignore
/// let mut damage = Region::new();
/// ring.rotate_buffer(&buffer, &mut damage);
/// let mut pass = renderer.begin_pass(&buffer, PassOptions::default())?;
/// draw_scene(&mut pass, &damage);
/// pass.submit()?;
///
/// let mut state = OutputStateBuilder::new();
/// state.set_buffer(Some(buffer)).set_damage(&damage);
/// if !backend.commit(state.build()) {
///     ring.add_whole();
/// }
/// ```
pub trait OutputBackend {
    /// Checks whether `state` could be committed, without applying it.
    ///
    /// Updates the `accepted` flag of every layer in the state.
    fn test(&mut self, state: &OutputState) -> bool;

    /// Applies `state`. Returns `false` if the backend rejected it, in which
    /// case the output keeps its previous configuration.
    fn commit(&mut self, state: OutputState) -> bool;
}

/// Settings for a [`HeadlessBackend`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct HeadlessSettings {
    /// Put layers on (imaginary) planes instead of rejecting them.
    pub accept_layers: bool,
}

impl HeadlessSettings {
    /// Rejects every layer.
    pub const REJECT_LAYERS: Self = Self {
        accept_layers: false,
    };

    /// Accepts every layer.
    pub const ACCEPT_LAYERS: Self = Self {
        accept_layers: true,
    };
}

/// An output with no display attached.
///
/// It tracks the committed configuration and counts commits, which makes it
/// the backend of choice for tests and offscreen rendering.
#[derive(Debug)]
pub struct HeadlessBackend {
    id: OutputId,
    settings: HeadlessSettings,
    config: OutputConfig,
    commits: u64,
}

impl HeadlessBackend {
    /// Creates a disabled headless output.
    #[must_use]
    pub fn new(id: OutputId, settings: HeadlessSettings) -> Self {
        Self {
            id,
            settings,
            config: OutputConfig::default(),
            commits: 0,
        }
    }

    /// Returns the output id.
    #[must_use]
    pub fn id(&self) -> OutputId {
        self.id
    }

    /// Returns the configuration the output currently runs with.
    #[must_use]
    pub fn config(&self) -> &OutputConfig {
        &self.config
    }

    /// Number of accepted commits.
    #[must_use]
    pub fn commits(&self) -> u64 {
        self.commits
    }

    /// Mode size the output would have after `state`.
    fn pending_size(&self, state: &OutputState) -> Option<(i32, i32)> {
        if state.committed().contains(OutputStateFields::MODE) {
            state.mode().map(|m| m.size())
        } else {
            self.config.mode.map(|m| m.size())
        }
    }
}

impl OutputBackend for HeadlessBackend {
    fn test(&mut self, state: &OutputState) -> bool {
        if let Some(layers) = state.layers() {
            for layer in layers {
                layer.set_accepted(self.settings.accept_layers);
            }
        }

        if let (Some(buffer), Some((width, height))) = (state.buffer(), self.pending_size(state)) {
            let matches = i64::from(buffer.width()) == i64::from(width)
                && i64::from(buffer.height()) == i64::from(height);
            if !matches {
                tracing::debug!(
                    output = self.id.0,
                    buffer_width = buffer.width(),
                    buffer_height = buffer.height(),
                    mode_width = width,
                    mode_height = height,
                    "buffer size does not match mode"
                );
                return false;
            }
        }
        true
    }

    fn commit(&mut self, state: OutputState) -> bool {
        if !self.test(&state) {
            tracing::warn!(output = self.id.0, "headless commit rejected");
            return false;
        }
        state.apply_to(&mut self.config);
        self.commits += 1;
        tracing::debug!(
            output = self.id.0,
            commits = self.commits,
            fields = state.committed().bits(),
            "headless commit"
        );
        true
    }
}
