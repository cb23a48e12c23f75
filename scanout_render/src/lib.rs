// Copyright 2026 the Scanout Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Render passes and frame production for scanout.
//!
//! This crate sits between [`scanout_core`]'s damage tracking and the
//! display. It defines:
//!
//! - [`Renderer`] and [`RenderPass`]: recording draw operations into one
//!   destination buffer
//! - [`SoftwareRenderer`]: a CPU implementation of both
//! - [`FrameDriver`]: the per-output loop that picks a swapchain buffer,
//!   renders its damage and commits it
//!
//! # Features
//!
//! - `std`: enables `std` support in `kurbo` and `scanout_core`.
//! - `trace`: forwards frame events to a
//!   [`TraceSink`](scanout_core::trace::TraceSink).

#![no_std]
#![cfg_attr(docsrs, feature(doc_cfg))]

extern crate alloc;

pub mod frame;
pub mod pass;
pub mod software;

pub use frame::{FrameDriver, SwapchainConfig};
pub use pass::{
    BlendMode, BufferTexture, Color, FilterMode, PassOptions, PassStats, RectOptions,
    RenderError, RenderPass, RenderTimer, Renderer, Texture, TextureOptions,
};
pub use software::{SoftwarePass, SoftwareRenderer};
