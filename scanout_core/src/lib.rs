// Copyright 2026 the Scanout Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Frame-production core for compositing display servers.
//!
//! `scanout_core` holds the data model a compositor needs between "the scene
//! changed" and "the display shows it": which pixels changed, which buffer
//! to draw into, and what to hand to the display. It is `no_std` compatible
//! (with `alloc`) and single-threaded: buffers are reference counted with
//! `Rc` and never cross threads.
//!
//! # Architecture
//!
//! ```text
//!   scene damage
//!       │
//!       ▼
//!   DamageRing::add ──► DamageRing::rotate_buffer(buffer) ──► Region
//!                                                              │
//!                 ┌────────────────────────────────────────────┘
//!                 ▼
//!   render pass (scanout_render) draws the damaged region into Buffer
//!                 │
//!                 ▼
//!   OutputStateBuilder ──► OutputState ──► OutputBackend::commit
//! ```
//!
//! **[`region`]**: integer rectangles and disjoint-rectangle regions.
//!
//! **[`buffer`]**: reference-counted pixel stores with scoped CPU access,
//! weak handles and destroy listeners.
//!
//! **[`format`]**: 32-bit packed pixel formats and their byte order.
//!
//! **[`transform`]**: the eight output transforms and their exact affine
//! matrices.
//!
//! **[`damage_ring`]**: per-frame damage history for buffer reuse.
//!
//! **[`output`]**: the atomic [`OutputState`](output::OutputState) and its
//! builder.
//!
//! **[`backend`]**: the [`OutputBackend`](backend::OutputBackend) trait and a
//! headless implementation.
//!
//! **[`time`]**: monotonic timestamps and clocks.
//!
//! **[`trace`]**: [`TraceSink`](trace::TraceSink) and the zero-overhead
//! [`Tracer`](trace::Tracer) wrapper.
//!
//! # Logging
//!
//! Diagnostics go through [`tracing`]; install a subscriber in the
//! application to see them.
//!
//! # Crate features
//!
//! - `std` (disabled by default): Enables `std` support in dependencies.
//! - `trace` (disabled by default): Enables `Tracer` method bodies (one branch
//!   per call site).

#![no_std]
#![cfg_attr(docsrs, feature(doc_cfg))]

extern crate alloc;

pub mod backend;
pub mod buffer;
pub mod damage_ring;
pub mod format;
pub mod output;
pub mod region;
pub mod time;
pub mod trace;
pub mod transform;
