// Copyright 2026 the Scanout Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Reference-counted pixel buffers with scoped CPU access.
//!
//! A [`Buffer`] is a cheap handle: cloning it takes another strong reference,
//! and the pixel store is freed when the last one is dropped. The scene, a
//! pending [`OutputState`](crate::output::OutputState) and a render pass can
//! all hold the same store at once.
//!
//! Pixels are only reachable through a [`BufferAccess`] guard. Read guards can
//! coexist; a write guard is exclusive. Guards hold their own strong
//! reference, so a buffer cannot disappear while it is mapped, and they
//! release their lock on drop on every exit path.
//!
//! Holders that must not keep a buffer alive use [`WeakBuffer`], which is
//! validated with [`WeakBuffer::upgrade`] before each use. Observers that need
//! to react to destruction register an [`on_destroy`](Buffer::on_destroy)
//! listener; listeners fire exactly once, when the last strong reference goes.

use alloc::boxed::Box;
use alloc::rc::{Rc, Weak};
use alloc::vec;
use alloc::vec::Vec;
use core::cell::{Cell, Ref, RefCell, RefMut};
use core::fmt;
use core::sync::atomic::{AtomicU64, Ordering};

use bitflags::bitflags;

use crate::format::PixelFormat;

static NEXT_BUFFER_ID: AtomicU64 = AtomicU64::new(1);

/// A process-unique buffer identity.
///
/// IDs are never reused, so they are safe to use as lookup keys even after the
/// buffer they named has been destroyed.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BufferId(u64);

impl BufferId {
    fn next() -> Self {
        Self(NEXT_BUFFER_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns the raw value (for diagnostics only).
    #[inline]
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Debug for BufferId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BufferId({})", self.0)
    }
}

bitflags! {
    /// The kind of CPU access requested from [`Buffer::begin_access`].
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct AccessFlags: u8 {
        /// Read pixel content.
        const READ = 1 << 0;
        /// Write pixel content. Exclusive with every other access.
        const WRITE = 1 << 1;
    }
}

/// Errors from [`Buffer::begin_access`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
pub enum BufferError {
    /// The buffer has no CPU-visible storage.
    #[error("buffer cannot be mapped for CPU access")]
    NotMappable,
    /// A conflicting access is already held.
    #[error("buffer is already mapped with a conflicting access")]
    Busy,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Lock {
    Idle,
    Read(u32),
    Write,
}

type DestroyListener = Box<dyn FnOnce(BufferId)>;

struct Inner {
    id: BufferId,
    width: u32,
    height: u32,
    format: PixelFormat,
    mappable: bool,
    lock: Cell<Lock>,
    pixels: RefCell<Vec<u8>>,
    listeners: RefCell<Vec<DestroyListener>>,
}

impl Drop for Inner {
    fn drop(&mut self) {
        for listener in self.listeners.get_mut().drain(..) {
            listener(self.id);
        }
    }
}

/// A strong reference to a rectangular pixel store.
#[derive(Clone)]
pub struct Buffer(Rc<Inner>);

impl Buffer {
    /// Allocates a zero-filled (transparent) CPU-mappable buffer.
    #[must_use]
    pub fn new(width: u32, height: u32, format: PixelFormat) -> Self {
        let len = width as usize * height as usize * format.bytes_per_pixel();
        Self::with_storage(width, height, format, true, vec![0; len])
    }

    /// Wraps existing pixel data laid out with a stride of
    /// `width * bytes_per_pixel`.
    ///
    /// # Panics
    ///
    /// Panics if `pixels` does not have exactly the expected length.
    #[must_use]
    pub fn from_pixels(width: u32, height: u32, format: PixelFormat, pixels: Vec<u8>) -> Self {
        let len = width as usize * height as usize * format.bytes_per_pixel();
        assert_eq!(
            pixels.len(),
            len,
            "pixel data does not match a {width}x{height} {format:?} buffer"
        );
        Self::with_storage(width, height, format, true, pixels)
    }

    /// Creates a buffer whose storage is not CPU-visible (e.g. scan-out only
    /// device memory). Every [`begin_access`](Self::begin_access) fails.
    #[must_use]
    pub fn new_unmappable(width: u32, height: u32, format: PixelFormat) -> Self {
        Self::with_storage(width, height, format, false, Vec::new())
    }

    fn with_storage(
        width: u32,
        height: u32,
        format: PixelFormat,
        mappable: bool,
        pixels: Vec<u8>,
    ) -> Self {
        Self(Rc::new(Inner {
            id: BufferId::next(),
            width,
            height,
            format,
            mappable,
            lock: Cell::new(Lock::Idle),
            pixels: RefCell::new(pixels),
            listeners: RefCell::new(Vec::new()),
        }))
    }

    /// Returns the buffer's identity.
    #[inline]
    #[must_use]
    pub fn id(&self) -> BufferId {
        self.0.id
    }

    /// Width in pixels.
    #[inline]
    #[must_use]
    pub fn width(&self) -> u32 {
        self.0.width
    }

    /// Height in pixels.
    #[inline]
    #[must_use]
    pub fn height(&self) -> u32 {
        self.0.height
    }

    /// Pixel format.
    #[inline]
    #[must_use]
    pub fn format(&self) -> PixelFormat {
        self.0.format
    }

    /// Bytes per row.
    #[inline]
    #[must_use]
    pub fn stride(&self) -> usize {
        self.0.width as usize * self.0.format.bytes_per_pixel()
    }

    /// Whether the storage can be mapped for CPU access at all.
    #[inline]
    #[must_use]
    pub fn is_mappable(&self) -> bool {
        self.0.mappable
    }

    /// Number of strong references currently held (including guards).
    #[must_use]
    pub fn strong_count(&self) -> usize {
        Rc::strong_count(&self.0)
    }

    /// Whether a CPU access of any kind is currently held.
    #[must_use]
    pub fn is_accessed(&self) -> bool {
        self.0.lock.get() != Lock::Idle
    }

    /// Returns `true` if both handles refer to the same store.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Creates a non-owning handle.
    #[must_use]
    pub fn downgrade(&self) -> WeakBuffer {
        WeakBuffer {
            id: self.0.id,
            inner: Rc::downgrade(&self.0),
        }
    }

    /// Registers a listener that runs once, when the buffer is destroyed.
    pub fn on_destroy(&self, listener: impl FnOnce(BufferId) + 'static) {
        self.0.listeners.borrow_mut().push(Box::new(listener));
    }

    /// Acquires scoped CPU access to the pixels.
    ///
    /// `flags` must contain at least one of [`AccessFlags::READ`] and
    /// [`AccessFlags::WRITE`]; an empty set is treated as a read.
    ///
    /// # Errors
    ///
    /// Returns [`BufferError::NotMappable`] for buffers without CPU storage and
    /// [`BufferError::Busy`] if the requested access conflicts with one that
    /// is already held.
    pub fn begin_access(&self, flags: AccessFlags) -> Result<BufferAccess, BufferError> {
        if !self.0.mappable {
            return Err(BufferError::NotMappable);
        }
        let next = match (self.0.lock.get(), flags.contains(AccessFlags::WRITE)) {
            (Lock::Idle, true) => Lock::Write,
            (Lock::Idle, false) => Lock::Read(1),
            (Lock::Read(n), false) => Lock::Read(n + 1),
            (Lock::Read(_) | Lock::Write, _) => return Err(BufferError::Busy),
        };
        self.0.lock.set(next);
        Ok(BufferAccess {
            buffer: self.clone(),
            flags,
        })
    }
}

impl fmt::Debug for Buffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Buffer")
            .field("id", &self.0.id)
            .field("width", &self.0.width)
            .field("height", &self.0.height)
            .field("format", &self.0.format)
            .finish_non_exhaustive()
    }
}

/// A non-owning buffer handle.
#[derive(Clone)]
pub struct WeakBuffer {
    id: BufferId,
    inner: Weak<Inner>,
}

impl WeakBuffer {
    /// Identity of the buffer this handle was created from.
    #[inline]
    #[must_use]
    pub fn id(&self) -> BufferId {
        self.id
    }

    /// Returns a strong reference if the buffer is still alive.
    #[must_use]
    pub fn upgrade(&self) -> Option<Buffer> {
        self.inner.upgrade().map(Buffer)
    }

    /// Returns `true` if the buffer has been destroyed.
    #[must_use]
    pub fn is_destroyed(&self) -> bool {
        self.inner.strong_count() == 0
    }
}

impl fmt::Debug for WeakBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakBuffer")
            .field("id", &self.id)
            .field("destroyed", &self.is_destroyed())
            .finish_non_exhaustive()
    }
}

/// Scoped CPU access to a buffer's pixels, released on drop.
pub struct BufferAccess {
    buffer: Buffer,
    flags: AccessFlags,
}

impl BufferAccess {
    /// The accessed buffer.
    #[inline]
    #[must_use]
    pub fn buffer(&self) -> &Buffer {
        &self.buffer
    }

    /// The access kind that was granted.
    #[inline]
    #[must_use]
    pub fn flags(&self) -> AccessFlags {
        self.flags
    }

    /// Borrows the pixel bytes for reading.
    #[must_use]
    pub fn pixels(&self) -> Ref<'_, [u8]> {
        Ref::map(self.buffer.0.pixels.borrow(), |p| p.as_slice())
    }

    /// Borrows the pixel bytes for writing.
    ///
    /// # Panics
    ///
    /// Panics if the access was not acquired with [`AccessFlags::WRITE`].
    #[must_use]
    pub fn pixels_mut(&self) -> RefMut<'_, [u8]> {
        assert!(
            self.flags.contains(AccessFlags::WRITE),
            "buffer access was not acquired for writing"
        );
        RefMut::map(self.buffer.0.pixels.borrow_mut(), |p| p.as_mut_slice())
    }
}

impl Drop for BufferAccess {
    fn drop(&mut self) {
        let lock = &self.buffer.0.lock;
        lock.set(match lock.get() {
            Lock::Read(n) if n > 1 => Lock::Read(n - 1),
            _ => Lock::Idle,
        });
    }
}

impl fmt::Debug for BufferAccess {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BufferAccess")
            .field("buffer", &self.buffer.id())
            .field("flags", &self.flags)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_unique() {
        let a = Buffer::new(1, 1, PixelFormat::Argb8888);
        let b = Buffer::new(1, 1, PixelFormat::Argb8888);
        assert_ne!(a.id(), b.id());
        assert_eq!(a.clone().id(), a.id());
    }

    #[test]
    fn weak_debug_reports_liveness() {
        let buffer = Buffer::new(1, 1, PixelFormat::Argb8888);
        let weak = buffer.downgrade();
        let live = alloc::format!("{weak:?}");
        assert!(live.contains("destroyed: false"), "got: {live}");
        assert!(live.ends_with(".. }"), "non-exhaustive: {live}");
        drop(buffer);
        let gone = alloc::format!("{weak:?}");
        assert!(gone.contains("destroyed: true"), "got: {gone}");
    }

    #[test]
    fn shared_reads_exclusive_write() {
        let buf = Buffer::new(2, 2, PixelFormat::Argb8888);
        let r1 = buf.begin_access(AccessFlags::READ).unwrap();
        let r2 = buf.begin_access(AccessFlags::READ).unwrap();
        assert_eq!(
            buf.begin_access(AccessFlags::WRITE).unwrap_err(),
            BufferError::Busy
        );
        drop(r1);
        assert!(buf.is_accessed(), "one reader still holds the buffer");
        drop(r2);
        assert!(!buf.is_accessed());

        let w = buf.begin_access(AccessFlags::READ | AccessFlags::WRITE).unwrap();
        assert_eq!(
            buf.begin_access(AccessFlags::READ).unwrap_err(),
            BufferError::Busy
        );
        w.pixels_mut()[0] = 7;
        drop(w);
        let r = buf.begin_access(AccessFlags::READ).unwrap();
        assert_eq!(r.pixels()[0], 7);
    }

    #[test]
    fn unmappable_buffer_refuses_access() {
        let buf = Buffer::new_unmappable(4, 4, PixelFormat::Xrgb8888);
        assert!(!buf.is_mappable());
        assert_eq!(
            buf.begin_access(AccessFlags::READ).unwrap_err(),
            BufferError::NotMappable
        );
    }

    #[test]
    fn access_keeps_buffer_alive() {
        let buf = Buffer::new(1, 1, PixelFormat::Argb8888);
        let weak = buf.downgrade();
        let access = buf.begin_access(AccessFlags::READ).unwrap();
        drop(buf);
        assert!(!weak.is_destroyed(), "guard holds a strong reference");
        drop(access);
        assert!(weak.is_destroyed());
        assert!(weak.upgrade().is_none());
    }

    #[test]
    fn destroy_listener_fires_once() {
        let fired = Rc::new(Cell::new(0_u32));
        let buf = Buffer::new(1, 1, PixelFormat::Argb8888);
        let id = buf.id();
        let seen = Rc::new(Cell::new(None));
        {
            let fired = fired.clone();
            let seen = seen.clone();
            buf.on_destroy(move |destroyed| {
                fired.set(fired.get() + 1);
                seen.set(Some(destroyed));
            });
        }
        let other = buf.clone();
        drop(buf);
        assert_eq!(fired.get(), 0, "a strong reference remains");
        drop(other);
        assert_eq!(fired.get(), 1);
        assert_eq!(seen.get(), Some(id));
    }

    #[test]
    #[should_panic(expected = "pixel data does not match")]
    fn from_pixels_checks_length() {
        let _ = Buffer::from_pixels(2, 2, PixelFormat::Argb8888, vec![0; 3]);
    }
}
