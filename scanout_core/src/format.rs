// Copyright 2026 the Scanout Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Pixel formats understood by CPU-mapped buffers.

/// Builds a little-endian DRM fourcc code.
const fn fourcc(a: u8, b: u8, c: u8, d: u8) -> u32 {
    u32::from_le_bytes([a, b, c, d])
}

/// A packed 32-bit pixel format, named after its DRM fourcc.
///
/// All formats are little-endian in memory and hold premultiplied color. The
/// `X` variants carry no alpha; their fourth byte is ignored on read and
/// written as `0xff`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    /// `[B, G, R, A]` in memory.
    #[default]
    Argb8888,
    /// `[B, G, R, X]` in memory.
    Xrgb8888,
    /// `[R, G, B, A]` in memory.
    Abgr8888,
    /// `[R, G, B, X]` in memory.
    Xbgr8888,
}

impl PixelFormat {
    /// Every supported format.
    pub const ALL: [Self; 4] = [
        Self::Argb8888,
        Self::Xrgb8888,
        Self::Abgr8888,
        Self::Xbgr8888,
    ];

    /// Returns the DRM fourcc code.
    #[must_use]
    pub const fn fourcc(self) -> u32 {
        match self {
            Self::Argb8888 => fourcc(b'A', b'R', b'2', b'4'),
            Self::Xrgb8888 => fourcc(b'X', b'R', b'2', b'4'),
            Self::Abgr8888 => fourcc(b'A', b'B', b'2', b'4'),
            Self::Xbgr8888 => fourcc(b'X', b'B', b'2', b'4'),
        }
    }

    /// Looks up a format by DRM fourcc code.
    #[must_use]
    pub const fn from_fourcc(code: u32) -> Option<Self> {
        match code {
            c if c == Self::Argb8888.fourcc() => Some(Self::Argb8888),
            c if c == Self::Xrgb8888.fourcc() => Some(Self::Xrgb8888),
            c if c == Self::Abgr8888.fourcc() => Some(Self::Abgr8888),
            c if c == Self::Xbgr8888.fourcc() => Some(Self::Xbgr8888),
            _ => None,
        }
    }

    /// Bytes occupied by one pixel.
    #[must_use]
    pub const fn bytes_per_pixel(self) -> usize {
        4
    }

    /// Whether the format stores an alpha channel.
    #[must_use]
    pub const fn has_alpha(self) -> bool {
        matches!(self, Self::Argb8888 | Self::Abgr8888)
    }

    /// Decodes one pixel into premultiplied `[r, g, b, a]`.
    #[inline]
    #[must_use]
    pub fn read(self, px: &[u8]) -> [u8; 4] {
        let [r, g, b, a] = match self {
            Self::Argb8888 | Self::Xrgb8888 => [px[2], px[1], px[0], px[3]],
            Self::Abgr8888 | Self::Xbgr8888 => [px[0], px[1], px[2], px[3]],
        };
        [r, g, b, if self.has_alpha() { a } else { 0xff }]
    }

    /// Encodes premultiplied `[r, g, b, a]` into one pixel.
    #[inline]
    pub fn write(self, px: &mut [u8], [r, g, b, a]: [u8; 4]) {
        let a = if self.has_alpha() { a } else { 0xff };
        let bytes = match self {
            Self::Argb8888 | Self::Xrgb8888 => [b, g, r, a],
            Self::Abgr8888 | Self::Xbgr8888 => [r, g, b, a],
        };
        px[..4].copy_from_slice(&bytes);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fourcc_round_trip() {
        for f in PixelFormat::ALL {
            assert_eq!(PixelFormat::from_fourcc(f.fourcc()), Some(f));
        }
        assert_eq!(PixelFormat::Argb8888.fourcc(), 0x3432_5241);
        assert_eq!(PixelFormat::from_fourcc(0), None);
    }

    #[test]
    fn byte_order() {
        let mut px = [0_u8; 4];
        PixelFormat::Argb8888.write(&mut px, [1, 2, 3, 4]);
        assert_eq!(px, [3, 2, 1, 4]);
        assert_eq!(PixelFormat::Argb8888.read(&px), [1, 2, 3, 4]);

        PixelFormat::Xbgr8888.write(&mut px, [1, 2, 3, 4]);
        assert_eq!(px, [1, 2, 3, 0xff]);
        assert_eq!(PixelFormat::Xbgr8888.read(&px), [1, 2, 3, 0xff]);
    }

    #[test]
    fn padding_byte_reads_opaque() {
        let px = [10_u8, 20, 30, 40];
        for f in PixelFormat::ALL {
            let a = f.read(&px)[3];
            if f.has_alpha() {
                assert_eq!(a, 40, "{f:?} keeps its alpha");
            } else {
                assert_eq!(a, 0xff, "{f:?} ignores the padding byte");
            }
        }
        assert!(PixelFormat::Argb8888.has_alpha());
        assert!(!PixelFormat::Xrgb8888.has_alpha());
    }
}
