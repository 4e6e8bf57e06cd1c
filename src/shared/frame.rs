// This is free and unencumbered software released into the public domain.

use super::CameraError;
use alloc::borrow::Cow;
use bytes::Bytes;
use derive_more::Display;
use dogma::Named;

/// Preview pixel formats, carrying the platform's `ImageFormat` codes.
#[derive(Clone, Copy, Debug, Display, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum PixelFormat {
    #[display("RGB565")]
    Rgb565 = 4,
    #[display("NV16")]
    Nv16 = 16,
    #[display("NV21")]
    Nv21 = 17,
    #[display("YUY2")]
    Yuy2 = 20,
    #[display("YV12")]
    Yv12 = 0x3231_5659,
}

impl PixelFormat {
    pub const ALL: [PixelFormat; 5] = [
        PixelFormat::Rgb565,
        PixelFormat::Nv16,
        PixelFormat::Nv21,
        PixelFormat::Yuy2,
        PixelFormat::Yv12,
    ];

    pub fn code(self) -> i32 {
        self as i32
    }

    pub fn bits_per_pixel(self) -> u32 {
        match self {
            PixelFormat::Rgb565 | PixelFormat::Nv16 | PixelFormat::Yuy2 => 16,
            PixelFormat::Nv21 | PixelFormat::Yv12 => 12,
        }
    }

    /// Bytes needed to hold one `width`x`height` frame, rounded up.
    pub fn frame_size(self, width: u32, height: u32) -> usize {
        let bits = u64::from(self.bits_per_pixel()) * u64::from(width) * u64::from(height);
        bits.div_ceil(8) as usize
    }
}

impl TryFrom<i32> for PixelFormat {
    type Error = CameraError;

    fn try_from(code: i32) -> Result<Self, Self::Error> {
        PixelFormat::ALL
            .into_iter()
            .find(|f| f.code() == code)
            .ok_or_else(|| match code {
                256 => CameraError::unsupported("JPEG has no fixed preview frame size"),
                _ => CameraError::unsupported(format!("image format {code}")),
            })
    }
}

impl core::str::FromStr for PixelFormat {
    type Err = CameraError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PixelFormat::ALL
            .into_iter()
            .find(|f| f.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| CameraError::unsupported(format!("pixel format {s:?}")))
    }
}

impl Named for PixelFormat {
    fn name(&self) -> Cow<'_, str> {
        self.to_string().into()
    }
}

/// An owned copy of a preview frame, detached from the swap buffers.
#[derive(Clone, Debug)]
pub struct Frame {
    pub data: Bytes,
    pub width: u32,
    pub height: u32,
    pub pixel_format: PixelFormat,
    pub timestamp_ns: u64,
}

impl Frame {
    pub fn new(data: Bytes, width: u32, height: u32, pixel_format: PixelFormat) -> Self {
        Self {
            data,
            width,
            height,
            pixel_format,
            timestamp_ns: 0,
        }
    }

    pub fn with_timestamp_ns(mut self, ts: u64) -> Self {
        self.timestamp_ns = ts;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_size_rounds_up() {
        assert_eq!(PixelFormat::Nv21.frame_size(640, 480), 460_800);
        assert_eq!(PixelFormat::Rgb565.frame_size(640, 480), 614_400);
        // 12 bits * 1 * 1 = 1.5 bytes
        assert_eq!(PixelFormat::Yv12.frame_size(1, 1), 2);
        assert_eq!(PixelFormat::Nv21.frame_size(0, 480), 0);
    }

    #[test]
    fn codes_match_platform_constants() {
        assert_eq!(PixelFormat::try_from(17).unwrap(), PixelFormat::Nv21);
        assert_eq!(PixelFormat::try_from(842_094_169).unwrap(), PixelFormat::Yv12);
        assert!(matches!(
            PixelFormat::try_from(256),
            Err(CameraError::Unsupported(_))
        ));
        assert!(PixelFormat::try_from(0).is_err());
    }

    #[test]
    fn names_match_platform_spelling() {
        let names: Vec<_> = PixelFormat::ALL.iter().map(|f| f.name().into_owned()).collect();
        assert_eq!(names, ["RGB565", "NV16", "NV21", "YUY2", "YV12"]);
    }

    #[test]
    fn parses_names_case_insensitively() {
        assert_eq!("nv21".parse::<PixelFormat>().unwrap(), PixelFormat::Nv21);
        assert_eq!("YUY2".parse::<PixelFormat>().unwrap(), PixelFormat::Yuy2);
        assert!("bgra".parse::<PixelFormat>().is_err());
    }
}
