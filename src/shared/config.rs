// This is free and unencumbered software released into the public domain.

use super::{CameraError, PixelFormat};

pub type CameraId = i32;

#[derive(Clone, Debug)]
pub struct PreviewConfig {
    pub camera_id: CameraId,
    pub width: u32,
    pub height: u32,
    pub pixel_format: PixelFormat,
    pub fetch_each_frame: bool,
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self {
            camera_id: 0,
            width: 640,
            height: 480,
            pixel_format: PixelFormat::Nv21,
            fetch_each_frame: false,
        }
    }
}

impl PreviewConfig {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            ..Default::default()
        }
    }

    pub fn with_camera_id(mut self, id: CameraId) -> Self {
        self.camera_id = id;
        self
    }

    pub fn with_pixel_format(mut self, fmt: PixelFormat) -> Self {
        self.pixel_format = fmt;
        self
    }

    pub fn with_fetch_each_frame(mut self, enabled: bool) -> Self {
        self.fetch_each_frame = enabled;
        self
    }

    /// Bytes each preview buffer must hold for this size and format.
    pub fn required_capacity(&self) -> Result<usize, CameraError> {
        if self.width == 0 || self.height == 0 {
            return Err(CameraError::invalid_config(format!(
                "preview size {}x{}",
                self.width, self.height
            )));
        }
        Ok(self.pixel_format.frame_size(self.width, self.height))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_vga_nv21() {
        let config = PreviewConfig::default();
        assert_eq!((config.width, config.height), (640, 480));
        assert_eq!(config.required_capacity().unwrap(), 640 * 480 * 3 / 2);
    }

    #[test]
    fn builder_sets_fields() {
        let config = PreviewConfig::new(320, 240)
            .with_camera_id(1)
            .with_pixel_format(PixelFormat::Yuy2)
            .with_fetch_each_frame(true);
        assert_eq!(config.camera_id, 1);
        assert!(config.fetch_each_frame);
        assert_eq!(config.required_capacity().unwrap(), 320 * 240 * 2);
    }

    #[test]
    fn empty_size_is_rejected() {
        let err = PreviewConfig::new(0, 480).required_capacity().unwrap_err();
        assert!(matches!(err, CameraError::InvalidConfig(_)));
    }
}
