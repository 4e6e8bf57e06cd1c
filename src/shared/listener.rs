// This is free and unencumbered software released into the public domain.

use super::{
    CameraError, CameraEventSink, CameraId, CameraResult, Frame, PreviewBufferSwap,
    PreviewConfig, PreviewFrame, WriteTarget,
};
use crate::{log_debug, log_warn};
use bytes::Bytes;
use std::{
    sync::{Arc, PoisonError, RwLock},
    time::{SystemTime, UNIX_EPOCH},
};

/// Receives a camera's shutter, picture, autofocus and preview callbacks
/// and forwards them to a [`CameraEventSink`] tagged with the camera id.
pub struct CameraListener {
    camera_id: CameraId,
    sink: Arc<dyn CameraEventSink>,
    swap: PreviewBufferSwap,
    preview: RwLock<Option<PreviewConfig>>,
}

impl core::fmt::Debug for CameraListener {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("CameraListener")
            .field("camera_id", &self.camera_id)
            .field("swap", &self.swap)
            .finish()
    }
}

impl CameraListener {
    pub fn new(camera_id: CameraId, sink: Arc<dyn CameraEventSink>) -> Self {
        Self {
            camera_id,
            sink,
            swap: PreviewBufferSwap::new(),
            preview: RwLock::new(None),
        }
    }

    pub fn camera_id(&self) -> CameraId {
        self.camera_id
    }

    pub fn preview_buffers(&self) -> &PreviewBufferSwap {
        &self.swap
    }

    pub fn preview_config(&self) -> Option<PreviewConfig> {
        self.preview
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Sizes the preview buffers for `config`. Returns `true` if they were
    /// reallocated.
    pub fn prepare_preview_buffer(&self, config: &PreviewConfig) -> CameraResult<bool> {
        let capacity = config.required_capacity()?;
        let reallocated = self.swap.prepare(capacity)?;
        *self.preview.write().unwrap_or_else(PoisonError::into_inner) = Some(config.clone());
        Ok(reallocated)
    }

    /// Prepares the buffers and returns the first buffer for the producer.
    ///
    /// Buffers still lent from a previous run are reclaimed.
    pub fn start_preview(&self, config: &PreviewConfig) -> CameraResult<WriteTarget> {
        if !self.prepare_preview_buffer(config)? {
            self.swap.reset()?;
        }
        self.swap.set_fetch_each_frame(config.fetch_each_frame);

        log_debug!(
            target: "asimov_camera_bridge",
            camera_id = self.camera_id,
            width = config.width,
            height = config.height,
            format = %config.pixel_format,
            "preview started"
        );
        self.swap.next_write_target().ok_or(CameraError::NotPrepared)
    }

    pub fn fetch_each_frame(&self, fetch: bool) {
        self.swap.set_fetch_each_frame(fetch);
    }

    pub fn callback_buffer(&self) -> Option<WriteTarget> {
        self.swap.next_write_target()
    }

    pub fn lock_and_fetch_preview_buffer(&self) -> Option<PreviewFrame<'_>> {
        self.swap.lock_and_take()
    }

    /// Copies the latest preview frame out of the buffers and reports it to
    /// the sink as well.
    ///
    /// Only the bytes of one frame at the recorded preview size are copied;
    /// the buffers may be larger after a switch to a smaller size. Without a
    /// recorded preview configuration the ready frame is left in place.
    pub fn fetch_last_preview_frame(&self) -> Option<Frame> {
        let Some(config) = self.preview_config() else {
            if self.swap.active_slot().is_some() {
                log_warn!(
                    target: "asimov_camera_bridge",
                    camera_id = self.camera_id,
                    "preview frame ready but no preview configuration recorded"
                );
            }
            return None;
        };
        let frame_len = config.required_capacity().ok()?;

        let data = {
            let frame = self.swap.lock_and_take()?;
            Bytes::copy_from_slice(&frame[..frame_len.min(frame.len())])
        };

        let frame = Frame::new(data, config.width, config.height, config.pixel_format)
            .with_timestamp_ns(now_ns_best_effort());
        self.sink.preview_fetched(self.camera_id, &frame);
        Some(frame)
    }

    pub fn on_shutter(&self) {
        self.sink.picture_exposed(self.camera_id);
    }

    pub fn on_picture_taken(&self, data: impl Into<Bytes>) {
        self.sink.picture_captured(self.camera_id, data.into());
    }

    pub fn on_auto_focus(&self, success: bool) {
        self.sink.auto_focus_complete(self.camera_id, success);
    }

    /// Producer callback for a filled preview buffer; returns the next one
    /// to fill.
    pub fn on_preview_frame(&self, target: WriteTarget) -> Option<WriteTarget> {
        let (sink, camera_id) = (&self.sink, self.camera_id);
        self.swap
            .on_frame_written(target, |data| sink.frame_fetched(camera_id, data))
    }
}

#[inline]
fn now_ns_best_effort() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::{CameraEvent, ChannelSink, PixelFormat};
    use std::sync::mpsc::Receiver;

    fn listener(id: CameraId) -> (CameraListener, Receiver<CameraEvent>) {
        let (sink, rx) = ChannelSink::new(16);
        (CameraListener::new(id, Arc::new(sink)), rx)
    }

    fn tiny() -> PreviewConfig {
        PreviewConfig::new(2, 2).with_pixel_format(PixelFormat::Rgb565)
    }

    #[test]
    fn capture_events_are_tagged_with_camera_id() {
        let (listener, rx) = listener(2);
        listener.on_shutter();
        listener.on_picture_taken(vec![0xFF, 0xD8]);
        listener.on_auto_focus(false);

        assert!(matches!(rx.try_recv(), Ok(CameraEvent::PictureExposed { camera_id: 2 })));
        match rx.try_recv() {
            Ok(CameraEvent::PictureCaptured { camera_id, data }) => {
                assert_eq!(camera_id, 2);
                assert_eq!(&data[..], &[0xFF, 0xD8]);
            },
            other => panic!("unexpected event: {other:?}"),
        }
        assert!(matches!(
            rx.try_recv(),
            Ok(CameraEvent::AutoFocusComplete { camera_id: 2, success: false })
        ));
    }

    #[test]
    fn prepare_sizes_buffers_from_config() {
        let (listener, _rx) = listener(0);
        assert!(listener.prepare_preview_buffer(&tiny()).unwrap());
        assert_eq!(listener.preview_buffers().capacity(), 8);
        assert!(!listener.prepare_preview_buffer(&tiny()).unwrap());
        assert!(listener.prepare_preview_buffer(&PreviewConfig::new(0, 0)).is_err());
    }

    #[test]
    fn preview_frames_flow_to_the_sink_when_fetching() {
        let (listener, rx) = listener(1);
        let mut target = listener
            .start_preview(&tiny().with_fetch_each_frame(true))
            .unwrap();
        target.fill(0xAB);
        let next = listener.on_preview_frame(target).unwrap();
        assert_eq!(next.len(), 8);

        match rx.try_recv() {
            Ok(CameraEvent::FrameFetched { camera_id, data }) => {
                assert_eq!(camera_id, 1);
                assert_eq!(&data[..], &[0xAB; 8]);
            },
            other => panic!("unexpected event: {other:?}"),
        }

        listener.fetch_each_frame(false);
        let _ = listener.on_preview_frame(next);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn fetch_last_preview_frame_copies_and_reports() {
        let (listener, rx) = listener(4);
        assert!(listener.fetch_last_preview_frame().is_none());

        let mut target = listener.start_preview(&tiny()).unwrap();
        target.copy_from_slice(&[1, 2, 3, 4, 5, 6, 7, 8]);
        let _ = listener.on_preview_frame(target);

        let frame = listener.fetch_last_preview_frame().unwrap();
        assert_eq!(&frame.data[..], &[1, 2, 3, 4, 5, 6, 7, 8]);
        assert_eq!((frame.width, frame.height), (2, 2));
        assert_eq!(frame.pixel_format, PixelFormat::Rgb565);

        match rx.try_recv() {
            Ok(CameraEvent::PreviewFetched { camera_id, frame }) => {
                assert_eq!(camera_id, 4);
                assert_eq!(frame.data.len(), 8);
            },
            other => panic!("unexpected event: {other:?}"),
        }
        assert!(listener.fetch_last_preview_frame().is_none());
    }

    #[test]
    fn fetched_frame_matches_a_smaller_preview_size() {
        let (listener, _rx) = listener(0);
        let large = PreviewConfig::new(4, 4).with_pixel_format(PixelFormat::Rgb565);
        let _ = listener.start_preview(&large).unwrap();
        assert_eq!(listener.preview_buffers().capacity(), 32);

        let mut target = listener.start_preview(&tiny()).unwrap();
        assert_eq!(target.len(), 32);
        target.fill(0x5A);
        let _ = listener.on_preview_frame(target);

        let frame = listener.fetch_last_preview_frame().unwrap();
        assert_eq!((frame.width, frame.height), (2, 2));
        assert_eq!(frame.data.len(), tiny().required_capacity().unwrap());
        assert_eq!(&frame.data[..], &[0x5A; 8]);
    }

    #[test]
    fn unconfigured_fetch_leaves_the_frame_ready() {
        let (listener, rx) = listener(0);
        listener.preview_buffers().prepare(4).unwrap();
        let mut target = listener.callback_buffer().unwrap();
        target.fill(1);
        let _ = listener.on_preview_frame(target);

        assert!(listener.fetch_last_preview_frame().is_none());
        assert!(rx.try_recv().is_err());
        assert_eq!(&listener.lock_and_fetch_preview_buffer().unwrap()[..], &[1; 4]);
    }

    #[test]
    fn restarting_preview_reclaims_the_seed_buffer() {
        let (listener, _rx) = listener(0);
        let first = listener.start_preview(&tiny()).unwrap();
        let second = listener.start_preview(&tiny()).unwrap();
        assert!(second.generation() > first.generation());
        assert!(listener.callback_buffer().is_none());
    }
}
