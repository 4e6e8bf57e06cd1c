// This is free and unencumbered software released into the public domain.

use super::{CameraId, Frame};
use bytes::Bytes;
use std::sync::{
    atomic::{AtomicU64, Ordering},
    mpsc::{Receiver, SyncSender, TrySendError, sync_channel},
};

/// Downstream consumer of camera notifications.
///
/// Calls arrive on the platform's callback threads and must not block.
/// `frame_fetched` runs while the preview buffers are locked, and its
/// slice is only valid for the duration of the call.
///
/// The preview lock is not reentrant. Calling back into the same
/// [`CameraListener`](super::CameraListener) or
/// [`PreviewBufferSwap`](super::PreviewBufferSwap) from `frame_fetched`
/// (`fetch_last_preview_frame`, `lock_and_take`, `capacity`, `prepare`, ...)
/// deadlocks. Only `active_slot` and `is_fetching_each_frame` are safe
/// there.
pub trait CameraEventSink: Send + Sync {
    fn picture_exposed(&self, camera_id: CameraId);

    fn picture_captured(&self, camera_id: CameraId, data: Bytes);

    fn auto_focus_complete(&self, camera_id: CameraId, success: bool);

    fn frame_fetched(&self, camera_id: CameraId, data: &[u8]);

    fn preview_fetched(&self, _camera_id: CameraId, _frame: &Frame) {}

    fn frame_available(&self, _texture_id: i32) {}
}

#[derive(Clone, Debug)]
pub enum CameraEvent {
    PictureExposed { camera_id: CameraId },
    PictureCaptured { camera_id: CameraId, data: Bytes },
    AutoFocusComplete { camera_id: CameraId, success: bool },
    FrameFetched { camera_id: CameraId, data: Bytes },
    PreviewFetched { camera_id: CameraId, frame: Frame },
    FrameAvailable { texture_id: i32 },
}

/// A sink that turns notifications into [`CameraEvent`]s on a bounded
/// channel. Events that do not fit are dropped and counted.
#[derive(Debug)]
pub struct ChannelSink {
    tx: SyncSender<CameraEvent>,
    dropped: AtomicU64,
}

impl ChannelSink {
    pub fn new(capacity: usize) -> (Self, Receiver<CameraEvent>) {
        let (tx, rx) = sync_channel(capacity.max(1));
        let sink = Self {
            tx,
            dropped: AtomicU64::new(0),
        };
        (sink, rx)
    }

    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    fn send(&self, event: CameraEvent) {
        match self.tx.try_send(event) {
            Ok(()) => {},
            Err(TrySendError::Full(_)) | Err(TrySendError::Disconnected(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
            },
        }
    }
}

impl CameraEventSink for ChannelSink {
    fn picture_exposed(&self, camera_id: CameraId) {
        self.send(CameraEvent::PictureExposed { camera_id });
    }

    fn picture_captured(&self, camera_id: CameraId, data: Bytes) {
        self.send(CameraEvent::PictureCaptured { camera_id, data });
    }

    fn auto_focus_complete(&self, camera_id: CameraId, success: bool) {
        self.send(CameraEvent::AutoFocusComplete { camera_id, success });
    }

    fn frame_fetched(&self, camera_id: CameraId, data: &[u8]) {
        self.send(CameraEvent::FrameFetched {
            camera_id,
            data: Bytes::copy_from_slice(data),
        });
    }

    fn preview_fetched(&self, camera_id: CameraId, frame: &Frame) {
        self.send(CameraEvent::PreviewFetched {
            camera_id,
            frame: frame.clone(),
        });
    }

    fn frame_available(&self, texture_id: i32) {
        self.send(CameraEvent::FrameAvailable { texture_id });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forwards_events_in_order() {
        let (sink, rx) = ChannelSink::new(8);
        sink.picture_exposed(3);
        sink.auto_focus_complete(3, true);
        sink.frame_fetched(3, &[1, 2, 3]);

        assert!(matches!(rx.try_recv(), Ok(CameraEvent::PictureExposed { camera_id: 3 })));
        assert!(matches!(
            rx.try_recv(),
            Ok(CameraEvent::AutoFocusComplete { camera_id: 3, success: true })
        ));
        match rx.try_recv() {
            Ok(CameraEvent::FrameFetched { camera_id, data }) => {
                assert_eq!(camera_id, 3);
                assert_eq!(&data[..], &[1, 2, 3]);
            },
            other => panic!("unexpected event: {other:?}"),
        }
        assert_eq!(sink.dropped(), 0);
    }

    #[test]
    fn full_channel_drops_instead_of_blocking() {
        let (sink, rx) = ChannelSink::new(1);
        sink.picture_exposed(0);
        sink.picture_exposed(0);
        sink.frame_available(7);
        assert_eq!(sink.dropped(), 2);

        drop(rx);
        sink.picture_exposed(0);
        assert_eq!(sink.dropped(), 3);
    }
}
