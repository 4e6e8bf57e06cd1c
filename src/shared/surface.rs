// This is free and unencumbered software released into the public domain.

//! Surface-side adapters the platform camera API insists on.

use super::CameraEventSink;
use std::sync::Arc;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Rect {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

/// Shape of the platform's surface holder.
pub trait SurfaceHolder {
    type Surface;
    type Callback;

    fn surface(&self) -> &Self::Surface;
    fn surface_frame(&self) -> Rect;
    fn is_creating(&self) -> bool;
    fn add_callback(&mut self, callback: Self::Callback);
    fn remove_callback(&mut self, callback: &Self::Callback);
    fn set_fixed_size(&mut self, width: u32, height: u32);
    fn set_format(&mut self, format: i32);
    fn set_keep_screen_on(&mut self, screen_on: bool);
    fn set_size_from_layout(&mut self);
}

/// A holder around a texture-backed surface. Everything except
/// [`surface`](SurfaceHolder::surface) is inert.
#[derive(Clone, Debug)]
pub struct SurfaceTextureHolder<S> {
    surface: S,
}

impl<S> SurfaceTextureHolder<S> {
    pub fn new(surface: S) -> Self {
        Self { surface }
    }

    pub fn into_inner(self) -> S {
        self.surface
    }
}

impl<S> SurfaceHolder for SurfaceTextureHolder<S> {
    type Surface = S;
    type Callback = ();

    fn surface(&self) -> &S {
        &self.surface
    }

    fn surface_frame(&self) -> Rect {
        Rect::default()
    }

    fn is_creating(&self) -> bool {
        false
    }

    fn add_callback(&mut self, _callback: ()) {}

    fn remove_callback(&mut self, _callback: &()) {}

    fn set_fixed_size(&mut self, _width: u32, _height: u32) {}

    fn set_format(&mut self, _format: i32) {}

    fn set_keep_screen_on(&mut self, _screen_on: bool) {}

    fn set_size_from_layout(&mut self) {}
}

/// Forwards a surface texture's frame-available signal to the sink.
pub struct SurfaceTextureListener {
    texture_id: i32,
    sink: Arc<dyn CameraEventSink>,
}

impl SurfaceTextureListener {
    pub fn new(texture_id: i32, sink: Arc<dyn CameraEventSink>) -> Self {
        Self { texture_id, sink }
    }

    pub fn texture_id(&self) -> i32 {
        self.texture_id
    }

    pub fn on_frame_available(&self) {
        self.sink.frame_available(self.texture_id);
    }
}
