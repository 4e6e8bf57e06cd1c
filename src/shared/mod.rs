// This is free and unencumbered software released into the public domain.

mod config;
pub use config::*;

mod error;
pub use error::*;

mod frame;
pub use frame::*;

mod listener;
pub use listener::*;

mod sink;
pub use sink::*;

mod surface;
pub use surface::*;

mod swap;
pub use swap::*;
