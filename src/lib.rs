#![allow(clippy::upper_case_acronyms)]
//! Core of an interactive path tracer: an importance sampled environment map and a two-level scene
//! acceleration index, built on a narrow device interface with a host-memory backend.

pub mod camera;
pub mod config;
pub mod context;
pub mod device;
pub mod environment;
pub mod error;
pub mod frame;
pub mod image_helper;
pub mod loader;
pub mod preview;
pub mod ray;
pub mod sampling;
pub mod scene;
pub mod ui;
pub mod utility;

pub use context::{Frame, TracingContext};
pub use error::{DeviceError, Error, Result};
