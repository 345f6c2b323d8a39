//! Device boundary
//!
//! The GPU is an external collaborator. This module defines the capability the
//! renderer consumes and a headless implementation of it.

pub mod headless;
pub mod traits;
pub mod types;

pub use headless::{DeviceCommand, HeadlessDevice};
pub use traits::*;
pub use types::*;
