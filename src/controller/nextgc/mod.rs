//! NextGC controller.
//!
//! Keeps the projected size of the next collection away from the memory
//! budget left for the managed allocator. Only the proportional component is
//! implemented, and its law is non-linear (see [`component_p`]).

pub mod component_p;
pub mod config;
pub mod controller;
pub mod smoothing;

pub use component_p::ComponentP;
pub use config::{ComponentProportionalConfig, ControllerConfig};
pub use controller::{new_controller_from_config, ControllerImpl};
pub use smoothing::{Ema, Passthrough, Smoothing};
