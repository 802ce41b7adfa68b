//! Small shared primitives.

pub mod counter;
pub mod math;
pub mod terminator;

pub use counter::Counter;
pub use math::clamp_f64;
pub use terminator::{ApplicationTerminator, BoxError, ChannelTerminator, UngracefulTerminator};
