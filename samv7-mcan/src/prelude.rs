//! Traits needed to drive an instance
pub use crate::driver::{LowerHalf as _, Receiver as _};
pub use crate::reg::Bus as _;
pub use embedded_can::Frame as _;
