#![no_std]

#[cfg(feature = "std")]
extern crate std;

mod clock;
mod codec;
mod driver;
mod frame;
mod pattern;
mod ranges;
mod transport;

use embedded_can::StandardId;

/// Arbitration ID of the steering angle sensor message
pub const STEERING_ANGLE_ID: StandardId = match StandardId::new(0x2B0) {
    Some(id) => id,
    None => panic!("steering angle ID out of range"),
};

pub use clock::*;
pub use codec::*;
pub use driver::*;
pub use frame::*;
pub use pattern::*;
pub use ranges::{ANGLE_MAX, ANGLE_MIN, RATE_MAX, SEQUENCE_MAX, STATUS_MAX};
pub use transport::*;

pub use embedded_can::{ExtendedId, Id};
