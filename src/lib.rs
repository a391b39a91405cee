//! LPC5410x flash algorithm on top of the IAP ROM, plus the support data
//! (KL28 flash densities, K32W042 system configuration) shipped alongside it.
//!
//! # Features
//!
//! - `std` (default) - simulated target, part database, firmware formats
//!   and the host programming driver
//! - `abi` - export the FlashOS entry points with C linkage
//!
//! Without `std` the crate is `no_std` and holds only the on-chip pieces.

#![cfg_attr(not(any(test, feature = "std")), no_std)]

pub mod abi;
pub mod algo;
pub mod clock;
pub mod constants;
pub mod density;
#[cfg(feature = "std")]
pub mod device;
#[cfg(feature = "std")]
pub mod format;
pub mod iap;
#[cfg(feature = "std")]
pub mod programmer;
pub mod protocol;
pub mod sector;
pub mod target;

pub use self::algo::{AlgoError, FlashAlgorithm, Function, VerifyMismatch};
#[cfg(feature = "std")]
pub use self::device::{Part, PartDB};
pub use self::iap::{Iap, IapError};
#[cfg(feature = "std")]
pub use self::programmer::Programmer;
pub use self::protocol::{Command, Response, Status};
pub use self::target::{RomTarget, Target};
#[cfg(feature = "std")]
pub use self::target::SimTarget;
