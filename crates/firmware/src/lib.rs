//! Machine-mode vendor runtime for Andes AE350 multi-hart platforms.
//!
//! The runtime coordinates work across harts that share no operating system:
//!
//! - [`broadcast`] has every hart in a [`HartMask`](hart_mask::HartMask)
//!   perform a cache or address-translation maintenance action and tells the
//!   initiator when all of them are done.
//! - [`suspend`] takes harts into light, deep or hotplug sleep through the
//!   power-control unit, with the main hart waiting for its siblings before
//!   committing domain-wide changes.
//! - [`vendor`] and [`runtime`] route SBI calls from lower privilege levels
//!   to these primitives.
//!
//! Hardware is reached through the traits in [`hal`], so everything above
//! the MMIO drivers runs on the host in unit tests.

#![cfg_attr(not(test), no_std)]

#[macro_use]
mod log;

pub mod arch;
pub mod broadcast;
pub mod cache;
pub mod config;
pub mod console;
pub mod csr;
pub mod error;
pub mod hal;
pub mod l2c;
mod mmio;
pub mod platform;
pub mod poll;
pub mod runtime;
pub mod smu;
pub mod suspend;
pub mod vendor;
pub mod wdt;

#[cfg(test)]
mod testing;
