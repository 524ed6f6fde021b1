//! The executing hart.

use hart_mask::HartId;

pub use self::imp::LocalHart;

mod imp;

/// Identifier of the executing hart, if the architecture can tell.
#[must_use]
pub fn current_hart() -> Option<HartId> {
    imp::current_hart()
}
