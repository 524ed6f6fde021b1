//! Remote fence extension.
//!
//! Functions take `hart_mask` in `a0` and `hart_mask_base` in `a1`; the
//! address-range forms take the start address and size in `a2` and `a3`.

pub const EXTENSION_ID: usize = crate::extension_id(b"RFNC");

/// Instructs remote harts to execute `FENCE.I`.
pub const REMOTE_FENCE_I: usize = 0x0;
/// Instructs remote harts to execute `SFENCE.VMA` over a range.
pub const REMOTE_SFENCE_VMA: usize = 0x1;
/// Instructs remote harts to execute `SFENCE.VMA` over a range for the ASID
/// in `a4`.
pub const REMOTE_SFENCE_VMA_ASID: usize = 0x2;
