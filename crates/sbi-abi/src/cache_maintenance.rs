//! Cache maintenance extension.
//!
//! Each function takes the start address in `a0` and the size in bytes in
//! `a1` and is carried out on every hart.

pub const EXTENSION_ID: usize = crate::extension_id(b"SCMO");

/// Invalidates the line containing `a0`.
pub const INVALIDATE_LINE: usize = 0x0;
/// Invalidates every line overlapping `a0..a0 + a1`.
pub const INVALIDATE_RANGE: usize = 0x1;
/// Writes back the line containing `a0`.
pub const WRITEBACK_LINE: usize = 0x2;
/// Writes back every line overlapping `a0..a0 + a1`.
pub const WRITEBACK_RANGE: usize = 0x3;
/// Writes back and invalidates the entire cache. Arguments are ignored.
pub const WRITEBACK_INVALIDATE_ALL: usize = 0x4;
