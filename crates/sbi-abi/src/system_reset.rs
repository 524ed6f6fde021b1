//! System reset extension.

pub const EXTENSION_ID: usize = crate::extension_id(b"SRST");

/// Resets the system (`a0`: reset type, `a1`: reset reason).
pub const SYSTEM_RESET: usize = 0x0;

/// Reset types accepted in `a0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetType {
    Shutdown,
    ColdReboot,
    WarmReboot,
}

impl ResetType {
    #[must_use]
    pub fn from_raw(value: u32) -> Option<Self> {
        match value {
            0 => Some(Self::Shutdown),
            1 => Some(Self::ColdReboot),
            2 => Some(Self::WarmReboot),
            _ => None,
        }
    }
}
