//! Andes vendor extension.
//!
//! Function identifiers are stable once assigned; new functions are only
//! ever appended.

/// Vendor extension space base plus the Andes `mvendorid` (0x31e).
pub const EXTENSION_ID: usize = 0x0900_031E;

/// Functions of the Andes vendor extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(usize)]
pub enum VendorFunction {
    /// Reads `mcache_ctl`.
    GetMcacheCtlStatus = 0,
    /// Reads `mmisc_ctl`.
    GetMmiscCtlStatus = 1,
    /// Writes the writable bits of `mcache_ctl`.
    SetMcacheCtl = 2,
    /// Writes the writable bits of `mmisc_ctl`.
    SetMmiscCtl = 3,
    /// Enables (`a0 != 0`) or disables the L1 instruction cache.
    IcacheOp = 4,
    /// Enables (`a0 != 0`) or disables the L1 data cache.
    DcacheOp = 5,
    /// Enables or disables L1 instruction prefetch.
    L1IcachePrefetch = 6,
    /// Enables or disables L1 data prefetch.
    L1DcachePrefetch = 7,
    /// Enables or disables non-blocking loads and stores.
    NonBlockingLoadStore = 8,
    /// Enables or disables data cache write-around.
    WriteAround = 9,
    /// Configures a debug trigger (`a0`: type, `a1`: data, `a2`: user mode).
    Trigger = 10,
    /// Enables the performance monitor overflow interrupt.
    SetPfm = 11,
    /// Reads the power-brake control register.
    ReadPowerBrake = 12,
    /// Writes the power-brake control register.
    WritePowerBrake = 13,
    /// Masks (`a1 == 0`) or unmasks non-wake interrupts (`a0`: main hart).
    SuspendPrepare = 14,
    /// Saves hart context, halts, and restores it on wake.
    SuspendMem = 15,
    /// Requests a sleep mode for the calling hart.
    SetSuspendMode = 16,
    /// Runs the suspend/resume sequence (`a0`: main hart, `a1`: wake mask).
    EnterSuspendMode = 17,
    /// Restarts the platform through the watchdog. Does not return.
    Restart = 18,
    /// Programs every hart's reset vector.
    ResetVec = 19,
    /// Registers a physical memory attribute region.
    SetPma = 20,
    /// Frees a physical memory attribute region.
    FreePma = 21,
    /// Reports whether programmable PMA is present.
    ProbePma = 22,
    /// Writes back and invalidates the data cache of every hart.
    DcacheWbinvalAll = 23,
}

impl VendorFunction {
    const ALL: [Self; 24] = [
        Self::GetMcacheCtlStatus,
        Self::GetMmiscCtlStatus,
        Self::SetMcacheCtl,
        Self::SetMmiscCtl,
        Self::IcacheOp,
        Self::DcacheOp,
        Self::L1IcachePrefetch,
        Self::L1DcachePrefetch,
        Self::NonBlockingLoadStore,
        Self::WriteAround,
        Self::Trigger,
        Self::SetPfm,
        Self::ReadPowerBrake,
        Self::WritePowerBrake,
        Self::SuspendPrepare,
        Self::SuspendMem,
        Self::SetSuspendMode,
        Self::EnterSuspendMode,
        Self::Restart,
        Self::ResetVec,
        Self::SetPma,
        Self::FreePma,
        Self::ProbePma,
        Self::DcacheWbinvalAll,
    ];

    /// Looks up the function with identifier `id`.
    #[must_use]
    pub fn from_id(id: usize) -> Option<Self> {
        Self::ALL.get(id).copied()
    }

    #[must_use]
    pub fn id(self) -> usize {
        self as usize
    }
}
