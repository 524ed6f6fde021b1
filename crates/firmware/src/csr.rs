//! Control and status registers touched by the runtime.

use bitflags::bitflags;

/// A control/status register reachable through the vendor passthrough calls
/// or used internally by cache and power management.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Csr {
    /// Machine interrupt enable.
    Mie,
    /// Machine architecture id.
    Marchid,
    /// Andes cache control.
    McacheCtl,
    /// Andes miscellaneous control.
    MmiscCtl,
    /// Andes performance throttling ("power brake") control.
    MpftCtl,
    /// Andes misc. configuration (read-only).
    MmscCfg,
    /// Andes data cache/memory configuration (read-only).
    MdcmCfg,
    /// CCTL begin address.
    MccctlBeginAddr,
    /// CCTL command.
    MccctlCommand,
    /// Supervisor local interrupt pending.
    Slip,
}

impl Csr {
    #[must_use]
    pub const fn number(self) -> u16 {
        match self {
            Self::Mie => 0x304,
            Self::Marchid => 0xf12,
            Self::McacheCtl => 0x7ca,
            Self::MmiscCtl => 0x7d0,
            Self::MpftCtl => 0x7c5,
            Self::MmscCfg => 0xfc2,
            Self::MdcmCfg => 0xfc1,
            Self::MccctlBeginAddr => 0x7cb,
            Self::MccctlCommand => 0x7cc,
            Self::Slip => 0x9c5,
        }
    }
}

bitflags! {
    /// Bits of `mie` / `mip`.
    #[repr(transparent)]
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Interrupts: usize {
        const SSI = 1 << 1;
        const MSI = 1 << 3;
        const STI = 1 << 5;
        const MTI = 1 << 7;
        const SEI = 1 << 9;
        const MEI = 1 << 11;
        /// Performance counter overflow (Andes local interrupt 18).
        const PMOV = 1 << 18;

        const SUPERVISOR = Self::SSI.bits() | Self::STI.bits() | Self::SEI.bits();
    }

    /// Writable bits of `mcache_ctl`.
    #[repr(transparent)]
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct McacheCtl: usize {
        const IC_EN = 1 << 0;
        const DC_EN = 1 << 1;
        const IC_RWECC = 1 << 6;
        const DC_RWECC = 1 << 7;
        const CCTL_SUEN = 1 << 8;
        const L1I_PREFETCH_EN = 1 << 9;
        const L1D_PREFETCH_EN = 1 << 10;
        const DC_WAROUND_1_EN = 1 << 13;
        const DC_WAROUND_2_EN = 1 << 14;
    }

    /// Writable bits of `mmisc_ctl`.
    #[repr(transparent)]
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct MmiscCtl: usize {
        const VEC_PLIC_EN = 1 << 1;
        const RVCOMPM_EN = 1 << 2;
        const BRPE_EN = 1 << 3;
        const MSA_OR_UNA_EN = 1 << 6;
        const NON_BLOCKING_EN = 1 << 8;
    }
}

/// `mmsc_cfg` bit reporting programmable PMA support.
pub const MMSC_CFG_PPMA: usize = 1 << 30;

/// Returns whether `marchid` identifies an AndesStar 45-series core.
///
/// On 45-series parts every core has its own power domain; on earlier parts
/// core 0 shares the L2 cache power domain.
#[must_use]
pub fn is_andestar45_series(marchid: usize) -> bool {
    (marchid & 0xf0) >> 4 == 4 && marchid & 0xf == 5
}
