//! ATCSMU system management unit: per-hart power-control slots and reset
//! vectors.

use bitflags::bitflags;
use hart_mask::HartId;

use crate::{hal::PowerControl, mmio::Mmio};

const RESET_VEC_LO_OFF: usize = 0x50;
const RESET_VEC_HI_OFF: usize = 0x60;
const RESET_VEC_PER_HART: usize = 0x4;

const PCS0_WE_OFF: usize = 0x90;
const PCS0_CTL_OFF: usize = 0x94;
const PCS0_STATUS_OFF: usize = 0x98;
const PCS_STRIDE: usize = 0x20;

/// PCS0..PCS2 are the always-on, debug and main domains. PCS3 onwards belong
/// to the harts.
const FIRST_HART_PCS: usize = 3;

const PCS_CTL_PARAM_SHIFT: u32 = 3;
const SLEEP_CMD: u32 = 3;
const NO_CMD: u32 = 0;

const PD_TYPE_MASK: u32 = 0x7;
const PD_STATUS_MASK: u32 = 0xf8;
const PD_STATUS_SHIFT: u32 = 3;

bitflags! {
    /// Events able to wake a hart from a power-control sleep.
    #[repr(transparent)]
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct WakeEvents: u32 {
        const DEBUG = 1 << 28;
        const MSIP = 1 << 29;

        const _ = !0;
    }
}

impl WakeEvents {
    /// Wake sources of a hart in a multi-hart transition.
    ///
    /// The main hart listens for the caller-supplied sources as well as
    /// software interrupts; every other hart is woken only by a software
    /// interrupt from the main hart.
    #[must_use]
    pub fn for_role(main: bool, wake_mask: u32) -> Self {
        if main {
            Self::from_bits_retain(wake_mask) | Self::MSIP
        } else {
            Self::MSIP
        }
    }
}

/// Sleep depth requested from a power-control slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SleepDepth {
    Light,
    Deep,
}

impl SleepDepth {
    fn ctl_param(self) -> u32 {
        match self {
            Self::Light => 0,
            Self::Deep => 1,
        }
    }

    fn status(self) -> u32 {
        match self {
            Self::Light => 0,
            Self::Deep => 16,
        }
    }

    /// The value written to a slot's control register.
    #[must_use]
    pub fn command(self) -> u32 {
        SLEEP_CMD | (self.ctl_param() << PCS_CTL_PARAM_SHIFT)
    }
}

/// Power domain type reported by a slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DomainType {
    Active,
    Reset,
    Sleep,
    Timeout,
    Unknown(u32),
}

/// Raw value of a power-control slot's status register.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PcsStatus(pub u32);

impl PcsStatus {
    /// The status a slot reports once its hart has reached `depth`.
    #[must_use]
    pub fn asleep(depth: SleepDepth) -> Self {
        Self(2 | (depth.status() << PD_STATUS_SHIFT))
    }

    #[must_use]
    pub fn domain_type(self) -> DomainType {
        match self.0 & PD_TYPE_MASK {
            0 => DomainType::Active,
            1 => DomainType::Reset,
            2 => DomainType::Sleep,
            7 => DomainType::Timeout,
            ty => DomainType::Unknown(ty),
        }
    }

    #[must_use]
    pub fn sleep_status(self) -> u32 {
        (self.0 & PD_STATUS_MASK) >> PD_STATUS_SHIFT
    }

    #[must_use]
    pub fn is_asleep(self, depth: SleepDepth) -> bool {
        self.domain_type() == DomainType::Sleep && self.sleep_status() == depth.status()
    }
}

fn pcs_base(hart: HartId) -> usize {
    (hart.value() + FIRST_HART_PCS) * PCS_STRIDE
}

fn pcs_we_off(hart: HartId) -> usize {
    pcs_base(hart) + PCS0_WE_OFF
}

fn pcs_ctl_off(hart: HartId) -> usize {
    pcs_base(hart) + PCS0_CTL_OFF
}

fn pcs_status_off(hart: HartId) -> usize {
    pcs_base(hart) + PCS0_STATUS_OFF
}

fn reset_vec_lo_off(hart: HartId) -> usize {
    RESET_VEC_LO_OFF + hart.value() * RESET_VEC_PER_HART
}

fn reset_vec_hi_off(hart: HartId) -> usize {
    RESET_VEC_HI_OFF + hart.value() * RESET_VEC_PER_HART
}

#[derive(Debug)]
pub struct Smu {
    mmio: Mmio,
}

impl Smu {
    /// # Safety
    ///
    /// `base_addr` must be the base address of an ATCSMU register block.
    #[must_use]
    pub const unsafe fn new(base_addr: usize) -> Self {
        Self {
            mmio: unsafe { Mmio::new(base_addr) },
        }
    }

    #[must_use]
    pub fn base_addr(&self) -> usize {
        self.mmio.base_addr()
    }
}

impl PowerControl for Smu {
    fn set_wakeup_events(&self, hart: HartId, events: WakeEvents) {
        self.mmio.write32(pcs_we_off(hart), events.bits());
    }

    fn set_sleep(&self, hart: HartId, depth: SleepDepth) {
        self.mmio.write32(pcs_ctl_off(hart), depth.command());
    }

    fn cancel_sleep(&self, hart: HartId) {
        self.mmio.write32(pcs_we_off(hart), WakeEvents::empty().bits());
        self.mmio.write32(pcs_ctl_off(hart), NO_CMD);
    }

    fn status(&self, hart: HartId) -> PcsStatus {
        PcsStatus(self.mmio.read32(pcs_status_off(hart)))
    }

    #[expect(clippy::cast_possible_truncation)]
    fn set_reset_vector(&self, hart: HartId, addr: u64) {
        self.mmio.write32(reset_vec_lo_off(hart), addr as u32);
        self.mmio.write32(reset_vec_hi_off(hart), (addr >> 32) as u32);
    }
}
