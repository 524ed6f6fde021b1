//! ATCWDT200 watchdog timer.

use bitflags::bitflags;

use crate::{hal::Watchdog, mmio::Mmio};

const CTRL_OFF: usize = 0x10;
const WREN_OFF: usize = 0x18;

const WRITE_ENABLE_MAGIC: u16 = 0x5aa5;

bitflags! {
    /// Control register layout.
    #[repr(transparent)]
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    struct Control: u32 {
        const WDT_EN = 1 << 0;
        const INT_EN = 1 << 2;
        const RST_EN = 1 << 3;

        // INT_CLK (7:4) and RST_CLK (10:8) period selectors.
        const _ = 0x7f0;
    }
}

/// Interrupt stage period, in clock cycles as a power of two index.
const INT_CLK_32768: u32 = 7;
/// Reset stage period.
const RST_CLK_128: u32 = 0;

impl Control {
    fn reset_armed() -> Self {
        Self::from_bits_retain((INT_CLK_32768 << 4) | (RST_CLK_128 << 8))
            | Self::INT_EN
            | Self::RST_EN
            | Self::WDT_EN
    }
}

#[derive(Debug)]
pub struct Atcwdt200 {
    mmio: Mmio,
}

impl Atcwdt200 {
    /// # Safety
    ///
    /// `base_addr` must be the base address of an ATCWDT200 register block.
    #[must_use]
    pub const unsafe fn new(base_addr: usize) -> Self {
        Self {
            mmio: unsafe { Mmio::new(base_addr) },
        }
    }
}

impl Watchdog for Atcwdt200 {
    fn arm_reset(&self) {
        // Every control write must be preceded by an unlock.
        self.mmio.write16(WREN_OFF, WRITE_ENABLE_MAGIC);
        self.mmio.write32(CTRL_OFF, Control::reset_armed().bits());
    }
}
