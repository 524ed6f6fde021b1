//! Andes L2 cache controller.
//!
//! Each hart owns a command/address register pair and a 4-bit status field;
//! commands issued through them operate on the cache shared by all harts.

use core::hint;

use hart_mask::HartId;
use riscv_utils::asm;

use crate::{
    hal::{SharedCache, SharedLineCommand},
    mmio::Mmio,
};

const CTL_OFF: usize = 0x8;
const CTL_ENABLE: u32 = 1 << 0;

const CCTL_CMD_BASE: usize = 0x40;
const CCTL_ACC_BASE: usize = 0x48;
const CCTL_HART_STRIDE: usize = 0x10;

const CCTL_STATUS_OFF: usize = 0x80;
const CCTL_STATUS_BITS: usize = 4;
const CCTL_STATUS_MASK: u32 = 0xf;
const CCTL_STATUS_IDLE: u32 = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
enum Command {
    PaInvalidate = 0x08,
    PaWriteback = 0x09,
    WritebackInvalidateAll = 0x12,
}

impl From<SharedLineCommand> for Command {
    fn from(command: SharedLineCommand) -> Self {
        match command {
            SharedLineCommand::Invalidate => Self::PaInvalidate,
            SharedLineCommand::Writeback => Self::PaWriteback,
        }
    }
}

fn cmd_off(hart: HartId) -> usize {
    CCTL_CMD_BASE + hart.value() * CCTL_HART_STRIDE
}

fn acc_off(hart: HartId) -> usize {
    CCTL_ACC_BASE + hart.value() * CCTL_HART_STRIDE
}

fn status_of(status: u32, hart: HartId) -> u32 {
    u32::try_from(hart.value() * CCTL_STATUS_BITS)
        .ok()
        .and_then(|shift| status.checked_shr(shift))
        .unwrap_or(0)
        & CCTL_STATUS_MASK
}

#[derive(Debug)]
pub struct L2Cache {
    mmio: Mmio,
}

impl L2Cache {
    /// # Safety
    ///
    /// `base_addr` must be the base address of an Andes L2 cache controller.
    #[must_use]
    pub const unsafe fn new(base_addr: usize) -> Self {
        Self {
            mmio: unsafe { Mmio::new(base_addr) },
        }
    }

    fn issue(&self, hart: HartId, command: Command) {
        // Earlier stores must reach the cache before the command does.
        asm::fence_iorw();
        self.mmio.write32(cmd_off(hart), command as u32);
        while status_of(self.mmio.read32(CCTL_STATUS_OFF), hart) != CCTL_STATUS_IDLE {
            hint::spin_loop();
        }
    }
}

impl SharedCache for L2Cache {
    fn line(&self, hart: HartId, command: SharedLineCommand, addr: usize) {
        self.mmio.write_usize(acc_off(hart), addr);
        self.issue(hart, command.into());
    }

    fn writeback_invalidate_all(&self, hart: HartId) {
        self.issue(hart, Command::WritebackInvalidateAll);
    }

    fn set_enabled(&self, enabled: bool) {
        let ctl = self.mmio.read32(CTL_OFF);
        let ctl = if enabled {
            ctl | CTL_ENABLE
        } else {
            ctl & !CTL_ENABLE
        };
        self.mmio.write32(CTL_OFF, ctl);
    }
}
