use core::arch::asm;

use hart_mask::HartId;
use riscv::register::mhartid;
use riscv_utils::asm as insn;

use crate::{
    csr::Csr,
    hal::{CsrFile, HartOps},
};

unsafe extern "C" {
    /// Saves the hart context, powers the hart down, and returns once it
    /// has been woken and the context restored.
    fn cpu_suspend2ram();
}

/// Runs `$body` with `$num` bound to the CSR number of `$csr` as a constant,
/// as CSR instructions encode the register number.
macro_rules! with_csr_number {
    ($csr:expr, $num:ident => $body:expr) => {
        match $csr {
            Csr::Mie => {
                const $num: u16 = Csr::Mie.number();
                $body
            }
            Csr::Marchid => {
                const $num: u16 = Csr::Marchid.number();
                $body
            }
            Csr::McacheCtl => {
                const $num: u16 = Csr::McacheCtl.number();
                $body
            }
            Csr::MmiscCtl => {
                const $num: u16 = Csr::MmiscCtl.number();
                $body
            }
            Csr::MpftCtl => {
                const $num: u16 = Csr::MpftCtl.number();
                $body
            }
            Csr::MmscCfg => {
                const $num: u16 = Csr::MmscCfg.number();
                $body
            }
            Csr::MdcmCfg => {
                const $num: u16 = Csr::MdcmCfg.number();
                $body
            }
            Csr::MccctlBeginAddr => {
                const $num: u16 = Csr::MccctlBeginAddr.number();
                $body
            }
            Csr::MccctlCommand => {
                const $num: u16 = Csr::MccctlCommand.number();
                $body
            }
            Csr::Slip => {
                const $num: u16 = Csr::Slip.number();
                $body
            }
        }
    };
}

/// The hart executing the code.
#[derive(Debug, Clone, Copy)]
pub struct LocalHart {
    id: HartId,
}

impl Default for LocalHart {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalHart {
    #[must_use]
    pub fn new() -> Self {
        Self {
            id: HartId::from_raw(mhartid::read()),
        }
    }
}

pub fn current_hart() -> Option<HartId> {
    Some(LocalHart::new().id)
}

impl CsrFile for LocalHart {
    fn read(&self, csr: Csr) -> usize {
        let value: usize;
        with_csr_number!(csr, NUM => unsafe {
            asm!("csrr {value}, {csr}", value = out(reg) value, csr = const NUM, options(nostack));
        });
        value
    }

    fn write(&self, csr: Csr, value: usize) {
        with_csr_number!(csr, NUM => unsafe {
            asm!("csrw {csr}, {value}", csr = const NUM, value = in(reg) value, options(nostack));
        });
    }

    fn set_bits(&self, csr: Csr, bits: usize) {
        with_csr_number!(csr, NUM => unsafe {
            asm!("csrs {csr}, {bits}", csr = const NUM, bits = in(reg) bits, options(nostack));
        });
    }

    fn clear_bits(&self, csr: Csr, bits: usize) {
        with_csr_number!(csr, NUM => unsafe {
            asm!("csrc {csr}, {bits}", csr = const NUM, bits = in(reg) bits, options(nostack));
        });
    }
}

impl HartOps for LocalHart {
    fn hart_id(&self) -> HartId {
        self.id
    }

    fn fence_i(&self) {
        insn::fence_i();
    }

    fn sfence_vma(&self, addr: Option<usize>, asid: Option<usize>) {
        match (addr, asid) {
            (Some(addr), Some(asid)) => insn::sfence_vma(addr, asid),
            (Some(addr), None) => insn::sfence_vma_addr(addr),
            (None, Some(asid)) => insn::sfence_vma_asid_all(asid),
            (None, None) => insn::sfence_vma_all(),
        }
    }

    fn wait_for_interrupt(&self) {
        insn::wfi();
    }

    fn suspend_to_ram(&self) {
        unsafe { cpu_suspend2ram() }
    }

    fn debug_trap(&self) {
        insn::ebreak();
    }

    fn park(&self) -> ! {
        insn::hang()
    }
}
