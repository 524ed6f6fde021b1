use core::hint;

pub fn sfence_vma(vaddr: usize, asid: usize) {
    cfg_if::cfg_if! {
        if #[cfg(any(target_arch = "riscv32", target_arch = "riscv64"))] {
            unsafe {
                core::arch::asm!("sfence.vma {}, {}", in(reg) vaddr, in(reg) asid);
            }
        } else {
            let _ = vaddr;
            let _ = asid;
            unimplemented!("unsupported architecture")
        }
    }
}

pub fn sfence_vma_addr(vaddr: usize) {
    cfg_if::cfg_if! {
        if #[cfg(any(target_arch = "riscv32", target_arch = "riscv64"))] {
            unsafe {
                core::arch::asm!("sfence.vma {}, zero", in(reg) vaddr);
            }
        } else {
            let _ = vaddr;
            unimplemented!("unsupported architecture")
        }
    }
}

pub fn sfence_vma_asid_all(asid: usize) {
    cfg_if::cfg_if! {
        if #[cfg(any(target_arch = "riscv32", target_arch = "riscv64"))] {
            unsafe {
                core::arch::asm!("sfence.vma zero, {}", in(reg) asid);
            }
        } else {
            let _ = asid;
            unimplemented!("unsupported architecture")
        }
    }
}

pub fn sfence_vma_all() {
    cfg_if::cfg_if! {
        if #[cfg(any(target_arch = "riscv32", target_arch = "riscv64"))] {
            unsafe {
                core::arch::asm!("sfence.vma zero, zero");
            }
        } else {
            unimplemented!("unsupported architecture")
        }
    }
}

pub fn fence_i() {
    cfg_if::cfg_if! {
        if #[cfg(any(target_arch = "riscv32", target_arch = "riscv64"))] {
            unsafe {
                core::arch::asm!("fence.i");
            }
        } else {
            unimplemented!("unsupported architecture")
        }
    }
}

/// Orders all prior memory and I/O accesses before all later ones.
pub fn fence_iorw() {
    cfg_if::cfg_if! {
        if #[cfg(any(target_arch = "riscv32", target_arch = "riscv64"))] {
            unsafe {
                core::arch::asm!("fence iorw, iorw");
            }
        } else {
            core::sync::atomic::fence(core::sync::atomic::Ordering::SeqCst);
        }
    }
}

/// Stalls the hart until an interrupt becomes pending.
///
/// The interrupt need not be enabled in `mstatus` for the hart to resume.
pub fn wfi() {
    cfg_if::cfg_if! {
        if #[cfg(any(target_arch = "riscv32", target_arch = "riscv64"))] {
            unsafe {
                core::arch::asm!("wfi", options(nomem, nostack));
            }
        } else {
            hint::spin_loop();
        }
    }
}

pub fn ebreak() {
    cfg_if::cfg_if! {
        if #[cfg(any(target_arch = "riscv32", target_arch = "riscv64"))] {
            unsafe {
                core::arch::asm!("ebreak");
            }
        } else {
            unimplemented!("unsupported architecture")
        }
    }
}

/// Parks the calling hart forever.
pub fn hang() -> ! {
    loop {
        wfi();
        hint::spin_loop();
    }
}
