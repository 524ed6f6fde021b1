use hart_mask::HartId;

use crate::{
    csr::Csr,
    hal::{CsrFile, HartOps},
};

#[derive(Debug, Clone, Copy)]
pub struct LocalHart(());

impl Default for LocalHart {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalHart {
    #[must_use]
    pub fn new() -> Self {
        unimplemented!("unsupported architecture");
    }
}

pub fn current_hart() -> Option<HartId> {
    None
}

impl CsrFile for LocalHart {
    fn read(&self, _csr: Csr) -> usize {
        unimplemented!("unsupported architecture");
    }

    fn write(&self, _csr: Csr, _value: usize) {
        unimplemented!("unsupported architecture");
    }

    fn set_bits(&self, _csr: Csr, _bits: usize) {
        unimplemented!("unsupported architecture");
    }

    fn clear_bits(&self, _csr: Csr, _bits: usize) {
        unimplemented!("unsupported architecture");
    }
}

impl HartOps for LocalHart {
    fn hart_id(&self) -> HartId {
        unimplemented!("unsupported architecture");
    }

    fn fence_i(&self) {
        unimplemented!("unsupported architecture");
    }

    fn sfence_vma(&self, _addr: Option<usize>, _asid: Option<usize>) {
        unimplemented!("unsupported architecture");
    }

    fn wait_for_interrupt(&self) {
        unimplemented!("unsupported architecture");
    }

    fn suspend_to_ram(&self) {
        unimplemented!("unsupported architecture");
    }

    fn debug_trap(&self) {
        unimplemented!("unsupported architecture");
    }

    fn park(&self) -> ! {
        unimplemented!("unsupported architecture");
    }
}
