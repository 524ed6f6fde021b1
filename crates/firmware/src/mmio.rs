use core::ptr;

/// A block of memory-mapped device registers.
#[derive(custom_debug_derive::Debug, Clone, Copy)]
pub(crate) struct Mmio {
    #[debug(format = "{:#x}")]
    base_addr: usize,
}

impl Mmio {
    /// # Safety
    ///
    /// `base_addr` must be the base of a device register block that stays
    /// mapped for the lifetime of the returned value.
    pub(crate) const unsafe fn new(base_addr: usize) -> Self {
        Self { base_addr }
    }

    pub(crate) fn base_addr(self) -> usize {
        self.base_addr
    }

    pub(crate) fn read32(self, offset: usize) -> u32 {
        unsafe { ptr::with_exposed_provenance::<u32>(self.base_addr + offset).read_volatile() }
    }

    pub(crate) fn write32(self, offset: usize, value: u32) {
        unsafe {
            ptr::with_exposed_provenance_mut::<u32>(self.base_addr + offset).write_volatile(value);
        }
    }

    pub(crate) fn write16(self, offset: usize, value: u16) {
        unsafe {
            ptr::with_exposed_provenance_mut::<u16>(self.base_addr + offset).write_volatile(value);
        }
    }

    pub(crate) fn write_usize(self, offset: usize, value: usize) {
        unsafe {
            ptr::with_exposed_provenance_mut::<usize>(self.base_addr + offset)
                .write_volatile(value);
        }
    }
}
