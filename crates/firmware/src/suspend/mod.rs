//! Per-hart sleep requests and the suspend/resume sequence.

use core::sync::atomic::{AtomicU32, Ordering};

use hart_mask::HartId;

use crate::hal::HartOps;

pub use self::orchestrator::{HartState, Role, SuspendError, SuspendOrchestrator};

mod orchestrator;

/// Sleep depth requested for a hart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum SuspendMode {
    Normal = 0,
    LightSleep = 1,
    DeepSleep = 2,
    CpuHotplugDeepSleep = 3,
}

impl SuspendMode {
    #[must_use]
    pub fn from_raw(value: u32) -> Option<Self> {
        match value {
            0 => Some(Self::Normal),
            1 => Some(Self::LightSleep),
            2 => Some(Self::DeepSleep),
            3 => Some(Self::CpuHotplugDeepSleep),
            _ => None,
        }
    }
}

/// One mode slot per hart.
///
/// Any hart may request a mode for any hart with [`set_mode`]. Only the hart
/// a slot belongs to can consume or reset it, through the [`OwnedSlot`]
/// obtained from its own [`HartOps`].
///
/// [`set_mode`]: Self::set_mode
#[derive(Debug)]
pub struct SuspendRegistry<const HARTS: usize> {
    slots: [AtomicU32; HARTS],
}

impl<const HARTS: usize> Default for SuspendRegistry<HARTS> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const HARTS: usize> SuspendRegistry<HARTS> {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            slots: [const { AtomicU32::new(SuspendMode::Normal as u32) }; HARTS],
        }
    }

    /// Records `mode` for `hart`.
    ///
    /// The value is not validated here; the suspend sequence rejects values
    /// it does not know.
    pub fn set_mode(&self, hart: HartId, mode: u32) {
        self.slots[hart.value()].store(mode, Ordering::Release);
    }

    /// The mode currently requested for `hart`.
    #[must_use]
    pub fn mode(&self, hart: HartId) -> u32 {
        self.slots[hart.value()].load(Ordering::Acquire)
    }

    /// The calling hart's own slot.
    pub fn owned<H>(&self, hart: &H) -> OwnedSlot<'_>
    where
        H: HartOps + ?Sized,
    {
        OwnedSlot {
            slot: &self.slots[hart.hart_id().value()],
        }
    }

    /// Takes the mode requested for the calling hart, leaving it `Normal`.
    pub fn get_and_clear<H>(&self, hart: &H) -> u32
    where
        H: HartOps + ?Sized,
    {
        self.owned(hart).get_and_clear()
    }
}

/// The slot of the hart that obtained it.
#[derive(Debug)]
pub struct OwnedSlot<'a> {
    slot: &'a AtomicU32,
}

impl OwnedSlot<'_> {
    #[must_use]
    pub fn get_and_clear(&self) -> u32 {
        self.slot.swap(SuspendMode::Normal as u32, Ordering::AcqRel)
    }

    pub fn reset(&self) {
        self.slot.store(SuspendMode::Normal as u32, Ordering::Release);
    }
}
