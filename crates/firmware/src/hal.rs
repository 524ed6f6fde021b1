//! Hardware seams of the runtime.
//!
//! Everything the coordination logic needs from the hardware, or from the
//! platform code that brings the hardware up, goes through these traits.

use hart_mask::HartId;

use crate::{
    csr::Csr,
    smu::{PcsStatus, SleepDepth, WakeEvents},
};

/// Access to the executing hart's control/status registers.
pub trait CsrFile {
    fn read(&self, csr: Csr) -> usize;
    fn write(&self, csr: Csr, value: usize);
    fn set_bits(&self, csr: Csr, bits: usize);
    fn clear_bits(&self, csr: Csr, bits: usize);
}

/// Privileged actions local to the executing hart.
///
/// An implementation always describes the hart that is running the code, so
/// `hart_id` identifies the caller.
pub trait HartOps: CsrFile {
    fn hart_id(&self) -> HartId;

    /// `fence.i`
    fn fence_i(&self);

    /// `sfence.vma` for one page (`Some(addr)`) or everything, optionally
    /// limited to one address space.
    fn sfence_vma(&self, addr: Option<usize>, asid: Option<usize>);

    /// Stops fetching until an interrupt is pending.
    fn wait_for_interrupt(&self);

    /// Saves hart context, halts, and restores the context on wake.
    ///
    /// Returns once the hart has been woken and its state restored.
    fn suspend_to_ram(&self);

    /// Raises a breakpoint exception for an attached debugger.
    fn debug_trap(&self);

    /// Halts the hart permanently.
    fn park(&self) -> !;
}

/// Inter-processor notification.
pub trait Ipi: Sync {
    fn send(&self, hart: HartId);
    fn clear(&self, hart: HartId);
}

/// The power-control unit's per-hart slots.
pub trait PowerControl: Sync {
    fn set_wakeup_events(&self, hart: HartId, events: WakeEvents);
    fn set_sleep(&self, hart: HartId, depth: SleepDepth);
    /// Withdraws a sleep command the hart has not acted on yet, along with
    /// its wake events.
    fn cancel_sleep(&self, hart: HartId);
    fn status(&self, hart: HartId) -> PcsStatus;
    fn set_reset_vector(&self, hart: HartId, addr: u64);
}

/// A watchdog able to reset the whole platform.
pub trait Watchdog: Sync {
    /// Unlocks the watchdog and arms a full platform reset.
    fn arm_reset(&self);
}

/// Maintenance on a cache level shared by every hart.
pub trait SharedCache: Sync {
    fn line(&self, hart: HartId, command: SharedLineCommand, addr: usize);
    fn writeback_invalidate_all(&self, hart: HartId);
    fn set_enabled(&self, enabled: bool);
}

/// Line-granular shared cache commands, by physical address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SharedLineCommand {
    Invalidate,
    Writeback,
}

/// Debug trigger configuration.
pub trait Triggers: Sync {
    /// Configures a trigger of `kind`; returns the status word handed back to
    /// the caller.
    fn set(&self, kind: usize, data: usize, user: bool) -> usize;
}

/// Physical memory attribute region bookkeeping.
pub trait PmaRegions: Sync {
    fn set(&self, addr: usize, size: usize, flags: usize, entry: usize) -> isize;
    fn free(&self, addr: usize) -> isize;
}
