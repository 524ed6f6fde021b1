//! In-memory stand-ins for the hardware seams.

use std::{
    collections::{HashMap, HashSet},
    sync::{Arc, Mutex},
    thread,
};

use hart_mask::HartId;

use crate::{
    csr::Csr,
    hal::{
        CsrFile, HartOps, Ipi, PmaRegions, PowerControl, SharedCache, SharedLineCommand, Triggers,
        Watchdog,
    },
    smu::{PcsStatus, SleepDepth, WakeEvents},
};

/// Something a [`MockHart`] did besides touching a CSR.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HartEvent {
    FenceI,
    SfenceVma(Option<usize>, Option<usize>),
    Wfi,
    SuspendToRam,
    DebugTrap,
}

#[derive(Debug, Default)]
struct HaltSnapshot {
    mie: Option<usize>,
    mcache_ctl: Option<usize>,
}

/// A hart whose CSRs live in a map.
///
/// CCTL command writes are logged together with the begin address written
/// since the previous command. Halting (`wfi`, suspend to RAM) is routed to
/// the attached [`MockSoc`], if any, and blocks until the SoC releases the
/// hart.
#[derive(Debug)]
pub struct MockHart {
    id: HartId,
    csrs: Mutex<HashMap<Csr, usize>>,
    begin_addr: Mutex<Option<usize>>,
    cctl: Mutex<Vec<(Option<usize>, usize)>>,
    events: Mutex<Vec<HartEvent>>,
    halt: Mutex<HaltSnapshot>,
    soc: Option<Arc<MockSoc>>,
}

impl MockHart {
    pub fn new(id: usize) -> Self {
        Self {
            id: HartId::from_raw(id),
            csrs: Mutex::default(),
            begin_addr: Mutex::default(),
            cctl: Mutex::default(),
            events: Mutex::default(),
            halt: Mutex::default(),
            soc: None,
        }
    }

    /// Harts `0..count`, each reporting an L1 line of `line_size` bytes.
    pub fn many(count: usize, line_size: usize) -> Vec<Self> {
        assert!(line_size.is_power_of_two() && line_size >= 4);
        let dsz = usize::try_from(line_size.trailing_zeros()).unwrap() - 2;
        (0..count)
            .map(|id| {
                let hart = Self::new(id);
                hart.write(Csr::MdcmCfg, dsz << 6);
                hart
            })
            .collect()
    }

    pub fn with_soc(id: usize, soc: Arc<MockSoc>) -> Self {
        Self {
            soc: Some(soc),
            ..Self::new(id)
        }
    }

    pub fn cctl_log(&self) -> Vec<(Option<usize>, usize)> {
        self.cctl.lock().unwrap().clone()
    }

    pub fn clear_log(&self) {
        self.cctl.lock().unwrap().clear();
        *self.begin_addr.lock().unwrap() = None;
    }

    pub fn events(&self) -> Vec<HartEvent> {
        self.events.lock().unwrap().clone()
    }

    /// `mie` as it was when the hart last halted.
    pub fn mie_during_halt(&self) -> Option<usize> {
        self.halt.lock().unwrap().mie
    }

    /// `mcache_ctl` as it was when the hart last halted.
    pub fn mcache_ctl_during_halt(&self) -> Option<usize> {
        self.halt.lock().unwrap().mcache_ctl
    }

    fn record(&self, event: HartEvent) {
        self.events.lock().unwrap().push(event);
    }

    fn halt(&self, event: HartEvent) {
        self.record(event);
        *self.halt.lock().unwrap() = HaltSnapshot {
            mie: Some(self.read(Csr::Mie)),
            mcache_ctl: Some(self.read(Csr::McacheCtl)),
        };
        if let Some(soc) = &self.soc {
            soc.halt(self.id);
        }
    }
}

impl CsrFile for MockHart {
    fn read(&self, csr: Csr) -> usize {
        self.csrs.lock().unwrap().get(&csr).copied().unwrap_or(0)
    }

    fn write(&self, csr: Csr, value: usize) {
        match csr {
            Csr::MccctlBeginAddr => *self.begin_addr.lock().unwrap() = Some(value),
            Csr::MccctlCommand => {
                let addr = self.begin_addr.lock().unwrap().take();
                self.cctl.lock().unwrap().push((addr, value));
            }
            _ => {}
        }
        self.csrs.lock().unwrap().insert(csr, value);
    }

    fn set_bits(&self, csr: Csr, bits: usize) {
        *self.csrs.lock().unwrap().entry(csr).or_default() |= bits;
    }

    fn clear_bits(&self, csr: Csr, bits: usize) {
        *self.csrs.lock().unwrap().entry(csr).or_default() &= !bits;
    }
}

impl HartOps for MockHart {
    fn hart_id(&self) -> HartId {
        self.id
    }

    fn fence_i(&self) {
        self.record(HartEvent::FenceI);
    }

    fn sfence_vma(&self, addr: Option<usize>, asid: Option<usize>) {
        self.record(HartEvent::SfenceVma(addr, asid));
    }

    fn wait_for_interrupt(&self) {
        self.halt(HartEvent::Wfi);
    }

    fn suspend_to_ram(&self) {
        self.halt(HartEvent::SuspendToRam);
    }

    fn debug_trap(&self) {
        self.record(HartEvent::DebugTrap);
    }

    fn park(&self) -> ! {
        panic!("hart {} parked", self.id)
    }
}

/// IPI controller remembering every notification.
#[derive(Debug)]
pub struct MockIpi {
    sent: Mutex<Vec<usize>>,
    pending: Mutex<Vec<bool>>,
}

impl MockIpi {
    pub fn new(hart_count: usize) -> Self {
        Self {
            sent: Mutex::default(),
            pending: Mutex::new(vec![false; hart_count]),
        }
    }

    /// Targets of every IPI sent so far, in order.
    pub fn sent_to(&self) -> Vec<usize> {
        self.sent.lock().unwrap().clone()
    }

    pub fn is_pending(&self, hart: usize) -> bool {
        self.pending.lock().unwrap()[hart]
    }
}

impl Ipi for MockIpi {
    fn send(&self, hart: HartId) {
        self.sent.lock().unwrap().push(hart.value());
        self.pending.lock().unwrap()[hart.value()] = true;
    }

    fn clear(&self, hart: HartId) {
        self.pending.lock().unwrap()[hart.value()] = false;
    }
}

/// Something the power controller or the watchdog was told to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SocEvent {
    WakeEvents(usize, u32),
    Sleep(usize, SleepDepth),
    SleepCancelled(usize),
    Halted(usize),
    ResetVector(usize, u64),
    WatchdogArmed,
}

/// Power controller and watchdog of a simulated SoC.
///
/// A hart's slot reports the commanded sleep depth only while that hart is
/// halted. A halted hart stays halted until it has been [released].
///
/// [released]: Self::release
#[derive(Debug, Default)]
pub struct MockSoc {
    events: Mutex<Vec<SocEvent>>,
    commanded: Mutex<HashMap<usize, SleepDepth>>,
    halted: Mutex<HashSet<usize>>,
    released: Mutex<HashSet<usize>>,
}

impl MockSoc {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<SocEvent> {
        self.events.lock().unwrap().clone()
    }

    /// Lets `hart` return from its current and every later halt.
    pub fn release(&self, hart: usize) {
        self.released.lock().unwrap().insert(hart);
    }

    fn record(&self, event: SocEvent) {
        self.events.lock().unwrap().push(event);
    }

    fn halt(&self, hart: HartId) {
        let id = hart.value();
        self.record(SocEvent::Halted(id));
        self.halted.lock().unwrap().insert(id);
        while !self.released.lock().unwrap().contains(&id) {
            thread::yield_now();
        }
        self.halted.lock().unwrap().remove(&id);
        self.commanded.lock().unwrap().remove(&id);
    }
}

impl PowerControl for MockSoc {
    fn set_wakeup_events(&self, hart: HartId, events: WakeEvents) {
        self.record(SocEvent::WakeEvents(hart.value(), events.bits()));
    }

    fn set_sleep(&self, hart: HartId, depth: SleepDepth) {
        self.commanded.lock().unwrap().insert(hart.value(), depth);
        self.record(SocEvent::Sleep(hart.value(), depth));
    }

    fn cancel_sleep(&self, hart: HartId) {
        self.commanded.lock().unwrap().remove(&hart.value());
        self.record(SocEvent::SleepCancelled(hart.value()));
    }

    fn status(&self, hart: HartId) -> PcsStatus {
        let id = hart.value();
        let halted = self.halted.lock().unwrap().contains(&id);
        match self.commanded.lock().unwrap().get(&id) {
            Some(&depth) if halted => PcsStatus::asleep(depth),
            _ => PcsStatus(0),
        }
    }

    fn set_reset_vector(&self, hart: HartId, addr: u64) {
        self.record(SocEvent::ResetVector(hart.value(), addr));
    }
}

impl Watchdog for MockSoc {
    fn arm_reset(&self) {
        self.record(SocEvent::WatchdogArmed);
    }
}

/// Something the shared cache was told to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SharedCacheEvent {
    Line(usize, SharedLineCommand, usize),
    WritebackInvalidateAll(usize),
    Enabled(bool),
}

#[derive(Debug, Default)]
pub struct MockSharedCache {
    events: Mutex<Vec<SharedCacheEvent>>,
}

impl MockSharedCache {
    pub fn events(&self) -> Vec<SharedCacheEvent> {
        self.events.lock().unwrap().clone()
    }

    /// Line commands only, as `(hart, command, address)`.
    pub fn commands(&self) -> Vec<(usize, SharedLineCommand, usize)> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                SharedCacheEvent::Line(hart, command, addr) => Some((hart, command, addr)),
                _ => None,
            })
            .collect()
    }

    fn record(&self, event: SharedCacheEvent) {
        self.events.lock().unwrap().push(event);
    }
}

impl SharedCache for MockSharedCache {
    fn line(&self, hart: HartId, command: SharedLineCommand, addr: usize) {
        self.record(SharedCacheEvent::Line(hart.value(), command, addr));
    }

    fn writeback_invalidate_all(&self, hart: HartId) {
        self.record(SharedCacheEvent::WritebackInvalidateAll(hart.value()));
    }

    fn set_enabled(&self, enabled: bool) {
        self.record(SharedCacheEvent::Enabled(enabled));
    }
}

/// Trigger module returning `status` for every configuration.
#[derive(Debug, Default)]
pub struct MockTriggers {
    pub status: usize,
    pub(crate) calls: Mutex<Vec<(usize, usize, bool)>>,
}

impl MockTriggers {
    pub fn calls(&self) -> Vec<(usize, usize, bool)> {
        self.calls.lock().unwrap().clone()
    }
}

impl Triggers for MockTriggers {
    fn set(&self, kind: usize, data: usize, user: bool) -> usize {
        self.calls.lock().unwrap().push((kind, data, user));
        self.status
    }
}

/// PMA bookkeeping keyed by region base address.
#[derive(Debug, Default)]
pub struct MockPma {
    regions: Mutex<HashMap<usize, (usize, usize, usize)>>,
}

impl MockPma {
    pub fn region(&self, addr: usize) -> Option<(usize, usize, usize)> {
        self.regions.lock().unwrap().get(&addr).copied()
    }
}

impl PmaRegions for MockPma {
    fn set(&self, addr: usize, size: usize, flags: usize, entry: usize) -> isize {
        self.regions.lock().unwrap().insert(addr, (size, flags, entry));
        0
    }

    fn free(&self, addr: usize) -> isize {
        match self.regions.lock().unwrap().remove(&addr) {
            Some(_) => 0,
            None => -1,
        }
    }
}
