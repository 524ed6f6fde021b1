use core::sync::atomic::{AtomicU8, AtomicUsize, Ordering};

use hart_mask::{HartId, HartMask};
use snafu::{ResultExt as _, Snafu};

use super::{OwnedSlot, SuspendMode, SuspendRegistry};
use crate::{
    cache::{self, CctlCommand},
    csr::{self, Csr, Interrupts},
    error,
    hal::{HartOps, Ipi, PowerControl, SharedCache},
    poll::{PollPolicy, PollTimeout},
    smu::{SleepDepth, WakeEvents},
};

/// Where a hart is in its sleep cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum HartState {
    Running = 0,
    EnteringSleep = 1,
    Asleep = 2,
    Resuming = 3,
}

impl HartState {
    fn from_raw(value: u8) -> Self {
        match value {
            1 => Self::EnteringSleep,
            2 => Self::Asleep,
            3 => Self::Resuming,
            _ => Self::Running,
        }
    }
}

/// The part a hart plays in a power transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Waits for its siblings and commits the domain-wide change.
    Main,
    /// Sleeps alongside the main hart.
    Secondary,
    /// Powers down alone, outside any multi-hart transition.
    Hotplug,
}

impl Role {
    /// Interrupt enables cleared for the duration of the sleep.
    ///
    /// The main hart stops supervisor interrupts and the machine timer so
    /// that only its wake sources can end the transition. Secondary harts
    /// keep everything, since their wake source is gated in the power
    /// controller. A hotplugged hart keeps only the software interrupt it is
    /// brought back with.
    fn masked_interrupts(self) -> usize {
        match self {
            Self::Main => (Interrupts::SUPERVISOR | Interrupts::MTI).bits(),
            Self::Secondary => 0,
            Self::Hotplug => !Interrupts::MSI.bits(),
        }
    }

    fn wake_events(self, wake_mask: u32) -> WakeEvents {
        match self {
            Self::Main => WakeEvents::for_role(true, wake_mask),
            Self::Secondary => WakeEvents::for_role(false, wake_mask),
            Self::Hotplug => WakeEvents::for_role(true, 0),
        }
    }
}

#[derive(Debug, Snafu)]
pub enum SuspendError {
    #[snafu(display("{reached} of {expected} sibling harts reached {depth:?} sleep"))]
    Barrier {
        depth: SleepDepth,
        expected: usize,
        reached: usize,
        source: PollTimeout,
        #[snafu(implicit)]
        location: snafu::Location,
    },
}

/// Runs the sleep cycle of each hart.
pub struct SuspendOrchestrator<'a, const HARTS: usize> {
    hart_count: usize,
    registry: SuspendRegistry<HARTS>,
    states: [AtomicU8; HARTS],
    /// `mie` bits each hart cleared and must set again on wake.
    masked: [AtomicUsize; HARTS],
    ipi: &'a dyn Ipi,
    power: Option<&'a dyn PowerControl>,
    shared_cache: Option<&'a dyn SharedCache>,
    poll_policy: PollPolicy,
}

impl<'a, const HARTS: usize> SuspendOrchestrator<'a, HARTS> {
    /// # Panics
    ///
    /// Panics if `hart_count` exceeds `HARTS`.
    #[must_use]
    pub fn new(
        hart_count: usize,
        ipi: &'a dyn Ipi,
        power: Option<&'a dyn PowerControl>,
        shared_cache: Option<&'a dyn SharedCache>,
        poll_policy: PollPolicy,
    ) -> Self {
        assert!(hart_count <= HARTS, "{hart_count} harts exceed capacity {HARTS}");
        Self {
            hart_count,
            registry: SuspendRegistry::new(),
            states: [const { AtomicU8::new(HartState::Running as u8) }; HARTS],
            masked: [const { AtomicUsize::new(0) }; HARTS],
            ipi,
            power,
            shared_cache,
            poll_policy,
        }
    }

    #[must_use]
    pub fn registry(&self) -> &SuspendRegistry<HARTS> {
        &self.registry
    }

    #[must_use]
    pub fn state(&self, hart: HartId) -> HartState {
        HartState::from_raw(self.states[hart.value()].load(Ordering::Acquire))
    }

    fn set_state(&self, hart: HartId, state: HartState) {
        debug!("now {state:?}");
        self.states[hart.value()].store(state as u8, Ordering::Release);
    }

    /// Clears the interrupt enables `role` does not sleep with.
    pub fn mask_interrupts<H>(&self, hart: &H, role: Role)
    where
        H: HartOps + ?Sized,
    {
        let mask = role.masked_interrupts();
        let cleared = hart.read(Csr::Mie) & mask;
        hart.clear_bits(Csr::Mie, mask);
        self.masked[hart.hart_id().value()].fetch_or(cleared, Ordering::Relaxed);
    }

    /// Sets again every interrupt enable cleared by
    /// [`mask_interrupts`](Self::mask_interrupts).
    pub fn restore_interrupts<H>(&self, hart: &H)
    where
        H: HartOps + ?Sized,
    {
        let cleared = self.masked[hart.hart_id().value()].swap(0, Ordering::Relaxed);
        hart.set_bits(Csr::Mie, cleared);
    }

    /// Runs the calling hart's sleep cycle for the mode requested in its
    /// registry slot.
    ///
    /// `main` designates the calling hart as the one that waits for its
    /// siblings before committing the transition. `wake_mask` lists the
    /// extra wake sources of the main hart.
    ///
    /// Returns after the hart has woken up and been restored, or at once if
    /// no sleep is requested. An unknown mode, or a sleep requested on a
    /// platform without a power controller, parks the hart for good.
    pub fn enter<H>(&self, hart: &H, main: bool, wake_mask: u32) -> Result<(), SuspendError>
    where
        H: HartOps + ?Sized,
    {
        let me = hart.hart_id();
        let slot = self.registry.owned(hart);

        let raw = slot.get_and_clear();
        let Some(mode) = SuspendMode::from_raw(raw) else {
            error::fatal(hart, format_args!("unsupported suspend mode {raw}"));
        };
        let role = match mode {
            SuspendMode::Normal => return Ok(()),
            SuspendMode::CpuHotplugDeepSleep => {
                if me.value() == 0 && !csr::is_andestar45_series(hart.read(Csr::Marchid)) {
                    // Hart 0 shares its power domain with the L2 cache on
                    // pre-45-series cores.
                    info!("hart 0 stays up, its domain cannot power off");
                    return Ok(());
                }
                Role::Hotplug
            }
            SuspendMode::LightSleep | SuspendMode::DeepSleep if main => Role::Main,
            SuspendMode::LightSleep | SuspendMode::DeepSleep => Role::Secondary,
        };
        let Some(power) = self.power else {
            error::fatal(hart, format_args!("{mode:?} requested without a power controller"));
        };
        let depth = match mode {
            SuspendMode::LightSleep => SleepDepth::Light,
            _ => SleepDepth::Deep,
        };

        self.set_state(me, HartState::EnteringSleep);
        info!("entering {mode:?} as {role:?}");

        power.set_wakeup_events(me, role.wake_events(wake_mask));
        self.mask_interrupts(hart, role);
        power.set_sleep(me, depth);

        let shared_cache = if role == Role::Main {
            if let Err(err) = self.wait_for_siblings(power, me, depth) {
                warn!("abandoning {mode:?}: {err}");
                self.abandon(hart, power, &slot, depth);
                return Err(err);
            }
            self.shared_cache
        } else {
            None
        };

        // The L1 drains into the L2 before the L2 drains to memory.
        match mode {
            SuspendMode::LightSleep => cache::set_dcache(hart, false),
            _ if shared_cache.is_some() => cache::cctl(hart, CctlCommand::WritebackInvalidateAll),
            _ => {}
        }
        if let Some(shared) = shared_cache {
            shared.writeback_invalidate_all(me);
            shared.set_enabled(false);
        }

        self.set_state(me, HartState::Asleep);
        match mode {
            SuspendMode::LightSleep => hart.wait_for_interrupt(),
            _ => hart.suspend_to_ram(),
        }
        self.set_state(me, HartState::Resuming);

        if let Some(shared) = shared_cache {
            shared.set_enabled(true);
        }
        if mode == SuspendMode::LightSleep {
            cache::set_dcache(hart, true);
        }

        self.restore_interrupts(hart);
        slot.reset();
        self.set_state(me, HartState::Running);
        info!("resumed from {mode:?}");
        Ok(())
    }

    /// Backs the main hart out of a transition its siblings did not all
    /// reach: withdraws its own sleep command and wakes every sibling that
    /// already went down.
    fn abandon<H>(
        &self,
        hart: &H,
        power: &dyn PowerControl,
        slot: &OwnedSlot<'_>,
        depth: SleepDepth,
    ) where
        H: HartOps + ?Sized,
    {
        let me = hart.hart_id();
        power.cancel_sleep(me);
        for sibling in HartMask::all_except(self.hart_count, me).iter() {
            if power.status(sibling).is_asleep(depth) {
                debug!("waking hart {sibling}");
                self.ipi.send(sibling);
            }
        }
        self.restore_interrupts(hart);
        slot.reset();
        self.set_state(me, HartState::Running);
    }

    /// Spins until every hart but `me` reports `depth` sleep.
    fn wait_for_siblings(
        &self,
        power: &dyn PowerControl,
        me: HartId,
        depth: SleepDepth,
    ) -> Result<(), SuspendError> {
        let siblings = HartMask::all_except(self.hart_count, me);
        let expected = siblings.len();
        let reached = || {
            siblings
                .iter()
                .filter(|&hart| power.status(hart).is_asleep(depth))
                .count()
        };
        debug!("waiting for {expected} siblings to reach {depth:?} sleep");
        self.poll_policy
            .wait_until(|| reached() == expected)
            .with_context(|_| BarrierSnafu {
                depth,
                expected,
                reached: reached(),
            })
    }
}

#[cfg(test)]
mod tests {
    use std::{
        sync::{Arc, Mutex},
        thread,
    };

    use super::*;
    use crate::{
        hal::{CsrFile as _, SharedLineCommand},
        smu::PcsStatus,
        testing::{
            HartEvent, MockHart, MockIpi, MockSharedCache, MockSoc, SharedCacheEvent, SocEvent,
        },
    };

    const HARTS: usize = 8;

    fn hart(id: usize) -> HartId {
        HartId::from_raw(id)
    }

    fn orchestrator<'a>(
        hart_count: usize,
        ipi: &'a MockIpi,
        soc: &'a MockSoc,
    ) -> SuspendOrchestrator<'a, HARTS> {
        SuspendOrchestrator::new(hart_count, ipi, Some(soc), None, PollPolicy::Forever)
    }

    #[test]
    fn test_normal_mode_returns_at_once() {
        let soc = Arc::new(MockSoc::new());
        let ipi = MockIpi::new(HARTS);
        let orchestrator = orchestrator(2, &ipi, &soc);
        let me = MockHart::new(1);

        orchestrator.enter(&me, false, 0).unwrap();
        assert!(me.events().is_empty());
        assert!(soc.events().is_empty());
        assert_eq!(orchestrator.state(hart(1)), HartState::Running);
    }

    #[test]
    fn test_slot_is_normal_after_wake_for_every_mode() {
        let soc = Arc::new(MockSoc::new());
        let ipi = MockIpi::new(HARTS);
        let orchestrator = orchestrator(2, &ipi, &soc);
        let me = MockHart::with_soc(1, Arc::clone(&soc));
        soc.release(1);

        for mode in [
            SuspendMode::Normal,
            SuspendMode::LightSleep,
            SuspendMode::DeepSleep,
            SuspendMode::CpuHotplugDeepSleep,
        ] {
            orchestrator.registry().set_mode(hart(1), mode as u32);
            orchestrator.enter(&me, false, 0).unwrap();
            assert_eq!(orchestrator.registry().mode(hart(1)), SuspendMode::Normal as u32);
            assert_eq!(orchestrator.state(hart(1)), HartState::Running);
        }
        assert_eq!(
            me.events(),
            [HartEvent::Wfi, HartEvent::SuspendToRam, HartEvent::SuspendToRam]
        );
    }

    #[test]
    #[should_panic(expected = "parked")]
    fn test_unknown_mode_is_fatal() {
        let ipi = MockIpi::new(HARTS);
        let orchestrator =
            SuspendOrchestrator::<HARTS>::new(2, &ipi, None, None, PollPolicy::Forever);
        let me = MockHart::new(0);
        orchestrator.registry().set_mode(hart(0), 9);
        let _ = orchestrator.enter(&me, true, 0);
    }

    #[test]
    fn test_light_sleep_secondary() {
        let soc = Arc::new(MockSoc::new());
        let ipi = MockIpi::new(HARTS);
        let orchestrator = orchestrator(2, &ipi, &soc);
        let me = MockHart::with_soc(1, Arc::clone(&soc));
        me.write(Csr::Mie, (Interrupts::MSI | Interrupts::STI).bits());
        me.write(Csr::McacheCtl, 0x3);
        soc.release(1);

        orchestrator.registry().set_mode(hart(1), SuspendMode::LightSleep as u32);
        orchestrator.enter(&me, false, 0xff).unwrap();

        assert_eq!(
            soc.events(),
            [
                SocEvent::WakeEvents(1, WakeEvents::MSIP.bits()),
                SocEvent::Sleep(1, SleepDepth::Light),
                SocEvent::Halted(1),
            ]
        );
        assert_eq!(me.read(Csr::McacheCtl), 0x3);
        assert_eq!(me.read(Csr::Mie), (Interrupts::MSI | Interrupts::STI).bits());
        assert_eq!(me.mie_during_halt(), Some((Interrupts::MSI | Interrupts::STI).bits()));
        assert_eq!(me.mcache_ctl_during_halt(), Some(0x1));
    }

    #[test]
    fn test_hotplug_masks_all_but_software_interrupt() {
        let soc = Arc::new(MockSoc::new());
        let ipi = MockIpi::new(HARTS);
        let orchestrator = orchestrator(2, &ipi, &soc);
        let me = MockHart::with_soc(1, Arc::clone(&soc));
        let enabled = (Interrupts::MSI | Interrupts::MTI | Interrupts::MEI).bits();
        me.write(Csr::Mie, enabled);
        soc.release(1);

        orchestrator
            .registry()
            .set_mode(hart(1), SuspendMode::CpuHotplugDeepSleep as u32);
        orchestrator.enter(&me, true, 0xff).unwrap();

        assert_eq!(me.mie_during_halt(), Some(Interrupts::MSI.bits()));
        assert_eq!(me.read(Csr::Mie), enabled);
        assert_eq!(
            soc.events()[0],
            SocEvent::WakeEvents(1, WakeEvents::MSIP.bits())
        );
    }

    #[test]
    fn test_hotplug_skips_hart0_before_45_series() {
        let soc = Arc::new(MockSoc::new());
        let ipi = MockIpi::new(HARTS);
        let orchestrator = orchestrator(2, &ipi, &soc);
        let me = MockHart::with_soc(0, Arc::clone(&soc));
        me.write(Csr::Marchid, 0x8000_0025);

        orchestrator
            .registry()
            .set_mode(hart(0), SuspendMode::CpuHotplugDeepSleep as u32);
        orchestrator.enter(&me, false, 0).unwrap();
        assert!(soc.events().is_empty());
        assert_eq!(orchestrator.registry().mode(hart(0)), 0);

        me.write(Csr::Marchid, 0x8000_0045);
        soc.release(0);
        orchestrator
            .registry()
            .set_mode(hart(0), SuspendMode::CpuHotplugDeepSleep as u32);
        orchestrator.enter(&me, false, 0).unwrap();
        assert!(soc.events().contains(&SocEvent::Halted(0)));
    }

    #[test]
    fn test_main_hart_waits_for_every_sibling() {
        let soc = Arc::new(MockSoc::new());
        let ipi = MockIpi::new(HARTS);
        let l2 = MockSharedCache::default();
        let orchestrator = SuspendOrchestrator::<HARTS>::new(
            4,
            &ipi,
            Some(&*soc),
            Some(&l2),
            PollPolicy::Forever,
        );
        let harts: Vec<_> = (0..4)
            .map(|id| MockHart::with_soc(id, Arc::clone(&soc)))
            .collect();
        let enabled = Interrupts::SUPERVISOR | Interrupts::MTI | Interrupts::MSI;
        harts[0].write(Csr::Mie, enabled.bits());
        soc.release(0);

        thread::scope(|s| {
            for sibling in &harts[1..] {
                let orchestrator = &orchestrator;
                s.spawn(move || {
                    let id = sibling.hart_id();
                    orchestrator
                        .registry()
                        .set_mode(id, SuspendMode::DeepSleep as u32);
                    orchestrator.enter(sibling, false, 0).unwrap();
                });
            }

            orchestrator
                .registry()
                .set_mode(hart(0), SuspendMode::DeepSleep as u32);
            orchestrator.enter(&harts[0], true, 0x4).unwrap();

            for id in 1..4 {
                soc.release(id);
            }
        });

        let events = soc.events();
        let main_halt = events
            .iter()
            .position(|&event| event == SocEvent::Halted(0))
            .unwrap();
        for id in 1..4 {
            let halt = events
                .iter()
                .position(|&event| event == SocEvent::Halted(id))
                .unwrap();
            assert!(halt < main_halt, "hart {id} was not asleep before the main hart");
        }
        assert!(events.contains(&SocEvent::WakeEvents(0, WakeEvents::MSIP.bits() | 0x4)));
        assert_eq!(harts[0].mie_during_halt(), Some(Interrupts::MSI.bits()));
        assert_eq!(
            l2.events(),
            [
                SharedCacheEvent::WritebackInvalidateAll(0),
                SharedCacheEvent::Enabled(false),
                SharedCacheEvent::Enabled(true),
            ]
        );
        for id in 0..4 {
            assert_eq!(orchestrator.state(hart(id)), HartState::Running);
        }
    }

    #[test]
    fn test_barrier_timeout_backs_out_of_the_transition() {
        let soc = Arc::new(MockSoc::new());
        let ipi = MockIpi::new(HARTS);
        let policy = PollPolicy::Bounded { max_polls: 50 };
        let orchestrator = SuspendOrchestrator::<HARTS>::new(3, &ipi, Some(&*soc), None, policy);
        let harts: Vec<_> = (0..3)
            .map(|id| MockHart::with_soc(id, Arc::clone(&soc)))
            .collect();
        let enabled = (Interrupts::STI | Interrupts::MTI | Interrupts::MSI).bits();
        harts[0].write(Csr::Mie, enabled);

        // Hart 1 goes down, hart 2 never does.
        let err = thread::scope(|s| {
            let (orchestrator, sibling) = (&orchestrator, &harts[1]);
            s.spawn(move || {
                orchestrator
                    .registry()
                    .set_mode(sibling.hart_id(), SuspendMode::DeepSleep as u32);
                orchestrator.enter(sibling, false, 0).unwrap();
            });
            while !soc.status(hart(1)).is_asleep(SleepDepth::Deep) {
                thread::yield_now();
            }

            orchestrator
                .registry()
                .set_mode(hart(0), SuspendMode::DeepSleep as u32);
            let result = orchestrator.enter(&harts[0], true, 0);
            soc.release(1);
            result
        })
        .unwrap_err();

        assert!(matches!(
            err,
            SuspendError::Barrier {
                expected: 2,
                reached: 1,
                ..
            }
        ));
        let main_events: Vec<_> = soc
            .events()
            .into_iter()
            .filter(|event| {
                matches!(
                    event,
                    SocEvent::WakeEvents(0, _)
                        | SocEvent::Sleep(0, _)
                        | SocEvent::SleepCancelled(0)
                )
            })
            .collect();
        assert_eq!(
            main_events,
            [
                SocEvent::WakeEvents(0, WakeEvents::MSIP.bits()),
                SocEvent::Sleep(0, SleepDepth::Deep),
                SocEvent::SleepCancelled(0),
            ]
        );
        assert_eq!(soc.status(hart(0)), PcsStatus(0));
        assert_eq!(ipi.sent_to(), [1]);

        assert!(harts[0].events().is_empty());
        assert_eq!(harts[0].read(Csr::Mie), enabled);
        assert_eq!(orchestrator.registry().mode(hart(0)), 0);
        for id in 0..3 {
            assert_eq!(orchestrator.state(hart(id)), HartState::Running);
        }
    }

    /// Shared cache noting whether the main hart's L1 had been drained each
    /// time it was flushed.
    struct DrainWitness<'a> {
        hart: &'a MockHart,
        drained_first: Mutex<Vec<bool>>,
    }

    impl SharedCache for DrainWitness<'_> {
        fn line(&self, _: HartId, _: SharedLineCommand, _: usize) {}

        fn writeback_invalidate_all(&self, _: HartId) {
            let drain = (None, CctlCommand::WritebackInvalidateAll as usize);
            let drained = self.hart.cctl_log().contains(&drain);
            self.drained_first.lock().unwrap().push(drained);
        }

        fn set_enabled(&self, _: bool) {}
    }

    #[test]
    fn test_main_hart_drains_l1_before_shared_cache() {
        for mode in [SuspendMode::LightSleep, SuspendMode::DeepSleep] {
            let soc = Arc::new(MockSoc::new());
            let ipi = MockIpi::new(HARTS);
            let me = MockHart::with_soc(0, Arc::clone(&soc));
            me.write(Csr::McacheCtl, 0x3);
            let l2 = DrainWitness {
                hart: &me,
                drained_first: Mutex::default(),
            };
            let orchestrator = SuspendOrchestrator::<HARTS>::new(
                1,
                &ipi,
                Some(&*soc),
                Some(&l2),
                PollPolicy::Forever,
            );
            soc.release(0);

            orchestrator.registry().set_mode(hart(0), mode as u32);
            orchestrator.enter(&me, true, 0).unwrap();
            assert_eq!(*l2.drained_first.lock().unwrap(), [true], "{mode:?}");
        }
    }
}
