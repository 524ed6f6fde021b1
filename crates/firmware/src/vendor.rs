//! Andes vendor extension calls.

use core::convert::Infallible;

use hart_mask::HartMask;
use platform_cast::CastFrom as _;
use sbi_abi::vendor::{self, VendorFunction};
use snafu::{OptionExt as _, ResultExt as _, Snafu};

use crate::{
    broadcast::MaintenanceRequest,
    cache::{self, CacheOp},
    csr::{Csr, Interrupts, MMSC_CFG_PPMA},
    error,
    hal::{HartOps, PowerControl},
    runtime::{
        BroadcastSnafu, DispatchError, InvalidParamSnafu, MissingDeviceSnafu, Runtime,
        SuspendSnafu, UnsupportedFunctionSnafu,
    },
    suspend::Role,
};

#[derive(Debug, Snafu)]
pub enum RestartError {
    #[snafu(display("restart needs a {device}"))]
    MissingHardware {
        device: &'static str,
        #[snafu(implicit)]
        location: snafu::Location,
    },
}

/// Performs vendor function `function` on the calling hart.
///
/// Returns the value handed back in `a1`. An unknown function raises a debug
/// trap before being reported as unsupported.
pub fn dispatch<H, const HARTS: usize>(
    runtime: &Runtime<'_, HARTS>,
    hart: &H,
    function: usize,
    args: &[usize; 6],
) -> Result<usize, DispatchError>
where
    H: HartOps + ?Sized,
{
    let Some(func) = VendorFunction::from_id(function) else {
        warn!("unsupported vendor call {function}");
        hart.debug_trap();
        return UnsupportedFunctionSnafu {
            extension: vendor::EXTENSION_ID,
            function,
        }
        .fail();
    };

    let [a0, a1, a2, a3, ..] = *args;
    let enable = a0 != 0;
    let devices = runtime.devices();
    let value = match func {
        VendorFunction::GetMcacheCtlStatus => hart.read(Csr::McacheCtl),
        VendorFunction::GetMmiscCtlStatus => hart.read(Csr::MmiscCtl),
        VendorFunction::SetMcacheCtl => {
            cache::set_mcache_ctl(hart, a0);
            0
        }
        VendorFunction::SetMmiscCtl => {
            cache::set_mmisc_ctl(hart, a0);
            0
        }
        VendorFunction::IcacheOp => {
            cache::set_icache(hart, enable);
            0
        }
        VendorFunction::DcacheOp => {
            cache::set_dcache(hart, enable);
            0
        }
        VendorFunction::L1IcachePrefetch => {
            cache::set_icache_prefetch(hart, enable);
            0
        }
        VendorFunction::L1DcachePrefetch => {
            cache::set_dcache_prefetch(hart, enable);
            0
        }
        VendorFunction::NonBlockingLoadStore => {
            cache::set_non_blocking_load_store(hart, enable);
            0
        }
        VendorFunction::WriteAround => {
            cache::set_write_around(hart, enable);
            0
        }
        VendorFunction::Trigger => devices
            .triggers
            .context(MissingDeviceSnafu {
                device: "trigger module",
            })?
            .set(a0, a1, a2 != 0),
        VendorFunction::SetPfm => {
            let pmov = Interrupts::PMOV.bits();
            hart.clear_bits(Csr::Slip, pmov);
            hart.set_bits(Csr::Mie, pmov);
            0
        }
        VendorFunction::ReadPowerBrake => hart.read(Csr::MpftCtl),
        VendorFunction::WritePowerBrake => {
            hart.write(Csr::MpftCtl, a0);
            0
        }
        VendorFunction::SuspendPrepare => {
            let role = if enable { Role::Main } else { Role::Secondary };
            if a1 == 0 {
                runtime.suspend().mask_interrupts(hart, role);
            } else {
                runtime.suspend().restore_interrupts(hart);
            }
            0
        }
        VendorFunction::SuspendMem => {
            hart.suspend_to_ram();
            0
        }
        VendorFunction::SetSuspendMode => {
            // Out-of-range modes are rejected when the hart tries to sleep.
            let mode = u32::try_from(a0).unwrap_or(u32::MAX);
            runtime.suspend().registry().set_mode(hart.hart_id(), mode);
            0
        }
        VendorFunction::EnterSuspendMode => {
            let wake_mask = u32::try_from(a1)
                .ok()
                .context(InvalidParamSnafu {
                    name: "wake mask",
                    value: a1,
                })?;
            runtime
                .suspend()
                .enter(hart, enable, wake_mask)
                .context(SuspendSnafu)?;
            0
        }
        VendorFunction::Restart => match restart(runtime, hart) {
            Ok(never) => match never {},
            Err(err) => error::report(hart, &err),
        },
        VendorFunction::ResetVec => {
            let Some(power) = devices.power else {
                error::fatal(hart, format_args!("reset vector set without a power controller"));
            };
            set_reset_vectors(power, runtime.config().hart_count(), u64::cast_from(a0));
            0
        }
        VendorFunction::SetPma => {
            let pma = devices.pma.context(MissingDeviceSnafu { device: "PMA unit" })?;
            pma.set(a0, a1, a2, a3).cast_unsigned()
        }
        VendorFunction::FreePma => {
            let pma = devices.pma.context(MissingDeviceSnafu { device: "PMA unit" })?;
            pma.free(a0).cast_unsigned()
        }
        VendorFunction::ProbePma => usize::from((hart.read(Csr::MmscCfg) & MMSC_CFG_PPMA) != 0),
        VendorFunction::DcacheWbinvalAll => {
            let all = HartMask::all(runtime.config().hart_count());
            let request = MaintenanceRequest::cache(
                CacheOp::WritebackInvalidateAll,
                0,
                0,
                all,
                hart.hart_id(),
            );
            runtime
                .broadcaster()
                .broadcast(hart, &request)
                .context(BroadcastSnafu)?;
            0
        }
    };
    Ok(value)
}

/// Points every hart's reset vector at `addr`.
fn set_reset_vectors(power: &dyn PowerControl, hart_count: usize, addr: u64) {
    for hart in &HartMask::all(hart_count) {
        power.set_reset_vector(hart, addr);
    }
}

/// Points every hart at the flash base and resets the platform through the
/// watchdog.
///
/// Never returns on success: the calling hart parks until the reset takes it.
pub fn restart<H, const HARTS: usize>(
    runtime: &Runtime<'_, HARTS>,
    hart: &H,
) -> Result<Infallible, RestartError>
where
    H: HartOps + ?Sized,
{
    let devices = runtime.devices();
    let power = devices.power.context(MissingHardwareSnafu {
        device: "power controller",
    })?;
    let watchdog = devices
        .watchdog
        .context(MissingHardwareSnafu { device: "watchdog" })?;

    let config = runtime.config();
    set_reset_vectors(power, config.hart_count(), config.flash_base());
    info!("restarting through the watchdog");
    watchdog.arm_reset();
    hart.park()
}

#[cfg(test)]
mod tests {
    use std::{
        panic::{self, AssertUnwindSafe},
        sync::Arc,
    };

    use hart_mask::HartId;
    use sbi_abi::SbiError;

    use super::*;
    use crate::{
        cache::CctlCommand,
        config::FirmwareConfig,
        csr::McacheCtl,
        hal::CsrFile as _,
        runtime::Devices,
        smu::WakeEvents,
        suspend::SuspendMode,
        testing::{HartEvent, MockHart, MockIpi, MockPma, MockSoc, MockTriggers, SocEvent},
    };

    const HARTS: usize = 8;

    fn call(
        runtime: &Runtime<'_, HARTS>,
        hart: &MockHart,
        function: VendorFunction,
        args: [usize; 6],
    ) -> Result<isize, SbiError> {
        runtime
            .handle_ecall(hart, vendor::EXTENSION_ID, function.id(), &args)
            .into_result()
    }

    fn runtime<'a>(hart_count: usize, devices: Devices<'a>) -> Runtime<'a, HARTS> {
        Runtime::new(FirmwareConfig::new(hart_count, HARTS).unwrap(), devices).unwrap()
    }

    #[test]
    fn test_unknown_function_traps_and_changes_nothing() {
        let ipi = MockIpi::new(HARTS);
        let runtime = runtime(2, Devices::new(&ipi));
        let me = MockHart::new(0);
        me.write(Csr::McacheCtl, 0x3);

        let ret = runtime.handle_ecall(&me, vendor::EXTENSION_ID, 24, &[1; 6]);
        assert_eq!(ret.into_result(), Err(SbiError::NOT_SUPPORTED));
        assert_eq!(me.events(), [HartEvent::DebugTrap]);
        assert_eq!(me.read(Csr::McacheCtl), 0x3);
        assert!(me.cctl_log().is_empty());
        assert!(ipi.sent_to().is_empty());
        for id in 0..2 {
            let hart = HartId::from_raw(id);
            assert_eq!(runtime.suspend().registry().mode(hart), 0);
        }
    }

    #[test]
    fn test_csr_passthrough() {
        let ipi = MockIpi::new(HARTS);
        let runtime = runtime(1, Devices::new(&ipi));
        let me = MockHart::new(0);

        me.write(Csr::MmiscCtl, 0x140);
        assert_eq!(call(&runtime, &me, VendorFunction::GetMmiscCtlStatus, [0; 6]), Ok(0x140));

        call(&runtime, &me, VendorFunction::IcacheOp, [1, 0, 0, 0, 0, 0]).unwrap();
        call(&runtime, &me, VendorFunction::WriteAround, [1, 0, 0, 0, 0, 0]).unwrap();
        let expected = (McacheCtl::IC_EN | McacheCtl::DC_WAROUND_1_EN).bits();
        assert_eq!(
            call(&runtime, &me, VendorFunction::GetMcacheCtlStatus, [0; 6]),
            Ok(expected.cast_signed())
        );

        call(&runtime, &me, VendorFunction::WritePowerBrake, [0x7, 0, 0, 0, 0, 0]).unwrap();
        assert_eq!(call(&runtime, &me, VendorFunction::ReadPowerBrake, [0; 6]), Ok(0x7));

        me.write(Csr::Slip, Interrupts::PMOV.bits());
        call(&runtime, &me, VendorFunction::SetPfm, [0; 6]).unwrap();
        assert_eq!(me.read(Csr::Slip), 0);
        assert_eq!(me.read(Csr::Mie), Interrupts::PMOV.bits());
    }

    #[test]
    fn test_dcache_off_drains() {
        let ipi = MockIpi::new(HARTS);
        let runtime = runtime(1, Devices::new(&ipi));
        let me = MockHart::new(0);
        call(&runtime, &me, VendorFunction::DcacheOp, [0; 6]).unwrap();
        assert_eq!(
            me.cctl_log(),
            [(None, CctlCommand::WritebackInvalidateAll as usize)]
        );
    }

    #[test]
    fn test_collaborators() {
        let ipi = MockIpi::new(HARTS);
        let me = MockHart::new(0);

        let bare = runtime(1, Devices::new(&ipi));
        assert_eq!(
            call(&bare, &me, VendorFunction::Trigger, [2, 0x100, 1, 0, 0, 0]),
            Err(SbiError::NOT_SUPPORTED)
        );
        assert_eq!(
            call(&bare, &me, VendorFunction::SetPma, [0x1000, 0x1000, 0x3, 0, 0, 0]),
            Err(SbiError::NOT_SUPPORTED)
        );

        let triggers = MockTriggers {
            status: 9,
            ..MockTriggers::default()
        };
        let pma = MockPma::default();
        let devices = Devices {
            triggers: Some(&triggers),
            pma: Some(&pma),
            ..Devices::new(&ipi)
        };
        let runtime = runtime(1, devices);
        assert_eq!(
            call(&runtime, &me, VendorFunction::Trigger, [2, 0x100, 1, 0, 0, 0]),
            Ok(9)
        );
        assert_eq!(triggers.calls(), [(2, 0x100, true)]);

        call(&runtime, &me, VendorFunction::SetPma, [0x1000, 0x1000, 0x3, 1, 0, 0]).unwrap();
        assert_eq!(pma.region(0x1000), Some((0x1000, 0x3, 1)));
        assert_eq!(call(&runtime, &me, VendorFunction::FreePma, [0x1000, 0, 0, 0, 0, 0]), Ok(0));
        assert_eq!(call(&runtime, &me, VendorFunction::FreePma, [0x1000, 0, 0, 0, 0, 0]), Ok(-1));

        assert_eq!(call(&runtime, &me, VendorFunction::ProbePma, [0; 6]), Ok(0));
        me.write(Csr::MmscCfg, MMSC_CFG_PPMA);
        assert_eq!(call(&runtime, &me, VendorFunction::ProbePma, [0; 6]), Ok(1));
    }

    #[test]
    fn test_suspend_prepare_masks_and_restores() {
        let ipi = MockIpi::new(HARTS);
        let runtime = runtime(2, Devices::new(&ipi));
        let me = MockHart::new(0);
        let enabled = (Interrupts::SUPERVISOR | Interrupts::MTI | Interrupts::MSI).bits();
        me.write(Csr::Mie, enabled);

        call(&runtime, &me, VendorFunction::SuspendPrepare, [1, 0, 0, 0, 0, 0]).unwrap();
        assert_eq!(me.read(Csr::Mie), Interrupts::MSI.bits());
        call(&runtime, &me, VendorFunction::SuspendPrepare, [1, 1, 0, 0, 0, 0]).unwrap();
        assert_eq!(me.read(Csr::Mie), enabled);
    }

    #[test]
    fn test_set_then_enter_suspend_mode() {
        let ipi = MockIpi::new(HARTS);
        let soc = Arc::new(MockSoc::new());
        let devices = Devices {
            power: Some(&*soc),
            ..Devices::new(&ipi)
        };
        let runtime = runtime(1, devices);
        let me = MockHart::with_soc(0, Arc::clone(&soc));
        soc.release(0);

        let light = SuspendMode::LightSleep as usize;
        call(&runtime, &me, VendorFunction::SetSuspendMode, [light, 0, 0, 0, 0, 0]).unwrap();
        assert_eq!(
            runtime.suspend().registry().mode(me.hart_id()),
            SuspendMode::LightSleep as u32
        );
        call(&runtime, &me, VendorFunction::EnterSuspendMode, [1, 0x4, 0, 0, 0, 0]).unwrap();

        assert_eq!(me.events(), [HartEvent::Wfi]);
        assert_eq!(runtime.suspend().registry().mode(me.hart_id()), 0);
        assert_eq!(
            soc.events()[0],
            SocEvent::WakeEvents(0, WakeEvents::MSIP.bits() | 0x4)
        );
    }

    #[test]
    fn test_restart_writes_vectors_before_arming() {
        let ipi = MockIpi::new(HARTS);
        let soc = Arc::new(MockSoc::new());
        let devices = Devices {
            power: Some(&*soc),
            watchdog: Some(&*soc),
            ..Devices::new(&ipi)
        };
        let runtime = runtime(3, devices);
        let me = MockHart::new(2);

        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            call(&runtime, &me, VendorFunction::Restart, [0; 6])
        }));
        let payload = result.unwrap_err();
        assert_eq!(payload.downcast_ref::<String>().unwrap(), "hart 2 parked");

        let vector = crate::config::DEFAULT_FLASH_BASE;
        assert_eq!(
            soc.events(),
            [
                SocEvent::ResetVector(0, vector),
                SocEvent::ResetVector(1, vector),
                SocEvent::ResetVector(2, vector),
                SocEvent::WatchdogArmed,
            ]
        );
    }

    #[test]
    #[should_panic(expected = "parked")]
    fn test_restart_without_watchdog_is_fatal() {
        let ipi = MockIpi::new(HARTS);
        let soc = MockSoc::new();
        let devices = Devices {
            power: Some(&soc),
            ..Devices::new(&ipi)
        };
        let runtime = runtime(1, devices);
        let _ = call(&runtime, &MockHart::new(0), VendorFunction::Restart, [0; 6]);
    }

    #[test]
    fn test_reset_vector_on_every_hart() {
        let ipi = MockIpi::new(HARTS);
        let soc = MockSoc::new();
        let devices = Devices {
            power: Some(&soc),
            ..Devices::new(&ipi)
        };
        let runtime = runtime(2, devices);
        let me = MockHart::new(0);
        call(&runtime, &me, VendorFunction::ResetVec, [0x4000_0000, 0, 0, 0, 0, 0]).unwrap();
        assert_eq!(
            soc.events(),
            [
                SocEvent::ResetVector(0, 0x4000_0000),
                SocEvent::ResetVector(1, 0x4000_0000),
            ]
        );
    }
}
