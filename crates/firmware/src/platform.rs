//! The AE350 instance of the runtime, driven from the trap handler of the
//! executing hart.

use sbi_abi::{SbiError, SbiRet};
use spin::Once;

use crate::{
    arch::LocalHart,
    config::{ConfigError, FirmwareConfig, PlatformInfo},
    error::Report,
    hal::{Ipi, PmaRegions, PowerControl, SharedCache, Triggers, Watchdog},
    l2c::L2Cache,
    runtime::{Devices, Runtime},
    smu::Smu,
    wdt::Atcwdt200,
};

/// Harts an AE350 can have.
pub const AE350_MAX_HARTS: usize = 8;

pub type Ae350Runtime = Runtime<'static, AE350_MAX_HARTS>;

static SMU: Once<Smu> = Once::new();
static WDT: Once<Atcwdt200> = Once::new();
static L2C: Once<L2Cache> = Once::new();
static RUNTIME: Once<Ae350Runtime> = Once::new();

/// Drivers brought up by the platform before the runtime.
#[derive(Clone, Copy)]
pub struct Collaborators {
    pub ipi: &'static dyn Ipi,
    pub triggers: Option<&'static dyn Triggers>,
    pub pma: Option<&'static dyn PmaRegions>,
}

/// Builds the runtime from platform discovery. Later calls return the
/// runtime built by the first one.
///
/// # Safety
///
/// Every device address `info` reports must be the register block of that
/// device, mapped for the rest of execution.
pub unsafe fn init<P>(
    info: &P,
    collaborators: Collaborators,
) -> Result<&'static Ae350Runtime, ConfigError>
where
    P: PlatformInfo + ?Sized,
{
    let config = FirmwareConfig::discover(info, AE350_MAX_HARTS)?;
    unsafe { init_with_config(config, collaborators) }
}

/// Builds the runtime from an explicit configuration.
///
/// # Safety
///
/// Every device address in `config` must be the register block of that
/// device, mapped for the rest of execution.
pub unsafe fn init_with_config(
    config: FirmwareConfig,
    collaborators: Collaborators,
) -> Result<&'static Ae350Runtime, ConfigError> {
    RUNTIME.try_call_once(|| {
        let power = config.smu_addr().map(|addr| {
            let smu = SMU.call_once(|| unsafe { Smu::new(addr) });
            info!("SMU at {:#x}", smu.base_addr());
            smu as &dyn PowerControl
        });
        let watchdog = config
            .wdt_addr()
            .map(|addr| WDT.call_once(|| unsafe { Atcwdt200::new(addr) }) as &dyn Watchdog);
        let shared_cache = config
            .l2c_addr()
            .map(|addr| L2C.call_once(|| unsafe { L2Cache::new(addr) }) as &dyn SharedCache);

        let devices = Devices {
            ipi: collaborators.ipi,
            power,
            watchdog,
            shared_cache,
            triggers: collaborators.triggers,
            pma: collaborators.pma,
        };
        debug!("runtime config: {config:?}");
        Runtime::new(config, devices)
    })
}

#[must_use]
pub fn runtime() -> Option<&'static Ae350Runtime> {
    RUNTIME.get()
}

/// `ecall` from a lower privilege level.
pub fn handle_ecall(extension: usize, function: usize, args: &[usize; 6]) -> SbiRet {
    let Some(runtime) = runtime() else {
        return SbiRet::error(SbiError::FAILED);
    };
    runtime.handle_ecall(&LocalHart::new(), extension, function, args)
}

/// Machine software interrupt.
pub fn handle_ipi() {
    if let Some(runtime) = runtime() {
        runtime.handle_ipi(&LocalHart::new());
    }
}

/// The executing hart has nothing to do.
pub fn idle() {
    let Some(runtime) = runtime() else {
        return;
    };
    if let Err(err) = runtime.idle(&LocalHart::new()) {
        warn!("sleep abandoned: {}", Report(&err));
    }
}
