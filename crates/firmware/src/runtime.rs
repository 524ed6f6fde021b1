//! The state shared by every hart, and the entry points the trap handler
//! calls into.

use hart_mask::{HartMask, InvalidHartMask};
use sbi_abi::{
    SbiError, SbiRet, cache_maintenance, rfence,
    system_reset::{self, ResetType},
    vendor,
};
use snafu::{ResultExt as _, Snafu};

use crate::{
    broadcast::{BroadcastError, Broadcaster, FenceOp, MaintenanceRequest},
    cache::CacheOp,
    config::{ConfigError, FirmwareConfig},
    error::Report,
    hal::{HartOps, Ipi, PmaRegions, PowerControl, SharedCache, Triggers, Watchdog},
    suspend::{SuspendError, SuspendMode, SuspendOrchestrator},
    vendor::{self as vendor_call, RestartError},
};

/// Hardware and collaborators the runtime drives.
///
/// Everything but the IPI controller is optional; calls needing a missing
/// device fail when made.
#[derive(Clone, Copy)]
pub struct Devices<'a> {
    pub ipi: &'a dyn Ipi,
    pub power: Option<&'a dyn PowerControl>,
    pub watchdog: Option<&'a dyn Watchdog>,
    pub shared_cache: Option<&'a dyn SharedCache>,
    pub triggers: Option<&'a dyn Triggers>,
    pub pma: Option<&'a dyn PmaRegions>,
}

impl<'a> Devices<'a> {
    /// Only an IPI controller.
    #[must_use]
    pub fn new(ipi: &'a dyn Ipi) -> Self {
        Self {
            ipi,
            power: None,
            watchdog: None,
            shared_cache: None,
            triggers: None,
            pma: None,
        }
    }
}

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum DispatchError {
    #[snafu(display("extension {extension:#x} is not supported"))]
    UnsupportedExtension {
        extension: usize,
        #[snafu(implicit)]
        location: snafu::Location,
    },
    #[snafu(display("function {function} of extension {extension:#x} is not supported"))]
    UnsupportedFunction {
        extension: usize,
        function: usize,
        #[snafu(implicit)]
        location: snafu::Location,
    },
    #[snafu(display("no {device} on this platform"))]
    MissingDevice {
        device: &'static str,
        #[snafu(implicit)]
        location: snafu::Location,
    },
    #[snafu(display("invalid {name} {value:#x}"))]
    InvalidParam {
        name: &'static str,
        value: usize,
        #[snafu(implicit)]
        location: snafu::Location,
    },
    #[snafu(display("invalid hart mask"))]
    HartMask {
        source: InvalidHartMask,
        #[snafu(implicit)]
        location: snafu::Location,
    },
    #[snafu(display("reset type {reset_type:?} is not supported"))]
    UnsupportedReset {
        reset_type: ResetType,
        #[snafu(implicit)]
        location: snafu::Location,
    },
    #[snafu(display("maintenance broadcast failed"))]
    Broadcast {
        source: BroadcastError,
        #[snafu(implicit)]
        location: snafu::Location,
    },
    #[snafu(display("suspend failed"))]
    Suspend {
        source: SuspendError,
        #[snafu(implicit)]
        location: snafu::Location,
    },
    #[snafu(display("restart failed"))]
    Restart {
        source: RestartError,
        #[snafu(implicit)]
        location: snafu::Location,
    },
}

impl DispatchError {
    /// The status code handed back to the caller.
    #[must_use]
    pub fn sbi_error(&self) -> SbiError {
        match self {
            Self::UnsupportedExtension { .. }
            | Self::UnsupportedFunction { .. }
            | Self::MissingDevice { .. }
            | Self::UnsupportedReset { .. }
            | Self::Restart { .. } => SbiError::NOT_SUPPORTED,
            Self::InvalidParam { .. } | Self::HartMask { .. } => SbiError::INVALID_PARAM,
            Self::Broadcast { .. } | Self::Suspend { .. } => SbiError::TIMEOUT,
        }
    }
}

/// Everything the harts of one platform share.
pub struct Runtime<'a, const HARTS: usize> {
    config: FirmwareConfig,
    devices: Devices<'a>,
    broadcaster: Broadcaster<'a, HARTS>,
    suspend: SuspendOrchestrator<'a, HARTS>,
}

impl<'a, const HARTS: usize> Runtime<'a, HARTS> {
    pub fn new(config: FirmwareConfig, devices: Devices<'a>) -> Result<Self, ConfigError> {
        config.check_capacity(HARTS)?;
        let hart_count = config.hart_count();
        let poll_policy = config.poll_policy();
        Ok(Self {
            config,
            devices,
            broadcaster: Broadcaster::new(
                hart_count,
                devices.ipi,
                devices.shared_cache,
                poll_policy,
            ),
            suspend: SuspendOrchestrator::new(
                hart_count,
                devices.ipi,
                devices.power,
                devices.shared_cache,
                poll_policy,
            ),
        })
    }

    #[must_use]
    pub fn config(&self) -> &FirmwareConfig {
        &self.config
    }

    #[must_use]
    pub fn devices(&self) -> &Devices<'a> {
        &self.devices
    }

    #[must_use]
    pub fn broadcaster(&self) -> &Broadcaster<'a, HARTS> {
        &self.broadcaster
    }

    #[must_use]
    pub fn suspend(&self) -> &SuspendOrchestrator<'a, HARTS> {
        &self.suspend
    }

    /// Handles an environment call from a lower privilege level.
    ///
    /// `args` holds `a0..a5`.
    pub fn handle_ecall<H>(
        &self,
        hart: &H,
        extension: usize,
        function: usize,
        args: &[usize; 6],
    ) -> SbiRet
    where
        H: HartOps + ?Sized,
    {
        let result = match extension {
            vendor::EXTENSION_ID => vendor_call::dispatch(self, hart, function, args),
            cache_maintenance::EXTENSION_ID => self.cache_maintenance(hart, function, args),
            rfence::EXTENSION_ID => self.remote_fence(hart, function, args),
            system_reset::EXTENSION_ID => self.system_reset(hart, function, args),
            _ => UnsupportedExtensionSnafu { extension }.fail(),
        };
        match result {
            Ok(value) => SbiRet::success(value),
            Err(err) => {
                warn!("call {extension:#x}/{function} failed: {}", Report(&err));
                SbiRet::error(err.sbi_error())
            }
        }
    }

    /// Handles a machine software interrupt: performs every maintenance
    /// request posted to the calling hart.
    pub fn handle_ipi<H>(&self, hart: &H)
    where
        H: HartOps + ?Sized,
    {
        self.devices.ipi.clear(hart.hart_id());
        self.broadcaster.service(hart);
    }

    /// Runs the calling hart's sleep cycle if a mode has been requested for
    /// it. Called from the hart's idle loop.
    pub fn idle<H>(&self, hart: &H) -> Result<(), SuspendError>
    where
        H: HartOps + ?Sized,
    {
        if self.suspend.registry().mode(hart.hart_id()) == SuspendMode::Normal as u32 {
            return Ok(());
        }
        self.suspend.enter(hart, false, 0)
    }

    fn cache_maintenance<H>(
        &self,
        hart: &H,
        function: usize,
        args: &[usize; 6],
    ) -> Result<usize, DispatchError>
    where
        H: HartOps + ?Sized,
    {
        let Some(op) = CacheOp::from_function(function) else {
            return UnsupportedFunctionSnafu {
                extension: cache_maintenance::EXTENSION_ID,
                function,
            }
            .fail();
        };
        let [start, size, ..] = *args;
        let all = HartMask::all(self.config.hart_count());
        let request = MaintenanceRequest::cache(op, start, size, all, hart.hart_id());
        self.broadcaster
            .broadcast(hart, &request)
            .context(BroadcastSnafu)?;
        Ok(0)
    }

    fn remote_fence<H>(
        &self,
        hart: &H,
        function: usize,
        args: &[usize; 6],
    ) -> Result<usize, DispatchError>
    where
        H: HartOps + ?Sized,
    {
        let [hart_mask, hart_mask_base, start, size, asid, _] = *args;
        let op = match function {
            rfence::REMOTE_FENCE_I => FenceOp::FenceI,
            rfence::REMOTE_SFENCE_VMA => FenceOp::SfenceVma,
            rfence::REMOTE_SFENCE_VMA_ASID => FenceOp::SfenceVmaAsid(asid),
            _ => {
                return UnsupportedFunctionSnafu {
                    extension: rfence::EXTENSION_ID,
                    function,
                }
                .fail();
            }
        };
        let participants = HartMask::from_sbi(self.config.hart_count(), hart_mask, hart_mask_base)
            .context(HartMaskSnafu)?;
        let request = MaintenanceRequest::fence(op, start, size, participants, hart.hart_id());
        self.broadcaster
            .broadcast(hart, &request)
            .context(BroadcastSnafu)?;
        Ok(0)
    }

    fn system_reset<H>(
        &self,
        hart: &H,
        function: usize,
        args: &[usize; 6],
    ) -> Result<usize, DispatchError>
    where
        H: HartOps + ?Sized,
    {
        if function != system_reset::SYSTEM_RESET {
            return UnsupportedFunctionSnafu {
                extension: system_reset::EXTENSION_ID,
                function,
            }
            .fail();
        }
        let [raw, reason, ..] = *args;
        let reset_type = u32::try_from(raw)
            .ok()
            .and_then(ResetType::from_raw)
            .ok_or_else(|| {
                InvalidParamSnafu {
                    name: "reset type",
                    value: raw,
                }
                .build()
            })?;
        info!("system reset {reset_type:?} (reason {reason})");
        match reset_type {
            ResetType::Shutdown => hart.park(),
            ResetType::ColdReboot => {
                match vendor_call::restart(self, hart).context(RestartSnafu)? {}
            }
            ResetType::WarmReboot => UnsupportedResetSnafu { reset_type }.fail(),
        }
    }
}
