//! Platform facts the runtime is built from.

use hart_mask::MAX_HARTS;
use snafu::{Snafu, ensure};

use crate::poll::PollPolicy;

/// Compatible string of the system management unit.
pub const SMU_COMPATIBLE: &str = "andestech,atcsmu";
/// Compatible string of the watchdog.
pub const WDT_COMPATIBLE: &str = "andestech,atcwdt200";
/// Compatible string of the L2 cache controller.
pub const L2C_COMPATIBLE: &str = "cache";

/// Where every hart restarts after a platform reset.
pub const DEFAULT_FLASH_BASE: u64 = 0x8000_0000;

/// Answers from platform discovery (device tree parsing, hart enumeration).
pub trait PlatformInfo {
    /// Number of harts, i.e. the highest hart id plus one.
    fn hart_count(&self) -> usize;

    /// Base address of the first device compatible with `compatible`.
    fn compatible_addr(&self, compatible: &str) -> Option<usize>;
}

#[derive(Debug, Snafu)]
pub enum ConfigError {
    #[snafu(display("hart count {hart_count} is not in 1..={max}"))]
    InvalidHartCount {
        hart_count: usize,
        max: usize,
        #[snafu(implicit)]
        location: snafu::Location,
    },
    #[snafu(display("{hart_count} harts exceed the runtime capacity of {capacity}"))]
    Capacity {
        hart_count: usize,
        capacity: usize,
        #[snafu(implicit)]
        location: snafu::Location,
    },
}

#[derive(custom_debug_derive::Debug, Clone, Copy, PartialEq, Eq)]
pub struct FirmwareConfig {
    hart_count: usize,
    smu_addr: Option<usize>,
    wdt_addr: Option<usize>,
    l2c_addr: Option<usize>,
    #[debug(format = "{:#x}")]
    flash_base: u64,
    poll_policy: PollPolicy,
}

impl FirmwareConfig {
    /// Creates a configuration for `hart_count` harts with no optional
    /// hardware.
    ///
    /// `max_harts` is the capacity of the runtime the configuration is for.
    pub fn new(hart_count: usize, max_harts: usize) -> Result<Self, ConfigError> {
        let max = max_harts.min(MAX_HARTS);
        ensure!(
            (1..=max).contains(&hart_count),
            InvalidHartCountSnafu { hart_count, max }
        );
        Ok(Self {
            hart_count,
            smu_addr: None,
            wdt_addr: None,
            l2c_addr: None,
            flash_base: DEFAULT_FLASH_BASE,
            poll_policy: PollPolicy::default(),
        })
    }

    /// Builds a configuration from platform discovery.
    ///
    /// Missing devices are recorded as absent; functions needing them fail
    /// when called.
    pub fn discover<P>(info: &P, max_harts: usize) -> Result<Self, ConfigError>
    where
        P: PlatformInfo + ?Sized,
    {
        let config = Self::new(info.hart_count(), max_harts)?
            .with_smu(info.compatible_addr(SMU_COMPATIBLE))
            .with_watchdog(info.compatible_addr(WDT_COMPATIBLE))
            .with_shared_cache(info.compatible_addr(L2C_COMPATIBLE));
        if config.l2c_addr.is_none() {
            info!("no L2 cache controller, suspend skips L2 maintenance");
        }
        Ok(config)
    }

    /// Checks that a runtime with room for `capacity` harts can serve this
    /// configuration.
    pub fn check_capacity(&self, capacity: usize) -> Result<(), ConfigError> {
        ensure!(
            self.hart_count <= capacity,
            CapacitySnafu {
                hart_count: self.hart_count,
                capacity,
            }
        );
        Ok(())
    }

    #[must_use]
    pub fn with_smu(mut self, addr: Option<usize>) -> Self {
        self.smu_addr = addr;
        self
    }

    #[must_use]
    pub fn with_watchdog(mut self, addr: Option<usize>) -> Self {
        self.wdt_addr = addr;
        self
    }

    #[must_use]
    pub fn with_shared_cache(mut self, addr: Option<usize>) -> Self {
        self.l2c_addr = addr;
        self
    }

    #[must_use]
    pub fn with_flash_base(mut self, flash_base: u64) -> Self {
        self.flash_base = flash_base;
        self
    }

    #[must_use]
    pub fn with_poll_policy(mut self, poll_policy: PollPolicy) -> Self {
        self.poll_policy = poll_policy;
        self
    }

    #[must_use]
    pub fn hart_count(&self) -> usize {
        self.hart_count
    }

    #[must_use]
    pub fn smu_addr(&self) -> Option<usize> {
        self.smu_addr
    }

    #[must_use]
    pub fn wdt_addr(&self) -> Option<usize> {
        self.wdt_addr
    }

    #[must_use]
    pub fn l2c_addr(&self) -> Option<usize> {
        self.l2c_addr
    }

    #[must_use]
    pub fn flash_base(&self) -> u64 {
        self.flash_base
    }

    #[must_use]
    pub fn poll_policy(&self) -> PollPolicy {
        self.poll_policy
    }
}
