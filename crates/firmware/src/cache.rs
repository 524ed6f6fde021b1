//! L1 cache control through the CCTL CSRs, and the cache maintenance
//! operations carried by broadcast requests.

use core::{iter::StepBy, ops::Range};

use hart_mask::HartId;
use sbi_abi::cache_maintenance;

use crate::{
    csr::{Csr, McacheCtl, MmiscCtl},
    hal::{CsrFile, SharedCache, SharedLineCommand},
};

/// L1 data cache CCTL commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(usize)]
pub enum CctlCommand {
    VaInvalidate = 0,
    VaWriteback = 1,
    WritebackInvalidateAll = 6,
}

/// Issues a whole-cache CCTL command.
pub fn cctl<C>(csr: &C, command: CctlCommand)
where
    C: CsrFile + ?Sized,
{
    csr.write(Csr::MccctlCommand, command as usize);
}

/// Issues a CCTL command on the line containing `vaddr`.
pub fn cctl_line<C>(csr: &C, command: CctlCommand, vaddr: usize)
where
    C: CsrFile + ?Sized,
{
    csr.write(Csr::MccctlBeginAddr, vaddr);
    csr.write(Csr::MccctlCommand, command as usize);
}

/// L1 data cache line size in bytes, from `mdcm_cfg.DSZ`.
pub fn line_size<C>(csr: &C) -> usize
where
    C: CsrFile + ?Sized,
{
    let dsz = (csr.read(Csr::MdcmCfg) >> 6) & 0x7;
    1 << (dsz + 2)
}

/// A cache maintenance operation, as carried by a broadcast request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheOp {
    InvalidateLine,
    InvalidateRange,
    WritebackLine,
    WritebackRange,
    WritebackInvalidateAll,
}

impl CacheOp {
    /// Decodes a cache maintenance extension function id.
    #[must_use]
    pub fn from_function(function: usize) -> Option<Self> {
        let op = match function {
            cache_maintenance::INVALIDATE_LINE => Self::InvalidateLine,
            cache_maintenance::INVALIDATE_RANGE => Self::InvalidateRange,
            cache_maintenance::WRITEBACK_LINE => Self::WritebackLine,
            cache_maintenance::WRITEBACK_RANGE => Self::WritebackRange,
            cache_maintenance::WRITEBACK_INVALIDATE_ALL => Self::WritebackInvalidateAll,
            _ => return None,
        };
        Some(op)
    }

    /// The line-sized addresses this operation touches.
    ///
    /// Line forms touch the line containing `start` and ignore `size`. Range
    /// forms touch every line overlapping `start..start + size`. The
    /// whole-cache form touches no individual line.
    #[must_use]
    pub fn lines(self, start: usize, size: usize, line_size: usize) -> StepBy<Range<usize>> {
        let first = start & !(line_size - 1);
        let end = match self {
            Self::InvalidateLine | Self::WritebackLine => first.saturating_add(1),
            Self::InvalidateRange | Self::WritebackRange if size > 0 => start.saturating_add(size),
            Self::InvalidateRange | Self::WritebackRange | Self::WritebackInvalidateAll => first,
        };
        (first..end).step_by(line_size)
    }

    fn line_command(self) -> Option<(CctlCommand, SharedLineCommand)> {
        match self {
            Self::InvalidateLine | Self::InvalidateRange => {
                Some((CctlCommand::VaInvalidate, SharedLineCommand::Invalidate))
            }
            Self::WritebackLine | Self::WritebackRange => {
                Some((CctlCommand::VaWriteback, SharedLineCommand::Writeback))
            }
            Self::WritebackInvalidateAll => None,
        }
    }

    /// Performs the operation on the executing hart's L1 data cache.
    pub fn apply_local<C>(self, csr: &C, start: usize, size: usize)
    where
        C: CsrFile + ?Sized,
    {
        match self.line_command() {
            Some((command, _)) => {
                for line in self.lines(start, size, line_size(csr)) {
                    cctl_line(csr, command, line);
                }
            }
            None => cctl(csr, CctlCommand::WritebackInvalidateAll),
        }
    }

    /// Performs the operation on the shared cache, using `hart`'s command
    /// registers.
    pub fn apply_shared<S>(
        self,
        shared: &S,
        hart: HartId,
        start: usize,
        size: usize,
        line_size: usize,
    ) where
        S: SharedCache + ?Sized,
    {
        match self.line_command() {
            Some((_, command)) => {
                for line in self.lines(start, size, line_size) {
                    shared.line(hart, command, line);
                }
            }
            None => shared.writeback_invalidate_all(hart),
        }
    }
}

fn toggle<C>(csr: &C, reg: Csr, bits: usize, enable: bool)
where
    C: CsrFile + ?Sized,
{
    if enable {
        csr.set_bits(reg, bits);
    } else {
        csr.clear_bits(reg, bits);
    }
}

/// Replaces the writable bits of `mcache_ctl`, keeping the rest.
pub fn set_mcache_ctl<C>(csr: &C, value: usize)
where
    C: CsrFile + ?Sized,
{
    let writable = McacheCtl::all().bits();
    csr.clear_bits(Csr::McacheCtl, writable);
    csr.set_bits(Csr::McacheCtl, value & writable);
}

/// Replaces the writable bits of `mmisc_ctl`, keeping the rest.
pub fn set_mmisc_ctl<C>(csr: &C, value: usize)
where
    C: CsrFile + ?Sized,
{
    let writable = MmiscCtl::all().bits();
    csr.clear_bits(Csr::MmiscCtl, writable);
    csr.set_bits(Csr::MmiscCtl, value & writable);
}

pub fn set_icache<C>(csr: &C, enable: bool)
where
    C: CsrFile + ?Sized,
{
    toggle(csr, Csr::McacheCtl, McacheCtl::IC_EN.bits(), enable);
}

/// Enables the L1 data cache, or disables it and drains its contents to
/// memory.
pub fn set_dcache<C>(csr: &C, enable: bool)
where
    C: CsrFile + ?Sized,
{
    if enable {
        csr.set_bits(Csr::McacheCtl, McacheCtl::DC_EN.bits());
    } else {
        csr.clear_bits(Csr::McacheCtl, McacheCtl::DC_EN.bits());
        cctl(csr, CctlCommand::WritebackInvalidateAll);
    }
}

pub fn set_icache_prefetch<C>(csr: &C, enable: bool)
where
    C: CsrFile + ?Sized,
{
    toggle(csr, Csr::McacheCtl, McacheCtl::L1I_PREFETCH_EN.bits(), enable);
}

pub fn set_dcache_prefetch<C>(csr: &C, enable: bool)
where
    C: CsrFile + ?Sized,
{
    toggle(csr, Csr::McacheCtl, McacheCtl::L1D_PREFETCH_EN.bits(), enable);
}

pub fn set_write_around<C>(csr: &C, enable: bool)
where
    C: CsrFile + ?Sized,
{
    toggle(csr, Csr::McacheCtl, McacheCtl::DC_WAROUND_1_EN.bits(), enable);
}

pub fn set_non_blocking_load_store<C>(csr: &C, enable: bool)
where
    C: CsrFile + ?Sized,
{
    toggle(csr, Csr::MmiscCtl, MmiscCtl::NON_BLOCKING_EN.bits(), enable);
}
