//! Call-surface definitions shared by the machine-mode runtime and the
//! software that calls into it.
//!
//! This crate defines the SBI return convention and error codes, and the
//! extension and function identifiers handled by the firmware: the Andes
//! vendor extension, the cache maintenance extension, and the standard remote
//! fence and system reset extensions.

#![cfg_attr(not(test), no_std)]

use core::{error::Error, fmt, num::NonZeroIsize};

pub mod cache_maintenance;
pub mod rfence;
pub mod system_reset;
pub mod vendor;

/// An SBI status code, as returned in `a0`.
///
/// Only the codes the firmware hands out are named.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SbiError(Option<NonZeroIsize>);

impl SbiError {
    pub const SUCCESS: Self = Self(None);
    pub const FAILED: Self = Self(NonZeroIsize::new(-1));
    pub const NOT_SUPPORTED: Self = Self(NonZeroIsize::new(-2));
    pub const INVALID_PARAM: Self = Self(NonZeroIsize::new(-3));
    pub const TIMEOUT: Self = Self(NonZeroIsize::new(-12));

    /// Returns the raw code placed in `a0`.
    #[must_use]
    pub fn code(self) -> isize {
        self.0.map_or(0, NonZeroIsize::get)
    }

    fn description(self) -> Option<&'static str> {
        let description = match self {
            Self::SUCCESS => "success",
            Self::FAILED => "failed",
            Self::NOT_SUPPORTED => "not supported",
            Self::INVALID_PARAM => "invalid parameter",
            Self::TIMEOUT => "timed out",
            _ => return None,
        };
        Some(description)
    }
}

impl fmt::Display for SbiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match Self::description(*self) {
            Some(description) => f.write_str(description),
            None => write!(f, "SBI error {}", self.code()),
        }
    }
}

impl Error for SbiError {}

/// The return value of an SBI call.
///
/// Contains both the error code and the return value of the call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(C)]
#[must_use]
pub struct SbiRet {
    /// SBI error code (0 for success, negative for errors).
    pub error: isize,
    /// SBI return value.
    pub value: isize,
}

impl From<SbiRet> for Result<isize, SbiError> {
    fn from(ret: SbiRet) -> Self {
        if ret.error == 0 {
            Ok(ret.value)
        } else {
            Err(SbiError(NonZeroIsize::new(ret.error)))
        }
    }
}

impl From<Result<usize, SbiError>> for SbiRet {
    fn from(res: Result<usize, SbiError>) -> Self {
        match res {
            Ok(value) => Self::success(value),
            Err(err) => Self::error(err),
        }
    }
}

impl SbiRet {
    /// A successful return carrying `value` in `a1`.
    pub fn success(value: usize) -> Self {
        Self {
            error: 0,
            value: value.cast_signed(),
        }
    }

    /// A failed return carrying `err` in `a0` and zero in `a1`.
    pub fn error(err: SbiError) -> Self {
        Self {
            error: err.code(),
            value: 0,
        }
    }

    /// Converts this `SbiRet` into a `Result`.
    ///
    /// Returns `Ok(value)` if `error` is 0, otherwise returns `Err(SbiError)`.
    pub fn into_result(self) -> Result<isize, SbiError> {
        Result::from(self)
    }
}

/// Builds an extension id from its four-character ASCII name.
#[must_use]
pub const fn extension_id(name: &[u8; 4]) -> usize {
    ((name[0] as usize) << 24)
        | ((name[1] as usize) << 16)
        | ((name[2] as usize) << 8)
        | (name[3] as usize)
}
