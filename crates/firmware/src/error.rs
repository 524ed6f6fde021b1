use core::{error::Error, fmt};

use crate::hal::HartOps;

/// Formats an error followed by its chain of sources.
pub struct Report<'a>(pub &'a dyn Error);

impl fmt::Display for Report<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)?;
        let mut source = self.0.source();
        while let Some(err) = source {
            write!(f, "\n  caused by: {err}")?;
            source = err.source();
        }
        Ok(())
    }
}

/// Logs a misconfiguration the hart cannot continue from and parks it.
#[track_caller]
pub fn fatal<H>(hart: &H, message: fmt::Arguments) -> !
where
    H: HartOps + ?Sized,
{
    let location = core::panic::Location::caller();
    error!("fatal: {message} (at {location})");
    hart.park()
}

/// Logs `err` with its sources and parks the hart.
#[track_caller]
pub fn report<H, E>(hart: &H, err: &E) -> !
where
    H: HartOps + ?Sized,
    E: Error,
{
    fatal(hart, format_args!("{}", Report(err)))
}
