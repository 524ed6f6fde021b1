use core::{
    fmt::{self, Write as _},
    hint,
    sync::atomic::{AtomicBool, Ordering},
};

use spin::{Mutex, Once};

/// Output sink for diagnostic text.
///
/// The console driver itself is brought up by the platform; the runtime only
/// needs to push bytes at it.
pub trait Console: Sync {
    fn write_bytes(&self, bytes: &[u8]);
}

static CONSOLE: Once<&'static dyn Console> = Once::new();
static WRITE_LOCK: Mutex<()> = Mutex::new(());
static PANICKED: AtomicBool = AtomicBool::new(false);

pub fn register(console: &'static dyn Console) {
    CONSOLE.call_once(|| console);
}

pub fn is_registered() -> bool {
    CONSOLE.is_completed()
}

struct Writer(&'static dyn Console);

impl fmt::Write for Writer {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.0.write_bytes(s.as_bytes());
        Ok(())
    }
}

pub fn print(args: fmt::Arguments) {
    let Some(console) = CONSOLE.get() else {
        return;
    };
    if PANICKED.load(Ordering::Acquire) {
        loop {
            // Spin forever to avoid further issues.
            hint::spin_loop();
        }
    }
    let _guard = WRITE_LOCK.lock();
    let _ = Writer(*console).write_fmt(args);
}

#[cfg(all(not(test), target_os = "none"))]
#[panic_handler]
fn panic(info: &core::panic::PanicInfo) -> ! {
    PANICKED.store(true, Ordering::Release);
    if let Some(console) = CONSOLE.get() {
        // Another hart may have died holding the lock.
        let mut writer = Writer(*console);
        let _ = writeln!(writer);
        let _ = writeln!(writer, "\x1B[31;1m!!! FIRMWARE PANIC !!!\x1B[0m");
        if let Some(hart) = crate::arch::current_hart() {
            let _ = writeln!(writer);
            let _ = writeln!(writer, "Hart:");
            let _ = writeln!(writer, "  {hart}");
        }
        if let Some(loc) = info.location() {
            let _ = writeln!(writer);
            let _ = writeln!(writer, "Location:");
            let _ = writeln!(writer, "  {loc}");
        }
        let _ = writeln!(writer);
        let _ = writeln!(writer, "Message:");
        let _ = writeln!(writer, "  {}", info.message());
    }
    riscv_utils::asm::hang()
}
