use cfg_if::cfg_if;
use core::sync::atomic::AtomicBool;
use core::sync::atomic::Ordering;

static INIT: AtomicBool = AtomicBool::new(false);

/// Initializes the logger with debug mode, logging all messages including trace messages.
pub fn init_logger_debug() {
    if !INIT.swap(true, Ordering::SeqCst) {
        init(true);
    }
}

/// Initializes the logger with default mode, only logging errors and above.
pub fn init_logger() {
    if !INIT.swap(true, Ordering::SeqCst) {
        init(false);
    }
}

cfg_if! {
    if #[cfg(feature = "flexi_logger")] {
        fn init(debug: bool) {
            let env = if debug {
                "eddic_core=trace"
            } else {
                "eddic_core=error"
            };
            flexi_logger::Logger::try_with_env_or_str(env)
                .expect("Failed to initialize logger")
                .start()
                .expect("Failed to start logger");
        }
    }

    else {
        fn init(_debug: bool) {
            println!("No logger enabled. Logs will not be recorded.");
        }
    }
}
