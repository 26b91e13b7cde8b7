pub mod cascades;
pub mod synthetic_frame;

/// Routes crate logs to the test harness when RUST_LOG is set.
pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}
