//! CLI smoke entry point.
//!
//! # Responsibility
//! - Provide a minimal executable to verify `milepost_core` linkage.
//! - Keep output deterministic for quick local sanity checks.

fn main() {
    // Tiny probe to validate core crate wiring independently from the
    // Flutter/FFI runtime setup.
    println!("milepost_core ping={}", milepost_core::ping());
    println!("milepost_core version={}", milepost_core::core_version());
    println!(
        "milepost_core schema_version={}",
        milepost_core::db::migrations::latest_version()
    );
    println!(
        "milepost_core default_log_level={}",
        milepost_core::default_log_level()
    );
}
