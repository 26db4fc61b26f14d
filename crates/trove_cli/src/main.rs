//! CLI smoke entry point.
//!
//! # Responsibility
//! - Provide a minimal executable to verify `trove_core` linkage.
//! - Keep output deterministic for quick local sanity checks.

fn main() {
    println!("trove_core ping={}", trove_core::ping());
    println!("trove_core version={}", trove_core::core_version());
}
