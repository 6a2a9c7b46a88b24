//! Build script for pixel-envoy.

use std::{env, fs, path::PathBuf};

fn main() {
    println!("cargo:rustc-check-cfg=cfg(rust_analyzer)");

    let out_dir = PathBuf::from(env::var("OUT_DIR").expect("cargo sets OUT_DIR"));
    let target = env::var("TARGET").expect("cargo sets TARGET");

    // Pick the linker memory layout for the board; host builds need none.
    let memory_file = if target.starts_with("thumbv8m") {
        "memory-pico2.x"
    } else if target.starts_with("thumbv6m") {
        "memory-pico1.x"
    } else {
        return;
    };

    let memory_x =
        fs::read_to_string(memory_file).unwrap_or_else(|_| panic!("Failed to read {memory_file}"));
    fs::write(out_dir.join("memory.x"), memory_x).expect("Failed to write memory.x");
    println!("cargo:rustc-link-search={}", out_dir.display());
    println!("cargo:rerun-if-changed={memory_file}");
}
