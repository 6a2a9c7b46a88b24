//! Network-fed pixel output for multi-run WS2812 installations on Pico 1 and 2.
//!
//! A sender streams frames as one UDP packet per output channel ("run"). `pixel-envoy`
//! reassembles those packets into whole frames and shows the newest complete frame on every run at
//! once, dropping whatever is late, stale or malformed.
//!
//! ```text
//!  UDP port base+0 ─┐
//!  UDP port base+1 ─┼─▶ FrameAssembly ──▶ OutputScheduler ──▶ Encoder ──▶ OutputBank ──▶ LEDs
//!  UDP port base+N ─┘     (two slots)       (newest only)     (GRB)       (all runs)
//! ```
//!
//! # Glossary
//!
//! - **Channel / run:** one LED strip on its own GPIO pin and UDP port.
//! - **Frame:** one image across every channel, identified by a sender-assigned
//!   [`FrameId`](frame_assembly::FrameId). Ids wrap around.
//! - **Complete frame:** every channel's packet for that id has arrived.
//! - **Slot:** one of the two frame buffers in [`FrameAssembly`](frame_assembly::FrameAssembly).
//! - **Blackout grace:** start-up window in which nothing is shown.
//! - **PIO ([Programmable I/O](https://medium.com/data-science/nine-pico-pio-wats-with-rust-part-1-9d062067dc25)):**
//!   Pico 1 has 2 blocks, Pico 2 has 3; each block has 4 state machines, so each can drive 4 runs.
//! - **DMA ([Direct Memory Access](https://en.wikipedia.org/wiki/Direct_memory_access)):** Both
//!   Pico 1 and 2 have 12 channels; every run uses one.
//!
//! # Modules
//!
//! - [`channel_config`]: runs, pins and ports, validated at compile time.
//! - [`frame_assembly`]: the shared two-slot frame buffer.
//! - [`encoder`]: pixel bytes to pulse codes, bytes or PIO words.
//! - [`output`]: output hardware traits, bounded waits, and the PIO backend.
//! - [`scheduler`]: the transmit loop.
//! - [`startup`]: the power-on flash sequence.
//! - [`telemetry`]: counters and the status record.
//! - [`control`]: remote restart requests.
//! - `receiver`, `status`, `control_loop` (`net` feature): UDP collaborators.
#![cfg_attr(not(feature = "host"), no_std)]
#![cfg_attr(not(feature = "host"), no_main)]
#![allow(async_fn_in_trait, reason = "single-threaded embedded")]

// Compile-time checks: exactly one board must be selected (unless testing with host feature)
#[cfg(all(not(any(feature = "pico1", feature = "pico2")), not(feature = "host")))]
compile_error!("Must enable exactly one board feature: 'pico1' or 'pico2'");

#[cfg(all(feature = "pico1", feature = "pico2"))]
compile_error!("Cannot enable both 'pico1' and 'pico2' features simultaneously");

// Compile-time check: board builds run on the ARM cores
#[cfg(all(not(feature = "arm"), not(feature = "host")))]
compile_error!("Must enable the 'arm' architecture feature");

pub(crate) mod fmt;

pub mod channel_config;
pub mod control;
pub mod encoder;
mod error;
pub mod frame_assembly;
pub mod output;
// PIO interrupt bindings for the PIO output backend
#[cfg(not(feature = "host"))]
pub mod pio_irqs;
#[cfg(all(feature = "net", not(feature = "host")))]
pub mod receiver;
pub mod scheduler;
pub mod startup;
#[cfg(all(feature = "net", not(feature = "host")))]
pub mod status;
pub mod telemetry;

// Re-export error types and result (used throughout)
pub use crate::error::{Error, Result};
