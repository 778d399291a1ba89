//! Software pulse-period-modulated (PPM) signals for hobby RC servos.
//!
//! Each output channel drives one digital line HIGH for a programmable pulse width
//! (1.0 to 2.0 ms) once per fixed 20 ms frame. A control path can read and update the
//! pulse width and the enable/invert flags of any channel at any time; the timing path
//! never waits on it.
//!
//! # Glossary
//!
//! - **Frame:** the fixed 20 ms period of every channel ([`FRAME_NS`](channel::FRAME_NS)).
//! - **Pulse width:** how long the line is held at its active level at the start of each
//!   frame, clamped to [`MIN_WIDTH_NS`](channel::MIN_WIDTH_NS)..=[`MAX_WIDTH_NS`](channel::MAX_WIDTH_NS).
//! - **Active / idle level:** HIGH / LOW normally, LOW / HIGH when the channel is inverted.
//! - **Firing:** one wake-up of a channel's timing loop at a scheduled deadline.
//!
//! # Parts
//!
//! - [`channel`]: the per-channel parameter store shared by both paths.
//! - [`pulse_train`]: the per-channel two-phase timing state machine.
//! - [`schedule`]: the two interchangeable ways of waiting for the next deadline.
//! - [`ppm`]: startup, run and stop of a fixed set of channels.
//! - [`control`]: per-channel sessions with ioctl-style and textual access.
//! - [`register`]: a shared output register word for the busy-loop mode.
#![cfg_attr(not(test), no_std)]
#![allow(async_fn_in_trait, reason = "single-threaded embedded")]

// Compile-time checks for the demo board selection
#[cfg(all(feature = "pico1", feature = "pico2"))]
compile_error!("Cannot enable both 'pico1' and 'pico2' features simultaneously");

#[cfg(all(feature = "arm", feature = "riscv"))]
compile_error!("Cannot enable both 'arm' and 'riscv' features simultaneously");

#[cfg(all(feature = "pico1", feature = "riscv"))]
compile_error!("Pico 1 (RP2040) only supports ARM architecture, not RISC-V");

// Must come first so the logging macros are visible in every module below.
#[macro_use]
mod fmt;

pub mod channel;
pub mod control;
mod error;
pub mod ppm;
pub mod pulse_train;
pub mod register;
pub mod schedule;

// Re-export error types and result (used throughout)
pub use crate::error::{Error, Result};
