//! How a [`PulseTrain`](crate::pulse_train::PulseTrain) waits for its next deadline.
//!
//! Two interchangeable backends share the same state machine and the same
//! re-arm-from-previous-deadline rule; they differ only in how the wait is realized:
//!
//! - [`TimerSchedule`] arms an `embassy-time` alarm for the absolute deadline and
//!   sleeps. Many channels share one timer queue; this is the default.
//! - [`SpinSchedule`] busy-waits on the clock until the absolute deadline. Give each
//!   channel (or the whole engine) its own high-priority execution context, such as
//!   the second core or an interrupt executor, and pair it with
//!   [`RegisterLine`](crate::register::RegisterLine) outputs.

use embassy_futures::select::{Either, select};
use embassy_futures::yield_now;
use embassy_time::{Instant, Timer};

pub use crate::channel::ChannelSignal;

/// Why a wait ended.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Wake {
    /// The deadline was reached; the channel should fire.
    Deadline,
    /// The channel was asked to stop; nothing should be toggled any more.
    Halt,
}

/// A way of sleeping until an absolute deadline.
pub trait Schedule {
    /// Wait until `deadline` or until `halt` is signaled, whichever comes first.
    ///
    /// Implementations must treat `deadline` as absolute; they never compute a
    /// relative delay from the current time.
    async fn sleep_until(&self, deadline: Instant, halt: &ChannelSignal) -> Wake;
}

/// Sleep on an `embassy-time` alarm.
#[derive(Clone, Copy, Debug, Default)]
pub struct TimerSchedule;

impl Schedule for TimerSchedule {
    async fn sleep_until(&self, deadline: Instant, halt: &ChannelSignal) -> Wake {
        match select(Timer::at(deadline), halt.wait()).await {
            Either::First(()) => Wake::Deadline,
            Either::Second(()) => Wake::Halt,
        }
    }
}

/// Busy-wait on the clock.
///
/// Yields between polls, so several channels joined in one future still take turns,
/// but never gives the CPU away for longer than one poll of its neighbors.
#[derive(Clone, Copy, Debug, Default)]
pub struct SpinSchedule;

impl Schedule for SpinSchedule {
    async fn sleep_until(&self, deadline: Instant, halt: &ChannelSignal) -> Wake {
        loop {
            if halt.signaled() {
                halt.reset();
                return Wake::Halt;
            }
            if Instant::now() >= deadline {
                return Wake::Deadline;
            }
            yield_now().await;
        }
    }
}
