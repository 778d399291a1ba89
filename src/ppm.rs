//! Startup, run and stop of a fixed set of servo channels.
//!
//! The engine is split the same way as the other devices in this crate: a
//! [`PpmStatic`] holds everything that must outlive the running loops (the shared
//! [`ChannelState`] of every channel) and is normally placed in a `static`, while
//! [`Ppm`] owns the output lines and the per-channel [`PulseTrain`]s.
//!
//! # Example
//!
//! ```rust,no_run
//! use core::convert::Infallible;
//! use ppm_servos::ppm::{Ppm, PpmStatic};
//! use ppm_servos::register::{RegisterLine, SharedRegister};
//! use ppm_servos::schedule::TimerSchedule;
//!
//! static PPM_STATIC: PpmStatic<4> = PpmStatic::new_static();
//! static OUTPUTS: SharedRegister = SharedRegister::new(0);
//!
//! async fn example() -> ppm_servos::Result<()> {
//!     let mut ppm = Ppm::new(&PPM_STATIC, |index| {
//!         Ok::<_, Infallible>(RegisterLine::new(&OUTPUTS, index as u8))
//!     })?;
//!
//!     let servo0 = PPM_STATIC.open(0)?;
//!     servo0.write_width(1_500_000);
//!     servo0.enable();
//!
//!     // Runs until `PPM_STATIC.stop()` is awaited from another task.
//!     ppm.run(&TimerSchedule).await;
//!     let _lines = ppm.release();
//!     Ok(())
//! }
//! ```

use embassy_futures::join::join_array;
use embedded_hal::digital::OutputPin;
use heapless::Vec;

use crate::channel::ChannelState;
use crate::pulse_train::PulseTrain;
use crate::schedule::Schedule;
use crate::{Error, Result};

/// Shared per-channel state for [`Ppm`]; lives as long as the engine and its sessions.
pub struct PpmStatic<const N: usize> {
    channels: [ChannelState; N],
}

impl<const N: usize> PpmStatic<N> {
    /// `N` disabled, non-inverted channels at the minimum pulse width.
    #[must_use]
    pub const fn new_static() -> Self {
        Self {
            channels: [const { ChannelState::new() }; N],
        }
    }

    /// Number of channels.
    #[must_use]
    pub const fn len(&self) -> usize {
        N
    }

    /// True if there are no channels.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        N == 0
    }

    /// The shared state of channel `index`.
    ///
    /// # Errors
    ///
    /// [`Error::ChannelOutOfRange`] if `index >= N`.
    pub fn channel(&self, index: usize) -> Result<&ChannelState> {
        self.channels
            .get(index)
            .ok_or(Error::ChannelOutOfRange { index, count: N })
    }

    /// Halt every channel and wait until each one has parked its line LOW.
    ///
    /// When this returns no channel will toggle its line again. Call it only while
    /// [`Ppm::run`] is being polled somewhere, otherwise it never completes.
    pub async fn stop(&self) {
        info!("ppm: stopping {} channels", N);
        for channel in &self.channels {
            channel.halt().signal(());
        }
        for channel in &self.channels {
            channel.parked().wait().await;
        }
        info!("ppm: all channels parked");
    }
}

impl<const N: usize> Default for PpmStatic<N> {
    fn default() -> Self {
        Self::new_static()
    }
}

/// A running set of `N` servo channels, each with its own output line.
pub struct Ppm<'a, P, const N: usize> {
    trains: [PulseTrain<'a, P>; N],
}

impl<'a, P: OutputPin, const N: usize> Ppm<'a, P, N> {
    /// Acquire the output line of every channel in index order.
    ///
    /// Each line is driven to its channel's idle level as soon as it is acquired. If
    /// acquiring line `i` fails, lines `i - 1` down to `0` are parked LOW and dropped
    /// in that order before the error is returned, so no partial engine survives.
    ///
    /// # Errors
    ///
    /// [`Error::LineUnavailable`] with the index of the line that could not be acquired.
    pub fn new<E>(
        ppm_static: &'a PpmStatic<N>,
        mut acquire: impl FnMut(usize) -> core::result::Result<P, E>,
    ) -> Result<Self> {
        let mut trains: Vec<PulseTrain<'a, P>, N> = Vec::new();

        for (index, state) in ppm_static.channels.iter().enumerate() {
            match acquire(index) {
                Ok(line) => {
                    debug!("servo {}: line acquired", index);
                    // Capacity is N and we push at most N trains.
                    let _ = trains.push(PulseTrain::new(index, state, line));
                }
                Err(_) => {
                    error!("servo {}: line unavailable, unwinding {}", index, trains.len());
                    while let Some(mut train) = trains.pop() {
                        train.park();
                        drop(train.into_line());
                    }
                    return Err(Error::LineUnavailable { index });
                }
            }
        }

        info!("ppm: {} channels ready", N);
        trains
            .into_array()
            .map_err(|trains| Error::LineUnavailable {
                index: trains.len(),
            })
            .map(|trains| Self { trains })
    }

    /// Run every channel's timing loop until [`PpmStatic::stop`] is called.
    ///
    /// All channels are polled from this one future; with [`TimerSchedule`] they
    /// share the executor's timer queue.
    ///
    /// [`TimerSchedule`]: crate::schedule::TimerSchedule
    pub async fn run<S: Schedule>(&mut self, schedule: &S) {
        join_array(self.trains.each_mut().map(|train| train.run(schedule))).await;
    }

    /// Borrow the timing loop of channel `index`.
    ///
    /// # Errors
    ///
    /// [`Error::ChannelOutOfRange`] if `index >= N`.
    pub fn train(&self, index: usize) -> Result<&PulseTrain<'a, P>> {
        self.trains
            .get(index)
            .ok_or(Error::ChannelOutOfRange { index, count: N })
    }

    /// Park every line LOW and hand the lines back in index order.
    pub fn release(self) -> [P; N] {
        self.trains.map(|mut train| {
            train.park();
            train.into_line()
        })
    }
}
