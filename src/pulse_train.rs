//! The per-channel two-phase timing state machine.
//!
//! A [`PulseTrain`] owns one output line and turns the shared [`ChannelState`] of its
//! channel into a pulse at the start of every 20 ms frame:
//!
//! ```text
//!          |<- width ->|<------------ FRAME - width ------------>|
//! active   ┌───────────┐                                         ┌────
//! idle  ───┘           └─────────────────────────────────────────┘
//!          ^ Idle -> PulseHigh      ^ PulseHigh -> Idle          ^ next frame
//! ```
//!
//! Every firing re-arms relative to the *previous deadline*, never to the time the
//! firing actually ran, so wake-up latency shows up as bounded jitter on a single edge
//! and never accumulates into frame drift.

use embassy_time::{Duration, Instant};
use embedded_hal::digital::{OutputPin, PinState};

use crate::channel::{ChannelState, FRAME_NS};
use crate::schedule::{Schedule, Wake};

/// Which half of the frame a channel is in.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Phase {
    /// Line at its idle level, waiting for the next frame to start.
    Idle,
    /// Line at its active level for the pulse of the current frame.
    PulseHigh,
}

/// Timing loop of one servo channel.
///
/// Reads width and flags from its [`ChannelState`] on every firing; owns the phase and
/// the deadline bookkeeping exclusively.
///
/// Normally created for you by [`Ppm::new`](crate::ppm::Ppm::new). Drive it with
/// [`run`](Self::run), or step it by hand with [`fire`](Self::fire).
pub struct PulseTrain<'a, P> {
    index: usize,
    state: &'a ChannelState,
    line: P,
    phase: Phase,
    // Low-phase length, fixed when the current pulse began.
    low_ns: u32,
    // Offset of the next deadline from the start of the train.
    deadline_ns: u64,
}

impl<'a, P: OutputPin> PulseTrain<'a, P> {
    /// Take ownership of `line` and drive it to the channel's idle level.
    pub fn new(index: usize, state: &'a ChannelState, line: P) -> Self {
        let mut pulse_train = Self {
            index,
            state,
            line,
            phase: Phase::Idle,
            low_ns: FRAME_NS,
            deadline_ns: 0,
        };
        let idle = state.flags().is_inverted();
        pulse_train.drive(idle);
        pulse_train
    }

    /// Channel index this train drives.
    #[must_use]
    pub const fn index(&self) -> usize {
        self.index
    }

    /// Current phase.
    #[must_use]
    pub const fn phase(&self) -> Phase {
        self.phase
    }

    /// Offset of the next scheduled firing from the start of the train, in nanoseconds.
    #[must_use]
    pub const fn next_deadline_ns(&self) -> u64 {
        self.deadline_ns
    }

    /// Handle one firing at the current deadline; returns the re-arm interval in
    /// nanoseconds and advances the deadline by it.
    ///
    /// - Enabled and idle: read the width once, drive the active level, re-arm after
    ///   the width. The rest of the frame is fixed now as `FRAME_NS - width`.
    /// - Pulse in progress (enabled or not): drive the idle level, re-arm after the
    ///   rest of the frame fixed when the pulse began.
    /// - Disabled and idle: leave the line alone, re-arm after a whole frame.
    ///
    /// A pulse that is running when the channel is disabled therefore ends on schedule;
    /// it is not cut short, and no further pulse starts.
    pub fn fire(&mut self) -> u32 {
        let flags = self.state.flags();
        let active = !flags.is_inverted();

        let rearm_ns = match (self.phase, flags.is_enabled()) {
            (Phase::Idle, true) => {
                let width_ns = self.state.read_width();
                self.drive(active);
                self.phase = Phase::PulseHigh;
                self.low_ns = FRAME_NS.saturating_sub(width_ns);
                width_ns
            }
            (Phase::PulseHigh, _) => {
                self.drive(!active);
                self.phase = Phase::Idle;
                self.low_ns
            }
            (Phase::Idle, false) => FRAME_NS,
        };

        self.deadline_ns = self.deadline_ns.saturating_add(u64::from(rearm_ns));
        rearm_ns
    }

    /// Run the timing loop until the channel is halted, then park the line.
    ///
    /// The first firing is due immediately. Deadlines are absolute offsets from the
    /// instant the loop starts; each one is converted to an [`Instant`] on its own so
    /// tick rounding never accumulates.
    pub async fn run<S: Schedule>(&mut self, schedule: &S) {
        let origin = Instant::now();
        info!("servo {}: pulse train started", self.index);

        loop {
            let deadline = origin
                .checked_add(Duration::from_nanos(self.deadline_ns))
                .unwrap_or(Instant::MAX);
            match schedule.sleep_until(deadline, self.state.halt()).await {
                Wake::Deadline => {
                    self.fire();
                }
                Wake::Halt => break,
            }
        }

        self.park();
        self.state.parked().signal(());
        info!("servo {}: pulse train stopped", self.index);
    }

    /// Force the line to the safe level (LOW) and return to [`Phase::Idle`].
    ///
    /// The schedule is rewound too, so a later [`run`](Self::run) fires at once.
    pub fn park(&mut self) {
        self.drive(false);
        self.phase = Phase::Idle;
        self.low_ns = FRAME_NS;
        self.deadline_ns = 0;
    }

    /// Give the output line back.
    pub fn into_line(self) -> P {
        self.line
    }

    fn drive(&mut self, level: bool) {
        if self.line.set_state(PinState::from(level)).is_err() {
            error!("servo {}: output line rejected a level change", self.index);
        }
    }
}
