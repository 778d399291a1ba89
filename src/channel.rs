//! Per-channel parameter store shared by the timing path and the control path.
//!
//! A [`ChannelState`] holds the target pulse width and the behavioral flags of one
//! servo output. Every access is a single lock-free atomic operation, so the timing
//! path can read it from any execution context without ever waiting on a control
//! session that is writing it.
//!
//! The phase bookkeeping (which half of the frame a channel is in, and when the next
//! transition is due) is *not* here. It is owned by [`PulseTrain`](crate::pulse_train::PulseTrain)
//! and nothing else can reach it.

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::signal::Signal;
use portable_atomic::{AtomicU32, Ordering};

// ============================================================================
// Constants
// ============================================================================

/// Length of one PPM frame in nanoseconds (20 ms, 50 Hz).
pub const FRAME_NS: u32 = 20_000_000;

/// Shortest pulse width in nanoseconds (1.0 ms).
pub const MIN_WIDTH_NS: u32 = 1_000_000;

/// Longest pulse width in nanoseconds (2.0 ms).
pub const MAX_WIDTH_NS: u32 = 2_000_000;

/// Clamp a requested pulse width into [`MIN_WIDTH_NS`]..=[`MAX_WIDTH_NS`].
#[must_use]
pub const fn clamp_width(width_ns: u32) -> u32 {
    if width_ns < MIN_WIDTH_NS {
        MIN_WIDTH_NS
    } else if width_ns > MAX_WIDTH_NS {
        MAX_WIDTH_NS
    } else {
        width_ns
    }
}

// ============================================================================
// ServoFlags - enabled/inverted bits
// ============================================================================

/// The externally visible flag bits of a channel.
///
/// Bit 0 is *enabled*, bit 1 is *inverted*; this is also the layout of the bitmask
/// exchanged by the `READ_FLAGS`/`WRITE_FLAGS` commands.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ServoFlags(u32);

impl ServoFlags {
    /// No flags: disabled, normal polarity.
    pub const NONE: Self = Self(0);
    /// Pulses are generated.
    pub const ENABLED: Self = Self(1 << 0);
    /// Idle HIGH / active LOW instead of idle LOW / active HIGH.
    pub const INVERTED: Self = Self(1 << 1);

    /// Mask of all bits the control path may read or write.
    pub const USER_MASK: u32 = Self::ENABLED.0 | Self::INVERTED.0;

    /// Build from a raw bitmask; bits outside [`Self::USER_MASK`] are dropped.
    #[must_use]
    pub const fn from_bits_truncate(bits: u32) -> Self {
        Self(bits & Self::USER_MASK)
    }

    /// The raw bitmask.
    #[must_use]
    pub const fn bits(self) -> u32 {
        self.0
    }

    /// True if every bit of `other` is set in `self`.
    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// True if the channel generates pulses.
    #[must_use]
    pub const fn is_enabled(self) -> bool {
        self.contains(Self::ENABLED)
    }

    /// True if the channel's polarity is flipped.
    #[must_use]
    pub const fn is_inverted(self) -> bool {
        self.contains(Self::INVERTED)
    }
}

impl core::ops::BitOr for ServoFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

// Session guard bit; shares the flags word but is never exposed through ServoFlags.
const SESSION_OPEN: u32 = 1 << 3;

// ============================================================================
// ChannelState - the shared record of one channel
// ============================================================================

/// Signal used to halt a channel's timing loop and to report that it has parked.
pub type ChannelSignal = Signal<CriticalSectionRawMutex, ()>;

/// Shared parameters of one servo channel.
///
/// Created once per channel by [`PpmStatic`](crate::ppm::PpmStatic) and shared by exactly
/// two actors: the channel's timing loop (reads only) and at most one
/// [`ServoSession`](crate::control::ServoSession) (writes).
///
/// Width and flags live in separate atomic words. Each is replaced in one store or one
/// read-modify-write, so a reader sees either the whole old value or the whole new one.
pub struct ChannelState {
    width_ns: AtomicU32,
    flags: AtomicU32,
    halt: ChannelSignal,
    parked: ChannelSignal,
}

impl ChannelState {
    /// A disabled, non-inverted channel at the minimum pulse width.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            width_ns: AtomicU32::new(MIN_WIDTH_NS),
            flags: AtomicU32::new(0),
            halt: Signal::new(),
            parked: Signal::new(),
        }
    }

    /// The last committed pulse width in nanoseconds. Never blocks.
    #[must_use]
    pub fn read_width(&self) -> u32 {
        self.width_ns.load(Ordering::Acquire)
    }

    /// Clamp and commit a new pulse width; returns the value actually stored.
    ///
    /// The running timing loop picks the new value up at the start of its next pulse.
    pub fn write_width(&self, width_ns: u32) -> u32 {
        let width_ns = clamp_width(width_ns);
        self.width_ns.store(width_ns, Ordering::Release);
        width_ns
    }

    /// The current enabled/inverted flags.
    #[must_use]
    pub fn flags(&self) -> ServoFlags {
        ServoFlags::from_bits_truncate(self.flags.load(Ordering::Acquire))
    }

    /// Atomically set the given flags.
    pub fn set_flags(&self, flags: ServoFlags) {
        self.flags.fetch_or(flags.bits(), Ordering::AcqRel);
    }

    /// Atomically clear the given flags.
    pub fn clear_flags(&self, flags: ServoFlags) {
        self.flags.fetch_and(!flags.bits(), Ordering::AcqRel);
    }

    /// Atomically toggle the given flags.
    pub fn toggle_flags(&self, flags: ServoFlags) {
        self.flags.fetch_xor(flags.bits(), Ordering::AcqRel);
    }

    /// Replace both enabled and inverted in one atomic step.
    ///
    /// Other bits of the flags word (the session guard) are preserved.
    pub fn replace_flags(&self, flags: ServoFlags) {
        let mut current = self.flags.load(Ordering::Relaxed);
        loop {
            let next = (current & !ServoFlags::USER_MASK) | flags.bits();
            match self.flags.compare_exchange_weak(
                current,
                next,
                Ordering::AcqRel,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(actual) => current = actual,
            }
        }
    }

    /// Claim the single control session; false if it is already claimed.
    pub(crate) fn try_open(&self) -> bool {
        self.flags.fetch_or(SESSION_OPEN, Ordering::AcqRel) & SESSION_OPEN == 0
    }

    /// Release the control session claimed by [`Self::try_open`].
    pub(crate) fn close(&self) {
        self.flags.fetch_and(!SESSION_OPEN, Ordering::AcqRel);
    }

    /// True while a control session holds this channel.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.flags.load(Ordering::Acquire) & SESSION_OPEN != 0
    }

    pub(crate) const fn halt(&self) -> &ChannelSignal {
        &self.halt
    }

    pub(crate) const fn parked(&self) -> &ChannelSignal {
        &self.parked
    }
}

impl Default for ChannelState {
    fn default() -> Self {
        Self::new()
    }
}
