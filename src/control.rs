//! The control path: one session per channel with command and text access.
//!
//! A [`ServoSession`] is the only writer of its channel's width and flags. At most one
//! session per channel exists at a time; [`PpmStatic::open`] rejects a second one
//! instead of waiting, and dropping the session frees the channel again.
//!
//! Three equivalent ways to drive a channel are offered:
//!
//! - typed methods ([`ServoSession::enable`], [`ServoSession::write_width`], ...),
//! - raw command codes through [`ServoSession::ioctl`], numbered like the classic
//!   character-device interface (see [`ioctl`]),
//! - decimal text through [`ServoSession::write_text`] and [`ServoSession::read_text`].
//!
//! ```rust,no_run
//! use ppm_servos::control::ioctl;
//! use ppm_servos::ppm::PpmStatic;
//!
//! static PPM_STATIC: PpmStatic<2> = PpmStatic::new_static();
//!
//! fn example() -> ppm_servos::Result<()> {
//!     let servo = PPM_STATIC.open(1)?;
//!     servo.write_text(b"1250000\n");
//!
//!     let mut flags = 0b01;
//!     servo.ioctl(ioctl::WRITE_FLAGS, &mut flags)?;
//!
//!     let mut width = 0;
//!     servo.ioctl(ioctl::READ_WIDTH, &mut width)?;
//!     assert_eq!(width, 1_250_000);
//!     Ok(())
//! }
//! ```

use core::fmt::Write as _;

use crate::channel::{ChannelState, MAX_WIDTH_NS, MIN_WIDTH_NS, ServoFlags};
use crate::ppm::PpmStatic;
use crate::{Error, Result};

/// Most bytes of a text write that are looked at; the rest is consumed unread.
pub const TEXT_CAPACITY: usize = 15;

/// Raw command codes, encoded the way Linux `_IO`/`_IOR`/`_IOW` encode them.
///
/// Every code carries the type byte `b's'`; the payload size is that of a pointer.
pub mod ioctl {
    const NR_BITS: u32 = 8;
    const TYPE_BITS: u32 = 8;
    const SIZE_BITS: u32 = 14;

    const TYPE_SHIFT: u32 = NR_BITS;
    const SIZE_SHIFT: u32 = TYPE_SHIFT + TYPE_BITS;
    const DIR_SHIFT: u32 = SIZE_SHIFT + SIZE_BITS;

    const NONE: u32 = 0;
    const WRITE: u32 = 1;
    const READ: u32 = 2;

    /// Type byte shared by every servo command.
    pub const MAGIC: u8 = b's';

    #[allow(clippy::cast_possible_truncation, reason = "pointer size is 4 or 8")]
    const PAYLOAD_SIZE: u32 = core::mem::size_of::<*const u32>() as u32;

    #[allow(clippy::cast_lossless, reason = "u32::from is not const")]
    const fn encode(dir: u32, nr: u32, size: u32) -> u32 {
        (dir << DIR_SHIFT) | (size << SIZE_SHIFT) | ((MAGIC as u32) << TYPE_SHIFT) | nr
    }

    /// Start generating pulses. No payload.
    pub const ENABLE: u32 = encode(NONE, 0, 0);
    /// Stop generating pulses. No payload.
    pub const DISABLE: u32 = encode(NONE, 1, 0);
    /// Toggle polarity. No payload.
    pub const INVERT: u32 = encode(NONE, 2, 0);
    /// Replace the flags with the payload bitmask (bit 0 enabled, bit 1 inverted).
    pub const WRITE_FLAGS: u32 = encode(WRITE, 3, PAYLOAD_SIZE);
    /// Read the flags bitmask into the payload.
    pub const READ_FLAGS: u32 = encode(READ, 4, PAYLOAD_SIZE);
    /// Set the pulse width to the payload, in nanoseconds (clamped).
    pub const WRITE_WIDTH: u32 = encode(WRITE, 5, PAYLOAD_SIZE);
    /// Read the pulse width in nanoseconds into the payload.
    ///
    /// Carries the write direction bits, as the classic interface numbered it.
    pub const READ_WIDTH: u32 = encode(WRITE, 6, PAYLOAD_SIZE);

    /// The type byte of a raw code.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, reason = "masked to 8 bits")]
    pub const fn type_of(code: u32) -> u8 {
        ((code >> TYPE_SHIFT) & ((1 << TYPE_BITS) - 1)) as u8
    }
}

// ============================================================================
// Command / Reply
// ============================================================================

/// One control operation on a channel.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Command {
    /// Set the enabled flag.
    Enable,
    /// Clear the enabled flag.
    Disable,
    /// Toggle the inverted flag.
    Invert,
    /// Replace both flags from a bitmask.
    WriteFlags(u32),
    /// Read the flags bitmask.
    ReadFlags,
    /// Set the pulse width in nanoseconds.
    WriteWidth(u32),
    /// Read the pulse width in nanoseconds.
    ReadWidth,
}

impl Command {
    /// Decode a raw command code; `arg` is the payload for the write commands.
    ///
    /// # Errors
    ///
    /// [`Error::ForeignCommand`] if the code does not carry the servo type byte,
    /// [`Error::UnknownCommand`] if it does but names no servo command.
    pub const fn decode(code: u32, arg: u32) -> Result<Self> {
        if ioctl::type_of(code) != ioctl::MAGIC {
            return Err(Error::ForeignCommand { code });
        }
        match code {
            ioctl::ENABLE => Ok(Self::Enable),
            ioctl::DISABLE => Ok(Self::Disable),
            ioctl::INVERT => Ok(Self::Invert),
            ioctl::WRITE_FLAGS => Ok(Self::WriteFlags(arg)),
            ioctl::READ_FLAGS => Ok(Self::ReadFlags),
            ioctl::WRITE_WIDTH => Ok(Self::WriteWidth(arg)),
            ioctl::READ_WIDTH => Ok(Self::ReadWidth),
            _ => Err(Error::UnknownCommand { code }),
        }
    }

    /// True for the commands that hand a value back through the payload.
    #[must_use]
    pub const fn is_read(self) -> bool {
        matches!(self, Self::ReadFlags | Self::ReadWidth)
    }

    /// The raw code of this command.
    #[must_use]
    pub const fn code(self) -> u32 {
        match self {
            Self::Enable => ioctl::ENABLE,
            Self::Disable => ioctl::DISABLE,
            Self::Invert => ioctl::INVERT,
            Self::WriteFlags(_) => ioctl::WRITE_FLAGS,
            Self::ReadFlags => ioctl::READ_FLAGS,
            Self::WriteWidth(_) => ioctl::WRITE_WIDTH,
            Self::ReadWidth => ioctl::READ_WIDTH,
        }
    }
}

/// Result of executing a [`Command`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Reply {
    /// The command had nothing to report.
    Done,
    /// Current flags bitmask.
    Flags(u32),
    /// Current (or newly stored) pulse width in nanoseconds.
    Width(u32),
}

impl Reply {
    /// The value to hand back through the payload, if any.
    #[must_use]
    pub const fn value(self) -> Option<u32> {
        match self {
            Self::Done => None,
            Self::Flags(bits) => Some(bits),
            Self::Width(width_ns) => Some(width_ns),
        }
    }
}

// ============================================================================
// Sessions
// ============================================================================

impl<const N: usize> PpmStatic<N> {
    /// Open the control session of channel `index`.
    ///
    /// # Errors
    ///
    /// [`Error::ChannelOutOfRange`] if `index >= N`, [`Error::SessionBusy`] if a session
    /// on that channel is already open. The open session is not affected.
    pub fn open(&self, index: usize) -> Result<ServoSession<'_>> {
        let state = self.channel(index)?;
        if !state.try_open() {
            warn!("servo {}: already open", index);
            return Err(Error::SessionBusy { index });
        }
        debug!("servo {}: session opened", index);
        Ok(ServoSession { index, state })
    }
}

/// Exclusive control access to one channel. Dropping it closes the session.
pub struct ServoSession<'a> {
    index: usize,
    state: &'a ChannelState,
}

impl ServoSession<'_> {
    /// Channel index of this session.
    #[must_use]
    pub const fn index(&self) -> usize {
        self.index
    }

    /// Start generating pulses from the next frame on. Idempotent.
    pub fn enable(&self) {
        self.state.set_flags(ServoFlags::ENABLED);
    }

    /// Stop generating pulses after the current one. Idempotent.
    pub fn disable(&self) {
        self.state.clear_flags(ServoFlags::ENABLED);
    }

    /// Flip the polarity; applying it twice restores the original.
    pub fn invert(&self) {
        self.state.toggle_flags(ServoFlags::INVERTED);
    }

    /// The current pulse width in nanoseconds.
    #[must_use]
    pub fn read_width(&self) -> u32 {
        self.state.read_width()
    }

    /// Set the pulse width in nanoseconds; out-of-range values are clamped.
    ///
    /// Returns the width actually stored. It takes effect at the start of the next pulse.
    pub fn write_width(&self, width_ns: u32) -> u32 {
        let stored = self.state.write_width(width_ns);
        if stored != width_ns {
            warn!("servo {}: width {} ns clamped to {} ns", self.index, width_ns, stored);
        }
        stored
    }

    /// The current flags as a bitmask (bit 0 enabled, bit 1 inverted).
    #[must_use]
    pub fn read_flags(&self) -> u32 {
        self.state.flags().bits()
    }

    /// Replace both flags from a bitmask in one step; other bits are ignored.
    pub fn write_flags(&self, bits: u32) {
        let flags = ServoFlags::from_bits_truncate(bits);
        self.state.replace_flags(flags);
        info!(
            "servo {}: enabled={} inverted={}",
            self.index,
            flags.is_enabled(),
            flags.is_inverted()
        );
    }

    /// Set the position as an angle; 0 maps to the minimum width, 180 to the maximum.
    ///
    /// Angles past 180 are treated as 180. Returns the width stored.
    pub fn write_degrees(&self, degrees: u16) -> u32 {
        let degrees = u32::from(degrees.min(180));
        let width_ns = MIN_WIDTH_NS + degrees * (MAX_WIDTH_NS - MIN_WIDTH_NS) / 180;
        debug!("servo {}: {} degrees -> {} ns", self.index, degrees, width_ns);
        self.state.write_width(width_ns)
    }

    /// Move to the middle of the range (1.5 ms).
    pub fn center(&self) -> u32 {
        self.state.write_width(MIN_WIDTH_NS + (MAX_WIDTH_NS - MIN_WIDTH_NS) / 2)
    }

    /// Apply one command.
    pub fn execute(&self, command: Command) -> Reply {
        match command {
            Command::Enable => {
                self.enable();
                Reply::Done
            }
            Command::Disable => {
                self.disable();
                Reply::Done
            }
            Command::Invert => {
                self.invert();
                Reply::Done
            }
            Command::WriteFlags(bits) => {
                self.write_flags(bits);
                Reply::Done
            }
            Command::ReadFlags => Reply::Flags(self.read_flags()),
            Command::WriteWidth(width_ns) => Reply::Width(self.write_width(width_ns)),
            Command::ReadWidth => Reply::Width(self.read_width()),
        }
    }

    /// Apply a raw command code.
    ///
    /// `arg` carries the payload of the write commands in. Only the read commands
    /// (`READ_FLAGS`, `READ_WIDTH`) store their result back into it.
    ///
    /// # Errors
    ///
    /// [`Error::ForeignCommand`] or [`Error::UnknownCommand`] if `code` cannot be decoded;
    /// nothing is changed in that case.
    pub fn ioctl(&self, code: u32, arg: &mut u32) -> Result<()> {
        let command = Command::decode(code, *arg).inspect_err(|_| {
            warn!("servo {}: rejected command {=u32:#x}", self.index, code);
        })?;
        let reply = self.execute(command);
        if let (true, Some(value)) = (command.is_read(), reply.value()) {
            *arg = value;
        }
        Ok(())
    }

    /// Set the width from decimal text such as `b"1500000\n"`.
    ///
    /// Always reports the input as consumed, up to [`TEXT_CAPACITY`] bytes. Only the
    /// first [`TEXT_CAPACITY`] bytes are parsed. Text without a number changes nothing
    /// and is only logged; numbers out of range are clamped.
    pub fn write_text(&self, text: &[u8]) -> usize {
        let consumed = text.len().min(TEXT_CAPACITY);
        match parse_decimal(&text[..consumed]) {
            Some(width_ns) => {
                self.write_width(width_ns);
            }
            None => error!("servo {}: cannot parse width from {} bytes", self.index, consumed),
        }
        consumed
    }

    /// Copy the width as decimal text plus `\n`, starting at byte `offset`, into `buf`.
    ///
    /// Returns the number of bytes copied; 0 once `offset` reaches the end of the text.
    pub fn read_text(&self, offset: usize, buf: &mut [u8]) -> usize {
        let mut text: heapless::String<16> = heapless::String::new();
        // A u32 and a newline always fit.
        let _ = writeln!(text, "{}", self.read_width());

        let Some(rest) = text.as_bytes().get(offset..) else {
            return 0;
        };
        let copied = rest.len().min(buf.len());
        buf[..copied].copy_from_slice(&rest[..copied]);
        copied
    }
}

impl Drop for ServoSession<'_> {
    fn drop(&mut self) {
        self.state.close();
        debug!("servo {}: session closed", self.index);
    }
}

/// Parse a decimal integer the way `%d` does and map it onto `u32`.
///
/// Leading whitespace and one sign are accepted; digits stop at the first non-digit.
/// Negative values become 0 and values past `u32::MAX` saturate. `None` if there is no
/// digit.
fn parse_decimal(text: &[u8]) -> Option<u32> {
    let start = text
        .iter()
        .position(|byte| !byte.is_ascii_whitespace())
        .unwrap_or(text.len());
    let mut rest = &text[start..];

    let negative = match rest {
        [b'-', tail @ ..] => {
            rest = tail;
            true
        }
        [b'+', tail @ ..] => {
            rest = tail;
            false
        }
        _ => false,
    };

    let digits = rest.iter().take_while(|byte| byte.is_ascii_digit()).count();
    if digits == 0 {
        return None;
    }

    let magnitude = rest[..digits].iter().fold(0_u32, |value, digit| {
        value
            .saturating_mul(10)
            .saturating_add(u32::from(digit - b'0'))
    });

    Some(if negative { 0 } else { magnitude })
}
