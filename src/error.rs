//! Crate-wide error type.

/// Errors returned by the servo channels, their sessions and the engine startup.
///
/// Out-of-range pulse widths and unparseable text are never errors; they are clamped
/// or ignored and only logged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, derive_more::Display, derive_more::Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// A channel index outside `0..count` was given.
    #[display("servo channel {index} does not exist (have {count})")]
    ChannelOutOfRange {
        /// The requested index.
        index: usize,
        /// The number of channels.
        count: usize,
    },

    /// A control session is already open on this channel.
    #[display("servo channel {index} is already open")]
    SessionBusy {
        /// The channel index.
        index: usize,
    },

    /// A servo command code with an unknown command number.
    #[display("unknown servo command {code:#x}")]
    UnknownCommand {
        /// The raw command code.
        code: u32,
    },

    /// A command code that does not belong to the servo command family.
    #[display("command {code:#x} is not a servo command")]
    ForeignCommand {
        /// The raw command code.
        code: u32,
    },

    /// The output line for a channel could not be acquired at startup.
    #[display("output line for servo channel {index} is unavailable")]
    LineUnavailable {
        /// The channel index.
        index: usize,
    },
}

impl Error {
    /// Negative errno-style code for this error, distinct per variant.
    ///
    /// Useful where the control surface must report a plain integer status.
    #[must_use]
    pub const fn code(&self) -> i32 {
        match self {
            Self::ChannelOutOfRange { .. } => -19, // ENODEV
            Self::SessionBusy { .. } => -16,       // EBUSY
            Self::UnknownCommand { .. } => -25,    // ENOTTY
            Self::ForeignCommand { .. } => -22,    // EINVAL
            Self::LineUnavailable { .. } => -5,    // EIO
        }
    }
}

/// Result type for this crate.
pub type Result<T, E = Error> = core::result::Result<T, E>;
