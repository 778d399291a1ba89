//! One output register shared by many channels, for the busy-loop mode.
//!
//! In the busy-loop mode every channel toggles its own bit of a single output word
//! (for example a GPIO set/clear register). A [`RegisterLine`] is an
//! [`OutputPin`] that touches only its own bit, so channels sharing the word never
//! disturb each other.
//!
//! [`SharedRegister`] is an in-memory word with the same semantics, handy on the host
//! and as a model for a real register binding: implement [`OutputRegister`] for a type
//! that writes the hardware's atomic set and clear aliases.

use core::convert::Infallible;

use embedded_hal::digital::{ErrorType, OutputPin, StatefulOutputPin};
use portable_atomic::{AtomicU32, Ordering};

/// A 32-bit output word with atomic per-bit set and clear.
///
/// Both operations must leave every bit outside `mask` untouched, even when other
/// contexts are writing other bits at the same time.
pub trait OutputRegister {
    /// Drive every bit in `mask` high.
    fn set_bits(&self, mask: u32);
    /// Drive every bit in `mask` low.
    fn clear_bits(&self, mask: u32);
    /// The current output word.
    fn read(&self) -> u32;
}

/// An output word held in an atomic.
#[derive(Debug, Default)]
pub struct SharedRegister(AtomicU32);

impl SharedRegister {
    /// A register with the given initial contents.
    #[must_use]
    pub const fn new(initial: u32) -> Self {
        Self(AtomicU32::new(initial))
    }
}

impl OutputRegister for SharedRegister {
    fn set_bits(&self, mask: u32) {
        self.0.fetch_or(mask, Ordering::AcqRel);
    }

    fn clear_bits(&self, mask: u32) {
        self.0.fetch_and(!mask, Ordering::AcqRel);
    }

    fn read(&self) -> u32 {
        self.0.load(Ordering::Acquire)
    }
}

/// One bit of an [`OutputRegister`], usable as an output line.
pub struct RegisterLine<'r, R: OutputRegister + ?Sized> {
    register: &'r R,
    mask: u32,
}

impl<'r, R: OutputRegister + ?Sized> RegisterLine<'r, R> {
    /// The line for bit `bit` of `register`.
    ///
    /// # Panics
    ///
    /// Panics if `bit >= 32`.
    #[must_use]
    pub const fn new(register: &'r R, bit: u8) -> Self {
        assert!(bit < 32, "register bit out of range");
        Self {
            register,
            mask: 1 << bit,
        }
    }

    /// The single-bit mask this line drives.
    #[must_use]
    pub const fn mask(&self) -> u32 {
        self.mask
    }
}

impl<R: OutputRegister + ?Sized> ErrorType for RegisterLine<'_, R> {
    type Error = Infallible;
}

impl<R: OutputRegister + ?Sized> OutputPin for RegisterLine<'_, R> {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.register.clear_bits(self.mask);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.register.set_bits(self.mask);
        Ok(())
    }
}

impl<R: OutputRegister + ?Sized> StatefulOutputPin for RegisterLine<'_, R> {
    fn is_set_high(&mut self) -> Result<bool, Self::Error> {
        Ok(self.register.read() & self.mask != 0)
    }

    fn is_set_low(&mut self) -> Result<bool, Self::Error> {
        Ok(self.register.read() & self.mask == 0)
    }
}
