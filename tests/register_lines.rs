#![allow(missing_docs)]
//! Host-level tests for register-backed output lines.

use std::thread;

use embedded_hal::digital::{OutputPin, StatefulOutputPin};
use ppm_servos::channel::{FRAME_NS, ServoFlags};
use ppm_servos::ppm::PpmStatic;
use ppm_servos::pulse_train::PulseTrain;
use ppm_servos::register::{OutputRegister, RegisterLine, SharedRegister};

#[test]
fn line_touches_only_its_own_bit() {
    let register = SharedRegister::new(0b1010_0000);
    let mut line = RegisterLine::new(&register, 2);
    assert_eq!(line.mask(), 0b100);

    line.set_high().expect("infallible");
    assert_eq!(register.read(), 0b1010_0100);
    assert!(line.is_set_high().expect("infallible"));

    line.set_low().expect("infallible");
    assert_eq!(register.read(), 0b1010_0000);
    assert!(line.is_set_low().expect("infallible"));
}

#[test]
fn neighbouring_lines_do_not_disturb_each_other() {
    let register = SharedRegister::new(0);
    let mut low_bit = RegisterLine::new(&register, 0);
    let mut high_bit = RegisterLine::new(&register, 31);

    low_bit.set_high().expect("infallible");
    high_bit.set_high().expect("infallible");
    low_bit.set_low().expect("infallible");
    assert_eq!(register.read(), 1 << 31);
    assert!(high_bit.is_set_high().expect("infallible"));
}

#[test]
#[should_panic(expected = "register bit out of range")]
fn bit_32_is_rejected() {
    let register = SharedRegister::new(0);
    let _ = RegisterLine::new(&register, 32);
}

#[test]
fn concurrent_writers_keep_their_bits_separate() {
    let register = SharedRegister::new(0);

    thread::scope(|scope| {
        for bit in 0..8_u8 {
            let register = &register;
            scope.spawn(move || {
                let mut line = RegisterLine::new(register, bit);
                for _ in 0..5_000 {
                    line.set_high().expect("infallible");
                    line.set_low().expect("infallible");
                }
                // Odd bits finish high.
                if bit % 2 == 1 {
                    line.set_high().expect("infallible");
                }
            });
        }
    });

    assert_eq!(register.read(), 0b1010_1010);
}

#[test]
fn pulse_trains_share_one_register() {
    let register = SharedRegister::new(0);
    let ppm_static = PpmStatic::<2>::new_static();
    let first_state = ppm_static.channel(0).expect("channel 0 exists");
    let second_state = ppm_static.channel(1).expect("channel 1 exists");
    first_state.write_width(1_000_000);
    first_state.set_flags(ServoFlags::ENABLED);
    second_state.write_width(2_000_000);
    second_state.set_flags(ServoFlags::ENABLED);

    let mut first = PulseTrain::new(0, first_state, RegisterLine::new(&register, 4));
    let mut second = PulseTrain::new(1, second_state, RegisterLine::new(&register, 5));
    assert_eq!(register.read(), 0);

    first.fire();
    second.fire();
    assert_eq!(register.read(), 0b11_0000);

    // Channel 0's pulse ends first.
    assert_eq!(first.fire(), FRAME_NS - 1_000_000);
    assert_eq!(register.read(), 0b10_0000);
    assert_eq!(second.fire(), FRAME_NS - 2_000_000);
    assert_eq!(register.read(), 0);
}
