#![allow(missing_docs)]
//! Host-level tests for the per-channel parameter store.

use std::thread;

use ppm_servos::channel::{
    ChannelState, FRAME_NS, MAX_WIDTH_NS, MIN_WIDTH_NS, ServoFlags, clamp_width,
};
use ppm_servos::ppm::PpmStatic;

#[test]
fn new_channel_is_disabled_at_minimum_width() {
    let state = ChannelState::new();
    assert_eq!(state.read_width(), MIN_WIDTH_NS);
    assert_eq!(state.flags(), ServoFlags::NONE);
    assert!(!state.is_open());
}

#[test]
fn widths_in_range_read_back_unchanged() {
    let state = ChannelState::new();
    for width_ns in [
        MIN_WIDTH_NS,
        1_000_001,
        1_234_567,
        1_500_000,
        1_999_999,
        MAX_WIDTH_NS,
    ] {
        assert_eq!(state.write_width(width_ns), width_ns);
        assert_eq!(state.read_width(), width_ns);
    }
}

#[test]
fn widths_below_range_clamp_to_minimum() {
    let state = ChannelState::new();
    state.write_width(1_700_000);
    for width_ns in [0, 1, 500_000, MIN_WIDTH_NS - 1] {
        assert_eq!(state.write_width(width_ns), MIN_WIDTH_NS);
        assert_eq!(state.read_width(), MIN_WIDTH_NS);
    }
}

#[test]
fn widths_above_range_clamp_to_maximum() {
    let state = ChannelState::new();
    for width_ns in [MAX_WIDTH_NS + 1, 3_000_000, FRAME_NS, u32::MAX] {
        assert_eq!(state.write_width(width_ns), MAX_WIDTH_NS);
        assert_eq!(state.read_width(), MAX_WIDTH_NS);
    }
}

#[test]
fn clamp_is_usable_in_const_context() {
    const LOW: u32 = clamp_width(0);
    const HIGH: u32 = clamp_width(u32::MAX);
    assert_eq!((LOW, HIGH), (MIN_WIDTH_NS, MAX_WIDTH_NS));
}

#[test]
fn set_clear_toggle_flags() {
    let state = ChannelState::new();

    state.set_flags(ServoFlags::ENABLED);
    state.set_flags(ServoFlags::ENABLED);
    assert!(state.flags().is_enabled());
    assert!(!state.flags().is_inverted());

    state.toggle_flags(ServoFlags::INVERTED);
    assert_eq!(state.flags(), ServoFlags::ENABLED | ServoFlags::INVERTED);

    state.clear_flags(ServoFlags::ENABLED);
    state.clear_flags(ServoFlags::ENABLED);
    assert_eq!(state.flags(), ServoFlags::INVERTED);

    state.toggle_flags(ServoFlags::INVERTED);
    assert_eq!(state.flags(), ServoFlags::NONE);
}

#[test]
fn unknown_flag_bits_are_dropped() {
    let flags = ServoFlags::from_bits_truncate(0xFFFF_FFFF);
    assert_eq!(flags.bits(), ServoFlags::USER_MASK);
    assert_eq!(flags.bits(), 0b11);
}

#[test]
fn replace_flags_keeps_the_session_guard() {
    let ppm_static = PpmStatic::<1>::new_static();
    let session = ppm_static.open(0).expect("channel 0 exists");
    let state = ppm_static.channel(0).expect("channel 0 exists");

    state.replace_flags(ServoFlags::ENABLED | ServoFlags::INVERTED);
    assert!(state.is_open());
    state.replace_flags(ServoFlags::NONE);
    assert!(state.is_open());
    assert_eq!(state.flags(), ServoFlags::NONE);

    drop(session);
    assert!(!state.is_open());
}

#[test]
fn concurrent_width_writes_are_never_torn() {
    const A: u32 = 1_000_001;
    const B: u32 = 1_999_999;
    let state = ChannelState::new();
    state.write_width(A);

    thread::scope(|scope| {
        scope.spawn(|| {
            for round in 0..50_000 {
                state.write_width(if round % 2 == 0 { A } else { B });
            }
        });
        scope.spawn(|| {
            for _ in 0..50_000 {
                let width_ns = state.read_width();
                assert!(width_ns == A || width_ns == B, "torn width {width_ns}");
            }
        });
    });
}

#[test]
fn concurrent_flag_updates_do_not_lose_bits() {
    let state = ChannelState::new();

    thread::scope(|scope| {
        // An even number of toggles leaves INVERTED where it started.
        scope.spawn(|| {
            for _ in 0..10_000 {
                state.toggle_flags(ServoFlags::INVERTED);
            }
        });
        scope.spawn(|| {
            for _ in 0..10_000 {
                state.set_flags(ServoFlags::ENABLED);
                state.clear_flags(ServoFlags::ENABLED);
            }
            state.set_flags(ServoFlags::ENABLED);
        });
    });

    assert_eq!(state.flags(), ServoFlags::ENABLED);
}

#[test]
fn channels_do_not_share_state() {
    let ppm_static = PpmStatic::<3>::new_static();
    let first = ppm_static.channel(0).expect("channel 0 exists");
    let last = ppm_static.channel(2).expect("channel 2 exists");

    first.write_width(1_100_000);
    first.set_flags(ServoFlags::ENABLED);
    last.write_width(1_900_000);
    last.set_flags(ServoFlags::INVERTED);

    assert_eq!(first.read_width(), 1_100_000);
    assert_eq!(first.flags(), ServoFlags::ENABLED);
    assert_eq!(last.read_width(), 1_900_000);
    assert_eq!(last.flags(), ServoFlags::INVERTED);

    let middle = ppm_static.channel(1).expect("channel 1 exists");
    assert_eq!(middle.read_width(), MIN_WIDTH_NS);
    assert_eq!(middle.flags(), ServoFlags::NONE);
}
