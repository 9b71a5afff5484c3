// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn fake_clock_advances_monotonically() {
    let clock = FakeClock::new();
    let t0 = clock.now();
    clock.advance(Duration::from_millis(50));
    assert!(clock.now() > t0);
}

#[test]
fn fake_clock_epoch_tracks_advance() {
    let clock = FakeClock::new();
    clock.set_epoch_ms(1_000);
    clock.advance(Duration::from_millis(500));
    assert_eq!(clock.epoch_ms(), 1_500);
}

#[test]
fn system_clock_epoch_is_plausible() {
    let clock = SystemClock;
    // Any time after 2020-01-01.
    assert!(clock.epoch_ms() > 1_577_836_800_000);
}
