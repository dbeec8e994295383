//! Property tests for the sine oscillator
//!
//! These cover the rendering guarantees the real-time path relies on:
//! increment derivation, silence when off, amplitude bound, monotonic phase,
//! and zero-crossing activation.

use std::f64::consts::TAU;

use proptest::prelude::*;
use wavemaker::audio::Oscillator;

proptest! {
    #[test]
    fn increment_matches_sample_rate(rate in 1u32..=384_000) {
        let osc = Oscillator::new();
        let handle = osc.handle();
        handle.set_sample_rate(rate);
        let expected = (TAU * 440.0) / f64::from(rate);
        prop_assert!((handle.phase_increment() - expected).abs() <= expected * 1e-12);
    }

    #[test]
    fn tone_off_is_exact_silence(rate in 8_000u32..=192_000, frames in 1usize..2048) {
        let mut osc = Oscillator::new();
        let handle = osc.handle();
        handle.set_sample_rate(rate);

        let mut buf = vec![1.0_f32; frames];
        osc.render(&mut buf);
        prop_assert!(buf.iter().all(|s| *s == 0.0));
        prop_assert_eq!(osc.phase(), 0.0);
    }

    #[test]
    fn tone_on_is_bounded_and_phase_advances(
        rate in 8_000u32..=192_000,
        frames in 2usize..1024,
        warmup in 0usize..512,
    ) {
        let mut osc = Oscillator::new();
        let handle = osc.handle();
        handle.set_sample_rate(rate);
        handle.set_wave_on(true);

        let mut scratch = vec![0.0_f32; warmup];
        osc.render(&mut scratch);

        let increment = handle.phase_increment();
        let mut previous = osc.phase();
        let mut buf = [0.0_f32; 1];
        for _ in 0..frames {
            osc.render(&mut buf);
            prop_assert!(buf[0].abs() <= 0.3);

            let advanced = (osc.phase() - previous).rem_euclid(TAU);
            prop_assert!(advanced > 0.0);
            prop_assert!((advanced - increment).abs() < 1e-9);
            previous = osc.phase();
        }
    }

    #[test]
    fn activation_starts_at_zero_crossing(rate in 8_000u32..=192_000, on_frames in 1usize..4096) {
        let mut osc = Oscillator::new();
        let handle = osc.handle();
        handle.set_sample_rate(rate);

        handle.set_wave_on(true);
        let mut buf = vec![0.0_f32; on_frames];
        osc.render(&mut buf);

        handle.set_wave_on(false);
        osc.render(&mut buf);

        handle.set_wave_on(true);
        let mut first = [1.0_f32; 1];
        osc.render(&mut first);
        prop_assert_eq!(first[0], 0.0);
    }
}

#[test]
fn scenario_tone_on_at_48k() {
    let mut osc = Oscillator::new();
    let handle = osc.handle();
    handle.set_sample_rate(48000);
    assert!((handle.phase_increment() - 0.0575958653).abs() < 1e-9);

    handle.set_wave_on(true);
    let mut buf = [0.0_f32; 4];
    osc.render(&mut buf);

    let expected = [
        0.0,
        (0.0575958653_f64.sin() * 0.3) as f32,
        (0.1151917306_f64.sin() * 0.3) as f32,
        (0.1727875959_f64.sin() * 0.3) as f32,
    ];
    for (actual, expected) in buf.iter().zip(expected.iter()) {
        assert!((actual - expected).abs() < 1e-6);
    }
}

#[test]
fn scenario_tone_off_resets_phase() {
    let mut osc = Oscillator::new();
    let handle = osc.handle();
    handle.set_sample_rate(48000);
    handle.set_wave_on(true);
    let mut buf = [0.0_f32; 10];
    osc.render(&mut buf);

    handle.set_wave_on(false);
    let mut buf = [0.5_f32; 3];
    osc.render(&mut buf);
    assert_eq!(buf, [0.0, 0.0, 0.0]);
    assert_eq!(osc.phase(), 0.0);
}
