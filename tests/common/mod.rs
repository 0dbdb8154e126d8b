//! Common test utilities and helpers

#![allow(dead_code)] // Test utilities may not all be used in every test file

pub mod builders;
pub mod mock_helpers;

use pendulum_eeg::AcquisitionEngine;
use std::time::{Duration, Instant};

/// Upper bound on waiting for the worker in tests
pub fn test_timeout() -> Duration {
    Duration::from_secs(5)
}

/// Assert two floats are approximately equal
pub fn assert_float_eq(a: f64, b: f64, epsilon: f64) {
    assert!(
        (a - b).abs() < epsilon,
        "Expected {} to be approximately equal to {} (epsilon: {})",
        a,
        b,
        epsilon
    );
}

/// Poll `condition` until it holds, panicking after [`test_timeout`]
pub fn wait_until(engine: &AcquisitionEngine, what: &str, condition: impl Fn(&AcquisitionEngine) -> bool) {
    let deadline = Instant::now() + test_timeout();
    while !condition(engine) {
        assert!(Instant::now() < deadline, "timed out waiting for {}", what);
        std::thread::sleep(Duration::from_millis(5));
    }
}
