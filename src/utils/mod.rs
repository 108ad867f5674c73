//! Utility functions and helpers.

pub mod http;

use std::time::Duration;

use rand::Rng;

use crate::models::DelayRange;

/// Draw a uniformly random delay from an inclusive range.
pub fn random_delay(range: DelayRange) -> Duration {
    if range.max_ms <= range.min_ms {
        return Duration::from_millis(range.min_ms);
    }
    let ms = rand::thread_rng().gen_range(range.min_ms..=range.max_ms);
    Duration::from_millis(ms)
}

/// Random delay multiplied by a list position, so requests fan out over time.
pub fn staggered_delay(range: DelayRange, position: usize) -> Duration {
    let factor = u32::try_from(position).unwrap_or(u32::MAX);
    random_delay(range).saturating_mul(factor)
}
