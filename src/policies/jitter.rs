//! # Jitter for retry delays.
//!
//! Callers that lose an admission race tend to retry in lockstep; jitter
//! spreads them out.
//!
//! - [`JitterPolicy::None`] exact delay
//! - [`JitterPolicy::Full`] uniform in `[0, delay]`
//! - [`JitterPolicy::Equal`] `delay/2` plus uniform in `[0, delay/2]`
//! - [`JitterPolicy::Decorrelated`] uniform in `[floor, 3 × delay]`, capped

use std::time::Duration;

use rand::Rng;

/// Randomization applied on top of a backoff delay.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum JitterPolicy {
    /// Use the delay as computed.
    #[default]
    None,
    /// Uniform in `[0, delay]`.
    Full,
    /// Keeps at least half of the delay.
    Equal,
    /// Uniform between `floor` and three times the delay, capped at `max`.
    Decorrelated,
}

impl JitterPolicy {
    /// Jitters `delay` using the thread-local RNG.
    ///
    /// `floor` and `max` bound the decorrelated variant; the others ignore them.
    pub fn apply(&self, delay: Duration, floor: Duration, max: Duration) -> Duration {
        self.apply_with(&mut rand::rng(), delay, floor, max)
    }

    /// Same as [`apply`](Self::apply) with a caller-supplied RNG.
    pub fn apply_with<R: Rng>(
        &self,
        rng: &mut R,
        delay: Duration,
        floor: Duration,
        max: Duration,
    ) -> Duration {
        let ms = millis(delay);
        match self {
            JitterPolicy::None => delay,
            JitterPolicy::Full if ms == 0 => Duration::ZERO,
            JitterPolicy::Full => Duration::from_millis(rng.random_range(0..=ms)),
            JitterPolicy::Equal => {
                let half = ms / 2;
                let extra = if half == 0 { 0 } else { rng.random_range(0..=half) };
                Duration::from_millis(half + extra)
            }
            JitterPolicy::Decorrelated => {
                let lo = millis(floor);
                let hi = ms.saturating_mul(3).min(millis(max)).max(lo);
                if lo >= hi {
                    return floor;
                }
                Duration::from_millis(rng.random_range(lo..=hi))
            }
        }
    }
}

fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use super::*;

    const FLOOR: Duration = Duration::from_millis(100);
    const MAX: Duration = Duration::from_secs(10);

    #[test]
    fn none_is_identity() {
        let d = Duration::from_millis(750);
        assert_eq!(JitterPolicy::None.apply(d, FLOOR, MAX), d);
    }

    #[test]
    fn bounded_variants_stay_in_range() {
        let mut rng = StdRng::seed_from_u64(7);
        let d = Duration::from_millis(1000);
        for _ in 0..200 {
            let full = JitterPolicy::Full.apply_with(&mut rng, d, FLOOR, MAX);
            assert!(full <= d);

            let equal = JitterPolicy::Equal.apply_with(&mut rng, d, FLOOR, MAX);
            assert!(equal >= d / 2 && equal <= d);

            let dec = JitterPolicy::Decorrelated.apply_with(&mut rng, d, FLOOR, MAX);
            assert!(dec >= FLOOR && dec <= Duration::from_millis(3000));
        }
    }

    #[test]
    fn decorrelated_respects_cap_and_floor() {
        let mut rng = StdRng::seed_from_u64(1);
        let capped = JitterPolicy::Decorrelated.apply_with(
            &mut rng,
            Duration::from_secs(8),
            FLOOR,
            MAX,
        );
        assert!(capped <= MAX);

        let tiny = JitterPolicy::Decorrelated.apply_with(&mut rng, Duration::ZERO, FLOOR, MAX);
        assert_eq!(tiny, FLOOR);
    }

    #[test]
    fn zero_delay_stays_zero() {
        assert_eq!(JitterPolicy::Full.apply(Duration::ZERO, FLOOR, MAX), Duration::ZERO);
        assert_eq!(JitterPolicy::Equal.apply(Duration::ZERO, FLOOR, MAX), Duration::ZERO);
    }
}
