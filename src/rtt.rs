//! Round-trip-time estimation for the retransmission timers in RDT3.0,
//! Selective-Repeat, and the stream transport.
//!
//! Classic Jacobson/Karels EWMA: `srtt = 0.875*srtt + 0.125*sample`,
//! `rttvar = 0.75*rttvar + 0.25*|sample - srtt|`, `rto = max(0.1s, srtt +
//! 4*rttvar)`. No upper clamp on the RTO — a slow link is allowed to back
//! off as far as the samples say it should.

use std::time::Duration;

const ALPHA: f64 = 0.875;
const BETA: f64 = 0.75;
const MIN_RTO: Duration = Duration::from_millis(100);
const INITIAL_SRTT: Duration = Duration::from_secs(1);
const INITIAL_RTTVAR: Duration = Duration::from_millis(500);

#[derive(Debug, Clone)]
pub struct RttEstimator {
    srtt: Duration,
    rttvar: Duration,
    rto: Duration,
}

impl Default for RttEstimator {
    fn default() -> Self {
        Self {
            srtt: INITIAL_SRTT,
            rttvar: INITIAL_RTTVAR,
            rto: INITIAL_SRTT + 4 * INITIAL_RTTVAR,
        }
    }
}

impl RttEstimator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed in one round-trip sample, skipping samples taken from
    /// retransmitted segments (Karn's algorithm is the caller's
    /// responsibility — this estimator just does the arithmetic). The EWMA
    /// is applied unconditionally, blending from the 1 s/0.5 s initial seed
    /// rather than overwriting it on the first sample.
    pub fn update(&mut self, sample: Duration) {
        let srtt_secs = self.srtt.as_secs_f64();
        let sample_secs = sample.as_secs_f64();
        let diff = (sample_secs - srtt_secs).abs();
        let new_srtt = ALPHA * srtt_secs + (1.0 - ALPHA) * sample_secs;
        let new_rttvar = BETA * self.rttvar.as_secs_f64() + (1.0 - BETA) * diff;
        self.srtt = Duration::from_secs_f64(new_srtt.max(0.0));
        self.rttvar = Duration::from_secs_f64(new_rttvar.max(0.0));
        self.recompute_rto();
    }

    fn recompute_rto(&mut self) {
        let candidate = self.srtt + 4 * self.rttvar;
        self.rto = candidate.max(MIN_RTO);
    }

    pub fn srtt(&self) -> Duration {
        self.srtt
    }

    pub fn rttvar(&self) -> Duration {
        self.rttvar
    }

    pub fn rto(&self) -> Duration {
        self.rto
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_sample_blends_with_the_initial_seed() {
        let mut e = RttEstimator::new();
        e.update(Duration::from_millis(200));
        let expected_srtt = ALPHA * INITIAL_SRTT.as_secs_f64() + (1.0 - ALPHA) * 0.2;
        let expected_rttvar = BETA * INITIAL_RTTVAR.as_secs_f64()
            + (1.0 - BETA) * (INITIAL_SRTT.as_secs_f64() - 0.2).abs();
        assert!((e.srtt().as_secs_f64() - expected_srtt).abs() < 1e-9);
        assert!((e.rttvar().as_secs_f64() - expected_rttvar).abs() < 1e-9);
    }

    #[test]
    fn rto_never_drops_below_floor() {
        let mut e = RttEstimator::new();
        for _ in 0..20 {
            e.update(Duration::from_millis(1));
        }
        assert!(e.rto() >= MIN_RTO);
    }

    #[test]
    fn stable_samples_converge_rto_toward_sample() {
        let mut e = RttEstimator::new();
        for _ in 0..50 {
            e.update(Duration::from_millis(300));
        }
        assert!(e.srtt() > Duration::from_millis(290));
        assert!(e.srtt() < Duration::from_millis(310));
    }

    #[test]
    fn jittery_samples_widen_rttvar() {
        let mut e = RttEstimator::new();
        for _ in 0..20 {
            e.update(Duration::from_millis(100));
        }
        let stable_rttvar = e.rttvar();
        e.update(Duration::from_millis(900));
        assert!(e.rttvar() > stable_rttvar);
    }
}
