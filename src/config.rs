// Harness configuration.
//
// Populated by the command line (mode) and the environment (message
// length sweep), then handed to [`crate::harness::Harness`].

use std::ops::RangeInclusive;
use std::str::FromStr;
use std::time::Duration;

use tracing::warn;

use crate::entropy::{DEFAULT_RETRY_PAUSE, POOL_LEN};
use crate::error::ConfigError;
use crate::ntru_params::ParamSetId;

/// Loop constant for benchmark mode.
pub const LOOPS: u32 = 1000;

/// Environment variable selecting the message lengths to test.
pub const LENGTHS_ENV: &str = "NTRU_SANITY_LENGTHS";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunMode {
    /// Every operation once, correctness only.
    #[default]
    Sanity,
    /// Repeat operations and report average latency.
    Bench,
}

/// Which message lengths each parameter set is exercised with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LengthSweep {
    /// Only the maximum message length.
    #[default]
    MaxOnly,
    /// Every length from 0 to the maximum.
    Full,
    /// `start..=end`, clipped to the maximum. Empty if `start` is above
    /// either bound.
    Range { start: usize, end: usize },
}

impl LengthSweep {
    pub fn lengths(&self, max: usize) -> RangeInclusive<usize> {
        match *self {
            LengthSweep::MaxOnly => max..=max,
            LengthSweep::Full => 0..=max,
            LengthSweep::Range { start, end } if start <= end && start <= max => start..=end.min(max),
            LengthSweep::Range { .. } => RangeInclusive::new(1, 0),
        }
    }
}

impl FromStr for LengthSweep {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bad = || ConfigError::InvalidLengthSweep(s.to_string());
        match s.trim() {
            "max" => Ok(LengthSweep::MaxOnly),
            "all" => Ok(LengthSweep::Full),
            other => {
                let (lo, hi) = other.split_once('-').ok_or_else(bad)?;
                let start = lo.trim().parse().map_err(|_| bad())?;
                let end = hi.trim().parse().map_err(|_| bad())?;
                if start > end {
                    return Err(bad());
                }
                Ok(LengthSweep::Range { start, end })
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct HarnessConfig {
    pub mode: RunMode,
    pub bench_loops: u32,
    /// Security strength requested from every DRBG instance.
    pub drbg_strength: u16,
    pub personalization: Vec<u8>,
    pub lengths: LengthSweep,
    /// Parameter sets to test, in order.
    pub param_sets: Vec<ParamSetId>,
    pub pool_capacity: usize,
    /// Pause between retries of a failing randomness device.
    pub retry_pause: Duration,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            mode: RunMode::Sanity,
            bench_loops: LOOPS,
            drbg_strength: 256,
            personalization: Vec::new(),
            lengths: LengthSweep::MaxOnly,
            param_sets: ParamSetId::ALL.to_vec(),
            pool_capacity: POOL_LEN,
            retry_pause: DEFAULT_RETRY_PAUSE,
        }
    }
}

impl HarnessConfig {
    pub fn new(mode: RunMode) -> Self {
        Self { mode, ..Self::default() }
    }

    /// Applies `NTRU_SANITY_LENGTHS` if set.
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(v) = std::env::var(LENGTHS_ENV) {
            self.apply_length_override(&v);
        }
        self
    }

    /// Parses a length sweep; an invalid value is logged and ignored.
    pub fn apply_length_override(&mut self, value: &str) {
        match value.parse() {
            Ok(sweep) => self.lengths = sweep,
            Err(e) => warn!(var = LENGTHS_ENV, "{e}; keeping {:?}", self.lengths),
        }
    }

    pub fn keygen_iterations(&self) -> u32 {
        match self.mode {
            RunMode::Sanity => 1,
            RunMode::Bench => (self.bench_loops / 10).max(1),
        }
    }

    /// Iterations for each of encrypt and decrypt.
    pub fn crypt_iterations(&self) -> u32 {
        match self.mode {
            RunMode::Sanity => 1,
            RunMode::Bench => self.bench_loops.max(1),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_cover_every_set_in_order() {
        let cfg = HarnessConfig::default();
        assert_eq!(cfg.param_sets.len(), 16);
        assert_eq!(cfg.param_sets[0], ParamSetId::Ees401Ep1);
        assert_eq!(cfg.param_sets[15], ParamSetId::Ees743Ep1);
        assert_eq!(cfg.drbg_strength, 256);
        assert_eq!(cfg.pool_capacity, 4096);
        assert_eq!(cfg.lengths, LengthSweep::MaxOnly);
    }

    #[test]
    fn iteration_counts_follow_mode() {
        let mut cfg = HarnessConfig::new(RunMode::Sanity);
        assert_eq!((cfg.keygen_iterations(), cfg.crypt_iterations()), (1, 1));

        cfg.mode = RunMode::Bench;
        assert_eq!((cfg.keygen_iterations(), cfg.crypt_iterations()), (100, 1000));

        cfg.bench_loops = 5;
        assert_eq!((cfg.keygen_iterations(), cfg.crypt_iterations()), (1, 5));
        cfg.bench_loops = 0;
        assert_eq!((cfg.keygen_iterations(), cfg.crypt_iterations()), (1, 1));
    }

    #[test]
    fn sweep_ranges() {
        assert_eq!(LengthSweep::MaxOnly.lengths(60), 60..=60);
        assert_eq!(LengthSweep::Full.lengths(60).count(), 61);
        assert_eq!(LengthSweep::Range { start: 10, end: 100 }.lengths(60), 10..=60);
        assert_eq!(LengthSweep::Range { start: 60, end: 100 }.lengths(60), 60..=60);
        // nothing in range is never widened to the maximum
        assert_eq!(LengthSweep::Range { start: 70, end: 100 }.lengths(60).count(), 0);
        assert_eq!(LengthSweep::Range { start: 5, end: 3 }.lengths(60).count(), 0);
    }

    #[test]
    fn sweep_parsing() {
        assert_eq!("max".parse(), Ok(LengthSweep::MaxOnly));
        assert_eq!(" all ".parse(), Ok(LengthSweep::Full));
        assert_eq!("0-5".parse(), Ok(LengthSweep::Range { start: 0, end: 5 }));
        assert_eq!(
            "5-0".parse::<LengthSweep>(),
            Err(ConfigError::InvalidLengthSweep("5-0".into()))
        );
        assert!("most".parse::<LengthSweep>().is_err());
        assert!("1-x".parse::<LengthSweep>().is_err());
    }

    #[test]
    fn invalid_override_is_ignored() {
        let mut cfg = HarnessConfig::default();
        cfg.apply_length_override("all");
        assert_eq!(cfg.lengths, LengthSweep::Full);
        cfg.apply_length_override("garbage");
        assert_eq!(cfg.lengths, LengthSweep::Full);
    }
}
