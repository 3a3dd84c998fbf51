// Round-trip harness.
//
// For each configured parameter set: instantiate a DRBG on the entropy
// pool, size and generate a key pair, encrypt and decrypt messages of the
// configured lengths, compare, tear down. A failure ends only the set it
// happened in; the verdict is read from the per-set records afterwards.

use std::io::Write;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};
use zeroize::Zeroizing;

use crate::config::{HarnessConfig, RunMode};
use crate::entropy::{EntropyFn, EntropyPool, RandomDevice, SystemRandom};
use crate::error::{DrbgError, NtruError};
use crate::nist_drbg::{DrbgHandle, MAX_BYTES_PER_REQUEST};
use crate::ntru_params::ParamSetId;
use crate::scheme::PkeScheme;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HarnessError {
    #[error("An error occurred instantiating the DRBG: {0}")]
    DrbgInstantiate(DrbgError),
    #[error("An error occurred getting the key lengths: {0}")]
    KeySizes(NtruError),
    #[error("An error occurred during key generation: {0}")]
    Keygen(NtruError),
    #[error("Bad public key: {0}")]
    BadPublicKey(NtruError),
    #[error("Bad private key: {0}")]
    BadPrivateKey(NtruError),
    #[error("Encryption error at message length {len}: {source}")]
    Encrypt { len: usize, source: NtruError },
    #[error("Decryption error at message length {len}: {source}")]
    Decrypt { len: usize, source: NtruError },
    #[error("Decrypted plaintext does not match original plaintext ({expected} bytes sent, {actual} recovered)")]
    Mismatch { expected: usize, actual: usize },
    #[error("No message lengths selected (maximum is {max} bytes)")]
    NoLengths { max: usize },
    #[error("could not draw filler bytes: {0}")]
    Filler(DrbgError),
}

/// Average latency per operation; encrypt/decrypt are for the last length tested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SetTimings {
    pub keygen: Duration,
    pub encrypt: Duration,
    pub decrypt: Duration,
    pub lengths_tested: usize,
}

#[derive(Debug, Clone)]
pub struct SetRecord {
    pub id: ParamSetId,
    pub name: &'static str,
    pub outcome: Result<SetTimings, HarnessError>,
}

impl SetRecord {
    pub fn failed(&self) -> bool {
        self.outcome.is_err()
    }
}

#[derive(Debug, Clone, Default)]
pub struct RunReport {
    pub sets: Vec<SetRecord>,
}

impl RunReport {
    /// One flag per tested set, in test order; set on failure.
    pub fn error_record(&self) -> Vec<bool> {
        self.sets.iter().map(SetRecord::failed).collect()
    }

    pub fn passed(&self) -> bool {
        !self.sets.iter().any(SetRecord::failed)
    }

    pub fn failures(&self) -> impl Iterator<Item = &SetRecord> {
        self.sets.iter().filter(|s| s.failed())
    }

    pub fn exit_code(&self) -> i32 {
        if self.passed() {
            0
        } else {
            1
        }
    }
}

fn avg(d: Duration, n: u32) -> Duration {
    d / n.max(1)
}

pub struct Harness<S: PkeScheme, D: RandomDevice = SystemRandom> {
    scheme: S,
    pool: EntropyPool<D>,
    config: HarnessConfig,
}

impl<S: PkeScheme> Harness<S, SystemRandom> {
    /// Harness over an OS-backed pool sized from `config`.
    pub fn new(scheme: S, config: HarnessConfig) -> Self {
        let pool = EntropyPool::with_capacity(SystemRandom, config.pool_capacity)
            .with_retry_pause(config.retry_pause);
        Self { scheme, pool, config }
    }
}

impl<S: PkeScheme, D: RandomDevice> Harness<S, D> {
    pub fn with_pool(scheme: S, pool: EntropyPool<D>, config: HarnessConfig) -> Self {
        Self { scheme, pool, config }
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    pub fn pool(&self) -> &EntropyPool<D> {
        &self.pool
    }

    /// Runs every configured set, writing progress to `progress`.
    pub fn run(&mut self, progress: &mut dyn Write) -> RunReport {
        let mut report = RunReport::default();

        for &id in &self.config.param_sets {
            let name = self.scheme.param_set_name(id);
            let _ = write!(progress, "Testing parameter set {name}... ");
            let _ = progress.flush();

            let outcome = run_param_set(&self.scheme, &self.config, &mut self.pool, id, progress);
            match &outcome {
                Ok(t) => {
                    let _ = writeln!(progress);
                    info!(param_set = name, lengths = t.lengths_tested, "pass");
                }
                Err(e) => {
                    let _ = writeln!(progress, "\tError: {e}");
                    warn!(param_set = name, error = %e, "fail");
                }
            }
            report.sets.push(SetRecord { id, name, outcome });
        }

        let verdict = if report.passed() { "Pass" } else { "Fail" };
        let _ = writeln!(progress, "Result: {verdict}");
        report
    }
}

/// DRBG-INIT, the round trip, TEARDOWN. The DRBG is released on every path.
fn run_param_set<S: PkeScheme>(
    scheme: &S,
    config: &HarnessConfig,
    entropy: &mut dyn EntropyFn,
    id: ParamSetId,
    progress: &mut dyn Write,
) -> Result<SetTimings, HarnessError> {
    let mut drbg = DrbgHandle::instantiate(config.drbg_strength, &config.personalization, entropy)
        .map_err(HarnessError::DrbgInstantiate)?;

    let result = exercise(scheme, config, &mut drbg, id, progress);

    drbg.uninstantiate();
    result
}

fn fill_random(drbg: &mut DrbgHandle<'_>, buf: &mut [u8]) -> Result<(), HarnessError> {
    let strength = drbg.security_strength();
    for chunk in buf.chunks_mut(MAX_BYTES_PER_REQUEST) {
        drbg.generate(strength, chunk).map_err(HarnessError::Filler)?;
    }
    Ok(())
}

/// SIZE-QUERY through VERIFY. Buffers live only for this call.
fn exercise<S: PkeScheme>(
    scheme: &S,
    config: &HarnessConfig,
    drbg: &mut DrbgHandle<'_>,
    id: ParamSetId,
    progress: &mut dyn Write,
) -> Result<SetTimings, HarnessError> {
    let bench = config.mode == RunMode::Bench;

    let sizes = scheme.key_sizes(id).map_err(HarnessError::KeySizes)?;
    let mut public_key = vec![0u8; sizes.public_key];
    let mut private_key = Zeroizing::new(vec![0u8; sizes.private_key]);

    let iters = config.keygen_iterations();
    let t0 = Instant::now();
    for _ in 0..iters {
        scheme
            .keygen(drbg, id, &mut public_key, &mut private_key)
            .map_err(HarnessError::Keygen)?;
    }
    let mut timings = SetTimings { keygen: avg(t0.elapsed(), iters), ..SetTimings::default() };
    if bench {
        let _ = write!(progress, "kg {}us, ", timings.keygen.as_micros());
        let _ = progress.flush();
    }

    let ciphertext_len = scheme.ciphertext_len(&public_key).map_err(HarnessError::BadPublicKey)?;
    let max_msg_len = scheme.max_message_len(&private_key).map_err(HarnessError::BadPrivateKey)?;
    debug!(param_set = %id, ?sizes, ciphertext_len, max_msg_len, "buffer sizes");

    let mut message = Zeroizing::new(vec![0u8; max_msg_len]);
    let mut ciphertext = vec![0u8; ciphertext_len];
    let mut plaintext = Zeroizing::new(vec![0u8; max_msg_len]);

    let iters = config.crypt_iterations();
    for mlen in config.lengths.lengths(max_msg_len) {
        fill_random(drbg, &mut message[..mlen])?;
        fill_random(drbg, &mut ciphertext)?;
        fill_random(drbg, &mut plaintext)?;
        let msg = &message[..mlen];

        let t1 = Instant::now();
        let mut ct_written = 0;
        for _ in 0..iters {
            ct_written = scheme
                .encrypt(drbg, &public_key, msg, &mut ciphertext)
                .map_err(|source| HarnessError::Encrypt { len: mlen, source })?;
        }
        timings.encrypt = avg(t1.elapsed(), iters);
        if bench {
            let _ = write!(progress, "e {}us, ", timings.encrypt.as_micros());
            let _ = progress.flush();
        }

        let t2 = Instant::now();
        let mut pt_len = 0;
        for _ in 0..iters {
            pt_len = scheme
                .decrypt(&private_key, &ciphertext[..ct_written], &mut plaintext)
                .map_err(|source| HarnessError::Decrypt { len: mlen, source })?;
        }
        timings.decrypt = avg(t2.elapsed(), iters);
        if bench {
            let _ = write!(progress, "d {}us", timings.decrypt.as_micros());
        }

        if pt_len != mlen || plaintext[..mlen] != *msg {
            return Err(HarnessError::Mismatch { expected: mlen, actual: pt_len });
        }
        timings.lengths_tested += 1;
    }
    if timings.lengths_tested == 0 {
        return Err(HarnessError::NoLengths { max: max_msg_len });
    }
    Ok(timings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LengthSweep;
    use crate::ntru_encrypt::KeySizes;
    use crate::scheme::Ntru;
    use std::cell::{Cell, RefCell};
    use std::io;

    fn sanity(sets: &[ParamSetId]) -> HarnessConfig {
        HarnessConfig { param_sets: sets.to_vec(), ..HarnessConfig::default() }
    }

    fn output(buf: Vec<u8>) -> String {
        String::from_utf8(buf).unwrap()
    }

    /// Ntru, but with chosen failures and a log of tested message lengths.
    #[derive(Default)]
    struct Rigged {
        inner: Ntru,
        fail_keygen: Option<ParamSetId>,
        fail_ciphertext_len: Option<ParamSetId>,
        fail_encrypt: Option<ParamSetId>,
        fail_decrypt: Option<ParamSetId>,
        corrupt_plaintext: bool,
        encrypted_lengths: RefCell<Vec<usize>>,
        // set by key_sizes, which the harness calls first for every set
        current: Cell<Option<ParamSetId>>,
    }

    impl Rigged {
        fn failing(&self, which: Option<ParamSetId>) -> bool {
            which.is_some() && which == self.current.get()
        }
    }

    impl PkeScheme for Rigged {
        fn key_sizes(&self, id: ParamSetId) -> Result<KeySizes, NtruError> {
            self.current.set(Some(id));
            self.inner.key_sizes(id)
        }

        fn keygen(
            &self,
            drbg: &mut DrbgHandle<'_>,
            id: ParamSetId,
            public_key: &mut [u8],
            private_key: &mut [u8],
        ) -> Result<(), NtruError> {
            if self.fail_keygen == Some(id) {
                return Err(NtruError::KeygenFailed);
            }
            self.inner.keygen(drbg, id, public_key, private_key)
        }

        fn ciphertext_len(&self, public_key: &[u8]) -> Result<usize, NtruError> {
            if self.failing(self.fail_ciphertext_len) {
                return Err(NtruError::BadPublicKey);
            }
            self.inner.ciphertext_len(public_key)
        }

        fn max_message_len(&self, private_key: &[u8]) -> Result<usize, NtruError> {
            self.inner.max_message_len(private_key)
        }

        fn encrypt(
            &self,
            drbg: &mut DrbgHandle<'_>,
            public_key: &[u8],
            msg: &[u8],
            ct: &mut [u8],
        ) -> Result<usize, NtruError> {
            self.encrypted_lengths.borrow_mut().push(msg.len());
            if self.failing(self.fail_encrypt) {
                return Err(NtruError::MessageTooLong { len: msg.len(), max: 0 });
            }
            self.inner.encrypt(drbg, public_key, msg, ct)
        }

        fn decrypt(&self, private_key: &[u8], ct: &[u8], pt: &mut [u8]) -> Result<usize, NtruError> {
            if self.failing(self.fail_decrypt) {
                return Err(NtruError::DecryptionFailed);
            }
            let n = self.inner.decrypt(private_key, ct, pt)?;
            if self.corrupt_plaintext && n > 0 {
                pt[0] ^= 1;
            }
            Ok(n)
        }
    }

    /// OS randomness behind a device that fails its first reads.
    struct Flaky {
        failures_left: usize,
    }

    impl RandomDevice for Flaky {
        fn name(&self) -> &str {
            "flaky"
        }

        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if self.failures_left > 0 {
                self.failures_left -= 1;
                return Err(io::Error::new(io::ErrorKind::WouldBlock, "not ready"));
            }
            SystemRandom.read(buf)
        }
    }

    #[test]
    fn every_parameter_set_round_trips() {
        let mut harness = Harness::new(Ntru, HarnessConfig::default());
        let mut out = Vec::new();
        let report = harness.run(&mut out);

        assert!(report.passed(), "{:?}", report.failures().collect::<Vec<_>>());
        assert_eq!(report.exit_code(), 0);
        assert_eq!(report.error_record(), vec![false; 16]);
        let text = output(out);
        assert!(text.starts_with("Testing parameter set EES401EP1... \n"));
        assert!(text.contains("Testing parameter set EES743EP1... "));
        assert!(text.ends_with("Result: Pass\n"));
    }

    #[test]
    fn one_failing_set_does_not_stop_the_rest() {
        let sets = [ParamSetId::Ees401Ep1, ParamSetId::Ees449Ep1, ParamSetId::Ees401Ep2];
        let scheme = Rigged { fail_keygen: Some(ParamSetId::Ees449Ep1), ..Rigged::default() };
        let mut harness = Harness::new(scheme, sanity(&sets));
        let mut out = Vec::new();
        let report = harness.run(&mut out);

        assert_eq!(report.error_record(), vec![false, true, false]);
        assert_eq!(report.exit_code(), 1);
        assert_eq!(
            report.sets[1].outcome,
            Err(HarnessError::Keygen(NtruError::KeygenFailed))
        );
        // the set after the failure still encrypted
        assert_eq!(harness.scheme.encrypted_lengths.borrow().len(), 2);
        let text = output(out);
        assert!(text.contains("EES449EP1... \tError: An error occurred during key generation"));
        assert!(text.contains("Testing parameter set EES401EP2... \n"));
        assert!(text.ends_with("Result: Fail\n"));
    }

    #[test]
    fn size_encrypt_and_decrypt_failures_stay_in_their_set() {
        let sets = [ParamSetId::Ees401Ep1, ParamSetId::Ees449Ep1, ParamSetId::Ees401Ep2];
        let bad = ParamSetId::Ees449Ep1;
        let max = bad.params().max_msg_len();
        let cases = [
            (
                Rigged { fail_ciphertext_len: Some(bad), ..Rigged::default() },
                HarnessError::BadPublicKey(NtruError::BadPublicKey),
                "\tError: Bad public key",
                2,
            ),
            (
                Rigged { fail_encrypt: Some(bad), ..Rigged::default() },
                HarnessError::Encrypt { len: max, source: NtruError::MessageTooLong { len: max, max: 0 } },
                "\tError: Encryption error at message length",
                3,
            ),
            (
                Rigged { fail_decrypt: Some(bad), ..Rigged::default() },
                HarnessError::Decrypt { len: max, source: NtruError::DecryptionFailed },
                "\tError: Decryption error at message length",
                3,
            ),
        ];

        for (scheme, expected, line, encrypts) in cases {
            let mut harness = Harness::new(scheme, sanity(&sets));
            let mut out = Vec::new();
            let report = harness.run(&mut out);

            assert_eq!(report.error_record(), vec![false, true, false]);
            assert_eq!(report.sets[1].outcome, Err(expected));
            assert_eq!(report.exit_code(), 1);
            assert_eq!(harness.scheme.encrypted_lengths.borrow().len(), encrypts);
            let text = output(out);
            assert!(text.contains(&format!("Testing parameter set EES449EP1... {line}")), "{text}");
            assert!(text.contains("Testing parameter set EES401EP2... \n"));
            assert!(text.ends_with("Result: Fail\n"));
        }
    }

    #[test]
    fn sweep_with_no_lengths_fails_the_set() {
        for lengths in [LengthSweep::Range { start: 70, end: 100 }, LengthSweep::Range { start: 5, end: 3 }] {
            let config = HarnessConfig { lengths, ..sanity(&[ParamSetId::Ees401Ep1]) };
            let mut harness = Harness::new(Rigged::default(), config);
            let report = harness.run(&mut io::sink());
            assert_eq!(report.sets[0].outcome, Err(HarnessError::NoLengths { max: 60 }));
            assert!(harness.scheme.encrypted_lengths.borrow().is_empty());
            assert_eq!(report.exit_code(), 1);
        }
    }

    #[test]
    fn corrupted_plaintext_is_a_mismatch() {
        let scheme = Rigged { corrupt_plaintext: true, ..Rigged::default() };
        let mut harness = Harness::new(scheme, sanity(&[ParamSetId::Ees401Ep1]));
        let report = harness.run(&mut io::sink());
        assert_eq!(report.sets[0].outcome, Err(HarnessError::Mismatch { expected: 60, actual: 60 }));
        assert!(!report.passed());
    }

    #[test]
    fn drbg_failure_fails_every_set() {
        let config = HarnessConfig { drbg_strength: 512, ..sanity(&ParamSetId::ALL[..4]) };
        let scheme = Rigged::default();
        let mut harness = Harness::new(scheme, config);
        let report = harness.run(&mut io::sink());

        assert_eq!(report.error_record(), vec![true; 4]);
        for set in &report.sets {
            assert!(matches!(set.outcome, Err(HarnessError::DrbgInstantiate(DrbgError::StrengthTooHigh { .. }))));
        }
        assert!(harness.scheme.encrypted_lengths.borrow().is_empty());
        assert_eq!(report.exit_code(), 1);
    }

    #[test]
    fn weak_drbg_fails_only_the_stronger_sets() {
        let sets = [ParamSetId::Ees401Ep1, ParamSetId::Ees1087Ep2, ParamSetId::Ees449Ep1];
        let config = HarnessConfig { drbg_strength: 128, ..sanity(&sets) };
        let mut harness = Harness::new(Ntru, config);
        let report = harness.run(&mut io::sink());
        assert_eq!(report.error_record(), vec![false, true, false]);
        assert!(matches!(report.sets[1].outcome, Err(HarnessError::Keygen(NtruError::Drbg(_)))));
    }

    #[test]
    fn length_range_is_swept() {
        let config = HarnessConfig {
            lengths: LengthSweep::Range { start: 0, end: 3 },
            ..sanity(&[ParamSetId::Ees401Ep1])
        };
        let mut harness = Harness::new(Rigged::default(), config);
        let report = harness.run(&mut io::sink());
        assert!(report.passed());
        assert_eq!(*harness.scheme.encrypted_lengths.borrow(), vec![0, 1, 2, 3]);
        assert_eq!(report.sets[0].outcome.as_ref().map(|t| t.lengths_tested), Ok(4));
    }

    #[test]
    fn bench_mode_reports_latencies() {
        let config = HarnessConfig {
            mode: RunMode::Bench,
            bench_loops: 20,
            ..sanity(&[ParamSetId::Ees401Ep1])
        };
        let mut harness = Harness::new(Rigged::default(), config);
        let mut out = Vec::new();
        let report = harness.run(&mut out);

        assert!(report.passed());
        assert_eq!(harness.scheme.encrypted_lengths.borrow().len(), 20);
        let text = output(out);
        assert!(text.contains("kg "));
        assert!(text.contains("us, e "));
        assert!(text.contains("us, d "));
    }

    #[test]
    fn flaky_device_only_delays_the_run() {
        let pool = EntropyPool::with_capacity(Flaky { failures_left: 2 }, 1024)
            .with_retry_pause(Duration::ZERO);
        let mut harness = Harness::with_pool(Ntru, pool, sanity(&[ParamSetId::Ees401Ep1]));
        let report = harness.run(&mut io::sink());
        assert!(report.passed());
        assert_eq!(harness.pool().device().failures_left, 0);
    }

    #[test]
    fn empty_selection_passes() {
        let mut harness = Harness::new(Ntru, sanity(&[]));
        let mut out = Vec::new();
        let report = harness.run(&mut out);
        assert!(report.passed());
        assert_eq!(output(out), "Result: Pass\n");
    }
}
