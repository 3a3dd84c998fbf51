// Error types shared by the entropy pool, the DRBG, the NTRU engine and
// the harness configuration.

/// Failures of the entropy callback protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum EntropyError {
    #[error("entropy command requires an output slot")]
    NoOutput,
    #[error("unsupported entropy command {0}")]
    UnsupportedCommand(u8),
}

/// DRBG errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum DrbgError {
    #[error("bad DRBG parameter")]
    BadParameter,
    #[error("requested security strength {requested} exceeds {max} bits")]
    StrengthTooHigh { requested: u16, max: u16 },
    #[error("personalization string too long: {len} > {max} bytes")]
    PersonalizationTooLong { len: usize, max: usize },
    #[error("generate request too large: {len} > {max} bytes")]
    RequestTooLarge { len: usize, max: usize },
    #[error("entropy source reported an invalid rate of {0} bytes per byte of entropy")]
    BadEntropyRate(u8),
    #[error("entropy source failure: {0}")]
    Entropy(#[from] EntropyError),
}

/// NTRUEncrypt errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum NtruError {
    #[error("unknown parameter set id {0}")]
    InvalidParamSet(u8),
    #[error("buffer length not enough: need {need}, got {got}")]
    BufferTooSmall { need: usize, got: usize },
    #[error("message too long: {len} > {max} bytes")]
    MessageTooLong { len: usize, max: usize },
    #[error("bad public key")]
    BadPublicKey,
    #[error("bad private key")]
    BadPrivateKey,
    #[error("bad ciphertext")]
    BadCiphertext,
    #[error("key generation failed: no invertible private polynomial found")]
    KeygenFailed,
    #[error("decryption failed")]
    DecryptionFailed,
    #[error("drbg: {0}")]
    Drbg(#[from] DrbgError),
}

/// Configuration values that could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid message length sweep {0:?}: expected `max`, `all` or `LO-HI`")]
    InvalidLengthSweep(String),
}
