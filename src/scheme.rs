// The public-key encryption contract the round-trip harness drives.
//
// Size discovery and the operations themselves are separate methods: the
// `*_len` / [`PkeScheme::key_sizes`] queries never touch the DRBG and never
// need output buffers, while the operations write into caller-sized
// buffers and report how many bytes they produced.

use crate::error::NtruError;
use crate::nist_drbg::DrbgHandle;
use crate::ntru_encrypt::{self, KeySizes};
use crate::ntru_params::ParamSetId;

/// A public-key encryption scheme with per-parameter-set buffer sizes.
pub trait PkeScheme {
    /// Public and private key lengths for `id`.
    fn key_sizes(&self, id: ParamSetId) -> Result<KeySizes, NtruError>;

    /// Generate a key pair into buffers of exactly [`PkeScheme::key_sizes`].
    fn keygen(
        &self,
        drbg: &mut DrbgHandle<'_>,
        id: ParamSetId,
        public_key: &mut [u8],
        private_key: &mut [u8],
    ) -> Result<(), NtruError>;

    /// Ciphertext length produced under `public_key`.
    fn ciphertext_len(&self, public_key: &[u8]) -> Result<usize, NtruError>;

    /// Longest message the key pair owning `private_key` can encrypt.
    fn max_message_len(&self, private_key: &[u8]) -> Result<usize, NtruError>;

    /// Encrypt `msg`; returns the ciphertext length written to `ct`.
    fn encrypt(
        &self,
        drbg: &mut DrbgHandle<'_>,
        public_key: &[u8],
        msg: &[u8],
        ct: &mut [u8],
    ) -> Result<usize, NtruError>;

    /// Decrypt `ct`; returns the plaintext length written to `pt`.
    fn decrypt(&self, private_key: &[u8], ct: &[u8], pt: &mut [u8]) -> Result<usize, NtruError>;

    /// Display name, for progress output only.
    fn param_set_name(&self, id: ParamSetId) -> &'static str {
        id.name()
    }
}

/// NTRUEncrypt over the EES parameter sets.
#[derive(Debug, Clone, Copy, Default)]
pub struct Ntru;

impl PkeScheme for Ntru {
    fn key_sizes(&self, id: ParamSetId) -> Result<KeySizes, NtruError> {
        Ok(ntru_encrypt::key_sizes(id))
    }

    fn keygen(
        &self,
        drbg: &mut DrbgHandle<'_>,
        id: ParamSetId,
        public_key: &mut [u8],
        private_key: &mut [u8],
    ) -> Result<(), NtruError> {
        ntru_encrypt::keygen(drbg, id, public_key, private_key)
    }

    fn ciphertext_len(&self, public_key: &[u8]) -> Result<usize, NtruError> {
        ntru_encrypt::ciphertext_len(public_key)
    }

    fn max_message_len(&self, private_key: &[u8]) -> Result<usize, NtruError> {
        ntru_encrypt::max_message_len(private_key)
    }

    fn encrypt(
        &self,
        drbg: &mut DrbgHandle<'_>,
        public_key: &[u8],
        msg: &[u8],
        ct: &mut [u8],
    ) -> Result<usize, NtruError> {
        ntru_encrypt::encrypt(drbg, public_key, msg, ct)
    }

    fn decrypt(&self, private_key: &[u8], ct: &[u8], pt: &mut [u8]) -> Result<usize, NtruError> {
        ntru_encrypt::decrypt(private_key, ct, pt)
    }
}
