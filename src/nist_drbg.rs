// AES-256 CTR-DRBG (no derivation function), the NIST PQC KAT construction.
// State: Key (32 bytes), V (16 bytes). Seed length: 48 bytes.
//
// `DrbgHandle` wraps the core in an instantiated session bound to an entropy
// callback. Seed material is SHAKE256(entropy || nonce || personalization).

use aes::Aes256;
use cipher::generic_array::GenericArray;
use cipher::{BlockEncrypt, KeyInit};
use tracing::{debug, trace};
use zeroize::Zeroize;

use crate::entropy::{EntropyCmd, EntropyFn};
use crate::error::DrbgError;
use crate::shake::shake256;

pub const SEED_LEN: usize = 48;

/// Highest supported security strength in bits.
pub const MAX_STRENGTH_BITS: u16 = 256;

pub const MAX_PERSONALIZATION_LEN: usize = 32;

pub const MAX_BYTES_PER_REQUEST: usize = 1 << 16;

/// Generate calls allowed between reseeds.
pub const RESEED_INTERVAL: u64 = 1 << 32;

pub(crate) struct CtrCore {
    key: [u8; 32],
    v: [u8; 16],
    cipher: Aes256,
}

impl CtrCore {
    pub(crate) fn from_seed(seed: &[u8; SEED_LEN]) -> Self {
        let key = [0u8; 32];
        let mut core = Self { key, v: [0u8; 16], cipher: Aes256::new(GenericArray::from_slice(&key)) };
        core.update(Some(seed));
        core
    }

    fn inc_v(&mut self) {
        for byte in self.v.iter_mut().rev() {
            let (nv, carry) = byte.overflowing_add(1);
            *byte = nv;
            if !carry {
                break;
            }
        }
    }

    fn next_block(&mut self) -> [u8; 16] {
        self.inc_v();
        let mut block = GenericArray::clone_from_slice(&self.v);
        self.cipher.encrypt_block(&mut block);
        let mut out = [0u8; 16];
        out.copy_from_slice(&block);
        out
    }

    fn update(&mut self, provided: Option<&[u8; SEED_LEN]>) {
        let mut temp = [0u8; SEED_LEN];
        for chunk in temp.chunks_mut(16) {
            chunk.copy_from_slice(&self.next_block());
        }
        if let Some(pd) = provided {
            for (t, p) in temp.iter_mut().zip(pd.iter()) {
                *t ^= p;
            }
        }
        self.key.copy_from_slice(&temp[..32]);
        self.v.copy_from_slice(&temp[32..]);
        self.cipher = Aes256::new(GenericArray::from_slice(&self.key));
        temp.zeroize();
    }

    pub(crate) fn generate(&mut self, out: &mut [u8]) {
        for chunk in out.chunks_mut(16) {
            let block = self.next_block();
            chunk.copy_from_slice(&block[..chunk.len()]);
        }
        self.update(None);
    }

    fn reseed(&mut self, seed: &[u8; SEED_LEN]) {
        self.update(Some(seed));
    }
}

impl Drop for CtrCore {
    fn drop(&mut self) {
        self.key.zeroize();
        self.v.zeroize();
    }
}

/// Rounds a requested strength up to 112/128/192/256.
fn normalize_strength(bits: u16) -> Result<u16, DrbgError> {
    match bits {
        0 => Err(DrbgError::BadParameter),
        1..=112 => Ok(112),
        113..=128 => Ok(128),
        129..=192 => Ok(192),
        193..=256 => Ok(256),
        _ => Err(DrbgError::StrengthTooHigh { requested: bits, max: MAX_STRENGTH_BITS }),
    }
}

/// Pulls entropy input plus nonce (1.5 x strength) through the callback and
/// conditions it together with `extra` into one seed.
fn gather_seed(
    entropy: &mut dyn EntropyFn,
    strength: u16,
    extra: &[u8],
    init: bool,
) -> Result<[u8; SEED_LEN], DrbgError> {
    if init {
        entropy.call(EntropyCmd::Init, None)?;
    }
    let mut rate = 0u8;
    entropy.call(EntropyCmd::GetNumBytesPerByteOfEntropy, Some(&mut rate))?;
    if rate == 0 || rate > 8 {
        return Err(DrbgError::BadEntropyRate(rate));
    }

    let wanted = (strength as usize / 8) * 3 / 2 * rate as usize;
    let mut raw = vec![0u8; wanted];
    for b in raw.iter_mut() {
        entropy.call(EntropyCmd::GetByteOfEntropy, Some(b))?;
    }

    let mut seed = [0u8; SEED_LEN];
    shake256(&[&raw, extra], &mut seed);
    raw.zeroize();
    Ok(seed)
}

/// An instantiated DRBG session.
///
/// The handle holds its entropy callback for its whole lifetime; it is
/// released by [`DrbgHandle::uninstantiate`] (or by dropping it).
pub struct DrbgHandle<'e> {
    core: CtrCore,
    strength: u16,
    entropy: &'e mut dyn EntropyFn,
    reseed_counter: u64,
    reseed_interval: u64,
}

impl<'e> DrbgHandle<'e> {
    pub fn instantiate(
        strength_bits: u16,
        personalization: &[u8],
        entropy: &'e mut dyn EntropyFn,
    ) -> Result<Self, DrbgError> {
        let strength = normalize_strength(strength_bits)?;
        if personalization.len() > MAX_PERSONALIZATION_LEN {
            return Err(DrbgError::PersonalizationTooLong {
                len: personalization.len(),
                max: MAX_PERSONALIZATION_LEN,
            });
        }

        let mut seed = gather_seed(entropy, strength, personalization, true)?;
        let core = CtrCore::from_seed(&seed);
        seed.zeroize();

        debug!(strength, "drbg instantiated");
        Ok(Self { core, strength, entropy, reseed_counter: 1, reseed_interval: RESEED_INTERVAL })
    }

    pub fn security_strength(&self) -> u16 {
        self.strength
    }

    /// Fills `out`, requiring at most the instantiated strength.
    pub fn generate(&mut self, strength_bits: u16, out: &mut [u8]) -> Result<(), DrbgError> {
        if strength_bits > self.strength {
            return Err(DrbgError::StrengthTooHigh { requested: strength_bits, max: self.strength });
        }
        if out.len() > MAX_BYTES_PER_REQUEST {
            return Err(DrbgError::RequestTooLarge { len: out.len(), max: MAX_BYTES_PER_REQUEST });
        }
        if self.reseed_counter > self.reseed_interval {
            self.reseed()?;
        }
        self.core.generate(out);
        self.reseed_counter += 1;
        Ok(())
    }

    /// Mixes fresh entropy from the bound callback into the state.
    pub fn reseed(&mut self) -> Result<(), DrbgError> {
        let mut seed = gather_seed(&mut *self.entropy, self.strength, &[], false)?;
        self.core.reseed(&seed);
        seed.zeroize();
        self.reseed_counter = 1;
        trace!("drbg reseeded");
        Ok(())
    }

    /// Ends the session; the key and counter block are wiped as `self` drops.
    pub fn uninstantiate(self) {
        debug!(strength = self.strength, "drbg uninstantiated");
    }

    #[cfg(test)]
    fn set_reseed_interval(&mut self, interval: u64) {
        self.reseed_interval = interval;
    }
}
