// NTRUEncrypt (EES sets, SVES-style padding) over ntru_poly / ntru_codec.
//
// keygen:  f = 1 + 3F invertible mod q, h = 3 g f^-1
// encrypt: sdata = b || len || m || 0..; r = R(oid, m, b, hTrunc);
//          R = r*h; m' = M + mask(R mod 4); e = R + m'
// decrypt: m' = (f*e centered) mod 3; R = e - m'; M = m' - mask; re-check R == r*h

use tracing::{debug, trace};
use zeroize::{Zeroize, Zeroizing};

use crate::error::NtruError;
use crate::nist_drbg::DrbgHandle;
use crate::ntru_codec::{
    center, ct_decode, ct_encode, pk_decode, pk_encode, pk_params, poly_encode_mod4, poly_from_bytes,
    poly_to_bytes, sk_decode, sk_encode, sk_params,
};
use crate::ntru_params::{NtruParams, ParamSetId, KEYGEN_SEED_LEN, KEY_HEADER_LEN, NTRU_Q};
use crate::ntru_poly::{invert_mod_q, mask_mod, PrivPoly, TernPoly};
use crate::shake::ShakeStream;

/// Private polynomials tried before key generation gives up.
pub const MAX_KEYGEN_ATTEMPTS: usize = 64;

const Q_MASK: u16 = NTRU_Q - 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeySizes {
    pub public_key: usize,
    pub private_key: usize,
}

pub fn key_sizes(id: ParamSetId) -> KeySizes {
    let p = id.params();
    KeySizes { public_key: p.public_key_len(), private_key: p.private_key_len() }
}

/// Ciphertext length for messages under `pk`.
pub fn ciphertext_len(pk: &[u8]) -> Result<usize, NtruError> {
    let params = pk_params(pk)?;
    if pk.len() != params.public_key_len() {
        return Err(NtruError::BadPublicKey);
    }
    Ok(params.ciphertext_len())
}

/// Longest plaintext the key pair of `sk` can carry.
pub fn max_message_len(sk: &[u8]) -> Result<usize, NtruError> {
    let params = sk_params(sk)?;
    if sk.len() != params.private_key_len() {
        return Err(NtruError::BadPrivateKey);
    }
    Ok(params.max_msg_len())
}

fn need(buf: &[u8], len: usize) -> Result<(), NtruError> {
    if buf.len() < len {
        return Err(NtruError::BufferTooSmall { need: len, got: buf.len() });
    }
    Ok(())
}

pub fn keygen(
    drbg: &mut DrbgHandle<'_>,
    id: ParamSetId,
    pk: &mut [u8],
    sk: &mut [u8],
) -> Result<(), NtruError> {
    let params = id.params();
    need(pk, params.public_key_len())?;
    need(sk, params.private_key_len())?;
    let n = params.n();

    let mut seed = Zeroizing::new([0u8; KEYGEN_SEED_LEN]);
    drbg.generate(params.security_bits(), &mut seed[..])?;
    let mut stream = ShakeStream::shake256(&[&params.oid, &seed[..]]);

    for attempt in 1..=MAX_KEYGEN_ATTEMPTS {
        let f = PrivPoly::sample(&mut stream, n, params.f_shape);
        let mut f_dense: Vec<u16> = f.to_dense().iter().map(|c| c.wrapping_mul(3)).collect();
        f_dense[0] = f_dense[0].wrapping_add(1);

        let Some(fq) = invert_mod_q(&f_dense, NTRU_Q) else {
            debug!(param_set = params.name, attempt, "f not invertible, resampling");
            continue;
        };
        f_dense.zeroize();

        let g = TernPoly::sample(&mut stream, n, params.dg as usize);
        let mut h: Vec<u16> = g.mul_int(&fq).iter().map(|c| c.wrapping_mul(3)).collect();
        mask_mod(&mut h, NTRU_Q);

        pk_encode(params, &h, pk)?;
        sk_encode(params, &h, &f, sk)?;
        trace!(param_set = params.name, attempt, "key pair generated");
        return Ok(());
    }
    Err(NtruError::KeygenFailed)
}

/// Blinding polynomial r, a function of the message, b and the key.
fn blinding_poly(params: &NtruParams, msg: &[u8], b: &[u8], h_trunc: &[u8]) -> PrivPoly {
    let mut s = ShakeStream::shake256(&[&params.oid, msg, b, h_trunc]);
    PrivPoly::sample(&mut s, params.n(), params.f_shape)
}

/// Trit mask from R mod 4: bytes below 243 yield five base-3 digits each.
fn mask_trits(big_r: &[u16]) -> Vec<u8> {
    let n = big_r.len();
    let r4 = poly_encode_mod4(big_r);
    let mut s = ShakeStream::shake256(&[&r4]);
    let mut out = Vec::with_capacity(n);
    while out.len() < n {
        let mut v = s.next_u8();
        if v >= 243 {
            continue;
        }
        for _ in 0..5 {
            if out.len() == n {
                break;
            }
            out.push(v % 3);
            v /= 3;
        }
    }
    out
}

/// Each of 0, 1, -1 must appear at least dm0 times.
fn dm0_ok(trits: &[u8], dm0: u16) -> bool {
    let mut counts = [0usize; 3];
    for &t in trits {
        counts[t as usize] += 1;
    }
    counts.iter().all(|&c| c >= dm0 as usize)
}

#[inline(always)]
fn ct_equal(a: &[u16], b: &[u16]) -> bool {
    let mut diff = 0u16;
    for (x, y) in a.iter().zip(b) {
        diff |= x ^ y;
    }
    diff == 0 && a.len() == b.len()
}

/// Encrypts `msg` into `ct`; returns the ciphertext length.
pub fn encrypt(drbg: &mut DrbgHandle<'_>, pk: &[u8], msg: &[u8], ct: &mut [u8]) -> Result<usize, NtruError> {
    let (params, h) = pk_decode(pk)?;
    let max = params.max_msg_len();
    if msg.len() > max {
        return Err(NtruError::MessageTooLong { len: msg.len(), max });
    }
    need(ct, params.ciphertext_len())?;

    let n = params.n();
    let sec = params.sec_len as usize;
    let h_trunc = &pk[KEY_HEADER_LEN..KEY_HEADER_LEN + sec];
    let mut b = Zeroizing::new(vec![0u8; sec]);
    let mut sdata = Zeroizing::new(vec![0u8; params.sdata_len()]);

    let mut attempt = 0u32;
    loop {
        attempt += 1;
        drbg.generate(params.security_bits(), &mut b)?;

        // b || len || m || 0..
        sdata.fill(0);
        sdata[..sec].copy_from_slice(&b);
        sdata[sec] = msg.len() as u8;
        sdata[sec + 1..sec + 1 + msg.len()].copy_from_slice(msg);
        let m_trits = Zeroizing::new(poly_from_bytes(&sdata, n));

        let r = blinding_poly(params, msg, &b, h_trunc);
        let mut big_r = r.mul_int(&h);
        mask_mod(&mut big_r, NTRU_Q);

        let mask = mask_trits(&big_r);
        let masked: Vec<u8> = m_trits.iter().zip(&mask).map(|(&m, &v)| (m + v) % 3).collect();
        if !dm0_ok(&masked, params.dm0) {
            trace!(param_set = params.name, attempt, "dm0 check failed, new b");
            continue;
        }

        let e: Vec<u16> = big_r
            .iter()
            .zip(&masked)
            .map(|(&r, &t)| {
                let v = match t {
                    1 => r.wrapping_add(1),
                    2 => r.wrapping_sub(1),
                    _ => r,
                };
                v & Q_MASK
            })
            .collect();
        return ct_encode(params, &e, ct);
    }
}

/// Decrypts `ct` into `pt`; returns the plaintext length.
pub fn decrypt(sk: &[u8], ct: &[u8], pt: &mut [u8]) -> Result<usize, NtruError> {
    let (params, h, f) = sk_decode(sk)?;
    let e = ct_decode(params, ct)?;
    let sec = params.sec_len as usize;

    // a = f*e = e + 3*F*e
    let fe = f.mul_int(&e);
    let m_prime: Vec<u8> = e
        .iter()
        .zip(&fe)
        .map(|(&ei, &fi)| center(ei.wrapping_add(fi.wrapping_mul(3))).rem_euclid(3) as u8)
        .collect();
    if !dm0_ok(&m_prime, params.dm0) {
        return Err(NtruError::DecryptionFailed);
    }

    let big_r: Vec<u16> = e
        .iter()
        .zip(&m_prime)
        .map(|(&ei, &t)| {
            let v = match t {
                1 => ei.wrapping_sub(1),
                2 => ei.wrapping_add(1),
                _ => ei,
            };
            v & Q_MASK
        })
        .collect();

    let mask = mask_trits(&big_r);
    let m_trits = Zeroizing::new(
        m_prime.iter().zip(&mask).map(|(&c, &v)| (c + 3 - v) % 3).collect::<Vec<u8>>(),
    );

    let mut sdata = Zeroizing::new(vec![0u8; params.sdata_len()]);
    poly_to_bytes(&m_trits, &mut sdata)?;

    let len = sdata[sec] as usize;
    if len > params.max_msg_len() {
        return Err(NtruError::DecryptionFailed);
    }
    let (head, rest) = sdata.split_at(sec + 1);
    let (msg, padding) = rest.split_at(len);
    if padding.iter().any(|&x| x != 0) {
        return Err(NtruError::DecryptionFailed);
    }

    let h_trunc = &sk[KEY_HEADER_LEN..KEY_HEADER_LEN + sec];
    let r = blinding_poly(params, msg, &head[..sec], h_trunc);
    let mut expect_r = r.mul_int(&h);
    mask_mod(&mut expect_r, NTRU_Q);
    if !ct_equal(&expect_r, &big_r) {
        return Err(NtruError::DecryptionFailed);
    }

    need(pt, len)?;
    pt[..len].copy_from_slice(msg);
    Ok(len)
}
