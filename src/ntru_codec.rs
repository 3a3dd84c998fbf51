// Packing for the NTRU engine: fixed-width coefficient packing (MSB first),
// 3-bit <-> 2-trit message encoding, and the key/ciphertext blob layouts.
//
//   pk = 0x01 || OID(3) || pack11(h)
//   sk = 0x02 || OID(3) || pack11(h) || F indices (u16 BE)
//   ct = pack11(e)

use crate::error::NtruError;
use crate::ntru_params::{
    NtruParams, ParamSetId, KEY_HEADER_LEN, NTRU_Q, PRIVATE_KEY_TAG, PUBLIC_KEY_TAG, Q_BITS,
};
use crate::ntru_poly::PrivPoly;

pub fn packed_len(n: usize, bits: usize) -> usize {
    (n * bits + 7) / 8
}

/// Packs the low `bits` of each coefficient into `out`, big-endian bit order.
pub fn pack_coeffs(coeffs: &[u16], bits: usize, out: &mut [u8]) {
    let mask = (1u32 << bits) - 1;
    let mut acc: u32 = 0;
    let mut nbits = 0usize;
    let mut pos = 0usize;
    for &c in coeffs {
        acc = (acc << bits) | (c as u32 & mask);
        nbits += bits;
        while nbits >= 8 {
            nbits -= 8;
            out[pos] = (acc >> nbits) as u8;
            pos += 1;
        }
        acc &= (1u32 << nbits) - 1;
    }
    if nbits > 0 {
        out[pos] = (acc << (8 - nbits)) as u8;
    }
}

pub fn unpack_coeffs(input: &[u8], n: usize, bits: usize) -> Vec<u16> {
    let mask = (1u32 << bits) - 1;
    let mut out = Vec::with_capacity(n);
    let mut acc: u32 = 0;
    let mut nbits = 0usize;
    let mut bytes = input.iter();
    while out.len() < n {
        while nbits < bits {
            let b = bytes.next().copied().unwrap_or(0);
            acc = (acc << 8) | b as u32;
            nbits += 8;
        }
        nbits -= bits;
        out.push(((acc >> nbits) & mask) as u16);
        acc &= (1u32 << nbits) - 1;
    }
    out
}

pub fn poly_encode11(p: &[u16], out: &mut [u8]) {
    pack_coeffs(p, Q_BITS, out);
}

pub fn poly_decode11(b: &[u8], n: usize) -> Vec<u16> {
    unpack_coeffs(b, n, Q_BITS)
}

/// Bytes -> trits, 3 bits to 2 trits, zero-padded to `n` coefficients.
pub fn poly_from_bytes(data: &[u8], n: usize) -> Vec<u8> {
    let mut trits = vec![0u8; n];
    let nbits = data.len() * 8;
    let bit = |i: usize| -> u8 {
        if i < nbits {
            (data[i / 8] >> (7 - i % 8)) & 1
        } else {
            0
        }
    };
    for (g, pair) in trits.chunks_exact_mut(2).take(nbits.div_ceil(3)).enumerate() {
        let v = (bit(3 * g) << 2) | (bit(3 * g + 1) << 1) | bit(3 * g + 2);
        pair[0] = v / 3;
        pair[1] = v % 3;
    }
    trits
}

/// Inverse of [`poly_from_bytes`]. Fails on a trit pair above 7, on
/// nonzero padding bits, or on nonzero trits past the encoded region.
pub fn poly_to_bytes(trits: &[u8], out: &mut [u8]) -> Result<(), NtruError> {
    let nbits = out.len() * 8;
    let groups = nbits.div_ceil(3);
    if 2 * groups > trits.len() {
        return Err(NtruError::DecryptionFailed);
    }
    out.fill(0);
    for g in 0..groups {
        let v = 3 * trits[2 * g] + trits[2 * g + 1];
        if v > 7 {
            return Err(NtruError::DecryptionFailed);
        }
        for k in 0..3 {
            let b = (v >> (2 - k)) & 1;
            let i = 3 * g + k;
            if i < nbits {
                out[i / 8] |= b << (7 - i % 8);
            } else if b != 0 {
                return Err(NtruError::DecryptionFailed);
            }
        }
    }
    if trits[2 * groups..].iter().any(|&t| t != 0) {
        return Err(NtruError::DecryptionFailed);
    }
    Ok(())
}

/// R mod 4, two bits per coefficient.
pub fn poly_encode_mod4(r: &[u16]) -> Vec<u8> {
    let mut out = vec![0u8; packed_len(r.len(), 2)];
    pack_coeffs(r, 2, &mut out);
    out
}

/// Reads the params named by a blob header with the given tag.
fn header_params(blob: &[u8], tag: u8) -> Option<&'static NtruParams> {
    if blob.len() < KEY_HEADER_LEN || blob[0] != tag {
        return None;
    }
    ParamSetId::from_oid(&blob[1..KEY_HEADER_LEN]).map(ParamSetId::params)
}

pub fn pk_params(pk: &[u8]) -> Result<&'static NtruParams, NtruError> {
    header_params(pk, PUBLIC_KEY_TAG).ok_or(NtruError::BadPublicKey)
}

pub fn sk_params(sk: &[u8]) -> Result<&'static NtruParams, NtruError> {
    header_params(sk, PRIVATE_KEY_TAG).ok_or(NtruError::BadPrivateKey)
}

fn check_out(out: &[u8], need: usize) -> Result<(), NtruError> {
    if out.len() < need {
        return Err(NtruError::BufferTooSmall { need, got: out.len() });
    }
    Ok(())
}

/// Writes the public key; returns its length.
pub fn pk_encode(params: &NtruParams, h: &[u16], out: &mut [u8]) -> Result<usize, NtruError> {
    let len = params.public_key_len();
    check_out(out, len)?;
    out[0] = PUBLIC_KEY_TAG;
    out[1..KEY_HEADER_LEN].copy_from_slice(&params.oid);
    poly_encode11(h, &mut out[KEY_HEADER_LEN..len]);
    Ok(len)
}

pub fn pk_decode(pk: &[u8]) -> Result<(&'static NtruParams, Vec<u16>), NtruError> {
    let params = pk_params(pk)?;
    if pk.len() != params.public_key_len() {
        return Err(NtruError::BadPublicKey);
    }
    Ok((params, poly_decode11(&pk[KEY_HEADER_LEN..], params.n())))
}

/// Writes the private key; returns its length.
pub fn sk_encode(params: &NtruParams, h: &[u16], f: &PrivPoly, out: &mut [u8]) -> Result<usize, NtruError> {
    let len = params.private_key_len();
    check_out(out, len)?;
    let mut off = 0usize;

    out[off] = PRIVATE_KEY_TAG;
    out[off + 1..off + KEY_HEADER_LEN].copy_from_slice(&params.oid);
    off += KEY_HEADER_LEN;

    let plen = params.packed_poly_len();
    poly_encode11(h, &mut out[off..off + plen]);
    off += plen;

    for i in f.indices() {
        out[off..off + 2].copy_from_slice(&i.to_be_bytes());
        off += 2;
    }
    debug_assert_eq!(off, len);
    Ok(len)
}

pub fn sk_decode(sk: &[u8]) -> Result<(&'static NtruParams, Vec<u16>, PrivPoly), NtruError> {
    let params = sk_params(sk)?;
    if sk.len() != params.private_key_len() {
        return Err(NtruError::BadPrivateKey);
    }
    let plen = params.packed_poly_len();
    let h = poly_decode11(&sk[KEY_HEADER_LEN..KEY_HEADER_LEN + plen], params.n());
    let idx: Vec<u16> = sk[KEY_HEADER_LEN + plen..]
        .chunks_exact(2)
        .map(|c| u16::from_be_bytes([c[0], c[1]]))
        .collect();
    let f = PrivPoly::from_indices(params.n(), params.f_shape, &idx).ok_or(NtruError::BadPrivateKey)?;
    Ok((params, h, f))
}

pub fn ct_encode(params: &NtruParams, e: &[u16], out: &mut [u8]) -> Result<usize, NtruError> {
    let len = params.ciphertext_len();
    check_out(out, len)?;
    poly_encode11(e, &mut out[..len]);
    Ok(len)
}

pub fn ct_decode(params: &NtruParams, ct: &[u8]) -> Result<Vec<u16>, NtruError> {
    if ct.len() != params.ciphertext_len() {
        return Err(NtruError::BadCiphertext);
    }
    Ok(poly_decode11(ct, params.n()))
}

/// Centers a mod-q coefficient into [-q/2, q/2).
pub fn center(c: u16) -> i32 {
    let c = (c & (NTRU_Q - 1)) as i32;
    if c >= (NTRU_Q / 2) as i32 {
        c - NTRU_Q as i32
    } else {
        c
    }
}
