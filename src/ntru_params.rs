// NTRUEncrypt parameter sets (EES series, q = 2048).
// Sizes are derived from N and the security length; nothing here is mutable.

use crate::error::NtruError;

pub const NTRU_Q: u16 = 2048;
pub const Q_BITS: usize = 11;

pub const PUBLIC_KEY_TAG: u8 = 0x01;
pub const PRIVATE_KEY_TAG: u8 = 0x02;
/// tag + 3-byte OID
pub const KEY_HEADER_LEN: usize = 4;

/// Seed drawn from the DRBG for one key generation.
pub const KEYGEN_SEED_LEN: usize = 32;

/// Shape of the private polynomial F (and of the blinding polynomial r).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TernaryShape {
    /// `d` ones and `d` minus ones.
    Simple { d: u16 },
    /// F1*F2 + F3 with each Fi having `di` ones and `di` minus ones.
    Product { d1: u16, d2: u16, d3: u16 },
}

impl TernaryShape {
    /// Number of stored indices.
    pub const fn index_count(self) -> usize {
        match self {
            TernaryShape::Simple { d } => 2 * d as usize,
            TernaryShape::Product { d1, d2, d3 } => 2 * (d1 as usize + d2 as usize + d3 as usize),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum ParamSetId {
    Ees401Ep1 = 0,
    Ees449Ep1 = 1,
    Ees677Ep1 = 2,
    Ees1087Ep2 = 3,
    Ees541Ep1 = 4,
    Ees613Ep1 = 5,
    Ees887Ep1 = 6,
    Ees1171Ep1 = 7,
    Ees659Ep1 = 8,
    Ees761Ep1 = 9,
    Ees1087Ep1 = 10,
    Ees1499Ep1 = 11,
    Ees401Ep2 = 12,
    Ees439Ep1 = 13,
    Ees593Ep1 = 14,
    Ees743Ep1 = 15,
}

impl ParamSetId {
    /// Every set, in catalog order.
    pub const ALL: [ParamSetId; 16] = [
        ParamSetId::Ees401Ep1,
        ParamSetId::Ees449Ep1,
        ParamSetId::Ees677Ep1,
        ParamSetId::Ees1087Ep2,
        ParamSetId::Ees541Ep1,
        ParamSetId::Ees613Ep1,
        ParamSetId::Ees887Ep1,
        ParamSetId::Ees1171Ep1,
        ParamSetId::Ees659Ep1,
        ParamSetId::Ees761Ep1,
        ParamSetId::Ees1087Ep1,
        ParamSetId::Ees1499Ep1,
        ParamSetId::Ees401Ep2,
        ParamSetId::Ees439Ep1,
        ParamSetId::Ees593Ep1,
        ParamSetId::Ees743Ep1,
    ];

    pub fn from_u8(v: u8) -> Result<Self, NtruError> {
        Self::ALL.get(v as usize).copied().ok_or(NtruError::InvalidParamSet(v))
    }

    pub fn params(self) -> &'static NtruParams {
        &CATALOG[self as usize]
    }

    pub fn name(self) -> &'static str {
        self.params().name
    }

    /// Looks a set up by its OID, as found in key blobs.
    pub fn from_oid(oid: &[u8]) -> Option<Self> {
        CATALOG.iter().find(|p| p.oid[..] == *oid).map(|p| p.id)
    }
}

impl std::fmt::Display for ParamSetId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NtruParams {
    pub id: ParamSetId,
    pub name: &'static str,
    pub oid: [u8; 3],
    pub n: u16,
    /// Security length in bytes (also the length of the random prefix b).
    pub sec_len: u16,
    pub f_shape: TernaryShape,
    pub dg: u16,
    /// Minimum count of each trit value in the masked representative.
    pub dm0: u16,
}

impl NtruParams {
    pub fn n(&self) -> usize {
        self.n as usize
    }

    /// DRBG strength required for this set.
    pub fn security_bits(&self) -> u16 {
        self.sec_len * 8
    }

    pub fn packed_poly_len(&self) -> usize {
        (self.n() * Q_BITS + 7) / 8
    }

    /// Bytes of b || len || m || padding encoded into one message polynomial.
    pub fn sdata_len(&self) -> usize {
        (self.n() / 2) * 3 / 8
    }

    pub fn max_msg_len(&self) -> usize {
        self.sdata_len() - 1 - self.sec_len as usize
    }

    pub fn public_key_len(&self) -> usize {
        KEY_HEADER_LEN + self.packed_poly_len()
    }

    pub fn private_key_len(&self) -> usize {
        KEY_HEADER_LEN + self.packed_poly_len() + 2 * self.f_shape.index_count()
    }

    pub fn ciphertext_len(&self) -> usize {
        self.packed_poly_len()
    }
}

const fn simple(
    id: ParamSetId,
    name: &'static str,
    oid: [u8; 3],
    n: u16,
    sec_len: u16,
    df: u16,
    dg: u16,
) -> NtruParams {
    NtruParams { id, name, oid, n, sec_len, f_shape: TernaryShape::Simple { d: df }, dg, dm0: df }
}

#[allow(clippy::too_many_arguments)]
const fn product(
    id: ParamSetId,
    name: &'static str,
    oid: [u8; 3],
    n: u16,
    sec_len: u16,
    (d1, d2, d3): (u16, u16, u16),
    dg: u16,
    dm0: u16,
) -> NtruParams {
    NtruParams { id, name, oid, n, sec_len, f_shape: TernaryShape::Product { d1, d2, d3 }, dg, dm0 }
}

static CATALOG: [NtruParams; 16] = [
    simple(ParamSetId::Ees401Ep1, "EES401EP1", [0, 2, 4], 401, 14, 113, 133),
    simple(ParamSetId::Ees449Ep1, "EES449EP1", [0, 3, 3], 449, 16, 134, 149),
    simple(ParamSetId::Ees677Ep1, "EES677EP1", [0, 5, 3], 677, 24, 157, 225),
    simple(ParamSetId::Ees1087Ep2, "EES1087EP2", [0, 6, 3], 1087, 32, 120, 362),
    simple(ParamSetId::Ees541Ep1, "EES541EP1", [0, 2, 5], 541, 14, 49, 180),
    simple(ParamSetId::Ees613Ep1, "EES613EP1", [0, 3, 4], 613, 16, 55, 204),
    simple(ParamSetId::Ees887Ep1, "EES887EP1", [0, 5, 4], 887, 24, 81, 295),
    simple(ParamSetId::Ees1171Ep1, "EES1171EP1", [0, 6, 4], 1171, 32, 106, 390),
    simple(ParamSetId::Ees659Ep1, "EES659EP1", [0, 2, 6], 659, 14, 38, 219),
    simple(ParamSetId::Ees761Ep1, "EES761EP1", [0, 3, 5], 761, 16, 42, 253),
    simple(ParamSetId::Ees1087Ep1, "EES1087EP1", [0, 5, 5], 1087, 24, 63, 362),
    simple(ParamSetId::Ees1499Ep1, "EES1499EP1", [0, 6, 5], 1499, 32, 79, 499),
    product(ParamSetId::Ees401Ep2, "EES401EP2", [0, 2, 16], 401, 14, (8, 8, 6), 133, 101),
    product(ParamSetId::Ees439Ep1, "EES439EP1", [0, 3, 16], 439, 16, (9, 8, 5), 146, 112),
    product(ParamSetId::Ees593Ep1, "EES593EP1", [0, 5, 16], 593, 24, (10, 10, 8), 197, 158),
    product(ParamSetId::Ees743Ep1, "EES743EP1", [0, 6, 16], 743, 32, (11, 11, 15), 247, 204),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_is_indexed_by_id() {
        for (i, id) in ParamSetId::ALL.iter().enumerate() {
            assert_eq!(*id as usize, i);
            assert_eq!(id.params().id, *id);
            assert_eq!(ParamSetId::from_u8(i as u8), Ok(*id));
            assert_eq!(ParamSetId::from_oid(&id.params().oid), Some(*id));
        }
        assert_eq!(ParamSetId::from_u8(16), Err(NtruError::InvalidParamSet(16)));
        assert_eq!(ParamSetId::from_oid(&[9, 9, 9]), None);
    }

    #[test]
    fn derived_lengths() {
        let p = ParamSetId::Ees401Ep1.params();
        assert_eq!(p.sdata_len(), 75);
        assert_eq!(p.max_msg_len(), 60);
        assert_eq!(p.packed_poly_len(), 552);
        assert_eq!(p.public_key_len(), 556);
        assert_eq!(p.private_key_len(), 556 + 2 * 226);

        assert_eq!(ParamSetId::Ees1087Ep2.params().max_msg_len(), 170);
        assert_eq!(ParamSetId::Ees743Ep1.params().f_shape.index_count(), 74);
        assert_eq!(ParamSetId::Ees743Ep1.to_string(), "EES743EP1");
    }

    #[test]
    fn message_fits_one_polynomial() {
        for id in ParamSetId::ALL {
            let p = id.params();
            // 3 bits -> 2 trits
            let trits = (p.sdata_len() * 8).div_ceil(3) * 2;
            assert!(trits <= p.n(), "{id}");
            assert!(p.max_msg_len() <= u8::MAX as usize, "{id}");
            assert!(p.f_shape.index_count() < p.n(), "{id}");
            assert!(2 * p.dg as usize <= p.n(), "{id}");
        }
    }
}
