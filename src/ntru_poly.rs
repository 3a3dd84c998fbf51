// Ring arithmetic in Z[x]/(x^N - 1).
// Dense coefficients are u16 and wrap mod 2^16; callers mask down to q.
// Private polynomials are sparse ternary, stored as index lists.

use tracing::trace;

use crate::ntru_params::TernaryShape;
use crate::shake::ShakeStream;

/// Reduces every coefficient mod q (q a power of two).
pub fn mask_mod(a: &mut [u16], q: u16) {
    let m = q - 1;
    for c in a.iter_mut() {
        *c &= m;
    }
}

/// Adds (or subtracts) `a` rotated by `shift` into `c`: c += x^shift * a.
fn add_rotated(c: &mut [u16], a: &[u16], shift: usize, negate: bool) {
    let n = a.len();
    let (lo, hi) = c.split_at_mut(shift);
    let (a_hi, a_lo) = a.split_at(n - shift);
    for (ci, &ai) in hi.iter_mut().zip(a_hi).chain(lo.iter_mut().zip(a_lo)) {
        *ci = if negate { ci.wrapping_sub(ai) } else { ci.wrapping_add(ai) };
    }
}

/// Schoolbook product of two dense polynomials.
pub fn mul_dense(a: &[u16], b: &[u16]) -> Vec<u16> {
    let n = a.len();
    let mut c = vec![0u16; n];
    for (i, &ai) in a.iter().enumerate() {
        if ai == 0 {
            continue;
        }
        for (j, &bj) in b.iter().enumerate() {
            let k = if i + j >= n { i + j - n } else { i + j };
            c[k] = c[k].wrapping_add(ai.wrapping_mul(bj));
        }
    }
    c
}

/// Ternary polynomial with distinct +1 and -1 positions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TernPoly {
    pub n: usize,
    pub ones: Vec<u16>,
    pub neg_ones: Vec<u16>,
}

impl TernPoly {
    /// Draws `d` distinct +1 positions and `d` distinct -1 positions.
    pub fn sample(stream: &mut ShakeStream, n: usize, d: usize) -> Self {
        let limit = (65536 / n as u32) * n as u32;
        let mut used = vec![false; n];
        let mut draw = |count: usize| {
            let mut out = Vec::with_capacity(count);
            while out.len() < count {
                let v = stream.next_u16() as u32;
                if v >= limit {
                    continue;
                }
                let idx = (v % n as u32) as usize;
                if !used[idx] {
                    used[idx] = true;
                    out.push(idx as u16);
                }
            }
            out
        };
        let ones = draw(d);
        let neg_ones = draw(d);
        Self { n, ones, neg_ones }
    }

    pub fn mul_int(&self, a: &[u16]) -> Vec<u16> {
        let mut c = vec![0u16; self.n];
        for &i in &self.ones {
            add_rotated(&mut c, a, i as usize, false);
        }
        for &i in &self.neg_ones {
            add_rotated(&mut c, a, i as usize, true);
        }
        c
    }

    pub fn to_dense(&self) -> Vec<u16> {
        let mut c = vec![0u16; self.n];
        for &i in &self.ones {
            c[i as usize] = 1;
        }
        for &i in &self.neg_ones {
            c[i as usize] = u16::MAX;
        }
        c
    }

    fn push_indices(&self, out: &mut Vec<u16>) {
        out.extend_from_slice(&self.ones);
        out.extend_from_slice(&self.neg_ones);
    }

    /// Rebuilds from `2d` indices; rejects out-of-range or repeated positions.
    fn from_indices(n: usize, d: usize, idx: &[u16]) -> Option<Self> {
        if idx.len() != 2 * d {
            return None;
        }
        let mut used = vec![false; n];
        for &i in idx {
            let slot = used.get_mut(i as usize)?;
            if *slot {
                return None;
            }
            *slot = true;
        }
        Some(Self { n, ones: idx[..d].to_vec(), neg_ones: idx[d..].to_vec() })
    }
}

/// F (or r): either one ternary polynomial or F1*F2 + F3.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrivPoly {
    Simple(TernPoly),
    Product(TernPoly, TernPoly, TernPoly),
}

impl PrivPoly {
    pub fn sample(stream: &mut ShakeStream, n: usize, shape: TernaryShape) -> Self {
        match shape {
            TernaryShape::Simple { d } => PrivPoly::Simple(TernPoly::sample(stream, n, d as usize)),
            TernaryShape::Product { d1, d2, d3 } => PrivPoly::Product(
                TernPoly::sample(stream, n, d1 as usize),
                TernPoly::sample(stream, n, d2 as usize),
                TernPoly::sample(stream, n, d3 as usize),
            ),
        }
    }

    /// self * a, coefficients mod 2^16.
    pub fn mul_int(&self, a: &[u16]) -> Vec<u16> {
        match self {
            PrivPoly::Simple(t) => t.mul_int(a),
            PrivPoly::Product(f1, f2, f3) => {
                let mut c = f1.mul_int(&f2.mul_int(a));
                for (ci, di) in c.iter_mut().zip(f3.mul_int(a)) {
                    *ci = ci.wrapping_add(di);
                }
                c
            }
        }
    }

    pub fn to_dense(&self) -> Vec<u16> {
        match self {
            PrivPoly::Simple(t) => t.to_dense(),
            PrivPoly::Product(f1, f2, f3) => {
                let mut c = f1.mul_int(&f2.to_dense());
                for (ci, di) in c.iter_mut().zip(f3.to_dense()) {
                    *ci = ci.wrapping_add(di);
                }
                c
            }
        }
    }

    /// Flattened index lists, in storage order.
    pub fn indices(&self) -> Vec<u16> {
        let mut out = Vec::new();
        match self {
            PrivPoly::Simple(t) => t.push_indices(&mut out),
            PrivPoly::Product(f1, f2, f3) => {
                f1.push_indices(&mut out);
                f2.push_indices(&mut out);
                f3.push_indices(&mut out);
            }
        }
        out
    }

    pub fn from_indices(n: usize, shape: TernaryShape, idx: &[u16]) -> Option<Self> {
        if idx.len() != shape.index_count() {
            return None;
        }
        match shape {
            TernaryShape::Simple { d } => TernPoly::from_indices(n, d as usize, idx).map(PrivPoly::Simple),
            TernaryShape::Product { d1, d2, d3 } => {
                let (a, rest) = idx.split_at(2 * d1 as usize);
                let (b, c) = rest.split_at(2 * d2 as usize);
                Some(PrivPoly::Product(
                    TernPoly::from_indices(n, d1 as usize, a)?,
                    TernPoly::from_indices(n, d2 as usize, b)?,
                    TernPoly::from_indices(n, d3 as usize, c)?,
                ))
            }
        }
    }
}

fn degree(p: &[u8]) -> Option<usize> {
    p.iter().rposition(|&b| b != 0)
}

/// Inverse of `a` mod (2, x^N - 1) by the almost-inverse algorithm.
fn invert_mod2(a: &[u16]) -> Option<Vec<u16>> {
    let n = a.len();
    let mut k = 0usize;
    let mut b = vec![0u8; n + 1];
    let mut c = vec![0u8; n + 1];
    let mut f = vec![0u8; n + 1];
    let mut g = vec![0u8; n + 1];
    b[0] = 1;
    for (fi, &ai) in f.iter_mut().zip(a) {
        *fi = (ai & 1) as u8;
    }
    g[0] = 1;
    g[n] = 1;

    loop {
        while f[0] == 0 {
            f.copy_within(1.., 0);
            f[n] = 0;
            c.copy_within(..n, 1);
            c[0] = 0;
            k += 1;
            degree(&f)?;
        }
        let df = degree(&f)?;
        if df == 0 {
            break;
        }
        let dg = degree(&g)?;
        if df < dg {
            std::mem::swap(&mut f, &mut g);
            std::mem::swap(&mut b, &mut c);
        }
        for (fi, gi) in f.iter_mut().zip(&g) {
            *fi ^= gi;
        }
        for (bi, ci) in b.iter_mut().zip(&c) {
            *bi ^= ci;
        }
    }

    // a^-1 = x^(N-k) * b, with x^N folded back onto 1
    let mut inv = vec![0u16; n];
    let k = k % n;
    for (i, &bi) in b.iter().enumerate() {
        inv[(i + n - k) % n] ^= bi as u16;
    }
    Some(inv)
}

/// Inverse of `a` mod (q, x^N - 1) for q a power of two up to 2^16.
pub fn invert_mod_q(a: &[u16], q: u16) -> Option<Vec<u16>> {
    let mut b = invert_mod2(a)?;
    // Newton: precision doubles each round, 2 -> 2^16 in four rounds.
    for _ in 0..4 {
        let mut t = mul_dense(a, &b);
        for ti in t.iter_mut() {
            *ti = 0u16.wrapping_sub(*ti);
        }
        t[0] = t[0].wrapping_add(2);
        b = mul_dense(&b, &t);
    }
    mask_mod(&mut b, q);

    let mut check = mul_dense(a, &b);
    mask_mod(&mut check, q);
    if check[0] != 1 || check[1..].iter().any(|&c| c != 0) {
        trace!("inverse check failed");
        return None;
    }
    Some(b)
}
