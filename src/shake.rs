// SHAKE256 sponge over keccak::keccak_f1600.
// One-shot output plus a streaming reader used as the index and mask
// generator of the NTRU engine.

use crate::keccak::{extract_bytes, keccak_f1600, xor_block};

const RATE: usize = 136;
const SHAKE_PAD: u8 = 0x1F;

/// Incremental absorber; `finish` pads and returns the permuted state.
struct Sponge {
    state: [u64; 25],
    block: [u8; RATE],
    fill: usize,
}

impl Sponge {
    fn new() -> Self {
        Self { state: [0u64; 25], block: [0u8; RATE], fill: 0 }
    }

    fn absorb(&mut self, mut input: &[u8]) {
        while !input.is_empty() {
            let take = (RATE - self.fill).min(input.len());
            self.block[self.fill..self.fill + take].copy_from_slice(&input[..take]);
            self.fill += take;
            input = &input[take..];
            if self.fill == RATE {
                xor_block(&mut self.state, &self.block);
                keccak_f1600(&mut self.state);
                self.fill = 0;
            }
        }
    }

    fn absorb_parts(parts: &[&[u8]]) -> [u64; 25] {
        let mut s = Self::new();
        for p in parts {
            s.absorb(p);
        }
        s.finish()
    }

    fn finish(mut self) -> [u64; 25] {
        self.block[self.fill..].fill(0);
        self.block[self.fill] ^= SHAKE_PAD;
        self.block[RATE - 1] ^= 0x80;
        xor_block(&mut self.state, &self.block);
        keccak_f1600(&mut self.state);
        self.state
    }
}

/// SHAKE256 over the concatenation of `parts`.
pub fn shake256(parts: &[&[u8]], out: &mut [u8]) {
    let mut st = Sponge::absorb_parts(parts);
    let mut chunks = out.chunks_mut(RATE).peekable();
    while let Some(chunk) = chunks.next() {
        extract_bytes(&st, chunk);
        if chunks.peek().is_some() {
            keccak_f1600(&mut st);
        }
    }
}

/// SHAKE256 as an endless byte stream.
#[derive(Clone)]
pub struct ShakeStream {
    state: [u64; 25],
    buf: [u8; RATE],
    pos: usize,
}

impl ShakeStream {
    /// Absorbs the concatenation of `parts`, ready to squeeze.
    pub fn shake256(parts: &[&[u8]]) -> Self {
        let state = Sponge::absorb_parts(parts);
        let mut buf = [0u8; RATE];
        extract_bytes(&state, &mut buf);
        Self { state, buf, pos: 0 }
    }

    #[inline]
    pub fn next_u8(&mut self) -> u8 {
        if self.pos == RATE {
            keccak_f1600(&mut self.state);
            extract_bytes(&self.state, &mut self.buf);
            self.pos = 0;
        }
        let b = self.buf[self.pos];
        self.pos += 1;
        b
    }

    /// Big-endian 16-bit value from the next two bytes.
    pub fn next_u16(&mut self) -> u16 {
        let hi = self.next_u8() as u16;
        (hi << 8) | self.next_u8() as u16
    }

    pub fn fill_bytes(&mut self, out: &mut [u8]) {
        for o in out.iter_mut() {
            *o = self.next_u8();
        }
    }
}
