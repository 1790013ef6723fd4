//! 32-bit MurmurHash3 (x86_32 variant, seed 0)
//!
//! Every step uses explicit `u32` wrapping arithmetic; widening any
//! intermediate changes the bucket an n-gram lands in.
//!
//! The 1-3 byte tail is packed the way the training-side vectorizer packs
//! it: only the third byte is shifted (`d2 << 16 | d1 | d0`), the second
//! byte is OR-ed in unshifted. Exported models were trained on these
//! buckets, so the packing must not be "fixed" to the reference layout.

const C1: u32 = 0xcc9e_2d51;
const C2: u32 = 0x1b87_3593;

/// Hash `data` to a signed 32-bit value
pub fn hash32(data: &[u8]) -> i32 {
    murmur3_32(data, 0) as i32
}

/// Hash the UTF-8 bytes of `text`
pub fn hash_str(text: &str) -> i32 {
    hash32(text.as_bytes())
}

fn murmur3_32(data: &[u8], seed: u32) -> u32 {
    let mut h1 = seed;

    let mut blocks = data.chunks_exact(4);
    for block in &mut blocks {
        let k1 = u32::from_le_bytes([block[0], block[1], block[2], block[3]]);
        h1 ^= mix_k1(k1);
        h1 = h1.rotate_left(13);
        h1 = h1.wrapping_mul(5).wrapping_add(0xe654_6b64);
    }

    let tail = blocks.remainder();
    if !tail.is_empty() {
        let k1 = match *tail {
            [d0, d1, d2] => (u32::from(d2) << 16) | u32::from(d1) | u32::from(d0),
            [d0, d1] => u32::from(d1) | u32::from(d0),
            [d0] => u32::from(d0),
            _ => 0,
        };
        h1 ^= mix_k1(k1);
    }

    // length is folded in modulo 2^32
    h1 ^= data.len() as u32;
    fmix32(h1)
}

#[inline]
fn mix_k1(k1: u32) -> u32 {
    k1.wrapping_mul(C1).rotate_left(15).wrapping_mul(C2)
}

#[inline]
fn fmix32(mut h: u32) -> u32 {
    h ^= h >> 16;
    h = h.wrapping_mul(0x85eb_ca6b);
    h ^= h >> 13;
    h = h.wrapping_mul(0xc2b2_ae35);
    h ^= h >> 16;
    h
}
