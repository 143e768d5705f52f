//! Magic bitboards for sliding pieces.
//!
//! For every square the relevant occupancy mask (edges excluded) is built,
//! every subset of it is enumerated, and a 64-bit multiplier maps each subset
//! to a dense index with `(subset * magic) >> (64 - bits)`. Multipliers are
//! found by a seeded trial search when the tables are built, and each one is
//! verified against every subset before it is accepted.

use rand::prelude::*;

use crate::board::{Bitboard, Square};

const ROOK_DIRECTIONS: [(isize, isize); 4] = [(1, 0), (-1, 0), (0, 1), (0, -1)];
const BISHOP_DIRECTIONS: [(isize, isize); 4] = [(1, 1), (1, -1), (-1, 1), (-1, -1)];

const MAGIC_SEED: u64 = 0x5EED_CAFE_F00D_0001;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Slider {
    Bishop,
    Rook,
}

impl Slider {
    fn directions(self) -> &'static [(isize, isize); 4] {
        match self {
            Slider::Bishop => &BISHOP_DIRECTIONS,
            Slider::Rook => &ROOK_DIRECTIONS,
        }
    }
}

#[derive(Clone, Copy, Debug)]
struct MagicEntry {
    mask: u64,
    magic: u64,
    shift: u32,
    offset: usize,
}

impl MagicEntry {
    #[inline]
    fn index(&self, occupancy: u64) -> usize {
        let relevant = occupancy & self.mask;
        self.offset + (relevant.wrapping_mul(self.magic) >> self.shift) as usize
    }
}

/// Magic lookup for one slider kind over all 64 squares.
#[derive(Debug)]
pub(crate) struct MagicTable {
    entries: [MagicEntry; 64],
    attacks: Vec<u64>,
}

impl MagicTable {
    pub(crate) fn build(slider: Slider, rng: &mut StdRng) -> Self {
        let mut entries = [MagicEntry {
            mask: 0,
            magic: 0,
            shift: 0,
            offset: 0,
        }; 64];
        let mut attacks = Vec::new();

        for sq_idx in 0..64 {
            let sq = Square::from_index(sq_idx);
            let mask = relevant_mask(slider, sq);
            let bits = mask.count_ones();

            let mut subsets = Vec::with_capacity(1 << bits);
            let mut subset = 0u64;
            // Carry-rippler enumeration of every subset of the mask
            loop {
                subsets.push((subset, ray_attacks(slider, sq, subset)));
                subset = subset.wrapping_sub(mask) & mask;
                if subset == 0 {
                    break;
                }
            }

            let (magic, table) = find_magic(mask, bits, &subsets, rng);
            entries[sq_idx] = MagicEntry {
                mask,
                magic,
                shift: 64 - bits,
                offset: attacks.len(),
            };
            attacks.extend_from_slice(&table);
        }

        MagicTable { entries, attacks }
    }

    #[inline]
    pub(crate) fn attacks(&self, sq: Square, occupancy: Bitboard) -> Bitboard {
        let entry = &self.entries[sq.as_index()];
        Bitboard(self.attacks[entry.index(occupancy.0)])
    }
}

fn find_magic(mask: u64, bits: u32, subsets: &[(u64, u64)], rng: &mut StdRng) -> (u64, Vec<u64>) {
    let size = 1usize << bits;
    let shift = 64 - bits;
    let mut table = vec![0u64; size];
    let mut used = vec![false; size];

    loop {
        // Sparse candidates hash far better than uniform ones
        let magic = rng.gen::<u64>() & rng.gen::<u64>() & rng.gen::<u64>();
        if (mask.wrapping_mul(magic) & 0xFF00_0000_0000_0000).count_ones() < 6 {
            continue;
        }

        used.iter_mut().for_each(|u| *u = false);
        let mut ok = true;
        for &(occupancy, attack) in subsets {
            let idx = (occupancy.wrapping_mul(magic) >> shift) as usize;
            if !used[idx] {
                used[idx] = true;
                table[idx] = attack;
            } else if table[idx] != attack {
                ok = false;
                break;
            }
        }

        if ok {
            return (magic, table);
        }
    }
}

pub(crate) fn new_rng() -> StdRng {
    StdRng::seed_from_u64(MAGIC_SEED)
}

/// Squares whose occupancy can change the slider's attack set.
fn relevant_mask(slider: Slider, sq: Square) -> u64 {
    let mut mask = 0u64;
    for &(dr, df) in slider.directions() {
        let mut r = sq.rank() as isize + dr;
        let mut f = sq.file() as isize + df;
        // The last square of each ray never blocks anything beyond it
        while (0..8).contains(&(r + dr)) && (0..8).contains(&(f + df)) {
            mask |= 1u64 << (r * 8 + f);
            r += dr;
            f += df;
        }
    }
    mask
}

/// Ray-cast attacks, stopping at (and including) the first blocker.
pub(crate) fn ray_attacks(slider: Slider, sq: Square, occupancy: u64) -> u64 {
    let mut attacks = 0u64;
    for &(dr, df) in slider.directions() {
        let mut r = sq.rank() as isize + dr;
        let mut f = sq.file() as isize + df;
        while (0..8).contains(&r) && (0..8).contains(&f) {
            let bit = 1u64 << (r * 8 + f);
            attacks |= bit;
            if occupancy & bit != 0 {
                break;
            }
            r += dr;
            f += df;
        }
    }
    attacks
}
