//! Dense integer coordinates for single aspects of a [`CubieCube`] and their
//! move transition tables.

use rayon::prelude::*;

use crate::cubie::{CubieCube, EDGE_COUNT};

pub const N_TWIST: usize = 2187;
pub const N_FLIP: usize = 2048;
pub const N_SLICE: usize = 495;
pub const N_PERM_4: usize = 24;
pub const N_SLICE_SORTED: usize = N_SLICE * N_PERM_4;
pub const N_UEDGES: usize = N_SLICE_SORTED;
pub const N_DEDGES: usize = N_SLICE_SORTED;
pub const N_CORNERS: usize = 40320;
pub const N_UDEDGES: usize = 40320;
pub const N_FLIPSLICE: usize = N_FLIP * N_SLICE;
/// U-edge coordinates whose pieces all sit in the U or D layer.
pub const N_UEDGES_PHASE2: usize = 70 * N_PERM_4;

const FACTORIAL: [usize; 13] = {
    let mut arr = [1; 13];
    let mut i = 1;
    while i < arr.len() {
        arr[i] = arr[i - 1] * i;
        i += 1;
    }
    arr
};

/// Colex rank of every 4-element subset of 12 positions, keyed by bitmask.
const SUBSET_RANK: [u16; 1 << EDGE_COUNT] = {
    let mut arr = [u16::MAX; 1 << EDGE_COUNT];
    let mut rank = 0;
    let mut mask = 0;
    while mask < arr.len() {
        if (mask as u32).count_ones() == 4 {
            arr[mask] = rank;
            rank += 1;
        }
        mask += 1;
    }
    arr
};

const SUBSET_UNRANK: [u16; N_SLICE] = {
    let mut arr = [0; N_SLICE];
    let mut mask = 0;
    while mask < SUBSET_RANK.len() {
        if SUBSET_RANK[mask] != u16::MAX {
            arr[SUBSET_RANK[mask] as usize] = mask as u16;
        }
        mask += 1;
    }
    arr
};

const fn next_permutation(perm: &mut [u8; 4]) -> bool {
    let mut i = perm.len() - 1;
    while i > 0 && perm[i - 1] >= perm[i] {
        i -= 1;
    }
    if i == 0 {
        return false;
    }
    let mut j = perm.len() - 1;
    while perm[j] <= perm[i - 1] {
        j -= 1;
    }
    let tmp = perm[i - 1];
    perm[i - 1] = perm[j];
    perm[j] = tmp;

    let mut lo = i;
    let mut hi = perm.len() - 1;
    while lo < hi {
        let tmp = perm[lo];
        perm[lo] = perm[hi];
        perm[hi] = tmp;
        lo += 1;
        hi -= 1;
    }
    true
}

/// The orderings of four pieces in lexicographic order.
const PERM_4: [[u8; 4]; N_PERM_4] = {
    let mut arr = [[0; 4]; N_PERM_4];
    let mut perm = [0, 1, 2, 3];
    let mut i = 0;
    loop {
        arr[i] = perm;
        i += 1;
        if !next_permutation(&mut perm) {
            break;
        }
    }
    arr
};

/// Inverse of [`PERM_4`], keyed by the ordering packed two bits per piece.
const PERM_4_RANK: [u8; 256] = {
    let mut arr = [u8::MAX; 256];
    let mut i = 0;
    while i < N_PERM_4 {
        let p = PERM_4[i];
        arr[pack_order(p)] = i as u8;
        i += 1;
    }
    arr
};

const fn pack_order(order: [u8; 4]) -> usize {
    ((order[0] as usize) << 6)
        | ((order[1] as usize) << 4)
        | ((order[2] as usize) << 2)
        | order[3] as usize
}

/// Mixed radix encoding that leaves out the last digit, which is implied by
/// the total orientation being zero.
fn encode_orientation(ori: &[u8], radix: u8) -> u16 {
    ori[..ori.len() - 1]
        .iter()
        .fold(0, |acc, &digit| acc * u16::from(radix) + u16::from(digit))
}

fn decode_orientation(mut coord: u16, radix: u8, ori: &mut [u8]) {
    let last = ori.len() - 1;
    let mut parity = 0;
    for digit in ori[..last].iter_mut().rev() {
        *digit = (coord % u16::from(radix)) as u8;
        parity += *digit;
        coord /= u16::from(radix);
    }
    ori[last] = (radix - parity % radix) % radix;
}

/// Ranks where the pieces `lo..lo + 4` sit and in which order.
fn encode_subset(perm: &[u8], lo: u8) -> u16 {
    let mut mask = 0;
    let mut order = 0;
    for (pos, &piece) in perm.iter().enumerate() {
        let rel = piece.wrapping_sub(lo);
        if rel < 4 {
            mask |= 1 << pos;
            order = (order << 2) | rel as usize;
        }
    }
    SUBSET_RANK[mask] * N_PERM_4 as u16 + u16::from(PERM_4_RANK[order])
}

/// Places the pieces `lo..lo + 4` as described by `coord` and fills the
/// remaining positions with the other pieces in increasing order.
fn decode_subset(coord: u16, lo: u8, perm: &mut [u8]) {
    let mask = SUBSET_UNRANK[coord as usize / N_PERM_4];
    let order = PERM_4[coord as usize % N_PERM_4];
    let mut others = (0..perm.len() as u8).filter(|p| !(lo..lo + 4).contains(p));
    let mut placed = 0;
    for (pos, slot) in perm.iter_mut().enumerate() {
        if (mask >> pos) & 1 == 1 {
            *slot = lo + order[placed];
            placed += 1;
        } else {
            *slot = others.next().unwrap_or_default();
        }
    }
}

/// Lehmer rank of a full permutation.
fn encode_permutation(perm: &[u8]) -> u16 {
    let n = perm.len();
    let mut rank = 0;
    for i in 0..n {
        let smaller = perm[i + 1..].iter().filter(|&&p| p < perm[i]).count();
        rank += smaller * FACTORIAL[n - 1 - i];
    }
    rank as u16
}

fn decode_permutation(coord: u16, perm: &mut [u8]) {
    let n = perm.len();
    let mut rank = coord as usize;
    let mut available: u16 = (1 << n) - 1;
    for (i, slot) in perm.iter_mut().enumerate() {
        let fact = FACTORIAL[n - 1 - i];
        let mut skip = rank / fact;
        rank %= fact;
        let mut piece = 0;
        loop {
            if (available >> piece) & 1 == 1 {
                if skip == 0 {
                    break;
                }
                skip -= 1;
            }
            piece += 1;
        }
        available &= !(1 << piece);
        *slot = piece;
    }
}

/// Every coordinate the solver tracks.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum CoordKind {
    Twist,
    Flip,
    /// Positions and order of the FR FL BL BR edges.
    SliceSorted,
    /// Positions and order of the UR UF UL UB edges.
    UEdges,
    /// Positions and order of the DR DF DL DB edges.
    DEdges,
    Corners,
    /// Permutation of the eight U and D layer edges, only meaningful in phase 2.
    UdEdges,
    /// Order of the slice edges, only meaningful in phase 2.
    SlicePerm,
}

impl CoordKind {
    #[must_use]
    pub fn size(self) -> usize {
        match self {
            CoordKind::Twist => N_TWIST,
            CoordKind::Flip => N_FLIP,
            CoordKind::SliceSorted => N_SLICE_SORTED,
            CoordKind::UEdges => N_UEDGES,
            CoordKind::DEdges => N_DEDGES,
            CoordKind::Corners => N_CORNERS,
            CoordKind::UdEdges => N_UDEDGES,
            CoordKind::SlicePerm => N_PERM_4,
        }
    }

    /// The cube must have passed [`CubieCube::verify`], or be a reference
    /// cube produced by [`CoordKind::decode`].
    #[must_use]
    pub fn encode(self, cube: &CubieCube) -> u16 {
        match self {
            CoordKind::Twist => encode_orientation(&cube.co, 3),
            CoordKind::Flip => encode_orientation(&cube.eo, 2),
            CoordKind::SliceSorted => encode_subset(&cube.ep, 8),
            CoordKind::UEdges => encode_subset(&cube.ep, 0),
            CoordKind::DEdges => encode_subset(&cube.ep, 4),
            CoordKind::Corners => encode_permutation(&cube.cp),
            CoordKind::UdEdges => encode_permutation(&cube.ep[..8]),
            CoordKind::SlicePerm => encode_subset(&cube.ep, 8) % N_PERM_4 as u16,
        }
    }

    /// Overwrites the aspect of `cube` this coordinate describes. `coord`
    /// must be below [`CoordKind::size`].
    pub fn decode(self, coord: u16, cube: &mut CubieCube) {
        debug_assert!((coord as usize) < self.size());
        match self {
            CoordKind::Twist => decode_orientation(coord, 3, &mut cube.co),
            CoordKind::Flip => decode_orientation(coord, 2, &mut cube.eo),
            CoordKind::SliceSorted => decode_subset(coord, 8, &mut cube.ep),
            CoordKind::UEdges => decode_subset(coord, 0, &mut cube.ep),
            CoordKind::DEdges => decode_subset(coord, 4, &mut cube.ep),
            CoordKind::Corners => decode_permutation(coord, &mut cube.cp),
            CoordKind::UdEdges => {
                decode_permutation(coord, &mut cube.ep[..8]);
                for (e, slot) in cube.ep.iter_mut().enumerate().skip(8) {
                    *slot = e as u8;
                }
            }
            CoordKind::SlicePerm => {
                let solved_comb = SUBSET_RANK[0xF00] * N_PERM_4 as u16;
                decode_subset(solved_comb + coord, 8, &mut cube.ep);
            }
        }
    }

    #[must_use]
    pub fn solved(self) -> u16 {
        self.encode(&CubieCube::SOLVED)
    }
}

/// `coord × move → coord`, built once and shared read only.
pub struct MoveTable {
    n_moves: usize,
    table: Box<[u16]>,
}

impl MoveTable {
    /// Applies every move to a reference cube for every coordinate value.
    #[must_use]
    pub fn build(kind: CoordKind, moves: &[CubieCube]) -> Self {
        let n_moves = moves.len();
        let mut table = vec![0; kind.size() * n_moves].into_boxed_slice();
        table
            .par_chunks_mut(n_moves)
            .enumerate()
            .for_each(|(coord, row)| {
                let mut cube = CubieCube::SOLVED;
                kind.decode(coord as u16, &mut cube);
                for (slot, mv) in row.iter_mut().zip(moves) {
                    *slot = kind.encode(&cube.multiply(mv));
                }
            });
        MoveTable { n_moves, table }
    }

    #[inline]
    #[must_use]
    pub fn apply(&self, coord: u16, mv: usize) -> u16 {
        self.table[coord as usize * self.n_moves + mv]
    }
}

/// Combines phase-2 U-edges and D-edges into the UD-edge permutation.
pub struct UdEdgesMerge(Box<[u16]>);

impl UdEdgesMerge {
    #[must_use]
    pub fn build() -> Self {
        let mut table = vec![0; N_UEDGES_PHASE2 * N_PERM_4].into_boxed_slice();
        table
            .par_chunks_mut(N_PERM_4)
            .enumerate()
            .for_each(|(uedges, row)| {
                let mask = SUBSET_UNRANK[uedges / N_PERM_4];
                let uorder = PERM_4[uedges % N_PERM_4];
                for (dperm, slot) in row.iter_mut().enumerate() {
                    let dorder = PERM_4[dperm];
                    let mut ep = [0; 8];
                    let (mut u, mut d) = (0, 0);
                    for (pos, piece) in ep.iter_mut().enumerate() {
                        if (mask >> pos) & 1 == 1 {
                            *piece = uorder[u];
                            u += 1;
                        } else {
                            *piece = 4 + dorder[d];
                            d += 1;
                        }
                    }
                    *slot = encode_permutation(&ep);
                }
            });
        UdEdgesMerge(table)
    }

    /// Both coordinates must come from a cube whose slice edges are in the
    /// slice.
    #[inline]
    #[must_use]
    pub fn merge(&self, uedges: u16, dedges: u16) -> u16 {
        debug_assert!((uedges as usize) < N_UEDGES_PHASE2);
        self.0[uedges as usize * N_PERM_4 + dedges as usize % N_PERM_4]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [CoordKind; 8] = [
        CoordKind::Twist,
        CoordKind::Flip,
        CoordKind::SliceSorted,
        CoordKind::UEdges,
        CoordKind::DEdges,
        CoordKind::Corners,
        CoordKind::UdEdges,
        CoordKind::SlicePerm,
    ];

    #[test]
    fn solved_values() {
        assert_eq!(CoordKind::Twist.solved(), 0);
        assert_eq!(CoordKind::Flip.solved(), 0);
        assert_eq!(CoordKind::SliceSorted.solved(), 494 * 24);
        assert_eq!(CoordKind::UEdges.solved(), 0);
        assert_eq!(CoordKind::DEdges.solved(), 69 * 24);
        assert_eq!(CoordKind::Corners.solved(), 0);
        assert_eq!(CoordKind::UdEdges.solved(), 0);
        assert_eq!(CoordKind::SlicePerm.solved(), 0);
    }

    #[test]
    fn decode_then_encode() {
        for kind in ALL {
            for coord in 0..kind.size() as u16 {
                let mut cube = CubieCube::SOLVED;
                kind.decode(coord, &mut cube);
                assert_eq!(kind.encode(&cube), coord, "{kind:?}");
            }
        }
    }

    #[test]
    fn encode_then_decode() {
        let mut rng = fastrand::Rng::with_seed(42);
        for _ in 0..200 {
            let cube = CubieCube::random(&mut rng);
            let mut rebuilt = CubieCube::SOLVED;
            CoordKind::Twist.decode(CoordKind::Twist.encode(&cube), &mut rebuilt);
            CoordKind::Flip.decode(CoordKind::Flip.encode(&cube), &mut rebuilt);
            CoordKind::Corners.decode(CoordKind::Corners.encode(&cube), &mut rebuilt);
            assert_eq!(rebuilt.co, cube.co);
            assert_eq!(rebuilt.eo, cube.eo);
            assert_eq!(rebuilt.cp, cube.cp);

            let mut edges = CubieCube::SOLVED;
            CoordKind::UEdges.decode(CoordKind::UEdges.encode(&cube), &mut edges);
            let uedges_positions: Vec<_> = (0..12).filter(|&p| cube.ep[p] < 4).collect();
            for p in uedges_positions {
                assert_eq!(edges.ep[p], cube.ep[p]);
            }
        }
    }

    #[test]
    fn move_table_round_trip() {
        let inverses: Vec<_> = CubieCube::FACE_TURNS.iter().map(CubieCube::inverse).collect();
        let mut moves = CubieCube::FACE_TURNS.to_vec();
        moves.extend(inverses);
        for kind in [CoordKind::Twist, CoordKind::Flip, CoordKind::SliceSorted] {
            let table = MoveTable::build(kind, &moves);
            for coord in 0..kind.size() as u16 {
                for m in 0..6 {
                    assert_eq!(table.apply(table.apply(coord, m), m + 6), coord);
                }
            }
        }
    }

    #[test]
    fn merge_matches_direct_encoding() {
        let merge = UdEdgesMerge::build();
        let mut rng = fastrand::Rng::with_seed(3);
        for _ in 0..200 {
            let mut cube = CubieCube::SOLVED;
            rng.shuffle(&mut cube.ep[..8]);
            let uedges = CoordKind::UEdges.encode(&cube);
            let dedges = CoordKind::DEdges.encode(&cube);
            assert_eq!(merge.merge(uedges, dedges), CoordKind::UdEdges.encode(&cube));
        }
    }
}
