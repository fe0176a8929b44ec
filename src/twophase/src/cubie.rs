//! The cube group at the piece level.
//!
//! Corners are numbered URF UFL ULB UBR DFR DLF DBL DRB and edges UR UF UL UB
//! DR DF DL DB FR FL BL BR. A [`CubieCube`] is written in "replaced-by" form:
//! `cp[i]` is the corner that sits at position `i`.

use thiserror::Error;

pub const CORNER_COUNT: usize = 8;
pub const EDGE_COUNT: usize = 12;

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct CubieCube {
    pub cp: [u8; CORNER_COUNT],
    /// Corner twist. Values 3..6 only occur in mirrored symmetry cubes.
    pub co: [u8; CORNER_COUNT],
    pub ep: [u8; EDGE_COUNT],
    pub eo: [u8; EDGE_COUNT],
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InvalidCubeError {
    #[error("Corner {0} is out of range")]
    CornerOutOfRange(u8),
    #[error("Edge {0} is out of range")]
    EdgeOutOfRange(u8),
    #[error("Corner {0} does not appear exactly once")]
    MissingCorner(u8),
    #[error("Edge {0} does not appear exactly once")]
    MissingEdge(u8),
    #[error("Corner orientation {0} is out of range")]
    CornerOrientation(u8),
    #[error("Edge orientation {0} is out of range")]
    EdgeOrientation(u8),
    #[error("Total corner twist is not divisible by 3")]
    TwistParity,
    #[error("Total edge flip is odd")]
    FlipParity,
    #[error("Corner and edge permutation parities differ")]
    PermutationParity,
}

impl Default for CubieCube {
    fn default() -> Self {
        Self::SOLVED
    }
}

const fn identity<const N: usize>() -> [u8; N] {
    let mut arr = [0; N];
    let mut i = 0;
    while i < N {
        arr[i] = i as u8;
        i += 1;
    }
    arr
}

impl CubieCube {
    pub const SOLVED: Self = Self {
        cp: identity(),
        co: [0; CORNER_COUNT],
        ep: identity(),
        eo: [0; EDGE_COUNT],
    };

    /// Quarter turns of U R F D L B, clockwise when looking at the face.
    pub const FACE_TURNS: [Self; 6] = [
        Self {
            cp: [3, 0, 1, 2, 4, 5, 6, 7],
            co: [0; 8],
            ep: [3, 0, 1, 2, 4, 5, 6, 7, 8, 9, 10, 11],
            eo: [0; 12],
        },
        Self {
            cp: [4, 1, 2, 0, 7, 5, 6, 3],
            co: [2, 0, 0, 1, 1, 0, 0, 2],
            ep: [8, 1, 2, 3, 11, 5, 6, 7, 4, 9, 10, 0],
            eo: [0; 12],
        },
        Self {
            cp: [1, 5, 2, 3, 0, 4, 6, 7],
            co: [1, 2, 0, 0, 2, 1, 0, 0],
            ep: [0, 9, 2, 3, 4, 8, 6, 7, 1, 5, 10, 11],
            eo: [0, 1, 0, 0, 0, 1, 0, 0, 1, 1, 0, 0],
        },
        Self {
            cp: [0, 1, 2, 3, 5, 6, 7, 4],
            co: [0; 8],
            ep: [0, 1, 2, 3, 5, 6, 7, 4, 8, 9, 10, 11],
            eo: [0; 12],
        },
        Self {
            cp: [0, 2, 6, 3, 4, 1, 5, 7],
            co: [0, 1, 2, 0, 0, 2, 1, 0],
            ep: [0, 1, 10, 3, 4, 5, 9, 7, 8, 2, 6, 11],
            eo: [0; 12],
        },
        Self {
            cp: [0, 1, 3, 7, 4, 5, 2, 6],
            co: [0, 0, 1, 2, 0, 0, 2, 1],
            ep: [0, 1, 2, 11, 4, 5, 6, 10, 8, 9, 3, 7],
            eo: [0, 0, 0, 1, 0, 0, 0, 1, 0, 0, 1, 1],
        },
    ];

    /// Applies `other` after `self`.
    #[must_use]
    pub fn multiply(&self, other: &Self) -> Self {
        let mut result = Self::SOLVED;
        for c in 0..CORNER_COUNT {
            let from = other.cp[c] as usize;
            result.cp[c] = self.cp[from];
            result.co[c] = compose_twist(self.co[from], other.co[c]);
        }
        for e in 0..EDGE_COUNT {
            let from = other.ep[e] as usize;
            result.ep[e] = self.ep[from];
            result.eo[e] = (self.eo[from] + other.eo[e]) % 2;
        }
        result
    }

    #[must_use]
    pub fn inverse(&self) -> Self {
        let mut result = Self::SOLVED;
        for c in 0..CORNER_COUNT {
            result.cp[self.cp[c] as usize] = c as u8;
        }
        for c in 0..CORNER_COUNT {
            let ori = self.co[result.cp[c] as usize];
            result.co[c] = if ori >= 3 { ori } else { (3 - ori) % 3 };
        }
        for e in 0..EDGE_COUNT {
            result.ep[self.ep[e] as usize] = e as u8;
        }
        for e in 0..EDGE_COUNT {
            result.eo[e] = self.eo[result.ep[e] as usize];
        }
        result
    }

    #[must_use]
    pub fn corner_parity(&self) -> bool {
        permutation_parity(&self.cp)
    }

    #[must_use]
    pub fn edge_parity(&self) -> bool {
        permutation_parity(&self.ep)
    }

    /// Checks that this is a reachable cube state. Every coordinate encoder
    /// assumes this holds.
    ///
    /// # Errors
    ///
    /// Returns the first violated constraint.
    pub fn verify(&self) -> Result<(), InvalidCubeError> {
        let mut seen = [0_u8; EDGE_COUNT];
        for &e in &self.ep {
            *seen
                .get_mut(e as usize)
                .ok_or(InvalidCubeError::EdgeOutOfRange(e))? += 1;
        }
        if let Some(missing) = seen.iter().position(|&n| n != 1) {
            return Err(InvalidCubeError::MissingEdge(missing as u8));
        }

        let mut seen = [0_u8; CORNER_COUNT];
        for &c in &self.cp {
            *seen
                .get_mut(c as usize)
                .ok_or(InvalidCubeError::CornerOutOfRange(c))? += 1;
        }
        if let Some(missing) = seen.iter().position(|&n| n != 1) {
            return Err(InvalidCubeError::MissingCorner(missing as u8));
        }

        if let Some(&bad) = self.eo.iter().find(|&&o| o > 1) {
            return Err(InvalidCubeError::EdgeOrientation(bad));
        }
        if let Some(&bad) = self.co.iter().find(|&&o| o > 2) {
            return Err(InvalidCubeError::CornerOrientation(bad));
        }
        if self.eo.iter().map(|&o| u32::from(o)).sum::<u32>() % 2 != 0 {
            return Err(InvalidCubeError::FlipParity);
        }
        if self.co.iter().map(|&o| u32::from(o)).sum::<u32>() % 3 != 0 {
            return Err(InvalidCubeError::TwistParity);
        }
        if self.corner_parity() != self.edge_parity() {
            return Err(InvalidCubeError::PermutationParity);
        }
        Ok(())
    }

    /// A uniformly random reachable state.
    pub fn random(rng: &mut fastrand::Rng) -> Self {
        let mut cube = Self::SOLVED;
        rng.shuffle(&mut cube.cp);
        rng.shuffle(&mut cube.ep);
        if cube.corner_parity() != cube.edge_parity() {
            cube.cp.swap(0, 1);
        }

        let mut twist = 0;
        for o in &mut cube.co[..CORNER_COUNT - 1] {
            *o = rng.u8(0..3);
            twist += *o;
        }
        cube.co[CORNER_COUNT - 1] = (3 - twist % 3) % 3;

        let mut flip = 0;
        for o in &mut cube.eo[..EDGE_COUNT - 1] {
            *o = rng.u8(0..2);
            flip += *o;
        }
        cube.eo[EDGE_COUNT - 1] = flip % 2;
        cube
    }
}

/// Twist composition that also handles mirrored corners, whose orientation
/// is stored offset by 3.
fn compose_twist(a: u8, b: u8) -> u8 {
    match (a < 3, b < 3) {
        (true, true) => (a + b) % 3,
        (true, false) => {
            let ori = a + b;
            if ori >= 6 { ori - 3 } else { ori }
        }
        (false, true) => {
            let ori = a - b;
            if ori < 3 { ori + 3 } else { ori }
        }
        (false, false) => {
            if a >= b {
                a - b
            } else {
                a + 3 - b
            }
        }
    }
}

/// `true` for odd permutations.
fn permutation_parity(perm: &[u8]) -> bool {
    let mut inversions = 0;
    for i in 0..perm.len() {
        for j in i + 1..perm.len() {
            if perm[i] > perm[j] {
                inversions += 1;
            }
        }
    }
    inversions % 2 == 1
}
