//! The 48 symmetries of the cube and reduction of coordinate spaces to
//! classes under a subgroup of them.

use rayon::prelude::*;
use thiserror::Error;

use crate::{
    coord::CoordKind,
    cubie::CubieCube,
    moves::{Face, Metric, MoveSet},
};

pub const N_SYMS: usize = 48;

/// 120° rotation about the URF-DBL diagonal.
const ROT_URF3: CubieCube = CubieCube {
    cp: [0, 4, 5, 1, 3, 7, 6, 2],
    co: [1, 2, 1, 2, 2, 1, 2, 1],
    ep: [1, 8, 5, 9, 3, 11, 7, 10, 0, 4, 6, 2],
    eo: [1, 0, 1, 0, 1, 0, 1, 0, 1, 1, 1, 1],
};

/// 180° rotation about the F-B axis.
const ROT_F2: CubieCube = CubieCube {
    cp: [5, 4, 7, 6, 1, 0, 3, 2],
    co: [0; 8],
    ep: [6, 5, 4, 7, 2, 1, 0, 3, 9, 8, 11, 10],
    eo: [0; 12],
};

/// 90° rotation about the U-D axis.
const ROT_U4: CubieCube = CubieCube {
    cp: [3, 0, 1, 2, 7, 4, 5, 6],
    co: [0; 8],
    ep: [3, 0, 1, 2, 7, 4, 5, 6, 11, 8, 9, 10],
    eo: [0, 0, 0, 0, 0, 0, 0, 0, 1, 1, 1, 1],
};

/// Reflection through the plane between L and R.
const MIRR_LR2: CubieCube = CubieCube {
    cp: [1, 0, 3, 2, 5, 4, 7, 6],
    co: [3; 8],
    ep: [2, 1, 0, 3, 6, 5, 4, 7, 9, 8, 11, 10],
    eo: [0; 12],
};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SymmetryError {
    #[error("Symmetry {sym} does not map `{mv}` onto a move of the metric")]
    MoveNotPreserved { mv: String, sym: usize },
}

/// Symmetry `16 * urf3 + 8 * f2 + 2 * u4 + lr2` is
/// `ROT_URF3^urf3 * ROT_F2^f2 * ROT_U4^u4 * MIRR_LR2^lr2`.
pub struct Symmetries {
    cubes: Vec<CubieCube>,
    inverse: [u8; N_SYMS],
    face_images: [[Face; 6]; N_SYMS],
}

impl Symmetries {
    #[must_use]
    #[allow(clippy::missing_panics_doc)]
    pub fn new() -> Self {
        let mut cubes = Vec::with_capacity(N_SYMS);
        let mut cube = CubieCube::SOLVED;
        for _ in 0..3 {
            for _ in 0..2 {
                for _ in 0..4 {
                    for _ in 0..2 {
                        cubes.push(cube);
                        cube = cube.multiply(&MIRR_LR2);
                    }
                    cube = cube.multiply(&ROT_U4);
                }
                cube = cube.multiply(&ROT_F2);
            }
            cube = cube.multiply(&ROT_URF3);
        }

        let mut inverse = [0; N_SYMS];
        for (s, slot) in inverse.iter_mut().enumerate() {
            *slot = (0..N_SYMS)
                .position(|t| cubes[s].multiply(&cubes[t]) == CubieCube::SOLVED)
                .expect("the symmetries form a group") as u8;
        }

        let mut symmetries = Symmetries {
            cubes,
            inverse,
            face_images: [[Face::U; 6]; N_SYMS],
        };
        for s in 0..N_SYMS {
            for face in Face::ALL {
                let image = symmetries.conjugate(face.quarter_turn(), s);
                symmetries.face_images[s][face as usize] = Face::ALL
                    .into_iter()
                    .find(|other| {
                        let turn = other.quarter_turn();
                        image == *turn || image == turn.inverse()
                    })
                    .expect("symmetries map face turns to face turns");
            }
        }
        symmetries
    }

    #[must_use]
    pub fn cube(&self, s: usize) -> &CubieCube {
        &self.cubes[s]
    }

    #[must_use]
    pub fn inverse(&self, s: usize) -> usize {
        self.inverse[s] as usize
    }

    /// `S⁻¹ · cube · S`
    #[must_use]
    pub fn conjugate(&self, cube: &CubieCube, s: usize) -> CubieCube {
        self.cubes[self.inverse(s)]
            .multiply(cube)
            .multiply(&self.cubes[s])
    }

    #[must_use]
    pub fn is_mirror(s: usize) -> bool {
        s % 2 == 1
    }

    /// The face turned by the conjugate of a turn of `face`.
    #[must_use]
    pub fn face_image(&self, s: usize, face: Face) -> Face {
        self.face_images[s][face as usize]
    }

    /// The symmetries that keep the phase-1 target subgroup, and in the
    /// 5-face case also the unused face, in place.
    #[must_use]
    pub fn subgroup(&self, metric: Metric) -> SymSubgroup {
        let syms = (0..N_SYMS)
            .filter(|&s| matches!(self.face_image(s, Face::U), Face::U | Face::D))
            .filter(|&s| !metric.five_face || self.face_image(s, Face::B) == Face::B)
            .collect();
        SymSubgroup::new(syms)
    }

    /// Rotations that reframe the cube for the different search
    /// directions. Each moves the U-D axis somewhere else.
    #[must_use]
    pub fn direction_rotations(&self, metric: Metric) -> Vec<usize> {
        if metric.five_face {
            let quarter_about_fb = (0..N_SYMS).find(|&s| {
                !Self::is_mirror(s)
                    && self.face_image(s, Face::B) == Face::B
                    && matches!(self.face_image(s, Face::U), Face::R | Face::L)
            });
            std::iter::once(0).chain(quarter_about_fb).collect()
        } else {
            vec![0, 16, 32]
        }
    }
}

impl Default for Symmetries {
    fn default() -> Self {
        Self::new()
    }
}

/// Symmetries indexed locally, with the identity first.
pub struct SymSubgroup {
    syms: Vec<usize>,
    local: [u8; N_SYMS],
}

impl SymSubgroup {
    fn new(syms: Vec<usize>) -> Self {
        debug_assert!(syms.len() <= 16 && syms[0] == 0);
        let mut local = [u8::MAX; N_SYMS];
        for (k, &s) in syms.iter().enumerate() {
            local[s] = k as u8;
        }
        SymSubgroup { syms, local }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.syms.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.syms.is_empty()
    }

    #[must_use]
    pub fn syms(&self) -> &[usize] {
        &self.syms
    }

    #[must_use]
    pub fn global(&self, k: usize) -> usize {
        self.syms[k]
    }

    #[must_use]
    pub fn local(&self, s: usize) -> Option<usize> {
        match self.local[s] {
            u8::MAX => None,
            k => Some(k as usize),
        }
    }
}

/// `conj[mv][k]` is the move `S⁻¹ · mv · S` for the `k`th of a list of
/// symmetries.
pub struct ConjMoveTable {
    n_syms: usize,
    table: Box<[u8]>,
}

impl ConjMoveTable {
    /// # Errors
    ///
    /// Fails when some symmetry maps a move outside the move set.
    pub fn new(
        symmetries: &Symmetries,
        moves: &MoveSet,
        syms: &[usize],
    ) -> Result<Self, SymmetryError> {
        let mut table = Vec::with_capacity(moves.len() * syms.len());
        for mv in moves.moves() {
            for &s in syms {
                let image = symmetries.conjugate(mv.cube(), s);
                let found = moves
                    .find(&image)
                    .ok_or_else(|| SymmetryError::MoveNotPreserved {
                        mv: mv.name().to_string(),
                        sym: s,
                    })?;
                table.push(found as u8);
            }
        }
        Ok(ConjMoveTable {
            n_syms: syms.len(),
            table: table.into_boxed_slice(),
        })
    }

    #[inline]
    #[must_use]
    pub fn get(&self, mv: usize, k: usize) -> usize {
        self.table[mv * self.n_syms + k] as usize
    }
}

/// A coordinate space partitioned into classes of symmetric values.
pub struct SymClasses {
    class_of: Box<[u32]>,
    sym_of: Box<[u8]>,
    reps: Box<[u32]>,
    stabilizers: Box<[u16]>,
}

impl SymClasses {
    /// Scans `0..size` once. `conj(raw, s)` must give the raw coordinate of
    /// `S⁻¹ · X · S` for any `X` with coordinate `raw`.
    pub fn classify(
        size: usize,
        symmetries: &Symmetries,
        subgroup: &SymSubgroup,
        conj: impl Fn(u32, usize) -> u32,
    ) -> Self {
        const UNCLASSIFIED: u32 = u32::MAX;

        let mut class_of = vec![UNCLASSIFIED; size].into_boxed_slice();
        let mut sym_of = vec![0; size].into_boxed_slice();
        let mut reps = Vec::new();
        let mut stabilizers = Vec::new();

        for raw in 0..size as u32 {
            if class_of[raw as usize] != UNCLASSIFIED {
                continue;
            }
            let class = reps.len() as u32;
            reps.push(raw);
            class_of[raw as usize] = class;
            sym_of[raw as usize] = 0;

            let mut stabilizer = 0_u16;
            for (k, &s) in subgroup.syms().iter().enumerate() {
                let image = conj(raw, s);
                if image == raw {
                    stabilizer |= 1 << k;
                } else if class_of[image as usize] == UNCLASSIFIED {
                    class_of[image as usize] = class;
                    sym_of[image as usize] = subgroup
                        .local(symmetries.inverse(s))
                        .unwrap_or_default() as u8;
                }
            }
            stabilizers.push(stabilizer);
        }

        SymClasses {
            class_of,
            sym_of,
            reps: reps.into_boxed_slice(),
            stabilizers: stabilizers.into_boxed_slice(),
        }
    }

    /// Number of classes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.reps.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.reps.is_empty()
    }

    /// The class of `raw` and the local symmetry that conjugates `raw` onto
    /// the class representative.
    #[inline]
    #[must_use]
    pub fn lookup(&self, raw: u32) -> (usize, usize) {
        (
            self.class_of[raw as usize] as usize,
            self.sym_of[raw as usize] as usize,
        )
    }

    #[inline]
    #[must_use]
    pub fn representative(&self, class: usize) -> u32 {
        self.reps[class]
    }

    #[inline]
    #[must_use]
    pub fn stabilizer(&self, class: usize) -> u16 {
        self.stabilizers[class]
    }
}

/// Conjugates of a coordinate that is not reduced itself, so it can follow
/// the canonical frame of a class.
pub struct ConjTable {
    n_syms: usize,
    table: Box<[u16]>,
}

impl ConjTable {
    #[must_use]
    pub fn build(kind: CoordKind, symmetries: &Symmetries, subgroup: &SymSubgroup) -> Self {
        let n_syms = subgroup.len();
        let mut table = vec![0; kind.size() * n_syms].into_boxed_slice();
        table
            .par_chunks_mut(n_syms)
            .enumerate()
            .for_each(|(coord, row)| {
                let mut cube = CubieCube::SOLVED;
                kind.decode(coord as u16, &mut cube);
                for (slot, &s) in row.iter_mut().zip(subgroup.syms()) {
                    *slot = kind.encode(&symmetries.conjugate(&cube, s));
                }
            });
        ConjTable { n_syms, table }
    }

    #[inline]
    #[must_use]
    pub fn get(&self, coord: u16, k: usize) -> u16 {
        self.table[coord as usize * self.n_syms + k]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coord::N_CORNERS;

    fn corner_classes(symmetries: &Symmetries, subgroup: &SymSubgroup) -> SymClasses {
        SymClasses::classify(N_CORNERS, symmetries, subgroup, |raw, s| {
            let mut cube = CubieCube::SOLVED;
            CoordKind::Corners.decode(raw as u16, &mut cube);
            u32::from(CoordKind::Corners.encode(&symmetries.conjugate(&cube, s)))
        })
    }

    #[test]
    fn group_structure() {
        let symmetries = Symmetries::new();
        assert_eq!(symmetries.cube(0), &CubieCube::SOLVED);
        for s in 0..N_SYMS {
            let inv = symmetries.inverse(s);
            assert_eq!(symmetries.inverse(inv), s);
            assert_eq!(
                symmetries.cube(inv).multiply(symmetries.cube(s)),
                CubieCube::SOLVED
            );
        }
        let distinct: std::collections::HashSet<_> = (0..N_SYMS).map(|s| *symmetries.cube(s)).collect();
        assert_eq!(distinct.len(), N_SYMS);
    }

    #[test]
    fn subgroups() {
        let symmetries = Symmetries::new();
        let full = symmetries.subgroup(Metric::default());
        assert_eq!(full.syms(), (0..16).collect::<Vec<_>>());

        let five_face = Metric {
            five_face: true,
            ..Metric::default()
        };
        let small = symmetries.subgroup(five_face);
        assert_eq!(small.syms(), [0, 1, 8, 9]);

        let rotations = symmetries.direction_rotations(five_face);
        assert_eq!(rotations.len(), 2);
        assert_eq!(symmetries.face_image(rotations[1], Face::F), Face::F);
    }

    #[test]
    fn conj_moves_stay_in_metric() {
        let symmetries = Symmetries::new();
        for bits in 0..8 {
            let metric = Metric {
                quarter_turn: bits & 1 != 0,
                axial: bits & 2 != 0,
                five_face: bits & 4 != 0,
            };
            let moves = MoveSet::new(metric).unwrap();
            let subgroup = symmetries.subgroup(metric);
            let table = ConjMoveTable::new(&symmetries, &moves, subgroup.syms()).unwrap();
            for mv in 0..moves.len() {
                assert_eq!(table.get(mv, 0), mv);
            }
            let rotations = symmetries.direction_rotations(metric);
            assert!(ConjMoveTable::new(&symmetries, &moves, &rotations).is_ok());
        }
    }

    #[test]
    fn corner_classes_and_stabilizers() {
        let symmetries = Symmetries::new();
        let subgroup = symmetries.subgroup(Metric::default());
        let classes = corner_classes(&symmetries, &subgroup);
        assert_eq!(classes.len(), 2768);

        for raw in (0..N_CORNERS as u32).step_by(97) {
            let (class, k) = classes.lookup(raw);
            let mut cube = CubieCube::SOLVED;
            CoordKind::Corners.decode(raw as u16, &mut cube);
            let canonical = symmetries.conjugate(&cube, subgroup.global(k));
            assert_eq!(
                u32::from(CoordKind::Corners.encode(&canonical)),
                classes.representative(class)
            );
        }

        for class in 0..classes.len() {
            let rep = classes.representative(class);
            let stabilizer = classes.stabilizer(class);
            assert_eq!(stabilizer & 1, 1);
            for k in (0..subgroup.len()).filter(|k| (stabilizer >> k) & 1 == 1) {
                let mut cube = CubieCube::SOLVED;
                CoordKind::Corners.decode(rep as u16, &mut cube);
                let image = symmetries.conjugate(&cube, subgroup.global(k));
                assert_eq!(u32::from(CoordKind::Corners.encode(&image)), rep);
            }
        }
    }
}
