use log::{debug, info};

use crate::{
    coord::{CoordKind, MoveTable, N_CORNERS, N_FLIP, N_FLIPSLICE, N_PERM_4, N_TWIST, UdEdgesMerge},
    cubie::CubieCube,
    moves::{Metric, MoveSet, MoveSetError},
    pruning::{PruningTables, TableSizes},
    success,
    sym::{ConjMoveTable, ConjTable, SymClasses, Symmetries, SymmetryError},
    working,
};

/// Upper bound on the number of moves of any metric.
pub(crate) const MAX_MOVES: usize = 32;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Phase1Coords {
    pub flip: u16,
    pub slice_sorted: u16,
    pub twist: u16,
    pub corners: u16,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Phase2Coords {
    pub corners: u16,
    pub udedges: u16,
    pub slice_perm: u16,
}

/// Everything derived from the metric except the pruning tables.
pub struct CoordTables {
    pub(crate) moves: MoveSet,
    pub(crate) symmetries: Symmetries,
    pub(crate) conj_move: ConjMoveTable,

    pub(crate) flip_move: MoveTable,
    pub(crate) twist_move: MoveTable,
    pub(crate) slice_sorted_move: MoveTable,
    pub(crate) corners_move: MoveTable,
    pub(crate) uedges_move: MoveTable,
    pub(crate) dedges_move: MoveTable,

    // Indexed by phase-2 move
    pub(crate) corners_move2: MoveTable,
    pub(crate) udedges_move2: MoveTable,
    pub(crate) slice_perm_move2: MoveTable,
    pub(crate) merge: UdEdgesMerge,

    pub(crate) flipslice_classes: SymClasses,
    pub(crate) corner_classes: SymClasses,
    pub(crate) twist_conj: ConjTable,
    pub(crate) udedges_conj: ConjTable,
    pub(crate) slice_perm_conj: ConjTable,

    pub(crate) solved: Phase1Coords,
    pub(crate) solved2: Phase2Coords,
}

#[derive(thiserror::Error, Debug)]
pub enum TablesError {
    #[error(transparent)]
    MoveSet(#[from] MoveSetError),
    #[error(transparent)]
    Symmetry(#[from] SymmetryError),
}

impl CoordTables {
    /// Builds the move, symmetry and class tables for `metric`.
    ///
    /// # Errors
    ///
    /// Fails if the metric's move set is not closed under inversion or under
    /// the symmetry subgroup.
    pub fn new(metric: Metric) -> Result<Self, TablesError> {
        info!(working!("Building coordinate tables for {}"), metric);

        let moves = MoveSet::new(metric)?;
        let symmetries = Symmetries::new();
        let subgroup = symmetries.subgroup(metric);
        let conj_move = ConjMoveTable::new(&symmetries, &moves, subgroup.syms())?;

        let cubes = moves.cubes();
        let phase2_cubes: Vec<_> = moves.phase2_moves().iter().map(|mv| *mv.cube()).collect();

        let flipslice_classes =
            SymClasses::classify(N_FLIPSLICE, &symmetries, &subgroup, |raw, s| {
                let mut cube = CubieCube::SOLVED;
                CoordKind::Flip.decode((raw as usize % N_FLIP) as u16, &mut cube);
                let slice = (raw as usize / N_FLIP * N_PERM_4) as u16;
                CoordKind::SliceSorted.decode(slice, &mut cube);
                let image = symmetries.conjugate(&cube, s);
                let slice = CoordKind::SliceSorted.encode(&image) as usize / N_PERM_4;
                (slice * N_FLIP + CoordKind::Flip.encode(&image) as usize) as u32
            });
        let corner_classes = SymClasses::classify(N_CORNERS, &symmetries, &subgroup, |raw, s| {
            let mut cube = CubieCube::SOLVED;
            CoordKind::Corners.decode(raw as u16, &mut cube);
            u32::from(CoordKind::Corners.encode(&symmetries.conjugate(&cube, s)))
        });
        debug!(
            "{} flip-slice classes, {} corner classes under {} symmetries",
            flipslice_classes.len(),
            corner_classes.len(),
            subgroup.len()
        );

        let tables = CoordTables {
            flip_move: MoveTable::build(CoordKind::Flip, &cubes),
            twist_move: MoveTable::build(CoordKind::Twist, &cubes),
            slice_sorted_move: MoveTable::build(CoordKind::SliceSorted, &cubes),
            corners_move: MoveTable::build(CoordKind::Corners, &cubes),
            uedges_move: MoveTable::build(CoordKind::UEdges, &cubes),
            dedges_move: MoveTable::build(CoordKind::DEdges, &cubes),
            corners_move2: MoveTable::build(CoordKind::Corners, &phase2_cubes),
            udedges_move2: MoveTable::build(CoordKind::UdEdges, &phase2_cubes),
            slice_perm_move2: MoveTable::build(CoordKind::SlicePerm, &phase2_cubes),
            merge: UdEdgesMerge::build(),
            twist_conj: ConjTable::build(CoordKind::Twist, &symmetries, &subgroup),
            udedges_conj: ConjTable::build(CoordKind::UdEdges, &symmetries, &subgroup),
            slice_perm_conj: ConjTable::build(CoordKind::SlicePerm, &symmetries, &subgroup),
            flipslice_classes,
            corner_classes,
            solved: Phase1Coords::of(&CubieCube::SOLVED),
            solved2: Phase2Coords {
                corners: CoordKind::Corners.solved(),
                udedges: CoordKind::UdEdges.solved(),
                slice_perm: CoordKind::SlicePerm.solved(),
            },
            moves,
            symmetries,
            conj_move,
        };

        info!(success!("Coordinate tables built"));
        Ok(tables)
    }

    #[must_use]
    pub fn moves(&self) -> &MoveSet {
        &self.moves
    }

    #[must_use]
    pub fn symmetries(&self) -> &Symmetries {
        &self.symmetries
    }

    pub(crate) fn sizes(&self) -> TableSizes {
        TableSizes {
            phase1_cells: self.flipslice_classes.len() * N_TWIST,
            phase1_moves: self.moves.len(),
            phase2_cells: self.corner_classes.len() * N_CORNERS,
            precheck_cells: self.corner_classes.len() * N_PERM_4,
        }
    }

    #[inline]
    pub(crate) fn flipslice(c: &Phase1Coords) -> u32 {
        (c.slice_sorted as usize / N_PERM_4 * N_FLIP + c.flip as usize) as u32
    }

    #[inline]
    pub(crate) fn phase1_apply(&self, c: &Phase1Coords, mv: usize) -> Phase1Coords {
        Phase1Coords {
            flip: self.flip_move.apply(c.flip, mv),
            slice_sorted: self.slice_sorted_move.apply(c.slice_sorted, mv),
            twist: self.twist_move.apply(c.twist, mv),
            corners: self.corners_move.apply(c.corners, mv),
        }
    }

    #[inline]
    pub(crate) fn is_phase1_goal(&self, c: &Phase1Coords) -> bool {
        c.flip == self.solved.flip
            && c.twist == self.solved.twist
            && c.slice_sorted as usize / N_PERM_4 == self.solved.slice_sorted as usize / N_PERM_4
    }

    /// Phase-1 table cell of the coordinates and the local symmetry that
    /// maps them into the class frame.
    #[inline]
    pub(crate) fn phase1_cell(&self, c: &Phase1Coords) -> (usize, usize) {
        let (class, k) = self.flipslice_classes.lookup(Self::flipslice(c));
        (class * N_TWIST + self.twist_conj.get(c.twist, k) as usize, k)
    }

    #[inline]
    pub(crate) fn phase2_apply(&self, c: &Phase2Coords, mv: usize) -> Phase2Coords {
        Phase2Coords {
            corners: self.corners_move2.apply(c.corners, mv),
            udedges: self.udedges_move2.apply(c.udedges, mv),
            slice_perm: self.slice_perm_move2.apply(c.slice_perm, mv),
        }
    }

    #[inline]
    pub(crate) fn phase2_cell(&self, corners: u16, udedges: u16) -> usize {
        let (class, k) = self.corner_classes.lookup(u32::from(corners));
        class * N_CORNERS + self.udedges_conj.get(udedges, k) as usize
    }

    #[inline]
    pub(crate) fn precheck_cell(&self, corners: u16, slice_perm: u16) -> usize {
        let (class, k) = self.corner_classes.lookup(u32::from(corners));
        class * N_PERM_4 + self.slice_perm_conj.get(slice_perm, k) as usize
    }
}

impl Phase1Coords {
    pub(crate) fn of(cube: &CubieCube) -> Self {
        Phase1Coords {
            flip: CoordKind::Flip.encode(cube),
            slice_sorted: CoordKind::SliceSorted.encode(cube),
            twist: CoordKind::Twist.encode(cube),
            corners: CoordKind::Corners.encode(cube),
        }
    }
}

/// The coordinate tables together with the pruning tables built over them.
pub struct Tables {
    pub(crate) coords: CoordTables,
    pub(crate) pruning: PruningTables,
}

impl Tables {
    #[must_use]
    pub fn new(coords: CoordTables, pruning: PruningTables) -> Self {
        Tables { coords, pruning }
    }

    #[must_use]
    pub fn coords(&self) -> &CoordTables {
        &self.coords
    }

    #[must_use]
    pub fn moves(&self) -> &MoveSet {
        &self.coords.moves
    }

    /// Per-move change of the phase-1 distance, as `new - old + 1`, for
    /// moves applied to `c` directly.
    #[inline]
    pub(crate) fn phase1_effects(&self, c: &Phase1Coords, out: &mut [u8; MAX_MOVES]) {
        let coords = &self.coords;
        let (cell, k) = coords.phase1_cell(c);
        let mut canonical = [0; MAX_MOVES];
        self.pruning.phase1_effects(cell, &mut canonical);
        for (mv, slot) in out.iter_mut().enumerate().take(coords.moves.len()) {
            *slot = canonical[coords.conj_move.get(mv, k)];
        }
    }

    /// Exact number of moves needed to reach the phase-2 subgroup.
    pub(crate) fn phase1_distance(&self, c: &Phase1Coords) -> u8 {
        let mut c = *c;
        let mut distance = 0;
        let mut effects = [0; MAX_MOVES];
        while !self.coords.is_phase1_goal(&c) {
            self.phase1_effects(&c, &mut effects);
            let Some(mv) = (0..self.coords.moves.len()).find(|&mv| effects[mv] == 0) else {
                break;
            };
            c = self.coords.phase1_apply(&c, mv);
            distance += 1;
        }
        distance
    }

    #[inline]
    pub(crate) fn phase2_distance(&self, corners: u16, udedges: u16) -> u8 {
        self.pruning.phase2(self.coords.phase2_cell(corners, udedges))
    }

    #[inline]
    pub(crate) fn precheck_distance(&self, corners: u16, slice_perm: u16) -> u8 {
        self.pruning.precheck(self.coords.precheck_cell(corners, slice_perm))
    }
}
