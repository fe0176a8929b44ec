//! Distance tables over symmetry-reduced coordinate spaces, generated by
//! sweeping the whole table once per depth.

use std::{
    fs::{self, File},
    io::{self, BufReader, BufWriter, Read, Write},
    path::Path,
    time::Instant,
};

use log::{debug, info, warn};
use rayon::prelude::*;

use crate::{
    coord::{CoordKind, MoveTable, N_FLIP, N_PERM_4, N_TWIST},
    sym::ConjTable,
    start, success,
    tables::{CoordTables, MAX_MOVES},
    working,
};

const UNVISITED: u8 = u8::MAX;

/// Byte layout of the persisted tables.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct TableSizes {
    pub phase1_cells: usize,
    pub phase1_moves: usize,
    pub phase2_cells: usize,
    pub precheck_cells: usize,
}

impl TableSizes {
    /// Whether one base-3 digit per move overflows a `u32`.
    fn phase1_wide(&self) -> bool {
        3_u64
            .checked_pow(self.phase1_moves as u32)
            .is_none_or(|cells| cells > 1 << 32)
    }
}

/// Each cell packs one base-3 digit per move: 0 if the move lowers the
/// distance to the phase-2 subgroup, 1 if it keeps it, 2 if it raises it.
enum Phase1Cells {
    Narrow(Box<[u32]>),
    Wide(Box<[u64]>),
}

pub struct PruningTables {
    phase1: Phase1Cells,
    phase1_moves: usize,
    phase2: Box<[u8]>,
    precheck: Box<[u8]>,
}

/// A product of a symmetry-reduced coordinate and a secondary coordinate
/// that is conjugated along with it.
trait SweepSpace: Sync {
    fn classes(&self) -> usize;
    fn secondaries(&self) -> usize;
    fn costs(&self) -> &[u8];
    /// The canonical cell reached by playing `mv` on the class
    /// representative.
    fn step(&self, class: usize, secondary: u16, mv: usize) -> (usize, u16);
    fn stabilizer(&self, class: usize) -> u16;
    fn conj_secondary(&self, secondary: u16, k: usize) -> u16;
    fn goal(&self) -> (usize, u16);
}

struct Phase1Space<'a> {
    coords: &'a CoordTables,
    costs: Vec<u8>,
}

impl<'a> Phase1Space<'a> {
    fn new(coords: &'a CoordTables) -> Self {
        Phase1Space {
            coords,
            costs: vec![1; coords.moves.len()],
        }
    }
}

impl SweepSpace for Phase1Space<'_> {
    fn classes(&self) -> usize {
        self.coords.flipslice_classes.len()
    }

    fn secondaries(&self) -> usize {
        N_TWIST
    }

    fn costs(&self) -> &[u8] {
        &self.costs
    }

    fn step(&self, class: usize, twist: u16, mv: usize) -> (usize, u16) {
        let coords = self.coords;
        let rep = coords.flipslice_classes.representative(class) as usize;
        let flip = coords.flip_move.apply((rep % N_FLIP) as u16, mv);
        let slice = coords
            .slice_sorted_move
            .apply((rep / N_FLIP * N_PERM_4) as u16, mv) as usize
            / N_PERM_4;
        let (class, k) = coords
            .flipslice_classes
            .lookup((slice * N_FLIP + flip as usize) as u32);
        (
            class,
            coords.twist_conj.get(coords.twist_move.apply(twist, mv), k),
        )
    }

    fn stabilizer(&self, class: usize) -> u16 {
        self.coords.flipslice_classes.stabilizer(class)
    }

    fn conj_secondary(&self, twist: u16, k: usize) -> u16 {
        self.coords.twist_conj.get(twist, k)
    }

    fn goal(&self) -> (usize, u16) {
        let solved = &self.coords.solved;
        let (class, k) = self
            .coords
            .flipslice_classes
            .lookup(CoordTables::flipslice(solved));
        (class, self.coords.twist_conj.get(solved.twist, k))
    }
}

/// Corner classes paired with a phase-2 edge coordinate.
struct CornerSpace<'a> {
    coords: &'a CoordTables,
    secondary_move: &'a MoveTable,
    secondary_conj: &'a ConjTable,
    secondaries: usize,
    solved_secondary: u16,
    costs: Vec<u8>,
}

impl<'a> CornerSpace<'a> {
    fn new(
        coords: &'a CoordTables,
        secondary_move: &'a MoveTable,
        secondary_conj: &'a ConjTable,
        kind: CoordKind,
    ) -> Self {
        CornerSpace {
            coords,
            secondary_move,
            secondary_conj,
            secondaries: kind.size(),
            solved_secondary: kind.solved(),
            costs: coords
                .moves
                .phase2_moves()
                .iter()
                .map(|mv| mv.cost() as u8)
                .collect(),
        }
    }

    fn phase2(coords: &'a CoordTables) -> Self {
        Self::new(
            coords,
            &coords.udedges_move2,
            &coords.udedges_conj,
            CoordKind::UdEdges,
        )
    }

    fn precheck(coords: &'a CoordTables) -> Self {
        Self::new(
            coords,
            &coords.slice_perm_move2,
            &coords.slice_perm_conj,
            CoordKind::SlicePerm,
        )
    }
}

impl SweepSpace for CornerSpace<'_> {
    fn classes(&self) -> usize {
        self.coords.corner_classes.len()
    }

    fn secondaries(&self) -> usize {
        self.secondaries
    }

    fn costs(&self) -> &[u8] {
        &self.costs
    }

    fn step(&self, class: usize, secondary: u16, mv: usize) -> (usize, u16) {
        let coords = self.coords;
        let rep = coords.corner_classes.representative(class) as u16;
        let corners = coords.corners_move2.apply(rep, mv);
        let (class, k) = coords.corner_classes.lookup(u32::from(corners));
        (
            class,
            self.secondary_conj
                .get(self.secondary_move.apply(secondary, mv), k),
        )
    }

    fn stabilizer(&self, class: usize) -> u16 {
        self.coords.corner_classes.stabilizer(class)
    }

    fn conj_secondary(&self, secondary: u16, k: usize) -> u16 {
        self.secondary_conj.get(secondary, k)
    }

    fn goal(&self) -> (usize, u16) {
        let (class, k) = self
            .coords
            .corner_classes
            .lookup(u32::from(self.coords.solved.corners));
        (class, self.secondary_conj.get(self.solved_secondary, k))
    }
}

/// Lowers a cell and every cell its class stabilizer maps it to. Returns
/// how many of them were unvisited.
fn settle(
    space: &impl SweepSpace,
    dist: &mut [u8],
    class: usize,
    secondary: u16,
    distance: u8,
) -> usize {
    let stabilizer = space.stabilizer(class);
    let mut newly_visited = 0;
    for k in (0..u16::BITS as usize).filter(|k| (stabilizer >> k) & 1 == 1) {
        let cell = class * space.secondaries() + space.conj_secondary(secondary, k) as usize;
        if dist[cell] == UNVISITED {
            newly_visited += 1;
        }
        if dist[cell] > distance {
            dist[cell] = distance;
        }
    }
    newly_visited
}

fn layered_sweep(space: &impl SweepSpace, name: &str) -> Box<[u8]> {
    let secondaries = space.secondaries();
    let size = space.classes() * secondaries;
    let costs = space.costs();
    let unit_cost = costs.iter().all(|&cost| cost == 1);

    let mut dist = vec![UNVISITED; size].into_boxed_slice();
    let (class, secondary) = space.goal();
    let mut visited = settle(space, &mut dist, class, secondary, 0);
    let mut depth = 0;

    while visited < size {
        if depth == UNVISITED - 2 {
            warn!("{name} table did not close, {visited}/{size} cells reached");
            break;
        }

        // With most cells known it is cheaper to find a parent for each
        // unknown cell than to expand the frontier
        let backward = unit_cost && visited > size / 2;
        for cell in 0..size {
            let class = cell / secondaries;
            let secondary = (cell % secondaries) as u16;
            if backward {
                if dist[cell] != UNVISITED {
                    continue;
                }
                let has_parent = (0..costs.len()).any(|mv| {
                    let (class, secondary) = space.step(class, secondary, mv);
                    dist[class * secondaries + secondary as usize] == depth
                });
                if has_parent {
                    visited += settle(space, &mut dist, class, secondary, depth + 1);
                }
            } else {
                if dist[cell] != depth {
                    continue;
                }
                for (mv, &cost) in costs.iter().enumerate() {
                    let (class, secondary) = space.step(class, secondary, mv);
                    visited += settle(space, &mut dist, class, secondary, depth + cost);
                }
            }
        }

        depth += 1;
        debug!(
            working!("{} table: depth {} swept, {}/{} cells"),
            name, depth, visited, size
        );
    }

    dist
}

fn pack_phase1(space: &Phase1Space<'_>, dist: &[u8], wide: bool) -> Phase1Cells {
    let n_moves = space.costs().len();
    let pack = |cell: usize| -> u64 {
        let class = cell / N_TWIST;
        let twist = (cell % N_TWIST) as u16;
        let distance = dist[cell];
        (0..n_moves).rev().fold(0, |packed, mv| {
            let (class, twist) = space.step(class, twist, mv);
            let child = dist[class * N_TWIST + twist as usize];
            packed * 3 + u64::from(child + 1 - distance)
        })
    };

    if wide {
        Phase1Cells::Wide(
            (0..dist.len())
                .into_par_iter()
                .map(pack)
                .collect::<Vec<_>>()
                .into_boxed_slice(),
        )
    } else {
        Phase1Cells::Narrow(
            (0..dist.len())
                .into_par_iter()
                .map(|cell| pack(cell) as u32)
                .collect::<Vec<_>>()
                .into_boxed_slice(),
        )
    }
}

impl PruningTables {
    /// Generates all three tables. The phase-1 table takes by far the
    /// longest.
    #[must_use]
    pub fn generate(coords: &CoordTables) -> Self {
        info!(start!("Generating pruning tables for {}"), coords.moves.metric());
        let now = Instant::now();
        let sizes = coords.sizes();

        let (phase1, (phase2, precheck)) = rayon::join(
            || {
                let space = Phase1Space::new(coords);
                let dist = layered_sweep(&space, "phase 1");
                pack_phase1(&space, &dist, sizes.phase1_wide())
            },
            || {
                rayon::join(
                    || layered_sweep(&CornerSpace::phase2(coords), "phase 2"),
                    || layered_sweep(&CornerSpace::precheck(coords), "precheck"),
                )
            },
        );

        info!(
            success!("Pruning tables generated in {:.3}s"),
            now.elapsed().as_secs_f64()
        );
        PruningTables {
            phase1,
            phase1_moves: sizes.phase1_moves,
            phase2,
            precheck,
        }
    }

    #[inline]
    pub(crate) fn phase1_effects(&self, cell: usize, out: &mut [u8; MAX_MOVES]) {
        let mut packed = match &self.phase1 {
            Phase1Cells::Narrow(cells) => u64::from(cells[cell]),
            Phase1Cells::Wide(cells) => cells[cell],
        };
        for slot in out.iter_mut().take(self.phase1_moves) {
            *slot = (packed % 3) as u8;
            packed /= 3;
        }
    }

    /// The largest phase-2 distance, which bounds how long phase 2 can take
    /// from any phase-1 leaf.
    pub(crate) fn phase2_depth(&self) -> usize {
        self.phase2
            .par_iter()
            .chain(self.precheck.par_iter())
            .copied()
            .filter(|&distance| distance != UNVISITED)
            .max()
            .map_or(0, usize::from)
    }

    #[inline]
    pub(crate) fn phase2(&self, cell: usize) -> u8 {
        self.phase2[cell]
    }

    #[inline]
    pub(crate) fn precheck(&self, cell: usize) -> u8 {
        self.precheck[cell]
    }

    /// Writes the phase-1, phase-2 and precheck tables back to back in
    /// native byte order.
    ///
    /// # Errors
    ///
    /// Any error of the writer.
    pub fn write_to(&self, mut writer: impl Write) -> io::Result<()> {
        match &self.phase1 {
            Phase1Cells::Narrow(cells) => writer.write_all(bytemuck::cast_slice(cells))?,
            Phase1Cells::Wide(cells) => writer.write_all(bytemuck::cast_slice(cells))?,
        }
        writer.write_all(&self.phase2)?;
        writer.write_all(&self.precheck)?;
        writer.flush()
    }

    /// Reads tables written by [`PruningTables::write_to`] for the same
    /// metric.
    ///
    /// # Errors
    ///
    /// A short read, trailing data or any error of the reader.
    pub(crate) fn read_from(mut reader: impl Read, sizes: &TableSizes) -> io::Result<Self> {
        let phase1 = if sizes.phase1_wide() {
            let mut cells = vec![0_u64; sizes.phase1_cells].into_boxed_slice();
            reader.read_exact(bytemuck::cast_slice_mut(&mut cells))?;
            Phase1Cells::Wide(cells)
        } else {
            let mut cells = vec![0_u32; sizes.phase1_cells].into_boxed_slice();
            reader.read_exact(bytemuck::cast_slice_mut(&mut cells))?;
            Phase1Cells::Narrow(cells)
        };
        let mut phase2 = vec![0; sizes.phase2_cells].into_boxed_slice();
        reader.read_exact(&mut phase2)?;
        let mut precheck = vec![0; sizes.precheck_cells].into_boxed_slice();
        reader.read_exact(&mut precheck)?;

        if reader.read(&mut [0])? != 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "table file is larger than expected",
            ));
        }

        Ok(PruningTables {
            phase1,
            phase1_moves: sizes.phase1_moves,
            phase2,
            precheck,
        })
    }

    /// Any failure to read the file counts as the tables being absent.
    pub(crate) fn load(path: &Path, sizes: &TableSizes) -> Option<Self> {
        let now = Instant::now();
        let result = File::open(path)
            .and_then(|file| Self::read_from(BufReader::new(file), sizes));
        match result {
            Ok(tables) => {
                info!(
                    success!("Loaded pruning tables from {} in {:.3}s"),
                    path.display(),
                    now.elapsed().as_secs_f64()
                );
                Some(tables)
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("No pruning tables at {}", path.display());
                None
            }
            Err(e) => {
                warn!("Ignoring pruning tables at {}: {e}", path.display());
                None
            }
        }
    }

    /// # Errors
    ///
    /// Failing to create the directory or write the file.
    pub(crate) fn save(&self, path: &Path) -> io::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        self.write_to(BufWriter::new(File::create(path)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A cycle of `len` classes with one secondary value.
    struct Cycle {
        len: usize,
        steps: Vec<usize>,
        costs: Vec<u8>,
    }

    impl SweepSpace for Cycle {
        fn classes(&self) -> usize {
            self.len
        }

        fn secondaries(&self) -> usize {
            1
        }

        fn costs(&self) -> &[u8] {
            &self.costs
        }

        fn step(&self, class: usize, secondary: u16, mv: usize) -> (usize, u16) {
            ((class + self.steps[mv]) % self.len, secondary)
        }

        fn stabilizer(&self, _: usize) -> u16 {
            1
        }

        fn conj_secondary(&self, secondary: u16, _: usize) -> u16 {
            secondary
        }

        fn goal(&self) -> (usize, u16) {
            (0, 0)
        }
    }

    /// Two classes of two cells each, where a symmetry swaps the cells.
    struct Swapped;

    impl SweepSpace for Swapped {
        fn classes(&self) -> usize {
            2
        }

        fn secondaries(&self) -> usize {
            2
        }

        fn costs(&self) -> &[u8] {
            &[1]
        }

        fn step(&self, class: usize, secondary: u16, _: usize) -> (usize, u16) {
            (1 - class, secondary)
        }

        fn stabilizer(&self, _: usize) -> u16 {
            0b11
        }

        fn conj_secondary(&self, secondary: u16, k: usize) -> u16 {
            if k == 0 { secondary } else { 1 - secondary }
        }

        fn goal(&self) -> (usize, u16) {
            (0, 0)
        }
    }

    #[test]
    fn unit_cost_cycle() {
        let cycle = Cycle {
            len: 10,
            steps: vec![1, 9],
            costs: vec![1, 1],
        };
        let dist = layered_sweep(&cycle, "cycle");
        assert_eq!(&*dist, [0, 1, 2, 3, 4, 5, 4, 3, 2, 1]);
    }

    #[test]
    fn double_cost_moves() {
        let cycle = Cycle {
            len: 7,
            steps: vec![1, 2],
            costs: vec![2, 1],
        };
        let dist = layered_sweep(&cycle, "cycle");
        assert_eq!(&*dist, [0, 2, 1, 3, 2, 4, 3]);
    }

    #[test]
    fn stabilizers_propagate() {
        let dist = layered_sweep(&Swapped, "swapped");
        assert_eq!(&*dist, [0, 0, 1, 1]);
    }

    #[test]
    fn blob_round_trip_and_truncation() {
        let sizes = TableSizes {
            phase1_cells: 5,
            phase1_moves: 18,
            phase2_cells: 4,
            precheck_cells: 3,
        };
        let tables = PruningTables {
            phase1: Phase1Cells::Narrow(vec![7, 8, 9, 10, 11].into_boxed_slice()),
            phase1_moves: 18,
            phase2: vec![0, 1, 2, 3].into_boxed_slice(),
            precheck: vec![4, 5, 6].into_boxed_slice(),
        };
        let mut blob = Vec::new();
        tables.write_to(&mut blob).unwrap();
        assert_eq!(blob.len(), 5 * 4 + 4 + 3);

        let read = PruningTables::read_from(blob.as_slice(), &sizes).unwrap();
        assert_eq!(read.phase2(3), 3);
        assert_eq!(read.precheck(0), 4);

        assert!(PruningTables::read_from(&blob[..blob.len() - 1], &sizes).is_err());
        let mut longer = blob.clone();
        longer.push(0);
        assert!(PruningTables::read_from(longer.as_slice(), &sizes).is_err());

        let wide = TableSizes {
            phase1_moves: 30,
            ..sizes
        };
        assert!(wide.phase1_wide());
        assert!(!sizes.phase1_wide());
        assert!(PruningTables::read_from(blob.as_slice(), &wide).is_err());
    }

    #[test]
    fn missing_file_is_absent() {
        let sizes = TableSizes {
            phase1_cells: 1,
            phase1_moves: 18,
            phase2_cells: 1,
            precheck_cells: 1,
        };
        let path = std::env::temp_dir().join("twophase-missing-tables.bin");
        assert!(PruningTables::load(&path, &sizes).is_none());
    }
}
