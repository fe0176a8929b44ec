//! Depth-limited two-phase search over one rotated or inverted copy of the
//! cube.

use crate::{
    collector::{Solution, SolutionPool},
    coord::{CoordKind, N_PERM_4},
    cubie::CubieCube,
    moves::MoveMask,
    tables::{MAX_MOVES, Phase1Coords, Phase2Coords, Tables},
};

/// Phase-1 solutions this short are also extended when they end above the
/// lowest possible depth. Longer ones only when they are the first to reach
/// the phase-2 subgroup.
const SUBOPTIMAL_PHASE1_CUTOFF: usize = 5;

/// The cube as seen from one search direction.
#[derive(Clone, Debug)]
pub(crate) struct Direction {
    /// Index into the solver's list of direction rotations.
    pub rotation: usize,
    pub inverted: bool,
    pub root: Phase1Coords,
    pub uedges: u16,
    pub dedges: u16,
    pub lower_bound: usize,
}

impl Direction {
    pub fn new(tables: &Tables, rotation: usize, inverted: bool, cube: &CubieCube) -> Self {
        let root = Phase1Coords::of(cube);
        Direction {
            rotation,
            inverted,
            root,
            uedges: CoordKind::UEdges.encode(cube),
            dedges: CoordKind::DEdges.encode(cube),
            lower_bound: tables.phase1_distance(&root) as usize,
        }
    }
}

/// A unit of work: every phase-1 path of exactly `depth` moves whose first
/// move is in `first_moves`.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Job {
    pub direction: usize,
    pub depth: usize,
    pub first_moves: MoveMask,
}

#[derive(Clone, Copy, Debug)]
struct SearchFrame {
    depth: usize,
    togo: usize,
    mask: MoveMask,
    last: Option<usize>,
}

/// Per-worker search state, reused across jobs.
pub(crate) struct DirectionSearch<'a> {
    tables: &'a Tables,
    pool: &'a SolutionPool,
    direction: usize,
    path: Vec<usize>,
    // The up and down edge coordinates after each phase-1 ply, rebuilt
    // lazily at phase-1 leaves. Entries past `valid_until` are stale.
    uedges: Vec<u16>,
    dedges: Vec<u16>,
    valid_until: usize,
}

impl<'a> DirectionSearch<'a> {
    pub fn new(tables: &'a Tables, pool: &'a SolutionPool) -> Self {
        DirectionSearch {
            tables,
            pool,
            direction: 0,
            path: Vec::new(),
            uedges: Vec::new(),
            dedges: Vec::new(),
            valid_until: 0,
        }
    }

    pub fn run(&mut self, direction: &Direction, job: &Job) {
        self.direction = job.direction;
        self.path.clear();
        self.uedges.clear();
        self.uedges.resize(job.depth + 1, 0);
        self.dedges.clear();
        self.dedges.resize(job.depth + 1, 0);
        self.uedges[0] = direction.uedges;
        self.dedges[0] = direction.dedges;
        self.valid_until = 0;

        self.phase1(
            direction.root,
            direction.lower_bound,
            SearchFrame {
                depth: 0,
                togo: job.depth,
                mask: job.first_moves,
                last: None,
            },
        );
    }

    fn phase1(&mut self, coords: Phase1Coords, distance: usize, frame: SearchFrame) {
        if self.pool.is_cancelled() || frame.depth + frame.togo > self.pool.bound() {
            return;
        }
        if frame.togo == 0 {
            self.phase1_leaf(&coords, frame);
            return;
        }

        let tables = self.tables;
        let mut effects = [0; MAX_MOVES];
        tables.phase1_effects(&coords, &mut effects);

        for mv in frame.mask.iter() {
            if self.pool.is_cancelled() {
                return;
            }
            let Some(child) = (distance + effects[mv] as usize).checked_sub(1) else {
                continue;
            };
            if child >= frame.togo
                || (child + 1 != frame.togo && child + frame.togo < SUBOPTIMAL_PHASE1_CUTOFF)
            {
                continue;
            }

            self.path.truncate(frame.depth);
            self.path.push(mv);
            self.valid_until = self.valid_until.min(frame.depth);
            self.phase1(
                tables.coords.phase1_apply(&coords, mv),
                child,
                SearchFrame {
                    depth: frame.depth + 1,
                    togo: frame.togo - 1,
                    mask: tables.moves().next_mask(frame.last, mv),
                    last: Some(mv),
                },
            );
        }
    }

    /// Tries to finish a phase-1 path of `frame.depth` moves with phase 2.
    fn phase1_leaf(&mut self, coords: &Phase1Coords, frame: SearchFrame) {
        let tables = self.tables;
        // Ending on a phase-2 move means a shorter phase-1 path reaches the
        // same coset, which was already tried
        if tables.moves().ends_in_phase2(&self.path[..frame.depth]) {
            return;
        }

        let Some(budget) = self.pool.bound().checked_sub(frame.depth) else {
            return;
        };
        let slice_perm = (coords.slice_sorted as usize % N_PERM_4) as u16;
        let precheck = tables.precheck_distance(coords.corners, slice_perm) as usize;
        if precheck > budget {
            return;
        }

        let coord_tables = &tables.coords;
        for ply in self.valid_until..frame.depth {
            let mv = self.path[ply];
            self.uedges[ply + 1] = coord_tables.uedges_move.apply(self.uedges[ply], mv);
            self.dedges[ply + 1] = coord_tables.dedges_move.apply(self.dedges[ply], mv);
        }
        self.valid_until = frame.depth;

        let udedges = coord_tables
            .merge
            .merge(self.uedges[frame.depth], self.dedges[frame.depth]);
        let start = precheck.max(tables.phase2_distance(coords.corners, udedges) as usize);
        let root = Phase2Coords {
            corners: coords.corners,
            udedges,
            slice_perm,
        };

        for togo in start..=budget {
            if frame.depth + togo > self.pool.bound() {
                break;
            }
            if self.phase2(root, togo, frame.mask, frame.last) {
                self.pool.offer(Solution {
                    moves: self.path.clone(),
                    direction: self.direction,
                });
                self.path.truncate(frame.depth);
                return;
            }
        }
    }

    /// Searches for a phase-2 continuation of exactly `togo` moves, leaving
    /// it on the path if found.
    fn phase2(
        &mut self,
        coords: Phase2Coords,
        togo: usize,
        mask: MoveMask,
        last: Option<usize>,
    ) -> bool {
        if self.pool.is_cancelled() {
            return false;
        }
        if togo == 0 {
            return coords == self.tables.coords.solved2;
        }

        let tables = self.tables;
        for (mv, phase2_move) in tables.moves().phase2_moves().iter().enumerate() {
            if self.pool.is_cancelled() {
                return false;
            }
            let cost = phase2_move.cost();
            if cost > togo {
                continue;
            }
            let Some((next_mask, next_last)) = tables.moves().phase2_step(mask, last, phase2_move)
            else {
                continue;
            };

            let child = tables.coords.phase2_apply(&coords, mv);
            let bound = tables
                .phase2_distance(child.corners, child.udedges)
                .max(tables.precheck_distance(child.corners, child.slice_perm));
            if bound as usize > togo - cost {
                continue;
            }

            let len = self.path.len();
            self.path.extend_from_slice(phase2_move.expansion());
            if self.phase2(child, togo - cost, next_mask, Some(next_last)) {
                return true;
            }
            self.path.truncate(len);
        }
        false
    }
}
