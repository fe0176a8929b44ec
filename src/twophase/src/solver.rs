use std::{
    sync::{Mutex, PoisonError},
    thread,
    time::{Duration, Instant},
};

use log::{debug, info, warn};
use thiserror::Error;

use crate::{
    collector::{Solution, SolutionPool, SolveStatus},
    config::SolverConfig,
    coord::CoordKind,
    cubie::{CubieCube, InvalidCubeError},
    moves::{MoveMask, MoveSet},
    pruning::PruningTables,
    search::{Direction, DirectionSearch, Job},
    start, success,
    sym::{ConjMoveTable, SymmetryError},
    tables::{CoordTables, Phase1Coords, Tables, TablesError},
};

#[derive(Error, Debug)]
pub enum SolverError {
    #[error(transparent)]
    Tables(#[from] TablesError),
    #[error(transparent)]
    Symmetry(#[from] SymmetryError),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SolveError {
    #[error("Invalid cube: {0}")]
    InvalidState(#[from] InvalidCubeError),
    #[error("No solution of at most {max_length} moves exists")]
    NoSolutionWithinBound { max_length: usize },
}

/// The outcome of a solve that produced at least one solution or ran out of
/// time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SolveReport {
    /// Solutions of strictly increasing length.
    pub solutions: Vec<Solution>,
    pub status: SolveStatus,
}

impl SolveReport {
    #[must_use]
    pub fn best(&self) -> Option<&Solution> {
        self.solutions.first()
    }
}

/// Hands out search jobs in order of increasing depth across directions.
struct Scheduler {
    // Next depth and split of each direction
    cursors: Vec<(usize, usize)>,
    n_splits: usize,
    n_moves: usize,
    running: usize,
}

impl Scheduler {
    fn new(directions: &[Direction], n_splits: usize, n_moves: usize) -> Self {
        Scheduler {
            cursors: directions.iter().map(|dir| (dir.lower_bound, 0)).collect(),
            n_splits: n_splits.min(n_moves).max(1),
            n_moves,
            running: 0,
        }
    }

    fn claim(&mut self, bound: usize) -> Option<Job> {
        let (direction, cursor) = self
            .cursors
            .iter_mut()
            .enumerate()
            .filter(|(_, (depth, _))| *depth <= bound)
            .min_by_key(|(_, (depth, _))| *depth)?;
        let (depth, split) = *cursor;

        let splits = if depth == 0 { 1 } else { self.n_splits };
        let first_moves = if splits == 1 {
            MoveMask::full(self.n_moves)
        } else {
            MoveMask::range(split * self.n_moves / splits..(split + 1) * self.n_moves / splits)
        };
        *cursor = if split + 1 == splits {
            (depth + 1, 0)
        } else {
            (depth, split + 1)
        };

        self.running += 1;
        Some(Job {
            direction,
            depth,
            first_moves,
        })
    }
}

/// A two-phase solver for one metric, owning its tables.
pub struct Solver {
    config: SolverConfig,
    tables: Tables,
    rotations: Vec<usize>,
    phase2_depth: usize,
    // Maps moves found on a rotated cube back to the original frame
    unrotate: ConjMoveTable,
}

impl Solver {
    /// Builds the solver's tables, loading the pruning tables from the
    /// configured cache when possible and saving them there otherwise.
    ///
    /// # Errors
    ///
    /// Fails if the configured metric is not closed under inversion or
    /// under its symmetries.
    pub fn new(config: SolverConfig) -> Result<Self, SolverError> {
        let metric = config.metric;
        info!(start!("Setting up a solver for {}"), metric);

        let coords = CoordTables::new(metric)?;
        let sizes = coords.sizes();
        let cache = config.table_cache.path(metric);

        let cached = cache
            .as_deref()
            .and_then(|path| PruningTables::load(path, &sizes));
        let pruning = match cached {
            Some(pruning) => pruning,
            None => {
                let pruning = PruningTables::generate(&coords);
                if let Some(path) = &cache {
                    match pruning.save(path) {
                        Ok(()) => info!("Saved pruning tables to {}", path.display()),
                        Err(e) => warn!(
                            "Could not save pruning tables to {}: {e}",
                            path.display()
                        ),
                    }
                }
                pruning
            }
        };

        let phase2_depth = pruning.phase2_depth();
        debug!("Phase 2 never needs more than {phase2_depth} moves");

        let symmetries = coords.symmetries();
        let rotations = symmetries.direction_rotations(metric);
        let inverses: Vec<_> = rotations
            .iter()
            .map(|&rot| symmetries.inverse(rot))
            .collect();
        let unrotate = ConjMoveTable::new(symmetries, coords.moves(), &inverses)?;

        info!(success!("Solver ready with {} search directions"), rotations.len() * 2);
        Ok(Solver {
            config,
            tables: Tables::new(coords, pruning),
            rotations,
            phase2_depth,
            unrotate,
        })
    }

    #[must_use]
    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    #[must_use]
    pub fn moves(&self) -> &MoveSet {
        self.tables.moves()
    }

    #[must_use]
    pub fn tables(&self) -> &Tables {
        &self.tables
    }

    /// The exact number of moves needed to bring `cube` into the phase-2
    /// subgroup, which no solution can undercut.
    ///
    /// # Errors
    ///
    /// Fails if `cube` is not a reachable state.
    pub fn phase1_lower_bound(&self, cube: &CubieCube) -> Result<usize, InvalidCubeError> {
        cube.verify()?;
        Ok(self.tables.phase1_distance(&Phase1Coords::of(cube)) as usize)
    }

    /// A lower bound on the phase-2 moves needed to solve `cube`, or `None`
    /// if it is not in the phase-2 subgroup.
    ///
    /// # Errors
    ///
    /// Fails if `cube` is not a reachable state.
    pub fn phase2_lower_bound(&self, cube: &CubieCube) -> Result<Option<usize>, InvalidCubeError> {
        cube.verify()?;
        let coords = &self.tables.coords;
        if !coords.is_phase1_goal(&Phase1Coords::of(cube)) {
            return Ok(None);
        }
        let corners = CoordKind::Corners.encode(cube);
        let phase2 = self
            .tables
            .phase2_distance(corners, CoordKind::UdEdges.encode(cube));
        let precheck = self
            .tables
            .precheck_distance(corners, CoordKind::SlicePerm.encode(cube));
        Ok(Some(phase2.max(precheck) as usize))
    }

    /// Searches for `solution_count` solutions of distinct lengths, each at
    /// most `max_length` moves, giving up after `time_limit`.
    ///
    /// Longer solutions met along the way are kept until shorter ones replace
    /// them, so a solve that times out reports the best it found even when
    /// that is above `max_length`.
    ///
    /// # Errors
    ///
    /// Fails if `cube` is not a reachable state, or if the search ran out
    /// without finding any solution of at most `max_length` moves.
    pub fn solve(
        &self,
        cube: &CubieCube,
        max_length: usize,
        time_limit: Option<Duration>,
        solution_count: usize,
    ) -> Result<SolveReport, SolveError> {
        cube.verify()?;
        let deadline = time_limit.map(|limit| Instant::now() + limit);

        let directions = self.directions(cube);
        debug!(
            "Phase-1 lower bounds by direction: {:?}",
            directions.iter().map(|dir| dir.lower_bound).collect::<Vec<_>>()
        );

        // Phase 2 finishes any minimal phase-1 path within this
        let ceiling = directions
            .iter()
            .map(|dir| dir.lower_bound)
            .max()
            .unwrap_or(0)
            + self.phase2_depth;
        let pool = SolutionPool::new(solution_count, max_length, ceiling);
        let scheduler = Mutex::new(Scheduler::new(
            &directions,
            self.config.splits(),
            self.moves().len(),
        ));

        let status = thread::scope(|scope| {
            for _ in 0..self.config.worker_threads() {
                scope.spawn(|| self.worker(&directions, &scheduler, &pool));
            }
            pool.wait(deadline)
        });

        let solutions: Vec<_> = pool
            .into_solutions()
            .into_iter()
            .map(|solution| self.unrotate(&directions, solution))
            .collect();
        info!(
            "Solve ended ({status:?}) with {} solutions",
            solutions.len()
        );

        if status == SolveStatus::Exhausted
            && solutions.iter().all(|solution| solution.len() > max_length)
        {
            return Err(SolveError::NoSolutionWithinBound { max_length });
        }
        Ok(SolveReport { solutions, status })
    }

    /// The cube conjugated by each direction rotation, as is and inverted.
    fn directions(&self, cube: &CubieCube) -> Vec<Direction> {
        let symmetries = self.tables.coords.symmetries();
        let mut directions = Vec::with_capacity(self.rotations.len() * 2);
        for (rotation, &sym) in self.rotations.iter().enumerate() {
            let rotated = symmetries.conjugate(cube, sym);
            directions.push(Direction::new(&self.tables, rotation, false, &rotated));
            directions.push(Direction::new(
                &self.tables,
                rotation,
                true,
                &rotated.inverse(),
            ));
        }
        directions
    }

    fn worker(&self, directions: &[Direction], scheduler: &Mutex<Scheduler>, pool: &SolutionPool) {
        let mut search = DirectionSearch::new(&self.tables, pool);
        loop {
            if pool.is_cancelled() {
                return;
            }
            let job = {
                let mut scheduler = scheduler.lock().unwrap_or_else(PoisonError::into_inner);
                match scheduler.claim(pool.bound()) {
                    Some(job) => job,
                    None => {
                        if scheduler.running == 0 {
                            pool.finish(SolveStatus::Exhausted);
                        }
                        return;
                    }
                }
            };

            debug!(
                "Searching direction {} at depth {}",
                job.direction, job.depth
            );
            search.run(&directions[job.direction], &job);
            scheduler
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .running -= 1;
        }
    }

    /// Rewrites a solution found on a transformed cube as moves on the
    /// original cube.
    fn unrotate(&self, directions: &[Direction], solution: Solution) -> Solution {
        let direction = &directions[solution.direction];
        let moves = self.moves();
        let mut sequence = solution.moves;
        if direction.inverted {
            sequence.reverse();
            for mv in &mut sequence {
                *mv = moves.inverse(*mv);
            }
        }
        for mv in &mut sequence {
            *mv = self.unrotate.get(*mv, direction.rotation);
        }
        Solution {
            moves: sequence,
            direction: solution.direction,
        }
    }
}
