use std::{
    sync::LazyLock,
    time::{Duration, Instant},
};

use itertools::Itertools;
use log::info;
use twophase::{
    CubieCube, InvalidCubeError, SolveError, SolveStatus, Solver, SolverConfig, TableCache,
};

static SOLVER: LazyLock<Solver> = LazyLock::new(|| {
    Solver::new(SolverConfig {
        table_cache: TableCache::Disabled,
        ..SolverConfig::default()
    })
    .unwrap()
});

fn scramble(text: &str) -> CubieCube {
    let moves = SOLVER.moves();
    moves.apply(&CubieCube::SOLVED, &moves.parse(text).unwrap())
}

fn assert_solves(cube: &CubieCube, solution: &[usize]) {
    assert_eq!(
        SOLVER.moves().apply(cube, solution),
        CubieCube::SOLVED,
        "{} does not solve the cube",
        SOLVER.moves().format(solution)
    );
}

#[test_log::test]
fn test_solved_cube() {
    let report = SOLVER.solve(&CubieCube::SOLVED, 20, None, 1).unwrap();
    assert_eq!(report.status, SolveStatus::Found);
    assert_eq!(report.solutions.len(), 1);
    assert!(report.solutions[0].is_empty());
}

#[test_log::test]
fn test_single_move() {
    let moves = SOLVER.moves();
    for (mv, inverse) in [("R", "R'"), ("U2", "U2"), ("F'", "F"), ("B", "B'")] {
        let report = SOLVER.solve(&scramble(mv), 1, None, 1).unwrap();
        assert_eq!(report.status, SolveStatus::Found);
        assert_eq!(report.solutions[0].moves(), moves.parse(inverse).unwrap());
    }
}

#[test_log::test]
fn test_short_scramble_has_no_shorter_solution() {
    let cube = scramble("R U F");
    assert_eq!(
        SOLVER.solve(&cube, 2, None, 1),
        Err(SolveError::NoSolutionWithinBound { max_length: 2 })
    );

    let report = SOLVER.solve(&cube, 3, None, 1).unwrap();
    let best = report.best().unwrap();
    assert_eq!(best.len(), 3);
    assert_solves(&cube, best.moves());
}

#[test_log::test]
fn test_random_cubes() {
    let mut rng = fastrand::Rng::with_seed(7);
    for _ in 0..5 {
        let cube = CubieCube::random(&mut rng);
        let start = Instant::now();
        let report = SOLVER.solve(&cube, 24, None, 1).unwrap();
        let best = report.best().unwrap();
        info!(
            "Solved in {:.3}s: {}",
            start.elapsed().as_secs_f64(),
            SOLVER.moves().format(best.moves())
        );

        assert_eq!(report.status, SolveStatus::Found);
        assert!(best.len() <= 24);
        assert_solves(&cube, best.moves());
    }
}

#[test_log::test]
fn test_multiple_solutions() {
    let mut rng = fastrand::Rng::with_seed(11);
    let cube = CubieCube::random(&mut rng);
    let lower_bound = SOLVER.phase1_lower_bound(&cube).unwrap();

    let report = SOLVER.solve(&cube, 25, None, 3).unwrap();
    assert_eq!(report.status, SolveStatus::Found);
    assert_eq!(report.solutions.len(), 3);
    assert!(
        report
            .solutions
            .iter()
            .tuple_windows()
            .all(|(a, b)| a.len() < b.len())
    );
    for solution in &report.solutions {
        assert!(solution.len() >= lower_bound);
        assert!(solution.len() <= 25);
        assert_solves(&cube, solution.moves());
    }
}

#[test_log::test]
fn test_zero_time_limit() {
    let cube = CubieCube::random(&mut fastrand::Rng::with_seed(3));
    let start = Instant::now();
    let report = SOLVER
        .solve(&cube, 20, Some(Duration::ZERO), 1)
        .unwrap();
    assert!(start.elapsed() < Duration::from_secs(5));
    assert!(matches!(
        report.status,
        SolveStatus::TimedOut | SolveStatus::Found
    ));
    for solution in &report.solutions {
        assert_solves(&cube, solution.moves());
    }
}

#[test_log::test]
fn test_time_limit_keeps_improving() {
    let mut rng = fastrand::Rng::with_seed(7);
    let cube = (0..3).map(|_| CubieCube::random(&mut rng)).last().unwrap();

    let first = SOLVER.solve(&cube, 30, None, 1).unwrap();
    let first = first.best().unwrap();
    assert_solves(&cube, first.moves());

    // Far below any reachable length, so the solve runs until the deadline
    let report = SOLVER
        .solve(&cube, 10, Some(Duration::from_secs(2)), 1)
        .unwrap();
    assert_eq!(report.status, SolveStatus::TimedOut);
    let best = report.best().unwrap();
    info!("First {} moves, best after 2s {}", first.len(), best.len());
    assert!(best.len() <= first.len());
    assert!(best.len() <= 20);
    assert_solves(&cube, best.moves());
}

#[test_log::test]
fn test_unreachable_target_reports_longer_solutions() {
    let cube = scramble("R U F");
    let error = SOLVER
        .solve(&cube, 2, Some(Duration::from_secs(30)), 1)
        .unwrap_err();
    assert_eq!(error, SolveError::NoSolutionWithinBound { max_length: 2 });

    let cube = CubieCube::random(&mut fastrand::Rng::with_seed(13));
    let report = SOLVER
        .solve(&cube, 5, Some(Duration::from_millis(500)), 1)
        .unwrap();
    assert_eq!(report.status, SolveStatus::TimedOut);
    let best = report.best().unwrap();
    assert!(best.len() > 5);
    assert_solves(&cube, best.moves());
}

#[test_log::test]
fn test_invalid_cube() {
    let mut cube = CubieCube::SOLVED;
    cube.co[0] = 1;
    assert_eq!(
        SOLVER.solve(&cube, 20, None, 1),
        Err(SolveError::InvalidState(InvalidCubeError::TwistParity))
    );
    assert!(SOLVER.phase1_lower_bound(&cube).is_err());
}

#[test_log::test]
fn test_phase1_bound_is_consistent() {
    let moves = SOLVER.moves();
    let mut rng = fastrand::Rng::with_seed(5);
    for _ in 0..50 {
        let cube = CubieCube::random(&mut rng);
        let distance = SOLVER.phase1_lower_bound(&cube).unwrap();
        assert!(distance <= 12);

        let children = moves
            .moves()
            .iter()
            .map(|mv| SOLVER.phase1_lower_bound(&cube.multiply(mv.cube())).unwrap())
            .collect_vec();
        assert!(children.iter().all(|&child| child.abs_diff(distance) <= 1));
        if distance > 0 {
            assert!(children.contains(&(distance - 1)));
        }
    }
}

#[test_log::test]
fn test_phase2_bound_is_admissible() {
    let moves = SOLVER.moves();
    let phase2_moves = moves.phase2_moves();
    let mut rng = fastrand::Rng::with_seed(9);

    assert_eq!(SOLVER.phase2_lower_bound(&CubieCube::SOLVED), Ok(Some(0)));
    assert_eq!(SOLVER.phase2_lower_bound(&scramble("R")), Ok(None));

    for _ in 0..50 {
        let mut cube = CubieCube::SOLVED;
        for _ in 0..30 {
            cube = cube.multiply(phase2_moves[rng.usize(..phase2_moves.len())].cube());
        }
        let bound = SOLVER.phase2_lower_bound(&cube).unwrap().unwrap();
        for mv in phase2_moves {
            let child = SOLVER
                .phase2_lower_bound(&cube.multiply(mv.cube()))
                .unwrap()
                .unwrap();
            assert!(child + mv.cost() >= bound);
        }
    }
}
