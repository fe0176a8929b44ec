use std::{sync::LazyLock, time::Duration};

use log::info;
use twophase::{CubieCube, Face, Metric, SolveStatus, Solver, SolverConfig, TableCache};

fn solver(metric: Metric) -> Solver {
    Solver::new(SolverConfig {
        metric,
        table_cache: TableCache::Disabled,
        ..SolverConfig::default()
    })
    .unwrap()
}

static QTM: LazyLock<Solver> = LazyLock::new(|| {
    solver(Metric {
        quarter_turn: true,
        ..Metric::default()
    })
});

static FIVE_FACE: LazyLock<Solver> = LazyLock::new(|| {
    solver(Metric {
        five_face: true,
        ..Metric::default()
    })
});

static FIVE_FACE_AXIAL: LazyLock<Solver> = LazyLock::new(|| {
    solver(Metric {
        axial: true,
        five_face: true,
        ..Metric::default()
    })
});

/// Solves `scramble` and checks every returned solution against it.
fn solve(solver: &Solver, scramble: &str, max_length: usize, count: usize) -> Vec<Vec<usize>> {
    let moves = solver.moves();
    let cube = moves.apply(&CubieCube::SOLVED, &moves.parse(scramble).unwrap());
    let report = solver
        .solve(&cube, max_length, Some(Duration::from_secs(60)), count)
        .unwrap();
    assert_eq!(report.status, SolveStatus::Found);

    report
        .solutions
        .iter()
        .map(|solution| {
            info!("{scramble}: {}", moves.format(solution.moves()));
            assert_eq!(moves.apply(&cube, solution.moves()), CubieCube::SOLVED);
            solution.moves().to_vec()
        })
        .collect()
}

fn avoids_b(solver: &Solver, solution: &[usize]) -> bool {
    let moves = solver.moves().moves();
    solution
        .iter()
        .all(|&mv| moves[mv].turns(Face::B) == 0)
}

#[test_log::test]
fn test_quarter_turn_metric() {
    let moves = QTM.moves();
    let parse = |text: &str| moves.parse(text).unwrap();

    assert_eq!(solve(&QTM, "R", 1, 1)[0], parse("R'"));
    assert_eq!(solve(&QTM, "R2", 2, 1)[0], parse("R R"));
    assert_eq!(solve(&QTM, "R U F", 3, 1)[0], parse("F' U' R'"));

    let solutions = solve(&QTM, "R U2 F' L D B2", 30, 1);
    assert!(solutions[0].len() <= 30);
}

#[test_log::test]
#[ignore = "builds 5-face tables, several GB"]
fn test_five_face_metric() {
    let moves = FIVE_FACE.moves();
    assert!(moves.parse("B").is_err());

    for scramble in ["R U F", "R U2 F' L D R2", "F L' D2 R U' L2 F'"] {
        for solution in solve(&FIVE_FACE, scramble, 24, 2) {
            assert!(avoids_b(&FIVE_FACE, &solution));
        }
    }
}

#[test_log::test]
#[ignore = "builds 5-face axial tables with 64-bit phase-1 cells, several GB"]
fn test_five_face_axial_metric() {
    let moves = FIVE_FACE_AXIAL.moves();
    assert_eq!(
        solve(&FIVE_FACE_AXIAL, "(U D')", 1, 1)[0],
        moves.parse("(U' D)").unwrap()
    );

    let solutions = solve(&FIVE_FACE_AXIAL, "R U2 F' L D R2", 20, 2);
    assert_eq!(solutions.len(), 2);
    assert!(solutions.iter().all(|solution| avoids_b(&FIVE_FACE_AXIAL, solution)));
}
