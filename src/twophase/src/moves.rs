use std::{fmt::Display, ops::Range, str::FromStr};

use bitflags::bitflags;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::cubie::CubieCube;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Face {
    U,
    R,
    F,
    D,
    L,
    B,
}

impl Face {
    pub const ALL: [Self; 6] = {
        use Face::*;
        let v = [U, R, F, D, L, B];

        let mut i = 0;
        while i < v.len() {
            assert!(i == v[i] as usize);
            i += 1;
        }

        v
    };

    #[must_use]
    pub fn opposite(self) -> Self {
        Self::ALL[(self as usize + 3) % 6]
    }

    /// U, R and F come first when two parallel faces are turned in a row.
    #[must_use]
    pub fn leads_axis(self) -> bool {
        (self as usize) < 3
    }

    #[must_use]
    pub fn quarter_turn(self) -> &'static CubieCube {
        &CubieCube::FACE_TURNS[self as usize]
    }
}

impl FromStr for Face {
    type Err = ParseMoveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "U" => Ok(Face::U),
            "R" => Ok(Face::R),
            "F" => Ok(Face::F),
            "D" => Ok(Face::D),
            "L" => Ok(Face::L),
            "B" => Ok(Face::B),
            _ => Err(ParseMoveError::UnknownFace(s.to_string())),
        }
    }
}

impl Display for Face {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self:?}")
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct FaceSet: u8 {
        const U = 1 << 0;
        const R = 1 << 1;
        const F = 1 << 2;
        const D = 1 << 3;
        const L = 1 << 4;
        const B = 1 << 5;
    }
}

impl From<Face> for FaceSet {
    fn from(face: Face) -> Self {
        FaceSet::from_bits_retain(1 << face as u8)
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseMoveError {
    #[error("Unknown face `{0}`")]
    UnknownFace(String),
    #[error("`{0}` is not a move of this metric")]
    UnknownMove(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MoveSetError {
    #[error("The inverse of `{0}` is not in the move set")]
    MissingInverse(String),
}

/// Which moves exist and what they cost. Fixed once the tables are built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Metric {
    /// Half turns are two quarter turns.
    pub quarter_turn: bool,
    /// Simultaneous quarter turns of two parallel faces are one move.
    pub axial: bool,
    /// The B face is never turned.
    pub five_face: bool,
}

impl Metric {
    #[must_use]
    pub fn faces(self) -> impl Iterator<Item = Face> {
        Face::ALL
            .into_iter()
            .filter(move |&face| !(self.five_face && face == Face::B))
    }

    /// Short name used for table cache files.
    #[must_use]
    pub fn tag(self) -> String {
        let mut tag = String::from(if self.quarter_turn { "qtm" } else { "htm" });
        if self.axial {
            tag.push_str("-axial");
        }
        if self.five_face {
            tag.push_str("-5face");
        }
        tag
    }
}

impl Display for Metric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.tag())
    }
}

/// Metrics a finished move sequence can be scored in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LengthMetric {
    /// Any turn of one face counts once.
    Htm,
    /// Every quarter turn counts once.
    Qtm,
    /// Any turn of one face or of two parallel faces together counts once.
    Atm,
}

/// A set of move indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct MoveMask(u64);

impl MoveMask {
    pub const EMPTY: Self = MoveMask(0);

    #[must_use]
    pub fn full(n_moves: usize) -> Self {
        Self::range(0..n_moves)
    }

    #[must_use]
    pub fn range(range: Range<usize>) -> Self {
        debug_assert!(range.end <= 64);
        let below = |n: usize| if n >= 64 { u64::MAX } else { (1 << n) - 1 };
        MoveMask(below(range.end) & !below(range.start))
    }

    #[inline]
    #[must_use]
    pub fn contains(self, mv: usize) -> bool {
        (self.0 >> mv) & 1 == 1
    }

    pub fn insert(&mut self, mv: usize) {
        self.0 |= 1 << mv;
    }

    pub fn remove(&mut self, mv: usize) {
        self.0 &= !(1 << mv);
    }

    #[inline]
    #[must_use]
    pub fn intersect(self, other: Self) -> Self {
        MoveMask(self.0 & other.0)
    }

    #[must_use]
    pub fn len(self) -> usize {
        self.0.count_ones() as usize
    }

    #[must_use]
    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn iter(self) -> impl Iterator<Item = usize> {
        let mut bits = self.0;
        std::iter::from_fn(move || {
            if bits == 0 {
                return None;
            }
            let mv = bits.trailing_zeros() as usize;
            bits &= bits - 1;
            Some(mv)
        })
    }
}

#[derive(Debug, Clone)]
pub struct Move {
    name: String,
    /// Clockwise quarter turns of each face, in `Face` order.
    turns: [u8; 6],
    single_face: Option<Face>,
    cube: CubieCube,
}

impl Move {
    fn new(turns: [u8; 6]) -> Self {
        let mut cube = CubieCube::SOLVED;
        for face in Face::ALL {
            for _ in 0..turns[face as usize] {
                cube = cube.multiply(face.quarter_turn());
            }
        }
        Move {
            name: turn_name(&turns),
            turns,
            single_face: single_face_of(&turns),
            cube,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn cube(&self) -> &CubieCube {
        &self.cube
    }

    #[must_use]
    pub fn turns(&self, face: Face) -> u8 {
        self.turns[face as usize]
    }

    #[must_use]
    pub fn faces(&self) -> FaceSet {
        Face::ALL
            .into_iter()
            .filter(|&face| self.turns(face) != 0)
            .map(FaceSet::from)
            .collect()
    }

    #[must_use]
    pub fn single_face(&self) -> Option<Face> {
        self.single_face
    }

    #[must_use]
    pub fn is_axial(&self) -> bool {
        self.faces().bits().count_ones() == 2
    }

    /// Whether the move maps the phase-2 subgroup onto itself.
    #[must_use]
    pub fn keeps_phase2(&self) -> bool {
        [Face::R, Face::F, Face::L, Face::B]
            .into_iter()
            .all(|face| self.turns(face) % 2 == 0)
    }

    #[must_use]
    pub fn cost(&self, metric: LengthMetric) -> usize {
        turns_cost(&self.turns, metric)
    }
}

fn turns_cost(turns: &[u8; 6], metric: LengthMetric) -> usize {
    match metric {
        LengthMetric::Htm => turns.iter().filter(|&&t| t != 0).count(),
        LengthMetric::Qtm => turns
            .iter()
            .map(|&t| match t {
                0 => 0,
                2 => 2,
                _ => 1,
            })
            .sum(),
        LengthMetric::Atm => usize::from(turns.iter().any(|&t| t != 0)),
    }
}

fn turn_name(turns: &[u8; 6]) -> String {
    let atoms = Face::ALL
        .into_iter()
        .filter(|&face| turns[face as usize] != 0)
        .map(|face| match turns[face as usize] {
            1 => face.to_string(),
            2 => format!("{face}2"),
            _ => format!("{face}'"),
        })
        .collect_vec();
    if atoms.len() == 1 {
        atoms.into_iter().collect()
    } else {
        format!("({})", atoms.iter().join(" "))
    }
}

/// One step of phase 2, written out as one or two metric moves.
#[derive(Debug, Clone)]
pub struct Phase2Move {
    expansion: Vec<usize>,
    cube: CubieCube,
}

impl Phase2Move {
    #[must_use]
    pub fn expansion(&self) -> &[usize] {
        &self.expansion
    }

    #[must_use]
    pub fn cost(&self) -> usize {
        self.expansion.len()
    }

    #[must_use]
    pub fn cube(&self) -> &CubieCube {
        &self.cube
    }
}

/// The moves of one metric together with their pruning rules.
pub struct MoveSet {
    metric: Metric,
    moves: Vec<Move>,
    inverse: Vec<usize>,
    successors: Vec<MoveMask>,
    phase2: Vec<Phase2Move>,
    // Moves that form a phase-2 move when played twice in a row
    phase2_doubles: MoveMask,
}

impl MoveSet {
    /// Enumerates the moves of `metric` and derives the adjacency rules.
    ///
    /// # Errors
    ///
    /// Fails if the move set is not closed under inversion.
    pub fn new(metric: Metric) -> Result<Self, MoveSetError> {
        let powers: &[u8] = if metric.quarter_turn { &[1, 3] } else { &[1, 2, 3] };
        let mut moves = Vec::new();
        for face in metric.faces() {
            for &power in powers {
                let mut turns = [0; 6];
                turns[face as usize] = power;
                moves.push(Move::new(turns));
            }
        }
        if metric.axial {
            for face in metric.faces().filter(|face| face.leads_axis()) {
                if metric.five_face && face.opposite() == Face::B {
                    continue;
                }
                for (a, b) in [1, 3].into_iter().cartesian_product([1, 3]) {
                    let mut turns = [0; 6];
                    turns[face as usize] = a;
                    turns[face.opposite() as usize] = b;
                    moves.push(Move::new(turns));
                }
            }
        }
        assert!(moves.len() <= 64);

        let inverse = moves
            .iter()
            .map(|mv| {
                let target = mv.cube.inverse();
                moves
                    .iter()
                    .position(|other| other.cube == target)
                    .ok_or_else(|| MoveSetError::MissingInverse(mv.name.clone()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let successors = moves
            .iter()
            .map(|prev| {
                let mut mask = MoveMask::EMPTY;
                for (i, next) in moves.iter().enumerate() {
                    if may_follow(metric, prev, next) {
                        mask.insert(i);
                    }
                }
                mask
            })
            .collect();

        let mut phase2 = moves
            .iter()
            .enumerate()
            .filter(|(_, mv)| mv.keeps_phase2())
            .map(|(i, mv)| Phase2Move {
                expansion: vec![i],
                cube: mv.cube,
            })
            .collect_vec();
        if metric.quarter_turn {
            // Half turns of the side faces are only reachable as two quarter turns
            for (i, mv) in moves.iter().enumerate() {
                if let Some(face) = mv.single_face()
                    && !matches!(face, Face::U | Face::D)
                    && mv.turns(face) == 1
                {
                    phase2.push(Phase2Move {
                        expansion: vec![i, i],
                        cube: mv.cube.multiply(&mv.cube),
                    });
                }
            }
        }

        let mut phase2_doubles = MoveMask::EMPTY;
        for mv in phase2.iter().filter(|mv| mv.cost() == 2) {
            phase2_doubles.insert(mv.expansion[0]);
        }

        Ok(MoveSet {
            metric,
            moves,
            inverse,
            successors,
            phase2,
            phase2_doubles,
        })
    }

    #[must_use]
    pub fn metric(&self) -> Metric {
        self.metric
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.moves.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.moves.is_empty()
    }

    #[must_use]
    pub fn moves(&self) -> &[Move] {
        &self.moves
    }

    #[must_use]
    pub fn cubes(&self) -> Vec<CubieCube> {
        self.moves.iter().map(|mv| mv.cube).collect()
    }

    #[must_use]
    pub fn inverse(&self, mv: usize) -> usize {
        self.inverse[mv]
    }

    #[must_use]
    pub fn all(&self) -> MoveMask {
        MoveMask::full(self.moves.len())
    }

    #[must_use]
    pub fn successors(&self, mv: usize) -> MoveMask {
        self.successors[mv]
    }

    /// The moves allowed after `last` and then `mv` were played.
    #[inline]
    #[must_use]
    pub fn next_mask(&self, last: Option<usize>, mv: usize) -> MoveMask {
        let mut mask = self.successors[mv];
        if self.metric.quarter_turn
            && let Some(last) = last
            && let Some(face) = self.moves[mv].single_face()
            && self.moves[mv].turns(face) == 1
            && self.moves[last].turns(face) == 1
        {
            // A third clockwise quarter turn is the counter-clockwise move
            mask.remove(mv);
        }
        mask
    }

    #[must_use]
    pub fn phase2_moves(&self) -> &[Phase2Move] {
        &self.phase2
    }

    /// Plays a phase-2 move after a history ending in `last` with `mask`
    /// allowed, returning the new mask and last move if every step of the
    /// expansion is allowed.
    #[inline]
    #[must_use]
    pub fn phase2_step(
        &self,
        mut mask: MoveMask,
        mut last: Option<usize>,
        mv: &Phase2Move,
    ) -> Option<(MoveMask, usize)> {
        for &step in &mv.expansion {
            if !mask.contains(step) {
                return None;
            }
            mask = self.next_mask(last, step);
            last = Some(step);
        }
        last.map(|last| (mask, last))
    }

    #[must_use]
    pub fn keeps_phase2(&self, mv: usize) -> bool {
        self.moves[mv].keeps_phase2()
    }

    /// Whether `path` ends in a move, or a doubled quarter turn, that keeps
    /// the phase-2 subgroup. Dropping that tail gives a shorter path to the
    /// same coset.
    #[inline]
    #[must_use]
    pub fn ends_in_phase2(&self, path: &[usize]) -> bool {
        match path {
            [.., last] if self.keeps_phase2(*last) => true,
            [.., a, b] => a == b && self.phase2_doubles.contains(*b),
            _ => false,
        }
    }

    #[must_use]
    pub fn find(&self, cube: &CubieCube) -> Option<usize> {
        self.moves.iter().position(|mv| mv.cube == *cube)
    }

    #[must_use]
    pub fn apply(&self, cube: &CubieCube, sequence: &[usize]) -> CubieCube {
        sequence
            .iter()
            .fold(*cube, |cube, &mv| cube.multiply(&self.moves[mv].cube))
    }

    /// Parses space separated moves. Half turns are split into two quarter
    /// turns when the metric has none.
    ///
    /// # Errors
    ///
    /// Any token that names no move of this metric.
    pub fn parse(&self, text: &str) -> Result<Vec<usize>, ParseMoveError> {
        let mut sequence = Vec::new();
        let mut tokens = text.split_whitespace().peekable();
        while let Some(token) = tokens.next() {
            // Axial moves are written with a space inside the parentheses
            let token = if token.starts_with('(') && !token.ends_with(')') {
                match tokens.next() {
                    Some(rest) => format!("{token} {rest}"),
                    None => return Err(ParseMoveError::UnknownMove(token.to_string())),
                }
            } else {
                token.to_string()
            };

            if let Some(i) = self.moves.iter().position(|mv| mv.name == token) {
                sequence.push(i);
                continue;
            }
            let face = token
                .strip_suffix('2')
                .ok_or_else(|| ParseMoveError::UnknownMove(token.clone()))?
                .parse::<Face>()?;
            let quarter = self
                .moves
                .iter()
                .position(|mv| mv.single_face() == Some(face) && mv.turns(face) == 1)
                .ok_or_else(|| ParseMoveError::UnknownMove(token.clone()))?;
            sequence.extend([quarter, quarter]);
        }
        Ok(sequence)
    }

    #[must_use]
    pub fn format(&self, sequence: &[usize]) -> String {
        sequence.iter().map(|&mv| &self.moves[mv].name).join(" ")
    }

    /// Merges consecutive turns of the same face. Axial moves are kept
    /// whole.
    fn canonical_turns(&self, sequence: &[usize]) -> Vec<[u8; 6]> {
        let mut out: Vec<[u8; 6]> = Vec::new();
        for &mv in sequence {
            let mv = &self.moves[mv];
            if let (Some(face), Some(prev)) = (mv.single_face(), out.last_mut())
                && single_face_of(prev) == Some(face)
            {
                prev[face as usize] = (prev[face as usize] + mv.turns(face)) % 4;
                if prev[face as usize] == 0 {
                    out.pop();
                }
                continue;
            }
            out.push(mv.turns);
        }
        out
    }

    #[must_use]
    pub fn canonical_display(&self, sequence: &[usize]) -> String {
        self.canonical_turns(sequence)
            .iter()
            .map(turn_name)
            .join(" ")
    }

    #[must_use]
    pub fn move_sequence_length(&self, sequence: &[usize], metric: LengthMetric) -> usize {
        self.canonical_turns(sequence)
            .iter()
            .map(|turns| turns_cost(turns, metric))
            .sum()
    }
}

fn single_face_of(turns: &[u8; 6]) -> Option<Face> {
    Face::ALL
        .into_iter()
        .filter(|&face| turns[face as usize] != 0)
        .exactly_one()
        .ok()
}

fn may_follow(metric: Metric, prev: &Move, next: &Move) -> bool {
    if metric.quarter_turn {
        if let Some(face) = next.single_face() {
            // Clockwise quarter turns may repeat, and either half of an
            // axial move may follow it
            let repeat = prev.turns == next.turns && next.turns(face) == 1;
            let component = prev.is_axial() && prev.turns(face) == next.turns(face);
            if repeat || component {
                return true;
            }
        }
    }

    if prev.faces().intersects(next.faces()) {
        return false;
    }

    if let Some(face) = prev.single_face() {
        let axis = FaceSet::from(face) | FaceSet::from(face.opposite());
        if !face.leads_axis() && next.faces().intersects(axis) {
            return false;
        }
        let quarter = |mv: &Move, face: Face| mv.turns(face) % 2 == 1;
        if metric.axial
            && next.single_face() == Some(face.opposite())
            && quarter(prev, face)
            && quarter(next, face.opposite())
        {
            return false;
        }
    }

    true
}
