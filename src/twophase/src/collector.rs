use std::{
    cmp::Ordering,
    collections::BinaryHeap,
    sync::{
        Condvar, Mutex, MutexGuard, PoisonError,
        atomic::{AtomicBool, AtomicUsize, Ordering as AtomicOrdering},
    },
    time::Instant,
};

use log::debug;

/// A sequence of move indices that solves the cube, together with the search
/// direction that produced it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Solution {
    pub(crate) moves: Vec<usize>,
    pub(crate) direction: usize,
}

impl Solution {
    #[must_use]
    pub fn moves(&self) -> &[usize] {
        &self.moves
    }

    /// Number of moves in the metric the solution was found in.
    #[must_use]
    pub fn len(&self) -> usize {
        self.moves.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.moves.is_empty()
    }

    /// Index of the rotated or inverted copy of the cube this was found on.
    #[must_use]
    pub fn direction(&self) -> usize {
        self.direction
    }
}

impl Ord for Solution {
    fn cmp(&self, other: &Self) -> Ordering {
        self.moves
            .len()
            .cmp(&other.moves.len())
            .then_with(|| self.moves.cmp(&other.moves))
            .then_with(|| self.direction.cmp(&other.direction))
    }
}

impl PartialOrd for Solution {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Why a solve stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SolveStatus {
    /// The requested number of solutions was found.
    Found,
    /// Every search direction ran out of depths within the bound.
    Exhausted,
    /// The time limit passed first.
    TimedOut,
}

struct PoolState {
    // Max-heap by length, so the worst kept solution is on top
    kept: BinaryHeap<Solution>,
    status: Option<SolveStatus>,
}

/// Collects solutions from the search workers and wakes the caller once the
/// solve is over.
///
/// Solutions up to a fixed ceiling are kept, not just those within the
/// caller's target, so a solve that runs out of time still has its best
/// finds. Once the queue is full the bound drops below its worst member and
/// prunes the remaining search.
pub(crate) struct SolutionPool {
    capacity: usize,
    target: usize,
    state: Mutex<PoolState>,
    finished: Condvar,
    cancel: AtomicBool,
    bound: AtomicUsize,
}

impl SolutionPool {
    /// A pool for `capacity` solutions that is done once all of them are at
    /// most `target` moves. Nothing longer than `ceiling` is accepted.
    pub fn new(capacity: usize, target: usize, ceiling: usize) -> Self {
        SolutionPool {
            capacity: capacity.max(1),
            target,
            state: Mutex::new(PoolState {
                kept: BinaryHeap::with_capacity(capacity + 1),
                status: None,
            }),
            finished: Condvar::new(),
            cancel: AtomicBool::new(false),
            bound: AtomicUsize::new(ceiling.max(target)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, PoolState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Longest solution still worth reporting.
    #[inline]
    pub fn bound(&self) -> usize {
        self.bound.load(AtomicOrdering::Relaxed)
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.cancel.load(AtomicOrdering::Relaxed)
    }

    /// Offers a solution. It is kept if it fits within the bound and no kept
    /// solution has the same length.
    pub fn offer(&self, solution: Solution) -> bool {
        let mut state = self.lock();
        let len = solution.len();
        if state.status.is_some()
            || len > self.bound()
            || state.kept.iter().any(|kept| kept.len() == len)
        {
            return false;
        }

        debug!(
            "Kept a {len} move solution from direction {}",
            solution.direction
        );
        state.kept.push(solution);
        if state.kept.len() > self.capacity {
            state.kept.pop();
        }

        if state.kept.len() == self.capacity
            && let Some(worst) = state.kept.peek().map(Solution::len)
        {
            self.bound
                .store(worst.saturating_sub(1), AtomicOrdering::Relaxed);
            if worst <= self.target {
                Self::settle(&mut state, SolveStatus::Found);
                self.cancel.store(true, AtomicOrdering::Relaxed);
                self.finished.notify_all();
            }
        }
        true
    }

    /// Ends the solve with `status` unless it has already ended.
    pub fn finish(&self, status: SolveStatus) {
        let mut state = self.lock();
        Self::settle(&mut state, status);
        self.cancel.store(true, AtomicOrdering::Relaxed);
        self.finished.notify_all();
    }

    fn settle(state: &mut PoolState, status: SolveStatus) {
        if state.status.is_none() {
            state.status = Some(status);
        }
    }

    /// Blocks until the solve ends or `deadline` passes, then cancels every
    /// worker.
    pub fn wait(&self, deadline: Option<Instant>) -> SolveStatus {
        let mut state = self.lock();
        match deadline {
            None => {
                state = self
                    .finished
                    .wait_while(state, |state| state.status.is_none())
                    .unwrap_or_else(PoisonError::into_inner);
            }
            Some(deadline) => {
                let timeout = deadline.saturating_duration_since(Instant::now());
                state = self
                    .finished
                    .wait_timeout_while(state, timeout, |state| state.status.is_none())
                    .unwrap_or_else(PoisonError::into_inner)
                    .0;
            }
        }
        Self::settle(&mut state, SolveStatus::TimedOut);
        self.cancel.store(true, AtomicOrdering::Relaxed);
        state.status.unwrap_or(SolveStatus::TimedOut)
    }

    /// The kept solutions, shortest first.
    pub fn into_solutions(self) -> Vec<Solution> {
        self.state
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
            .kept
            .into_sorted_vec()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn solution(len: usize) -> Solution {
        Solution {
            moves: vec![0; len],
            direction: 0,
        }
    }

    #[test_log::test]
    fn keeps_distinct_lengths() {
        let pool = SolutionPool::new(3, 20, 20);
        assert!(pool.offer(solution(12)));
        assert!(!pool.offer(solution(12)));
        assert!(!pool.offer(solution(21)));
        assert!(pool.offer(solution(10)));
        assert!(!pool.is_cancelled());
        assert!(pool.offer(solution(11)));

        assert!(pool.is_cancelled());
        assert_eq!(pool.bound(), 11);
        assert_eq!(pool.wait(None), SolveStatus::Found);
        let lengths: Vec<_> = pool.into_solutions().iter().map(Solution::len).collect();
        assert_eq!(lengths, [10, 11, 12]);
    }

    #[test_log::test]
    fn times_out_without_solutions() {
        let pool = SolutionPool::new(1, 20, 30);
        let status = pool.wait(Some(Instant::now() + Duration::from_millis(10)));
        assert_eq!(status, SolveStatus::TimedOut);
        assert!(pool.is_cancelled());
        assert!(pool.into_solutions().is_empty());
    }

    #[test_log::test]
    fn first_status_wins() {
        let pool = SolutionPool::new(2, 20, 30);
        pool.finish(SolveStatus::Exhausted);
        assert!(!pool.offer(solution(5)));
        pool.finish(SolveStatus::Found);
        assert_eq!(pool.wait(None), SolveStatus::Exhausted);
    }

    #[test_log::test]
    fn tightens_bound_above_target() {
        let pool = SolutionPool::new(1, 18, 30);
        assert_eq!(pool.bound(), 30);
        assert!(pool.offer(solution(23)));
        assert_eq!(pool.bound(), 22);
        assert!(!pool.is_cancelled());

        assert!(!pool.offer(solution(23)));
        assert!(pool.offer(solution(20)));
        assert_eq!(pool.bound(), 19);
        assert!(!pool.is_cancelled());

        let status = pool.wait(Some(Instant::now() + Duration::from_millis(10)));
        assert_eq!(status, SolveStatus::TimedOut);
        let lengths: Vec<_> = pool.into_solutions().iter().map(Solution::len).collect();
        assert_eq!(lengths, [20]);
    }

    #[test_log::test]
    fn found_once_within_target() {
        let pool = SolutionPool::new(2, 18, 30);
        assert!(pool.offer(solution(25)));
        assert!(pool.offer(solution(17)));
        assert_eq!(pool.bound(), 24);
        assert!(!pool.is_cancelled());

        assert!(pool.offer(solution(18)));
        assert!(pool.is_cancelled());
        assert_eq!(pool.bound(), 17);
        assert_eq!(pool.wait(None), SolveStatus::Found);
        let lengths: Vec<_> = pool.into_solutions().iter().map(Solution::len).collect();
        assert_eq!(lengths, [17, 18]);
    }
}
