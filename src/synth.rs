//! # Path synthesis
//!
//! Builds an ordered, duplicate-free path of item ids from a start anchor to an
//! end anchor, at most `max_steps` long.
//!
//! ## Phase 1: goal-directed greedy walk
//! From the current item, ask the index for its `k + 1` nearest neighbours
//! (the extra slot is usually the item itself). Drop candidates whose id or
//! label has already been visited, then step to the survivor whose embedding
//! is closest to the **end vector**. The neighbour query keeps each hop local;
//! ranking by distance to the end keeps the walk moving toward the goal.
//!
//! The walk is a small state machine ([`Walk`], [`WalkState`]): it stops when
//! the end item is reached, when no candidate survives the filter, or when the
//! step budget of `max_steps - 1` hops is spent.
//!
//! ## Repair phases
//! 2. **Dedup**: keep the first occurrence of each id.
//! 3. **End-anchoring**: append the end id if the walk did not finish on it.
//! 4. **Padding**: while short of `max_steps`, insert the end vector's nearest
//!    neighbours (ascending distance, `max_steps * 2` of them scanned) just
//!    before the end. A candidate is skipped if its id is already in the path
//!    or its label was visited during the walk. The label set is the one the
//!    walk left behind; labels of padded items are not added to it.
//! 5. **Truncation**: above `max_steps`, keep the first item, the end item and
//!    the earliest `max_steps - 2` items between them.
//!
//! The result is best effort: it can be shorter than `max_steps` when the
//! store does not have enough distinct labels near the end.

use std::collections::HashSet;

use crate::error::PathError;
use crate::index::{VectorIndex, euclidean_distance};
use crate::store::VectorStore;

/// Neighbour fan-out per hop when the caller does not choose one.
pub const DEFAULT_K: usize = 5;
/// Path length ceiling when the caller does not choose one.
pub const DEFAULT_MAX_STEPS: usize = 10;

/// Tuning knobs for one synthesis call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PathParams {
    /// Neighbours considered per hop (`>= 1`).
    pub k: usize,
    /// Hard ceiling on path length (`>= 1`).
    pub max_steps: usize,
}

impl Default for PathParams {
    fn default() -> Self {
        Self {
            k: DEFAULT_K,
            max_steps: DEFAULT_MAX_STEPS,
        }
    }
}

impl PathParams {
    pub fn new(k: usize, max_steps: usize) -> Self {
        Self { k, max_steps }
    }

    /// Reject `k < 1` and `max_steps < 1`.
    pub fn validate(&self) -> Result<(), PathError> {
        if self.k < 1 {
            return Err(PathError::InvalidParameter {
                name: "k",
                value: 0,
            });
        }
        if self.max_steps < 1 {
            return Err(PathError::InvalidParameter {
                name: "max_steps",
                value: 0,
            });
        }
        Ok(())
    }
}

/// Where the greedy walk stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkState {
    /// Still stepping. A finished walk left in this state ran out of budget.
    Walking,
    /// The current item is the end item.
    GoalReached,
    /// No unvisited neighbour with an unvisited label was left.
    Exhausted,
}

/// Phase 1 of synthesis, one hop per [`Walk::step`].
pub struct Walk<'a> {
    store: &'a VectorStore,
    index: &'a dyn VectorIndex,
    end: usize,
    end_vector: &'a [f32],
    k: usize,
    path: Vec<usize>,
    visited: HashSet<usize>,
    visited_labels: HashSet<&'a str>,
    current: usize,
    state: WalkState,
}

impl<'a> Walk<'a> {
    /// Start a walk at store position `start` heading for position `end`.
    ///
    /// A walk that starts on its goal begins in [`WalkState::GoalReached`].
    pub fn new(
        store: &'a VectorStore,
        index: &'a dyn VectorIndex,
        start: usize,
        end: usize,
        end_vector: &'a [f32],
        k: usize,
    ) -> Self {
        let state = if start == end {
            WalkState::GoalReached
        } else {
            WalkState::Walking
        };
        Self {
            store,
            index,
            end,
            end_vector,
            k,
            path: vec![start],
            visited: HashSet::from([start]),
            visited_labels: HashSet::from([store.label(start)]),
            current: start,
            state,
        }
    }

    pub fn state(&self) -> WalkState {
        self.state
    }

    /// Positions visited so far, in order.
    pub fn path(&self) -> &[usize] {
        &self.path
    }

    /// Take one hop. Does nothing once the walk has halted.
    pub fn step(&mut self) -> Result<WalkState, PathError> {
        if self.state != WalkState::Walking {
            return Ok(self.state);
        }

        let neighbors = self
            .index
            .search(self.store.embedding(self.current), self.k.saturating_add(1))?;

        let next = neighbors
            .iter()
            .map(|n| n.position)
            .filter(|p| {
                !self.visited.contains(p) && !self.visited_labels.contains(self.store.label(*p))
            })
            .map(|p| (euclidean_distance(self.store.embedding(p), self.end_vector), p))
            .min_by(|a, b| a.0.total_cmp(&b.0));

        let Some((distance, next)) = next else {
            tracing::debug!(
                "Walk exhausted at {} after {} items",
                self.store.id(self.current),
                self.path.len()
            );
            self.state = WalkState::Exhausted;
            return Ok(self.state);
        };

        tracing::debug!(
            "Step {} -> {} (distance to goal {:.4})",
            self.store.id(self.current),
            self.store.id(next),
            distance
        );
        self.path.push(next);
        self.visited.insert(next);
        self.visited_labels.insert(self.store.label(next));
        self.current = next;

        if self.current == self.end {
            self.state = WalkState::GoalReached;
        }
        Ok(self.state)
    }

    /// Step until the walk halts or `budget` hops have been taken.
    pub fn run(&mut self, budget: usize) -> Result<WalkState, PathError> {
        for _ in 0..budget {
            if self.step()? != WalkState::Walking {
                break;
            }
        }
        Ok(self.state)
    }

    fn into_parts(self) -> (Vec<usize>, HashSet<&'a str>) {
        (self.path, self.visited_labels)
    }
}

/// Greedy walk plus repair over a store and its index.
pub struct PathSynthesizer<'a> {
    store: &'a VectorStore,
    index: &'a dyn VectorIndex,
}

impl<'a> PathSynthesizer<'a> {
    pub fn new(store: &'a VectorStore, index: &'a dyn VectorIndex) -> Self {
        Self { store, index }
    }

    /// Synthesize a path from `start_id` to `end_id`.
    ///
    /// `end_vector` is the embedding the walk steers toward; it does not have
    /// to equal the stored embedding of `end_id`.
    ///
    /// # Errors
    /// - [`PathError::InvalidParameter`] for `k < 1` or `max_steps < 1`.
    /// - [`PathError::UnknownItem`] if either anchor is not in the store.
    /// - [`PathError::DimensionMismatch`] if `end_vector` does not fit the store.
    pub fn synthesize(
        &self,
        start_id: &str,
        end_id: &str,
        end_vector: &[f32],
        params: PathParams,
    ) -> Result<Vec<&'a str>, PathError> {
        params.validate()?;
        let PathParams { k, max_steps } = params;

        let start = self.locate(start_id)?;
        let end = self.locate(end_id)?;
        if end_vector.len() != self.store.dimension() {
            return Err(PathError::DimensionMismatch {
                expected: self.store.dimension(),
                actual: end_vector.len(),
            });
        }

        if start == end {
            return Ok(vec![self.store.id(start)]);
        }

        let mut walk = Walk::new(self.store, self.index, start, end, end_vector, k);
        let state = walk.run(max_steps - 1)?;
        tracing::debug!("Walk halted in {:?} with {} items", state, walk.path().len());
        let (mut path, visited_labels) = walk.into_parts();

        // Phase 2: dedup
        let mut seen = HashSet::with_capacity(path.len() + 1);
        path.retain(|p| seen.insert(*p));

        // Phase 3: end-anchoring
        if path.last() != Some(&end) {
            path.push(end);
            seen.insert(end);
        }

        // Phase 4: padding
        if path.len() < max_steps {
            let candidates = self
                .index
                .search(end_vector, max_steps.saturating_mul(2))?;
            for candidate in candidates {
                let position = candidate.position;
                if !seen.contains(&position)
                    && !visited_labels.contains(self.store.label(position))
                {
                    path.insert(path.len() - 1, position);
                    seen.insert(position);
                }
                if path.len() >= max_steps {
                    break;
                }
            }
        }

        // Phase 5: truncation
        if path.len() > max_steps {
            path = if max_steps == 1 {
                vec![path[0]]
            } else {
                let first = path[0];
                let middle = &path[1..path.len() - 1];
                std::iter::once(first)
                    .chain(middle.iter().copied().take(max_steps - 2))
                    .chain(std::iter::once(end))
                    .collect()
            };
        }

        Ok(path.into_iter().map(|p| self.store.id(p)).collect())
    }

    fn locate(&self, id: &str) -> Result<usize, PathError> {
        self.store
            .position(id)
            .ok_or_else(|| PathError::UnknownItem(id.to_string()))
    }
}
