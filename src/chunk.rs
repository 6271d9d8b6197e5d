//! Dense renumbering of surviving line ranges.
//!
//! Projection keeps a sparse, ascending subset of the SPL lines. Each run of
//! consecutive surviving lines owned by one annotation is a [`Chunk`];
//! renumbering lays the chunks out back to back so the generated file gets a
//! gapless, strictly increasing numbering.

use crate::formula::Formula;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub from: usize,
    pub to: usize,
    pub condition: Formula,
}

// Chunks are never empty, so there is no `is_empty`.
#[allow(clippy::len_without_is_empty)]
impl Chunk {
    pub fn new(from: usize, to: usize, condition: Formula) -> Self {
        debug_assert!(from <= to, "chunk [{}, {}] is empty", from, to);
        Self { from, to, condition }
    }

    pub fn len(&self) -> usize {
        self.to - self.from + 1
    }

    pub fn lines(&self) -> std::ops::RangeInclusive<usize> {
        self.from..=self.to
    }
}

/// Shifts `chunks` so they occupy `origin, origin + 1, ...` without gaps,
/// preserving their order, lengths and conditions.
pub fn renumber(chunks: &[Chunk], origin: usize) -> Vec<Chunk> {
    let mut next = origin;
    chunks
        .iter()
        .map(|chunk| {
            let len = chunk.len();
            let moved = Chunk::new(next, next + len - 1, chunk.condition.clone());
            next += len;
            moved
        })
        .collect()
}

/// Collapses an ascending list of line numbers into maximal runs.
pub fn collapse_lines(lines: &[usize]) -> Vec<(usize, usize)> {
    let mut runs: Vec<(usize, usize)> = Vec::new();
    for &line in lines {
        match runs.last_mut() {
            Some((_, to)) if *to + 1 == line => *to = line,
            _ => runs.push((line, line)),
        }
    }
    runs
}
