//! Chain enumeration shared by sequence and repeats.
//!
//! Given position-sorted hit lists per slot, a chain picks one hit from each
//! of the slots `0..len` such that every hit starts within the allowed gap
//! after the previous hit's end. Marks are computed right to left so that
//! enumeration never explores a prefix that cannot be completed.

use crate::binding::Binding;
use crate::node::GapRange;

/// Precomputed continuation marks over a set of slots.
pub(crate) struct ChainMarks<'a> {
    slots: Vec<&'a [Binding]>,
    gaps: Vec<GapRange>,
    /// Chains shorter than this are never reported.
    min_len: usize,
    /// `marks[i][k]`: first viable hit of slot `i + 1` continuing hit `k` of
    /// slot `i`.
    marks: Vec<Vec<Option<usize>>>,
    /// `viable[i][k]`: hit `k` of slot `i` lies on some chain of at least
    /// `min_len` hits.
    viable: Vec<Vec<bool>>,
}

impl<'a> ChainMarks<'a> {
    /// `gaps.len()` must be `slots.len() - 1` and `1 <= min_len <= slots.len()`.
    pub(crate) fn new(slots: Vec<&'a [Binding]>, gaps: Vec<GapRange>, min_len: usize) -> Self {
        let n = slots.len();
        let mut marks: Vec<Vec<Option<usize>>> = slots.iter().map(|s| vec![None; s.len()]).collect();
        let mut viable: Vec<Vec<bool>> = slots.iter().map(|s| vec![false; s.len()]).collect();

        if let Some(last) = n.checked_sub(1) {
            viable[last].iter_mut().for_each(|v| *v = n >= min_len);
        }

        for i in (0..n.saturating_sub(1)).rev() {
            let can_stop = i + 1 >= min_len;
            for k in 0..slots[i].len() {
                let (lo, hi) = window(&slots[i][k], gaps[i]);
                let next = slots[i + 1];
                let start = next.partition_point(|h| (h.position() as i64) < lo);
                let mark = (start..next.len())
                    .take_while(|&j| (next[j].position() as i64) <= hi)
                    .find(|&j| viable[i + 1][j]);
                marks[i][k] = mark;
                viable[i][k] = can_stop || mark.is_some();
            }
        }

        Self {
            slots,
            gaps,
            min_len,
            marks,
            viable,
        }
    }

    /// Calls `emit` for every chain of `min_len..=slots` hits, in order of
    /// first-hit position, shorter chains before their extensions.
    pub(crate) fn for_each_chain(&self, mut emit: impl FnMut(&[&'a Binding])) {
        if self.slots.is_empty() {
            return;
        }
        let mut chain: Vec<&'a Binding> = Vec::with_capacity(self.slots.len());
        for k in 0..self.slots[0].len() {
            if self.viable[0][k] {
                self.expand(0, k, &mut chain, &mut emit);
            }
        }
    }

    fn expand(
        &self,
        slot: usize,
        k: usize,
        chain: &mut Vec<&'a Binding>,
        emit: &mut impl FnMut(&[&'a Binding]),
    ) {
        let current: &'a [Binding] = self.slots[slot];
        let hit = &current[k];
        chain.push(hit);

        if slot + 1 >= self.min_len {
            emit(chain);
        }

        if let Some(first) = self.marks.get(slot).and_then(|m| m[k]) {
            let (_, hi) = window(hit, self.gaps[slot]);
            let next = self.slots[slot + 1];
            for j in first..next.len() {
                if (next[j].position() as i64) > hi {
                    break;
                }
                if self.viable[slot + 1][j] {
                    self.expand(slot + 1, j, chain, emit);
                }
            }
        }

        chain.pop();
    }
}

/// Inclusive start window for the hit following `hit`.
fn window(hit: &Binding, gap: GapRange) -> (i64, i64) {
    let end = hit.end() as i64;
    (end + gap.min as i64, end + gap.max as i64)
}
