//! Foreign N-dimensional array container
//!
//! A [`ForeignArray`] carries a runtime bound vector (lower bound plus
//! extent per dimension) and its elements in canonical order: the last
//! dimension varies fastest. [`IndexWalker`] implements the
//! carry-increment iteration over the bound vector that both codec
//! directions share.

use crate::error::{BridgeError, BridgeResult};
use crate::value::WireValue;

/// Bounds of one array dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bound {
    /// Index of the first element in this dimension.
    pub lower: i32,
    /// Number of elements in this dimension.
    pub extent: u32,
}

impl Bound {
    /// Bound starting at zero with the given extent.
    pub const fn zero_based(extent: u32) -> Self {
        Bound { lower: 0, extent }
    }

    /// Index one past the last element in this dimension.
    pub const fn upper(&self) -> i32 {
        self.lower + self.extent as i32
    }
}

/// An N-dimensional, runtime-bounded array of wire values.
#[derive(Debug, Clone, PartialEq)]
pub struct ForeignArray {
    bounds: Vec<Bound>,
    elements: Vec<WireValue>,
}

impl ForeignArray {
    /// Allocate an array with the given bounds, filled with `Empty`.
    ///
    /// Fails with resource exhaustion if the element count overflows or
    /// cannot be allocated.
    pub fn new(bounds: Vec<Bound>) -> BridgeResult<Self> {
        let mut total: usize = if bounds.is_empty() { 0 } else { 1 };
        for b in &bounds {
            total = total
                .checked_mul(b.extent as usize)
                .ok_or_else(|| BridgeError::Exhausted("array extent overflow".to_string()))?;
        }
        let mut elements = Vec::new();
        elements
            .try_reserve_exact(total)
            .map_err(|_| BridgeError::Exhausted(format!("array of {total} elements")))?;
        elements.resize(total, WireValue::Empty);
        Ok(ForeignArray { bounds, elements })
    }

    /// Number of dimensions.
    pub fn rank(&self) -> usize {
        self.bounds.len()
    }

    /// The bound vector.
    pub fn bounds(&self) -> &[Bound] {
        &self.bounds
    }

    /// Total number of elements.
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    /// True if the array holds no elements.
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Element at the given index vector, if in bounds.
    pub fn get(&self, indices: &[i32]) -> Option<&WireValue> {
        let at = self.linear_index(indices)?;
        self.elements.get(at)
    }

    /// Store an element at the given index vector.
    pub fn put(&mut self, indices: &[i32], value: WireValue) -> BridgeResult<()> {
        let at = self
            .linear_index(indices)
            .ok_or(BridgeError::Conversion { tag: "ARRAY" })?;
        self.elements[at] = value;
        Ok(())
    }

    /// Map an index vector to the canonical element position
    /// (last dimension varies fastest).
    fn linear_index(&self, indices: &[i32]) -> Option<usize> {
        if indices.len() != self.bounds.len() || self.bounds.is_empty() {
            return None;
        }
        let mut at: usize = 0;
        for (index, bound) in indices.iter().zip(&self.bounds) {
            if *index < bound.lower || *index >= bound.upper() {
                return None;
            }
            at = at * bound.extent as usize + (*index - bound.lower) as usize;
        }
        Some(at)
    }
}

/// Carry-increment iteration over a bound vector in canonical order.
///
/// Yields every index vector of the array, with the last dimension
/// varying fastest. An empty or zero-extent bound vector yields nothing.
pub struct IndexWalker {
    bounds: Vec<Bound>,
    cursor: Vec<i32>,
    done: bool,
}

impl IndexWalker {
    /// Start a walk over the given bounds.
    pub fn new(bounds: &[Bound]) -> Self {
        let done = bounds.is_empty() || bounds.iter().any(|b| b.extent == 0);
        IndexWalker {
            cursor: bounds.iter().map(|b| b.lower).collect(),
            bounds: bounds.to_vec(),
            done,
        }
    }

    /// The current index vector, then step once. Returns `None` when the
    /// walk is complete.
    pub fn next_indices(&mut self) -> Option<Vec<i32>> {
        if self.done {
            return None;
        }
        let current = self.cursor.clone();
        // Increment the last dimension, carrying leftward on overflow.
        for dim in (0..self.bounds.len()).rev() {
            self.cursor[dim] += 1;
            if self.cursor[dim] < self.bounds[dim].upper() {
                return Some(current);
            }
            self.cursor[dim] = self.bounds[dim].lower;
        }
        self.done = true;
        Some(current)
    }
}

impl Iterator for IndexWalker {
    type Item = Vec<i32>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_indices()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_fills_with_empty() {
        let arr = ForeignArray::new(vec![Bound::zero_based(2), Bound::zero_based(3)]).unwrap();
        assert_eq!(arr.rank(), 2);
        assert_eq!(arr.len(), 6);
        assert_eq!(arr.get(&[1, 2]), Some(&WireValue::Empty));
    }

    #[test]
    fn test_zero_rank_is_empty() {
        let arr = ForeignArray::new(vec![]).unwrap();
        assert_eq!(arr.rank(), 0);
        assert!(arr.is_empty());
        assert_eq!(arr.get(&[]), None);
    }

    #[test]
    fn test_put_and_get_with_lower_bounds() {
        let mut arr = ForeignArray::new(vec![Bound { lower: 1, extent: 2 }]).unwrap();
        arr.put(&[1], WireValue::I4(10)).unwrap();
        arr.put(&[2], WireValue::I4(20)).unwrap();
        assert_eq!(arr.get(&[1]), Some(&WireValue::I4(10)));
        assert_eq!(arr.get(&[2]), Some(&WireValue::I4(20)));
        assert_eq!(arr.get(&[0]), None);
        assert_eq!(arr.get(&[3]), None);
    }

    #[test]
    fn test_put_out_of_bounds_fails() {
        let mut arr = ForeignArray::new(vec![Bound::zero_based(1)]).unwrap();
        assert!(arr.put(&[1], WireValue::Empty).is_err());
        assert!(arr.put(&[0, 0], WireValue::Empty).is_err());
    }

    #[test]
    fn test_walker_order_last_dimension_fastest() {
        let bounds = vec![Bound::zero_based(2), Bound::zero_based(2)];
        let order: Vec<Vec<i32>> = IndexWalker::new(&bounds).collect();
        assert_eq!(
            order,
            vec![vec![0, 0], vec![0, 1], vec![1, 0], vec![1, 1]]
        );
    }

    #[test]
    fn test_walker_respects_lower_bounds() {
        let bounds = vec![Bound { lower: 5, extent: 2 }];
        let order: Vec<Vec<i32>> = IndexWalker::new(&bounds).collect();
        assert_eq!(order, vec![vec![5], vec![6]]);
    }

    #[test]
    fn test_walker_zero_extent_yields_nothing() {
        assert_eq!(IndexWalker::new(&[]).count(), 0);
        assert_eq!(
            IndexWalker::new(&[Bound::zero_based(3), Bound::zero_based(0)]).count(),
            0
        );
    }

    #[test]
    fn test_walker_covers_every_element() {
        let bounds = vec![
            Bound { lower: -1, extent: 3 },
            Bound::zero_based(2),
            Bound { lower: 1, extent: 2 },
        ];
        let all: Vec<Vec<i32>> = IndexWalker::new(&bounds).collect();
        assert_eq!(all.len(), 12);
        // Every index vector is unique and in bounds.
        let mut seen = all.clone();
        seen.dedup();
        assert_eq!(seen.len(), 12);
    }
}
