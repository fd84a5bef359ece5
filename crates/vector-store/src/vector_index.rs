use crate::error::{Result, VectorStoreError};
use crate::types::Neighbor;
use ndarray::{ArrayView1, ArrayView2, Zip};
use std::cmp::Ordering;
use std::ops::Range;

/// Exact nearest-neighbor index over fixed-dimension vectors stored row-major in one buffer.
///
/// The dimension is unset until the first non-empty append and never changes afterwards.
/// Search is a linear scan under squared Euclidean distance with ties broken by position.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VectorIndex {
    dimension: Option<usize>,
    data: Vec<f32>,
    len: usize,
}

impl VectorIndex {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild from a decoded vector artifact
    pub(crate) fn from_raw(dimension: usize, data: Vec<f32>) -> std::result::Result<Self, String> {
        if dimension == 0 {
            return if data.is_empty() {
                Ok(Self::new())
            } else {
                Err("vector data present but dimension is 0".to_string())
            };
        }
        if data.len() % dimension != 0 {
            return Err(format!(
                "{} floats is not a multiple of dimension {dimension}",
                data.len()
            ));
        }
        let len = data.len() / dimension;
        Ok(Self {
            dimension: (len > 0).then_some(dimension),
            data,
            len,
        })
    }

    /// Append vectors in order. Every vector is validated before any is stored, so a failed
    /// append leaves the index untouched.
    pub fn append(&mut self, vectors: &[Vec<f32>]) -> Result<Range<usize>> {
        let start = self.len;
        let Some(first) = vectors.first() else {
            return Ok(start..start);
        };

        let expected = self.dimension.unwrap_or(first.len());
        if expected == 0 {
            return Err(VectorStoreError::InvalidVector(
                "zero-length vector".to_string(),
            ));
        }
        for (offset, vector) in vectors.iter().enumerate() {
            if vector.len() != expected {
                return Err(VectorStoreError::DimensionMismatch {
                    expected,
                    actual: vector.len(),
                });
            }
            if vector.iter().any(|v| !v.is_finite()) {
                return Err(VectorStoreError::InvalidVector(format!(
                    "vector {} contains a non-finite component",
                    start + offset
                )));
            }
        }

        self.data.reserve(expected * vectors.len());
        for vector in vectors {
            self.data.extend_from_slice(vector);
        }
        self.dimension = Some(expected);
        self.len += vectors.len();
        Ok(start..self.len)
    }

    /// Up to `k` nearest positions ascending by squared distance, ties by ascending position
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<Neighbor>> {
        let dimension = match self.dimension {
            Some(dimension) if self.len > 0 => dimension,
            _ => return Err(VectorStoreError::EmptyIndex),
        };
        if query.len() != dimension {
            return Err(VectorStoreError::DimensionMismatch {
                expected: dimension,
                actual: query.len(),
            });
        }
        if k == 0 {
            return Ok(Vec::new());
        }

        let rows = ArrayView2::from_shape((self.len, dimension), &self.data)
            .map_err(|e| VectorStoreError::Other(format!("index shape error: {e}")))?;
        let query = ArrayView1::from(query);

        let mut scored: Vec<Neighbor> = rows
            .outer_iter()
            .enumerate()
            .map(|(position, row)| Neighbor {
                position,
                distance: squared_l2(row, query),
            })
            .collect();

        if k < scored.len() {
            scored.select_nth_unstable_by(k - 1, compare_neighbors);
            scored.truncate(k);
        }
        scored.sort_unstable_by(compare_neighbors);

        log::debug!(
            "Scanned {} vectors, returning {} neighbors",
            self.len,
            scored.len()
        );
        Ok(scored)
    }

    #[must_use]
    pub fn get(&self, position: usize) -> Option<&[f32]> {
        let dimension = self.dimension?;
        if position >= self.len {
            return None;
        }
        let start = position * dimension;
        self.data.get(start..start + dimension)
    }

    #[must_use]
    pub const fn dimension(&self) -> Option<usize> {
        self.dimension
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Row-major vector data
    #[must_use]
    pub fn as_flat(&self) -> &[f32] {
        &self.data
    }
}

fn squared_l2(row: ArrayView1<'_, f32>, query: ArrayView1<'_, f32>) -> f32 {
    Zip::from(&row).and(&query).fold(0.0f32, |acc, a, b| {
        let d = a - b;
        d.mul_add(d, acc)
    })
}

fn compare_neighbors(a: &Neighbor, b: &Neighbor) -> Ordering {
    a.distance
        .total_cmp(&b.distance)
        .then_with(|| a.position.cmp(&b.position))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn positions(hits: &[Neighbor]) -> Vec<usize> {
        hits.iter().map(|n| n.position).collect()
    }

    #[test]
    fn test_add_and_search() {
        let mut index = VectorIndex::new();
        assert_eq!(index.dimension(), None);

        index
            .append(&[vec![1.0, 0.0, 0.0], vec![0.9, 0.1, 0.0], vec![0.0, 1.0, 0.0]])
            .unwrap();
        assert_eq!(index.len(), 3);
        assert_eq!(index.dimension(), Some(3));

        let results = index.search(&[1.0, 0.0, 0.0], 2).unwrap();
        assert_eq!(positions(&results), vec![0, 1]);
        assert_eq!(results[0].distance, 0.0);
        assert!((results[1].distance - 0.02).abs() < 1e-6);
    }

    #[test]
    fn test_exact_match_is_nearest() {
        let vectors: Vec<Vec<f32>> = (0..8)
            .map(|i| vec![i as f32, (i * i) as f32 * 0.5, -(i as f32)])
            .collect();
        let mut index = VectorIndex::new();
        index.append(&vectors).unwrap();

        let hits = index.search(&vectors[3], 1).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].position, 3);
        assert!(hits[0].distance.abs() < f32::EPSILON);
    }

    #[test]
    fn test_ties_break_by_position() {
        let mut index = VectorIndex::new();
        index
            .append(&[vec![1.0, 0.0], vec![0.0, 1.0], vec![-1.0, 0.0], vec![0.0, -1.0]])
            .unwrap();

        let hits = index.search(&[0.0, 0.0], 3).unwrap();
        assert_eq!(positions(&hits), vec![0, 1, 2]);
        assert!(hits.iter().all(|n| (n.distance - 1.0).abs() < 1e-6));

        let again = index.search(&[0.0, 0.0], 3).unwrap();
        assert_eq!(hits, again);
    }

    #[test]
    fn test_k_larger_than_len_returns_all() {
        let mut index = VectorIndex::new();
        index.append(&[vec![3.0], vec![1.0], vec![2.0]]).unwrap();
        let hits = index.search(&[0.0], 10).unwrap();
        assert_eq!(positions(&hits), vec![1, 2, 0]);
    }

    #[test]
    fn test_k_zero_returns_nothing() {
        let mut index = VectorIndex::new();
        index.append(&[vec![1.0]]).unwrap();
        assert!(index.search(&[1.0], 0).unwrap().is_empty());
    }

    #[test]
    fn test_empty_index_search_fails() {
        let index = VectorIndex::new();
        assert!(matches!(
            index.search(&[1.0, 2.0], 3),
            Err(VectorStoreError::EmptyIndex)
        ));
    }

    #[test]
    fn test_dimension_mismatch() {
        let mut index = VectorIndex::new();
        index.append(&[vec![1.0, 0.0, 0.0]]).unwrap();

        let result = index.append(&[vec![1.0, 0.0]]);
        assert!(matches!(
            result,
            Err(VectorStoreError::DimensionMismatch {
                expected: 3,
                actual: 2
            })
        ));

        let result = index.search(&[1.0, 0.0], 1);
        assert!(matches!(
            result,
            Err(VectorStoreError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn test_failed_append_leaves_index_untouched() {
        let mut index = VectorIndex::new();
        index.append(&[vec![1.0, 1.0]]).unwrap();
        let before = index.clone();

        assert!(index
            .append(&[vec![2.0, 2.0], vec![3.0, 3.0, 3.0]])
            .is_err());
        assert!(index.append(&[vec![f32::NAN, 0.0]]).is_err());
        assert_eq!(index, before);
    }

    #[test]
    fn test_first_batch_must_agree_on_dimension() {
        let mut index = VectorIndex::new();
        assert!(index.append(&[vec![1.0, 2.0], vec![1.0]]).is_err());
        assert_eq!(index.dimension(), None);
        assert!(index.append(&[vec![]]).is_err());
    }

    #[test]
    fn test_get_and_raw_roundtrip() {
        let mut index = VectorIndex::new();
        index.append(&[vec![1.0, 2.0], vec![3.0, 4.0]]).unwrap();
        assert_eq!(index.get(1), Some(&[3.0, 4.0][..]));
        assert_eq!(index.get(2), None);

        let rebuilt = VectorIndex::from_raw(2, index.as_flat().to_vec()).unwrap();
        assert_eq!(rebuilt, index);
        assert!(VectorIndex::from_raw(3, vec![1.0, 2.0]).is_err());
        assert_eq!(VectorIndex::from_raw(0, Vec::new()).unwrap(), VectorIndex::new());
    }
}
