use docchat_vector_store::{Neighbor, VectorIndex};
use proptest::prelude::*;

/// Sort every position by (distance, position) and keep the first `k`
fn reference_search(vectors: &[Vec<f32>], query: &[f32], k: usize) -> Vec<(usize, f32)> {
    let mut all: Vec<(usize, f32)> = vectors
        .iter()
        .enumerate()
        .map(|(position, v)| {
            let distance = v
                .iter()
                .zip(query)
                .map(|(a, b)| (a - b) * (a - b))
                .sum::<f32>();
            (position, distance)
        })
        .collect();
    all.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));
    all.truncate(k);
    all
}

fn corpus() -> impl Strategy<Value = (Vec<Vec<f32>>, Vec<f32>, usize)> {
    (1usize..6).prop_flat_map(|dim| {
        // Small integer grid so exact ties are common
        let component = (-3i8..=3).prop_map(f32::from);
        (
            prop::collection::vec(prop::collection::vec(component.clone(), dim), 1..40),
            prop::collection::vec(component, dim),
            0usize..50,
        )
    })
}

proptest! {
    #[test]
    fn search_matches_brute_force_reference((vectors, query, k) in corpus()) {
        let mut index = VectorIndex::new();
        index.append(&vectors).unwrap();

        let hits = index.search(&query, k).unwrap();
        let expected = reference_search(&vectors, &query, k);

        prop_assert_eq!(hits.len(), expected.len());
        for (hit, (position, distance)) in hits.iter().zip(&expected) {
            prop_assert_eq!(hit.position, *position);
            prop_assert!((hit.distance - distance).abs() < 1e-4);
        }
    }

    #[test]
    fn repeated_search_is_identical((vectors, query, k) in corpus()) {
        let mut index = VectorIndex::new();
        index.append(&vectors).unwrap();

        let first: Vec<Neighbor> = index.search(&query, k).unwrap();
        let second: Vec<Neighbor> = index.search(&query, k).unwrap();
        prop_assert_eq!(first, second);
    }

    #[test]
    fn stored_vector_is_its_own_nearest_neighbor(
        (vectors, _query, _k) in corpus(),
        pick in any::<prop::sample::Index>(),
    ) {
        let mut index = VectorIndex::new();
        index.append(&vectors).unwrap();
        let target = pick.index(vectors.len());

        let hits = index.search(&vectors[target], 1).unwrap();
        prop_assert_eq!(hits[0].distance, 0.0);
        // Duplicates resolve to the earliest identical position
        let first_equal = vectors.iter().position(|v| v == &vectors[target]).unwrap();
        prop_assert_eq!(hits[0].position, first_equal);
    }
}
