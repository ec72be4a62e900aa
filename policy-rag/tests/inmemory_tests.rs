//! Property tests for in-memory vector store search ordering.

use std::collections::HashSet;

use policy_rag::{Chunk, InMemoryVectorStore, VectorIndex};
use proptest::prelude::*;

/// Generate a non-zero L2-normalized embedding of the given dimension.
fn arb_normalized_embedding(dim: usize) -> impl Strategy<Value = Vec<f32>> {
    proptest::collection::vec(-1.0f32..1.0f32, dim).prop_filter_map(
        "non-zero embedding",
        |mut v| {
            let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
            if norm < 1e-8 {
                return None;
            }
            for val in &mut v {
                *val /= norm;
            }
            Some(v)
        },
    )
}

/// Generate a chunk with a normalized embedding.
fn arb_chunk(dim: usize) -> impl Strategy<Value = Chunk> {
    ("[a-z]{3,8}", "[a-z]{2,10}( [a-z]{2,10}){0,4}", arb_normalized_embedding(dim)).prop_map(
        |(id, text, embedding)| Chunk {
            source_id: format!("{id}.md"),
            id,
            text,
            embedding,
        },
    )
}

fn dedup_by_id(chunks: Vec<Chunk>) -> Vec<Chunk> {
    let mut seen = HashSet::new();
    chunks.into_iter().filter(|c| seen.insert(c.id.clone())).collect()
}

/// *For any* set of chunks stored in an InMemoryVectorStore, querying with
/// an embedding returns hits ordered by descending cosine similarity, and
/// at most `k` of them.
mod prop_inmemory_search_ordering {
    use super::*;

    const DIM: usize = 16;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn results_ordered_descending_and_bounded_by_k(
            chunks in proptest::collection::vec(arb_chunk(DIM), 1..20),
            query in arb_normalized_embedding(DIM),
            k in 1usize..25,
        ) {
            let rt = tokio::runtime::Runtime::new().unwrap();
            let (results, unique_count) = rt.block_on(async {
                let store = InMemoryVectorStore::new(DIM, "test-embedder");
                let unique_chunks = dedup_by_id(chunks);
                let count = unique_chunks.len();

                store.upsert(&unique_chunks).await.unwrap();
                let results = store.query(&query, k).await.unwrap();
                (results, count)
            });

            prop_assert!(results.len() <= k);
            prop_assert_eq!(results.len(), k.min(unique_count));

            for window in results.windows(2) {
                prop_assert!(
                    window[0].score >= window[1].score,
                    "results not in descending order: {} < {}",
                    window[0].score,
                    window[1].score,
                );
            }
        }
    }
}

/// *For any* set of chunks that share one embedding, every score ties, and
/// the hits come back in insertion order.
mod prop_inmemory_tie_break {
    use super::*;

    const DIM: usize = 8;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(50))]

        #[test]
        fn equal_scores_keep_insertion_order(
            chunks in proptest::collection::vec(arb_chunk(DIM), 2..12),
            shared in arb_normalized_embedding(DIM),
            k in 1usize..15,
        ) {
            let rt = tokio::runtime::Runtime::new().unwrap();
            let unique: Vec<Chunk> = dedup_by_id(chunks)
                .into_iter()
                .map(|c| Chunk { embedding: shared.clone(), ..c })
                .collect();
            let expected: Vec<String> = unique.iter().take(k).map(|c| c.id.clone()).collect();

            let ids = rt.block_on(async {
                let store = InMemoryVectorStore::new(DIM, "test-embedder");
                store.upsert(&unique).await.unwrap();
                let hits = store.query(&shared, k).await.unwrap();
                hits.into_iter().map(|h| h.chunk.id.clone()).collect::<Vec<_>>()
            });

            prop_assert_eq!(ids, expected);
        }
    }
}
