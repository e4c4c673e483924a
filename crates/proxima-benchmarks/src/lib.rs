use std::sync::Arc;

use proxima_core::{AnnotationTerm, CoreResult, EngineConfig, QueryConfig};
use proxima_index::{AnnotationTable, MemoryIndex};
use proxima_query::QueryEngine;
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde_json::json;

/// Default number of generated documents.
pub const DEFAULT_DOCUMENTS: usize = 10_000;

/// Default distinct terms in the generated vocabulary.
pub const DEFAULT_VOCABULARY: usize = 5_000;

/// Shape of a synthetic corpus.
#[derive(Debug, Clone, Copy)]
pub struct CorpusSpec {
    pub documents: usize,
    pub vocabulary: usize,
    pub min_length: usize,
    pub max_length: usize,
    pub seed: u64,
}

impl Default for CorpusSpec {
    fn default() -> Self {
        Self {
            documents: DEFAULT_DOCUMENTS,
            vocabulary: DEFAULT_VOCABULARY,
            min_length: 20,
            max_length: 200,
            seed: 42,
        }
    }
}

/// Name of the `rank`-th vocabulary term.
pub fn word(rank: usize) -> String {
    format!("w{}", rank)
}

/// Generates documents whose term frequencies roughly follow Zipf's law, so
/// low ranks behave like stop words and high ranks are rare.
pub fn generate_corpus(spec: CorpusSpec) -> MemoryIndex {
    let mut rng = StdRng::seed_from_u64(spec.seed);
    let index = MemoryIndex::new("body");
    for _ in 0..spec.documents {
        let length = rng.gen_range(spec.min_length..=spec.max_length);
        let tokens: Vec<String> = (0..length)
            .map(|_| {
                let u: f64 = rng.gen_range(0.0..1.0);
                let rank = ((spec.vocabulary as f64).powf(u) as usize).saturating_sub(1);
                word(rank.min(spec.vocabulary - 1))
            })
            .collect();
        index.add_document(tokens);
    }
    index
}

/// Tags every vocabulary term with a `bucket` feature in `0..buckets`, for
/// annotation fan-out benchmarks.
pub fn bucket_annotations(vocabulary: usize, buckets: u64) -> CoreResult<AnnotationTable> {
    let table = AnnotationTable::new();
    for rank in 0..vocabulary {
        let term = AnnotationTerm {
            index_name: "body".to_string(),
            term: word(rank),
            length: 1,
        };
        table.register("token", json!({ "bucket": rank as u64 % buckets }), term)?;
    }
    Ok(table)
}

/// Engine over `index` with the given bound on live executors.
pub fn build_engine(
    index: Arc<MemoryIndex>,
    annotations: Option<Arc<AnnotationTable>>,
    max_live_executors: usize,
) -> CoreResult<QueryEngine> {
    let config = EngineConfig {
        query: QueryConfig {
            max_live_executors,
            ..Default::default()
        },
        ..Default::default()
    };
    let mut builder = QueryEngine::builder().with_index(index).with_config(config);
    if let Some(annotations) = annotations {
        builder = builder.with_resolver(annotations);
    }
    builder.build()
}
