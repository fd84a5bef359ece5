use serde::{Deserialize, Serialize};

/// A chunk of document text with its position in the global append order
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Chunk {
    pub ordinal: usize,
    pub text: String,
    pub origin_document: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
}

/// One k-NN result from the vector index
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    pub position: usize,
    /// Squared Euclidean distance to the query
    pub distance: f32,
}

/// A neighbor joined with its chunk
#[derive(Debug, Clone, PartialEq)]
pub struct SearchResult {
    pub chunk: Chunk,
    pub distance: f32,
}
