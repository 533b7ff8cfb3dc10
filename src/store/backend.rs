// Linkauth — Keyed store abstraction
//
// The credential manager needs hash get/set, delete, existence, key
// enumeration, and an atomic multi-command pipeline whose replies can be
// transformed on the way out. Each pipeline owns a private copy of the
// response-transform table taken when it is created; changing a transform
// on one pipeline never leaks into the store or into other pipelines.

use std::collections::BTreeMap;

use async_trait::async_trait;

use super::StoreError;

/// One HGETALL reply. Values are `None` only after a transform nulled them.
pub type HashReply = BTreeMap<String, Option<String>>;

/// A reply transform applied inside pipeline execution.
pub type ResponseTransform = fn(HashReply) -> HashReply;

/// Per-command reply transforms.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResponseTransforms {
    pub hgetall: Option<ResponseTransform>,
}

/// A batch of HGETALL commands executed atomically (MULTI/EXEC).
#[derive(Debug, Clone)]
pub struct Pipeline {
    keys: Vec<String>,
    transforms: ResponseTransforms,
}

impl Pipeline {
    /// Start a pipeline with its own copy of `defaults`.
    pub fn new(defaults: &ResponseTransforms) -> Self {
        Self {
            keys: Vec::new(),
            transforms: *defaults,
        }
    }

    /// Set the transform for HGETALL replies of this pipeline only.
    pub fn set_hgetall_transform(&mut self, transform: ResponseTransform) -> &mut Self {
        self.transforms.hgetall = Some(transform);
        self
    }

    pub fn hgetall(&mut self, key: impl Into<String>) -> &mut Self {
        self.keys.push(key.into());
        self
    }

    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    pub fn transforms(&self) -> &ResponseTransforms {
        &self.transforms
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Turn raw replies into the pipeline's result, applying transforms.
    /// Every backend routes its replies through here before returning.
    pub(crate) fn finish(&self, raw: Vec<BTreeMap<String, String>>) -> Vec<HashReply> {
        raw.into_iter()
            .map(|fields| {
                let reply: HashReply = fields.into_iter().map(|(k, v)| (k, Some(v))).collect();
                match self.transforms.hgetall {
                    Some(transform) => transform(reply),
                    None => reply,
                }
            })
            .collect()
    }
}

/// Abstraction over the keyed hash store backing the credential manager.
#[async_trait]
pub trait KeyedStore: Send + Sync {
    /// The transform table every new pipeline starts from.
    fn response_transforms(&self) -> ResponseTransforms {
        ResponseTransforms::default()
    }

    /// Create a pipeline carrying a private copy of the transform table.
    fn pipeline(&self) -> Pipeline {
        Pipeline::new(&self.response_transforms())
    }

    /// Execute a pipeline atomically, returning one transformed reply per command.
    async fn execute(&self, pipeline: Pipeline) -> Result<Vec<HashReply>, StoreError>;

    /// Set several fields of a hash. Returns the store's acknowledgment.
    async fn hset_multiple(&self, key: &str, fields: &[(String, String)]) -> Result<bool, StoreError>;

    async fn hget(&self, key: &str, field: &str) -> Result<Option<String>, StoreError>;

    /// Delete a key, returning the number of keys removed.
    async fn del(&self, key: &str) -> Result<u64, StoreError>;

    async fn exists(&self, key: &str) -> Result<bool, StoreError>;

    /// Enumerate keys matching a glob pattern.
    async fn keys(&self, pattern: &str) -> Result<Vec<String>, StoreError>;
}

// ─── In-Memory Store for Testing ─────────────────────────────────────────────


// ─── Tests ───────────────────────────────────────────────────────────────────
