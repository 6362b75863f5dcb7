//! The typed facade over a [`BlobCache`]: `queued/<id>` and `result/<id>`
//! key spaces holding JSON-serialized `BuildRecord`s.

use std::sync::Arc;

use anyhow::{Context, Result};
use peasant_types::{BlobCache, BuildRecord};

const QUEUED_PREFIX: &str = "queued";
const RESULT_PREFIX: &str = "result";

#[derive(Clone)]
pub struct BuildStore {
    cache: Arc<dyn BlobCache>,
}

impl BuildStore {
    pub fn new(cache: Arc<dyn BlobCache>) -> Self {
        Self { cache }
    }

    pub fn put_queued(&self, record: &BuildRecord) -> Result<()> {
        self.put(QUEUED_PREFIX, record)
    }

    pub fn put_result(&self, record: &BuildRecord) -> Result<()> {
        self.put(RESULT_PREFIX, record)
    }

    pub fn invalidate_queued(&self, build_id: u64) -> Result<()> {
        self.cache.delete(&key(QUEUED_PREFIX, build_id))
    }

    pub fn get_queued(&self, build_id: u64) -> Result<Option<BuildRecord>> {
        self.get(QUEUED_PREFIX, build_id)
    }

    pub fn get_result(&self, build_id: u64) -> Result<Option<BuildRecord>> {
        self.get(RESULT_PREFIX, build_id)
    }

    /// All queued records, ascending by `build_id`, per the recovery replay
    /// ordering requirement.
    pub fn list_queued(&self) -> Result<Vec<BuildRecord>> {
        let mut records = Vec::new();
        for k in self.cache.list_prefix(QUEUED_PREFIX)? {
            let bytes = self
                .cache
                .read(&k)?
                .with_context(|| format!("listed key {k} vanished before read"))?;
            records.push(
                serde_json::from_slice::<BuildRecord>(&bytes)
                    .with_context(|| format!("failed to parse queued record {k}"))?,
            );
        }
        records.sort_by_key(|r| r.build_id);
        Ok(records)
    }

    /// The highest `build_id` across both key spaces, used to seed the id
    /// allocator. `None` if the store is empty.
    pub fn max_existing_id(&self) -> Result<Option<u64>> {
        let mut max: Option<u64> = None;
        for prefix in [QUEUED_PREFIX, RESULT_PREFIX] {
            for k in self.cache.list_prefix(prefix)? {
                if let Some(bytes) = self.cache.read(&k)? {
                    let record: BuildRecord = serde_json::from_slice(&bytes)
                        .with_context(|| format!("failed to parse record {k}"))?;
                    max = Some(max.map_or(record.build_id, |m| m.max(record.build_id)));
                }
            }
        }
        Ok(max)
    }

    fn put(&self, prefix: &str, record: &BuildRecord) -> Result<()> {
        let bytes = serde_json::to_vec(record).context("failed to serialize build record")?;
        self.cache.write(&key(prefix, record.build_id), &bytes)
    }

    fn get(&self, prefix: &str, build_id: u64) -> Result<Option<BuildRecord>> {
        match self.cache.read(&key(prefix, build_id))? {
            None => Ok(None),
            Some(bytes) => Ok(Some(
                serde_json::from_slice(&bytes).context("failed to parse build record")?,
            )),
        }
    }
}

fn key(prefix: &str, build_id: u64) -> String {
    format!("{prefix}/{build_id}")
}
