//! In-memory contract index.
//!
//! Each stored contract is an immutable [`StoredContract`] behind an `Arc`.
//! Re-adding a contract builds the replacement completely before swapping it
//! into the map under the write lock, so a concurrent query sees either the old
//! or the new contract and never a mix of both.

use crate::chunking::{ChunkConfig, TextChunk};
use crate::document::ContractMetadata;
use crate::expansion::{expand_keywords, extract_keywords};
use crate::ranking::rank_chunks;
use log::{debug, info};
use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Caller-assigned contract identifier
pub type ContractId = u64;

/// A contract as held by the index
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredContract {
    pub text: String,
    pub chunks: Vec<TextChunk>,
    pub metadata: ContractMetadata,
}

/// Contracts keyed by id, chunked for retrieval
#[derive(Debug)]
pub struct ContractIndex {
    config: ChunkConfig,
    contracts: RwLock<BTreeMap<ContractId, Arc<StoredContract>>>,
}

impl Default for ContractIndex {
    fn default() -> Self {
        ContractIndex::new(ChunkConfig::STORAGE)
    }
}

impl ContractIndex {
    /// Create an empty index that chunks contracts with `config`
    pub fn new(config: ChunkConfig) -> Self {
        ContractIndex {
            config,
            contracts: RwLock::new(BTreeMap::new()),
        }
    }

    pub fn chunk_config(&self) -> ChunkConfig {
        self.config
    }

    /// Chunk and store a contract, replacing any contract with the same id.
    ///
    /// Text is not validated here; callers reject short or empty uploads.
    pub fn add_document(&self, id: ContractId, text: impl Into<String>, metadata: ContractMetadata) {
        let text = text.into();
        let chunks = self.config.chunk_document(&text);
        let chunk_count = chunks.len();
        let contract = Arc::new(StoredContract {
            text,
            chunks,
            metadata,
        });

        let total = {
            let mut contracts = self.write();
            contracts.insert(id, contract);
            contracts.len()
        };

        info!(
            "Added contract {} ({} chunks) to the index. Total contracts: {}",
            id, chunk_count, total
        );
    }

    /// Drop a contract; returns whether it was present
    pub fn remove_document(&self, id: ContractId) -> bool {
        let removed = self.write().remove(&id).is_some();
        if removed {
            info!("Removed contract {} from the index", id);
        }
        removed
    }

    /// Snapshot of a stored contract
    pub fn get(&self, id: ContractId) -> Option<Arc<StoredContract>> {
        self.read().get(&id).cloned()
    }

    pub fn contains(&self, id: ContractId) -> bool {
        self.read().contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Ids of all stored contracts, ascending
    pub fn ids(&self) -> Vec<ContractId> {
        self.read().keys().copied().collect()
    }

    /// Retrieve chunk texts relevant to `query`.
    ///
    /// With a `contract_id`, that contract's chunks are scored and the best
    /// `limit` returned; leading chunks compete on their position bonus alone.
    /// An unknown id yields an empty result. Without an id, the first chunk of
    /// up to `limit` contracts is returned unscored.
    pub fn query(&self, query: &str, limit: usize, contract_id: Option<ContractId>) -> Vec<String> {
        let keywords = extract_keywords(query);
        let expanded = expand_keywords(&keywords);
        debug!(
            "Query has {} keywords, {} after expansion",
            keywords.len(),
            expanded.len()
        );

        let results = match contract_id {
            Some(id) => match self.get(id) {
                Some(contract) => rank_chunks(&contract.chunks, &keywords, &expanded, limit),
                None => {
                    debug!("Contract {} is not indexed", id);
                    Vec::new()
                }
            },
            None => self
                .read()
                .values()
                .take(limit)
                .filter_map(|contract| contract.chunks.first())
                .map(|chunk| chunk.text.clone())
                .collect(),
        };

        debug!("Query returned {} chunks", results.len());
        results
    }

    fn read(&self) -> RwLockReadGuard<'_, BTreeMap<ContractId, Arc<StoredContract>>> {
        // Writers only swap whole entries, so a poisoned map is still consistent
        self.contracts.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, BTreeMap<ContractId, Arc<StoredContract>>> {
        self.contracts.write().unwrap_or_else(PoisonError::into_inner)
    }
}
