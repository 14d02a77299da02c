use std::collections::HashMap;
use std::sync::Arc;

use cubejoin_error::{JoinError, Result};
use parking_lot::RwLock;
use tracing::debug;

use crate::IndexCatalog;
use crate::rtree::MemRTree;

/// Name-to-tree registry for [`MemRTree`]s.
#[derive(Debug, Default)]
pub struct MemCatalog {
    indexes: RwLock<HashMap<String, Arc<MemRTree>>>,
}

impl MemCatalog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `tree` under its own name, replacing any earlier entry.
    pub fn register(&self, tree: MemRTree) -> Arc<MemRTree> {
        let tree = Arc::new(tree);
        let name = crate::SpatialIndex::name(&*tree).to_owned();
        debug!(index = %name, "registered index");
        self.indexes.write().insert(name, Arc::clone(&tree));
        tree
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<MemRTree>> {
        self.indexes.read().get(name).cloned()
    }
}

impl IndexCatalog for MemCatalog {
    type Index = Arc<MemRTree>;

    fn open_for_read(&self, name: &str) -> Result<Self::Index> {
        self.get(name).ok_or_else(|| JoinError::NoSuchIndex {
            name: name.to_owned(),
        })
    }
}
