//! Collection catalog
//!
//! Which node indexes each collection, and which data nodes hold each shard.
//! Loaded once from configuration and read-only afterwards.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// One shard of a collection and its replica nodes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShardSettings {
    pub id: String,

    #[serde(default)]
    pub data_nodes: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionSettings {
    pub id: String,

    /// Node that runs indexing for this collection
    pub index_node: String,

    #[serde(default)]
    pub shards: Vec<ShardSettings>,
}

/// Collections by id
#[derive(Debug, Clone, Default)]
pub struct CollectionCatalog {
    collections: BTreeMap<String, CollectionSettings>,
}

impl CollectionCatalog {
    pub fn new(collections: impl IntoIterator<Item = CollectionSettings>) -> Self {
        Self {
            collections: collections
                .into_iter()
                .map(|c| (c.id.clone(), c))
                .collect(),
        }
    }

    pub fn get(&self, collection_id: &str) -> Option<&CollectionSettings> {
        self.collections.get(collection_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &CollectionSettings> {
        self.collections.values()
    }

    /// Every shard across all collections
    pub fn shards(&self) -> impl Iterator<Item = &ShardSettings> {
        self.collections.values().flat_map(|c| c.shards.iter())
    }

    pub fn len(&self) -> usize {
        self.collections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.collections.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_and_shards() {
        let catalog = CollectionCatalog::new(vec![
            CollectionSettings {
                id: "news".into(),
                index_node: "node1".into(),
                shards: vec![
                    ShardSettings {
                        id: "news_0".into(),
                        data_nodes: vec!["node1".into(), "node2".into()],
                    },
                    ShardSettings {
                        id: "news_1".into(),
                        data_nodes: vec!["node2".into()],
                    },
                ],
            },
            CollectionSettings {
                id: "blog".into(),
                index_node: "node2".into(),
                shards: Vec::new(),
            },
        ]);

        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.get("news").unwrap().index_node, "node1");
        assert!(catalog.get("wiki").is_none());
        assert_eq!(catalog.shards().count(), 2);
    }
}
