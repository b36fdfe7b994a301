//! Reference-to-source identifier translation.
//!
//! Word ids map straight onto the aligned source word ids. Clause and phrase
//! ids are minted fresh, each node type in its own reserved numeric range, so
//! a bare integer pointer can never name a word and a container at once.

use std::collections::HashMap;
use thiserror::Error;
use tracing::debug;

use crate::models::{
    AlignmentPair, Hierarchy, HierarchyField, IdMapping, NamespaceLayout, NodeType, ReferenceWord,
};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IdMapError {
    #[error(
        "clause and phrase namespaces overlap (clause offset {clause_offset}, phrase offset {phrase_offset}, capacity {capacity})"
    )]
    OverlappingNamespaces {
        clause_offset: u64,
        phrase_offset: u64,
        capacity: u64,
    },
    #[error("source word id {word_id} reaches into the container namespace starting at {floor}")]
    WordIdCollision { word_id: u64, floor: u64 },
    #[error("{node_type} namespace exhausted after {capacity} ids")]
    NamespaceExhausted { node_type: NodeType, capacity: u64 },
}

/// Reference node id -> containment columns
pub type HierarchyIndex = HashMap<u64, Hierarchy>;

/// Index the hierarchy columns of the reference corpus by node id.
pub fn hierarchy_index<'a, I: IntoIterator<Item = &'a ReferenceWord>>(words: I) -> HierarchyIndex {
    words
        .into_iter()
        .map(|w| (w.node_id, w.hierarchy))
        .collect()
}

/// Fail if any source word id would fall inside a container namespace.
pub fn check_word_ids<I: IntoIterator<Item = u64>>(
    word_ids: I,
    layout: &NamespaceLayout,
) -> Result<(), IdMapError> {
    let floor = layout.floor();
    match word_ids.into_iter().find(|&id| id >= floor) {
        Some(word_id) => Err(IdMapError::WordIdCollision { word_id, floor }),
        None => Ok(()),
    }
}

/// Translation table across the three node namespaces.
#[derive(Debug, Clone, Default)]
pub struct IdMap {
    mappings: Vec<IdMapping>,
    forward: HashMap<(NodeType, u64), u64>,
    reverse: HashMap<u64, NodeType>,
    duplicate_word_refs: usize,
}

impl IdMap {
    /// Rows in first-appearance order.
    pub fn mappings(&self) -> &[IdMapping] {
        &self.mappings
    }

    pub fn len(&self) -> usize {
        self.mappings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mappings.is_empty()
    }

    pub fn count(&self, node_type: NodeType) -> usize {
        self.mappings
            .iter()
            .filter(|m| m.node_type == node_type)
            .count()
    }

    /// Reference word nodes aligned more than once (through aliased books); only the first is kept.
    pub fn duplicate_word_refs(&self) -> usize {
        self.duplicate_word_refs
    }

    pub fn translate(&self, node_type: NodeType, reference_id: u64) -> Option<u64> {
        self.forward.get(&(node_type, reference_id)).copied()
    }

    /// Translate a pointer column, trying its namespaces in order.
    pub fn translate_field(&self, field: HierarchyField, reference_id: u64) -> Option<u64> {
        field
            .lookup_order()
            .iter()
            .find_map(|&node_type| self.translate(node_type, reference_id))
    }

    pub fn node_type_of(&self, assigned_id: u64) -> Option<NodeType> {
        self.reverse.get(&assigned_id).copied()
    }

    pub fn contains_assigned(&self, assigned_id: u64) -> bool {
        self.reverse.contains_key(&assigned_id)
    }

    fn insert(&mut self, mapping: IdMapping) -> bool {
        let key = (mapping.node_type, mapping.reference_id);
        if self.forward.contains_key(&key) {
            return false;
        }
        self.forward.insert(key, mapping.assigned_id);
        self.reverse.insert(mapping.assigned_id, mapping.node_type);
        self.mappings.push(mapping);
        true
    }
}

/// Sequential id source for one container namespace
struct Minter {
    node_type: NodeType,
    offset: u64,
    capacity: u64,
    next: u64,
}

impl Minter {
    fn new(node_type: NodeType, offset: u64, capacity: u64) -> Self {
        Minter {
            node_type,
            offset,
            capacity,
            next: 0,
        }
    }

    fn mint(&mut self) -> Result<u64, IdMapError> {
        if self.next >= self.capacity {
            return Err(IdMapError::NamespaceExhausted {
                node_type: self.node_type,
                capacity: self.capacity,
            });
        }
        let id = self
            .offset
            .checked_add(self.next)
            .ok_or(IdMapError::NamespaceExhausted {
                node_type: self.node_type,
                capacity: self.capacity,
            })?;
        self.next += 1;
        Ok(id)
    }
}

/// Build the id map from alignment pairs.
///
/// Runs as a single-threaded reduction after alignment so numbering depends
/// only on pair order: the n-th distinct clause (or phrase) reached from the
/// pairs gets `offset + n`.
pub fn build_id_map(
    pairs: &[AlignmentPair],
    hierarchy: &HierarchyIndex,
    layout: &NamespaceLayout,
) -> Result<IdMap, IdMapError> {
    if !layout.is_disjoint() {
        return Err(IdMapError::OverlappingNamespaces {
            clause_offset: layout.clause_offset,
            phrase_offset: layout.phrase_offset,
            capacity: layout.capacity,
        });
    }
    check_word_ids(pairs.iter().map(|p| p.source_word_id), layout)?;

    let mut map = IdMap::default();
    let mut clauses = Minter::new(NodeType::Clause, layout.clause_offset, layout.capacity);
    let mut phrases = Minter::new(NodeType::Phrase, layout.phrase_offset, layout.capacity);

    for pair in pairs {
        let inserted = map.insert(IdMapping {
            reference_id: pair.reference_node_id,
            assigned_id: pair.source_word_id,
            node_type: NodeType::Word,
        });
        if !inserted {
            map.duplicate_word_refs += 1;
        }

        let Some(containers) = hierarchy.get(&pair.reference_node_id) else {
            continue;
        };

        if let Some(clause_id) = containers.clause_id {
            if map.translate(NodeType::Clause, clause_id).is_none() {
                let assigned_id = clauses.mint()?;
                map.insert(IdMapping {
                    reference_id: clause_id,
                    assigned_id,
                    node_type: NodeType::Clause,
                });
            }
        }

        if let Some(phrase_id) = containers.phrase_id {
            if map.translate(NodeType::Phrase, phrase_id).is_none() {
                let assigned_id = phrases.mint()?;
                map.insert(IdMapping {
                    reference_id: phrase_id,
                    assigned_id,
                    node_type: NodeType::Phrase,
                });
            }
        }
    }

    debug!(
        words = map.count(NodeType::Word),
        clauses = map.count(NodeType::Clause),
        phrases = map.count(NodeType::Phrase),
        duplicates = map.duplicate_word_refs,
        "id map built"
    );

    Ok(map)
}
