//! Copy reference annotations onto aligned source words.
//!
//! Pointer features (`parent`, `clause_id`, `phrase_id`) are rewritten through
//! the id map on the way in, then every stored pointer is checked against the
//! source word ids and the minted container ids.

use rayon::prelude::*;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::{debug, warn};

use crate::idmap::IdMap;
use crate::models::{
    AlignmentPair, FeatureValue, HierarchyField, Provenance, ReferenceWord, TransplantedWord, Word,
};

/// A stored pointer that resolves to no known node
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BrokenReference {
    pub word_id: u64,
    pub field: HierarchyField,
    pub target: u64,
}

/// Output of a transplant run
#[derive(Debug, Clone)]
pub struct TransplantOutcome {
    pub words: Vec<TransplantedWord>,
    pub broken_references: Vec<BrokenReference>,
}

impl TransplantOutcome {
    pub fn broken_reference_count(&self) -> usize {
        self.broken_references.len()
    }

    pub fn aligned_count(&self) -> usize {
        self.words.iter().filter(|w| w.aligned).count()
    }

    /// Pointer fields that kept a raw reference id because no mapping existed.
    pub fn unresolved_count(&self) -> usize {
        self.words.iter().map(|w| w.unresolved.len()).sum()
    }
}

/// Transplant `feature_names` from the reference onto every aligned source word.
///
/// Unaligned words pass through untouched and are marked for annotation by
/// another source. Validation never aborts; broken pointers are returned.
pub fn transplant(
    source_words: &[Word],
    reference_words: &[ReferenceWord],
    pairs: &[AlignmentPair],
    id_map: &IdMap,
    feature_names: &[String],
) -> TransplantOutcome {
    let alignment: HashMap<u64, u64> = pairs
        .iter()
        .map(|p| (p.source_word_id, p.reference_node_id))
        .collect();
    let reference: HashMap<u64, &ReferenceWord> =
        reference_words.iter().map(|w| (w.node_id, w)).collect();

    let words: Vec<TransplantedWord> = source_words
        .par_iter()
        .map(|word| {
            let target = alignment
                .get(&word.word_id)
                .and_then(|node_id| reference.get(node_id).copied());
            match target {
                Some(reference_word) => {
                    transplant_word(word, reference_word, id_map, feature_names)
                }
                None => {
                    if let Some(node_id) = alignment.get(&word.word_id) {
                        warn!(
                            word_id = word.word_id,
                            node_id, "aligned reference node missing from reference table"
                        );
                    }
                    TransplantedWord {
                        word: word.clone(),
                        aligned: false,
                        provenance: Provenance::FromOtherSource,
                        reference_node_id: None,
                        unresolved: Vec::new(),
                    }
                }
            }
        })
        .collect();

    let broken_references = validate_references(&words, id_map);
    if !broken_references.is_empty() {
        warn!(
            count = broken_references.len(),
            "transplanted words carry pointers that resolve to no known node"
        );
    }

    TransplantOutcome {
        words,
        broken_references,
    }
}

/// Copy features for one aligned word.
fn transplant_word(
    word: &Word,
    reference_word: &ReferenceWord,
    id_map: &IdMap,
    feature_names: &[String],
) -> TransplantedWord {
    let mut updated = word.clone();
    let mut unresolved = Vec::new();

    for name in feature_names {
        let value = match HierarchyField::from_name(name) {
            Some(field) => reference_word.hierarchy.get(field).map(|raw| {
                match id_map.translate_field(field, raw) {
                    Some(translated) => FeatureValue::from(translated),
                    None if raw == 0 => FeatureValue::Int(0),
                    None => {
                        unresolved.push(name.clone());
                        FeatureValue::from(raw)
                    }
                }
            }),
            None => reference_word.features.get(name).cloned(),
        };

        match value {
            Some(value) => {
                updated.features.insert(name.clone(), value);
            }
            None => {
                updated.features.remove(name);
            }
        }
    }

    if !unresolved.is_empty() {
        debug!(
            word_id = word.word_id,
            fields = ?unresolved,
            "pointer kept raw reference value"
        );
    }

    TransplantedWord {
        word: updated,
        aligned: true,
        provenance: Provenance::FromReference,
        reference_node_id: Some(reference_word.node_id),
        unresolved,
    }
}

/// Every stored pointer must name a source word or a minted container.
///
/// A pointer of 0 marks a root and is not checked. Fields that kept a raw
/// reference value are always broken, whatever local id the number matches.
pub fn validate_references(words: &[TransplantedWord], id_map: &IdMap) -> Vec<BrokenReference> {
    let known: HashSet<u64> = words.iter().map(|w| w.word.word_id).collect();

    let mut broken = Vec::new();
    for transplanted in words {
        for field in HierarchyField::ALL {
            let Some(target) = transplanted
                .word
                .features
                .get(field.name())
                .and_then(FeatureValue::as_id)
            else {
                continue;
            };
            let untranslated = transplanted.unresolved.iter().any(|f| f == field.name());
            if !untranslated
                && (target == 0 || known.contains(&target) || id_map.contains_assigned(target))
            {
                continue;
            }
            broken.push(BrokenReference {
                word_id: transplanted.word.word_id,
                field,
                target,
            });
        }
    }
    broken
}

/// Cycles in the parent graph, each as the node path closed by its first node.
///
/// Untranslated parents name reference nodes, not source words, and are left out.
pub fn find_parent_cycles(words: &[TransplantedWord]) -> Vec<Vec<u64>> {
    let parents: BTreeMap<u64, u64> = words
        .iter()
        .filter(|w| !w.unresolved.iter().any(|f| f == HierarchyField::Parent.name()))
        .filter_map(|w| {
            w.word
                .features
                .get(HierarchyField::Parent.name())
                .and_then(FeatureValue::as_id)
                .filter(|&p| p != 0)
                .map(|p| (w.word.word_id, p))
        })
        .collect();

    let mut cycles = Vec::new();
    let mut done: HashSet<u64> = HashSet::new();

    for &start in parents.keys() {
        if done.contains(&start) {
            continue;
        }

        let mut path: Vec<u64> = Vec::new();
        let mut on_path: HashMap<u64, usize> = HashMap::new();
        let mut current = Some(start);

        while let Some(node) = current {
            if done.contains(&node) {
                break;
            }
            if let Some(&pos) = on_path.get(&node) {
                let mut cycle = path[pos..].to_vec();
                cycle.push(node);
                cycles.push(cycle);
                break;
            }
            on_path.insert(node, path.len());
            path.push(node);
            current = parents.get(&node).copied();
        }

        done.extend(path);
    }

    cycles
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::idmap::{build_id_map, hierarchy_index};
    use crate::models::{FeatureMap, Hierarchy, NamespaceLayout};

    fn src(word_id: u64, rank: u32, surface: &str) -> Word {
        Word {
            word_id,
            book: "JHN".to_string(),
            chapter: 1,
            verse: 1,
            rank,
            surface: surface.to_string(),
            features: FeatureMap::new(),
        }
    }

    fn refw(node_id: u64, rank: u32, lemma: &str, hierarchy: Hierarchy) -> ReferenceWord {
        let mut features = FeatureMap::new();
        features.insert("lemma".to_string(), FeatureValue::from(lemma));
        ReferenceWord {
            node_id,
            book: "John".to_string(),
            chapter: 1,
            verse: 1,
            rank,
            surface: lemma.to_string(),
            features,
            hierarchy,
        }
    }

    fn pair(source_word_id: u64, reference_node_id: u64) -> AlignmentPair {
        AlignmentPair {
            source_word_id,
            reference_node_id,
            book: "JHN".to_string(),
            reference_book: "John".to_string(),
            chapter: 1,
            verse: 1,
            source_rank: 1,
            reference_rank: 1,
            surface: String::new(),
        }
    }

    fn features() -> Vec<String> {
        ["lemma", "parent", "clause_id", "phrase_id"]
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    #[test]
    fn test_transplant_translates_pointers() {
        let source = vec![src(1, 1, "ἐν"), src(2, 2, "ἀρχῇ"), src(3, 3, "ἦν")];
        let reference = vec![
            refw(
                100,
                1,
                "ἐν",
                Hierarchy { clause_id: Some(900), phrase_id: Some(800), parent: Some(800) },
            ),
            refw(
                101,
                2,
                "ἀρχή",
                Hierarchy { clause_id: Some(900), phrase_id: Some(800), parent: Some(100) },
            ),
        ];
        let pairs = vec![pair(1, 100), pair(2, 101)];
        let id_map = build_id_map(&pairs, &hierarchy_index(&reference), &NamespaceLayout::default())
            .unwrap();

        let outcome = transplant(&source, &reference, &pairs, &id_map, &features());

        assert_eq!(outcome.aligned_count(), 2);
        assert_eq!(outcome.broken_reference_count(), 0);

        let first = &outcome.words[0].word.features;
        assert_eq!(first["lemma"], FeatureValue::from("ἐν"));
        assert_eq!(first["clause_id"], FeatureValue::Int(1_000_000));
        assert_eq!(first["phrase_id"], FeatureValue::Int(2_000_000));
        assert_eq!(first["parent"], FeatureValue::Int(2_000_000));

        let second = &outcome.words[1].word.features;
        assert_eq!(second["parent"], FeatureValue::Int(1));
        assert_eq!(outcome.words[1].reference_node_id, Some(101));

        let third = &outcome.words[2];
        assert!(!third.aligned);
        assert_eq!(third.provenance, Provenance::FromOtherSource);
        assert!(third.word.features.is_empty());
    }

    #[test]
    fn test_unmapped_parent_is_flagged_and_broken() {
        let source = vec![src(1, 1, "ὅτι")];
        let reference = vec![refw(
            100,
            1,
            "ὅτι",
            Hierarchy { clause_id: None, phrase_id: None, parent: Some(555) },
        )];
        let pairs = vec![pair(1, 100)];
        let id_map = build_id_map(&pairs, &hierarchy_index(&reference), &NamespaceLayout::default())
            .unwrap();

        let outcome = transplant(&source, &reference, &pairs, &id_map, &features());

        assert_eq!(outcome.words[0].unresolved, vec!["parent".to_string()]);
        assert_eq!(outcome.words[0].word.features["parent"], FeatureValue::Int(555));
        assert_eq!(outcome.unresolved_count(), 1);
        assert_eq!(
            outcome.broken_references,
            vec![BrokenReference { word_id: 1, field: HierarchyField::Parent, target: 555 }]
        );
    }

    #[test]
    fn test_untranslated_parent_matching_source_id_is_broken() {
        // Word 101 exists in the source, but reference node 101 is unaligned
        let mut later = src(101, 1, "λέγει");
        later.verse = 2;
        let source = vec![src(1, 1, "ἐδάκρυσεν"), src(2, 2, "Ἰησοῦς"), later];
        let reference = vec![
            refw(
                100,
                1,
                "δακρύω",
                Hierarchy { clause_id: None, phrase_id: None, parent: Some(101) },
            ),
            refw(
                101,
                2,
                "ὁ",
                Hierarchy { clause_id: None, phrase_id: None, parent: Some(100) },
            ),
            refw(
                102,
                3,
                "Ἰησοῦς",
                Hierarchy { clause_id: None, phrase_id: None, parent: Some(100) },
            ),
        ];
        let pairs = vec![pair(1, 100), pair(2, 102)];
        let id_map = build_id_map(&pairs, &hierarchy_index(&reference), &NamespaceLayout::default())
            .unwrap();

        let outcome = transplant(&source, &reference, &pairs, &id_map, &features());

        assert_eq!(outcome.words[0].word.features["parent"], FeatureValue::Int(101));
        assert_eq!(outcome.words[0].unresolved, vec!["parent".to_string()]);
        assert_eq!(outcome.words[1].word.features["parent"], FeatureValue::Int(1));
        assert_eq!(
            outcome.broken_references,
            vec![BrokenReference { word_id: 1, field: HierarchyField::Parent, target: 101 }]
        );
    }

    #[test]
    fn test_untranslated_parent_not_followed_for_cycles() {
        let mut first = with_parent(1, 2);
        first.unresolved.push("parent".to_string());
        let words = vec![first, with_parent(2, 1)];
        assert!(find_parent_cycles(&words).is_empty());
    }

    #[test]
    fn test_root_parent_not_broken() {
        let mut word = src(1, 1, "ἀμήν");
        word.features.insert("parent".to_string(), FeatureValue::Int(0));
        let words = vec![TransplantedWord {
            word,
            aligned: false,
            provenance: Provenance::FromOtherSource,
            reference_node_id: None,
            unresolved: Vec::new(),
        }];
        assert!(validate_references(&words, &IdMap::default()).is_empty());
    }

    #[test]
    fn test_absent_reference_feature_clears_source_value() {
        let mut word = src(1, 1, "λέγει");
        word.features.insert("gloss".to_string(), FeatureValue::from("says"));
        let reference = vec![refw(100, 1, "λέγω", Hierarchy::default())];
        let pairs = vec![pair(1, 100)];
        let id_map = build_id_map(&pairs, &hierarchy_index(&reference), &NamespaceLayout::default())
            .unwrap();

        let outcome = transplant(&[word], &reference, &pairs, &id_map, &["gloss".to_string()]);
        assert!(!outcome.words[0].word.features.contains_key("gloss"));
    }

    fn with_parent(word_id: u64, parent: u64) -> TransplantedWord {
        let mut word = src(word_id, 1, "");
        word.features.insert("parent".to_string(), FeatureValue::Int(parent as i64));
        TransplantedWord {
            word,
            aligned: true,
            provenance: Provenance::FromReference,
            reference_node_id: None,
            unresolved: Vec::new(),
        }
    }

    #[test]
    fn test_parent_cycle_detection() {
        let words = vec![
            with_parent(1, 2),
            with_parent(2, 3),
            with_parent(3, 1),
            with_parent(4, 1),
            with_parent(5, 0),
        ];
        let cycles = find_parent_cycles(&words);
        assert_eq!(cycles, vec![vec![1, 2, 3, 1]]);
    }

    #[test]
    fn test_no_cycles_in_tree() {
        let words = vec![with_parent(1, 2_000_000), with_parent(2, 1), with_parent(3, 1)];
        assert!(find_parent_cycles(&words).is_empty());
    }
}
