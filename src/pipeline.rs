//! End-to-end run: align, group gaps, translate ids, transplant.

use serde::Serialize;
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::{info, warn};

use crate::books::BookNameMap;
use crate::config::{self, ConfigError};
use crate::corpus::{align_corpus, Corpus, CorpusAlignment};
use crate::idmap::{build_id_map, check_word_ids, hierarchy_index, IdMap, IdMapError};
use crate::models::{AlignmentParams, NodeType, ReferenceWord, Span, Word};
use crate::spans::{group_gaps, GapSummary};
use crate::transplant::{find_parent_cycles, transplant, TransplantOutcome};

/// Crate version recorded in run summaries
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Longest spans listed in the gap summary
const LONGEST_SPANS: usize = 10;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
    #[error("Id translation error: {0}")]
    IdMap(#[from] IdMapError),
}

/// Headline numbers of a run
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub version: String,
    pub source_words: usize,
    pub reference_words: usize,
    pub aligned_words: usize,
    pub gap_words: usize,
    pub alignment_rate: f64,
    pub spans: usize,
    pub id_mappings: BTreeMap<NodeType, usize>,
    pub duplicate_word_refs: usize,
    pub unresolved_pointers: usize,
    pub broken_references: usize,
    pub parent_cycles: usize,
}

/// Everything a run produces
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub alignment: CorpusAlignment,
    pub spans: Vec<Span>,
    pub gap_summary: GapSummary,
    pub id_map: IdMap,
    pub transplant: TransplantOutcome,
    pub parent_cycles: Vec<Vec<u64>>,
    pub summary: RunSummary,
}

/// Run every stage over two loaded word tables.
///
/// Configuration problems (invalid params, source ids inside a container
/// namespace, namespace overflow) abort before anything is produced. Missing
/// books and broken pointers only show up in the output.
pub fn run_pipeline(
    source_words: &[Word],
    reference_words: &[ReferenceWord],
    book_names: &BookNameMap,
    params: &AlignmentParams,
    show_progress: bool,
) -> Result<PipelineOutput, PipelineError> {
    config::validate(params)?;
    check_word_ids(source_words.iter().map(|w| w.word_id), &params.namespaces)?;

    if show_progress {
        eprintln!(
            "Loaded {} source words, {} reference words",
            source_words.len(),
            reference_words.len()
        );
    }

    let source = Corpus::from_words(source_words.iter().cloned());
    let reference = Corpus::from_words(reference_words.iter().cloned());
    info!(
        source_books = source.books().len(),
        reference_books = reference.books().len(),
        "aligning corpora"
    );

    let alignment = align_corpus(
        &source,
        &reference,
        book_names,
        &params.feature_names,
        show_progress,
    );

    // Canonical order: book, chapter, verse, rank
    let words: Vec<Word> = source.words().cloned().collect();

    let spans = group_gaps(&alignment.gaps, &words, &params.span_policy);
    let gap_summary = GapSummary::from_spans(&alignment.gaps, &spans, LONGEST_SPANS);

    let id_map = build_id_map(
        &alignment.pairs,
        &hierarchy_index(reference_words),
        &params.namespaces,
    )?;
    if id_map.duplicate_word_refs() > 0 {
        warn!(
            duplicates = id_map.duplicate_word_refs(),
            "reference words aligned through more than one source book; first alignment kept"
        );
    }

    let transplanted = transplant(
        &words,
        reference_words,
        &alignment.pairs,
        &id_map,
        &params.transplant_features,
    );

    let parent_cycles = find_parent_cycles(&transplanted.words);
    if !parent_cycles.is_empty() {
        warn!(cycles = parent_cycles.len(), "parent pointers form cycles");
    }

    let id_mappings = [NodeType::Word, NodeType::Clause, NodeType::Phrase]
        .into_iter()
        .map(|nt| (nt, id_map.count(nt)))
        .collect();

    let summary = RunSummary {
        version: VERSION.to_string(),
        source_words: alignment.stats.total_source_words,
        reference_words: reference_words.len(),
        aligned_words: alignment.stats.total_aligned,
        gap_words: alignment.stats.total_gaps,
        alignment_rate: alignment.stats.alignment_rate,
        spans: spans.len(),
        id_mappings,
        duplicate_word_refs: id_map.duplicate_word_refs(),
        unresolved_pointers: transplanted.unresolved_count(),
        broken_references: transplanted.broken_reference_count(),
        parent_cycles: parent_cycles.len(),
    };

    info!(
        aligned = summary.aligned_words,
        gaps = summary.gap_words,
        spans = summary.spans,
        "pipeline finished"
    );

    Ok(PipelineOutput {
        alignment,
        spans,
        gap_summary,
        id_map,
        transplant: transplanted,
        parent_cycles,
        summary,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FeatureMap, Hierarchy};

    fn src(word_id: u64, rank: u32, surface: &str) -> Word {
        Word {
            word_id,
            book: "JHN".to_string(),
            chapter: 3,
            verse: 16,
            rank,
            surface: surface.to_string(),
            features: FeatureMap::new(),
        }
    }

    fn refw(node_id: u64, rank: u32, surface: &str) -> ReferenceWord {
        ReferenceWord {
            node_id,
            book: "John".to_string(),
            chapter: 3,
            verse: 16,
            rank,
            surface: surface.to_string(),
            features: FeatureMap::new(),
            hierarchy: Hierarchy {
                clause_id: Some(700),
                phrase_id: Some(600),
                parent: Some(600),
            },
        }
    }

    #[test]
    fn test_pipeline_summary() {
        let source = vec![src(1, 1, "οὕτως"), src(2, 2, "γὰρ"), src(3, 3, "ἠγάπησεν")];
        let reference = vec![refw(10, 1, "οὕτως"), refw(11, 2, "γὰρ")];

        let output = run_pipeline(
            &source,
            &reference,
            &BookNameMap::new_testament(),
            &AlignmentParams::default(),
            false,
        )
        .unwrap();

        assert_eq!(output.summary.aligned_words, 2);
        assert_eq!(output.summary.gap_words, 1);
        assert_eq!(output.summary.spans, 1);
        assert_eq!(output.summary.id_mappings[&NodeType::Clause], 1);
        assert_eq!(output.summary.broken_references, 0);
        assert_eq!(output.transplant.words.len(), 3);
    }

    #[test]
    fn test_word_id_inside_namespace_is_fatal() {
        let source = vec![src(1_500_000, 1, "οὕτως")];
        let err = run_pipeline(
            &source,
            &[],
            &BookNameMap::new(),
            &AlignmentParams::default(),
            false,
        )
        .unwrap_err();
        assert!(matches!(err, PipelineError::IdMap(IdMapError::WordIdCollision { .. })));
    }

    #[test]
    fn test_invalid_params_are_fatal() {
        let mut params = AlignmentParams::default();
        params.feature_names.clear();
        let err = run_pipeline(&[], &[], &BookNameMap::new(), &params, false).unwrap_err();
        assert!(matches!(err, PipelineError::Config(ConfigError::EmptyFeatureNames)));
    }
}
