//! Verse Transplant Library
//!
//! Aligns two independently tokenized editions of the same corpus word by word
//! within each verse, groups the unmatched residue into spans, and transplants
//! the reference edition's annotations onto the aligned source words with
//! node ids translated into a collision-free id space.
//!
//! # Example
//!
//! ```no_run
//! use verse_transplant::prelude::*;
//! use std::path::Path;
//!
//! let db_path = Path::new("corpus.db");
//! let params = AlignmentParams::default();
//!
//! // Load both word tables
//! let source = load_source_words(db_path).unwrap();
//! let reference = load_reference_words(db_path).unwrap();
//! let books = book_name_map(&params, load_book_names(db_path).unwrap());
//!
//! // Align, group gaps, translate ids and transplant
//! let output = run_pipeline(&source, &reference, &books, &params, false).unwrap();
//!
//! println!("Aligned {:.2}% of source words", output.summary.alignment_rate);
//! write_outputs(&output, Path::new("out")).unwrap();
//! ```
//!
//! # Single verse
//!
//! ```
//! use verse_transplant::prelude::*;
//!
//! let source = ["Ἐν", "ἀρχῇ", "ἦν"].map(String::from);
//! let reference = ["Ἐν", "ἦν"].map(String::from);
//!
//! let alignment = align_keys(&source, &reference);
//! assert_eq!(alignment.pairs, vec![(0, 0), (2, 1)]);
//! assert_eq!(alignment.source_gaps, vec![1]);
//! ```

pub mod align;
pub mod books;
pub mod config;
pub mod corpus;
pub mod db;
pub mod idmap;
pub mod key;
pub mod models;
pub mod output;
pub mod pipeline;
pub mod spans;
pub mod transplant;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::align::{align_keys, align_verse, matching_blocks, MatchingBlock, VerseAlignment};
    pub use crate::books::BookNameMap;
    pub use crate::config::{book_name_map, load_params, validate, ConfigError};
    pub use crate::corpus::{
        align_corpus, check_alignment_rate, Book, Corpus, CorpusAlignment, CoverageError,
    };
    pub use crate::db::{
        load_book_names, load_corpus_stats, load_reference_words, load_source_words, DbError,
    };
    pub use crate::idmap::{build_id_map, check_word_ids, hierarchy_index, IdMap, IdMapError};
    pub use crate::key::{build_key, build_keys, KEY_SEPARATOR};
    pub use crate::models::{
        AlignmentPair, AlignmentParams, AlignmentStats, BookStats, CorpusStats, FeatureMap,
        FeatureValue, Gap, GapKind, Hierarchy, HierarchyField, IdMapping, NamespaceLayout,
        NodeType, Provenance, ReferenceWord, Span, SpanCategory, SpanPolicy, TransplantedWord,
        Word, WordRecord,
    };
    pub use crate::output::{
        print_gap_summary, print_run_summary, print_summary, write_json, write_json_file,
        write_outputs, OutputError,
    };
    pub use crate::pipeline::{run_pipeline, PipelineError, PipelineOutput, RunSummary};
    pub use crate::spans::{group_gaps, GapSummary};
    pub use crate::transplant::{
        find_parent_cycles, transplant, validate_references, BrokenReference, TransplantOutcome,
    };
}

// Re-export commonly used types at the crate root
pub use models::{AlignmentPair, AlignmentParams, Gap, ReferenceWord, Span, TransplantedWord, Word};
