//! Corpus-wide alignment orchestration.
//!
//! This module groups both word tables by book and verse, resolves source book
//! codes to reference book names, runs the verse aligner over every verse the
//! two corpora share, and turns everything else into gap records.

use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use std::collections::{BTreeMap, HashMap};
use thiserror::Error;
use tracing::{debug, warn};

use crate::align::align_verse;
use crate::books::BookNameMap;
use crate::models::*;

/// One book of a corpus, verses in canonical order, words in rank order.
#[derive(Debug, Clone)]
pub struct Book<W> {
    pub name: String,
    pub verses: BTreeMap<VerseKey, Vec<W>>,
}

impl<W> Book<W> {
    pub fn word_count(&self) -> usize {
        self.verses.values().map(Vec::len).sum()
    }

    pub fn verse(&self, chapter: u32, verse: u32) -> Option<&[W]> {
        self.verses.get(&(chapter, verse)).map(Vec::as_slice)
    }
}

/// A word table grouped by book (first-appearance order) and verse.
#[derive(Debug, Clone)]
pub struct Corpus<W> {
    books: Vec<Book<W>>,
    index: HashMap<String, usize>,
}

impl<W: WordRecord> Corpus<W> {
    /// Group a flat word table. Words inside a verse are sorted by rank.
    pub fn from_words<I: IntoIterator<Item = W>>(words: I) -> Self {
        let mut books: Vec<Book<W>> = Vec::new();
        let mut index: HashMap<String, usize> = HashMap::new();

        for word in words {
            let idx = match index.get(word.book()) {
                Some(&idx) => idx,
                None => {
                    let idx = books.len();
                    index.insert(word.book().to_string(), idx);
                    books.push(Book {
                        name: word.book().to_string(),
                        verses: BTreeMap::new(),
                    });
                    idx
                }
            };
            books[idx]
                .verses
                .entry(word.verse_key())
                .or_default()
                .push(word);
        }

        for book in &mut books {
            for words in book.verses.values_mut() {
                words.sort_by_key(|w| w.rank());
            }
        }

        Corpus { books, index }
    }
}

impl<W> Corpus<W> {
    pub fn books(&self) -> &[Book<W>] {
        &self.books
    }

    pub fn book(&self, name: &str) -> Option<&Book<W>> {
        self.index.get(name).map(|&idx| &self.books[idx])
    }

    pub fn word_count(&self) -> usize {
        self.books.iter().map(Book::word_count).sum()
    }

    pub fn verse_count(&self) -> usize {
        self.books.iter().map(|b| b.verses.len()).sum()
    }

    /// All words in book, verse, rank order.
    pub fn words(&self) -> impl Iterator<Item = &W> {
        self.books
            .iter()
            .flat_map(|b| b.verses.values().flat_map(|v| v.iter()))
    }
}

/// Output of a corpus alignment run
#[derive(Debug, Clone)]
pub struct CorpusAlignment {
    pub pairs: Vec<AlignmentPair>,
    pub gaps: Vec<Gap>,
    pub stats: AlignmentStats,
}

/// Alignment results for one verse
#[derive(Debug, Default)]
struct VerseOutcome {
    pairs: Vec<AlignmentPair>,
    gaps: Vec<Gap>,
}

/// Alignment results for one book
#[derive(Debug)]
struct BookOutcome {
    pairs: Vec<AlignmentPair>,
    gaps: Vec<Gap>,
    stats: BookStats,
}

/// Align every source book against its reference counterpart.
///
/// Books and verses are aligned in parallel; results are written to per-verse
/// slots and concatenated in canonical order, so the output does not depend
/// on scheduling.
pub fn align_corpus(
    source: &Corpus<Word>,
    reference: &Corpus<ReferenceWord>,
    book_names: &BookNameMap,
    feature_names: &[String],
    show_progress: bool,
) -> CorpusAlignment {
    let progress = if show_progress {
        let pb = ProgressBar::new(source.verse_count() as u64);
        let style = ProgressStyle::default_bar()
            .template(
                "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} verses ({per_sec})",
            )
            .map(|s| s.progress_chars("#>-"))
            .unwrap_or_else(|_| ProgressStyle::default_bar());
        pb.set_style(style);
        Some(pb)
    } else {
        None
    };

    let outcomes: Vec<BookOutcome> = source
        .books()
        .par_iter()
        .map(|book| {
            let reference_name = book_names.resolve(&book.name);
            align_book(
                book,
                reference.book(reference_name),
                reference_name,
                feature_names,
                progress.as_ref(),
            )
        })
        .collect();

    if let Some(pb) = progress {
        pb.finish_with_message("Done");
    }

    let mut pairs = Vec::new();
    let mut gaps = Vec::new();
    let mut books = Vec::with_capacity(outcomes.len());
    for outcome in outcomes {
        pairs.extend(outcome.pairs);
        gaps.extend(outcome.gaps);
        books.push(outcome.stats);
    }

    let stats = build_stats(&pairs, &gaps, books);
    CorpusAlignment { pairs, gaps, stats }
}

/// Align a single source book.
fn align_book(
    book: &Book<Word>,
    reference: Option<&Book<ReferenceWord>>,
    reference_name: &str,
    feature_names: &[String],
    progress: Option<&ProgressBar>,
) -> BookOutcome {
    let source_words = book.word_count();

    let Some(reference) = reference else {
        warn!(
            book = %book.name,
            reference_book = %reference_name,
            words = source_words,
            "no reference data for book; every word becomes a gap"
        );
        let gaps: Vec<Gap> = book
            .verses
            .values()
            .flatten()
            .map(|w| Gap::from_word(w, GapKind::ReferenceBookMissing))
            .collect();
        if let Some(pb) = progress {
            pb.inc(book.verses.len() as u64);
        }
        return BookOutcome {
            pairs: Vec::new(),
            stats: BookStats {
                book: book.name.clone(),
                reference_book: reference_name.to_string(),
                source_words,
                reference_words: 0,
                aligned_words: 0,
                gap_words: gaps.len(),
                common_verses: 0,
                source_only_verses: book.verses.len(),
                reference_only_verses: 0,
                alignment_rate: 0.0,
            },
            gaps,
        };
    };

    let verses: Vec<(&VerseKey, &Vec<Word>)> = book.verses.iter().collect();

    let outcomes: Vec<VerseOutcome> = verses
        .par_iter()
        .map(|&(key, words)| {
            let outcome = match reference.verses.get(key) {
                Some(reference_words) => {
                    align_common_verse(words, reference_words, reference_name, feature_names)
                }
                None => VerseOutcome {
                    pairs: Vec::new(),
                    gaps: words
                        .iter()
                        .map(|w| Gap::from_word(w, GapKind::SourceOnlyVerse))
                        .collect(),
                },
            };
            if let Some(pb) = progress {
                pb.inc(1);
            }
            outcome
        })
        .collect();

    let common_verses = verses
        .iter()
        .filter(|(key, _)| reference.verses.contains_key(*key))
        .count();
    let source_only_verses = verses.len() - common_verses;
    let reference_only_verses = reference
        .verses
        .keys()
        .filter(|key| !book.verses.contains_key(*key))
        .count();

    let mut pairs = Vec::new();
    let mut gaps = Vec::new();
    for outcome in outcomes {
        pairs.extend(outcome.pairs);
        gaps.extend(outcome.gaps);
    }

    debug!(
        book = %book.name,
        aligned = pairs.len(),
        gaps = gaps.len(),
        "book aligned"
    );

    BookOutcome {
        stats: BookStats {
            book: book.name.clone(),
            reference_book: reference_name.to_string(),
            source_words,
            reference_words: reference.word_count(),
            aligned_words: pairs.len(),
            gap_words: gaps.len(),
            common_verses,
            source_only_verses,
            reference_only_verses,
            alignment_rate: rate_percent(pairs.len(), source_words),
        },
        pairs,
        gaps,
    }
}

/// Align a verse present in both corpora.
fn align_common_verse(
    words: &[Word],
    reference_words: &[ReferenceWord],
    reference_name: &str,
    feature_names: &[String],
) -> VerseOutcome {
    let alignment = align_verse(words, reference_words, feature_names);

    let pairs = alignment
        .pairs
        .iter()
        .map(|&(si, ri)| {
            let s = &words[si];
            let r = &reference_words[ri];
            AlignmentPair {
                source_word_id: s.word_id,
                reference_node_id: r.node_id,
                book: s.book.clone(),
                reference_book: reference_name.to_string(),
                chapter: s.chapter,
                verse: s.verse,
                source_rank: s.rank,
                reference_rank: r.rank,
                surface: s.surface.clone(),
            }
        })
        .collect();

    let gaps = alignment
        .source_gaps
        .iter()
        .map(|&si| Gap::from_word(&words[si], GapKind::Unmatched))
        .collect();

    VerseOutcome { pairs, gaps }
}

/// Roll per-book stats up into corpus totals.
fn build_stats(pairs: &[AlignmentPair], gaps: &[Gap], books: Vec<BookStats>) -> AlignmentStats {
    let total_source_words: usize = books.iter().map(|b| b.source_words).sum();

    let mut gap_kind_counts: BTreeMap<GapKind, usize> = BTreeMap::new();
    for gap in gaps {
        *gap_kind_counts.entry(gap.kind).or_default() += 1;
    }

    AlignmentStats {
        total_source_words,
        total_aligned: pairs.len(),
        total_gaps: gaps.len(),
        alignment_rate: rate_percent(pairs.len(), total_source_words),
        gap_kind_counts,
        books,
    }
}

#[derive(Error, Debug)]
pub enum CoverageError {
    #[error("alignment rate below {min_rate:.1}% for: {}", .books.join(", "))]
    BelowThreshold { min_rate: f64, books: Vec<String> },
}

/// Acceptance check: every book must reach `min_rate` percent alignment.
pub fn check_alignment_rate(stats: &AlignmentStats, min_rate: f64) -> Result<(), CoverageError> {
    let failing: Vec<String> = stats
        .books
        .iter()
        .filter(|b| b.alignment_rate < min_rate)
        .map(|b| format!("{} ({:.1}%)", b.book, b.alignment_rate))
        .collect();

    if failing.is_empty() {
        Ok(())
    } else {
        Err(CoverageError::BelowThreshold {
            min_rate,
            books: failing,
        })
    }
}
