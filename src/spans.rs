//! Group gap words into contiguous spans.
//!
//! A span is a run of gap words in one verse whose ranks increase by exactly
//! one. Each span becomes one unit of downstream annotation work.

use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

use crate::models::{Gap, GapKind, SpanCategory, Span, SpanPolicy, Word};

/// Classify a span by origin and size.
pub fn categorize(gap_kind: GapKind, word_count: usize, policy: &SpanPolicy) -> SpanCategory {
    if gap_kind == GapKind::SourceOnlyVerse {
        SpanCategory::FullVerse
    } else if word_count <= 1 {
        SpanCategory::SingleWord
    } else if word_count <= policy.short_phrase_max {
        SpanCategory::ShortPhrase
    } else {
        SpanCategory::LongPhrase
    }
}

/// Span under construction
struct OpenSpan<'a> {
    book: &'a str,
    chapter: u32,
    verse: u32,
    start_rank: u32,
    end_rank: u32,
    word_ids: Vec<u64>,
    gap_kind: GapKind,
}

impl<'a> OpenSpan<'a> {
    fn start(gap: &'a Gap) -> Self {
        OpenSpan {
            book: &gap.book,
            chapter: gap.chapter,
            verse: gap.verse,
            start_rank: gap.rank,
            end_rank: gap.rank,
            word_ids: vec![gap.word_id],
            gap_kind: gap.kind,
        }
    }

    fn extends_with(&self, gap: &Gap) -> bool {
        self.book == gap.book
            && self.chapter == gap.chapter
            && self.verse == gap.verse
            && gap.rank == self.end_rank + 1
    }

    fn close(self, span_id: u32, surfaces: &HashMap<u64, &str>, policy: &SpanPolicy) -> Span {
        let text = self
            .word_ids
            .iter()
            .filter_map(|id| surfaces.get(id).copied())
            .collect::<Vec<_>>()
            .join(" ");
        let category = categorize(self.gap_kind, self.word_ids.len(), policy);
        Span {
            span_id,
            book: self.book.to_string(),
            chapter: self.chapter,
            verse: self.verse,
            start_rank: self.start_rank,
            end_rank: self.end_rank,
            word_ids: self.word_ids,
            text,
            gap_kind: self.gap_kind,
            category,
        }
    }
}

/// Merge gaps into spans.
///
/// Gaps are sorted by (book, chapter, verse, rank) first, so input order does
/// not matter. Span ids start at 1 in that order. `words` supplies the surface
/// text; ids missing from it contribute nothing to the span text.
pub fn group_gaps(gaps: &[Gap], words: &[Word], policy: &SpanPolicy) -> Vec<Span> {
    let surfaces: HashMap<u64, &str> = words
        .iter()
        .map(|w| (w.word_id, w.surface.as_str()))
        .collect();

    let mut sorted: Vec<&Gap> = gaps.iter().collect();
    sorted.sort_by(|a, b| {
        (&a.book, a.chapter, a.verse, a.rank).cmp(&(&b.book, b.chapter, b.verse, b.rank))
    });

    let mut spans = Vec::new();
    let mut current: Option<OpenSpan> = None;

    for gap in sorted {
        if let Some(span) = current.as_mut().filter(|s| s.extends_with(gap)) {
            span.end_rank = gap.rank;
            span.word_ids.push(gap.word_id);
            continue;
        }
        if let Some(done) = current.take() {
            let span_id = spans.len() as u32 + 1;
            spans.push(done.close(span_id, &surfaces, policy));
        }
        current = Some(OpenSpan::start(gap));
    }

    if let Some(done) = current {
        let span_id = spans.len() as u32 + 1;
        spans.push(done.close(span_id, &surfaces, policy));
    }

    spans
}

// ============================================================================
// Gap analysis summary
// ============================================================================

/// Per-book span totals
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BookSpanStats {
    pub spans: usize,
    pub words: usize,
}

/// Aggregate view of gaps and spans for review reports
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GapSummary {
    pub total_gap_words: usize,
    pub total_spans: usize,
    pub avg_span_size: f64,
    pub gap_kinds: BTreeMap<GapKind, usize>,
    pub categories: BTreeMap<SpanCategory, usize>,
    pub books: BTreeMap<String, BookSpanStats>,
    pub longest_span_ids: Vec<u32>, // Largest first, ties by span id
}

impl GapSummary {
    /// Summarise gaps and the spans built from them. Keeps the `top_n` longest span ids.
    pub fn from_spans(gaps: &[Gap], spans: &[Span], top_n: usize) -> Self {
        let mut gap_kinds = BTreeMap::new();
        for gap in gaps {
            *gap_kinds.entry(gap.kind).or_default() += 1;
        }

        let mut categories = BTreeMap::new();
        let mut books: BTreeMap<String, BookSpanStats> = BTreeMap::new();
        for span in spans {
            *categories.entry(span.category).or_default() += 1;
            let entry = books.entry(span.book.clone()).or_default();
            entry.spans += 1;
            entry.words += span.word_count();
        }

        let span_words: usize = spans.iter().map(Span::word_count).sum();
        let avg_span_size = if spans.is_empty() {
            0.0
        } else {
            span_words as f64 / spans.len() as f64
        };

        let mut by_size: Vec<&Span> = spans.iter().collect();
        by_size.sort_by(|a, b| {
            b.word_count()
                .cmp(&a.word_count())
                .then(a.span_id.cmp(&b.span_id))
        });
        let longest_span_ids = by_size.iter().take(top_n).map(|s| s.span_id).collect();

        GapSummary {
            total_gap_words: gaps.len(),
            total_spans: spans.len(),
            avg_span_size,
            gap_kinds,
            categories,
            books,
            longest_span_ids,
        }
    }
}
