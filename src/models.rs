//! Data structures for the verse alignment and transplant pipeline.

use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;

/// (chapter, verse) key within a book
pub type VerseKey = (u32, u32);

/// A single annotation value. Pointers and counts are integers, everything else text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FeatureValue {
    Int(i64),
    Text(String),
}

impl FeatureValue {
    /// Text form used for key building and CSV output.
    pub fn as_text(&self) -> Cow<'_, str> {
        match self {
            FeatureValue::Int(v) => Cow::Owned(v.to_string()),
            FeatureValue::Text(s) => Cow::Borrowed(s.as_str()),
        }
    }

    /// Integer value, if this feature holds one (text digits are accepted too).
    pub fn as_id(&self) -> Option<u64> {
        match self {
            FeatureValue::Int(v) => u64::try_from(*v).ok(),
            FeatureValue::Text(s) => s.trim().parse().ok(),
        }
    }
}

/// Ids above `i64::MAX` are kept as decimal text so `as_id` still reads them back.
impl From<u64> for FeatureValue {
    fn from(v: u64) -> Self {
        match i64::try_from(v) {
            Ok(v) => FeatureValue::Int(v),
            Err(_) => FeatureValue::Text(v.to_string()),
        }
    }
}

impl From<&str> for FeatureValue {
    fn from(v: &str) -> Self {
        FeatureValue::Text(v.to_string())
    }
}

/// Ordered so serialized output is byte-stable between runs.
pub type FeatureMap = BTreeMap<String, FeatureValue>;

/// Anything the key builder can read features from.
pub trait WordRecord {
    fn book(&self) -> &str;
    fn chapter(&self) -> u32;
    fn verse(&self) -> u32;
    fn rank(&self) -> u32;
    fn surface(&self) -> &str;

    /// Look up a feature by name. `surface` (or `word`) resolves to the surface form.
    fn feature(&self, name: &str) -> Option<Cow<'_, str>>;

    fn verse_key(&self) -> VerseKey {
        (self.chapter(), self.verse())
    }
}

/// A source-corpus word
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Word {
    pub word_id: u64,
    pub book: String,
    pub chapter: u32,
    pub verse: u32,
    pub rank: u32, // 1-based position within the verse
    pub surface: String,
    #[serde(default)]
    pub features: FeatureMap,
}

impl WordRecord for Word {
    fn book(&self) -> &str {
        &self.book
    }

    fn chapter(&self) -> u32 {
        self.chapter
    }

    fn verse(&self) -> u32 {
        self.verse
    }

    fn rank(&self) -> u32 {
        self.rank
    }

    fn surface(&self) -> &str {
        &self.surface
    }

    fn feature(&self, name: &str) -> Option<Cow<'_, str>> {
        match name {
            "surface" | "word" => Some(Cow::Borrowed(self.surface.as_str())),
            _ => self.features.get(name).map(FeatureValue::as_text),
        }
    }
}

/// Containment columns of a reference word
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hierarchy {
    pub clause_id: Option<u64>,
    pub phrase_id: Option<u64>,
    pub parent: Option<u64>,
}

impl Hierarchy {
    pub fn get(&self, field: HierarchyField) -> Option<u64> {
        match field {
            HierarchyField::Parent => self.parent,
            HierarchyField::Clause => self.clause_id,
            HierarchyField::Phrase => self.phrase_id,
        }
    }
}

/// A reference-corpus word node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceWord {
    pub node_id: u64,
    pub book: String,
    pub chapter: u32,
    pub verse: u32,
    pub rank: u32,
    pub surface: String,
    #[serde(default)]
    pub features: FeatureMap,
    #[serde(default)]
    pub hierarchy: Hierarchy,
}

impl WordRecord for ReferenceWord {
    fn book(&self) -> &str {
        &self.book
    }

    fn chapter(&self) -> u32 {
        self.chapter
    }

    fn verse(&self) -> u32 {
        self.verse
    }

    fn rank(&self) -> u32 {
        self.rank
    }

    fn surface(&self) -> &str {
        &self.surface
    }

    fn feature(&self, name: &str) -> Option<Cow<'_, str>> {
        if let Some(field) = HierarchyField::from_name(name) {
            return self
                .hierarchy
                .get(field)
                .map(|id| Cow::Owned(id.to_string()));
        }
        match name {
            "surface" | "word" => Some(Cow::Borrowed(self.surface.as_str())),
            _ => self.features.get(name).map(FeatureValue::as_text),
        }
    }
}

/// Feature columns that hold node pointers rather than plain values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HierarchyField {
    Parent,
    Clause,
    Phrase,
}

impl HierarchyField {
    pub const ALL: [HierarchyField; 3] = [
        HierarchyField::Parent,
        HierarchyField::Clause,
        HierarchyField::Phrase,
    ];

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "parent" => Some(HierarchyField::Parent),
            "clause_id" => Some(HierarchyField::Clause),
            "phrase_id" => Some(HierarchyField::Phrase),
            _ => None,
        }
    }

    /// Column / feature name
    pub fn name(self) -> &'static str {
        match self {
            HierarchyField::Parent => "parent",
            HierarchyField::Clause => "clause_id",
            HierarchyField::Phrase => "phrase_id",
        }
    }

    /// Namespaces searched, in order, when translating this pointer.
    pub fn lookup_order(self) -> &'static [NodeType] {
        match self {
            HierarchyField::Parent => &[NodeType::Word, NodeType::Phrase, NodeType::Clause],
            HierarchyField::Clause => &[NodeType::Clause],
            HierarchyField::Phrase => &[NodeType::Phrase],
        }
    }
}

// ============================================================================
// Alignment output
// ============================================================================

/// A source word matched to a reference node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlignmentPair {
    pub source_word_id: u64,
    pub reference_node_id: u64,
    pub book: String,           // Source book code
    pub reference_book: String, // Resolved reference book name
    pub chapter: u32,
    pub verse: u32,
    pub source_rank: u32,
    pub reference_rank: u32,
    pub surface: String,
}

/// Why a source word has no alignment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GapKind {
    /// Verse exists on both sides but the word found no match
    Unmatched,
    /// The whole reference book is absent
    ReferenceBookMissing,
    /// The reference book has no entry for this verse
    SourceOnlyVerse,
}

impl GapKind {
    pub fn as_str(self) -> &'static str {
        match self {
            GapKind::Unmatched => "unmatched",
            GapKind::ReferenceBookMissing => "reference_book_missing",
            GapKind::SourceOnlyVerse => "source_only_verse",
        }
    }
}

impl fmt::Display for GapKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An unaligned source word
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Gap {
    pub word_id: u64,
    pub book: String,
    pub chapter: u32,
    pub verse: u32,
    pub rank: u32,
    pub kind: GapKind,
}

impl Gap {
    pub fn from_word(word: &Word, kind: GapKind) -> Self {
        Gap {
            word_id: word.word_id,
            book: word.book.clone(),
            chapter: word.chapter,
            verse: word.verse,
            rank: word.rank,
            kind,
        }
    }
}

/// Size/origin class of a gap span
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpanCategory {
    SingleWord,
    ShortPhrase,
    LongPhrase,
    FullVerse,
}

impl SpanCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            SpanCategory::SingleWord => "single_word",
            SpanCategory::ShortPhrase => "short_phrase",
            SpanCategory::LongPhrase => "long_phrase",
            SpanCategory::FullVerse => "full_verse",
        }
    }
}

impl fmt::Display for SpanCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A maximal run of contiguous gap words within one verse
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub span_id: u32,
    pub book: String,
    pub chapter: u32,
    pub verse: u32,
    pub start_rank: u32,
    pub end_rank: u32,
    pub word_ids: Vec<u64>,
    pub text: String,
    pub gap_kind: GapKind,
    pub category: SpanCategory,
}

impl Span {
    pub fn word_count(&self) -> usize {
        self.word_ids.len()
    }
}

/// Identifier namespace of a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeType {
    Word,
    Clause,
    Phrase,
}

impl NodeType {
    pub fn as_str(self) -> &'static str {
        match self {
            NodeType::Word => "word",
            NodeType::Clause => "clause",
            NodeType::Phrase => "phrase",
        }
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row of the id translation table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdMapping {
    pub reference_id: u64,
    pub assigned_id: u64,
    pub node_type: NodeType,
}

/// Where a word's annotations came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    FromReference,
    FromOtherSource,
}

/// A source word after transplant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransplantedWord {
    pub word: Word,
    pub aligned: bool,
    pub provenance: Provenance,
    pub reference_node_id: Option<u64>,
    pub unresolved: Vec<String>, // Pointer fields kept as raw reference values
}

// ============================================================================
// Statistics
// ============================================================================

/// Per-book alignment coverage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookStats {
    pub book: String,
    pub reference_book: String,
    pub source_words: usize,
    pub reference_words: usize,
    pub aligned_words: usize,
    pub gap_words: usize,
    pub common_verses: usize,
    pub source_only_verses: usize,
    pub reference_only_verses: usize,
    pub alignment_rate: f64, // aligned / source_words * 100
}

/// Corpus-wide alignment coverage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlignmentStats {
    pub total_source_words: usize,
    pub total_aligned: usize,
    pub total_gaps: usize,
    pub alignment_rate: f64,
    pub gap_kind_counts: BTreeMap<GapKind, usize>,
    pub books: Vec<BookStats>,
}

/// Table sizes of a corpus database
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CorpusStats {
    pub source_words: u64,
    pub source_books: u64,
    pub source_verses: u64,
    pub reference_words: u64,
    pub reference_books: u64,
    pub reference_verses: u64,
    pub clauses: u64,
    pub phrases: u64,
    pub book_name_overrides: u64, // Rows in the optional book_names table
}

/// Percentage helper shared by the stats builders.
pub fn rate_percent(part: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 / total as f64 * 100.0
    }
}

// ============================================================================
// Parameters
// ============================================================================

/// Span size thresholds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpanPolicy {
    /// Largest span still counted as a short phrase
    pub short_phrase_max: usize,
}

impl Default for SpanPolicy {
    fn default() -> Self {
        Self { short_phrase_max: 5 }
    }
}

/// Reserved id ranges for minted container ids
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NamespaceLayout {
    pub clause_offset: u64,
    pub phrase_offset: u64,
    pub capacity: u64, // Ids available per namespace
}

impl Default for NamespaceLayout {
    fn default() -> Self {
        Self {
            clause_offset: 1_000_000,
            phrase_offset: 2_000_000,
            capacity: 1_000_000,
        }
    }
}

impl NamespaceLayout {
    /// True when the clause and phrase ranges do not intersect.
    pub fn is_disjoint(&self) -> bool {
        let clause_end = self.clause_offset.saturating_add(self.capacity);
        let phrase_end = self.phrase_offset.saturating_add(self.capacity);
        clause_end <= self.phrase_offset || phrase_end <= self.clause_offset
    }

    /// Highest id either namespace can mint, `None` on u64 overflow.
    pub fn max_assigned(&self) -> Option<u64> {
        let clause_end = self.clause_offset.checked_add(self.capacity)?;
        let phrase_end = self.phrase_offset.checked_add(self.capacity)?;
        Some(clause_end.max(phrase_end).saturating_sub(1))
    }

    /// Lowest container id; source word ids must stay below it.
    pub fn floor(&self) -> u64 {
        self.clause_offset.min(self.phrase_offset)
    }
}

/// Pipeline parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AlignmentParams {
    pub feature_names: Vec<String>,       // Key features, in order
    pub transplant_features: Vec<String>, // Features copied from the reference
    pub span_policy: SpanPolicy,
    pub namespaces: NamespaceLayout,
    pub min_alignment_rate: Option<f64>, // Per-book acceptance threshold (percent)
    pub book_names: Option<BTreeMap<String, String>>, // Overrides merged over the built-in map
}

impl Default for AlignmentParams {
    fn default() -> Self {
        Self {
            feature_names: vec!["surface".to_string()],
            transplant_features: [
                "lemma", "sp", "case", "tense", "voice", "mood", "function", "role", "parent",
                "clause_id", "phrase_id", "gloss",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            span_policy: SpanPolicy::default(),
            namespaces: NamespaceLayout::default(),
            min_alignment_rate: None,
            book_names: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_large_ids_survive_feature_storage() {
        assert_eq!(FeatureValue::from(42u64), FeatureValue::Int(42));
        assert_eq!(FeatureValue::from(i64::MAX as u64).as_id(), Some(i64::MAX as u64));

        let huge = FeatureValue::from(u64::MAX);
        assert_eq!(huge, FeatureValue::Text(u64::MAX.to_string()));
        assert_eq!(huge.as_id(), Some(u64::MAX));
    }

    #[test]
    fn test_max_assigned() {
        assert_eq!(NamespaceLayout::default().max_assigned(), Some(2_999_999));
        let layout = NamespaceLayout {
            clause_offset: 1,
            phrase_offset: u64::MAX,
            capacity: 2,
        };
        assert_eq!(layout.max_assigned(), None);
    }
}
