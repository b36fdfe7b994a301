//! Order-preserving word alignment for a single verse.
//!
//! This is the HOT PATH - it runs once per verse across the whole corpus.
//! Matching uses the longest-matching-block decomposition: find the longest
//! contiguous run of equal keys, then recurse on the regions to its left and
//! right. Blocks found this way never cross, so every emitted pair respects
//! word order on both sides.

use std::collections::HashMap;
use std::hash::Hash;

use crate::key::build_keys;
use crate::models::WordRecord;

/// A run of `size` equal elements starting at `a` in the first sequence and `b` in the second.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchingBlock {
    pub a: usize,
    pub b: usize,
    pub size: usize,
}

/// Result of aligning one verse. All values are indices into the inputs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VerseAlignment {
    pub pairs: Vec<(usize, usize)>, // (source_idx, reference_idx), ascending on both
    pub source_gaps: Vec<usize>,
    pub reference_gaps: Vec<usize>,
}

impl VerseAlignment {
    /// True when every word on both sides found a partner.
    pub fn is_complete(&self) -> bool {
        self.source_gaps.is_empty() && self.reference_gaps.is_empty()
    }
}

/// Align the words of one verse on the keys built from `feature_names`.
///
/// Never fails: the output always partitions both inputs into pairs and gaps.
#[inline]
pub fn align_verse<S: WordRecord, R: WordRecord>(
    source: &[S],
    reference: &[R],
    feature_names: &[String],
) -> VerseAlignment {
    let source_keys = build_keys(source, feature_names);
    let reference_keys = build_keys(reference, feature_names);
    align_keys(&source_keys, &reference_keys)
}

/// Align two pre-built key sequences.
pub fn align_keys<T: Eq + Hash>(source: &[T], reference: &[T]) -> VerseAlignment {
    let blocks = matching_blocks(source, reference);

    let mut pairs = Vec::with_capacity(source.len().min(reference.len()));
    let mut source_matched = vec![false; source.len()];
    let mut reference_matched = vec![false; reference.len()];

    for block in &blocks {
        for k in 0..block.size {
            pairs.push((block.a + k, block.b + k));
            source_matched[block.a + k] = true;
            reference_matched[block.b + k] = true;
        }
    }

    VerseAlignment {
        pairs,
        source_gaps: unmatched_indices(&source_matched),
        reference_gaps: unmatched_indices(&reference_matched),
    }
}

fn unmatched_indices(matched: &[bool]) -> Vec<usize> {
    matched
        .iter()
        .enumerate()
        .filter(|(_, &m)| !m)
        .map(|(i, _)| i)
        .collect()
}

/// Maximal order-preserving matching blocks between two sequences.
///
/// Blocks are sorted by position and adjacent blocks are merged, so no two
/// returned blocks touch on both sides at once.
pub fn matching_blocks<T: Eq + Hash>(a: &[T], b: &[T]) -> Vec<MatchingBlock> {
    if a.is_empty() || b.is_empty() {
        return Vec::new();
    }

    // Positions of each element in b, ascending
    let mut b2j: HashMap<&T, Vec<usize>> = HashMap::new();
    for (j, item) in b.iter().enumerate() {
        b2j.entry(item).or_default().push(j);
    }

    let mut queue = vec![(0usize, a.len(), 0usize, b.len())];
    let mut blocks = Vec::new();

    while let Some((alo, ahi, blo, bhi)) = queue.pop() {
        let block = find_longest_match(a, &b2j, alo, ahi, blo, bhi);
        if block.size == 0 {
            continue;
        }
        if alo < block.a && blo < block.b {
            queue.push((alo, block.a, blo, block.b));
        }
        if block.a + block.size < ahi && block.b + block.size < bhi {
            queue.push((block.a + block.size, ahi, block.b + block.size, bhi));
        }
        blocks.push(block);
    }

    blocks.sort_by_key(|m| (m.a, m.b));

    let mut merged: Vec<MatchingBlock> = Vec::with_capacity(blocks.len());
    for block in blocks {
        if let Some(last) = merged.last_mut() {
            if last.a + last.size == block.a && last.b + last.size == block.b {
                last.size += block.size;
                continue;
            }
        }
        merged.push(block);
    }

    merged
}

/// Longest block of equal elements in `a[alo..ahi]` and `b[blo..bhi]`.
///
/// Ties go to the block that starts earliest in `a`, then earliest in `b`.
#[inline]
fn find_longest_match<T: Eq + Hash>(
    a: &[T],
    b2j: &HashMap<&T, Vec<usize>>,
    alo: usize,
    ahi: usize,
    blo: usize,
    bhi: usize,
) -> MatchingBlock {
    let mut best = MatchingBlock {
        a: alo,
        b: blo,
        size: 0,
    };

    // j2len[j] = length of the match ending at a[i - 1] and b[j]
    let mut j2len: HashMap<usize, usize> = HashMap::new();

    for (i, item) in a.iter().enumerate().take(ahi).skip(alo) {
        let mut next_j2len: HashMap<usize, usize> = HashMap::new();
        if let Some(positions) = b2j.get(item) {
            for &j in positions {
                if j < blo {
                    continue;
                }
                if j >= bhi {
                    break;
                }
                let k = j
                    .checked_sub(1)
                    .and_then(|prev| j2len.get(&prev))
                    .copied()
                    .unwrap_or(0)
                    + 1;
                next_j2len.insert(j, k);
                if k > best.size {
                    best = MatchingBlock {
                        a: i + 1 - k,
                        b: j + 1 - k,
                        size: k,
                    };
                }
            }
        }
        j2len = next_j2len;
    }

    best
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys(words: &[&str]) -> Vec<String> {
        words.iter().map(|w| w.to_string()).collect()
    }

    #[test]
    fn test_identical_sequences() {
        let seq = keys(&["ἐν", "ἀρχῇ", "ἦν", "ὁ", "λόγος"]);
        let result = align_keys(&seq, &seq);

        assert_eq!(result.pairs, vec![(0, 0), (1, 1), (2, 2), (3, 3), (4, 4)]);
        assert!(result.is_complete());
    }

    #[test]
    fn test_reference_insertion() {
        let source = keys(&["Λόγος", "ἦν", "ἐν", "ἀρχῇ"]);
        let reference = keys(&["Λόγος", "ἦν", "ἐν", "τῇ", "ἀρχῇ"]);
        let result = align_keys(&source, &reference);

        assert_eq!(result.pairs, vec![(0, 0), (1, 1), (2, 2), (3, 4)]);
        assert!(result.source_gaps.is_empty());
        assert_eq!(result.reference_gaps, vec![3]);
    }

    #[test]
    fn test_substitution() {
        let source = keys(&["πιστεύω", "εἰς", "αὐτόν"]);
        let reference = keys(&["πιστεύωμεν", "εἰς", "αὐτόν"]);
        let result = align_keys(&source, &reference);

        assert_eq!(result.pairs, vec![(1, 1), (2, 2)]);
        assert_eq!(result.source_gaps, vec![0]);
        assert_eq!(result.reference_gaps, vec![0]);
    }

    #[test]
    fn test_no_overlap() {
        let source = keys(&["α", "β", "γ"]);
        let reference = keys(&["δ", "ε"]);
        let result = align_keys(&source, &reference);

        assert!(result.pairs.is_empty());
        assert_eq!(result.source_gaps, vec![0, 1, 2]);
        assert_eq!(result.reference_gaps, vec![0, 1]);
    }

    #[test]
    fn test_empty_sequences() {
        let some = keys(&["καὶ", "ἐγένετο"]);
        let none: Vec<String> = Vec::new();

        let result = align_keys(&none, &some);
        assert!(result.pairs.is_empty());
        assert!(result.source_gaps.is_empty());
        assert_eq!(result.reference_gaps, vec![0, 1]);

        let result = align_keys(&some, &none);
        assert_eq!(result.source_gaps, vec![0, 1]);
        assert!(result.reference_gaps.is_empty());

        let result = align_keys(&none, &none);
        assert_eq!(result, VerseAlignment::default());
    }

    #[test]
    fn test_transposition_does_not_cross() {
        // A swapped word pair can only align one of the two
        let source = keys(&["α", "β", "γ", "δ"]);
        let reference = keys(&["α", "γ", "β", "δ"]);
        let result = align_keys(&source, &reference);

        assert_eq!(result.pairs.len(), 3);
        for w in result.pairs.windows(2) {
            assert!(w[0].0 < w[1].0 && w[0].1 < w[1].1);
        }
    }

    #[test]
    fn test_repeated_words() {
        let source = keys(&["καὶ", "εἶπεν", "καὶ", "ἦλθεν"]);
        let reference = keys(&["καὶ", "ἦλθεν"]);
        let result = align_keys(&source, &reference);

        assert_eq!(result.pairs.len(), 2);
        assert_eq!(result.source_gaps.len(), 2);
        assert!(result.reference_gaps.is_empty());
    }

    #[test]
    fn test_matching_blocks_merged() {
        let a = keys(&["α", "β", "γ", "x", "δ", "ε"]);
        let b = keys(&["α", "β", "γ", "δ", "ε"]);
        let blocks = matching_blocks(&a, &b);

        assert_eq!(
            blocks,
            vec![
                MatchingBlock { a: 0, b: 0, size: 3 },
                MatchingBlock { a: 4, b: 3, size: 2 },
            ]
        );
    }

    #[test]
    fn test_longest_block_wins() {
        // The longer shared run is chosen even though a single-word match comes first
        let a = keys(&["ζ", "α", "β", "γ"]);
        let b = keys(&["α", "β", "γ", "ζ"]);
        let blocks = matching_blocks(&a, &b);

        assert_eq!(blocks, vec![MatchingBlock { a: 1, b: 0, size: 3 }]);
    }
}
