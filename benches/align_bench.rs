//! Criterion benchmarks for verse alignment.
//!
//! Run with: cargo bench

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use verse_transplant::align::align_keys;
use verse_transplant::books::BookNameMap;
use verse_transplant::corpus::{align_corpus, Corpus};
use verse_transplant::models::{FeatureMap, Hierarchy, ReferenceWord, Word};

fn bench_verse_alignment(c: &mut Criterion) {
    // Typical verse lengths up to the longest verses of the corpus
    let sizes = [10, 30, 90];

    let mut group = c.benchmark_group("verse_alignment");

    for size in sizes {
        // Identical verses (best case - one block)
        let seq: Vec<u32> = (0..size as u32).collect();

        group.bench_with_input(BenchmarkId::new("identical", size), &size, |b, _| {
            b.iter(|| align_keys(black_box(&seq), black_box(&seq)))
        });

        // 70% match (typical variant reading density)
        let seq_b: Vec<u32> = (0..size as u32)
            .map(|i| if i % 10 < 7 { i } else { i + 10000 })
            .collect();

        group.bench_with_input(BenchmarkId::new("70pct_match", size), &size, |b, _| {
            b.iter(|| align_keys(black_box(&seq), black_box(&seq_b)))
        });

        // Repeated function words (many candidate positions per key)
        let seq_repeats: Vec<u32> = (0..size as u32).map(|i| i % 4).collect();

        group.bench_with_input(BenchmarkId::new("repeats", size), &size, |b, _| {
            b.iter(|| align_keys(black_box(&seq_repeats), black_box(&seq_repeats[1..])))
        });

        // No match (every word a gap)
        let seq_nomatch: Vec<u32> = (10000..10000 + size as u32).collect();

        group.bench_with_input(BenchmarkId::new("no_match", size), &size, |b, _| {
            b.iter(|| align_keys(black_box(&seq), black_box(&seq_nomatch)))
        });
    }

    group.finish();
}

/// Synthetic book of `verses` verses with 20 words each. Every fifth reference word differs.
fn synthetic_book(verses: u32) -> (Vec<Word>, Vec<ReferenceWord>) {
    let mut source = Vec::new();
    let mut reference = Vec::new();
    let mut id = 1u64;

    for verse in 1..=verses {
        for rank in 1..=20u32 {
            let surface = format!("w{}", (verse * 7 + rank) % 97);
            source.push(Word {
                word_id: id,
                book: "MAT".to_string(),
                chapter: 1 + verse / 25,
                verse,
                rank,
                surface: surface.clone(),
                features: FeatureMap::new(),
            });
            reference.push(ReferenceWord {
                node_id: id + 500_000,
                book: "Matthew".to_string(),
                chapter: 1 + verse / 25,
                verse,
                rank,
                surface: if rank % 5 == 0 { format!("{surface}'") } else { surface },
                features: FeatureMap::new(),
                hierarchy: Hierarchy::default(),
            });
            id += 1;
        }
    }

    (source, reference)
}

fn bench_corpus_alignment(c: &mut Criterion) {
    let (source_words, reference_words) = synthetic_book(1000);
    let source = Corpus::from_words(source_words);
    let reference = Corpus::from_words(reference_words);
    let books = BookNameMap::new_testament();
    let features = vec!["surface".to_string()];

    c.bench_function("align_corpus_1000_verses", |b| {
        b.iter(|| align_corpus(black_box(&source), black_box(&reference), &books, &features, false))
    });
}

criterion_group!(benches, bench_verse_alignment, bench_corpus_alignment);
criterion_main!(benches);
