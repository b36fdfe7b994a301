//! Output formatting for pipeline results (JSON, CSV, console summaries).

use crate::models::{AlignmentPair, AlignmentStats, CorpusStats, Gap, IdMapping, Span};
use crate::pipeline::{PipelineOutput, RunSummary};
use crate::spans::GapSummary;
use serde::Serialize;
use std::borrow::Cow;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum OutputError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Quote a CSV field when it holds a separator, quote or line break.
fn csv_field(value: &str) -> Cow<'_, str> {
    if value.contains([',', '"', '\n', '\r']) {
        Cow::Owned(format!("\"{}\"", value.replace('"', "\"\"")))
    } else {
        Cow::Borrowed(value)
    }
}

/// Write any result table as pretty JSON.
pub fn write_json<T: Serialize + ?Sized, W: Write>(value: &T, writer: &mut W) -> Result<(), OutputError> {
    let json = serde_json::to_string_pretty(value)?;
    writer.write_all(json.as_bytes())?;
    writer.write_all(b"\n")?;
    Ok(())
}

/// Write any result table as pretty JSON to a file.
pub fn write_json_file<T: Serialize + ?Sized>(value: &T, path: &Path) -> Result<(), OutputError> {
    let mut file = BufWriter::new(File::create(path)?);
    write_json(value, &mut file)?;
    file.flush()?;
    Ok(())
}

fn write_csv_file<F>(path: &Path, write: F) -> Result<(), OutputError>
where
    F: FnOnce(&mut BufWriter<File>) -> Result<(), OutputError>,
{
    let mut file = BufWriter::new(File::create(path)?);
    write(&mut file)?;
    file.flush()?;
    Ok(())
}

/// Write alignment pairs as CSV.
pub fn write_alignment_csv<W: Write>(pairs: &[AlignmentPair], writer: &mut W) -> Result<(), OutputError> {
    writeln!(
        writer,
        "source_word_id,reference_node_id,book,reference_book,chapter,verse,\
         source_rank,reference_rank,surface"
    )?;

    for pair in pairs {
        writeln!(
            writer,
            "{},{},{},{},{},{},{},{},{}",
            pair.source_word_id,
            pair.reference_node_id,
            csv_field(&pair.book),
            csv_field(&pair.reference_book),
            pair.chapter,
            pair.verse,
            pair.source_rank,
            pair.reference_rank,
            csv_field(&pair.surface)
        )?;
    }

    Ok(())
}

/// Write gap records as CSV.
pub fn write_gaps_csv<W: Write>(gaps: &[Gap], writer: &mut W) -> Result<(), OutputError> {
    writeln!(writer, "word_id,book,chapter,verse,rank,kind")?;
    for gap in gaps {
        writeln!(
            writer,
            "{},{},{},{},{},{}",
            gap.word_id,
            csv_field(&gap.book),
            gap.chapter,
            gap.verse,
            gap.rank,
            gap.kind
        )?;
    }
    Ok(())
}

/// Write spans as CSV. Word ids are space-separated.
pub fn write_spans_csv<W: Write>(spans: &[Span], writer: &mut W) -> Result<(), OutputError> {
    writeln!(
        writer,
        "span_id,book,chapter,verse,start_rank,end_rank,word_count,word_ids,text,gap_kind,category"
    )?;

    for span in spans {
        let word_ids = span
            .word_ids
            .iter()
            .map(u64::to_string)
            .collect::<Vec<_>>()
            .join(" ");
        writeln!(
            writer,
            "{},{},{},{},{},{},{},{},{},{},{}",
            span.span_id,
            csv_field(&span.book),
            span.chapter,
            span.verse,
            span.start_rank,
            span.end_rank,
            span.word_count(),
            word_ids,
            csv_field(&span.text),
            span.gap_kind,
            span.category
        )?;
    }

    Ok(())
}

/// Write the id translation table as CSV.
pub fn write_id_map_csv<W: Write>(mappings: &[IdMapping], writer: &mut W) -> Result<(), OutputError> {
    writeln!(writer, "reference_id,assigned_id,node_type")?;
    for m in mappings {
        writeln!(writer, "{},{},{}", m.reference_id, m.assigned_id, m.node_type)?;
    }
    Ok(())
}

/// Contents of alignment_stats.json
#[derive(Serialize)]
struct StatsReport<'a> {
    summary: &'a RunSummary,
    alignment: &'a AlignmentStats,
    gaps: &'a GapSummary,
    parent_cycles: &'a [Vec<u64>],
}

/// Write every result table into `dir`, creating it if needed. Returns the written paths.
pub fn write_outputs(output: &PipelineOutput, dir: &Path) -> Result<Vec<PathBuf>, OutputError> {
    fs::create_dir_all(dir)?;
    let mut written = Vec::new();

    let path = dir.join("alignment.json");
    write_json_file(&output.alignment.pairs, &path)?;
    written.push(path);
    let path = dir.join("alignment.csv");
    write_csv_file(&path, |w| write_alignment_csv(&output.alignment.pairs, w))?;
    written.push(path);

    let path = dir.join("gaps.json");
    write_json_file(&output.alignment.gaps, &path)?;
    written.push(path);
    let path = dir.join("gaps.csv");
    write_csv_file(&path, |w| write_gaps_csv(&output.alignment.gaps, w))?;
    written.push(path);

    let path = dir.join("spans.json");
    write_json_file(&output.spans, &path)?;
    written.push(path);
    let path = dir.join("spans.csv");
    write_csv_file(&path, |w| write_spans_csv(&output.spans, w))?;
    written.push(path);

    let path = dir.join("id_map.json");
    write_json_file(output.id_map.mappings(), &path)?;
    written.push(path);
    let path = dir.join("id_map.csv");
    write_csv_file(&path, |w| write_id_map_csv(output.id_map.mappings(), w))?;
    written.push(path);

    let path = dir.join("transplanted.json");
    write_json_file(&output.transplant.words, &path)?;
    written.push(path);

    let path = dir.join("alignment_stats.json");
    write_json_file(
        &StatsReport {
            summary: &output.summary,
            alignment: &output.alignment.stats,
            gaps: &output.gap_summary,
            parent_cycles: &output.parent_cycles,
        },
        &path,
    )?;
    written.push(path);

    Ok(written)
}

// ============================================================================
// Console output
// ============================================================================

/// Write an alignment coverage report to stdout.
pub fn print_summary(stats: &AlignmentStats) {
    println!("\n=== Alignment Summary ===");
    println!("Source words: {}", stats.total_source_words);
    println!("Aligned: {} ({:.2}%)", stats.total_aligned, stats.alignment_rate);
    println!("Gaps: {}", stats.total_gaps);
    for (kind, count) in &stats.gap_kind_counts {
        println!("  {}: {}", kind, count);
    }

    println!("\n{:<8} {:<18} {:>8} {:>8} {:>8} {:>8}", "Book", "Reference", "Words", "Aligned", "Gaps", "Rate");
    for book in &stats.books {
        println!(
            "{:<8} {:<18} {:>8} {:>8} {:>8} {:>7.2}%",
            book.book,
            book.reference_book,
            book.source_words,
            book.aligned_words,
            book.gap_words,
            book.alignment_rate
        );
        if book.source_only_verses > 0 || book.reference_only_verses > 0 {
            println!(
                "         verses: {} common, {} source-only, {} reference-only",
                book.common_verses, book.source_only_verses, book.reference_only_verses
            );
        }
    }
}

/// Write the gap analysis to stdout.
pub fn print_gap_summary(summary: &GapSummary, spans: &[Span]) {
    println!("\n=== Gap Analysis ===");
    println!("Gap words: {}", summary.total_gap_words);
    println!("Spans: {}", summary.total_spans);
    println!("Average span size: {:.1}", summary.avg_span_size);

    println!("\nBy category:");
    for (category, count) in &summary.categories {
        println!("  {}: {}", category, count);
    }

    if !summary.longest_span_ids.is_empty() {
        println!("\nLongest spans:");
        for id in &summary.longest_span_ids {
            // Span ids are 1-based positions in `spans`
            if let Some(span) = spans.get(*id as usize - 1) {
                println!("  {}", format_span(span));
            }
        }
    }
}

/// Write the transplant and id-map totals to stdout.
pub fn print_run_summary(summary: &RunSummary) {
    println!("\n=== Transplant Summary ===");
    for (node_type, count) in &summary.id_mappings {
        println!("  {} ids mapped: {}", node_type, count);
    }
    if summary.duplicate_word_refs > 0 {
        println!("  Duplicate reference words skipped: {}", summary.duplicate_word_refs);
    }
    println!("  Unresolved pointers: {}", summary.unresolved_pointers);
    println!("  Broken references: {}", summary.broken_references);
    println!("  Parent cycles: {}", summary.parent_cycles);
}

/// Write database table sizes to stdout.
pub fn print_corpus_stats(stats: &CorpusStats) {
    println!("=== Corpus Statistics ===");
    println!(
        "Source: {} words, {} books, {} verses",
        stats.source_words, stats.source_books, stats.source_verses
    );
    println!(
        "Reference: {} words, {} books, {} verses",
        stats.reference_words, stats.reference_books, stats.reference_verses
    );
    println!("Clauses: {}", stats.clauses);
    println!("Phrases: {}", stats.phrases);
    println!("Book name overrides: {}", stats.book_name_overrides);
}

/// Format a span as a one-line string.
pub fn format_span(span: &Span) -> String {
    format!(
        "#{} {} {}:{} [{}-{}] {} ({} words): {}",
        span.span_id,
        span.book,
        span.chapter,
        span.verse,
        span.start_rank,
        span.end_rank,
        span.category,
        span.word_count(),
        span.text
    )
}
