//! Verse Transplant Pipeline
//!
//! Aligns a partially annotated source edition against a fully annotated
//! reference edition verse by verse and transplants the reference annotations.

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::info;

use verse_transplant::align::{align_keys, align_verse};
use verse_transplant::config::{book_name_map, load_params};
use verse_transplant::corpus::check_alignment_rate;
use verse_transplant::db::{load_book_names, load_corpus_stats, load_reference_words, load_source_words};
use verse_transplant::models::AlignmentParams;
use verse_transplant::output::{
    format_span, print_corpus_stats, print_gap_summary, print_run_summary, print_summary,
    write_outputs,
};
use verse_transplant::pipeline::run_pipeline;

#[derive(Parser)]
#[command(name = "verse-transplant")]
#[command(about = "Verse-level word alignment and annotation transplant")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Align both editions, group gaps, and transplant annotations
    ///
    /// Parameters default to AlignmentParams::default(), then the --config file,
    /// then any flag given explicitly.
    Run {
        /// Path to corpus.db
        #[arg(long)]
        corpus_db: PathBuf,

        /// Directory for the output tables
        #[arg(long)]
        output_dir: PathBuf,

        /// JSON parameter file
        #[arg(long)]
        config: Option<PathBuf>,

        /// Key feature, repeatable, in order [default: surface]
        #[arg(long = "feature")]
        features: Vec<String>,

        /// Largest span counted as a short phrase [default: 5]
        #[arg(long)]
        short_phrase_max: Option<usize>,

        /// First minted clause id [default: 1000000]
        #[arg(long)]
        clause_offset: Option<u64>,

        /// First minted phrase id [default: 2000000]
        #[arg(long)]
        phrase_offset: Option<u64>,

        /// Fail when any book aligns below this percentage
        #[arg(long)]
        min_alignment_rate: Option<f64>,

        /// Suppress progress output
        #[arg(long)]
        quiet: bool,

        /// Print the first N spans to console
        #[arg(long)]
        show_spans: Option<usize>,
    },

    /// Align a single verse and print the result
    Verse {
        /// Path to corpus.db
        #[arg(long)]
        corpus_db: PathBuf,

        /// Source book code
        #[arg(long)]
        book: String,

        #[arg(long)]
        chapter: u32,

        #[arg(long)]
        verse: u32,

        /// JSON parameter file
        #[arg(long)]
        config: Option<PathBuf>,

        /// Key feature, repeatable, in order [default: surface]
        #[arg(long = "feature")]
        features: Vec<String>,
    },

    /// Show corpus statistics
    Stats {
        /// Path to corpus.db
        #[arg(long)]
        corpus_db: PathBuf,
    },

    /// Benchmark verse alignment performance
    Benchmark {
        /// Number of alignment iterations
        #[arg(long, default_value = "100000")]
        iterations: usize,

        /// Words per verse
        #[arg(long, default_value = "30")]
        size: usize,
    },
}

fn load_base_params(config: Option<&Path>) -> Result<AlignmentParams, Box<dyn std::error::Error>> {
    match config {
        Some(path) => Ok(load_params(path)?),
        None => Ok(AlignmentParams::default()),
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            corpus_db,
            output_dir,
            config,
            features,
            short_phrase_max,
            clause_offset,
            phrase_offset,
            min_alignment_rate,
            quiet,
            show_spans,
        } => {
            let base = load_base_params(config.as_deref())?;

            // Overlay user-specified values onto the loaded params
            let mut params = AlignmentParams {
                feature_names: if features.is_empty() {
                    base.feature_names
                } else {
                    features
                },
                min_alignment_rate: min_alignment_rate.or(base.min_alignment_rate),
                ..base
            };
            if let Some(max) = short_phrase_max {
                params.span_policy.short_phrase_max = max;
            }
            if let Some(offset) = clause_offset {
                params.namespaces.clause_offset = offset;
            }
            if let Some(offset) = phrase_offset {
                params.namespaces.phrase_offset = offset;
            }

            let start = Instant::now();
            let source = load_source_words(&corpus_db)?;
            let reference = load_reference_words(&corpus_db)?;
            let books = book_name_map(&params, load_book_names(&corpus_db)?);

            let output = run_pipeline(&source, &reference, &books, &params, !quiet)?;
            let written = write_outputs(&output, &output_dir)?;
            info!(
                files = written.len(),
                elapsed_ms = start.elapsed().as_millis() as u64,
                "outputs written"
            );

            if !quiet {
                print_summary(&output.alignment.stats);
                print_gap_summary(&output.gap_summary, &output.spans);
                print_run_summary(&output.summary);
                eprintln!("\nOutput: {}", output_dir.display());
            }

            if let Some(limit) = show_spans {
                println!("\n=== Sample Spans ===");
                for span in output.spans.iter().take(limit) {
                    println!("  {}", format_span(span));
                }
            }

            // Acceptance check runs after the tables are on disk so they can be inspected
            if let Some(min_rate) = params.min_alignment_rate {
                check_alignment_rate(&output.alignment.stats, min_rate)?;
            }
        }

        Commands::Verse {
            corpus_db,
            book,
            chapter,
            verse,
            config,
            features,
        } => {
            let params = load_base_params(config.as_deref())?;
            let feature_names = if features.is_empty() {
                params.feature_names.clone()
            } else {
                features
            };
            let books = book_name_map(&params, load_book_names(&corpus_db)?);
            let reference_book = books.resolve(&book).to_string();

            let mut source = load_source_words(&corpus_db)?;
            source.retain(|w| w.book == book && w.chapter == chapter && w.verse == verse);
            source.sort_by_key(|w| w.rank);
            let mut reference = load_reference_words(&corpus_db)?;
            reference.retain(|w| w.book == reference_book && w.chapter == chapter && w.verse == verse);
            reference.sort_by_key(|w| w.rank);

            let alignment = align_verse(&source, &reference, &feature_names);

            println!("=== {} {}:{} ({}) ===", book, chapter, verse, reference_book);
            println!(
                "Source words: {}  Reference words: {}  Aligned: {}",
                source.len(),
                reference.len(),
                alignment.pairs.len()
            );
            for &(si, ri) in &alignment.pairs {
                let s = &source[si];
                let r = &reference[ri];
                println!("  {:>3} {:<20} = {:>3} {} [{}]", s.rank, s.surface, r.rank, r.surface, r.node_id);
            }
            for &si in &alignment.source_gaps {
                let s = &source[si];
                println!("  {:>3} {:<20} - (source only) [{}]", s.rank, s.surface, s.word_id);
            }
            for &ri in &alignment.reference_gaps {
                let r = &reference[ri];
                println!("    - {:<20}   {:>3} {} (reference only)", "", r.rank, r.surface);
            }
        }

        Commands::Stats { corpus_db } => {
            let stats = load_corpus_stats(&corpus_db)?;
            print_corpus_stats(&stats);
        }

        Commands::Benchmark { iterations, size } => {
            run_benchmark(iterations, size);
        }
    }

    Ok(())
}

/// Run verse alignment benchmark to measure performance.
fn run_benchmark(iterations: usize, size: usize) {
    println!("=== Verse Alignment Benchmark ===");
    println!("Iterations: {}", iterations);
    println!("Words per verse: {}", size);

    let identical: Vec<u32> = (0..size as u32).collect();
    let partial: Vec<u32> = (0..size as u32)
        .map(|i| if i % 10 < 7 { i } else { i + 10000 })
        .collect();
    let no_match: Vec<u32> = (10000..10000 + size as u32).collect();

    let cases = [
        ("Identical verses", &identical),
        ("70% match verses", &partial),
        ("No match verses", &no_match),
    ];

    for (label, reference) in cases {
        println!("\n{}:", label);
        let start = Instant::now();
        let mut aligned = 0usize;
        for _ in 0..iterations {
            aligned += align_keys(&identical, reference).pairs.len();
        }
        let elapsed = start.elapsed();
        let per_alignment = elapsed.as_secs_f64() / iterations.max(1) as f64;
        println!("  Total time: {:.3}s", elapsed.as_secs_f64());
        println!("  Per verse: {:.3}us", per_alignment * 1_000_000.0);
        println!("  Verses/sec: {:.0}", 1.0 / per_alignment.max(f64::MIN_POSITIVE));
        println!("  Aligned words: {}", aligned / iterations.max(1));
    }
}
