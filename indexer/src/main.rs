mod loader;

use anyhow::{bail, Result};
use clap::{Parser, Subcommand, ValueEnum};
use searchcore::persist::{load_directory, load_meta, verify_snapshot, write_index, IndexPaths};
use searchcore::{AddOutcome, Analyzer, BuilderConfig, IndexBuilder, QueryEngine, StemmerKind, StopWordPolicy};
use std::fs;
use std::io::{self, BufRead, Write};
use std::path::Path;
use std::time::Instant;
use tracing_subscriber::{fmt, EnvFilter};

use loader::{load_file, load_page, walk_corpus, DEFAULT_MIN_CONTENT_LEN};

#[derive(Parser)]
#[command(name = "indexer")]
#[command(about = "Build and inspect a near-duplicate filtered inverted index", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum StemmerArg {
    Light,
    Snowball,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the index from a corpus directory (or a single .json/.jsonl file)
    Build {
        /// Input path (file or directory)
        #[arg(long)]
        input: String,
        /// Output index directory
        #[arg(long)]
        output: String,
        /// Number of shingle hashes kept per document fingerprint
        #[arg(long, default_value_t = searchcore::fingerprint::DEFAULT_SKETCH_SIZE)]
        sketch_size: usize,
        #[arg(long, value_enum, default_value_t = StemmerArg::Light)]
        stemmer: StemmerArg,
        /// Drop English stop words at index and query time
        #[arg(long, default_value_t = false)]
        english_stopwords: bool,
        /// Skip documents whose cleaned text is shorter than this
        #[arg(long, default_value_t = DEFAULT_MIN_CONTENT_LEN)]
        min_content_len: usize,
    },
    /// Print document, term and size statistics
    Stats {
        #[arg(long)]
        index: String,
    },
    /// Print posting lists, for every term or just one
    Dump {
        #[arg(long)]
        index: String,
        /// Normalized term to print
        #[arg(long)]
        term: Option<String>,
    },
    /// Check the postings blob against the directory
    Verify {
        #[arg(long)]
        index: String,
    },
    /// Run a query, or read queries from stdin when none is given
    Query {
        #[arg(long)]
        index: String,
        #[arg(long, default_value_t = 5)]
        k: usize,
        query: Option<String>,
    },
}

fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Build { input, output, sketch_size, stemmer, english_stopwords, min_content_len } => {
            let stemmer = match stemmer {
                StemmerArg::Light => StemmerKind::Light,
                StemmerArg::Snowball => StemmerKind::Snowball,
            };
            let stop_words = if english_stopwords { StopWordPolicy::English } else { StopWordPolicy::Keep };
            let config = BuilderConfig {
                analyzer: Analyzer::new(stemmer, stop_words),
                sketch_size,
                ..BuilderConfig::default()
            };
            build_index(&input, &output, config, min_content_len)
        }
        Commands::Stats { index } => show_stats(&index),
        Commands::Dump { index, term } => dump(&index, term.as_deref()),
        Commands::Verify { index } => verify(&index),
        Commands::Query { index, k, query } => run_queries(&index, k, query.as_deref()),
    }
}

fn build_index(input: &str, output: &str, config: BuilderConfig, min_content_len: usize) -> Result<()> {
    let input_path = Path::new(input);
    if !input_path.exists() {
        bail!("input {input} does not exist");
    }
    let out_paths = IndexPaths::new(output);
    let mut builder = IndexBuilder::new(config);
    let mut skipped = 0usize;

    for file in walk_corpus(input_path) {
        let pages = match load_file(&file) {
            Ok(pages) => pages,
            Err(e) => {
                tracing::warn!(file = %file.display(), error = %e, "skipping unreadable file");
                skipped += 1;
                continue;
            }
        };
        for page in pages {
            let url = page.url.unwrap_or_default();
            let Some(doc) = load_page(&page.content, &url, min_content_len) else {
                tracing::debug!(%url, "skipping: content too short or invalid");
                skipped += 1;
                continue;
            };
            if let AddOutcome::Duplicate { of } = builder.add_document(&doc)? {
                tracing::debug!(%url, duplicate_of = of, "near duplicate");
            }
        }
    }

    tracing::info!(
        num_docs = builder.num_docs(),
        duplicates = builder.duplicates_rejected(),
        skipped,
        "ingested documents"
    );
    let index = builder.finish();
    let summary = write_index(&out_paths, &index)?;
    tracing::info!(output, blob = %summary.blob_file, "index build complete");
    Ok(())
}

fn show_stats(index: &str) -> Result<()> {
    let paths = IndexPaths::new(index);
    let directory = load_directory(&paths)?;
    let dir_bytes = fs::metadata(paths.directory())?.len();
    let blob_bytes = fs::metadata(paths.blob(&directory.blob_file))?.len();
    println!("Number of documents indexed: {}", directory.num_docs);
    println!("Number of unique tokens: {}", directory.terms.len());
    println!("Size of index on disk: {:.2} KB", (dir_bytes + blob_bytes) as f64 / 1024.0);
    match load_meta(&paths) {
        Ok(meta) => {
            println!("Near duplicates rejected: {}", meta.duplicates_rejected);
            println!("Built at: {}", meta.created_at);
        }
        Err(e) => tracing::warn!(error = %e, "meta.json unavailable"),
    }
    Ok(())
}

fn dump(index: &str, term: Option<&str>) -> Result<()> {
    let engine = QueryEngine::load(&IndexPaths::new(index))?;
    let mut terms: Vec<&str> = match term {
        Some(t) => vec![t],
        None => engine.terms().collect(),
    };
    terms.sort_unstable();
    let stdout = io::stdout();
    let mut out = stdout.lock();
    for t in terms {
        match engine.postings(t) {
            Ok(Some(list)) => {
                let rendered: Vec<String> = list
                    .iter()
                    .map(|p| format!("Posting(doc_id={}, tf={}, imp={}, tf_idf={:.4})", p.doc_id, p.term_freq, p.importance.get(), p.tf_idf))
                    .collect();
                writeln!(out, "{t}: [{}]", rendered.join(", "))?;
            }
            Ok(None) => writeln!(out, "{t}: not indexed")?,
            Err(fault) => writeln!(out, "{t}: CORRUPT ({})", fault.error)?,
        }
    }
    Ok(())
}

fn verify(index: &str) -> Result<()> {
    let report = verify_snapshot(&IndexPaths::new(index))?;
    for (term, err) in &report.corrupt_terms {
        println!("corrupt: {term:?}: {err}");
    }
    println!("checked {} terms, {} corrupt", report.terms_checked, report.corrupt_terms.len());
    if !report.corrupt_terms.is_empty() {
        bail!("index has corrupt posting regions");
    }
    Ok(())
}

fn print_results(urls: &[String]) {
    if urls.is_empty() {
        println!("No documents found.");
    } else {
        println!("Top results:");
        for url in urls {
            println!("- {url}");
        }
    }
}

fn run_queries(index: &str, k: usize, query: Option<&str>) -> Result<()> {
    let engine = QueryEngine::load(&IndexPaths::new(index))?;
    if let Some(q) = query {
        print_results(&engine.search(q, k));
        return Ok(());
    }
    let stdin = io::stdin();
    loop {
        print!("Search> ");
        io::stdout().flush()?;
        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let q = line.trim();
        if q.is_empty() {
            continue;
        }
        let start = Instant::now();
        let urls = engine.search(q, k);
        tracing::info!(query = q, took_ms = start.elapsed().as_secs_f64() * 1000.0, "search");
        print_results(&urls);
    }
    Ok(())
}
