#![cfg_attr(test, allow(clippy::disallowed_methods))]
// Forbid unwrap() in production code to prevent panics from corrupt data.
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
use std::path::Path;

use index::config::IndexConfig;
use index::reverse::{IndexError, ReverseIndexReader, merge_indexes};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const USAGE: &str = "usage:
  index stats <dir>
  index documents <dir> <word>
  index merge <left> <right> <output>";

fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "index=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = match IndexConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Failed to load configuration: {e}");
            std::process::exit(1);
        }
    };

    tracing::debug!(
        words_block_size = config.words_block_size.page_size(),
        docs_block_size = config.docs_block_size.page_size(),
        docs_entry_size = config.docs_entry_size,
        max_layers = config.max_layers,
        "loaded configuration"
    );

    let args: Vec<String> = std::env::args().skip(1).collect();
    let args: Vec<&str> = args.iter().map(String::as_str).collect();

    let result = match args.as_slice() {
        ["stats", dir] => stats(Path::new(dir), &config),
        ["documents", dir, word] => match word.parse::<u64>() {
            Ok(word) => documents(Path::new(dir), word, &config),
            Err(e) => {
                tracing::error!("Invalid word id '{word}': {e}");
                std::process::exit(2);
            }
        },
        ["merge", left, right, output] => merge_indexes(
            Path::new(left),
            Path::new(right),
            Path::new(output),
            &config,
        )
        .map(|stats| {
            println!(
                "words={} postings={} docs_file_words={}",
                stats.words, stats.postings, stats.docs_file_words
            );
        }),
        _ => {
            eprintln!("{USAGE}");
            std::process::exit(2);
        }
    };

    if let Err(e) = result {
        tracing::error!("{e}");
        std::process::exit(1);
    }
}

fn stats(dir: &Path, config: &IndexConfig) -> Result<(), IndexError> {
    let index = ReverseIndexReader::open(dir, config)?;
    let stats = index.stats()?;
    println!(
        "words={} postings={} docs_file_words={}",
        stats.words, stats.postings, stats.docs_file_words
    );
    Ok(())
}

fn documents(dir: &Path, word: u64, config: &IndexConfig) -> Result<(), IndexError> {
    let index = ReverseIndexReader::open(dir, config)?;
    let Some(tree) = index.documents(word)? else {
        return Ok(());
    };

    let entry_size = tree.context().entry_size();
    for entry in tree.data().chunks_exact(entry_size) {
        if let [doc, metadata] = entry {
            println!("{doc}\t{metadata:#x}");
        } else {
            println!("{}", entry[0]);
        }
    }
    Ok(())
}
