//! smsclass
//!
//! Command-line front end for the SMS cleaning, encoding and classification
//! pipeline.

use anyhow::Result;
use clap::Parser;
use smsclass_classifiers::{HashingVectorizer, TextCleaner, Vocabulary, WordPieceTokenizer};
use smsclass_cli::commands;
use smsclass_cli::{Cli, Commands};
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_tracing(cli.verbose);

    match cli.command {
        Commands::Clean { texts } => {
            let cleaner = TextCleaner::new()?;
            for text in commands::read_inputs(texts)? {
                println!("{}", cleaner.clean(&text));
            }
        }

        Commands::Hash { ngrams } => {
            for ngram in &ngrams {
                println!("{}", commands::hash_report(ngram));
            }
        }

        Commands::Vectorize { texts, raw } => {
            let cleaner = TextCleaner::new()?;
            let vectorizer = HashingVectorizer::new()?;
            for text in commands::read_inputs(texts)? {
                println!(
                    "{}",
                    commands::vectorize_report(&cleaner, &vectorizer, &text, raw)
                );
            }
        }

        Commands::Tokenize { vocab, full, texts } => {
            let tokenizer = WordPieceTokenizer::new(Arc::new(Vocabulary::from_file(&vocab)?))?;
            for text in commands::read_inputs(texts)? {
                println!("{}", commands::tokenize_report(&tokenizer, &text, full));
            }
        }

        Commands::Classify(args) => commands::classify(args).await?,
    }

    Ok(())
}

fn init_tracing(verbose: bool) {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = if verbose {
        EnvFilter::new("smsclass=debug,smsclass_classifiers=debug,smsclass_candle_plugin=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new("smsclass=info,smsclass_classifiers=info,smsclass_candle_plugin=info")
        })
    };

    // Logs go to stderr so stdout stays machine-readable
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
