use clap::{Args, Parser, Subcommand, ValueEnum};
use smsclass_classifiers::DeviceSpec;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "smsclass")]
#[command(author, version, about = "Clean, encode and classify SMS messages")]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print the normalized form of each message
    Clean {
        /// Messages to clean (one per line on stdin when omitted)
        texts: Vec<String>,
    },

    /// Print the murmur3 hash and feature bucket of each n-gram
    Hash {
        /// N-grams to hash
        #[arg(required = true)]
        ngrams: Vec<String>,
    },

    /// Print the non-zero feature buckets of each message
    Vectorize {
        /// Messages to vectorize (one per line on stdin when omitted)
        texts: Vec<String>,

        /// Treat input as already cleaned
        #[arg(long)]
        raw: bool,
    },

    /// Print WordPiece ids and attention mask of each message
    Tokenize {
        /// WordPiece vocabulary, one token per line
        #[arg(long)]
        vocab: PathBuf,

        /// Print all 128 positions instead of the attended prefix
        #[arg(long)]
        full: bool,

        /// Messages to tokenize (one per line on stdin when omitted)
        texts: Vec<String>,
    },

    /// Classify messages and print one JSON outcome per line
    Classify(ClassifyArgs),
}

#[derive(Args, Debug, Clone, Default)]
pub struct ClassifyArgs {
    /// Classifier config (YAML)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Hashed-feature model file (overrides config)
    #[arg(long)]
    pub hashing_model: Option<PathBuf>,

    /// Token-sequence model file (overrides config)
    #[arg(long)]
    pub sequence_model: Option<PathBuf>,

    /// WordPiece vocabulary (overrides config)
    #[arg(long)]
    pub vocab: Option<PathBuf>,

    /// id2label JSON mapping (overrides config)
    #[arg(long)]
    pub labels: Option<PathBuf>,

    /// Confidence threshold applied to both models (overrides config)
    #[arg(short, long)]
    pub threshold: Option<f32>,

    /// Inference device: cpu, cuda[:N] or metal[:N]
    #[arg(long, value_parser = parse_device)]
    pub device: Option<DeviceSpec>,

    /// Which classifier to run
    #[arg(long, value_enum, default_value_t = Variant::Auto)]
    pub variant: Variant,

    /// Print a metrics summary to stderr when done
    #[arg(long)]
    pub stats: bool,

    /// Messages to classify (one per line on stdin when omitted)
    pub texts: Vec<String>,
}

#[derive(ValueEnum, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Variant {
    /// Sequence model with hashing fallback
    #[default]
    Auto,
    Hashing,
    Sequence,
}

impl Variant {
    pub fn classifier_name(&self) -> Option<&'static str> {
        match self {
            Variant::Auto => None,
            Variant::Hashing => Some("hashing"),
            Variant::Sequence => Some("sequence"),
        }
    }
}

pub fn parse_device(s: &str) -> Result<DeviceSpec, String> {
    let (kind, index) = match s.split_once(':') {
        Some((kind, index)) => {
            let index = index
                .parse::<usize>()
                .map_err(|_| format!("invalid device index: {}", index))?;
            (kind, Some(index))
        }
        None => (s, None),
    };

    match kind.to_lowercase().as_str() {
        "cpu" if index.is_none() => Ok(DeviceSpec::Cpu),
        "cuda" => Ok(DeviceSpec::Cuda { index }),
        "metal" => Ok(DeviceSpec::Metal { index }),
        _ => Err(format!("unknown device: {}", s)),
    }
}
