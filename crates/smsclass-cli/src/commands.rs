//! Subcommand implementations

use crate::cli::ClassifyArgs;
use anyhow::{anyhow, Context, Result};
use serde_json::{json, Value};
use smsclass_candle_plugin::CandleBackendLoader;
use smsclass_classifiers::metrics::describe_metrics;
use smsclass_classifiers::{
    hash_str, ClassifierConfig, ClassifierRegistry, HashingVectorizer, ModelSettings,
    ResourceSource, TextCleaner, WordPieceTokenizer,
};
use std::io::BufRead;
use std::sync::Arc;
use tracing::info;

/// Use the given texts, or read one message per line from stdin
pub fn read_inputs(texts: Vec<String>) -> Result<Vec<String>> {
    if !texts.is_empty() {
        return Ok(texts);
    }

    let stdin = std::io::stdin();
    stdin
        .lock()
        .lines()
        .collect::<std::io::Result<Vec<_>>>()
        .context("Failed to read messages from stdin")
}

pub fn hash_report(ngram: &str) -> Value {
    json!({
        "ngram": ngram,
        "hash": hash_str(ngram),
        "bucket": HashingVectorizer::bucket(ngram),
    })
}

pub fn vectorize_report(
    cleaner: &TextCleaner,
    vectorizer: &HashingVectorizer,
    text: &str,
    raw: bool,
) -> Value {
    let cleaned = if raw {
        text.to_string()
    } else {
        cleaner.clean(text)
    };
    let features = vectorizer.transform(&cleaned);

    json!({
        "cleaned": cleaned,
        "ngrams": vectorizer.ngrams(&cleaned),
        "buckets": features.nonzero(),
        "total": features.total(),
    })
}

pub fn tokenize_report(tokenizer: &WordPieceTokenizer, text: &str, full: bool) -> Value {
    let sequence = tokenizer.tokenize(text);
    let (ids, mask) = if full {
        (&sequence.input_ids[..], &sequence.attention_mask[..])
    } else {
        let active = sequence.active_ids();
        (active, &sequence.attention_mask[..active.len()])
    };

    json!({
        "normalized": tokenizer.normalize(text),
        "input_ids": ids,
        "attention_mask": mask,
        "attended": sequence.attended(),
    })
}

/// Load the config file (if any) and apply command-line overrides
pub fn build_config(args: &ClassifyArgs) -> Result<ClassifierConfig> {
    let mut config = match &args.config {
        Some(path) => ClassifierConfig::from_file(path)?,
        None => ClassifierConfig::default(),
    };

    if let Some(path) = &args.hashing_model {
        config.hashing = Some(ModelSettings::new(ResourceSource::local(path)));
    }
    if let Some(path) = &args.sequence_model {
        config.sequence = Some(ModelSettings::new(ResourceSource::local(path)));
    }
    if let Some(path) = &args.vocab {
        config.vocabulary = Some(ResourceSource::local(path));
    }
    if let Some(path) = &args.labels {
        config.label_mapping = Some(ResourceSource::local(path));
    }
    if let Some(threshold) = args.threshold {
        for settings in [&mut config.hashing, &mut config.sequence]
            .into_iter()
            .flatten()
        {
            settings.threshold = threshold;
        }
    }
    if let Some(device) = args.device {
        config.device = device;
    }

    config.validate()?;
    if config.hashing.is_none() && config.sequence.is_none() {
        return Err(anyhow!(
            "no model configured; pass --config, --hashing-model or --sequence-model"
        ));
    }

    Ok(config)
}

pub async fn classify(args: ClassifyArgs) -> Result<()> {
    describe_metrics();

    let config = build_config(&args)?;
    let registry = ClassifierRegistry::new(config, Arc::new(CandleBackendLoader::new()))?;

    let ready = registry.warm_up().await;
    info!("Classifiers ready: {:?}", ready);

    let texts = read_inputs(args.texts)?;
    let outcomes = match args.variant.classifier_name() {
        None => registry.classify_batch(&texts).await,
        Some(name) => {
            let classifier = registry
                .get(name)
                .ok_or_else(|| anyhow!("{} classifier is not configured", name))?;
            classifier.classify_batch(&texts).await
        }
    };

    for outcome in &outcomes {
        println!("{}", serde_json::to_string(outcome)?);
    }

    if args.stats {
        let snapshot = registry.metrics().snapshot();
        eprintln!("{}", serde_json::to_string_pretty(&snapshot)?);
        eprintln!("Average latency: {}us", snapshot.avg_latency_us());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use smsclass_classifiers::{DeviceSpec, Vocabulary};
    use tempfile::TempDir;

    #[test]
    fn test_hash_report() {
        let report = hash_report("otp");
        assert_eq!(report["ngram"], "otp");
        assert_eq!(report["hash"], hash_str("otp"));
        assert_eq!(report["bucket"], HashingVectorizer::bucket("otp"));
    }

    #[test]
    fn test_vectorize_report_cleans_input() {
        let report = vectorize_report(
            &TextCleaner::default(),
            &HashingVectorizer::default(),
            "Your OTP",
            false,
        );

        assert_eq!(report["cleaned"], "your otp");
        assert_eq!(report["ngrams"], json!(["your", "otp", "your otp"]));
        assert_eq!(report["total"], 3.0);
    }

    #[test]
    fn test_tokenize_report_trims_padding() {
        let mut tokens: Vec<String> = (0..103).map(|i| format!("[unused{}]", i)).collect();
        tokens[0] = "[PAD]".into();
        tokens[100] = "[UNK]".into();
        tokens[101] = "[CLS]".into();
        tokens[102] = "[SEP]".into();
        tokens.push("otp".into());
        let tokenizer = WordPieceTokenizer::new(Arc::new(Vocabulary::from_tokens(tokens))).unwrap();

        let report = tokenize_report(&tokenizer, "  OTP  ", false);
        assert_eq!(report["normalized"], "otp");
        assert_eq!(report["input_ids"], json!([101, 103, 102]));
        assert_eq!(report["attention_mask"], json!([1, 1, 1]));

        let full = tokenize_report(&tokenizer, "otp", true);
        assert_eq!(full["input_ids"].as_array().map(Vec::len), Some(128));
    }

    #[test]
    fn test_build_config_overrides_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("classifiers.yaml");
        std::fs::write(
            &path,
            "hashing:\n  model: { path: ./hashing.safetensors }\n  threshold: 0.5\n",
        )
        .unwrap();

        let args = ClassifyArgs {
            config: Some(path),
            threshold: Some(0.8),
            device: Some(DeviceSpec::Cuda { index: Some(1) }),
            ..Default::default()
        };
        let config = build_config(&args).unwrap();

        assert_eq!(config.hashing.as_ref().map(|s| s.threshold), Some(0.8));
        assert_eq!(config.device, DeviceSpec::Cuda { index: Some(1) });
        assert!(config.sequence.is_none());
    }

    #[test]
    fn test_build_config_requires_a_model() {
        assert!(build_config(&ClassifyArgs::default()).is_err());
    }

    #[test]
    fn test_build_config_sequence_needs_vocab() {
        let args = ClassifyArgs {
            sequence_model: Some("model.safetensors".into()),
            ..Default::default()
        };
        assert!(build_config(&args).is_err());

        let args = ClassifyArgs {
            vocab: Some("vocab.txt".into()),
            ..args
        };
        assert!(build_config(&args).is_ok());
    }
}
