use candle_core::{DType, Device, Tensor};
use smsclass_candle_plugin::{CandleBackendLoader, LinearHashingBackend, PooledSequenceBackend};
use smsclass_classifiers::{
    BackendOptions, ClassifierConfig, ClassifierRegistry, HashedFeatureBackend, HashingClassifier,
    HashingVectorizer, ModelSettings, ResourceSource, SequenceBackend, Vocabulary,
    WordPieceTokenizer, N_FEATURES,
};
use smsclass_core::{ClassificationOutcome, Error, LabelTable};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

const OTP_ROW: usize = 2;
const OTP_TOKEN: usize = 104;
const HIDDEN: usize = 4;

fn tensor(values: Vec<f32>, shape: (usize, usize)) -> Tensor {
    Tensor::from_vec(values, shape, &Device::Cpu).unwrap()
}

fn scalar(value: f32) -> Tensor {
    Tensor::new(&[value], &Device::Cpu).unwrap()
}

/// Linear head that only reacts to the "otp" unigram
fn write_hashing_model(dir: &Path) -> PathBuf {
    let mut weight = vec![0.0f32; 5 * N_FEATURES];
    weight[OTP_ROW * N_FEATURES + HashingVectorizer::bucket("otp")] = 5.0;

    let mut tensors = HashMap::new();
    tensors.insert("classifier.weight".to_string(), tensor(weight, (5, N_FEATURES)));
    tensors.insert("quantization.output_scale".to_string(), scalar(0.1));
    tensors.insert("quantization.output_zero_point".to_string(), scalar(0.0));

    let path = dir.join("hashing.safetensors");
    candle_core::safetensors::save(&tensors, &path).unwrap();
    path
}

fn write_vocab(dir: &Path) -> PathBuf {
    let mut tokens: Vec<String> = (0..103).map(|i| format!("[unused{}]", i)).collect();
    tokens[0] = "[PAD]".into();
    tokens[100] = "[UNK]".into();
    tokens[101] = "[CLS]".into();
    tokens[102] = "[SEP]".into();
    tokens.push("debited".into());
    tokens.push("otp".into());

    let path = dir.join("vocab.txt");
    std::fs::write(&path, tokens.join("\n")).unwrap();
    path
}

/// Embeddings where only "otp" and `[PAD]` are non-zero
fn write_sequence_model(dir: &Path, head_width: usize) -> PathBuf {
    let vocab_size = OTP_TOKEN + 1;
    let mut embeddings = vec![0.0f32; vocab_size * HIDDEN];
    embeddings[0] = 50.0;
    embeddings[OTP_TOKEN * HIDDEN] = 3.0;

    let mut head = vec![0.0f32; 5 * head_width];
    head[OTP_ROW * head_width] = 10.0;

    let mut tensors = HashMap::new();
    tensors.insert(
        "embeddings.weight".to_string(),
        tensor(embeddings, (vocab_size, HIDDEN)),
    );
    tensors.insert("classifier.weight".to_string(), tensor(head, (5, head_width)));
    tensors.insert(
        "classifier.bias".to_string(),
        Tensor::zeros(5, DType::F32, &Device::Cpu).unwrap(),
    );
    tensors.insert("quantization.output_scale".to_string(), scalar(0.1));

    let path = dir.join("sequence.safetensors");
    candle_core::safetensors::save(&tensors, &path).unwrap();
    path
}

#[test]
fn test_hashing_backend_classifies_otp() {
    let dir = TempDir::new().unwrap();
    let model = write_hashing_model(dir.path());
    let backend = LinearHashingBackend::load(&model, &BackendOptions::default()).unwrap();

    assert_eq!(backend.input_width(), N_FEATURES);
    assert!(backend.quantization().input.is_identity());

    let classifier =
        HashingClassifier::from_backend(Arc::new(backend), LabelTable::sms_default()).unwrap();
    let outcome = classifier.classify_blocking("OTP");

    assert!(!outcome.is_degraded());
    assert_eq!(outcome.label(), "otp");
    assert!(outcome.confidence() > 0.95);
}

#[test]
fn test_hashing_backend_rejects_wrong_width() {
    let dir = TempDir::new().unwrap();
    let model = write_hashing_model(dir.path());
    let backend = LinearHashingBackend::load(&model, &BackendOptions::default()).unwrap();

    let err = backend.run(&[0i8; 16]).unwrap_err();
    assert!(matches!(err, Error::Backend(_)));
}

#[test]
fn test_sequence_backend_ignores_padding() {
    let dir = TempDir::new().unwrap();
    let model = write_sequence_model(dir.path(), HIDDEN);
    let backend = PooledSequenceBackend::load(&model, &BackendOptions::default()).unwrap();
    assert_eq!(backend.vocab_size(), OTP_TOKEN + 1);

    let vocab = Vocabulary::from_file(write_vocab(dir.path())).unwrap();
    let tokenizer = WordPieceTokenizer::new(Arc::new(vocab)).unwrap();
    let sequence = tokenizer.tokenize("otp");
    assert_eq!(sequence.active_ids(), &[101, OTP_TOKEN as i32, 102]);

    // mean over [CLS, otp, SEP] is 1.0 in the first dimension; [PAD] rows are masked out
    let raw = backend
        .run(&sequence.input_ids, &sequence.attention_mask)
        .unwrap();
    assert_eq!(raw, vec![0, 0, 100, 0, 0]);
}

#[test]
fn test_sequence_backend_rejects_mismatched_head() {
    let dir = TempDir::new().unwrap();
    let err = PooledSequenceBackend::load(
        &write_sequence_model(dir.path(), HIDDEN + 1),
        &BackendOptions::default(),
    )
    .err()
    .unwrap();

    assert!(matches!(err, Error::Resource(_)));
}

#[tokio::test]
async fn test_registry_with_candle_loader() {
    let dir = TempDir::new().unwrap();
    let config = ClassifierConfig {
        vocabulary: Some(ResourceSource::local(write_vocab(dir.path()))),
        hashing: Some(ModelSettings::new(ResourceSource::local(write_hashing_model(dir.path())))),
        sequence: Some(ModelSettings::new(ResourceSource::local(write_sequence_model(
            dir.path(),
            HIDDEN,
        )))),
        ..Default::default()
    };

    let registry = ClassifierRegistry::new(config, Arc::new(CandleBackendLoader::new())).unwrap();
    assert_eq!(registry.warm_up().await, vec!["sequence", "hashing"]);

    match registry.classify("Your OTP").await {
        ClassificationOutcome::Classified(result) => {
            assert_eq!(result.label, "otp");
            assert!(result.confidence > 0.99);
            assert!(!result.is_actionable);
        }
        other => panic!("expected classified outcome, got {:?}", other),
    }
}

#[tokio::test]
async fn test_registry_falls_back_when_sequence_model_is_missing() {
    let dir = TempDir::new().unwrap();
    let config = ClassifierConfig {
        vocabulary: Some(ResourceSource::local(write_vocab(dir.path()))),
        hashing: Some(ModelSettings::new(ResourceSource::local(write_hashing_model(dir.path())))),
        sequence: Some(ModelSettings::new(ResourceSource::local(
            dir.path().join("missing.safetensors"),
        ))),
        ..Default::default()
    };

    let registry = ClassifierRegistry::new(config, Arc::new(CandleBackendLoader::new())).unwrap();
    let outcome = registry.classify("otp").await;

    assert!(!outcome.is_degraded());
    assert_eq!(outcome.label(), "otp");
}
