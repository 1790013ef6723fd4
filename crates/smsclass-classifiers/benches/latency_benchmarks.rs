//! Latency benchmarks for the preprocessing stages
//!
//! Every message is cleaned and encoded on the ingestion path, so these
//! stages need to stay well under a millisecond per SMS.
//!
//! Run with: cargo bench -p smsclass-classifiers

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use std::sync::Arc;

use smsclass_classifiers::decoder::softmax;
use smsclass_classifiers::{
    hash_str, ClassificationDecoder, HashingVectorizer, QuantParams, TextCleaner, Vocabulary,
    WordPieceTokenizer,
};
use smsclass_core::LabelTable;

const MESSAGES: &[(&str, &str)] = &[
    ("otp", "Your OTP for login is 483920. Do not share it with anyone."),
    (
        "debit",
        "Rs. 1,234.50 debited from A/c XX1234 on 12-03-24 to VPA merchant@upi. UPI Ref 412345678901",
    ),
    (
        "promo",
        "Flat 50% OFF on all shoes! Visit https://shop.example.com/deals or www.bigsale.in today",
    ),
];

fn benchmark_cleaner(c: &mut Criterion) {
    let cleaner = TextCleaner::new().expect("Failed to create text cleaner");

    let mut group = c.benchmark_group("TextCleaner");
    for (name, text) in MESSAGES {
        group.bench_with_input(BenchmarkId::new("clean", name), text, |b, text| {
            b.iter(|| cleaner.clean(black_box(text)))
        });
    }
    group.finish();
}

fn benchmark_vectorizer(c: &mut Criterion) {
    let cleaner = TextCleaner::new().expect("Failed to create text cleaner");
    let vectorizer = HashingVectorizer::new().expect("Failed to create vectorizer");

    let mut group = c.benchmark_group("HashingVectorizer");
    for (name, text) in MESSAGES {
        let cleaned = cleaner.clean(text);
        group.bench_with_input(BenchmarkId::new("transform", name), &cleaned, |b, cleaned| {
            b.iter(|| vectorizer.transform(black_box(cleaned)))
        });
    }
    group.bench_function("hash_str", |b| b.iter(|| hash_str(black_box("debited from"))));
    group.finish();
}

fn benchmark_tokenizer(c: &mut Criterion) {
    let mut tokens: Vec<String> = (0..103).map(|i| format!("[unused{}]", i)).collect();
    tokens[0] = "[PAD]".into();
    tokens[100] = "[UNK]".into();
    tokens[101] = "[CLS]".into();
    tokens[102] = "[SEP]".into();
    for word in ["your", "otp", "for", "login", "is", "debit", "##ed", "from", "rs", "."] {
        tokens.push(word.into());
    }
    let tokenizer = WordPieceTokenizer::new(Arc::new(Vocabulary::from_tokens(tokens)))
        .expect("Failed to create tokenizer");

    let mut group = c.benchmark_group("WordPieceTokenizer");
    for (name, text) in MESSAGES {
        group.bench_with_input(BenchmarkId::new("tokenize", name), text, |b, text| {
            b.iter(|| tokenizer.tokenize(black_box(text)))
        });
    }
    let long = vec!["debited"; 400].join(" ");
    group.bench_function("tokenize_truncated", |b| {
        b.iter(|| tokenizer.tokenize(black_box(&long)))
    });
    group.finish();
}

fn benchmark_decoder(c: &mut Criterion) {
    let decoder = ClassificationDecoder::default();
    let labels = LabelTable::sms_default();
    let params = QuantParams::new(0.0625, -12);
    let raw: [i8; 5] = [40, -12, -30, 5, -12];

    c.bench_function("decode_quantized_output", |b| {
        b.iter(|| {
            let logits = params.dequantize_slice(black_box(&raw));
            decoder.decode(&logits, &labels)
        })
    });
    c.bench_function("softmax_5", |b| {
        b.iter(|| softmax(black_box(&[2.0, 0.5, -1.0, 0.0, 0.3])))
    });
}

criterion_group!(
    benches,
    benchmark_cleaner,
    benchmark_vectorizer,
    benchmark_tokenizer,
    benchmark_decoder
);
criterion_main!(benches);
