use candle_core::{DType, Device, Tensor};
use candle_nn::{Embedding, Linear, Module};
use smsclass_classifiers::backend::{
    BackendLoader, BackendOptions, DeviceSpec, HashedFeatureBackend, SequenceBackend,
};
use smsclass_classifiers::{QuantParams, TensorQuantization, MAX_SEQUENCE_LENGTH};
use smsclass_core::{Error, Result};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

/// Tensor holding the classification head weight, `[num_labels, in_features]`
pub const CLASSIFIER_WEIGHT: &str = "classifier.weight";
/// Optional classification head bias, `[num_labels]`
pub const CLASSIFIER_BIAS: &str = "classifier.bias";
/// Token embedding table of the sequence model, `[vocab_size, hidden_size]`
pub const EMBEDDINGS_WEIGHT: &str = "embeddings.weight";

const QUANT_PREFIX: &str = "quantization";

/// Candle-backed loader for safetensors model files.
#[derive(Debug, Clone, Copy, Default)]
pub struct CandleBackendLoader;

impl CandleBackendLoader {
    pub fn new() -> Self {
        Self
    }
}

impl BackendLoader for CandleBackendLoader {
    fn load_hashed(
        &self,
        model: &Path,
        options: &BackendOptions,
    ) -> Result<Arc<dyn HashedFeatureBackend>> {
        Ok(Arc::new(LinearHashingBackend::load(model, options)?))
    }

    fn load_sequence(
        &self,
        model: &Path,
        options: &BackendOptions,
    ) -> Result<Arc<dyn SequenceBackend>> {
        Ok(Arc::new(PooledSequenceBackend::load(model, options)?))
    }
}

/// Linear classifier over the hashed feature vector.
pub struct LinearHashingBackend {
    name: String,
    classifier: Linear,
    input_width: usize,
    quantization: TensorQuantization,
    device: Device,
}

impl LinearHashingBackend {
    pub fn load(model_path: &Path, options: &BackendOptions) -> Result<Self> {
        let device = get_device(options.device)?;
        let mut tensors = load_tensors(model_path, &device)?;

        let (classifier, num_labels, input_width) = take_linear(&mut tensors, model_path)?;
        let quantization = TensorQuantization {
            input: read_quant_params(&tensors, "input")?,
            output: read_quant_params(&tensors, "output")?,
        };

        tracing::info!(
            "Loaded linear hashing model from {} (in_features={}, num_labels={}, input={:?}, output={:?})",
            model_path.display(),
            input_width,
            num_labels,
            quantization.input,
            quantization.output
        );

        Ok(Self {
            name: model_name(model_path),
            classifier,
            input_width,
            quantization,
            device,
        })
    }

    fn forward(&self, features: &[i8]) -> candle_core::Result<Vec<f32>> {
        let values = self.quantization.input.dequantize_slice(features);
        let input = Tensor::from_vec(values, (1, features.len()), &self.device)?;
        self.classifier.forward(&input)?.squeeze(0)?.to_vec1::<f32>()
    }
}

impl HashedFeatureBackend for LinearHashingBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn quantization(&self) -> TensorQuantization {
        self.quantization
    }

    fn input_width(&self) -> usize {
        self.input_width
    }

    fn run(&self, features: &[i8]) -> Result<Vec<i8>> {
        if features.len() != self.input_width {
            return Err(Error::backend(format!(
                "Expected {} input features, got {}",
                self.input_width,
                features.len()
            )));
        }

        let logits = self
            .forward(features)
            .map_err(|e| Error::backend(format!("Hashing model forward failed: {}", e)))?;
        Ok(self.quantization.output.quantize_slice(&logits))
    }
}

/// Token embeddings, masked mean pooling and a linear head.
pub struct PooledSequenceBackend {
    name: String,
    embeddings: Embedding,
    classifier: Linear,
    vocab_size: usize,
    output: QuantParams,
    device: Device,
}

impl PooledSequenceBackend {
    pub fn load(model_path: &Path, options: &BackendOptions) -> Result<Self> {
        let device = get_device(options.device)?;
        let mut tensors = load_tensors(model_path, &device)?;

        let table = take_tensor(&mut tensors, EMBEDDINGS_WEIGHT, model_path)?;
        let (vocab_size, hidden_size) = table.dims2().map_err(|e| {
            Error::resource(format!("{} must be 2-dimensional: {}", EMBEDDINGS_WEIGHT, e))
        })?;
        let embeddings = Embedding::new(table, hidden_size);

        let (classifier, num_labels, head_width) = take_linear(&mut tensors, model_path)?;
        if head_width != hidden_size {
            return Err(Error::resource(format!(
                "Classifier expects {} features but embeddings have {}",
                head_width, hidden_size
            )));
        }

        let output = read_quant_params(&tensors, "output")?;

        tracing::info!(
            "Loaded pooled sequence model from {} (vocab_size={}, hidden_size={}, num_labels={})",
            model_path.display(),
            vocab_size,
            hidden_size,
            num_labels
        );

        Ok(Self {
            name: model_name(model_path),
            embeddings,
            classifier,
            vocab_size,
            output,
            device,
        })
    }

    pub fn vocab_size(&self) -> usize {
        self.vocab_size
    }

    fn forward(
        &self,
        input_ids: &[i32; MAX_SEQUENCE_LENGTH],
        attention_mask: &[i32; MAX_SEQUENCE_LENGTH],
    ) -> candle_core::Result<Vec<f32>> {
        let ids: Vec<u32> = input_ids.iter().map(|id| *id as u32).collect();
        let mask: Vec<f32> = attention_mask.iter().map(|m| *m as f32).collect();

        let ids = Tensor::from_vec(ids, (1, MAX_SEQUENCE_LENGTH), &self.device)?;
        let mask = Tensor::from_vec(mask, (1, MAX_SEQUENCE_LENGTH, 1), &self.device)?;

        let hidden = self.embeddings.forward(&ids)?;
        let summed = hidden.broadcast_mul(&mask)?.sum(1)?;
        let count = mask.sum(1)?.maximum(1f32)?;
        let pooled = summed.broadcast_div(&count)?;

        self.classifier.forward(&pooled)?.squeeze(0)?.to_vec1::<f32>()
    }
}

impl SequenceBackend for PooledSequenceBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn output_quantization(&self) -> QuantParams {
        self.output
    }

    fn run(
        &self,
        input_ids: &[i32; MAX_SEQUENCE_LENGTH],
        attention_mask: &[i32; MAX_SEQUENCE_LENGTH],
    ) -> Result<Vec<i8>> {
        if let Some(id) = input_ids
            .iter()
            .find(|id| **id < 0 || **id as usize >= self.vocab_size)
        {
            return Err(Error::backend(format!(
                "Token id {} outside embedding table of {} rows",
                id, self.vocab_size
            )));
        }

        let logits = self
            .forward(input_ids, attention_mask)
            .map_err(|e| Error::backend(format!("Sequence model forward failed: {}", e)))?;
        Ok(self.output.quantize_slice(&logits))
    }
}

fn get_device(device: DeviceSpec) -> Result<Device> {
    match device {
        DeviceSpec::Cpu => Ok(Device::Cpu),
        DeviceSpec::Cuda { index } => Device::new_cuda(index.unwrap_or(0))
            .map_err(|e| Error::backend(format!("Failed to initialize CUDA: {}", e))),
        DeviceSpec::Metal { index } => Device::new_metal(index.unwrap_or(0))
            .map_err(|e| Error::backend(format!("Failed to initialize Metal: {}", e))),
    }
}

fn model_name(model_path: &Path) -> String {
    model_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "candle-model".to_string())
}

fn load_tensors(model_path: &Path, device: &Device) -> Result<HashMap<String, Tensor>> {
    if !model_path.exists() {
        return Err(Error::resource(format!(
            "Model file not found: {}",
            model_path.display()
        )));
    }

    candle_core::safetensors::load(model_path, device).map_err(|e| {
        Error::resource(format!(
            "Failed to load weights from {}: {}",
            model_path.display(),
            e
        ))
    })
}

fn take_tensor(
    tensors: &mut HashMap<String, Tensor>,
    name: &str,
    model_path: &Path,
) -> Result<Tensor> {
    let tensor = tensors.remove(name).ok_or_else(|| {
        Error::resource(format!("{} not found in {}", name, model_path.display()))
    })?;
    tensor
        .to_dtype(DType::F32)
        .map_err(|e| Error::resource(format!("Failed to convert {}: {}", name, e)))
}

/// Classification head plus its `(num_labels, in_features)`
fn take_linear(
    tensors: &mut HashMap<String, Tensor>,
    model_path: &Path,
) -> Result<(Linear, usize, usize)> {
    let weight = take_tensor(tensors, CLASSIFIER_WEIGHT, model_path)?;
    let (num_labels, in_features) = weight.dims2().map_err(|e| {
        Error::resource(format!("{} must be 2-dimensional: {}", CLASSIFIER_WEIGHT, e))
    })?;

    let bias = match tensors.contains_key(CLASSIFIER_BIAS) {
        true => Some(take_tensor(tensors, CLASSIFIER_BIAS, model_path)?),
        false => None,
    };

    Ok((Linear::new(weight, bias), num_labels, in_features))
}

/// Read `quantization.{tensor}_scale` / `_zero_point`; absent means not quantized
fn read_quant_params(tensors: &HashMap<String, Tensor>, tensor: &str) -> Result<QuantParams> {
    let scale = read_scalar(tensors, &format!("{}.{}_scale", QUANT_PREFIX, tensor))?;
    let zero_point = read_scalar(tensors, &format!("{}.{}_zero_point", QUANT_PREFIX, tensor))?;

    Ok(QuantParams::new(
        scale.unwrap_or(0.0),
        zero_point.unwrap_or(0.0).round() as i32,
    ))
}

fn read_scalar(tensors: &HashMap<String, Tensor>, name: &str) -> Result<Option<f32>> {
    let Some(tensor) = tensors.get(name) else {
        return Ok(None);
    };

    let values = tensor
        .flatten_all()
        .and_then(|t| t.to_dtype(DType::F32))
        .and_then(|t| t.to_vec1::<f32>())
        .map_err(|e| Error::resource(format!("Failed to read {}: {}", name, e)))?;

    Ok(values.first().copied())
}
