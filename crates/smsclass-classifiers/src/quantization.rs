//! INT8 affine quantization
//!
//! `real = (q - zero_point) * scale`. Parameters always come from the model
//! backend's tensor metadata.

use serde::{Deserialize, Serialize};

/// Affine parameters of one quantized tensor
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QuantParams {
    pub scale: f32,
    pub zero_point: i32,
}

impl QuantParams {
    /// Build from reported tensor metadata
    ///
    /// A scale of zero (or a non-finite one) marks a tensor that is not
    /// quantized and yields the identity mapping.
    pub fn new(scale: f32, zero_point: i32) -> Self {
        if scale == 0.0 || !scale.is_finite() {
            return Self::identity();
        }
        Self { scale, zero_point }
    }

    /// Scale 1, zero point 0
    pub fn identity() -> Self {
        Self {
            scale: 1.0,
            zero_point: 0,
        }
    }

    pub fn is_identity(&self) -> bool {
        self.scale == 1.0 && self.zero_point == 0
    }

    pub fn dequantize(&self, q: i8) -> f32 {
        (i32::from(q) - self.zero_point) as f32 * self.scale
    }

    /// Round to the nearest step, saturating at the `i8` range
    pub fn quantize(&self, value: f32) -> i8 {
        let q = (value / self.scale).round() + self.zero_point as f32;
        q.clamp(f32::from(i8::MIN), f32::from(i8::MAX)) as i8
    }

    pub fn dequantize_slice(&self, values: &[i8]) -> Vec<f32> {
        values.iter().map(|q| self.dequantize(*q)).collect()
    }

    pub fn quantize_slice(&self, values: &[f32]) -> Vec<i8> {
        values.iter().map(|v| self.quantize(*v)).collect()
    }

    /// Every value sits at the zero point, i.e. dequantizes to 0.0
    pub fn all_at_zero_point(&self, values: &[i8]) -> bool {
        !values.is_empty() && values.iter().all(|q| i32::from(*q) == self.zero_point)
    }
}

impl Default for QuantParams {
    fn default() -> Self {
        Self::identity()
    }
}

/// Input and output parameters reported by a backend
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct TensorQuantization {
    pub input: QuantParams,
    pub output: QuantParams,
}
