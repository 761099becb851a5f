use burn::prelude::Backend;
use burn::tensor::{cast::ToElement, Int, Tensor, TensorData};

use crate::error::{PpoError, Result};

/// True when no element is NaN or infinite.
pub fn is_finite<B: Backend, const D: usize>(tensor: Tensor<B, D>) -> bool {
    let has_nan = tensor.clone().is_nan().any().into_scalar();
    if has_nan {
        return false;
    }
    let abs_max = tensor.abs().max().into_scalar().to_f32();
    abs_max.is_finite()
}

/// Zero-mean, unit-variance rescaling of a 1-D tensor.
pub fn normalize<B: Backend>(tensor: Tensor<B, 1>) -> Tensor<B, 1> {
    let mean = tensor.clone().mean().into_scalar().to_f32();
    if tensor.dims()[0] < 2 {
        return tensor.sub_scalar(mean);
    }
    let std = tensor.clone().var(0).sqrt().into_scalar().to_f32();
    tensor.sub_scalar(mean).div_scalar(std + 1e-8)
}

pub fn vec2tensor1<B: Backend>(values: &[f32], device: &B::Device) -> Tensor<B, 1> {
    Tensor::<B, 1>::from_data(TensorData::new(values.to_vec(), [values.len()]), device)
}

pub fn tensor2vec<B: Backend, const D: usize>(tensor: Tensor<B, D>) -> Result<Vec<f32>> {
    tensor
        .into_data()
        .convert::<f32>()
        .into_vec::<f32>()
        .map_err(|err| PpoError::TensorData(format!("{err:?}")))
}

pub fn int_tensor2vec<B: Backend, const D: usize>(tensor: Tensor<B, D, Int>) -> Result<Vec<i64>> {
    tensor
        .into_data()
        .convert::<i64>()
        .into_vec::<i64>()
        .map_err(|err| PpoError::TensorData(format!("{err:?}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::ndarray::{NdArray, NdArrayDevice};

    #[test]
    fn test_is_finite() {
        let device = NdArrayDevice::Cpu;
        let ok = Tensor::<NdArray, 2>::from_floats([[1.0, -2.0], [0.0, 3.5]], &device);
        let nan = Tensor::<NdArray, 1>::from_floats([1.0, f32::NAN], &device);
        let inf = Tensor::<NdArray, 1>::from_floats([f32::NEG_INFINITY, 0.0], &device);
        assert!(is_finite(ok));
        assert!(!is_finite(nan));
        assert!(!is_finite(inf));
    }

    #[test]
    fn test_normalize() {
        let device = NdArrayDevice::Cpu;
        let x = vec2tensor1::<NdArray>(&[1.0, 2.0, 3.0, 4.0], &device);
        let out = tensor2vec(normalize(x)).unwrap();
        let mean: f32 = out.iter().sum::<f32>() / 4.0;
        assert!(mean.abs() < 1e-6);
        assert!(out[0] < out[3]);
    }
}
