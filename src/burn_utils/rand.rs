use burn::prelude::Backend;
use burn::tensor::{Int, Tensor, TensorData};
use rand::seq::SliceRandom;
use rand::Rng;

/// A random permutation of `0..n` drawn from `rng`.
pub fn randperm<R: Rng>(n: usize, rng: &mut R) -> Vec<usize> {
    let mut indices: Vec<usize> = (0..n).collect();
    indices.shuffle(rng);
    indices
}

pub fn indices_to_tensor<B: Backend>(indices: &[usize], device: &B::Device) -> Tensor<B, 1, Int> {
    let values = indices.iter().map(|&i| i as i64).collect::<Vec<i64>>();
    let shape = [values.len()];
    Tensor::<B, 1, Int>::from_data(TensorData::new(values, shape), device)
}
