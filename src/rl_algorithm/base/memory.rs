use burn::{
    prelude::Backend,
    tensor::{Int, Tensor, TensorData},
};
use ndarray::Array2;
use rand::Rng;

use crate::burn_utils::{indices_to_tensor, randperm, vec2tensor1};
use crate::rl_env::state::{discretize_batch, ColourScheme, NormalizedState, ACTION_DIM};

use super::rl_utils::{self, GAEOutput};

#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub state: NormalizedState,
    pub action: [f32; ACTION_DIM],
    pub log_prob: f32,
    pub value: f32,
    pub reward: f32,
    pub done: bool,
}

/// Ordered transitions of the current rollout.
#[derive(Debug, Default)]
pub struct ExperienceBuffer {
    transitions: Vec<Transition>,
}

impl ExperienceBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn store(
        &mut self,
        state: NormalizedState,
        colours: &ColourScheme,
        log_prob: f32,
        value: f32,
        reward: f32,
        done: bool,
    ) {
        self.transitions.push(Transition {
            state,
            action: colours.flatten(),
            log_prob,
            value,
            reward,
            done,
        });
    }

    pub fn len(&self) -> usize {
        self.transitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transitions.is_empty()
    }

    pub fn transitions(&self) -> &[Transition] {
        &self.transitions
    }

    pub fn clear(&mut self) {
        self.transitions.clear();
    }

    pub fn rewards(&self) -> Vec<f32> {
        self.transitions.iter().map(|t| t.reward).collect()
    }

    /// GAE-λ advantages and returns for the stored rollout, bootstrapped with
    /// `last_value`. The buffer is left untouched.
    pub fn finish_path(&self, last_value: f32, gamma: f32, lambda: f32) -> GAEOutput {
        let values = self.transitions.iter().map(|t| t.value).collect::<Vec<_>>();
        let dones = self.transitions.iter().map(|t| t.done).collect::<Vec<_>>();
        rl_utils::get_gae(&self.rewards(), &values, &dones, last_value, gamma, lambda)
    }

    /// Stacks the rollout into tensors for the optimizer.
    pub fn to_batch<B: Backend>(&self, grid_size: usize, device: &B::Device) -> Batch<B> {
        let states = self.transitions.iter().map(|t| t.state).collect::<Vec<_>>();
        let mut actions = Array2::<f32>::zeros((self.len(), ACTION_DIM));
        for (mut row, t) in actions.rows_mut().into_iter().zip(&self.transitions) {
            row.assign(&ndarray::ArrayView1::from(&t.action[..]));
        }
        let old_logprobs = self.transitions.iter().map(|t| t.log_prob).collect::<Vec<_>>();
        Batch {
            states: discretize_batch(&states, grid_size, device),
            actions: ndarray2tensor2(actions, device),
            old_logprobs: vec2tensor1(&old_logprobs, device),
        }
    }

    /// Minibatch index sets for `num_epoch` passes over the buffer, with a
    /// fresh permutation drawn for every epoch.
    pub fn mini_batch_iter<B: Backend, R: Rng>(
        &self,
        num_epoch: usize,
        mini_batch_size: usize,
        rng: &mut R,
        device: &B::Device,
    ) -> MiniBatchIter<B> {
        let epoch_permutations = (0..num_epoch)
            .map(|_| randperm(self.len(), rng))
            .collect::<Vec<_>>();
        MiniBatchIter {
            epoch_permutations,
            mini_batch_size: mini_batch_size.max(1),
            epoch: 0,
            offset: 0,
            device: device.clone(),
        }
    }
}

fn ndarray2tensor2<B: Backend>(arr: Array2<f32>, device: &B::Device) -> Tensor<B, 2> {
    let shape = arr.shape().to_vec();
    let vec = arr.into_raw_vec_and_offset().0;
    Tensor::<B, 2>::from_data(TensorData::new(vec, shape), device)
}

/// The whole rollout as tensors.
#[derive(Debug, Clone)]
pub struct Batch<B: Backend> {
    pub states: Tensor<B, 2, Int>,  // (n, 6)
    pub actions: Tensor<B, 2>,      // (n, action_dim)
    pub old_logprobs: Tensor<B, 1>, // (n)
}

impl<B: Backend> Batch<B> {
    pub fn select(&self, indices: Tensor<B, 1, Int>) -> Self {
        Self {
            states: self.states.clone().select(0, indices.clone()),
            actions: self.actions.clone().select(0, indices.clone()),
            old_logprobs: self.old_logprobs.clone().select(0, indices),
        }
    }
}

#[derive(Debug, Clone)]
pub struct MiniBatch<B: Backend> {
    pub epoch: usize,
    pub indices: Tensor<B, 1, Int>,
    pub len: usize,
}

pub struct MiniBatchIter<B: Backend> {
    epoch_permutations: Vec<Vec<usize>>,
    mini_batch_size: usize,
    epoch: usize,
    offset: usize,
    device: B::Device,
}

impl<B: Backend> Iterator for MiniBatchIter<B> {
    type Item = MiniBatch<B>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let permutation = self.epoch_permutations.get(self.epoch)?;
            if self.offset < permutation.len() {
                let end = (self.offset + self.mini_batch_size).min(permutation.len());
                let chunk = &permutation[self.offset..end];
                self.offset = end;
                return Some(MiniBatch {
                    epoch: self.epoch,
                    indices: indices_to_tensor(chunk, &self.device),
                    len: chunk.len(),
                });
            }
            self.epoch += 1;
            self.offset = 0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::burn_utils::int_tensor2vec;
    use crate::rl_env::state::normalize;
    use burn::backend::ndarray::{NdArray, NdArrayDevice};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn filled_buffer(n: usize) -> ExperienceBuffer {
        let mut buffer = ExperienceBuffer::new();
        let state = normalize(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0], 2.0).unwrap();
        let colours = ColourScheme::from_flat(&[0.5; 9]).unwrap();
        for i in 0..n {
            buffer.store(state, &colours, -1.0, 0.1 * i as f32, 1.0, i + 1 == n);
        }
        buffer
    }

    #[test]
    fn test_mini_batches_cover_each_epoch() {
        let device = NdArrayDevice::Cpu;
        let buffer = filled_buffer(10);
        let mut rng = StdRng::seed_from_u64(11);
        let batches = buffer
            .mini_batch_iter::<NdArray, _>(2, 4, &mut rng, &device)
            .collect::<Vec<_>>();

        assert_eq!(
            batches.iter().map(|b| b.len).collect::<Vec<_>>(),
            vec![4, 4, 2, 4, 4, 2]
        );
        for epoch in 0..2 {
            let mut seen = batches
                .iter()
                .filter(|b| b.epoch == epoch)
                .flat_map(|b| int_tensor2vec(b.indices.clone()).unwrap())
                .collect::<Vec<_>>();
            seen.sort_unstable();
            assert_eq!(seen, (0..10).collect::<Vec<i64>>());
        }
    }

    #[test]
    fn test_each_epoch_draws_new_order() {
        let device = NdArrayDevice::Cpu;
        let buffer = filled_buffer(64);
        let mut rng = StdRng::seed_from_u64(5);
        let order = |epoch: usize, batches: &[MiniBatch<NdArray>]| {
            batches
                .iter()
                .filter(|b| b.epoch == epoch)
                .flat_map(|b| int_tensor2vec(b.indices.clone()).unwrap())
                .collect::<Vec<_>>()
        };
        let batches = buffer
            .mini_batch_iter::<NdArray, _>(2, 64, &mut rng, &device)
            .collect::<Vec<_>>();
        assert_eq!(batches.len(), 2);
        assert_ne!(order(0, &batches), order(1, &batches));
    }

    #[test]
    fn test_to_batch_and_select() {
        let device = NdArrayDevice::Cpu;
        let buffer = filled_buffer(5);
        let batch = buffer.to_batch::<NdArray>(100, &device);
        assert_eq!(batch.states.dims(), [5, 6]);
        assert_eq!(batch.actions.dims(), [5, 9]);
        assert_eq!(batch.old_logprobs.dims(), [5]);

        let picked = batch.select(indices_to_tensor(&[4, 0], &device));
        assert_eq!(picked.actions.dims(), [2, 9]);
        assert_eq!(picked.states.dims(), [2, 6]);
    }

    #[test]
    fn test_finish_path_is_read_only() {
        let buffer = filled_buffer(3);
        let out = buffer.finish_path(0.0, 0.99, 0.95);
        assert_eq!(out.advantages.len(), 3);
        assert_eq!(out.returns.len(), 3);
        assert_eq!(buffer.len(), 3);
    }
}
