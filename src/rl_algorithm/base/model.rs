use crate::burn_utils::distribution::Normal;
use burn::module::AutodiffModule;
use burn::prelude::*;
use burn::tensor::backend::AutodiffBackend;

/// Heads of one actor-critic forward pass.
#[derive(Debug, Clone)]
pub struct PolicyOutput<B: Backend> {
    /// Action mean in `[0, 1]`, `(batch, action_dim)`.
    pub mean: Tensor<B, 2>,
    /// State-independent standard deviation, `(action_dim)`.
    pub std: Tensor<B, 1>,
    /// Critic estimate, `(batch, 1)`.
    pub value: Tensor<B, 2>,
}

impl<B: Backend> PolicyOutput<B> {
    pub fn new(mean: Tensor<B, 2>, std: Tensor<B, 1>, value: Tensor<B, 2>) -> Self {
        Self { mean, std, value }
    }

    pub fn into_dist(self) -> (Normal<B>, Tensor<B, 2>) {
        (Normal::new(self.mean, self.std), self.value)
    }
}

/// Actor-critic networks over discretized states.
///
/// Inputs are `(batch, n_inputs)` embedding indices in `[0, grid_size)`.
/// Parameters are reached through the burn [`Module`] supertrait.
pub trait ActorCriticModel<B: AutodiffBackend>: AutodiffModule<B> {
    fn autodiff_forward(&self, states: Tensor<B, 2, Int>) -> PolicyOutput<B>;

    /// Forward pass on the inner backend; nothing is recorded for autodiff.
    fn eval_forward(&self, states: Tensor<B::InnerBackend, 2, Int>)
        -> PolicyOutput<B::InnerBackend>;

    /// Size of the quantization grid the state embedding expects.
    fn grid_size(&self) -> usize;

    fn action_dim(&self) -> usize;

    fn std_mean(&self) -> Tensor<B, 1>;

    fn get_dist(&self, states: Tensor<B, 2, Int>) -> (Normal<B>, Tensor<B, 2>) {
        self.autodiff_forward(states).into_dist()
    }
}
