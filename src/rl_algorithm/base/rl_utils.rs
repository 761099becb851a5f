use std::marker::PhantomData;

use burn::module::{AutodiffModule, ModuleVisitor, ParamId};
use burn::optim::{GradientsParams, Optimizer};
use burn::tensor::backend::AutodiffBackend;
use burn::tensor::cast::ToElement;
use burn::tensor::Tensor;
use burn::LearningRate;

use crate::burn_utils::is_finite;
use crate::error::{PpoError, Result};

/// Walks a module's float parameters and checks the matching gradients.
struct GradientFiniteCheck<'a, B: AutodiffBackend> {
    grads: &'a GradientsParams,
    non_finite: usize,
    backend: PhantomData<B>,
}

impl<B: AutodiffBackend> ModuleVisitor<B> for GradientFiniteCheck<'_, B> {
    fn visit_float<const D: usize>(&mut self, id: ParamId, _tensor: &Tensor<B, D>) {
        if let Some(grad) = self.grads.get::<B::InnerBackend, D>(id) {
            if !is_finite(grad) {
                self.non_finite += 1;
            }
        }
    }
}

/// One optimizer step on `loss`. A non-finite loss or gradient leaves the
/// module untouched and is reported as divergence.
pub(crate) fn update_parameters<B: AutodiffBackend, M: AutodiffModule<B>>(
    loss: Tensor<B, 1>,
    module: M,
    optimizer: &mut impl Optimizer<M, B>,
    learning_rate: LearningRate,
) -> Result<M> {
    let loss_value = loss.clone().into_scalar().to_f32();
    if !loss_value.is_finite() {
        return Err(PpoError::OptimizationDivergence {
            stage: "loss",
            detail: format!("loss evaluated to {loss_value}"),
        });
    }
    let gradients = loss.backward();
    let gradient_params = GradientsParams::from_grads(gradients, &module);

    let mut check = GradientFiniteCheck::<B> {
        grads: &gradient_params,
        non_finite: 0,
        backend: PhantomData,
    };
    module.visit(&mut check);
    if check.non_finite > 0 {
        return Err(PpoError::OptimizationDivergence {
            stage: "gradient",
            detail: format!("{} parameter gradients are not finite", check.non_finite),
        });
    }
    Ok(optimizer.step(learning_rate, module, gradient_params))
}

/// Running means of the loss terms over one update call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdateInfo {
    pub policy_loss: f32,
    pub value_loss: f32,
    pub kl_to_prior: f32,
    pub entropy: f32,
    pub clip_fraction: f32,
    pub mean_return: f32,
    pub num_updates: usize,
}

impl UpdateInfo {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn accumulate(&mut self, step: &UpdateInfo) {
        let n = self.num_updates as f32;
        let mean = |acc: f32, x: f32| (acc * n + x) / (n + 1.0);
        self.policy_loss = mean(self.policy_loss, step.policy_loss);
        self.value_loss = mean(self.value_loss, step.value_loss);
        self.kl_to_prior = mean(self.kl_to_prior, step.kl_to_prior);
        self.entropy = mean(self.entropy, step.entropy);
        self.clip_fraction = mean(self.clip_fraction, step.clip_fraction);
        self.num_updates += 1;
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GAEOutput {
    pub advantages: Vec<f32>,
    pub returns: Vec<f32>,
}

/// Generalized advantage estimation over one rollout.
///
/// `last_value` bootstraps the step after the final transition. The
/// recurrence runs backward and is cut wherever `dones[t]` is set.
pub(crate) fn get_gae(
    rewards: &[f32],
    values: &[f32],
    dones: &[bool],
    last_value: f32,
    gamma: f32,
    lambda: f32,
) -> GAEOutput {
    let n = rewards.len();
    let mut advantages = vec![0.0f32; n];
    let mut running_advantage = 0.0f32;

    for t in (0..n).rev() {
        let not_done = if dones[t] { 0.0 } else { 1.0 };
        let next_value = if t + 1 < n { values[t + 1] } else { last_value };
        let delta = rewards[t] + gamma * next_value * not_done - values[t];
        running_advantage = delta + gamma * lambda * running_advantage * not_done;
        advantages[t] = running_advantage;
    }

    let returns = advantages.iter().zip(values).map(|(a, v)| a + v).collect();
    GAEOutput {
        advantages,
        returns,
    }
}
