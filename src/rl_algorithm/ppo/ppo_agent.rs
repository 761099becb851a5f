use std::marker::PhantomData;
use std::path::Path;

use burn::nn::loss::{MseLoss, Reduction};
use burn::optim::{AdamConfig, Optimizer};
use burn::prelude::*;
use burn::tensor::backend::AutodiffBackend;
use burn::tensor::cast::ToElement;
use log::{debug, trace};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::burn_utils::distribution::Normal;
use crate::burn_utils::{normalize, tensor2vec, vec2tensor1};
use crate::error::{PpoError, Result};
use crate::rl_algorithm::base::checkpoint;
use crate::rl_algorithm::base::memory::{Batch, ExperienceBuffer};
use crate::rl_algorithm::base::model::{ActorCriticModel, PolicyOutput};
use crate::rl_algorithm::base::rl_utils::{self, GAEOutput, UpdateInfo};
use crate::rl_env::state::{discretize_batch, ColourScheme, NormalizedState};

use super::config::PPOTrainingConfig;

/// One draw from the policy for a single state.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionSample {
    pub colours: ColourScheme,
    /// Log-density of the unclamped sample, summed over all action dims.
    pub log_prob: f32,
    pub value: f32,
}

/// Owns the actor-critic, its optimizer and the rollout buffer.
///
/// Inference borrows the agent immutably; storing, updating and loading need
/// exclusive access.
pub struct PpoAgent<B: AutodiffBackend, M: ActorCriticModel<B>, O: Optimizer<M, B>> {
    model: M,
    optimizer: O,
    buffer: ExperienceBuffer,
    config: PPOTrainingConfig,
    rng: StdRng,
    device: B::Device,
    backend: PhantomData<B>,
}

/// Agent with an Adam optimizer configured from `config`.
pub fn adam_agent<B: AutodiffBackend, M: ActorCriticModel<B>>(
    model: M,
    config: PPOTrainingConfig,
    device: B::Device,
) -> PpoAgent<B, M, impl Optimizer<M, B> + Clone> {
    let optimizer = AdamConfig::new()
        .with_grad_clipping(config.grad_clip.clone())
        .init::<B, M>();
    PpoAgent::new(model, optimizer, config, device)
}

impl<B: AutodiffBackend, M: ActorCriticModel<B>, O: Optimizer<M, B>> PpoAgent<B, M, O> {
    pub fn new(model: M, optimizer: O, config: PPOTrainingConfig, device: B::Device) -> Self {
        let rng = StdRng::seed_from_u64(config.seed);
        Self {
            model,
            optimizer,
            buffer: ExperienceBuffer::new(),
            config,
            rng,
            device,
            backend: PhantomData,
        }
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    pub fn config(&self) -> &PPOTrainingConfig {
        &self.config
    }

    pub fn buffer(&self) -> &ExperienceBuffer {
        &self.buffer
    }

    pub fn device(&self) -> &B::Device {
        &self.device
    }

    fn eval_output(&self, state: &NormalizedState) -> PolicyOutput<B::InnerBackend> {
        let input =
            discretize_batch::<B::InnerBackend>(&[*state], self.model.grid_size(), &self.device);
        self.model.eval_forward(input)
    }

    /// Samples a colour scheme for `state` without touching the buffer.
    ///
    /// The forward pass runs on the inner backend, so dropout is off and no
    /// graph is recorded. The same parameters and the same seeded `rng`
    /// always give the same sample.
    pub fn select_action<R: Rng>(
        &self,
        state: &NormalizedState,
        rng: &mut R,
    ) -> Result<ActionSample> {
        let (dist, value) = self.eval_output(state).into_dist();
        let action = dist.sample_with(rng);
        let log_prob = dist
            .independent_log_prob(action.clone())
            .into_scalar()
            .to_f32();
        let value = value.into_scalar().to_f32();
        let raw = tensor2vec(action)?;

        if !log_prob.is_finite() || !value.is_finite() || raw.iter().any(|v| !v.is_finite()) {
            return Err(PpoError::NonFiniteOutput(format!(
                "log_prob={log_prob}, value={value}, action={raw:?}"
            )));
        }
        Ok(ActionSample {
            colours: ColourScheme::from_flat(&raw)?,
            log_prob,
            value,
        })
    }

    /// Critic estimate for `state`.
    pub fn evaluate(&self, state: &NormalizedState) -> Result<f32> {
        let value = self.eval_output(state).value.into_scalar().to_f32();
        if !value.is_finite() {
            return Err(PpoError::NonFiniteOutput(format!("value={value}")));
        }
        Ok(value)
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
        self.buffer
            .store(state, colours, log_prob, value, reward, done);
    }

    /// Drops stored transitions without updating.
    pub fn clear_buffer(&mut self) {
        self.buffer.clear();
    }

    pub fn finish_path(&self, last_value: f32) -> GAEOutput {
        self.buffer.finish_path(
            last_value,
            self.config.gae_gamma,
            self.config.gae_lambda,
        )
    }

    /// Runs the PPO epochs over the stored rollout and clears the buffer.
    ///
    /// Mismatched lengths are rejected before anything changes. A divergent
    /// minibatch stops the update; parameters keep the last finite step and
    /// the buffer is still cleared.
    pub fn update(&mut self, advantages: &[f32], returns: &[f32]) -> Result<UpdateInfo> {
        let n = self.buffer.len();
        if advantages.len() != n {
            return Err(PpoError::InvalidShape {
                what: "advantages",
                expected: n,
                actual: advantages.len(),
            });
        }
        if returns.len() != n {
            return Err(PpoError::InvalidShape {
                what: "returns",
                expected: n,
                actual: returns.len(),
            });
        }
        if n == 0 {
            return Ok(UpdateInfo::new());
        }

        let result = self.run_epochs(advantages, returns);
        self.buffer.clear();
        if let Ok(info) = &result {
            debug!(
                "ppo update: steps={} policy_loss={:.5} value_loss={:.5} kl={:.5} clip_frac={:.3}",
                info.num_updates,
                info.policy_loss,
                info.value_loss,
                info.kl_to_prior,
                info.clip_fraction
            );
        }
        result
    }

    fn run_epochs(&mut self, advantages: &[f32], returns: &[f32]) -> Result<UpdateInfo> {
        let batch = self
            .buffer
            .to_batch::<B>(self.model.grid_size(), &self.device);
        let mut advantages_t = vec2tensor1::<B>(advantages, &self.device);
        if self.config.normalize_advantage {
            advantages_t = normalize(advantages_t);
        }
        let returns_t = vec2tensor1::<B>(returns, &self.device);

        let mut update_info = UpdateInfo::new();
        update_info.mean_return = returns.iter().sum::<f32>() / returns.len() as f32;

        let mini_batches = self.buffer.mini_batch_iter::<B, _>(
            self.config.update_epochs,
            self.config.mini_batch_size,
            &mut self.rng,
            &self.device,
        );
        for mini_batch in mini_batches {
            trace!("epoch={} mini_batch_len={}", mini_batch.epoch, mini_batch.len);
            let mini = batch.select(mini_batch.indices.clone());
            let mini_advantages = advantages_t.clone().select(0, mini_batch.indices.clone());
            let mini_returns = returns_t.clone().select(0, mini_batch.indices);

            let (model, step_info) = Self::update_minibatch(
                self.model.clone(),
                &mut self.optimizer,
                mini,
                mini_advantages,
                mini_returns,
                &self.config,
            )?;
            self.model = model;
            update_info.accumulate(&step_info);
        }
        Ok(update_info)
    }

    fn update_minibatch(
        model: M,
        optimizer: &mut O,
        batch: Batch<B>,
        advantages: Tensor<B, 1>,
        returns: Tensor<B, 1>,
        config: &PPOTrainingConfig,
    ) -> Result<(M, UpdateInfo)> {
        let (dist, value) = model.get_dist(batch.states);
        let logprobs = dist.independent_log_prob(batch.actions);
        let ratio = (logprobs - batch.old_logprobs).exp();
        trace!("ratio={}", ratio);
        let clip_fraction = ratio
            .clone()
            .sub_scalar(1.0)
            .abs()
            .greater_elem(config.epsilon_clip)
            .float()
            .mean();
        let clipped_ratio = ratio
            .clone()
            .clamp(1.0 - config.epsilon_clip, 1.0 + config.epsilon_clip);

        let now_advantage = ratio * advantages.clone();
        let clip_advantage = clipped_ratio * advantages;
        let policy_loss = now_advantage.min_pair(clip_advantage).mean().neg();

        let [batch_size, _] = value.dims();
        let value_loss =
            MseLoss::new().forward(value.reshape([batch_size]), returns, Reduction::Mean);

        let action_dim = model.action_dim();
        let device = dist.mean().device();
        let prior = Normal::new(
            Tensor::<B, 2>::ones([batch_size, action_dim], &device).mul_scalar(config.prior_mean),
            Tensor::<B, 1>::ones([action_dim], &device).mul_scalar(config.prior_std),
        );
        let kl_to_prior = dist.kl_divergence(&prior).mean();
        let entropy = dist.entropy().mean();

        let step_info = UpdateInfo {
            policy_loss: policy_loss.clone().into_scalar().to_f32(),
            value_loss: value_loss.clone().into_scalar().to_f32(),
            kl_to_prior: kl_to_prior.clone().into_scalar().to_f32(),
            entropy: entropy.clone().into_scalar().to_f32(),
            clip_fraction: clip_fraction.into_scalar().to_f32(),
            ..UpdateInfo::new()
        };
        trace!("minibatch step: {:?}", step_info);

        let loss = policy_loss
            + value_loss.mul_scalar(config.value_coef)
            + kl_to_prior.mul_scalar(config.kl_coef)
            - entropy.mul_scalar(config.entropy_coef);
        let model = rl_utils::update_parameters(loss, model, optimizer, config.learning_rate)?;
        Ok((model, step_info))
    }

    pub fn save_checkpoint(&self, dir: impl AsRef<Path>, episode: usize) -> Result<()> {
        checkpoint::save_checkpoint(dir.as_ref(), &self.model, &self.optimizer, episode)
    }

    /// Restores network and optimizer state, returning the stored episode
    /// counter. Shapes are checked before any record is read. On error the
    /// agent keeps its current parameters and optimizer state.
    pub fn load_checkpoint(&mut self, dir: impl AsRef<Path>) -> Result<usize>
    where
        O: Clone,
    {
        let dir = dir.as_ref();
        let meta = checkpoint::read_meta(dir)?;
        let model = checkpoint::load_model::<B, M>(self.model.clone(), dir, &self.device)?;
        let optimizer =
            checkpoint::load_optimizer::<B, M, O>(self.optimizer.clone(), dir, &self.device)?;
        self.model = model;
        self.optimizer = optimizer;
        Ok(meta.episode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rl_env::state::normalize as normalize_stats;
    use crate::test_utils::{small_config, TestBackend};
    use burn::backend::ndarray::NdArrayDevice;

    fn random_state<R: Rng>(rng: &mut R) -> NormalizedState {
        let stats = (0..6).map(|_| rng.random_range(0.0..100.0)).collect::<Vec<f32>>();
        normalize_stats(&stats, 10.0).unwrap()
    }

    fn temp_dir(name: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("colour_rl_{}_{}", name, std::process::id()))
    }

    #[test]
    fn test_scenario_state_gives_valid_scheme() {
        let device = NdArrayDevice::Cpu;
        let agent = adam_agent(
            small_config().init::<TestBackend>(&device),
            PPOTrainingConfig::new(),
            device,
        );
        let state = normalize_stats(&[80.0, 70.0, 40.0, 60.0, 50.0, 30.0], 10.0).unwrap();
        let mut rng = StdRng::seed_from_u64(0);
        let sample = agent.select_action(&state, &mut rng).unwrap();
        for colour in sample.colours.colours() {
            assert!(colour.iter().all(|c| (0.0..=1.0).contains(c)));
        }
        assert!(sample.log_prob.is_finite());
        assert!(sample.value.is_finite());
        assert!(agent.buffer().is_empty());
    }

    #[test]
    fn test_actions_clamped_with_wide_std() {
        let device = NdArrayDevice::Cpu;
        let agent = adam_agent(
            small_config()
                .with_init_log_std(5.0)
                .init::<TestBackend>(&device),
            PPOTrainingConfig::new(),
            device,
        );
        let mut rng = StdRng::seed_from_u64(3);
        let mut saw_clamp = false;
        for _ in 0..20 {
            let state = random_state(&mut rng);
            let sample = agent.select_action(&state, &mut rng).unwrap();
            let flat = sample.colours.flatten();
            assert!(flat.iter().all(|c| (0.0..=1.0).contains(c)));
            saw_clamp |= flat.iter().any(|c| *c == 0.0 || *c == 1.0);
        }
        assert!(saw_clamp);
    }

    #[test]
    fn test_select_action_deterministic_for_seed() {
        let device = NdArrayDevice::Cpu;
        let agent = adam_agent(
            small_config().init::<TestBackend>(&device),
            PPOTrainingConfig::new(),
            device,
        );
        let state = normalize_stats(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0], 10.0).unwrap();
        let a = agent
            .select_action(&state, &mut StdRng::seed_from_u64(21))
            .unwrap();
        let b = agent
            .select_action(&state, &mut StdRng::seed_from_u64(21))
            .unwrap();
        assert_eq!(a, b);
    }

    /// Stores `n` transitions, the last one terminal. Rewards are random
    /// unless `reward` fixes them.
    fn fill_rollout<B, M, O>(
        agent: &mut PpoAgent<B, M, O>,
        n: usize,
        seed: u64,
        reward: Option<f32>,
    ) where
        B: AutodiffBackend,
        M: ActorCriticModel<B>,
        O: Optimizer<M, B>,
    {
        let mut rng = StdRng::seed_from_u64(seed);
        for i in 0..n {
            let state = random_state(&mut rng);
            let sample = agent.select_action(&state, &mut rng).unwrap();
            let reward = reward.unwrap_or_else(|| rng.random_range(0.0..1.0));
            agent.store(
                state,
                &sample.colours,
                sample.log_prob,
                sample.value,
                reward,
                i + 1 == n,
            );
        }
    }

    #[test]
    fn test_update_consumes_buffer() {
        let device = NdArrayDevice::Cpu;
        let mut agent = adam_agent(
            small_config().init::<TestBackend>(&device),
            PPOTrainingConfig::new(),
            device,
        );
        fill_rollout(&mut agent, 64, 8, None);
        assert_eq!(agent.buffer().len(), 64);

        let gae = agent.finish_path(0.0);
        let info = agent.update(&gae.advantages, &gae.returns).unwrap();
        assert!(agent.buffer().is_empty());
        assert_eq!(info.num_updates, 2);
        assert!(info.policy_loss.is_finite());
        assert!(info.value_loss.is_finite());
        assert!(info.kl_to_prior >= 0.0);
    }

    #[test]
    fn test_update_runs_partial_minibatches() {
        let device = NdArrayDevice::Cpu;
        let mut agent = adam_agent(
            small_config().init::<TestBackend>(&device),
            PPOTrainingConfig::new()
                .with_mini_batch_size(20)
                .with_normalize_advantage(true),
            device,
        );
        fill_rollout(&mut agent, 64, 9, None);
        let gae = agent.finish_path(0.0);
        let info = agent.update(&gae.advantages, &gae.returns).unwrap();
        // 20 + 20 + 20 + 4 per epoch
        assert_eq!(info.num_updates, 8);
    }

    #[test]
    fn test_update_rejects_mismatched_lengths() {
        let device = NdArrayDevice::Cpu;
        let mut agent = adam_agent(
            small_config().init::<TestBackend>(&device),
            PPOTrainingConfig::new(),
            device,
        );
        fill_rollout(&mut agent, 5, 1, None);
        let err = agent.update(&[0.0; 4], &[0.0; 5]).unwrap_err();
        assert!(matches!(
            err,
            PpoError::InvalidShape {
                what: "advantages",
                expected: 5,
                actual: 4
            }
        ));
        assert_eq!(agent.buffer().len(), 5);
    }

    #[test]
    fn test_non_finite_returns_abort_update() {
        let device = NdArrayDevice::Cpu;
        let mut agent = adam_agent(
            small_config().init::<TestBackend>(&device),
            PPOTrainingConfig::new(),
            device,
        );
        fill_rollout(&mut agent, 4, 2, None);
        let gae = agent.finish_path(0.0);
        let returns = vec![f32::NAN; 4];
        let err = agent.update(&gae.advantages, &returns).unwrap_err();
        assert!(matches!(err, PpoError::OptimizationDivergence { .. }));
        assert!(agent.buffer().is_empty());
    }

    #[test]
    fn test_checkpoint_round_trip() {
        let device = NdArrayDevice::Cpu;
        let dir = temp_dir("round_trip");
        let mut agent = adam_agent(
            small_config().init::<TestBackend>(&device),
            PPOTrainingConfig::new(),
            device,
        );
        fill_rollout(&mut agent, 8, 4, None);
        let gae = agent.finish_path(0.0);
        agent.update(&gae.advantages, &gae.returns).unwrap();
        agent.save_checkpoint(&dir, 12).unwrap();

        let mut loaded = adam_agent(
            small_config().init::<TestBackend>(&device),
            PPOTrainingConfig::new(),
            device,
        );
        let episode = loaded.load_checkpoint(&dir).unwrap();
        assert_eq!(episode, 12);

        let state = normalize_stats(&[9.0, 1.0, 4.0, 4.0, 2.0, 7.0], 10.0).unwrap();
        let before = agent
            .select_action(&state, &mut StdRng::seed_from_u64(5))
            .unwrap();
        let after = loaded
            .select_action(&state, &mut StdRng::seed_from_u64(5))
            .unwrap();
        assert_eq!(before, after);

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_checkpoint_shape_mismatch() {
        let device = NdArrayDevice::Cpu;
        let dir = temp_dir("shape_mismatch");
        let agent = adam_agent(
            small_config().init::<TestBackend>(&device),
            PPOTrainingConfig::new(),
            device,
        );
        agent.save_checkpoint(&dir, 0).unwrap();

        let mut other = adam_agent(
            small_config()
                .with_d_model(8)
                .init::<TestBackend>(&device),
            PPOTrainingConfig::new(),
            device,
        );
        let state = normalize_stats(&[3.0, 3.0, 5.0, 1.0, 8.0, 2.0], 10.0).unwrap();
        let before = other
            .select_action(&state, &mut StdRng::seed_from_u64(6))
            .unwrap();

        let err = other.load_checkpoint(&dir).unwrap_err();
        assert!(matches!(err, PpoError::CheckpointLoad(_)));

        // the failed load leaves the agent as it was
        let after = other
            .select_action(&state, &mut StdRng::seed_from_u64(6))
            .unwrap();
        assert_eq!(before, after);
        fill_rollout(&mut other, 4, 3, None);
        let gae = other.finish_path(0.0);
        other.update(&gae.advantages, &gae.returns).unwrap();

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_update_with_uniform_rewards() {
        let device = NdArrayDevice::Cpu;
        let mut agent = adam_agent(
            small_config().init::<TestBackend>(&device),
            PPOTrainingConfig::new(),
            device,
        );
        fill_rollout(&mut agent, 64, 10, Some(1.0));
        let gae = agent.finish_path(0.0);
        assert!(gae.returns.iter().all(|r| r.is_finite()));

        let info = agent.update(&gae.advantages, &gae.returns).unwrap();
        assert!(agent.buffer().is_empty());
        assert_eq!(info.num_updates, 2);
        assert!(info.policy_loss.is_finite());
        assert!(info.value_loss.is_finite());
    }

    #[test]
    fn test_clear_buffer_drops_rollout() {
        let device = NdArrayDevice::Cpu;
        let mut agent = adam_agent(
            small_config().init::<TestBackend>(&device),
            PPOTrainingConfig::new(),
            device,
        );
        fill_rollout(&mut agent, 6, 11, None);
        agent.clear_buffer();
        assert!(agent.buffer().is_empty());
        let info = agent.update(&[], &[]).unwrap();
        assert_eq!(info.num_updates, 0);
    }

    #[test]
    fn test_overflowing_std_is_non_finite_output() {
        let device = NdArrayDevice::Cpu;
        let agent = adam_agent(
            small_config()
                .with_init_log_std(100.0)
                .init::<TestBackend>(&device),
            PPOTrainingConfig::new(),
            device,
        );
        let state = normalize_stats(&[5.0, 4.0, 3.0, 2.0, 1.0, 6.0], 10.0).unwrap();
        let err = agent
            .select_action(&state, &mut StdRng::seed_from_u64(0))
            .unwrap_err();
        assert!(matches!(err, PpoError::NonFiniteOutput(_)));
    }
}
