use std::path::{Path, PathBuf};
use std::time::Instant;

use burn::config::Config;
use burn::optim::Optimizer;
use burn::tensor::backend::AutodiffBackend;
use burn::tensor::cast::ToElement;
use chrono::Utc;
use log::{error, info};
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::error::Result;
use crate::rl_algorithm::ppo::PpoAgent;
use crate::rl_env::env::ColourEnv;

use super::{config::TrainConfig, model::ActorCriticModel, rl_utils::UpdateInfo, EpochLogger};

#[derive(Debug, Clone)]
pub struct EpisodeStats {
    pub total_reward: f32,
    pub steps: usize,
    pub truncated: bool,
    pub update_info: UpdateInfo,
}

struct Rollout {
    last_value: f32,
    truncated: bool,
    total_reward: f32,
    steps: usize,
}

/// Drives episodes against a [`ColourEnv`]: rollout, advantage estimation,
/// PPO update, metrics and periodic checkpoints.
pub struct OnPolicyRunner<E: ColourEnv> {
    env: E,
    config: TrainConfig,
    exp_name: String,
    exp_base_path: PathBuf,
    action_rng: StdRng,
}

impl<E: ColourEnv> OnPolicyRunner<E> {
    pub fn new(env: E, config: TrainConfig) -> Result<Self> {
        let exp_name = format!("ppo_{}", Utc::now().format("%m-%d_%H-%M-%S"));
        if let Some(logdir) = &config.logdir {
            EpochLogger::init_writer(&format!("{}/{}", logdir, exp_name));
        }
        let exp_base_path = Path::new(&config.ckpt_save_path).join(&exp_name);
        std::fs::create_dir_all(&exp_base_path)?;
        config.save(exp_base_path.join("config.json"))?;
        info!("experiment {} writing to {}", exp_name, exp_base_path.display());

        let action_rng = StdRng::seed_from_u64(config.ppo_train_config.seed.wrapping_add(1));
        Ok(Self {
            env,
            config,
            exp_name,
            exp_base_path,
            action_rng,
        })
    }

    pub fn exp_name(&self) -> &str {
        &self.exp_name
    }

    pub fn exp_base_path(&self) -> &Path {
        &self.exp_base_path
    }

    pub fn env(&self) -> &E {
        &self.env
    }

    /// Runs one episode and the update that follows it.
    ///
    /// Episodes longer than `max_traj_length` are cut and bootstrapped from
    /// the critic's estimate of the next state. If the rollout fails, the
    /// transitions it stored are dropped so the next episode starts clean.
    pub fn run_episode<B, M, O>(&mut self, agent: &mut PpoAgent<B, M, O>) -> Result<EpisodeStats>
    where
        B: AutodiffBackend,
        M: ActorCriticModel<B>,
        O: Optimizer<M, B>,
    {
        let rollout = match self.rollout(agent) {
            Ok(rollout) => rollout,
            Err(err) => {
                agent.clear_buffer();
                return Err(err);
            }
        };

        let gae = agent.finish_path(rollout.last_value);
        let update_info = agent.update(&gae.advantages, &gae.returns)?;
        Ok(EpisodeStats {
            total_reward: rollout.total_reward,
            steps: rollout.steps,
            truncated: rollout.truncated,
            update_info,
        })
    }

    fn rollout<B, M, O>(&mut self, agent: &mut PpoAgent<B, M, O>) -> Result<Rollout>
    where
        B: AutodiffBackend,
        M: ActorCriticModel<B>,
        O: Optimizer<M, B>,
    {
        let exponent = self.config.env_config.stat_exponent;
        let max_traj_length = self.config.env_config.max_traj_length.max(1);

        let mut stats = self.env.reset();
        let mut total_reward = 0.0;
        let mut steps = 0;
        let (last_value, truncated) = loop {
            let state = stats.normalize(exponent)?;
            let sample = agent.select_action(&state, &mut self.action_rng)?;
            let step = self.env.step(&sample.colours);
            steps += 1;
            total_reward += step.reward;
            agent.store(
                state,
                &sample.colours,
                sample.log_prob,
                sample.value,
                step.reward,
                step.terminated,
            );

            if step.terminated {
                break (0.0, false);
            }
            if step.truncated || steps >= max_traj_length {
                let next_state = step.next_state.normalize(exponent)?;
                break (agent.evaluate(&next_state)?, true);
            }
            stats = step.next_state;
        };
        Ok(Rollout {
            last_value,
            truncated,
            total_reward,
            steps,
        })
    }

    /// Trains for `train_iter` episodes, resuming first when a checkpoint
    /// path is configured. Any failure is logged and returned; the agent
    /// stays with the caller either way.
    pub fn train<B, M, O>(&mut self, agent: &mut PpoAgent<B, M, O>) -> Result<()>
    where
        B: AutodiffBackend,
        M: ActorCriticModel<B>,
        O: Optimizer<M, B> + Clone,
    {
        let mut start_episode = 0;
        if let Some(path) = self.config.resume_from_ckpt_path.clone() {
            let episode = agent.load_checkpoint(&path).inspect_err(|err| {
                error!("resume from {} failed: {}", path, err);
            })?;
            info!("resumed from {} at episode {}", path, episode);
            start_episode = episode + 1;
        }

        for episode in start_episode..self.config.train_iter {
            let start = Instant::now();
            let stats = self.run_episode(agent).inspect_err(|err| {
                error!("episode {} failed: {}", episode, err);
            })?;

            EpochLogger::add_scalar(("train", "episode_reward"), stats.total_reward);
            EpochLogger::add_scalar(("train", "episode_length"), stats.steps);
            EpochLogger::add_scalar(("train", "policy_loss"), stats.update_info.policy_loss);
            EpochLogger::add_scalar(("train", "value_loss"), stats.update_info.value_loss);
            EpochLogger::add_scalar(("train", "kl_to_prior"), stats.update_info.kl_to_prior);
            EpochLogger::add_scalar(("train", "entropy"), stats.update_info.entropy);
            EpochLogger::add_scalar(("train", "clip_fraction"), stats.update_info.clip_fraction);
            EpochLogger::add_scalar(("train", "mean_return"), stats.update_info.mean_return);
            EpochLogger::add_scalar(
                ("train", "actor_std"),
                agent.model().std_mean().into_scalar().to_f32(),
            );
            EpochLogger::add_scalar(("train", "episode_time_ms"), start.elapsed().as_millis());

            let freq = self.config.save_model_freq;
            if freq > 0 && (episode + 1) % freq == 0 {
                let path = self.exp_base_path.join(format!("episode_{}", episode));
                agent.save_checkpoint(&path, episode).inspect_err(|err| {
                    error!("checkpoint at episode {} failed: {}", episode, err);
                })?;
            }
            EpochLogger::log(episode);
        }
        Ok(())
    }
}
