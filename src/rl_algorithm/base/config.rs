use burn::config::Config;

use crate::rl_algorithm::ppo::config::PPOTrainingConfig;
use crate::rl_algorithm::preload_net::EncoderDecoderConfig;
use crate::rl_env::config::EnvConfig;

#[derive(Config)]
pub struct TrainConfig {
    pub ppo_train_config: PPOTrainingConfig,
    pub env_config: EnvConfig,
    pub network: EncoderDecoderConfig,
    /// Number of episodes to run.
    #[config(default = 4000)]
    pub train_iter: usize,
    #[config(default = "String::from(\"./ckpt\")")]
    pub ckpt_save_path: String,
    #[config(default = "None")]
    pub resume_from_ckpt_path: Option<String>,
    /// Episodes between checkpoints; 0 disables them.
    #[config(default = 50)]
    pub save_model_freq: usize,
    /// TensorBoard log root; scalars only go to the log when unset.
    #[config(default = "None")]
    pub logdir: Option<String>,
}

impl TrainConfig {
    /// Every nested config at its defaults.
    pub fn with_defaults() -> Self {
        Self::new(
            PPOTrainingConfig::new(),
            EnvConfig::new(),
            EncoderDecoderConfig::new(),
        )
    }
}
