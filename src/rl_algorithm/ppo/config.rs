use burn::config::Config;
use burn::grad_clipping::GradientClippingConfig;

#[derive(Config)]
pub struct PPOTrainingConfig {
    #[config(default = 0.99)]
    pub gae_gamma: f32,
    #[config(default = 0.95)]
    pub gae_lambda: f32,
    #[config(default = 0.2)]
    pub epsilon_clip: f32,
    #[config(default = 3e-7)]
    pub learning_rate: f64,
    /// Passes over the buffer per update.
    #[config(default = 2)]
    pub update_epochs: usize,
    #[config(default = 64)]
    pub mini_batch_size: usize,
    #[config(default = 0.5)]
    pub value_coef: f32,
    /// Weight of the KL term pulling the policy toward the prior.
    #[config(default = 0.2)]
    pub kl_coef: f32,
    #[config(default = 0.0)]
    pub entropy_coef: f32,
    #[config(default = 0.5)]
    pub prior_mean: f32,
    #[config(default = 0.1)]
    pub prior_std: f32,
    #[config(default = false)]
    pub normalize_advantage: bool,
    #[config(default = "None")]
    pub grad_clip: Option<GradientClippingConfig>,
    #[config(default = 42)]
    pub seed: u64,
}
