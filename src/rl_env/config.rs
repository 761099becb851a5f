use burn::config::Config;

#[derive(Config, Debug)]
pub struct EnvConfig {
    /// Power applied to every stat before sum-normalization.
    #[config(default = 10.0)]
    pub stat_exponent: f64,
    /// Steps after which an episode is cut off and bootstrapped from the critic.
    #[config(default = 64)]
    pub max_traj_length: usize,
}
