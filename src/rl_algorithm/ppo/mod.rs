pub mod config;
pub mod ppo_agent;

pub use config::PPOTrainingConfig;
pub use ppo_agent::{adam_agent, ActionSample, PpoAgent};
