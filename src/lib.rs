//! On-policy PPO that maps player statistics to a three-colour scheme.
//!
//! Stats are sharpened onto the simplex ([`rl_env::state`]), quantized into
//! embedding indices and fed to a transformer actor-critic
//! ([`rl_algorithm::preload_net`]). [`rl_algorithm::ppo::PpoAgent`] samples
//! schemes, buffers transitions and runs clipped-surrogate updates with a KL
//! pull toward a mid-grey prior.

pub mod burn_utils;
pub mod error;
pub mod rl_algorithm;
pub mod rl_env;

#[cfg(test)]
pub(crate) mod test_utils;

pub use error::{PpoError, Result};
