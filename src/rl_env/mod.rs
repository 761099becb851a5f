pub mod config;
pub mod env;
pub mod state;

pub use config::EnvConfig;
pub use env::{ColourEnv, StepInfo};
pub use state::{normalize, ColourScheme, DiscretizedState, NormalizedState, StatVector};
