use super::state::{ColourScheme, StatVector};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepInfo {
    pub next_state: StatVector,
    pub reward: f32,
    pub terminated: bool,
    pub truncated: bool,
}

/// Source of player statistics and rewards for colour schemes during training.
pub trait ColourEnv {
    fn reset(&mut self) -> StatVector;
    fn step(&mut self, colours: &ColourScheme) -> StepInfo;
}
