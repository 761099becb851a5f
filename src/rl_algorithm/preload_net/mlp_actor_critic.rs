use crate::burn_utils::{build_mlp_by_dims, Sequence};
use crate::rl_algorithm::base::model::{ActorCriticModel, PolicyOutput};
use burn::module::{AutodiffModule, Param};
use burn::prelude::*;
use burn::tensor::activation::sigmoid;
use burn::tensor::backend::AutodiffBackend;

/// Feed-forward actor-critic. Grid indices are mapped back onto `[0, 1]`
/// before entering the separate actor and critic networks.
#[derive(Module, Debug)]
pub struct MlpActorCritic<B: Backend> {
    critic: Sequence<B>,
    mean_net: Sequence<B>,
    log_std: Param<Tensor<B, 1>>,
    grid_size: usize,
    action_dim: usize,
}

impl<B: Backend> MlpActorCritic<B> {
    pub fn forward(&self, states: Tensor<B, 2, Int>) -> PolicyOutput<B> {
        let input = states.float().div_scalar(self.grid_size as f32);
        let mean = sigmoid(self.mean_net.forward(input.clone()));
        let value = self.critic.forward(input);
        PolicyOutput::new(mean, self.log_std.val().exp(), value)
    }
}

impl<B: AutodiffBackend> ActorCriticModel<B> for MlpActorCritic<B> {
    fn autodiff_forward(&self, states: Tensor<B, 2, Int>) -> PolicyOutput<B> {
        self.forward(states)
    }

    fn eval_forward(
        &self,
        states: Tensor<B::InnerBackend, 2, Int>,
    ) -> PolicyOutput<B::InnerBackend> {
        self.valid().forward(states)
    }

    fn grid_size(&self) -> usize {
        self.grid_size
    }

    fn action_dim(&self) -> usize {
        self.action_dim
    }

    fn std_mean(&self) -> Tensor<B, 1> {
        self.log_std.val().exp().mean()
    }
}

#[derive(Config, Debug)]
pub struct MlpActorCriticConfig {
    #[config(default = 1000)]
    pub grid_size: usize,
    #[config(default = 6)]
    pub obs_dim: usize,
    #[config(default = 9)]
    pub action_dim: usize,
    #[config(default = "vec![64, 64]")]
    pub actor_layer_dims: Vec<usize>,
    #[config(default = "vec![64, 64]")]
    pub critic_layer_dims: Vec<usize>,
    #[config(default = 0.0)]
    pub init_log_std: f32,
}

impl MlpActorCriticConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> MlpActorCritic<B> {
        let critic = build_mlp_by_dims(self.obs_dim, 1, &self.critic_layer_dims, device);
        let mean_net = build_mlp_by_dims(
            self.obs_dim,
            self.action_dim,
            &self.actor_layer_dims,
            device,
        );
        MlpActorCritic {
            critic,
            mean_net,
            log_std: Param::from_tensor(
                Tensor::zeros([self.action_dim], device).add_scalar(self.init_log_std),
            ),
            grid_size: self.grid_size,
            action_dim: self.action_dim,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rl_env::state::{discretize_batch, normalize};
    use burn::backend::ndarray::{NdArray, NdArrayDevice};
    use burn::backend::Autodiff;

    #[test]
    fn test_forward_shapes() {
        let device = NdArrayDevice::Cpu;
        let model = MlpActorCriticConfig::new()
            .with_actor_layer_dims(vec![8])
            .with_critic_layer_dims(vec![8])
            .init::<Autodiff<NdArray>>(&device);
        let state = normalize(&[5.0, 4.0, 3.0, 2.0, 1.0, 0.0], 3.0).unwrap();
        let input = discretize_batch(&[state, state], model.grid_size(), &device);
        let (dist, value) = model.get_dist(input);
        assert_eq!(dist.mean().dims(), [2, 9]);
        assert_eq!(dist.stddev().dims(), [2, 9]);
        assert_eq!(value.dims(), [2, 1]);
    }
}
