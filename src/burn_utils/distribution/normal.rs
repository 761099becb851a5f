use burn::tensor::{backend::Backend, Tensor, TensorData};
use rand::Rng;
use rand_distr::StandardNormal;

/// Diagonal Gaussian over a batch of action vectors.
///
/// `loc` is `(batch, action_dim)`; `scale` is one standard deviation per
/// action dimension, shared by every row of the batch.
#[derive(Debug, Clone)]
pub struct Normal<B: Backend> {
    loc: Tensor<B, 2>,
    scale: Tensor<B, 1>,
}

impl<B: Backend> Normal<B> {
    pub fn new(loc: Tensor<B, 2>, scale: Tensor<B, 1>) -> Self {
        Self { loc, scale }
    }

    pub fn mean(&self) -> Tensor<B, 2> {
        self.loc.clone()
    }

    pub fn stddev(&self) -> Tensor<B, 2> {
        self.scale.clone().unsqueeze::<2>().expand(self.loc.shape())
    }

    /// Draws one sample per row using noise from `rng`, so a seeded generator
    /// reproduces the same actions.
    pub fn sample_with<R: Rng>(&self, rng: &mut R) -> Tensor<B, 2> {
        let [batch_size, action_dim] = self.loc.dims();
        let noise = (0..batch_size * action_dim)
            .map(|_| rng.sample::<f32, _>(StandardNormal))
            .collect::<Vec<f32>>();
        let standard_normal_rand = Tensor::<B, 2>::from_data(
            TensorData::new(noise, [batch_size, action_dim]),
            &self.loc.device(),
        );
        self.loc.clone() + standard_normal_rand * self.stddev()
    }

    pub fn log_prob(&self, value: Tensor<B, 2>) -> Tensor<B, 2> {
        let pi = std::f32::consts::PI;
        let scale = self.stddev();
        -((value - self.loc.clone()).powf_scalar(2.0) / scale.clone().powf_scalar(2.0).mul_scalar(2.0))
            - scale.log()
            - (2f32 * pi).sqrt().ln()
    }

    /// Log-density of each row, summed over the action dimensions.
    pub fn independent_log_prob(&self, value: Tensor<B, 2>) -> Tensor<B, 1> {
        self.log_prob(value).sum_dim(1).flatten::<1>(0, 1)
    }

    pub fn entropy(&self) -> Tensor<B, 2> {
        let pi = std::f32::consts::PI;
        self.stddev().log().add_scalar(0.5 + 0.5 * (2f32 * pi).ln())
    }

    /// Element-wise `KL(self || other)`, shape `(batch, action_dim)`.
    pub fn kl_divergence(&self, other: &Normal<B>) -> Tensor<B, 2> {
        let self_scale = self.stddev();
        let other_scale = other.stddev();
        let var_ratio = (self_scale.clone() / other_scale.clone()).powf_scalar(2.0);
        let mean_term = ((self.loc.clone() - other.loc.clone()) / other_scale).powf_scalar(2.0);
        (var_ratio.clone() + mean_term - var_ratio.log()).sub_scalar(1.0).mul_scalar(0.5)
    }
}
