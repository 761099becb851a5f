use crate::rl_algorithm::base::model::{ActorCriticModel, PolicyOutput};
use burn::module::{AutodiffModule, Param};
use burn::nn::transformer::{
    TransformerDecoder, TransformerDecoderConfig, TransformerDecoderInput, TransformerEncoder,
    TransformerEncoderConfig, TransformerEncoderInput,
};
use burn::nn::{Embedding, EmbeddingConfig, Linear, LinearConfig};
use burn::prelude::*;
use burn::tensor::activation::sigmoid;
use burn::tensor::backend::AutodiffBackend;

/// Transformer actor-critic over the six quantized stats.
///
/// The encoder contextualizes the embedded stats; the decoder attends from the
/// encoder output to itself. The action mean is read from the first decoder
/// position only, and the value from the mean-pooled encoder output.
#[derive(Module, Debug)]
pub struct EncoderDecoder<B: Backend> {
    character_embedding: Embedding<B>,
    positional_embedding: Embedding<B>,
    encoder: TransformerEncoder<B>,
    decoder: TransformerDecoder<B>,
    output_layer: Linear<B>,
    value_head: Linear<B>,
    log_std: Param<Tensor<B, 1>>,
    input_size: usize,
    action_dim: usize,
}

impl<B: Backend> EncoderDecoder<B> {
    pub fn forward(&self, states: Tensor<B, 2, Int>) -> PolicyOutput<B> {
        let [batch_size, n_inputs] = states.dims();
        let device = states.device();

        let positions = Tensor::<B, 1, Int>::arange(0..n_inputs as i64, &device)
            .reshape([1, n_inputs])
            .repeat_dim(0, batch_size);
        let embedded = self.character_embedding.forward(states)
            + self.positional_embedding.forward(positions);

        let encoded = self
            .encoder
            .forward(TransformerEncoderInput::new(embedded));
        let decoded = self
            .decoder
            .forward(TransformerDecoderInput::new(encoded.clone(), encoded.clone()));

        let output = self.output_layer.forward(decoded);
        let first_slot = output
            .slice([0..batch_size, 0..1, 0..self.action_dim])
            .reshape([batch_size, self.action_dim]);
        let mean = sigmoid(first_slot);

        let [_, _, d_model] = encoded.dims();
        let pooled = encoded.mean_dim(1).reshape([batch_size, d_model]);
        let value = self.value_head.forward(pooled);

        PolicyOutput::new(mean, self.log_std.val().exp(), value)
    }
}

impl<B: AutodiffBackend> ActorCriticModel<B> for EncoderDecoder<B> {
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
        self.input_size
    }

    fn action_dim(&self) -> usize {
        self.action_dim
    }

    fn std_mean(&self) -> Tensor<B, 1> {
        self.log_std.val().exp().mean()
    }
}

#[derive(Config, Debug)]
pub struct EncoderDecoderConfig {
    /// Quantization grid size, also the number of character embeddings.
    #[config(default = 1000)]
    pub input_size: usize,
    #[config(default = 6)]
    pub n_inputs: usize,
    #[config(default = 128)]
    pub d_model: usize,
    #[config(default = 3)]
    pub n_colours: usize,
    #[config(default = 8)]
    pub n_heads: usize,
    #[config(default = 3)]
    pub n_layers: usize,
    #[config(default = 2048)]
    pub d_ff: usize,
    #[config(default = 0.1)]
    pub dropout: f64,
    #[config(default = 0.0)]
    pub init_log_std: f32,
}

impl EncoderDecoderConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> EncoderDecoder<B> {
        let action_dim = self.n_colours * 3;
        EncoderDecoder {
            character_embedding: EmbeddingConfig::new(self.input_size, self.d_model).init(device),
            positional_embedding: EmbeddingConfig::new(self.n_inputs, self.d_model).init(device),
            encoder: TransformerEncoderConfig::new(
                self.d_model,
                self.d_ff,
                self.n_heads,
                self.n_layers,
            )
            .with_dropout(self.dropout)
            .init(device),
            decoder: TransformerDecoderConfig::new(
                self.d_model,
                self.d_ff,
                self.n_heads,
                self.n_layers,
            )
            .with_dropout(self.dropout)
            .init(device),
            output_layer: LinearConfig::new(self.d_model, action_dim).init(device),
            value_head: LinearConfig::new(self.d_model, 1).init(device),
            log_std: Param::from_tensor(
                Tensor::zeros([action_dim], device).add_scalar(self.init_log_std),
            ),
            input_size: self.input_size,
            action_dim,
        }
    }
}
