use burn::backend::ndarray::NdArray;
use burn::backend::Autodiff;

use crate::rl_algorithm::preload_net::EncoderDecoderConfig;

pub(crate) type TestBackend = Autodiff<NdArray>;

/// A transformer small enough for unit tests.
pub(crate) fn small_config() -> EncoderDecoderConfig {
    EncoderDecoderConfig::new()
        .with_input_size(100)
        .with_d_model(16)
        .with_n_heads(2)
        .with_n_layers(1)
        .with_d_ff(32)
}
