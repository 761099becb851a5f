pub mod encoder_decoder;
pub mod mlp_actor_critic;

pub use encoder_decoder::{EncoderDecoder, EncoderDecoderConfig};
pub use mlp_actor_critic::{MlpActorCritic, MlpActorCriticConfig};
