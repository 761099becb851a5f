pub mod distribution;
pub mod rand;
pub mod sequence;
pub mod tensor;
pub use rand::*;
pub use sequence::*;
pub use tensor::*;
