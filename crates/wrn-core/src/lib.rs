pub mod tensor;
pub mod shape;
pub mod dtype;
pub mod error;
pub mod layout;

pub use tensor::Tensor;
pub use shape::Shape;
pub use dtype::Float;
pub use error::{TensorError, TensorResult};
pub use layout::DataFormat;
