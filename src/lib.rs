pub mod config;
pub mod contract;
pub mod error;
pub mod expected;
pub mod loss;
pub mod minimize;
pub mod model;
pub mod normal;
pub mod payoff;
pub mod population;
pub mod quadrature;
pub mod sampler;
pub mod types;

pub use config::{ModelConfig, NumericsConfig, TypeDistribution};
pub use error::ModelError;
pub use model::Model;
pub use types::{ConsumerType, Contract};
