//! # tensorleaf
//!
//! Learnable tensor parameters for computation graphs.
//!
//! A [`LearnableParameter`] is a graph leaf holding weights or biases. Its
//! shape may contain unknown (0) dimensions at construction; the requested
//! initialization waits until inference from data or from an adjacent
//! operand completes the shape, then runs exactly once.
//!
//! ## Usage
//!
//! ```rust
//! use tensorleaf::prelude::*;
//!
//! let mut seeds = SeedAllocator::new();
//! let cfg = ParameterConfig::default()
//!     .name("W")
//!     .shape((0, 784))
//!     .init(InitDirectives::default().init("gaussian"));
//! let mut w = LearnableParameter::<f32>::from_config(&cfg, &mut seeds)?;
//! assert!(w.is_pending());
//!
//! w.infer_input_dims_from(&TensorShape::from((256, 784)))?;
//! assert!(!w.is_pending());
//! # Ok::<(), tensorleaf::Error>(())
//! ```
//!
//! ## Modules
//!
//! - [`init`]: initialization strategies and seed allocation
//! - [`infer`]: shape inference from data and from peers
//! - [`param`]: the parameter node and its binary layout
//! - [`node`]: the graph-facing node interface
//! - [`config`]: parameter configuration
//! - [`model_file`]: single-parameter model files

pub mod config;
pub mod infer;
pub mod init;
pub mod model_file;
pub mod node;
pub mod param;

pub use config::ParameterConfig;
pub use infer::PeerInference;
pub use init::{InitDirectives, InitRequest, InitToken, PendingInit, RandomKind, SeedAllocator};
pub use node::{ComputationNode, CopyNodeFlags, Freezable, CURRENT_MODEL_VERSION};
pub use param::{InitState, LearnableParameter};

pub use tensorleaf_core::{
    ConfigRecord, ConfigValue, DType, DeviceId, Element, Error, ErrorKind, Matrix, Record, Result,
    TensorShape,
};

/// Everything needed to declare, infer and persist parameters.
pub mod prelude {
    pub use crate::config::ParameterConfig;
    pub use crate::init::{InitDirectives, PendingInit, SeedAllocator};
    pub use crate::node::{ComputationNode, CopyNodeFlags, Freezable};
    pub use crate::param::{InitState, LearnableParameter};
    pub use tensorleaf_core::{DeviceId, Error, Record, Result, TensorShape};
}
