//! # tensorleaf-core
//!
//! Primitives shared by tensorleaf graph nodes.
//!
//! This crate provides:
//! - [`TensorShape`]: dimension sizes where 0 means "to be inferred"
//! - [`Matrix`]: column-major 2-D buffer with seeded random fills
//! - [`DType`] / [`Element`]: element types (f32, f64)
//! - [`DeviceId`]: buffer location
//! - [`BinaryWriter`] / [`BinaryReader`]: the binary model layout
//! - [`text`]: text matrix files and literal arrays
//! - [`ConfigRecord`] / [`Record`]: typed configuration lookups
//! - [`Error`] / [`Result`]: the error taxonomy

pub mod config;
pub mod device;
pub mod dtype;
pub mod error;
pub mod matrix;
pub mod shape;
pub mod stream;
pub mod text;

pub use config::{ConfigRecord, ConfigValue, FromConfigValue, Record};
pub use device::DeviceId;
pub use dtype::{DType, Element};
pub use error::{Error, ErrorKind, Result};
pub use matrix::Matrix;
pub use shape::TensorShape;
pub use stream::{BinaryReader, BinaryWriter};
pub use text::ParsedMatrix;
