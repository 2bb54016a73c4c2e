use std::fmt;

use crate::error::{Error, Result};

// DType: element types of a parameter buffer
//
// Parameters are computed in f32 or f64. The half-precision tags exist only
// so that buffers written by a half-precision producer can still be read:
// loading converts them into the parameter's own element type.
//
//   F16  16-bit IEEE half float (read only)
//   BF16 16-bit brain float (read only)
//   F32  32-bit float, the default
//   F64  64-bit float

/// Enum of all element types a persisted buffer may carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DType {
    F16,
    BF16,
    F32,
    F64,
}

impl DType {
    /// Size of one element in bytes.
    pub fn size_in_bytes(&self) -> usize {
        match self {
            DType::F16 | DType::BF16 => 2,
            DType::F32 => 4,
            DType::F64 => 8,
        }
    }

    /// Tag written into binary streams.
    pub fn to_tag(self) -> u8 {
        match self {
            DType::F32 => 0,
            DType::F64 => 1,
            DType::F16 => 5,
            DType::BF16 => 6,
        }
    }

    /// Inverse of [`DType::to_tag`].
    pub fn from_tag(tag: u8) -> Result<DType> {
        match tag {
            0 => Ok(DType::F32),
            1 => Ok(DType::F64),
            5 => Ok(DType::F16),
            6 => Ok(DType::BF16),
            _ => Err(Error::format(format!("unknown dtype tag: {tag}"))),
        }
    }

    /// Decode one little-endian element of this type to f64.
    /// `bytes` must hold exactly `size_in_bytes()` bytes.
    pub fn decode_le(self, bytes: &[u8]) -> f64 {
        match self {
            DType::F16 => half::f16::from_le_bytes([bytes[0], bytes[1]]).to_f64(),
            DType::BF16 => half::bf16::from_le_bytes([bytes[0], bytes[1]]).to_f64(),
            DType::F32 => f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as f64,
            DType::F64 => f64::from_le_bytes([
                bytes[0], bytes[1], bytes[2], bytes[3], bytes[4], bytes[5], bytes[6], bytes[7],
            ]),
        }
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DType::F16 => "f16",
            DType::BF16 => "bf16",
            DType::F32 => "f32",
            DType::F64 => "f64",
        };
        write!(f, "{}", s)
    }
}

// Element: Rust types a parameter buffer can hold
//
// Implemented for f32 and f64. Everything numeric in the crate is generic over
// this trait, the same way the buffer code is generic over the element type.

/// Trait implemented by the floating-point types a parameter can be made of.
pub trait Element:
    num_traits::Float + Default + Send + Sync + 'static + fmt::Debug + fmt::Display
{
    /// The corresponding DType enum variant.
    const DTYPE: DType;

    /// Convert this value to f64.
    fn as_f64(self) -> f64;

    /// Create a value of this type from f64.
    fn from_f64(v: f64) -> Self;

    /// Append the little-endian encoding of this value.
    fn write_le(self, out: &mut Vec<u8>);
}

impl Element for f32 {
    const DTYPE: DType = DType::F32;
    fn as_f64(self) -> f64 {
        self as f64
    }
    fn from_f64(v: f64) -> Self {
        v as f32
    }
    fn write_le(self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.to_le_bytes());
    }
}

impl Element for f64 {
    const DTYPE: DType = DType::F64;
    fn as_f64(self) -> f64 {
        self
    }
    fn from_f64(v: f64) -> Self {
        v
    }
    fn write_le(self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.to_le_bytes());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_roundtrip() {
        for dt in [DType::F16, DType::BF16, DType::F32, DType::F64] {
            assert_eq!(DType::from_tag(dt.to_tag()).unwrap(), dt);
        }
        assert!(DType::from_tag(42).is_err());
    }

    #[test]
    fn test_decode_half() {
        let bytes = half::f16::from_f64(1.5).to_le_bytes();
        assert_eq!(DType::F16.decode_le(&bytes), 1.5);
    }

    #[test]
    fn test_element_f32_precision() {
        assert_eq!(f32::DTYPE, DType::F32);
        assert_eq!(<f32 as Element>::from_f64(3.14).as_f64(), 3.140000104904175);
    }

    #[test]
    fn test_write_le() {
        let mut out = Vec::new();
        Element::write_le(2.0f64, &mut out);
        assert_eq!(out.len(), DType::F64.size_in_bytes());
        assert_eq!(DType::F64.decode_le(&out), 2.0);
    }
}
