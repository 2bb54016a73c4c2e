// Stream: sequential binary encoding of primitives, shapes and matrices
//
// All integers and floats are little-endian. The layouts:
//
//   bool / u8   1 byte
//   u32         4 bytes
//   u64 / i64   8 bytes
//   f32 / f64   4 / 8 bytes
//   string      u32 byte length + UTF-8 bytes
//   marker      a string whose value the reader checks ("BMAT", "EMAT", ...)
//
//   shape       u32 rank, then rank x u32 dims
//
//   legacy-tagged shape (read only):
//               u64 width, u64 height, u64 channels
//               -> [channels, width, height]
//               Read through the current encoding, the low half of width
//               lands in the rank word and its zero high half in the first
//               dimension. That zero is the tag; a persisted current shape
//               never has a leading 0 dimension. Legacy row and column
//               counts are u64 for the same reason: they were all
//               machine-word sized.
//
//   matrix      marker "BMAT"
//               u8   dtype tag
//               u64  rows
//               u64  cols
//               rows * cols values, column-major, in the tagged dtype
//               marker "EMAT"

use std::io::{Read, Write};

use crate::device::DeviceId;
use crate::dtype::{DType, Element};
use crate::error::{Error, Result};
use crate::matrix::Matrix;
use crate::shape::TensorShape;

const BEGIN_MATRIX: &str = "BMAT";
const END_MATRIX: &str = "EMAT";

/// Writes primitives to any `io::Write` in the tensorleaf binary layout.
pub struct BinaryWriter<W: Write> {
    inner: W,
}

impl<W: Write> BinaryWriter<W> {
    pub fn new(inner: W) -> Self {
        BinaryWriter { inner }
    }

    /// Unwrap the underlying writer.
    pub fn into_inner(self) -> W {
        self.inner
    }

    pub fn flush(&mut self) -> Result<()> {
        self.inner.flush()?;
        Ok(())
    }

    pub fn write_bytes(&mut self, data: &[u8]) -> Result<()> {
        self.inner.write_all(data)?;
        Ok(())
    }

    pub fn write_u8(&mut self, v: u8) -> Result<()> {
        self.write_bytes(&[v])
    }

    pub fn write_bool(&mut self, v: bool) -> Result<()> {
        self.write_u8(v as u8)
    }

    pub fn write_u32(&mut self, v: u32) -> Result<()> {
        self.write_bytes(&v.to_le_bytes())
    }

    pub fn write_u64(&mut self, v: u64) -> Result<()> {
        self.write_bytes(&v.to_le_bytes())
    }

    pub fn write_f32(&mut self, v: f32) -> Result<()> {
        self.write_bytes(&v.to_le_bytes())
    }

    pub fn write_str(&mut self, s: &str) -> Result<()> {
        let len = u32::try_from(s.len())
            .map_err(|_| Error::format(format!("string of {} bytes is too long", s.len())))?;
        self.write_u32(len)?;
        self.write_bytes(s.as_bytes())
    }

    pub fn write_marker(&mut self, marker: &str) -> Result<()> {
        self.write_str(marker)
    }

    /// Current shape encoding: u32 rank, then the dims.
    pub fn write_shape(&mut self, shape: &TensorShape) -> Result<()> {
        self.write_u32(to_u32(shape.rank(), "rank")?)?;
        for &d in shape.dims() {
            self.write_u32(to_u32(d, "dimension")?)?;
        }
        Ok(())
    }

    /// Legacy-tagged shape encoding for a [channels, width, height] layout.
    /// Only old producers emit this; it exists so loaders can be tested.
    pub fn write_legacy_shape(&mut self, width: u32, height: u64, channels: u64) -> Result<()> {
        self.write_u64(u64::from(width))?;
        self.write_u64(height)?;
        self.write_u64(channels)
    }

    /// Matrix record in the element type of the matrix.
    pub fn write_matrix<E: Element>(&mut self, m: &Matrix<E>) -> Result<()> {
        self.write_marker(BEGIN_MATRIX)?;
        self.write_u8(E::DTYPE.to_tag())?;
        self.write_u64(m.rows() as u64)?;
        self.write_u64(m.cols() as u64)?;
        let mut bytes = Vec::with_capacity(m.len() * E::DTYPE.size_in_bytes());
        for &v in m.as_slice() {
            v.write_le(&mut bytes);
        }
        self.write_bytes(&bytes)?;
        self.write_marker(END_MATRIX)
    }
}

/// Reads primitives written by [`BinaryWriter`].
pub struct BinaryReader<R: Read> {
    inner: R,
}

impl<R: Read> BinaryReader<R> {
    pub fn new(inner: R) -> Self {
        BinaryReader { inner }
    }

    pub fn into_inner(self) -> R {
        self.inner
    }

    /// Read exactly `len` bytes. The buffer grows with the data actually
    /// read, so a corrupt length fails at end of stream without allocating it.
    pub fn read_bytes(&mut self, len: usize) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        (&mut self.inner).take(len as u64).read_to_end(&mut buf)?;
        if buf.len() != len {
            return Err(Error::format(format!(
                "unexpected end of stream: wanted {len} bytes, got {}",
                buf.len()
            )));
        }
        Ok(buf)
    }

    fn read_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut buf = [0u8; N];
        self.inner.read_exact(&mut buf)?;
        Ok(buf)
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.read_array::<1>()?[0])
    }

    pub fn read_bool(&mut self) -> Result<bool> {
        match self.read_u8()? {
            0 => Ok(false),
            1 => Ok(true),
            v => Err(Error::format(format!("invalid bool byte {v}"))),
        }
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        Ok(u32::from_le_bytes(self.read_array()?))
    }

    pub fn read_u64(&mut self) -> Result<u64> {
        Ok(u64::from_le_bytes(self.read_array()?))
    }

    pub fn read_f32(&mut self) -> Result<f32> {
        Ok(f32::from_le_bytes(self.read_array()?))
    }

    pub fn read_string(&mut self) -> Result<String> {
        let len = self.read_u32()? as usize;
        let bytes = self.read_bytes(len)?;
        String::from_utf8(bytes).map_err(|e| Error::format(format!("invalid UTF-8 string: {e}")))
    }

    /// Read a marker and fail unless it equals `expected`.
    pub fn expect_marker(&mut self, expected: &str) -> Result<()> {
        let got = self.read_string()?;
        if got != expected {
            return Err(Error::format(format!(
                "expected marker '{expected}', found '{got}'"
            )));
        }
        Ok(())
    }

    /// Read a shape. With `accept_legacy`, a zero second word marks the
    /// legacy-tagged [channels, width, height] encoding: three u64 values
    /// W, H, C, where the zero is the high half of W.
    pub fn read_shape(&mut self, accept_legacy: bool) -> Result<TensorShape> {
        let rank = self.read_u32()?;
        if rank == 0 {
            return Ok(TensorShape::empty());
        }
        let dim0 = self.read_u32()?;
        if accept_legacy && dim0 == 0 {
            let width = rank as usize;
            let height = read_usize(self.read_u64()?, "legacy height")?;
            let channels = read_usize(self.read_u64()?, "legacy channel count")?;
            return Ok(TensorShape::new(vec![channels, width, height]));
        }
        let mut dims = Vec::with_capacity(rank as usize);
        dims.push(dim0 as usize);
        for _ in 1..rank {
            dims.push(self.read_u32()? as usize);
        }
        Ok(TensorShape::new(dims))
    }

    /// Read a matrix record, converting the payload to `E` and placing the
    /// result on `device`.
    pub fn read_matrix<E: Element>(&mut self, device: DeviceId) -> Result<Matrix<E>> {
        self.expect_marker(BEGIN_MATRIX)?;
        let dtype = DType::from_tag(self.read_u8()?)?;
        let rows = usize::try_from(self.read_u64()?)
            .map_err(|_| Error::format("matrix row count overflows usize"))?;
        let cols = usize::try_from(self.read_u64()?)
            .map_err(|_| Error::format("matrix column count overflows usize"))?;
        let count = rows
            .checked_mul(cols)
            .ok_or_else(|| Error::format(format!("matrix [{rows} x {cols}] is too large")))?;
        let size = dtype.size_in_bytes();
        let len = count
            .checked_mul(size)
            .ok_or_else(|| Error::format(format!("matrix [{rows} x {cols}] is too large")))?;
        let bytes = self.read_bytes(len)?;
        let data: Vec<E> = bytes
            .chunks_exact(size)
            .map(|c| E::from_f64(dtype.decode_le(c)))
            .collect();
        self.expect_marker(END_MATRIX)?;
        Matrix::from_col_major(rows, cols, data, device)
    }
}

fn read_usize(v: u64, what: &str) -> Result<usize> {
    usize::try_from(v).map_err(|_| Error::format(format!("{what} {v} overflows usize")))
}

fn to_u32(v: usize, what: &str) -> Result<u32> {
    u32::try_from(v).map_err(|_| Error::format(format!("{what} {v} does not fit in u32")))
}
