// Model files: one parameter per file, with a small header
//
//   Header:
//     magic:   [u8; 4]  = b"TLPM"
//     version: u32 LE   = model version of the node record
//     dtype:   u8       element type the values were written in
//
//   Node record: see LearnableParameter::save / load
//
// Files written by this crate always carry CURRENT_MODEL_VERSION. Older
// versions are read with their legacy node layouts; newer ones are rejected.
//
// Usage:
//   model_file::save("W1.tlpm", &param)?;
//   let param: LearnableParameter<f32> = model_file::load("W1.tlpm", DeviceId::Cpu)?;

use std::fs::File;
use std::io::{BufReader, BufWriter, Cursor, Read, Write};
use std::path::Path;

use tensorleaf_core::{BinaryReader, BinaryWriter, DType, DeviceId, Element, Error, Result};

use crate::node::CURRENT_MODEL_VERSION;
use crate::param::LearnableParameter;

const MAGIC: &[u8; 4] = b"TLPM";

/// Write header and node record to `w`.
pub fn write_model<E: Element, W: Write>(w: W, param: &LearnableParameter<E>) -> Result<W> {
    let mut writer = BinaryWriter::new(w);
    writer.write_bytes(MAGIC)?;
    writer.write_u32(CURRENT_MODEL_VERSION)?;
    writer.write_u8(E::DTYPE.to_tag())?;
    param.save(&mut writer)?;
    writer.flush()?;
    Ok(writer.into_inner())
}

/// Read a model written by [`write_model`] (or an older producer).
pub fn read_model<E: Element, R: Read>(r: R, device: DeviceId) -> Result<LearnableParameter<E>> {
    let mut reader = BinaryReader::new(r);
    let magic = reader.read_bytes(MAGIC.len())?;
    if magic != MAGIC {
        return Err(Error::format(format!(
            "not a tensorleaf model file (magic {magic:02x?})"
        )));
    }
    let version = reader.read_u32()?;
    if version > CURRENT_MODEL_VERSION {
        return Err(Error::format(format!(
            "model version {version} is newer than supported version {CURRENT_MODEL_VERSION}"
        )));
    }
    let stored = DType::from_tag(reader.read_u8()?)?;
    if stored != E::DTYPE {
        log::debug!("converting {} model values to {}", stored, E::DTYPE);
    }
    LearnableParameter::read_from(&mut reader, version, device)
}

/// Save a parameter to a model file.
pub fn save<E: Element>(path: impl AsRef<Path>, param: &LearnableParameter<E>) -> Result<()> {
    let file = File::create(path.as_ref())?;
    write_model(BufWriter::new(file), param)?;
    Ok(())
}

/// Load a parameter from a model file, placing its values on `device`.
pub fn load<E: Element>(path: impl AsRef<Path>, device: DeviceId) -> Result<LearnableParameter<E>> {
    let file = File::open(path.as_ref())?;
    read_model(BufReader::new(file), device)
}

/// Serialize a parameter to an in-memory model.
pub fn to_bytes<E: Element>(param: &LearnableParameter<E>) -> Result<Vec<u8>> {
    write_model(Vec::new(), param)
}

/// Deserialize a parameter from an in-memory model.
pub fn from_bytes<E: Element>(data: &[u8], device: DeviceId) -> Result<LearnableParameter<E>> {
    read_model(Cursor::new(data), device)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::init::PendingInit;

    #[test]
    fn test_bytes_roundtrip_converts_element_type() {
        let p = LearnableParameter::<f64>::with_init(
            "W",
            DeviceId::Cpu,
            (2, 3),
            PendingInit::FromValue(0.5),
        )
        .unwrap();
        let bytes = to_bytes(&p).unwrap();
        assert_eq!(&bytes[..4], MAGIC);

        let q: LearnableParameter<f32> = from_bytes(&bytes, DeviceId::Cpu).unwrap();
        assert_eq!(q.shape(), p.shape());
        assert_eq!(q.value().as_slice(), &[0.5f32; 6]);
    }

    #[test]
    fn test_bad_magic() {
        let err = from_bytes::<f32>(b"NOPE\x03\x00\x00\x00\x00", DeviceId::Cpu).unwrap_err();
        assert!(matches!(err, Error::Format(_)));
    }

    #[test]
    fn test_newer_version_rejected() {
        let mut bytes = MAGIC.to_vec();
        bytes.extend_from_slice(&(CURRENT_MODEL_VERSION + 1).to_le_bytes());
        bytes.push(0);
        let err = from_bytes::<f32>(&bytes, DeviceId::Cpu).unwrap_err();
        assert!(err.to_string().contains("newer than supported"));
    }
}
