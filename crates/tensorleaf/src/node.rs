// ComputationNode: the interface a graph sees on every node
//
// The graph owns nodes as `Box<dyn ComputationNode>` and drives them through
// validation, shape inference and evaluation. Leaf nodes such as
// `LearnableParameter` implement it with most operations being no-ops or
// consistency checks.
//
// Copying goes through `clone_node`, which each concrete node implements by
// cloning itself, so the graph never needs to know (or test for) the concrete
// type of the node it duplicates.

use std::fmt;
use std::io::{Read, Write};

use tensorleaf_core::{BinaryReader, BinaryWriter, DeviceId, Result, TensorShape};

use crate::infer::PeerInference;

/// Newest model layout this crate writes.
pub const CURRENT_MODEL_VERSION: u32 = 3;

/// First model version that stores tensor shapes (and the gradient
/// multiplier) directly. Older versions use the legacy layouts.
pub const TENSOR_SHAPE_MODEL_VERSION: u32 = 3;

/// Which parts of a node `clone_node` copies besides its structure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CopyNodeFlags {
    /// Copy the value buffer and any pending initialization.
    pub copy_value: bool,
}

impl CopyNodeFlags {
    pub const STRUCTURE_ONLY: Self = CopyNodeFlags { copy_value: false };
    pub const WITH_VALUE: Self = CopyNodeFlags { copy_value: true };
}

/// The graph-facing interface of a node.
pub trait ComputationNode: fmt::Debug {
    fn node_name(&self) -> &str;

    fn operation_name(&self) -> &'static str;

    fn device(&self) -> DeviceId;

    /// The node's (possibly partially known) tensor shape.
    fn sample_layout(&self) -> &TensorShape;

    /// "name: Operation" for log and error messages.
    fn node_description(&self) -> String {
        format!("{}: {}", self.node_name(), self.operation_name())
    }

    fn validate(&mut self, is_final_validation_pass: bool) -> Result<()>;

    /// Offer the known shape of an adjacent operand.
    fn infer_input_dims_from(&mut self, other: &TensorShape) -> Result<PeerInference>;

    /// Called before the first evaluation of a minibatch.
    fn update_function_mb_size(&mut self) -> Result<()>;

    fn forward_prop(&mut self) -> Result<()>;

    fn backprop_to(&mut self, input_index: usize) -> Result<()>;

    /// Duplicate this node under a new name, as the same concrete type.
    fn clone_node(&self, new_name: &str, flags: CopyNodeFlags) -> Box<dyn ComputationNode>;
}

/// Nodes whose training updates can be switched off.
pub trait Freezable {
    fn freeze_parameters(&mut self);
}

/// Fields every node carries, persisted ahead of node-specific data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeBase {
    pub name: String,
    pub device: DeviceId,
}

impl NodeBase {
    pub fn new(name: impl Into<String>, device: DeviceId) -> Self {
        NodeBase {
            name: name.into(),
            device,
        }
    }

    pub fn save<W: Write>(&self, w: &mut BinaryWriter<W>) -> Result<()> {
        w.write_str(&self.name)
    }

    /// The device is not persisted; the loader decides placement.
    pub fn load<R: Read>(&mut self, r: &mut BinaryReader<R>, _model_version: u32) -> Result<()> {
        self.name = r.read_string()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_base_roundtrip_keeps_loader_device() {
        let base = NodeBase::new("W0", DeviceId::Gpu(0));
        let mut w = BinaryWriter::new(Vec::new());
        base.save(&mut w).unwrap();

        let mut loaded = NodeBase::new("", DeviceId::Cpu);
        let mut r = BinaryReader::new(Cursor::new(w.into_inner()));
        loaded.load(&mut r, CURRENT_MODEL_VERSION).unwrap();
        assert_eq!(loaded.name, "W0");
        assert_eq!(loaded.device, DeviceId::Cpu);
    }
}
