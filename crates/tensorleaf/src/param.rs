// LearnableParameter: a graph leaf holding weights or biases
//
// A parameter is declared with a shape that may still contain unknown (0)
// dimensions, plus a request for its initial values. It then moves through a
// small state machine:
//
//   Idle ──────────────── plain construction, no initialization requested
//   Pending(PendingInit) ─ waiting for the shape to become fully known
//   Executing ──────────── transient, while the pending fill runs
//   Initialized ────────── values present; pending work is gone for good
//
// Every shape change goes through `init_shape`, which always attempts the
// pending initialization afterwards, so callers never have to remember to
// re-trigger it. Loads from text data and from persisted streams bring their
// own geometry and jump straight to Initialized.
//
// PERSISTED LAYOUT (current, model version >= 3):
//
//   node name (string)
//   gradient multiplier (f32)
//   shape (u32 rank, u32 dims)
//   matrix record (see BinaryWriter::write_matrix)
//
// Older versions store a needs-gradient bool and u64 rows / cols instead of
// the multiplier and shape; see `load`.

use std::io::{Read, Write};
use std::mem;
use std::path::Path;

use tensorleaf_core::text::{load_matrix_from_string_literal, load_matrix_from_text_file};
use tensorleaf_core::{
    logic_error, BinaryReader, BinaryWriter, ConfigRecord, DeviceId, Element, Error, Matrix,
    ParsedMatrix, Result, TensorShape,
};

use crate::config::ParameterConfig;
use crate::infer::{infer_from_data, infer_from_peer, PeerInference};
use crate::init::{InitRequest, InitToken, PendingInit, RandomKind, SeedAllocator};
use crate::node::{ComputationNode, CopyNodeFlags, Freezable, NodeBase, TENSOR_SHAPE_MODEL_VERSION};

const OPERATION_NAME: &str = "LearnableParameter";

/// Where a parameter is in its initialization lifecycle.
#[derive(Debug, Clone, PartialEq)]
pub enum InitState {
    Idle,
    Pending(PendingInit),
    Executing,
    Initialized,
}

/// A trainable leaf node: shape, value buffer and learning-rate multiplier.
#[derive(Debug, Clone)]
pub struct LearnableParameter<E: Element> {
    base: NodeBase,
    shape: TensorShape,
    value: Matrix<E>,
    state: InitState,
    gradient_multiplier: f32,
}

impl<E: Element> LearnableParameter<E> {
    /// A parameter with a zeroed buffer and no initialization request.
    pub fn new(name: impl Into<String>, device: DeviceId, shape: impl Into<TensorShape>) -> Self {
        let shape = shape.into();
        let (rows, cols) = shape.as_matrix_dims();
        LearnableParameter {
            base: NodeBase::new(name, device),
            value: Matrix::zeros(rows, cols, device),
            shape,
            state: InitState::Idle,
            gradient_multiplier: 1.0,
        }
    }

    /// A parameter that initializes with `init` as soon as its shape is
    /// fully known (immediately, if it already is).
    pub fn with_init(
        name: impl Into<String>,
        device: DeviceId,
        shape: impl Into<TensorShape>,
        init: PendingInit,
    ) -> Result<Self> {
        let mut param = Self::new(name, device, shape);
        param.reinitialize(init)?;
        Ok(param)
    }

    /// Build from a parameter configuration. Random initializations with a
    /// negative seed take theirs from `seeds`.
    pub fn from_config(config: &ParameterConfig, seeds: &mut SeedAllocator) -> Result<Self> {
        let mut param = Self::new(config.name.clone(), config.device, config.shape.clone());
        param.gradient_multiplier = config.gradient_multiplier;

        match config.init.resolve(seeds)? {
            InitRequest::Deferred(init) => {
                param.state = InitState::Pending(init);
                param.attempt_execution()?;
                if param.is_pending() {
                    log::info!(
                        "{}: initializing parameter [{}] later when dimensions are fully known",
                        param.node_description(),
                        param.shape
                    );
                }
            }
            InitRequest::FromFile(path) => param.init_from_file(&path)?,
            InitRequest::FromLiteral(literal) => {
                let parsed = load_matrix_from_string_literal(&literal)?;
                param.init_from_array(parsed)?;
            }
        }
        Ok(param)
    }

    /// Build from a configuration record.
    pub fn from_record<C: ConfigRecord>(record: &C, seeds: &mut SeedAllocator) -> Result<Self> {
        Self::from_config(&ParameterConfig::from_record(record)?, seeds)
    }

    // Accessors

    pub fn name(&self) -> &str {
        &self.base.name
    }

    pub fn shape(&self) -> &TensorShape {
        &self.shape
    }

    pub fn value(&self) -> &Matrix<E> {
        &self.value
    }

    pub fn state(&self) -> &InitState {
        &self.state
    }

    /// The initialization still waiting for the shape, if any.
    pub fn pending_init(&self) -> Option<&PendingInit> {
        match &self.state {
            InitState::Pending(init) => Some(init),
            _ => None,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.pending_init().is_some()
    }

    pub fn gradient_multiplier(&self) -> f32 {
        self.gradient_multiplier
    }

    pub fn set_gradient_multiplier(&mut self, m: f32) {
        self.gradient_multiplier = m;
    }

    /// Whether training updates this parameter at all.
    pub fn needs_gradient(&self) -> bool {
        self.gradient_multiplier > 0.0
    }

    /// Stop training updates for this parameter.
    pub fn freeze(&mut self) {
        self.freeze_parameters();
    }

    // Shape and deferred initialization

    /// Set the shape, reallocate the (zeroed) buffer for it and run any
    /// pending initialization the new shape makes possible.
    pub fn init_shape(&mut self, shape: impl Into<TensorShape>) -> Result<()> {
        self.shape = shape.into();
        let (rows, cols) = self.shape.as_matrix_dims();
        self.value.resize(rows, cols);
        self.attempt_execution()?;
        Ok(())
    }

    /// Run the pending initialization if the shape is now fully known.
    ///
    /// Returns true if it ran. On failure the initialization stays pending.
    pub fn attempt_execution(&mut self) -> Result<bool> {
        if !self.shape.is_fully_known() {
            return Ok(false);
        }
        let init = match mem::replace(&mut self.state, InitState::Executing) {
            InitState::Pending(init) => init,
            other => {
                self.state = other;
                return Ok(false);
            }
        };
        match self.execute(&init) {
            Ok(()) => {
                self.state = InitState::Initialized;
                Ok(true)
            }
            Err(e) => {
                self.state = InitState::Pending(init);
                Err(e)
            }
        }
    }

    fn execute(&mut self, init: &PendingInit) -> Result<()> {
        match *init {
            PendingInit::FromValue(v) => self.value.fill(E::from_f64(v)),
            PendingInit::Random {
                kind,
                seed,
                scale,
                cpu_only,
            } => {
                let home = self.value.device();
                if cpu_only {
                    self.value.transfer_to_device_if_not_there(DeviceId::Cpu);
                }
                let scale = E::from_f64(scale);
                let drawn = match kind {
                    RandomKind::Uniform => {
                        let range = E::from_f64(0.05) * scale;
                        self.value.fill_uniform(-range, range, seed)
                    }
                    RandomKind::Gaussian => {
                        let cols = E::from_f64(self.value.cols() as f64);
                        let std = E::from_f64(0.2) * scale / cols.sqrt();
                        self.value.fill_gaussian(E::zero(), std, seed)
                    }
                };
                if cpu_only {
                    self.value.transfer_to_device_if_not_there(home);
                }
                drawn?;
            }
        }
        log::info!(
            "{}: initialized parameter [{}] as {}",
            self.node_description(),
            self.shape,
            init
        );
        Ok(())
    }

    /// Replace any pending or completed initialization with `init` and run it
    /// as soon as the shape allows.
    pub fn reinitialize(&mut self, init: PendingInit) -> Result<()> {
        self.state = InitState::Pending(init);
        self.attempt_execution()?;
        Ok(())
    }

    /// Re-initialize after plain construction, from a strategy token and its
    /// scalar: the scale for `uniform` / `gaussian`, the constant for
    /// `fixedValue`.
    pub fn post_init_parameters(
        &mut self,
        token: &str,
        value: f64,
        seed: u64,
        cpu_only: bool,
    ) -> Result<()> {
        let random = |kind| PendingInit::Random {
            kind,
            seed,
            scale: value,
            cpu_only,
        };
        let init = match InitToken::parse(token) {
            Ok(InitToken::Uniform) => random(RandomKind::Uniform),
            Ok(InitToken::Gaussian) => random(RandomKind::Gaussian),
            Ok(InitToken::FixedValue) => PendingInit::FromValue(value),
            _ => {
                return Err(Error::logic(format!(
                    "{}: unsupported post-construction initialization method '{token}'",
                    self.node_description()
                )))
            }
        };
        self.reinitialize(init)
    }

    // Loading values from text data

    /// Load values from a text matrix file, inferring unknown dimensions from
    /// its geometry.
    pub fn init_from_file(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let parsed = load_matrix_from_text_file(path)?;
        self.init_from_array(parsed)
    }

    /// Take values from parsed text data. A shape with unknown dimensions is
    /// first resolved against the data's rows and columns. On failure the
    /// node is left as it was.
    pub fn init_from_array(&mut self, data: ParsedMatrix<E>) -> Result<()> {
        let shape = infer_from_data(&self.shape, data.rows, data.cols, &self.node_description())?;
        let value = Matrix::from_col_major(data.rows, data.cols, data.data, self.value.device())?;
        self.value = self.fit_to_shape(&shape, value)?;
        self.shape = shape;
        self.state = InitState::Initialized;
        Ok(())
    }

    /// Reload the values from a text file, whatever the current state.
    pub fn revise_from_file(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        self.init_from_file(path).map_err(|e| {
            Error::runtime(format!(
                "revise_from_file: failed to reload {} {} operation from file {}: {e}",
                self.base.name,
                OPERATION_NAME,
                path.display()
            ))
        })
    }

    /// Check that `value` holds exactly as many elements as `shape`, then
    /// give it the shape's matrix geometry.
    fn fit_to_shape(&self, shape: &TensorShape, mut value: Matrix<E>) -> Result<Matrix<E>> {
        if value.len() != shape.elem_count() {
            logic_error!(
                "{}: data size mismatch: shape {} holds {} elements, buffer has {}",
                self.node_description(),
                shape,
                shape.elem_count(),
                value.len()
            );
        }
        let (rows, cols) = shape.as_matrix_dims();
        value.reshape(rows, cols)?;
        Ok(value)
    }

    /// Fails while the values are still waiting for the shape.
    pub fn ensure_ready_for_evaluation(&self) -> Result<()> {
        match &self.state {
            InitState::Pending(init) => Err(Error::logic(format!(
                "{}: uninitialized parameter used in evaluation; {} is still pending for shape {}",
                self.node_description(),
                init,
                self.shape
            ))),
            InitState::Executing => Err(Error::logic(format!(
                "{}: parameter used in evaluation during its initialization",
                self.node_description()
            ))),
            InitState::Idle | InitState::Initialized => Ok(()),
        }
    }

    // Persistence

    /// Write the node in the current layout. Fails while initialization is
    /// pending.
    pub fn save<W: Write>(&self, w: &mut BinaryWriter<W>) -> Result<()> {
        if let InitState::Pending(init) = &self.state {
            logic_error!(
                "{}: cannot save a parameter whose initialization {} is still pending",
                self.node_description(),
                init
            );
        }
        self.base.save(w)?;
        w.write_f32(self.gradient_multiplier)?;
        w.write_shape(&self.shape)?;
        w.write_matrix(&self.value)
    }

    /// Read a node written by `save` (or an older producer) with the given
    /// model version. The buffer is placed on this node's device. The node
    /// only changes once the whole record has been read and checked.
    pub fn load<R: Read>(&mut self, r: &mut BinaryReader<R>, model_version: u32) -> Result<()> {
        let mut base = self.base.clone();
        base.load(r, model_version)?;

        let (gradient_multiplier, shape) = if model_version >= TENSOR_SHAPE_MODEL_VERSION {
            (r.read_f32()?, r.read_shape(false)?)
        } else {
            let needs_update = r.read_bool()?;
            let multiplier = if needs_update { 1.0 } else { 0.0 };
            let rows = read_dim(r, "row count")?;
            let cols = read_dim(r, "column count")?;
            let shape = if rows != 0 {
                TensorShape::from((rows, cols))
            } else {
                let mut shape = r.read_shape(true)?;
                if cols > 1 {
                    shape.append(cols);
                }
                shape
            };
            (multiplier, shape)
        };

        let value = r.read_matrix(base.device)?;
        self.value = self.fit_to_shape(&shape, value)?;
        self.base = base;
        self.shape = shape;
        self.gradient_multiplier = gradient_multiplier;
        self.state = InitState::Initialized;
        Ok(())
    }

    /// Read a fresh node from a stream, placing its buffer on `device`.
    pub fn read_from<R: Read>(
        r: &mut BinaryReader<R>,
        model_version: u32,
        device: DeviceId,
    ) -> Result<Self> {
        let mut param = Self::new(String::new(), device, TensorShape::empty());
        param.load(r, model_version)?;
        Ok(param)
    }

    // Diagnostics and copying

    /// Print geometry and multiplier, then (optionally) the values, one
    /// matrix row per line.
    pub fn dump_node_info<W: Write>(
        &self,
        print_values: bool,
        print_metadata: bool,
        out: &mut W,
    ) -> Result<()> {
        if print_metadata {
            writeln!(out, "{}", self.node_description())?;
            writeln!(
                out,
                "[{},{}]  learningRateMultiplier={:.6}  NeedsGradient={}",
                self.value.rows(),
                self.value.cols(),
                self.gradient_multiplier,
                self.needs_gradient()
            )?;
        }
        if print_values {
            for row in self.value.to_rows() {
                let line: Vec<String> = row.iter().map(|v| v.to_string()).collect();
                writeln!(out, "{}", line.join(" "))?;
            }
        }
        Ok(())
    }

    /// A copy under `new_name`. Without `copy_value` only name, device and
    /// shape carry over.
    pub fn duplicate(&self, new_name: impl Into<String>, flags: CopyNodeFlags) -> Self {
        if flags.copy_value {
            let mut copy = self.clone();
            copy.base.name = new_name.into();
            copy
        } else {
            Self::new(new_name, self.base.device, self.shape.clone())
        }
    }
}

fn read_dim<R: Read>(r: &mut BinaryReader<R>, what: &str) -> Result<usize> {
    let v = r.read_u64()?;
    usize::try_from(v).map_err(|_| Error::format(format!("legacy {what} {v} overflows usize")))
}

impl<E: Element> Freezable for LearnableParameter<E> {
    fn freeze_parameters(&mut self) {
        self.gradient_multiplier = 0.0;
    }
}

impl<E: Element> ComputationNode for LearnableParameter<E> {
    fn node_name(&self) -> &str {
        &self.base.name
    }

    fn operation_name(&self) -> &'static str {
        OPERATION_NAME
    }

    fn device(&self) -> DeviceId {
        self.base.device
    }

    fn sample_layout(&self) -> &TensorShape {
        &self.shape
    }

    fn validate(&mut self, is_final_validation_pass: bool) -> Result<()> {
        self.attempt_execution()?;
        if is_final_validation_pass && !self.shape.is_fully_known() {
            return Err(Error::invalid_argument(format!(
                "{}: tensor shape {} could not be inferred",
                self.node_description(),
                self.shape
            )));
        }
        Ok(())
    }

    fn infer_input_dims_from(&mut self, other: &TensorShape) -> Result<PeerInference> {
        let outcome = infer_from_peer(&self.shape, other);
        let would_infer = matches!(
            outcome,
            PeerInference::Resolved(_) | PeerInference::RankMismatch { .. }
        );
        if would_infer && !self.is_pending() {
            logic_error!(
                "{}: attempted to infer dimensions {} from {}, with initialization completed or no deferred initialization pending",
                self.node_description(),
                self.shape,
                other
            );
        }
        match &outcome {
            PeerInference::Resolved(shape) => {
                self.init_shape(shape.clone())?;
                log::info!(
                    "{}: tensor shape was inferred as {}",
                    self.node_description(),
                    self.shape
                );
            }
            PeerInference::RankMismatch { own, peer } => log::warn!(
                "{}: rank {} of shape {} disagrees with rank {} of {}; not inferring",
                self.node_description(),
                own,
                self.shape,
                peer,
                other
            ),
            PeerInference::AlreadyKnown | PeerInference::PeerUnknown => {
                log::debug!("{}: nothing to infer from {}", self.node_description(), other)
            }
        }
        Ok(outcome)
    }

    fn update_function_mb_size(&mut self) -> Result<()> {
        self.ensure_ready_for_evaluation()
    }

    fn forward_prop(&mut self) -> Result<()> {
        Ok(())
    }

    fn backprop_to(&mut self, input_index: usize) -> Result<()> {
        Err(Error::logic(format!(
            "{}: backprop_to({input_index}) called on a leaf node",
            self.node_description()
        )))
    }

    fn clone_node(&self, new_name: &str, flags: CopyNodeFlags) -> Box<dyn ComputationNode> {
        Box::new(self.duplicate(new_name, flags))
    }
}
