use std::path::{Path, PathBuf};

use burn::config::Config;
use burn::module::{AutodiffModule, Module, ModuleVisitor, ParamId};
use burn::optim::Optimizer;
use burn::prelude::Backend;
use burn::record::{DefaultFileRecorder, FullPrecisionSettings, Recorder};
use burn::tensor::backend::AutodiffBackend;
use burn::tensor::Tensor;
use log::info;

use crate::error::{PpoError, Result as PpoResult};

const MODEL_FILE: &str = "model";
const OPTIMIZER_FILE: &str = "optimizer";
const META_FILE: &str = "meta.json";

type CheckpointRecorder = DefaultFileRecorder<FullPrecisionSettings>;

#[derive(Config, Debug)]
pub struct CheckpointMeta {
    pub episode: usize,
    pub num_params: usize,
    /// Float parameter shapes in module visiting order.
    pub param_shapes: Vec<Vec<usize>>,
}

#[derive(Default)]
struct ParamShapes {
    shapes: Vec<Vec<usize>>,
}

impl<B: Backend> ModuleVisitor<B> for ParamShapes {
    fn visit_float<const D: usize>(&mut self, _id: ParamId, tensor: &Tensor<B, D>) {
        self.shapes.push(tensor.dims().to_vec());
    }
}

pub fn param_shapes<B: Backend, M: Module<B>>(module: &M) -> Vec<Vec<usize>> {
    let mut visitor = ParamShapes::default();
    module.visit(&mut visitor);
    visitor.shapes
}

pub fn read_meta(dir: &Path) -> PpoResult<CheckpointMeta> {
    CheckpointMeta::load(dir.join(META_FILE))
        .map_err(|err| PpoError::CheckpointLoad(format!("{}: {err:?}", dir.display())))
}

/// Fails unless the checkpoint was written for a network of the same layout.
pub fn validate_shapes<B: Backend, M: Module<B>>(meta: &CheckpointMeta, module: &M) -> PpoResult<()> {
    let expected = param_shapes::<B, M>(module);
    if expected.len() != meta.param_shapes.len() {
        return Err(PpoError::CheckpointLoad(format!(
            "checkpoint holds {} parameter tensors, network has {}",
            meta.param_shapes.len(),
            expected.len()
        )));
    }
    for (i, (want, got)) in expected.iter().zip(&meta.param_shapes).enumerate() {
        if want != got {
            return Err(PpoError::CheckpointLoad(format!(
                "parameter {i}: checkpoint shape {got:?}, network shape {want:?}"
            )));
        }
    }
    Ok(())
}

fn staging_dir(dir: &Path) -> PathBuf {
    let mut name = dir
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    dir.with_file_name(name)
}

/// Writes model, optimizer state and metadata into `dir`.
///
/// Everything lands in a sibling staging directory first, which is then
/// renamed over `dir`.
pub fn save_checkpoint<B, M, O>(dir: &Path, model: &M, optimizer: &O, episode: usize) -> PpoResult<()>
where
    B: AutodiffBackend,
    M: AutodiffModule<B>,
    O: Optimizer<M, B>,
{
    let staging = staging_dir(dir);
    if staging.exists() {
        std::fs::remove_dir_all(&staging)?;
    }
    std::fs::create_dir_all(&staging)?;

    let recorder = CheckpointRecorder::new();
    model
        .clone()
        .save_file(staging.join(MODEL_FILE), &recorder)?;
    Recorder::<B>::record(&recorder, optimizer.to_record(), staging.join(OPTIMIZER_FILE))?;
    CheckpointMeta::new(episode, model.num_params(), param_shapes::<B, M>(model))
        .save(staging.join(META_FILE))?;

    if dir.exists() {
        std::fs::remove_dir_all(dir)?;
    }
    std::fs::rename(&staging, dir)?;
    info!("checkpoint episode={} saved to {}", episode, dir.display());
    Ok(())
}

/// Loads network weights only, for inference.
pub fn load_model<B: Backend, M: Module<B>>(model: M, dir: &Path, device: &B::Device) -> PpoResult<M> {
    let meta = read_meta(dir)?;
    validate_shapes::<B, M>(&meta, &model)?;
    model
        .load_file(dir.join(MODEL_FILE), &CheckpointRecorder::new(), device)
        .map_err(|err| PpoError::CheckpointLoad(format!("{err:?}")))
}

pub fn load_optimizer<B, M, O>(optimizer: O, dir: &Path, device: &B::Device) -> PpoResult<O>
where
    B: AutodiffBackend,
    M: AutodiffModule<B>,
    O: Optimizer<M, B>,
{
    let record = Recorder::<B>::load::<O::Record>(
        &CheckpointRecorder::new(),
        dir.join(OPTIMIZER_FILE),
        device,
    )
    .map_err(|err| PpoError::CheckpointLoad(format!("{err:?}")))?;
    Ok(optimizer.load_record(record))
}
