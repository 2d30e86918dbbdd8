use ndarray::Array4;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tch::nn::{self, ModuleT};
use tch::{CModule, Device, Kind, Tensor};

use super::loader::{BackendLoader, InferenceBackend};
use super::InferenceError;
use crate::config::{InputLayout, ModelConfig};

const FEATURE_DIM: i64 = 512;
const HIDDEN_DIM: i64 = 256;
const DROPOUT: f64 = 0.2;

/// libtorch loader: TorchScript first, then the rebuilt topology with
/// weights-only loading from the same file.
pub struct TorchBackendLoader;

impl BackendLoader for TorchBackendLoader {
    fn load(
        &self,
        path: &Path,
        config: &ModelConfig,
    ) -> Result<Arc<dyn InferenceBackend>, InferenceError> {
        let device = Device::cuda_if_available();
        let layout = config.image.preprocessing.input_layout;

        match CModule::load_on_device(path, device) {
            Ok(module) => {
                return Ok(Arc::new(TorchScriptModel {
                    module: Mutex::new(module),
                    device,
                    layout,
                }));
            }
            Err(e) => {
                log::info!(
                    "TorchScript load of {} failed, rebuilding architecture: {}",
                    path.display(),
                    e
                );
            }
        }

        let rebuilt = RebuiltModel::load(path, config.classes.len() as i64, device)?;
        Ok(Arc::new(rebuilt))
    }
}

pub struct TorchScriptModel {
    module: Mutex<CModule>,
    device: Device,
    layout: InputLayout,
}

impl InferenceBackend for TorchScriptModel {
    fn forward(&self, input: &Array4<f32>) -> Result<Vec<f32>, InferenceError> {
        let tensor = to_tensor(input, self.layout, self.device)?;
        let module = self
            .module
            .lock()
            .map_err(|_| InferenceError::Model("model lock poisoned".to_string()))?;
        let output = tch::no_grad(|| module.forward_t(&tensor, false));
        Ok(to_vec(&output))
    }

    fn describe(&self) -> String {
        format!("torchscript on {:?}", self.device)
    }
}

/// ResNet-18 feature extractor followed by the dense classification head.
pub struct RebuiltModel {
    _vs: nn::VarStore,
    net: Mutex<nn::SequentialT>,
    device: Device,
}

impl RebuiltModel {
    pub fn load(path: &Path, num_classes: i64, device: Device) -> Result<Self, InferenceError> {
        let mut vs = nn::VarStore::new(device);
        let net = build_network(&vs.root(), num_classes);
        vs.load(path)
            .map_err(|e| InferenceError::Model(format!("failed to load weights: {}", e)))?;
        Ok(Self {
            _vs: vs,
            net: Mutex::new(net),
            device,
        })
    }
}

impl InferenceBackend for RebuiltModel {
    fn forward(&self, input: &Array4<f32>) -> Result<Vec<f32>, InferenceError> {
        let tensor = to_tensor(input, InputLayout::Nchw, self.device)?;
        let net = self
            .net
            .lock()
            .map_err(|_| InferenceError::Model("model lock poisoned".to_string()))?;
        let output = tch::no_grad(|| net.forward_t(&tensor, false));
        Ok(to_vec(&output))
    }

    fn describe(&self) -> String {
        format!("rebuilt resnet18 head on {:?}", self.device)
    }
}

fn build_network(p: &nn::Path, num_classes: i64) -> nn::SequentialT {
    nn::seq_t()
        .add(tch::vision::resnet::resnet18_no_final_layer(&(p / "features")))
        .add_fn_t(|xs, train| xs.dropout(DROPOUT, train))
        .add(nn::linear(p / "hidden", FEATURE_DIM, HIDDEN_DIM, Default::default()))
        .add_fn(|xs| xs.relu())
        .add(nn::linear(p / "classifier", HIDDEN_DIM, num_classes, Default::default()))
        .add_fn(|xs| xs.softmax(-1, Kind::Float))
}

/// The preprocessed batch is NHWC; most torch models want NCHW.
fn to_tensor(input: &Array4<f32>, layout: InputLayout, device: Device) -> Result<Tensor, InferenceError> {
    let shape: Vec<i64> = input.shape().iter().map(|d| *d as i64).collect();
    let data = input
        .as_slice()
        .ok_or_else(|| InferenceError::Model("input tensor is not contiguous".to_string()))?;
    let tensor = Tensor::from_slice(data).view(shape.as_slice());
    let tensor = match layout {
        InputLayout::Nchw => tensor.permute([0, 3, 1, 2]).contiguous(),
        InputLayout::Nhwc => tensor,
    };
    Ok(tensor.to_device(device))
}

fn to_vec(output: &Tensor) -> Vec<f32> {
    let flat = output.to_kind(Kind::Float).to_device(Device::Cpu).view([-1]);
    let num_elements = flat.size()[0] as usize;
    let mut output_vec = vec![0.0f32; num_elements];
    flat.copy_data(&mut output_vec, num_elements);
    output_vec
}
