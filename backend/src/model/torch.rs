use std::path::Path;
use std::sync::Mutex;
use tch::{CModule, Device, Kind, Tensor};

use super::backend::{Classifier, InferenceError, LoadError, ModelLoader};
use crate::imaging::DecodedImage;

/// Loads TorchScript classifiers exported with `torch.jit.save`.
pub struct TorchScriptLoader {
    device: Device,
}

impl TorchScriptLoader {
    pub fn new(device: Device) -> Self {
        Self { device }
    }
}

impl ModelLoader for TorchScriptLoader {
    fn load(&self, weights: &Path) -> Result<Box<dyn Classifier>, LoadError> {
        log::info!("Loading TorchScript module on {:?}", self.device);
        let module = CModule::load_on_device(weights, self.device)
            .map_err(|e| LoadError::Backend(e.to_string()))?;
        Ok(Box::new(TorchScriptClassifier {
            module: Mutex::new(module),
            device: self.device,
        }))
    }
}

pub struct TorchScriptClassifier {
    module: Mutex<CModule>,
    device: Device,
}

impl Classifier for TorchScriptClassifier {
    fn num_classes(&self) -> Option<usize> {
        None
    }

    fn scores(&self, image: &DecodedImage) -> Result<Vec<f32>, InferenceError> {
        let data = image.pixels.as_slice().ok_or_else(|| {
            InferenceError::Preprocessing("pixel buffer is not contiguous".to_string())
        })?;
        let input = Tensor::from_slice(data)
            .view(image.batch_shape())
            .to_device(self.device);

        let module = self
            .module
            .lock()
            .map_err(|_| InferenceError::Model("model mutex poisoned".to_string()))?;
        let output = tch::no_grad(|| module.forward_ts(&[input]))
            .map_err(|e| InferenceError::Model(e.to_string()))?;

        let output = output
            .softmax(-1, Kind::Float)
            .to_device(Device::Cpu)
            .view([-1]);
        let num_elements = output.size()[0] as usize;
        let mut output_vec = vec![0.0f32; num_elements];
        output.copy_data(&mut output_vec, num_elements);
        Ok(output_vec)
    }
}
