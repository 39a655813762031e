//! Convolutional classifier built with candle.
//!
//! Four blocks of `conv3x3 → relu → batch-norm → conv3x3 → relu → maxpool2`
//! (32/64/128/256 filters, no padding), then `dense 512 → batch-norm →
//! dense 256 → batch-norm → dense 4 → softmax`. Dropout layers from training
//! are omitted since inference never applies them.

use std::path::Path;

use candle_core::{DType, Device, Module, ModuleT, Tensor};
use candle_nn::{BatchNorm, Conv2d, Linear, VarBuilder, VarMap};
use tracing::{info, warn};

use lookout_shared::{LookoutError, Result};

use crate::classes::TumorClass;
use crate::prediction::{Classifier, Prediction};
use crate::preprocess::{INPUT_SIZE, PreparedImage};

const BLOCK_FILTERS: [usize; 4] = [32, 64, 128, 256];
/// Keras' batch-norm epsilon, so exported weights behave the same.
const BN_EPS: f64 = 1e-3;

fn infer_err(e: candle_core::Error) -> LookoutError {
    LookoutError::Inference(e.to_string())
}

/// Spatial side length after all conv blocks, if the input is large enough.
pub fn feature_side(input: usize) -> Option<usize> {
    BLOCK_FILTERS.iter().try_fold(input, |side, _| {
        // two valid 3x3 convs then a 2x2 pool
        let side = side.checked_sub(4)? / 2;
        (side > 0).then_some(side)
    })
}

struct ConvBlock {
    conv1: Conv2d,
    norm: BatchNorm,
    conv2: Conv2d,
}

impl ConvBlock {
    fn new(in_c: usize, out_c: usize, vb: VarBuilder) -> candle_core::Result<Self> {
        let cfg = candle_nn::Conv2dConfig::default();
        Ok(Self {
            conv1: candle_nn::conv2d(in_c, out_c, 3, cfg, vb.pp("conv1"))?,
            norm: candle_nn::batch_norm(out_c, BN_EPS, vb.pp("bn"))?,
            conv2: candle_nn::conv2d(out_c, out_c, 3, cfg, vb.pp("conv2"))?,
        })
    }

    fn forward(&self, x: &Tensor) -> candle_core::Result<Tensor> {
        let x = self.conv1.forward(x)?.relu()?;
        let x = self.norm.forward_t(&x, false)?;
        let x = self.conv2.forward(&x)?.relu()?;
        x.max_pool2d(2)
    }
}

struct Network {
    blocks: Vec<ConvBlock>,
    fc1: Linear,
    bn1: BatchNorm,
    fc2: Linear,
    bn2: BatchNorm,
    out: Linear,
}

impl Network {
    fn new(input: usize, vb: VarBuilder) -> candle_core::Result<Self> {
        let side = feature_side(input).ok_or_else(|| {
            candle_core::Error::Msg(format!("input size {input} is too small for the network"))
        })?;

        let mut blocks = Vec::with_capacity(BLOCK_FILTERS.len());
        let mut in_c = 3;
        for (i, &out_c) in BLOCK_FILTERS.iter().enumerate() {
            blocks.push(ConvBlock::new(in_c, out_c, vb.pp(format!("block{}", i + 1)))?);
            in_c = out_c;
        }

        let flat = in_c * side * side;
        Ok(Self {
            blocks,
            fc1: candle_nn::linear(flat, 512, vb.pp("fc1"))?,
            bn1: candle_nn::batch_norm(512, BN_EPS, vb.pp("bn1"))?,
            fc2: candle_nn::linear(512, 256, vb.pp("fc2"))?,
            bn2: candle_nn::batch_norm(256, BN_EPS, vb.pp("bn2"))?,
            out: candle_nn::linear(256, TumorClass::ALL.len(), vb.pp("out"))?,
        })
    }

    /// `x`: `(batch, 3, side, side)`; returns `(batch, 4)` probabilities.
    fn forward(&self, x: &Tensor) -> candle_core::Result<Tensor> {
        let mut x = x.clone();
        for block in &self.blocks {
            x = block.forward(&x)?;
        }
        let x = x.flatten_from(1)?;
        let x = self.fc1.forward(&x)?.relu()?;
        let x = self.bn1.forward_t(&x, false)?;
        let x = self.fc2.forward(&x)?.relu()?;
        let x = self.bn2.forward_t(&x, false)?;
        let x = self.out.forward(&x)?;
        candle_nn::ops::softmax(&x, 1)
    }
}

pub struct CnnClassifier {
    network: Network,
    device: Device,
    input_size: u32,
}

impl CnnClassifier {
    /// Load weights from a safetensors file for the standard input size.
    pub fn from_weights(path: &Path) -> Result<Self> {
        Self::from_weights_with_size(path, INPUT_SIZE)
    }

    pub fn from_weights_with_size(path: &Path, input_size: u32) -> Result<Self> {
        if !path.exists() {
            return Err(LookoutError::Inference(format!(
                "weights file not found: {}",
                path.display()
            )));
        }
        let device = Device::Cpu;
        // SAFETY: the file is not modified while mapped.
        let vb = unsafe { VarBuilder::from_mmaped_safetensors(&[path], DType::F32, &device) }
            .map_err(infer_err)?;
        let network = Network::new(input_size as usize, vb).map_err(infer_err)?;
        info!(path = %path.display(), "loaded CNN weights");
        Ok(Self {
            network,
            device,
            input_size,
        })
    }

    /// Randomly initialized network; predictions are meaningless.
    pub fn random() -> Result<Self> {
        Self::random_with_size(INPUT_SIZE).map(|(c, _)| c)
    }

    /// Random network plus its variables, which can be saved as safetensors.
    pub fn random_with_size(input_size: u32) -> Result<(Self, VarMap)> {
        warn!("no CNN weights given, using randomly initialized demo weights");
        let device = Device::Cpu;
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &device);
        let network = Network::new(input_size as usize, vb).map_err(infer_err)?;
        Ok((
            Self {
                network,
                device,
                input_size,
            },
            varmap,
        ))
    }

    fn probabilities(&self, image: &PreparedImage) -> candle_core::Result<Vec<f32>> {
        let x = Tensor::from_vec(image.data.clone(), image.shape(), &self.device)?
            .permute((2, 0, 1))?
            .unsqueeze(0)?
            .contiguous()?;
        self.network.forward(&x)?.squeeze(0)?.to_vec1::<f32>()
    }
}

impl Classifier for CnnClassifier {
    fn name(&self) -> &'static str {
        "cnn"
    }

    fn predict(&self, image: &PreparedImage) -> Result<Prediction> {
        if image.size != self.input_size {
            return Err(LookoutError::validation(format!(
                "image is {0}x{0}, model expects {1}x{1}",
                image.size, self.input_size
            )));
        }
        let probs = self.probabilities(image).map_err(infer_err)?;
        Prediction::from_probabilities(&probs)
    }
}
