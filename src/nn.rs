//! Neural Network inference.

use std::path::Path;

use anyhow::{bail, Context};
use tract_onnx::prelude::{
    tract_ndarray::{Array4, ArrayViewD},
    tvec, Datum, Framework, Graph, InferenceFact, InferenceModelExt, IntoTensor, SimplePlan,
    TValue, TVec, TypedFact, TypedOp,
};

use crate::image::{AsImageView, ImageView, Resolution};

type Model = SimplePlan<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

/// An ONNX convolutional network taking a single `[1, 3, H, W]` RGB image input.
///
/// Input pixels are scaled from `0..=255` to `0.0..=1.0`. Inference runs on the CPU.
pub struct NeuralNetwork {
    inner: Model,
    input_res: Resolution,
}

impl NeuralNetwork {
    /// Loads an `.onnx` model from the filesystem, fixing its input to `input_res`.
    pub fn load(path: impl AsRef<Path>, input_res: Resolution) -> anyhow::Result<Self> {
        Self::load_impl(path.as_ref(), input_res)
    }

    fn load_impl(path: &Path, input_res: Resolution) -> anyhow::Result<Self> {
        match path.extension() {
            Some(ext) if ext == "onnx" => {}
            _ => bail!(
                "neural network path '{}' must have `.onnx` extension",
                path.display()
            ),
        }

        let (h, w) = (input_res.height() as usize, input_res.width() as usize);
        let model = tract_onnx::onnx()
            .model_for_path(path)
            .with_context(|| format!("failed to load ONNX model from '{}'", path.display()))?
            .with_input_fact(0, InferenceFact::dt_shape(f32::datum_type(), tvec!(1, 3, h, w)))
            .context("failed to set model input shape")?
            .into_optimized()
            .context("failed to optimize ONNX model")?
            .into_runnable()
            .context("failed to build runnable ONNX model")?;

        if model.model().inputs.len() != 1 {
            bail!(
                "network has to take 1 input, this one takes {}",
                model.model().inputs.len()
            );
        }

        log::info!(
            "loaded '{}' ({} input, {} outputs)",
            path.display(),
            input_res,
            model.model().outputs.len(),
        );

        Ok(Self {
            inner: model,
            input_res,
        })
    }

    /// Returns the expected input image size.
    #[inline]
    pub fn input_resolution(&self) -> Resolution {
        self.input_res
    }

    /// Runs the network on an input image, returning the raw outputs.
    ///
    /// The image's resolution must match [`NeuralNetwork::input_resolution`].
    #[doc(alias = "infer")]
    pub fn estimate<V: AsImageView>(&self, image: &V) -> anyhow::Result<Outputs> {
        self.estimate_impl(image.as_view())
    }

    fn estimate_impl(&self, image: ImageView<'_>) -> anyhow::Result<Outputs> {
        if image.resolution() != self.input_res {
            bail!(
                "network input image has resolution {}, expected {}",
                image.resolution(),
                self.input_res
            );
        }

        let (h, w) = (self.input_res.height() as usize, self.input_res.width() as usize);
        let input = Array4::from_shape_fn((1, 3, h, w), |(_, c, y, x)| {
            f32::from(image.get(x as u32, y as u32)[c]) / 255.0
        });

        let inner = self
            .inner
            .run(tvec!(input.into_tensor().into()))
            .context("inference failed")?;
        Ok(Outputs { inner })
    }
}

/// The list of tensors produced by one [`NeuralNetwork::estimate`] call.
pub struct Outputs {
    inner: TVec<TValue>,
}

impl Outputs {
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Returns a view of the `index`th output as an `f32` array.
    pub fn view(&self, index: usize) -> anyhow::Result<ArrayViewD<'_, f32>> {
        let Some(tensor) = self.inner.get(index) else {
            bail!("network produced {} outputs, no output #{index}", self.len());
        };
        tensor
            .to_array_view::<f32>()
            .with_context(|| format!("output #{index} is not an f32 tensor"))
    }
}
