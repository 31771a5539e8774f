use std::{path::{Path, PathBuf}, sync::Arc};

use derive_more::From;
use image::{imageops::{self, FilterType}, RgbImage};
use ndarray::Array4;
use ort::{inputs, GraphOptimizationLevel, Session, SessionOutputs};
use serde::Serialize;
use serde_with::{serde_as, DisplayFromStr};
use tokio::sync::OnceCell;

use super::{image_tools::CANONICAL_SIZE, log::{log_info, LogServiceType}};

pub type RecognitionResult<T> = core::result::Result<T, RecognitionError>;

/// Length of every face embedding produced by the model.
pub const EMBEDDING_SIZE: usize = 512;

const NORMALIZE_EPSILON: f32 = 1e-10;

#[serde_as]
#[derive(Debug, Serialize, strum_macros::AsRefStr, From)]
pub enum RecognitionError {
    ModelLoad(String),
    ModelInference(String),

	#[from]
	Ort(#[serde_as(as = "DisplayFromStr")] ort::Error),

	#[from]
	Shape(#[serde_as(as = "DisplayFromStr")] ndarray::ShapeError),

	#[from]
	Join(#[serde_as(as = "DisplayFromStr")] tokio::task::JoinError),
}

// region:    --- Error Boilerplate

impl core::fmt::Display for RecognitionError {
	fn fmt(
		&self,
		fmt: &mut core::fmt::Formatter,
	) -> core::result::Result<(), core::fmt::Error> {
		write!(fmt, "{self:?}")
	}
}

impl std::error::Error for RecognitionError {}

// endregion: --- Error Boilerplate

/// Scales `features` to unit length. An all-zero vector stays all-zero.
pub fn l2_normalize(features: &[f32]) -> Vec<f32> {
    let norm = features.iter().map(|v| v * v).sum::<f32>().sqrt() + NORMALIZE_EPSILON;
    features.iter().map(|v| v / norm).collect()
}

/// Turns a canonical face crop into a raw (not normalized) embedding.
pub trait EmbeddingModel: Send + Sync {
    fn infer(&self, face: &RgbImage) -> RecognitionResult<Vec<f32>>;
}

pub struct OnnxEmbeddingModel {
    session: Session,
    input_name: String,
    output_name: String,
}

impl OnnxEmbeddingModel {
    pub fn load(path: &Path, intra_threads: usize) -> RecognitionResult<Self> {
        if !path.exists() {
            return Err(RecognitionError::ModelLoad(format!("Embedding model not found at {:?}", path)));
        }
        Self::build(path, intra_threads).map_err(|e| RecognitionError::ModelLoad(format!("{:?}: {}", path, e)))
    }

    fn build(path: &Path, intra_threads: usize) -> RecognitionResult<Self> {
        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(intra_threads)?
            .commit_from_file(path)?;
        let input_name = session.inputs.first().ok_or(RecognitionError::ModelLoad("Embedding model does not have inputs".into()))?.name.clone();
        let output_name = session.outputs.first().ok_or(RecognitionError::ModelLoad("Embedding model does not have outputs".into()))?.name.clone();
        Ok(Self { session, input_name, output_name })
    }
}

impl EmbeddingModel for OnnxEmbeddingModel {
    fn infer(&self, face: &RgbImage) -> RecognitionResult<Vec<f32>> {
        let face = if face.dimensions() == (CANONICAL_SIZE, CANONICAL_SIZE) {
            face.clone()
        } else {
            imageops::resize(face, CANONICAL_SIZE, CANONICAL_SIZE, FilterType::Triangle)
        };
        let size = CANONICAL_SIZE as usize;
        // NHWC, raw RGB bytes
        let input = Array4::from_shape_vec((1_usize, size, size, 3_usize), face.into_raw())?;

        let outputs: SessionOutputs = self.session.run(inputs![self.input_name.to_string() => input.view()]?)?;
        let output = outputs[self.output_name.clone()].try_extract_tensor::<f32>()?;
        let vector: Vec<f32> = output.iter().copied().collect();
        if vector.len() != EMBEDDING_SIZE {
            return Err(RecognitionError::ModelInference(format!("Expected {} values from the embedding model, got {}", EMBEDDING_SIZE, vector.len())));
        }
        Ok(vector)
    }
}

type ModelLoader = Arc<dyn Fn() -> RecognitionResult<Arc<dyn EmbeddingModel>> + Send + Sync>;

/// Process-wide embedding model, loaded on first use.
///
/// Concurrent first callers wait on the same initialization so the model is loaded once.
/// A failed load is not remembered: the next call tries again.
pub struct EmbeddingService {
    model: OnceCell<Arc<dyn EmbeddingModel>>,
    loader: ModelLoader,
}

impl EmbeddingService {
    pub fn new<F>(loader: F) -> Self
    where
        F: Fn() -> RecognitionResult<Arc<dyn EmbeddingModel>> + Send + Sync + 'static,
    {
        Self { model: OnceCell::new(), loader: Arc::new(loader) }
    }

    pub fn from_model_path(path: PathBuf, intra_threads: usize) -> Self {
        Self::new(move || {
            log_info(LogServiceType::Recognition, format!("Loading embedding model {:?}", path));
            let model = OnnxEmbeddingModel::load(&path, intra_threads)?;
            log_info(LogServiceType::Recognition, "Embedding model ready".to_string());
            Ok(Arc::new(model) as Arc<dyn EmbeddingModel>)
        })
    }

    #[cfg(test)]
    pub fn ready(model: Arc<dyn EmbeddingModel>) -> Self {
        Self {
            model: OnceCell::new_with(Some(model)),
            loader: Arc::new(|| Err(RecognitionError::ModelLoad("Embedding model already provided".into()))),
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.model.initialized()
    }

    pub async fn model(&self) -> RecognitionResult<Arc<dyn EmbeddingModel>> {
        let model = self.model.get_or_try_init(|| async {
            let loader = self.loader.clone();
            tokio::task::spawn_blocking(move || loader()).await?
        }).await?;
        Ok(model.clone())
    }

    /// Runs the model on the blocking pool and returns the unit-length embedding.
    pub async fn embed(&self, face: RgbImage) -> RecognitionResult<Vec<f32>> {
        let model = self.model().await?;
        let raw = tokio::task::spawn_blocking(move || model.infer(&face)).await??;
        Ok(l2_normalize(&raw))
    }
}

#[cfg(test)]
pub mod stub {
    use image::RgbImage;

    use super::{EmbeddingModel, RecognitionResult, EMBEDDING_SIZE};

    /// Mean color of the crop in the first three dimensions, so differently colored faces
    /// get different directions.
    pub struct ColorEmbeddingModel;

    impl EmbeddingModel for ColorEmbeddingModel {
        fn infer(&self, face: &RgbImage) -> RecognitionResult<Vec<f32>> {
            let mut sums = [0f32; 3];
            for pixel in face.pixels() {
                for c in 0..3 {
                    sums[c] += pixel[c] as f32;
                }
            }
            let count = (face.width() * face.height()).max(1) as f32;
            let mut vector = vec![0f32; EMBEDDING_SIZE];
            for c in 0..3 {
                vector[c] = sums[c] / count;
            }
            Ok(vector)
        }
    }

    pub struct FixedEmbeddingModel(pub Vec<f32>);

    impl EmbeddingModel for FixedEmbeddingModel {
        fn infer(&self, _face: &RgbImage) -> RecognitionResult<Vec<f32>> {
            Ok(self.0.clone())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::stub::{ColorEmbeddingModel, FixedEmbeddingModel};
    use image::Rgb;
    use std::{sync::atomic::{AtomicUsize, Ordering}, time::Duration};

    fn norm(v: &[f32]) -> f32 {
        v.iter().map(|x| x * x).sum::<f32>().sqrt()
    }

    #[test]
    fn normalize_gives_unit_length() {
        for vector in [
            vec![3.0, 4.0],
            (0..EMBEDDING_SIZE).map(|i| (i as f32 * 0.37).sin() * 12.0).collect::<Vec<f32>>(),
            vec![1e-3; EMBEDDING_SIZE],
            vec![-250.0, 0.5, 17.25],
        ] {
            let normalized = l2_normalize(&vector);
            assert_eq!(normalized.len(), vector.len());
            assert!((norm(&normalized) - 1.0).abs() < 1e-6, "norm {}", norm(&normalized));
        }
    }

    #[test]
    fn normalize_keeps_direction() {
        let normalized = l2_normalize(&[3.0, 4.0]);
        assert!((normalized[0] - 0.6).abs() < 1e-6);
        assert!((normalized[1] - 0.8).abs() < 1e-6);
    }

    #[test]
    fn normalize_zero_vector() {
        let normalized = l2_normalize(&vec![0.0; EMBEDDING_SIZE]);
        assert_eq!(normalized, vec![0.0; EMBEDDING_SIZE]);
        assert!(l2_normalize(&[]).is_empty());
    }

    #[test]
    fn missing_model_file_is_a_load_error() {
        let result = OnnxEmbeddingModel::load(Path::new("models/does-not-exist.onnx"), 1);
        assert!(matches!(result, Err(RecognitionError::ModelLoad(_))));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_first_use_loads_once() {
        let loads = Arc::new(AtomicUsize::new(0));
        let counter = loads.clone();
        let service = Arc::new(EmbeddingService::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(50));
            Ok(Arc::new(FixedEmbeddingModel(vec![1.0; EMBEDDING_SIZE])) as Arc<dyn EmbeddingModel>)
        }));
        assert!(!service.is_loaded());

        let mut handles = vec![];
        for _ in 0..8 {
            let service = service.clone();
            handles.push(tokio::spawn(async move { service.model().await.map(|_| ()) }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }
        assert_eq!(loads.load(Ordering::SeqCst), 1);
        assert!(service.is_loaded());

        let first = service.model().await.unwrap();
        let second = service.model().await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(loads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failed_load_is_retried() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let counter = attempts.clone();
        let service = EmbeddingService::new(move || {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(RecognitionError::ModelLoad("first attempt".into()))
            } else {
                Ok(Arc::new(FixedEmbeddingModel(vec![0.5; EMBEDDING_SIZE])) as Arc<dyn EmbeddingModel>)
            }
        });

        assert!(matches!(service.model().await, Err(RecognitionError::ModelLoad(_))));
        assert!(!service.is_loaded());
        assert!(service.model().await.is_ok());
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn embed_returns_unit_vector() {
        let service = EmbeddingService::ready(Arc::new(ColorEmbeddingModel));
        assert!(service.is_loaded());
        let face = RgbImage::from_pixel(CANONICAL_SIZE, CANONICAL_SIZE, Rgb([200, 10, 30]));
        let embedding = service.embed(face).await.unwrap();
        assert_eq!(embedding.len(), EMBEDDING_SIZE);
        assert!((norm(&embedding) - 1.0).abs() < 1e-6);
        assert!(embedding[0] > embedding[2] && embedding[2] > embedding[1]);
    }
}
