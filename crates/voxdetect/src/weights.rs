//! Safetensors-backed classifier weight storage.
//!
//! Artifacts use PyTorch state-dict naming (`conv1.weight`, `bn1.running_var`, ...)
//! and carry training metadata (`epoch`, `loss`) in the safetensors header.

use std::borrow::Cow;
use std::collections::HashMap;
use std::path::Path;

use memmap2::MmapOptions;
use safetensors::tensor::{Dtype, SafeTensorError, View, serialize_to_file};
use thiserror::Error;

#[derive(Debug, Clone)]
pub struct TensorF32 {
    pub shape: Vec<usize>,
    pub data: Vec<f32>,
}

impl View for &TensorF32 {
    fn dtype(&self) -> Dtype {
        Dtype::F32
    }

    fn shape(&self) -> &[usize] {
        &self.shape
    }

    fn data(&self) -> Cow<'_, [u8]> {
        let mut bytes = Vec::with_capacity(self.data.len() * 4);
        for v in &self.data {
            bytes.extend_from_slice(&v.to_le_bytes());
        }
        Cow::Owned(bytes)
    }

    fn data_len(&self) -> usize {
        self.data.len() * 4
    }
}

/// Training provenance recorded alongside the tensors.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TrainingMetadata {
    pub epoch: Option<u32>,
    pub loss: Option<f32>,
}

impl TrainingMetadata {
    fn from_header(map: Option<&HashMap<String, String>>) -> Self {
        let Some(map) = map else {
            return Self::default();
        };
        Self {
            epoch: map.get("epoch").and_then(|v| v.trim().parse().ok()),
            loss: map.get("loss").and_then(|v| v.trim().parse().ok()),
        }
    }

    fn to_header(self) -> Option<HashMap<String, String>> {
        let mut map = HashMap::new();
        if let Some(epoch) = self.epoch {
            map.insert("epoch".to_string(), epoch.to_string());
        }
        if let Some(loss) = self.loss {
            map.insert("loss".to_string(), loss.to_string());
        }
        (!map.is_empty()).then_some(map)
    }
}

#[derive(Debug)]
pub struct WeightStore {
    mmap: memmap2::Mmap,
}

#[derive(Debug, Error)]
pub enum WeightError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("safetensors error: {0}")]
    SafeTensors(#[from] SafeTensorError),
    #[error("unsupported dtype for {name}: {dtype:?}")]
    UnsupportedDtype { name: String, dtype: Dtype },
    #[error("invalid tensor byte length for {name}: got {bytes}, expected multiple of {elem_size}")]
    InvalidByteLen {
        name: String,
        bytes: usize,
        elem_size: usize,
    },
    #[error("tensor {name} has shape {got:?}, expected {expected:?}")]
    ShapeMismatch {
        name: String,
        expected: Vec<usize>,
        got: Vec<usize>,
    },
}

impl WeightStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, WeightError> {
        let file = std::fs::File::open(path)?;
        // SAFETY: read-only file mapping for immutable tensor access.
        let mmap = unsafe { MmapOptions::new().map(&file)? };
        // Reject non-safetensors files up front rather than on first tensor access.
        safetensors::SafeTensors::read_metadata(&mmap)?;
        Ok(Self { mmap })
    }

    pub fn names(&self) -> Result<Vec<String>, WeightError> {
        let st = safetensors::SafeTensors::deserialize(&self.mmap)?;
        let mut names: Vec<String> = st.iter().map(|(name, _)| name.to_string()).collect();
        names.sort();
        Ok(names)
    }

    pub fn metadata(&self) -> Result<TrainingMetadata, WeightError> {
        let (_, meta) = safetensors::SafeTensors::read_metadata(&self.mmap)?;
        Ok(TrainingMetadata::from_header(meta.metadata().as_ref()))
    }

    pub fn tensor_f32(&self, name: &str) -> Result<TensorF32, WeightError> {
        let st = safetensors::SafeTensors::deserialize(&self.mmap)?;
        let tv = st.tensor(name)?;
        let dtype = tv.dtype();
        let shape = tv.shape().to_vec();
        let raw = tv.data();

        let data = match dtype {
            Dtype::F32 => {
                if raw.len() % 4 != 0 {
                    return Err(WeightError::InvalidByteLen {
                        name: name.to_string(),
                        bytes: raw.len(),
                        elem_size: 4,
                    });
                }
                raw.chunks_exact(4)
                    .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
                    .collect()
            }
            Dtype::BF16 => {
                if raw.len() % 2 != 0 {
                    return Err(WeightError::InvalidByteLen {
                        name: name.to_string(),
                        bytes: raw.len(),
                        elem_size: 2,
                    });
                }
                raw.chunks_exact(2)
                    .map(|c| {
                        let bits = u16::from_le_bytes([c[0], c[1]]) as u32;
                        f32::from_bits(bits << 16)
                    })
                    .collect()
            }
            other => {
                return Err(WeightError::UnsupportedDtype {
                    name: name.to_string(),
                    dtype: other,
                });
            }
        };

        Ok(TensorF32 { shape, data })
    }

    /// Load a tensor and require an exact shape.
    pub fn tensor_f32_shaped(&self, name: &str, expected: &[usize]) -> Result<Vec<f32>, WeightError> {
        let t = self.tensor_f32(name)?;
        if t.shape != expected {
            return Err(WeightError::ShapeMismatch {
                name: name.to_string(),
                expected: expected.to_vec(),
                got: t.shape,
            });
        }
        Ok(t.data)
    }
}

/// Write named f32 tensors plus training metadata as a safetensors file.
pub fn save_f32_tensors(
    path: impl AsRef<Path>,
    tensors: &[(String, TensorF32)],
    meta: TrainingMetadata,
) -> Result<(), WeightError> {
    let views = tensors.iter().map(|(name, t)| (name.as_str(), t));
    serialize_to_file(views, &meta.to_header(), path.as_ref())?;
    Ok(())
}
