//! AI-generated vs human speech detection.
//!
//! This crate provides:
//! - Audio decoding (base64 container payload -> 22.05kHz mono waveform)
//! - Acoustic feature extraction (MFCC, spectral shape, pitch, tempo)
//! - A small 1D CNN classifier over fixed-shape MFCC input
//! - Rule-based explanations and a request-scoped pipeline tying it together

pub mod audio;
pub mod classifier;
pub mod config;
pub mod constants;
pub mod conv;
pub mod explainer;
pub mod features;
pub mod math;
pub mod mel;
pub mod model;
pub mod ops;
pub mod pipeline;
pub mod pitch;
pub mod spectral;
pub mod stft;
pub mod tempo;
pub mod tensor;
pub mod weights;

pub use audio::{AudioDecoder, DecodeError, Waveform};
pub use classifier::{
    ClassificationResult, Classifier, InferenceError, Label, VoiceClassifier, WeightSource,
};
pub use config::DetectorConfig;
pub use explainer::{Explainer, ExplainerThresholds, Explanation};
pub use features::{FeatureBundle, FeatureError, FeatureExtractor};
pub use pipeline::{DetectionRequest, DetectionResponse, FaultClass, Pipeline, PipelineError};
pub use tensor::{FeatureMatrix, ModelInput, ShapeError};
