//! Request-scoped detection pipeline: decode, extract, classify, explain.
//!
//! A [`Pipeline`] holds no per-request state. The classifier is shared behind an
//! `Arc` so one loaded model can serve many concurrent pipelines.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::audio::{AudioDecoder, DecodeError};
use crate::classifier::{Classifier, InferenceError, Label, VoiceClassifier};
use crate::config::DetectorConfig;
use crate::constants::DEFAULT_N_MFCC;
use crate::explainer::Explainer;
use crate::features::{FeatureError, FeatureExtractor};
use crate::tensor::{ModelInput, ShapeError};

fn default_coefficient_count() -> usize {
    DEFAULT_N_MFCC
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectionRequest {
    pub audio_base64: String,
    #[serde(default = "default_coefficient_count")]
    pub feature_coefficient_count: usize,
    /// Caller-supplied language tag, echoed back unchanged.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

impl DetectionRequest {
    #[must_use]
    pub fn new(audio_base64: impl Into<String>) -> Self {
        Self {
            audio_base64: audio_base64.into(),
            feature_coefficient_count: DEFAULT_N_MFCC,
            language: None,
        }
    }

    #[must_use]
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    #[must_use]
    pub fn with_coefficient_count(mut self, n: usize) -> Self {
        self.feature_coefficient_count = n;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionResponse {
    pub classification: Label,
    pub confidence: f32,
    pub explanation: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    pub degraded_model: bool,
    pub explanation_fallback: bool,
}

/// Who is responsible for a failed request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultClass {
    Client,
    Server,
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("audio decoding failed: {0}")]
    Decode(#[from] DecodeError),
    #[error("feature extraction failed: {0}")]
    Features(#[from] FeatureError),
    #[error("feature shaping failed: {0}")]
    Shape(#[from] ShapeError),
    #[error("inference failed: {0}")]
    Inference(#[from] InferenceError),
}

impl PipelineError {
    #[must_use]
    pub fn fault(&self) -> FaultClass {
        match self {
            Self::Decode(_) | Self::Features(_) | Self::Shape(_) => FaultClass::Client,
            Self::Inference(_) => FaultClass::Server,
        }
    }
}

#[derive(Debug)]
pub struct Pipeline<C: ?Sized = Classifier> {
    decoder: AudioDecoder,
    extractor: FeatureExtractor,
    explainer: Explainer,
    classifier: Arc<C>,
}

impl<C: VoiceClassifier + ?Sized> Pipeline<C> {
    #[must_use]
    pub fn new(config: &DetectorConfig, classifier: Arc<C>) -> Self {
        Self {
            decoder: AudioDecoder::new(config.sample_rate_hz)
                .with_max_duration(config.max_duration_secs),
            extractor: FeatureExtractor::default(),
            explainer: Explainer::new(config.explainer),
            classifier,
        }
    }

    #[must_use]
    pub fn classifier(&self) -> &Arc<C> {
        &self.classifier
    }

    pub fn detect(&self, request: &DetectionRequest) -> Result<DetectionResponse, PipelineError> {
        let span = tracing::info_span!(
            "detect",
            payload_len = request.audio_base64.len(),
            n_mfcc = request.feature_coefficient_count,
        );
        let _enter = span.enter();

        let waveform = self.decoder.decode_base64(&request.audio_base64)?;
        tracing::debug!(
            samples = waveform.len(),
            secs = waveform.duration_secs(),
            "decoded audio"
        );

        let features = self
            .extractor
            .extract_with(&waveform, request.feature_coefficient_count)?;

        let input = ModelInput::from_mfcc(features.mfcc())?;
        tracing::debug!(frames = features.n_frames(), "shaped model input");

        let result = self.classifier.classify(&input)?;
        let explanation = self
            .explainer
            .explain(&features, result.label, result.confidence);

        let degraded = self.classifier.is_degraded();
        tracing::info!(
            label = %result.label,
            confidence = result.confidence,
            degraded,
            fallback = explanation.is_fallback,
            "detection complete"
        );

        Ok(DetectionResponse {
            classification: result.label,
            confidence: result.confidence,
            explanation: explanation.text,
            language: request.language.clone(),
            degraded_model: degraded,
            explanation_fallback: explanation.is_fallback,
        })
    }
}
