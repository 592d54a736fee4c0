//! Human-readable justification of a classification from acoustic features.
//!
//! The explainer never changes the label. It picks the acoustic findings that
//! agree with the label and composes at most two of them into one sentence.

use serde::{Deserialize, Serialize};

use crate::classifier::Label;
use crate::features::FeatureBundle;
use crate::math::variance_f64;

pub const AI_FALLBACK: &str = "Multiple AI-generated voice indicators detected in audio patterns";
pub const HUMAN_FALLBACK: &str = "Multiple human voice characteristics detected in speech patterns";

/// Decision boundaries for each acoustic signal.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExplainerThresholds {
    /// Pitch std (Hz) below which pitch reads as synthetic.
    pub pitch_std_ai_below: f32,
    /// Pitch std (Hz) above which pitch reads as human.
    pub pitch_std_human_above: f32,
    /// Centroid variance (Hz^2) splitting robotic from natural timbre.
    pub centroid_var_split: f32,
    pub tempo_ai_below: f32,
    pub tempo_human_above: f32,
    /// Zero-crossing pause measure splitting missing from present micro-pauses.
    pub pause_split: f32,
}

impl Default for ExplainerThresholds {
    fn default() -> Self {
        Self {
            pitch_std_ai_below: 20.0,
            pitch_std_human_above: 80.0,
            centroid_var_split: 100_000.0,
            tempo_ai_below: 80.0,
            tempo_human_above: 140.0,
            pause_split: 0.05,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    Pitch,
    Spectral,
    Pause,
    Prosody,
}

impl Signal {
    fn verb(self) -> &'static str {
        match self {
            Self::Pitch => "Detected",
            Self::Spectral => "Found",
            Self::Pause => "Observed",
            Self::Prosody => "Identified",
        }
    }
}

/// One signal's verdict: which label it supports and how to say so.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Finding {
    pub signal: Signal,
    pub supports: Label,
    pub phrase: &'static str,
}

impl Finding {
    fn sentence(&self) -> String {
        format!("{} {}", self.signal.verb(), self.phrase)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Explanation {
    pub text: String,
    /// Set when no finding agreed with the label.
    pub is_fallback: bool,
}

/// Normalized zero-crossing count: `sum |sign(x[i+1]) - sign(x[i])| / (2 * len)`.
#[must_use]
pub fn pause_measure(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sign = |v: f32| -> f32 {
        if v > 0.0 {
            1.0
        } else if v < 0.0 {
            -1.0
        } else {
            0.0
        }
    };
    let crossings: f64 = samples
        .windows(2)
        .map(|w| f64::from((sign(w[1]) - sign(w[0])).abs()))
        .sum();
    (crossings / (2.0 * samples.len() as f64)) as f32
}

#[derive(Debug, Clone, Default)]
pub struct Explainer {
    thresholds: ExplainerThresholds,
}

impl Explainer {
    #[must_use]
    pub fn new(thresholds: ExplainerThresholds) -> Self {
        Self { thresholds }
    }

    #[must_use]
    pub fn thresholds(&self) -> &ExplainerThresholds {
        &self.thresholds
    }

    pub fn pitch_finding(&self, pitch_std: f32) -> Option<Finding> {
        let t = &self.thresholds;
        let (supports, phrase) = if pitch_std < t.pitch_std_ai_below {
            (Label::AiGenerated, "unnatural pitch consistency typical of AI synthesis")
        } else if pitch_std > t.pitch_std_human_above {
            (Label::Human, "natural pitch variation expected in human speech")
        } else {
            return None;
        };
        Some(Finding {
            signal: Signal::Pitch,
            supports,
            phrase,
        })
    }

    pub fn spectral_finding(&self, centroid_var: f32) -> Finding {
        let (supports, phrase) = if centroid_var < self.thresholds.centroid_var_split {
            (Label::AiGenerated, "robotic spectral artifacts in frequency distribution")
        } else {
            (Label::Human, "natural spectral variation in voice timbre")
        };
        Finding {
            signal: Signal::Spectral,
            supports,
            phrase,
        }
    }

    pub fn pause_finding(&self, measure: f32) -> Finding {
        let (supports, phrase) = if measure < self.thresholds.pause_split {
            (Label::AiGenerated, "lack of natural micro-pauses between words")
        } else {
            (Label::Human, "natural breathing patterns and micro-pauses detected")
        };
        Finding {
            signal: Signal::Pause,
            supports,
            phrase,
        }
    }

    pub fn prosody_finding(&self, tempo: f32) -> Option<Finding> {
        let t = &self.thresholds;
        let (supports, phrase) = if tempo > 0.0 && tempo < t.tempo_ai_below {
            (Label::AiGenerated, "synthetic prosody with regular tempo patterns")
        } else if tempo > t.tempo_human_above {
            (Label::Human, "natural prosodic rhythm")
        } else {
            return None;
        };
        Some(Finding {
            signal: Signal::Prosody,
            supports,
            phrase,
        })
    }

    /// All findings in reporting order, regardless of label.
    #[must_use]
    pub fn findings(&self, features: &FeatureBundle) -> Vec<Finding> {
        let centroid_var = variance_f64(features.spectral_centroid()) as f32;
        let samples = features.waveform().samples();

        let mut out = Vec::with_capacity(4);
        out.extend(self.pitch_finding(features.pitch_std()));
        out.push(self.spectral_finding(centroid_var));
        if !samples.is_empty() {
            out.push(self.pause_finding(pause_measure(samples)));
        }
        out.extend(self.prosody_finding(features.tempo()));
        out
    }

    #[must_use]
    pub fn explain(&self, features: &FeatureBundle, label: Label, confidence: f32) -> Explanation {
        let agreeing: Vec<Finding> = self
            .findings(features)
            .into_iter()
            .filter(|f| f.supports == label)
            .collect();

        let Some(first) = agreeing.first() else {
            tracing::info!(
                %label,
                confidence,
                "no acoustic finding agrees with the classifier, using fallback explanation"
            );
            let text = match label {
                Label::AiGenerated => AI_FALLBACK,
                Label::Human => HUMAN_FALLBACK,
            };
            return Explanation {
                text: text.to_string(),
                is_fallback: true,
            };
        };

        let mut text = first.sentence();
        if let Some(second) = agreeing.get(1) {
            text.push_str(" and ");
            text.push_str(&lowercase_first(&second.sentence()));
        }

        Explanation {
            text: uppercase_first(&text),
            is_fallback: false,
        }
    }
}

fn uppercase_first(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) => c.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn lowercase_first(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) => c.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}
