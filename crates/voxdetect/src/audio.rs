//! Audio decoding.
//!
//! - base64 payload -> container bytes
//! - container decode via symphonia (WAV, MP3, FLAC, OGG/Vorbis, AAC)
//! - downmix to mono, linear resampling to the pipeline rate

use std::io::Cursor;

use base64::{Engine as _, engine::general_purpose::STANDARD};
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{CODEC_TYPE_NULL, DecoderOptions};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use crate::constants::SAMPLE_RATE_HZ;

/// Mono `f32` samples at a known sample rate.
#[derive(Debug, Clone, PartialEq)]
pub struct Waveform {
    samples: Vec<f32>,
    sample_rate_hz: u32,
}

impl Waveform {
    #[must_use]
    pub fn new(samples: Vec<f32>, sample_rate_hz: u32) -> Self {
        Self {
            samples,
            sample_rate_hz,
        }
    }

    #[must_use]
    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    #[must_use]
    pub fn sample_rate_hz(&self) -> u32 {
        self.sample_rate_hz
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    #[must_use]
    pub fn duration_secs(&self) -> f32 {
        if self.sample_rate_hz == 0 {
            return 0.0;
        }
        self.samples.len() as f32 / self.sample_rate_hz as f32
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("payload is not valid base64: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("unrecognized or corrupt audio container: {0}")]
    Container(#[source] SymphoniaError),
    #[error("audio container has no decodable track")]
    NoTrack,
    #[error("audio track has no sample rate")]
    UnknownSampleRate,
    #[error("audio stream contains no samples")]
    Empty,
}

/// Linearly resample `input` from `src_hz` to `dst_hz`.
#[must_use]
pub fn resample_linear_mono_f32(input: &[f32], src_hz: u32, dst_hz: u32) -> Vec<f32> {
    if src_hz == dst_hz || input.is_empty() || src_hz == 0 {
        return input.to_vec();
    }

    let new_n = ((input.len() as u64) * u64::from(dst_hz) / u64::from(src_hz)) as usize;
    let mut out = vec![0.0f32; new_n];

    let step = f64::from(src_hz) / f64::from(dst_hz);
    for (i, y) in out.iter_mut().enumerate() {
        let src_pos = (i as f64) * step;
        let idx = src_pos.floor() as usize;
        let frac = (src_pos - idx as f64) as f32;

        let a = input.get(idx).copied().unwrap_or(0.0);
        let b = input.get(idx + 1).copied().unwrap_or(a);
        *y = a * (1.0 - frac) + b * frac;
    }

    out
}

/// Average interleaved frames down to one channel.
fn push_downmixed(out: &mut Vec<f32>, interleaved: &[f32], channels: usize) {
    if channels <= 1 {
        out.extend_from_slice(interleaved);
        return;
    }
    let scale = 1.0 / channels as f32;
    for frame in interleaved.chunks_exact(channels) {
        out.push(frame.iter().sum::<f32>() * scale);
    }
}

/// Decodes encoded payloads into pipeline-rate mono waveforms.
#[derive(Debug, Clone)]
pub struct AudioDecoder {
    target_rate_hz: u32,
    max_duration_secs: Option<f32>,
}

impl Default for AudioDecoder {
    fn default() -> Self {
        Self::new(SAMPLE_RATE_HZ)
    }
}

impl AudioDecoder {
    #[must_use]
    pub fn new(target_rate_hz: u32) -> Self {
        Self {
            target_rate_hz,
            max_duration_secs: None,
        }
    }

    /// Truncate decoded audio to at most `secs` seconds.
    #[must_use]
    pub fn with_max_duration(mut self, secs: Option<f32>) -> Self {
        self.max_duration_secs = secs.filter(|s| *s > 0.0);
        self
    }

    #[must_use]
    pub fn target_rate_hz(&self) -> u32 {
        self.target_rate_hz
    }

    /// Decode base64 text (surrounding whitespace ignored) into a waveform.
    pub fn decode_base64(&self, payload: &str) -> Result<Waveform, DecodeError> {
        let bytes = STANDARD.decode(payload.trim())?;
        self.decode_bytes(bytes)
    }

    /// Decode raw container bytes into a waveform.
    pub fn decode_bytes(&self, bytes: Vec<u8>) -> Result<Waveform, DecodeError> {
        let (samples, src_hz) = decode_container(bytes)?;
        let mut samples = resample_linear_mono_f32(&samples, src_hz, self.target_rate_hz);

        if let Some(max_secs) = self.max_duration_secs {
            let cap = (max_secs * self.target_rate_hz as f32) as usize;
            if samples.len() > cap {
                tracing::debug!(
                    samples = samples.len(),
                    cap,
                    "truncating audio to max duration"
                );
                samples.truncate(cap);
            }
        }

        if samples.is_empty() {
            return Err(DecodeError::Empty);
        }
        Ok(Waveform::new(samples, self.target_rate_hz))
    }
}

/// Decode the default audio track to mono samples at the file's own rate.
fn decode_container(bytes: Vec<u8>) -> Result<(Vec<f32>, u32), DecodeError> {
    let mss = MediaSourceStream::new(Box::new(Cursor::new(bytes)), Default::default());

    let probed = symphonia::default::get_probe()
        .format(
            &Hint::new(),
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(DecodeError::Container)?;
    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or(DecodeError::NoTrack)?;
    let track_id = track.id;
    let sample_rate_hz = track
        .codec_params
        .sample_rate
        .ok_or(DecodeError::UnknownSampleRate)?;

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(DecodeError::Container)?;

    let mut mono = Vec::new();

    loop {
        let packet = match format.next_packet() {
            Ok(p) => p,
            Err(SymphoniaError::IoError(ref e))
                if e.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break;
            }
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) => return Err(DecodeError::Container(e)),
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(d) => d,
            Err(SymphoniaError::DecodeError(e)) => {
                tracing::warn!("skipping undecodable packet: {e}");
                continue;
            }
            Err(e) => return Err(DecodeError::Container(e)),
        };

        let spec = *decoded.spec();
        let mut sample_buf = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
        sample_buf.copy_interleaved_ref(decoded);
        push_downmixed(&mut mono, sample_buf.samples(), spec.channels.count());
    }

    tracing::debug!(
        samples = mono.len(),
        sample_rate_hz,
        "decoded audio container"
    );
    Ok((mono, sample_rate_hz))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wav_bytes(samples: &[i16], sample_rate_hz: u32, channels: u16) -> Vec<u8> {
        let data_len = (samples.len() * 2) as u32;
        let mut wav = Vec::<u8>::new();
        wav.extend_from_slice(b"RIFF");
        wav.extend_from_slice(&(36u32 + data_len).to_le_bytes());
        wav.extend_from_slice(b"WAVE");

        wav.extend_from_slice(b"fmt ");
        wav.extend_from_slice(&(16u32).to_le_bytes());
        wav.extend_from_slice(&(1u16).to_le_bytes()); // PCM
        wav.extend_from_slice(&channels.to_le_bytes());
        wav.extend_from_slice(&sample_rate_hz.to_le_bytes());
        let block_align = channels * 2;
        wav.extend_from_slice(&(sample_rate_hz * u32::from(block_align)).to_le_bytes());
        wav.extend_from_slice(&block_align.to_le_bytes());
        wav.extend_from_slice(&(16u16).to_le_bytes());

        wav.extend_from_slice(b"data");
        wav.extend_from_slice(&data_len.to_le_bytes());
        for s in samples {
            wav.extend_from_slice(&s.to_le_bytes());
        }
        wav
    }

    #[test]
    fn resample_linear_identity() {
        let x = vec![0.0, 1.0, 2.0, 3.0];
        let y = resample_linear_mono_f32(&x, 22_050, 22_050);
        assert_eq!(x, y);
    }

    #[test]
    fn resample_linear_length() {
        let x = vec![0.0f32; 44_100];
        let y = resample_linear_mono_f32(&x, 44_100, 22_050);
        assert_eq!(y.len(), 22_050);
    }

    #[test]
    fn downmix_averages_channels() {
        let mut out = Vec::new();
        push_downmixed(&mut out, &[1.0, 0.0, 0.5, 0.5, 0.0, 1.0], 2);
        assert_eq!(out, vec![0.5, 0.5, 0.5]);
    }

    #[test]
    fn decodes_stereo_wav_to_mono_at_target_rate() {
        // 0.5s of stereo at 44.1kHz: left = +half scale, right = 0.
        let frames = 22_050usize;
        let mut pcm = Vec::with_capacity(frames * 2);
        for _ in 0..frames {
            pcm.push(16_384i16);
            pcm.push(0i16);
        }
        let wav = wav_bytes(&pcm, 44_100, 2);

        let wf = AudioDecoder::default().decode_bytes(wav).expect("decode wav");
        assert_eq!(wf.sample_rate_hz(), SAMPLE_RATE_HZ);
        assert_eq!(wf.len(), 11_025);
        assert!((wf.samples()[100] - 0.25).abs() < 1e-3);
    }

    #[test]
    fn max_duration_truncates() {
        let wav = wav_bytes(&vec![0i16; 22_050 * 2], 22_050, 1);
        let wf = AudioDecoder::default()
            .with_max_duration(Some(1.0))
            .decode_bytes(wav)
            .expect("decode wav");
        assert_eq!(wf.len(), 22_050);
    }

    #[test]
    fn rejects_malformed_base64() {
        let err = AudioDecoder::default()
            .decode_base64("this is *not* base64!")
            .expect_err("must fail");
        assert!(matches!(err, DecodeError::Base64(_)));
    }

    #[test]
    fn rejects_non_audio_bytes() {
        // "test" in base64.
        let err = AudioDecoder::default()
            .decode_base64("dGVzdA==")
            .expect_err("must fail");
        assert!(matches!(err, DecodeError::Container(_)));
    }

    #[test]
    fn rejects_empty_stream() {
        let wav = wav_bytes(&[], 22_050, 1);
        let err = AudioDecoder::default()
            .decode_bytes(wav)
            .expect_err("must fail");
        assert!(matches!(
            err,
            DecodeError::Empty | DecodeError::Container(_)
        ));
    }
}
