// Energy-based segmentation
//
// Splits mono PCM into fixed windows (100 ms by default), computes the RMS
// energy of each window normalized to 0.0 - 1.0, and groups contiguous
// above-threshold windows into one segment. Every new segment gets a fresh
// synthetic speaker id: this is voice-activity segmentation, not speaker
// re-identification.

use tracing::debug;

use super::{DiarizationConfig, DiarizationSource, Role, SpeakerIdentifier, SpeakerSegment};

pub struct AcousticDiarizer {
    config: DiarizationConfig,
    next_speaker: usize,
}

impl AcousticDiarizer {
    pub fn new(config: DiarizationConfig) -> Self {
        Self {
            config,
            next_speaker: 0,
        }
    }

    /// Normalized RMS energy of a window
    pub fn window_energy(window: &[i16]) -> f32 {
        if window.is_empty() {
            return 0.0;
        }

        let sum_sq: f64 = window
            .iter()
            .map(|&s| {
                let v = s as f64 / i16::MAX as f64;
                v * v
            })
            .sum();

        ((sum_sq / window.len() as f64).sqrt() as f32).min(1.0)
    }

    fn segment(&mut self, samples: &[i16], sample_rate: u32) -> Vec<SpeakerSegment> {
        let window_len = (sample_rate as u64 * self.config.window_ms as u64 / 1000).max(1) as usize;
        let to_ms = |sample: usize| sample as u64 * 1000 / sample_rate.max(1) as u64;

        let mut segments = Vec::new();
        // (first sample index, energies of the open run)
        let mut open: Option<(usize, Vec<f32>)> = None;

        for (index, window) in samples.chunks(window_len).enumerate() {
            let energy = Self::window_energy(window);
            let start = index * window_len;

            if energy >= self.config.energy_threshold {
                open.get_or_insert_with(|| (start, Vec::new())).1.push(energy);
            } else if let Some((run_start, energies)) = open.take() {
                segments.push(self.close_run(to_ms(run_start), to_ms(start), &energies));
            }
        }

        if let Some((run_start, energies)) = open.take() {
            segments.push(self.close_run(to_ms(run_start), to_ms(samples.len()), &energies));
        }

        segments
    }

    fn close_run(&mut self, start_ms: u64, end_ms: u64, energies: &[f32]) -> SpeakerSegment {
        let mean = energies.iter().sum::<f32>() / energies.len().max(1) as f32;
        let threshold = self.config.energy_threshold.max(f32::EPSILON);
        let speaker_id = format!("speaker_{}", self.next_speaker);
        self.next_speaker += 1;

        SpeakerSegment {
            start_ms,
            end_ms,
            speaker_id,
            role: Role::Unknown,
            // Louder runs relative to the threshold are more certainly speech
            confidence: (mean / (mean + threshold)).clamp(0.0, 1.0),
        }
    }
}

impl SpeakerIdentifier for AcousticDiarizer {
    fn identify_speakers(&mut self, source: DiarizationSource<'_>) -> Vec<SpeakerSegment> {
        match source {
            DiarizationSource::Audio { samples, sample_rate } => {
                let segments = self.segment(samples, sample_rate);
                debug!(
                    "Acoustic diarization: {} samples at {}Hz -> {} segments",
                    samples.len(),
                    sample_rate,
                    segments.len()
                );
                segments
            }
            DiarizationSource::Transcript(_) => Vec::new(),
        }
    }

    fn name(&self) -> &str {
        "acoustic"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tone(len: usize, amplitude: i16) -> Vec<i16> {
        (0..len)
            .map(|i| if i % 2 == 0 { amplitude } else { -amplitude })
            .collect()
    }

    #[test]
    fn test_silence_has_no_segments() {
        let mut d = AcousticDiarizer::new(DiarizationConfig::default());
        let silence = vec![0i16; 16_000];
        let segments = d.identify_speakers(DiarizationSource::Audio {
            samples: &silence,
            sample_rate: 16_000,
        });
        assert!(segments.is_empty());
    }

    #[test]
    fn test_two_bursts_get_distinct_ids() {
        let mut d = AcousticDiarizer::new(DiarizationConfig::default());

        // 300ms speech, 200ms silence, 200ms speech at 16kHz
        let mut samples = tone(4_800, 8_000);
        samples.extend(vec![0i16; 3_200]);
        samples.extend(tone(3_200, 8_000));

        let segments = d.identify_speakers(DiarizationSource::Audio {
            samples: &samples,
            sample_rate: 16_000,
        });

        assert_eq!(segments.len(), 2);
        assert_eq!((segments[0].start_ms, segments[0].end_ms), (0, 300));
        assert_eq!((segments[1].start_ms, segments[1].end_ms), (500, 700));
        assert_ne!(segments[0].speaker_id, segments[1].speaker_id);
        assert!(segments.iter().all(|s| s.confidence > 0.5 && s.confidence <= 1.0));
    }

    #[test]
    fn test_window_energy_bounds() {
        assert_eq!(AcousticDiarizer::window_energy(&[]), 0.0);
        let full = AcousticDiarizer::window_energy(&[i16::MAX, i16::MIN]);
        assert!(full > 0.99 && full <= 1.0);
    }
}
