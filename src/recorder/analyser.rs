//! Frequency analysis tapped off the live input.
//!
//! Produces byte frequency snapshots the way a browser analyser node does:
//! Blackman-windowed FFT over the most recent `fft_size` samples, magnitudes
//! smoothed across snapshots, then mapped from a decibel range onto 0-255.
//! The analysis never touches the encoded output.

use rustfft::{num_complex::Complex, Fft, FftPlanner};
use std::collections::VecDeque;
use std::sync::Arc;

use super::error::RecorderError;

/// Analysis parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalyserSettings {
    /// FFT window size; a power of two in 32..=32768
    pub fft_size: usize,
    /// Weight of the previous snapshot when smoothing (0.0-1.0)
    pub smoothing_time_constant: f32,
    /// Level mapped to 0
    pub min_decibels: f32,
    /// Level mapped to 255
    pub max_decibels: f32,
}

impl Default for AnalyserSettings {
    fn default() -> Self {
        Self {
            fft_size: 256,
            smoothing_time_constant: 0.8,
            min_decibels: -100.0,
            max_decibels: -30.0,
        }
    }
}

/// Stateful analysis graph for one recording session.
pub struct AnalysisGraph {
    settings: AnalyserSettings,
    fft: Arc<dyn Fft<f32>>,
    window: Vec<f32>,
    history: VecDeque<f32>,
    smoothed: Vec<f32>,
    closed: bool,
}

impl AnalysisGraph {
    /// Builds the graph, validating the settings.
    ///
    /// # Errors
    /// - If `fft_size` is not a power of two in 32..=32768
    /// - If the decibel range is empty
    /// - If the smoothing constant is outside 0.0-1.0
    pub fn new(settings: AnalyserSettings) -> Result<Self, RecorderError> {
        let n = settings.fft_size;
        if !n.is_power_of_two() || !(32..=32768).contains(&n) {
            return Err(RecorderError::Analysis(format!(
                "fft_size must be a power of two between 32 and 32768, got {n}"
            )));
        }
        if settings.min_decibels >= settings.max_decibels {
            return Err(RecorderError::Analysis(format!(
                "min_decibels ({}) must be below max_decibels ({})",
                settings.min_decibels, settings.max_decibels
            )));
        }
        if !(0.0..=1.0).contains(&settings.smoothing_time_constant) {
            return Err(RecorderError::Analysis(format!(
                "smoothing_time_constant must be within 0.0-1.0, got {}",
                settings.smoothing_time_constant
            )));
        }

        let fft = FftPlanner::new().plan_fft_forward(n);
        let window = blackman_window(n);

        Ok(Self {
            fft,
            window,
            history: VecDeque::with_capacity(n),
            smoothed: vec![0.0; n / 2],
            closed: false,
            settings,
        })
    }

    /// Number of values in each snapshot (half the FFT size).
    pub fn frequency_bin_count(&self) -> usize {
        self.settings.fft_size / 2
    }

    /// Feeds mono samples from the live stream, keeping only the newest window.
    pub fn feed(&mut self, frames: &[f32]) {
        if self.closed {
            return;
        }
        let n = self.settings.fft_size;
        let skip = frames.len().saturating_sub(n);
        for &sample in &frames[skip..] {
            if self.history.len() == n {
                self.history.pop_front();
            }
            self.history.push_back(sample);
        }
    }

    /// Takes one snapshot of byte frequency magnitudes.
    pub fn byte_frequency_data(&mut self) -> Vec<u8> {
        let n = self.settings.fft_size;
        let bins = self.frequency_bin_count();
        if self.closed {
            return vec![0; bins];
        }

        // Zero-pad at the front until a full window has been captured
        let padding = n - self.history.len();
        let mut buffer: Vec<Complex<f32>> = std::iter::repeat(0.0)
            .take(padding)
            .chain(self.history.iter().copied())
            .zip(self.window.iter())
            .map(|(s, w)| Complex::new(s * w, 0.0))
            .collect();

        self.fft.process(&mut buffer);

        let tau = self.settings.smoothing_time_constant;
        let range = self.settings.max_decibels - self.settings.min_decibels;

        buffer[..bins]
            .iter()
            .zip(self.smoothed.iter_mut())
            .map(|(value, previous)| {
                let magnitude = value.norm() / n as f32;
                *previous = tau * *previous + (1.0 - tau) * magnitude;

                if *previous <= 0.0 {
                    return 0;
                }
                let db = 20.0 * previous.log10();
                let scaled = 255.0 * (db - self.settings.min_decibels) / range;
                scaled.clamp(0.0, 255.0) as u8
            })
            .collect()
    }

    /// Disconnects the graph and drops its buffers.
    ///
    /// # Errors
    /// - If the graph was already closed
    pub fn close(&mut self) -> anyhow::Result<()> {
        if self.closed {
            return Err(anyhow::anyhow!("analysis graph already closed"));
        }
        self.closed = true;
        self.history = VecDeque::new();
        self.smoothed.iter_mut().for_each(|v| *v = 0.0);
        Ok(())
    }
}

fn blackman_window(n: usize) -> Vec<f32> {
    let (a0, a1, a2) = (0.42, 0.5, 0.08);
    (0..n)
        .map(|i| {
            let x = 2.0 * std::f32::consts::PI * i as f32 / n as f32;
            a0 - a1 * x.cos() + a2 * (2.0 * x).cos()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(freq: f32, sample_rate: f32, len: usize, amplitude: f32) -> Vec<f32> {
        (0..len)
            .map(|i| amplitude * (2.0 * std::f32::consts::PI * freq * i as f32 / sample_rate).sin())
            .collect()
    }

    #[test]
    fn test_default_has_128_bins() {
        let graph = AnalysisGraph::new(AnalyserSettings::default()).unwrap();
        assert_eq!(graph.frequency_bin_count(), 128);
    }

    #[test]
    fn test_rejects_invalid_settings() {
        let bad_size = AnalyserSettings {
            fft_size: 300,
            ..AnalyserSettings::default()
        };
        assert!(matches!(
            AnalysisGraph::new(bad_size),
            Err(RecorderError::Analysis(_))
        ));

        let bad_range = AnalyserSettings {
            min_decibels: -30.0,
            max_decibels: -100.0,
            ..AnalyserSettings::default()
        };
        assert!(AnalysisGraph::new(bad_range).is_err());

        let bad_smoothing = AnalyserSettings {
            smoothing_time_constant: 1.5,
            ..AnalyserSettings::default()
        };
        assert!(AnalysisGraph::new(bad_smoothing).is_err());
    }

    #[test]
    fn test_silence_is_all_zero() {
        let mut graph = AnalysisGraph::new(AnalyserSettings::default()).unwrap();
        assert!(graph.byte_frequency_data().iter().all(|&v| v == 0));
        graph.feed(&vec![0.0; 512]);
        assert!(graph.byte_frequency_data().iter().all(|&v| v == 0));
    }

    #[test]
    fn test_tone_peaks_at_its_bin() {
        let mut graph = AnalysisGraph::new(AnalyserSettings::default()).unwrap();
        // 8 kHz / 256 = 31.25 Hz per bin, so 1 kHz lands in bin 32.
        graph.feed(&sine(1000.0, 8000.0, 256, 0.5));
        let data = graph.byte_frequency_data();

        let (peak_bin, peak) = data
            .iter()
            .enumerate()
            .max_by_key(|&(_, v)| *v)
            .unwrap();
        assert_eq!(peak_bin, 32);
        assert!(*peak > 100);
    }

    #[test]
    fn test_smoothing_decays_after_signal_stops() {
        let mut graph = AnalysisGraph::new(AnalyserSettings::default()).unwrap();
        graph.feed(&sine(1000.0, 8000.0, 256, 0.5));
        let loud = graph.byte_frequency_data()[32];

        graph.feed(&vec![0.0; 256]);
        let fading = graph.byte_frequency_data()[32];
        let faded = graph.byte_frequency_data()[32];

        assert!(fading < loud);
        assert!(faded < fading);
    }

    #[test]
    fn test_feed_keeps_only_latest_window() {
        let mut graph = AnalysisGraph::new(AnalyserSettings {
            smoothing_time_constant: 0.0,
            ..AnalyserSettings::default()
        })
        .unwrap();
        graph.feed(&sine(1000.0, 8000.0, 4096, 0.5));
        graph.feed(&vec![0.0; 256]);
        assert!(graph.byte_frequency_data().iter().all(|&v| v == 0));
    }

    #[test]
    fn test_close_is_reported_once() {
        let mut graph = AnalysisGraph::new(AnalyserSettings::default()).unwrap();
        graph.feed(&sine(1000.0, 8000.0, 256, 0.5));
        assert!(graph.close().is_ok());
        assert!(graph.close().is_err());
        assert!(graph.byte_frequency_data().iter().all(|&v| v == 0));
    }
}
