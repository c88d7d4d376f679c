// SPDX-License-Identifier: MIT

//! Multi-channel sequence composition and alignment.
//!
//! Registered pulses are folded into one pulse tree per channel, all
//! channels are aligned to a common sample window that covers every trigger
//! marker, the window length is padded to the hardware's 16-sample DMA
//! granularity, and the rendered buffers are clamped to the output range.

use sweep_expr::{Expr, Number, ParameterStore};

use crate::config::{Configuration, PhaseAlignment};
use crate::pulse::Pulse;
use crate::{Error, Result, SampleIndex};

/// Fixed margin around each trigger position that the rendered window must
/// cover, in samples.
const TRIGGER_MARGIN: i64 = 100;

/// Hardware DMA chunking: buffer lengths must be a multiple of this.
pub const SAMPLE_MULTIPLE: i64 = 16;

/// Default marker pulse width: 50 ns at the default 2.4 GS/s.
const DEFAULT_MARKER_WIDTH: i64 = 120;

/// Default repetition period: 100 us at the default 2.4 GS/s.
const DEFAULT_PERIOD: i64 = 240_000;

const DEFAULT_REPETITIONS: i64 = 1000;

#[derive(Debug, Clone)]
pub struct Registration {
    pub position: Expr,
    pub pulse: Pulse,
    pub carrier: Pulse,
}

/// Output of a sequence render.
///
/// All channel buffers and the marker share the same length, which is a
/// multiple of [`SAMPLE_MULTIPLE`]; `left`/`right` are the absolute sample
/// indices of the window (half-open).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Rendered {
    pub left: SampleIndex,
    pub right: SampleIndex,
    pub channels: Vec<Vec<f64>>,
    pub marker: Vec<f64>,
}

impl Rendered {
    pub fn length(&self) -> usize {
        (self.right - self.left).max(0) as usize
    }
}

#[derive(Debug, Clone)]
pub struct Sequence {
    channels: Vec<Vec<Registration>>,
    trigger_positions: Vec<Expr>,
    marker_width: Expr,
    period: Expr,
    repetitions: Expr,
    params: ParameterStore,
    config: Configuration,
    config_version_seen: u64,
    dirty: bool,
    cache: Rendered,
}

impl Sequence {
    pub fn new(n_channels: usize, config: Configuration) -> Result<Self> {
        if n_channels == 0 {
            return Err(Error::InvalidConfiguration(
                "a sequence needs at least one channel".into(),
            ));
        }
        let config_version_seen = config.version();
        Ok(Self {
            channels: vec![Vec::new(); n_channels],
            trigger_positions: vec![Expr::zero()],
            marker_width: Expr::from(DEFAULT_MARKER_WIDTH),
            period: Expr::from(DEFAULT_PERIOD),
            repetitions: Expr::from(DEFAULT_REPETITIONS),
            params: ParameterStore::new(),
            config,
            config_version_seen,
            dirty: true,
            cache: Rendered::default(),
        })
    }

    pub fn n_channels(&self) -> usize {
        self.channels.len()
    }

    pub fn configuration(&self) -> &Configuration {
        &self.config
    }

    /// Mutable access to the configuration. Changes are picked up through
    /// the configuration's version counter on the next render.
    pub fn configuration_mut(&mut self) -> &mut Configuration {
        &mut self.config
    }

    pub(crate) fn registrations(&self, channel: usize) -> &[Registration] {
        &self.channels[channel]
    }

    pub fn trigger_positions(&self) -> &[Expr] {
        &self.trigger_positions
    }

    pub fn marker_width(&self) -> &Expr {
        &self.marker_width
    }

    pub fn period(&self) -> &Expr {
        &self.period
    }

    pub fn repetitions(&self) -> &Expr {
        &self.repetitions
    }

    /// Resolved repetition period in samples.
    pub fn period_samples(&self) -> u64 {
        self.params.resolve_f64(&self.period).max(0.0).round() as u64
    }

    /// Resolved repetition count; `None` means repeat indefinitely.
    pub fn repetition_count(&self) -> Option<u64> {
        let count = self.params.resolve_f64(&self.repetitions);
        if count < 0.0 {
            None
        } else {
            Some(count.round() as u64)
        }
    }

    /// Register a pulse at `position` (samples).
    ///
    /// The carrier is given either directly or as a `(frequency, phase)`
    /// pair from which one is built; providing neither is an error. Without
    /// an explicit channel the registration is broadcast to every channel.
    pub fn register(
        &mut self,
        position: impl Into<Expr>,
        pulse: Pulse,
        carrier: Option<Pulse>,
        tone: Option<(Expr, Expr)>,
        channel: Option<usize>,
    ) -> Result<()> {
        let carrier = match (carrier, tone) {
            (Some(carrier), _) => carrier,
            (None, Some((frequency, phase))) => Pulse::carrier_tone(frequency, phase),
            (None, None) => return Err(Error::MissingCarrier),
        };
        let registration = Registration {
            position: position.into(),
            pulse,
            carrier,
        };
        match channel {
            Some(index) => {
                let n_channels = self.channels.len();
                let channel = self
                    .channels
                    .get_mut(index)
                    .ok_or(Error::ChannelOutOfRange { index, n_channels })?;
                channel.push(registration);
            }
            None => {
                for channel in &mut self.channels {
                    channel.push(registration.clone());
                }
            }
        }
        self.dirty = true;
        Ok(())
    }

    /// Bind a sweep parameter; propagated into every pulse tree on render.
    pub fn bind<N: Into<Number>>(&mut self, name: &str, value: N) {
        self.params.bind(name, value);
        self.dirty = true;
    }

    pub fn parameters(&self) -> &ParameterStore {
        &self.params
    }

    pub fn set_trigger_positions(&mut self, positions: Vec<Expr>) -> Result<()> {
        if positions.is_empty() {
            return Err(Error::InvalidConfiguration(
                "at least one trigger position is required".into(),
            ));
        }
        self.trigger_positions = positions;
        self.dirty = true;
        Ok(())
    }

    pub fn set_marker_width(&mut self, width: impl Into<Expr>) {
        self.marker_width = width.into();
        self.dirty = true;
    }

    pub fn set_period(&mut self, period: impl Into<Expr>) {
        self.period = period.into();
        self.dirty = true;
    }

    pub fn set_repetitions(&mut self, repetitions: impl Into<Expr>) {
        self.repetitions = repetitions.into();
        self.dirty = true;
    }

    pub fn set_sample_rate(&mut self, sample_rate: f64) -> Result<()> {
        self.config.set_sample_rate(sample_rate)?;
        self.dirty = true;
        Ok(())
    }

    pub fn set_configuration(&mut self, config: Configuration) {
        self.config = config;
        self.dirty = true;
    }

    /// Whether the memoized render is out of date.
    pub fn is_stale(&self) -> bool {
        self.dirty || self.config_version_seen != self.config.version()
    }

    /// Rendered waveforms, recomputed only when stale.
    pub fn waveforms(&mut self) -> Result<&Rendered> {
        if self.is_stale() {
            self.cache = self.render()?;
            self.dirty = false;
            self.config_version_seen = self.config.version();
        }
        Ok(&self.cache)
    }

    /// Number of samples per channel in the rendered window.
    pub fn length(&mut self) -> Result<usize> {
        Ok(self.waveforms()?.length())
    }

    fn render(&self) -> Result<Rendered> {
        let sample_rate = self.config.sample_rate();

        // Re-center all positions around the primary trigger unless phases
        // are referenced to zero.
        let offset = match self.config.phase_alignment() {
            PhaseAlignment::Zero => 0.0,
            PhaseAlignment::Trigger => self
                .trigger_positions
                .first()
                .map(|t| self.params.resolve_f64(t))
                .unwrap_or(0.0),
        };

        // One pulse tree per channel, with all pending bindings applied
        // before any bound is read.
        let mut trees = Vec::with_capacity(self.channels.len());
        for channel in &self.channels {
            let mut tree = Pulse::empty();
            for registration in channel {
                let shift = self.params.resolve_f64(&registration.position) - offset;
                tree = tree + registration.carrier.clone() * registration.pulse.shift(shift);
            }
            tree.bind_store(&self.params);
            trees.push(tree);
        }

        // Unified window over all channels.
        let mut left = f64::INFINITY;
        let mut right = f64::NEG_INFINITY;
        for tree in &trees {
            left = left.min(tree.left_samples());
            right = right.max(tree.right_samples());
        }

        // The window must cover every trigger marker and its margin.
        let delay = self.config.trigger_delay() as f64;
        let marker_width = self.params.resolve_f64(&self.marker_width).max(0.0);
        for trigger in &self.trigger_positions {
            let tp = self.params.resolve_f64(trigger) - offset - delay;
            left = left.min(tp - TRIGGER_MARGIN as f64);
            right = right.max(tp + TRIGGER_MARGIN as f64).max(tp + marker_width);
        }

        let left = left.round() as i64;
        let mut right = right.round() as i64;
        // Pad to the DMA chunk size.
        right += (left - right).rem_euclid(SAMPLE_MULTIPLE);
        let window = left..right;
        let length = (right - left) as usize;

        log::debug!(
            "rendering {} channel(s) over [{left}, {right}) ({length} samples)",
            trees.len(),
        );

        let mut clamped = 0usize;
        let channels: Vec<Vec<f64>> = trees
            .iter()
            .map(|tree| {
                tree.render(&window, sample_rate)
                    .into_iter()
                    .map(|v| {
                        let c = clamp_sample(v);
                        if c != v {
                            clamped += 1;
                        }
                        c
                    })
                    .collect()
            })
            .collect();
        if clamped > 0 {
            log::warn!("clamped {clamped} sample(s) to the [-1, 1] output range");
        }

        // Marker buffer: one rectangle per trigger position, no merging.
        let mut marker = vec![0.0; length];
        for trigger in &self.trigger_positions {
            let tp = self.params.resolve_f64(trigger) - offset - delay;
            let start = tp.round() as i64 - left;
            let end = start + marker_width.round() as i64;
            for index in start.max(0)..end.min(length as i64) {
                marker[index as usize] = 1.0;
            }
        }

        let origin = offset.round() as i64;
        Ok(Rendered {
            left: left + origin,
            right: right + origin,
            channels,
            marker,
        })
    }
}

/// Clamp one sample to the hardware output range. Idempotent; out-of-range
/// values are truncated, never an error.
pub fn clamp_sample(value: f64) -> f64 {
    value.clamp(-1.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn single_channel() -> Sequence {
        Sequence::new(1, Configuration::default()).unwrap()
    }

    #[test]
    fn test_zero_channels_rejected() {
        assert!(matches!(
            Sequence::new(0, Configuration::default()),
            Err(Error::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_register_requires_carrier_information() {
        let mut seq = single_channel();
        let result = seq.register(0, Pulse::rect(10), None, None, None);
        assert!(matches!(result, Err(Error::MissingCarrier)));

        let result = seq.register(
            0,
            Pulse::rect(10),
            None,
            Some((Expr::from(0.0), Expr::from(0.0))),
            None,
        );
        assert!(result.is_ok());
    }

    #[test]
    fn test_register_channel_out_of_range() {
        let mut seq = single_channel();
        let result = seq.register(
            0,
            Pulse::rect(10),
            Some(Pulse::carrier_tone(0.0, 0.0)),
            None,
            Some(3),
        );
        assert!(matches!(
            result,
            Err(Error::ChannelOutOfRange { index: 3, n_channels: 1 })
        ));
    }

    #[test]
    fn test_gaussian_trigger_scenario() {
        // Gaussian(width=100) at position 0, trigger at 0, default
        // configuration (2.4 GS/s, trigger alignment).
        let mut seq = single_channel();
        seq.register(0, Pulse::gaussian(100), Some(Pulse::carrier_tone(0.0, 0.0)), None, None)
            .unwrap();
        let rendered = seq.waveforms().unwrap().clone();

        assert!(rendered.left <= 0 && 0 < rendered.right);
        assert_eq!(rendered.length() as i64 % SAMPLE_MULTIPLE, 0);
        assert_eq!(rendered.channels.len(), 1);
        assert_eq!(rendered.channels[0].len(), rendered.length());
        assert_eq!(rendered.marker.len(), rendered.length());

        let peak = rendered.channels[0]
            .iter()
            .cloned()
            .fold(f64::MIN, f64::max);
        assert!((peak - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_channels_share_one_window() {
        let mut seq = Sequence::new(2, Configuration::default()).unwrap();
        let carrier = Pulse::carrier_tone(0.0, 0.0);
        seq.register(0, Pulse::rect(10), Some(carrier.clone()), None, Some(0))
            .unwrap();
        seq.register(500, Pulse::rect(30), Some(carrier), None, Some(1))
            .unwrap();
        let rendered = seq.waveforms().unwrap();
        assert_eq!(rendered.channels[0].len(), rendered.channels[1].len());
        assert_eq!(rendered.length() as i64 % SAMPLE_MULTIPLE, 0);
    }

    #[test]
    fn test_clamping_is_applied_and_idempotent() {
        let mut seq = single_channel();
        seq.register(
            0,
            Pulse::rect(10) * 3.0,
            Some(Pulse::carrier_tone(0.0, 0.0)),
            None,
            None,
        )
        .unwrap();
        let rendered = seq.waveforms().unwrap();
        let peak = rendered.channels[0]
            .iter()
            .cloned()
            .fold(f64::MIN, f64::max);
        assert_eq!(peak, 1.0);

        for v in [-5.0, -1.0, 0.3, 1.0, 7.5] {
            assert_eq!(clamp_sample(clamp_sample(v)), clamp_sample(v));
        }
    }

    #[test]
    fn test_marker_waveform() {
        let mut seq = single_channel();
        seq.set_marker_width(8);
        seq.register(0, Pulse::rect(16), Some(Pulse::carrier_tone(0.0, 0.0)), None, None)
            .unwrap();
        let rendered = seq.waveforms().unwrap().clone();
        // Trigger alignment: the trigger sits at recentered position 0.
        let ones: usize = rendered.marker.iter().filter(|v| **v == 1.0).count();
        assert_eq!(ones, 8);
        let start = (-rendered.left) as usize;
        assert_eq!(rendered.marker[start], 1.0);
        assert_eq!(rendered.marker[start + 8], 0.0);
    }

    #[test]
    fn test_multiple_trigger_positions_contribute_independently() {
        let mut seq = single_channel();
        seq.set_marker_width(4);
        seq.set_trigger_positions(vec![Expr::zero(), Expr::from(40)])
            .unwrap();
        seq.register(0, Pulse::rect(16), Some(Pulse::carrier_tone(0.0, 0.0)), None, None)
            .unwrap();
        let rendered = seq.waveforms().unwrap();
        let ones: usize = rendered.marker.iter().filter(|v| **v == 1.0).count();
        assert_eq!(ones, 8);
    }

    #[test]
    fn test_memoization_and_invalidation() {
        let mut seq = single_channel();
        seq.register(
            0,
            Pulse::rect(Expr::param("w")),
            Some(Pulse::carrier_tone(0.0, 0.0)),
            None,
            None,
        )
        .unwrap();
        assert!(seq.is_stale());
        let first = seq.waveforms().unwrap().clone();
        assert!(!seq.is_stale());

        // Binding a parameter through the sequence invalidates the memo.
        seq.bind("w", 400);
        assert!(seq.is_stale());
        let second = seq.waveforms().unwrap().clone();
        assert!(second.length() > first.length());

        // Sample-rate changes invalidate too.
        seq.set_sample_rate(1.8e9).unwrap();
        assert!(seq.is_stale());

        // As do configuration edits made through the version counter.
        let _ = seq.waveforms().unwrap();
        assert!(!seq.is_stale());
        seq.configuration_mut()
            .set_phase_alignment(PhaseAlignment::Zero);
        assert!(seq.is_stale());
    }

    #[test]
    fn test_unbound_parameter_defaults_to_zero() {
        let mut with_default = single_channel();
        with_default
            .register(
                Expr::param("pos"),
                Pulse::rect(10),
                Some(Pulse::carrier_tone(0.0, 0.0)),
                None,
                None,
            )
            .unwrap();

        let mut with_explicit = single_channel();
        with_explicit
            .register(
                Expr::param("pos"),
                Pulse::rect(10),
                Some(Pulse::carrier_tone(0.0, 0.0)),
                None,
                None,
            )
            .unwrap();
        with_explicit.bind("pos", 0);

        assert_eq!(
            with_default.waveforms().unwrap(),
            with_explicit.waveforms().unwrap()
        );
    }
}
