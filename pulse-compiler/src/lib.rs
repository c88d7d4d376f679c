// SPDX-License-Identifier: MIT

//! Compiler core for parameterized control-pulse sequences.
//!
//! A [`Pulse`](pulse::Pulse) is an expression tree over analytic waveform
//! atoms whose fields remain symbolic until rendering. A
//! [`Sequence`](sequence::Sequence) composes registered pulses into one tree
//! per channel, aligns all channels to a common sample window satisfying the
//! hardware constraints, and renders clamped sample buffers plus a marker
//! buffer. The [`persist`] module round-trips pulse trees through a JSON
//! wire format with symbolic parameters intact.
//!
//! All positions, widths and delays are expressed in samples; carrier
//! frequencies are in Hz and are converted through the configured sampling
//! frequency.

pub mod config;
pub mod kernels;
pub mod persist;
pub mod pulse;
pub mod sequence;

pub use config::{Configuration, PhaseAlignment};
pub use pulse::Pulse;
pub use sequence::{Rendered, Sequence};

/// Signed sample index; windows are half-open `[left, right)` and may start
/// at negative indices before the sequence origin.
pub type SampleIndex = i64;

pub type SampleWindow = std::ops::Range<SampleIndex>;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("registration requires a carrier or a (frequency, phase) pair")]
    MissingCarrier,

    #[error("channel index {index} out of range for {n_channels} channels")]
    ChannelOutOfRange { index: usize, n_channels: usize },

    #[error("unknown pulse type tag '{0}'")]
    UnknownPulseType(String),

    #[error("malformed pulse dump: {0}")]
    MalformedDump(String),

    #[error(transparent)]
    Expr(#[from] sweep_expr::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

impl Error {
    pub fn new(msg: &str) -> Self {
        Error::Anyhow(anyhow::anyhow!(msg.to_string()))
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
