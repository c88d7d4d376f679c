// SPDX-License-Identifier: MIT

use crate::Samples;
use crate::seqc_generator::SeqCGenerator;

type WaveIdInternal = String;

/// One sequencer statement; emission lives in
/// [`SeqCGenerator`](crate::seqc_generator::SeqCGenerator).
#[derive(Debug, Clone, PartialEq)]
pub enum SeqCStatement {
    Comment {
        text: String,
    },
    WaveDeclaration {
        wave_id: WaveIdInternal,
        length: Samples,
        has_marker: bool,
    },
    /// One `playWave` referencing a wave per output; outputs are numbered
    /// from 1 in emission order.
    PlayWave {
        wave_ids: Vec<WaveIdInternal>,
    },
    PlayZero {
        num_samples: Samples,
    },
    Repeat {
        num_repeats: u64,
        body: SeqCGenerator,
    },
    WhileTrue {
        body: SeqCGenerator,
    },
}
