// SPDX-License-Identifier: MIT

//! Sequencer-program generation for rendered pulse sequences.
//!
//! [`active_windows`] reduces rendered sample buffers to the 16-aligned
//! windows the sequencer actually has to play; [`seqc_generator`] turns
//! those windows into the line-oriented sequencer program with placeholder
//! declarations, `playWave`/`playZero` scheduling and the repetition loop.

pub mod active_windows;
pub mod seqc_generator;
pub mod seqc_statements;

pub use active_windows::{DEFAULT_BRIDGE_THRESHOLD, find_active_windows};
pub use seqc_generator::{Repetitions, SeqCGenerator, generate_program};
pub use seqc_statements::SeqCStatement;

pub type Samples = u64;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
