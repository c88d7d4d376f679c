// SPDX-License-Identifier: MIT

use std::ops::Range;

use anyhow::anyhow;

use crate::seqc_statements::SeqCStatement;
use crate::{Result, Samples};

/// Buffer lengths and window boundaries must be a multiple of this.
pub const SAMPLE_MULTIPLE: Samples = 16;

fn indent(s: &str, prefix: &str) -> String {
    s.lines()
        .flat_map(|line| [prefix, line, "\n"].into_iter())
        .collect()
}

/// How often the sequencer runs the program body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Repetitions {
    Finite(u64),
    Infinite,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SeqCGenerator {
    statements: Vec<SeqCStatement>,
}

impl SeqCGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// An empty generator for a nested scope, e.g. a loop body.
    pub fn create(&self) -> Self {
        Self::new()
    }

    pub fn statements(&self) -> &[SeqCStatement] {
        &self.statements
    }

    pub fn num_statements(&self) -> usize {
        self.statements.len()
    }

    pub fn add_statement(&mut self, statement: SeqCStatement) {
        self.statements.push(statement);
    }

    pub fn add_comment<S: Into<String>>(&mut self, comment: S) {
        self.statements.push(SeqCStatement::Comment {
            text: comment.into(),
        });
    }

    pub fn add_wave_declaration<S: Into<String>>(
        &mut self,
        wave_id: S,
        length: Samples,
        has_marker: bool,
    ) -> Result<()> {
        if length == 0 || length % SAMPLE_MULTIPLE != 0 {
            return Err(anyhow!(
                "attempting to emit placeholder({length}), which is not a positive \
                multiple of {SAMPLE_MULTIPLE}"
            )
            .into());
        }
        self.statements.push(SeqCStatement::WaveDeclaration {
            wave_id: wave_id.into(),
            length,
            has_marker,
        });
        Ok(())
    }

    pub fn add_play_wave_statement(&mut self, wave_ids: Vec<String>) {
        self.statements.push(SeqCStatement::PlayWave { wave_ids });
    }

    pub fn add_play_zero_statement(&mut self, num_samples: Samples) -> Result<()> {
        if num_samples == 0 {
            return Err(anyhow!("attempting to emit playZero(0)").into());
        }
        self.statements
            .push(SeqCStatement::PlayZero { num_samples });
        Ok(())
    }

    pub fn add_repeat(&mut self, num_repeats: u64, body: SeqCGenerator) {
        self.statements
            .push(SeqCStatement::Repeat { num_repeats, body });
    }

    pub fn add_while_true(&mut self, body: SeqCGenerator) {
        self.statements.push(SeqCStatement::WhileTrue { body });
    }

    pub fn generate_seq_c(&self) -> String {
        self.statements
            .iter()
            .map(|statement| self.emit_statement(statement))
            .collect::<String>()
    }

    fn emit_statement(&self, statement: &SeqCStatement) -> String {
        match statement {
            SeqCStatement::Comment { text } => format!("/* {text} */\n"),
            SeqCStatement::WaveDeclaration {
                wave_id,
                length,
                has_marker,
            } => {
                format!("wave {wave_id} = placeholder({length}, {has_marker});\n")
            }
            SeqCStatement::PlayWave { wave_ids } => {
                let args = wave_ids
                    .iter()
                    .enumerate()
                    .map(|(output, wave_id)| format!("{}, {wave_id}", output + 1))
                    .collect::<Vec<String>>()
                    .join(", ");
                format!("playWave({args});\n")
            }
            SeqCStatement::PlayZero { num_samples } => {
                format!("playZero({num_samples});\n")
            }
            SeqCStatement::Repeat { num_repeats, body } => {
                let body = indent(&body.generate_seq_c(), "  ");
                format!("repeat ({num_repeats}) {{\n{body}}}\n")
            }
            SeqCStatement::WhileTrue { body } => {
                let body = indent(&body.generate_seq_c(), "  ");
                format!("while (true) {{\n{body}}}\n")
            }
        }
    }
}

/// Assemble the full sequencer program for one set of active windows.
///
/// `windows` are half-open sample ranges within a rendered buffer of
/// `total_length` samples, ascending and non-overlapping. Each window gets a
/// placeholder wave per channel; the loop body plays the windows in order,
/// fills the gaps between them with `playZero`, and ends with the wait that
/// pads the body out to the repetition `period` (at least 1 sample, the
/// hardware cannot wait for zero).
pub fn generate_program(
    windows: &[Range<Samples>],
    n_channels: usize,
    total_length: Samples,
    repetitions: Repetitions,
    period: Samples,
    with_marker: bool,
) -> Result<String> {
    if n_channels == 0 {
        return Err(anyhow!("a program needs at least one channel").into());
    }
    for pair in windows.windows(2) {
        if pair[0].end > pair[1].start {
            return Err(anyhow!(
                "active windows must be ascending and non-overlapping, got [{}, {}) before [{}, {})",
                pair[0].start,
                pair[0].end,
                pair[1].start,
                pair[1].end,
            )
            .into());
        }
    }

    log::debug!(
        "emitting program: {} active window(s), {total_length} samples, period {period}",
        windows.len(),
    );

    let mut generator = SeqCGenerator::new();
    generator.add_comment(format!(
        "{} channel(s), {} active window(s), {total_length} samples",
        n_channels,
        windows.len(),
    ));
    for (index, window) in windows.iter().enumerate() {
        let length = window.end - window.start;
        for channel in 0..n_channels {
            generator.add_wave_declaration(
                format!("w_{channel}_{index}"),
                length,
                with_marker,
            )?;
        }
    }

    let mut body = generator.create();
    if let Some(first) = windows.first()
        && first.start > 0
    {
        body.add_play_zero_statement(first.start)?;
    }
    for (index, window) in windows.iter().enumerate() {
        let wave_ids = (0..n_channels)
            .map(|channel| format!("w_{channel}_{index}"))
            .collect();
        body.add_play_wave_statement(wave_ids);
        if let Some(next) = windows.get(index + 1) {
            let gap = next.start - window.end;
            if gap > 0 {
                body.add_play_zero_statement(gap)?;
            }
        }
    }
    // Minimum wait of 1 sample, the sequencer has no zero-length wait.
    body.add_play_zero_statement(period.saturating_sub(total_length).max(1))?;

    match repetitions {
        Repetitions::Finite(count) => generator.add_repeat(count, body),
        Repetitions::Infinite => generator.add_while_true(body),
    }
    Ok(generator.generate_seq_c())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::find_active_windows;
    use pulse_compiler::{Configuration, Pulse, Sequence};

    #[test]
    fn test_wave_declaration_rejects_unaligned_length() {
        let mut generator = SeqCGenerator::new();
        assert!(generator.add_wave_declaration("w_0_0", 24, false).is_err());
        assert!(generator.add_wave_declaration("w_0_0", 0, false).is_err());
        assert!(generator.add_wave_declaration("w_0_0", 32, false).is_ok());
    }

    #[test]
    fn test_emission_formats() {
        let mut generator = SeqCGenerator::new();
        generator.add_comment("header");
        generator
            .add_wave_declaration("w_0_0", 32, true)
            .unwrap();
        let mut body = generator.create();
        body.add_play_wave_statement(vec!["w_0_0".into(), "w_1_0".into()]);
        body.add_play_zero_statement(480).unwrap();
        generator.add_repeat(3, body);

        let text = generator.generate_seq_c();
        assert_eq!(
            text,
            "/* header */\n\
             wave w_0_0 = placeholder(32, true);\n\
             repeat (3) {\n\
             \x20 playWave(1, w_0_0, 2, w_1_0);\n\
             \x20 playZero(480);\n\
             }\n"
        );
    }

    #[test]
    fn test_infinite_loop_wrapper() {
        let mut generator = SeqCGenerator::new();
        let mut body = generator.create();
        body.add_play_zero_statement(16).unwrap();
        generator.add_while_true(body);
        assert_eq!(
            generator.generate_seq_c(),
            "while (true) {\n  playZero(16);\n}\n"
        );
    }

    #[test]
    fn test_generate_program_schedules_gaps() {
        let windows = vec![16..48, 96..112];
        let text =
            generate_program(&windows, 2, 160, Repetitions::Finite(5), 480, false).unwrap();
        assert!(text.contains("wave w_0_0 = placeholder(32, false);"));
        assert!(text.contains("wave w_1_1 = placeholder(16, false);"));
        assert!(text.contains("repeat (5) {"));
        // Lead-in, inter-window gap, final pad to the period.
        assert!(text.contains("playZero(16);"));
        assert!(text.contains("playZero(48);"));
        assert!(text.contains("playZero(320);"));
        assert!(text.contains("playWave(1, w_0_0, 2, w_1_0);"));
        assert!(text.contains("playWave(1, w_0_1, 2, w_1_1);"));
    }

    #[test]
    fn test_generate_program_degenerate_without_windows() {
        let text = generate_program(&[], 1, 0, Repetitions::Infinite, 480, false).unwrap();
        assert!(text.contains("while (true) {"));
        assert!(text.contains("playZero(480);"));
        assert!(!text.contains("playWave"));
    }

    #[test]
    fn test_generate_program_overlapping_windows_rejected() {
        let windows = vec![0..32, 16..48];
        assert!(generate_program(&windows, 1, 48, Repetitions::Finite(1), 480, false).is_err());
    }

    #[test]
    fn test_program_from_rendered_sequence() {
        let mut sequence = Sequence::new(1, Configuration::default()).unwrap();
        sequence
            .register(0, Pulse::rect(64), Some(Pulse::carrier_tone(0.0, 0.0)), None, None)
            .unwrap();
        let rendered = sequence.waveforms().unwrap();
        let windows =
            find_active_windows(&rendered.channels, &rendered.marker, 150_000).unwrap();
        assert_eq!(windows.len(), 1);

        let total_length = rendered.marker.len() as Samples;
        let text = generate_program(
            &windows,
            rendered.channels.len(),
            total_length,
            Repetitions::Finite(1000),
            240_000,
            true,
        )
        .unwrap();
        assert!(text.contains("repeat (1000) {"));
        assert!(text.contains("playWave(1, w_0_0);"));
    }
}
