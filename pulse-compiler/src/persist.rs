// SPDX-License-Identifier: MIT

//! Lossless textual serialization of sequences.
//!
//! Symbolic fields are written as expression text and re-parsed on load, so
//! a dump taken before parameters are bound reconstructs the same sweepable
//! sequence. The JSON field names are the wire contract; do not rename them.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use sweep_expr::{Expr, parse_expr};

use crate::config::Configuration;
use crate::pulse::{Atom, Pulse, PulseKind};
use crate::sequence::Sequence;
use crate::{Error, Result};

#[derive(Debug, Serialize, Deserialize)]
struct PulseNode {
    #[serde(rename = "type")]
    kind: String,
    #[serde(rename = "object type")]
    object_type: String,
    gain: String,
    offset: String,
    displacement: String,
    #[serde(rename = "extra params")]
    extra_params: Vec<String>,
    children: Vec<PulseNode>,
}

#[derive(Debug, Serialize, Deserialize)]
struct RegistrationNode {
    position: String,
    pulse: PulseNode,
    carrier: PulseNode,
}

#[derive(Debug, Serialize, Deserialize)]
struct SequenceDoc {
    #[serde(rename = "trigger pos")]
    trigger_pos: Vec<String>,
    #[serde(rename = "marker width")]
    marker_width: String,
    period: String,
    repetitions: String,
    channels: Vec<Vec<RegistrationNode>>,
}

fn atom_tag(atom: &Atom) -> (&'static str, Vec<String>) {
    match atom {
        Atom::Empty => ("Pulse", Vec::new()),
        Atom::Gaussian { width, plateau, .. } => {
            ("Gaussian", vec![width.to_string(), plateau.to_string()])
        }
        Atom::Drag { width, .. } => ("Drag", vec![width.to_string()]),
        Atom::Rect { width } => ("Rect", vec![width.to_string()]),
        Atom::Cosine { width, plateau } => {
            ("Cosine", vec![width.to_string(), plateau.to_string()])
        }
        Atom::Ramp {
            width,
            amplitude_start,
            amplitude_end,
        } => (
            "Ramp",
            vec![
                width.to_string(),
                amplitude_start.to_string(),
                amplitude_end.to_string(),
            ],
        ),
        // Frequencies first, then phases; the halves have equal length.
        Atom::Carrier {
            frequencies,
            phases,
        } => (
            "Carrier",
            frequencies
                .iter()
                .chain(phases.iter())
                .map(Expr::to_string)
                .collect(),
        ),
    }
}

fn dump_pulse(pulse: &Pulse) -> PulseNode {
    let (kind, object_type, extra_params, children) = match &pulse.kind {
        PulseKind::Atom(atom) => {
            let (tag, extra) = atom_tag(atom);
            ("atom", tag, extra, Vec::new())
        }
        PulseKind::Add => ("add", "Pulse", Vec::new(), pulse.children.iter().map(dump_pulse).collect()),
        PulseKind::Mul => ("mul", "Pulse", Vec::new(), pulse.children.iter().map(dump_pulse).collect()),
    };
    PulseNode {
        kind: kind.into(),
        object_type: object_type.into(),
        gain: pulse.gain.to_string(),
        offset: pulse.offset.to_string(),
        displacement: pulse.displacement.to_string(),
        extra_params,
        children,
    }
}

fn extra(params: &[Expr], index: usize, tag: &str) -> Result<Expr> {
    params.get(index).cloned().ok_or_else(|| {
        Error::MalformedDump(format!(
            "'{tag}' needs at least {} extra param(s), got {}",
            index + 1,
            params.len()
        ))
    })
}

fn rebuild_atom(tag: &str, params: &[Expr]) -> Result<Pulse> {
    match tag {
        "Pulse" => Ok(Pulse::empty()),
        "Gaussian" => Ok(Pulse::gaussian_with(
            extra(params, 0, tag)?,
            extra(params, 1, tag)?,
            crate::pulse::DEFAULT_CUTOFF,
        )),
        "Drag" => Ok(Pulse::drag(extra(params, 0, tag)?)),
        "Rect" => Ok(Pulse::rect(extra(params, 0, tag)?)),
        "Cosine" => Ok(Pulse::cosine_with(
            extra(params, 0, tag)?,
            extra(params, 1, tag)?,
        )),
        "Ramp" => Ok(Pulse::ramp(
            extra(params, 0, tag)?,
            extra(params, 1, tag)?,
            extra(params, 2, tag)?,
        )),
        "Carrier" => {
            if params.len() % 2 != 0 {
                return Err(Error::MalformedDump(format!(
                    "'Carrier' needs an even number of extra params, got {}",
                    params.len()
                )));
            }
            let half = params.len() / 2;
            Pulse::carrier(params[..half].to_vec(), params[half..].to_vec())
        }
        _ => Err(Error::UnknownPulseType(tag.to_string())),
    }
}

fn parse_collecting(text: &str, names: &mut BTreeSet<String>) -> Result<Expr> {
    let expr = parse_expr(text).map_err(Error::from)?;
    expr.collect_params(names);
    Ok(expr)
}

fn reconstruct_pulse(node: &PulseNode) -> Result<Pulse> {
    let gain = parse_expr(&node.gain).map_err(Error::from)?;
    let offset = parse_expr(&node.offset).map_err(Error::from)?;
    let displacement = parse_expr(&node.displacement).map_err(Error::from)?;

    let bare = match node.kind.as_str() {
        "atom" => {
            let params: Vec<Expr> = node
                .extra_params
                .iter()
                .map(|text| parse_expr(text).map_err(Error::from))
                .collect::<Result<_>>()?;
            rebuild_atom(&node.object_type, &params)?
        }
        "add" | "mul" => {
            let [a, b] = node.children.as_slice() else {
                return Err(Error::MalformedDump(format!(
                    "'{}' node needs exactly two children, got {}",
                    node.kind,
                    node.children.len()
                )));
            };
            let (a, b) = (reconstruct_pulse(a)?, reconstruct_pulse(b)?);
            match node.kind.as_str() {
                "add" => a + b,
                _ => a * b,
            }
        }
        other => {
            return Err(Error::MalformedDump(format!(
                "unknown node type '{other}'"
            )));
        }
    };

    // Shift first so the bounds move before the amplitude overlay.
    Ok(bare.shift(displacement) * gain + offset)
}

impl Sequence {
    /// Serialize the sequence to JSON text, symbolic parameters intact.
    pub fn dump(&self) -> Result<String> {
        let channels = (0..self.n_channels())
            .map(|channel| {
                self.registrations(channel)
                    .iter()
                    .map(|registration| RegistrationNode {
                        position: registration.position.to_string(),
                        pulse: dump_pulse(&registration.pulse),
                        carrier: dump_pulse(&registration.carrier),
                    })
                    .collect()
            })
            .collect();
        let doc = SequenceDoc {
            trigger_pos: self
                .trigger_positions()
                .iter()
                .map(Expr::to_string)
                .collect(),
            marker_width: self.marker_width().to_string(),
            period: self.period().to_string(),
            repetitions: self.repetitions().to_string(),
            channels,
        };
        Ok(serde_json::to_string(&doc)?)
    }

    /// Reconstruct a sequence from [`dump`](Sequence::dump) output.
    ///
    /// Also returns every distinct parameter name referenced anywhere in the
    /// document, so callers know what can be bound.
    pub fn load(text: &str, config: Configuration) -> Result<(Sequence, BTreeSet<String>)> {
        let doc: SequenceDoc = serde_json::from_str(text)?;
        if doc.channels.is_empty() {
            return Err(Error::MalformedDump(
                "document contains no channels".into(),
            ));
        }

        let mut names = BTreeSet::new();
        let trigger_pos = doc
            .trigger_pos
            .iter()
            .map(|t| parse_collecting(t, &mut names))
            .collect::<Result<Vec<_>>>()?;
        let marker_width = parse_collecting(&doc.marker_width, &mut names)?;
        let period = parse_collecting(&doc.period, &mut names)?;
        let repetitions = parse_collecting(&doc.repetitions, &mut names)?;

        let mut sequence = Sequence::new(doc.channels.len(), config)?;
        sequence.set_trigger_positions(trigger_pos)?;
        sequence.set_marker_width(marker_width);
        sequence.set_period(period);
        sequence.set_repetitions(repetitions);

        for (channel, registrations) in doc.channels.iter().enumerate() {
            for node in registrations {
                let position = parse_collecting(&node.position, &mut names)?;
                let pulse = reconstruct_pulse(&node.pulse)?;
                let carrier = reconstruct_pulse(&node.carrier)?;
                names.append(&mut pulse.params());
                names.append(&mut carrier.params());
                sequence.register(position, pulse, Some(carrier), None, Some(channel))?;
            }
        }
        Ok((sequence, names))
    }
}
