// SPDX-License-Identifier: MIT

//! The pulse expression tree.
//!
//! A [`Pulse`] is either an atomic analytic waveform or a composite (sum or
//! product) of exactly two children. All timing fields stay symbolic
//! ([`Expr`]) until rendering; per-node parameter bindings substitute
//! concrete values at that point.
//!
//! Pulses have value semantics: composites own copies of their operands and
//! `shift`/scalar arithmetic always produce a structurally new node, so no
//! mutation of one tree is ever observable through another.

use std::collections::BTreeSet;
use std::ops;

use sweep_expr::{Expr, Number, ParameterStore};

use crate::kernels;
use crate::{Result, SampleWindow};

/// An atomic analytic waveform shape.
///
/// The `cutoff` of the Gaussian-derived shapes bounds the rendered support
/// in units of the pulse width; it is a shape-quality knob, not a sweepable
/// quantity, and is therefore a plain number.
#[derive(Debug, Clone, PartialEq)]
pub enum Atom {
    /// The degenerate zero-length pulse, used as the seed when folding
    /// registrations into a channel tree.
    Empty,
    Gaussian {
        width: Expr,
        plateau: Expr,
        cutoff: f64,
    },
    Drag {
        width: Expr,
        cutoff: f64,
    },
    Rect {
        width: Expr,
    },
    Cosine {
        width: Expr,
        plateau: Expr,
    },
    Ramp {
        width: Expr,
        amplitude_start: Expr,
        amplitude_end: Expr,
    },
    /// Multiplicative cosine modulator. Bounds are degenerate; when asked to
    /// render over an external window it evaluates directly over that window.
    Carrier {
        frequencies: Vec<Expr>,
        phases: Vec<Expr>,
    },
}

pub const DEFAULT_CUTOFF: f64 = 5.0;

#[derive(Debug, Clone, PartialEq)]
pub enum PulseKind {
    Atom(Atom),
    Add,
    Mul,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Pulse {
    pub(crate) kind: PulseKind,
    pub(crate) left: Expr,
    pub(crate) right: Expr,
    pub(crate) gain: Expr,
    pub(crate) offset: Expr,
    pub(crate) displacement: Expr,
    pub(crate) children: Vec<Pulse>,
    pub(crate) bindings: ParameterStore,
}

/// Analytic bounds of an atom around its local origin, in samples.
fn atom_bounds(atom: &Atom) -> (Expr, Expr) {
    let left = match atom {
        Atom::Empty | Atom::Carrier { .. } => return (Expr::infinity(), Expr::neg_infinity()),
        Atom::Gaussian {
            width,
            plateau,
            cutoff,
        } => Expr::scale(plateau.clone(), -0.5) + Expr::scale(width.clone(), -cutoff / 2.0),
        Atom::Drag { width, cutoff } => Expr::scale(width.clone(), -cutoff / 2.0),
        Atom::Rect { width } | Atom::Ramp { width, .. } => Expr::scale(width.clone(), -0.5),
        Atom::Cosine { width, plateau } => {
            Expr::scale(plateau.clone(), -0.5) + Expr::scale(width.clone(), -1)
        }
    };
    let right = Expr::scale(left.clone(), -1);
    (left, right)
}

impl Pulse {
    fn from_atom(atom: Atom) -> Pulse {
        let (left, right) = atom_bounds(&atom);
        Pulse {
            kind: PulseKind::Atom(atom),
            left,
            right,
            gain: Expr::one(),
            offset: Expr::zero(),
            displacement: Expr::zero(),
            children: Vec::new(),
            bindings: ParameterStore::new(),
        }
    }

    fn composite(kind: PulseKind, a: Pulse, b: Pulse) -> Pulse {
        let left = Expr::min(a.left.clone(), b.left.clone());
        let right = Expr::max(a.right.clone(), b.right.clone());
        Pulse {
            kind,
            left,
            right,
            gain: Expr::one(),
            offset: Expr::zero(),
            displacement: Expr::zero(),
            children: vec![a, b],
            bindings: ParameterStore::new(),
        }
    }

    /// The degenerate zero-length pulse.
    pub fn empty() -> Pulse {
        Pulse::from_atom(Atom::Empty)
    }

    pub fn gaussian(width: impl Into<Expr>) -> Pulse {
        Pulse::gaussian_with(width, 0, DEFAULT_CUTOFF)
    }

    pub fn gaussian_with(width: impl Into<Expr>, plateau: impl Into<Expr>, cutoff: f64) -> Pulse {
        Pulse::from_atom(Atom::Gaussian {
            width: width.into(),
            plateau: plateau.into(),
            cutoff,
        })
    }

    pub fn drag(width: impl Into<Expr>) -> Pulse {
        Pulse::drag_with(width, DEFAULT_CUTOFF)
    }

    pub fn drag_with(width: impl Into<Expr>, cutoff: f64) -> Pulse {
        Pulse::from_atom(Atom::Drag {
            width: width.into(),
            cutoff,
        })
    }

    pub fn rect(width: impl Into<Expr>) -> Pulse {
        Pulse::from_atom(Atom::Rect {
            width: width.into(),
        })
    }

    pub fn cosine(width: impl Into<Expr>) -> Pulse {
        Pulse::cosine_with(width, 0)
    }

    pub fn cosine_with(width: impl Into<Expr>, plateau: impl Into<Expr>) -> Pulse {
        Pulse::from_atom(Atom::Cosine {
            width: width.into(),
            plateau: plateau.into(),
        })
    }

    pub fn ramp(
        width: impl Into<Expr>,
        amplitude_start: impl Into<Expr>,
        amplitude_end: impl Into<Expr>,
    ) -> Pulse {
        Pulse::from_atom(Atom::Ramp {
            width: width.into(),
            amplitude_start: amplitude_start.into(),
            amplitude_end: amplitude_end.into(),
        })
    }

    /// A multi-tone carrier; frequencies in Hz, phases in degrees.
    pub fn carrier(frequencies: Vec<Expr>, phases: Vec<Expr>) -> Result<Pulse> {
        if frequencies.len() != phases.len() {
            return Err(crate::Error::new(&format!(
                "carrier needs matching frequency/phase lists, got {} and {}",
                frequencies.len(),
                phases.len()
            )));
        }
        Ok(Pulse::from_atom(Atom::Carrier {
            frequencies,
            phases,
        }))
    }

    /// A single-tone carrier.
    pub fn carrier_tone(frequency: impl Into<Expr>, phase: impl Into<Expr>) -> Pulse {
        Pulse::from_atom(Atom::Carrier {
            frequencies: vec![frequency.into()],
            phases: vec![phase.into()],
        })
    }

    pub fn kind(&self) -> &PulseKind {
        &self.kind
    }

    pub fn is_atom(&self) -> bool {
        matches!(self.kind, PulseKind::Atom(_))
    }

    pub fn children(&self) -> &[Pulse] {
        &self.children
    }

    pub fn gain(&self) -> &Expr {
        &self.gain
    }

    pub fn offset(&self) -> &Expr {
        &self.offset
    }

    pub fn displacement(&self) -> &Expr {
        &self.displacement
    }

    /// Translate in time by `amount` samples. Produces a new node;
    /// displacement and both bounds move together.
    pub fn shift(&self, amount: impl Into<Expr>) -> Pulse {
        let amount = amount.into();
        let mut shifted = self.clone();
        shifted.displacement = shifted.displacement + amount.clone();
        shifted.left = shifted.left + amount.clone();
        shifted.right = shifted.right + amount;
        shifted
    }

    /// Bind a parameter on this node and, recursively, on all children.
    pub fn bind<N: Into<Number> + Copy>(&mut self, name: &str, value: N) {
        self.bindings.bind(name, value.into());
        for child in &mut self.children {
            child.bind(name, value);
        }
    }

    /// Apply every binding of `store`, recursively.
    pub fn bind_store(&mut self, store: &ParameterStore) {
        for (name, value) in store.iter() {
            self.bind(name, value);
        }
    }

    /// All distinct parameter names referenced anywhere in the tree.
    pub fn params(&self) -> BTreeSet<String> {
        let mut out = BTreeSet::new();
        self.collect_params(&mut out);
        out
    }

    pub(crate) fn collect_params(&self, out: &mut BTreeSet<String>) {
        for expr in [&self.gain, &self.offset, &self.displacement] {
            expr.collect_params(out);
        }
        if let PulseKind::Atom(atom) = &self.kind {
            for expr in atom_exprs(atom) {
                expr.collect_params(out);
            }
        }
        for child in &self.children {
            child.collect_params(out);
        }
    }

    /// Resolved left bound in samples; rounded unless infinite.
    pub fn left_samples(&self) -> f64 {
        resolve_bound(&self.bindings, &self.left)
    }

    /// Resolved right bound in samples; rounded unless infinite.
    pub fn right_samples(&self) -> f64 {
        resolve_bound(&self.bindings, &self.right)
    }

    fn displacement_samples(&self) -> f64 {
        self.bindings.resolve_f64(&self.displacement)
    }

    /// Render the pulse over `window`, zero-padded to the window's length.
    ///
    /// `[left, right)` with `left > right` denotes an empty waveform and
    /// renders as all zeros; a carrier ignores its own degenerate bounds and
    /// evaluates directly over the window.
    pub fn render(&self, window: &SampleWindow, sample_rate: f64) -> Vec<f64> {
        let len = (window.end - window.start).max(0) as usize;
        let gain = self.bindings.resolve_f64(&self.gain);
        let offset = self.bindings.resolve_f64(&self.offset);
        let displacement = self.displacement_samples();

        match &self.kind {
            PulseKind::Atom(Atom::Carrier {
                frequencies,
                phases,
            }) => {
                let tones: Vec<(f64, f64)> = frequencies
                    .iter()
                    .zip(phases)
                    .map(|(f, p)| {
                        (
                            self.bindings.resolve_f64(f),
                            self.bindings.resolve_f64(p),
                        )
                    })
                    .collect();
                (window.start..window.end)
                    .map(|i| {
                        kernels::carrier(i as f64 - displacement, sample_rate, &tones) * gain
                            + offset
                    })
                    .collect()
            }
            PulseKind::Atom(atom) => {
                let (left, right) = (self.left_samples(), self.right_samples());
                if left > right || left.is_infinite() || right.is_infinite() {
                    return vec![0.0; len];
                }
                let own = (left as i64)..(right as i64);
                let resolved = self.resolve_atom(atom);
                let samples: Vec<f64> = own
                    .clone()
                    .map(|i| eval_atom(&resolved, i as f64 - displacement) * gain + offset)
                    .collect();
                pad_to(&samples, &own, window)
            }
            PulseKind::Add | PulseKind::Mul => {
                let (left, right) = (self.left_samples(), self.right_samples());
                if left > right || left.is_infinite() || right.is_infinite() {
                    return vec![0.0; len];
                }
                let own = (left as i64)..(right as i64);
                let a = self.children[0].shift(displacement).render(&own, sample_rate);
                let b = self.children[1].shift(displacement).render(&own, sample_rate);
                let combined: Vec<f64> = a
                    .iter()
                    .zip(&b)
                    .map(|(x, y)| {
                        let v = match self.kind {
                            PulseKind::Add => x + y,
                            _ => x * y,
                        };
                        v * gain + offset
                    })
                    .collect();
                pad_to(&combined, &own, window)
            }
        }
    }

    /// Substitute the atom's parameters with their bound values.
    fn resolve_atom(&self, atom: &Atom) -> ResolvedAtom {
        let r = |e: &Expr| self.bindings.resolve_f64(e);
        match atom {
            Atom::Empty | Atom::Carrier { .. } => ResolvedAtom::Zero,
            Atom::Gaussian { width, plateau, .. } => ResolvedAtom::Gaussian {
                width: r(width),
                plateau: r(plateau),
            },
            Atom::Drag { width, .. } => ResolvedAtom::Drag { width: r(width) },
            Atom::Rect { width } => ResolvedAtom::Rect { width: r(width) },
            Atom::Cosine { width, plateau } => ResolvedAtom::Cosine {
                width: r(width),
                plateau: r(plateau),
            },
            Atom::Ramp {
                width,
                amplitude_start,
                amplitude_end,
            } => ResolvedAtom::Ramp {
                width: r(width),
                amplitude_start: r(amplitude_start),
                amplitude_end: r(amplitude_end),
            },
        }
    }

    fn offset_by(mut self, amount: Expr) -> Pulse {
        self.offset = self.offset + amount;
        self
    }

    fn scaled_by(mut self, factor: Expr) -> Pulse {
        self.gain = Expr::mul(self.gain, factor);
        self
    }
}

/// Symbolic expressions held by an atom, for parameter-name collection.
fn atom_exprs(atom: &Atom) -> Vec<&Expr> {
    match atom {
        Atom::Empty => Vec::new(),
        Atom::Gaussian { width, plateau, .. } | Atom::Cosine { width, plateau } => {
            vec![width, plateau]
        }
        Atom::Drag { width, .. } | Atom::Rect { width } => vec![width],
        Atom::Ramp {
            width,
            amplitude_start,
            amplitude_end,
        } => vec![width, amplitude_start, amplitude_end],
        Atom::Carrier {
            frequencies,
            phases,
        } => frequencies.iter().chain(phases.iter()).collect(),
    }
}

enum ResolvedAtom {
    Zero,
    Gaussian { width: f64, plateau: f64 },
    Drag { width: f64 },
    Rect { width: f64 },
    Cosine { width: f64, plateau: f64 },
    Ramp { width: f64, amplitude_start: f64, amplitude_end: f64 },
}

fn eval_atom(atom: &ResolvedAtom, x: f64) -> f64 {
    match atom {
        ResolvedAtom::Zero => 0.0,
        ResolvedAtom::Gaussian { width, plateau } => kernels::gauss(x, *width, *plateau),
        ResolvedAtom::Drag { width } => kernels::drag(x, *width),
        ResolvedAtom::Rect { width } => kernels::rectangle(x, *width),
        ResolvedAtom::Cosine { width, plateau } => kernels::raised_cosine(x, *width, *plateau),
        ResolvedAtom::Ramp {
            width,
            amplitude_start,
            amplitude_end,
        } => kernels::ramp(x, *width, *amplitude_start, *amplitude_end),
    }
}

fn resolve_bound(store: &ParameterStore, expr: &Expr) -> f64 {
    let value = store.resolve_f64(expr);
    if value.is_infinite() {
        value
    } else {
        value.round()
    }
}

/// Zero-pad `samples` (occupying `own`) out to `window`.
fn pad_to(samples: &[f64], own: &SampleWindow, window: &SampleWindow) -> Vec<f64> {
    let len = (window.end - window.start).max(0) as usize;
    let mut out = vec![0.0; len];
    for (i, value) in samples.iter().enumerate() {
        let index = own.start + i as i64 - window.start;
        if (0..len as i64).contains(&index) {
            out[index as usize] = *value;
        }
    }
    out
}

impl ops::Add for Pulse {
    type Output = Pulse;

    fn add(self, rhs: Pulse) -> Pulse {
        Pulse::composite(PulseKind::Add, self, rhs)
    }
}

impl ops::Mul for Pulse {
    type Output = Pulse;

    fn mul(self, rhs: Pulse) -> Pulse {
        Pulse::composite(PulseKind::Mul, self, rhs)
    }
}

impl ops::Sub for Pulse {
    type Output = Pulse;

    fn sub(self, rhs: Pulse) -> Pulse {
        self + (-rhs)
    }
}

impl ops::Neg for Pulse {
    type Output = Pulse;

    fn neg(self) -> Pulse {
        self.scaled_by(Expr::from(-1))
    }
}

// Adding or multiplying a plain scalar folds into the node's own
// offset/gain; it must not add a tree level.

impl ops::Add<Expr> for Pulse {
    type Output = Pulse;

    fn add(self, rhs: Expr) -> Pulse {
        self.offset_by(rhs)
    }
}

impl ops::Mul<Expr> for Pulse {
    type Output = Pulse;

    fn mul(self, rhs: Expr) -> Pulse {
        self.scaled_by(rhs)
    }
}

impl ops::Add<f64> for Pulse {
    type Output = Pulse;

    fn add(self, rhs: f64) -> Pulse {
        self.offset_by(Expr::from(rhs))
    }
}

impl ops::Mul<f64> for Pulse {
    type Output = Pulse;

    fn mul(self, rhs: f64) -> Pulse {
        self.scaled_by(Expr::from(rhs))
    }
}

impl ops::Add<i64> for Pulse {
    type Output = Pulse;

    fn add(self, rhs: i64) -> Pulse {
        self.offset_by(Expr::from(rhs))
    }
}

impl ops::Mul<i64> for Pulse {
    type Output = Pulse;

    fn mul(self, rhs: i64) -> Pulse {
        self.scaled_by(Expr::from(rhs))
    }
}
