// SPDX-License-Identifier: MIT

use indexmap::IndexMap;

use crate::expr::{Expr, Number};

/// Named parameter bindings.
///
/// `bind` inserts or overwrites unconditionally. Resolution substitutes
/// every referenced parameter with its bound value, defaulting unbound
/// names to 0; this is a policy, not an error, so that expressions remain
/// resolvable before a sweep value has been chosen.
///
/// Insertion order is preserved (deterministic iteration).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParameterStore {
    bindings: IndexMap<String, Number>,
}

impl ParameterStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bind<S: Into<String>, N: Into<Number>>(&mut self, name: S, value: N) {
        self.bindings.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<Number> {
        self.bindings.get(name).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Number)> {
        self.bindings.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Resolve an expression to a single concrete number.
    ///
    /// Pure with respect to the store; the result is `Int` only when every
    /// contributing term is exactly integral.
    pub fn resolve(&self, expr: &Expr) -> Number {
        match expr {
            Expr::Const(n) => *n,
            Expr::Param(name) => self.get(name).unwrap_or(Number::Int(0)),
            Expr::Sum(a, b) => self.resolve(a) + self.resolve(b),
            Expr::Scale(e, k) => self.resolve(e) * *k,
            Expr::Prod(a, b) => self.resolve(a) * self.resolve(b),
            Expr::Min(a, b) => self.resolve(a).min(self.resolve(b)),
            Expr::Max(a, b) => self.resolve(a).max(self.resolve(b)),
        }
    }

    pub fn resolve_f64(&self, expr: &Expr) -> f64 {
        self.resolve(expr).to_f64()
    }
}
