// SPDX-License-Identifier: MIT

//! Symbolic scalar expressions with named, sweepable parameters.
//!
//! An [`Expr`] is a closed-form combination of numbers and named parameters.
//! A [`ParameterStore`] maps parameter names to bound values and resolves an
//! expression to a single concrete [`Number`]; unbound parameters default
//! to 0 so that a pulse program can be previewed before sweep values are
//! chosen.

pub mod expr;
pub mod parser;
pub mod store;

pub use expr::{Expr, Number};
pub use parser::parse_expr;
pub use store::ParameterStore;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("parse error at offset {offset}: {message}")]
    Parse { offset: usize, message: String },

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
