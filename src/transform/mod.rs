//! Statement binding and execution
//!
//! [`Parser`] turns parsed statements into [`Statements`] for one context
//! kind; [`Statements::execute`] runs them against a record.

pub mod accessor;
pub mod functions;
pub mod parser;
pub mod runtime;

pub use accessor::{ContextKind, GetSetter, Getter, Literal, Setter};
pub use functions::{Function, Functions};
pub use parser::Parser;
pub use runtime::{Condition, Statement, Statements};
