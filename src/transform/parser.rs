//! Binds parsed statements to a context kind
//!
//! Paths resolve through `K::parse_path`, enum symbols through
//! `K::parse_enum` and invocations through the function library. Every
//! failure surfaces here, before any record is touched.

use tracing::debug;

use super::accessor::ContextKind;
use super::functions::{ArgumentList, BoundArgument, Compiled, Functions};
use super::runtime::{Condition, Statement, Statements};
use crate::ast::{Argument, Comparison, Invocation, ParsedStatement};
use crate::error::{Error, Result};
use crate::value::Value;

pub struct Parser<'f, K: ContextKind> {
    functions: &'f Functions<K>,
}

impl<'f, K: ContextKind> Parser<'f, K> {
    pub fn new(functions: &'f Functions<K>) -> Self {
        Self { functions }
    }

    pub fn parse_statements(&self, statements: &[ParsedStatement]) -> Result<Statements<K>> {
        let bound = statements
            .iter()
            .map(|s| self.parse_statement(s))
            .collect::<Result<Vec<_>>>()?;
        debug!(context = K::NAME, count = bound.len(), "bound statements");
        Ok(Statements::new(bound))
    }

    pub fn parse_statement(&self, statement: &ParsedStatement) -> Result<Statement<K>> {
        let invocation = &statement.invocation;
        let editor = match self.compile_invocation(invocation)? {
            Compiled::Editor(editor) => editor,
            Compiled::Converter(_) => {
                return Err(Error::invalid_arguments(
                    &invocation.function,
                    "converters cannot be used as statements",
                ))
            }
        };
        let condition = statement
            .condition
            .as_ref()
            .map(|c| self.bind_condition(c))
            .transpose()?;
        Ok(Statement::new(editor, condition, statement.to_string()))
    }

    fn compile_invocation(&self, invocation: &Invocation) -> Result<Compiled<K>> {
        let function = self
            .functions
            .get(&invocation.function)
            .ok_or_else(|| Error::UnknownFunction(invocation.function.clone()))?;
        let arguments = invocation
            .arguments
            .iter()
            .map(|a| self.bind_argument(a))
            .collect::<Result<Vec<_>>>()?;
        function.compile(ArgumentList::new(function, arguments)?)
    }

    fn bind_argument(&self, argument: &Argument) -> Result<BoundArgument<K>> {
        Ok(match argument {
            Argument::String(s) => BoundArgument::Literal(Value::Str(s.clone())),
            Argument::Int(i) => BoundArgument::Literal(Value::Int(*i)),
            Argument::Float(f) => BoundArgument::Literal(Value::Double(*f)),
            Argument::Bool(b) => BoundArgument::Literal(Value::Bool(*b)),
            Argument::Bytes(b) => BoundArgument::Literal(Value::Bytes(b.clone())),
            Argument::Nil => BoundArgument::Literal(Value::Nil),
            Argument::Path(path) => BoundArgument::Path(K::parse_path(path)?),
            Argument::Enum(symbol) => BoundArgument::Literal(Value::Int(K::parse_enum(symbol)?.0)),
            Argument::Invocation(invocation) => match self.compile_invocation(invocation)? {
                Compiled::Converter(getter) => BoundArgument::Converter(getter),
                Compiled::Editor(_) => {
                    return Err(Error::invalid_arguments(
                        &invocation.function,
                        "editors cannot be used as arguments",
                    ))
                }
            },
        })
    }

    fn bind_condition(&self, comparison: &Comparison) -> Result<Condition<K>> {
        let left = self.bind_argument(&comparison.left)?.into_getter();
        let right = self.bind_argument(&comparison.right)?.into_getter();
        Ok(Condition::new(left, comparison.op, right))
    }
}
