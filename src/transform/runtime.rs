//! Bound statements and their execution against one record

use tracing::trace;

use super::accessor::{ContextKind, Getter};
use super::functions::Expression;
use crate::ast::CompareOp;
use crate::error::{Error, Result};
use crate::value::Value;

/// `where` clause over two bound operands
pub struct Condition<K: ContextKind> {
    left: Box<dyn Getter<K>>,
    op: CompareOp,
    right: Box<dyn Getter<K>>,
}

impl<K: ContextKind> Condition<K> {
    pub fn new(left: Box<dyn Getter<K>>, op: CompareOp, right: Box<dyn Getter<K>>) -> Self {
        Self { left, op, right }
    }

    pub fn evaluate(&self, ctx: &K::Context<'_>) -> Result<bool> {
        let left = self.left.get(ctx)?;
        let right = self.right.get(ctx)?;
        let equal = values_equal(&left, &right);
        Ok(match self.op {
            CompareOp::Eq => equal,
            CompareOp::Ne => !equal,
        })
    }
}

/// Structural equality, except that ints and doubles compare numerically
fn values_equal(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Int(i), Value::Double(d)) | (Value::Double(d), Value::Int(i)) => *i as f64 == *d,
        _ => left == right,
    }
}

/// One bound statement: an editor plus an optional condition
pub struct Statement<K: ContextKind> {
    editor: Box<dyn Expression<K>>,
    condition: Option<Condition<K>>,
    text: String,
}

impl<K: ContextKind> Statement<K> {
    pub fn new(
        editor: Box<dyn Expression<K>>,
        condition: Option<Condition<K>>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            editor,
            condition,
            text: text.into(),
        }
    }

    /// Statement text as written, used in diagnostics
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Run against one record.
    ///
    /// Returns the editor's result and whether the condition matched; a
    /// statement whose condition is false returns `(Nil, false)` without
    /// touching the record.
    pub fn execute(&self, ctx: &mut K::Context<'_>) -> Result<(Value, bool)> {
        let matched = match &self.condition {
            Some(condition) => condition.evaluate(ctx)?,
            None => true,
        };
        if !matched {
            return Ok((Value::Nil, false));
        }
        let value = self.editor.resolve(ctx)?;
        Ok((value, true))
    }
}

/// Ordered statement sequence for one context kind
pub struct Statements<K: ContextKind> {
    statements: Vec<Statement<K>>,
}

impl<K: ContextKind> Statements<K> {
    pub fn new(statements: Vec<Statement<K>>) -> Self {
        Self { statements }
    }

    /// Execute every statement in order against one record.
    ///
    /// The first failure aborts the remaining statements and is returned as
    /// [`Error::Statement`] naming the failing statement.
    pub fn execute(&self, ctx: &mut K::Context<'_>) -> Result<()> {
        for (index, statement) in self.statements.iter().enumerate() {
            let (_, matched) =
                statement
                    .execute(ctx)
                    .map_err(|source| Error::Statement {
                        index,
                        statement: statement.text.clone(),
                        source: Box::new(source),
                    })?;
            trace!(context = K::NAME, index, matched, statement = %statement.text, "executed statement");
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.statements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Statement<K>> {
        self.statements.iter()
    }
}

impl<K: ContextKind> Default for Statements<K> {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Path;
    use crate::transform::accessor::Literal;
    use crate::transform::functions::test_support::*;
    use crate::transform::functions::Set;

    fn set_name(value: &str) -> Box<dyn Expression<Attrs>> {
        editor(
            &Set,
            vec![
                crate::transform::functions::BoundArgument::Path(
                    Attrs::parse_path(&Path::field("name")).unwrap(),
                ),
                literal(value),
            ],
        )
        .unwrap()
    }

    fn name_is(value: &str) -> Condition<Attrs> {
        Condition::new(
            Box::new(Attrs::parse_path(&Path::field("name")).unwrap()),
            CompareOp::Eq,
            Box::new(Literal(Value::from(value))),
        )
    }

    #[test]
    fn test_condition_false_skips_editor() {
        let statement = Statement::new(set_name("b"), Some(name_is("zzz")), "set(name, \"b\")");
        let mut ctx = context(&[]);
        let (value, matched) = statement.execute(&mut ctx).unwrap();
        assert!(!matched);
        assert_eq!(value, Value::Nil);
        assert_eq!(ctx.name, "");
    }

    #[test]
    fn test_later_statements_observe_earlier_writes() {
        let statements = Statements::new(vec![
            Statement::new(set_name("a"), None, "set(name, \"a\")"),
            Statement::new(set_name("b"), Some(name_is("a")), "set(name, \"b\") where name == \"a\""),
        ]);
        let mut ctx = context(&[]);
        statements.execute(&mut ctx).unwrap();
        assert_eq!(ctx.name, "b");
    }

    #[test]
    fn test_failure_aborts_and_names_statement() {
        let bad = editor(
            &Set,
            vec![
                crate::transform::functions::BoundArgument::Path(
                    Attrs::parse_path(&Path::field("name")).unwrap(),
                ),
                literal(Value::Int(1)),
            ],
        )
        .unwrap();
        let statements = Statements::new(vec![
            Statement::new(bad, None, "set(name, 1)"),
            Statement::new(set_name("never"), None, "set(name, \"never\")"),
        ]);
        let mut ctx = context(&[]);
        let err = statements.execute(&mut ctx).unwrap_err();
        assert!(
            matches!(err, Error::Statement { index: 0, ref statement, .. } if statement == "set(name, 1)")
        );
        assert!(matches!(err.root_cause(), Error::TypeMismatch { .. }));
        assert_eq!(ctx.name, "");
    }

    #[test]
    fn test_numeric_equality_crosses_int_and_double() {
        assert!(values_equal(&Value::Int(2), &Value::Double(2.0)));
        assert!(!values_equal(&Value::Int(2), &Value::from("2")));
        assert!(values_equal(&Value::Nil, &Value::Nil));
    }
}
