//! Editors: functions that mutate the record through a target path

use std::borrow::Cow;

use opentelemetry_proto::tonic::common::v1::{any_value, KeyValue};
use regex::Regex;

use super::{ArgumentList, Compiled, Expression, Function, Parameter};
use crate::error::{Error, Result};
use crate::transform::accessor::{ContextKind, GetSetter, Getter};
use crate::value::Value;

/// Read the target as an attribute map, apply `edit`, write it back.
/// A target that reads as `Nil` is left alone.
fn edit_map<K: ContextKind>(
    target: &dyn GetSetter<K>,
    ctx: &mut K::Context<'_>,
    function: &str,
    edit: impl FnOnce(&mut Vec<KeyValue>),
) -> Result<Value> {
    let mut map = match target.get(ctx)? {
        Value::Map(map) => map,
        Value::Nil => return Ok(Value::Nil),
        other => return Err(Error::type_mismatch(function, "map", &other)),
    };
    edit(&mut map);
    target.set(ctx, Value::Map(map))?;
    Ok(Value::Nil)
}

fn string_value_mut(kv: &mut KeyValue) -> Option<&mut String> {
    match kv.value.as_mut()?.value.as_mut()? {
        any_value::Value::StringValue(s) => Some(s),
        _ => None,
    }
}

// --- set ---
/// Assign a value to a path; a `Nil` value leaves the target untouched
#[derive(Clone, Copy, Debug)]
pub struct Set;

impl<K: ContextKind> Function<K> for Set {
    fn identifier(&self) -> &'static str {
        "set"
    }

    fn parameters(&self) -> &'static [Parameter] {
        const PARAMETERS: &[Parameter] = &[
            Parameter::required("target"),
            Parameter::required("value"),
        ];
        PARAMETERS
    }

    fn compile(&self, mut arguments: ArgumentList<K>) -> Result<Compiled<K>> {
        let target = arguments.required_target("target")?;
        let value = arguments.required_getter("value")?;
        Ok(Compiled::Editor(Box::new(SetFn { target, value })))
    }
}

struct SetFn<K: ContextKind> {
    target: Box<dyn GetSetter<K>>,
    value: Box<dyn Getter<K>>,
}

impl<K: ContextKind> Expression<K> for SetFn<K> {
    fn resolve(&self, ctx: &mut K::Context<'_>) -> Result<Value> {
        let value = self.value.get(ctx)?;
        if !value.is_nil() {
            self.target.set(ctx, value)?;
        }
        Ok(Value::Nil)
    }
}

// --- delete_key ---
/// Remove every entry with the given key
#[derive(Clone, Copy, Debug)]
pub struct DeleteKey;

impl<K: ContextKind> Function<K> for DeleteKey {
    fn identifier(&self) -> &'static str {
        "delete_key"
    }

    fn parameters(&self) -> &'static [Parameter] {
        const PARAMETERS: &[Parameter] = &[
            Parameter::required("target"),
            Parameter::required("key"),
        ];
        PARAMETERS
    }

    fn compile(&self, mut arguments: ArgumentList<K>) -> Result<Compiled<K>> {
        let target = arguments.required_target("target")?;
        let key = arguments.required_string("key")?;
        Ok(Compiled::Editor(Box::new(DeleteKeyFn { target, key })))
    }
}

struct DeleteKeyFn<K: ContextKind> {
    target: Box<dyn GetSetter<K>>,
    key: String,
}

impl<K: ContextKind> Expression<K> for DeleteKeyFn<K> {
    fn resolve(&self, ctx: &mut K::Context<'_>) -> Result<Value> {
        edit_map(self.target.as_ref(), ctx, "delete_key", |map| {
            map.retain(|kv| kv.key != self.key)
        })
    }
}

// --- delete_matching_keys ---
/// Remove every entry whose key matches a regex
#[derive(Clone, Copy, Debug)]
pub struct DeleteMatchingKeys;

impl<K: ContextKind> Function<K> for DeleteMatchingKeys {
    fn identifier(&self) -> &'static str {
        "delete_matching_keys"
    }

    fn parameters(&self) -> &'static [Parameter] {
        const PARAMETERS: &[Parameter] = &[
            Parameter::required("target"),
            Parameter::required("pattern"),
        ];
        PARAMETERS
    }

    fn compile(&self, mut arguments: ArgumentList<K>) -> Result<Compiled<K>> {
        let target = arguments.required_target("target")?;
        let pattern = arguments.required_regex("pattern")?;
        Ok(Compiled::Editor(Box::new(DeleteMatchingKeysFn {
            target,
            pattern,
        })))
    }
}

struct DeleteMatchingKeysFn<K: ContextKind> {
    target: Box<dyn GetSetter<K>>,
    pattern: Regex,
}

impl<K: ContextKind> Expression<K> for DeleteMatchingKeysFn<K> {
    fn resolve(&self, ctx: &mut K::Context<'_>) -> Result<Value> {
        edit_map(self.target.as_ref(), ctx, "delete_matching_keys", |map| {
            map.retain(|kv| !self.pattern.is_match(&kv.key))
        })
    }
}

// --- keep_keys ---
/// Remove every entry whose key is not listed
#[derive(Clone, Copy, Debug)]
pub struct KeepKeys;

impl<K: ContextKind> Function<K> for KeepKeys {
    fn identifier(&self) -> &'static str {
        "keep_keys"
    }

    fn parameters(&self) -> &'static [Parameter] {
        const PARAMETERS: &[Parameter] = &[
            Parameter::required("target"),
            Parameter::variadic("keys"),
        ];
        PARAMETERS
    }

    fn compile(&self, mut arguments: ArgumentList<K>) -> Result<Compiled<K>> {
        let target = arguments.required_target("target")?;
        let mut keys = Vec::new();
        while !arguments.is_empty() {
            keys.push(arguments.required_string("keys")?);
        }
        Ok(Compiled::Editor(Box::new(KeepKeysFn { target, keys })))
    }
}

struct KeepKeysFn<K: ContextKind> {
    target: Box<dyn GetSetter<K>>,
    keys: Vec<String>,
}

impl<K: ContextKind> Expression<K> for KeepKeysFn<K> {
    fn resolve(&self, ctx: &mut K::Context<'_>) -> Result<Value> {
        edit_map(self.target.as_ref(), ctx, "keep_keys", |map| {
            map.retain(|kv| self.keys.contains(&kv.key))
        })
    }
}

// --- truncate_all ---
/// Truncate every string value to at most `limit` bytes
#[derive(Clone, Copy, Debug)]
pub struct TruncateAll;

impl<K: ContextKind> Function<K> for TruncateAll {
    fn identifier(&self) -> &'static str {
        "truncate_all"
    }

    fn parameters(&self) -> &'static [Parameter] {
        const PARAMETERS: &[Parameter] = &[
            Parameter::required("target"),
            Parameter::required("limit"),
        ];
        PARAMETERS
    }

    fn compile(&self, mut arguments: ArgumentList<K>) -> Result<Compiled<K>> {
        let target = arguments.required_target("target")?;
        let limit = arguments.required_int("limit")?;
        let limit = usize::try_from(limit).map_err(|_| {
            Error::invalid_arguments("truncate_all", format!("limit {limit} cannot be negative"))
        })?;
        Ok(Compiled::Editor(Box::new(TruncateAllFn { target, limit })))
    }
}

struct TruncateAllFn<K: ContextKind> {
    target: Box<dyn GetSetter<K>>,
    limit: usize,
}

/// Largest char boundary at or below `limit`
fn floor_char_boundary(s: &str, limit: usize) -> usize {
    if limit >= s.len() {
        return s.len();
    }
    (0..=limit).rev().find(|i| s.is_char_boundary(*i)).unwrap_or(0)
}

impl<K: ContextKind> Expression<K> for TruncateAllFn<K> {
    fn resolve(&self, ctx: &mut K::Context<'_>) -> Result<Value> {
        edit_map(self.target.as_ref(), ctx, "truncate_all", |map| {
            for s in map.iter_mut().filter_map(string_value_mut) {
                let end = floor_char_boundary(s, self.limit);
                s.truncate(end);
            }
        })
    }
}

// --- limit ---
/// Keep at most `limit` entries, preferring the listed priority keys
#[derive(Clone, Copy, Debug)]
pub struct Limit;

impl<K: ContextKind> Function<K> for Limit {
    fn identifier(&self) -> &'static str {
        "limit"
    }

    fn parameters(&self) -> &'static [Parameter] {
        const PARAMETERS: &[Parameter] = &[
            Parameter::required("target"),
            Parameter::required("limit"),
            Parameter::variadic("priority_keys"),
        ];
        PARAMETERS
    }

    fn compile(&self, mut arguments: ArgumentList<K>) -> Result<Compiled<K>> {
        let target = arguments.required_target("target")?;
        let limit = arguments.required_int("limit")?;
        let limit = usize::try_from(limit).map_err(|_| {
            Error::invalid_arguments("limit", format!("limit {limit} cannot be negative"))
        })?;
        let mut priority_keys = Vec::new();
        while !arguments.is_empty() {
            priority_keys.push(arguments.required_string("priority_keys")?);
        }
        if priority_keys.len() > limit {
            return Err(Error::invalid_arguments(
                "limit",
                format!(
                    "{} priority keys exceed limit {limit}",
                    priority_keys.len()
                ),
            ));
        }
        Ok(Compiled::Editor(Box::new(LimitFn {
            target,
            limit,
            priority_keys,
        })))
    }
}

struct LimitFn<K: ContextKind> {
    target: Box<dyn GetSetter<K>>,
    limit: usize,
    priority_keys: Vec<String>,
}

impl<K: ContextKind> Expression<K> for LimitFn<K> {
    fn resolve(&self, ctx: &mut K::Context<'_>) -> Result<Value> {
        edit_map(self.target.as_ref(), ctx, "limit", |map| {
            if map.len() <= self.limit {
                return;
            }
            let prioritized = map
                .iter()
                .filter(|kv| self.priority_keys.contains(&kv.key))
                .count();
            let mut others = self.limit.saturating_sub(prioritized);
            map.retain(|kv| {
                if self.priority_keys.contains(&kv.key) {
                    return true;
                }
                if others == 0 {
                    return false;
                }
                others -= 1;
                true
            });
        })
    }
}

// --- replace_pattern ---
/// Regex replace inside one string field
#[derive(Clone, Copy, Debug)]
pub struct ReplacePattern;

impl<K: ContextKind> Function<K> for ReplacePattern {
    fn identifier(&self) -> &'static str {
        "replace_pattern"
    }

    fn parameters(&self) -> &'static [Parameter] {
        const PARAMETERS: &[Parameter] = &[
            Parameter::required("target"),
            Parameter::required("regex"),
            Parameter::required("replacement"),
        ];
        PARAMETERS
    }

    fn compile(&self, mut arguments: ArgumentList<K>) -> Result<Compiled<K>> {
        let target = arguments.required_target("target")?;
        let pattern = arguments.required_regex("regex")?;
        let replacement = arguments.required_string("replacement")?;
        Ok(Compiled::Editor(Box::new(ReplacePatternFn {
            target,
            pattern,
            replacement,
        })))
    }
}

struct ReplacePatternFn<K: ContextKind> {
    target: Box<dyn GetSetter<K>>,
    pattern: Regex,
    replacement: String,
}

impl<K: ContextKind> Expression<K> for ReplacePatternFn<K> {
    fn resolve(&self, ctx: &mut K::Context<'_>) -> Result<Value> {
        // Non-string targets are skipped.
        if let Value::Str(s) = self.target.get(ctx)? {
            if let Cow::Owned(replaced) = self.pattern.replace_all(&s, self.replacement.as_str()) {
                self.target.set(ctx, Value::Str(replaced))?;
            }
        }
        Ok(Value::Nil)
    }
}

// --- replace_all_patterns ---
/// Regex replace inside every string value of a map
#[derive(Clone, Copy, Debug)]
pub struct ReplaceAllPatterns;

impl<K: ContextKind> Function<K> for ReplaceAllPatterns {
    fn identifier(&self) -> &'static str {
        "replace_all_patterns"
    }

    fn parameters(&self) -> &'static [Parameter] {
        const PARAMETERS: &[Parameter] = &[
            Parameter::required("target"),
            Parameter::required("regex"),
            Parameter::required("replacement"),
        ];
        PARAMETERS
    }

    fn compile(&self, mut arguments: ArgumentList<K>) -> Result<Compiled<K>> {
        let target = arguments.required_target("target")?;
        let pattern = arguments.required_regex("regex")?;
        let replacement = arguments.required_string("replacement")?;
        Ok(Compiled::Editor(Box::new(ReplaceAllPatternsFn {
            target,
            pattern,
            replacement,
        })))
    }
}

struct ReplaceAllPatternsFn<K: ContextKind> {
    target: Box<dyn GetSetter<K>>,
    pattern: Regex,
    replacement: String,
}

impl<K: ContextKind> Expression<K> for ReplaceAllPatternsFn<K> {
    fn resolve(&self, ctx: &mut K::Context<'_>) -> Result<Value> {
        edit_map(self.target.as_ref(), ctx, "replace_all_patterns", |map| {
            for s in map.iter_mut().filter_map(string_value_mut) {
                let replaced = match self.pattern.replace_all(s, self.replacement.as_str()) {
                    Cow::Owned(replaced) => Some(replaced),
                    Cow::Borrowed(_) => None,
                };
                if let Some(replaced) = replaced {
                    *s = replaced;
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;
    use crate::ast::Path;
    use crate::transform::functions::BoundArgument;

    fn run(
        function: &dyn Function<Attrs>,
        arguments: Vec<BoundArgument<Attrs>>,
        ctx: &mut AttrsContext,
    ) -> Result<Value> {
        editor(function, arguments)?.resolve(ctx)
    }

    #[test]
    fn test_set_assigns_value() {
        let mut ctx = context(&[("a", Value::Int(1))]);
        run(&Set, vec![target(Some("a")), literal(2i64)], &mut ctx).unwrap();
        assert_eq!(ctx.attributes.len(), 1);
        let attrs = Attrs::parse_path(&Path::keyed("attributes", "a")).unwrap();
        assert_eq!(attrs.get(&ctx).unwrap(), Value::Int(2));
    }

    #[test]
    fn test_set_nil_is_a_no_op() {
        let mut ctx = context(&[("a", Value::Int(1))]);
        run(&Set, vec![target(Some("a")), literal(Value::Nil)], &mut ctx).unwrap();
        let attrs = Attrs::parse_path(&Path::keyed("attributes", "a")).unwrap();
        assert_eq!(attrs.get(&ctx).unwrap(), Value::Int(1));
    }

    #[test]
    fn test_set_from_another_path() {
        let mut ctx = context(&[("a", Value::from("x"))]);
        let name = BoundArgument::Path(Attrs::parse_path(&Path::field("name")).unwrap());
        run(&Set, vec![name, target(Some("a"))], &mut ctx).unwrap();
        assert_eq!(ctx.name, "x");
    }

    #[test]
    fn test_delete_key() {
        let mut ctx = context(&[("a", Value::Int(1)), ("b", Value::Int(2))]);
        run(&DeleteKey, vec![target(None), literal("a")], &mut ctx).unwrap();
        assert_eq!(keys(&ctx), vec!["b"]);
    }

    #[test]
    fn test_delete_key_on_non_map_is_type_mismatch() {
        let mut ctx = context(&[("a", Value::Int(1))]);
        let err = run(&DeleteKey, vec![target(Some("a")), literal("a")], &mut ctx).unwrap_err();
        assert!(matches!(err, Error::TypeMismatch { expected: "map", .. }));
    }

    #[test]
    fn test_delete_matching_keys() {
        let mut ctx = context(&[
            ("http.method", Value::from("GET")),
            ("http.url", Value::from("/")),
            ("db.system", Value::from("pg")),
        ]);
        run(&DeleteMatchingKeys, vec![target(None), literal("^http\\.")], &mut ctx).unwrap();
        assert_eq!(keys(&ctx), vec!["db.system"]);
    }

    #[test]
    fn test_invalid_regex_fails_binding() {
        let err = editor(&DeleteMatchingKeys, vec![target(None), literal("(")])
            .err()
            .unwrap();
        assert!(matches!(err, Error::InvalidArguments { ref function, .. } if function == "delete_matching_keys"));
    }

    #[test]
    fn test_keep_keys() {
        let mut ctx = context(&[
            ("a", Value::Int(1)),
            ("b", Value::Int(2)),
            ("c", Value::Int(3)),
        ]);
        run(&KeepKeys, vec![target(None), literal("a"), literal("c")], &mut ctx).unwrap();
        assert_eq!(keys(&ctx), vec!["a", "c"]);
    }

    #[test]
    fn test_keep_keys_with_no_keys_clears_map() {
        let mut ctx = context(&[("a", Value::Int(1))]);
        run(&KeepKeys, vec![target(None)], &mut ctx).unwrap();
        assert!(ctx.attributes.is_empty());
    }

    #[test]
    fn test_truncate_all_respects_char_boundaries() {
        let mut ctx = context(&[
            ("ascii", Value::from("abcdef")),
            ("utf8", Value::from("héllo")),
            ("int", Value::Int(123456)),
        ]);
        run(&TruncateAll, vec![target(None), literal(2i64)], &mut ctx).unwrap();
        let get = |key: &str| {
            Attrs::parse_path(&Path::keyed("attributes", key))
                .unwrap()
                .get(&ctx)
                .unwrap()
        };
        assert_eq!(get("ascii"), Value::from("ab"));
        assert_eq!(get("utf8"), Value::from("h"));
        assert_eq!(get("int"), Value::Int(123456));
    }

    #[test]
    fn test_truncate_all_rejects_negative_limit() {
        let err = editor(&TruncateAll, vec![target(None), literal(-1i64)]).err().unwrap();
        assert!(matches!(err, Error::InvalidArguments { .. }));
    }

    #[test]
    fn test_limit_keeps_first_entries() {
        let mut ctx = context(&[
            ("a", Value::Int(1)),
            ("b", Value::Int(2)),
            ("c", Value::Int(3)),
        ]);
        run(&Limit, vec![target(None), literal(2i64)], &mut ctx).unwrap();
        assert_eq!(keys(&ctx), vec!["a", "b"]);
    }

    #[test]
    fn test_limit_prefers_priority_keys() {
        let mut ctx = context(&[
            ("a", Value::Int(1)),
            ("b", Value::Int(2)),
            ("c", Value::Int(3)),
        ]);
        run(&Limit, vec![target(None), literal(2i64), literal("c")], &mut ctx).unwrap();
        assert_eq!(keys(&ctx), vec!["a", "c"]);
    }

    #[test]
    fn test_limit_rejects_too_many_priority_keys() {
        let err = editor(&Limit, vec![target(None), literal(1i64), literal("a"), literal("b")])
            .err()
            .unwrap();
        assert!(matches!(err, Error::InvalidArguments { .. }));
    }

    #[test]
    fn test_replace_pattern() {
        let mut ctx = context(&[("url", Value::from("/users/123/orders/456"))]);
        run(
            &ReplacePattern,
            vec![target(Some("url")), literal("[0-9]+"), literal("{id}")],
            &mut ctx,
        )
        .unwrap();
        let url = Attrs::parse_path(&Path::keyed("attributes", "url"))
            .unwrap()
            .get(&ctx)
            .unwrap();
        assert_eq!(url, Value::from("/users/{id}/orders/{id}"));
    }

    #[test]
    fn test_replace_pattern_skips_non_strings() {
        let mut ctx = context(&[("n", Value::Int(5))]);
        run(
            &ReplacePattern,
            vec![target(Some("n")), literal("5"), literal("6")],
            &mut ctx,
        )
        .unwrap();
        let n = Attrs::parse_path(&Path::keyed("attributes", "n"))
            .unwrap()
            .get(&ctx)
            .unwrap();
        assert_eq!(n, Value::Int(5));
    }

    #[test]
    fn test_replace_all_patterns() {
        let mut ctx = context(&[
            ("a", Value::from("secret=1")),
            ("b", Value::from("secret=2")),
            ("c", Value::Int(3)),
        ]);
        run(
            &ReplaceAllPatterns,
            vec![target(None), literal("secret=\\d"), literal("secret=***")],
            &mut ctx,
        )
        .unwrap();
        let map = Attrs::parse_path(&Path::field("attributes"))
            .unwrap()
            .get(&ctx)
            .unwrap();
        let Value::Map(map) = map else {
            panic!("map expected");
        };
        let values: Vec<Value> = map
            .iter()
            .map(|kv| Value::from(kv.value.as_ref().unwrap()))
            .collect();
        assert_eq!(
            values,
            vec![
                Value::from("secret=***"),
                Value::from("secret=***"),
                Value::Int(3)
            ]
        );
    }
}
