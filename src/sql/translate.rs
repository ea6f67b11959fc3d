//! Operator translators
//!
//! Each operator maps a resolved target to an `SqlExpr`, a constant, or
//! `None` when SQL cannot express it faithfully.
//!
//! Candidate semantics: an operator holds when it holds for the field value
//! itself or, when the value is an array, for any of its direct elements.
//! The array branch depends on the declared type:
//!
//! - declared array: `EXISTS(SELECT 1 FROM json_each(..) AS jN WHERE p(jN))`
//! - declared scalar or object: no array branch
//! - unknown: `p(v) OR (json_type(..) = 'array' AND EXISTS(..))`
//!
//! Values are only compared within their type class. Type guards
//! (`json_type(..) = 'text'`, `IN ('integer', 'real')`) are elided when the
//! schema already declares the matching type. Booleans compare by type tag,
//! never by value, because the store extracts `true` as integer 1.

use serde_json::Value;

use crate::schema::{FieldType, IndexKind};
use crate::selector::{CmpOp, ElemMatch, FieldOp, RegexSpec, TypeTag};

use super::compiler::Compiler;
use super::fragment::SqlExpr;
use super::location::{literal, Scope, Target};
use super::regex::{plan_regex, PatternClass};
use super::value::SqlValue;

static UNKNOWN: FieldType = FieldType::Unknown;

/// Scalar predicate applied to one candidate
type Predicate<'p, 'a> = &'p dyn Fn(&Compiler<'a>, &Target<'a>) -> Option<SqlExpr>;

impl<'a> Compiler<'a> {
    pub(crate) fn op(&mut self, t: &Target<'a>, op: &FieldOp) -> Option<SqlExpr> {
        match op {
            FieldOp::Eq(operand) => self.eq(t, operand),
            FieldOp::Ne(operand) => self.eq(t, operand).map(SqlExpr::not),
            FieldOp::Cmp(cmp, operand) => self.cmp(t, *cmp, operand),
            FieldOp::In(values) => self.in_list(t, values),
            FieldOp::Nin(values) => self.in_list(t, values).map(SqlExpr::not),
            FieldOp::Exists(expected) => Some(exists(t, *expected)),
            FieldOp::Type(tags) => self.type_of(t, tags),
            FieldOp::Size(n) => Some(size(t, n)),
            FieldOp::Mod {
                divisor,
                remainder,
            } => self.modulo(t, *divisor, *remainder),
            FieldOp::Regex(spec) => self.regex(t, spec),
            FieldOp::ElemMatch(criteria) => self.elem_match(t, criteria),
            FieldOp::Not(ops) => self.ops(t, ops).map(SqlExpr::not),
            FieldOp::Never => Some(SqlExpr::Const(false)),
        }
    }

    /// Predicate over the value and its direct elements
    fn any_candidate(&mut self, t: &Target<'a>, pred: Predicate<'_, 'a>) -> Option<SqlExpr> {
        let direct = if t.declared.is_array() {
            SqlExpr::Const(false)
        } else {
            pred(self, t)?
        };
        let elements = self.element_branch(t, pred)?;
        Some(SqlExpr::or(vec![direct, elements]))
    }

    /// Predicate over the direct elements only
    fn element_branch(&mut self, t: &Target<'a>, pred: Predicate<'_, 'a>) -> Option<SqlExpr> {
        let (items, guarded) = match t.declared {
            FieldType::Array { items } => (&**items, false),
            FieldType::Unknown => (&UNKNOWN, true),
            _ => return Some(SqlExpr::Const(false)),
        };
        let alias = self.next_alias();
        let element = Target::element(&alias, t.doc_column(), items);
        let inner = pred(self, &element)?;
        let scan = SqlExpr::exists(&t.each(), &alias, inner);
        if guarded {
            Some(SqlExpr::and(vec![is_array(t), scan]))
        } else {
            Some(scan)
        }
    }

    fn eq(&mut self, t: &Target<'a>, operand: &Value) -> Option<SqlExpr> {
        match operand {
            Value::Null => self.eq_null(t),
            Value::Array(_) | Value::Object(_) => None,
            scalar => self.any_candidate(t, &|_, c| scalar_eq(c, scalar)),
        }
    }

    /// Missing, null, or an array holding null
    fn eq_null(&mut self, t: &Target<'a>) -> Option<SqlExpr> {
        let is_null = SqlExpr::strict(format!("{} IS NULL", t.value()), vec![]);
        let elements = self.element_branch(t, &|_, c| Some(type_in(c, &["null"])))?;
        Some(SqlExpr::or(vec![is_null, elements]))
    }

    fn cmp(&mut self, t: &Target<'a>, op: CmpOp, operand: &Value) -> Option<SqlExpr> {
        let (guard, arg): (fn(&Target<'_>) -> SqlExpr, SqlValue) = match operand {
            Value::String(s) => (text_guard, SqlValue::text(s.as_str())),
            Value::Number(n) => (number_guard, SqlValue::from_number(n)),
            _ => return None,
        };
        self.any_candidate(t, &|_, c| {
            Some(SqlExpr::and(vec![
                guard(c),
                SqlExpr::leaf(format!("{} {} ?", c.value(), op.sql()), vec![arg.clone()]),
            ]))
        })
    }

    /// `$in` binds one JSON array per value class, so the statement text does
    /// not depend on the list length.
    fn in_list(&mut self, t: &Target<'a>, values: &[Value]) -> Option<SqlExpr> {
        let mut has_null = false;
        let mut strings = Vec::new();
        let mut numbers = Vec::new();
        let mut bools: Vec<&'static str> = Vec::new();

        for value in values {
            match value {
                Value::Null => has_null = true,
                Value::String(_) => strings.push(value.clone()),
                Value::Number(_) => numbers.push(value.clone()),
                Value::Bool(true) => bools.push("true"),
                Value::Bool(false) => bools.push("false"),
                Value::Array(_) | Value::Object(_) => return None,
            }
        }
        bools.sort_unstable();
        bools.dedup();

        let mut parts = Vec::new();
        if has_null {
            parts.push(self.eq_null(t)?);
        }
        if !strings.is_empty() || !numbers.is_empty() || !bools.is_empty() {
            let strings = (!strings.is_empty()).then(|| Value::Array(strings).to_string());
            let numbers = (!numbers.is_empty()).then(|| Value::Array(numbers).to_string());
            parts.push(self.any_candidate(t, &|_, c| {
                let mut alternatives = Vec::new();
                if let Some(list) = &strings {
                    alternatives.push(SqlExpr::and(vec![text_guard(c), member_of(c, list)]));
                }
                if let Some(list) = &numbers {
                    alternatives.push(SqlExpr::and(vec![number_guard(c), member_of(c, list)]));
                }
                if !bools.is_empty() {
                    alternatives.push(type_in(c, &bools));
                }
                Some(SqlExpr::or(alternatives))
            })?);
        }
        Some(SqlExpr::or(parts))
    }

    fn type_of(&mut self, t: &Target<'a>, tags: &[TypeTag]) -> Option<SqlExpr> {
        let names: Vec<&'static str> = tags
            .iter()
            .flat_map(|tag| tag.sql_names().iter().copied())
            .collect();
        let direct = type_in(t, &names);
        let elements = self.element_branch(t, &|_, c| Some(type_in(c, &names)))?;
        Some(SqlExpr::or(vec![direct, elements]))
    }

    fn modulo(&mut self, t: &Target<'a>, divisor: i64, remainder: i64) -> Option<SqlExpr> {
        self.any_candidate(t, &|_, c| {
            let v = c.value();
            Some(SqlExpr::and(vec![
                number_guard(c),
                SqlExpr::leaf(
                    format!("({v} - (CAST({v} / ? AS INTEGER) * ?)) = ?", v = v),
                    vec![
                        SqlValue::Integer(divisor),
                        SqlValue::Integer(divisor),
                        SqlValue::Integer(remainder),
                    ],
                ),
            ]))
        })
    }

    fn regex(&mut self, t: &Target<'a>, spec: &RegexSpec) -> Option<SqlExpr> {
        let class = self.classify_regex(t, spec);
        if class == PatternClass::Irreducible {
            return None;
        }
        let case_insensitive = spec.case_insensitive();
        self.any_candidate(t, &|compiler, c| {
            let lower_index = c
                .index_path
                .as_deref()
                .map_or(false, |path| compiler.schema.has_index(path, IndexKind::Lowercase));
            Some(SqlExpr::and(vec![
                text_guard(c),
                regex_leaf(c, &class, case_insensitive, lower_index),
            ]))
        })
    }

    fn classify_regex(&self, t: &Target<'a>, spec: &RegexSpec) -> PatternClass {
        let cache = match self.regex_cache {
            Some(cache) => cache,
            None => return plan_regex(spec),
        };
        let field = t.index_path.as_deref().unwrap_or("");
        let (class, hit) = cache.classify(field, spec, self.schema.version);
        if let Some(metrics) = self.metrics {
            if hit {
                metrics.increment_regex_cache_hits();
            } else {
                metrics.increment_regex_cache_misses();
            }
        }
        class
    }

    fn elem_match(&mut self, t: &Target<'a>, criteria: &ElemMatch) -> Option<SqlExpr> {
        let items: &'a FieldType = match t.declared {
            FieldType::Array { items } => &**items,
            FieldType::Unknown => &UNKNOWN,
            _ => return Some(SqlExpr::Const(false)),
        };
        let alias = self.next_alias();
        let inner = match criteria {
            ElemMatch::Ops(ops) => {
                let element = Target::element(&alias, t.doc_column(), items);
                self.ops(&element, ops)?
            }
            ElemMatch::Document(selector) => {
                let scope = Scope::Element {
                    alias: alias.clone(),
                    item: items,
                };
                self.selector(selector, &scope)?
            }
            ElemMatch::Unsupported(_) => return None,
        };
        // json_each also walks objects and yields scalars as one row
        Some(SqlExpr::and(vec![
            is_array(t),
            SqlExpr::exists(&t.each(), &alias, inner),
        ]))
    }
}

fn scalar_eq(c: &Target<'_>, operand: &Value) -> Option<SqlExpr> {
    match operand {
        Value::String(s) => Some(SqlExpr::and(vec![
            text_guard(c),
            SqlExpr::leaf(format!("{} = ?", c.value()), vec![SqlValue::text(s.as_str())]),
        ])),
        Value::Number(n) => Some(SqlExpr::and(vec![
            number_guard(c),
            SqlExpr::leaf(format!("{} = ?", c.value()), vec![SqlValue::from_number(n)]),
        ])),
        Value::Bool(true) => Some(type_in(c, &["true"])),
        Value::Bool(false) => Some(type_in(c, &["false"])),
        _ => None,
    }
}

fn exists(t: &Target<'_>, expected: bool) -> SqlExpr {
    if t.required {
        return SqlExpr::Const(expected);
    }
    let check = if expected { "IS NOT NULL" } else { "IS NULL" };
    SqlExpr::strict(format!("{} {}", t.type_tag(), check), vec![])
}

/// `$size` only applies to arrays; a field declared as anything else never
/// matches.
fn size(t: &Target<'_>, n: &serde_json::Number) -> SqlExpr {
    match t.declared {
        FieldType::Array { .. } | FieldType::Unknown => SqlExpr::and(vec![
            is_array(t),
            SqlExpr::leaf(
                format!("{} = ?", t.array_length()),
                vec![SqlValue::from_number(n)],
            ),
        ]),
        _ => SqlExpr::Const(false),
    }
}

fn regex_leaf(c: &Target<'_>, class: &PatternClass, case_insensitive: bool, lower_index: bool) -> SqlExpr {
    let v = c.value();
    let escape = literal("\\");
    match (class, case_insensitive, lower_index) {
        (PatternClass::Exact(lit), false, _) => {
            SqlExpr::leaf(format!("{} = ?", v), vec![SqlValue::text(lit.as_str())])
        }
        (PatternClass::Exact(lit), true, true) => SqlExpr::leaf(
            format!("lower({}) = ?", v),
            vec![SqlValue::Text(lit.to_ascii_lowercase())],
        ),
        (PatternClass::Exact(lit), true, false) => SqlExpr::leaf(
            format!("{} = ? COLLATE NOCASE", v),
            vec![SqlValue::text(lit.as_str())],
        ),
        (like, ci, index) => {
            let pattern = like.like_pattern().unwrap_or_default();
            match (ci, index) {
                (false, _) => SqlExpr::leaf(
                    format!("{} LIKE ? ESCAPE {}", v, escape),
                    vec![SqlValue::Text(pattern)],
                ),
                (true, true) => SqlExpr::leaf(
                    format!("lower({}) LIKE ? ESCAPE {}", v, escape),
                    vec![SqlValue::Text(pattern.to_ascii_lowercase())],
                ),
                (true, false) => SqlExpr::leaf(
                    format!("lower({}) LIKE lower(?) ESCAPE {}", v, escape),
                    vec![SqlValue::Text(pattern)],
                ),
            }
        }
    }
}

fn text_guard(c: &Target<'_>) -> SqlExpr {
    match c.declared {
        FieldType::String => SqlExpr::Const(true),
        _ => type_in(c, &["text"]),
    }
}

fn number_guard(c: &Target<'_>) -> SqlExpr {
    match c.declared {
        FieldType::Number => SqlExpr::Const(true),
        _ => type_in(c, &["integer", "real"]),
    }
}

fn is_array(t: &Target<'_>) -> SqlExpr {
    type_in(t, &["array"])
}

/// Type tag comparison; NULL when the path is missing
fn type_in(c: &Target<'_>, names: &[&str]) -> SqlExpr {
    let ty = c.type_tag();
    match names {
        [one] => SqlExpr::leaf(format!("{} = {}", ty, literal(one)), vec![]),
        many => {
            let list: Vec<String> = many.iter().map(|name| literal(name)).collect();
            SqlExpr::leaf(format!("{} IN ({})", ty, list.join(", ")), vec![])
        }
    }
}

fn member_of(c: &Target<'_>, json_list: &str) -> SqlExpr {
    SqlExpr::leaf(
        format!("{} IN (SELECT value FROM json_each(?))", c.value()),
        vec![SqlValue::text(json_list)],
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{FieldDef, IndexDef, SchemaInfo};
    use crate::selector::parse_field_operand;
    use crate::sql::compiler::{translate_operator, Translation};
    use crate::sql::location::DocumentLayout;
    use serde_json::json;

    fn schema() -> SchemaInfo {
        SchemaInfo::new(1)
            .with_field("age", FieldDef::optional_number())
            .with_field("name", FieldDef::required_string())
            .with_field("nick", FieldDef::optional_string())
            .with_field("flag", FieldDef::optional_boolean())
            .with_field("tags", FieldDef::optional_array(FieldType::String))
            .with_field(
                "address",
                FieldDef::optional(FieldType::object_of([("city", FieldDef::optional_string())])),
            )
            .with_index(IndexDef::lowercase("nick"))
    }

    fn translate_json(path: &str, operand: serde_json::Value) -> Translation {
        let ops = parse_field_operand(&operand);
        assert_eq!(ops.len(), 1, "one operator expected");
        translate_operator(path, &ops[0], &schema(), &DocumentLayout::default())
    }

    fn sql_of(path: &str, operand: serde_json::Value) -> String {
        match translate_json(path, operand) {
            Translation::Sql(fragment) => {
                assert_eq!(fragment.placeholder_count(), fragment.args.len());
                fragment.sql
            }
            other => panic!("expected SQL, got {:?}", other),
        }
    }

    #[test]
    fn test_eq_declared_scalar_skips_guard() {
        assert_eq!(sql_of("age", json!(5)), "json_extract(data, '$.age') = ?");
    }

    #[test]
    fn test_eq_unknown_field_has_array_branch() {
        assert_eq!(
            sql_of("other", json!("x")),
            "((json_type(data, '$.other') = 'text' AND json_extract(data, '$.other') = ?) OR \
             (json_type(data, '$.other') = 'array' AND EXISTS(SELECT 1 FROM json_each(data, '$.other') AS j1 \
             WHERE j1.type = 'text' AND j1.value = ?)))"
        );
    }

    #[test]
    fn test_eq_declared_array_is_membership() {
        assert_eq!(
            sql_of("tags", json!("x")),
            "EXISTS(SELECT 1 FROM json_each(data, '$.tags') AS j1 WHERE j1.value = ?)"
        );
    }

    #[test]
    fn test_eq_bool_uses_type_tag() {
        assert_eq!(
            sql_of("flag", json!(true)),
            "json_type(data, '$.flag') = 'true'"
        );
    }

    #[test]
    fn test_eq_null() {
        assert_eq!(
            sql_of("age", json!(null)),
            "json_extract(data, '$.age') IS NULL"
        );
        assert_eq!(
            sql_of("tags", json!(null)),
            "((json_extract(data, '$.tags') IS NULL) OR \
             (EXISTS(SELECT 1 FROM json_each(data, '$.tags') AS j1 WHERE j1.type = 'null')))"
        );
    }

    #[test]
    fn test_eq_document_operand_declines() {
        assert!(translate_json("address", json!({"$eq": {"city": "x"}})).is_decline());
        assert!(translate_json("tags", json!({"$eq": ["a"]})).is_decline());
    }

    #[test]
    fn test_ne_coalesces() {
        assert_eq!(
            sql_of("age", json!({"$ne": 5})),
            "NOT COALESCE(json_extract(data, '$.age') = ?, 0)"
        );
    }

    #[test]
    fn test_cmp_non_comparable_declines() {
        assert!(translate_json("age", json!({"$gt": true})).is_decline());
        assert!(translate_json("age", json!({"$gt": [1]})).is_decline());
        assert!(translate_json("age", json!({"$lt": null})).is_decline());
    }

    #[test]
    fn test_cmp_string_on_number_field_is_guarded_by_type() {
        assert_eq!(
            sql_of("address.city", json!({"$gte": "m"})),
            "json_extract(data, '$.address.city') >= ?"
        );
        assert_eq!(
            sql_of("age", json!({"$gte": "m"})),
            "json_type(data, '$.age') = 'text' AND json_extract(data, '$.age') >= ?"
        );
    }

    #[test]
    fn test_in_binds_one_array() {
        let out = translate_json("age", json!({"$in": [1, 2, 3]}));
        let fragment = out.fragment().unwrap();
        assert_eq!(
            fragment.sql,
            "json_extract(data, '$.age') IN (SELECT value FROM json_each(?))"
        );
        assert_eq!(fragment.args, vec![SqlValue::text("[1,2,3]")]);
    }

    #[test]
    fn test_in_edge_cases() {
        assert_eq!(translate_json("age", json!({"$in": []})), Translation::AlwaysFalse);
        assert_eq!(translate_json("age", json!({"$nin": []})), Translation::AlwaysTrue);
        assert_eq!(
            sql_of("age", json!({"$in": [null]})),
            "json_extract(data, '$.age') IS NULL"
        );
        assert!(translate_json("age", json!({"$in": [[1]]})).is_decline());
    }

    #[test]
    fn test_in_with_null_and_values() {
        assert_eq!(
            sql_of("age", json!({"$in": [null, 4]})),
            "((json_extract(data, '$.age') IS NULL) OR \
             (json_extract(data, '$.age') IN (SELECT value FROM json_each(?))))"
        );
    }

    #[test]
    fn test_exists() {
        assert_eq!(translate_json("name", json!({"$exists": true})), Translation::AlwaysTrue);
        assert_eq!(translate_json("name", json!({"$exists": false})), Translation::AlwaysFalse);
        assert_eq!(
            sql_of("age", json!({"$exists": false})),
            "json_type(data, '$.age') IS NULL"
        );
    }

    #[test]
    fn test_type() {
        assert_eq!(
            sql_of("age", json!({"$type": "number"})),
            "json_type(data, '$.age') IN ('integer', 'real')"
        );
        assert_eq!(
            sql_of("tags", json!({"$type": "string"})),
            "((json_type(data, '$.tags') = 'text') OR \
             (EXISTS(SELECT 1 FROM json_each(data, '$.tags') AS j1 WHERE j1.type = 'text')))"
        );
    }

    #[test]
    fn test_size_schema_protection() {
        for operand in [json!(2), json!(-1), json!(1.5), json!("x")] {
            assert_eq!(
                translate_json("name", json!({"$size": operand})),
                Translation::AlwaysFalse
            );
        }
        assert_eq!(
            sql_of("tags", json!({"$size": 2})),
            "json_type(data, '$.tags') = 'array' AND json_array_length(data, '$.tags') = ?"
        );
    }

    #[test]
    fn test_mod() {
        let out = translate_json("age", json!({"$mod": [4, 1]}));
        let fragment = out.fragment().unwrap();
        assert_eq!(
            fragment.sql,
            "(json_extract(data, '$.age') - (CAST(json_extract(data, '$.age') / ? AS INTEGER) * ?)) = ?"
        );
        assert_eq!(
            fragment.args,
            vec![SqlValue::Integer(4), SqlValue::Integer(4), SqlValue::Integer(1)]
        );
    }

    #[test]
    fn test_regex_prefix_and_irreducible() {
        let out = translate_json("name", json!({"$regex": "^Jo_"}));
        let fragment = out.fragment().unwrap();
        assert_eq!(fragment.sql, "json_extract(data, '$.name') LIKE ? ESCAPE '\\'");
        assert_eq!(fragment.args, vec![SqlValue::text("Jo\\_%")]);

        assert!(translate_json("name", json!({"$regex": "[A-Z]{3}"})).is_decline());
        assert!(translate_json("name", json!({"$regex": "^a", "$options": "m"})).is_decline());
    }

    #[test]
    fn test_regex_case_insensitive_forms() {
        assert_eq!(
            sql_of("nick", json!({"$regex": "^Bo$", "$options": "i"})),
            "lower(json_extract(data, '$.nick')) = ?"
        );
        assert_eq!(
            sql_of("name", json!({"$regex": "^Bo$", "$options": "i"})),
            "json_extract(data, '$.name') = ? COLLATE NOCASE"
        );
        assert_eq!(
            sql_of("nick", json!({"$regex": "Bo", "$options": "i"})),
            "lower(json_extract(data, '$.nick')) LIKE ? ESCAPE '\\'"
        );
        assert_eq!(
            sql_of("name", json!({"$regex": "Bo", "$options": "i"})),
            "lower(json_extract(data, '$.name')) LIKE lower(?) ESCAPE '\\'"
        );
    }

    #[test]
    fn test_elem_match() {
        assert_eq!(
            sql_of("tags", json!({"$elemMatch": {"$regex": "^a"}})),
            "json_type(data, '$.tags') = 'array' AND \
             EXISTS(SELECT 1 FROM json_each(data, '$.tags') AS j1 WHERE j1.value LIKE ? ESCAPE '\\')"
        );
        assert_eq!(
            sql_of("items", json!({"$elemMatch": {"qty": {"$gt": 2}}})),
            "json_type(data, '$.items') = 'array' AND \
             EXISTS(SELECT 1 FROM json_each(data, '$.items') AS j1 WHERE \
             ((json_type(data, j1.fullkey || '.qty') IN ('integer', 'real') AND \
             json_extract(data, j1.fullkey || '.qty') > ?) OR \
             (json_type(data, j1.fullkey || '.qty') = 'array' AND \
             EXISTS(SELECT 1 FROM json_each(data, j1.fullkey || '.qty') AS j2 WHERE \
             j2.type IN ('integer', 'real') AND j2.value > ?))))"
        );
        assert_eq!(
            translate_json("age", json!({"$elemMatch": {"$gt": 1}})),
            Translation::AlwaysFalse
        );
    }

    #[test]
    fn test_field_not() {
        assert_eq!(
            sql_of("age", json!({"$not": {"$gt": 3}})),
            "NOT COALESCE(json_extract(data, '$.age') > ?, 0)"
        );
        assert!(translate_json("name", json!({"$not": {"$regex": "a+"}})).is_decline());
    }

    #[test]
    fn test_numeric_segment_on_unknown_declines() {
        assert!(translate_json("other.0", json!(1)).is_decline());
        assert_eq!(
            sql_of("tags.0", json!("a")),
            "json_extract(data, '$.tags[0]') = ?"
        );
    }
}
