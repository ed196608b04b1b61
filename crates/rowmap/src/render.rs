//! Rendering of filter and update descriptors into SQL fragments.
//!
//! Literal values always pass through [`Value::to_sql_literal`], so the only injection surface
//! is the raw fragments a caller explicitly hands in.

use crate::error::{OrmError, OrmResult};
use crate::escape;
use crate::filter::{
    AssignmentEntry, Assignments, BoolOp, Datum, FilterEntry, FilterValue, Filters,
};
use crate::ident;
use crate::value::Value;

/// The always-true predicate.
pub const TRUE_PREDICATE: &str = "1";

/// Render a `WHERE`-ready predicate.
///
/// Empty filters, and filters whose every entry drops out (null scalars, empty membership
/// sets), render as [`TRUE_PREDICATE`].
pub fn render_predicate(filters: &Filters, op: BoolOp) -> OrmResult<String> {
    let mut predicates = Vec::with_capacity(filters.len());
    for entry in filters.entries() {
        match entry {
            FilterEntry::Positional(sql) => predicates.push(sql.clone()),
            FilterEntry::Named { column, value } => {
                if let Some(predicate) = render_condition(column, value)? {
                    predicates.push(predicate);
                }
            }
        }
    }

    if predicates.is_empty() {
        return Ok(TRUE_PREDICATE.to_string());
    }

    let separator = format!(" {} ", op.as_sql());
    Ok(predicates.join(&separator))
}

/// Render one named predicate, or `None` when it imposes no constraint.
fn render_condition(column: &str, value: &FilterValue) -> OrmResult<Option<String>> {
    let column = ident::column(column)?;
    let predicate = match value {
        FilterValue::Raw(sql) => format!("{column} = {sql}"),
        FilterValue::Scalar(Value::Null) => return Ok(None),
        FilterValue::Scalar(value) => format!("{column} = {}", value.to_sql_literal()?),
        FilterValue::IsNull => format!("{column} IS NULL"),
        FilterValue::NotNull => format!("{column} IS NOT NULL"),
        FilterValue::InSet(values) => {
            let items = render_set(values)?;
            match items.as_slice() {
                [] => return Ok(None),
                [single] => format!("{column} = {single}"),
                _ => format!("{column} IN ({})", items.join(", ")),
            }
        }
        FilterValue::NotInSet(values) => {
            let items = render_set(values)?;
            if items.is_empty() {
                return Ok(None);
            }
            format!("{column} NOT IN ({})", items.join(", "))
        }
    };
    Ok(Some(predicate))
}

fn render_set(values: &[Value]) -> OrmResult<Vec<String>> {
    values
        .iter()
        .filter(|value| !value.is_null())
        .map(Value::to_sql_literal)
        .collect()
}

/// Render a `SET`-ready assignment list.
///
/// Returns an empty string for empty data; callers issuing `UPDATE`/`INSERT` must reject that.
pub fn render_assignment(data: &Assignments) -> OrmResult<String> {
    let mut pairs = Vec::with_capacity(data.len());
    for entry in data.entries() {
        match entry {
            AssignmentEntry::Positional(sql) => pairs.push(sql.clone()),
            AssignmentEntry::Named { column, value } => {
                let column = ident::column(column)?;
                let value = match value {
                    Datum::Raw(sql) => sql.clone(),
                    Datum::Scalar(value) => value.to_sql_literal()?,
                };
                pairs.push(format!("{column} = {value}"));
            }
        }
    }
    Ok(pairs.join(", "))
}

/// `` `column` IN (SELECT `id` FROM `table` WHERE <filters>) ``, for use as a positional entry.
pub fn where_in_subquery(
    column: &str,
    table: &str,
    filters: &Filters,
    op: BoolOp,
) -> OrmResult<String> {
    Ok(format!(
        "{} IN (SELECT `id` FROM {} WHERE {})",
        ident::column(column)?,
        ident::table(table)?,
        render_predicate(filters, op)?
    ))
}

/// Full-text-ish search over `columns` with `LIKE`.
///
/// Each word of `query` must appear in at least one column; words are joined with `AND` when
/// `all_words` is set and with `OR` otherwise. Returns `None` when there is nothing to search.
pub fn search_expression(
    query: &str,
    all_words: bool,
    columns: &[&str],
) -> OrmResult<Option<String>> {
    let words: Vec<&str> = query.split_whitespace().collect();
    if words.is_empty() || columns.is_empty() {
        return Ok(None);
    }

    let columns = columns
        .iter()
        .map(|column| ident::column(column))
        .collect::<OrmResult<Vec<_>>>()?;

    let groups: Vec<String> = words
        .iter()
        .map(|word| {
            let pattern = escape::escape_like(word);
            let alternatives: Vec<String> = columns
                .iter()
                .map(|column| format!("{column} LIKE '%{pattern}%'"))
                .collect();
            format!("({})", alternatives.join(" OR "))
        })
        .collect();

    let separator = if all_words { " AND " } else { " OR " };
    Ok(Some(format!("({})", groups.join(separator))))
}

/// Reject an empty `SET` list before any SQL is sent.
pub(crate) fn require_assignments(data: &Assignments, statement: &str) -> OrmResult<String> {
    let sql = render_assignment(data)?;
    if sql.is_empty() {
        return Err(OrmError::malformed(format!(
            "{statement} requires at least one assignment"
        )));
    }
    Ok(sql)
}
