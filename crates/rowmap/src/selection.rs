//! Selection and pagination descriptors.
//!
//! [`SelectParams`] is what the executor consumes. [`Selection`] is the validated, user-facing
//! variant: it clamps limits, checks the sort column against an allow-list, and does page math
//! once the caller knows the total row count.

use crate::error::{OrmError, OrmResult};
use serde::Deserialize;
use std::fmt;
use std::str::FromStr;

/// Sort direction for `ORDER BY`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    pub fn as_sql(self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

impl fmt::Display for SortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

impl FromStr for SortDirection {
    type Err = OrmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ASC" => Ok(SortDirection::Asc),
            "DESC" => Ok(SortDirection::Desc),
            other => Err(OrmError::configuration(format!(
                "Unknown sort direction: {other} (expected ASC or DESC)"
            ))),
        }
    }
}

/// Limit/offset/order parameters for a `SELECT`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectParams {
    pub limit: Option<u64>,
    pub offset: Option<u64>,
    /// Column for `ORDER BY`, quoted when rendered.
    pub order_by: Option<String>,
    /// Direction for `order_by`; `ASC` when absent.
    pub direction: Option<SortDirection>,
    /// Trusted `ORDER BY` expression; takes precedence over `order_by`.
    pub order_by_raw: Option<String>,
    /// Trusted select list replacing `*`.
    pub columns_raw: Option<String>,
}

impl SelectParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }

    pub fn order_by(mut self, column: impl Into<String>, direction: SortDirection) -> Self {
        self.order_by = Some(column.into());
        self.direction = Some(direction);
        self
    }

    pub fn order_by_raw(mut self, sql: impl Into<String>) -> Self {
        self.order_by_raw = Some(sql.into());
        self
    }

    pub fn columns_raw(mut self, sql: impl Into<String>) -> Self {
        self.columns_raw = Some(sql.into());
        self
    }
}

/// A validated selection window with pagination bookkeeping.
///
/// # Example
/// ```ignore
/// let mut selection = Selection::new()
///     .with_limit_max(50)?
///     .with_order_columns(["id", "creation_date"]);
/// selection.set_limit(200, false)?; // clamped to 50
/// selection.set_order(Some("creation_date"))?;
/// selection.set_total_amount(db.count::<User>(None)?);
/// selection.set_page(3)?;
/// let users = db.select_rows::<User>(Some(&selection), None)?;
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    total_amount: Option<u64>,
    limit: Option<u64>,
    offset: Option<u64>,
    order: Option<String>,
    direction: Option<SortDirection>,
    limit_max: Option<u64>,
    /// Allowed sort keys: public name → column.
    order_variants: Option<Vec<(String, String)>>,
}

impl Selection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cap the limit; the current limit starts at the cap. A zero cap is rejected.
    pub fn with_limit_max(mut self, limit_max: u64) -> OrmResult<Self> {
        if limit_max == 0 {
            return Err(OrmError::configuration("Limit cap must be greater than zero"));
        }
        self.limit_max = Some(limit_max);
        self.limit = Some(limit_max);
        Ok(self)
    }

    /// Allow sorting by these columns.
    pub fn with_order_columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let variants = self.order_variants.get_or_insert_with(Vec::new);
        for column in columns {
            let column = column.into();
            variants.push((column.clone(), column));
        }
        self
    }

    /// Allow sorting by public names mapped to columns, e.g. `("newest", "creation_date")`.
    pub fn with_order_aliases<I, K, V>(mut self, aliases: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let variants = self.order_variants.get_or_insert_with(Vec::new);
        variants.extend(
            aliases
                .into_iter()
                .map(|(name, column)| (name.into(), column.into())),
        );
        self
    }

    /// A selection without a cap whose only allowed order column is `order`.
    pub fn make(
        limit: Option<u64>,
        offset: Option<u64>,
        order: Option<&str>,
        direction: Option<SortDirection>,
    ) -> OrmResult<Self> {
        let mut selection = Self::new();
        if let Some(order) = order {
            selection = selection.with_order_columns([order]);
        }
        if let Some(limit) = limit {
            selection.set_limit(limit, false)?;
        }
        selection.set_offset(offset);
        selection.set_order(order)?;
        selection.set_direction(direction);
        Ok(selection)
    }

    pub fn limit(&self) -> Option<u64> {
        self.limit
    }

    pub fn limit_max(&self) -> Option<u64> {
        self.limit_max
    }

    /// Set the limit, clamped to the cap unless `bypass_max`.
    pub fn set_limit(&mut self, limit: u64, bypass_max: bool) -> OrmResult<&mut Self> {
        if limit == 0 {
            return Err(OrmError::configuration("Limit must be greater than zero"));
        }
        self.limit = Some(match self.limit_max {
            Some(max) if !bypass_max && limit > max => max,
            _ => limit,
        });
        Ok(self)
    }

    pub fn clear_limit(&mut self) -> &mut Self {
        self.limit = None;
        self
    }

    pub fn offset(&self) -> Option<u64> {
        self.offset
    }

    pub fn set_offset(&mut self, offset: Option<u64>) -> &mut Self {
        self.offset = offset;
        self
    }

    /// The column to sort by, with aliases resolved.
    pub fn order(&self) -> Option<&str> {
        let order = self.order.as_deref()?;
        let column = self.order_variants.as_ref().and_then(|variants| {
            variants
                .iter()
                .find(|(name, _)| name == order)
                .map(|(_, column)| column.as_str())
        });
        Some(column.unwrap_or(order))
    }

    /// Set the sort key; rejected when an allow-list exists and neither a public name nor a
    /// column in it matches.
    pub fn set_order(&mut self, order: Option<&str>) -> OrmResult<&mut Self> {
        if let (Some(order), Some(variants)) = (order, &self.order_variants) {
            let known = variants
                .iter()
                .any(|(name, column)| name == order || column == order);
            if !known {
                return Err(OrmError::configuration(format!("Unknown order field: {order}")));
            }
        }
        self.order = order.map(str::to_string);
        Ok(self)
    }

    pub fn direction(&self) -> Option<SortDirection> {
        self.direction
    }

    pub fn set_direction(&mut self, direction: Option<SortDirection>) -> &mut Self {
        self.direction = direction;
        self
    }

    pub fn total_amount(&self) -> Option<u64> {
        self.total_amount
    }

    pub fn set_total_amount(&mut self, total_amount: u64) -> &mut Self {
        self.total_amount = Some(total_amount);
        self
    }

    fn page_inputs(&self) -> OrmResult<(u64, u64)> {
        let limit = self
            .limit
            .ok_or_else(|| OrmError::configuration("Limit must be set for page math"))?;
        let total = self
            .total_amount
            .ok_or_else(|| OrmError::configuration("Total amount must be set for page math"))?;
        Ok((limit, total))
    }

    /// Current 1-based page.
    pub fn page(&self) -> OrmResult<u64> {
        let (limit, _) = self.page_inputs()?;
        Ok(self.offset.unwrap_or(0) / limit + 1)
    }

    pub fn pages_count(&self) -> OrmResult<u64> {
        let (limit, total) = self.page_inputs()?;
        Ok(total.div_ceil(limit))
    }

    /// Move to `page` (1-based) and return the page actually selected.
    ///
    /// Pages past the end clamp to the last page; with no rows at all the offset resets to 0.
    pub fn set_page(&mut self, page: u64) -> OrmResult<u64> {
        let (limit, total) = self.page_inputs()?;
        if page == 0 {
            return Err(OrmError::configuration("Pages are numbered from 1"));
        }
        if total == 0 {
            self.offset = Some(0);
            return Ok(1);
        }

        let offset = limit.saturating_mul(page - 1);
        let page = if offset >= total {
            total.div_ceil(limit)
        } else {
            page
        };
        self.offset = Some(limit * (page - 1));
        Ok(page)
    }

    /// Parameters for the executor.
    pub fn params(&self) -> SelectParams {
        SelectParams {
            limit: self.limit,
            offset: self.offset,
            order_by: self.order().map(str::to_string),
            direction: self.direction,
            order_by_raw: None,
            columns_raw: None,
        }
    }
}
