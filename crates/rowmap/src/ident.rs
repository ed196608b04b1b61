//! Safe SQL identifier handling.
//!
//! This module provides [`Ident`] which represents a MySQL identifier (database/table/column),
//! supporting dotted notation and backtick-quoted parts.
//!
//! - Every part is rendered backtick-quoted, with embedded backticks doubled
//! - Input parts may be bare (`users`) or already quoted (`` `odd.name` ``)
//!
//! # Example
//! ```ignore
//! use rowmap::Ident;
//!
//! assert_eq!(Ident::parse("shop.users")?.to_sql(), "`shop`.`users`");
//! # Ok::<(), rowmap::OrmError>(())
//! ```

use crate::error::{OrmError, OrmResult};

/// A SQL identifier (column, table, or database name).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ident {
    pub parts: Vec<String>,
}

impl Ident {
    /// Create a single-part identifier without interpreting dots.
    pub fn single(name: &str) -> OrmResult<Self> {
        check_part(name)?;
        Ok(Self {
            parts: vec![name.to_string()],
        })
    }

    /// Parse an identifier string, supporting dotted and quoted forms.
    ///
    /// - Dotted: `db.table`
    /// - Quoted: `` `odd.name` `` (a doubled backtick inside quotes is a literal backtick)
    /// - Mixed: ``db.`odd.table` ``
    pub fn parse(s: &str) -> OrmResult<Self> {
        if s.is_empty() {
            return Err(OrmError::malformed("Identifier cannot be empty"));
        }

        let mut parts = Vec::new();
        let mut chars = s.chars().peekable();

        while chars.peek().is_some() {
            if !parts.is_empty() {
                match chars.next() {
                    Some('.') => {
                        if chars.peek().is_none() {
                            return Err(OrmError::malformed("Trailing '.' in identifier"));
                        }
                    }
                    Some(c) => {
                        return Err(OrmError::malformed(format!(
                            "Expected '.' between identifier parts, got '{c}'"
                        )));
                    }
                    None => break,
                }
            }

            let mut name = String::new();
            if chars.peek() == Some(&'`') {
                chars.next();
                loop {
                    match chars.next() {
                        Some('`') => {
                            if chars.peek() == Some(&'`') {
                                chars.next();
                                name.push('`');
                            } else {
                                break;
                            }
                        }
                        Some(c) => name.push(c),
                        None => return Err(OrmError::malformed("Unclosed quoted identifier")),
                    }
                }
            } else {
                while let Some(&c) = chars.peek() {
                    if c == '.' {
                        break;
                    }
                    name.push(c);
                    chars.next();
                }
            }
            check_part(&name)?;
            parts.push(name);
        }

        Ok(Self { parts })
    }

    /// Render the identifier as SQL.
    pub fn to_sql(&self) -> String {
        let mut out = String::with_capacity(self.parts.iter().map(|p| p.len() + 3).sum());
        self.write_sql(&mut out);
        out
    }

    pub(crate) fn write_sql(&self, out: &mut String) {
        for (i, part) in self.parts.iter().enumerate() {
            if i > 0 {
                out.push('.');
            }
            out.push('`');
            for ch in part.chars() {
                if ch == '`' {
                    out.push('`');
                }
                out.push(ch);
            }
            out.push('`');
        }
    }
}

fn check_part(name: &str) -> OrmResult<()> {
    if name.is_empty() {
        return Err(OrmError::malformed("Empty identifier segment"));
    }
    if name.contains('\0') {
        return Err(OrmError::malformed(
            "Identifier cannot contain NUL character",
        ));
    }
    if name.ends_with(' ') {
        return Err(OrmError::malformed(format!(
            "Identifier cannot end with a space: '{name}'"
        )));
    }
    Ok(())
}

/// Quote a table name (dotted `db.table` allowed).
pub(crate) fn table(name: &str) -> OrmResult<String> {
    Ident::parse(name).map(|ident| ident.to_sql())
}

/// Quote a column name. Dots are part of the name, matching how filter keys are written.
pub(crate) fn column(name: &str) -> OrmResult<String> {
    Ident::single(name).map(|ident| ident.to_sql())
}
