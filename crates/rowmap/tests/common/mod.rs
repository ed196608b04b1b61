//! An in-memory, MySQL-flavored stand-in for a driver connection.
//!
//! It understands exactly the statement shapes the executor emits: `SELECT * | COUNT(*)`,
//! `INSERT ... SET`, `UPDATE ... SET` and `DELETE`, with `WHERE` predicates made of equality,
//! `IN`/`NOT IN`, `IS [NOT] NULL` and `1`, joined by `AND`/`OR`.

#![allow(dead_code)]

use rowmap::{Connection, DriverError, ER_DUP_ENTRY, Record, ResultSet, Value};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

#[derive(Debug, Default)]
struct FakeTable {
    columns: Vec<String>,
    unique: Vec<String>,
    rows: BTreeMap<i64, Record>,
}

#[derive(Debug, Default)]
struct State {
    tables: HashMap<String, FakeTable>,
    statements: Vec<String>,
    last_insert_id: u64,
    fail_updates: bool,
}

/// Shared in-memory database; clones see the same data.
#[derive(Debug, Clone, Default)]
pub struct FakeDb {
    state: Arc<Mutex<State>>,
}

impl FakeDb {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a table. `id` and `creation_date` are always present.
    pub fn table(self, name: &str, columns: &[&str]) -> Self {
        let mut all = vec!["id".to_string(), "creation_date".to_string()];
        all.extend(columns.iter().map(|c| c.to_string()));
        self.state.lock().unwrap().tables.insert(
            name.to_string(),
            FakeTable {
                columns: all,
                ..FakeTable::default()
            },
        );
        self
    }

    /// Add a unique index on one column.
    pub fn unique(self, table: &str, column: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .tables
            .get_mut(table)
            .expect("unknown table")
            .unique
            .push(column.to_string());
        self
    }

    pub fn statements(&self) -> Vec<String> {
        self.state.lock().unwrap().statements.clone()
    }

    pub fn count_statements(&self, prefix: &str) -> usize {
        self.statements()
            .iter()
            .filter(|sql| sql.starts_with(prefix))
            .count()
    }

    pub fn clear_statements(&self) {
        self.state.lock().unwrap().statements.clear();
    }

    /// Make every following `UPDATE` fail with "server has gone away".
    pub fn fail_updates(&self, fail: bool) {
        self.state.lock().unwrap().fail_updates = fail;
    }

    /// Stored copy of a row, bypassing the executor.
    pub fn stored(&self, table: &str, id: i64) -> Option<Record> {
        self.state.lock().unwrap().tables.get(table)?.rows.get(&id).cloned()
    }

    pub fn stored_value(&self, table: &str, id: i64, column: &str) -> Option<Value> {
        self.stored(table, id)?.get(column).cloned()
    }
}

impl Connection for FakeDb {
    fn execute(&mut self, sql: &str) -> Result<ResultSet, DriverError> {
        let mut state = self.state.lock().unwrap();
        state.statements.push(sql.to_string());
        let tokens = tokenize(sql)?;
        let mut parser = Parser { tokens, pos: 0 };
        let statement = parser.statement()?;
        state.apply(statement)
    }

    fn last_insert_id(&self) -> u64 {
        self.state.lock().unwrap().last_insert_id
    }
}

fn syntax(message: impl Into<String>) -> DriverError {
    DriverError::new(1064, "42000", message)
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Literal(Value),
    Word(String),
    Sym(char),
}

fn tokenize(sql: &str) -> Result<Vec<Token>, DriverError> {
    let mut tokens = Vec::new();
    let mut chars = sql.chars().peekable();
    while let Some(&c) = chars.peek() {
        match c {
            c if c.is_whitespace() => {
                chars.next();
            }
            '`' => {
                chars.next();
                let mut name = String::new();
                loop {
                    match chars.next() {
                        Some('`') if chars.peek() == Some(&'`') => {
                            chars.next();
                            name.push('`');
                        }
                        Some('`') => break,
                        Some(c) => name.push(c),
                        None => return Err(syntax("unclosed identifier")),
                    }
                }
                tokens.push(Token::Ident(name));
            }
            '\'' => {
                chars.next();
                let mut text = String::new();
                loop {
                    match chars.next() {
                        Some('\\') => match chars.next() {
                            Some('0') => text.push('\0'),
                            Some('n') => text.push('\n'),
                            Some('r') => text.push('\r'),
                            Some('Z') => text.push('\x1a'),
                            Some(c) => text.push(c),
                            None => return Err(syntax("dangling escape")),
                        },
                        Some('\'') => break,
                        Some(c) => text.push(c),
                        None => return Err(syntax("unclosed string")),
                    }
                }
                tokens.push(Token::Literal(Value::Text(text)));
            }
            c if c.is_ascii_digit() || c == '-' => {
                let mut number = String::new();
                while let Some(&c) = chars.peek() {
                    if c.is_ascii_digit() || c == '-' || c == '.' || c == 'e' || c == '+' {
                        number.push(c);
                        chars.next();
                    } else {
                        break;
                    }
                }
                let value = match number.parse::<i64>() {
                    Ok(v) => Value::Int(v),
                    Err(_) => match number.parse::<u64>() {
                        Ok(_) => Value::Int(i64::MAX),
                        Err(_) => Value::Float(
                            number.parse().map_err(|_| syntax(format!("bad number {number}")))?,
                        ),
                    },
                };
                tokens.push(Token::Literal(value));
            }
            c if c.is_ascii_alphabetic() => {
                let mut word = String::new();
                while let Some(&c) = chars.peek() {
                    if c.is_ascii_alphanumeric() || c == '_' {
                        word.push(c.to_ascii_uppercase());
                        chars.next();
                    } else {
                        break;
                    }
                }
                if word == "NULL" {
                    tokens.push(Token::Literal(Value::Null));
                } else {
                    tokens.push(Token::Word(word));
                }
            }
            c => {
                chars.next();
                tokens.push(Token::Sym(c));
            }
        }
    }
    Ok(tokens)
}

#[derive(Debug)]
enum Atom {
    True,
    Eq(String, Value),
    In(String, Vec<Value>, bool),
    IsNull(String, bool),
}

/// Disjunction of conjunctions.
type Predicate = Vec<Vec<Atom>>;

#[derive(Debug)]
enum Statement {
    Select {
        count: bool,
        table: String,
        predicate: Option<Predicate>,
        order: Option<(String, bool)>,
        limit: Option<u64>,
        offset: u64,
    },
    Insert {
        table: String,
        data: Vec<(String, Value)>,
    },
    Update {
        table: String,
        data: Vec<(String, Value)>,
        predicate: Option<Predicate>,
        limit: Option<u64>,
    },
    Delete {
        table: String,
        predicate: Option<Predicate>,
        limit: Option<u64>,
    },
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn peek_word(&self, word: &str) -> bool {
        matches!(self.tokens.get(self.pos), Some(Token::Word(w)) if w == word)
    }

    fn eat_word(&mut self, word: &str) -> bool {
        if self.peek_word(word) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect_word(&mut self, word: &str) -> Result<(), DriverError> {
        if self.eat_word(word) {
            Ok(())
        } else {
            Err(syntax(format!("expected {word} at token {}", self.pos)))
        }
    }

    fn expect_sym(&mut self, sym: char) -> Result<(), DriverError> {
        match self.next() {
            Some(Token::Sym(c)) if c == sym => Ok(()),
            other => Err(syntax(format!("expected '{sym}', got {other:?}"))),
        }
    }

    fn ident(&mut self) -> Result<String, DriverError> {
        match self.next() {
            Some(Token::Ident(name)) => Ok(name),
            other => Err(syntax(format!("expected identifier, got {other:?}"))),
        }
    }

    fn literal(&mut self) -> Result<Value, DriverError> {
        match self.next() {
            Some(Token::Literal(value)) => Ok(value),
            other => Err(syntax(format!("expected literal, got {other:?}"))),
        }
    }

    fn number(&mut self) -> Result<u64, DriverError> {
        match self.literal()? {
            Value::Int(n) => Ok(n as u64),
            other => Err(syntax(format!("expected number, got {other:?}"))),
        }
    }

    fn done(&self) -> Result<(), DriverError> {
        match self.tokens.get(self.pos) {
            None => Ok(()),
            Some(token) => Err(syntax(format!("unexpected trailing {token:?}"))),
        }
    }

    fn statement(&mut self) -> Result<Statement, DriverError> {
        let statement = if self.eat_word("SELECT") {
            let count = if self.eat_word("COUNT") {
                self.expect_sym('(')?;
                self.expect_sym('*')?;
                self.expect_sym(')')?;
                true
            } else {
                self.expect_sym('*')?;
                false
            };
            self.expect_word("FROM")?;
            let table = self.ident()?;
            let predicate = self.where_clause()?;
            let order = if self.eat_word("ORDER") {
                self.expect_word("BY")?;
                let column = self.ident()?;
                let desc = self.eat_word("DESC");
                if !desc {
                    self.expect_word("ASC")?;
                }
                Some((column, desc))
            } else {
                None
            };
            let limit = self.limit_clause()?;
            let offset = if self.eat_word("OFFSET") {
                self.number()?
            } else {
                0
            };
            Statement::Select {
                count,
                table,
                predicate,
                order,
                limit,
                offset,
            }
        } else if self.eat_word("INSERT") {
            self.expect_word("INTO")?;
            let table = self.ident()?;
            self.expect_word("SET")?;
            let data = self.assignments()?;
            Statement::Insert { table, data }
        } else if self.eat_word("UPDATE") {
            let table = self.ident()?;
            self.expect_word("SET")?;
            let data = self.assignments()?;
            let predicate = self.where_clause()?;
            let limit = self.limit_clause()?;
            Statement::Update {
                table,
                data,
                predicate,
                limit,
            }
        } else if self.eat_word("DELETE") {
            self.expect_word("FROM")?;
            let table = self.ident()?;
            let predicate = self.where_clause()?;
            let limit = self.limit_clause()?;
            Statement::Delete {
                table,
                predicate,
                limit,
            }
        } else {
            return Err(syntax("unsupported statement"));
        };
        self.done()?;
        Ok(statement)
    }

    fn limit_clause(&mut self) -> Result<Option<u64>, DriverError> {
        if self.eat_word("LIMIT") {
            self.number().map(Some)
        } else {
            Ok(None)
        }
    }

    fn assignments(&mut self) -> Result<Vec<(String, Value)>, DriverError> {
        let mut data = Vec::new();
        loop {
            let column = self.ident()?;
            self.expect_sym('=')?;
            data.push((column, self.literal()?));
            if !matches!(self.tokens.get(self.pos), Some(Token::Sym(','))) {
                return Ok(data);
            }
            self.pos += 1;
        }
    }

    fn where_clause(&mut self) -> Result<Option<Predicate>, DriverError> {
        if !self.eat_word("WHERE") {
            return Ok(None);
        }
        let mut predicate = vec![vec![self.atom()?]];
        loop {
            if self.eat_word("AND") {
                let atom = self.atom()?;
                if let Some(group) = predicate.last_mut() {
                    group.push(atom);
                }
            } else if self.eat_word("OR") {
                predicate.push(vec![self.atom()?]);
            } else {
                return Ok(Some(predicate));
            }
        }
    }

    fn atom(&mut self) -> Result<Atom, DriverError> {
        let column = match self.next() {
            Some(Token::Literal(Value::Int(1))) => return Ok(Atom::True),
            Some(Token::Ident(column)) => column,
            other => return Err(syntax(format!("unsupported predicate start {other:?}"))),
        };
        if self.eat_word("IS") {
            let negated = self.eat_word("NOT");
            match self.literal()? {
                Value::Null => return Ok(Atom::IsNull(column, !negated)),
                other => return Err(syntax(format!("expected NULL, got {other:?}"))),
            }
        }
        let negated = self.eat_word("NOT");
        if self.eat_word("IN") {
            self.expect_sym('(')?;
            let mut values = vec![self.literal()?];
            while matches!(self.tokens.get(self.pos), Some(Token::Sym(','))) {
                self.pos += 1;
                values.push(self.literal()?);
            }
            self.expect_sym(')')?;
            return Ok(Atom::In(column, values, !negated));
        }
        self.expect_sym('=')?;
        Ok(Atom::Eq(column, self.literal()?))
    }
}

fn same(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Null, _) | (_, Value::Null) => false,
        (Value::Int(x), Value::Float(y)) | (Value::Float(y), Value::Int(x)) => (*x as f64) == *y,
        (Value::Bool(x), Value::Int(y)) | (Value::Int(y), Value::Bool(x)) => i64::from(*x) == *y,
        _ => a == b,
    }
}

fn matches(record: &Record, predicate: &Option<Predicate>) -> bool {
    let Some(groups) = predicate else {
        return true;
    };
    let value = |column: &str| record.get(column).cloned().unwrap_or(Value::Null);
    groups.iter().any(|group| {
        group.iter().all(|atom| match atom {
            Atom::True => true,
            Atom::Eq(column, expected) => same(&value(column), expected),
            Atom::In(column, values, positive) => {
                let actual = value(column);
                !actual.is_null() && values.iter().any(|v| same(&actual, v)) == *positive
            }
            Atom::IsNull(column, positive) => value(column).is_null() == *positive,
        })
    })
}

fn compare(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Int(x), Value::Int(y)) => x.cmp(y),
        (Value::Text(x), Value::Text(y)) => x.cmp(y),
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Null, _) => Ordering::Less,
        (_, Value::Null) => Ordering::Greater,
        _ => a.to_string().cmp(&b.to_string()),
    }
}

impl State {
    fn table_mut(&mut self, name: &str) -> Result<&mut FakeTable, DriverError> {
        self.tables.get_mut(name).ok_or_else(|| {
            DriverError::new(1146, "42S02", format!("Table 'fake.{name}' doesn't exist"))
        })
    }

    fn apply(&mut self, statement: Statement) -> Result<ResultSet, DriverError> {
        match statement {
            Statement::Select {
                count,
                table,
                predicate,
                order,
                limit,
                offset,
            } => {
                let table = self.table_mut(&table)?;
                let mut rows: Vec<Record> = table
                    .rows
                    .values()
                    .filter(|record| matches(record, &predicate))
                    .cloned()
                    .collect();
                if count {
                    let n = rows.len() as i64;
                    return Ok(ResultSet::from_rows(vec![Record::new().with("COUNT(*)", n)]));
                }
                if let Some((column, desc)) = order {
                    rows.sort_by(|a, b| {
                        let a = a.get(&column).cloned().unwrap_or(Value::Null);
                        let b = b.get(&column).cloned().unwrap_or(Value::Null);
                        let ordering = compare(&a, &b);
                        if desc { ordering.reverse() } else { ordering }
                    });
                }
                let rows = rows
                    .into_iter()
                    .skip(offset as usize)
                    .take(limit.map_or(usize::MAX, |l| l.min(usize::MAX as u64) as usize))
                    .collect();
                Ok(ResultSet::from_rows(rows))
            }
            Statement::Insert { table, data } => {
                let table = self.table_mut(&table)?;
                let mut record = Record::new();
                for column in &table.columns {
                    record.set(column.clone(), Value::Null);
                }
                for (column, value) in data {
                    if !table.columns.contains(&column) {
                        return Err(DriverError::new(
                            1054,
                            "42S22",
                            format!("Unknown column '{column}' in 'field list'"),
                        ));
                    }
                    record.set(column, value);
                }

                let id = match record.get("id") {
                    Some(Value::Int(id)) => *id,
                    _ => table.rows.keys().next_back().map_or(1, |max| max + 1),
                };
                record.set("id", id);
                if table.rows.contains_key(&id) {
                    return Err(DriverError::new(
                        ER_DUP_ENTRY,
                        "23000",
                        format!("Duplicate entry '{id}' for key 'PRIMARY'"),
                    ));
                }
                for column in &table.unique {
                    let candidate = record.get(column).cloned().unwrap_or(Value::Null);
                    let taken = table
                        .rows
                        .values()
                        .any(|row| row.get(column).is_some_and(|v| same(v, &candidate)));
                    if taken {
                        return Err(DriverError::new(
                            ER_DUP_ENTRY,
                            "23000",
                            format!("Duplicate entry '{candidate}' for key '{column}'"),
                        ));
                    }
                }
                table.rows.insert(id, record);
                self.last_insert_id = id as u64;
                Ok(ResultSet::affected(1))
            }
            Statement::Update {
                table,
                data,
                predicate,
                limit,
            } => {
                if self.fail_updates {
                    return Err(DriverError::new(2006, "HY000", "MySQL server has gone away"));
                }
                let table = self.table_mut(&table)?;
                let limit = limit.map_or(usize::MAX, |l| l as usize);
                let mut affected = 0;
                for record in table
                    .rows
                    .values_mut()
                    .filter(|record| matches(record, &predicate))
                    .take(limit)
                {
                    for (column, value) in &data {
                        record.set(column.clone(), value.clone());
                    }
                    affected += 1;
                }
                Ok(ResultSet::affected(affected))
            }
            Statement::Delete {
                table,
                predicate,
                limit,
            } => {
                let table = self.table_mut(&table)?;
                let limit = limit.map_or(usize::MAX, |l| l as usize);
                let doomed: Vec<i64> = table
                    .rows
                    .iter()
                    .filter(|(_, record)| matches(record, &predicate))
                    .map(|(id, _)| *id)
                    .take(limit)
                    .collect();
                for id in &doomed {
                    table.rows.remove(id);
                }
                Ok(ResultSet::affected(doomed.len() as u64))
            }
        }
    }
}
