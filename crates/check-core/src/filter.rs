//! Table selection from `--tables` / `--ignore-tables` patterns.
//!
//! A pattern is `schema-pattern.table-pattern`. `*` matches zero or more
//! characters within a segment; every other character, including regex
//! metacharacters, matches literally. The single `.` separates the segments.

use crate::error::CheckError;
use crate::model::Table;
use regex::Regex;
use std::fmt;

/// One `schema.table` glob, compiled to a pair of anchored regexes.
#[derive(Clone, Debug)]
pub struct TablePattern {
    source: String,
    schema: Regex,
    table: Regex,
}

impl TablePattern {
    pub fn parse(pattern: &str) -> Result<Self, CheckError> {
        let pattern = pattern.trim();
        let invalid = || CheckError::InvalidFilter {
            pattern: pattern.to_string(),
        };

        let segments: Vec<&str> = pattern.split('.').collect();
        let &[schema, table] = segments.as_slice() else {
            return Err(invalid());
        };

        Ok(Self {
            source: pattern.to_string(),
            schema: segment_regex(schema).map_err(|_| invalid())?,
            table: segment_regex(table).map_err(|_| invalid())?,
        })
    }

    pub fn matches(&self, table: &Table) -> bool {
        self.schema.is_match(&table.schema) && self.table.is_match(&table.name)
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }
}

fn segment_regex(segment: &str) -> Result<Regex, regex::Error> {
    let body = regex::escape(segment).replace(r"\*", ".*");
    Regex::new(&format!("^{body}$"))
}

/// A comma-separated list of patterns; matches when any pattern matches.
#[derive(Clone, Debug)]
pub struct TableFilter {
    patterns: Vec<TablePattern>,
}

impl TableFilter {
    pub fn parse(list: &str) -> Result<Self, CheckError> {
        let patterns = list
            .split(',')
            .map(TablePattern::parse)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { patterns })
    }

    pub fn matches(&self, table: &Table) -> bool {
        self.patterns.iter().any(|p| p.matches(table))
    }
}

impl fmt::Display for TableFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sources: Vec<&str> = self.patterns.iter().map(TablePattern::as_str).collect();
        f.write_str(&sources.join(","))
    }
}

/// Allow-list then deny-list selection over a catalog.
#[derive(Clone, Debug, Default)]
pub struct TableSelector {
    only: Option<TableFilter>,
    ignore: Option<TableFilter>,
}

impl TableSelector {
    /// Parses both optional pattern lists; a malformed pattern is a usage error.
    pub fn from_patterns(only: Option<&str>, ignore: Option<&str>) -> Result<Self, CheckError> {
        Ok(Self {
            only: only.map(TableFilter::parse).transpose()?,
            ignore: ignore.map(TableFilter::parse).transpose()?,
        })
    }

    pub fn only(&self) -> Option<&TableFilter> {
        self.only.as_ref()
    }

    pub fn ignore(&self) -> Option<&TableFilter> {
        self.ignore.as_ref()
    }

    pub fn is_selected(&self, table: &Table) -> bool {
        let allowed = self.only.as_ref().map_or(true, |f| f.matches(table));
        let denied = self.ignore.as_ref().is_some_and(|f| f.matches(table));
        allowed && !denied
    }

    /// Returns the selected tables in catalog order.
    pub fn select<'a>(&self, tables: impl IntoIterator<Item = &'a Table>) -> Vec<Table> {
        tables
            .into_iter()
            .filter(|t| self.is_selected(t))
            .cloned()
            .collect()
    }
}
