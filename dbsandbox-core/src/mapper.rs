//! Original-to-sandbox table name registry and SQL rewriting.
//!
//! Rewriting is lexical, not a parse: SQL is cut into segments with
//! [`crate::sql_text::scan`] and only bare code and quoted identifiers are
//! touched. String literals and comments pass through unchanged. A column
//! that happens to share a table's name is still rewritten when written bare.

use crate::sql_text::{SegmentKind, scan};
use crate::{Dialect, Result, error::SandboxError};
use regex::{Captures, Regex};
use std::collections::HashMap;

/// Bidirectional, case-insensitive table name mapping.
#[derive(Debug, Clone, Default)]
pub struct NameMapper {
    /// lowercase original -> (original, sandbox)
    forward: HashMap<String, (String, String)>,
    /// lowercase sandbox -> original
    reverse: HashMap<String, String>,
    /// Matches every original that maps to a different name, longest first
    pattern: Option<Regex>,
}

impl NameMapper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `original -> sandbox`.
    ///
    /// # Errors
    /// Returns `MappingConflict` if either name is already registered
    /// (compared case-insensitively); the registry is left unchanged.
    pub fn add_mapping(&mut self, original: &str, sandbox: &str) -> Result<()> {
        let original_key = original.to_lowercase();
        let sandbox_key = sandbox.to_lowercase();

        if let Some((existing, target)) = self.forward.get(&original_key) {
            return Err(SandboxError::mapping_conflict(format!(
                "table '{existing}' is already mapped to '{target}'"
            )));
        }
        if let Some(existing) = self.reverse.get(&sandbox_key) {
            return Err(SandboxError::mapping_conflict(format!(
                "sandbox name '{sandbox}' is already used by table '{existing}'"
            )));
        }

        self.forward
            .insert(original_key, (original.to_string(), sandbox.to_string()));
        self.reverse.insert(sandbox_key, original.to_string());
        self.rebuild_pattern()
    }

    /// Sandbox name for `original`, or `original` itself when unmapped.
    pub fn sandbox_name_for<'a>(&'a self, original: &'a str) -> &'a str {
        self.forward
            .get(&original.to_lowercase())
            .map_or(original, |(_, sandbox)| sandbox.as_str())
    }

    /// Original name for `sandbox`, or `sandbox` itself when unmapped.
    pub fn original_name_for<'a>(&'a self, sandbox: &'a str) -> &'a str {
        self.reverse
            .get(&sandbox.to_lowercase())
            .map_or(sandbox, String::as_str)
    }

    /// Registered sandbox table names, sorted.
    pub fn sandbox_tables(&self) -> Vec<&str> {
        let mut tables: Vec<&str> = self
            .forward
            .values()
            .map(|(_, sandbox)| sandbox.as_str())
            .collect();
        tables.sort_unstable();
        tables
    }

    pub fn len(&self) -> usize {
        self.forward.len()
    }

    pub fn is_empty(&self) -> bool {
        self.forward.is_empty()
    }

    pub fn clear(&mut self) {
        self.forward.clear();
        self.reverse.clear();
        self.pattern = None;
    }

    /// Replaces registered table names in `sql` with their sandbox names.
    ///
    /// Bare names match case-insensitively on word boundaries, so `orders`
    /// never touches `orders_archive`. Quoted names match when the whole
    /// quoted identifier is a registered name; the dialect's quote character
    /// is kept. Every mapping is applied in a single pass.
    pub fn rewrite(&self, sql: &str, dialect: Dialect) -> String {
        let Some(pattern) = &self.pattern else {
            return sql.to_string();
        };

        let mut rewritten = String::with_capacity(sql.len());
        for segment in scan(sql, dialect) {
            match segment.kind {
                SegmentKind::Code => {
                    let replaced = pattern.replace_all(segment.text, |caps: &Captures<'_>| {
                        self.sandbox_name_for(&caps[0]).to_string()
                    });
                    rewritten.push_str(&replaced);
                }
                SegmentKind::QuotedIdent => {
                    rewritten.push_str(&self.rewrite_quoted(segment.text, dialect));
                }
                SegmentKind::StringLiteral | SegmentKind::Comment => {
                    rewritten.push_str(segment.text);
                }
            }
        }
        rewritten
    }

    fn rewrite_quoted(&self, quoted: &str, dialect: Dialect) -> String {
        let quote = dialect.quote_char();
        let inner = quoted
            .strip_prefix(quote)
            .and_then(|rest| rest.strip_suffix(quote));
        let Some(inner) = inner else {
            // Unterminated identifier
            return quoted.to_string();
        };

        let name = inner.replace(&format!("{quote}{quote}"), &quote.to_string());
        match self.forward.get(&name.to_lowercase()) {
            Some((original, sandbox)) if original != sandbox => dialect.quote_ident(sandbox),
            _ => quoted.to_string(),
        }
    }

    fn rebuild_pattern(&mut self) -> Result<()> {
        let mut originals: Vec<&str> = self
            .forward
            .values()
            .filter(|(original, sandbox)| original != sandbox)
            .map(|(original, _)| original.as_str())
            .collect();
        if originals.is_empty() {
            self.pattern = None;
            return Ok(());
        }

        // Longest first so a name is never shadowed by one of its prefixes
        originals.sort_unstable_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
        let alternation = originals
            .iter()
            .map(|name| regex::escape(name))
            .collect::<Vec<_>>()
            .join("|");

        let pattern = Regex::new(&format!(r"(?i)\b(?:{alternation})\b"))
            .map_err(|e| SandboxError::mapping_conflict(format!("cannot match table names: {e}")))?;
        self.pattern = Some(pattern);
        Ok(())
    }
}
