//! Lexical handling of SQL text.
//!
//! SQL is never parsed here. The text is tokenized with the `sqlparser`
//! dialect that matches the engine, so statement splitting, read detection
//! and name rewriting can tell code apart from string literals, quoted
//! identifiers and comments.
//!
//! Text the tokenizer rejects, such as an unterminated literal, is kept as a
//! single piece of code and left for the database to report.

use crate::Dialect;
use sqlparser::dialect::{MySqlDialect, PostgreSqlDialect};
use sqlparser::tokenizer::{
    Location, Token, TokenWithLocation, Tokenizer, TokenizerError, Whitespace,
};

/// Lexical class of a piece of SQL text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentKind {
    /// Keywords, bare identifiers, operators, whitespace
    Code,
    /// `'...'`, MySQL `"..."`, PostgreSQL `E'...'` and `$tag$...$tag$`
    StringLiteral,
    /// MySQL `` `...` `` or PostgreSQL `"..."`, quotes included
    QuotedIdent,
    /// `-- ...`, MySQL `# ...`, `/* ... */`
    Comment,
}

/// A contiguous slice of SQL text with one lexical class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Segment<'a> {
    pub kind: SegmentKind,
    pub text: &'a str,
}

/// One token's slice of the source text.
#[derive(Debug, Clone, Copy)]
struct Lexeme<'a> {
    kind: SegmentKind,
    text: &'a str,
    terminator: bool,
}

impl Lexeme<'_> {
    fn is_blank(&self) -> bool {
        self.kind == SegmentKind::Comment
            || (self.kind == SegmentKind::Code && self.text.trim().is_empty())
    }
}

fn tokenize(sql: &str, dialect: Dialect) -> Result<Vec<TokenWithLocation>, TokenizerError> {
    match dialect {
        Dialect::MySql => Tokenizer::new(&MySqlDialect {}, sql).tokenize_with_location(),
        Dialect::Postgres => Tokenizer::new(&PostgreSqlDialect {}, sql).tokenize_with_location(),
    }
}

fn classify(token: &Token) -> SegmentKind {
    match token {
        Token::Word(word) if word.quote_style.is_some() => SegmentKind::QuotedIdent,
        Token::SingleQuotedString(_)
        | Token::DoubleQuotedString(_)
        | Token::DollarQuotedString(_)
        | Token::NationalStringLiteral(_)
        | Token::EscapedStringLiteral(_)
        | Token::HexStringLiteral(_)
        | Token::SingleQuotedByteStringLiteral(_)
        | Token::DoubleQuotedByteStringLiteral(_)
        | Token::RawStringLiteral(_) => SegmentKind::StringLiteral,
        Token::Whitespace(Whitespace::SingleLineComment { .. } | Whitespace::MultiLineComment(_)) => {
            SegmentKind::Comment
        }
        _ => SegmentKind::Code,
    }
}

/// Converts token locations (1-based line and character column) into byte
/// offsets. Locations must be visited in ascending order.
struct Cursor<'a> {
    sql: &'a str,
    offset: usize,
    line: u64,
    column: u64,
}

impl<'a> Cursor<'a> {
    const fn new(sql: &'a str) -> Self {
        Self {
            sql,
            offset: 0,
            line: 1,
            column: 1,
        }
    }

    fn seek(&mut self, location: &Location) -> usize {
        while (self.line, self.column) < (location.line, location.column) {
            let Some(ch) = self.sql[self.offset..].chars().next() else {
                break;
            };
            self.offset += ch.len_utf8();
            if ch == '\n' {
                self.line += 1;
                self.column = 1;
            } else {
                self.column += 1;
            }
        }
        self.offset
    }
}

/// Cuts `sql` into one lexeme per token. MySQL `#` comments run to the end
/// of the line.
fn lex(sql: &str, dialect: Dialect) -> Vec<Lexeme<'_>> {
    let tokens = match tokenize(sql, dialect) {
        Ok(tokens) => tokens,
        Err(error) => {
            tracing::debug!(%error, "SQL text not tokenized, kept as one piece");
            return if sql.is_empty() {
                Vec::new()
            } else {
                vec![Lexeme {
                    kind: SegmentKind::Code,
                    text: sql,
                    terminator: false,
                }]
            };
        }
    };

    let mut cursor = Cursor::new(sql);
    let starts: Vec<usize> = tokens
        .iter()
        .map(|token| cursor.seek(&token.location))
        .collect();

    let mut lexemes: Vec<Lexeme<'_>> = Vec::with_capacity(tokens.len());
    let mut hash_comment: Option<usize> = None;
    for (index, token) in tokens.iter().enumerate() {
        if token.token == Token::EOF {
            continue;
        }
        let start = starts[index];
        let end = starts.get(index + 1).copied().unwrap_or(sql.len());

        if let Some(comment_start) = hash_comment {
            // A `--` comment inside swallows the newline that ends this one.
            let line_end = match &token.token {
                Token::Whitespace(Whitespace::Newline) => start,
                Token::Whitespace(Whitespace::SingleLineComment { .. })
                    if sql[start..end].ends_with('\n') =>
                {
                    end - 1
                }
                _ => continue,
            };
            lexemes.push(Lexeme {
                kind: SegmentKind::Comment,
                text: &sql[comment_start..line_end],
                terminator: false,
            });
            hash_comment = None;
            if line_end != start {
                lexemes.push(Lexeme {
                    kind: SegmentKind::Code,
                    text: &sql[line_end..end],
                    terminator: false,
                });
                continue;
            }
        }
        if dialect == Dialect::MySql && token.token == Token::Sharp {
            hash_comment = Some(start);
            continue;
        }

        let kind = classify(&token.token);
        let text = &sql[start..end];
        // Line comments end before their newline.
        if kind == SegmentKind::Comment
            && let Some(body) = text.strip_suffix('\n')
        {
            lexemes.push(Lexeme {
                kind,
                text: body,
                terminator: false,
            });
            lexemes.push(Lexeme {
                kind: SegmentKind::Code,
                text: &text[body.len()..],
                terminator: false,
            });
            continue;
        }
        lexemes.push(Lexeme {
            kind,
            text,
            terminator: token.token == Token::SemiColon,
        });
    }
    if let Some(comment_start) = hash_comment {
        lexemes.push(Lexeme {
            kind: SegmentKind::Comment,
            text: &sql[comment_start..],
            terminator: false,
        });
    }
    lexemes
}

/// Cuts `sql` into segments. Concatenating every segment's text gives back
/// the input unchanged. Adjacent code tokens form one segment.
pub fn scan(sql: &str, dialect: Dialect) -> Vec<Segment<'_>> {
    let mut segments: Vec<Segment<'_>> = Vec::new();
    let mut code_start: Option<usize> = None;
    let mut offset = 0;

    for lexeme in lex(sql, dialect) {
        let start = offset;
        offset += lexeme.text.len();
        if lexeme.kind == SegmentKind::Code {
            code_start.get_or_insert(start);
            continue;
        }
        if let Some(code) = code_start.take() {
            segments.push(Segment {
                kind: SegmentKind::Code,
                text: &sql[code..start],
            });
        }
        segments.push(Segment {
            kind: lexeme.kind,
            text: lexeme.text,
        });
    }
    if let Some(code) = code_start {
        segments.push(Segment {
            kind: SegmentKind::Code,
            text: &sql[code..offset],
        });
    }
    segments
}

/// Splits a batch into statements on `;`, ignoring semicolons inside
/// literals, quoted identifiers and comments.
///
/// Statements are trimmed. Empty statements, and statements that consist
/// only of comments, are dropped.
///
/// # Example
/// ```rust
/// use dbsandbox_core::{Dialect, sql_text::split_statements};
///
/// let statements = split_statements("SELECT ';' AS x; ; DELETE FROM t;", Dialect::MySql);
/// assert_eq!(statements, vec!["SELECT ';' AS x", "DELETE FROM t"]);
/// ```
pub fn split_statements(sql: &str, dialect: Dialect) -> Vec<String> {
    let mut statements = Vec::new();
    let mut current = String::new();
    let mut has_code = false;

    let mut finish = |current: &mut String, has_code: &mut bool| {
        let statement = current.trim();
        if *has_code && !statement.is_empty() {
            statements.push(statement.to_string());
        }
        current.clear();
        *has_code = false;
    };

    for lexeme in lex(sql, dialect) {
        if lexeme.terminator {
            finish(&mut current, &mut has_code);
            continue;
        }
        if !lexeme.is_blank() {
            has_code = true;
        }
        current.push_str(lexeme.text);
    }
    finish(&mut current, &mut has_code);
    statements
}

/// Removes comments, replacing each with one space.
pub fn strip_comments(sql: &str, dialect: Dialect) -> String {
    let mut stripped = String::with_capacity(sql.len());
    for segment in scan(sql, dialect) {
        if segment.kind == SegmentKind::Comment {
            stripped.push(' ');
        } else {
            stripped.push_str(segment.text);
        }
    }
    stripped
}

const READ_PREFIXES: [&str; 5] = ["SELECT", "SHOW", "EXPLAIN", "DESC", "WITH"];

/// Whether a statement returns rows: after comments are removed it starts
/// with `SELECT`, `SHOW`, `EXPLAIN`, `DESC`/`DESCRIBE` or `WITH`.
pub fn is_read_statement(statement: &str, dialect: Dialect) -> bool {
    let stripped = strip_comments(statement, dialect);
    let body = stripped.trim_start().trim_start_matches('(').trim_start();
    let keyword: String = body
        .chars()
        .take_while(char::is_ascii_alphabetic)
        .collect::<String>()
        .to_ascii_uppercase();
    READ_PREFIXES.iter().any(|prefix| keyword.starts_with(prefix))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(sql: &str, dialect: Dialect) -> Vec<(SegmentKind, &str)> {
        scan(sql, dialect)
            .into_iter()
            .map(|s| (s.kind, s.text))
            .collect()
    }

    #[test]
    fn test_scan_round_trips_text() {
        let sql = "SELECT `a`, 'x;y' -- note\nFROM t /* c */ WHERE b = \"q\"";
        let rebuilt: String = scan(sql, Dialect::MySql).iter().map(|s| s.text).collect();
        assert_eq!(rebuilt, sql);
    }

    #[test]
    fn test_scan_mysql_classes() {
        let segments = kinds("SELECT `id` FROM t WHERE s = 'it''s' # tail", Dialect::MySql);
        assert_eq!(
            segments,
            vec![
                (SegmentKind::Code, "SELECT "),
                (SegmentKind::QuotedIdent, "`id`"),
                (SegmentKind::Code, " FROM t WHERE s = "),
                (SegmentKind::StringLiteral, "'it''s'"),
                (SegmentKind::Code, " "),
                (SegmentKind::Comment, "# tail"),
            ]
        );
    }

    #[test]
    fn test_scan_mysql_hash_comment_ends_at_newline() {
        let segments = kinds("SELECT 1 # a; b\nFROM t", Dialect::MySql);
        assert!(segments.contains(&(SegmentKind::Comment, "# a; b")));
        assert_eq!(segments.last(), Some(&(SegmentKind::Code, "\nFROM t")));
    }

    #[test]
    fn test_scan_postgres_double_quotes_are_identifiers() {
        let segments = kinds("SELECT \"Order\" FROM t", Dialect::Postgres);
        assert_eq!(segments[1], (SegmentKind::QuotedIdent, "\"Order\""));
    }

    #[test]
    fn test_scan_mysql_double_quotes_are_strings() {
        let segments = kinds("SELECT \"Order\" FROM t", Dialect::MySql);
        assert_eq!(segments[1], (SegmentKind::StringLiteral, "\"Order\""));
    }

    #[test]
    fn test_scan_mysql_backslash_escape() {
        let segments = kinds(r"SELECT 'a\'b;c' ; x", Dialect::MySql);
        assert_eq!(segments[1], (SegmentKind::StringLiteral, r"'a\'b;c'"));
    }

    #[test]
    fn test_scan_postgres_plain_string_keeps_backslash_literal() {
        let segments = kinds(r"SELECT 'a\'; SELECT 2", Dialect::Postgres);
        assert_eq!(segments[1], (SegmentKind::StringLiteral, r"'a\'"));
    }

    #[test]
    fn test_scan_postgres_escape_string() {
        let segments = kinds(r"SELECT E'a\'b'", Dialect::Postgres);
        assert_eq!(segments[1], (SegmentKind::StringLiteral, r"E'a\'b'"));
    }

    #[test]
    fn test_scan_dollar_quoted_body() {
        let sql = "CREATE FUNCTION f() RETURNS int AS $body$ SELECT 1; $body$ LANGUAGE sql";
        let segments = kinds(sql, Dialect::Postgres);
        assert!(segments.contains(&(SegmentKind::StringLiteral, "$body$ SELECT 1; $body$")));
    }

    #[test]
    fn test_scan_positional_parameter_is_code() {
        let segments = kinds("SELECT $1, $2", Dialect::Postgres);
        assert_eq!(segments, vec![(SegmentKind::Code, "SELECT $1, $2")]);
    }

    #[test]
    fn test_scan_multibyte_text_keeps_boundaries() {
        let sql = "SELECT 'café', `naïve`\nFROM t";
        let segments = kinds(sql, Dialect::MySql);
        assert_eq!(segments[1], (SegmentKind::StringLiteral, "'café'"));
        assert_eq!(segments[3], (SegmentKind::QuotedIdent, "`naïve`"));
        assert_eq!(segments[4], (SegmentKind::Code, "\nFROM t"));
    }

    #[test]
    fn test_scan_unterminated_literal_is_one_piece() {
        let sql = "SELECT 'open; DROP TABLE t";
        assert_eq!(kinds(sql, Dialect::Postgres), vec![(SegmentKind::Code, sql)]);
        assert_eq!(split_statements(sql, Dialect::Postgres), vec![sql]);
    }

    #[test]
    fn test_split_basic() {
        let statements = split_statements(
            "  INSERT INTO t VALUES (1);\n\nSELECT * FROM t ;  ",
            Dialect::MySql,
        );
        assert_eq!(statements, vec!["INSERT INTO t VALUES (1)", "SELECT * FROM t"]);
    }

    #[test]
    fn test_split_ignores_semicolons_in_literals_and_comments() {
        let sql = "SELECT 'a;b'; -- x; y\nSELECT \"c;d\" /* ; */";
        let statements = split_statements(sql, Dialect::Postgres);
        assert_eq!(statements.len(), 2);
        assert_eq!(statements[0], "SELECT 'a;b'");
        assert!(statements[1].starts_with("-- x; y"));
        assert!(statements[1].contains("SELECT \"c;d\""));
    }

    #[test]
    fn test_split_keeps_dollar_quoted_body_whole() {
        let sql = "CREATE FUNCTION f() RETURNS int AS $$ SELECT 1; $$ LANGUAGE sql; SELECT f()";
        let statements = split_statements(sql, Dialect::Postgres);
        assert_eq!(statements.len(), 2);
        assert!(statements[0].ends_with("$$ SELECT 1; $$ LANGUAGE sql"));
        assert_eq!(statements[1], "SELECT f()");
    }

    #[test]
    fn test_split_drops_comment_only_statements() {
        let statements = split_statements("SELECT 1; -- trailing note", Dialect::MySql);
        assert_eq!(statements, vec!["SELECT 1"]);
    }

    #[test]
    fn test_split_empty_input() {
        assert!(split_statements("", Dialect::MySql).is_empty());
        assert!(split_statements(" ; ;\n", Dialect::Postgres).is_empty());
    }

    #[test]
    fn test_strip_comments() {
        let stripped = strip_comments("/* hint */ SELECT 1 -- done", Dialect::MySql);
        assert_eq!(stripped.trim(), "SELECT 1");
    }

    #[test]
    fn test_read_detection() {
        let reads = [
            "SELECT 1",
            "select * from t",
            "  show tables",
            "EXPLAIN SELECT 1",
            "DESC orders",
            "describe orders",
            "WITH x AS (SELECT 1) SELECT * FROM x",
            "-- leading comment\nSELECT 1",
            "/* a */ /* b */ SELECT 1",
            "(SELECT 1) UNION (SELECT 2)",
        ];
        for sql in reads {
            assert!(is_read_statement(sql, Dialect::Postgres), "{sql}");
        }

        let writes = [
            "INSERT INTO t VALUES (1)",
            "UPDATE t SET a = 1",
            "DELETE FROM t",
            "CREATE TABLE t (id int)",
            "-- SELECT\nDROP TABLE t",
            "# SELECT\nTRUNCATE t",
        ];
        for sql in writes {
            assert!(!is_read_statement(sql, Dialect::MySql), "{sql}");
        }
    }
}
