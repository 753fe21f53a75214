// Diagnostic reporting for the Tomb compiler.
// Spans, categories, and formatted output in the style of rustc's own
// error messages.

use colored::Colorize;
use serde::Serialize;
use std::fmt;

/// Source code location (line, column, file).
#[derive(Debug, Clone, PartialEq)]
pub struct Span {
    pub file: String,
    pub line: usize,
    pub column: usize,
    pub length: usize,
}

impl Span {
    pub fn new(file: String, line: usize, column: usize, length: usize) -> Self {
        Self {
            file,
            line,
            column,
            length,
        }
    }

    /// Derive line/column/length from a byte-offset range into `source`,
    /// the same technique the lexer itself uses to stamp tokens.
    pub fn from_file_and_span(file: &str, source: &str, span: std::ops::Range<usize>) -> Self {
        let before = &source[..span.start];
        let line = before.chars().filter(|&c| c == '\n').count() + 1;
        let column = before
            .rfind('\n')
            .map_or(before.chars().count() + 1, |pos| {
                before[pos + 1..].chars().count() + 1
            });
        let length = span.end.saturating_sub(span.start).max(1);

        Self {
            file: file.to_string(),
            line,
            column,
            length,
        }
    }

    pub fn unknown() -> Self {
        Self {
            file: "<unknown>".to_string(),
            line: 0,
            column: 0,
            length: 0,
        }
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}:{}:{}", self.file, self.line, self.column)
    }
}

/// The six categories a module-level compile failure falls into. Every
/// `Diagnostic` is tagged with exactly one; the driver uses this to decide
/// whether to keep trying the rest of a module (it never does: the first
/// error on a module aborts that module and the driver moves to the next
/// one) and the CLI uses it to pick an exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticCategory {
    LexError,
    SyntaxError,
    ResolutionError,
    TypeError,
    ShapeError,
    InternalError,
}

impl DiagnosticCategory {
    fn code_prefix(self) -> &'static str {
        match self {
            DiagnosticCategory::LexError => "L",
            DiagnosticCategory::SyntaxError => "S",
            DiagnosticCategory::ResolutionError => "R",
            DiagnosticCategory::TypeError => "T",
            DiagnosticCategory::ShapeError => "H",
            DiagnosticCategory::InternalError => "I",
        }
    }
}

impl fmt::Display for DiagnosticCategory {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            DiagnosticCategory::LexError => "lex error",
            DiagnosticCategory::SyntaxError => "syntax error",
            DiagnosticCategory::ResolutionError => "resolution error",
            DiagnosticCategory::TypeError => "type error",
            DiagnosticCategory::ShapeError => "shape error",
            DiagnosticCategory::InternalError => "internal error",
        };
        write!(f, "{}", s)
    }
}

/// Error severity levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorLevel {
    Error,
    Warning,
    Note,
}

impl fmt::Display for ErrorLevel {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ErrorLevel::Error => write!(f, "{}", "error".red().bold()),
            ErrorLevel::Warning => write!(f, "{}", "warning".yellow().bold()),
            ErrorLevel::Note => write!(f, "{}", "note".cyan().bold()),
        }
    }
}

/// A structured diagnostic: category, stable code, message, span, and the
/// rustc-style note/help/suggestion trailer.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub level: ErrorLevel,
    pub category: DiagnosticCategory,
    pub code: String,
    pub message: String,
    pub span: Span,
    pub notes: Vec<String>,
    pub help: Option<String>,
}

impl Diagnostic {
    pub fn new(
        level: ErrorLevel,
        category: DiagnosticCategory,
        local_code: u32,
        message: String,
        span: Span,
    ) -> Self {
        Self {
            level,
            category,
            code: format!("{}{:03}", category.code_prefix(), local_code),
            message,
            span,
            notes: Vec::new(),
            help: None,
        }
    }

    pub fn error(category: DiagnosticCategory, local_code: u32, message: String, span: Span) -> Self {
        Self::new(ErrorLevel::Error, category, local_code, message, span)
    }

    pub fn warning(category: DiagnosticCategory, local_code: u32, message: String, span: Span) -> Self {
        Self::new(ErrorLevel::Warning, category, local_code, message, span)
    }

    pub fn with_note(mut self, note: String) -> Self {
        self.notes.push(note);
        self
    }

    pub fn with_help(mut self, help: String) -> Self {
        self.help = Some(help);
        self
    }

    /// Did-you-mean helper: appends a help line built from fuzzy matches,
    /// only if any were found.
    pub fn with_suggestions(mut self, suggestions: &[String]) -> Self {
        if !suggestions.is_empty() {
            self.help = Some(format!("did you mean `{}`?", suggestions.join("`, `")));
        }
        self
    }

    /// Render in the rustc style, with a source snippet and caret underline.
    pub fn format(&self, source_code: &str) -> String {
        let mut output = String::new();

        output.push_str(&format!(
            "{}[{}]: {}\n",
            self.level,
            self.code,
            self.message.bold()
        ));

        output.push_str(&format!(
            " {} {}:{}:{}\n",
            "-->".cyan().bold(),
            self.span.file,
            self.span.line,
            self.span.column
        ));

        if let Some(snippet) = self.source_snippet(source_code) {
            output.push_str(&snippet);
        }

        for note in &self.notes {
            output.push_str(&format!(" {} {}\n", "=".cyan().bold(), note.cyan()));
        }

        if let Some(help) = &self.help {
            output.push_str(&format!(" {} {}\n", "help:".green().bold(), help));
        }

        output
    }

    fn format_simple(&self) -> String {
        let mut output = format!(
            "{}[{}]: {}\n",
            self.level,
            self.code,
            self.message.bold()
        );
        output.push_str(&format!(
            " {} {}:{}:{}\n",
            "-->".cyan().bold(),
            self.span.file,
            self.span.line,
            self.span.column
        ));
        for note in &self.notes {
            output.push_str(&format!(" {} {}\n", "=".cyan().bold(), note.cyan()));
        }
        if let Some(help) = &self.help {
            output.push_str(&format!(" {} {}\n", "help:".green().bold(), help));
        }
        output
    }

    fn source_snippet(&self, source_code: &str) -> Option<String> {
        let lines: Vec<&str> = source_code.lines().collect();
        if self.span.line == 0 || self.span.line > lines.len() {
            return None;
        }
        let line = lines[self.span.line - 1];
        let width = self.span.line.to_string().len().max(2);

        let mut snippet = String::new();
        snippet.push_str(&format!(" {}\n", " ".repeat(width + 1).cyan()));
        snippet.push_str(&format!(
            " {} {} {}\n",
            format!("{:>w$}", self.span.line, w = width).cyan().bold(),
            "|".cyan().bold(),
            line
        ));
        let padding = " ".repeat(width + 3 + self.span.column.saturating_sub(1));
        let underline = "^".repeat(self.span.length.max(1));
        snippet.push_str(&format!(
            " {} {}{}\n",
            " ".repeat(width + 1).cyan(),
            padding,
            underline.red().bold()
        ));
        Some(snippet)
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.format_simple())
    }
}

/// `thiserror`-derived wrapper that lets a single diagnostic travel through
/// `Result` plumbing as a normal error type. The pipeline returns
/// `Vec<CompileError>` rather than bailing on the first one: a failing
/// top-level module aborts, but the driver moves on to the next module.
#[derive(Debug, thiserror::Error, Clone)]
#[error("{0}")]
pub struct CompileError(pub Diagnostic);

impl From<Diagnostic> for CompileError {
    fn from(diag: Diagnostic) -> Self {
        CompileError(diag)
    }
}

/// Diagnostic collection and reporting engine, threaded through the
/// compiler pipeline by mutable reference rather than kept as global state.
#[derive(Debug, Default)]
pub struct DiagnosticEngine {
    diagnostics: Vec<Diagnostic>,
    error_count: usize,
    warning_count: usize,
}

impl DiagnosticEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn emit(&mut self, diagnostic: Diagnostic) {
        match diagnostic.level {
            ErrorLevel::Error => self.error_count += 1,
            ErrorLevel::Warning => self.warning_count += 1,
            ErrorLevel::Note => {}
        }
        self.diagnostics.push(diagnostic);
    }

    pub fn has_errors(&self) -> bool {
        self.error_count > 0
    }

    pub fn error_count(&self) -> usize {
        self.error_count
    }

    pub fn warning_count(&self) -> usize {
        self.warning_count
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn print_all(&self, source_code: &str) {
        for diag in &self.diagnostics {
            eprintln!("{}", diag.format(source_code));
        }
    }

    pub fn print_summary(&self) {
        if self.error_count > 0 {
            eprintln!(
                "\n{}: {} error{} emitted",
                "error".red().bold(),
                self.error_count,
                if self.error_count == 1 { "" } else { "s" }
            );
        }
        if self.warning_count > 0 {
            eprintln!(
                "{}: {} warning{} emitted",
                "warning".yellow().bold(),
                self.warning_count,
                if self.warning_count == 1 { "" } else { "s" }
            );
        }
    }

    /// Export diagnostics as JSON. Kept for tooling that consumes the
    /// compiler's output programmatically, even with no LSP attached.
    pub fn to_json(&self) -> serde_json::Result<String> {
        #[derive(Serialize)]
        struct JsonDiag<'a> {
            level: ErrorLevel,
            category: DiagnosticCategory,
            code: &'a str,
            message: &'a str,
            file: &'a str,
            line: usize,
            column: usize,
            length: usize,
            notes: &'a [String],
            help: &'a Option<String>,
        }

        let rows: Vec<JsonDiag> = self
            .diagnostics
            .iter()
            .map(|d| JsonDiag {
                level: d.level,
                category: d.category,
                code: &d.code,
                message: &d.message,
                file: &d.span.file,
                line: d.span.line,
                column: d.span.column,
                length: d.span.length,
                notes: &d.notes,
                help: &d.help,
            })
            .collect();

        serde_json::to_string(&rows)
    }

    pub fn clear(&mut self) {
        self.diagnostics.clear();
        self.error_count = 0;
        self.warning_count = 0;
    }
}

/// Local diagnostic codes, grouped by category. Combined with the
/// category's letter prefix (e.g. `R` for resolution errors) these form the
/// stable code shown to users, e.g. `R002`.
pub mod codes {
    pub const UNTERMINATED_ASM: u32 = 1;
    pub const INVALID_TOKEN: u32 = 2;

    pub const UNEXPECTED_TOKEN: u32 = 1;
    pub const UNEXPECTED_EOF: u32 = 2;
    pub const EXPECTED_EXPRESSION: u32 = 3;
    pub const MALFORMED_DECLARATION: u32 = 4;

    pub const UNDEFINED_IDENTIFIER: u32 = 1;
    pub const DUPLICATE_DEFINITION: u32 = 2;
    pub const UNDEFINED_TYPE: u32 = 3;
    pub const UNDEFINED_LIBRARY: u32 = 4;

    pub const TYPE_MISMATCH: u32 = 1;
    pub const NON_BOOL_CONDITION: u32 = 2;
    pub const ARGUMENT_COUNT: u32 = 3;
    pub const ARGUMENT_TYPE: u32 = 4;

    pub const BARE_LIBRARY_IDENTIFIER: u32 = 1;
    pub const INVALID_TRIGGER_NAME: u32 = 2;
    pub const REGISTER_EXHAUSTED: u32 = 3;
    pub const DUPLICATE_ALIAS: u32 = 4;
    pub const EMIT_OUTSIDE_CONTRACT: u32 = 5;

    pub const REGISTER_LEAK: u32 = 1;
    pub const UNREACHABLE_STATE: u32 = 2;
}

/// Fuzzy matching utilities for "did you mean?" suggestions.
pub mod fuzzy {
    use strsim::jaro_winkler;

    pub fn find_similar_names(
        target: &str,
        candidates: &[String],
        threshold: f64,
        max_suggestions: usize,
    ) -> Vec<String> {
        let mut scored: Vec<(String, f64)> = candidates
            .iter()
            .map(|candidate| (candidate.clone(), jaro_winkler(target, candidate)))
            .filter(|(_, score)| *score > threshold)
            .collect();

        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.into_iter().take(max_suggestions).map(|(name, _)| name).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_with_code_prefix() {
        let span = Span::new("test.tomb".to_string(), 2, 5, 3);
        let diag = Diagnostic::error(
            DiagnosticCategory::TypeError,
            codes::TYPE_MISMATCH,
            "mismatched types".to_string(),
            span,
        );
        assert_eq!(diag.code, "T001");
        let formatted = diag.format("a\nbbbbb\n");
        assert!(formatted.contains("T001"));
        assert!(formatted.contains("test.tomb:2:5"));
    }

    #[test]
    fn engine_counts_errors_and_warnings() {
        let mut engine = DiagnosticEngine::new();
        engine.emit(Diagnostic::error(
            DiagnosticCategory::SyntaxError,
            codes::UNEXPECTED_TOKEN,
            "bad token".to_string(),
            Span::unknown(),
        ));
        engine.emit(Diagnostic::warning(
            DiagnosticCategory::ShapeError,
            codes::DUPLICATE_ALIAS,
            "duplicate alias".to_string(),
            Span::unknown(),
        ));
        assert!(engine.has_errors());
        assert_eq!(engine.error_count(), 1);
        assert_eq!(engine.warning_count(), 1);
    }

    #[test]
    fn to_json_round_trips_through_serde_json() {
        let mut engine = DiagnosticEngine::new();
        engine.emit(Diagnostic::error(
            DiagnosticCategory::ResolutionError,
            codes::UNDEFINED_IDENTIFIER,
            "cannot find `foo`".to_string(),
            Span::new("m.tomb".to_string(), 1, 1, 3),
        ));
        let json = engine.to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value[0]["code"], "R001");
    }

    #[test]
    fn span_from_file_and_span_tracks_line_and_column() {
        let source = "abc\ndef";
        let span = Span::from_file_and_span("m.tomb", source, 4..5);
        assert_eq!(span.line, 2);
        assert_eq!(span.column, 1);
    }

    #[test]
    fn fuzzy_suggestions_prefer_close_matches() {
        let candidates = vec!["balance".to_string(), "owner".to_string()];
        let found = fuzzy::find_similar_names("balanc", &candidates, 0.7, 1);
        assert_eq!(found, vec!["balance".to_string()]);
    }
}
