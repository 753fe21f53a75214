use logos::Logos;

/// Kinds a [`Token`] can carry. Most kinds are produced directly by the
/// `logos` regex table below; `Type` and `Bool` are reclassified from a
/// plain identifier match after the fact, matching the lexer's rule that
/// keyword lexemes stay `Identifier` while type/bool lexemes get
/// reclassified.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Identifier,
    Number,
    String,
    Bool,
    Address,
    Hash,
    Bytes,
    Macro,
    Type,
    Operator,
    Separator,
    Selector,
    Asm,
}

/// Names reserved by the grammar. Their lexemes are still lexed as plain
/// `Identifier` tokens (kind never becomes a dedicated keyword kind); the
/// parser dispatches on the lexeme text.
pub const KEYWORDS: &[&str] = &[
    "contract",
    "script",
    "description",
    "struct",
    "const",
    "global",
    "import",
    "event",
    "constructor",
    "public",
    "private",
    "task",
    "trigger",
    "code",
    "emit",
    "return",
    "throw",
    "local",
    "if",
    "else",
    "while",
    "do",
    "asm",
];

/// `VarKind` names that the lexer recognizes case-insensitively as a
/// `Type` token, excluding the meta kinds that never appear in source.
const TYPE_NAMES: &[&str] = &[
    "number",
    "bool",
    "string",
    "bytes",
    "address",
    "hash",
    "struct",
    "storage_map",
    "storage_list",
    "storage_set",
];

fn is_type_name(lexeme: &str) -> bool {
    TYPE_NAMES.iter().any(|t| t.eq_ignore_ascii_case(lexeme))
}

#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(error = LexError)]
#[logos(skip r"[ \t\r\n]+")]
#[logos(skip r"//[^\n]*")]
#[logos(skip r"/\*([^*]|\*[^/])*\*/")]
pub enum Raw {
    #[regex(r"[A-Za-z_][A-Za-z_0-9]*", |lex| lex.slice().to_string())]
    Ident(String),

    #[regex(r"-?[0-9]+", |lex| lex.slice().to_string())]
    Number(String),

    #[regex(r#""([^"\\]|\\.)*""#, |lex| {
        let s = lex.slice();
        s[1..s.len() - 1].to_string()
    })]
    Str(String),

    #[regex(r"@[A-Za-z0-9]+", |lex| lex.slice()[1..].to_string())]
    Address(String),

    #[regex(r"#[0-9a-fA-F]+", |lex| lex.slice()[1..].to_string())]
    Hash(String),

    #[regex(r"0x[0-9a-fA-F]+", |lex| lex.slice()[2..].to_string())]
    Bytes(String),

    #[regex(r"\$[A-Za-z_][A-Za-z_0-9]*", |lex| lex.slice()[1..].to_string())]
    Macro(String),

    // Compound assignment and multi-char operators must be listed before
    // their single-char prefixes so the longest match wins.
    #[token(":=")]
    AssignDecl,
    #[token("==")]
    EqEq,
    #[token("!=")]
    NotEq,
    #[token("<=")]
    LtEq,
    #[token(">=")]
    GtEq,
    #[token("<<=")]
    ShlEq,
    #[token(">>=")]
    ShrEq,
    #[token("<<")]
    Shl,
    #[token(">>")]
    Shr,
    #[token("+=")]
    PlusEq,
    #[token("-=")]
    MinusEq,
    #[token("*=")]
    StarEq,
    #[token("/=")]
    SlashEq,
    #[token("%=")]
    PercentEq,
    #[token("&=")]
    AmpEq,
    #[token("|=")]
    PipeEq,
    #[token("^=")]
    CaretEq,
    #[token("<")]
    Lt,
    #[token(">")]
    Gt,
    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,
    #[token("/")]
    Slash,
    #[token("%")]
    Percent,
    #[token("&")]
    Amp,
    #[token("|")]
    Pipe,
    #[token("^")]
    Caret,

    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,
    #[token(",")]
    Comma,
    #[token(";")]
    Semicolon,
    #[token(":")]
    Colon,
    #[token("=")]
    Eq,
    #[token(".")]
    Dot,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub enum LexError {
    #[default]
    InvalidToken,
    UnterminatedAsm,
}

impl std::fmt::Display for LexError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LexError::InvalidToken => write!(f, "invalid token"),
            LexError::UnterminatedAsm => write!(f, "unterminated asm block"),
        }
    }
}
impl std::error::Error for LexError {}

/// A single lexed token: kind, source lexeme, and 1-based line/column of its
/// first character — diagnostics are 1-based throughout.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub lexeme: String,
    pub line: usize,
    pub column: usize,
    pub span: std::ops::Range<usize>,
}

pub struct Lexer<'source> {
    inner: logos::Lexer<'source, Raw>,
    source: &'source str,
    /// Set right after emitting the `{` that opened an `asm` block; the
    /// next call to `next_token` captures the interior verbatim instead of
    /// resuming normal token matching, leaving the closing `}` for the call
    /// after that. This is the only piece of lexer state beyond the cursor
    /// logos itself tracks, and it exists solely to implement the "asm body
    /// is captured verbatim, surrounding braces stay separate tokens" rule.
    expect_asm_body: bool,
    last_was_asm_keyword: bool,
}

impl<'source> Lexer<'source> {
    pub fn new(source: &'source str) -> Self {
        Self {
            inner: Raw::lexer(source),
            source,
            expect_asm_body: false,
            last_was_asm_keyword: false,
        }
    }

    fn line_col(&self, start: usize) -> (usize, usize) {
        let before = &self.source[..start];
        let line = before.chars().filter(|&c| c == '\n').count() + 1;
        let column = before
            .rfind('\n')
            .map_or(before.chars().count() + 1, |pos| {
                before[pos + 1..].chars().count() + 1
            });
        (line, column)
    }

    /// Lex the whole source into a token vector, or the first error hit.
    pub fn tokenize(source: &'source str) -> Result<Vec<Token>, (LexError, usize, usize)> {
        let mut lexer = Self::new(source);
        let mut out = Vec::new();
        loop {
            match lexer.next_token() {
                Some(Ok(tok)) => out.push(tok),
                Some(Err(e)) => {
                    let span = lexer.inner.span();
                    let (line, column) = lexer.line_col(span.start);
                    return Err((e, line, column));
                }
                None => break,
            }
        }
        Ok(out)
    }

    /// Scan the asm block interior starting right after the opening `{`,
    /// stopping at the matching (non-nested) closing `}`. Leaves
    /// the closing brace unconsumed so the next `next_token` call sees it as
    /// an ordinary `Separator`.
    fn capture_asm_body(&mut self) -> Result<Token, LexError> {
        let start = self.inner.span().end;
        let remainder = self.inner.remainder();
        let end = remainder.find('}').ok_or(LexError::UnterminatedAsm)?;
        let body = &remainder[..end];
        let (line, column) = self.line_col(start);
        let lexeme = body
            .lines()
            .map(|l| l.trim())
            .collect::<Vec<_>>()
            .join("\n");
        self.inner.bump(end);
        Ok(Token {
            kind: TokenKind::Asm,
            lexeme,
            line,
            column,
            span: start..start + end,
        })
    }

    fn next_token(&mut self) -> Option<Result<Token, LexError>> {
        if self.expect_asm_body {
            self.expect_asm_body = false;
            return Some(self.capture_asm_body());
        }

        let raw = self.inner.next()?;
        let span = self.inner.span();
        let (line, column) = self.line_col(span.start);

        let raw = match raw {
            Ok(r) => r,
            Err(e) => return Some(Err(e)),
        };

        let was_asm_keyword = self.last_was_asm_keyword;
        self.last_was_asm_keyword = matches!(&raw, Raw::Ident(s) if s == "asm");

        if was_asm_keyword && matches!(raw, Raw::LBrace) {
            self.expect_asm_body = true;
        }

        let (kind, lexeme) = match raw {
            Raw::Ident(s) => {
                if s.eq_ignore_ascii_case("true") || s.eq_ignore_ascii_case("false") {
                    (TokenKind::Bool, s)
                } else if is_type_name(&s) {
                    (TokenKind::Type, s)
                } else {
                    (TokenKind::Identifier, s)
                }
            }
            Raw::Number(s) => (TokenKind::Number, s),
            Raw::Str(s) => (TokenKind::String, s),
            Raw::Address(s) => (TokenKind::Address, s),
            Raw::Hash(s) => (TokenKind::Hash, s),
            Raw::Bytes(s) => (TokenKind::Bytes, s),
            Raw::Macro(s) => (TokenKind::Macro, s),
            Raw::LParen => (TokenKind::Separator, "(".to_string()),
            Raw::RParen => (TokenKind::Separator, ")".to_string()),
            Raw::LBrace => (TokenKind::Separator, "{".to_string()),
            Raw::RBrace => (TokenKind::Separator, "}".to_string()),
            Raw::LBracket => (TokenKind::Separator, "[".to_string()),
            Raw::RBracket => (TokenKind::Separator, "]".to_string()),
            Raw::Comma => (TokenKind::Separator, ",".to_string()),
            Raw::Semicolon => (TokenKind::Separator, ";".to_string()),
            Raw::Colon => (TokenKind::Separator, ":".to_string()),
            Raw::Dot => (TokenKind::Selector, ".".to_string()),
            Raw::Eq => (TokenKind::Separator, "=".to_string()),
            other => (TokenKind::Operator, operator_lexeme(&other)),
        };

        Some(Ok(Token {
            kind,
            lexeme,
            line,
            column,
            span,
        }))
    }
}

fn operator_lexeme(raw: &Raw) -> String {
    match raw {
        Raw::AssignDecl => ":=",
        Raw::EqEq => "==",
        Raw::NotEq => "!=",
        Raw::LtEq => "<=",
        Raw::GtEq => ">=",
        Raw::ShlEq => "<<=",
        Raw::ShrEq => ">>=",
        Raw::Shl => "<<",
        Raw::Shr => ">>",
        Raw::PlusEq => "+=",
        Raw::MinusEq => "-=",
        Raw::StarEq => "*=",
        Raw::SlashEq => "/=",
        Raw::PercentEq => "%=",
        Raw::AmpEq => "&=",
        Raw::PipeEq => "|=",
        Raw::CaretEq => "^=",
        Raw::Lt => "<",
        Raw::Gt => ">",
        Raw::Plus => "+",
        Raw::Minus => "-",
        Raw::Star => "*",
        Raw::Slash => "/",
        Raw::Percent => "%",
        Raw::Amp => "&",
        Raw::Pipe => "|",
        Raw::Caret => "^",
        _ => unreachable!("operator_lexeme called on non-operator variant"),
    }
    .to_string()
}

impl<'source> Iterator for Lexer<'source> {
    type Item = Result<Token, LexError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_token()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lexes_keywords_as_identifier() {
        let toks = Lexer::tokenize("contract struct public private").unwrap();
        assert!(toks.iter().all(|t| t.kind == TokenKind::Identifier));
        assert_eq!(toks[0].lexeme, "contract");
    }

    #[test]
    fn lexes_type_names_case_insensitively() {
        let toks = Lexer::tokenize("Number bool ADDRESS").unwrap();
        assert!(toks.iter().all(|t| t.kind == TokenKind::Type));
    }

    #[test]
    fn lexes_bool_literal() {
        let toks = Lexer::tokenize("true false").unwrap();
        assert_eq!(toks[0].kind, TokenKind::Bool);
        assert_eq!(toks[1].kind, TokenKind::Bool);
    }

    #[test]
    fn lexes_literals() {
        let toks = Lexer::tokenize(r#"42 -7 "hi" @abc123 #deadbeef 0xFF01 $NOW"#).unwrap();
        assert_eq!(toks[0].kind, TokenKind::Number);
        assert_eq!(toks[0].lexeme, "42");
        assert_eq!(toks[1].lexeme, "-7");
        assert_eq!(toks[2].kind, TokenKind::String);
        assert_eq!(toks[2].lexeme, "hi");
        assert_eq!(toks[3].kind, TokenKind::Address);
        assert_eq!(toks[3].lexeme, "abc123");
        assert_eq!(toks[4].kind, TokenKind::Hash);
        assert_eq!(toks[4].lexeme, "deadbeef");
        assert_eq!(toks[5].kind, TokenKind::Bytes);
        assert_eq!(toks[5].lexeme, "FF01");
        assert_eq!(toks[6].kind, TokenKind::Macro);
        assert_eq!(toks[6].lexeme, "NOW");
    }

    #[test]
    fn lexes_asm_block_with_separate_braces() {
        let toks = Lexer::tokenize("asm {\n  PUSH r1\n  POP r1\n}").unwrap();
        assert_eq!(toks[0].kind, TokenKind::Identifier);
        assert_eq!(toks[0].lexeme, "asm");
        assert_eq!(toks[1].kind, TokenKind::Separator);
        assert_eq!(toks[1].lexeme, "{");
        assert_eq!(toks[2].kind, TokenKind::Asm);
        assert_eq!(toks[2].lexeme, "PUSH r1\nPOP r1");
        assert_eq!(toks[3].kind, TokenKind::Separator);
        assert_eq!(toks[3].lexeme, "}");
        assert_eq!(toks.len(), 4);
    }

    #[test]
    fn line_column_tracking() {
        let toks = Lexer::tokenize("a\nb  c").unwrap();
        assert_eq!((toks[0].line, toks[0].column), (1, 1));
        assert_eq!((toks[1].line, toks[1].column), (2, 1));
        assert_eq!((toks[2].line, toks[2].column), (2, 4));
    }

    #[test]
    fn longest_match_operators() {
        let toks = Lexer::tokenize("<<= >>= += == !=").unwrap();
        let lexemes: Vec<_> = toks.iter().map(|t| t.lexeme.as_str()).collect();
        assert_eq!(lexemes, vec!["<<=", ">>=", "+=", "==", "!="]);
    }

    #[test]
    fn skips_comments() {
        let toks = Lexer::tokenize("a // comment\n/* block */ b").unwrap();
        assert_eq!(toks.len(), 2);
        assert_eq!(toks[0].lexeme, "a");
        assert_eq!(toks[1].lexeme, "b");
    }

    #[test]
    fn unterminated_asm_is_error() {
        let err = Lexer::tokenize("asm { PUSH r1").unwrap_err();
        assert_eq!(err.0, LexError::UnterminatedAsm);
    }
}
