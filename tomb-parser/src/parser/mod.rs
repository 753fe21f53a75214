// Modular parser for the Tomb language.
// Organizes the single recursive-descent pass into logical components,
// mirroring how the grammar itself is laid out.

use std::sync::Arc;

use tomb_ast::{
    CollectionDecl, EventDeclaration, ListDeclaration, MapDeclaration, ScopeArena, ScopeId,
    SetDeclaration, Storage, StructDeclaration, TypeRegistry, VarDecl, VarKind, VarType,
};
use tomb_diagnostics::{codes, CompileError, Diagnostic, DiagnosticCategory, Span};
use tomb_lexer::{Lexer, Token, TokenKind};

mod expressions;
mod items;
mod statements;

/// A type reference as written in source, before it is folded down into a
/// plain [`VarType`] (for scalar fields) or a `CollectionDecl` (for
/// `global`/`local` declarations of a storage collection).
pub(crate) enum ParsedType {
    Plain(VarType),
    Map(VarType, VarType),
    List(VarType),
    Set(VarType),
}

impl ParsedType {
    pub(crate) fn expect_plain(self, parser: &Parser<'_>, line: usize) -> Result<VarType, CompileError> {
        match self {
            ParsedType::Plain(t) => Ok(t),
            _ => Err(parser.shape_error(
                "a storage-collection type is only valid on a `global` declaration".to_string(),
                line,
            )),
        }
    }
}

/// One struct declaration or one compiled module, as returned by a single
/// call to [`Parser::parse_next_top_level_item`].
pub enum TopLevelItem {
    Struct(Arc<StructDeclaration>),
    Module(tomb_ast::Module),
}

pub struct Parser<'a> {
    tokens: Vec<Token>,
    current: usize,
    source: &'a str,
    file_name: String,
    pub(crate) registry: Arc<TypeRegistry>,
    pub(crate) scopes: ScopeArena,
    pub(crate) current_scope: ScopeId,
    descriptions: Vec<(String, Vec<u8>)>,
    /// Whether the module currently being parsed is a `contract` (as
    /// opposed to a `script`/`description`) — `emit` is only valid there.
    pub(crate) in_contract: bool,
    /// Declared return type of the method/code block whose body is
    /// currently being parsed, consulted by `return` statements. `None`
    /// both outside any body and inside constructor/task/trigger bodies,
    /// which never declare one.
    pub(crate) current_return_type: Option<VarType>,
    /// Events declared so far in the contract currently being parsed, in
    /// declaration order — visible to `emit` statements in later method
    /// bodies within the same contract.
    pub(crate) current_events: Vec<EventDeclaration>,
}

impl<'a> Parser<'a> {
    pub fn new(source: &'a str, file_name: &str, registry: Arc<TypeRegistry>) -> Result<Self, CompileError> {
        let mut tokens = Lexer::tokenize(source).map_err(|(err, line, column)| {
            let span = Span::new(file_name.to_string(), line, column, 1);
            CompileError::from(Diagnostic::error(
                DiagnosticCategory::LexError,
                codes::INVALID_TOKEN,
                err.to_string(),
                span,
            ))
        })?;
        let eof_line = tokens.last().map(|t| t.line).unwrap_or(1);
        tokens.push(Token {
            kind: TokenKind::Separator,
            lexeme: "<eof>".to_string(),
            line: eof_line,
            column: 0,
            span: 0..0,
        });

        let mut scopes = ScopeArena::new();
        let current_scope = scopes.push_root();

        log::debug!("tokenized {} ({} tokens)", file_name, tokens.len());

        Ok(Self {
            tokens,
            current: 0,
            source,
            file_name: file_name.to_string(),
            registry,
            scopes,
            current_scope,
            descriptions: Vec::new(),
            in_contract: false,
            current_return_type: None,
            current_events: Vec::new(),
        })
    }

    pub fn is_at_end(&self) -> bool {
        self.tokens[self.current].lexeme == "<eof>"
    }

    /// Consume every token remaining of a failed top-level item, skipping
    /// forward until the start of the next one: a parser error aborts the
    /// current module, but the driver may continue to the next.
    pub fn recover_to_next_top_level_item(&mut self) {
        while !self.is_at_end()
            && !["struct", "contract", "script", "description"]
                .contains(&self.tokens[self.current].lexeme.as_str())
        {
            self.current += 1;
        }
    }

    /// Let the driver hand back the bytecode of a `description` script it
    /// has just run through codegen, so a later `event ... = <name>;` can
    /// embed it.
    pub fn register_description_bytecode(&mut self, name: &str, bytes: Vec<u8>) {
        self.descriptions.push((name.to_string(), bytes));
    }

    pub fn into_scopes(self) -> ScopeArena {
        self.scopes
    }

    pub fn scopes(&self) -> &ScopeArena {
        &self.scopes
    }

    pub fn parse_next_top_level_item(&mut self) -> Result<TopLevelItem, CompileError> {
        let tok = self.peek().clone();
        if tok.kind != TokenKind::Identifier {
            return Err(self.syntax_error("expected `struct`, `contract`, `script`, or `description`".to_string()));
        }
        match tok.lexeme.as_str() {
            "struct" => self.parse_struct_decl().map(TopLevelItem::Struct),
            "contract" => self.parse_contract().map(TopLevelItem::Module),
            "script" => self.parse_script(false).map(TopLevelItem::Module),
            "description" => self.parse_script(true).map(TopLevelItem::Module),
            _ => Err(self.syntax_error(format!(
                "expected `struct`, `contract`, `script`, or `description`, found `{}`",
                tok.lexeme
            ))),
        }
    }

    // ==================== cursor primitives ====================

    pub(crate) fn peek(&self) -> &Token {
        &self.tokens[self.current]
    }

    pub(crate) fn advance(&mut self) -> Token {
        let tok = self.tokens[self.current].clone();
        if !self.is_at_end() {
            self.current += 1;
        }
        tok
    }

    /// The grammar needs at most one token of rewind (e.g. deciding
    /// between an assignment and a method-call statement after peeking
    /// past the leading identifier).
    pub(crate) fn rewind(&mut self) {
        if self.current > 0 {
            self.current -= 1;
        }
    }

    pub(crate) fn check(&self, lexeme: &str) -> bool {
        self.tokens[self.current].lexeme == lexeme
    }

    pub(crate) fn check_kind(&self, kind: TokenKind) -> bool {
        self.tokens[self.current].kind == kind
    }

    pub(crate) fn match_lexeme(&mut self, lexeme: &str) -> bool {
        if self.check(lexeme) {
            self.advance();
            true
        } else {
            false
        }
    }

    pub(crate) fn expect(&mut self, lexeme: &str) -> Result<Token, CompileError> {
        if self.check(lexeme) {
            Ok(self.advance())
        } else {
            let found = self.peek().lexeme.clone();
            Err(self.syntax_error(format!("expected `{}`, found `{}`", lexeme, found)))
        }
    }

    pub(crate) fn expect_identifier(&mut self) -> Result<Token, CompileError> {
        if self.check_kind(TokenKind::Identifier) {
            Ok(self.advance())
        } else {
            Err(self.syntax_error("expected identifier".to_string()))
        }
    }

    // ==================== diagnostics ====================

    pub(crate) fn syntax_error(&self, message: String) -> CompileError {
        let tok = self.peek();
        let span = Span::new(self.file_name.clone(), tok.line, tok.column, tok.lexeme.len().max(1));
        Diagnostic::error(DiagnosticCategory::SyntaxError, codes::UNEXPECTED_TOKEN, message, span).into()
    }

    pub(crate) fn resolution_error_at(&self, message: String, line: usize, column: usize) -> CompileError {
        let span = Span::new(self.file_name.clone(), line, column, 1);
        Diagnostic::error(DiagnosticCategory::ResolutionError, codes::UNDEFINED_IDENTIFIER, message, span).into()
    }

    pub(crate) fn type_error_at(&self, message: String, line: usize, column: usize) -> CompileError {
        let span = Span::new(self.file_name.clone(), line, column, 1);
        Diagnostic::error(DiagnosticCategory::TypeError, codes::TYPE_MISMATCH, message, span).into()
    }

    pub(crate) fn shape_error(&self, message: String, line: usize) -> CompileError {
        let span = Span::new(self.file_name.clone(), line, 1, 1);
        Diagnostic::error(DiagnosticCategory::ShapeError, codes::BARE_LIBRARY_IDENTIFIER, message, span).into()
    }

    pub(crate) fn shape_error_coded(&self, code: u32, message: String, line: usize) -> CompileError {
        let span = Span::new(self.file_name.clone(), line, 1, 1);
        Diagnostic::error(DiagnosticCategory::ShapeError, code, message, span).into()
    }

    pub(crate) fn description_bytes(&self, name: &str) -> Option<&[u8]> {
        self.descriptions.iter().find(|(n, _)| n == name).map(|(_, b)| b.as_slice())
    }

    // ==================== struct declarations ====================

    pub(crate) fn parse_struct_decl(&mut self) -> Result<Arc<StructDeclaration>, CompileError> {
        self.expect("struct")?;
        let name_tok = self.expect_identifier()?;
        self.expect("{")?;

        let mut fields = Vec::new();
        while !self.check("}") && !self.is_at_end() {
            let field_name = self.expect_identifier()?;
            self.expect(":")?;
            let line = self.peek().line;
            let parsed_type = self.parse_type_ref()?;
            let field_type = parsed_type.expect_plain(self, line)?;
            self.expect(";")?;
            fields.push((field_name.lexeme, field_type));
        }
        self.expect("}")?;

        let decl = Arc::new(StructDeclaration {
            name: name_tok.lexeme,
            fields,
        });
        self.registry.intern_struct(decl.clone());
        log::debug!("parsed struct `{}`", decl.name);
        Ok(decl)
    }

    // ==================== type references ====================

    pub(crate) fn parse_type_ref(&mut self) -> Result<ParsedType, CompileError> {
        let tok = self.peek().clone();
        if tok.kind == TokenKind::Type {
            self.advance();
            let kind = type_kind_from_lexeme(&tok.lexeme).ok_or_else(|| {
                self.resolution_error_at(format!("unknown type `{}`", tok.lexeme), tok.line, tok.column)
            })?;
            match kind {
                VarKind::StorageMap => {
                    self.expect("<")?;
                    let key_line = self.peek().line;
                    let key = self.parse_type_ref()?.expect_plain(self, key_line)?;
                    self.expect(",")?;
                    let value_line = self.peek().line;
                    let value = self.parse_type_ref()?.expect_plain(self, value_line)?;
                    self.expect(">")?;
                    Ok(ParsedType::Map(key, value))
                }
                VarKind::StorageList => {
                    self.expect("<")?;
                    let value_line = self.peek().line;
                    let value = self.parse_type_ref()?.expect_plain(self, value_line)?;
                    self.expect(">")?;
                    Ok(ParsedType::List(value))
                }
                VarKind::StorageSet => {
                    self.expect("<")?;
                    let value_line = self.peek().line;
                    let value = self.parse_type_ref()?.expect_plain(self, value_line)?;
                    self.expect(">")?;
                    Ok(ParsedType::Set(value))
                }
                _ => Ok(ParsedType::Plain(self.registry.primitive(kind))),
            }
        } else if tok.kind == TokenKind::Identifier {
            self.advance();
            let ty = self.registry.lookup_struct(&tok.lexeme).ok_or_else(|| {
                self.resolution_error_at(format!("undefined type `{}`", tok.lexeme), tok.line, tok.column)
            })?;
            Ok(ParsedType::Plain(ty))
        } else {
            Err(self.syntax_error("expected a type".to_string()))
        }
    }

    /// Fold a [`ParsedType`] plus a name/storage class down into the
    /// `VarDecl` shape `global`/`local` declarations share (storage
    /// collections carry their key/value types in `collection` rather than
    /// in `var_type`, which instead holds the bare `StorageMap`/`StorageList`/
    /// `StorageSet` tag).
    pub(crate) fn build_var_decl(&self, name: String, parsed: ParsedType, storage: Storage) -> VarDecl {
        match parsed {
            ParsedType::Plain(var_type) => VarDecl {
                scope: Some(self.current_scope),
                name,
                var_type,
                storage,
                collection: None,
            },
            ParsedType::Map(key_type, value_type) => VarDecl {
                scope: Some(self.current_scope),
                name,
                var_type: self.registry.primitive(VarKind::StorageMap),
                storage,
                collection: Some(CollectionDecl::Map(MapDeclaration { key_type, value_type })),
            },
            ParsedType::List(value_type) => VarDecl {
                scope: Some(self.current_scope),
                name,
                var_type: self.registry.primitive(VarKind::StorageList),
                storage,
                collection: Some(CollectionDecl::List(ListDeclaration { value_type })),
            },
            ParsedType::Set(value_type) => VarDecl {
                scope: Some(self.current_scope),
                name,
                var_type: self.registry.primitive(VarKind::StorageSet),
                storage,
                collection: Some(CollectionDecl::Set(SetDeclaration { value_type })),
            },
        }
    }
}

/// Stands in for an out-of-scope Base16 codec collaborator, just far
/// enough to turn a `bytes` literal's hex digits into raw bytes.
pub(crate) fn decode_hex(s: &str) -> Result<Vec<u8>, String> {
    if s.len() % 2 != 0 {
        return Err(format!("hex literal `{}` has an odd number of digits", s));
    }
    let mut out = Vec::with_capacity(s.len() / 2);
    let digits = s.as_bytes();
    for pair in digits.chunks(2) {
        let hi = (pair[0] as char)
            .to_digit(16)
            .ok_or_else(|| format!("invalid hex digit in `{}`", s))?;
        let lo = (pair[1] as char)
            .to_digit(16)
            .ok_or_else(|| format!("invalid hex digit in `{}`", s))?;
        out.push(((hi << 4) | lo) as u8);
    }
    Ok(out)
}

fn type_kind_from_lexeme(lexeme: &str) -> Option<VarKind> {
    match lexeme.to_ascii_lowercase().as_str() {
        "number" => Some(VarKind::Number),
        "bool" => Some(VarKind::Bool),
        "string" => Some(VarKind::String),
        "bytes" => Some(VarKind::Bytes),
        "address" => Some(VarKind::Address),
        "hash" => Some(VarKind::Hash),
        "struct" => Some(VarKind::Struct),
        "storage_map" => Some(VarKind::StorageMap),
        "storage_list" => Some(VarKind::StorageList),
        "storage_set" => Some(VarKind::StorageSet),
        _ => None,
    }
}
