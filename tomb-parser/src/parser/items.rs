// Top-level module parsing: `contract`/`script`/`description`, and the
// per-module-item grammar nested inside them (const, global, import, event,
// constructor, method, task, trigger, code).

use std::sync::Arc;

use tomb_ast::{
    Contract, EventDeclaration, LiteralValue, MethodInterface, MethodKind, Module, Script,
    Storage, VarKind,
};
use tomb_diagnostics::CompileError;
use tomb_lexer::TokenKind;

use super::{decode_hex, ParsedType, Parser};

/// First numeric value assigned to a contract's own events. Values below
/// this are reserved for trigger dispatch codes the host runtime owns, so
/// user events never collide with them.
const EVENT_NUMERIC_BASE: i64 = 1000;

const ACCOUNT_TRIGGERS: &[&str] = &["onCreate", "onDestroy", "onReceive", "onUpdate"];
const TOKEN_TRIGGERS: &[&str] = &["onMint", "onBurn", "onTransfer", "onApprove"];

fn normalize_trigger_name(raw: &str) -> Option<&'static str> {
    let candidate = if raw.len() >= 2 && raw[..2].eq_ignore_ascii_case("on") {
        raw.to_string()
    } else {
        format!("on{}", raw)
    };
    ACCOUNT_TRIGGERS
        .iter()
        .chain(TOKEN_TRIGGERS.iter())
        .find(|known| known.eq_ignore_ascii_case(&candidate))
        .copied()
}

impl<'a> Parser<'a> {
    // ==================== contract / script ====================

    pub(crate) fn parse_contract(&mut self) -> Result<Module, CompileError> {
        self.expect("contract")?;
        let name_tok = self.expect_identifier()?;
        let contract_scope = self.scopes.push_root();
        self.current_scope = contract_scope;
        self.in_contract = true;
        self.current_events = Vec::new();

        self.expect("{")?;
        let mut libraries: Vec<Arc<tomb_ast::LibraryDeclaration>> = Vec::new();
        let mut methods = Vec::new();

        while !self.check("}") && !self.is_at_end() {
            let lexeme = self.peek().lexeme.clone();
            match lexeme.as_str() {
                "const" => {
                    self.parse_const_decl()?;
                }
                "global" => {
                    self.parse_global_decl()?;
                }
                "import" => {
                    if let Some(lib) = self.parse_import()? {
                        if !libraries.iter().any(|l| l.name == lib.name) {
                            libraries.push(lib);
                        }
                    }
                }
                "event" => {
                    let event = self.parse_event_decl()?;
                    self.current_events.push(event);
                }
                "constructor" => {
                    methods.push(self.parse_constructor(&name_tok.lexeme)?);
                }
                "public" => {
                    methods.push(self.parse_method(true, &name_tok.lexeme)?);
                }
                "private" => {
                    methods.push(self.parse_method(false, &name_tok.lexeme)?);
                }
                "task" => {
                    methods.push(self.parse_task(&name_tok.lexeme)?);
                }
                "trigger" => {
                    methods.push(self.parse_trigger(&name_tok.lexeme)?);
                }
                "code" => {
                    let line = self.peek().line;
                    return Err(self.shape_error(
                        "`code` is only valid in a `script`/`description` module".to_string(),
                        line,
                    ));
                }
                _ => return Err(self.syntax_error(format!("unexpected token `{}` in contract body", lexeme))),
            }
        }
        self.expect("}")?;

        let contract = Contract {
            name: name_tok.lexeme,
            scope: contract_scope,
            libraries,
            methods,
            events: std::mem::take(&mut self.current_events),
        };
        self.in_contract = false;
        Ok(Module::Contract(contract))
    }

    pub(crate) fn parse_script(&mut self, hidden: bool) -> Result<Module, CompileError> {
        self.expect(if hidden { "description" } else { "script" })?;
        let name_tok = self.expect_identifier()?;
        let script_scope = self.scopes.push_root();
        self.current_scope = script_scope;
        self.in_contract = false;

        self.expect("{")?;
        let mut code: Option<(Vec<tomb_ast::VarDecl>, tomb_ast::StatementBlock, Option<tomb_ast::VarType>)> = None;

        while !self.check("}") && !self.is_at_end() {
            let lexeme = self.peek().lexeme.clone();
            match lexeme.as_str() {
                "const" => {
                    self.parse_const_decl()?;
                }
                "global" => {
                    self.parse_global_decl()?;
                }
                "import" => {
                    self.parse_import()?;
                }
                "code" => {
                    if code.is_some() {
                        let line = self.peek().line;
                        return Err(self.shape_error("a script declares exactly one `code` block".to_string(), line));
                    }
                    code = Some(self.parse_code_block()?);
                }
                other => {
                    let line = self.peek().line;
                    return Err(self.shape_error(
                        format!("`{}` is not valid in a `script`/`description` module", other),
                        line,
                    ));
                }
            }
        }
        self.expect("}")?;

        let (parameters, main_block, return_type) = code.ok_or_else(|| {
            self.shape_error(
                "a script/description module must declare a `code` block".to_string(),
                name_tok.line,
            )
        })?;

        Ok(Module::Script(Script {
            name: name_tok.lexeme,
            hidden,
            parameters,
            main_block,
            return_type,
            compiled_bytes: None,
        }))
    }

    // ==================== const / global / import ====================

    pub(crate) fn parse_const_decl(&mut self) -> Result<(), CompileError> {
        self.expect("const")?;
        let name = self.expect_identifier()?;
        self.expect(":")?;
        let line = self.peek().line;
        let parsed = self.parse_type_ref()?;
        let var_type = parsed.expect_plain(self, line)?;
        self.expect("=")?;
        let literal_value = self.parse_literal_matching(&var_type)?;
        self.expect(";")?;
        self.scopes.declare_constant(
            self.current_scope,
            tomb_ast::ConstDeclaration {
                name: name.lexeme,
                var_type,
                literal_value,
            },
        );
        Ok(())
    }

    pub(crate) fn parse_global_decl(&mut self) -> Result<(), CompileError> {
        self.expect("global")?;
        let name = self.expect_identifier()?;
        self.expect(":")?;
        let parsed = self.parse_type_ref()?;
        self.expect(";")?;
        let decl = self.build_var_decl(name.lexeme, parsed, Storage::Global);
        self.scopes.declare_variable(self.current_scope, decl);
        Ok(())
    }

    pub(crate) fn parse_import(&mut self) -> Result<Option<Arc<tomb_ast::LibraryDeclaration>>, CompileError> {
        self.expect("import")?;
        let name = self.expect_identifier()?;
        self.expect(";")?;
        let lib = self.registry.library(&name.lexeme).ok_or_else(|| {
            self.resolution_error_at(format!("undefined library `{}`", name.lexeme), name.line, name.column)
        })?;
        self.scopes.declare_library(self.current_scope, lib.clone());
        Ok(Some(lib))
    }

    fn parse_literal_matching(&mut self, var_type: &tomb_ast::VarType) -> Result<LiteralValue, CompileError> {
        let tok = self.peek().clone();
        let value = match var_type.kind() {
            VarKind::Number if tok.kind == TokenKind::Number => {
                self.advance();
                let n: i64 = tok
                    .lexeme
                    .parse()
                    .map_err(|_| self.syntax_error(format!("invalid number literal `{}`", tok.lexeme)))?;
                LiteralValue::Number(n)
            }
            VarKind::Bool if tok.kind == TokenKind::Bool => {
                self.advance();
                LiteralValue::Bool(tok.lexeme.eq_ignore_ascii_case("true"))
            }
            VarKind::String if tok.kind == TokenKind::String => {
                self.advance();
                LiteralValue::String(tok.lexeme)
            }
            VarKind::Bytes if tok.kind == TokenKind::Bytes => {
                self.advance();
                LiteralValue::Bytes(decode_hex(&tok.lexeme).map_err(|e| self.syntax_error(e))?)
            }
            VarKind::Address if tok.kind == TokenKind::Address => {
                self.advance();
                LiteralValue::Address(tok.lexeme)
            }
            VarKind::Hash if tok.kind == TokenKind::Hash => {
                self.advance();
                LiteralValue::Hash(tok.lexeme)
            }
            _ => {
                return Err(self.type_error_at(
                    format!("literal `{}` does not match declared type `{}`", tok.lexeme, var_type),
                    tok.line,
                    tok.column,
                ))
            }
        };
        Ok(value)
    }

    // ==================== events ====================

    fn parse_event_decl(&mut self) -> Result<EventDeclaration, CompileError> {
        self.expect("event")?;
        let name = self.expect_identifier()?;
        self.expect(":")?;
        let line = self.peek().line;
        let parsed = self.parse_type_ref()?;
        let payload_type = parsed.expect_plain(self, line)?;
        self.expect("=")?;

        let tok = self.peek().clone();
        let description_bytes = match tok.kind {
            TokenKind::String => {
                self.advance();
                tok.lexeme.into_bytes()
            }
            TokenKind::Bytes => {
                self.advance();
                decode_hex(&tok.lexeme).map_err(|e| self.syntax_error(e))?
            }
            TokenKind::Identifier => {
                self.advance();
                self.description_bytes(&tok.lexeme)
                    .map(|b| b.to_vec())
                    .ok_or_else(|| {
                        self.resolution_error_at(
                            format!("unknown description script `{}`", tok.lexeme),
                            tok.line,
                            tok.column,
                        )
                    })?
            }
            _ => return Err(self.syntax_error("expected a string, bytes literal, or description name".to_string())),
        };
        self.expect(";")?;

        let numeric_value = EVENT_NUMERIC_BASE + self.current_events.len() as i64;
        Ok(EventDeclaration {
            name: name.lexeme,
            numeric_value,
            payload_type,
            description_bytes,
        })
    }

    // ==================== methods ====================

    fn parse_params(&mut self) -> Result<Vec<tomb_ast::VarDecl>, CompileError> {
        self.expect("(")?;
        let mut params = Vec::new();
        if !self.check(")") {
            loop {
                let name = self.expect_identifier()?;
                self.expect(":")?;
                let line = self.peek().line;
                let parsed = self.parse_type_ref()?;
                let var_type = parsed.expect_plain(self, line)?;
                params.push(tomb_ast::VarDecl {
                    scope: None,
                    name: name.lexeme,
                    var_type,
                    storage: Storage::Argument,
                    collection: None,
                });
                if !self.match_lexeme(",") {
                    break;
                }
            }
        }
        self.expect(")")?;
        Ok(params)
    }

    /// Push a fresh scope for a method-shaped body (constructor, method,
    /// task, trigger, or a script's `code` block), parse its body statements
    /// directly into that scope (the body shares the parameters' frame — it
    /// does not get a second nested scope the way an `if`/`while` block
    /// does), and restore the parser's scope afterwards.
    fn parse_method_body(
        &mut self,
        parameters: Vec<tomb_ast::VarDecl>,
        return_type: Option<tomb_ast::VarType>,
        label: Option<String>,
    ) -> Result<(tomb_ast::ScopeId, tomb_ast::StatementBlock), CompileError> {
        let parent = self.current_scope;
        let body_scope = self.scopes.push_child(parent, label);
        let parameters: Vec<tomb_ast::VarDecl> = parameters
            .into_iter()
            .map(|mut p| {
                p.scope = Some(body_scope);
                p
            })
            .collect();
        self.scopes.set_parameters(body_scope, parameters);

        let saved_scope = self.current_scope;
        let saved_return_type = self.current_return_type.take();
        self.current_scope = body_scope;
        self.current_return_type = return_type;

        self.expect("{")?;
        let statements = self.parse_statement_list()?;
        self.expect("}")?;

        self.current_scope = saved_scope;
        self.current_return_type = saved_return_type;

        Ok((body_scope, tomb_ast::StatementBlock { scope: body_scope, statements }))
    }

    pub(crate) fn parse_constructor(&mut self, contract_name: &str) -> Result<MethodInterface, CompileError> {
        let line = self.peek().line;
        self.expect("constructor")?;
        let parameters = self.parse_params()?;
        if parameters.len() != 1 || parameters[0].var_type.kind() != VarKind::Address {
            return Err(self.shape_error(
                "a constructor takes exactly one `address` parameter".to_string(),
                line,
            ));
        }
        let (scope, body) = self.parse_method_body(parameters.clone(), None, Some("constructor".to_string()))?;
        Ok(MethodInterface {
            owning_library: None,
            implementation_type: contract_name.to_string(),
            name: "Initialize".to_string(),
            is_public: true,
            kind: MethodKind::Constructor,
            return_type: None,
            parameters: self.scopes.get(scope).parameters.clone(),
            body: Some(body),
            scope: Some(scope),
            line,
        })
    }

    pub(crate) fn parse_method(&mut self, is_public: bool, contract_name: &str) -> Result<MethodInterface, CompileError> {
        let line = self.peek().line;
        self.expect(if is_public { "public" } else { "private" })?;
        let name = self.expect_identifier()?;
        let parameters = self.parse_params()?;
        let return_type = if self.match_lexeme(":") {
            let line = self.peek().line;
            Some(self.parse_type_ref()?.expect_plain(self, line)?)
        } else {
            None
        };
        let (scope, body) = self.parse_method_body(parameters, return_type.clone(), Some(name.lexeme.clone()))?;
        Ok(MethodInterface {
            owning_library: None,
            implementation_type: contract_name.to_string(),
            name: name.lexeme,
            is_public,
            kind: MethodKind::Method,
            return_type,
            parameters: self.scopes.get(scope).parameters.clone(),
            body: Some(body),
            scope: Some(scope),
            line,
        })
    }

    pub(crate) fn parse_task(&mut self, contract_name: &str) -> Result<MethodInterface, CompileError> {
        let line = self.peek().line;
        self.expect("task")?;
        let name = self.expect_identifier()?;
        let parameters = self.parse_params()?;
        let (scope, body) = self.parse_method_body(parameters, None, Some(name.lexeme.clone()))?;
        Ok(MethodInterface {
            owning_library: None,
            implementation_type: contract_name.to_string(),
            name: name.lexeme,
            is_public: true,
            kind: MethodKind::Task,
            return_type: None,
            parameters: self.scopes.get(scope).parameters.clone(),
            body: Some(body),
            scope: Some(scope),
            line,
        })
    }

    pub(crate) fn parse_trigger(&mut self, contract_name: &str) -> Result<MethodInterface, CompileError> {
        let line = self.peek().line;
        self.expect("trigger")?;
        let name_tok = self.expect_identifier()?;
        let normalized = normalize_trigger_name(&name_tok.lexeme).ok_or_else(|| {
            let candidates: Vec<String> = ACCOUNT_TRIGGERS
                .iter()
                .chain(TOKEN_TRIGGERS.iter())
                .map(|s| s.to_string())
                .collect();
            let suggestions = tomb_diagnostics::fuzzy::find_similar_names(&name_tok.lexeme, &candidates, 0.7, 3);
            let mut message = format!("`{}` is not a recognized trigger name", name_tok.lexeme);
            if !suggestions.is_empty() {
                message.push_str(&format!(" (did you mean `{}`?)", suggestions.join("`, `")));
            }
            self.shape_error(message, name_tok.line)
        })?;
        let parameters = self.parse_params()?;
        let (scope, body) = self.parse_method_body(parameters, None, Some(normalized.to_string()))?;
        Ok(MethodInterface {
            owning_library: None,
            implementation_type: contract_name.to_string(),
            name: normalized.to_string(),
            is_public: true,
            kind: MethodKind::Trigger,
            return_type: None,
            parameters: self.scopes.get(scope).parameters.clone(),
            body: Some(body),
            scope: Some(scope),
            line,
        })
    }

    fn parse_code_block(
        &mut self,
    ) -> Result<(Vec<tomb_ast::VarDecl>, tomb_ast::StatementBlock, Option<tomb_ast::VarType>), CompileError> {
        self.expect("code")?;
        let parameters = self.parse_params()?;
        let return_type = if self.match_lexeme(":") {
            let line = self.peek().line;
            Some(self.parse_type_ref()?.expect_plain(self, line)?)
        } else {
            None
        };
        let (scope, body) = self.parse_method_body(parameters, return_type.clone(), Some("code".to_string()))?;
        Ok((self.scopes.get(scope).parameters.clone(), body, return_type))
    }
}
