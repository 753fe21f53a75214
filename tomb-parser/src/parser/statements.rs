// Statement and statement-block parsing.

use tomb_ast::{Statement, StatementBlock, Storage, VarKind};
use tomb_diagnostics::{codes, CompileError};

use super::Parser;

const ASSIGN_OPS: &[&str] = &[
    ":=", "+=", "-=", "*=", "/=", "%=", "&=", "|=", "^=", "<<=", ">>=",
];

impl<'a> Parser<'a> {
    pub(crate) fn parse_statement_list(&mut self) -> Result<Vec<Statement>, CompileError> {
        let mut statements = Vec::new();
        while !self.check("}") && !self.is_at_end() {
            if let Some(stmt) = self.parse_statement()? {
                statements.push(stmt);
            }
        }
        Ok(statements)
    }

    /// A new child scope is pushed for `if`/`while`/`do...while` bodies —
    /// unlike a method body, a block statement's locals die at its `}`.
    fn parse_scoped_block(&mut self) -> Result<StatementBlock, CompileError> {
        self.expect("{")?;
        let parent = self.current_scope;
        let child = self.scopes.push_child(parent, None);
        let saved = self.current_scope;
        self.current_scope = child;
        let statements = self.parse_statement_list()?;
        self.current_scope = saved;
        self.expect("}")?;
        Ok(StatementBlock { scope: child, statements })
    }

    fn parse_statement(&mut self) -> Result<Option<Statement>, CompileError> {
        let lexeme = self.peek().lexeme.clone();
        match lexeme.as_str() {
            "return" => self.parse_return_statement().map(Some),
            "throw" => self.parse_throw_statement().map(Some),
            "emit" => self.parse_emit_statement().map(Some),
            "asm" => self.parse_asm_statement().map(Some),
            "local" => self.parse_local_statement(),
            "if" => self.parse_if_statement().map(Some),
            "while" => self.parse_while_statement().map(Some),
            "do" => self.parse_do_while_statement().map(Some),
            _ if self.check_kind(tomb_lexer::TokenKind::Identifier) => self.parse_ident_led_statement().map(Some),
            _ => Err(self.syntax_error(format!("unexpected token `{}` at start of statement", lexeme))),
        }
    }

    fn parse_return_statement(&mut self) -> Result<Statement, CompileError> {
        let line = self.peek().line;
        self.expect("return")?;
        let expr = if self.check(";") { None } else { Some(self.parse_expression()?) };
        self.expect(";")?;
        match (self.current_return_type.clone(), &expr) {
            (None, None) => {}
            (None, Some(e)) => {
                return Err(self.type_error_at(
                    format!("this method has no return type but `return` has a value of type `{}`", e.result_type()),
                    line,
                    1,
                ))
            }
            (Some(rt), None) => {
                return Err(self.type_error_at(
                    format!("this method declares return type `{}` but `return` has no value", rt),
                    line,
                    1,
                ))
            }
            (Some(rt), Some(e)) => {
                if e.result_type() != &rt {
                    return Err(self.type_error_at(
                        format!("expected return type `{}`, found `{}`", rt, e.result_type()),
                        line,
                        1,
                    ));
                }
            }
        }
        Ok(Statement::Return { expr, line })
    }

    fn parse_throw_statement(&mut self) -> Result<Statement, CompileError> {
        let line = self.peek().line;
        self.expect("throw")?;
        if !self.check_kind(tomb_lexer::TokenKind::String) {
            return Err(self.syntax_error("expected a string literal after `throw`".to_string()));
        }
        let tok = self.advance();
        self.expect(";")?;
        Ok(Statement::Throw { message: tok.lexeme, line })
    }

    fn parse_emit_statement(&mut self) -> Result<Statement, CompileError> {
        let line = self.peek().line;
        self.expect("emit")?;
        if !self.in_contract {
            return Err(self.shape_error_coded(
                codes::EMIT_OUTSIDE_CONTRACT,
                "`emit` is only valid inside a contract".to_string(),
                line,
            ));
        }
        let name_tok = self.expect_identifier()?;
        let event = self
            .current_events
            .iter()
            .find(|e| e.name == name_tok.lexeme)
            .cloned()
            .ok_or_else(|| {
                self.resolution_error_at(
                    format!("undefined event `{}`", name_tok.lexeme),
                    name_tok.line,
                    name_tok.column,
                )
            })?;
        self.expect("(")?;
        let address_expr = self.parse_expression()?;
        if address_expr.result_type().kind() != VarKind::Address {
            return Err(self.type_error_at("the first argument to `emit` must be `address`".to_string(), line, 1));
        }
        self.expect(",")?;
        let value_expr = self.parse_expression()?;
        if value_expr.result_type() != &event.payload_type {
            return Err(self.type_error_at(
                format!(
                    "event `{}` expects a payload of type `{}`, found `{}`",
                    event.name,
                    event.payload_type,
                    value_expr.result_type()
                ),
                line,
                1,
            ));
        }
        self.expect(")")?;
        self.expect(";")?;
        Ok(Statement::Emit {
            event_name: event.name,
            address: address_expr,
            value: value_expr,
            line,
        })
    }

    fn parse_asm_statement(&mut self) -> Result<Statement, CompileError> {
        let line = self.peek().line;
        self.expect("asm")?;
        self.expect("{")?;
        if !self.check_kind(tomb_lexer::TokenKind::Asm) {
            return Err(self.syntax_error("expected an asm body".to_string()));
        }
        let body_tok = self.advance();
        self.expect("}")?;
        let lines = body_tok.lexeme.lines().map(|l| l.trim().to_string()).collect();
        Ok(Statement::AsmBlock { lines, line })
    }

    /// `local x: type (':=' expr)? ';'`. A bare declaration (no initializer)
    /// registers the variable into scope but produces no AST node — there is
    /// no dedicated "declare" statement variant; a later use lowers to a
    /// register allocated on first reference. An initializer produces the
    /// same `Assign` node a plain assignment to an existing variable would.
    fn parse_local_statement(&mut self) -> Result<Option<Statement>, CompileError> {
        self.expect("local")?;
        let name = self.expect_identifier()?;
        self.expect(":")?;
        let line = self.peek().line;
        let parsed = self.parse_type_ref()?;
        let decl = self.build_var_decl(name.lexeme.clone(), parsed, Storage::Local);
        self.scopes.declare_variable(self.current_scope, decl.clone());

        let stmt = if self.match_lexeme(":=") {
            let rhs = self.parse_expression()?;
            let expr = self.check_assignable(&decl.var_type, rhs, line)?;
            Some(Statement::Assign { var_name: decl.name, expr, line })
        } else {
            None
        };
        self.expect(";")?;
        Ok(stmt)
    }

    fn parse_if_statement(&mut self) -> Result<Statement, CompileError> {
        let line = self.peek().line;
        self.expect("if")?;
        self.expect("(")?;
        let cond = self.parse_expression()?;
        self.expect(")")?;
        if cond.result_type().kind() != VarKind::Bool {
            return Err(self.type_error_at("the condition of `if` must have type `bool`".to_string(), line, 1));
        }
        let body = self.parse_scoped_block()?;
        let else_body = if self.match_lexeme("else") { Some(self.parse_scoped_block()?) } else { None };
        Ok(Statement::If { cond, body, else_body, line })
    }

    fn parse_while_statement(&mut self) -> Result<Statement, CompileError> {
        let line = self.peek().line;
        self.expect("while")?;
        self.expect("(")?;
        let cond = self.parse_expression()?;
        self.expect(")")?;
        if cond.result_type().kind() != VarKind::Bool {
            return Err(self.type_error_at("the condition of `while` must have type `bool`".to_string(), line, 1));
        }
        let body = self.parse_scoped_block()?;
        Ok(Statement::While { cond, body, line })
    }

    fn parse_do_while_statement(&mut self) -> Result<Statement, CompileError> {
        let line = self.peek().line;
        self.expect("do")?;
        let body = self.parse_scoped_block()?;
        self.expect("while")?;
        self.expect("(")?;
        let cond = self.parse_expression()?;
        self.expect(")")?;
        if cond.result_type().kind() != VarKind::Bool {
            return Err(self.type_error_at("the condition of `do...while` must have type `bool`".to_string(), line, 1));
        }
        self.expect(";")?;
        Ok(Statement::DoWhile { body, cond, line })
    }

    /// Disambiguates `Ident assignOp expr ';'` from `Ident '.' methodCall ';'`
    /// with the grammar's one-token lookahead after the leading identifier.
    fn parse_ident_led_statement(&mut self) -> Result<Statement, CompileError> {
        let name_tok = self.advance();
        if self.check(".") {
            let expr = self.parse_method_call_on(&name_tok.lexeme, name_tok.line, name_tok.column)?;
            self.expect(";")?;
            return Ok(Statement::MethodCall { expr, line: name_tok.line });
        }
        if ASSIGN_OPS.contains(&self.peek().lexeme.as_str()) {
            return self.parse_assignment_statement(name_tok);
        }
        Err(self.syntax_error(format!(
            "expected `.` or an assignment operator after `{}`",
            name_tok.lexeme
        )))
    }

    fn parse_assignment_statement(&mut self, name_tok: tomb_lexer::Token) -> Result<Statement, CompileError> {
        let var_decl = self
            .scopes
            .find_variable(self.current_scope, &name_tok.lexeme)
            .cloned()
            .ok_or_else(|| {
                self.resolution_error_at(
                    format!("undefined variable `{}`", name_tok.lexeme),
                    name_tok.line,
                    name_tok.column,
                )
            })?;
        let op_tok = self.advance();
        let rhs = self.parse_expression()?;
        let line = name_tok.line;
        let expr = if op_tok.lexeme == ":=" {
            self.check_assignable(&var_decl.var_type, rhs, line)?
        } else {
            let op = compound_op_to_binary(&op_tok.lexeme)
                .ok_or_else(|| self.syntax_error(format!("unknown assignment operator `{}`", op_tok.lexeme)))?;
            let current_value = tomb_ast::Expression::Var {
                name: name_tok.lexeme.clone(),
                result_type: var_decl.var_type.clone(),
                line,
            };
            self.make_binary_checked(op, current_value, rhs, line)?
        };
        self.expect(";")?;
        Ok(Statement::Assign { var_name: name_tok.lexeme, expr, line })
    }

    /// Shared by plain assignment and `local ... := ...`: the right-hand
    /// side's type must equal the target's, with the same implicit
    /// `String`-coercion exception binary expressions get.
    pub(crate) fn check_assignable(
        &self,
        target: &tomb_ast::VarType,
        rhs: tomb_ast::Expression,
        line: usize,
    ) -> Result<tomb_ast::Expression, CompileError> {
        if rhs.result_type() == target {
            return Ok(rhs);
        }
        if target.kind() == VarKind::String {
            return Ok(tomb_ast::Expression::Cast { to: target.clone(), inner: Box::new(rhs), line });
        }
        Err(self.type_error_at(
            format!("expected `{}`, found `{}`", target, rhs.result_type()),
            line,
            1,
        ))
    }
}

fn compound_op_to_binary(op: &str) -> Option<tomb_ast::BinaryOp> {
    use tomb_ast::BinaryOp::*;
    Some(match op {
        "+=" => Add,
        "-=" => Sub,
        "*=" => Mul,
        "/=" => Div,
        "%=" => Mod,
        "&=" => And,
        "|=" => Or,
        "^=" => Xor,
        "<<=" => Shl,
        ">>=" => Shr,
        _ => return None,
    })
}
