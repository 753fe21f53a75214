// Expression parsing: right-recursive, no precedence table, parentheses as
// the only grouping construct — the grammar is carried through literally
// rather than rewritten into a conventional precedence climb.

use tomb_ast::{
    BinaryOp, CollectionDecl, Expression, LiteralValue, MethodCallTarget, VarKind,
};
use tomb_diagnostics::CompileError;
use tomb_lexer::TokenKind;

use super::{decode_hex, Parser};

fn is_binary_operator_lexeme(s: &str) -> bool {
    matches!(
        s,
        "==" | "!=" | "<=" | ">=" | "<<" | ">>" | "<" | ">" | "+" | "-" | "*" | "/" | "%" | "&" | "|" | "^"
    )
}

fn map_binary_op(s: &str) -> Option<BinaryOp> {
    Some(match s {
        "==" => BinaryOp::Equal,
        "<=" => BinaryOp::LtEq,
        ">=" => BinaryOp::GtEq,
        "<<" => BinaryOp::Shl,
        ">>" => BinaryOp::Shr,
        "<" => BinaryOp::Lt,
        ">" => BinaryOp::Gt,
        "+" => BinaryOp::Add,
        "-" => BinaryOp::Sub,
        "*" => BinaryOp::Mul,
        "/" => BinaryOp::Div,
        "%" => BinaryOp::Mod,
        "&" => BinaryOp::And,
        "|" => BinaryOp::Or,
        "^" => BinaryOp::Xor,
        _ => return None,
    })
}

impl<'a> Parser<'a> {
    pub(crate) fn parse_expression(&mut self) -> Result<Expression, CompileError> {
        let left = self.parse_atom_or_call()?;
        let lexeme = self.peek().lexeme.clone();
        if is_binary_operator_lexeme(&lexeme) {
            let op_tok = self.advance();
            let right = self.parse_expression()?;
            self.combine_binary(&op_tok.lexeme, left, right, op_tok.line)
        } else {
            Ok(left)
        }
    }

    fn combine_binary(&mut self, op_str: &str, left: Expression, right: Expression, line: usize) -> Result<Expression, CompileError> {
        if op_str == "!=" {
            let equal = self.make_binary_checked(BinaryOp::Equal, left, right, line)?;
            let bool_t = self.registry.primitive(VarKind::Bool);
            return Ok(Expression::Negation { inner: Box::new(equal), result_type: bool_t, line });
        }
        let op = map_binary_op(op_str)
            .ok_or_else(|| self.syntax_error(format!("unknown operator `{}`", op_str)))?;
        self.make_binary_checked(op, left, right, line)
    }

    /// Shared by binary expressions and assignment/`local` initializers: the
    /// two operand types must match exactly, with one exception — a `String`
    /// left-hand side paired with `+` implicitly casts the right-hand side
    /// for string concatenation.
    pub(crate) fn make_binary_checked(
        &mut self,
        op: BinaryOp,
        left: Expression,
        right: Expression,
        line: usize,
    ) -> Result<Expression, CompileError> {
        let lt = left.result_type().clone();
        let rt = right.result_type().clone();
        let right = if lt != rt {
            if lt.kind() == VarKind::String && op == BinaryOp::Add {
                Expression::Cast { to: lt.clone(), inner: Box::new(right), line }
            } else {
                return Err(self.type_error_at(
                    format!("mismatched operand types: `{}` and `{}`", lt, rt),
                    line,
                    1,
                ));
            }
        } else {
            right
        };
        let result_type = match op {
            BinaryOp::Lt | BinaryOp::Gt | BinaryOp::LtEq | BinaryOp::GtEq | BinaryOp::Equal => {
                self.registry.primitive(VarKind::Bool)
            }
            _ => lt.clone(),
        };
        Ok(Expression::Binary { op, left: Box::new(left), right: Box::new(right), result_type, line })
    }

    fn parse_atom_or_call(&mut self) -> Result<Expression, CompileError> {
        let tok = self.peek().clone();
        match tok.kind {
            TokenKind::Number => {
                self.advance();
                let value: i64 = tok
                    .lexeme
                    .parse()
                    .map_err(|_| self.syntax_error(format!("invalid number literal `{}`", tok.lexeme)))?;
                Ok(Expression::Literal {
                    value: LiteralValue::Number(value),
                    result_type: self.registry.primitive(VarKind::Number),
                    line: tok.line,
                })
            }
            TokenKind::String => {
                self.advance();
                Ok(Expression::Literal {
                    value: LiteralValue::String(tok.lexeme),
                    result_type: self.registry.primitive(VarKind::String),
                    line: tok.line,
                })
            }
            TokenKind::Bool => {
                self.advance();
                Ok(Expression::Literal {
                    value: LiteralValue::Bool(tok.lexeme.eq_ignore_ascii_case("true")),
                    result_type: self.registry.primitive(VarKind::Bool),
                    line: tok.line,
                })
            }
            TokenKind::Address => {
                self.advance();
                Ok(Expression::Literal {
                    value: LiteralValue::Address(tok.lexeme),
                    result_type: self.registry.primitive(VarKind::Address),
                    line: tok.line,
                })
            }
            TokenKind::Hash => {
                self.advance();
                Ok(Expression::Literal {
                    value: LiteralValue::Hash(tok.lexeme),
                    result_type: self.registry.primitive(VarKind::Hash),
                    line: tok.line,
                })
            }
            TokenKind::Bytes => {
                self.advance();
                let bytes = decode_hex(&tok.lexeme).map_err(|e| self.syntax_error(e))?;
                Ok(Expression::Literal {
                    value: LiteralValue::Bytes(bytes),
                    result_type: self.registry.primitive(VarKind::Bytes),
                    line: tok.line,
                })
            }
            TokenKind::Macro => {
                self.advance();
                self.unfold_macro(&tok.lexeme, tok.line)
            }
            TokenKind::Identifier => {
                self.advance();
                if self.check(".") {
                    self.parse_method_call_on(&tok.lexeme, tok.line, tok.column)
                } else {
                    self.resolve_identifier(&tok.lexeme, tok.line, tok.column)
                }
            }
            _ if tok.lexeme == "(" => {
                self.advance();
                let inner = self.parse_expression()?;
                self.expect(")")?;
                Ok(inner)
            }
            _ => Err(self.syntax_error(format!("expected an expression, found `{}`", tok.lexeme))),
        }
    }

    fn unfold_macro(&self, name: &str, line: usize) -> Result<Expression, CompileError> {
        let result_type = match name.to_ascii_uppercase().as_str() {
            "THIS_ADDRESS" | "SENDER" => self.registry.primitive(VarKind::Address),
            "NOW" | "BLOCK_TIME" => self.registry.primitive(VarKind::Number),
            _ => return Err(self.resolution_error_at(format!("unknown macro `${}`", name), line, 1)),
        };
        Ok(Expression::Macro { name: name.to_string(), result_type, line })
    }

    /// Resolution order: constant, then variable, then library. A bare
    /// library identifier at expression position is a `ShapeError` rather
    /// than a silently-absent value.
    fn resolve_identifier(&self, name: &str, line: usize, column: usize) -> Result<Expression, CompileError> {
        if let Some(decl) = self.scopes.find_constant(self.current_scope, name) {
            return Ok(Expression::Const { name: name.to_string(), result_type: decl.var_type.clone(), line });
        }
        if let Some(decl) = self.scopes.find_variable(self.current_scope, name) {
            return Ok(Expression::Var { name: name.to_string(), result_type: decl.var_type.clone(), line });
        }
        if self.scopes.find_library(self.current_scope, name).is_some() || self.registry.library(name).is_some() {
            return Err(self.shape_error(format!("library `{}` cannot be used as a value", name), line));
        }

        let candidates = self.identifier_candidates();
        let suggestions = tomb_diagnostics::fuzzy::find_similar_names(name, &candidates, 0.7, 3);
        let mut message = format!("cannot find `{}` in this scope", name);
        if !suggestions.is_empty() {
            message.push_str(&format!(" (did you mean `{}`?)", suggestions.join("`, `")));
        }
        Err(self.resolution_error_at(message, line, column))
    }

    fn identifier_candidates(&self) -> Vec<String> {
        let mut out = Vec::new();
        let mut cursor = Some(self.current_scope);
        while let Some(id) = cursor {
            let scope = self.scopes.get(id);
            out.extend(scope.parameters.iter().map(|p| p.name.clone()));
            out.extend(scope.variable_names().map(|s| s.to_string()));
            out.extend(scope.constant_names().map(|s| s.to_string()));
            cursor = scope.parent;
        }
        out
    }

    /// `base.method(args...)` — called both from statement position (where
    /// the leading identifier has already been consumed by the caller) and
    /// from inside a larger expression. Consumes the `.` itself.
    pub(crate) fn parse_method_call_on(&mut self, base_name: &str, line: usize, _column: usize) -> Result<Expression, CompileError> {
        self.expect(".")?;
        let method_tok = self.expect_identifier()?;
        self.expect("(")?;
        let args = self.parse_arg_list()?;
        self.expect(")")?;

        if let Some(var_decl) = self.scopes.find_variable(self.current_scope, base_name).cloned() {
            let collection = var_decl.collection.as_ref().ok_or_else(|| {
                self.shape_error(
                    format!("`{}` is not a generic collection; `.` is only valid on one", base_name),
                    line,
                )
            })?;
            let (intrinsic_name, key_type, value_type) = match collection {
                CollectionDecl::Map(m) => ("Map", Some(m.key_type.clone()), m.value_type.clone()),
                CollectionDecl::List(l) => ("List", None, l.value_type.clone()),
                CollectionDecl::Set(s) => ("Set", None, s.value_type.clone()),
            };
            let intrinsic = self
                .registry
                .library(intrinsic_name)
                .expect("intrinsic collection libraries are always seeded");
            let patched = tomb_ast::patch_library(&intrinsic, key_type.as_ref(), &value_type);
            let method = patched.method(&method_tok.lexeme).cloned().ok_or_else(|| {
                self.resolution_error_at(
                    format!("no method `{}` on `{}`", method_tok.lexeme, intrinsic_name),
                    method_tok.line,
                    method_tok.column,
                )
            })?;

            // Implicit first argument: the collection variable's own name
            // becomes a leading string-literal argument.
            let name_literal = Expression::Literal {
                value: LiteralValue::String(base_name.to_string()),
                result_type: self.registry.primitive(VarKind::String),
                line,
            };
            let mut full_args = Vec::with_capacity(args.len() + 1);
            full_args.push(name_literal);
            full_args.extend(args);

            self.check_call_arity_and_types(intrinsic_name, &method, &full_args, method_tok.line)?;
            let result_type = method.return_type.clone().unwrap_or_else(|| self.registry.primitive(VarKind::None));
            return Ok(Expression::Method {
                target: MethodCallTarget { library: intrinsic_name.to_string(), method: method_tok.lexeme },
                args: full_args,
                result_type,
                line,
            });
        }

        if let Some(lib) = self
            .scopes
            .find_library(self.current_scope, base_name)
            .cloned()
            .or_else(|| self.registry.library(base_name))
        {
            let method = lib.method(&method_tok.lexeme).cloned().ok_or_else(|| {
                self.resolution_error_at(
                    format!("no method `{}` on library `{}`", method_tok.lexeme, lib.name),
                    method_tok.line,
                    method_tok.column,
                )
            })?;
            self.check_call_arity_and_types(&lib.name, &method, &args, method_tok.line)?;
            let result_type = method.return_type.clone().unwrap_or_else(|| self.registry.primitive(VarKind::None));
            return Ok(Expression::Method {
                target: MethodCallTarget { library: lib.name.clone(), method: method_tok.lexeme },
                args,
                result_type,
                line,
            });
        }

        Err(self.shape_error(
            format!("`{}` is not a generic collection or an imported library", base_name),
            line,
        ))
    }

    fn parse_arg_list(&mut self) -> Result<Vec<Expression>, CompileError> {
        let mut args = Vec::new();
        if !self.check(")") {
            loop {
                args.push(self.parse_expression()?);
                if !self.match_lexeme(",") {
                    break;
                }
            }
        }
        Ok(args)
    }

    /// `Call` has variable arity; every other library enforces its declared
    /// parameter count exactly, except that an `Any`-typed parameter
    /// accepts any argument type.
    fn check_call_arity_and_types(
        &self,
        library_name: &str,
        method: &tomb_ast::MethodInterface,
        args: &[Expression],
        line: usize,
    ) -> Result<(), CompileError> {
        if library_name == "Call" {
            return Ok(());
        }
        if args.len() != method.parameters.len() {
            return Err(self.type_error_at(
                format!(
                    "`{}.{}` takes {} argument(s), found {}",
                    library_name,
                    method.name,
                    method.parameters.len(),
                    args.len()
                ),
                line,
                1,
            ));
        }
        for (arg, param) in args.iter().zip(method.parameters.iter()) {
            if param.var_type.kind() == VarKind::Any {
                continue;
            }
            if arg.result_type() != &param.var_type {
                return Err(self.type_error_at(
                    format!(
                        "argument `{}` expects `{}`, found `{}`",
                        param.name,
                        param.var_type,
                        arg.result_type()
                    ),
                    line,
                    1,
                ));
            }
        }
        Ok(())
    }
}
