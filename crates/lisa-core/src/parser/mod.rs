//! Parser for the Lisa language
//!
//! Recursive descent for declarations plus Pratt-style precedence climbing
//! for binary expressions. Tokens are pulled from the lexer on demand; any
//! diagnostic abandons the current top-level construct, and the driver makes
//! progress by advancing one token. There is no resynchronization inside an
//! expression.

mod error;

pub use error::{ParseError, ParseErrorKind};

use crate::ast::{Expr, Function, Prototype};
use crate::lexer::{binop_precedence, Lexer, Token, TokenKind};

/// Result type for parsing operations
pub type ParseResult<T> = Result<T, ParseError>;

/// Loop bounds bind one step tighter than `~` so the range separator stays
/// visible between them
const BOUND_PRECEDENCE: i32 = 16;

/// The Lisa parser; borrows the lexer so the driver keeps the cursor between
/// top-level constructs
pub struct Parser<'a, 'src> {
    lexer: &'a mut Lexer<'src>,
}

impl<'a, 'src> Parser<'a, 'src> {
    /// Create a parser over an existing lexer cursor
    pub fn new(lexer: &'a mut Lexer<'src>) -> Self {
        Self { lexer }
    }

    // ==================== Token management ====================

    /// Consume the next token; an error token aborts the current construct
    fn advance(&mut self) -> ParseResult<Token> {
        let token = self.lexer.next_token();
        if token.kind == TokenKind::Error {
            return Err(ParseError::new(ParseErrorKind::BadToken, &token));
        }
        Ok(token)
    }

    /// Peek the next token; an error token aborts like `advance`
    fn peek(&mut self) -> ParseResult<&Token> {
        let token = self.lexer.peek_token();
        if token.kind == TokenKind::Error {
            return Err(ParseError::new(ParseErrorKind::BadToken, token));
        }
        Ok(token)
    }

    /// Check whether the next token is the given symbol
    fn peek_is_symbol(&mut self, symbol: &str) -> ParseResult<bool> {
        let token = self.peek()?;
        Ok(token.kind == TokenKind::Symbol && token.lexeme == symbol)
    }

    /// Consume a required symbol, or fail with `kind`
    fn expect_symbol(&mut self, symbol: &str, kind: ParseErrorKind) -> ParseResult<Token> {
        let token = self.advance()?;
        if token.kind == TokenKind::Symbol && token.lexeme == symbol {
            Ok(token)
        } else {
            Err(ParseError::new(kind, &token))
        }
    }

    /// Upcoming binary operator and its precedence, if any. The operator is
    /// the first character of the symbol lexeme, so `<=` ranks as `<`.
    fn peek_binop(&mut self) -> ParseResult<Option<(char, i32)>> {
        let token = self.peek()?;
        if token.kind != TokenKind::Symbol {
            return Ok(None);
        }
        let op = token.lexeme.chars().next();
        Ok(op.and_then(|c| binop_precedence(c).map(|prec| (c, prec))))
    }

    // ==================== Expressions ====================

    /// expression := primary binop_rhs
    pub fn expression(&mut self) -> ParseResult<Expr> {
        let lhs = self.primary()?;
        self.binop_rhs(0, lhs)
    }

    /// Precedence climbing: consume operators of at least `expr_prec`,
    /// recursing when the following operator binds strictly tighter
    fn binop_rhs(&mut self, expr_prec: i32, mut lhs: Expr) -> ParseResult<Expr> {
        loop {
            let Some((op, tok_prec)) = self.peek_binop()? else {
                return Ok(lhs);
            };
            if tok_prec < expr_prec {
                return Ok(lhs);
            }
            self.advance()?;
            let mut rhs = self.primary()?;
            if let Some((_, next_prec)) = self.peek_binop()? {
                if tok_prec < next_prec {
                    rhs = self.binop_rhs(tok_prec + 1, rhs)?;
                }
            }
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
    }

    /// primary := NUM | '(' expr ')' | id_expr | if_expr | for_expr
    ///          | while_expr | return_expr
    fn primary(&mut self) -> ParseResult<Expr> {
        let token = self.peek()?;
        let kind = token.kind;
        let open_paren = kind == TokenKind::Symbol && token.lexeme == "(";
        match kind {
            TokenKind::Number => self.number_expr(),
            TokenKind::Ident => self.identifier_expr(),
            TokenKind::If => self.if_expr(),
            TokenKind::For => self.for_expr(),
            TokenKind::While => self.while_expr(),
            TokenKind::Return => self.return_expr(),
            TokenKind::Symbol if open_paren => self.paren_expr(),
            _ => {
                let token = self.advance()?;
                Err(ParseError::new(ParseErrorKind::ExpectedExpression, &token))
            }
        }
    }

    fn number_expr(&mut self) -> ParseResult<Expr> {
        let token = self.advance()?;
        match token.lexeme.parse::<f64>() {
            Ok(value) => Ok(Expr::Number(value)),
            Err(_) => Err(ParseError::new(ParseErrorKind::InvalidNumber, &token)),
        }
    }

    fn paren_expr(&mut self) -> ParseResult<Expr> {
        self.expect_symbol("(", ParseErrorKind::ExpectedSymbol("("))?;
        let expr = self.expression()?;
        self.expect_symbol(")", ParseErrorKind::ExpectedSymbol(")"))?;
        Ok(expr)
    }

    /// id_expr := ID | ID '(' [ expr { ',' expr } ] ')'
    fn identifier_expr(&mut self) -> ParseResult<Expr> {
        let token = self.advance()?;
        let name = token.lexeme;
        if !self.peek_is_symbol("(")? {
            return Ok(Expr::Variable(name));
        }
        self.advance()?; // '('
        let mut args = Vec::new();
        if self.peek_is_symbol(")")? {
            self.advance()?;
        } else {
            loop {
                args.push(self.expression()?);
                let sep = self.advance()?;
                if sep.kind == TokenKind::Symbol && sep.lexeme == ")" {
                    break;
                }
                if !(sep.kind == TokenKind::Symbol && sep.lexeme == ",") {
                    return Err(ParseError::new(ParseErrorKind::ExpectedArgSeparator, &sep));
                }
            }
        }
        Ok(Expr::Call { callee: name, args })
    }

    /// Brace-delimited body: '{' expr+ '}'
    fn body(&mut self, context: &'static str) -> ParseResult<Vec<Expr>> {
        self.expect_symbol(
            "{",
            ParseErrorKind::ExpectedIn {
                expected: "{",
                context,
            },
        )?;
        let mut exprs = Vec::new();
        loop {
            if self.peek_is_symbol("}")? {
                break;
            }
            if self.peek()?.kind == TokenKind::Eof {
                let token = self.advance()?;
                return Err(ParseError::new(
                    ParseErrorKind::ExpectedIn {
                        expected: "}",
                        context,
                    },
                    &token,
                ));
            }
            exprs.push(self.expression()?);
        }
        let close = self.advance()?; // '}'
        if exprs.is_empty() {
            return Err(ParseError::new(ParseErrorKind::ExpectedBody(context), &close));
        }
        Ok(exprs)
    }

    /// if_expr := 'if' expr '{' expr+ '}' [ 'else' '{' expr+ '}' ]
    fn if_expr(&mut self) -> ParseResult<Expr> {
        self.advance()?; // 'if'
        let cond = self.expression()?;
        let then_body = self.body("if expression")?;
        let else_body = if self.peek()?.kind == TokenKind::Else {
            self.advance()?;
            self.body("else expression")?
        } else {
            Vec::new()
        };
        Ok(Expr::If {
            cond: Box::new(cond),
            then_body,
            else_body,
        })
    }

    /// A loop bound: an expression parsed above the precedence of `~`
    fn bound_expr(&mut self) -> ParseResult<Expr> {
        let lhs = self.primary()?;
        self.binop_rhs(BOUND_PRECEDENCE, lhs)
    }

    /// for_expr := 'for' ID 'in' bound '~' bound [ '~' bound ] '{' expr+ '}'
    fn for_expr(&mut self) -> ParseResult<Expr> {
        self.advance()?; // 'for'
        let var_token = self.advance()?;
        if var_token.kind != TokenKind::Ident {
            return Err(ParseError::new(
                ParseErrorKind::ExpectedLoopVariable,
                &var_token,
            ));
        }
        let in_token = self.advance()?;
        if in_token.kind != TokenKind::In {
            return Err(ParseError::new(
                ParseErrorKind::ExpectedIn {
                    expected: "in",
                    context: "for expression",
                },
                &in_token,
            ));
        }
        let start = self.bound_expr()?;
        self.expect_symbol(
            "~",
            ParseErrorKind::ExpectedIn {
                expected: "~",
                context: "for expression",
            },
        )?;
        let end = self.bound_expr()?;
        let step = if self.peek_is_symbol("~")? {
            self.advance()?;
            Some(Box::new(self.bound_expr()?))
        } else {
            None
        };
        let body = self.body("for expression")?;
        Ok(Expr::For {
            var: var_token.lexeme,
            start: Box::new(start),
            end: Box::new(end),
            step,
            body,
        })
    }

    /// while_expr := 'while' expr '{' expr+ '}'
    fn while_expr(&mut self) -> ParseResult<Expr> {
        self.advance()?; // 'while'
        let cond = self.expression()?;
        let body = self.body("while expression")?;
        Ok(Expr::While {
            cond: Box::new(cond),
            body,
        })
    }

    /// return_expr := 'return' expr
    fn return_expr(&mut self) -> ParseResult<Expr> {
        self.advance()?; // 'return'
        let value = self.expression()?;
        Ok(Expr::Return(Box::new(value)))
    }

    // ==================== Declarations ====================

    /// prototype := ID '(' [ ID { ',' ID } ] ')'
    fn prototype(&mut self) -> ParseResult<Prototype> {
        let name_token = self.advance()?;
        if name_token.kind != TokenKind::Ident {
            return Err(ParseError::new(
                ParseErrorKind::ExpectedFunctionName,
                &name_token,
            ));
        }
        self.expect_symbol(
            "(",
            ParseErrorKind::ExpectedIn {
                expected: "(",
                context: "prototype",
            },
        )?;
        let mut params = Vec::new();
        let mut token = self.advance()?;
        if !(token.kind == TokenKind::Symbol && token.lexeme == ")") {
            loop {
                if token.kind != TokenKind::Ident {
                    return Err(ParseError::new(ParseErrorKind::ExpectedParamName, &token));
                }
                params.push(token.lexeme);
                token = self.advance()?;
                if token.kind == TokenKind::Symbol && token.lexeme == ")" {
                    break;
                }
                if !(token.kind == TokenKind::Symbol && token.lexeme == ",") {
                    return Err(ParseError::new(
                        ParseErrorKind::ExpectedParamSeparator,
                        &token,
                    ));
                }
                token = self.advance()?;
            }
        }
        Ok(Prototype::new(name_token.lexeme, params))
    }

    /// definition := 'fn' prototype '{' expr+ '}'
    pub fn definition(&mut self) -> ParseResult<Function> {
        let fn_token = self.advance()?;
        if fn_token.kind != TokenKind::Fn {
            return Err(ParseError::new(
                ParseErrorKind::ExpectedIn {
                    expected: "fn",
                    context: "definition",
                },
                &fn_token,
            ));
        }
        let proto = self.prototype()?;
        let body = self.body("definition")?;
        Ok(Function::new(proto, body))
    }

    /// external := 'extern' prototype
    pub fn extern_prototype(&mut self) -> ParseResult<Prototype> {
        let kw_token = self.advance()?;
        if kw_token.kind != TokenKind::Extern {
            return Err(ParseError::new(
                ParseErrorKind::ExpectedIn {
                    expected: "extern",
                    context: "extern",
                },
                &kw_token,
            ));
        }
        self.prototype()
    }

    /// A top-level naked expression, wrapped in an anonymous function
    pub fn top_level_expr(&mut self) -> ParseResult<Function> {
        let expr = self.expression()?;
        Ok(Function::new(Prototype::anonymous(), vec![expr]))
    }
}
