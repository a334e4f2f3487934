//! Recursive descent parser for the expression language.

use super::ast::*;
use super::lexer::{tokenize, Token, TokenKind};
use crate::data::Value;
use crate::error::{HdfScanError, Result};

/// Deepest nesting of brackets and unary operators accepted.
pub const MAX_DEPTH: usize = 100;

/// Parser that converts a token stream into an expression tree.
#[derive(Debug)]
pub struct Parser<'a> {
    source: &'a str,
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
}

impl<'a> Parser<'a> {
    /// Parser over the tokens of `source`.
    pub fn new(source: &'a str, tokens: Vec<Token>) -> Self {
        Self {
            source,
            tokens,
            pos: 0,
            depth: 0,
        }
    }

    /// Parse the whole token stream as one expression.
    ///
    /// A top-level comma list becomes a tuple, as in `a, b`.
    pub fn parse(mut self) -> Result<Expr> {
        if self.at_eof() {
            return Err(self.error("empty expression"));
        }
        let first = self.parse_expr()?;
        let expr = if self.check(&TokenKind::Comma) {
            let mut items = vec![first];
            while self.eat(&TokenKind::Comma) {
                if self.at_eof() {
                    break;
                }
                items.push(self.parse_expr()?);
            }
            Expr::Tuple(items)
        } else {
            first
        };
        if !self.at_eof() {
            return Err(self.unexpected());
        }
        Ok(expr)
    }

    // ========== Token helpers ==========

    fn peek(&self) -> &TokenKind {
        self.tokens
            .get(self.pos)
            .map(|t| &t.kind)
            .unwrap_or(&TokenKind::Eof)
    }

    fn peek_ahead(&self, offset: usize) -> &TokenKind {
        self.tokens
            .get(self.pos + offset)
            .map(|t| &t.kind)
            .unwrap_or(&TokenKind::Eof)
    }

    fn peek_pos(&self) -> usize {
        self.tokens
            .get(self.pos)
            .map(|t| t.pos)
            .unwrap_or(self.source.len())
    }

    fn advance(&mut self) -> TokenKind {
        let kind = self.peek().clone();
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        kind
    }

    fn at_eof(&self) -> bool {
        matches!(self.peek(), TokenKind::Eof)
    }

    fn check(&self, kind: &TokenKind) -> bool {
        self.peek() == kind
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: &TokenKind, what: &str) -> Result<()> {
        if self.eat(expected) {
            Ok(())
        } else {
            Err(self.error(format!("expected {}", what)))
        }
    }

    fn error(&self, message: impl Into<String>) -> HdfScanError {
        HdfScanError::syntax(self.source, self.peek_pos(), message)
    }

    fn unexpected(&self) -> HdfScanError {
        match self.peek() {
            TokenKind::Eof => self.error("unexpected end of expression"),
            TokenKind::Keyword(word) => self.error(format!("'{}' is not supported", word)),
            other => self.error(format!("unexpected token {:?}", other)),
        }
    }

    /// Count one more level of tree depth.
    ///
    /// Left-associative chains deepen the tree too, so loops call this per
    /// operator and reset `depth` when the chain ends.
    fn deepen(&mut self) -> Result<()> {
        if self.depth >= MAX_DEPTH {
            return Err(self.error("expression is nested too deeply"));
        }
        self.depth += 1;
        Ok(())
    }

    /// Run `parse` one nesting level deeper.
    fn nested<T>(&mut self, parse: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        self.deepen()?;
        let result = parse(self);
        self.depth -= 1;
        result
    }

    // ========== Expressions ==========

    fn parse_expr(&mut self) -> Result<Expr> {
        self.nested(Self::parse_conditional)
    }

    fn parse_conditional(&mut self) -> Result<Expr> {
        let expr = self.parse_logical_or()?;
        if self.eat(&TokenKind::If) {
            let condition = self.parse_logical_or()?;
            self.expect(&TokenKind::Else, "'else'")?;
            let otherwise = self.parse_expr()?;
            Ok(Expr::Conditional {
                condition: Box::new(condition),
                then: Box::new(expr),
                otherwise: Box::new(otherwise),
            })
        } else {
            Ok(expr)
        }
    }

    /// Helper: parse left-associative binary operators.
    fn parse_binary_op(
        &mut self,
        mut next_fn: impl FnMut(&mut Self) -> Result<Expr>,
        map_op: impl Fn(&TokenKind) -> Option<BinOp>,
    ) -> Result<Expr> {
        let mut lhs = next_fn(self)?;
        let outer = self.depth;
        while let Some(op) = map_op(self.peek()) {
            self.deepen()?;
            self.advance();
            let rhs = next_fn(self)?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        self.depth = outer;
        Ok(lhs)
    }

    fn parse_logical_or(&mut self) -> Result<Expr> {
        let mut lhs = self.parse_logical_and()?;
        let outer = self.depth;
        while self.eat(&TokenKind::Or) {
            self.deepen()?;
            let rhs = self.parse_logical_and()?;
            lhs = Expr::Logical {
                op: BoolOp::Or,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        self.depth = outer;
        Ok(lhs)
    }

    fn parse_logical_and(&mut self) -> Result<Expr> {
        let mut lhs = self.parse_logical_not()?;
        let outer = self.depth;
        while self.eat(&TokenKind::And) {
            self.deepen()?;
            let rhs = self.parse_logical_not()?;
            lhs = Expr::Logical {
                op: BoolOp::And,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        self.depth = outer;
        Ok(lhs)
    }

    fn parse_logical_not(&mut self) -> Result<Expr> {
        if self.eat(&TokenKind::Not) {
            let operand = self.nested(Self::parse_logical_not)?;
            return Ok(Expr::Unary {
                op: UnaryOp::Not,
                operand: Box::new(operand),
            });
        }
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> Result<Expr> {
        let first = self.parse_bitwise_or()?;
        let mut rest = Vec::new();
        loop {
            let op = match (self.peek(), self.peek_ahead(1)) {
                (TokenKind::Lt, _) => CmpOp::Lt,
                (TokenKind::Le, _) => CmpOp::Le,
                (TokenKind::Gt, _) => CmpOp::Gt,
                (TokenKind::Ge, _) => CmpOp::Ge,
                (TokenKind::EqEq, _) => CmpOp::Eq,
                (TokenKind::NotEq, _) => CmpOp::NotEq,
                (TokenKind::In, _) => CmpOp::In,
                (TokenKind::Not, TokenKind::In) => {
                    self.advance();
                    CmpOp::NotIn
                },
                _ => break,
            };
            self.advance();
            rest.push((op, self.parse_bitwise_or()?));
        }
        if rest.is_empty() {
            Ok(first)
        } else {
            Ok(Expr::Compare {
                first: Box::new(first),
                rest,
            })
        }
    }

    fn parse_bitwise_or(&mut self) -> Result<Expr> {
        self.parse_binary_op(Self::parse_bitwise_and, |tok| match tok {
            TokenKind::Pipe => Some(BinOp::BitOr),
            _ => None,
        })
    }

    fn parse_bitwise_and(&mut self) -> Result<Expr> {
        self.parse_binary_op(Self::parse_additive, |tok| match tok {
            TokenKind::Amp => Some(BinOp::BitAnd),
            _ => None,
        })
    }

    fn parse_additive(&mut self) -> Result<Expr> {
        self.parse_binary_op(Self::parse_multiplicative, |tok| match tok {
            TokenKind::Plus => Some(BinOp::Add),
            TokenKind::Minus => Some(BinOp::Sub),
            _ => None,
        })
    }

    fn parse_multiplicative(&mut self) -> Result<Expr> {
        self.parse_binary_op(Self::parse_unary, |tok| match tok {
            TokenKind::Star => Some(BinOp::Mul),
            TokenKind::Slash => Some(BinOp::Div),
            TokenKind::DoubleSlash => Some(BinOp::FloorDiv),
            TokenKind::Percent => Some(BinOp::Mod),
            _ => None,
        })
    }

    fn parse_unary(&mut self) -> Result<Expr> {
        let op = match self.peek() {
            TokenKind::Minus => UnaryOp::Neg,
            TokenKind::Plus => UnaryOp::Pos,
            TokenKind::Tilde => UnaryOp::Invert,
            _ => return self.parse_power(),
        };
        self.advance();
        let operand = self.nested(Self::parse_unary)?;
        Ok(Expr::Unary {
            op,
            operand: Box::new(operand),
        })
    }

    /// `**` binds tighter than unary minus on its left and is right-associative.
    fn parse_power(&mut self) -> Result<Expr> {
        let base = self.parse_postfix()?;
        if self.eat(&TokenKind::DoubleStar) {
            let exponent = self.nested(Self::parse_unary)?;
            return Ok(Expr::Binary {
                op: BinOp::Pow,
                lhs: Box::new(base),
                rhs: Box::new(exponent),
            });
        }
        Ok(base)
    }

    fn parse_postfix(&mut self) -> Result<Expr> {
        let mut expr = self.parse_primary()?;
        let outer = self.depth;
        loop {
            if matches!(self.peek(), TokenKind::Dot | TokenKind::LParen | TokenKind::LBracket) {
                self.deepen()?;
            }
            match self.peek() {
                TokenKind::Dot => {
                    self.advance();
                    let attr = match self.advance() {
                        TokenKind::Name(name) => name,
                        _ => return Err(self.error("expected attribute name after '.'")),
                    };
                    expr = Expr::Attribute {
                        value: Box::new(expr),
                        attr,
                    };
                },
                TokenKind::LParen => {
                    self.advance();
                    let (args, kwargs) = self.parse_call_args()?;
                    expr = Expr::Call {
                        func: Box::new(expr),
                        args,
                        kwargs,
                    };
                },
                TokenKind::LBracket => {
                    self.advance();
                    let index = self.parse_subscript()?;
                    expr = Expr::Subscript {
                        value: Box::new(expr),
                        index,
                    };
                },
                _ => {
                    self.depth = outer;
                    return Ok(expr);
                },
            }
        }
    }

    fn parse_call_args(&mut self) -> Result<(Vec<Expr>, Vec<(String, Expr)>)> {
        let mut args = Vec::new();
        let mut kwargs: Vec<(String, Expr)> = Vec::new();
        while !self.check(&TokenKind::RParen) {
            if let (TokenKind::Name(name), TokenKind::Assign) = (self.peek(), self.peek_ahead(1)) {
                let name = name.clone();
                if kwargs.iter().any(|(k, _)| *k == name) {
                    return Err(self.error(format!("keyword argument repeated: {}", name)));
                }
                self.advance();
                self.advance();
                kwargs.push((name, self.parse_expr()?));
            } else {
                if !kwargs.is_empty() {
                    return Err(self.error("positional argument follows keyword argument"));
                }
                args.push(self.parse_expr()?);
            }
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(&TokenKind::RParen, "')'")?;
        Ok((args, kwargs))
    }

    fn parse_subscript(&mut self) -> Result<Vec<Index>> {
        let mut index = Vec::new();
        loop {
            index.push(self.parse_index()?);
            if !self.eat(&TokenKind::Comma) || self.check(&TokenKind::RBracket) {
                break;
            }
        }
        self.expect(&TokenKind::RBracket, "']'")?;
        Ok(index)
    }

    fn parse_index(&mut self) -> Result<Index> {
        let start = self.parse_optional_bound()?;
        if !self.eat(&TokenKind::Colon) {
            return start
                .map(Index::Single)
                .ok_or_else(|| self.error("expected index"));
        }
        let stop = self.parse_optional_bound()?;
        let step = if self.eat(&TokenKind::Colon) {
            self.parse_optional_bound()?
        } else {
            None
        };
        Ok(Index::Slice { start, stop, step })
    }

    fn parse_optional_bound(&mut self) -> Result<Option<Expr>> {
        match self.peek() {
            TokenKind::Colon | TokenKind::Comma | TokenKind::RBracket => Ok(None),
            _ => self.parse_expr().map(Some),
        }
    }

    fn parse_primary(&mut self) -> Result<Expr> {
        match self.peek().clone() {
            TokenKind::Int(i) => {
                self.advance();
                Ok(Expr::Literal(Value::Int(i)))
            },
            TokenKind::Float(f) => {
                self.advance();
                Ok(Expr::Literal(Value::Float(f)))
            },
            TokenKind::Str(_) => {
                // adjacent string literals concatenate
                let mut text = String::new();
                while let TokenKind::Str(s) = self.peek() {
                    text.push_str(s);
                    self.advance();
                }
                Ok(Expr::Literal(Value::Str(text)))
            },
            TokenKind::True => {
                self.advance();
                Ok(Expr::Literal(Value::Bool(true)))
            },
            TokenKind::False => {
                self.advance();
                Ok(Expr::Literal(Value::Bool(false)))
            },
            TokenKind::None => {
                self.advance();
                Ok(Expr::Literal(Value::None))
            },
            TokenKind::Name(name) => {
                self.advance();
                Ok(Expr::Name(name))
            },
            TokenKind::LParen => {
                self.advance();
                if self.eat(&TokenKind::RParen) {
                    return Ok(Expr::Tuple(Vec::new()));
                }
                let first = self.parse_expr()?;
                if self.eat(&TokenKind::RParen) {
                    return Ok(first);
                }
                let mut items = vec![first];
                while self.eat(&TokenKind::Comma) {
                    if self.check(&TokenKind::RParen) {
                        break;
                    }
                    items.push(self.parse_expr()?);
                }
                self.expect(&TokenKind::RParen, "')'")?;
                Ok(Expr::Tuple(items))
            },
            TokenKind::LBracket => {
                self.advance();
                let mut items = Vec::new();
                while !self.check(&TokenKind::RBracket) {
                    items.push(self.parse_expr()?);
                    if !self.eat(&TokenKind::Comma) {
                        break;
                    }
                }
                self.expect(&TokenKind::RBracket, "']'")?;
                Ok(Expr::List(items))
            },
            _ => Err(self.unexpected()),
        }
    }
}

/// Parse an expression.
pub fn parse(source: &str) -> Result<Expr> {
    let tokens = tokenize(source)?;
    Parser::new(source, tokens).parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(n: &str) -> Box<Expr> {
        Box::new(Expr::Name(n.to_string()))
    }

    fn int(i: i64) -> Box<Expr> {
        Box::new(Expr::Literal(Value::Int(i)))
    }

    #[test]
    fn test_precedence() {
        assert_eq!(
            parse("a + b * 2").unwrap(),
            Expr::Binary {
                op: BinOp::Add,
                lhs: name("a"),
                rhs: Box::new(Expr::Binary {
                    op: BinOp::Mul,
                    lhs: name("b"),
                    rhs: int(2),
                }),
            }
        );
    }

    #[test]
    fn test_power_binds_tighter_than_negation() {
        assert_eq!(
            parse("-a**2").unwrap(),
            Expr::Unary {
                op: UnaryOp::Neg,
                operand: Box::new(Expr::Binary {
                    op: BinOp::Pow,
                    lhs: name("a"),
                    rhs: int(2),
                }),
            }
        );
    }

    #[test]
    fn test_method_call() {
        assert_eq!(
            parse("eta.max()").unwrap(),
            Expr::Call {
                func: Box::new(Expr::Attribute {
                    value: name("eta"),
                    attr: "max".to_string(),
                }),
                args: vec![],
                kwargs: vec![],
            }
        );
    }

    #[test]
    fn test_keyword_arguments() {
        let expr = parse("np.sum(data, axis=0)").unwrap();
        let Expr::Call { args, kwargs, .. } = expr else {
            panic!("expected call");
        };
        assert_eq!(args, vec![Expr::Name("data".to_string())]);
        assert_eq!(kwargs, vec![("axis".to_string(), Expr::Literal(Value::Int(0)))]);
    }

    #[test]
    fn test_slices() {
        let expr = parse("a[1:, ::2, -1]").unwrap();
        let Expr::Subscript { index, .. } = expr else {
            panic!("expected subscript");
        };
        assert_eq!(index.len(), 3);
        assert!(matches!(
            &index[0],
            Index::Slice { start: Some(_), stop: None, step: None }
        ));
        assert!(matches!(
            &index[1],
            Index::Slice { start: None, stop: None, step: Some(_) }
        ));
        assert!(matches!(&index[2], Index::Single(_)));
    }

    #[test]
    fn test_chained_comparison_and_not_in() {
        let expr = parse("0 < x <= 5 and 'a' not in s").unwrap();
        let Expr::Logical { lhs, rhs, .. } = expr else {
            panic!("expected logical");
        };
        assert!(matches!(*lhs, Expr::Compare { ref rest, .. } if rest.len() == 2));
        assert!(matches!(*rhs, Expr::Compare { ref rest, .. } if rest[0].0 == CmpOp::NotIn));
    }

    #[test]
    fn test_conditional_and_tuples() {
        assert!(matches!(parse("a if b else c").unwrap(), Expr::Conditional { .. }));
        assert_eq!(parse("(1,)").unwrap(), Expr::Tuple(vec![Expr::Literal(Value::Int(1))]));
        assert!(matches!(parse("a, b").unwrap(), Expr::Tuple(items) if items.len() == 2));
    }

    #[test]
    fn test_names_skip_attributes_and_keywords() {
        let expr = parse("np.sum(total, axis=n) / scale.max()").unwrap();
        assert_eq!(expr.names(), vec!["np", "total", "n", "scale"]);
    }

    #[test]
    fn test_errors_carry_position() {
        assert!(matches!(parse("a +"), Err(HdfScanError::Syntax { position: 3, .. })));
        assert!(matches!(parse("(a"), Err(HdfScanError::Syntax { .. })));
        assert!(matches!(parse("lambda: 1"), Err(HdfScanError::Syntax { position: 0, .. })));
        assert!(matches!(parse(""), Err(HdfScanError::Syntax { .. })));
        assert!(matches!(parse("f(a=1, 2)"), Err(HdfScanError::Syntax { .. })));
    }

    #[test]
    fn test_nesting_is_limited() {
        let nested = |open: &str, close: &str, n: usize| {
            format!("{}1{}", open.repeat(n), close.repeat(n))
        };
        assert!(parse(&nested("(", ")", 50)).is_ok());
        assert!(parse(&nested("[", "]", 50)).is_ok());
        for deep in [
            nested("(", ")", 100_000),
            nested("[", "]", 100_000),
            nested("-", "", 100_000),
            nested("not ", "", 100_000),
            nested("f(", ")", 100_000),
            format!("1{}", " + 1".repeat(100_000)),
            format!("2{}", " ** 2".repeat(100_000)),
            format!("a{}", "[0]".repeat(100_000)),
            format!("a{}", " or a".repeat(100_000)),
        ] {
            let err = parse(&deep).unwrap_err();
            assert!(err.to_string().contains("nested too deeply"), "{}", err);
        }
    }
}
