//! Parser for the textual vISA kernel format.
//!
//! Line oriented: every directive and instruction ends at a newline.
//! Declarations must precede their first use.

use super::lexer::{Lexer, Token};
use super::*;
use crate::diagnostic::Diagnostic;
use crate::span::{Span, Spanned};

/// Parse a kernel from source text.
pub fn parse_kernel(source: &str) -> Result<Kernel, Vec<Diagnostic>> {
    let (tokens, lex_errors) = Lexer::new(source).tokenize();
    if !lex_errors.is_empty() {
        return Err(lex_errors);
    }
    Parser::new(tokens).parse().map_err(|d| vec![d])
}

struct Parser {
    tokens: Vec<Spanned<Token>>,
    pos: usize,
}

type PResult<T> = Result<T, Diagnostic>;

impl Parser {
    fn new(tokens: Vec<Spanned<Token>>) -> Self {
        Self { tokens, pos: 0 }
    }

    fn peek(&self) -> &Token {
        &self.tokens[self.pos].node
    }

    fn peek_at(&self, ahead: usize) -> &Token {
        let idx = (self.pos + ahead).min(self.tokens.len() - 1);
        &self.tokens[idx].node
    }

    fn span(&self) -> Span {
        self.tokens[self.pos].span
    }

    /// Span of the most recently consumed token.
    fn last_span(&self) -> Span {
        self.tokens[self.pos.saturating_sub(1)].span
    }

    fn advance(&mut self) -> Spanned<Token> {
        let tok = self.tokens[self.pos].clone();
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        tok
    }

    fn eat(&mut self, expected: &Token) -> bool {
        if self.peek() == expected {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expected(&self, what: &str) -> Diagnostic {
        Diagnostic::error(
            format!("expected {}, found {}", what, self.peek().describe()),
            self.span(),
        )
    }

    fn expect(&mut self, expected: Token) -> PResult<Span> {
        if *self.peek() == expected {
            Ok(self.advance().span)
        } else {
            Err(self.expected(&expected.describe()))
        }
    }

    fn ident(&mut self, what: &str) -> PResult<Spanned<String>> {
        match self.peek().clone() {
            Token::Ident(name) => {
                let span = self.advance().span;
                Ok(Spanned::new(name, span))
            }
            _ => Err(self.expected(what)),
        }
    }

    fn keyword(&mut self, kw: &str) -> PResult<()> {
        match self.peek() {
            Token::Ident(name) if name == kw => {
                self.advance();
                Ok(())
            }
            _ => Err(self.expected(&format!("'{}'", kw))),
        }
    }

    fn int(&mut self, what: &str) -> PResult<Spanned<u64>> {
        match *self.peek() {
            Token::Int(n) => {
                let span = self.advance().span;
                Ok(Spanned::new(n, span))
            }
            _ => Err(self.expected(what)),
        }
    }

    fn int_in<T: TryFrom<u64>>(&mut self, what: &str) -> PResult<T> {
        let n = self.int(what)?;
        T::try_from(n.node)
            .map_err(|_| Diagnostic::error(format!("{} {} is out of range", what, n.node), n.span))
    }

    fn end_of_line(&mut self) -> PResult<()> {
        match self.peek() {
            Token::Newline => {
                self.advance();
                Ok(())
            }
            Token::Eof => Ok(()),
            _ => Err(self.expected("end of line")),
        }
    }

    fn skip_newlines(&mut self) {
        while *self.peek() == Token::Newline {
            self.advance();
        }
    }

    fn elem_type(&mut self) -> PResult<ElemType> {
        let ty = self.ident("element type")?;
        ElemType::from_suffix(&ty.node).ok_or_else(|| {
            Diagnostic::error(format!("unknown element type '{}'", ty.node), ty.span).with_help(
                "expected one of b, ub, w, uw, d, ud, q, uq, hf, f, df".to_string(),
            )
        })
    }

    fn flag(&mut self) -> PResult<u8> {
        let name = self.ident("flag register")?;
        name.node
            .strip_prefix('f')
            .and_then(|n| n.parse::<u8>().ok())
            .ok_or_else(|| {
                Diagnostic::error(
                    format!("expected flag register like 'f0', found '{}'", name.node),
                    name.span,
                )
            })
    }

    // ── Top level ──

    fn parse(mut self) -> PResult<Kernel> {
        self.skip_newlines();
        self.keyword("kernel")?;
        let name = self.ident("kernel name")?;
        self.end_of_line()?;
        let mut kernel = Kernel::new(name.node);

        loop {
            self.skip_newlines();
            match self.peek().clone() {
                Token::Eof => break,
                Token::Ident(word) if word == "decl" || word == "input" => {
                    self.parse_decl(&mut kernel)?;
                }
                Token::Ident(word) if word == "block" => {
                    self.advance();
                    let name = self.ident("block name")?;
                    let mut block = BasicBlock::new(name.node);
                    if let Token::Ident(flag) = self.peek() {
                        if flag == "simd_cf" {
                            self.advance();
                            block.in_simd_flow = true;
                        }
                    }
                    self.end_of_line()?;
                    kernel.blocks.push(block);
                }
                _ => {
                    let span = self.span();
                    let inst = self.parse_inst(&kernel.decls)?;
                    match kernel.blocks.last_mut() {
                        Some(block) => block.insts.push(inst),
                        None => {
                            return Err(Diagnostic::error(
                                "instruction outside of a block".to_string(),
                                span,
                            )
                            .with_help("start a block with 'block NAME'".to_string()))
                        }
                    }
                    self.end_of_line()?;
                }
            }
        }
        Ok(kernel)
    }

    fn parse_decl(&mut self, kernel: &mut Kernel) -> PResult<()> {
        let is_input = matches!(self.peek(), Token::Ident(w) if w == "input");
        self.advance();
        let name = self.ident("declaration name")?;
        if kernel.decls.find(&name.node).is_some() {
            return Err(Diagnostic::error(
                format!("'{}' is declared twice", name.node),
                name.span,
            ));
        }
        if name.node == "r" {
            return Err(Diagnostic::error(
                "'r' is reserved for indirect operands".to_string(),
                name.span,
            ));
        }
        let ty = self.elem_type()?;
        let count: u32 = self.int_in("element count")?;
        let decl = if is_input {
            self.keyword("at")?;
            let offset: u32 = self.int_in("input offset")?;
            Declaration::input(name.node, ty, count, offset)
        } else {
            Declaration::local(name.node, ty, count)
        };
        kernel.decls.add(decl);
        self.end_of_line()
    }

    // ── Instructions ──

    fn parse_inst(&mut self, decls: &DeclTable) -> PResult<Inst> {
        let predicate = if self.eat(&Token::LParen) {
            let inverse = self.eat(&Token::Bang);
            let flag = self.flag()?;
            self.expect(Token::RParen)?;
            Some(Predicate { flag, inverse })
        } else {
            None
        };

        let mnemonic = self.ident("opcode")?;
        let opcode = Opcode::from_mnemonic(&mnemonic.node).ok_or_else(|| {
            let known: Vec<&str> = Opcode::ALL.iter().map(|op| op.mnemonic()).collect();
            Diagnostic::error(format!("unknown opcode '{}'", mnemonic.node), mnemonic.span)
                .with_help(format!("expected one of {}", known.join(", ")))
        })?;

        let mut saturate = false;
        let mut cond_mod = None;
        while self.eat(&Token::Dot) {
            let word = self.ident("instruction modifier")?;
            if word.node == "sat" {
                saturate = true;
            } else if let Some(op) = CondOp::from_mnemonic(&word.node) {
                self.expect(Token::Dot)?;
                let flag = self.flag()?;
                cond_mod = Some(CondMod { op, flag });
            } else {
                return Err(Diagnostic::error(
                    format!("unknown instruction modifier '{}'", word.node),
                    word.span,
                ));
            }
        }

        self.expect(Token::LParen)?;
        let exec = self.int("execution size")?;
        if !matches!(exec.node, 1 | 2 | 4 | 8 | 16 | 32) {
            return Err(Diagnostic::error(
                format!("invalid execution size {}", exec.node),
                exec.span,
            )
            .with_help("execution size must be a power of two up to 32".to_string()));
        }
        let mut no_mask = false;
        if self.eat(&Token::Comma) {
            self.keyword("nomask")?;
            no_mask = true;
        }
        self.expect(Token::RParen)?;

        let exec_size = exec.node as u8;
        let start = self.span();
        let dst = self.parse_operand(decls)?;
        check_in_bounds(&dst, exec_size, decls, start.to(self.last_span()))?;
        let mut srcs = ArrayVec::new();
        while !matches!(self.peek(), Token::Newline | Token::Eof) {
            let span = self.span();
            let src = self.parse_operand(decls)?;
            check_in_bounds(&src, exec_size, decls, span.to(self.last_span()))?;
            if srcs.try_push(src).is_err() {
                return Err(Diagnostic::error(
                    format!("too many source operands (max {})", MAX_SRCS),
                    span,
                ));
            }
        }
        if srcs.len() != opcode.num_srcs() {
            return Err(Diagnostic::error(
                format!(
                    "'{}' takes {} source operand(s), found {}",
                    opcode,
                    opcode.num_srcs(),
                    srcs.len()
                ),
                mnemonic.span,
            ));
        }

        Ok(Inst {
            opcode,
            exec_size,
            no_mask,
            saturate,
            predicate,
            cond_mod,
            dst,
            srcs,
        })
    }

    fn parse_operand(&mut self, decls: &DeclTable) -> PResult<Operand> {
        // Indirect: r[ADDR, off]:ty
        if matches!(self.peek(), Token::Ident(w) if w == "r")
            && *self.peek_at(1) == Token::LBracket
        {
            self.advance();
            self.advance();
            let addr = self.decl_ref(decls)?;
            self.expect(Token::Comma)?;
            let negative = self.eat(&Token::Minus);
            let off = self.int("indirect offset")?;
            let offset = i16::try_from(off.node)
                .map(|o| if negative { -o } else { o })
                .map_err(|_| {
                    Diagnostic::error(format!("indirect offset {} is out of range", off.node), off.span)
                })?;
            self.expect(Token::RBracket)?;
            self.expect(Token::Colon)?;
            let ty = self.elem_type()?;
            return Ok(Operand::Indirect { addr, offset, ty });
        }

        let mut neg = false;
        if self.eat(&Token::Minus) {
            if let Token::Int(_) = self.peek() {
                let n = self.int("immediate")?;
                self.expect(Token::Colon)?;
                let ty = self.elem_type()?;
                return Ok(Operand::Imm {
                    value: (n.node as i64).wrapping_neg(),
                    ty,
                });
            }
            neg = true;
        }
        let mut abs = false;
        if *self.peek() == Token::LParen {
            self.advance();
            self.keyword("abs")?;
            self.expect(Token::RParen)?;
            abs = true;
        }

        if let Token::Int(_) = self.peek() {
            let n = self.int("immediate")?;
            if neg || abs {
                return Err(Diagnostic::error(
                    "source modifiers do not apply to immediates".to_string(),
                    n.span,
                ));
            }
            self.expect(Token::Colon)?;
            let ty = self.elem_type()?;
            return Ok(Operand::Imm {
                value: n.node as i64,
                ty,
            });
        }

        let decl = self.decl_ref(decls)?;
        self.expect(Token::LParen)?;
        let offset: u32 = self.int_in("byte offset")?;
        self.expect(Token::RParen)?;
        self.expect(Token::Lt)?;
        let stride: u16 = self.int_in("stride")?;
        self.expect(Token::Gt)?;
        self.expect(Token::Colon)?;
        let ty = self.elem_type()?;
        let modifier = match (neg, abs) {
            (false, false) => SrcMod::None,
            (true, false) => SrcMod::Neg,
            (false, true) => SrcMod::Abs,
            (true, true) => SrcMod::NegAbs,
        };
        Ok(Operand::Region(Region {
            decl,
            offset,
            stride,
            ty,
            modifier,
        }))
    }

    fn decl_ref(&mut self, decls: &DeclTable) -> PResult<DeclId> {
        let name = self.ident("variable name")?;
        decls.find(&name.node).ok_or_else(|| {
            Diagnostic::error(format!("undeclared variable '{}'", name.node), name.span)
        })
    }
}

/// Reject a direct region whose access runs past the end of its declaration.
fn check_in_bounds(op: &Operand, exec_size: u8, decls: &DeclTable, span: Span) -> PResult<()> {
    let Operand::Region(r) = op else {
        return Ok(());
    };
    let decl = decls.get(r.decl);
    match r.offset.checked_add(r.byte_len(exec_size)) {
        Some(end) if end <= decl.byte_size() => Ok(()),
        _ => Err(Diagnostic::error(
            format!(
                "region at byte {} overruns '{}' ({} bytes)",
                r.offset,
                decl.name,
                decl.byte_size()
            ),
            span,
        )),
    }
}
