use crate::common::source::Span;
use crate::ir::block::{Binding, Variance};
use crate::ir::{InstrId, Op, Operand};

use super::parser::Parser;
use crate::frontend::lexer::TokenKind;

/// The expression evaluator's tagged result: a constant, a reference to an
/// already-emitted SSA value, or a reference to a builtin call's result,
/// plus the source names that flowed into it (consulted by the φ inserter's
/// invariant-preservation rule).
#[derive(Debug, Clone)]
pub struct EvalResult {
    pub kind: ResultKind,
    pub variables: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultKind {
    Const(i64),
    Var(InstrId),
    Func(InstrId),
}

impl EvalResult {
    pub fn constant(value: i64) -> Self {
        EvalResult { kind: ResultKind::Const(value), variables: Vec::new() }
    }

    pub fn value(id: InstrId, variables: Vec<String>) -> Self {
        EvalResult { kind: ResultKind::Var(id), variables }
    }

    pub fn func(id: InstrId) -> Self {
        EvalResult { kind: ResultKind::Func(id), variables: Vec::new() }
    }
}

impl<'a> Parser<'a> {
    /// `operand_of` materializes a CONST result into a real instruction so
    /// it can be used as another instruction's operand; VAR/FUNC are
    /// already ids.
    pub(crate) fn operand_of(&mut self, r: &EvalResult) -> Operand {
        match r.kind {
            ResultKind::Const(v) => Operand::Instr(self.cfg.add_const(v)),
            ResultKind::Var(id) | ResultKind::Func(id) => Operand::Instr(id),
        }
    }

    pub(crate) fn const_of(&self, r: &EvalResult) -> Option<i64> {
        match r.kind {
            ResultKind::Const(v) => Some(v),
            ResultKind::Var(id) | ResultKind::Func(id) => self.cfg.const_value(id),
        }
    }

    pub(crate) fn is_variant(&self, names: &[String]) -> bool {
        names
            .iter()
            .any(|n| self.cfg.current_block().variance_of(n) == Variance::Variant)
    }

    /// `Compute`: constant-folds CONST⊕CONST (and VAR⊕VAR / CONST⊕VAR pairs
    /// that both resolve to CONST instructions), otherwise emits the
    /// operation — using no-CSE emission uniformly whenever any
    /// contributing name is variant in the current block.
    pub(crate) fn compute(&mut self, op: Op, x: EvalResult, y: EvalResult) -> EvalResult {
        let mut variables = x.variables.clone();
        variables.extend(y.variables.iter().cloned());

        if let (Some(a), Some(b)) = (self.const_of(&x), self.const_of(&y)) {
            return EvalResult { kind: ResultKind::Const(fold(op, a, b)), variables };
        }

        let a_operand = self.operand_of(&x);
        let b_operand = self.operand_of(&y);
        let id = if self.is_variant(&variables) {
            self.cfg.add_instruction_no_cse(op, a_operand, b_operand)
        } else {
            self.cfg.add_instruction(op, a_operand, b_operand)
        };
        EvalResult { kind: ResultKind::Var(id), variables }
    }

    /// `E := T { ('+' | '-') T }`
    pub(crate) fn parse_expr(&mut self) -> EvalResult {
        let mut acc = self.parse_term();
        loop {
            let op = match self.current.kind {
                TokenKind::Plus => Op::Add,
                TokenKind::Minus => Op::Sub,
                _ => break,
            };
            self.bump();
            let rhs = self.parse_term();
            acc = self.compute(op, acc, rhs);
        }
        acc
    }

    /// `T := F { ('*' | '/') F }`
    fn parse_term(&mut self) -> EvalResult {
        let mut acc = self.parse_factor();
        loop {
            let op = match self.current.kind {
                TokenKind::Star => Op::Mul,
                TokenKind::Slash => Op::Div,
                _ => break,
            };
            self.bump();
            let rhs = self.parse_factor();
            acc = self.compute(op, acc, rhs);
        }
        acc
    }

    /// `F := '(' E ')' | number | ident ['[' E ']'] | call-as-factor`
    fn parse_factor(&mut self) -> EvalResult {
        match self.current.kind.clone() {
            TokenKind::Number(n) => {
                self.bump();
                EvalResult::constant(n)
            }
            TokenKind::LParen => {
                self.bump();
                let inner = self.parse_expr();
                if !self.expect(TokenKind::RParen) {
                    self.syntax_error("expected `)`");
                }
                inner
            }
            TokenKind::Call => self.parse_call_factor(),
            TokenKind::Ident(name) => {
                self.bump();
                if self.current.kind == TokenKind::LBracket {
                    self.bump();
                    let index = self.parse_array_index();
                    if !self.expect(TokenKind::RBracket) {
                        self.syntax_error("expected `]`");
                    }
                    self.read_array(&name, index)
                } else {
                    self.read_scalar(&name, self.span())
                }
            }
            _ => {
                let desc = self.current.kind.describe();
                self.syntax_error(format!("expected an expression, found {desc}"));
                EvalResult::constant(0)
            }
        }
    }

    /// `index := number | ident` — array subscripts are never full
    /// expressions, only a bare numeral or a variable reference.
    pub(crate) fn parse_array_index(&mut self) -> EvalResult {
        match self.current.kind.clone() {
            TokenKind::Number(n) => {
                self.bump();
                EvalResult::constant(n)
            }
            TokenKind::Ident(name) => {
                let span = self.span();
                self.bump();
                self.read_scalar(&name, span)
            }
            _ => {
                let desc = self.current.kind.describe();
                self.syntax_error(format!(
                    "array index must be a constant or an identifier, found {desc}"
                ));
                EvalResult::constant(0)
            }
        }
    }

    fn read_scalar(&mut self, name: &str, span: Span) -> EvalResult {
        if !self.cfg.is_declared(name) {
            self.syntax_error(format!("use of undeclared identifier `{name}`"));
            return EvalResult::constant(0);
        }
        match self.cfg.current_block().lookup(name) {
            Binding::Value(id) => EvalResult::value(id, vec![name.to_string()]),
            Binding::Uninitialized => {
                self.warning(format!("`{name}` is used before being assigned a value"), span);
                EvalResult { kind: ResultKind::Const(0), variables: vec![name.to_string()] }
            }
            Binding::Array => {
                self.syntax_error(format!("`{name}` is an array; use `{name}[index]`"));
                EvalResult::constant(0)
            }
        }
    }
}

fn fold(op: Op, a: i64, b: i64) -> i64 {
    match op {
        Op::Add => a + b,
        Op::Sub => a - b,
        Op::Mul => a * b,
        // Integer division, not the floating-point division of the
        // reference this was distilled from.
        Op::Div => {
            if b == 0 {
                0
            } else {
                a / b
            }
        }
        other => unreachable!("{other:?} is not an arithmetic fold op"),
    }
}
