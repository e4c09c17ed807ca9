use crate::ir::block::Variance;
use crate::ir::{InstrId, Op, Operand};

use super::expr::{EvalResult, ResultKind};
use super::parser::Parser;

/// A parsed assignment target: either a bare name or `name[index]`.
pub(crate) enum Designator {
    Scalar(String),
    Element(String, EvalResult),
}

impl<'a> Parser<'a> {
    pub(crate) fn parse_designator(&mut self) -> Option<Designator> {
        let name = self.expect_ident()?;
        if !self.cfg.is_declared(&name) {
            self.syntax_error(format!("use of undeclared identifier `{name}`"));
            return None;
        }
        if self.current.kind == crate::frontend::lexer::TokenKind::LBracket {
            self.bump();
            let index = self.parse_array_index();
            if !self.expect(crate::frontend::lexer::TokenKind::RBracket) {
                self.syntax_error("expected `]`");
            }
            Some(Designator::Element(name, index))
        } else {
            Some(Designator::Scalar(name))
        }
    }

    /// The MUL/ADD/ADDA idiom shared by array loads and stores. `#BASE` is
    /// a symbolic operand, never materialized as a CONST instruction — only
    /// `<array>_adr` is a real root-level constant.
    fn array_element_address(&mut self, array: &str, index: EvalResult) -> InstrId {
        let variant = self.variance_of_result(&index);
        let four = self.cfg.add_const(4);
        let idx_operand = self.operand_of(&index);
        let mul = if variant {
            self.cfg.add_instruction_no_cse(Op::Mul, idx_operand, Operand::Instr(four))
        } else {
            self.cfg.add_instruction(Op::Mul, idx_operand, Operand::Instr(four))
        };
        let arr_adr = self.cfg.add_symbolic_const(&format!("{array}_adr"));
        let add = self.cfg.add_instruction(
            Op::Add,
            Operand::Symbol("#BASE".to_string()),
            Operand::Instr(arr_adr),
        );
        self.cfg
            .add_instruction(Op::Adda, Operand::Instr(mul), Operand::Instr(add))
    }

    fn variance_of_result(&self, r: &EvalResult) -> bool {
        r.variables
            .iter()
            .any(|n| self.cfg.current_block().variance_of(n) == Variance::Variant)
    }

    pub(crate) fn read_array(&mut self, array: &str, index: EvalResult) -> EvalResult {
        let adda = self.array_element_address(array, index);
        let id = self.cfg.add_instruction(Op::Load, Operand::Instr(adda), Operand::Unset);
        EvalResult { kind: ResultKind::Var(id), variables: vec![array.to_string()] }
    }

    /// Stores `value` into `array[index]`. The ADDA is reused via ordinary
    /// CSE if the address was just computed; the STORE itself only CSEs
    /// against a prior store of the identical value to the identical
    /// address, so a changed value always produces a fresh STORE.
    pub(crate) fn write_array(&mut self, array: &str, index: EvalResult, value: &EvalResult) {
        let adda = self.array_element_address(array, index);
        let value_operand = self.operand_of(value);
        self.cfg.add_instruction(Op::Store, Operand::Instr(adda), value_operand);
        self.phi_array(array);
    }
}
