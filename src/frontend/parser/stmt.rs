use crate::ir::block::{Binding, BlockKind};
use crate::ir::{Op, Operand, Slot};

use super::array::Designator;
use super::expr::EvalResult;
use super::parser::Parser;
use crate::frontend::lexer::TokenKind;

impl<'a> Parser<'a> {
    pub(crate) fn parse_assignment(&mut self) {
        self.bump(); // `let`
        let Some(designator) = self.parse_designator() else {
            return;
        };
        if !self.expect(TokenKind::Assign) {
            self.syntax_error("expected `<-`");
            return;
        }
        let value = self.parse_expr();
        match designator {
            Designator::Scalar(name) => self.assign_scalar(&name, value),
            Designator::Element(name, index) => self.write_array(&name, index, &value),
        }
    }

    fn assign_scalar(&mut self, name: &str, value: EvalResult) {
        let id = match self.operand_of(&value) {
            Operand::Instr(id) => id,
            _ => unreachable!("operand_of always materializes a concrete instruction"),
        };
        let current = self.cfg.current();
        self.cfg
            .block_mut(current)
            .symtable
            .insert(name.to_string(), Binding::Value(id));
        self.cfg
            .block_mut(current)
            .used_vars
            .insert(name.to_string(), value.variables);
        self.phi_for_assignment(name, id);
    }

    /// `call` as a statement: `OutputNum`/`OutputNewLine` discard any
    /// result, a user-defined call is evaluated purely for effect.
    pub(crate) fn parse_call_statement(&mut self) {
        let _ = self.parse_call_factor();
    }

    /// `call` as an expression factor: the three smpl builtins plus a
    /// generic named call, all folded into the same `EvalResult::Func`
    /// shape so assignment and φ insertion treat them uniformly.
    pub(crate) fn parse_call_factor(&mut self) -> EvalResult {
        self.bump(); // `call`
        match self.current.kind.clone() {
            TokenKind::InputNum => {
                self.bump();
                self.expect_call_parens_empty();
                let id = self.cfg.add_instruction_no_cse(Op::Read, Operand::Unset, Operand::Unset);
                EvalResult::func(id)
            }
            TokenKind::OutputNum => {
                self.bump();
                let arg = self.parse_single_call_arg();
                let operand = self.operand_of(&arg);
                let id = self.cfg.add_instruction_no_cse(Op::Write, operand, Operand::Unset);
                EvalResult::func(id)
            }
            TokenKind::OutputNewLine => {
                self.bump();
                self.expect_call_parens_empty();
                let id = self.cfg.add_instruction_no_cse(Op::WriteNl, Operand::Unset, Operand::Unset);
                EvalResult::func(id)
            }
            TokenKind::Ident(name) => {
                self.bump();
                self.skip_call_arg_list();
                self.syntax_error(format!("call to undefined function `{name}`"));
                EvalResult::constant(0)
            }
            _ => {
                let desc = self.current.kind.describe();
                self.syntax_error(format!("expected a function name after `call`, found {desc}"));
                EvalResult::constant(0)
            }
        }
    }

    fn expect_call_parens_empty(&mut self) {
        if self.expect(TokenKind::LParen) {
            if !self.expect(TokenKind::RParen) {
                self.syntax_error("expected `)`");
            }
        }
    }

    fn parse_single_call_arg(&mut self) -> EvalResult {
        if !self.expect(TokenKind::LParen) {
            self.syntax_error("expected `(`");
            return EvalResult::constant(0);
        }
        let arg = self.parse_expr();
        if !self.expect(TokenKind::RParen) {
            self.syntax_error("expected `)`");
        }
        arg
    }

    fn skip_call_arg_list(&mut self) {
        if !self.expect(TokenKind::LParen) {
            return;
        }
        if self.current.kind == TokenKind::RParen {
            self.bump();
            return;
        }
        loop {
            self.parse_expr();
            if self.current.kind == TokenKind::Comma {
                self.bump();
                continue;
            }
            break;
        }
        if !self.expect(TokenKind::RParen) {
            self.syntax_error("expected `)`");
        }
    }

    /// `relation := expr relop expr`, emitting a CMP and returning it along
    /// with the branch opcode that should fire when the relation is false
    /// (used to skip the guarded branch).
    fn parse_relation(&mut self) -> (crate::ir::InstrId, Op) {
        let lhs = self.parse_expr();
        let take_branch = match self.current.kind {
            TokenKind::EqEq => Op::Beq,
            TokenKind::Neq => Op::Bne,
            TokenKind::Lt => Op::Blt,
            TokenKind::Le => Op::Ble,
            TokenKind::Gt => Op::Bgt,
            TokenKind::Ge => Op::Bge,
            _ => {
                self.syntax_error("expected a relational operator");
                Op::Beq
            }
        };
        self.bump();
        let rhs = self.parse_expr();

        let mut variables = lhs.variables.clone();
        variables.extend(rhs.variables.iter().cloned());
        let a = self.operand_of(&lhs);
        let b = self.operand_of(&rhs);
        let cmp_id = if self.is_variant(&variables) {
            self.cfg.add_instruction_no_cse(Op::Cmp, a, b)
        } else {
            self.cfg.add_instruction(Op::Cmp, a, b)
        };
        (cmp_id, Op::inverted_relop(take_branch))
    }

    /// `if relation then statseq [else statseq] fi`
    pub(crate) fn parse_if(&mut self) {
        self.bump(); // `if`
        let head = self.cfg.current();
        let (cmp_id, skip_op) = self.parse_relation();
        if !self.expect(TokenKind::Then) {
            self.syntax_error("expected `then`");
            return;
        }

        let (fall, join) = self.cfg.add_if_branch(head);
        let branch_id = self.cfg.add_instruction_no_cse(skip_op, Operand::Instr(cmp_id), Operand::Unset);
        self.cfg.set_waiting_on(join, branch_id, Slot::B);
        self.branch_slot.insert(join, Slot::A);

        self.cfg.set_current(fall);
        self.parse_statement_sequence();
        let bot_then = self.cfg.current();
        self.cfg.block_mut(bot_then).children[0] = Some(join);
        // The then-arm unconditionally jumps over any else-arm to the join,
        // mirroring the original's placement of this BRA right after the
        // then-body and before the else check.
        let bra_id = self.cfg.add_instruction_no_cse(Op::Bra, Operand::Unset, Operand::Unset);
        self.cfg.set_waiting_on(join, bra_id, Slot::A);

        if self.current.kind == TokenKind::Else {
            self.bump();
            let branch = self.cfg.add_else_branch(head, fall, bot_then, join);
            self.cfg.cancel_waiting_on(join, branch_id);
            self.cfg.set_waiting_on(branch, branch_id, Slot::B);
            self.branch_slot.insert(join, Slot::B);

            self.cfg.set_current(branch);
            self.parse_statement_sequence();
            let bot_branch = self.cfg.current();
            self.ensure_nonempty(bot_branch);
            self.cfg.block_mut(bot_branch).children[0] = Some(join);
            self.cfg.block_mut(join).parents = [Some(bot_then), Some(bot_branch)];
        } else {
            self.cfg.block_mut(join).parents = [Some(bot_then), Some(head)];
        }

        if !self.expect(TokenKind::Fi) {
            self.syntax_error("expected `fi`");
        }
        self.ensure_nonempty(join);
        self.branch_slot.remove(&join);
        self.cfg.pop_join();
        self.propagate_to_enclosing_join(join);
        self.cfg.set_current(join);
    }

    /// `while relation do statseq od`
    pub(crate) fn parse_while(&mut self) {
        self.bump(); // `while`
        let head = self.cfg.current();
        let (while_join, fall, follow) = self.cfg.add_while_branch(head);

        self.cfg.set_current(while_join);
        let (cmp_id, skip_op) = self.parse_relation();
        if !self.expect(TokenKind::Do) {
            self.syntax_error("expected `do`");
            return;
        }
        let branch_id = self.cfg.add_instruction_no_cse(skip_op, Operand::Instr(cmp_id), Operand::Unset);
        self.cfg.set_waiting_on(follow, branch_id, Slot::B);

        self.cfg.set_current(fall);
        self.parse_statement_sequence();
        if !self.expect(TokenKind::Od) {
            self.syntax_error("expected `od`");
            return;
        }

        let back_target = self
            .cfg
            .block(while_join)
            .first_instr()
            .expect("while_join always holds at least its own CMP");
        self.cfg
            .add_instruction_no_cse(Op::Bra, Operand::Instr(back_target), Operand::Unset);

        let final_symtable = self.cfg.block(while_join).symtable.clone();
        self.cfg.block_mut(follow).symtable = final_symtable;

        self.cfg.pop_join();
        self.propagate_to_enclosing_join(while_join);
        self.cfg.set_current(follow);
        debug_assert_eq!(self.cfg.block(while_join).kind, BlockKind::WhileJoin);
    }
}
