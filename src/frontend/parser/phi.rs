use std::collections::{HashMap, HashSet, VecDeque};

use crate::ir::block::{Binding, BlockId, BlockKind, Variance};
use crate::ir::{InstrId, Op, Operand, Slot};

use super::parser::Parser;

impl<'a> Parser<'a> {
    /// Routes a freshly emitted SSA value to whatever φ bookkeeping the
    /// innermost open join requires. Called once per scalar assignment,
    /// right after the assigned value's instruction has been emitted.
    pub(crate) fn phi_for_assignment(&mut self, name: &str, new_id: InstrId) {
        let Some(join) = self.cfg.innermost_join() else {
            return;
        };
        match self.cfg.block(join).kind {
            BlockKind::Join => self.phi_if(join, name, new_id),
            BlockKind::WhileJoin => self.phi_while(join, name, new_id),
            other => unreachable!("open join stack only ever holds Join/WhileJoin, found {other:?}"),
        }
    }

    /// An existing φ for `name` already sitting in `join`'s own instruction
    /// list, as opposed to a value merely inherited unchanged from before
    /// the join existed.
    fn existing_phi(&self, join: BlockId, name: &str) -> Option<InstrId> {
        match self.cfg.block(join).symtable.get(name).copied() {
            Some(Binding::Value(id))
                if self.cfg.instruction(id).op == Op::Phi
                    && self.cfg.block(join).instructions.contains(&id) =>
            {
                Some(id)
            }
            _ => None,
        }
    }

    /// `if`/`else` case: each open join owns a fixed operand slot per
    /// branch (`branch_slot`), so repeated reassignment of the same name
    /// within one arm always rewrites the same operand instead of
    /// clobbering the other arm's slot.
    fn phi_if(&mut self, join: BlockId, name: &str, new_id: InstrId) {
        let slot = *self
            .branch_slot
            .get(&join)
            .expect("branch_slot must be set for every open if/else join");

        if let Some(phi_id) = self.existing_phi(join, name) {
            self.cfg.set_operand(phi_id, slot, Operand::Instr(new_id));
            return;
        }

        let other = match self.cfg.block(join).symtable.get(name).copied() {
            Some(Binding::Value(id)) => Operand::Instr(id),
            _ => Operand::Unset,
        };
        let (a, b) = match slot {
            Slot::A => (Operand::Instr(new_id), other),
            Slot::B => (other, Operand::Instr(new_id)),
        };
        let phi_id = self.cfg.insert_phi_front(join, a, b);
        self.cfg
            .block_mut(join)
            .symtable
            .insert(name.to_string(), Binding::Value(phi_id));
        self.cfg.block_mut(join).mark_variant(name);
    }

    /// `while` case: operand A is always the pre-loop entry value, operand
    /// B the end-of-body/back-edge value, updated in place on every
    /// reassignment within the same body. The first reassignment also
    /// triggers [`Parser::rename_propagate`] so earlier reads in this same
    /// iteration stop trusting the stale pre-loop value.
    fn phi_while(&mut self, join: BlockId, name: &str, new_id: InstrId) {
        if let Some(phi_id) = self.existing_phi(join, name) {
            self.cfg.set_operand(phi_id, Slot::B, Operand::Instr(new_id));
            return;
        }

        let binding = self.cfg.block(join).symtable.get(name).copied();
        let entry = match binding {
            Some(Binding::Value(id)) => Operand::Instr(id),
            _ => Operand::Unset,
        };

        let phi_id = self.cfg.insert_while_phi(join, entry, Operand::Instr(new_id));
        self.cfg
            .block_mut(join)
            .symtable
            .insert(name.to_string(), Binding::Value(phi_id));
        self.cfg.block_mut(join).mark_variant(name);

        if let Some(Binding::Value(old_id)) = binding {
            self.rename_propagate(join, old_id, phi_id, name);
        }
    }

    /// Rewrites every non-φ consumer of `old` reachable from `start` (the
    /// loop body parsed so far this iteration) to consume `new` instead,
    /// marking `name` variant in each block visited so later expressions in
    /// that block stop CSE-ing against values that predate the reassignment.
    ///
    /// A nested `WHILE_JOIN` is rewritten itself (its own φ/CMP may still
    /// reference the outer name) but not descended into — the inner loop's
    /// body belongs to a rename sweep of its own. A plain `JOIN` is deferred
    /// until both of its incoming edges have been visited.
    fn rename_propagate(&mut self, start: BlockId, old: InstrId, new: InstrId, name: &str) {
        let mut seen_join: HashMap<BlockId, usize> = HashMap::new();
        let mut visited: HashSet<BlockId> = HashSet::new();
        let mut queue: VecDeque<BlockId> = VecDeque::new();
        queue.push_back(start);

        while let Some(block) = queue.pop_front() {
            if self.cfg.block(block).kind == BlockKind::Join {
                let count = seen_join.entry(block).or_insert(0);
                *count += 1;
                if *count < 2 {
                    continue;
                }
            }
            if !visited.insert(block) {
                continue;
            }

            // Mark variant before rewriting: the invariant-preservation
            // check below must see `name` itself as variant already, or a
            // plain self-increment (`i <- i + 1`) would read as having only
            // invariant contributors and wrongly freeze at the pre-loop value.
            self.cfg.block_mut(block).mark_variant(name);
            self.rewrite_block_operands(block, old, new);

            if self.cfg.block(block).kind == BlockKind::WhileJoin && block != start {
                continue;
            }
            for child in self.cfg.block(block).children.into_iter().flatten() {
                queue.push_back(child);
            }
        }
    }

    fn rewrite_block_operands(&mut self, block: BlockId, old: InstrId, new: InstrId) {
        let ids: Vec<InstrId> = self.cfg.block(block).instructions.clone();
        for id in ids {
            let instr = self.cfg.instruction(id);
            if instr.op == Op::Phi {
                continue;
            }
            let (orig_a, orig_b) = (instr.a.clone(), instr.b.clone());
            let a_match = orig_a == Operand::Instr(old);
            let b_match = orig_b == Operand::Instr(old);
            if !a_match && !b_match {
                continue;
            }
            let op = instr.op;
            if a_match {
                self.cfg.set_operand(id, Slot::A, Operand::Instr(new));
            }
            if b_match {
                self.cfg.set_operand(id, Slot::B, Operand::Instr(new));
            }
            self.reinstate_invariant_consumers(block, id, op, orig_a, orig_b);
        }
    }

    /// A name bound to the instruction we just rewrote might itself be
    /// invariant-in-spirit: its value was assembled from names that don't
    /// change in this loop, so it should keep observing the pre-rewrite
    /// operands rather than silently tracking the φ. For each such name,
    /// append a fresh duplicate carrying the original operands and rebind
    /// the name to it, leaving the in-place rewrite to serve variant
    /// consumers.
    fn reinstate_invariant_consumers(
        &mut self,
        block: BlockId,
        rewritten: InstrId,
        op: Op,
        orig_a: Operand,
        orig_b: Operand,
    ) {
        let names = self.cfg.block(block).names_bound_to(rewritten);
        for name in names {
            let contributors = self
                .cfg
                .block(block)
                .used_vars
                .get(&name)
                .cloned()
                .unwrap_or_default();
            let has_invariant_contributor = contributors
                .iter()
                .any(|c| self.cfg.block(block).variance_of(c) == Variance::Invariant);
            if has_invariant_contributor {
                let dup_id = self.cfg.append_to_block(block, op, orig_a.clone(), orig_b.clone());
                self.cfg
                    .block_mut(block)
                    .symtable
                    .insert(name, Binding::Value(dup_id));
            }
        }
    }

    /// After a join/while_join finishes (`fi`/`od`), any name that just
    /// received a φ there must also be visible to whatever join encloses
    /// it — otherwise a variable reassigned only inside a nested construct
    /// would never reach the outer loop's own merge, since φ insertion is
    /// normally only triggered by the assignment that directly touches the
    /// innermost open join. Runs once per construct, not once per
    /// assignment, so an in-progress arm never leaks a premature value out.
    pub(crate) fn propagate_to_enclosing_join(&mut self, closed: BlockId) {
        let Some(&outer) = self.cfg.open_joins().last() else {
            return;
        };
        let phi_ids: Vec<InstrId> = self
            .cfg
            .block(closed)
            .instructions
            .iter()
            .copied()
            .filter(|id| self.cfg.instruction(*id).op == Op::Phi)
            .collect();
        for phi_id in phi_ids {
            let names = self.cfg.block(closed).names_bound_to(phi_id);
            for name in names {
                match self.cfg.block(outer).kind {
                    BlockKind::Join => {
                        self.phi_if(outer, &name, phi_id);
                    }
                    BlockKind::WhileJoin => {
                        self.phi_while(outer, &name, phi_id);
                    }
                    _ => {}
                }
            }
        }
    }

    /// Array write at a branch/loop merge point: rather than re-synthesizing
    /// every already-embedded address quadruple, insert a `KILL` into every
    /// currently open join. Join blocks are always empty at the point this
    /// runs (statements are only ever appended to the still-open FALL/
    /// BRANCH/body block, never to a join before its own `fi`/`od`), so the
    /// existing dominating-chain mechanism naturally covers every future
    /// memory op reached through the join.
    pub(crate) fn phi_array(&mut self, array: &str) {
        for join in self.cfg.open_joins() {
            self.cfg.insert_kill(join, Operand::Symbol(array.to_string()));
        }
    }

    /// Guarantees `block` has at least one instruction before it stops
    /// being the parser's current block, so a branch instruction already
    /// waiting on it always has something concrete to link to.
    pub(crate) fn ensure_nonempty(&mut self, block: BlockId) {
        if self.cfg.block(block).is_empty() {
            self.cfg
                .append_to_block(block, Op::Empty, Operand::Unset, Operand::Unset);
        }
    }
}
