use crate::ir::block::{BasicBlock, Binding, BlockId, BlockKind, DomEntry};
use crate::ir::instruction::{InstrId, Instruction, InstructionPool, Operand, Slot};
use crate::ir::op::{Op, OpClass};

/// The block tree plus the global instruction pool and the parser's
/// bookkeeping (current block, open join-block stack, declared names).
///
/// This is the structure the recursive-descent parser drives directly;
/// every structural production (`if`, `while`, assignment) calls into it.
pub struct Cfg {
    pool: InstructionPool,
    blocks: Vec<BasicBlock>,
    root: BlockId,
    current: BlockId,
    join_stack: Vec<BlockId>,
    declared_vars: Vec<String>,
    array_name: Option<String>,
}

impl Cfg {
    pub fn new() -> Self {
        let root = BasicBlock::new(BlockId(0), BlockKind::Basic);
        Cfg {
            pool: InstructionPool::new(),
            blocks: vec![root],
            root: BlockId(0),
            current: BlockId(0),
            join_stack: Vec::new(),
            declared_vars: Vec::new(),
            array_name: None,
        }
    }

    fn alloc_block(&mut self, kind: BlockKind) -> BlockId {
        let id = BlockId(self.blocks.len() as u32);
        self.blocks.push(BasicBlock::new(id, kind));
        id
    }

    pub fn root(&self) -> BlockId {
        self.root
    }

    pub fn current(&self) -> BlockId {
        self.current
    }

    pub fn set_current(&mut self, id: BlockId) {
        self.current = id;
    }

    pub fn block(&self, id: BlockId) -> &BasicBlock {
        &self.blocks[id.0 as usize]
    }

    pub fn block_mut(&mut self, id: BlockId) -> &mut BasicBlock {
        &mut self.blocks[id.0 as usize]
    }

    pub fn current_block(&self) -> &BasicBlock {
        self.block(self.current)
    }

    pub fn pool(&self) -> &InstructionPool {
        &self.pool
    }

    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    pub fn declared_vars(&self) -> &[String] {
        &self.declared_vars
    }

    pub fn array_name(&self) -> Option<&str> {
        self.array_name.as_deref()
    }

    pub fn is_declared(&self, name: &str) -> bool {
        self.declared_vars.iter().any(|v| v == name) || self.array_name.as_deref() == Some(name)
    }

    pub fn declare_var(&mut self, name: &str) {
        self.declared_vars.push(name.to_string());
        self.block_mut(self.root)
            .symtable
            .insert(name.to_string(), Binding::Uninitialized);
    }

    pub fn declare_array(&mut self, name: &str) {
        self.array_name = Some(name.to_string());
        self.block_mut(self.root)
            .symtable
            .insert(name.to_string(), Binding::Array);
    }

    // ---- join-block stack -------------------------------------------------

    pub fn push_join(&mut self, block: BlockId) {
        self.join_stack.push(block);
    }

    pub fn pop_join(&mut self) -> Option<BlockId> {
        self.join_stack.pop()
    }

    pub fn innermost_join(&self) -> Option<BlockId> {
        self.join_stack.last().copied()
    }

    pub fn open_joins(&self) -> Vec<BlockId> {
        self.join_stack.clone()
    }

    // ---- structural CFG construction --------------------------------------

    /// Creates a straight-line successor of `parent`, inheriting its symbol
    /// table and CSE chains. Variance and used-vars tables start fresh —
    /// those are scoped to the block they were recorded in, not inherited.
    pub fn add_block(&mut self, parent: BlockId) -> BlockId {
        let symtable = self.blocks[parent.0 as usize].symtable.clone();
        let dom_chains = self.blocks[parent.0 as usize].dom_chains.clone();
        let id = self.alloc_block(BlockKind::Basic);
        {
            let b = self.block_mut(id);
            b.symtable = symtable;
            b.dom_chains = dom_chains;
            b.dominator = Some(parent);
            b.parents[0] = Some(parent);
        }
        self.block_mut(parent).children[0] = Some(id);
        id
    }

    /// `if`: creates a FALL child (the `then` body) and a JOIN grandchild,
    /// both dominated by `head`. Re-parents any successor `head` already
    /// had through the new JOIN. Pushes JOIN onto the open-join stack.
    pub fn add_if_branch(&mut self, head: BlockId) -> (BlockId, BlockId) {
        let symtable = self.blocks[head.0 as usize].symtable.clone();
        let dom_chains = self.blocks[head.0 as usize].dom_chains.clone();
        let existing_child = self.blocks[head.0 as usize].children[0];

        let fall = self.alloc_block(BlockKind::Fall);
        {
            let b = self.block_mut(fall);
            b.symtable = symtable.clone();
            b.dom_chains = dom_chains;
            b.dominator = Some(head);
            b.parents[0] = Some(head);
        }

        let join = self.alloc_block(BlockKind::Join);
        {
            let b = self.block_mut(join);
            b.symtable = symtable;
            b.dominator = Some(head);
        }

        self.block_mut(head).children = [Some(fall), Some(join)];

        if let Some(existing) = existing_child {
            self.block_mut(join).children[0] = Some(existing);
            let successor = self.block_mut(existing);
            for parent_slot in successor.parents.iter_mut() {
                if *parent_slot == Some(head) {
                    *parent_slot = Some(join);
                }
            }
        }

        self.push_join(join);
        (fall, join)
    }

    /// `else`: creates a BRANCH sibling of the `then` FALL, re-wiring
    /// `head`'s children and `join`'s parents to include it.
    pub fn add_else_branch(
        &mut self,
        head: BlockId,
        top_fall: BlockId,
        bot_fall: BlockId,
        join: BlockId,
    ) -> BlockId {
        let symtable = self.blocks[head.0 as usize].symtable.clone();
        let dom_chains = self.blocks[head.0 as usize].dom_chains.clone();

        let branch = self.alloc_block(BlockKind::Branch);
        {
            let b = self.block_mut(branch);
            b.symtable = symtable;
            b.dom_chains = dom_chains;
            b.dominator = Some(head);
            b.parents[0] = Some(head);
            b.children[0] = Some(join);
        }

        self.block_mut(head).children = [Some(top_fall), Some(branch)];
        self.block_mut(join).parents = [Some(bot_fall), Some(branch)];
        branch
    }

    /// `while`: creates WHILE_JOIN, FALL (the body), and FOLLOW (the exit
    /// block), wiring the FALL→WHILE_JOIN back-edge. Pushes WHILE_JOIN onto
    /// the open-join stack.
    pub fn add_while_branch(&mut self, head: BlockId) -> (BlockId, BlockId, BlockId) {
        let symtable = self.blocks[head.0 as usize].symtable.clone();
        let dom_chains = self.blocks[head.0 as usize].dom_chains.clone();

        let while_join = self.alloc_block(BlockKind::WhileJoin);
        {
            let b = self.block_mut(while_join);
            b.symtable = symtable;
            b.dom_chains = dom_chains;
            b.dominator = Some(head);
            b.parents[0] = Some(head);
        }
        self.block_mut(head).children[0] = Some(while_join);

        let fall_symtable = self.blocks[while_join.0 as usize].symtable.clone();
        let fall_dom_chains = self.blocks[while_join.0 as usize].dom_chains.clone();
        let fall = self.alloc_block(BlockKind::Fall);
        {
            let b = self.block_mut(fall);
            b.symtable = fall_symtable;
            b.dom_chains = fall_dom_chains;
            // Per the original scheme, the FALL block's dominator is the
            // WHILE_JOIN it loops back to, not `head` — the body is only
            // ever reached through the join.
            b.dominator = Some(while_join);
            b.parents[0] = Some(while_join);
        }

        let follow = self.alloc_block(BlockKind::Follow);
        {
            let b = self.block_mut(follow);
            b.dominator = Some(while_join);
            b.parents[0] = Some(while_join);
        }

        self.block_mut(while_join).children = [Some(fall), Some(follow)];
        self.block_mut(while_join).parents[1] = Some(fall);
        self.block_mut(fall).children[0] = Some(while_join);

        self.push_join(while_join);
        (while_join, fall, follow)
    }

    // ---- instruction emission ----------------------------------------------

    fn emit(&mut self, block: BlockId, op: Op, a: Operand, b: Operand, cse: bool) -> InstrId {
        let class = OpClass::of(op);
        if cse {
            if let Some(class) = class {
                let chain = self.blocks[block.0 as usize]
                    .dom_chains
                    .get(&class)
                    .cloned()
                    .unwrap_or_default();
                for entry in &chain {
                    match entry {
                        DomEntry::Kill => break,
                        DomEntry::Inst(id) => {
                            let candidate = self.pool.get(*id);
                            if candidate.op == op && candidate.a == a && candidate.b == b {
                                return *id;
                            }
                        }
                    }
                }
            }
        }
        let id = self.pool.append(op, a, b);
        let resolved = self.block_mut(block).append_instr(id, class);
        for (waiting_id, slot) in resolved {
            self.pool.set_operand(waiting_id, slot, Operand::Instr(id));
        }
        id
    }

    /// Emits into the current block, performing CSE against its dominating
    /// chain for the operator's class.
    pub fn add_instruction(&mut self, op: Op, a: Operand, b: Operand) -> InstrId {
        self.emit(self.current, op, a, b, true)
    }

    /// Emits into the current block unconditionally — used when any
    /// contributing operand name is variant in the current block.
    pub fn add_instruction_no_cse(&mut self, op: Op, a: Operand, b: Operand) -> InstrId {
        self.emit(self.current, op, a, b, false)
    }

    /// Emits into an arbitrary block (not necessarily `current`), used by
    /// the φ inserter to append to a join block while parsing is still
    /// inside a branch or loop body.
    pub fn append_to_block(&mut self, block: BlockId, op: Op, a: Operand, b: Operand) -> InstrId {
        self.emit(block, op, a, b, false)
    }

    fn prepend_instruction_at(
        &mut self,
        block: BlockId,
        op: Op,
        a: Operand,
        b: Operand,
        index: usize,
    ) -> InstrId {
        let id = self.pool.append(op, a, b);
        let was_empty = self.block(block).is_empty();
        self.block_mut(block).insert_instr_at(index, id);
        if was_empty {
            let pending = std::mem::take(&mut self.block_mut(block).waiting_on);
            for (waiting_id, slot) in pending {
                self.pool.set_operand(waiting_id, slot, Operand::Instr(id));
            }
        }
        id
    }

    /// Inserts a φ at the front of a JOIN block (if/else case): always a
    /// single node, never repeated, so a front insert is always correct.
    pub fn insert_phi_front(&mut self, join: BlockId, a: Operand, b: Operand) -> InstrId {
        self.prepend_instruction_at(join, Op::Phi, a, b, 0)
    }

    /// Inserts a φ at a WHILE_JOIN's current φ cursor, keeping all φs
    /// contiguous at the block's front, and advances the cursor.
    pub fn insert_while_phi(&mut self, join: BlockId, a: Operand, b: Operand) -> InstrId {
        let idx = self.block(join).while_phi_cursor;
        let id = self.prepend_instruction_at(join, Op::Phi, a, b, idx);
        self.block_mut(join).while_phi_cursor += 1;
        id
    }

    /// Inserts a KILL at the front of `block` and records it in the LOAD
    /// dominating chain so CSE for LOAD/STORE/ADDA stops dead at this point.
    /// Used at branch/loop joins to invalidate memory CSE across a merge.
    pub fn insert_kill(&mut self, block: BlockId, array: Operand) -> InstrId {
        let id = self.prepend_instruction_at(block, Op::Kill, array, Operand::Unset, 0);
        self.block_mut(block).push_dom_entry(OpClass::Load, DomEntry::Kill);
        id
    }

    /// Forces insertion of a fresh instruction at a specific index of a
    /// block's instruction list, used only by the array rebuild logic when
    /// reissuing a MUL/ADD/ADDA/LOAD-or-STORE quadruple ahead of a stale use.
    pub fn insert_instruction_at_index(
        &mut self,
        block: BlockId,
        index: usize,
        op: Op,
        a: Operand,
        b: Operand,
    ) -> InstrId {
        self.prepend_instruction_at(block, op, a, b, index)
    }

    pub fn add_const(&mut self, value: i64) -> InstrId {
        let root = self.root;
        let chain = self.blocks[root.0 as usize]
            .dom_chains
            .get(&OpClass::Const)
            .cloned()
            .unwrap_or_default();
        for entry in &chain {
            if let DomEntry::Inst(id) = entry {
                if let Operand::Literal(v) = self.pool.get(*id).a {
                    if v == value {
                        return *id;
                    }
                }
            }
        }
        self.emit(root, Op::Const, Operand::Literal(value), Operand::Unset, false)
    }

    pub fn add_symbolic_const(&mut self, name: &str) -> InstrId {
        let root = self.root;
        let chain = self.blocks[root.0 as usize]
            .dom_chains
            .get(&OpClass::Const)
            .cloned()
            .unwrap_or_default();
        for entry in &chain {
            if let DomEntry::Inst(id) = entry {
                if let Operand::Symbol(s) = &self.pool.get(*id).a {
                    if s == name {
                        return *id;
                    }
                }
            }
        }
        self.emit(
            root,
            Op::Const,
            Operand::Symbol(name.to_string()),
            Operand::Unset,
            false,
        )
    }

    pub fn const_value(&self, id: InstrId) -> Option<i64> {
        let instr = self.pool.get(id);
        if instr.op == Op::Const {
            if let Operand::Literal(v) = instr.a {
                return Some(v);
            }
        }
        None
    }

    pub fn set_operand(&mut self, id: InstrId, slot: Slot, value: Operand) {
        self.pool.set_operand(id, slot, value);
    }

    pub fn instruction(&self, id: InstrId) -> &Instruction {
        self.pool.get(id)
    }

    /// Resolves `block`'s pending backpatch eagerly, if it already has an
    /// instruction (used right after block creation in case the caller
    /// knows the target is non-empty but the usual append path was bypassed).
    pub fn link_block(&mut self, block: BlockId) {
        if let Some(target) = self.block(block).first_instr() {
            let pending = std::mem::take(&mut self.block_mut(block).waiting_on);
            for (waiting_id, slot) in pending {
                self.pool.set_operand(waiting_id, slot, Operand::Instr(target));
            }
        }
    }

    /// Registers `instr`'s `slot` operand as a target of `block`'s first
    /// instruction, resolving immediately if `block` already has one. A
    /// block can accumulate more than one pending entry before it receives
    /// its first instruction.
    pub fn set_waiting_on(&mut self, block: BlockId, instr: InstrId, slot: Slot) {
        if let Some(target) = self.block(block).first_instr() {
            self.pool.set_operand(instr, slot, Operand::Instr(target));
        } else {
            self.block_mut(block).waiting_on.push((instr, slot));
        }
    }

    /// Drops `instr`'s pending entry from `block`'s backpatch list without
    /// touching any other instruction also waiting on that same block —
    /// used when a branch's true target turns out to be a different block
    /// than originally guessed (e.g. an `if`'s skip-branch retargeted from
    /// the join to a freshly discovered `else` branch).
    pub fn cancel_waiting_on(&mut self, block: BlockId, instr: InstrId) {
        self.block_mut(block).waiting_on.retain(|&(id, _)| id != instr);
    }

    /// All blocks currently in the arena, for traversal (the DOT visualizer
    /// and the rename-propagation sweep both walk the tree via `children`).
    pub fn blocks(&self) -> &[BasicBlock] {
        &self.blocks
    }
}

impl Default for Cfg {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn const_instructions_are_deduplicated() {
        let mut cfg = Cfg::new();
        let a = cfg.add_const(4);
        let b = cfg.add_const(4);
        assert_eq!(a, b);
        assert_eq!(cfg.pool().len(), 1);
    }

    #[test]
    fn add_dedups_within_a_block() {
        let mut cfg = Cfg::new();
        let x = cfg.add_const(1);
        let y = cfg.add_const(2);
        let s1 = cfg.add_instruction(Op::Add, Operand::Instr(x), Operand::Instr(y));
        let s2 = cfg.add_instruction(Op::Add, Operand::Instr(x), Operand::Instr(y));
        assert_eq!(s1, s2);
    }

    #[test]
    fn kill_stops_cse_for_memory_ops() {
        let mut cfg = Cfg::new();
        let base = cfg.add_const(0);
        let load1 = cfg.add_instruction(Op::Load, Operand::Instr(base), Operand::Unset);
        let current = cfg.current();
        cfg.insert_kill(current, Operand::Symbol("arr".into()));
        let load2 = cfg.add_instruction(Op::Load, Operand::Instr(base), Operand::Unset);
        assert_ne!(load1, load2);
    }

    #[test]
    fn if_branch_shares_head_as_dominator() {
        let mut cfg = Cfg::new();
        let head = cfg.current();
        let (fall, join) = cfg.add_if_branch(head);
        assert_eq!(cfg.block(fall).dominator, Some(head));
        assert_eq!(cfg.block(join).dominator, Some(head));
        assert_eq!(cfg.innermost_join(), Some(join));
    }

    #[test]
    fn while_branch_wires_back_edge() {
        let mut cfg = Cfg::new();
        let head = cfg.current();
        let (while_join, fall, follow) = cfg.add_while_branch(head);
        assert_eq!(cfg.block(fall).children[0], Some(while_join));
        assert_eq!(cfg.block(while_join).parents[1], Some(fall));
        assert_eq!(cfg.block(follow).dominator, Some(while_join));
    }
}
