use std::collections::HashMap;

use crate::ir::instruction::{InstrId, Slot};
use crate::ir::op::OpClass;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    Basic,
    Fall,
    Branch,
    Join,
    WhileJoin,
    Follow,
}

/// What a name is currently bound to, in place of the original scheme's
/// `-1`/`-2`/positive-id symbol table values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Binding {
    Uninitialized,
    Array,
    Value(InstrId),
}

impl Binding {
    pub fn as_value(&self) -> Option<InstrId> {
        match self {
            Binding::Value(id) => Some(*id),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Variance {
    Invariant,
    Variant,
}

/// A dominating-chain entry for one operator class. A `Kill` stops the
/// search for an older candidate dead in its tracks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DomEntry {
    Kill,
    Inst(InstrId),
}

#[derive(Debug, Clone)]
pub struct BasicBlock {
    pub id: BlockId,
    pub kind: BlockKind,
    pub instructions: Vec<InstrId>,
    pub parents: [Option<BlockId>; 2],
    pub children: [Option<BlockId>; 2],
    pub dominator: Option<BlockId>,
    pub symtable: HashMap<String, Binding>,
    pub variance: HashMap<String, Variance>,
    pub used_vars: HashMap<String, Vec<String>>,
    pub dom_chains: HashMap<OpClass, Vec<DomEntry>>,
    /// Every branch/jump still awaiting this block's first instruction as a
    /// target. More than one can be pending at once — e.g. an `if` with no
    /// assignment in its then-arm leaves both the skip-branch and the
    /// then-arm's own closing `BRA` waiting on the join simultaneously.
    pub waiting_on: Vec<(InstrId, Slot)>,
    pub while_phi_cursor: usize,
}

impl BasicBlock {
    pub fn new(id: BlockId, kind: BlockKind) -> Self {
        Self {
            id,
            kind,
            instructions: Vec::new(),
            parents: [None, None],
            children: [None, None],
            dominator: None,
            symtable: HashMap::new(),
            variance: HashMap::new(),
            used_vars: HashMap::new(),
            dom_chains: HashMap::new(),
            waiting_on: Vec::new(),
            while_phi_cursor: 0,
        }
    }

    pub fn first_instr(&self) -> Option<InstrId> {
        self.instructions.first().copied()
    }

    pub fn last_instr(&self) -> Option<InstrId> {
        self.instructions.last().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    pub fn lookup(&self, name: &str) -> Binding {
        *self.symtable.get(name).unwrap_or(&Binding::Uninitialized)
    }

    pub fn variance_of(&self, name: &str) -> Variance {
        *self.variance.get(name).unwrap_or(&Variance::Invariant)
    }

    pub fn mark_variant(&mut self, name: &str) {
        self.variance.insert(name.to_string(), Variance::Variant);
    }

    /// Names currently bound in `symtable` to `target`.
    pub fn names_bound_to(&self, target: InstrId) -> Vec<String> {
        self.symtable
            .iter()
            .filter(|(_, b)| b.as_value() == Some(target))
            .map(|(name, _)| name.clone())
            .collect()
    }

    fn dom_chain_mut(&mut self, class: OpClass) -> &mut Vec<DomEntry> {
        self.dom_chains.entry(class).or_default()
    }

    pub fn push_dom_entry(&mut self, class: OpClass, entry: DomEntry) {
        self.dom_chain_mut(class).insert(0, entry);
    }

    pub fn find_dom_instruction(
        &self,
        class: OpClass,
        mut matches: impl FnMut(InstrId) -> bool,
    ) -> Option<InstrId> {
        let chain = self.dom_chains.get(&class)?;
        for entry in chain {
            match entry {
                DomEntry::Kill => return None,
                DomEntry::Inst(id) => {
                    if matches(*id) {
                        return Some(*id);
                    }
                }
            }
        }
        None
    }

    /// Appends `id` to the block's instruction list, recording it in the
    /// relevant CSE chain (if `class` is `Some`) and resolving any pending
    /// backpatch for this block.
    pub fn append_instr(
        &mut self,
        id: InstrId,
        class: Option<OpClass>,
    ) -> Vec<(InstrId, Slot)> {
        let first_before = self.instructions.is_empty();
        self.instructions.push(id);
        if let Some(class) = class {
            self.push_dom_entry(class, DomEntry::Inst(id));
        }
        if first_before {
            std::mem::take(&mut self.waiting_on)
        } else {
            Vec::new()
        }
    }

    pub fn prepend_instr(&mut self, id: InstrId, class: Option<OpClass>) {
        self.instructions.insert(0, id);
        if let Some(class) = class {
            self.push_dom_entry(class, DomEntry::Inst(id));
        }
    }

    pub fn insert_instr_at(&mut self, index: usize, id: InstrId) {
        self.instructions.insert(index, id);
    }
}
