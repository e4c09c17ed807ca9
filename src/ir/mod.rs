pub mod op;
pub mod instruction;
pub mod block;
pub mod cfg;

pub use cfg::Cfg;
pub use instruction::{Instruction, InstructionPool, InstrId, Operand, Slot};
pub use block::{BasicBlock, BlockId, BlockKind, Binding, DomEntry, Variance};
pub use op::{Op, OpClass};
