//! Graphviz DOT rendering of a parsed [`Cfg`], used by `--dot` and purely
//! for inspection — it has no effect on compilation itself.

use std::collections::{HashMap, VecDeque};
use std::fmt::Write as _;

use crate::ir::block::BlockKind;
use crate::ir::{BlockId, Cfg, Op};

/// Renders `cfg` as a `dot` record-node graph. Blocks are numbered in BFS
/// order from the root rather than by their internal [`BlockId`], so the
/// output reads top-to-bottom the way the program was written.
pub fn render(cfg: &Cfg) -> String {
    let order = bfs_order(cfg);
    let mut out = String::new();
    let _ = writeln!(out, "digraph smpl {{");
    let _ = writeln!(out, "  node [shape=record, fontname=monospace];");

    for (number, &block) in order.iter().enumerate() {
        let label = node_label(cfg, block, number);
        let _ = writeln!(out, "  b{number} [label=\"{label}\"];");
    }

    let index_of: HashMap<BlockId, usize> = order
        .iter()
        .enumerate()
        .map(|(i, &b)| (b, i))
        .collect();

    for (number, &block) in order.iter().enumerate() {
        for (slot, child) in cfg.block(block).children.into_iter().enumerate() {
            let Some(child) = child else { continue };
            let Some(&target) = index_of.get(&child) else {
                continue;
            };
            match edge_label(cfg, block, child, slot) {
                Some(l) => {
                    let _ = writeln!(out, "  b{number} -> b{target} [label=\"{l}\"];");
                }
                None => {
                    let _ = writeln!(out, "  b{number} -> b{target};");
                }
            }
        }
    }

    let _ = writeln!(out, "}}");
    out
}

fn bfs_order(cfg: &Cfg) -> Vec<BlockId> {
    let mut order = Vec::new();
    let mut seen = HashMap::new();
    let mut queue = VecDeque::new();
    queue.push_back(cfg.root());
    seen.insert(cfg.root(), true);

    while let Some(block) = queue.pop_front() {
        order.push(block);
        for child in cfg.block(block).children.into_iter().flatten() {
            if seen.insert(child, true).is_none() {
                queue.push_back(child);
            }
        }
    }
    order
}

fn node_label(cfg: &Cfg, block: BlockId, number: usize) -> String {
    let b = cfg.block(block);
    let mut rows = vec![format!("B{number} ({})", kind_name(b.kind))];
    for &id in &b.instructions {
        rows.push(escape(&cfg.instruction(id).render()));
    }
    rows.join("|")
}

fn kind_name(kind: BlockKind) -> &'static str {
    match kind {
        BlockKind::Basic => "basic",
        BlockKind::Fall => "fall",
        BlockKind::Branch => "branch",
        BlockKind::Join => "join",
        BlockKind::WhileJoin => "while_join",
        BlockKind::Follow => "follow",
    }
}

/// The DOT visualizer's edge labels follow the block kind at the tail of
/// the edge: a JOIN's inbound edges are labeled by inspecting the
/// predecessor's tail instruction (a conditional branch means the
/// "branch" edge, anything else means plain fall-through); a WHILE_JOIN's
/// second child is always its FOLLOW (labeled accordingly), its first its
/// loop body.
fn edge_label(cfg: &Cfg, from: BlockId, _to: BlockId, slot: usize) -> Option<&'static str> {
    match cfg.block(from).kind {
        BlockKind::WhileJoin => Some(if slot == 0 { "body" } else { "follow" }),
        _ => {
            if let Some(&tail) = cfg.block(from).instructions.last() {
                if cfg.instruction(tail).op.is_branch() {
                    return Some(if slot == 0 { "fall-through" } else { "branch" });
                }
            }
            if cfg.block(from).kind == BlockKind::Fall && cfg.block(_to).kind == BlockKind::WhileJoin {
                return Some("back-edge");
            }
            None
        }
    }
}

fn escape(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('|', "\\|")
        .replace('{', "\\{")
        .replace('}', "\\}")
        .replace('<', "\\<")
        .replace('>', "\\>")
}
