//! SSA and control-flow well-formedness checks run at `Function::finalize`.
//!
//! Grounded on the same successor/predecessor split `cranelift-codegen`'s
//! `ControlFlowGraph` computes (`flowgraph.rs`), simplified to `Vec`-backed
//! adjacency since Liric functions are small enough that a B-tree forest
//! buys nothing.

use crate::error::{IrError, IrResult};
use crate::function::{BlockId, Function};
use crate::value::{ValueId, ValueKind};
use liric_entity::{EntityRef, SecondaryMap};
use std::collections::HashMap;

/// Successor blocks reachable directly from the end of `block`.
fn successors(func: &Function, block: BlockId) -> Vec<BlockId> {
    let b = func.block(block);
    let Some(term) = b.insts.last() else {
        return Vec::new();
    };
    let mut out = Vec::new();
    out.extend(term.target);
    out.extend(term.else_target);
    out.extend(term.default_target);
    out.extend(term.payload.switch_cases.iter().map(|c| c.target));
    out
}

/// Every block a terminator, phi edge, or switch case names must exist in
/// this function.
pub fn check_targets_exist(func: &Function) -> IrResult<()> {
    let n = func.num_blocks() as u32;
    let in_range = |b: BlockId| b.index() < n as usize;
    for (id, b) in func.blocks() {
        for t in successors(func, id) {
            if !in_range(t) {
                return Err(IrError::UnknownBlock(format!("{}", t)));
            }
        }
        for inst in &b.insts {
            for edge in &inst.payload.phi_edges {
                if !in_range(edge.from_block) {
                    return Err(IrError::UnknownBlock(format!("{}", edge.from_block)));
                }
            }
        }
    }
    Ok(())
}

/// Reverse-postorder numbering of reachable blocks starting at block 0
/// (the entry block by convention).
fn reverse_postorder(func: &Function) -> Vec<BlockId> {
    let n = func.num_blocks();
    if n == 0 {
        return Vec::new();
    }
    let entry = BlockId::new(0);
    let mut visited = vec![false; n];
    let mut post = Vec::with_capacity(n);
    let mut stack = vec![(entry, successors(func, entry).into_iter())];
    visited[entry.index()] = true;

    while let Some((node, iter)) = stack.last_mut() {
        match iter.next() {
            Some(succ) => {
                if !visited[succ.index()] {
                    visited[succ.index()] = true;
                    let succs = successors(func, succ);
                    stack.push((succ, succs.into_iter()));
                }
            }
            None => {
                post.push(*node);
                stack.pop();
            }
        }
    }
    post.reverse();
    post
}

/// Compute immediate dominators via the Cooper/Harvey/Kennedy iterative
/// fixpoint algorithm over the reverse-postorder numbering.
fn compute_idom(func: &Function) -> HashMap<BlockId, BlockId> {
    let rpo = reverse_postorder(func);
    let rpo_index: HashMap<BlockId, usize> =
        rpo.iter().enumerate().map(|(i, b)| (*b, i)).collect();
    if rpo.is_empty() {
        return HashMap::new();
    }

    let preds: HashMap<BlockId, Vec<BlockId>> = {
        let mut m: HashMap<BlockId, Vec<BlockId>> = HashMap::new();
        for &b in &rpo {
            for s in successors(func, b) {
                if rpo_index.contains_key(&s) {
                    m.entry(s).or_default().push(b);
                }
            }
        }
        m
    };

    let entry = rpo[0];
    let mut idom: HashMap<BlockId, Option<usize>> = HashMap::new();
    idom.insert(entry, Some(0));

    let intersect = |mut a: usize, mut b: usize, idom: &HashMap<BlockId, Option<usize>>| -> usize {
        while a != b {
            while a > b {
                a = idom[&rpo[a]].unwrap();
            }
            while b > a {
                b = idom[&rpo[b]].unwrap();
            }
        }
        a
    };

    let mut changed = true;
    while changed {
        changed = false;
        for (i, &b) in rpo.iter().enumerate().skip(1) {
            let ps = match preds.get(&b) {
                Some(p) => p,
                None => continue,
            };
            let mut new_idom: Option<usize> = None;
            for &p in ps {
                let Some(&pi) = rpo_index.get(&p) else { continue };
                if idom.get(&rpo[pi]).map(|o| o.is_some()).unwrap_or(false) {
                    new_idom = Some(match new_idom {
                        None => pi,
                        Some(cur) => intersect(cur, pi, &idom),
                    });
                }
            }
            if let Some(ni) = new_idom {
                if idom.get(&b).copied().flatten() != Some(ni) {
                    idom.insert(b, Some(ni));
                    changed = true;
                }
            }
            let _ = i;
        }
    }

    idom.into_iter()
        .filter_map(|(b, i)| i.map(|i| (b, rpo[i])))
        .collect()
}

/// Does `a` dominate `b` (reflexively)?
fn dominates(
    a: BlockId,
    b: BlockId,
    idom: &HashMap<BlockId, BlockId>,
) -> bool {
    let mut cur = b;
    loop {
        if cur == a {
            return true;
        }
        match idom.get(&cur) {
            Some(&next) if next != cur => cur = next,
            _ => return cur == a,
        }
    }
}

/// Check that every virtual register is defined exactly once and every use
/// is dominated by its definition.
pub fn check_ssa_dominance(func: &Function) -> IrResult<()> {
    let mut def_block: HashMap<ValueId, BlockId> = HashMap::new();
    // `None` marks a definition that precedes every real instruction
    // (a function parameter), so it always satisfies same-block ordering.
    let mut def_index: HashMap<ValueId, Option<usize>> = HashMap::new();
    for i in 0..func.param_tys.len() as u32 {
        let vid = ValueId::from_number(i + 1);
        def_block.insert(vid, BlockId::new(0));
        def_index.insert(vid, None);
    }

    for (id, b) in func.blocks() {
        for (idx, inst) in b.insts.iter().enumerate() {
            if inst.dest.is_none() {
                continue;
            }
            if def_block.insert(inst.dest, id).is_some() {
                return Err(IrError::MultipleDefinition(format!("{}", inst.dest)));
            }
            def_index.insert(inst.dest, Some(idx));
        }
    }

    let idom = compute_idom(func);
    let mut reachable: SecondaryMap<BlockId, bool> = SecondaryMap::new();
    for b in reverse_postorder(func) {
        reachable[b] = true;
    }

    for (id, b) in func.blocks() {
        if !reachable[id] {
            continue;
        }
        for (idx, inst) in b.insts.iter().enumerate() {
            for operand in &inst.operands {
                if let ValueKind::VReg(vid) = operand.kind {
                    check_use_dominated(vid, id, Some(idx), &def_block, &def_index, &idom)?;
                }
            }
            for edge in &inst.payload.phi_edges {
                if let ValueKind::VReg(vid) = edge.value.kind {
                    // A phi's incoming value only has to dominate the end
                    // of its named predecessor block, not any particular
                    // instruction in it, so same-block is always fine here
                    // regardless of textual order (the back-edge case).
                    check_use_dominated(vid, edge.from_block, None, &def_block, &def_index, &idom)?;
                }
            }
        }
    }
    Ok(())
}

fn check_use_dominated(
    vid: ValueId,
    use_block: BlockId,
    use_index: Option<usize>,
    def_block: &HashMap<ValueId, BlockId>,
    def_index: &HashMap<ValueId, Option<usize>>,
    idom: &HashMap<BlockId, BlockId>,
) -> IrResult<()> {
    let Some(&def) = def_block.get(&vid) else {
        return Err(IrError::NotDominated {
            value: format!("{}", vid),
            block: format!("{}", use_block),
        });
    };
    let ok = if def == use_block {
        match use_index {
            None => true,
            Some(ui) => match def_index.get(&vid).copied().flatten() {
                None => true,
                Some(di) => di < ui,
            },
        }
    } else {
        dominates(def, use_block, idom)
    };
    if ok {
        Ok(())
    } else {
        Err(IrError::NotDominated {
            value: format!("{}", vid),
            block: format!("{}", use_block),
        })
    }
}
