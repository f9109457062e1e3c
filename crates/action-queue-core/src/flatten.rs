//! Collect the outstanding leaves of an effect tree.

use crate::effect::ActionEffect;

/// Every leaf effect still awaited somewhere in `effect`, in tree order.
///
/// `seq` contributes its running child, `par` every child, `done` nothing.
/// An `init` node counts as outstanding: its step has not started yet.
pub fn pending_leaf_effects(effect: &ActionEffect) -> Vec<&ActionEffect> {
    pending_leaf_paths(effect)
        .into_iter()
        .map(|(_, leaf)| leaf)
        .collect()
}

/// Like [`pending_leaf_effects`], paired with each leaf's call stack id:
/// the dotted path of `seq_<opIndex>` / `par_<childIndex>` segments from the
/// root. A leaf at the root has an empty path.
pub fn pending_leaf_paths(effect: &ActionEffect) -> Vec<(String, &ActionEffect)> {
    let mut out = Vec::new();
    collect(effect, String::new(), &mut out);
    out
}

/// Join a call stack id and one more segment.
pub fn join_path(base: &str, segment: &str) -> String {
    match (base.is_empty(), segment.is_empty()) {
        (true, _) => segment.to_string(),
        (_, true) => base.to_string(),
        _ => format!("{base}.{segment}"),
    }
}

fn collect<'a>(effect: &'a ActionEffect, path: String, out: &mut Vec<(String, &'a ActionEffect)>) {
    match effect {
        ActionEffect::Seq {
            op_index,
            child_effect,
        } => collect(child_effect, join_path(&path, &format!("seq_{op_index}")), out),
        ActionEffect::Par { child_effects } => {
            for (i, child) in child_effects.iter().enumerate() {
                collect(child, join_path(&path, &format!("par_{i}")), out);
            }
        }
        ActionEffect::Done { .. } => {}
        leaf => out.push((path, leaf)),
    }
}
