use fxhash::{FxHashMap, FxHashSet};
use log::info;

use crate::atpg::{AtpgContext, Section};
use crate::tv::TvId;
use crate::value::WORD_BITS;

/// Compress the existing vectors to keep as few as possible
///
/// This is a minimum set cover problem, solved with a simple greedy algorithm: take the vector
/// that detects the most new faults each time. Every vector is simulated again first, so that
/// it is credited with all the detected faults it hits. The faults detected by the vector list
/// are unchanged. Returns the number of vectors kept.
pub fn compact_patterns(ctx: &mut AtpgContext) -> usize {
    let prev = ctx.timer.change(Section::Compact);
    ctx.fault_mgr.reconcile();
    let det_faults: Vec<_> = ctx
        .fault_mgr
        .det_list()
        .iter()
        .map(|f| (*f, ctx.fault_mgr.fault(*f)))
        .collect();
    ctx.fsim.set_faults(&det_faults);
    for chunk in ctx.tv_list.chunks(WORD_BITS) {
        let vectors: Vec<_> = chunk.iter().map(|id| ctx.tv_arena.get(*id)).collect();
        let hits = ctx.fsim.run(&ctx.network, &vectors);
        for (tv, faults) in chunk.iter().zip(hits) {
            ctx.tv_arena.get_mut(*tv).set_detected_faults(faults);
        }
    }

    // Dense numbering of the faults
    let mut fault_index = FxHashMap::default();
    for (i, (f, _)) in det_faults.iter().enumerate() {
        fault_index.insert(*f, i);
    }

    // Which faults are detected by a given vector
    let pattern_to_faults: Vec<Vec<usize>> = ctx
        .tv_list
        .iter()
        .map(|tv| {
            ctx.tv_arena
                .get(*tv)
                .detected_faults()
                .iter()
                .filter_map(|f| fault_index.get(f).copied())
                .collect()
        })
        .collect();

    // Which vectors detect a given fault
    let mut fault_to_patterns = vec![Vec::new(); det_faults.len()];
    for (p, faults) in pattern_to_faults.iter().enumerate() {
        for f in faults {
            fault_to_patterns[*f].push(p);
        }
    }

    // How many new faults each vector detects
    let mut nb_detected_by_pattern: Vec<_> = pattern_to_faults.iter().map(|v| v.len()).collect();
    let mut remaining_to_detect = fault_to_patterns.iter().filter(|v| !v.is_empty()).count();
    let mut selected_patterns = Vec::new();
    while remaining_to_detect > 0 {
        // Pick the vector that detects the most faults
        let Some((best_pattern, _)) = nb_detected_by_pattern
            .iter()
            .enumerate()
            .max_by(|(_, a), (_, b)| a.cmp(b))
        else {
            break;
        };
        selected_patterns.push(best_pattern);
        remaining_to_detect -= nb_detected_by_pattern[best_pattern];

        // Remove the faults detected by the vector from consideration
        assert!(nb_detected_by_pattern[best_pattern] > 0);
        for f in &pattern_to_faults[best_pattern] {
            for p in &fault_to_patterns[*f] {
                nb_detected_by_pattern[*p] -= 1;
            }
            // So we don't remove a fault twice
            fault_to_patterns[*f].clear();
        }
        assert_eq!(nb_detected_by_pattern[best_pattern], 0);
    }

    let new_list: Vec<TvId> = selected_patterns.iter().map(|p| ctx.tv_list[*p]).collect();
    let kept: FxHashSet<TvId> = new_list.iter().copied().collect();
    for tv in &ctx.tv_list {
        if !kept.contains(tv) {
            ctx.tv_arena.delete_vector(*tv);
        }
    }
    let nb_before = ctx.tv_list.len();
    ctx.tv_list = new_list;
    ctx.fault_mgr.retain_detecting_vectors(|tv| kept.contains(&tv));
    for tv in &ctx.tv_list {
        for f in ctx.tv_arena.get(*tv).detected_faults() {
            ctx.fault_mgr.record_detection(*f, *tv);
        }
    }
    ctx.prime_simulator();
    info!(
        "Kept {} patterns out of {}, detecting {} faults",
        ctx.tv_list.len(),
        nb_before,
        ctx.fault_mgr.nb_detected()
    );
    ctx.timer.change(prev);
    ctx.tv_list.len()
}
