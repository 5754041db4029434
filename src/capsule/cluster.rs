use crate::capsule::retrieve::RowHit;

/// A contiguous run of `hits` sharing one cluster id, after `cluster_results`
/// reorders the buffer (spec §4.7.4).
#[derive(Debug, Clone)]
pub struct Cluster {
    pub id: usize,
    pub start: usize,
    pub len: usize,
}

/// Two-phase clustering over a score-sorted result (spec §4.7.4). The
/// detailed and cross-cluster passes use score proximity as the feature
/// signal in place of the richer per-document feature vector the original
/// search stack produces, since this crate does not carry one; see
/// DESIGN.md.
pub fn cluster_results(
    hits: &mut [RowHit],
    max_rough_clusters: usize,
    merge_cluster_distance: usize,
    local_threshold: f32,
    phased: bool,
) -> Vec<Cluster> {
    let rough = rough_cluster(hits, max_rough_clusters);
    if phased {
        return rough;
    }
    let detailed = detailed_cluster(hits, &rough, merge_cluster_distance, local_threshold);
    cross_cluster_merge(hits, detailed, merge_cluster_distance, local_threshold)
}

/// Cuts the score-sorted list wherever the decrement exceeds a rolling
/// average `D` over a window of up to 1024 entries, recomputing `D`
/// whenever it is zero.
fn rough_cluster(hits: &[RowHit], max_clusters: usize) -> Vec<Cluster> {
    if hits.is_empty() {
        return Vec::new();
    }
    let mut clusters = Vec::new();
    let mut start = 0;
    let mut window: Vec<f32> = Vec::new();
    let mut d = 0.0f32;

    for i in 0..hits.len() {
        if i + 1 < hits.len() {
            let dec = hits[i].score - hits[i + 1].score;
            window.push(dec);
            if window.len() > 1024 {
                window.remove(0);
            }
            if d == 0.0 {
                d = window.iter().sum::<f32>() / window.len() as f32;
            }
            if dec > d && clusters.len() + 1 < max_clusters {
                clusters.push(Cluster { id: clusters.len(), start, len: i + 1 - start });
                start = i + 1;
                d = 0.0;
                window.clear();
            }
        }
    }
    clusters.push(Cluster { id: clusters.len(), start, len: hits.len() - start });
    clusters
}

/// Within each rough cluster, merge neighboring documents whose score
/// proximity exceeds `local_threshold`.
fn detailed_cluster(hits: &[RowHit], rough: &[Cluster], neighbor: usize, local_threshold: f32) -> Vec<Cluster> {
    let mut out = Vec::new();
    for rc in rough {
        let slice = &hits[rc.start..rc.start + rc.len];
        let mut sub_start = 0;
        for i in 0..slice.len() {
            let j_max = (i + neighbor.max(1)).min(slice.len() - 1);
            let mut merged = false;
            for j in (i + 1)..=j_max {
                let sim = 1.0 - (slice[i].score - slice[j].score).abs();
                if sim > local_threshold {
                    merged = true;
                }
            }
            if !merged && i > sub_start {
                out.push(Cluster { id: out.len(), start: rc.start + sub_start, len: i - sub_start });
                sub_start = i;
            }
        }
        out.push(Cluster { id: out.len(), start: rc.start + sub_start, len: slice.len() - sub_start });
    }
    out
}

/// Builds one representative score (mean) per detailed cluster and
/// clusters those representatives with `neighbor = merge_cluster_distance`
/// (spec §4.7.4 step 3), then reorders `hits` so each cluster's members
/// are contiguous and relabels cluster ids in that new order.
fn cross_cluster_merge(hits: &mut [RowHit], detailed: Vec<Cluster>, neighbor: usize, threshold: f32) -> Vec<Cluster> {
    let representatives: Vec<RowHit> = detailed
        .iter()
        .map(|c| {
            let slice = &hits[c.start..c.start + c.len];
            let mean = slice.iter().map(|h| h.score).sum::<f32>() / slice.len().max(1) as f32;
            RowHit { row_id: slice[0].row_id, score: mean }
        })
        .collect();

    let mut merge_into: Vec<usize> = (0..detailed.len()).collect();
    for i in 0..representatives.len() {
        let j_max = (i + neighbor.max(1)).min(representatives.len().saturating_sub(1));
        for j in (i + 1)..=j_max {
            let sim = 1.0 - (representatives[i].score - representatives[j].score).abs();
            if sim > threshold {
                merge_into[j] = merge_into[i];
            }
        }
    }

    let mut by_group: std::collections::BTreeMap<usize, Vec<usize>> = std::collections::BTreeMap::new();
    for (idx, &group) in merge_into.iter().enumerate() {
        by_group.entry(group).or_default().push(idx);
    }

    let mut reordered = Vec::with_capacity(hits.len());
    let mut out = Vec::new();
    for (new_id, members) in by_group.values().enumerate() {
        let start = reordered.len();
        for &m in members {
            let c = &detailed[m];
            reordered.extend_from_slice(&hits[c.start..c.start + c.len]);
        }
        out.push(Cluster { id: new_id, start, len: reordered.len() - start });
    }
    hits.copy_from_slice(&reordered);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rough_cluster_cuts_on_large_score_gap() {
        let mut hits = vec![
            RowHit { row_id: crate::core::types::RowId(1), score: 10.0 },
            RowHit { row_id: crate::core::types::RowId(2), score: 9.5 },
            RowHit { row_id: crate::core::types::RowId(3), score: 1.0 },
            RowHit { row_id: crate::core::types::RowId(4), score: 0.8 },
        ];
        let clusters = cluster_results(&mut hits, 100, 10, 0.9, true);
        assert!(clusters.len() >= 1);
        assert_eq!(clusters.iter().map(|c| c.len).sum::<usize>(), hits.len());
    }
}
