//! Segmentation planner for read/write batches.
//!
//! The protocol caps each request at the negotiated PDU length, so a user
//! batch must be split across several request PDUs. The planner is pure: it
//! maps per-item element counts to groups of split descriptors, and the
//! client copies response fragments back into the caller's buffers using the
//! `(index, split_offset, ripe_size)` triples.

/// One planned fragment of a source item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ComItem {
    /// Index of the source item this fragment belongs to
    pub index: usize,
    /// Original size of the source item
    pub raw_size: usize,
    /// Offset of this fragment within the source item
    pub split_offset: usize,
    /// Size of this fragment
    pub ripe_size: usize,
    /// Fixed per-fragment overhead counted against the group budget
    pub extra_size: usize,
    /// Minimum budget charge for the fragment (reads only)
    pub threshold: usize,
}

impl ComItem {
    /// Budget charge of the fragment: payload plus overhead, at least the
    /// threshold.
    pub fn total_length(&self) -> usize {
        (self.ripe_size + self.extra_size).max(self.threshold)
    }
}

/// A group of fragments that fits into a single request PDU.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ComGroup {
    pub items: Vec<ComItem>,
}

/// Plan a read batch: `target_size` is the per-PDU payload budget,
/// `extra_size` the per-fragment overhead, `threshold` the minimum charge per
/// fragment.
pub fn plan_read(
    src: &[u16],
    target_size: usize,
    extra_size: usize,
    threshold: usize,
) -> Vec<ComGroup> {
    recombine(src, target_size, extra_size, threshold)
}

/// Plan a write batch; writes have a larger per-fragment overhead and no
/// threshold.
pub fn plan_write(src: &[u16], target_size: usize, extra_size: usize) -> Vec<ComGroup> {
    recombine(src, target_size, extra_size, 0)
}

/// Walk the items in order, placing as much of each remaining count as fits
/// into the current group and opening a new group whenever the running sum
/// comes within `extra_size.max(threshold)` of the budget.
fn recombine(src: &[u16], target_size: usize, extra_size: usize, threshold: usize) -> Vec<ComGroup> {
    let split_at = extra_size.max(threshold);
    debug_assert!(target_size > split_at, "target budget below item overhead");

    let mut groups = vec![ComGroup::default()];
    let mut sum = 0usize;
    for (index, &raw) in src.iter().enumerate() {
        let raw_size = raw as usize;
        let mut number = raw_size;
        let mut offset = 0usize;
        while number > 0 {
            let capacity = target_size.saturating_sub(sum + extra_size);
            let ripe_size = number.min(capacity);
            let item = ComItem {
                index,
                raw_size,
                split_offset: offset,
                ripe_size,
                extra_size,
                threshold,
            };
            sum += item.total_length();
            number -= ripe_size;
            offset += ripe_size;
            if let Some(group) = groups.last_mut() {
                group.items.push(item);
            }
            if sum + split_at >= target_size {
                groups.push(ComGroup::default());
                sum = 0;
            }
        }
    }
    groups.retain(|g| !g.items.is_empty());
    groups
}

#[cfg(test)]
mod tests {
    use super::*;

    fn check_invariants(groups: &[ComGroup], src: &[u16], target_size: usize) {
        // every group stays within the budget
        for group in groups {
            let total: usize = group.items.iter().map(ComItem::total_length).sum();
            assert!(
                total <= target_size,
                "group charge {total} exceeds target {target_size}"
            );
        }
        // fragments cover each source item exactly, in increasing offsets
        for (index, &raw) in src.iter().enumerate() {
            let mut covered = 0usize;
            let mut last_offset = None;
            for group in groups {
                for item in group.items.iter().filter(|i| i.index == index) {
                    assert_eq!(item.split_offset, covered, "gap in item {index}");
                    if let Some(prev) = last_offset {
                        assert!(item.split_offset > prev, "offsets not increasing");
                    }
                    last_offset = Some(item.split_offset);
                    covered += item.ripe_size;
                }
            }
            assert_eq!(covered, raw as usize, "item {index} not fully covered");
        }
    }

    #[test]
    fn small_batch_fits_one_group() {
        let src = [4, 2, 1];
        let groups = plan_read(&src, 226, 5, 12);
        assert_eq!(groups.len(), 1);
        check_invariants(&groups, &src, 226);
    }

    #[test]
    fn large_item_splits_across_groups() {
        let src = [1000];
        let groups = plan_read(&src, 226, 5, 12);
        assert!(groups.len() >= 5);
        check_invariants(&groups, &src, 226);
    }

    #[test]
    fn read_batch_of_fifty_items_splits_like_the_negotiated_pdu() {
        // 50 items of 30 bytes against PDU 240: target = 240 - 14 = 226
        let src = [30u16; 50];
        let groups = plan_read(&src, 240 - 14, 5, 12);
        assert!(groups.len() >= 7, "got {} groups", groups.len());
        check_invariants(&groups, &src, 226);
    }

    #[test]
    fn write_batch_uses_write_overhead() {
        let src = [100u16, 200, 50, 1];
        let groups = plan_write(&src, 240 - 12, 17);
        check_invariants(&groups, &src, 228);
    }

    #[test]
    fn zero_count_items_produce_no_fragments() {
        let src = [0u16, 3];
        let groups = plan_read(&src, 226, 5, 12);
        assert_eq!(groups.len(), 1);
        assert!(groups[0].items.iter().all(|i| i.index == 1));
        check_invariants(&groups, &src, 226);
    }

    #[test]
    fn budget_edge_cases_hold_across_sizes() {
        for target in [18usize, 40, 100, 226, 948] {
            for src in [vec![1u16], vec![17, 3, 900], vec![5; 40]] {
                let groups = plan_read(&src, target, 5, 12);
                check_invariants(&groups, &src, target);
                let groups = plan_write(&src, target, 17);
                check_invariants(&groups, &src, target);
            }
        }
    }
}
