use crate::model::batch::{global_index, BatchEntry, BatchPlan};
use std::collections::BTreeMap;

/// Splits `item_count` ordered items into contiguous batches.
///
/// `batch_size == 0` means no batching: a single batch with id 0 spanning every
/// item, and the plan's stride becomes the item count.
pub fn define_batches(item_count: usize, batch_size: usize) -> BatchPlan {
    let mut batches = BTreeMap::new();

    if item_count == 0 {
        return BatchPlan {
            batch_size,
            batches,
        };
    }

    let stride = if batch_size == 0 { item_count } else { batch_size };

    let full_batches = item_count / stride;
    let partial = item_count % stride;

    for id in 0..full_batches {
        batches.insert(
            id,
            BatchEntry {
                start_index: global_index(stride, id, 0),
                end_index: global_index(stride, id, stride - 1),
                processed: false,
            },
        );
    }

    if partial > 0 {
        let start = global_index(stride, full_batches, 0);
        batches.insert(
            full_batches,
            BatchEntry {
                start_index: start,
                end_index: start + partial - 1,
                processed: false,
            },
        );
    }

    BatchPlan {
        batch_size: stride,
        batches,
    }
}
