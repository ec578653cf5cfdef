use std::collections::HashMap;

use etl_types::entities::Item;
use parking_lot::Mutex;

/// The in-memory, item-type-keyed accumulator that couples jobs together
/// within one partition (§4.7).
///
/// Jobs only write to the bus from the synchronous portion of their code,
/// after their own batch executor has drained (§4.7, §5), so contention is
/// never expected in practice; the `Mutex` exists to make the memory
/// visibility guarantee explicit across worker threads rather than relying
/// on an informal happens-before argument.
#[derive(Debug, Default)]
pub struct ItemBus {
    buckets: Mutex<HashMap<&'static str, Vec<Item>>>,
}

impl ItemBus {
    /// Creates an empty bus. Equivalent to `open()` in the distilled spec's
    /// vocabulary: there is no separate handle to acquire.
    pub fn open() -> Self {
        ItemBus::default()
    }

    /// Appends one item into the bucket named by its type.
    pub fn export_item(&self, item: Item) {
        self.buckets
            .lock()
            .entry(item.type_name())
            .or_default()
            .push(item);
    }

    /// Appends a batch of items in one lock acquisition.
    pub fn export_items(&self, items: impl IntoIterator<Item = Item>) {
        let mut buckets = self.buckets.lock();
        for item in items {
            buckets.entry(item.type_name()).or_default().push(item);
        }
    }

    /// A snapshot of every item currently in the bucket named `type_name`.
    /// Returns an empty vector for an unknown or empty bucket.
    pub fn get_items(&self, type_name: &str) -> Vec<Item> {
        self.buckets
            .lock()
            .get(type_name)
            .cloned()
            .unwrap_or_default()
    }

    /// The number of items currently held in the bucket named `type_name`.
    pub fn len(&self, type_name: &str) -> usize {
        self.buckets
            .lock()
            .get(type_name)
            .map_or(0, std::vec::Vec::len)
    }

    /// Whether the bus holds no items at all.
    pub fn is_empty(&self) -> bool {
        self.buckets.lock().values().all(std::vec::Vec::is_empty)
    }

    /// Clears every bucket. Called once the partition completes (§4.11
    /// step 9); the bus itself is then dropped.
    pub fn close(&self) {
        self.buckets.lock().clear();
    }

    /// Empties the bucket named `type_name`, leaving every other bucket
    /// untouched. Used by enrichment (§4.3) to replace a bucket's contents
    /// in place: clear, then `export_items` the enriched/filtered set.
    pub fn clear(&self, type_name: &str) {
        if let Some(bucket) = self.buckets.lock().get_mut(type_name) {
            bucket.clear();
        }
    }
}
