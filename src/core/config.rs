/// Thresholds and switches for the delayed-merge inverted engine (spec §6.3).
#[derive(Debug, Clone)]
pub struct InvertedConfig {
    pub insert_merge_file_size: u64,
    pub expunge_merge_file_size: u64,
    pub insert_merge_tuple_size: u64,
    pub expunge_merge_tuple_size: u64,
    pub is_async_merge: bool,
    pub merge_cluster_distance: usize,
    pub max_rough_cluster_count: usize,
    pub local_clustered_limit: Option<usize>,
}

impl Default for InvertedConfig {
    fn default() -> Self {
        InvertedConfig {
            insert_merge_file_size: 128 * 1024 * 1024,
            expunge_merge_file_size: 128 * 1024 * 1024,
            insert_merge_tuple_size: 0,
            expunge_merge_tuple_size: 0,
            is_async_merge: true,
            merge_cluster_distance: 10,
            max_rough_cluster_count: 100,
            local_clustered_limit: None,
        }
    }
}