pub const DEFAULT_MAX_MERGE_DEFERRALS: u8 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    /// How many times a discovery sub-batch may be deferred behind a locked
    /// host before it is dropped.
    pub max_merge_deferrals: u8,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_merge_deferrals: DEFAULT_MAX_MERGE_DEFERRALS,
        }
    }
}
