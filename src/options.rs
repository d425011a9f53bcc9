#[derive(Debug, Clone, Copy)]
pub struct StoreOptions {
    /// `sync_data` every artifact and fsync the store directory on `write()`.
    pub fsync_writes: bool,
    /// Create the store directory in `VectorDb::new` when it is absent.
    pub create_dir: bool,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            fsync_writes: true,
            create_dir: true,
        }
    }
}
