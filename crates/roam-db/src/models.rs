/// Row of the `kv_cache` table. `value` holds the JSON payload verbatim,
/// mirroring what a browser keeps in local storage.
pub struct CacheRow {
    pub key: String,
    pub value: String,
    pub updated_at: String,
}
