use std::collections::{BTreeMap, HashMap};
use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::Path;

use tracing::info;

use super::StoreError;
use crate::records::Document;

/// On-disk layout: collection name → documents.
pub type Collections = HashMap<String, Vec<Document>>;

/// Load seed collections from a JSON file
pub fn load_collections(path: impl AsRef<Path>) -> Result<Collections, StoreError> {
    let path = path.as_ref();
    let mut file = File::open(path)
        .map_err(|e| StoreError::Persistence(format!("Failed to open seed file {}: {}", path.display(), e)))?;

    let mut buffer = Vec::new();
    file.read_to_end(&mut buffer)
        .map_err(|e| StoreError::Persistence(format!("Failed to read seed file: {}", e)))?;

    let collections: Collections = serde_json::from_slice(&buffer)
        .map_err(|e| StoreError::Persistence(format!("Failed to deserialize seed file: {}", e)))?;

    info!(
        path = %path.display(),
        collections = collections.len(),
        documents = collections.values().map(Vec::len).sum::<usize>(),
        "Loaded seed collections"
    );
    Ok(collections)
}

/// Save collections to disk, replacing the target atomically
pub fn save_collections(path: impl AsRef<Path>, collections: &Collections) -> Result<(), StoreError> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .map_err(|e| StoreError::Persistence(format!("Failed to create directory: {}", e)))?;
    }

    // stable key order keeps dumps diffable
    let ordered: BTreeMap<&String, &Vec<Document>> = collections.iter().collect();
    let serialized = serde_json::to_vec_pretty(&ordered)
        .map_err(|e| StoreError::Persistence(format!("Serialization failed: {}", e)))?;

    let temp_path = path.with_extension("tmp");
    let mut file = File::create(&temp_path)
        .map_err(|e| StoreError::Persistence(format!("Failed to create file: {}", e)))?;

    file.write_all(&serialized)
        .map_err(|e| StoreError::Persistence(format!("Failed to write data: {}", e)))?;

    file.sync_all()
        .map_err(|e| StoreError::Persistence(format!("Failed to sync data: {}", e)))?;

    fs::rename(&temp_path, path)
        .map_err(|e| StoreError::Persistence(format!("Failed to rename file: {}", e)))?;

    Ok(())
}
