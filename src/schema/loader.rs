//! Schema loader for collection schemas stored on disk
//!
//! - Schemas stored at `<schema_dir>/<collection>.json`
//! - One file per collection, holding the current version
//! - Registering the same version twice is rejected; a newer version replaces
//!   the older one (migration)

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::observability::{log_event, Event};

use super::errors::{SchemaError, SchemaResult};
use super::types::SchemaInfo;

/// Loads collection schemas from a directory and keeps them in memory.
pub struct SchemaLoader {
    /// Directory containing schema files
    schema_dir: PathBuf,
    /// Loaded schemas indexed by collection name
    schemas: HashMap<String, SchemaInfo>,
}

impl SchemaLoader {
    /// Creates a loader reading from the given directory.
    pub fn new(schema_dir: &Path) -> Self {
        Self {
            schema_dir: schema_dir.to_path_buf(),
            schemas: HashMap::new(),
        }
    }

    /// Returns the schema directory path.
    pub fn schema_dir(&self) -> &Path {
        &self.schema_dir
    }

    /// Loads all `*.json` schema files from the schema directory.
    ///
    /// A missing directory is treated as empty.
    pub fn load_all(&mut self) -> SchemaResult<()> {
        if !self.schema_dir.exists() {
            return Ok(());
        }

        let entries = fs::read_dir(&self.schema_dir)
            .map_err(|e| SchemaError::io(self.schema_dir.display().to_string(), e))?;

        for entry in entries {
            let entry =
                entry.map_err(|e| SchemaError::io(self.schema_dir.display().to_string(), e))?;
            let path = entry.path();

            if path.extension().map_or(true, |ext| ext != "json") {
                continue;
            }

            self.load_schema_file(&path)?;
        }

        let dir = self.schema_dir.display().to_string();
        let count = self.schemas.len().to_string();
        log_event(
            Event::SchemasLoaded,
            &[("count", count.as_str()), ("dir", dir.as_str())],
        );
        Ok(())
    }

    /// Loads a single schema file; the file stem is the collection name.
    fn load_schema_file(&mut self, path: &Path) -> SchemaResult<()> {
        let collection = path
            .file_stem()
            .and_then(|s| s.to_str())
            .ok_or_else(|| SchemaError::malformed(path.display().to_string(), "Invalid file name"))?
            .to_string();

        let content = fs::read_to_string(path)
            .map_err(|e| SchemaError::io(path.display().to_string(), e))?;

        let schema: SchemaInfo = serde_json::from_str(&content).map_err(|e| {
            SchemaError::malformed(path.display().to_string(), format!("Invalid JSON: {}", e))
        })?;

        schema.validate_structure()?;
        self.schemas.insert(collection, schema);
        Ok(())
    }

    /// Registers a schema for a collection.
    ///
    /// The version must be newer than any registered version.
    pub fn register(&mut self, collection: &str, schema: SchemaInfo) -> SchemaResult<()> {
        schema.validate_structure()?;

        if let Some(existing) = self.schemas.get(collection) {
            if existing.version >= schema.version {
                return Err(SchemaError::immutable(collection, existing.version));
            }
        }

        self.schemas.insert(collection.to_string(), schema);
        Ok(())
    }

    /// Gets the current schema of a collection.
    pub fn get(&self, collection: &str) -> Option<&SchemaInfo> {
        self.schemas.get(collection)
    }

    /// Returns the number of loaded schemas.
    pub fn schema_count(&self) -> usize {
        self.schemas.len()
    }

    /// Writes a collection schema to disk, replacing any older file.
    pub fn save_schema(&self, collection: &str, schema: &SchemaInfo) -> SchemaResult<PathBuf> {
        let path = self.schema_dir.join(format!("{}.json", collection));

        fs::create_dir_all(&self.schema_dir)
            .map_err(|e| SchemaError::io(self.schema_dir.display().to_string(), e))?;

        let content = serde_json::to_string_pretty(schema).map_err(|e| {
            SchemaError::malformed(path.display().to_string(), format!("Failed to serialize: {}", e))
        })?;

        fs::write(&path, content).map_err(|e| SchemaError::io(path.display().to_string(), e))?;

        Ok(path)
    }
}
