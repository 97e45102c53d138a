//! Server-side document storage.
//!
//! Stores one document per user in the following structure:
//! ```text
//! <DATA_DIR>/
//!   <user_id>/
//!     document.json
//! ```
//!
//! Writes go to a temp file that is renamed into place, so a reader sees
//! either the old or the new document. Concurrent writers race; the last
//! rename wins.

use nutrisync_core::RemoteDocument;
use std::fs;
use std::io;
use std::path::PathBuf;

const DOCUMENT_FILE: &str = "document.json";

/// Errors that can occur during server storage operations.
#[derive(Debug)]
pub enum ServerStorageError {
    /// I/O error reading or writing a file.
    IoError(PathBuf, io::Error),
    /// A stored document could not be decoded.
    CorruptDocument(PathBuf, String),
    /// Invalid user ID (e.g., contains path separators).
    InvalidUserId(String),
}

impl std::fmt::Display for ServerStorageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ServerStorageError::IoError(path, e) => {
                write!(f, "I/O error for {}: {}", path.display(), e)
            }
            ServerStorageError::CorruptDocument(path, e) => {
                write!(f, "Failed to load document {}: {}", path.display(), e)
            }
            ServerStorageError::InvalidUserId(id) => {
                write!(f, "Invalid user ID: {}", id)
            }
        }
    }
}

impl std::error::Error for ServerStorageError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ServerStorageError::IoError(_, e) => Some(e),
            _ => None,
        }
    }
}

/// Per-user document storage on the local filesystem.
#[derive(Debug, Clone)]
pub struct ServerStorage {
    data_dir: PathBuf,
}

impl ServerStorage {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    /// Validates a user ID to prevent path traversal attacks.
    fn validate_user_id(user_id: &str) -> Result<(), ServerStorageError> {
        if user_id.is_empty()
            || user_id.contains('/')
            || user_id.contains('\\')
            || user_id.contains("..")
            || user_id.starts_with('.')
        {
            return Err(ServerStorageError::InvalidUserId(user_id.to_string()));
        }
        Ok(())
    }

    fn user_dir(&self, user_id: &str) -> PathBuf {
        self.data_dir.join(user_id)
    }

    fn doc_path(&self, user_id: &str) -> PathBuf {
        self.user_dir(user_id).join(DOCUMENT_FILE)
    }

    /// Loads a user's document.
    ///
    /// Returns `Ok(None)` if the user has never stored one.
    pub fn load(&self, user_id: &str) -> Result<Option<RemoteDocument>, ServerStorageError> {
        Self::validate_user_id(user_id)?;

        let path = self.doc_path(user_id);
        let contents = match fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(ServerStorageError::IoError(path, e)),
        };

        serde_json::from_str(&contents)
            .map(Some)
            .map_err(|e| ServerStorageError::CorruptDocument(path, e.to_string()))
    }

    /// Replaces a user's document.
    ///
    /// Creates the user directory if it doesn't exist.
    pub fn save(&self, user_id: &str, document: &RemoteDocument) -> Result<(), ServerStorageError> {
        Self::validate_user_id(user_id)?;

        let user_dir = self.user_dir(user_id);
        let path = self.doc_path(user_id);

        fs::create_dir_all(&user_dir)
            .map_err(|e| ServerStorageError::IoError(user_dir.clone(), e))?;

        let json = serde_json::to_string(document)
            .map_err(|e| ServerStorageError::CorruptDocument(path.clone(), e.to_string()))?;

        // Write atomically using temp file + rename
        let temp_path = path.with_extension("json.tmp");
        fs::write(&temp_path, json)
            .map_err(|e| ServerStorageError::IoError(temp_path.clone(), e))?;
        fs::rename(&temp_path, &path).map_err(|e| ServerStorageError::IoError(path, e))?;

        Ok(())
    }
}
