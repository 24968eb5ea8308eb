//! # Data Providers
//!
//! File-backed storage for raw media payloads. A [`FileDataProvider`] names a
//! file below the presentation's data directory; the bytes themselves are
//! never held in memory by the model.
//!
//! Streams are scoped: [`InputStream`] and [`OutputStream`] keep their
//! provider marked as open until dropped, and deleting a provider with an
//! open stream is rejected.

use crate::error::{ModelError, ModelResult};
use crate::ids::{DataProviderId, PresentationId};
use crate::ValueEquals;
use indexmap::IndexMap;
use std::cell::Cell;
use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::rc::Rc;
use tracing::debug;

pub const DEFAULT_DATA_DIRECTORY: &str = "Data";

/// Concrete data provider kinds known to the factory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataProviderKind {
    File,
}

#[derive(Debug, Clone)]
pub struct FileDataProvider {
    id: DataProviderId,
    relative_path: String,
    mime_type: String,
    open_streams: Rc<Cell<usize>>,
}

impl FileDataProvider {
    pub fn id(&self) -> DataProviderId {
        self.id
    }

    /// Path relative to the manager's data directory.
    pub fn relative_path(&self) -> &str {
        &self.relative_path
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn open_stream_count(&self) -> usize {
        self.open_streams.get()
    }
}

struct StreamGuard(Rc<Cell<usize>>);

impl StreamGuard {
    fn new(counter: &Rc<Cell<usize>>) -> Self {
        counter.set(counter.get() + 1);
        Self(Rc::clone(counter))
    }
}

impl Drop for StreamGuard {
    fn drop(&mut self) {
        self.0.set(self.0.get().saturating_sub(1));
    }
}

/// Read access to a provider's payload. Closing is dropping.
pub struct InputStream {
    file: File,
    _guard: StreamGuard,
}

impl Read for InputStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.file.read(buf)
    }
}

/// Write access to a provider's payload. Truncates on open.
pub struct OutputStream {
    file: File,
    _guard: StreamGuard,
}

impl Write for OutputStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.file.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

#[derive(Debug)]
pub struct DataProviderManager {
    presentation: PresentationId,
    data_directory: String,
    base_path: Option<PathBuf>,
    providers: IndexMap<DataProviderId, FileDataProvider>,
    next_index: usize,
}

impl DataProviderManager {
    pub(crate) fn new(presentation: PresentationId) -> Self {
        Self {
            presentation,
            data_directory: DEFAULT_DATA_DIRECTORY.to_string(),
            base_path: None,
            providers: IndexMap::new(),
            next_index: 0,
        }
    }

    /// Directory name, relative to the presentation root, holding the files.
    pub fn data_directory(&self) -> &str {
        &self.data_directory
    }

    pub fn set_data_directory(&mut self, directory: impl Into<String>) -> ModelResult<()> {
        let directory = directory.into();
        if directory.trim().is_empty() {
            return Err(ModelError::MissingArgument("data directory"));
        }
        self.data_directory = directory;
        Ok(())
    }

    /// Local directory of the presentation root, when it is a file location.
    pub(crate) fn set_base_path(&mut self, base: Option<PathBuf>) {
        self.base_path = base;
    }

    /// Absolute path of the data directory, if the root is on the file system.
    pub fn data_directory_path(&self) -> Option<PathBuf> {
        self.base_path.as_ref().map(|b| b.join(&self.data_directory))
    }

    /// Register a new provider with a fresh, unused file name.
    pub fn create_file_data_provider(&mut self, mime_type: impl Into<String>) -> ModelResult<DataProviderId> {
        let mime_type = mime_type.into();
        if mime_type.is_empty() {
            return Err(ModelError::MissingArgument("mime type"));
        }
        let relative_path = self.allocate_file_name(extension_for(&mime_type));
        let id = self.reserve();
        self.insert_reserved(id, relative_path, mime_type)?;
        Ok(id)
    }

    pub(crate) fn reserve(&mut self) -> DataProviderId {
        let id = DataProviderId::new(self.presentation, self.next_index);
        self.next_index += 1;
        id
    }

    pub(crate) fn insert_reserved(
        &mut self,
        id: DataProviderId,
        relative_path: String,
        mime_type: String,
    ) -> ModelResult<()> {
        if relative_path.is_empty() {
            return Err(ModelError::MissingArgument("data file relative path"));
        }
        if self.providers.values().any(|p| p.relative_path == relative_path) {
            return Err(ModelError::DuplicateUid(relative_path));
        }
        self.providers.insert(
            id,
            FileDataProvider {
                id,
                relative_path,
                mime_type,
                open_streams: Rc::new(Cell::new(0)),
            },
        );
        Ok(())
    }

    pub fn get(&self, id: DataProviderId) -> ModelResult<&FileDataProvider> {
        self.providers
            .get(&id)
            .ok_or_else(|| ModelError::DataProviderNotFound(id.to_string()))
    }

    pub fn contains(&self, id: DataProviderId) -> bool {
        self.providers.contains_key(&id)
    }

    pub fn data_providers(&self) -> impl Iterator<Item = &FileDataProvider> {
        self.providers.values()
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    pub fn position(&self, id: DataProviderId) -> Option<usize> {
        self.providers.get_index_of(&id)
    }

    /// Absolute file path of a provider.
    pub fn path_of(&self, id: DataProviderId) -> ModelResult<PathBuf> {
        let provider = self.get(id)?;
        let dir = self
            .data_directory_path()
            .ok_or(ModelError::NotInitialized("data directory"))?;
        Ok(dir.join(&provider.relative_path))
    }

    pub fn open_input_stream(&self, id: DataProviderId) -> ModelResult<InputStream> {
        let path = self.path_of(id)?;
        let provider = self.get(id)?;
        let file = File::open(&path)?;
        Ok(InputStream {
            file,
            _guard: StreamGuard::new(&provider.open_streams),
        })
    }

    pub fn open_output_stream(&self, id: DataProviderId) -> ModelResult<OutputStream> {
        let path = self.path_of(id)?;
        let provider = self.get(id)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = File::create(&path)?;
        Ok(OutputStream {
            file,
            _guard: StreamGuard::new(&provider.open_streams),
        })
    }

    /// Unregister a provider and remove its file. Fails while a stream is open.
    pub fn delete(&mut self, id: DataProviderId) -> ModelResult<()> {
        let provider = self.get(id)?;
        if provider.open_streams.get() > 0 {
            return Err(ModelError::DataProviderInUse(id.to_string()));
        }
        if let Some(dir) = self.data_directory_path() {
            remove_if_exists(&dir.join(&provider.relative_path))?;
        }
        debug!(provider = %id, "deleted data provider");
        self.providers.shift_remove(&id);
        Ok(())
    }

    /// Duplicate a provider's bytes into a fresh provider of this manager.
    pub fn copy_data_provider(&mut self, id: DataProviderId) -> ModelResult<DataProviderId> {
        let mime_type = self.get(id)?.mime_type.clone();
        let copy = self.create_file_data_provider(mime_type)?;
        let mut input = self.open_input_stream(id)?;
        let mut output = self.open_output_stream(copy)?;
        io::copy(&mut input, &mut output)?;
        output.flush()?;
        Ok(copy)
    }

    /// Copy a provider owned by another presentation into this manager.
    pub fn import(&mut self, source: &DataProviderManager, id: DataProviderId) -> ModelResult<DataProviderId> {
        let mime_type = source.get(id)?.mime_type.clone();
        let copy = self.create_file_data_provider(mime_type)?;
        let path = source.path_of(id)?;
        if path.exists() {
            let mut input = source.open_input_stream(id)?;
            let mut output = self.open_output_stream(copy)?;
            io::copy(&mut input, &mut output)?;
            output.flush()?;
        }
        Ok(copy)
    }

    fn allocate_file_name(&self, extension: &str) -> String {
        let dir = self.data_directory_path();
        let mut counter = self.next_index;
        loop {
            let name = format!("{counter:06}.{extension}");
            let taken_here = self.providers.values().any(|p| p.relative_path == name);
            let taken_on_disk = dir.as_ref().is_some_and(|d| d.join(&name).exists());
            if !taken_here && !taken_on_disk {
                return name;
            }
            counter += 1;
        }
    }
}

impl ValueEquals for DataProviderManager {
    fn value_equals(&self, other: &Self) -> bool {
        self.data_directory == other.data_directory
            && self.providers.len() == other.providers.len()
            && self
                .providers
                .values()
                .zip(other.providers.values())
                .all(|(a, b)| a.relative_path == b.relative_path && a.mime_type == b.mime_type)
    }
}

fn extension_for(mime_type: &str) -> &'static str {
    match mime_type {
        "audio/x-wav" | "audio/wav" => "wav",
        "audio/mpeg" => "mp3",
        "audio/mp4" => "mp4",
        "image/png" => "png",
        "image/jpeg" => "jpg",
        "text/plain" => "txt",
        _ => "bin",
    }
}

fn remove_if_exists(path: &Path) -> ModelResult<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager(dir: &Path) -> DataProviderManager {
        let mut manager = DataProviderManager::new(PresentationId::next());
        manager.set_base_path(Some(dir.to_path_buf()));
        manager
    }

    #[test]
    fn test_write_read_and_delete() {
        let dir = tempfile::tempdir().unwrap();
        let mut providers = manager(dir.path());
        let id = providers.create_file_data_provider("audio/x-wav").unwrap();
        assert!(providers.get(id).unwrap().relative_path().ends_with(".wav"));

        {
            let mut out = providers.open_output_stream(id).unwrap();
            out.write_all(b"RIFF").unwrap();
        }
        let mut bytes = Vec::new();
        providers
            .open_input_stream(id)
            .unwrap()
            .read_to_end(&mut bytes)
            .unwrap();
        assert_eq!(bytes, b"RIFF");

        let path = providers.path_of(id).unwrap();
        assert!(path.exists());
        providers.delete(id).unwrap();
        assert!(!path.exists());
        assert!(providers.is_empty());
    }

    #[test]
    fn test_delete_with_open_stream_fails() {
        let dir = tempfile::tempdir().unwrap();
        let mut providers = manager(dir.path());
        let id = providers.create_file_data_provider("audio/x-wav").unwrap();

        let stream = providers.open_output_stream(id).unwrap();
        assert_eq!(providers.get(id).unwrap().open_stream_count(), 1);
        assert!(matches!(
            providers.delete(id),
            Err(ModelError::DataProviderInUse(_))
        ));

        drop(stream);
        providers.delete(id).unwrap();
    }

    #[test]
    fn test_copy_duplicates_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let mut providers = manager(dir.path());
        let id = providers.create_file_data_provider("text/plain").unwrap();
        providers
            .open_output_stream(id)
            .unwrap()
            .write_all(b"hello")
            .unwrap();

        let copy = providers.copy_data_provider(id).unwrap();
        assert_ne!(
            providers.get(copy).unwrap().relative_path(),
            providers.get(id).unwrap().relative_path()
        );
        let contents = fs::read(providers.path_of(copy).unwrap()).unwrap();
        assert_eq!(contents, b"hello");
    }

    #[test]
    fn test_without_base_path_streams_fail() {
        let mut providers = DataProviderManager::new(PresentationId::next());
        let id = providers.create_file_data_provider("audio/x-wav").unwrap();
        assert!(matches!(
            providers.open_input_stream(id),
            Err(ModelError::NotInitialized(_))
        ));
        // No file to remove, so delete still succeeds
        providers.delete(id).unwrap();
    }
}
