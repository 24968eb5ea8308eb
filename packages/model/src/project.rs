//! # Project
//!
//! Container of presentations and the entry point for XUK files.

use crate::error::{ModelError, ModelResult};
use crate::options::XukOptions;
use crate::presentation::Presentation;
use crate::xuk::{self, NoProgress, ProgressObserver};
use crate::ValueEquals;
use std::fs;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::PathBuf;
use tempfile::NamedTempFile;
use tracing::{info, instrument};
use url::Url;

#[derive(Debug, Default)]
pub struct Project {
    presentations: Vec<Presentation>,
    options: XukOptions,
}

impl Project {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: XukOptions) -> Self {
        Self {
            presentations: Vec::new(),
            options,
        }
    }

    pub fn options(&self) -> &XukOptions {
        &self.options
    }

    pub fn set_options(&mut self, options: XukOptions) {
        self.options = options;
    }

    /// Create a presentation with default factories and append it.
    pub fn add_new_presentation(&mut self, root_uri: Url) -> ModelResult<&mut Presentation> {
        let mut presentation = Presentation::new(root_uri);
        presentation.install_default_factories();
        presentation
            .data_providers_mut()
            .set_data_directory(self.options.data_directory.clone())?;
        self.presentations.push(presentation);
        let index = self.presentations.len() - 1;
        Ok(&mut self.presentations[index])
    }

    pub fn presentations(&self) -> &[Presentation] {
        &self.presentations
    }

    pub fn presentations_mut(&mut self) -> impl Iterator<Item = &mut Presentation> {
        self.presentations.iter_mut()
    }

    pub fn presentation(&self, index: usize) -> ModelResult<&Presentation> {
        let count = self.presentations.len();
        self.presentations
            .get(index)
            .ok_or(ModelError::index_out_of_bounds(index, count))
    }

    pub fn presentation_mut(&mut self, index: usize) -> ModelResult<&mut Presentation> {
        let count = self.presentations.len();
        self.presentations
            .get_mut(index)
            .ok_or(ModelError::index_out_of_bounds(index, count))
    }

    pub fn remove_presentation(&mut self, index: usize) -> ModelResult<Presentation> {
        if index >= self.presentations.len() {
            return Err(ModelError::index_out_of_bounds(index, self.presentations.len()));
        }
        Ok(self.presentations.remove(index))
    }

    pub fn len(&self) -> usize {
        self.presentations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.presentations.is_empty()
    }

    /// Replace the presentations with those read from a XUK stream.
    ///
    /// On failure the project is left untouched. Errors other than
    /// cancellation are reported as deserialization failures.
    #[instrument(skip_all, fields(base = %base_uri))]
    pub fn read_xuk<R: BufRead>(
        &mut self,
        input: R,
        base_uri: &Url,
        progress: &mut dyn ProgressObserver,
    ) -> ModelResult<()> {
        let presentations = xuk::read_project(input, base_uri, progress).map_err(|err| match err {
            ModelError::Cancelled | ModelError::Deserialization(_) => err,
            other => ModelError::deserialization(other),
        })?;
        info!(presentations = presentations.len(), "loaded project");
        self.presentations = presentations;
        Ok(())
    }

    /// Write every presentation as a XUK document. Root URIs are written
    /// relative to `base_uri` when possible.
    #[instrument(skip_all, fields(base = %base_uri))]
    pub fn write_xuk<W: Write>(
        &self,
        output: W,
        base_uri: &Url,
        progress: &mut dyn ProgressObserver,
    ) -> ModelResult<()> {
        xuk::write_project(self, output, base_uri, &self.options, progress).map_err(|err| match err {
            ModelError::Cancelled | ModelError::Serialization(_) => err,
            other => ModelError::serialization(other),
        })?;
        info!(presentations = self.presentations.len(), "saved project");
        Ok(())
    }

    pub fn open_xuk(&mut self, uri: &Url) -> ModelResult<()> {
        let path = file_path(uri)?;
        let file = fs::File::open(&path)?;
        self.read_xuk(BufReader::new(file), uri, &mut NoProgress)
    }

    pub fn save_xuk(&self, uri: &Url) -> ModelResult<()> {
        self.save_xuk_with_progress(uri, &mut NoProgress)
    }

    /// Save to a file. The document goes to a temporary file in the target's
    /// directory which replaces the target only once it is complete, so a
    /// failed or cancelled write leaves an existing file intact.
    pub fn save_xuk_with_progress(&self, uri: &Url, progress: &mut dyn ProgressObserver) -> ModelResult<()> {
        let path = file_path(uri)?;
        let dir = path
            .parent()
            .ok_or_else(|| ModelError::invalid_uri(uri.as_str(), "no parent directory"))?;

        let mut output = BufWriter::new(NamedTempFile::new_in(dir)?);
        self.write_xuk(&mut output, uri, progress)?;
        let file = output.into_inner().map_err(|err| err.into_error())?;
        file.persist(&path).map_err(|err| err.error)?;
        Ok(())
    }
}

fn file_path(uri: &Url) -> ModelResult<PathBuf> {
    uri.to_file_path()
        .map_err(|_| ModelError::invalid_uri(uri.as_str(), "not a local file location"))
}

impl ValueEquals for Project {
    fn value_equals(&self, other: &Self) -> bool {
        self.presentations.len() == other.presentations.len()
            && self
                .presentations
                .iter()
                .zip(&other.presentations)
                .all(|(a, b)| a.value_equals(b))
    }
}
