pub mod cleanup;
pub mod info;
pub mod roundtrip;
pub mod validate;

pub use cleanup::{cleanup, CleanupArgs};
pub use info::{info, InfoArgs};
pub use roundtrip::{roundtrip, RoundtripArgs};
pub use validate::{validate, ValidateArgs};

use anyhow::{anyhow, Result};
use std::path::{Path, PathBuf};
use url::Url;
use xuk_model::Project;

use crate::config::Config;

fn absolute(path: &Path, cwd: &str) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        PathBuf::from(cwd).join(path)
    }
}

/// Absolute `file:` URL for a path given on the command line.
pub(crate) fn file_url(path: &Path, cwd: &str) -> Result<Url> {
    let absolute = absolute(path, cwd);
    Url::from_file_path(&absolute)
        .map_err(|_| anyhow!("Cannot turn {} into a file URL", absolute.display()))
}

/// Open a XUK document with the configured options.
pub(crate) fn open(path: &Path, cwd: &str, config: &Config) -> Result<(Project, Url)> {
    if !absolute(path, cwd).is_file() {
        return Err(anyhow!("Input file does not exist: {}", path.display()));
    }
    let uri = file_url(path, cwd)?;
    let mut project = Project::with_options(config.xuk.clone());
    project.open_xuk(&uri)?;
    Ok((project, uri))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_url_resolves_relative_paths() {
        let url = file_url(Path::new("book/book.xuk"), "/tmp/work").unwrap();
        assert_eq!(url.as_str(), "file:///tmp/work/book/book.xuk");

        let url = file_url(Path::new("/data/a.xuk"), "/tmp/work").unwrap();
        assert_eq!(url.as_str(), "file:///data/a.xuk");
    }

    #[test]
    fn test_open_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let cwd = dir.path().display().to_string();
        let err = open(Path::new("missing.xuk"), &cwd, &Config::default()).unwrap_err();
        assert!(err.to_string().contains("does not exist"));
    }

    fn saved_book(dir: &tempfile::TempDir) -> PathBuf {
        let path = dir.path().join("book.xuk");
        let mut project = Project::new();
        let p = project
            .add_new_presentation(Url::from_directory_path(dir.path()).unwrap())
            .unwrap();
        let text = p
            .channels_mut()
            .add_channel("text", xuk_model::ChannelKind::Text)
            .unwrap();
        let root = p.root_node().unwrap();
        p.set_media(root, text, xuk_model::Media::text("Moby Dick")).unwrap();
        project.save_xuk(&Url::from_file_path(&path).unwrap()).unwrap();
        path
    }

    #[test]
    fn test_commands_on_saved_book() {
        let dir = tempfile::tempdir().unwrap();
        let cwd = dir.path().display().to_string();
        let config = Config::default();
        let input = saved_book(&dir);

        validate(ValidateArgs { input: input.clone() }, &cwd, &config).unwrap();
        info(
            InfoArgs { input: input.clone(), format: Some(crate::config::OutputFormat::Json) },
            &cwd,
            &config,
        )
        .unwrap();

        roundtrip(
            RoundtripArgs { input: input.clone(), output: Some(PathBuf::from("copy.xuk")) },
            &cwd,
            &config,
        )
        .unwrap();
        assert!(dir.path().join("copy.xuk").is_file());

        cleanup(CleanupArgs { input: input.clone(), output: None }, &cwd, &config).unwrap();
        let (project, _) = open(&input, &cwd, &config).unwrap();
        assert_eq!(project.len(), 1);
    }
}
