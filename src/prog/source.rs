//! Optional per-file source listings used by backtraces and the debugger.
//!
//! Listings are best effort. A path the provider cannot open produces an
//! empty listing and a warning, never a failed load.

use std::fs;
use std::io::{self, Read, Seek};
use std::path::{Path, PathBuf};

use tracing::warn;

use crate::container::LoadResult;
use crate::container::reader::{ContainerReader, ContainerSeek, try_vec};

/// Fetches the text of a source file named inside a module.
pub trait SourceProvider: Send + Sync {
    fn read_source(&self, path: &str) -> io::Result<String>;
}

/// Reads listings from the local filesystem, optionally below a root directory.
#[derive(Clone, Debug, Default)]
pub struct FsSourceProvider {
    root: Option<PathBuf>,
}

impl FsSourceProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rooted(root: impl Into<PathBuf>) -> Self {
        Self {
            root: Some(root.into()),
        }
    }

    fn resolve(&self, path: &str) -> PathBuf {
        match &self.root {
            Some(root) if Path::new(path).is_relative() => root.join(path),
            _ => PathBuf::from(path),
        }
    }
}

impl SourceProvider for FsSourceProvider {
    fn read_source(&self, path: &str) -> io::Result<String> {
        let bytes = fs::read(self.resolve(path))?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SourceListing {
    pub path: String,
    lines: Vec<String>,
    found: bool,
}

impl SourceListing {
    pub fn missing(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            lines: Vec::new(),
            found: false,
        }
    }

    pub fn from_text(path: impl Into<String>, text: &str) -> Self {
        let lines = text
            .lines()
            .map(|line| line.trim_matches(is_blank).to_owned())
            .collect();
        Self {
            path: path.into(),
            lines,
            found: true,
        }
    }

    pub fn fetch(path: &str, provider: &dyn SourceProvider) -> Self {
        match provider.read_source(path) {
            Ok(text) => Self::from_text(path, &text),
            Err(err) => {
                warn!(path, error = %err, "source listing not found");
                Self::missing(path)
            }
        }
    }

    /// Line `line`, counted from 1 like compiler diagnostics.
    pub fn line(&self, line: usize) -> Option<&str> {
        line.checked_sub(1)
            .and_then(|index| self.lines.get(index))
            .map(String::as_str)
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn was_found(&self) -> bool {
        self.found
    }

    /// Reads the `count` length-prefixed paths of the source-file table.
    pub fn read_paths<R: Read + Seek>(
        reader: &mut ContainerReader<R>,
        offset: u32,
        count: u32,
    ) -> LoadResult<Vec<String>> {
        if count == 0 {
            return Ok(Vec::new());
        }
        reader.seek(ContainerSeek::Start(offset))?;
        reader.ensure_available(count as u64 * 4)?;
        let mut paths = try_vec(reader.phase(), count as usize)?;
        for _ in 0..count {
            let len = reader.read_u32()?;
            paths.push(reader.read_name(len as usize)?);
        }
        Ok(paths)
    }
}

fn is_blank(c: char) -> bool {
    matches!(c, ' ' | '\n' | '\r' | '\t')
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    struct NoFiles;

    impl SourceProvider for NoFiles {
        fn read_source(&self, _path: &str) -> io::Result<String> {
            Err(io::Error::from(io::ErrorKind::NotFound))
        }
    }

    #[test]
    fn lines_are_trimmed_on_both_ends() {
        let listing = SourceListing::from_text("a.prg", "  PROCESS main()\t\r\n\tsay(1);  \n");
        assert_eq!(listing.line(1), Some("PROCESS main()"));
        assert_eq!(listing.line(2), Some("say(1);"));
        assert_eq!(listing.line(0), None, "lines count from one");
        assert_eq!(listing.line(3), None);
    }

    #[test]
    fn missing_files_give_an_empty_listing() {
        let listing = SourceListing::fetch("gone.prg", &NoFiles);
        assert!(listing.is_empty());
        assert!(!listing.was_found());
        assert_eq!(listing.path, "gone.prg");
    }

    #[test]
    fn rooted_provider_joins_relative_paths() {
        let dir = tempfile::tempdir().expect("temp dir");
        let mut file = fs::File::create(dir.path().join("game.prg")).expect("create source");
        writeln!(file, "BEGIN").expect("write source");
        let provider = FsSourceProvider::rooted(dir.path());
        let listing = SourceListing::fetch("game.prg", &provider);
        assert!(listing.was_found());
        assert_eq!(listing.lines(), ["BEGIN".to_string()]);
    }
}
