//! Raw configuration lexing
//!
//! `ConfigReader` turns the device configuration file into a sequence of
//! [`RawSection`]s without interpreting any key. Duplicate headers are
//! preserved as distinct sections so the catalog layer can reject them
//! explicitly instead of silently merging.
//!
//! Format contract:
//!
//! - a section starts at a `[name]` header and ends at the next header
//!   (a blank line is not required between sections)
//! - blank lines and `#`-prefixed comment lines are ignored
//! - entries are `key = value`; values may be wrapped in single or
//!   double quotes, which are stripped
//! - an unquoted value loses any trailing `# comment`

use std::fs;
use std::path::{Path, PathBuf};

use crate::{Error, Result};

/// One bracketed section as written in the configuration file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawSection {
    /// Section name as it appears between the brackets
    pub name: String,
    /// Key/value entries in order of appearance
    pub entries: Vec<(String, String)>,
}

impl RawSection {
    /// Look up the first value for `key` within this section.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// Reads and lexes a device configuration file.
pub struct ConfigReader {
    path: PathBuf,
}

impl ConfigReader {
    /// Create a reader for the configuration file at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The path this reader was created with.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Lex the whole file into raw sections.
    ///
    /// # Errors
    ///
    /// - [`Error::ConfigMissing`] if the file does not exist or cannot be read
    /// - [`Error::ConfigEmpty`] if it contains no usable bytes
    pub fn read_sections(&self) -> Result<Vec<RawSection>> {
        let content = fs::read_to_string(&self.path).map_err(|_| Error::ConfigMissing {
            path: self.path.clone(),
        })?;

        if content.trim().is_empty() {
            return Err(Error::ConfigEmpty {
                path: self.path.clone(),
            });
        }

        tracing::debug!(path = %self.path.display(), "lexing device configuration");
        Ok(parse_sections(&content))
    }

    /// Return the first section named `name`.
    ///
    /// # Errors
    ///
    /// [`Error::SectionNotFound`] if no such section exists, plus the
    /// read errors of [`ConfigReader::read_sections`].
    pub fn section(&self, name: &str) -> Result<RawSection> {
        self.read_sections()?
            .into_iter()
            .find(|s| s.name == name)
            .ok_or_else(|| Error::SectionNotFound {
                name: name.to_string(),
            })
    }

    /// Look up a single value by section and key.
    ///
    /// Only the first occurrence of the section is consulted.
    pub fn value(&self, section: &str, key: &str) -> Result<String> {
        let raw = self.section(section)?;
        raw.get(key)
            .map(str::to_string)
            .ok_or_else(|| Error::KeyNotFound {
                section: section.to_string(),
                key: key.to_string(),
            })
    }
}

/// Split file content into raw sections.
///
/// Lines before the first header carry global directives and are not
/// part of any device section; they are skipped here.
fn parse_sections(content: &str) -> Vec<RawSection> {
    let mut sections: Vec<RawSection> = Vec::new();
    let mut current: Option<RawSection> = None;

    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        if let Some(name) = header_name(line) {
            if let Some(done) = current.take() {
                sections.push(done);
            }
            current = Some(RawSection {
                name: name.to_string(),
                entries: Vec::new(),
            });
            continue;
        }

        if let Some(section) = current.as_mut()
            && let Some((key, value)) = split_entry(line)
        {
            section.entries.push((key, value));
        }
    }

    if let Some(done) = current.take() {
        sections.push(done);
    }

    sections
}

/// Extract the section name from a `[name]` header line, if it is one.
fn header_name(line: &str) -> Option<&str> {
    let inner = line.strip_prefix('[')?.strip_suffix(']')?;
    if inner.is_empty() { None } else { Some(inner) }
}

/// Split a `key = value` line, stripping quotes or a trailing comment.
fn split_entry(line: &str) -> Option<(String, String)> {
    let (key, value) = line.split_once('=')?;
    let key = key.trim();
    if key.is_empty() {
        return None;
    }
    Some((key.to_string(), unquote(value.trim())))
}

/// Strip a matching pair of single or double quotes, or a trailing
/// unquoted comment.
fn unquote(value: &str) -> String {
    for quote in ['"', '\''] {
        if value.len() >= 2 && value.starts_with(quote) && value.ends_with(quote) {
            return value[1..value.len() - 1].to_string();
        }
    }
    match value.split_once('#') {
        Some((before, _)) => before.trim_end().to_string(),
        None => value.to_string(),
    }
}
