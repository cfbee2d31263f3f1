//! Migration Parser - Pure functions turning raw files into definitions
//!
//! Nothing here touches the filesystem: filenames and contents come in as
//! text, structured values come out.

use once_cell::sync::Lazy;
use regex::Regex;

use super::definitions::{MigrationDefinition, DOWN_MARKER, UP_MARKER, VERSION_WIDTH};
use super::source::RawMigration;
use crate::error::{MigrationError, MigrationResult};

static FILENAME_STEM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([0-9]+)_(.+)$").expect("filename pattern is valid"));

static NON_SLUG_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^A-Za-z0-9_]").expect("slug pattern is valid"));

static UNDERSCORE_RUNS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"_+").expect("underscore pattern is valid"));

#[derive(Clone, Copy, PartialEq, Eq)]
enum Section {
    Preamble,
    Up,
    Down,
}

/// Split a filename of the form `<version>_<name>.<extension>` into its
/// version and name.
pub fn parse_filename(filename: &str, extension: &str) -> MigrationResult<(String, String)> {
    let invalid = || MigrationError::InvalidFilename {
        filename: filename.to_string(),
        extension: extension.to_string(),
    };

    let stem = filename
        .strip_suffix(extension)
        .and_then(|rest| rest.strip_suffix('.'))
        .ok_or_else(invalid)?;

    let captures = FILENAME_STEM.captures(stem).ok_or_else(invalid)?;
    Ok((captures[1].to_string(), captures[2].to_string()))
}

/// Extract the forward and backward bodies from migration file content.
///
/// Lines before the first marker are discarded. Marker lines themselves are
/// never part of a body, and both bodies come back trimmed.
pub fn parse_sections(content: &str) -> (String, String) {
    let mut section = Section::Preamble;
    let mut up_lines = Vec::new();
    let mut down_lines = Vec::new();

    for line in content.lines() {
        let trimmed = line.trim();

        if trimmed.contains(UP_MARKER) {
            section = Section::Up;
            continue;
        }

        if trimmed.contains(DOWN_MARKER) {
            section = Section::Down;
            continue;
        }

        match section {
            Section::Up => up_lines.push(line),
            Section::Down => down_lines.push(line),
            Section::Preamble => {}
        }
    }

    (
        up_lines.join("\n").trim().to_string(),
        down_lines.join("\n").trim().to_string(),
    )
}

/// Parse one raw migration into a definition
pub fn parse_definition(raw: &RawMigration, extension: &str) -> MigrationResult<MigrationDefinition> {
    let (version, name) = parse_filename(&raw.file_name, extension)?;
    let (forward_body, backward_body) = parse_sections(&raw.content);

    Ok(MigrationDefinition {
        version,
        name,
        forward_body,
        backward_body,
        source: raw.source.clone(),
    })
}

/// Map a free-form label to a filesystem- and ordering-safe slug.
///
/// Characters outside `[A-Za-z0-9_]` become `_`, runs of `_` collapse, and
/// leading/trailing `_` are removed. Case is preserved.
pub fn sanitize_name(name: &str) -> String {
    let replaced = NON_SLUG_CHARS.replace_all(name, "_");
    let collapsed = UNDERSCORE_RUNS.replace_all(&replaced, "_");
    collapsed.trim_matches('_').to_string()
}

/// Compute the version that follows `last`, or the first version when there
/// is none.
pub fn next_version(last: Option<&str>) -> MigrationResult<String> {
    let Some(last) = last else {
        return Ok(format!("{:0width$}", 1, width = VERSION_WIDTH));
    };

    let current: u64 = last.parse().map_err(|_| MigrationError::InvalidVersion {
        version: last.to_string(),
    })?;
    let next = current
        .checked_add(1)
        .ok_or_else(|| MigrationError::InvalidVersion {
            version: last.to_string(),
        })?;

    Ok(format!("{:0width$}", next, width = VERSION_WIDTH))
}
