//! Error types for hosts document parsing and loading

use std::path::PathBuf;
use thiserror::Error;

/// Label used in errors for fields that live at the top level of a document
pub const ROOT_BLOCK: &str = "<root>";

#[derive(Error, Debug)]
pub enum HostsError {
    #[error("Malformed hosts document{}: {message}", fmt_location(.line, .column))]
    MalformedDocument {
        message: String,
        line: Option<usize>,
        column: Option<usize>,
    },
    #[error("Host {host:?}: scheme {scheme:?} is not supported (expected http or https)")]
    InvalidHostScheme { host: String, scheme: String },
    #[error("Host {host:?}: invalid URL: {reason}")]
    InvalidHostUrl { host: String, reason: String },
    #[error("Host {host:?}: unknown capability {capability:?}")]
    UnknownCapability { host: String, capability: String },
    #[error(
        "Host {host:?}: client entry {index} must be a path or a [certificate, key] pair"
    )]
    InvalidClientCertShape { host: String, index: usize },
    #[error("Host {host:?}: field `{field}` must be {expected}, found {found}")]
    InvalidFieldType {
        host: String,
        field: String,
        expected: &'static str,
        found: &'static str,
    },
    #[error("Registry host {host:?} is not usable as a directory name: {reason}")]
    InvalidRegistryHost { host: String, reason: &'static str },
    #[error("IO error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl HostsError {
    /// Build a `MalformedDocument` from a TOML decode error, resolving its
    /// byte span into a 1-based line and column of `source`
    pub fn from_toml(err: &toml::de::Error, source: &str) -> Self {
        let (line, column) = match err.span() {
            Some(span) => {
                let (line, column) = line_column(source, span.start);
                (Some(line), Some(column))
            }
            None => (None, None),
        };
        HostsError::MalformedDocument {
            message: err.message().trim_end().to_string(),
            line,
            column,
        }
    }

    pub(crate) fn field_type(
        host: &str,
        field: impl Into<String>,
        expected: &'static str,
        found: &toml::Value,
    ) -> Self {
        HostsError::InvalidFieldType {
            host: host.to_string(),
            field: field.into(),
            expected,
            found: found.type_str(),
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        HostsError::Io {
            path: path.into(),
            source,
        }
    }
}

fn fmt_location(line: &Option<usize>, column: &Option<usize>) -> String {
    match (*line, *column) {
        (Some(line), Some(column)) => format!(" at line {}, column {}", line, column),
        (Some(line), None) => format!(" at line {}", line),
        _ => String::new(),
    }
}

/// 1-based line and character column of a byte offset into `source`
fn line_column(source: &str, offset: usize) -> (usize, usize) {
    let mut offset = offset.min(source.len());
    while !source.is_char_boundary(offset) {
        offset -= 1;
    }
    let before = &source[..offset];
    let line = before.matches('\n').count() + 1;
    let line_start = before.rfind('\n').map(|i| i + 1).unwrap_or(0);
    (line, before[line_start..].chars().count() + 1)
}
