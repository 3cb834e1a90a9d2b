//! Text and file entry points.

use std::io::Write;
use std::path::Path;

use hn_graph::{NetworkGraph, has_errors, validate};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::convert::{load, save};
use crate::migrate::migrate_to_current;
use crate::schema::Document;
use crate::{DocumentError, DocumentResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DocumentFormat {
    #[default]
    Json,
    Yaml,
}

impl DocumentFormat {
    /// `.yaml` / `.yml` select YAML, anything else JSON.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml") => {
                DocumentFormat::Yaml
            }
            _ => DocumentFormat::Json,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SaveOptions {
    pub format: DocumentFormat,
    /// Indented JSON. YAML is always written in block style.
    pub pretty: bool,
}

impl Default for SaveOptions {
    fn default() -> Self {
        Self {
            format: DocumentFormat::Json,
            pretty: true,
        }
    }
}

impl SaveOptions {
    pub fn for_path(path: &Path) -> Self {
        Self {
            format: DocumentFormat::from_path(path),
            ..Self::default()
        }
    }
}

/// Encode `graph` as document text.
pub fn save_string(graph: &NetworkGraph, options: SaveOptions) -> DocumentResult<String> {
    let document = save(graph);
    let text = match (options.format, options.pretty) {
        (DocumentFormat::Json, true) => serde_json::to_string_pretty(&document)
            .map_err(|e| DocumentError::Serialization(e.to_string()))?,
        (DocumentFormat::Json, false) => serde_json::to_string(&document)
            .map_err(|e| DocumentError::Serialization(e.to_string()))?,
        (DocumentFormat::Yaml, _) => serde_yaml::to_string(&document)
            .map_err(|e| DocumentError::Serialization(e.to_string()))?,
    };
    Ok(text)
}

/// Decode document text of any supported version.
pub fn load_str(text: &str, format: DocumentFormat) -> DocumentResult<NetworkGraph> {
    let raw: Value = match format {
        DocumentFormat::Json => serde_json::from_str(text)
            .map_err(|e| DocumentError::format(format!("invalid JSON: {e}")))?,
        DocumentFormat::Yaml => serde_yaml::from_str(text)
            .map_err(|e| DocumentError::format(format!("invalid YAML: {e}")))?,
    };
    let current = migrate_to_current(raw)?;
    let document: Document =
        serde_json::from_value(current).map_err(|e| DocumentError::corrupt(e.to_string()))?;
    load(document)
}

/// Save with options inferred from the file extension.
pub fn save_file(path: &Path, graph: &NetworkGraph) -> DocumentResult<()> {
    save_file_with(path, graph, SaveOptions::for_path(path))
}

/// Write the document to a temporary file beside `path`, then rename it over
/// `path`. On any error the previous contents of `path` are untouched and
/// the temporary file is removed.
pub fn save_file_with(
    path: &Path,
    graph: &NetworkGraph,
    options: SaveOptions,
) -> DocumentResult<()> {
    let diagnostics = validate(graph);
    if has_errors(&diagnostics) {
        warn!(
            path = %path.display(),
            findings = diagnostics.len(),
            "saving a model that has validation errors"
        );
    }

    let text = save_string(graph, options)?;
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };

    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(text.as_bytes())?;
    tmp.as_file().sync_all()?;
    debug!(tmp = %tmp.path().display(), bytes = text.len(), "document written");
    tmp.persist(path).map_err(|e| DocumentError::Io(e.error))?;

    info!(
        path = %path.display(),
        elements = graph.element_count(),
        connections = graph.connection_count(),
        "model saved"
    );
    Ok(())
}

/// Load a document, choosing the format from the file extension.
pub fn load_file(path: &Path) -> DocumentResult<NetworkGraph> {
    let text = std::fs::read_to_string(path)?;
    let graph = load_str(&text, DocumentFormat::from_path(path))?;
    info!(
        path = %path.display(),
        elements = graph.element_count(),
        connections = graph.connection_count(),
        "model loaded"
    );
    Ok(graph)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_follows_extension() {
        assert_eq!(
            DocumentFormat::from_path(Path::new("a/model.yaml")),
            DocumentFormat::Yaml
        );
        assert_eq!(
            DocumentFormat::from_path(Path::new("model.YML")),
            DocumentFormat::Yaml
        );
        assert_eq!(
            DocumentFormat::from_path(Path::new("model.json")),
            DocumentFormat::Json
        );
        assert_eq!(
            DocumentFormat::from_path(Path::new("model")),
            DocumentFormat::Json
        );
    }

    #[test]
    fn garbage_text_is_a_format_error() {
        let err = load_str("{ not json", DocumentFormat::Json).unwrap_err();
        assert!(matches!(err, DocumentError::Format { .. }));
    }

    #[test]
    fn wrong_shape_is_corrupt() {
        let err = load_str(
            r#"{ "format_version": 3, "elements": [{ "id": 0 }] }"#,
            DocumentFormat::Json,
        )
        .unwrap_err();
        assert!(matches!(err, DocumentError::Corrupt { .. }));
    }

    #[test]
    fn empty_graph_round_trips_through_yaml() {
        let g = NetworkGraph::new();
        let options = SaveOptions {
            format: DocumentFormat::Yaml,
            pretty: true,
        };
        let text = save_string(&g, options).unwrap();
        assert_eq!(load_str(&text, DocumentFormat::Yaml).unwrap(), g);
    }
}
