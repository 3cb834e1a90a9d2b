//! The editing session: one owned graph and the file it belongs to.

use std::path::{Path, PathBuf};

use hn_graph::{Diagnostic, NetworkGraph, validate};

use crate::DocumentResult;
use crate::io::{load_file, save_file};

/// Owns the single graph being edited.
///
/// Presentation layers borrow the graph through [`ModelSession::graph`] and
/// [`ModelSession::graph_mut`]; nothing else holds it.
#[derive(Debug, Clone, Default)]
pub struct ModelSession {
    graph: NetworkGraph,
    path: Option<PathBuf>,
    /// Graph revision at the last save or open. `None` for a graph that was
    /// never saved.
    saved_revision: Option<u64>,
}

impl ModelSession {
    /// Start an empty, unsaved model.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the current model with the one stored at `path`.
    ///
    /// On failure the current model, path and dirty state are kept.
    pub fn open_file(&mut self, path: &Path) -> DocumentResult<()> {
        let graph = load_file(path)?;
        self.saved_revision = Some(graph.revision());
        self.graph = graph;
        self.path = Some(path.to_path_buf());
        Ok(())
    }

    /// Save to the current path. Returns `Ok(false)` when there is no path
    /// yet, so the caller can ask for one and use [`Self::save_as`].
    pub fn save(&mut self) -> DocumentResult<bool> {
        let Some(path) = self.path.clone() else {
            return Ok(false);
        };
        save_file(&path, &self.graph)?;
        self.saved_revision = Some(self.graph.revision());
        Ok(true)
    }

    /// Save to `path` and make it the current path.
    pub fn save_as(&mut self, path: &Path) -> DocumentResult<()> {
        save_file(path, &self.graph)?;
        self.path = Some(path.to_path_buf());
        self.saved_revision = Some(self.graph.revision());
        Ok(())
    }

    /// True if the graph changed since it was last saved or opened. A new,
    /// never-modified session is clean.
    pub fn is_dirty(&self) -> bool {
        self.graph.revision() != self.saved_revision.unwrap_or(0)
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn graph(&self) -> &NetworkGraph {
        &self.graph
    }

    pub fn graph_mut(&mut self) -> &mut NetworkGraph {
        &mut self.graph
    }

    pub fn validate(&self) -> Vec<Diagnostic> {
        validate(&self.graph)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hn_graph::{ElementParams, Position};

    #[test]
    fn new_session_is_clean_until_mutated() {
        let mut session = ModelSession::new();
        assert!(!session.is_dirty());
        assert!(session.path().is_none());

        session
            .graph_mut()
            .add_element(ElementParams::Node, Position::default())
            .unwrap();
        assert!(session.is_dirty());
    }

    #[test]
    fn failed_mutation_keeps_session_clean() {
        let mut session = ModelSession::new();
        let n = session
            .graph_mut()
            .add_element(ElementParams::Node, Position::default())
            .unwrap();
        let revision = session.graph().revision();
        assert!(session.graph_mut().add_connection(n, n, None).is_err());
        assert_eq!(session.graph().revision(), revision);
    }

    #[test]
    fn save_without_path_asks_for_one() {
        let mut session = ModelSession::new();
        assert!(!session.save().unwrap());
    }
}
