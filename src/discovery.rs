//! Multi-file discovery (§6.1's driver surface, ambient — not a named
//! [MODULE] of its own): walks a directory tree for component source
//! files and extracts lightweight per-component metadata without running
//! the full lowering/codegen pipeline, for embedders (a dev server, a
//! bundler plugin) that need a project-wide component registry before
//! compiling anything.
//!
//! Grounded on the teacher's `discovery.rs` (`find_zen_files`/
//! `discover_components_native` walkdir-based scan), reimplemented against
//! `analyzer::discover_component_names`/`analyzer::analyze` instead of the
//! old `.zen`/regex-based extraction, and parallelized with `rayon` the way
//! `visitor.rs` uses it for per-node work — here, per-file analysis is the
//! independent unit of work.

use std::path::{Path, PathBuf};

use rayon::prelude::*;
use walkdir::WalkDir;

use crate::analyzer;
use crate::error::DiscoveryError;

const COMPONENT_EXTENSIONS: &[&str] = &["tsx", "jsx"];

/// Lightweight per-component summary, independent of any `TemplateAdapter`
/// or client-script generation — just enough for a project-wide registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentMetadata {
    pub name: String,
    pub path: String,
    pub signal_names: Vec<String>,
    pub memo_names: Vec<String>,
    pub prop_names: Vec<String>,
    pub is_client_only: bool,
}

fn is_component_source(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| COMPONENT_EXTENSIONS.contains(&ext))
        .unwrap_or(false)
}

/// Finds every component source file under `root`, sorted lexicographically
/// by path so the result is stable regardless of the filesystem's own
/// directory-entry order (§9 "Determinism").
pub fn find_component_files(root: &str) -> Result<Vec<PathBuf>, DiscoveryError> {
    let mut files = Vec::new();
    for entry in WalkDir::new(root) {
        let entry = entry.map_err(|e| DiscoveryError::WalkFailed {
            root: root.to_string(),
            message: e.to_string(),
        })?;
        if entry.file_type().is_file() && is_component_source(entry.path()) {
            files.push(entry.into_path());
        }
    }
    files.sort();
    Ok(files)
}

fn metadata_for_file(path: &Path) -> Result<Vec<ComponentMetadata>, DiscoveryError> {
    let source = std::fs::read_to_string(path).map_err(|e| DiscoveryError::ReadFailed {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;
    let path_str = path.display().to_string();
    let names = analyzer::discover_component_names(&source);

    if names.is_empty() {
        return Ok(Vec::new());
    }

    let metadata = names
        .into_iter()
        .map(|name| {
            let ctx = analyzer::analyze(&source, &path_str, Some(name.as_str()));
            ComponentMetadata {
                name: ctx.component_name,
                path: path_str.clone(),
                signal_names: ctx.signals.iter().map(|s| s.getter.clone()).collect(),
                memo_names: ctx.memos.iter().map(|m| m.name.clone()).collect(),
                prop_names: ctx.props_params.iter().map(|p| p.name.clone()).collect(),
                is_client_only: ctx.has_use_client_directive,
            }
        })
        .collect();

    Ok(metadata)
}

/// Walks `root` and analyzes every component file found, in parallel
/// (files are independent compile units per §5). Returns metadata sorted
/// by `(path, name)` for deterministic output; a single unreadable file
/// fails the whole discovery rather than silently dropping results, since
/// a caller relying on a complete registry should see the gap immediately.
pub fn discover_components(root: &str) -> Result<Vec<ComponentMetadata>, DiscoveryError> {
    let files = find_component_files(root)?;

    let mut all: Vec<ComponentMetadata> = files
        .par_iter()
        .map(|path| metadata_for_file(path))
        .collect::<Result<Vec<Vec<ComponentMetadata>>, DiscoveryError>>()?
        .into_iter()
        .flatten()
        .collect();

    all.sort_by(|a, b| (&a.path, &a.name).cmp(&(&b.path, &b.name)));
    Ok(all)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn is_component_source_accepts_tsx_and_jsx_only() {
        assert!(is_component_source(Path::new("widget.tsx")));
        assert!(is_component_source(Path::new("widget.jsx")));
        assert!(!is_component_source(Path::new("widget.ts")));
        assert!(!is_component_source(Path::new("readme.md")));
    }

    #[test]
    fn metadata_for_file_reports_signals_and_props() {
        let dir = std::env::temp_dir().join(format!("bf-compiler-discovery-test-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let file = dir.join("counter.tsx");
        std::fs::write(
            &file,
            "function Counter({ start }) { const [count, setCount] = createSignal(start ?? 0); return <div>{count()}</div>; }",
        )
        .unwrap();

        let metadata = metadata_for_file(&file).unwrap();
        assert_eq!(metadata.len(), 1);
        assert_eq!(metadata[0].name, "Counter");
        assert_eq!(metadata[0].signal_names, vec!["count".to_string()]);
        assert_eq!(metadata[0].prop_names, vec!["start".to_string()]);

        std::fs::remove_dir_all(&dir).ok();
    }
}
