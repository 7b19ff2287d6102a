use anyhow::{Context, Result};
use log::{debug, warn};
use std::fs;
use std::path::{Path, PathBuf};

/// Parses model source files with `syn`.
pub struct SourceParser;

/// A model source file and its syntax tree
#[derive(Debug)]
pub struct ParsedFile {
    pub path: PathBuf,
    pub syntax_tree: syn::File,
}

impl SourceParser {
    /// Read and parse one file
    pub fn parse_file(path: &Path) -> Result<ParsedFile> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read model file: {}", path.display()))?;
        Self::parse_source(path, &content)
    }

    /// Parse source text already in memory; `path` names it in diagnostics
    pub fn parse_source(path: &Path, content: &str) -> Result<ParsedFile> {
        debug!("Parsing model file: {}", path.display());
        let syntax_tree = syn::parse_file(content)
            .with_context(|| format!("Failed to parse Rust syntax in model file: {}", path.display()))?;
        Ok(ParsedFile {
            path: path.to_path_buf(),
            syntax_tree,
        })
    }

    /// Parse files in order, logging and skipping the ones that fail
    pub fn parse_files(paths: &[PathBuf]) -> Vec<ParsedFile> {
        let parsed: Vec<ParsedFile> = paths
            .iter()
            .filter_map(|path| match Self::parse_file(path) {
                Ok(parsed) => Some(parsed),
                Err(e) => {
                    warn!("Skipping {}: {:#}", path.display(), e);
                    None
                }
            })
            .collect();

        debug!(
            "Parsing complete: {} succeeded, {} skipped",
            parsed.len(),
            paths.len() - parsed.len()
        );
        parsed
    }
}
