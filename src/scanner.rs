use anyhow::{Context, Result};
use log::{debug, warn};
use std::path::PathBuf;
use walkdir::WalkDir;

/// Finds the model source files under a directory.
///
/// The `target` directory and hidden directories are skipped. Files come back
/// sorted by path, which fixes the order root declarations are registered in.
///
/// # Example
///
/// ```no_run
/// use typegraph_mapper::scanner::SourceScanner;
/// use std::path::PathBuf;
///
/// let result = SourceScanner::new(PathBuf::from("./model")).scan().unwrap();
/// println!("Found {} model files", result.source_files.len());
/// ```
pub struct SourceScanner {
    root_path: PathBuf,
}

/// Files found by a scan, plus entries that could not be read
pub struct ScanResult {
    pub source_files: Vec<PathBuf>,
    pub warnings: Vec<String>,
}

impl SourceScanner {
    pub fn new(root_path: PathBuf) -> Self {
        Self { root_path }
    }

    /// Walk the tree and collect `.rs` files in sorted order.
    ///
    /// Unreadable entries become warnings; only a missing root is an error.
    pub fn scan(&self) -> Result<ScanResult> {
        std::fs::metadata(&self.root_path)
            .with_context(|| format!("Cannot access model path: {}", self.root_path.display()))?;

        let mut source_files = Vec::new();
        let mut warnings = Vec::new();

        let walker = WalkDir::new(&self.root_path)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| {
                if e.depth() == 0 {
                    return true;
                }
                let file_name = e.file_name().to_string_lossy();
                !file_name.starts_with('.') && file_name != "target"
            });

        for entry in walker {
            match entry {
                Ok(entry) => {
                    let path = entry.path();
                    if entry.file_type().is_file() && path.extension().and_then(|s| s.to_str()) == Some("rs") {
                        source_files.push(path.to_path_buf());
                    }
                }
                Err(e) => {
                    let warning = format!("Failed to access path: {}", e);
                    warn!("{}", warning);
                    warnings.push(warning);
                }
            }
        }

        source_files.sort();
        debug!("Scanned {}: {} model files", self.root_path.display(), source_files.len());

        Ok(ScanResult {
            source_files,
            warnings,
        })
    }
}
