//! P1 — Analyze Context.
//!
//! Inventories the target repository and produces a [`ContextAnalysis`]:
//! extension counts, a manifest-based framework guess, the dominant
//! language, and a small sample of representative files. Bounded by
//! sampling rather than a full parse, so it stays fast against arbitrarily
//! large repositories (§4.1).

use crate::framework::{self, Language};
use crate::state::{ContextAnalysis, Phase};
use std::collections::HashMap;
use std::path::Path;
use walkdir::WalkDir;

/// Directories excluded from the traversal, regardless of depth (§4.1).
pub(crate) const DENY_LIST: &[&str] = &[
    ".git",
    "node_modules",
    "target",
    "dist",
    "build",
    "venv",
    ".venv",
    "__pycache__",
    ".mypy_cache",
    "vendor",
    "output",
    "datasets",
];

const MANIFEST_FILES: &[&str] = &[
    "pom.xml",
    "build.gradle",
    "build.gradle.kts",
    "package.json",
    "go.mod",
    "Cargo.toml",
    "pyproject.toml",
    "requirements.txt",
];

/// Cap on how many representative files are sampled for the context
/// summary and, later, the P3 architecture scan.
const MAX_REPRESENTATIVE_FILES: usize = 12;

/// Run P1 against `codebase_path`. Never fails: any IO error degrades to a
/// minimal context and is recorded as a warning (§4.1 failure semantics).
pub fn analyze_context(
    codebase_path: &Path,
    errors_sink: &mut Vec<(Phase, String)>,
) -> ContextAnalysis {
    let mut extension_counts: HashMap<String, usize> = HashMap::new();
    let mut top_level_dirs = Vec::new();
    let mut representative_files = Vec::new();
    let mut degraded = false;

    match std::fs::read_dir(codebase_path) {
        Ok(entries) => {
            for entry in entries.flatten() {
                if entry.path().is_dir() {
                    if let Some(name) = entry.file_name().to_str() {
                        if !DENY_LIST.contains(&name) && !name.starts_with('.') {
                            top_level_dirs.push(name.to_string());
                        }
                    }
                }
            }
        }
        Err(e) => {
            errors_sink.push((
                Phase::AnalyzeContext,
                format!("failed to read codebase root: {e}"),
            ));
            degraded = true;
        }
    }
    top_level_dirs.sort();

    let walker = WalkDir::new(codebase_path)
        .into_iter()
        .filter_entry(|e| {
            e.file_name()
                .to_str()
                .map(|n| !DENY_LIST.contains(&n))
                .unwrap_or(true)
        });

    for entry in walker.filter_map(|e| e.ok()) {
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
            *extension_counts.entry(ext.to_lowercase()).or_insert(0) += 1;
            if representative_files.len() < MAX_REPRESENTATIVE_FILES
                && Language::from_extension(ext) != Language::Unknown
            {
                if let Ok(rel) = path.strip_prefix(codebase_path) {
                    representative_files.push(rel.to_string_lossy().to_string());
                }
            }
        }
    }

    let manifest_contents = read_manifests(codebase_path);
    let adapter = framework::detect(codebase_path, &manifest_contents);
    let build_system = framework::build_system_for(codebase_path);

    let language = dominant_language(&extension_counts, &manifest_contents);

    ContextAnalysis {
        framework_candidate: adapter.tag().to_string(),
        language,
        build_system,
        top_level_dirs,
        representative_files,
        extension_counts,
        degraded,
    }
}

/// Read the small set of manifest files present at the repo root. Missing
/// files are skipped silently; this is the only IO P1 performs beyond the
/// directory walk.
fn read_manifests(root: &Path) -> Vec<(String, String)> {
    MANIFEST_FILES
        .iter()
        .filter_map(|name| {
            let path = root.join(name);
            std::fs::read_to_string(&path)
                .ok()
                .map(|contents| (name.to_string(), contents))
        })
        .collect()
}

/// Dominant language by extension count, with a manifest tie-break (§4.1).
fn dominant_language(
    extension_counts: &HashMap<String, usize>,
    manifest_contents: &[(String, String)],
) -> String {
    let best_by_count = extension_counts
        .iter()
        .filter(|(ext, _)| Language::from_extension(ext) != Language::Unknown)
        .max_by_key(|(_, count)| **count)
        .map(|(ext, _)| Language::from_extension(ext));

    let counts_for = |lang: Language| -> usize {
        extension_counts
            .iter()
            .filter(|(ext, _)| Language::from_extension(ext) == lang)
            .map(|(_, c)| *c)
            .sum()
    };

    // Tie-break: if two languages are within 1 file of each other, prefer
    // whichever one has a matching manifest present.
    if let Some(best) = best_by_count {
        let best_count = counts_for(best);
        let manifest_langs: Vec<Language> = manifest_contents
            .iter()
            .filter_map(|(name, _)| {
                Some(match name.as_str() {
                    "pom.xml" | "build.gradle" | "build.gradle.kts" => Language::Java,
                    "package.json" => Language::TypeScript,
                    "go.mod" => Language::Go,
                    "Cargo.toml" => Language::Rust,
                    "pyproject.toml" | "requirements.txt" => Language::Python,
                    _ => return None,
                })
            })
            .collect();

        for lang in &manifest_langs {
            if counts_for(*lang) + 1 >= best_count {
                return lang.as_str().to_string();
            }
        }
        return best.as_str().to_string();
    }

    "unknown".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn analyzes_a_minimal_spring_boot_repo() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join("pom.xml"),
            "<project><dependencies><dependency><artifactId>spring-boot-starter-web</artifactId></dependency></dependencies></project>",
        )
        .unwrap();
        fs::create_dir_all(dir.path().join("src/main/java/com/example/model")).unwrap();
        fs::write(
            dir.path().join("src/main/java/com/example/model/Product.java"),
            "public class Product {}",
        )
        .unwrap();

        let mut errors = Vec::new();
        let analysis = analyze_context(dir.path(), &mut errors);
        assert_eq!(analysis.framework_candidate, "spring_boot");
        assert_eq!(analysis.language, "java");
        assert!(!analysis.degraded);
        assert!(errors.is_empty());
    }

    #[test]
    fn degrades_gracefully_on_missing_root() {
        let mut errors = Vec::new();
        let analysis = analyze_context(Path::new("/nonexistent/path/xyz"), &mut errors);
        assert!(analysis.degraded);
        assert!(!errors.is_empty());
    }

    #[test]
    fn deny_list_excludes_build_output() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("target/debug")).unwrap();
        fs::write(dir.path().join("target/debug/big.rs"), "// generated").unwrap();
        fs::write(dir.path().join("Cargo.toml"), "[package]\nname=\"x\"").unwrap();
        fs::create_dir_all(dir.path().join("src")).unwrap();
        fs::write(dir.path().join("src/main.rs"), "fn main() {}").unwrap();

        let mut errors = Vec::new();
        let analysis = analyze_context(dir.path(), &mut errors);
        assert_eq!(analysis.extension_counts.get("rs"), Some(&1));
    }
}
