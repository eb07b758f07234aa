//! Shared helpers for the runtime integration tests.
#![allow(dead_code)] // Each test binary uses its own subset.

use loam_runtime::{Framework, LoamConfig, ModuleArchive};

/// Builds a manifest with optional activator, exports and imports.
///
/// Exports are `(namespace, version, uses)` triples; imports are
/// `(namespace, range, optional)` triples.
pub fn manifest(
    name: &str,
    version: &str,
    activator: Option<&str>,
    exports: &[(&str, &str, &str)],
    imports: &[(&str, &str, bool)],
) -> String {
    let mut text = format!("Module-SymbolicName: {name}\nModule-Version: {version}\n");
    if let Some(activator) = activator {
        text.push_str(&format!("Module-Activator: {activator}\n"));
    }
    if !exports.is_empty() {
        let clauses: Vec<String> = exports
            .iter()
            .map(|(ns, v, uses)| {
                if uses.is_empty() {
                    format!("{ns};version:=\"{v}\"")
                } else {
                    format!("{ns};version:=\"{v}\";uses:=\"{uses}\"")
                }
            })
            .collect();
        text.push_str(&format!("Export-Package: {}\n", clauses.join(", ")));
    }
    if !imports.is_empty() {
        let clauses: Vec<String> = imports
            .iter()
            .map(|(ns, range, optional)| {
                if *optional {
                    format!("{ns};version:=\"{range}\";resolution:=\"optional\"")
                } else {
                    format!("{ns};version:=\"{range}\"")
                }
            })
            .collect();
        text.push_str(&format!("Import-Package: {}\n", clauses.join(", ")));
    }
    text
}

/// Wraps a manifest into archive bytes.
pub fn archive_bytes(manifest: &str) -> Vec<u8> {
    ModuleArchive::from_manifest(manifest).to_bytes()
}

/// A framework over a store inside `dir`, with a short queue idle
/// timeout so detach paths get exercised.
pub fn framework_in(dir: &tempfile::TempDir) -> Framework {
    let mut config = LoamConfig::default();
    config.paths.storage_root = dir.path().join("store");
    config.queue.idle_timeout_ms = 200;
    Framework::new(config).expect("framework")
}
