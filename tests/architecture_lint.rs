//! Architecture enforcement tests.
//!
//! The crate is layered: `core` holds plain domain types and must not reach
//! into the runtime, and loaders and extensions plug into the engine only
//! through its public traits. These tests catch violations in CI.

use std::fs;
use std::path::{Path, PathBuf};

/// Collect every `.rs` file under `dir`.
fn rust_files(dir: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir).expect("Failed to read source directory") {
        let path = entry.expect("Failed to read entry").path();
        if path.is_dir() {
            files.extend(rust_files(&path));
        } else if path.extension().map(|e| e == "rs").unwrap_or(false) {
            files.push(path);
        }
    }
    files.sort();
    files
}

/// Report every file under `dir` containing one of `forbidden`.
fn violations(dir: &str, forbidden: &[&str], reason: &str) -> Vec<String> {
    let mut found = Vec::new();
    for path in rust_files(Path::new(dir)) {
        let content = fs::read_to_string(&path)
            .unwrap_or_else(|_| panic!("Failed to read {}", path.display()));
        for pattern in forbidden {
            if content.contains(pattern) {
                found.push(format!("{}: uses `{}` - {}", path.display(), pattern, reason));
            }
        }
    }
    found
}

// =============================================================================
// Layering
// =============================================================================

/// `core` is the bottom layer.
#[test]
fn core_does_not_depend_on_runtime_layers() {
    let found = violations(
        "src/core",
        &["crate::engine", "crate::loaders", "crate::extensions"],
        "core must stay independent of the runtime",
    );
    assert!(
        found.is_empty(),
        "Architecture violations found:\n  {}",
        found.join("\n  ")
    );
}

/// Loaders and extensions only see the engine's public surface.
#[test]
fn plugins_do_not_touch_engine_internals() {
    let mut found = violations(
        "src/loaders",
        &["crate::engine::registry", "crate::engine::phase", "crate::extensions"],
        "loaders implement `Loader` only",
    );
    found.extend(violations(
        "src/extensions",
        &["crate::engine::registry", "crate::engine::phase", "crate::loaders"],
        "extensions implement `Extension` only",
    ));
    assert!(
        found.is_empty(),
        "Architecture violations found:\n  {}",
        found.join("\n  ")
    );
}

// =============================================================================
// Hygiene
// =============================================================================

/// Non-test code propagates errors instead of panicking.
#[test]
fn library_code_does_not_unwrap() {
    let mut found = Vec::new();
    for path in rust_files(Path::new("src")) {
        let content = fs::read_to_string(&path)
            .unwrap_or_else(|_| panic!("Failed to read {}", path.display()));
        // everything after the test module is test code
        let library = content.split("#[cfg(test)]").next().unwrap_or("");
        for (number, line) in library.lines().enumerate() {
            let code = line.trim_start();
            if code.starts_with("//") {
                continue;
            }
            if code.contains(".unwrap()") || code.contains(".expect(") {
                found.push(format!("{}:{}: {}", path.display(), number + 1, code));
            }
        }
    }
    assert!(
        found.is_empty(),
        "unwrap/expect outside tests:\n  {}",
        found.join("\n  ")
    );
}
