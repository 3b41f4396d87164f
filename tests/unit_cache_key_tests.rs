use run_matrix::core::cache_key::{self, CacheKeyResolver};
use run_matrix::core::error::InputError;
use run_matrix::core::models::Variant;
use std::collections::BTreeMap;
use std::path::Path;

const LOCK: &[u8] = b"# This file is automatically @generated by Cargo.\nversion = 3\n";

fn variant(id: &str, os: &str) -> Variant {
    Variant {
        id: id.to_string(),
        axis_values: Vec::new(),
        os: os.to_string(),
        toolchain: None,
        command: "cargo test".to_string(),
        args: String::new(),
        env: BTreeMap::new(),
        steps: Vec::new(),
    }
}

#[test]
fn test_key_is_a_pure_function_of_os_and_lock() {
    let stable = variant("stable", "linux");
    let beta = variant("beta", "linux");

    let first = cache_key::resolve(&stable, Some(LOCK)).unwrap();
    let again = cache_key::resolve(&stable, Some(LOCK)).unwrap();
    let sibling = cache_key::resolve(&beta, Some(LOCK)).unwrap();

    assert_eq!(first, again);
    // Variants on the same OS with the same lock share one cache namespace.
    assert_eq!(first, sibling);
    assert!(first.as_str().starts_with("linux-"));
}

#[test]
fn test_one_byte_of_lock_changes_the_key() {
    let v = variant("stable", "linux");
    let mut edited = LOCK.to_vec();
    let last = edited.len() - 2;
    edited[last] = b'4';

    let original = cache_key::resolve(&v, Some(LOCK)).unwrap();
    let changed = cache_key::resolve(&v, Some(&edited)).unwrap();

    assert_ne!(original, changed);
}

#[test]
fn test_os_separates_namespaces() {
    let linux = cache_key::resolve(&variant("stable", "linux"), Some(LOCK)).unwrap();
    let macos = cache_key::resolve(&variant("macos", "macos"), Some(LOCK)).unwrap();
    assert_ne!(linux, macos);
}

#[test]
fn test_missing_lock_is_an_input_error() {
    let err = cache_key::resolve(&variant("stable", "linux"), None).unwrap_err();
    assert_eq!(
        err,
        InputError::MissingLockContent {
            variant: "stable".to_string()
        }
    );
}

#[test]
fn test_prefix_and_entry_address() {
    let resolver = CacheKeyResolver::new(Some("cargo".to_string()));
    let key = resolver.resolve(&variant("stable", "linux"), Some(LOCK)).unwrap();

    assert!(key.as_str().starts_with("cargo-linux-"));
    // sha256 in hex
    let digest = key.as_str().rsplit('-').next().unwrap();
    assert_eq!(digest.len(), 64);
    assert_eq!(
        key.entry(Path::new("target/deps.tar")),
        format!("{key}/target/deps.tar")
    );
}

#[test]
fn test_empty_prefix_is_ignored() {
    let resolver = CacheKeyResolver::new(Some(String::new()));
    let key = resolver.resolve(&variant("stable", "linux"), Some(LOCK)).unwrap();
    assert!(key.as_str().starts_with("linux-"));
}
