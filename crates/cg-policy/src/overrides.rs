// overrides.rs — Durable set of redeemed override codes.
//
// Stored as a JSON array of strings at `<policy dir>/used_override_codes.json`.
// The set only grows. Each redemption re-reads the file, merges it into the
// in-memory set, and rewrites the whole file atomically (temp file in the
// same directory, then rename), so a code redeemed by another engine on the
// same store is still seen as used.

use std::collections::BTreeSet;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::PolicyError;

/// File name of the used-code store, relative to the policy file's directory.
pub const USED_CODES_FILE: &str = "used_override_codes.json";

#[derive(Debug)]
pub struct UsedOverrideCodes {
    path: PathBuf,
    codes: BTreeSet<String>,
}

impl UsedOverrideCodes {
    /// Store path for a given policy file.
    pub fn path_for(policy_path: &Path) -> PathBuf {
        policy_path
            .parent()
            .unwrap_or_else(|| Path::new(""))
            .join(USED_CODES_FILE)
    }

    /// Load the set. A missing file is an empty set; anything unreadable is
    /// an error, and the engine refuses to start.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, PolicyError> {
        let path = path.into();
        let codes = read_codes(&path)?;
        Ok(Self { path, codes })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn contains(&self, code: &str) -> bool {
        self.codes.contains(code)
    }

    pub fn len(&self) -> usize {
        self.codes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }

    /// Mark `code` as used and persist the set.
    ///
    /// Returns `Ok(false)` if the code was already used, here or on disk.
    /// On a persistence error the code stays marked in memory.
    pub fn redeem(&mut self, code: &str) -> Result<bool, PolicyError> {
        let on_disk = read_codes(&self.path)?;
        self.codes.extend(on_disk);

        if !self.codes.insert(code.to_string()) {
            return Ok(false);
        }
        self.persist()?;
        Ok(true)
    }

    fn persist(&self) -> Result<(), PolicyError> {
        let unwritable = |reason: String| PolicyError::UsedCodesUnreadable {
            path: self.path.clone(),
            reason,
        };

        let dir = match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir).map_err(|e| unwritable(e.to_string()))?;

        let json = serde_json::to_vec_pretty(&self.codes).map_err(|e| unwritable(e.to_string()))?;
        let mut tmp = tempfile::NamedTempFile::new_in(&dir).map_err(|e| unwritable(e.to_string()))?;
        tmp.write_all(&json)
            .and_then(|_| tmp.as_file().sync_all())
            .map_err(|e| unwritable(e.to_string()))?;
        tmp.persist(&self.path)
            .map_err(|e| unwritable(e.error.to_string()))?;
        Ok(())
    }
}

fn read_codes(path: &Path) -> Result<BTreeSet<String>, PolicyError> {
    if !path.exists() {
        return Ok(BTreeSet::new());
    }
    let unreadable = |reason: String| PolicyError::UsedCodesUnreadable {
        path: path.to_path_buf(),
        reason,
    };
    let content = fs::read_to_string(path).map_err(|e| unreadable(e.to_string()))?;
    let codes: Vec<String> =
        serde_json::from_str(&content).map_err(|e| unreadable(e.to_string()))?;
    Ok(codes.into_iter().collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let codes = UsedOverrideCodes::load(dir.path().join(USED_CODES_FILE)).unwrap();
        assert!(codes.is_empty());
    }

    #[test]
    fn corrupt_file_fails_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(USED_CODES_FILE);
        fs::write(&path, "{not a list").unwrap();
        assert!(matches!(
            UsedOverrideCodes::load(&path),
            Err(PolicyError::UsedCodesUnreadable { .. })
        ));
    }

    #[test]
    fn redeem_once_and_persist() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(USED_CODES_FILE);
        let mut codes = UsedOverrideCodes::load(&path).unwrap();

        assert!(codes.redeem("123456").unwrap());
        assert!(!codes.redeem("123456").unwrap());

        let stored: Vec<String> = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(stored, vec!["123456".to_string()]);

        let reloaded = UsedOverrideCodes::load(&path).unwrap();
        assert!(reloaded.contains("123456"));
    }

    #[test]
    fn redeem_sees_codes_written_by_another_instance() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(USED_CODES_FILE);
        let mut first = UsedOverrideCodes::load(&path).unwrap();
        let mut second = UsedOverrideCodes::load(&path).unwrap();

        assert!(first.redeem("AAAAAA").unwrap());
        assert!(!second.redeem("AAAAAA").unwrap());
        assert!(second.redeem("BBBBBB").unwrap());

        let merged = UsedOverrideCodes::load(&path).unwrap();
        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn creates_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join(USED_CODES_FILE);
        let mut codes = UsedOverrideCodes::load(&path).unwrap();
        assert!(codes.redeem("CODE42").unwrap());
        assert!(path.exists());
    }

    #[test]
    fn path_is_beside_policy_file() {
        assert_eq!(
            UsedOverrideCodes::path_for(Path::new("/etc/cg/policy.yaml")),
            PathBuf::from("/etc/cg").join(USED_CODES_FILE)
        );
    }
}
