use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};

pub const CLS_MODEL: &str = "dummy-cls-model.zip";
pub const DET_MODEL: &str = "dummy-det-model.zip";
pub const KEYPOINT_MODEL: &str = "dummy-keypoint-model.zip";
pub const UNSPECIFIED_MODEL: &str = "dummy-unspecified-model.zip";
pub const CLS_NO_README_MODEL: &str = "dummy-cls-no-readme.zip";
pub const EMPTY_RESPONSE_MODEL: &str = "empty-response-model.zip";
pub const DOG_IMG: &str = "dog.jpg";
pub const DOG_RGBA_IMG: &str = "dog-rgba.png";
pub const CAT_IMG: &str = "cat.jpg";
pub const BEAR_IMG: &str = "bear.jpg";

pub const FIXTURE_FILES: [&str; 10] = [
    CLS_MODEL,
    DET_MODEL,
    KEYPOINT_MODEL,
    UNSPECIFIED_MODEL,
    CLS_NO_README_MODEL,
    EMPTY_RESPONSE_MODEL,
    DOG_IMG,
    DOG_RGBA_IMG,
    CAT_IMG,
    BEAR_IMG,
];

/// Model archives and images the scenarios upload, loaded once per run.
#[derive(Debug, Clone, Default)]
pub struct Fixtures {
    source: Option<PathBuf>,
    files: BTreeMap<&'static str, Vec<u8>>,
    missing: Vec<&'static str>,
}

impl Fixtures {
    pub fn data_dir(root: &Path) -> PathBuf {
        root.join("integration-test").join("data")
    }

    /// Read every known fixture from `{root}/integration-test/data`. Absent
    /// files are recorded, not fatal; an absent directory is.
    pub fn load(root: &Path) -> Result<Self> {
        let dir = Self::data_dir(root);
        if !dir.is_dir() {
            bail!("fixture directory {} does not exist", dir.display());
        }
        let mut fixtures = Self {
            source: Some(dir.clone()),
            ..Default::default()
        };
        for name in FIXTURE_FILES {
            let path = dir.join(name);
            if !path.exists() {
                tracing::warn!(file = name, dir = %dir.display(), "fixture missing");
                fixtures.missing.push(name);
                continue;
            }
            let bytes = std::fs::read(&path)
                .with_context(|| format!("failed to read fixture {}", path.display()))?;
            fixtures.files.insert(name, bytes);
        }
        tracing::info!(
            dir = %dir.display(),
            loaded = fixtures.files.len(),
            missing = fixtures.missing.len(),
            "fixtures loaded"
        );
        Ok(fixtures)
    }

    /// Small in-memory stand-ins, enough for backends that do not inspect the
    /// archive contents.
    pub fn synthetic() -> Self {
        // Empty zip archive: end-of-central-directory record only.
        const ZIP: &[u8] = &[
            0x50, 0x4b, 0x05, 0x06, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0,
        ];
        const JPEG: &[u8] = &[
            0xff, 0xd8, 0xff, 0xe0, 0x00, 0x10, b'J', b'F', b'I', b'F', 0xff, 0xd9,
        ];
        const PNG: &[u8] = &[0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a];

        let files = FIXTURE_FILES
            .iter()
            .map(|&name| {
                let bytes = if name.ends_with(".zip") {
                    ZIP
                } else if name.ends_with(".png") {
                    PNG
                } else {
                    JPEG
                };
                (name, bytes.to_vec())
            })
            .collect();
        Self {
            source: None,
            files,
            missing: Vec::new(),
        }
    }

    pub fn get(&self, name: &str) -> Result<&[u8]> {
        if let Some(bytes) = self.files.get(name) {
            return Ok(bytes.as_slice());
        }
        match &self.source {
            Some(dir) => Err(anyhow!("fixture {name} not found in {}", dir.display())),
            None => Err(anyhow!("fixture {name} is not available")),
        }
    }

    pub fn missing(&self) -> &[&'static str] {
        &self.missing
    }

    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_synthetic_has_everything() {
        let f = Fixtures::synthetic();
        for name in FIXTURE_FILES {
            assert!(!f.get(name).unwrap().is_empty(), "{name}");
        }
        assert!(f.missing().is_empty());
        assert!(f.source().is_none());
        assert!(f.get("nope.bin").is_err());
    }

    #[test]
    fn test_load_records_missing_files() {
        let root = std::env::temp_dir().join(format!("modelcheck-fixtures-{}", uuid::Uuid::new_v4()));
        let dir = Fixtures::data_dir(&root);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join(DOG_IMG), b"jpeg").unwrap();

        let f = Fixtures::load(&root).unwrap();
        assert_eq!(f.source(), Some(dir.as_path()));
        assert_eq!(f.get(DOG_IMG).unwrap(), b"jpeg");
        assert_eq!(f.missing().len(), FIXTURE_FILES.len() - 1);
        let err = f.get(CLS_MODEL).unwrap_err().to_string();
        assert!(err.contains(CLS_MODEL), "{err}");

        std::fs::remove_dir_all(&root).unwrap();
        assert!(Fixtures::load(&root).is_err());
    }
}
