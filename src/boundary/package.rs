/*!
 * Module Packages
 * A package file on disk plus its optional `<package>.config` settings
 */

use crate::core::errors::{ModuleError, ModuleResult};
use crate::core::limits::PACKAGE_CONFIG_SUFFIX;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// String settings delivered to a module at load time
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PackageSettings(BTreeMap<String, String>);

impl PackageSettings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// One discovered module package; immutable once opened
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModulePackage {
    path: PathBuf,
    stem: String,
    config_path: Option<PathBuf>,
    settings: PackageSettings,
}

impl ModulePackage {
    /// Open a package and read its configuration file if one exists
    pub fn open(path: impl AsRef<Path>) -> ModuleResult<Self> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(ModuleError::load(format!(
                "module package not found: {}",
                path.display()
            )));
        }

        let path = path.canonicalize().map_err(|e| {
            ModuleError::load(format!("cannot resolve {}: {}", path.display(), e))
        })?;
        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| {
                ModuleError::load(format!("malformed package name: {}", path.display()))
            })?
            .to_string();

        let config_path = Self::config_path_for(&path);
        let (config_path, settings) = if config_path.is_file() {
            let settings = Self::read_settings(&config_path)?;
            (Some(config_path), settings)
        } else {
            (None, PackageSettings::default())
        };

        Ok(Self {
            path,
            stem,
            config_path,
            settings,
        })
    }

    /// `<package path>.config`
    pub fn config_path_for(path: &Path) -> PathBuf {
        let mut name = OsString::from(path.as_os_str());
        name.push(".");
        name.push(PACKAGE_CONFIG_SUFFIX);
        PathBuf::from(name)
    }

    fn read_settings(config_path: &Path) -> ModuleResult<PackageSettings> {
        let text = std::fs::read_to_string(config_path).map_err(|e| {
            ModuleError::load(format!("cannot read {}: {}", config_path.display(), e))
        })?;
        serde_json::from_str(&text).map_err(|e| {
            ModuleError::load(format!(
                "malformed package configuration {}: {}",
                config_path.display(),
                e
            ))
        })
    }

    #[inline]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[inline]
    pub fn stem(&self) -> &str {
        &self.stem
    }

    /// Directory the package lives in; the boundary's working directory
    pub fn directory(&self) -> &Path {
        self.path.parent().unwrap_or_else(|| Path::new("."))
    }

    pub fn config_path(&self) -> Option<&Path> {
        self.config_path.as_deref()
    }

    pub fn settings(&self) -> &PackageSettings {
        &self.settings
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_package_is_a_load_error() {
        let err = ModulePackage::open("/definitely/not/here.module").unwrap_err();
        assert_eq!(err.kind(), crate::core::errors::FaultKind::Load);
    }

    #[test]
    fn test_settings_are_read_from_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let package = dir.path().join("shapes.module");
        std::fs::write(&package, b"").unwrap();
        std::fs::write(
            ModulePackage::config_path_for(&package),
            r#"{ "color": "red", "width": "3" }"#,
        )
        .unwrap();

        let opened = ModulePackage::open(&package).unwrap();
        assert_eq!(opened.stem(), "shapes");
        assert_eq!(opened.settings().get("color"), Some("red"));
        assert!(opened.config_path().is_some());
    }

    #[test]
    fn test_malformed_config_fails_the_package() {
        let dir = tempfile::tempdir().unwrap();
        let package = dir.path().join("broken.module");
        std::fs::write(&package, b"").unwrap();
        std::fs::write(ModulePackage::config_path_for(&package), "{ not json").unwrap();

        assert!(ModulePackage::open(&package).is_err());
    }
}
