//! Loading pool definitions from disk.

use std::path::Path;

use anyhow::{Context, Result};
use rotor_rotator::Pool;

use crate::error::CliError;

/// Parse a pool definition, choosing the format by file extension.
pub fn load_pool(path: &Path) -> Result<Pool> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read pool file: {}", path.display()))?;

    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or_default();

    let invalid = |message: String| CliError::InvalidPoolFile {
        path: path.display().to_string(),
        message,
    };

    let pool = match extension {
        "json" => serde_json::from_str(&contents).map_err(|e| invalid(e.to_string()))?,
        "toml" => toml::from_str(&contents).map_err(|e| invalid(e.to_string()))?,
        other => return Err(CliError::UnsupportedPoolFile(other.to_string()).into()),
    };

    Ok(pool)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rotor_rotator::hasher::{PoolHasher, ScaleSetHasher};
    use rotor_rotator::PoolRole;

    const POOL_JSON: &str = r##"{
        "name": "master",
        "role": "master",
        "count": 3,
        "vm_size": "Standard_D4s_v3",
        "image": {
            "publisher": "redhat",
            "offer": "osa",
            "sku": "osa_311",
            "version": "311.43.20181121"
        },
        "startup_script": "#!/bin/bash\n"
    }"##;

    const POOL_TOML: &str = r##"
name = "master"
role = "master"
count = 5
vm_size = "Standard_D4s_v3"
startup_script = "#!/bin/bash\n"

[image]
publisher = "redhat"
offer = "osa"
sku = "osa_311"
version = "311.43.20181121"
"##;

    fn write(dir: &tempfile::TempDir, name: &str, contents: &str) -> std::path::PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_loads_json_and_toml() {
        let dir = tempfile::tempdir().unwrap();

        let from_json = load_pool(&write(&dir, "master.json", POOL_JSON)).unwrap();
        let from_toml = load_pool(&write(&dir, "master.toml", POOL_TOML)).unwrap();

        assert_eq!(from_json.role, PoolRole::Master);
        assert_eq!(from_toml.count, 5);

        // Same configuration apart from count, so the same fingerprint.
        assert_eq!(
            ScaleSetHasher.hash_pool(&from_json).unwrap(),
            ScaleSetHasher.hash_pool(&from_toml).unwrap()
        );
    }

    #[test]
    fn test_rejects_unknown_extension() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_pool(&write(&dir, "master.yaml", "name: master")).unwrap_err();

        assert!(matches!(
            err.downcast_ref::<CliError>(),
            Some(CliError::UnsupportedPoolFile(ext)) if ext == "yaml"
        ));
    }

    #[test]
    fn test_reports_invalid_contents() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_pool(&write(&dir, "master.json", "{}")).unwrap_err();

        assert!(matches!(
            err.downcast_ref::<CliError>(),
            Some(CliError::InvalidPoolFile { .. })
        ));
    }
}
