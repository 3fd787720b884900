use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result, bail};
use shared::config::Config;

/// Writes a default configuration file into `output_dir`.
///
/// # Arguments
/// * `format` - The format of the configuration file ("yaml" or "json").
/// * `output_dir` - Directory receiving `chatfeed.yaml` or `chatfeed.json`.
///
/// # Errors
/// Returns an error if the format is unsupported or if writing the file fails.
pub fn generate_config(format: &str, output_dir: &Path) -> Result<PathBuf> {
    let config = Config::with_defaults();
    let (file_name, serialized) = match format {
        "yaml" => ("chatfeed.yaml", serde_yml::to_string(&config)?),
        "json" => ("chatfeed.json", serde_json::to_string_pretty(&config)?),
        other => bail!("Unsupported format '{other}'. Use 'yaml' or 'json'."),
    };

    let path = output_dir.join(file_name);
    fs::write(&path, serialized)
        .with_context(|| format!("failed to write {}", path.display()))?;

    println!("Configuration file '{}' generated successfully.", path.display());
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn generated_yaml_loads_back_as_defaults() {
        let dir = TempDir::new().unwrap();
        let path = generate_config("yaml", dir.path()).unwrap();

        assert!(path.ends_with("chatfeed.yaml"));
        let loaded: Config = serde_yml::from_str(&fs::read_to_string(path).unwrap()).unwrap();
        assert_eq!(loaded, Config::with_defaults());
    }

    #[test]
    fn generated_json_loads_back_as_defaults() {
        let dir = TempDir::new().unwrap();
        let path = generate_config("json", dir.path()).unwrap();

        let loaded: Config = serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap();
        assert_eq!(loaded, Config::with_defaults());
    }

    #[test]
    fn unsupported_format_is_rejected() {
        let dir = TempDir::new().unwrap();
        let err = generate_config("toml", dir.path()).unwrap_err();
        assert!(err.to_string().contains("Unsupported format"));
        assert!(fs::read_dir(dir.path()).unwrap().next().is_none());
    }
}
