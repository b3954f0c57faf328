use crate::config::EngineConfig;
use anyhow::{Context, Result};
use std::path::Path;
use tokio::fs;

/// Parse a YAML file and return the validated engine configuration
pub async fn parse_config_file<P: AsRef<Path>>(path: P) -> Result<EngineConfig> {
    let content = fs::read_to_string(&path)
        .await
        .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

    parse_config_string(&content)
}

/// Parse a YAML string and return the validated engine configuration.
/// An empty document yields the defaults.
pub fn parse_config_string(content: &str) -> Result<EngineConfig> {
    let config: EngineConfig = if content.trim().is_empty() {
        EngineConfig::default()
    } else {
        serde_yaml::from_str(content).with_context(|| "Failed to parse YAML content")?
    };

    validate_config(&config)?;
    Ok(config)
}

/// Check values serde cannot rule out on its own
pub fn validate_config(config: &EngineConfig) -> Result<()> {
    if config.preview.timeout_secs == 0 {
        anyhow::bail!("preview.timeout_secs must be greater than zero");
    }
    if config.preview.cache_capacity == 0 {
        anyhow::bail!("preview.cache_capacity must be greater than zero");
    }
    if config.upload.max_bytes == 0 {
        anyhow::bail!("upload.max_bytes must be greater than zero");
    }
    if config.draft_path.as_os_str().is_empty() {
        anyhow::bail!("draft_path cannot be empty");
    }
    if !(config.public_base_url.starts_with("http://") || config.public_base_url.starts_with("https://")) {
        anyhow::bail!(
            "public_base_url '{}' must start with http:// or https://",
            config.public_base_url
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::time::Duration;

    #[test]
    fn test_empty_document_uses_defaults() {
        let config = parse_config_string("").unwrap();
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.preview.timeout(), Duration::from_secs(10));
        assert_eq!(config.upload.max_bytes, 5 * 1024 * 1024);
    }

    #[test]
    fn test_partial_document_keeps_other_defaults() {
        let config = parse_config_string(
            r#"
database_url: postgresql://localhost/identry
draft_path: /tmp/identry/draft.json
preview:
  timeout_secs: 3
"#,
        )
        .unwrap();

        assert_eq!(config.database_url.as_deref(), Some("postgresql://localhost/identry"));
        assert_eq!(config.draft_path, PathBuf::from("/tmp/identry/draft.json"));
        assert_eq!(config.preview.timeout_secs, 3);
        assert_eq!(config.preview.cache_capacity, 10_000);
    }

    #[test]
    fn test_rejects_invalid_values() {
        assert!(parse_config_string("preview:\n  timeout_secs: 0\n").is_err());
        assert!(parse_config_string("upload:\n  max_bytes: 0\n").is_err());
        assert!(parse_config_string("public_base_url: identry.app\n").is_err());
        assert!(parse_config_string("preview: [1, 2]\n").is_err());
    }

    #[tokio::test]
    async fn test_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("identry.yaml");
        tokio::fs::write(&path, "public_base_url: https://identry.app\n")
            .await
            .unwrap();

        let config = parse_config_file(&path).await.unwrap();
        assert_eq!(config.public_base_url, "https://identry.app");
        assert!(parse_config_file(dir.path().join("missing.yaml")).await.is_err());
    }
}
