//! Config command handlers

use std::path::PathBuf;

use anyhow::{bail, Context, Result};

use pagewatch_core::{Config, RemoteConfig};

use crate::output::{Output, OutputFormat};

const VALID_KEYS: &str = "data_dir, backend, chunk_size, publish_per_chunk, log_level, \
                          remote.api_url, remote.owner, remote.repo, remote.branch, \
                          remote.snapshot_dir, remote.archive_path, remote.commit_message, \
                          remote.max_attempts, remote.timeout_secs";

/// Show current configuration
pub fn show(config_path: Option<&PathBuf>, output: &Output) -> Result<()> {
    let config =
        Config::load_with_cli_override(config_path).context("Failed to load configuration")?;

    match output.format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::json!({
                    "data_dir": config.data_dir,
                    "backend": config.backend.to_string(),
                    "chunk_size": config.chunk_size,
                    "publish_per_chunk": config.publish_per_chunk,
                    "log_level": config.log_level,
                    "remote": config.remote,
                })
            );
        }
        OutputFormat::Quiet => {
            println!("{}", config.data_dir.display());
        }
        OutputFormat::Human => {
            let effective_path = config_path
                .cloned()
                .unwrap_or_else(Config::config_file_path);
            println!("Configuration:");
            println!("  data_dir:          {}", config.data_dir.display());
            println!("  backend:           {}", config.backend);
            println!("  chunk_size:        {}", config.chunk_size);
            println!("  publish_per_chunk: {}", config.publish_per_chunk);
            println!(
                "  log_level:         {}",
                config.log_level.as_deref().unwrap_or("(not set)")
            );
            match &config.remote {
                Some(remote) => {
                    println!("  remote.api_url:        {}", remote.api_url);
                    println!("  remote.owner:          {}", or_unset(&remote.owner));
                    println!("  remote.repo:           {}", or_unset(&remote.repo));
                    println!("  remote.branch:         {}", remote.branch);
                    println!("  remote.snapshot_dir:   {}", remote.snapshot_dir);
                    println!("  remote.archive_path:   {}", remote.archive_path);
                    println!("  remote.commit_message: {}", remote.commit_message);
                    println!("  remote.max_attempts:   {}", remote.max_attempts);
                    println!("  remote.timeout_secs:   {}", remote.timeout_secs);
                }
                None => println!("  remote:            (not set)"),
            }
            println!();
            println!("Config file: {}", effective_path.display());
        }
    }

    Ok(())
}

/// Set a configuration value
pub fn set(
    key: String,
    value: String,
    config_path: Option<&PathBuf>,
    output: &Output,
) -> Result<()> {
    let mut config =
        Config::load_with_cli_override(config_path).context("Failed to load configuration")?;

    apply(&mut config, &key, &value)?;

    // Save to the CLI-specified path or default
    let save_path = config_path
        .cloned()
        .unwrap_or_else(Config::config_file_path);
    config
        .save_to_path(&save_path)
        .context("Failed to save configuration")?;

    output.success(&format!("Set {} = {}", key, value));

    Ok(())
}

fn apply(config: &mut Config, key: &str, value: &str) -> Result<()> {
    if let Some(field) = key.strip_prefix("remote.") {
        let remote = config.remote.get_or_insert_with(RemoteConfig::default);
        return apply_remote(remote, field, value)
            .with_context(|| format!("Invalid value for {}", key));
    }

    match key {
        "data_dir" => config.data_dir = value.into(),
        "backend" => config.backend = value.parse()?,
        "chunk_size" => {
            config.chunk_size = value
                .parse()
                .context("Invalid value for chunk_size. Use a positive number.")?;
        }
        "publish_per_chunk" => {
            config.publish_per_chunk = value
                .parse()
                .context("Invalid value for publish_per_chunk. Use 'true' or 'false'.")?;
        }
        "log_level" => config.log_level = optional(value),
        _ => bail!(
            "Unknown configuration key: '{}'\nValid keys: {}",
            key,
            VALID_KEYS
        ),
    }
    Ok(())
}

fn apply_remote(remote: &mut RemoteConfig, field: &str, value: &str) -> Result<()> {
    match field {
        "api_url" => remote.api_url = value.to_string(),
        "owner" => remote.owner = value.to_string(),
        "repo" => remote.repo = value.to_string(),
        "branch" => remote.branch = value.to_string(),
        "snapshot_dir" => remote.snapshot_dir = value.to_string(),
        "archive_path" => remote.archive_path = value.to_string(),
        "commit_message" => remote.commit_message = value.to_string(),
        "max_attempts" => remote.max_attempts = value.parse()?,
        "timeout_secs" => remote.timeout_secs = value.parse()?,
        _ => bail!(
            "Unknown configuration key: 'remote.{}'\nValid keys: {}",
            field,
            VALID_KEYS
        ),
    }
    Ok(())
}

fn optional(value: &str) -> Option<String> {
    if value.is_empty() || value == "none" {
        None
    } else {
        Some(value.to_string())
    }
}

fn or_unset(value: &str) -> &str {
    if value.is_empty() {
        "(not set)"
    } else {
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pagewatch_core::BackendKind;

    #[test]
    fn test_apply_top_level_keys() {
        let mut config = Config::default();
        apply(&mut config, "backend", "archive").unwrap();
        apply(&mut config, "chunk_size", "10").unwrap();
        apply(&mut config, "publish_per_chunk", "true").unwrap();
        apply(&mut config, "log_level", "debug").unwrap();

        assert_eq!(config.backend, BackendKind::Archive);
        assert_eq!(config.chunk_size, 10);
        assert!(config.publish_per_chunk);
        assert_eq!(config.log_level.as_deref(), Some("debug"));

        apply(&mut config, "log_level", "none").unwrap();
        assert!(config.log_level.is_none());
    }

    #[test]
    fn test_apply_creates_remote_section() {
        let mut config = Config::default();
        apply(&mut config, "remote.owner", "lcn").unwrap();
        apply(&mut config, "remote.repo", "watch-data").unwrap();

        let remote = config.active_remote().unwrap();
        assert_eq!(remote.owner, "lcn");
        assert_eq!(remote.branch, "main");
    }

    #[test]
    fn test_apply_rejects_bad_input() {
        let mut config = Config::default();
        assert!(apply(&mut config, "sync_url", "x").is_err());
        assert!(apply(&mut config, "backend", "sqlite").is_err());
        assert!(apply(&mut config, "chunk_size", "many").is_err());
        assert!(apply(&mut config, "remote.max_attempts", "-1").is_err());
        assert!(apply(&mut config, "remote.color", "blue").is_err());
    }
}
