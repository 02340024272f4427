use anyhow::Result;
use clap::Parser;
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::PathBuf;

pub const DEV_SECRET: &str = "dev_secret";

#[derive(Parser, Debug)]
#[command(name = "arkiv")]
#[command(about = "Runs the arkiv catalog administration service", long_about = None)]
pub struct Cli {
    #[arg(short = 'c', long = "config")]
    pub config_path: Option<String>,
}

pub fn default_config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".arkiv")
}

pub fn default_config_path() -> PathBuf {
    default_config_dir().join("config.yaml")
}

/// Which storage backend to run against. Memory is an explicit choice for
/// local and demo runs; it is never selected as a fallback when the durable
/// backend fails to open.
#[derive(Debug, Deserialize, Default, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageKind {
    #[default]
    Libsql,
    Memory,
}

fn default_database() -> String {
    "arkiv.db".to_string()
}

fn default_upload_dir() -> String {
    "static/uploads".to_string()
}

fn default_session_secret() -> String {
    env::var("SESSION_SECRET").unwrap_or_else(|_| DEV_SECRET.to_string())
}

#[derive(Debug, Deserialize, Clone)]
pub struct App {
    port: i32,
    #[serde(default = "default_database")]
    database: String,
    #[serde(default)]
    pub storage: StorageKind,
    #[serde(default = "default_upload_dir")]
    upload_dir: String,
    #[serde(default = "default_session_secret")]
    session_secret: String,
}

impl App {
    pub fn get_port(&self) -> i32 {
        self.port
    }

    pub fn get_db(&self) -> &str {
        &self.database
    }

    pub fn get_upload_dir(&self) -> &str {
        &self.upload_dir
    }

    pub fn get_session_secret(&self) -> &str {
        &self.session_secret
    }

    /// True when the session secret is the insecure development fallback.
    /// Production deployments must set SESSION_SECRET.
    pub fn uses_dev_secret(&self) -> bool {
        self.session_secret == DEV_SECRET
    }
}

#[derive(Debug, Deserialize)]
pub struct Config {
    pub app: App,
}

impl Config {
    pub fn new(path: &str) -> Result<Self> {
        let cfg = Config::load_config(path)?;
        Ok(cfg)
    }

    fn load_config(path: &str) -> Result<Config> {
        let yaml_str = fs::read_to_string(path)?;
        let yaml_with_env = Config::substitute_env_vars(&yaml_str)?;
        let config: Config = serde_yaml::from_str(&yaml_with_env)?;
        Ok(config)
    }

    fn substitute_env_vars(yaml_str: &str) -> Result<String> {
        let mut result = yaml_str.to_string();
        let mut offset = 0;

        while let Some(start) = result[offset..].find("${") {
            let actual_start = offset + start;
            if let Some(end) = result[actual_start..].find("}") {
                let var_name = &result[actual_start + 2..actual_start + end];

                // Handle default values like ${VAR:-default}
                let env_value = if let Some(default_start) = var_name.find(":-") {
                    let actual_var = &var_name[..default_start];
                    let default_val = &var_name[default_start + 2..];
                    env::var(actual_var).unwrap_or_else(|_| default_val.to_string())
                } else {
                    env::var(var_name).unwrap_or_else(|_| {
                        tracing::warn!("environment variable '{}' not found", var_name);
                        String::new()
                    })
                };

                result.replace_range(actual_start..actual_start + end + 1, &env_value);
                offset = actual_start + env_value.len();
            } else {
                break;
            }
        }

        Ok(result)
    }
}
