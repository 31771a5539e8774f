use std::{env, path::PathBuf, sync::OnceLock};
use tokio::{fs::{create_dir_all, read_to_string, File}, io::AsyncWriteExt, sync::Mutex};
use serde::{Deserialize, Serialize};
use clap::Parser;
use crate::{error::Error, model::matcher::DEFAULT_THRESHOLD, tools::log::{log_info, LogServiceType}, Result};


static CONFIG: OnceLock<Mutex<ServerConfig>> = OnceLock::new();


const ENV_DIR: &str = "FACEID_DIR";
const ENV_PORT: &str = "FACEID_PORT";
const ENV_MODEL: &str = "FACEID_MODEL";
const ENV_THRESHOLD: &str = "FACEID_THRESHOLD";

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ServerConfig {
    pub port: Option<u16>,
    /// Bind host
    pub local: Option<String>,
    /// Embedding model, relative paths are resolved against the data dir.
    pub model: Option<String>,
    pub threshold: Option<f32>,
    #[serde(default = "default_intra_threads")]
    pub intra_threads: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { port: None, local: None, model: None, threshold: None, intra_threads: default_intra_threads() }
    }
}

#[derive(Parser, Debug, Default)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Data directory holding config.json, the database and models
    #[arg(short, long)]
    dir: Option<String>,

    #[arg(short, long)]
    port: Option<u16>,

    /// Path to the ONNX embedding model
    #[arg(short, long)]
    model: Option<String>,

    #[arg(short = 'k', long)]
    docker: bool,
}

fn default_intra_threads() -> usize {
    4
}

fn args() -> Args {
    // test harness arguments are not ours
    if cfg!(test) {
        Args::default()
    } else {
        Args::parse()
    }
}

pub async fn initialize_config() -> Result<ServerConfig> {
    let local_path = get_server_local_path().await?;
    log_info(LogServiceType::Register, format!("LocalPath: {:?}", local_path));
    let config = get_config_with_overrides().await?;
    let _ = CONFIG.set(Mutex::new(config.clone()));
    Ok(config)
}

pub async fn get_server_local_path() -> Result<PathBuf> {
    let args = args();

    let dir_path = if let Some(argdir) = args.dir {
        PathBuf::from(&argdir)
    } else if let Ok(val) = env::var(ENV_DIR) {
        PathBuf::from(&val)
    } else if args.docker {
        PathBuf::from("/config")
    } else {
        let Some(mut dir_path) = dirs::config_local_dir() else { return Err(Error::ServerUnableToAccessServerLocalFolder); };
        dir_path.push("faceid");
        dir_path
    };

    let Ok(_) = create_dir_all(&dir_path).await else { return Err(Error::ServerUnableToAccessServerLocalFolder); };

    Ok(dir_path)
}

pub async fn get_config() -> Result<ServerConfig> {
    if let Some(config) = CONFIG.get() {
        let guard = config.lock().await;
        return Ok(guard.clone());
    }
    let config = get_config_with_overrides().await?;
    let config = CONFIG.get_or_init(|| Mutex::new(config));
    let guard = config.lock().await;
    Ok(guard.clone())
}

pub async fn get_config_with_overrides() -> Result<ServerConfig> {
    let config = get_raw_config().await?;
    Ok(apply_overrides(config, &args()))
}

/// Command line wins over environment, environment wins over config.json.
fn apply_overrides(mut config: ServerConfig, args: &Args) -> ServerConfig {
    if let Some(port) = args.port.or_else(|| env::var(ENV_PORT).ok().and_then(|p| p.parse::<u16>().ok())) {
        config.port = Some(port);
    }
    if let Some(model) = args.model.clone().or_else(|| env::var(ENV_MODEL).ok()) {
        config.model = Some(model);
    }
    if let Some(threshold) = env::var(ENV_THRESHOLD).ok().and_then(|t| t.parse::<f32>().ok()) {
        config.threshold = Some(threshold);
    }
    config
}

pub async fn get_raw_config() -> Result<ServerConfig> {
    let mut dir_path: PathBuf = get_server_local_path().await?;
    dir_path.push("config.json");

    if let Ok(data) = read_to_string(dir_path.clone()).await {
        let Ok(config) = serde_json::from_str::<ServerConfig>(&data) else { return Err(Error::ServerMalformatedConfigFile); };
        Ok(config)
    } else {
        let new_config: ServerConfig = serde_json::from_str(r#"{}"#)?;
        let new_config_string = serde_json::to_string(&new_config)?;

        let Ok(mut file) = File::create(dir_path).await else { return Err(Error::ServerUnableToWriteConfig); };
        if file.write_all(new_config_string.as_bytes()).await.is_err() {
            return Err(Error::ServerUnableToWriteConfig);
        }
        Ok(new_config)
    }
}

pub async fn get_server_bind_address() -> Result<String> {
    let config = get_config().await?;
    let host = config.local.unwrap_or_else(|| "127.0.0.1".to_string());
    Ok(format!("{}:{}", host, config.port.unwrap_or(8080)))
}

pub async fn get_threshold() -> Result<f32> {
    Ok(get_config().await?.threshold.unwrap_or(DEFAULT_THRESHOLD))
}

pub async fn get_model_path() -> Result<PathBuf> {
    let config = get_config().await?;
    let model = PathBuf::from(config.model.unwrap_or_else(|| "models/mobilefacenet.onnx".to_string()));
    if model.is_absolute() {
        Ok(model)
    } else {
        let mut dir_path = get_server_local_path().await?;
        dir_path.push(model);
        Ok(dir_path)
    }
}

pub async fn get_server_file_path_array(mut names: Vec<&str>) -> Result<PathBuf> {
    let mut dir_path: PathBuf = get_server_local_path().await?;
    if let Some(last) = names.pop() {
        for name in names {
            dir_path.push(name);
        }
        create_dir_all(&dir_path).await?;
        dir_path.push(last);
    }
    Ok(dir_path)
}
