use tracing_subscriber::EnvFilter;

pub enum LogServiceType {
    Register,
    Database,
    Recognition,
    Other
}
impl LogServiceType {
    fn as_str(&self) -> &'static str {
        match self {
            LogServiceType::Register => "REGISTER",
            LogServiceType::Database => "DATABASE",
            LogServiceType::Recognition => "RECOGNITION",
            LogServiceType::Other => "OTHER"
        }
    }
}

/// Installs the global subscriber. `RUST_LOG` wins over the default `info` level.
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

pub fn log_debug(service: LogServiceType, message: String) {
    tracing::debug!(service = service.as_str(), "{}", message)
}

pub fn log_info(service: LogServiceType, message: String) {
    tracing::info!(service = service.as_str(), "{}", message)
}

pub fn log_warn(service: LogServiceType, message: String) {
    tracing::warn!(service = service.as_str(), "{}", message)
}

pub fn log_error(service: LogServiceType, message: String) {
    tracing::error!(service = service.as_str(), "{}", message)
}
