pub use config::Config;
pub use once_cell::sync::OnceCell;
use std::error::Error;

static GLOBAL_CONFIG: OnceCell<Config> = OnceCell::new();

pub fn init_global_config(path: &str) -> Result<(), Box<dyn Error>> {
    let config = Config::builder()
        .add_source(config::File::with_name(path))
        .build()?;
    GLOBAL_CONFIG
        .set(config)
        .map_err(|_| "Config already set")?;
    Ok(())
}

pub fn get_global_config() -> &'static Config {
    GLOBAL_CONFIG.get().unwrap_or_else(|| {
        eprintln!("FATAL: Config not initialized - call init_global_config() first");
        std::process::exit(1);
    })
}

/// Get database connection URL from config
pub fn get_database_url(config: &Config) -> Result<String, Box<dyn Error + Send + Sync>> {
    config
        .get_string("database.url")
        .map_err(|e| format!("Missing database.url in config: {}", e).into())
}

/// Get the node endpoint list from config
pub fn get_rpc_endpoints(config: &Config) -> Result<Vec<String>, Box<dyn Error + Send + Sync>> {
    let endpoints: Vec<String> = config
        .get_array("rpc.endpoints")
        .map_err(|e| format!("Missing rpc.endpoints in config: {}", e))?
        .into_iter()
        .filter_map(|v| v.into_string().ok())
        .collect();
    if endpoints.is_empty() {
        return Err("rpc.endpoints must list at least one node".into());
    }
    Ok(endpoints)
}

/// Optional integer setting, absent keys read as None
pub fn get_optional_int(config: &Config, key: &str) -> Option<i64> {
    config.get_int(key).ok()
}
