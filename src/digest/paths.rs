use anyhow::Result;
use std::env;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct KetchupPaths {
    pub ketchup_home: PathBuf,
    pub store_file: PathBuf,
    pub logs_dir: PathBuf,
    pub audit_log: PathBuf,
    pub watch_lock: PathBuf,
}

fn required_home_dir() -> Result<PathBuf> {
    if let Some(home) = dirs::home_dir() {
        return Ok(home);
    }
    Err(anyhow::anyhow!("HOME directory could not be resolved"))
}

fn env_or_default_path(var: &str, fallback: PathBuf) -> PathBuf {
    match env::var(var) {
        Ok(v) if !v.trim().is_empty() => PathBuf::from(v.trim()),
        _ => fallback,
    }
}

pub fn resolve_paths() -> Result<KetchupPaths> {
    let ketchup_home = match env::var("KETCHUP_HOME") {
        Ok(v) if !v.trim().is_empty() => PathBuf::from(v.trim()),
        _ => required_home_dir()?.join("ketchup"),
    };

    let store_file = env_or_default_path("KETCHUP_STORE_FILE", ketchup_home.join("store.json"));
    let logs_dir = env_or_default_path("KETCHUP_LOGS_DIR", ketchup_home.join("logs"));
    let audit_log = logs_dir.join("audit.log");
    let watch_lock = logs_dir.join("watch.lock");

    Ok(KetchupPaths {
        ketchup_home,
        store_file,
        logs_dir,
        audit_log,
        watch_lock,
    })
}
