use directories::ProjectDirs;
use std::path::PathBuf;

// System locations used when dev mode is off; DevMode handles the local layout

pub fn system_data_dir() -> PathBuf {
    PathBuf::from("/var/lib/facegate")
}

pub fn system_config_file() -> PathBuf {
    PathBuf::from("/etc/facegate/facegate.toml")
}

pub fn system_socket_path() -> PathBuf {
    PathBuf::from("/run/facegate/service.sock")
}

pub fn dev_socket_path() -> PathBuf {
    PathBuf::from("/tmp/facegate.sock")
}

pub fn dev_config_file() -> PathBuf {
    PathBuf::from("configs/facegate.toml")
}

/// Per-user override, e.g. `~/.config/facegate/facegate.toml`.
pub fn user_config_file() -> Option<PathBuf> {
    ProjectDirs::from("com", "facegate", "facegate").map(|dirs| dirs.config_dir().join("facegate.toml"))
}

/// Config files to try, most specific first.
pub fn config_candidates(dev_mode: bool) -> Vec<PathBuf> {
    let mut candidates = Vec::new();
    if dev_mode {
        candidates.push(dev_config_file());
    }
    candidates.extend(user_config_file());
    candidates.push(system_config_file());
    candidates
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dev_mode_prefers_repo_config() {
        let dev = config_candidates(true);
        assert_eq!(dev.first(), Some(&dev_config_file()));
        assert_eq!(dev.last(), Some(&system_config_file()));

        let system = config_candidates(false);
        assert!(!system.contains(&dev_config_file()));
    }
}
