use std::path::PathBuf;

/// Application-level constants
pub const APP_NAME: &str = "Docflow";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Days before expiry at which a document counts as expiring soon.
pub const DEFAULT_EXPIRING_HORIZON_DAYS: i64 = 30;

/// Classification HTTP call budget.
pub const DEFAULT_CLASSIFIER_TIMEOUT_SECS: u64 = 60;

/// Attempts before a validation job is dead-lettered.
pub const DEFAULT_MAX_ATTEMPTS: i64 = 6;

/// Minutes before a worker's processing claim is considered abandoned.
pub const DEFAULT_VISIBILITY_TIMEOUT_MINUTES: i64 = 10;

/// Manual re-validation budget: triggers per document per window.
pub const DEFAULT_MANUAL_TRIGGER_LIMIT: i64 = 3;
pub const DEFAULT_MANUAL_TRIGGER_WINDOW_MINUTES: i64 = 60;

/// Messages fetched per account drain.
pub const DEFAULT_INTAKE_BATCH_SIZE: usize = 50;

/// Default tracing filter when RUST_LOG is unset.
pub const DEFAULT_LOG_FILTER: &str = "docflow=info";

/// Get the application data directory, ~/Docflow/ on all platforms.
pub fn app_data_dir() -> PathBuf {
    let home = dirs::home_dir().expect("Cannot determine home directory");
    home.join("Docflow")
}

/// Get the default database path.
pub fn database_path() -> PathBuf {
    app_data_dir().join("docflow.db")
}

/// Get the default root for local document storage.
pub fn local_storage_root() -> PathBuf {
    app_data_dir().join("documents")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn app_data_dir_under_home() {
        let dir = app_data_dir();
        let home = dirs::home_dir().unwrap();
        assert!(dir.starts_with(home));
        assert!(dir.ends_with("Docflow"));
    }

    #[test]
    fn database_path_under_app_data() {
        let db = database_path();
        assert!(db.starts_with(app_data_dir()));
        assert!(db.ends_with("docflow.db"));
    }

    #[test]
    fn app_version_matches_cargo() {
        assert_eq!(APP_VERSION, "0.3.0");
    }
}
