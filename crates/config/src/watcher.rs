use crate::schema::Config;
use arc_swap::ArcSwap;
use std::{path::PathBuf, sync::Arc};

/// Watches a configuration file for changes and hot-reloads on modification.
///
/// Environment overrides are re-applied on every reload.
pub struct ConfigWatcher {
    /// Current configuration, atomically swappable.
    current: Arc<ArcSwap<Config>>,
    /// Path to the configuration file.
    path: PathBuf,
}

impl ConfigWatcher {
    /// Creates a new watcher from a file path, loading the initial configuration immediately.
    ///
    /// # Errors
    ///
    /// Returns a [`figment::Error`] if the configuration file cannot be read or parsed.
    #[allow(clippy::result_large_err)]
    pub fn new(path: PathBuf) -> Result<Self, figment::Error> {
        let config = Config::load(Some(&path))?;
        Ok(Self {
            current: Arc::new(ArcSwap::from_pointee(config)),
            path,
        })
    }

    /// Returns a snapshot of the current configuration.
    #[must_use]
    pub fn load(&self) -> arc_swap::Guard<Arc<Config>> {
        self.current.load()
    }

    /// Returns a shareable `ArcSwap` handle (for the gateway and axum state).
    #[must_use]
    pub fn arc(&self) -> Arc<ArcSwap<Config>> {
        Arc::clone(&self.current)
    }

    /// Manually reloads the configuration from disk.
    ///
    /// # Errors
    ///
    /// Returns a [`figment::Error`] if the configuration file cannot be read or parsed;
    /// the previous configuration stays active.
    #[allow(clippy::result_large_err)]
    pub fn reload(&self) -> Result<(), figment::Error> {
        let new_config = Config::load(Some(&self.path))?;
        self.current.store(Arc::new(new_config));
        Ok(())
    }

    /// Starts background file watching (spawns a blocking tokio task) that
    /// automatically reloads the configuration when the file changes.
    ///
    /// # Errors
    ///
    /// Returns a [`notify::Error`] if the OS file watcher cannot be created or
    /// the config file cannot be registered for watching.
    pub fn watch(self: Arc<Self>) -> Result<(), notify::Error> {
        use notify::{RecursiveMode, Watcher as _};

        let (tx, rx) = std::sync::mpsc::channel();
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
            if res.is_ok() {
                let _ = tx.send(());
            }
        })?;
        watcher.watch(&self.path, RecursiveMode::NonRecursive)?;

        tokio::task::spawn_blocking(move || {
            // Keep the OS watcher alive for as long as events flow.
            let _watcher = watcher;
            for () in rx {
                match self.reload() {
                    Ok(()) => tracing::info!(path = %self.path.display(), "configuration reloaded"),
                    Err(e) => tracing::warn!(
                        path = %self.path.display(),
                        error = %e,
                        "configuration reload failed, keeping previous"
                    ),
                }
            }
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;

    fn write_config(path: &std::path::Path, content: &str) {
        let mut f = std::fs::File::create(path).unwrap();
        f.write_all(content.as_bytes()).unwrap();
    }

    #[test]
    fn test_watcher_initial_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        write_config(&path, "upstream:\n  base_url: https://a.test\n");
        let watcher = ConfigWatcher::new(path).unwrap();
        assert_eq!(watcher.load().upstream.base_url, "https://a.test");
    }

    #[test]
    fn test_watcher_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        write_config(&path, "upstream:\n  timeout_secs: 30\n");
        let watcher = ConfigWatcher::new(path.clone()).unwrap();
        assert_eq!(watcher.load().upstream.timeout_secs, 30);

        write_config(&path, "upstream:\n  timeout_secs: 5\n");
        watcher.reload().unwrap();
        assert_eq!(watcher.load().upstream.timeout_secs, 5);
    }

    #[test]
    fn test_failed_reload_keeps_previous() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        write_config(&path, "port: 1111\n");
        let watcher = ConfigWatcher::new(path.clone()).unwrap();

        write_config(&path, "port: [not, a, port\n");
        assert!(watcher.reload().is_err());
        assert_eq!(watcher.load().port, 1111);
    }

    #[test]
    fn test_watcher_arc_shared() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        write_config(&path, "port: 1111\n");
        let watcher = ConfigWatcher::new(path.clone()).unwrap();
        let arc = watcher.arc();

        write_config(&path, "port: 2222\n");
        watcher.reload().unwrap();
        assert_eq!(arc.load().port, 2222);
    }
}
