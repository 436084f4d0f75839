//! Hot-reloadable `dashboard.security.allowed-roles`.
//!
//! The allowed-role list for dashboard routes is the one setting spec.md
//! §4.5/§6 requires to reload without a restart. It's held behind an
//! `arc_swap::ArcSwap` so readers (`AuthorizationEvaluator`) never block,
//! and refreshed by a `notify`-driven watcher over a small roles file —
//! in-flight authorization decisions already computed are unaffected,
//! since each evaluation reads a fresh `Arc` snapshot at call time.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use arc_swap::ArcSwap;
use notify::{Event, RecursiveMode, Watcher};
use serde::Deserialize;
use tracing::{debug, error, info, warn};

/// Live, swappable view of the dashboard's allowed-role policy.
pub struct DynamicAllowedRoles {
    roles: ArcSwap<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct RolesFile {
    #[serde(rename = "allowed-roles", alias = "allowed_roles")]
    allowed_roles: Vec<String>,
}

impl DynamicAllowedRoles {
    pub fn new(initial: Vec<String>) -> Arc<Self> {
        Arc::new(Self {
            roles: ArcSwap::from_pointee(initial),
        })
    }

    /// Current snapshot, cheap to call on every authorization check.
    pub fn current(&self) -> Arc<Vec<String>> {
        self.roles.load_full()
    }

    pub fn set(&self, roles: Vec<String>) {
        self.roles.store(Arc::new(roles));
    }

    fn reload_from_file(&self, path: &Path) {
        match std::fs::read_to_string(path) {
            Ok(contents) => match parse_roles_file(&contents, path) {
                Ok(roles) => {
                    info!(?roles, "dashboard.security.allowed-roles reloaded");
                    self.set(roles);
                }
                Err(e) => warn!("failed to parse allowed-roles file {}: {e}", path.display()),
            },
            Err(e) => warn!("failed to read allowed-roles file {}: {e}", path.display()),
        }
    }
}

fn parse_roles_file(contents: &str, path: &Path) -> anyhow::Result<Vec<String>> {
    let is_json = path.extension().and_then(|e| e.to_str()) == Some("json");
    let parsed: RolesFile = if is_json {
        serde_json::from_str(contents)?
    } else {
        toml::from_str(contents)?
    };
    Ok(parsed.allowed_roles)
}

/// Spawn a background file watcher that reloads `roles` whenever `path`
/// changes on disk. Returns the watcher handle; drop it to stop watching.
///
/// Mirrors the teacher's config-file watcher: a `notify` recommended
/// watcher feeding a channel drained by a dedicated task, rather than
/// calling back directly from the filesystem thread.
pub fn watch_allowed_roles_file(path: PathBuf, roles: Arc<DynamicAllowedRoles>) -> Option<notify::RecommendedWatcher> {
    if !path.exists() {
        debug!(
            path = %path.display(),
            "no allowed-roles file configured; hot-reload watcher not started"
        );
        return None;
    }

    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<notify::Result<Event>>();

    let mut watcher = match notify::recommended_watcher(move |res| {
        let _ = tx.send(res);
    }) {
        Ok(w) => w,
        Err(e) => {
            error!("failed to build allowed-roles file watcher: {e}");
            return None;
        }
    };

    if let Err(e) = watcher.watch(&path, RecursiveMode::NonRecursive) {
        error!("failed to watch allowed-roles file {}: {e}", path.display());
        return None;
    }

    roles.reload_from_file(&path);

    tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            match event {
                Ok(event) if event.kind.is_modify() || event.kind.is_create() => {
                    roles.reload_from_file(&path);
                }
                Ok(_) => {}
                Err(e) => warn!("allowed-roles watcher error: {e}"),
            }
        }
    });

    Some(watcher)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn current_reflects_initial_value() {
        let roles = DynamicAllowedRoles::new(vec!["ADMIN".to_string()]);
        assert_eq!(*roles.current(), vec!["ADMIN".to_string()]);
    }

    #[test]
    fn set_replaces_the_snapshot_atomically() {
        let roles = DynamicAllowedRoles::new(vec!["ADMIN".to_string()]);
        let before = roles.current();
        roles.set(vec!["DEVELOPER".to_string()]);
        assert_eq!(*before, vec!["ADMIN".to_string()]);
        assert_eq!(*roles.current(), vec!["DEVELOPER".to_string()]);
    }

    #[test]
    fn parses_toml_roles_file() {
        let toml = "allowed-roles = [\"ADMIN\", \"DEVELOPER\"]\n";
        let roles = parse_roles_file(toml, Path::new("roles.toml")).unwrap();
        assert_eq!(roles, vec!["ADMIN".to_string(), "DEVELOPER".to_string()]);
    }

    #[test]
    fn parses_json_roles_file() {
        let json = r#"{"allowed_roles": ["ADMIN"]}"#;
        let roles = parse_roles_file(json, Path::new("roles.json")).unwrap();
        assert_eq!(roles, vec!["ADMIN".to_string()]);
    }
}
