use crate::{HOME_PLACEHOLDER, PREFIX_PLACEHOLDER};
use std::path::{Path, PathBuf};

/// The package a service belongs to.
///
/// Definition blocks reach through this to build command lines, e.g.
/// `owner.opt_bin().join("redis-server")`. Directory accessors default to the
/// usual layout under [`Owner::prefix`] and [`Owner::root`].
pub trait Owner: Send + Sync {
    fn name(&self) -> &str;

    /// launchd label, e.g. `org.example.redis`.
    fn plist_name(&self) -> String;

    /// systemd unit name, e.g. `example.redis`.
    fn service_name(&self) -> String;

    /// Installation root shared by every package (`etc`, `var` live here).
    fn root(&self) -> &Path;

    /// Versioned installation directory of this package.
    fn prefix(&self) -> &Path;

    /// Stable, version-independent link to [`Owner::prefix`].
    fn opt_prefix(&self) -> PathBuf {
        self.root().join("opt").join(self.name())
    }

    fn bin(&self) -> PathBuf {
        self.prefix().join("bin")
    }

    fn sbin(&self) -> PathBuf {
        self.prefix().join("sbin")
    }

    fn lib(&self) -> PathBuf {
        self.prefix().join("lib")
    }

    fn libexec(&self) -> PathBuf {
        self.prefix().join("libexec")
    }

    fn opt_bin(&self) -> PathBuf {
        self.opt_prefix().join("bin")
    }

    fn opt_sbin(&self) -> PathBuf {
        self.opt_prefix().join("sbin")
    }

    fn opt_libexec(&self) -> PathBuf {
        self.opt_prefix().join("libexec")
    }

    fn etc(&self) -> PathBuf {
        self.root().join("etc")
    }

    fn var(&self) -> PathBuf {
        self.root().join("var")
    }

    fn log_dir(&self) -> PathBuf {
        self.var().join("log")
    }
}

/// Local values the placeholder tokens stand for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalPaths {
    pub prefix: PathBuf,
    pub home: PathBuf,
}

impl LocalPaths {
    pub fn new(prefix: impl Into<PathBuf>, home: impl Into<PathBuf>) -> Self {
        Self {
            prefix: prefix.into(),
            home: home.into(),
        }
    }

    /// Replaces the prefix token, then the home token.
    pub fn substitute(&self, value: &str) -> String {
        let replaced = value
            .replace(PREFIX_PLACEHOLDER, &self.prefix.to_string_lossy())
            .replace(HOME_PLACEHOLDER, &self.home.to_string_lossy());
        if replaced != value {
            log::trace!("substituted placeholders: {} -> {}", value, replaced);
        }
        replaced
    }
}

/// Expands a leading `~` to the invoking user's home directory.
pub fn expand_tilde(value: &str) -> String {
    let rest = match value.strip_prefix('~') {
        Some(rest) if rest.is_empty() || rest.starts_with('/') => rest,
        _ => return value.to_string(),
    };

    match dirs::home_dir() {
        Some(home) => format!("{}{}", home.to_string_lossy(), rest),
        None => value.to_string(),
    }
}
