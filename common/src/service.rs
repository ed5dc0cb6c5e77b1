use crate::cron::{parse_cron, CronSchedule};
use crate::error::Result;
use crate::model::{KeepAlive, Platform, ProcessType, RunSpec, RunType, Sockets};
use crate::paths::{expand_tilde, Owner};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::sync::OnceLock;

/// Fully evaluated service settings. Read-only once a [`Service`] has run its
/// definition block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceSettings {
    run: Vec<String>,
    run_spec: Option<RunSpec>,
    run_type: RunType,
    process_type: Option<ProcessType>,
    keep_alive: Option<KeepAlive>,
    sockets: Option<Sockets>,
    cron: Option<CronSchedule>,
    interval: Option<u64>,
    environment_variables: BTreeMap<String, String>,
    working_dir: Option<String>,
    root_dir: Option<String>,
    input_path: Option<String>,
    log_path: Option<String>,
    error_log_path: Option<String>,
    run_at_load: Option<bool>,
    launch_only_once: Option<bool>,
    require_root: Option<bool>,
    macos_legacy_timers: Option<bool>,
    restart_delay: Option<u64>,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            run: Vec::new(),
            run_spec: None,
            run_type: RunType::default(),
            process_type: None,
            keep_alive: None,
            sockets: None,
            cron: None,
            interval: None,
            environment_variables: BTreeMap::new(),
            working_dir: None,
            root_dir: None,
            input_path: None,
            log_path: None,
            error_log_path: None,
            run_at_load: Some(true),
            launch_only_once: None,
            require_root: None,
            macos_legacy_timers: None,
            restart_delay: None,
        }
    }
}

impl ServiceSettings {
    /// Command resolved for the evaluating platform, before `~` expansion.
    pub fn run(&self) -> &[String] {
        &self.run
    }

    /// The run specification exactly as first given.
    pub fn run_spec(&self) -> Option<&RunSpec> {
        self.run_spec.as_ref()
    }

    pub fn run_type(&self) -> RunType {
        self.run_type
    }

    pub fn process_type(&self) -> Option<ProcessType> {
        self.process_type
    }

    pub fn keep_alive(&self) -> Option<&KeepAlive> {
        self.keep_alive.as_ref()
    }

    pub fn sockets(&self) -> Option<&Sockets> {
        self.sockets.as_ref()
    }

    pub fn cron(&self) -> Option<&CronSchedule> {
        self.cron.as_ref()
    }

    pub fn interval(&self) -> Option<u64> {
        self.interval
    }

    pub fn environment_variables(&self) -> &BTreeMap<String, String> {
        &self.environment_variables
    }

    pub fn working_dir(&self) -> Option<&str> {
        self.working_dir.as_deref()
    }

    pub fn root_dir(&self) -> Option<&str> {
        self.root_dir.as_deref()
    }

    pub fn input_path(&self) -> Option<&str> {
        self.input_path.as_deref()
    }

    pub fn log_path(&self) -> Option<&str> {
        self.log_path.as_deref()
    }

    pub fn error_log_path(&self) -> Option<&str> {
        self.error_log_path.as_deref()
    }

    pub fn run_at_load(&self) -> Option<bool> {
        self.run_at_load
    }

    pub fn launch_only_once(&self) -> Option<bool> {
        self.launch_only_once
    }

    pub fn require_root(&self) -> Option<bool> {
        self.require_root
    }

    pub fn macos_legacy_timers(&self) -> Option<bool> {
        self.macos_legacy_timers
    }

    pub fn restart_delay(&self) -> Option<u64> {
        self.restart_delay
    }
}

/// Validated setters handed to a definition block.
pub struct ServiceBuilder<'a> {
    owner: &'a dyn Owner,
    platform: Platform,
    settings: ServiceSettings,
}

impl<'a> ServiceBuilder<'a> {
    fn new(owner: &'a dyn Owner, platform: Platform) -> Self {
        Self {
            owner,
            platform,
            settings: ServiceSettings::default(),
        }
    }

    pub fn owner(&self) -> &'a dyn Owner {
        self.owner
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }

    /// Values assigned so far.
    pub fn settings(&self) -> &ServiceSettings {
        &self.settings
    }

    /// Sets the command. A per-platform spec without an entry for the
    /// evaluating platform leaves the resolved command untouched. The first
    /// non-empty spec is kept as the original form.
    pub fn run(&mut self, spec: impl Into<RunSpec>) -> &mut Self {
        let spec = spec.into();
        if let Some(args) = spec.resolve(self.platform) {
            self.settings.run = args;
        }
        if self.settings.run_spec.is_none() && !spec.is_empty() {
            self.settings.run_spec = Some(spec);
        }
        self
    }

    pub fn run_type(&mut self, run_type: RunType) -> &mut Self {
        self.settings.run_type = run_type;
        self
    }

    pub fn process_type(&mut self, process_type: ProcessType) -> &mut Self {
        self.settings.process_type = Some(process_type);
        self
    }

    pub fn keep_alive(&mut self, keep_alive: impl Into<KeepAlive>) -> &mut Self {
        self.settings.keep_alive = Some(keep_alive.into());
        self
    }

    /// Parses `type://host:port`. The field is left untouched on error.
    pub fn sockets(&mut self, value: &str) -> Result<&mut Self> {
        self.settings.sockets = Some(Sockets::parse(value)?);
        Ok(self)
    }

    pub fn cron(&mut self, statement: &str) -> Result<&mut Self> {
        self.settings.cron = Some(parse_cron(statement)?);
        Ok(self)
    }

    pub fn interval(&mut self, seconds: u64) -> &mut Self {
        self.settings.interval = Some(seconds);
        self
    }

    pub fn restart_delay(&mut self, seconds: u64) -> &mut Self {
        self.settings.restart_delay = Some(seconds);
        self
    }

    /// Replaces the environment. Values are stored in their string form.
    pub fn environment_variables<I, K, V>(&mut self, variables: I) -> &mut Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: ToString,
    {
        self.settings.environment_variables = variables
            .into_iter()
            .map(|(k, v)| (k.into(), v.to_string()))
            .collect();
        self
    }

    pub fn working_dir(&mut self, path: impl AsRef<Path>) -> &mut Self {
        self.settings.working_dir = Some(path_string(path));
        self
    }

    pub fn root_dir(&mut self, path: impl AsRef<Path>) -> &mut Self {
        self.settings.root_dir = Some(path_string(path));
        self
    }

    pub fn input_path(&mut self, path: impl AsRef<Path>) -> &mut Self {
        self.settings.input_path = Some(path_string(path));
        self
    }

    pub fn log_path(&mut self, path: impl AsRef<Path>) -> &mut Self {
        self.settings.log_path = Some(path_string(path));
        self
    }

    pub fn error_log_path(&mut self, path: impl AsRef<Path>) -> &mut Self {
        self.settings.error_log_path = Some(path_string(path));
        self
    }

    pub fn run_at_load(&mut self, value: bool) -> &mut Self {
        self.settings.run_at_load = Some(value);
        self
    }

    pub fn launch_only_once(&mut self, value: bool) -> &mut Self {
        self.settings.launch_only_once = Some(value);
        self
    }

    pub fn require_root(&mut self, value: bool) -> &mut Self {
        self.settings.require_root = Some(value);
        self
    }

    pub fn macos_legacy_timers(&mut self, value: bool) -> &mut Self {
        self.settings.macos_legacy_timers = Some(value);
        self
    }
}

fn path_string(path: impl AsRef<Path>) -> String {
    path.as_ref().to_string_lossy().into_owned()
}

type DefinitionBlock<'o> = Box<dyn Fn(&mut ServiceBuilder<'_>) -> Result<()> + Send + Sync + 'o>;

/// A service definition bound to its owner.
///
/// The definition block is deferred: it runs once, on the first call that
/// needs evaluated settings, and its outcome (settings or the first setter
/// error) is memoized. Concurrent first callers block until that single
/// evaluation finishes.
pub struct Service<'o> {
    owner: &'o dyn Owner,
    platform: Platform,
    block: DefinitionBlock<'o>,
    state: OnceLock<Result<ServiceSettings>>,
}

impl<'o> Service<'o> {
    pub fn new<F>(owner: &'o dyn Owner, block: F) -> Self
    where
        F: Fn(&mut ServiceBuilder<'_>) -> Result<()> + Send + Sync + 'o,
    {
        Self {
            owner,
            platform: Platform::current(),
            block: Box::new(block),
            state: OnceLock::new(),
        }
    }

    /// Evaluates per-platform commands for `platform` instead of the host.
    pub fn on_platform(mut self, platform: Platform) -> Self {
        self.platform = platform;
        self
    }

    pub fn owner(&self) -> &'o dyn Owner {
        self.owner
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }

    pub fn is_evaluated(&self) -> bool {
        self.state.get().is_some()
    }

    /// Runs the definition block if it has not run yet.
    pub fn ensure_evaluated(&self) -> Result<&ServiceSettings> {
        self.state
            .get_or_init(|| self.evaluate())
            .as_ref()
            .map_err(Clone::clone)
    }

    fn evaluate(&self) -> Result<ServiceSettings> {
        log::debug!("Evaluating service definition for {}", self.owner.name());
        let mut builder = ServiceBuilder::new(self.owner, self.platform);
        (self.block)(&mut builder)?;
        Ok(builder.settings)
    }

    /// Resolved command with a leading `~` expanded in each argument.
    pub fn command(&self) -> Result<Vec<String>> {
        let settings = self.ensure_evaluated()?;
        Ok(settings.run.iter().map(|arg| expand_tilde(arg)).collect())
    }

    pub fn has_command(&self) -> Result<bool> {
        Ok(!self.ensure_evaluated()?.run.is_empty())
    }

    /// Whether a service manager should keep the process alive.
    pub fn is_keep_alive(&self) -> Result<bool> {
        let settings = self.ensure_evaluated()?;
        Ok(match &settings.keep_alive {
            None => false,
            Some(keep_alive) if keep_alive.is_empty() => false,
            Some(keep_alive) => keep_alive.always() != Some(false),
        })
    }

    pub fn is_timed(&self) -> Result<bool> {
        let settings = self.ensure_evaluated()?;
        Ok(matches!(settings.run_type, RunType::Interval | RunType::Cron))
    }

    pub fn requires_root(&self) -> Result<bool> {
        Ok(self.ensure_evaluated()?.require_root == Some(true))
    }

    /// Shell line to run the service by hand, environment first.
    pub fn manual_command(&self) -> Result<String> {
        let settings = self.ensure_evaluated()?;
        let mut parts: Vec<String> = settings
            .environment_variables
            .iter()
            .filter(|(key, _)| key.as_str() != "PATH")
            .map(|(key, value)| format!("{}=\"{}\"", key, value))
            .collect();

        for arg in self.command()? {
            let quoted = match shlex::try_quote(&arg) {
                Ok(quoted) => quoted.into_owned(),
                Err(_) => arg.clone(),
            };
            parts.push(quoted);
        }

        Ok(parts.join(" "))
    }

    /// `PATH` for services: the owner's installation root first, then the system.
    pub fn std_service_path_env(&self) -> String {
        let root = self.owner.root().to_string_lossy();
        format!("{root}/bin:{root}/sbin:/usr/bin:/bin:/usr/sbin:/sbin")
    }
}

impl fmt::Debug for Service<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Service")
            .field("owner", &self.owner.name())
            .field("platform", &self.platform)
            .field("state", &self.state.get())
            .finish()
    }
}
