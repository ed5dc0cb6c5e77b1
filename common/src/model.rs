use crate::error::{Result, ServiceError};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Service manager family a definition is compiled for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    MacOS,
    Linux,
}

impl Platform {
    pub fn current() -> Self {
        if cfg!(target_os = "macos") {
            Platform::MacOS
        } else {
            Platform::Linux
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", try_from = "String")]
pub enum RunType {
    #[default]
    Immediate,
    Interval,
    Cron,
}

impl RunType {
    pub const ALLOWED: &'static [&'static str] = &["immediate", "interval", "cron"];

    pub fn as_str(&self) -> &'static str {
        match self {
            RunType::Immediate => "immediate",
            RunType::Interval => "interval",
            RunType::Cron => "cron",
        }
    }
}

impl FromStr for RunType {
    type Err = ServiceError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "immediate" => Ok(RunType::Immediate),
            "interval" => Ok(RunType::Interval),
            "cron" => Ok(RunType::Cron),
            _ => Err(ServiceError::UnknownVariant {
                field: "run_type",
                value: s.to_string(),
                allowed: Self::ALLOWED,
            }),
        }
    }
}

impl TryFrom<String> for RunType {
    type Error = ServiceError;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl fmt::Display for RunType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", try_from = "String")]
pub enum ProcessType {
    Background,
    Standard,
    Interactive,
    Adaptive,
}

impl ProcessType {
    pub const ALLOWED: &'static [&'static str] =
        &["background", "standard", "interactive", "adaptive"];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessType::Background => "background",
            ProcessType::Standard => "standard",
            ProcessType::Interactive => "interactive",
            ProcessType::Adaptive => "adaptive",
        }
    }

    /// Spelling launchd expects for the `ProcessType` key.
    pub fn capitalized(&self) -> &'static str {
        match self {
            ProcessType::Background => "Background",
            ProcessType::Standard => "Standard",
            ProcessType::Interactive => "Interactive",
            ProcessType::Adaptive => "Adaptive",
        }
    }
}

impl FromStr for ProcessType {
    type Err = ServiceError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "background" => Ok(ProcessType::Background),
            "standard" => Ok(ProcessType::Standard),
            "interactive" => Ok(ProcessType::Interactive),
            "adaptive" => Ok(ProcessType::Adaptive),
            _ => Err(ServiceError::UnknownVariant {
                field: "process_type",
                value: s.to_string(),
                allowed: Self::ALLOWED,
            }),
        }
    }
}

impl TryFrom<String> for ProcessType {
    type Error = ServiceError;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl fmt::Display for ProcessType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A command as the author wrote it: one string or an argument list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum CommandLine {
    Single(String),
    List(Vec<String>),
}

impl CommandLine {
    pub fn to_args(&self) -> Vec<String> {
        match self {
            CommandLine::Single(s) => vec![s.clone()],
            CommandLine::List(args) => args.clone(),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            CommandLine::Single(s) => s.is_empty(),
            CommandLine::List(args) => args.is_empty(),
        }
    }

    pub fn map_strings(&self, f: impl Fn(&str) -> String) -> CommandLine {
        match self {
            CommandLine::Single(s) => CommandLine::Single(f(s)),
            CommandLine::List(args) => {
                CommandLine::List(args.iter().map(|a| f(a.as_str())).collect())
            }
        }
    }

    fn from_value(value: &Value) -> Option<CommandLine> {
        match value {
            Value::String(s) => Some(CommandLine::Single(s.clone())),
            Value::Array(items) => items
                .iter()
                .map(|item| item.as_str().map(str::to_string))
                .collect::<Option<Vec<_>>>()
                .map(CommandLine::List),
            _ => None,
        }
    }
}

/// The original, unresolved run specification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged, try_from = "Value")]
pub enum RunSpec {
    Command(CommandLine),
    PerPlatform {
        #[serde(skip_serializing_if = "Option::is_none")]
        macos: Option<CommandLine>,
        #[serde(skip_serializing_if = "Option::is_none")]
        linux: Option<CommandLine>,
    },
}

impl RunSpec {
    const EXPECTED: &'static str = "a string, a list of strings, or a {macos, linux} map";

    pub fn per_platform(macos: Option<CommandLine>, linux: Option<CommandLine>) -> Self {
        RunSpec::PerPlatform { macos, linux }
    }

    /// Flat argument list for `platform`, or `None` when nothing applies.
    pub fn resolve(&self, platform: Platform) -> Option<Vec<String>> {
        match self {
            RunSpec::Command(command) => Some(command.to_args()),
            RunSpec::PerPlatform { macos, linux } => {
                let selected = match platform {
                    Platform::MacOS => macos,
                    Platform::Linux => linux,
                };
                selected.as_ref().map(CommandLine::to_args)
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            RunSpec::Command(command) => command.is_empty(),
            RunSpec::PerPlatform { macos, linux } => {
                macos.as_ref().map_or(true, CommandLine::is_empty)
                    && linux.as_ref().map_or(true, CommandLine::is_empty)
            }
        }
    }

    pub fn map_strings(&self, f: impl Fn(&str) -> String) -> RunSpec {
        match self {
            RunSpec::Command(command) => RunSpec::Command(command.map_strings(f)),
            RunSpec::PerPlatform { macos, linux } => RunSpec::PerPlatform {
                macos: macos.as_ref().map(|c| c.map_strings(&f)),
                linux: linux.as_ref().map(|c| c.map_strings(&f)),
            },
        }
    }
}

impl TryFrom<Value> for RunSpec {
    type Error = ServiceError;

    fn try_from(value: Value) -> Result<Self> {
        if let Some(command) = CommandLine::from_value(&value) {
            return Ok(RunSpec::Command(command));
        }

        let Value::Object(map) = &value else {
            return Err(ServiceError::shape("run", Self::EXPECTED, &value));
        };

        let mut macos = None;
        let mut linux = None;
        for (key, entry) in map {
            let command = CommandLine::from_value(entry)
                .ok_or_else(|| ServiceError::shape("run", Self::EXPECTED, &value))?;
            match key.as_str() {
                "macos" => macos = Some(command),
                "linux" => linux = Some(command),
                _ => return Err(ServiceError::shape("run", Self::EXPECTED, &value)),
            }
        }

        Ok(RunSpec::PerPlatform { macos, linux })
    }
}

impl From<&str> for RunSpec {
    fn from(command: &str) -> Self {
        RunSpec::Command(CommandLine::Single(command.to_string()))
    }
}

impl From<String> for RunSpec {
    fn from(command: String) -> Self {
        RunSpec::Command(CommandLine::Single(command))
    }
}

impl From<&Path> for RunSpec {
    fn from(command: &Path) -> Self {
        RunSpec::Command(CommandLine::Single(command.to_string_lossy().into_owned()))
    }
}

impl From<Vec<String>> for RunSpec {
    fn from(args: Vec<String>) -> Self {
        RunSpec::Command(CommandLine::List(args))
    }
}

impl From<Vec<&str>> for RunSpec {
    fn from(args: Vec<&str>) -> Self {
        RunSpec::Command(CommandLine::List(
            args.into_iter().map(str::to_string).collect(),
        ))
    }
}

/// Structured keep-alive policy. Only these four keys exist.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct KeepAliveConditions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub always: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub successful_exit: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub crashed: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

impl KeepAliveConditions {
    pub const KEYS: &'static [&'static str] = &["always", "successful_exit", "crashed", "path"];

    pub fn is_empty(&self) -> bool {
        self.always.is_none()
            && self.successful_exit.is_none()
            && self.crashed.is_none()
            && self.path.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged, try_from = "Value")]
pub enum KeepAlive {
    Flag(bool),
    Conditions(KeepAliveConditions),
}

impl KeepAlive {
    const EXPECTED: &'static str =
        "a boolean or a map with only the keys always, successful_exit, crashed, path";

    /// The `always` policy; a bare flag counts as `always`.
    pub fn always(&self) -> Option<bool> {
        match self {
            KeepAlive::Flag(flag) => Some(*flag),
            KeepAlive::Conditions(conditions) => conditions.always,
        }
    }

    pub fn conditions(&self) -> Option<&KeepAliveConditions> {
        match self {
            KeepAlive::Flag(_) => None,
            KeepAlive::Conditions(conditions) => Some(conditions),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            KeepAlive::Flag(_) => false,
            KeepAlive::Conditions(conditions) => conditions.is_empty(),
        }
    }
}

impl From<bool> for KeepAlive {
    fn from(flag: bool) -> Self {
        KeepAlive::Flag(flag)
    }
}

impl From<KeepAliveConditions> for KeepAlive {
    fn from(conditions: KeepAliveConditions) -> Self {
        KeepAlive::Conditions(conditions)
    }
}

impl TryFrom<Value> for KeepAlive {
    type Error = ServiceError;

    fn try_from(value: Value) -> Result<Self> {
        let map = match value {
            Value::Bool(flag) => return Ok(KeepAlive::Flag(flag)),
            Value::Object(map) => map,
            other => return Err(ServiceError::shape("keep_alive", Self::EXPECTED, other)),
        };

        let mut conditions = KeepAliveConditions::default();
        for (key, entry) in map {
            match (key.as_str(), entry) {
                ("always", Value::Bool(b)) => conditions.always = Some(b),
                ("successful_exit", Value::Bool(b)) => conditions.successful_exit = Some(b),
                ("crashed", Value::Bool(b)) => conditions.crashed = Some(b),
                ("path", Value::String(p)) => conditions.path = Some(p),
                (key, entry) => {
                    return Err(ServiceError::shape(
                        "keep_alive",
                        Self::EXPECTED,
                        format!("{}: {}", key, entry),
                    ))
                }
            }
        }

        Ok(KeepAlive::Conditions(conditions))
    }
}

static SOCKET_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(?P<type>[a-z]+)://(?P<host>[a-z0-9.]+):(?P<port>[0-9]+)$")
        .expect("socket pattern is valid")
});

/// A listening socket in `type://host:port` form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sockets {
    kind: String,
    host: String,
    port: String,
}

impl Sockets {
    pub fn parse(value: &str) -> Result<Self> {
        let captures = SOCKET_PATTERN.captures(value).ok_or_else(|| {
            ServiceError::shape("sockets", "a string like tcp://127.0.0.1:8080", value)
        })?;

        Ok(Sockets {
            kind: captures["type"].to_string(),
            host: captures["host"].to_string(),
            port: captures["port"].to_string(),
        })
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> &str {
        &self.port
    }
}

impl FromStr for Sockets {
    type Err = ServiceError;

    fn from_str(s: &str) -> Result<Self> {
        Sockets::parse(s)
    }
}

impl fmt::Display for Sockets {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}:{}", self.kind, self.host, self.port)
    }
}
