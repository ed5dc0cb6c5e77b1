use crate::error::Result;
use crate::model::{KeepAlive, RunType};
use crate::paths::expand_tilde;
use crate::service::Service;
use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};

/// Session types a launchd job may be loaded into.
pub const SESSION_TYPES: [&str; 5] = ["Aqua", "Background", "LoginWindow", "StandardIO", "System"];

/// A property list value. Dictionaries keep insertion order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlistValue {
    Boolean(bool),
    Integer(u64),
    String(String),
    Array(Vec<PlistValue>),
    Dictionary(Dictionary),
}

impl From<bool> for PlistValue {
    fn from(value: bool) -> Self {
        PlistValue::Boolean(value)
    }
}

impl From<u64> for PlistValue {
    fn from(value: u64) -> Self {
        PlistValue::Integer(value)
    }
}

impl From<u32> for PlistValue {
    fn from(value: u32) -> Self {
        PlistValue::Integer(value.into())
    }
}

impl From<String> for PlistValue {
    fn from(value: String) -> Self {
        PlistValue::String(value)
    }
}

impl From<&str> for PlistValue {
    fn from(value: &str) -> Self {
        PlistValue::String(value.to_string())
    }
}

impl<T: Into<PlistValue>> From<Vec<T>> for PlistValue {
    fn from(values: Vec<T>) -> Self {
        PlistValue::Array(values.into_iter().map(Into::into).collect())
    }
}

impl From<Dictionary> for PlistValue {
    fn from(value: Dictionary) -> Self {
        PlistValue::Dictionary(value)
    }
}

impl Serialize for PlistValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            PlistValue::Boolean(b) => serializer.serialize_bool(*b),
            PlistValue::Integer(n) => serializer.serialize_u64(*n),
            PlistValue::String(s) => serializer.serialize_str(s),
            PlistValue::Array(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            PlistValue::Dictionary(dict) => dict.serialize(serializer),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Dictionary {
    entries: Vec<(String, PlistValue)>,
}

impl Dictionary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces `key`, keeping its original position on replace.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<PlistValue>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&PlistValue> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &PlistValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Into<String>, V: Into<PlistValue>> FromIterator<(K, V)> for Dictionary {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut dict = Dictionary::new();
        for (key, value) in iter {
            dict.insert(key, value);
        }
        dict
    }
}

impl Serialize for Dictionary {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (key, value) in &self.entries {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

impl Service<'_> {
    /// Compiles the definition into a launchd job dictionary.
    pub fn to_plist(&self) -> Result<Dictionary> {
        // Resolving the command evaluates the block; everything else reads from it.
        let command = self.command()?;
        let is_keep_alive = self.is_keep_alive()?;
        let settings = self.ensure_evaluated()?;

        let mut plist = Dictionary::new();
        plist.insert("Label", self.owner().plist_name());
        plist.insert("ProgramArguments", command);
        plist.insert("RunAtLoad", settings.run_at_load() == Some(true));

        if settings.launch_only_once() == Some(true) {
            plist.insert("LaunchOnlyOnce", true);
        }
        if settings.macos_legacy_timers() == Some(true) {
            plist.insert("LegacyTimers", true);
        }
        if let Some(delay) = settings.restart_delay() {
            plist.insert("TimeOut", delay);
        }
        if let Some(process_type) = settings.process_type() {
            plist.insert("ProcessType", process_type.capitalized());
        }
        if let Some(interval) = settings.interval() {
            if settings.run_type() == RunType::Interval {
                plist.insert("StartInterval", interval);
            }
        }

        let paths = [
            ("WorkingDirectory", settings.working_dir()),
            ("RootDirectory", settings.root_dir()),
            ("StandardInPath", settings.input_path()),
            ("StandardOutPath", settings.log_path()),
            ("StandardErrorPath", settings.error_log_path()),
        ];
        for (key, path) in paths {
            if let Some(path) = path.filter(|p| !p.is_empty()) {
                plist.insert(key, expand_tilde(path));
            }
        }

        if !settings.environment_variables().is_empty() {
            let env: Dictionary = settings
                .environment_variables()
                .iter()
                .map(|(k, v)| (k.as_str(), v.as_str()))
                .collect();
            plist.insert("EnvironmentVariables", env);
        }

        if is_keep_alive {
            if let Some(value) = settings.keep_alive().and_then(keep_alive_value) {
                plist.insert("KeepAlive", value);
            }
        }

        if let Some(sockets) = settings.sockets() {
            let mut listeners = Dictionary::new();
            listeners.insert("SockNodeName", sockets.host());
            listeners.insert("SockServiceName", sockets.port());
            listeners.insert("SockProtocol", sockets.kind().to_uppercase());
            listeners.insert("SockFamily", "IPv4v6");

            let mut socket_dict = Dictionary::new();
            socket_dict.insert("Listeners", listeners);
            plist.insert("Sockets", socket_dict);
        }

        if let Some(cron) = settings.cron() {
            if settings.run_type() == RunType::Cron {
                let calendar: Dictionary = cron
                    .fields()
                    .into_iter()
                    .filter_map(|(key, field)| field.value().map(|n| (key, n)))
                    .collect();
                plist.insert("StartCalendarInterval", calendar);
            }
        }

        plist.insert("LimitLoadToSessionType", SESSION_TYPES.to_vec());

        Ok(plist)
    }
}

/// Picks one keep-alive encoding: always, then successful exit, then crashed,
/// then path state.
fn keep_alive_value(keep_alive: &KeepAlive) -> Option<PlistValue> {
    let conditions = match keep_alive {
        KeepAlive::Flag(flag) => return flag.then_some(PlistValue::Boolean(true)),
        KeepAlive::Conditions(conditions) => conditions,
    };

    if conditions.always == Some(true) {
        return Some(PlistValue::Boolean(true));
    }
    if let Some(successful_exit) = conditions.successful_exit {
        return Some(Dictionary::from_iter([("SuccessfulExit", successful_exit)]).into());
    }
    if let Some(crashed) = conditions.crashed {
        return Some(Dictionary::from_iter([("Crashed", crashed)]).into());
    }
    match conditions.path.as_deref() {
        Some(path) if !path.is_empty() => {
            Some(Dictionary::from_iter([("PathState", path)]).into())
        }
        _ => None,
    }
}
