use crate::error::{Result, ServiceError};
use crate::model::{KeepAlive, ProcessType, RunSpec, RunType};
use crate::paths::LocalPaths;
use crate::service::{Service, ServiceBuilder};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Cacheable form of a service definition.
///
/// Absent fields are left out entirely rather than written as `null`. The run
/// command is stored in its original, unresolved shape so the entry can be
/// evaluated again on any platform.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedService {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run: Option<RunSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_type: Option<RunType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interval: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cron: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keep_alive: Option<KeepAlive>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub launch_only_once: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub require_root: Option<bool>,
    #[serde(
        default,
        deserialize_with = "scalar_values",
        skip_serializing_if = "BTreeMap::is_empty"
    )]
    pub environment_variables: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub working_dir: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root_dir: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_log_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub restart_delay: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub process_type: Option<ProcessType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub macos_legacy_timers: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sockets: Option<String>,
}

/// Environment values may be written as strings, numbers or booleans; all of
/// them are stored as strings.
fn scalar_values<'de, D>(deserializer: D) -> std::result::Result<BTreeMap<String, String>, D::Error>
where
    D: Deserializer<'de>,
{
    BTreeMap::<String, Value>::deserialize(deserializer)?
        .into_iter()
        .map(|(key, value)| {
            let value = match value {
                Value::String(s) => s,
                Value::Number(n) => n.to_string(),
                Value::Bool(b) => b.to_string(),
                other => {
                    return Err(D::Error::custom(format!(
                        "environment variable {} must be a string, number or boolean, found {}",
                        key, other
                    )))
                }
            };
            Ok((key, value))
        })
        .collect()
}

impl PersistedService {
    pub fn from_service(service: &Service<'_>) -> Result<Self> {
        let settings = service.ensure_evaluated()?;

        Ok(PersistedService {
            run: settings.run_spec().cloned(),
            run_type: Some(settings.run_type()),
            interval: settings.interval(),
            cron: settings.cron().map(|c| c.to_string()),
            keep_alive: settings.keep_alive().cloned(),
            launch_only_once: settings.launch_only_once(),
            require_root: settings.require_root(),
            environment_variables: settings.environment_variables().clone(),
            working_dir: settings.working_dir().map(str::to_string),
            root_dir: settings.root_dir().map(str::to_string),
            input_path: settings.input_path().map(str::to_string),
            log_path: settings.log_path().map(str::to_string),
            error_log_path: settings.error_log_path().map(str::to_string),
            restart_delay: settings.restart_delay(),
            process_type: settings.process_type(),
            macos_legacy_timers: settings.macos_legacy_timers(),
            sockets: settings.sockets().map(|s| s.to_string()),
        })
    }

    /// Swaps placeholder tokens for local paths in the run command,
    /// environment values and path fields.
    pub fn replace_placeholders(mut self, paths: &LocalPaths) -> Self {
        let substitute = |value: &str| paths.substitute(value);

        self.run = self.run.map(|run| run.map_strings(substitute));
        for value in self.environment_variables.values_mut() {
            *value = substitute(value.as_str());
        }
        for path in [
            &mut self.working_dir,
            &mut self.root_dir,
            &mut self.input_path,
            &mut self.log_path,
            &mut self.error_log_path,
        ] {
            if let Some(p) = path.as_mut() {
                *p = substitute(p.as_str());
            }
        }
        self
    }

    /// Replays every present field through the validated setters.
    pub fn apply(&self, service: &mut ServiceBuilder<'_>) -> Result<()> {
        if let Some(run) = &self.run {
            service.run(run.clone());
        }
        if let Some(run_type) = self.run_type {
            service.run_type(run_type);
        }
        if let Some(interval) = self.interval {
            service.interval(interval);
        }
        if let Some(cron) = &self.cron {
            service.cron(cron)?;
        }
        if let Some(keep_alive) = &self.keep_alive {
            service.keep_alive(keep_alive.clone());
        }
        if let Some(value) = self.launch_only_once {
            service.launch_only_once(value);
        }
        if let Some(value) = self.require_root {
            service.require_root(value);
        }
        if !self.environment_variables.is_empty() {
            service.environment_variables(self.environment_variables.clone());
        }
        if let Some(dir) = &self.working_dir {
            service.working_dir(dir);
        }
        if let Some(dir) = &self.root_dir {
            service.root_dir(dir);
        }
        if let Some(path) = &self.input_path {
            service.input_path(path);
        }
        if let Some(path) = &self.log_path {
            service.log_path(path);
        }
        if let Some(path) = &self.error_log_path {
            service.error_log_path(path);
        }
        if let Some(delay) = self.restart_delay {
            service.restart_delay(delay);
        }
        if let Some(process_type) = self.process_type {
            service.process_type(process_type);
        }
        if let Some(value) = self.macos_legacy_timers {
            service.macos_legacy_timers(value);
        }
        if let Some(sockets) = &self.sockets {
            service.sockets(sockets)?;
        }
        Ok(())
    }
}

/// Evaluates `service` and produces its persisted mapping.
pub fn serialize(service: &Service<'_>) -> Result<Map<String, Value>> {
    let persisted = PersistedService::from_service(service)?;
    match serde_json::to_value(persisted) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(ServiceError::Persisted(format!(
            "expected a mapping, produced {}",
            other
        ))),
        Err(e) => Err(ServiceError::Persisted(e.to_string())),
    }
}

/// Reads a persisted mapping back into a field set, resolving placeholders
/// against `paths`. Unknown keys are ignored.
pub fn deserialize(mapping: Value, paths: &LocalPaths) -> Result<PersistedService> {
    let persisted: PersistedService =
        serde_json::from_value(mapping).map_err(|e| ServiceError::Persisted(e.to_string()))?;
    Ok(persisted.replace_placeholders(paths))
}

impl Service<'_> {
    pub fn to_persisted(&self) -> Result<PersistedService> {
        PersistedService::from_service(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CommandLine, KeepAliveConditions};
    use crate::testing::TestOwner;
    use serde_json::json;

    #[test]
    fn test_absent_fields_are_omitted() {
        let owner = TestOwner::new("foo");
        let service = Service::new(&owner, |s| {
            s.run("/bin/foo");
            Ok(())
        });

        assert_eq!(
            Value::Object(serialize(&service).unwrap()),
            json!({"run": "/bin/foo", "run_type": "immediate"})
        );
    }

    #[test]
    fn test_serialize_all_fields() {
        let owner = TestOwner::new("foo");
        let service = Service::new(&owner, |s| {
            s.run(RunSpec::per_platform(
                Some(CommandLine::List(vec!["/bin/foo".into(), "--mac".into()])),
                Some(CommandLine::List(vec!["/bin/foo".into(), "--linux".into()])),
            ))
            .run_type(RunType::Cron)
            .interval(10)
            .keep_alive(KeepAliveConditions {
                successful_exit: Some(false),
                ..Default::default()
            })
            .launch_only_once(false)
            .require_root(true)
            .environment_variables([("PATH", "/usr/bin")])
            .working_dir("/w")
            .root_dir("/r")
            .input_path("/i")
            .log_path("/o")
            .error_log_path("/e")
            .restart_delay(4)
            .process_type(ProcessType::Adaptive)
            .macos_legacy_timers(true);
            s.cron("@weekly")?.sockets("tcp://localhost:9000")?;
            Ok(())
        });

        assert_eq!(
            Value::Object(serialize(&service).unwrap()),
            json!({
                "run": {"macos": ["/bin/foo", "--mac"], "linux": ["/bin/foo", "--linux"]},
                "run_type": "cron",
                "interval": 10,
                "cron": "0 0 * * 0",
                "keep_alive": {"successful_exit": false},
                "launch_only_once": false,
                "require_root": true,
                "environment_variables": {"PATH": "/usr/bin"},
                "working_dir": "/w",
                "root_dir": "/r",
                "input_path": "/i",
                "log_path": "/o",
                "error_log_path": "/e",
                "restart_delay": 4,
                "process_type": "adaptive",
                "macos_legacy_timers": true,
                "sockets": "tcp://localhost:9000",
            })
        );
    }

    #[test]
    fn test_serialized_key_order() {
        let owner = TestOwner::new("foo");
        let service = Service::new(&owner, |s| {
            s.run("/bin/foo").keep_alive(true).log_path("/tmp/log");
            s.sockets("tcp://127.0.0.1:1")?;
            Ok(())
        });

        let json = serde_json::to_string(&service.to_persisted().unwrap()).unwrap();
        assert_eq!(
            json,
            r#"{"run":"/bin/foo","run_type":"immediate","keep_alive":true,"log_path":"/tmp/log","sockets":"tcp://127.0.0.1:1"}"#
        );
    }

    #[test]
    fn test_deserialize_replaces_placeholders() {
        let paths = LocalPaths::new("/opt/pkg", "/home/alice");
        let fields = deserialize(
            json!({
                "run": ["$SVCDEF_PREFIX/bin/foo", "--data", "$HOME/foo"],
                "environment_variables": {"CONF": "$SVCDEF_PREFIX/etc/foo.conf"},
                "working_dir": "$HOME",
                "log_path": "$SVCDEF_PREFIX/var/log/foo.log",
                "cron": "$HOME stays verbatim",
            }),
            &paths,
        )
        .unwrap();

        assert_eq!(
            fields.run,
            Some(RunSpec::from(vec!["/opt/pkg/bin/foo", "--data", "/home/alice/foo"]))
        );
        assert_eq!(fields.environment_variables["CONF"], "/opt/pkg/etc/foo.conf");
        assert_eq!(fields.working_dir.as_deref(), Some("/home/alice"));
        assert_eq!(fields.log_path.as_deref(), Some("/opt/pkg/var/log/foo.log"));
        assert_eq!(fields.cron.as_deref(), Some("$HOME stays verbatim"));
    }

    #[test]
    fn test_deserialize_per_platform_run() {
        let paths = LocalPaths::new("/p", "/h");
        let fields = deserialize(
            json!({"run": {"macos": "$SVCDEF_PREFIX/mac", "linux": ["$HOME/linux", "-v"]}}),
            &paths,
        )
        .unwrap();

        assert_eq!(
            fields.run,
            Some(RunSpec::per_platform(
                Some(CommandLine::Single("/p/mac".into())),
                Some(CommandLine::List(vec!["/h/linux".into(), "-v".into()])),
            ))
        );
    }

    #[test]
    fn test_deserialize_rejects_bad_shapes() {
        let paths = LocalPaths::new("/p", "/h");
        for bad in [
            json!({"keep_alive": {"restart": true}}),
            json!({"run_type": "weekly"}),
            json!({"process_type": "daemon"}),
            json!({"run": 7}),
            json!({"interval": "ten"}),
        ] {
            assert!(
                matches!(deserialize(bad.clone(), &paths), Err(ServiceError::Persisted(_))),
                "{} should be rejected",
                bad
            );
        }
    }

    #[test]
    fn test_deserialize_stringifies_scalar_env_values() {
        let paths = LocalPaths::new("/p", "/h");
        let fields = deserialize(
            json!({"environment_variables": {"PORT": 8080, "RATIO": 0.5, "DEBUG": true, "HOME_DIR": "$HOME"}}),
            &paths,
        )
        .unwrap();

        assert_eq!(fields.environment_variables["PORT"], "8080");
        assert_eq!(fields.environment_variables["RATIO"], "0.5");
        assert_eq!(fields.environment_variables["DEBUG"], "true");
        assert_eq!(fields.environment_variables["HOME_DIR"], "/h");

        for bad in [
            json!({"environment_variables": {"PATH": ["/bin", "/usr/bin"]}}),
            json!({"environment_variables": {"OPTS": {"a": 1}}}),
            json!({"environment_variables": {"UNSET": null}}),
        ] {
            assert!(
                matches!(deserialize(bad.clone(), &paths), Err(ServiceError::Persisted(_))),
                "{} should be rejected",
                bad
            );
        }
    }

    #[test]
    fn test_deserialize_ignores_unknown_keys() {
        let paths = LocalPaths::new("/p", "/h");
        let fields =
            deserialize(json!({"name": {"macos": "x"}, "run": "/bin/true"}), &paths).unwrap();
        assert_eq!(fields.run, Some(RunSpec::from("/bin/true")));
    }

    #[test]
    fn test_round_trip_through_placeholders() {
        let owner = TestOwner::new("foo");
        let original = Service::new(&owner, |s| {
            s.run(RunSpec::per_platform(
                Some(CommandLine::Single("/opt/pkg/opt/foo/bin/foo".into())),
                Some(CommandLine::List(vec![
                    "/opt/pkg/opt/foo/bin/foo".into(),
                    "--home=/home/alice/.foo".into(),
                ])),
            ))
            .run_type(RunType::Cron)
            .keep_alive(KeepAliveConditions {
                path: Some("/var/run/foo.pid".into()),
                ..Default::default()
            })
            .environment_variables([("FOO_HOME", "/home/alice/.foo")])
            .working_dir("/opt/pkg/var/foo")
            .log_path("/home/alice/foo.log")
            .require_root(false)
            .restart_delay(2)
            .macos_legacy_timers(true);
            s.cron("15 3 * * 6")?.sockets("udp://0.0.0.0:5353")?;
            Ok(())
        });

        let persisted = serde_json::to_string(&serialize(&original).unwrap())
            .unwrap()
            .replace("/opt/pkg", "$SVCDEF_PREFIX")
            .replace("/home/alice", "$HOME");
        assert!(persisted.contains("$SVCDEF_PREFIX/opt/foo/bin/foo"));

        let paths = LocalPaths::new("/opt/pkg", "/home/alice");
        let fields = deserialize(serde_json::from_str(&persisted).unwrap(), &paths).unwrap();
        assert_eq!(fields, original.to_persisted().unwrap());

        let restored = Service::new(&owner, |s| fields.apply(s));
        assert_eq!(serialize(&restored).unwrap(), serialize(&original).unwrap());
        assert_eq!(
            restored.ensure_evaluated().unwrap(),
            original.ensure_evaluated().unwrap()
        );
    }

    #[test]
    fn test_apply_validates_sockets() {
        let owner = TestOwner::new("foo");
        let fields = PersistedService {
            run: Some(RunSpec::from("/bin/foo")),
            sockets: Some("not a socket".into()),
            ..Default::default()
        };

        let service = Service::new(&owner, |s| fields.apply(s));
        assert!(matches!(
            service.ensure_evaluated(),
            Err(ServiceError::Shape { field: "sockets", .. })
        ));
    }
}
