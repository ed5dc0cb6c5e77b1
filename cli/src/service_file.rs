use crate::loader::load_by_extension;
use anyhow::{Context, Result};
use common::{LocalPaths, Owner, PersistedService, Service};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};

/// A hand-written service description: who owns it and how it runs.
///
/// The `service` table uses the persisted-mapping keys, so placeholder
/// tokens work the same way they do in cached entries.
#[derive(Debug, Deserialize)]
pub struct ServiceFile {
    pub owner: OwnerConfig,
    pub service: ServiceSection,
}

#[derive(Debug, Deserialize)]
pub struct OwnerConfig {
    pub name: String,
    pub plist_name: Option<String>,
    pub service_name: Option<String>,
    pub prefix: Option<PathBuf>,
}

#[derive(Debug, Deserialize)]
pub struct ServiceSection {
    pub run_at_load: Option<bool>,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl ServiceFile {
    pub fn from_file(path: &Path) -> Result<Self> {
        load_by_extension(path, "service")
    }

    pub fn owner(&self, paths: &LocalPaths) -> ConfiguredOwner {
        let name = self.owner.name.clone();
        let root = paths.prefix.clone();
        let prefix = self.owner.prefix.clone()
            .unwrap_or_else(|| root.join("opt").join(&name));

        ConfiguredOwner {
            plist_name: self.owner.plist_name.clone()
                .unwrap_or_else(|| format!("svcdef.{}", name)),
            service_name: self.owner.service_name.clone()
                .unwrap_or_else(|| format!("svcdef.{}", name)),
            name,
            root,
            prefix,
        }
    }

    /// Validated definition fields with placeholders resolved.
    pub fn definition(&self, paths: &LocalPaths) -> Result<Definition> {
        let fields = common::deserialize(Value::Object(self.service.fields.clone()), paths)
            .with_context(|| format!("Invalid service definition for {}", self.owner.name))?;
        Ok(Definition {
            fields,
            run_at_load: self.service.run_at_load,
        })
    }
}

pub struct Definition {
    fields: PersistedService,
    run_at_load: Option<bool>,
}

impl Definition {
    pub fn into_service(self, owner: &dyn Owner) -> Service<'_> {
        Service::new(owner, move |s| {
            self.fields.apply(s)?;
            if let Some(value) = self.run_at_load {
                s.run_at_load(value);
            }
            Ok(())
        })
    }
}

#[derive(Debug, Clone)]
pub struct ConfiguredOwner {
    name: String,
    plist_name: String,
    service_name: String,
    root: PathBuf,
    prefix: PathBuf,
}

impl Owner for ConfiguredOwner {
    fn name(&self) -> &str {
        &self.name
    }

    fn plist_name(&self) -> String {
        self.plist_name.clone()
    }

    fn service_name(&self) -> String {
        self.service_name.clone()
    }

    fn root(&self) -> &Path {
        &self.root
    }

    fn prefix(&self) -> &Path {
        &self.prefix
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::PlistValue;
    use std::io::Write;

    fn write_file(suffix: &str, content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    const REDIS_YAML: &str = r#"
owner:
  name: redis
  plist_name: org.example.redis
service:
  run: ["$SVCDEF_PREFIX/opt/redis/bin/redis-server", "$SVCDEF_PREFIX/etc/redis.conf"]
  keep_alive: true
  run_at_load: false
  working_dir: $SVCDEF_PREFIX/var
  error_log_path: $HOME/redis.log
"#;

    #[test]
    fn test_yaml_service_file() {
        let file = write_file(".yaml", REDIS_YAML);
        let paths = LocalPaths::new("/opt/pkg", "/home/alice");
        let service_file = ServiceFile::from_file(file.path()).unwrap();
        let owner = service_file.owner(&paths);
        assert_eq!(owner.service_name(), "svcdef.redis");
        assert_eq!(owner.prefix(), Path::new("/opt/pkg/opt/redis"));

        let service = service_file.definition(&paths).unwrap().into_service(&owner);
        assert_eq!(
            service.command().unwrap(),
            vec!["/opt/pkg/opt/redis/bin/redis-server", "/opt/pkg/etc/redis.conf"]
        );

        let plist = service.to_plist().unwrap();
        assert_eq!(plist.get("Label"), Some(&PlistValue::from("org.example.redis")));
        assert_eq!(plist.get("RunAtLoad"), Some(&PlistValue::Boolean(false)));
        assert_eq!(plist.get("KeepAlive"), Some(&PlistValue::Boolean(true)));

        let unit = service.to_systemd_unit().unwrap();
        assert!(unit.contains("\nWorkingDirectory=/opt/pkg/var\n"));
        assert!(unit.ends_with("StandardError=append:/home/alice/redis.log"));
    }

    #[test]
    fn test_toml_service_file() {
        let file = write_file(
            ".toml",
            "[owner]\nname = \"backup\"\n\n[service]\nrun = \"/usr/bin/backup\"\nrun_type = \"cron\"\ncron = \"@daily\"\n",
        );
        let paths = LocalPaths::new("/opt/pkg", "/home/alice");
        let service_file = ServiceFile::from_file(file.path()).unwrap();
        let owner = service_file.owner(&paths);
        let service = service_file.definition(&paths).unwrap().into_service(&owner);

        assert!(service.is_timed().unwrap());
        assert!(service
            .to_systemd_timer()
            .unwrap()
            .ends_with("Unit=svcdef.backup\nPersistent=true\nOnCalendar=*-*-*-* 00:00:00"));
    }

    #[test]
    fn test_numeric_env_values_are_accepted() {
        let yaml = write_file(
            ".yaml",
            "owner:\n  name: foo\nservice:\n  run: /bin/foo\n  environment_variables:\n    PORT: 8080\n    VERBOSE: true\n",
        );
        let toml = write_file(
            ".toml",
            "[owner]\nname = \"foo\"\n\n[service]\nrun = \"/bin/foo\"\n\n[service.environment_variables]\nPORT = 8080\nVERBOSE = true\n",
        );
        let paths = LocalPaths::new("/opt/pkg", "/home/alice");

        for file in [yaml, toml] {
            let service_file = ServiceFile::from_file(file.path()).unwrap();
            let owner = service_file.owner(&paths);
            let service = service_file.definition(&paths).unwrap().into_service(&owner);
            assert_eq!(
                service.manual_command().unwrap(),
                "PORT=\"8080\" VERBOSE=\"true\" /bin/foo"
            );
        }
    }

    #[test]
    fn test_invalid_definition_is_reported() {
        let file = write_file(
            ".yaml",
            "owner:\n  name: foo\nservice:\n  run: /bin/foo\n  keep_alive:\n    forever: true\n",
        );
        let paths = LocalPaths::new("/opt/pkg", "/home/alice");
        let service_file = ServiceFile::from_file(file.path()).unwrap();
        assert!(service_file.definition(&paths).is_err());
    }

    #[test]
    fn test_bad_cron_surfaces_on_render() {
        let file = write_file(
            ".yaml",
            "owner:\n  name: foo\nservice:\n  run: /bin/foo\n  cron: \"* * *\"\n",
        );
        let paths = LocalPaths::new("/opt/pkg", "/home/alice");
        let service_file = ServiceFile::from_file(file.path()).unwrap();
        let owner = service_file.owner(&paths);
        let service = service_file.definition(&paths).unwrap().into_service(&owner);
        assert!(service.to_plist().is_err());
    }
}
