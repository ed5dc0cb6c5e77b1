use crate::error::Result;
use crate::model::RunType;
use crate::service::Service;

impl Service<'_> {
    /// Renders the `.service` unit.
    pub fn to_systemd_unit(&self) -> Result<String> {
        let exec_start = self.command()?.join(" ");
        let settings = self.ensure_evaluated()?;

        let mut unit = format!(
            "[Unit]\n\
             Description=Generated unit for {}\n\
             \n\
             [Install]\n\
             WantedBy=default.target\n\
             \n\
             [Service]\n",
            self.owner().name()
        );

        let mut options = Vec::new();
        if settings.launch_only_once() == Some(true) {
            options.push("Type=oneshot".to_string());
        } else {
            options.push("Type=simple".to_string());
        }
        options.push(format!("ExecStart={}", exec_start));

        if settings.keep_alive().and_then(|k| k.always()) == Some(true) {
            options.push("Restart=always".to_string());
        }
        if let Some(delay) = settings.restart_delay() {
            options.push(format!("RestartSec={}", delay));
        }
        if let Some(dir) = present(settings.working_dir()) {
            options.push(format!("WorkingDirectory={}", dir));
        }
        if let Some(dir) = present(settings.root_dir()) {
            options.push(format!("RootDirectory={}", dir));
        }
        if let Some(path) = present(settings.input_path()) {
            options.push(format!("StandardInput=file:{}", path));
        }
        if let Some(path) = present(settings.log_path()) {
            options.push(format!("StandardOutput=append:{}", path));
        }
        if let Some(path) = present(settings.error_log_path()) {
            options.push(format!("StandardError=append:{}", path));
        }
        for (key, value) in settings.environment_variables() {
            options.push(format!("Environment=\"{}={}\"", key, value));
        }

        unit.push_str(&options.join("\n"));
        Ok(unit)
    }

    /// Renders the `.timer` unit that triggers the service.
    ///
    /// `OnCalendar` is written as `Weekday-*-Month-Day Hour:Minute:00`.
    /// Consumers of existing timers depend on that exact layout.
    pub fn to_systemd_timer(&self) -> Result<String> {
        let settings = self.ensure_evaluated()?;

        let mut timer = format!(
            "[Unit]\n\
             Description=Generated timer for {}\n\
             \n\
             [Install]\n\
             WantedBy=timers.target\n\
             \n\
             [Timer]\n\
             Unit={}\n",
            self.owner().name(),
            self.owner().service_name()
        );

        let mut options = Vec::new();
        match settings.run_type() {
            RunType::Cron => {
                options.push("Persistent=true".to_string());
                if let Some(cron) = settings.cron() {
                    options.push(format!(
                        "OnCalendar={}-*-{}-{} {}:{}:00",
                        cron.weekday(),
                        cron.month(),
                        cron.day(),
                        cron.hour().padded(),
                        cron.minute().padded()
                    ));
                }
            }
            RunType::Interval => {
                if let Some(interval) = settings.interval() {
                    options.push(format!("OnUnitActiveSec={}", interval));
                }
            }
            RunType::Immediate => {}
        }

        timer.push_str(&options.join("\n"));
        Ok(timer)
    }
}

fn present(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::KeepAliveConditions;
    use crate::testing::TestOwner;

    #[test]
    fn test_simple_unit() {
        let owner = TestOwner::new("foo");
        let service = Service::new(&owner, |s| {
            s.run("/bin/foo");
            Ok(())
        });

        assert_eq!(
            service.to_systemd_unit().unwrap(),
            "[Unit]\n\
             Description=Generated unit for foo\n\
             \n\
             [Install]\n\
             WantedBy=default.target\n\
             \n\
             [Service]\n\
             Type=simple\n\
             ExecStart=/bin/foo"
        );
    }

    #[test]
    fn test_full_unit_option_order() {
        let owner = TestOwner::new("foo");
        let service = Service::new(&owner, |s| {
            s.run(vec!["/bin/foo", "--port", "8080"])
                .launch_only_once(true)
                .keep_alive(true)
                .restart_delay(3)
                .working_dir("/var/foo")
                .root_dir("/srv")
                .input_path("/dev/null")
                .log_path("/var/log/foo.log")
                .error_log_path("/var/log/foo.err")
                .environment_variables([("HOME", "/var/foo"), ("LANG", "C")]);
            Ok(())
        });

        let unit = service.to_systemd_unit().unwrap();
        let body = unit.split("[Service]\n").nth(1).unwrap();
        assert_eq!(
            body.lines().collect::<Vec<_>>(),
            vec![
                "Type=oneshot",
                "ExecStart=/bin/foo --port 8080",
                "Restart=always",
                "RestartSec=3",
                "WorkingDirectory=/var/foo",
                "RootDirectory=/srv",
                "StandardInput=file:/dev/null",
                "StandardOutput=append:/var/log/foo.log",
                "StandardError=append:/var/log/foo.err",
                "Environment=\"HOME=/var/foo\"",
                "Environment=\"LANG=C\"",
            ]
        );
    }

    #[test]
    fn test_restart_only_when_always() {
        let owner = TestOwner::new("foo");
        let service = Service::new(&owner, |s| {
            s.run("/bin/foo").keep_alive(KeepAliveConditions {
                crashed: Some(true),
                ..Default::default()
            });
            Ok(())
        });
        assert!(!service.to_systemd_unit().unwrap().contains("Restart=always"));

        let always = Service::new(&owner, |s| {
            s.run("/bin/foo").keep_alive(KeepAliveConditions {
                always: Some(true),
                ..Default::default()
            });
            Ok(())
        });
        assert!(always.to_systemd_unit().unwrap().contains("\nRestart=always"));
    }

    #[test]
    fn test_hourly_cron_timer() {
        let owner = TestOwner::new("foo");
        let service = Service::new(&owner, |s| {
            s.run("/bin/foo").run_type(RunType::Cron).cron("@hourly")?;
            Ok(())
        });

        assert_eq!(
            service.to_systemd_timer().unwrap(),
            "[Unit]\n\
             Description=Generated timer for foo\n\
             \n\
             [Install]\n\
             WantedBy=timers.target\n\
             \n\
             [Timer]\n\
             Unit=example.foo\n\
             Persistent=true\n\
             OnCalendar=*-*-*-* *:00:00"
        );
    }

    #[test]
    fn test_cron_timer_field_order() {
        let owner = TestOwner::new("foo");
        let service = Service::new(&owner, |s| {
            s.run("/bin/foo").run_type(RunType::Cron).cron("5 7 15 6 2")?;
            Ok(())
        });

        assert!(service
            .to_systemd_timer()
            .unwrap()
            .ends_with("\nOnCalendar=2-*-6-15 07:05:00"));
    }

    #[test]
    fn test_interval_timer() {
        let owner = TestOwner::new("foo");
        let service = Service::new(&owner, |s| {
            s.run("/bin/foo").run_type(RunType::Interval).interval(3600);
            Ok(())
        });

        let timer = service.to_systemd_timer().unwrap();
        assert!(timer.ends_with("Unit=example.foo\nOnUnitActiveSec=3600"));
        assert!(!timer.contains("Persistent"));
    }
}
