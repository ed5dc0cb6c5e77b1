use crate::error::{Result, ServiceError};
use std::fmt;

/// One field of a cron schedule: either the `*` wildcard or a fixed value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CronField {
    #[default]
    Any,
    At(u32),
}

impl CronField {
    pub fn is_any(&self) -> bool {
        matches!(self, CronField::Any)
    }

    pub fn value(&self) -> Option<u32> {
        match self {
            CronField::Any => None,
            CronField::At(n) => Some(*n),
        }
    }

    /// Two-digit form used for clock positions (`07`), wildcard left as `*`.
    pub fn padded(&self) -> String {
        match self {
            CronField::Any => "*".to_string(),
            CronField::At(n) => format!("{:02}", n),
        }
    }
}

impl fmt::Display for CronField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CronField::Any => write!(f, "*"),
            CronField::At(n) => write!(f, "{}", n),
        }
    }
}

/// A normalized five-field schedule. Only [`parse_cron`] builds one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CronSchedule {
    minute: CronField,
    hour: CronField,
    day: CronField,
    month: CronField,
    weekday: CronField,
}

impl CronSchedule {
    pub fn minute(&self) -> CronField {
        self.minute
    }

    pub fn hour(&self) -> CronField {
        self.hour
    }

    pub fn day(&self) -> CronField {
        self.day
    }

    pub fn month(&self) -> CronField {
        self.month
    }

    pub fn weekday(&self) -> CronField {
        self.weekday
    }

    /// Fields keyed by their launchd calendar names, in statement order.
    pub fn fields(&self) -> [(&'static str, CronField); 5] {
        [
            ("Minute", self.minute),
            ("Hour", self.hour),
            ("Day", self.day),
            ("Month", self.month),
            ("Weekday", self.weekday),
        ]
    }
}

/// Rebuilds the five-field statement, e.g. `0 * * * *` for `@hourly`.
impl fmt::Display for CronSchedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {} {}",
            self.minute, self.hour, self.day, self.month, self.weekday
        )
    }
}

pub fn parse_cron(statement: &str) -> Result<CronSchedule> {
    let mut parsed = CronSchedule::default();

    match statement {
        "@hourly" => {
            parsed.minute = CronField::At(0);
        }
        "@daily" => {
            parsed.minute = CronField::At(0);
            parsed.hour = CronField::At(0);
        }
        "@weekly" => {
            parsed.minute = CronField::At(0);
            parsed.hour = CronField::At(0);
            parsed.weekday = CronField::At(0);
        }
        "@monthly" => {
            parsed.minute = CronField::At(0);
            parsed.hour = CronField::At(0);
            parsed.day = CronField::At(1);
        }
        "@yearly" | "@annually" => {
            parsed.minute = CronField::At(0);
            parsed.hour = CronField::At(0);
            parsed.day = CronField::At(1);
            parsed.month = CronField::At(1);
        }
        _ => {
            let parts: Vec<&str> = statement.split_whitespace().collect();
            if parts.len() != 5 {
                return Err(ServiceError::Schedule {
                    statement: statement.to_string(),
                    reason: format!("expected 5 fields, found {}", parts.len()),
                });
            }

            parsed.minute = parse_field(statement, parts[0])?;
            parsed.hour = parse_field(statement, parts[1])?;
            parsed.day = parse_field(statement, parts[2])?;
            parsed.month = parse_field(statement, parts[3])?;
            parsed.weekday = parse_field(statement, parts[4])?;
        }
    }

    Ok(parsed)
}

fn parse_field(statement: &str, field: &str) -> Result<CronField> {
    if field == "*" {
        return Ok(CronField::Any);
    }

    let invalid = || ServiceError::Schedule {
        statement: statement.to_string(),
        reason: format!("{:?} is neither * nor an integer", field),
    };

    // Digits only: `u32::from_str` would also take a leading `+`.
    if !field.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }
    field.parse().map(CronField::At).map_err(|_| invalid())
}
