use eyre::{eyre, WrapErr};
use std::time::Duration;

/// Convert a user-friendly schedule into an EventBridge schedule expression
///
/// Accepts predefined schedules ("@daily"), fixed rates ("@every 30m")
/// and standard 5-field cron expressions.
pub fn to_aws_schedule(schedule: &str) -> eyre::Result<String> {
    let schedule = schedule.trim();

    if let Some(every) = schedule.strip_prefix("@every ") {
        return rate(every);
    }

    if let Some(predefined) = predefined(schedule) {
        return Ok(predefined.to_string());
    }

    if schedule.starts_with('@') {
        return Err(eyre!("Unknown predefined schedule \"{schedule}\""));
    }

    cron(schedule)
}

fn predefined(schedule: &str) -> Option<&'static str> {
    match schedule {
        "@yearly" | "@annually" => Some("cron(0 0 1 1 ? *)"),
        "@monthly" => Some("cron(0 0 1 * ? *)"),
        "@weekly" => Some("cron(0 0 ? * 1 *)"),
        "@daily" | "@midnight" => Some("cron(0 0 * * ? *)"),
        "@hourly" => Some("cron(0 * * * ? *)"),
        _ => None,
    }
}

fn rate(every: &str) -> eyre::Result<String> {
    let duration = humantime::parse_duration(every.trim())
        .wrap_err(format!("Failed to parse duration \"{every}\""))?;

    if duration < Duration::from_secs(60) || duration.as_secs() % 60 != 0 {
        return Err(eyre!(
            "Duration \"{every}\" must be a whole number of minutes, at least 1m"
        ));
    }

    Ok(match duration.as_secs() / 60 {
        1 => "rate(1 minute)".to_string(),
        minutes => format!("rate({minutes} minutes)"),
    })
}

fn cron(expression: &str) -> eyre::Result<String> {
    let fields: Vec<&str> = expression.split_whitespace().collect();

    let [minute, hour, day_of_month, month, day_of_week] = fields.as_slice() else {
        return Err(eyre!(
            "Schedule \"{expression}\" must be a predefined schedule, @every <duration> or a cron expression with 5 fields"
        ));
    };

    let (day_of_month, day_of_week) = match (*day_of_month, *day_of_week) {
        (dom, "*") => (dom.to_string(), "?".to_string()),
        ("*", dow) => ("?".to_string(), day_of_week_to_aws(dow)?),
        _ => {
            return Err(eyre!(
                "Schedule \"{expression}\" can't specify both day of month and day of week"
            ))
        }
    };

    Ok(format!(
        "cron({minute} {hour} {day_of_month} {month} {day_of_week} *)"
    ))
}

/// Standard cron counts days of the week from 0 (Sunday), EventBridge from 1
fn day_of_week_to_aws(field: &str) -> eyre::Result<String> {
    field
        .split(',')
        .map(|item| {
            let (base, step) = match item.split_once('/') {
                Some((base, step)) => (base, Some(step)),
                None => (item, None),
            };

            let base = match base.split_once('-') {
                Some((from, to)) => match (from.parse::<u8>(), to.parse::<u8>()) {
                    (Ok(from), Ok(to)) => return numeric_range(from, to, step),
                    _ => format!("{}-{}", shift_day(from)?, shift_day(to)?),
                },
                None => shift_day(base)?,
            };

            Ok(match step {
                Some(step) => format!("{base}/{step}"),
                None => base,
            })
        })
        .collect::<eyre::Result<Vec<String>>>()
        .map(|items| items.join(","))
}

/// Shift a numeric range, a range ending on Sunday (7) wraps to day 1
fn numeric_range(from: u8, to: u8, step: Option<&str>) -> eyre::Result<String> {
    if from > to || to > 7 {
        return Err(eyre!("Unsupported day of week range \"{from}-{to}\""));
    }

    // 0-7 and 0-6 both cover the whole week
    if from == 0 || to < 7 {
        let to = to.min(6) + 1;

        return Ok(match step {
            Some(step) => format!("{}-{to}/{step}", from + 1),
            None => format!("{}-{to}", from + 1),
        });
    }

    let step = match step {
        Some(step) => step
            .parse::<u8>()
            .ok()
            .filter(|s| *s > 0)
            .ok_or_else(|| eyre!("Invalid day of week step \"{step}\""))?,
        None => 1,
    };

    let mut days = (from..=to)
        .step_by(step as usize)
        .map(|day| if day == 7 { 1 } else { day + 1 })
        .collect::<Vec<_>>();

    days.dedup();

    Ok(days
        .iter()
        .map(|day| day.to_string())
        .collect::<Vec<_>>()
        .join(","))
}

fn shift_day(day: &str) -> eyre::Result<String> {
    match day.parse::<u8>() {
        Ok(n @ 0..=6) => Ok((n + 1).to_string()),
        Ok(7) => Ok("1".to_string()),
        Ok(_) => Err(eyre!("Day of week \"{day}\" is out of range")),
        // Named days (MON-FRI), wildcards and "L"/"#" expressions are the same in both formats
        Err(_) => Ok(day.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn predefined_schedules() {
        assert_eq!(to_aws_schedule("@daily").unwrap(), "cron(0 0 * * ? *)");
        assert_eq!(to_aws_schedule("@midnight").unwrap(), "cron(0 0 * * ? *)");
        assert_eq!(to_aws_schedule("@hourly").unwrap(), "cron(0 * * * ? *)");
        assert_eq!(to_aws_schedule("@weekly").unwrap(), "cron(0 0 ? * 1 *)");
        assert_eq!(to_aws_schedule("@monthly").unwrap(), "cron(0 0 1 * ? *)");
        assert_eq!(to_aws_schedule("@annually").unwrap(), "cron(0 0 1 1 ? *)");
        assert!(to_aws_schedule("@fortnightly").is_err());
    }

    #[test]
    fn fixed_rates() {
        assert_eq!(to_aws_schedule("@every 1m").unwrap(), "rate(1 minute)");
        assert_eq!(to_aws_schedule("@every 2h").unwrap(), "rate(120 minutes)");
        assert!(to_aws_schedule("@every 30s").is_err());
        assert!(to_aws_schedule("@every 90s").is_err());
        assert!(to_aws_schedule("@every often").is_err());
    }

    #[test]
    fn cron_day_of_month() {
        assert_eq!(
            to_aws_schedule("30 9 1 * *").unwrap(),
            "cron(30 9 1 * ? *)"
        );
        assert_eq!(
            to_aws_schedule("*/5 * * * *").unwrap(),
            "cron(*/5 * * * ? *)"
        );
    }

    #[test]
    fn cron_day_of_week_is_shifted() {
        assert_eq!(
            to_aws_schedule("0 12 * * 1-5").unwrap(),
            "cron(0 12 ? * 2-6 *)"
        );
        assert_eq!(
            to_aws_schedule("0 0 * * 0,6").unwrap(),
            "cron(0 0 ? * 1,7 *)"
        );
        assert_eq!(to_aws_schedule("0 0 * * 7").unwrap(), "cron(0 0 ? * 1 *)");
        assert_eq!(
            to_aws_schedule("0 0 * * 5-7").unwrap(),
            "cron(0 0 ? * 6,7,1 *)"
        );
        assert_eq!(
            to_aws_schedule("0 0 * * 0-6").unwrap(),
            "cron(0 0 ? * 1-7 *)"
        );
        assert_eq!(
            to_aws_schedule("0 0 * * 0-7").unwrap(),
            "cron(0 0 ? * 1-7 *)"
        );
        assert_eq!(
            to_aws_schedule("0 0 * * 1-7/2").unwrap(),
            "cron(0 0 ? * 2,4,6,1 *)"
        );
        assert_eq!(
            to_aws_schedule("0 0 * * MON-FRI").unwrap(),
            "cron(0 0 ? * MON-FRI *)"
        );
    }

    #[test]
    fn invalid_cron() {
        assert!(to_aws_schedule("0 0 1 * MON").is_err());
        assert!(to_aws_schedule("0 0 * *").is_err());
        assert!(to_aws_schedule("0 0 * * 9").is_err());
        assert!(to_aws_schedule("0 0 * * 5-3").is_err());
    }
}
