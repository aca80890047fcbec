use crate::infrastructure::error::InfraError;
use chrono_tz::Tz;
use std::fs;
use std::path::Path;

const APP_JSON: &str = "app.json";
const DEFAULT_TIMEZONE: &str = "America/Los_Angeles";
const DEFAULT_EVENT_DURATION_MINUTES: i64 = 60;

fn default_app_config() -> serde_json::Value {
    serde_json::json!({
        "schema": 1,
        "appName": "Agenda",
        "timezone": DEFAULT_TIMEZONE,
        "defaultEventDurationMinutes": DEFAULT_EVENT_DURATION_MINUTES
    })
}

pub fn ensure_default_configs(config_dir: &Path) -> Result<(), InfraError> {
    let path = config_dir.join(APP_JSON);
    if !path.exists() {
        let formatted = serde_json::to_string_pretty(&default_app_config())?;
        fs::write(path, format!("{formatted}\n"))?;
    }
    Ok(())
}

fn read_config(path: &Path) -> Result<serde_json::Value, InfraError> {
    let raw = fs::read_to_string(path)?;
    let parsed: serde_json::Value = serde_json::from_str(&raw)?;
    let schema = parsed
        .get("schema")
        .and_then(serde_json::Value::as_u64)
        .ok_or_else(|| InfraError::InvalidConfig(format!("missing schema in {}", path.display())))?;
    if schema != 1 {
        return Err(InfraError::InvalidConfig(format!(
            "unsupported schema {} in {}",
            schema,
            path.display()
        )));
    }
    Ok(parsed)
}

pub fn read_timezone(config_dir: &Path) -> Result<Tz, InfraError> {
    let app = read_config(&config_dir.join(APP_JSON))?;
    let name = app
        .get("timezone")
        .and_then(serde_json::Value::as_str)
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .unwrap_or(DEFAULT_TIMEZONE);
    name.parse::<Tz>()
        .map_err(|_| InfraError::InvalidConfig(format!("unknown timezone '{name}' in app.json")))
}

pub fn read_default_event_duration(config_dir: &Path) -> Result<i64, InfraError> {
    let app = read_config(&config_dir.join(APP_JSON))?;
    let minutes = app
        .get("defaultEventDurationMinutes")
        .and_then(serde_json::Value::as_i64)
        .unwrap_or(DEFAULT_EVENT_DURATION_MINUTES);
    if minutes <= 0 {
        return Err(InfraError::InvalidConfig(
            "defaultEventDurationMinutes must be positive".to_string(),
        ));
    }
    Ok(minutes)
}

pub fn read_app_name(config_dir: &Path) -> Result<String, InfraError> {
    let app = read_config(&config_dir.join(APP_JSON))?;
    Ok(app
        .get("appName")
        .and_then(serde_json::Value::as_str)
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .unwrap_or("Agenda")
        .to_string())
}
