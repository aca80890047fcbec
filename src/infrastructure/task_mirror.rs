use crate::infrastructure::error::InfraError;
use std::process::Command;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

/// Local to-do destination. The production mirror drives Things through
/// AppleScript; the recording mirror backs the tests.
pub trait TaskMirror: Send + Sync {
    fn create_task(&self, title: &str, note: &str) -> Result<(), InfraError>;
}

#[derive(Debug, Clone, Default)]
pub struct ThingsTaskMirror;

impl ThingsTaskMirror {
    pub fn new() -> Self {
        Self
    }

    fn build_script(title: &str, note: &str) -> String {
        format!(
            concat!(
                "tell application \"Things3\"\n",
                "  set newToDo to make new to do with properties ",
                "{{name:\"{title}\", notes:\"{note}\"}}\n",
                "  move newToDo to list \"Today\"\n",
                "end tell"
            ),
            title = escape_applescript(title),
            note = escape_applescript(note),
        )
    }
}

impl TaskMirror for ThingsTaskMirror {
    fn create_task(&self, title: &str, note: &str) -> Result<(), InfraError> {
        let script = Self::build_script(title, note);
        let output = Command::new("osascript")
            .arg("-e")
            .arg(&script)
            .output()
            .map_err(|error| InfraError::TaskMirror(format!("failed to run osascript: {error}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(InfraError::TaskMirror(format!(
                "osascript exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }
        Ok(())
    }
}

fn escape_applescript(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Test double: records created tasks, optionally failing on demand.
#[derive(Debug, Default)]
pub struct RecordingTaskMirror {
    created: Mutex<Vec<(String, String)>>,
    fail: AtomicBool,
}

impl RecordingTaskMirror {
    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn created(&self) -> Vec<(String, String)> {
        self.created
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }

    pub fn call_count(&self) -> usize {
        self.created().len()
    }
}

impl TaskMirror for RecordingTaskMirror {
    fn create_task(&self, title: &str, note: &str) -> Result<(), InfraError> {
        let mut guard = self
            .created
            .lock()
            .map_err(|error| InfraError::TaskMirror(format!("recording lock poisoned: {error}")))?;
        guard.push((title.to_string(), note.to_string()));
        if self.fail.load(Ordering::SeqCst) {
            return Err(InfraError::TaskMirror("simulated mirror failure".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn script_embeds_title_and_note() {
        let script = ThingsTaskMirror::build_script("Review PR", "Scheduled: 9:00 AM on Monday, March 2");
        assert!(script.contains("tell application \"Things3\""));
        assert!(script.contains("name:\"Review PR\""));
        assert!(script.contains("notes:\"Scheduled: 9:00 AM on Monday, March 2\""));
        assert!(script.contains("move newToDo to list \"Today\""));
    }

    #[test]
    fn script_escapes_quotes_and_backslashes() {
        let script = ThingsTaskMirror::build_script(r#"Fix "quoted" thing"#, r"note with \ slash");
        assert!(script.contains(r#"name:"Fix \"quoted\" thing""#));
        assert!(script.contains(r"note with \\ slash"));
    }

    #[test]
    fn recording_mirror_tracks_calls_and_failures() {
        let mirror = RecordingTaskMirror::default();
        mirror.create_task("a", "n1").expect("first call succeeds");

        mirror.set_failing(true);
        assert!(mirror.create_task("b", "n2").is_err());

        // both attempts are recorded, including the failed one
        assert_eq!(mirror.call_count(), 2);
        assert_eq!(mirror.created()[0].0, "a");
    }
}
