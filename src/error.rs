use std::fmt;
use std::time::Duration;

/// Errors that can occur while driving the tracking pipeline.
#[derive(Debug, thiserror::Error)]
pub enum TrackerError {
    #[error("Tracking runtime is not installed")]
    RuntimeNotInstalled,

    #[error("Tracking runtime did not become ready within {0:?}")]
    InitTimeout(Duration),

    #[error("Tracking runtime init failed: {0}")]
    InitFailed(String),

    #[error("Tracking runtime not initialized")]
    NotInitialized,

    #[error("Malformed binding data: {0}")]
    MalformedBindings(String),

    #[error("Role configuration error: {0}")]
    RoleConfig(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Failed to spawn thread: {0}")]
    ThreadSpawn(String),

    #[error("Tracker stopped")]
    Stopped,
}

/// Thread-safe last-error storage for the C FFI layer.
pub(crate) struct LastError {
    message: std::sync::Mutex<String>,
}

impl LastError {
    pub const fn new() -> Self {
        Self {
            message: std::sync::Mutex::new(String::new()),
        }
    }

    pub fn set(&self, err: &TrackerError) {
        self.set_message(&err.to_string());
    }

    pub fn set_message(&self, text: &str) {
        if let Ok(mut msg) = self.message.lock() {
            // Interior NULs would truncate the C string early.
            let text = text.replace('\0', " ");
            *msg = fmt::format(format_args!("{}\0", text));
        }
    }

    pub fn clear(&self) {
        if let Ok(mut msg) = self.message.lock() {
            msg.clear();
        }
    }

    pub fn as_ptr(&self) -> *const std::ffi::c_char {
        match self.message.lock() {
            Ok(msg) if !msg.is_empty() => msg.as_ptr() as *const std::ffi::c_char,
            _ => std::ptr::null(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn last_error_is_nul_terminated() {
        let slot = LastError::new();
        assert!(slot.as_ptr().is_null());

        slot.set(&TrackerError::RuntimeNotInstalled);
        let ptr = slot.as_ptr();
        assert!(!ptr.is_null());
        let text = unsafe { std::ffi::CStr::from_ptr(ptr) };
        assert_eq!(text.to_str().unwrap(), "Tracking runtime is not installed");

        slot.clear();
        assert!(slot.as_ptr().is_null());
    }

    #[test]
    fn timeout_message_names_the_bound() {
        let err = TrackerError::InitTimeout(Duration::from_secs(10));
        assert_eq!(
            err.to_string(),
            "Tracking runtime did not become ready within 10s"
        );
    }
}
