use crate::error::Error;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Turns panics inside work bodies into failed outcomes instead of killing
/// the worker thread.
#[derive(Debug, Default)]
pub struct PanicHandler {
    panic_count: AtomicUsize,
}

impl PanicHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn execute<F, R>(&self, f: F) -> Result<R, PanicInfo>
    where
        F: FnOnce() -> R,
    {
        match catch_unwind(AssertUnwindSafe(f)) {
            Ok(result) => Ok(result),
            Err(payload) => {
                self.panic_count.fetch_add(1, Ordering::Relaxed);
                let info = PanicInfo::from_payload(payload);
                tracing::error!(message = %info.message, "work body panicked");
                Err(info)
            }
        }
    }

    pub fn panic_count(&self) -> usize {
        self.panic_count.load(Ordering::Relaxed)
    }
}

#[derive(Debug, Clone)]
pub struct PanicInfo {
    pub message: String,
}

impl PanicInfo {
    fn from_payload(payload: Box<dyn std::any::Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            s.to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "unknown panic".to_string()
        };

        Self { message }
    }
}

impl From<PanicInfo> for Error {
    fn from(info: PanicInfo) -> Self {
        Error::WorkerPanic(info.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_panic_is_captured() {
        let handler = PanicHandler::new();

        let result = handler.execute(|| {
            panic!("test panic");
        });

        let err: Error = result.unwrap_err().into();
        assert_eq!(err, Error::WorkerPanic("test panic".to_string()));
        assert_eq!(handler.panic_count(), 1);
    }

    #[test]
    fn test_success_passes_through() {
        let handler = PanicHandler::new();
        let result = handler.execute(|| 42);
        assert_eq!(result.unwrap(), 42);
        assert_eq!(handler.panic_count(), 0);
    }

    #[test]
    fn test_formatted_panic_message() {
        let handler = PanicHandler::new();
        for i in 0..3 {
            let info = handler.execute(|| panic!("failure {}", i)).unwrap_err();
            assert_eq!(info.message, format!("failure {}", i));
        }
        assert_eq!(handler.panic_count(), 3);
    }
}
