//! Presentation layer seen from application logic.

/// Action attached to a notification, run if the user picks it.
pub type Action = Box<dyn FnOnce() + Send + 'static>;

/// Notifications shown to the user. Called only from the interactive thread,
/// inside dispatcher-delivered callbacks.
pub trait Presenter: Send + Sync {
    fn info(&self, message: &str);
    fn error(&self, message: &str);
    fn error_with_action(&self, message: &str, action_label: &str, action: Action);
}
