//! API key for the remote task service.
//!
//! The key lives in the preference store. Reading it is a bounded synchronous
//! read that falls back to "no key"; writing it is fire-and-forget, with
//! every user-facing message raised from the completion callback on the
//! interactive thread.

use crate::context::TaskContext;
use crate::prefs::PreferenceStore;
use crate::present::Presenter;
use crate::task::TaskHandle;
use std::collections::BTreeSet;
use std::sync::Arc;

pub const API_KEY_PREF: &str = "maproulette_apikey_v2";
pub const TASK_FILTER_ENTRY: &str = "MAPROULETTE";

pub const MSG_KEY_SET: &str = "MapRoulette API key set";
pub const MSG_KEY_NOT_SET: &str = "MapRoulette API key not set";
pub const MSG_NO_KEY: &str = "No MapRoulette API key, tasks cannot be updated";
pub const ACTION_DISABLE: &str = "Disable";

/// The task layer the key controls.
pub trait TaskLayer: Send + Sync {
    fn task_filter(&self) -> BTreeSet<String>;
    fn set_task_filter(&self, filter: BTreeSet<String>);
    /// Remove every stored task that came from `source`; returns how many.
    fn purge_tasks(&self, source: &str) -> usize;
    fn invalidate(&self);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyUpdate {
    Stored,
    Cleared { source_enabled: bool },
}

/// Current key, or `None` if unset, unreadable, or not read in time.
pub fn get(ctx: &TaskContext, store: Arc<dyn PreferenceStore>) -> Option<String> {
    ctx.read_bounded(move |_| Ok(store.get(API_KEY_PREF)?)).flatten()
}

/// Text to pre-fill the key prompt with.
pub fn prompt_text(ctx: &TaskContext, store: Arc<dyn PreferenceStore>, retrieve_key: bool) -> Option<String> {
    if retrieve_key {
        get(ctx, store)
    } else {
        None
    }
}

/// Store the key the user entered. An empty input clears the key and, when
/// the task source is still enabled, offers to disable it.
pub fn set(
    ctx: &TaskContext,
    store: Arc<dyn PreferenceStore>,
    presenter: Arc<dyn Presenter>,
    layer: Arc<dyn TaskLayer>,
    input: &str,
    previous: Option<String>,
) -> TaskHandle<KeyUpdate> {
    let key = input.trim().to_string();
    let work_layer = layer.clone();
    let failure_presenter = presenter.clone();

    ctx.spawn(
        move |_| {
            if !key.is_empty() {
                store.set(API_KEY_PREF, &key)?;
                return Ok(KeyUpdate::Stored);
            }

            if previous.is_some() {
                if let Err(err) = store.delete(API_KEY_PREF) {
                    tracing::error!(%err, "unable to delete API key");
                }
            }

            let source_enabled = work_layer.task_filter().contains(TASK_FILTER_ENTRY);
            Ok(KeyUpdate::Cleared { source_enabled })
        },
        move |update| match update {
            KeyUpdate::Stored => presenter.info(MSG_KEY_SET),
            KeyUpdate::Cleared { source_enabled: true } => {
                presenter.error_with_action(
                    MSG_NO_KEY,
                    ACTION_DISABLE,
                    Box::new(move || disable_task_source(layer.as_ref())),
                );
            }
            KeyUpdate::Cleared { source_enabled: false } => {}
        },
        move |err| {
            tracing::error!(%err, "unable to set API key");
            failure_presenter.error(MSG_KEY_NOT_SET);
        },
    )
}

/// Turn the task source off and drop its tasks.
pub fn disable_task_source(layer: &dyn TaskLayer) {
    let mut filter = layer.task_filter();
    filter.remove(TASK_FILTER_ENTRY);
    layer.set_task_filter(filter);

    let purged = layer.purge_tasks(TASK_FILTER_ENTRY);
    tracing::debug!(purged, "task source disabled");
    layer.invalidate();
}
