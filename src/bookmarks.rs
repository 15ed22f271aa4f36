//! Bookmarked map views and their persistence.

use crate::context::TaskContext;
use crate::error::StorageError;
use crate::task::TaskHandle;
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;

/// Coordinates are degrees scaled by 1e7.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ViewBox {
    pub left: i32,
    pub bottom: i32,
    pub right: i32,
    pub top: i32,
}

impl ViewBox {
    pub const SCALE: f64 = 1e7;

    pub fn new(left: i32, bottom: i32, right: i32, top: i32) -> Self {
        Self {
            left,
            bottom,
            right,
            top,
        }
    }

    pub fn from_degrees(left: f64, bottom: f64, right: f64, top: f64) -> Self {
        let scale = |d: f64| (d * Self::SCALE).round() as i32;
        Self::new(scale(left), scale(bottom), scale(right), scale(top))
    }

    pub fn width(&self) -> i64 {
        i64::from(self.right) - i64::from(self.left)
    }

    pub fn height(&self) -> i64 {
        i64::from(self.top) - i64::from(self.bottom)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bookmark {
    pub comment: String,
    pub view_box: ViewBox,
}

/// Persistent ordered list. Encoding is up to the implementation.
pub trait ListStore<T>: Send + Sync {
    /// Stored records, `None` when nothing has been saved yet.
    fn load(&self) -> Result<Option<Vec<T>>, StorageError>;
    fn save(&self, items: &[T], overwrite: bool) -> Result<(), StorageError>;
}

#[derive(Debug)]
pub struct MemoryListStore<T> {
    name: String,
    items: RwLock<Option<Vec<T>>>,
}

impl<T> MemoryListStore<T> {
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self {
            name: name.into(),
            items: RwLock::new(None),
        }
    }
}

impl<T: Clone + Send + Sync> ListStore<T> for MemoryListStore<T> {
    fn load(&self) -> Result<Option<Vec<T>>, StorageError> {
        Ok(self.items.read().clone())
    }

    fn save(&self, items: &[T], overwrite: bool) -> Result<(), StorageError> {
        let mut stored = self.items.write();
        if stored.is_some() && !overwrite {
            return Err(StorageError::write(self.name.as_str(), "already exists"));
        }
        *stored = Some(items.to_vec());
        Ok(())
    }
}

/// Reads and writes the bookmark list.
pub struct BookmarkIo {
    store: Arc<dyn ListStore<Bookmark>>,
    pending: Vec<Bookmark>,
}

impl BookmarkIo {
    pub fn new(store: Arc<dyn ListStore<Bookmark>>) -> Self {
        Self {
            store,
            pending: Vec::new(),
        }
    }

    /// Append a fresh record to the working list.
    pub fn add<S: Into<String>>(&mut self, comment: S, view_box: ViewBox) {
        self.pending.push(Bookmark {
            comment: comment.into(),
            view_box,
        });
    }

    pub fn pending(&self) -> &[Bookmark] {
        &self.pending
    }

    /// Stored bookmarks, or the working list if nothing is stored or the
    /// store cannot be read.
    pub fn read_list(&self) -> Vec<Bookmark> {
        match self.store.load() {
            Ok(Some(list)) => list,
            Ok(None) => self.pending.clone(),
            Err(err) => {
                tracing::warn!(%err, "unable to read bookmarks");
                self.pending.clone()
            }
        }
    }

    pub fn write_list(&self, list: &[Bookmark]) -> Result<(), StorageError> {
        self.store.save(list, true)
    }

    /// Load, append, overwrite.
    pub fn writer<S: Into<String>>(&mut self, comment: S, view_box: ViewBox) -> Result<(), StorageError> {
        self.pending = self.read_list();
        self.add(comment, view_box);
        self.write_list(&self.pending)
    }
}

impl std::fmt::Debug for BookmarkIo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BookmarkIo")
            .field("pending", &self.pending.len())
            .finish()
    }
}

/// Run [`BookmarkIo::writer`] on the pool. Resolves to the number of stored
/// bookmarks.
pub fn save_in_background(
    ctx: &TaskContext,
    io: Arc<Mutex<BookmarkIo>>,
    comment: String,
    view_box: ViewBox,
) -> TaskHandle<usize> {
    ctx.submit(move |_| {
        let mut io = io.lock();
        io.writer(comment, view_box)?;
        Ok(io.pending().len())
    })
}
