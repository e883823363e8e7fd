use crate::event::Event;

/// Emitted from each handler in the chain; governs cache removal and
/// propagates to the next go-through subscriber unchanged unless the
/// handler replaces it.
#[derive(Debug, Clone)]
pub struct Response {
    /// The event this response is carrying.
    pub event: Event,
    /// The originating request path, if any.
    pub req_url: String,
    /// `true` is the standard "consume" signal: the caller should remove
    /// this entry from the cache.
    pub remove_cache: bool,
    /// Meaningful only when `remove_cache == false`: whether this entry
    /// remains eligible for the timestamp-watermark sweep.
    pub auto_remove: bool,
}

impl Response {
    /// The response a dispatch starts with: not yet consumed, still
    /// eligible for auto-removal.
    #[must_use]
    pub fn initial(event: Event, req_url: impl Into<String>) -> Self {
        Self {
            event,
            req_url: req_url.into(),
            remove_cache: false,
            auto_remove: true,
        }
    }

    /// Mark this response as consuming the event (removes it from cache).
    #[must_use]
    pub fn consumed(mut self) -> Self {
        self.remove_cache = true;
        self
    }

    /// Mark this response as preserving the event past the auto-remove watermark.
    #[must_use]
    pub fn preserved(mut self) -> Self {
        self.remove_cache = false;
        self.auto_remove = false;
        self
    }
}
