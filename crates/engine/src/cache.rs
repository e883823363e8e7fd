//! The dual paced cache pool: main cache (paced delivery) and peek cache
//! (immediate, unpaced delivery to peek-only subscribers).

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicI32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use ssevent_core::{now_micros, CachedEvent, EngineConfig, Event, SubscriberId};
use tokio::sync::Mutex as TokioMutex;
use tokio::task::JoinHandle;

/// What a pop callback reports back to the pacing loop.
#[derive(Debug, Clone)]
pub struct PopOutcome {
    /// Whether the entry was consumed (`removeCache=true`); swept at the
    /// end of the current pacing pass.
    pub is_consumed: bool,
    /// Whether the entry remains eligible for the timestamp-watermark sweep.
    pub auto_remove: bool,
    /// Subscribers notified while delivering this entry.
    pub notified: Vec<SubscriberId>,
}

/// Callback invoked once per cached entry during a pacing pass.
///
/// Deliberately synchronous: the pacing loop's interval delay must remain
/// the only suspension point inside one iteration, since this callback is
/// where subscriber code runs.
pub type PopCallback = Arc<dyn Fn(&CachedEvent) -> PopOutcome + Send + Sync>;

/// Target state for [`CacheDeliverer::set_state`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheState {
    /// Pacing may proceed.
    Active,
    /// Pacing is suspended; the idle checker is stopped.
    Pause,
}

struct Inner {
    main: TokioMutex<Vec<CachedEvent>>,
    peek: TokioMutex<Vec<CachedEvent>>,
    pause_count: AtomicI32,
    forced_pause: AtomicBool,
    break_loop: AtomicBool,
    loop_running: AtomicBool,
    can_run_locked_task: AtomicBool,
    interval: StdMutex<Duration>,
    saved_interval: StdMutex<Option<Duration>>,
    ele_types_in_interval: HashSet<String>,
    idle_observer: StdMutex<Option<Arc<dyn Fn() + Send + Sync>>>,
    sse_idle_length: AtomicUsize,
    idle_task: StdMutex<Option<JoinHandle<()>>>,
    last_pop: StdMutex<Option<PopCallback>>,
}

/// The dual cache pool described in the component design: a `main` cache
/// drained by a pacing loop, and a `peek` cache delivered immediately and
/// independently.
#[derive(Clone)]
pub struct CacheDeliverer(Arc<Inner>);

impl CacheDeliverer {
    /// Construct a deliverer from the relevant slice of engine config.
    #[must_use]
    pub fn new(config: &EngineConfig) -> Self {
        Self(Arc::new(Inner {
            main: TokioMutex::new(Vec::new()),
            peek: TokioMutex::new(Vec::new()),
            pause_count: AtomicI32::new(0),
            forced_pause: AtomicBool::new(false),
            break_loop: AtomicBool::new(false),
            loop_running: AtomicBool::new(false),
            can_run_locked_task: AtomicBool::new(true),
            interval: StdMutex::new(config.sse_buffer_extract_interval()),
            saved_interval: StdMutex::new(None),
            ele_types_in_interval: config.ele_types_in_interval.clone(),
            idle_observer: StdMutex::new(None),
            sse_idle_length: AtomicUsize::new(0),
            idle_task: StdMutex::new(None),
            last_pop: StdMutex::new(None),
        }))
    }

    /// Append `events` to the main cache and (re-)enter the pacing loop.
    pub async fn put(&self, events: Vec<Event>, req_url: impl Into<String>, pop: PopCallback) {
        if !self.0.can_run_locked_task.load(Ordering::Acquire) {
            return;
        }
        let req_url = req_url.into();
        {
            let mut main = self.0.main.lock().await;
            for event in events {
                main.push(CachedEvent::new(event, now_micros(), req_url.clone()));
            }
        }
        self.remember_pop(pop.clone());
        self.enter_pacing_loop(pop);
    }

    /// Append `events` to the peek cache only.
    pub async fn put_peek(&self, events: Vec<Event>, req_url: impl Into<String>) {
        if !self.0.can_run_locked_task.load(Ordering::Acquire) {
            return;
        }
        let req_url = req_url.into();
        let mut peek = self.0.peek.lock().await;
        for event in events {
            peek.push(CachedEvent::new(event, now_micros(), req_url.clone()));
        }
    }

    /// Re-enter the pacing loop over the current main cache contents. If a
    /// loop is already running and `break_loop_first` is set, cancel it and
    /// wait for it to exit before starting fresh.
    pub async fn flush(&self, pop: PopCallback, break_loop_first: bool) {
        if break_loop_first {
            self.0.break_loop.store(true, Ordering::Release);
            while self.0.loop_running.load(Ordering::Acquire) {
                tokio::task::yield_now().await;
            }
            self.0.break_loop.store(false, Ordering::Release);
        }
        self.remember_pop(pop.clone());
        self.enter_pacing_loop(pop);
    }

    /// Invoke `pop` synchronously on every peek-cache entry. No pacing, no removal.
    pub async fn flush_peek(&self, pop: PopCallback) {
        let peek = self.0.peek.lock().await;
        for entry in peek.iter() {
            pop(entry);
        }
    }

    /// Break the current loop, remove entries matching `predicate`, and
    /// insert a new entry at the head of the main cache.
    pub async fn replace(
        &self,
        predicate: impl Fn(&CachedEvent) -> bool,
        new_event: Event,
        req_url: impl Into<String>,
    ) {
        self.0.break_loop.store(true, Ordering::Release);
        let mut main = self.0.main.lock().await;
        main.retain(|e| !predicate(e));
        main.insert(0, CachedEvent::new(new_event, now_micros(), req_url.into()));
    }

    /// Break the loop, permanently refuse further locked work, and empty both caches.
    pub async fn clear_cache(&self) {
        self.0.break_loop.store(true, Ordering::Release);
        self.0.can_run_locked_task.store(false, Ordering::Release);
        self.0.main.lock().await.clear();
        self.0.peek.lock().await.clear();
    }

    /// Clear both caches and re-arm locked work, without permanently
    /// disabling the deliverer. Used when the engine starts a fresh stream.
    pub async fn reset(&self) {
        self.0.break_loop.store(false, Ordering::Release);
        self.0.can_run_locked_task.store(true, Ordering::Release);
        self.0.main.lock().await.clear();
        self.0.peek.lock().await.clear();
    }

    /// Stop the idle checker and clear both caches permanently.
    pub async fn destroy(&self) {
        self.stop_idle_checker();
        self.clear_cache().await;
    }

    /// Expire `autoRemove`-eligible entries admitted before `watermark_micros`.
    ///
    /// Called with a just-consumed entry's admission timestamp as the
    /// watermark whenever a pop returns `removeCache=true`. Returns the
    /// number of entries removed, so a caller iterating the same vector by
    /// index (the pacing loop) can adjust for the shift.
    pub async fn expire_before(&self, watermark_micros: u64) -> usize {
        let mut main = self.0.main.lock().await;
        let before = main.len();
        main.retain(|e| !(e.auto_remove && e.admitted_at_micros < watermark_micros));
        before - main.len()
    }

    /// Reference-counted pause/resume. `force` zeroes the pause count and
    /// sets the state directly, bypassing the refcount.
    pub fn set_state(&self, state: CacheState, force: bool) {
        let was_paused = self.is_paused();
        match (state, force) {
            (CacheState::Pause, false) => {
                self.0.pause_count.fetch_add(1, Ordering::AcqRel);
            }
            (CacheState::Active, false) => {
                let _ = self.0.pause_count.fetch_update(
                    Ordering::AcqRel,
                    Ordering::Acquire,
                    |c| Some((c - 1).max(0)),
                );
            }
            (CacheState::Pause, true) => {
                self.0.pause_count.store(0, Ordering::Release);
                self.0.forced_pause.store(true, Ordering::Release);
            }
            (CacheState::Active, true) => {
                self.0.pause_count.store(0, Ordering::Release);
                self.0.forced_pause.store(false, Ordering::Release);
            }
        }
        let now_paused = self.is_paused();
        if was_paused != now_paused {
            if now_paused {
                self.stop_idle_checker();
            } else {
                self.start_idle_checker();
                // The pacing loop exits outright while paused rather than
                // blocking inside it, so resuming must re-enter it using
                // whichever pop callback was last handed to `put`/`flush`.
                let pop = self.0.last_pop.lock().expect("cache mutex poisoned").clone();
                if let Some(pop) = pop {
                    self.enter_pacing_loop(pop);
                }
            }
        }
    }

    /// `true` iff `pauseCount > 0` or a forced pause is in effect.
    #[must_use]
    pub fn is_paused(&self) -> bool {
        self.0.pause_count.load(Ordering::Acquire) > 0 || self.0.forced_pause.load(Ordering::Acquire)
    }

    /// The current (non-negative) pause refcount.
    #[must_use]
    pub fn pause_count(&self) -> i32 {
        self.0.pause_count.load(Ordering::Acquire)
    }

    /// Install the callback fired when the main cache's length goes
    /// unchanged across one idle-checker tick.
    pub fn set_idle_observer(&self, observer: impl Fn() + Send + Sync + 'static) {
        *self.0.idle_observer.lock().expect("cache mutex poisoned") = Some(Arc::new(observer));
    }

    /// Set the pacing interval to 10ms, remembering the prior value.
    pub fn enable_fast_deliver(&self) {
        let mut saved = self.0.saved_interval.lock().expect("cache mutex poisoned");
        if saved.is_none() {
            *saved = Some(*self.0.interval.lock().expect("cache mutex poisoned"));
            *self.0.interval.lock().expect("cache mutex poisoned") = Duration::from_millis(10);
        }
    }

    /// Restore the pacing interval saved by [`Self::enable_fast_deliver`].
    pub fn disable_fast_deliver(&self) {
        let mut saved = self.0.saved_interval.lock().expect("cache mutex poisoned");
        if let Some(prev) = saved.take() {
            *self.0.interval.lock().expect("cache mutex poisoned") = prev;
        }
    }

    /// Current length of the main cache.
    pub async fn main_len(&self) -> usize {
        self.0.main.lock().await.len()
    }

    /// Current length of the peek cache.
    pub async fn peek_len(&self) -> usize {
        self.0.peek.lock().await.len()
    }

    fn remember_pop(&self, pop: PopCallback) {
        *self.0.last_pop.lock().expect("cache mutex poisoned") = Some(pop);
    }

    fn enter_pacing_loop(&self, pop: PopCallback) {
        if self.0.loop_running.swap(true, Ordering::AcqRel) {
            return;
        }
        self.0.break_loop.store(false, Ordering::Release);
        let this = self.clone();
        tokio::spawn(async move {
            this.drive_pacing_loop(pop).await;
            this.0.loop_running.store(false, Ordering::Release);
        });
    }

    async fn drive_pacing_loop(&self, pop: PopCallback) {
        let mut index = 0usize;
        loop {
            if self.0.break_loop.load(Ordering::Acquire)
                || !self.0.can_run_locked_task.load(Ordering::Acquire)
                || self.is_paused()
            {
                break;
            }

            let entry = {
                let main = self.0.main.lock().await;
                match main.get(index) {
                    Some(entry) => entry.clone(),
                    None => break,
                }
            };

            let outcome = pop(&entry);
            {
                let mut main = self.0.main.lock().await;
                if let Some(slot) = main.get_mut(index) {
                    slot.is_dirty = outcome.is_consumed;
                    slot.auto_remove = outcome.auto_remove;
                    slot.notified_subscribers.extend(outcome.notified);
                }
            }

            if outcome.is_consumed {
                let removed = self.expire_before(entry.admitted_at_micros).await;
                index = index.saturating_sub(removed);
            }

            if self.0.ele_types_in_interval.contains(&entry.event.element_type) {
                let delay = *self.0.interval.lock().expect("cache mutex poisoned");
                tokio::time::sleep(delay).await;
                if self.0.break_loop.load(Ordering::Acquire) {
                    break;
                }
            }

            index += 1;
        }

        let mut main = self.0.main.lock().await;
        main.retain(|e| !e.is_dirty);
    }

    pub(crate) fn start_idle_checker(&self) {
        let mut guard = self.0.idle_task.lock().expect("cache mutex poisoned");
        if guard.is_some() {
            return;
        }
        let this = self.clone();
        *guard = Some(tokio::spawn(async move {
            loop {
                let interval = *this.0.interval.lock().expect("cache mutex poisoned");
                tokio::time::sleep(interval).await;
                if this.is_paused() {
                    continue;
                }
                let len = this.main_len().await;
                let last = this.0.sse_idle_length.swap(len, Ordering::AcqRel);
                if len == last && len > 0 {
                    let observer = this.0.idle_observer.lock().expect("cache mutex poisoned").clone();
                    if let Some(observer) = observer {
                        observer();
                    }
                }
            }
        }));
    }

    fn stop_idle_checker(&self) {
        if let Some(handle) = self.0.idle_task.lock().expect("cache mutex poisoned").take() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize as StdAtomicUsize;

    fn config() -> EngineConfig {
        EngineConfig::builder()
            .sse_buffer_extract_interval_ms(10)
            .with_ele_type_in_interval("text")
            .build()
    }

    fn counting_pop(hits: Arc<StdAtomicUsize>) -> PopCallback {
        Arc::new(move |_entry| {
            hits.fetch_add(1, Ordering::SeqCst);
            PopOutcome {
                is_consumed: true,
                auto_remove: true,
                notified: Vec::new(),
            }
        })
    }

    #[tokio::test(start_paused = true)]
    async fn events_drain_with_configured_interval_between_them() {
        let deliverer = CacheDeliverer::new(&config());
        let hits = Arc::new(StdAtomicUsize::new(0));
        deliverer
            .put(
                vec![
                    Event::new("s1", "text", "1", "", false),
                    Event::new("s1", "text", "2", "", false),
                    Event::new("s1", "text", "3", "", false),
                ],
                "/v1/stream",
                counting_pop(hits.clone()),
            )
            .await;

        tokio::time::advance(Duration::from_millis(100)).await;
        tokio::task::yield_now().await;
        assert_eq!(hits.load(Ordering::SeqCst), 3);
        assert_eq!(deliverer.main_len().await, 0);
    }

    #[tokio::test]
    async fn without_interval_types_pacing_never_delays() {
        let deliverer = CacheDeliverer::new(&EngineConfig::default());
        let hits = Arc::new(StdAtomicUsize::new(0));
        deliverer
            .put(
                vec![
                    Event::new("s1", "other", "1", "", false),
                    Event::new("s1", "other", "2", "", false),
                ],
                "",
                counting_pop(hits.clone()),
            )
            .await;
        tokio::task::yield_now().await;
        tokio::task::yield_now().await;
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn pausing_prevents_drain_until_resumed() {
        let deliverer = CacheDeliverer::new(&config());
        deliverer.set_state(CacheState::Pause, false);
        let hits = Arc::new(StdAtomicUsize::new(0));
        deliverer
            .put(
                vec![Event::new("s1", "text", "1", "", false)],
                "",
                counting_pop(hits.clone()),
            )
            .await;
        tokio::time::advance(Duration::from_millis(50)).await;
        tokio::task::yield_now().await;
        assert_eq!(hits.load(Ordering::SeqCst), 0);

        deliverer.set_state(CacheState::Active, false);
        deliverer.flush(counting_pop(hits.clone()), false).await;
        tokio::time::advance(Duration::from_millis(50)).await;
        tokio::task::yield_now().await;
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn resume_alone_restarts_the_pacing_loop() {
        let deliverer = CacheDeliverer::new(&config());
        let hits = Arc::new(StdAtomicUsize::new(0));
        deliverer.set_state(CacheState::Pause, false);
        deliverer
            .put(
                vec![
                    Event::new("s1", "text", "1", "", false),
                    Event::new("s1", "text", "2", "", false),
                ],
                "",
                counting_pop(hits.clone()),
            )
            .await;
        tokio::time::advance(Duration::from_millis(50)).await;
        tokio::task::yield_now().await;
        assert_eq!(hits.load(Ordering::SeqCst), 0);

        // No explicit `flush` call here: resuming alone must pick the
        // pacing loop back up using the pop callback from the last `put`.
        deliverer.set_state(CacheState::Active, false);
        tokio::time::advance(Duration::from_millis(50)).await;
        tokio::task::yield_now().await;
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn pause_count_returns_to_zero_after_matched_calls() {
        let deliverer = CacheDeliverer::new(&EngineConfig::default());
        deliverer.set_state(CacheState::Pause, false);
        deliverer.set_state(CacheState::Active, false);
        assert_eq!(deliverer.pause_count(), 0);
        assert!(!deliverer.is_paused());
    }

    #[tokio::test]
    async fn expire_before_sweeps_eligible_entries_only() {
        let deliverer = CacheDeliverer::new(&EngineConfig::default());
        let hits = Arc::new(StdAtomicUsize::new(0));
        // Populate then immediately pause so nothing drains before we assert.
        deliverer.set_state(CacheState::Pause, true);
        deliverer
            .put(
                vec![Event::new("s1", "text", "1", "", false)],
                "",
                counting_pop(hits.clone()),
            )
            .await;
        tokio::task::yield_now().await;
        assert_eq!(deliverer.main_len().await, 1);

        deliverer.expire_before(u64::MAX).await;
        assert_eq!(deliverer.main_len().await, 0);
    }

    #[tokio::test]
    async fn illegal_events_never_reach_the_cache() {
        let deliverer = CacheDeliverer::new(&EngineConfig::default());
        // The engine is responsible for dropping illegal events before
        // calling `put`; this test documents that CacheDeliverer itself
        // places no legality checks on admitted events, that responsibility
        // belongs to the admission helper.
        assert_eq!(deliverer.main_len().await, 0);
    }
}
