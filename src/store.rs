// Search store: request/result state shared with a rendering layer

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::api::{ApiError, ClientConfig, ClientError, HttpTravelApi, TravelApi};
use crate::types::{Flight, HistoryEntry, Recommendation, SearchRequest, SearchResponse, Weather};

pub const SEARCH_FAILED_MESSAGE: &str = "Failed to search travel";
pub const HISTORY_FAILED_MESSAGE: &str = "Failed to load search history";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct StoreState {
    pub current_search: Option<SearchResponse>,
    pub search_history: Vec<HistoryEntry>,
    pub loading: bool,
    pub error: Option<String>,
}

impl StoreState {
    pub fn has_search_result(&self) -> bool {
        self.current_search.is_some()
    }

    pub fn current_destination(&self) -> Option<&str> {
        self.current_search
            .as_ref()
            .map(|search| search.destination.as_str())
            .filter(|destination| !destination.is_empty())
    }

    pub fn current_weather(&self) -> Option<&Weather> {
        self.current_search.as_ref()?.weather.as_ref()
    }

    // Never absent, empty when there is no result
    pub fn current_recommendations(&self) -> &[Recommendation] {
        self.current_search
            .as_ref()
            .map(|search| search.recommendations.as_slice())
            .unwrap_or_default()
    }

    pub fn current_flights(&self) -> &[Flight] {
        self.current_search
            .as_ref()
            .and_then(|search| search.flights.as_deref())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Action {
    Search,
    History,
}

/// Holds the state of one application session and routes every mutation
/// through named actions.
///
/// Overlapping calls of the same action are not serialized. Each call takes a
/// dispatch ticket and writes its result or error into the state only if no
/// later-dispatched call of its kind has written one already; a superseded
/// call still returns its own outcome to its caller. `loading` stays set while
/// any action is in flight.
pub struct SearchStore {
    api: Arc<dyn TravelApi>,
    state: watch::Sender<StoreState>,
    // Only touched inside `send_modify`, which serializes them with state writes
    in_flight: AtomicUsize,
    search_ticket: AtomicU64,
    history_ticket: AtomicU64,
    // Ticket of the last outcome written, per action
    search_applied: AtomicU64,
    history_applied: AtomicU64,
}

// Keeps `loading` set for the lifetime of one action, released on every exit path
struct LoadingGuard<'a> {
    store: &'a SearchStore,
    ticket: u64,
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        let in_flight = &self.store.in_flight;
        self.store.state.send_modify(|state| {
            let remaining = in_flight.fetch_sub(1, Ordering::SeqCst) - 1;
            state.loading = remaining > 0;
        });
    }
}

impl SearchStore {
    pub fn new(api: Arc<dyn TravelApi>) -> Self {
        let (state, _) = watch::channel(StoreState::default());
        Self {
            api,
            state,
            in_flight: AtomicUsize::new(0),
            search_ticket: AtomicU64::new(0),
            history_ticket: AtomicU64::new(0),
            search_applied: AtomicU64::new(0),
            history_applied: AtomicU64::new(0),
        }
    }

    pub fn from_config(config: ClientConfig) -> Result<Self, ClientError> {
        Ok(Self::new(Arc::new(HttpTravelApi::new(config)?)))
    }

    pub fn subscribe(&self) -> watch::Receiver<StoreState> {
        self.state.subscribe()
    }

    pub fn snapshot(&self) -> StoreState {
        self.state.borrow().clone()
    }

    pub fn is_loading(&self) -> bool {
        self.state.borrow().loading
    }

    pub fn error(&self) -> Option<String> {
        self.state.borrow().error.clone()
    }

    pub fn current_search(&self) -> Option<SearchResponse> {
        self.state.borrow().current_search.clone()
    }

    pub fn search_history(&self) -> Vec<HistoryEntry> {
        self.state.borrow().search_history.clone()
    }

    pub fn has_search_result(&self) -> bool {
        self.state.borrow().has_search_result()
    }

    pub fn current_destination(&self) -> Option<String> {
        self.state.borrow().current_destination().map(str::to_string)
    }

    pub fn current_weather(&self) -> Option<Weather> {
        self.state.borrow().current_weather().cloned()
    }

    pub fn current_recommendations(&self) -> Vec<Recommendation> {
        self.state.borrow().current_recommendations().to_vec()
    }

    pub fn current_flights(&self) -> Vec<Flight> {
        self.state.borrow().current_flights().to_vec()
    }

    fn ticket_counter(&self, action: Action) -> &AtomicU64 {
        match action {
            Action::Search => &self.search_ticket,
            Action::History => &self.history_ticket,
        }
    }

    fn applied_counter(&self, action: Action) -> &AtomicU64 {
        match action {
            Action::Search => &self.search_applied,
            Action::History => &self.history_applied,
        }
    }

    fn begin(&self, action: Action) -> LoadingGuard<'_> {
        let mut ticket = 0;
        self.state.send_modify(|state| {
            ticket = self.ticket_counter(action).fetch_add(1, Ordering::SeqCst) + 1;
            self.in_flight.fetch_add(1, Ordering::SeqCst);
            state.loading = true;
            state.error = None;
        });
        LoadingGuard {
            store: self,
            ticket,
        }
    }

    // Applies `update` unless a later-dispatched call of the same action already
    // wrote its outcome
    fn commit<F>(&self, action: Action, guard: &LoadingGuard<'_>, update: F) -> bool
    where
        F: FnOnce(&mut StoreState),
    {
        let last_applied = self.applied_counter(action);
        let mut applied = false;
        self.state.send_if_modified(|state| {
            if guard.ticket <= last_applied.load(Ordering::SeqCst) {
                return false;
            }
            last_applied.store(guard.ticket, Ordering::SeqCst);
            update(state);
            applied = true;
            true
        });

        if !applied {
            debug!(?action, ticket = guard.ticket, "discarding outcome of superseded call");
        }
        applied
    }

    pub async fn search_travel(
        &self,
        request: SearchRequest,
    ) -> Result<SearchResponse, ApiError> {
        let guard = self.begin(Action::Search);

        match self.api.search_travel(request).await {
            Ok(response) => {
                let current = response.clone();
                self.commit(Action::Search, &guard, |state| {
                    state.current_search = Some(current);
                });
                Ok(response)
            }
            Err(e) => {
                let message = failure_message(&e, SEARCH_FAILED_MESSAGE);
                warn!(error = %message, "travel search failed");
                self.commit(Action::Search, &guard, |state| {
                    state.error = Some(message);
                });
                Err(e)
            }
        }
    }

    pub async fn load_search_history(
        &self,
        user_id: &str,
    ) -> Result<Vec<HistoryEntry>, ApiError> {
        let guard = self.begin(Action::History);

        match self.api.get_search_history(user_id).await {
            Ok(history) => {
                let entries = history.clone();
                self.commit(Action::History, &guard, |state| {
                    state.search_history = entries;
                });
                Ok(history)
            }
            Err(e) => {
                let message = failure_message(&e, HISTORY_FAILED_MESSAGE);
                warn!(error = %message, user_id, "loading search history failed");
                self.commit(Action::History, &guard, |state| {
                    state.error = Some(message);
                });
                Err(e)
            }
        }
    }

    // Passthrough liveness probe; does not touch the state
    pub async fn check_health(&self) -> Result<serde_json::Value, ApiError> {
        self.api.check_health().await
    }

    pub fn clear_current_search(&self) {
        self.state.send_modify(|state| {
            state.current_search = None;
            state.error = None;
        });
    }

    pub fn clear_error(&self) {
        self.state.send_modify(|state| state.error = None);
    }
}

fn failure_message(error: &ApiError, fallback: &str) -> String {
    let message = error.to_string();
    if message.trim().is_empty() {
        fallback.to_string()
    } else {
        message
    }
}
