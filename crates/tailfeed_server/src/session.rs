//! SSE session orchestration.
//!
//! A session moves through `Validating → Querying → Streaming → Closed`,
//! with `Errored` reachable from every non-terminal state. Validation
//! happens in [`SubscriptionRequest::parse`] before any stream exists;
//! everything after runs in a spawned task that feeds one [`EventSink`].
//!
//! ```text
//! tailer ─► namespace/verb check ─► translate ─► field filter ─┐
//!                                                              ├─► sink ─► reply stream
//! keepalive ticker ────────────────────────────────────────────┘
//! ```

use crate::config::{FeedConfig, ServerConfig};
use crate::error::{FeedError, FeedResult};
use crate::matcher::{self, NamespaceFilter};
use crate::query::QueryBuilder;
use crate::registry::ResourceRegistry;
use crate::sink::EventSink;
use crate::store::LogStore;
use crate::tailer::Tailer;
use crate::ticker::KeepaliveTicker;
use futures::Stream;
use std::sync::Arc;
use tailfeed_protocol::{EventTranslator, FieldFilter, Timestamp, VerbSet, WireEvent};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::Instrument;
use uuid::Uuid;

/// Query parameter naming the subscribed resources.
pub const RESOURCES_PARAM: &str = "resources";

/// Lifecycle state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Parsing and checking the request.
    Validating,
    /// Computing the start position.
    Querying,
    /// Delivering events.
    Streaming,
    /// Ended normally (disconnect or shutdown).
    Closed,
    /// Ended by an error.
    Errored,
}

impl SessionState {
    /// Returns true for `Closed` and `Errored`.
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionState::Closed | SessionState::Errored)
    }
}

/// A validated subscription. Immutable once parsed.
#[derive(Debug, Clone)]
pub struct SubscriptionRequest {
    resources: Vec<String>,
    verbs: VerbSet,
    cursor: Option<Timestamp>,
    filter: FieldFilter,
}

impl SubscriptionRequest {
    /// Parses and validates a request.
    ///
    /// `params` are the query parameters in request order and
    /// `last_event_id` the raw `Last-Event-ID` header. An empty header is
    /// treated as absent.
    pub fn parse(
        feed: &FeedConfig,
        registry: &dyn ResourceRegistry,
        params: &[(String, String)],
        last_event_id: Option<&str>,
    ) -> FeedResult<Self> {
        let resources_param = params
            .iter()
            .find(|(key, _)| key == RESOURCES_PARAM)
            .map(|(_, value)| value.as_str());
        let resources = matcher::requested_resources(feed, resources_param);
        matcher::validate(feed, &resources, registry)?;

        let cursor = match last_event_id {
            Some(id) if !id.is_empty() => Some(Timestamp::decode(id)?),
            _ => None,
        };

        Ok(Self {
            resources,
            verbs: feed.verbs.clone(),
            cursor,
            filter: FieldFilter::from_params(params.iter().map(|(k, v)| (k, v))),
        })
    }

    /// Returns the subscribed resources, in request order.
    pub fn resources(&self) -> &[String] {
        &self.resources
    }

    /// Returns the subscribed verbs.
    pub fn verbs(&self) -> &VerbSet {
        &self.verbs
    }

    /// Returns the resumption cursor, if any.
    pub fn cursor(&self) -> Option<Timestamp> {
        self.cursor
    }

    /// Returns the field filter.
    pub fn filter(&self) -> &FieldFilter {
        &self.filter
    }
}

/// Resources owned by a running session.
struct SessionResources {
    token: CancellationToken,
    tailer: Option<Tailer>,
    ticker: Option<JoinHandle<u64>>,
    torn_down: bool,
}

impl SessionResources {
    fn new(token: CancellationToken) -> Self {
        Self {
            token,
            tailer: None,
            ticker: None,
            torn_down: false,
        }
    }

    /// Cancels the ticker and closes the tailer. Only the first call acts.
    fn teardown(&mut self) -> bool {
        if self.torn_down {
            return false;
        }
        self.torn_down = true;
        self.token.cancel();
        if let Some(mut tailer) = self.tailer.take() {
            tailer.close();
        }
        if let Some(ticker) = self.ticker.take() {
            ticker.abort();
        }
        true
    }
}

impl Drop for SessionResources {
    fn drop(&mut self) {
        self.teardown();
    }
}

/// One change-feed subscription.
pub struct Session {
    id: Uuid,
    request: SubscriptionRequest,
    store: Arc<dyn LogStore>,
    ticker: KeepaliveTicker,
    channel_capacity: usize,
    token: CancellationToken,
}

impl Session {
    /// Creates a session for a validated request.
    pub fn new(request: SubscriptionRequest, store: Arc<dyn LogStore>, config: &ServerConfig) -> Self {
        Self {
            id: Uuid::new_v4(),
            request,
            store,
            ticker: KeepaliveTicker::new(config.ticker_interval),
            channel_capacity: config.channel_capacity,
            token: CancellationToken::new(),
        }
    }

    /// Ties the session to `parent`: cancelling it ends the session.
    pub fn with_shutdown(mut self, parent: &CancellationToken) -> Self {
        self.token = parent.child_token();
        self
    }

    /// Returns the session id.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Starts the session task.
    pub fn spawn(self) -> SessionHandle {
        let (sink, events) = EventSink::channel(self.channel_capacity);
        let (state_tx, state) = watch::channel(SessionState::Validating);
        let id = self.id;
        let guard = self.token.clone().drop_guard();

        let span = tracing::info_span!(
            "session",
            id = %id,
            resources = %self.request.resources.join(","),
        );
        tokio::spawn(self.run(sink, state_tx).instrument(span));

        SessionHandle {
            id,
            events,
            state,
            _guard: guard,
        }
    }

    async fn run(self, sink: EventSink, state: watch::Sender<SessionState>) {
        tracing::info!(
            verbs = %self.request.verbs,
            cursor = ?self.request.cursor.map(|c| c.encode()),
            filters = self.request.filter.predicates().len(),
            "session opened"
        );

        let mut resources = SessionResources::new(self.token.clone());
        let outcome = self.stream(&sink, &state, &mut resources).await;
        resources.teardown();

        let end = match outcome {
            Ok(()) => {
                tracing::debug!("session closed");
                SessionState::Closed
            }
            Err(err) => {
                tracing::warn!(error = %err, "session aborted");
                SessionState::Errored
            }
        };
        state.send_replace(end);
    }

    async fn stream(
        &self,
        sink: &EventSink,
        state: &watch::Sender<SessionState>,
        resources: &mut SessionResources,
    ) -> FeedResult<()> {
        state.send_replace(SessionState::Querying);

        let namespaces = NamespaceFilter::new(&self.request.resources);
        let builder = QueryBuilder::new(self.store.as_ref());
        let query = tokio::select! {
            _ = self.token.cancelled() => return Ok(()),
            query = builder.build(namespaces, &self.request.verbs, self.request.cursor) => {
                query.map_err(FeedError::Query)?
            }
        };
        tracing::debug!(after = %query.after, start = ?query.start, "start position resolved");

        let tailer = Tailer::open(self.store.as_ref(), &query)
            .await
            .map_err(FeedError::Query)?;
        resources.tailer = Some(tailer);
        resources.ticker = Some(self.ticker.spawn(sink.clone(), self.token.clone()));
        state.send_replace(SessionState::Streaming);

        let resource = self.request.resources.first().cloned().unwrap_or_default();
        let translator = EventTranslator::new(resource);

        loop {
            let Some(tailer) = resources.tailer.as_mut() else {
                return Ok(());
            };
            let next = tokio::select! {
                biased;
                _ = self.token.cancelled() => return Ok(()),
                next = tailer.next() => next,
            };

            let entry = match next {
                Some(Ok(entry)) => entry,
                Some(Err(err)) => return Err(FeedError::Stream(err)),
                None => return Ok(()),
            };
            if !query.filter.matches(&entry) {
                continue;
            }

            let event = translator.translate(&entry);
            if !self.request.filter.passes(&event.data) {
                continue;
            }

            let sent = tokio::select! {
                biased;
                _ = self.token.cancelled() => return Ok(()),
                sent = sink.send(event) => sent,
            };
            if sent.is_err() {
                tracing::debug!("client disconnected");
                return Ok(());
            }
        }
    }
}

/// Reader side of a running session.
///
/// Dropping the handle cancels the session, which closes its tailer and
/// stops its ticker.
pub struct SessionHandle {
    id: Uuid,
    events: mpsc::Receiver<WireEvent>,
    state: watch::Receiver<SessionState>,
    _guard: DropGuard,
}

impl SessionHandle {
    /// Returns the session id.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Returns the current state.
    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    /// Waits until the state satisfies `pred`, returning that state.
    pub async fn wait_for_state(&mut self, pred: impl Fn(SessionState) -> bool) -> SessionState {
        let reached = self.state.wait_for(|s| pred(*s)).await.map(|s| *s);
        reached.unwrap_or_else(|_| *self.state.borrow())
    }

    /// Receives the next event; `None` once the session has ended.
    pub async fn next_event(&mut self) -> Option<WireEvent> {
        self.events.recv().await
    }

    /// Converts the handle into a stream of events.
    pub fn into_stream(self) -> impl Stream<Item = WireEvent> + Send + 'static {
        let SessionHandle {
            mut events,
            _guard: guard,
            ..
        } = self;
        async_stream::stream! {
            let _guard = guard;
            while let Some(event) = events.recv().await {
                yield event;
            }
        }
    }
}
