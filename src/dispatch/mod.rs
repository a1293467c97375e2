//! Dispatch module - per-tick callback fan-out.
//!
//! Provides:
//! - [`Dispatcher`] - drains queued callbacks and invokes listeners by name
//! - [`ListenerRegistry`] - maps callback names to listeners
//! - [`Callback`] - typed view of the common server callbacks
//! - [`TimerSchedule`] - `Timer.*` pseudo-callbacks from elapsed time
//!
//! The dispatcher runs on the caller's tick; there is no background task.
//!
//! # Example
//!
//! ```ignore
//! use gbxremote_client::dispatch::{Callback, Dispatcher, TIMER_ONE_SECOND};
//!
//! let mut dispatcher = Dispatcher::new();
//! dispatcher.on("ManiaPlanet.PlayerConnect", |cb| {
//!     if let Ok(Callback::PlayerConnect { login, .. }) = Callback::parse(cb) {
//!         println!("{} joined", login);
//!     }
//! });
//! dispatcher.on(TIMER_ONE_SECOND, |_| println!("tick"));
//!
//! loop {
//!     dispatcher.tick(&client);
//!     tokio::time::sleep(std::time::Duration::from_millis(50)).await;
//! }
//! ```

mod callback;
mod registry;
mod timers;

pub use callback::{script_callback, Callback, ScriptCallback};
pub use callback::{
    BEGIN_MAP, BEGIN_MATCH, END_MAP, END_MATCH, MODE_SCRIPT_CALLBACK, MODE_SCRIPT_CALLBACK_ARRAY,
    PLAYER_CHAT, PLAYER_CONNECT, PLAYER_DISCONNECT, PLAYER_INFO_CHANGED, SERVER_START,
    SERVER_STOP, STATUS_CHANGED,
};
pub use registry::{Listener, ListenerId, ListenerRegistry};
pub use timers::{TimerSchedule, TIMER_FIVE_SECONDS, TIMER_ONE_MINUTE, TIMER_ONE_SECOND};

use std::time::Instant;

use crate::client::GbxClient;
use crate::codec::Value;
use crate::connection::{CallbackEnvelope, Connection};

/// Anything callbacks can be drained from.
pub trait CallbackSource {
    /// Take every queued callback, oldest first.
    fn drain_callbacks(&self) -> Vec<CallbackEnvelope>;
}

impl CallbackSource for Connection {
    fn drain_callbacks(&self) -> Vec<CallbackEnvelope> {
        self.get_callbacks()
    }
}

impl CallbackSource for GbxClient {
    fn drain_callbacks(&self) -> Vec<CallbackEnvelope> {
        self.get_callbacks()
    }
}

/// Fans callbacks out to listeners once per tick.
pub struct Dispatcher {
    registry: ListenerRegistry,
    timers: TimerSchedule,
}

impl Dispatcher {
    /// Create a dispatcher whose timers start now.
    pub fn new() -> Self {
        Self::starting_at(Instant::now())
    }

    /// Create a dispatcher whose timers count from `start`.
    pub fn starting_at(start: Instant) -> Self {
        Self {
            registry: ListenerRegistry::new(),
            timers: TimerSchedule::new(start),
        }
    }

    /// Register a listener for callbacks named exactly `name`.
    ///
    /// Mode script events can be listened to by their script name as well as
    /// by the `ManiaPlanet.ModeScriptCallback*` envelope name.
    pub fn on<F>(&mut self, name: &str, listener: F) -> ListenerId
    where
        F: FnMut(&CallbackEnvelope) + Send + 'static,
    {
        self.registry.register(name, listener)
    }

    /// Remove a listener. Returns `false` if it was already gone.
    pub fn remove(&mut self, id: ListenerId) -> bool {
        self.registry.remove(id)
    }

    pub fn registry(&self) -> &ListenerRegistry {
        &self.registry
    }

    /// Drain `source` and dispatch everything due now.
    ///
    /// Returns the number of listener invocations.
    pub fn tick<S: CallbackSource + ?Sized>(&mut self, source: &S) -> usize {
        self.tick_at(source, Instant::now())
    }

    /// Drain `source` and dispatch everything due at `now`.
    pub fn tick_at<S: CallbackSource + ?Sized>(&mut self, source: &S, now: Instant) -> usize {
        let envelopes = source.drain_callbacks();
        self.dispatch_all(envelopes, now)
    }

    /// Dispatch `envelopes` in order, then the timers due at `now`.
    pub fn dispatch_all(&mut self, envelopes: Vec<CallbackEnvelope>, now: Instant) -> usize {
        let mut invoked = 0;

        for envelope in envelopes {
            invoked += self.dispatch(&envelope);
        }

        for name in self.timers.due(now) {
            invoked += self.registry.dispatch(&CallbackEnvelope::new(name, Vec::new()));
        }

        invoked
    }

    /// Dispatch one envelope, and its inner script event if it wraps one.
    pub fn dispatch(&mut self, envelope: &CallbackEnvelope) -> usize {
        let mut invoked = self.registry.dispatch(envelope);

        if envelope.name == MODE_SCRIPT_CALLBACK || envelope.name == MODE_SCRIPT_CALLBACK_ARRAY {
            match script_callback(envelope) {
                Ok(script) if self.registry.has_listeners(&script.name) => {
                    let inner = CallbackEnvelope::new(
                        script.name,
                        script.params.into_iter().map(Value::String).collect(),
                    );
                    invoked += self.registry.dispatch(&inner);
                }
                Ok(_) => {}
                Err(e) => tracing::warn!("Malformed {} callback: {}", envelope.name, e),
            }
        }

        if invoked == 0 {
            tracing::trace!("No listener for {}", envelope.name);
        }
        invoked
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}
