//! The event bus.
//!
//! The bus owns one table: channel → subscriber entries. Each entry pairs a
//! weak reference to a [`Listener`] with the entity that owns it. Dispatch
//! resolves the targeted entries, upgrades them into a snapshot, releases the
//! table, and only then calls the listeners. Listeners registered during a
//! pass join later passes only. A snapshot entry that was unregistered
//! earlier in the same pass is skipped and not counted.
//!
//! ```text
//! dispatch(request)
//!     │
//!     ├─ borrow table ─► filter by mode ─► upgrade Weak ─► snapshot
//!     │                                   (prune dead)
//!     ├─ release table
//!     │
//!     └─ for listener in snapshot (still registered):
//!            catch_unwind(listener.on_event(event))
//!              ├─ Ok            ─► delivered += 1
//!              └─ Err / panic   ─► sink.listener_failed(), delivered += 1
//! ```
//!
//! The bus is single-threaded (`Rc`/`RefCell`). Concurrent callers must
//! serialize access behind one owner.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::rc::{Rc, Weak};

use engine_component::Entity;
use engine_label::{LabelRegistry, SharedLabels};
use tracing::{debug, trace};

use crate::channel::{Channel, ChannelId};
use crate::diagnostics::{DiagnosticSink, Failure, TracingSink};
use crate::error::ListenerError;
use crate::filter::{Acceptance, Filtered};
use crate::listener::{Event, Listener};
use crate::request::{DispatchRequest, TargetMode};

/// Identifies one table entry across re-registrations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct EntryId(u64);

struct Entry {
    id: EntryId,
    owner: Entity,
    /// Thin address of the listener allocation, used for identity.
    key: *const (),
    listener: Weak<dyn Listener>,
    /// Live [`Subscription`] guards referring to this entry.
    guards: usize,
}

impl Entry {
    fn is_dead(&self) -> bool {
        self.listener.strong_count() == 0
    }
}

#[derive(Default)]
struct Table {
    channels: HashMap<ChannelId, Vec<Entry>>,
    next_id: u64,
}

impl Table {
    fn entries_mut(&mut self, channel: ChannelId) -> Option<&mut Vec<Entry>> {
        self.channels.get_mut(&channel)
    }

    fn remove_where(&mut self, channel: ChannelId, pred: impl Fn(&Entry) -> bool) -> usize {
        let Some(entries) = self.channels.get_mut(&channel) else {
            return 0;
        };
        let before = entries.len();
        entries.retain(|e| !pred(e));
        let removed = before - entries.len();
        if entries.is_empty() {
            self.channels.remove(&channel);
        }
        removed
    }
}

struct Inner {
    table: RefCell<Table>,
    labels: SharedLabels,
    sink: Rc<dyn DiagnosticSink>,
    depth: Cell<u32>,
}

/// Cloneable handle to a shared subscription table.
///
/// Clones refer to the same bus.
#[derive(Clone)]
pub struct EventBus {
    inner: Rc<Inner>,
}

impl EventBus {
    /// Create a bus that resolves [`TargetMode::Tags`] against `labels` and
    /// logs listener failures through `tracing`.
    #[must_use]
    pub fn new(labels: SharedLabels) -> Self {
        Self::with_sink(labels, Rc::new(TracingSink))
    }

    /// Create a bus reporting listener failures to `sink`.
    #[must_use]
    pub fn with_sink(labels: SharedLabels, sink: Rc<dyn DiagnosticSink>) -> Self {
        Self {
            inner: Rc::new(Inner {
                table: RefCell::new(Table::default()),
                labels,
                sink,
                depth: Cell::new(0),
            }),
        }
    }

    /// The label registry this bus resolves tags against.
    #[must_use]
    pub fn labels(&self) -> &SharedLabels {
        &self.inner.labels
    }

    /// Subscribe `listener`, owned by `owner`, to `channel`.
    ///
    /// The bus keeps only a weak reference. The returned guard unregisters
    /// when dropped. Registering the same listener on the same channel again
    /// leaves the table unchanged and hands out another guard for the same
    /// entry; the entry goes away once every guard is gone.
    pub fn register<L: Listener + 'static>(
        &self,
        channel: &Channel,
        owner: Entity,
        listener: &Rc<L>,
    ) -> Subscription {
        let weak: Weak<dyn Listener> = Rc::downgrade(listener) as Weak<dyn Listener>;
        self.insert(channel, owner, weak, None)
    }

    /// Subscribe a closure behind an acceptance filter.
    ///
    /// The closure lives as long as the returned guard.
    pub fn register_fn<F>(
        &self,
        channel: &Channel,
        owner: Entity,
        acceptance: Acceptance,
        effect: F,
    ) -> Subscription
    where
        F: Fn(&Event<'_>) -> Result<(), ListenerError> + 'static,
    {
        let listener: Rc<dyn Listener> = Rc::new(Filtered::new(acceptance, effect));
        let weak = Rc::downgrade(&listener);
        self.insert(channel, owner, weak, Some(listener))
    }

    fn insert(
        &self,
        channel: &Channel,
        owner: Entity,
        listener: Weak<dyn Listener>,
        keep_alive: Option<Rc<dyn Listener>>,
    ) -> Subscription {
        let key = listener.as_ptr().cast::<()>();
        let mut table = self.inner.table.borrow_mut();

        let existing = table
            .entries_mut(channel.id())
            .and_then(|entries| entries.iter_mut().find(|e| e.key == key && !e.is_dead()));
        let id = if let Some(entry) = existing {
            entry.guards += 1;
            trace!(channel = %channel, owner = %entry.owner, "duplicate registration ignored");
            entry.id
        } else {
            let id = EntryId(table.next_id);
            table.next_id += 1;
            table
                .channels
                .entry(channel.id())
                .or_default()
                .push(Entry {
                    id,
                    owner,
                    key,
                    listener,
                    guards: 1,
                });
            debug!(channel = %channel, owner = %owner, "listener registered");
            id
        };

        Subscription {
            bus: Rc::downgrade(&self.inner),
            channel: channel.clone(),
            id,
            _keep_alive: keep_alive,
            detached: false,
        }
    }

    /// Remove `listener` from `channel`, whatever guards are outstanding.
    ///
    /// Unregistering a listener that is not subscribed is a no-op.
    pub fn unregister<L: Listener + ?Sized>(&self, channel: &Channel, listener: &Rc<L>) {
        let key = Rc::as_ptr(listener).cast::<()>();
        let removed = self
            .inner
            .table
            .borrow_mut()
            .remove_where(channel.id(), |e| e.key == key);
        if removed > 0 {
            debug!(channel = %channel, "listener unregistered");
        }
    }

    /// Remove every subscription owned by `owner` on every channel.
    ///
    /// Returns the number of entries removed.
    pub fn unregister_owner(&self, owner: Entity) -> usize {
        let mut table = self.inner.table.borrow_mut();
        let channels: Vec<ChannelId> = table.channels.keys().copied().collect();
        let removed: usize = channels
            .into_iter()
            .map(|c| table.remove_where(c, |e| e.owner == owner))
            .sum();
        if removed > 0 {
            debug!(owner = %owner, removed, "owner unregistered from all channels");
        }
        removed
    }

    /// Returns `true` if `listener` is currently subscribed to `channel`.
    #[must_use]
    pub fn is_registered<L: Listener + ?Sized>(&self, channel: &Channel, listener: &Rc<L>) -> bool {
        let key = Rc::as_ptr(listener).cast::<()>();
        self.inner
            .table
            .borrow()
            .channels
            .get(&channel.id())
            .is_some_and(|entries| entries.iter().any(|e| e.key == key && !e.is_dead()))
    }

    /// Returns the number of live subscribers on `channel`.
    #[must_use]
    pub fn subscriber_count(&self, channel: &Channel) -> usize {
        self.inner
            .table
            .borrow()
            .channels
            .get(&channel.id())
            .map_or(0, |entries| entries.iter().filter(|e| !e.is_dead()).count())
    }

    /// Returns the number of channels with at least one entry.
    #[must_use]
    pub fn channel_count(&self) -> usize {
        self.inner.table.borrow().channels.len()
    }

    /// Deliver `request` to its targeted subscribers.
    ///
    /// Returns how many listeners were invoked, counting ones whose reaction
    /// failed. Listeners unregistered earlier in the same pass are skipped.
    /// A channel nobody listens to yields `0`.
    pub fn dispatch(&self, request: &DispatchRequest) -> usize {
        let snapshot = self.snapshot(request);
        let depth = self.inner.depth.get();
        self.inner.depth.set(depth + 1);

        let mut delivered = 0;
        for (id, listener, owner) in snapshot {
            if !self.has_entry(request.channel.id(), id) {
                trace!(
                    channel = %request.channel,
                    owner = %owner,
                    "skipped listener unregistered mid-pass"
                );
                continue;
            }
            let event = Event {
                channel: &request.channel,
                activator: request.activator,
                owner,
                bus: self,
            };
            let outcome = catch_unwind(AssertUnwindSafe(|| listener.on_event(&event)))
                .unwrap_or_else(|payload| Err(ListenerError::Panicked(panic_message(&*payload))));
            if let Err(error) = outcome {
                self.inner.sink.listener_failed(Failure {
                    channel: request.channel.clone(),
                    owner,
                    listener: listener.name(),
                    error,
                });
            }
            delivered += 1;
        }

        self.inner.depth.set(depth);
        if delivered == 0 {
            trace!(channel = %request.channel, mode = ?request.mode, depth, "dispatch reached no listeners");
        } else {
            debug!(channel = %request.channel, mode = ?request.mode, delivered, depth, "dispatched");
        }
        delivered
    }

    fn has_entry(&self, channel: ChannelId, id: EntryId) -> bool {
        self.inner
            .table
            .borrow()
            .channels
            .get(&channel)
            .is_some_and(|entries| entries.iter().any(|e| e.id == id))
    }

    /// Resolve and upgrade the targeted entries, pruning dead ones.
    fn snapshot(&self, request: &DispatchRequest) -> Vec<(EntryId, Rc<dyn Listener>, Entity)> {
        let mut table = self.inner.table.borrow_mut();
        let channel = request.channel.id();
        let Some(entries) = table.entries_mut(channel) else {
            return Vec::new();
        };

        let labels = self.inner.labels.borrow();
        let mut snapshot = Vec::new();
        let mut dead = 0;
        for entry in entries.iter() {
            if !is_targeted(request, entry.owner, &labels) {
                continue;
            }
            match entry.listener.upgrade() {
                Some(listener) => snapshot.push((entry.id, listener, entry.owner)),
                None => dead += 1,
            }
        }
        drop(labels);

        if dead > 0 {
            let pruned = table.remove_where(channel, Entry::is_dead);
            debug!(channel = %request.channel, pruned, "pruned dropped listeners");
        }
        snapshot
    }
}

fn is_targeted(request: &DispatchRequest, owner: Entity, labels: &LabelRegistry) -> bool {
    match request.mode {
        TargetMode::All => true,
        TargetMode::Owner => request.source == Some(owner),
        TargetMode::Other => request.target == Some(owner),
        TargetMode::Tags => labels.has_any_label(owner, &request.labels),
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_owned())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "non-string panic payload".to_owned())
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("channels", &self.channel_count())
            .field("depth", &self.inner.depth.get())
            .finish_non_exhaustive()
    }
}

/// Guard for one registration. Dropping it unregisters.
#[must_use = "dropping a Subscription unregisters the listener immediately"]
pub struct Subscription {
    bus: Weak<Inner>,
    channel: Channel,
    id: EntryId,
    /// Owns closures from [`EventBus::register_fn`]; the bus only holds a `Weak`.
    _keep_alive: Option<Rc<dyn Listener>>,
    detached: bool,
}

impl Subscription {
    /// The channel this guard is subscribed to.
    #[must_use]
    pub fn channel(&self) -> &Channel {
        &self.channel
    }

    /// Give up the guard without unregistering.
    ///
    /// The entry stays until [`EventBus::unregister`] is called or the
    /// listener is dropped. A closure registered with
    /// [`EventBus::register_fn`] is dropped here, so detaching it ends its
    /// subscription at the next dispatch.
    pub fn detach(mut self) {
        self.detached = true;
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if self.detached {
            return;
        }
        let Some(inner) = self.bus.upgrade() else {
            return;
        };
        let mut table = inner.table.borrow_mut();
        let channel = self.channel.id();
        let Some(entry) = table
            .entries_mut(channel)
            .and_then(|entries| entries.iter_mut().find(|e| e.id == self.id))
        else {
            return;
        };
        entry.guards -= 1;
        if entry.guards == 0 {
            let id = self.id;
            table.remove_where(channel, |e| e.id == id);
            debug!(channel = %self.channel, "subscription dropped");
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("channel", &self.channel)
            .field("detached", &self.detached)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use engine_component::EntityAllocator;
    use engine_label::LabelRegistry;

    use super::*;
    use crate::diagnostics::RecordingSink;

    #[derive(Default)]
    struct Probe {
        hits: Cell<usize>,
        last_activator: Cell<Option<Entity>>,
    }

    impl Listener for Probe {
        fn on_event(&self, event: &Event<'_>) -> Result<(), ListenerError> {
            self.hits.set(self.hits.get() + 1);
            self.last_activator.set(event.activator);
            Ok(())
        }
    }

    fn setup() -> (EventBus, EntityAllocator, Channel) {
        let bus = EventBus::new(LabelRegistry::shared());
        (bus, EntityAllocator::new(), Channel::new("Damaged"))
    }

    #[test]
    fn test_register_is_idempotent() {
        let (bus, mut alloc, ch) = setup();
        let owner = alloc.allocate();
        let probe = Rc::new(Probe::default());
        let _a = bus.register(&ch, owner, &probe);
        let _b = bus.register(&ch, owner, &probe);
        assert_eq!(bus.subscriber_count(&ch), 1);
        assert_eq!(bus.dispatch(&DispatchRequest::new(ch, TargetMode::All)), 1);
        assert_eq!(probe.hits.get(), 1);
    }

    #[test]
    fn test_unregister_is_idempotent() {
        let (bus, mut alloc, ch) = setup();
        let probe = Rc::new(Probe::default());
        let _sub = bus.register(&ch, alloc.allocate(), &probe);
        bus.unregister(&ch, &probe);
        bus.unregister(&ch, &probe);
        bus.unregister(&Channel::new("Other"), &probe);
        assert!(!bus.is_registered(&ch, &probe));
        assert_eq!(bus.dispatch(&DispatchRequest::new(ch, TargetMode::All)), 0);
    }

    #[test]
    fn test_dropping_subscription_unregisters() {
        let (bus, mut alloc, ch) = setup();
        let probe = Rc::new(Probe::default());
        let sub = bus.register(&ch, alloc.allocate(), &probe);
        assert!(bus.is_registered(&ch, &probe));
        drop(sub);
        assert!(!bus.is_registered(&ch, &probe));
        assert_eq!(bus.channel_count(), 0);
    }

    #[test]
    fn test_duplicate_guards_share_one_entry() {
        let (bus, mut alloc, ch) = setup();
        let owner = alloc.allocate();
        let probe = Rc::new(Probe::default());
        let first = bus.register(&ch, owner, &probe);
        let second = bus.register(&ch, owner, &probe);
        drop(first);
        assert!(bus.is_registered(&ch, &probe));
        drop(second);
        assert!(!bus.is_registered(&ch, &probe));
    }

    #[test]
    fn test_stale_guard_does_not_touch_new_registration() {
        let (bus, mut alloc, ch) = setup();
        let owner = alloc.allocate();
        let probe = Rc::new(Probe::default());
        let stale = bus.register(&ch, owner, &probe);
        bus.unregister(&ch, &probe);
        let _fresh = bus.register(&ch, owner, &probe);
        drop(stale);
        assert!(bus.is_registered(&ch, &probe));
    }

    #[test]
    fn test_detached_subscription_stays_until_unregister() {
        let (bus, mut alloc, ch) = setup();
        let probe = Rc::new(Probe::default());
        bus.register(&ch, alloc.allocate(), &probe).detach();
        assert!(bus.is_registered(&ch, &probe));
        bus.unregister(&ch, &probe);
        assert!(!bus.is_registered(&ch, &probe));
    }

    #[test]
    fn test_dispatch_unknown_channel_delivers_nothing() {
        let (bus, _alloc, _ch) = setup();
        let req = DispatchRequest::new(Channel::new("NobodyListens"), TargetMode::All);
        assert_eq!(bus.dispatch(&req), 0);
    }

    #[test]
    fn test_targeting_modes() {
        let (bus, mut alloc, ch) = setup();
        let [a, b, c] = [alloc.allocate(), alloc.allocate(), alloc.allocate()];
        {
            let mut labels = bus.labels().borrow_mut();
            labels.add_label(b, "enemy");
            labels.add_label(c, "enemy");
        }
        let s1 = Rc::new(Probe::default());
        let s2 = Rc::new(Probe::default());
        let s3 = Rc::new(Probe::default());
        let _subs = [
            bus.register(&ch, a, &s1),
            bus.register(&ch, b, &s2),
            bus.register(&ch, c, &s3),
        ];
        let hits = || [s1.hits.get(), s2.hits.get(), s3.hits.get()];

        let owner = DispatchRequest::new(ch.clone(), TargetMode::Owner).source(a);
        assert_eq!(bus.dispatch(&owner), 1);
        assert_eq!(hits(), [1, 0, 0]);

        let tags = DispatchRequest::new(ch.clone(), TargetMode::Tags).labels(["enemy"]);
        assert_eq!(bus.dispatch(&tags), 2);
        assert_eq!(hits(), [1, 1, 1]);

        let other = DispatchRequest::new(ch.clone(), TargetMode::Other).target(b);
        assert_eq!(bus.dispatch(&other), 1);
        assert_eq!(hits(), [1, 2, 1]);

        let all = DispatchRequest::new(ch, TargetMode::All);
        assert_eq!(bus.dispatch(&all), 3);
        assert_eq!(hits(), [2, 3, 2]);
    }

    #[test]
    fn test_modes_without_inputs_reach_nobody() {
        let (bus, mut alloc, ch) = setup();
        let probe = Rc::new(Probe::default());
        let _sub = bus.register(&ch, alloc.allocate(), &probe);
        assert_eq!(bus.dispatch(&DispatchRequest::new(ch.clone(), TargetMode::Owner)), 0);
        assert_eq!(bus.dispatch(&DispatchRequest::new(ch.clone(), TargetMode::Other)), 0);
        let unknown = DispatchRequest::new(ch, TargetMode::Tags).labels(["missing"]);
        assert_eq!(bus.dispatch(&unknown), 0);
    }

    #[test]
    fn test_activator_is_passed_through() {
        let (bus, mut alloc, ch) = setup();
        let owner = alloc.allocate();
        let hitter = alloc.allocate();
        let probe = Rc::new(Probe::default());
        let _sub = bus.register(&ch, owner, &probe);
        bus.dispatch(&DispatchRequest::new(ch, TargetMode::All).activator(hitter));
        assert_eq!(probe.last_activator.get(), Some(hitter));
    }

    /// Drops its own subscription when it first hears an event.
    #[derive(Default)]
    struct OneShot {
        sub: RefCell<Option<Subscription>>,
        hits: Cell<usize>,
    }

    impl Listener for OneShot {
        fn on_event(&self, _event: &Event<'_>) -> Result<(), ListenerError> {
            self.hits.set(self.hits.get() + 1);
            self.sub.borrow_mut().take();
            Ok(())
        }
    }

    #[test]
    fn test_self_unregister_keeps_current_pass_count() {
        let (bus, mut alloc, ch) = setup();
        let one_shot = Rc::new(OneShot::default());
        let probe = Rc::new(Probe::default());
        *one_shot.sub.borrow_mut() = Some(bus.register(&ch, alloc.allocate(), &one_shot));
        let _sub = bus.register(&ch, alloc.allocate(), &probe);

        let before = bus.subscriber_count(&ch);
        let delivered = bus.dispatch(&DispatchRequest::new(ch.clone(), TargetMode::All));
        assert_eq!(delivered, before);
        assert_eq!(one_shot.hits.get(), 1);

        assert_eq!(bus.dispatch(&DispatchRequest::new(ch, TargetMode::All)), 1);
        assert_eq!(one_shot.hits.get(), 1);
    }

    /// Unregisters a victim listener during delivery.
    struct Evictor {
        victim: Rc<Probe>,
    }

    impl Listener for Evictor {
        fn on_event(&self, event: &Event<'_>) -> Result<(), ListenerError> {
            event.bus.unregister(event.channel, &self.victim);
            Ok(())
        }
    }

    #[test]
    fn test_listener_unregistered_mid_pass_is_not_delivered() {
        let (bus, mut alloc, ch) = setup();
        let victim = Rc::new(Probe::default());
        let evictor = Rc::new(Evictor {
            victim: Rc::clone(&victim),
        });
        let _a = bus.register(&ch, alloc.allocate(), &evictor);
        let _b = bus.register(&ch, alloc.allocate(), &victim);

        assert_eq!(bus.dispatch(&DispatchRequest::new(ch.clone(), TargetMode::All)), 1);
        assert_eq!(victim.hits.get(), 0);
        assert!(!bus.is_registered(&ch, &victim));
        assert_eq!(bus.dispatch(&DispatchRequest::new(ch, TargetMode::All)), 1);
        assert_eq!(victim.hits.get(), 0);
    }

    /// Drops a victim's subscription guard during delivery.
    struct GuardDropper {
        guard: RefCell<Option<Subscription>>,
    }

    impl Listener for GuardDropper {
        fn on_event(&self, _event: &Event<'_>) -> Result<(), ListenerError> {
            self.guard.borrow_mut().take();
            Ok(())
        }
    }

    #[test]
    fn test_guard_dropped_mid_pass_stops_delivery() {
        let (bus, mut alloc, ch) = setup();
        let victim = Rc::new(Probe::default());
        let dropper = Rc::new(GuardDropper {
            guard: RefCell::new(None),
        });
        let _a = bus.register(&ch, alloc.allocate(), &dropper);
        *dropper.guard.borrow_mut() = Some(bus.register(&ch, alloc.allocate(), &victim));
        assert_eq!(
            dropper.guard.borrow().as_ref().map(|g| g.channel().name().to_owned()),
            Some("Damaged".to_owned())
        );

        assert_eq!(bus.dispatch(&DispatchRequest::new(ch, TargetMode::All)), 1);
        assert_eq!(victim.hits.get(), 0);
    }

    /// Registers a fresh closure listener every time it is delivered to.
    #[derive(Default)]
    struct Recruiter {
        recruits: RefCell<Vec<Subscription>>,
    }

    impl Listener for Recruiter {
        fn on_event(&self, event: &Event<'_>) -> Result<(), ListenerError> {
            let sub = event
                .bus
                .register_fn(event.channel, event.owner, Acceptance::Any, |_| Ok(()));
            self.recruits.borrow_mut().push(sub);
            Ok(())
        }
    }

    #[test]
    fn test_registration_mid_pass_applies_to_next_pass() {
        let (bus, mut alloc, ch) = setup();
        let recruiter = Rc::new(Recruiter::default());
        let _sub = bus.register(&ch, alloc.allocate(), &recruiter);

        assert_eq!(bus.dispatch(&DispatchRequest::new(ch.clone(), TargetMode::All)), 1);
        assert_eq!(bus.subscriber_count(&ch), 2);
        assert_eq!(bus.dispatch(&DispatchRequest::new(ch, TargetMode::All)), 2);
    }

    /// Re-dispatches its channel once from inside its own reaction.
    #[derive(Default)]
    struct Echo {
        hits: Cell<usize>,
        inner_delivered: Cell<usize>,
    }

    impl Listener for Echo {
        fn on_event(&self, event: &Event<'_>) -> Result<(), ListenerError> {
            self.hits.set(self.hits.get() + 1);
            if self.hits.get() == 1 {
                let inner = event
                    .bus
                    .dispatch(&DispatchRequest::new(event.channel.clone(), TargetMode::All));
                self.inner_delivered.set(inner);
            }
            Ok(())
        }
    }

    #[test]
    fn test_reentrant_dispatch() {
        let (bus, mut alloc, ch) = setup();
        let echo = Rc::new(Echo::default());
        let probe = Rc::new(Probe::default());
        let _a = bus.register(&ch, alloc.allocate(), &echo);
        let _b = bus.register(&ch, alloc.allocate(), &probe);

        let delivered = bus.dispatch(&DispatchRequest::new(ch, TargetMode::All));
        assert_eq!(delivered, 2);
        assert_eq!(echo.inner_delivered.get(), 2);
        assert_eq!(echo.hits.get(), 2);
        assert_eq!(probe.hits.get(), 2);
    }

    struct Failing;

    impl Listener for Failing {
        fn on_event(&self, _event: &Event<'_>) -> Result<(), ListenerError> {
            Err(ListenerError::failed("sprite missing"))
        }
    }

    struct Panicking;

    impl Listener for Panicking {
        fn on_event(&self, _event: &Event<'_>) -> Result<(), ListenerError> {
            panic!("audio source gone");
        }
    }

    #[test]
    fn test_failures_are_isolated_and_reported() {
        let sink = Rc::new(RecordingSink::new());
        let bus = EventBus::with_sink(LabelRegistry::shared(), sink.clone());
        let mut alloc = EntityAllocator::new();
        let ch = Channel::new("Damaged");

        let failing = Rc::new(Failing);
        let panicking = Rc::new(Panicking);
        let probe = Rc::new(Probe::default());
        let _subs = [
            bus.register(&ch, alloc.allocate(), &failing),
            bus.register(&ch, alloc.allocate(), &panicking),
            bus.register(&ch, alloc.allocate(), &probe),
        ];

        let delivered = bus.dispatch(&DispatchRequest::new(ch, TargetMode::All));
        assert_eq!(delivered, 3);
        assert_eq!(probe.hits.get(), 1);

        let failures = sink.take();
        assert_eq!(failures.len(), 2);
        assert!(
            failures
                .iter()
                .any(|f| matches!(&f.error, ListenerError::Panicked(m) if m.contains("audio source gone")))
        );
        assert!(
            failures
                .iter()
                .any(|f| matches!(f.error, ListenerError::Failed(_)))
        );
    }

    #[test]
    fn test_dropped_listener_is_pruned() {
        let (bus, mut alloc, ch) = setup();
        let probe = Rc::new(Probe::default());
        let sub = bus.register(&ch, alloc.allocate(), &probe);
        drop(probe);
        assert_eq!(bus.subscriber_count(&ch), 0);
        assert_eq!(bus.dispatch(&DispatchRequest::new(ch, TargetMode::All)), 0);
        assert_eq!(bus.channel_count(), 0);
        drop(sub);
    }

    #[test]
    fn test_unregister_owner_clears_every_channel() {
        let (bus, mut alloc, ch) = setup();
        let owner = alloc.allocate();
        let bystander = alloc.allocate();
        let other_ch = Channel::new("Healed");
        let probe = Rc::new(Probe::default());
        let keep = Rc::new(Probe::default());
        let _subs = [
            bus.register(&ch, owner, &probe),
            bus.register(&other_ch, owner, &probe),
            bus.register(&ch, bystander, &keep),
        ];

        assert_eq!(bus.unregister_owner(owner), 2);
        assert!(!bus.is_registered(&ch, &probe));
        assert!(!bus.is_registered(&other_ch, &probe));
        assert!(bus.is_registered(&ch, &keep));
    }

    #[test]
    fn test_register_fn_lives_with_guard() {
        let (bus, mut alloc, ch) = setup();
        let hits = Rc::new(Cell::new(0));
        let counter = Rc::clone(&hits);
        let sub = bus.register_fn(&ch, alloc.allocate(), Acceptance::Any, move |_| {
            counter.set(counter.get() + 1);
            Ok(())
        });
        bus.dispatch(&DispatchRequest::new(ch.clone(), TargetMode::All));
        drop(sub);
        assert_eq!(bus.dispatch(&DispatchRequest::new(ch, TargetMode::All)), 0);
        assert_eq!(hits.get(), 1);
    }

    fn bump(counter: Rc<Cell<usize>>) -> impl Fn(&Event<'_>) -> Result<(), ListenerError> {
        move |_| {
            counter.set(counter.get() + 1);
            Ok(())
        }
    }

    #[test]
    fn test_two_stage_filtering() {
        let (bus, mut alloc, ch) = setup();
        let [p1, p2, rock, player] = [
            alloc.allocate(),
            alloc.allocate(),
            alloc.allocate(),
            alloc.allocate(),
        ];
        {
            let mut labels = bus.labels().borrow_mut();
            labels.add_label(p1, "player");
            labels.add_label(p2, "player");
            labels.add_label(player, "player");
        }

        let effects = Rc::new(Cell::new(0));
        let _subs = [
            bus.register_fn(
                &ch,
                p1,
                Acceptance::Labels(vec!["player".into()]),
                bump(Rc::clone(&effects)),
            ),
            bus.register_fn(&ch, p2, Acceptance::Entity(rock), bump(Rc::clone(&effects))),
            bus.register_fn(&ch, rock, Acceptance::Any, bump(Rc::clone(&effects))),
        ];

        let req = DispatchRequest::new(ch, TargetMode::Tags)
            .labels(["player"])
            .activator(player);
        let delivered = bus.dispatch(&req);
        assert_eq!(delivered, 2);
        assert_eq!(effects.get(), 1);
        assert!(effects.get() <= delivered);
    }

    #[test]
    fn test_all_listeners_declining_is_not_an_error() {
        let sink = Rc::new(RecordingSink::new());
        let bus = EventBus::with_sink(LabelRegistry::shared(), sink.clone());
        let mut alloc = EntityAllocator::new();
        let ch = Channel::new("Damaged");
        let ran = Rc::new(Cell::new(false));
        let flag = Rc::clone(&ran);
        let _sub = bus.register_fn(&ch, alloc.allocate(), Acceptance::Owner, move |_| {
            flag.set(true);
            Ok(())
        });

        assert_eq!(bus.dispatch(&DispatchRequest::new(ch, TargetMode::All)), 1);
        assert!(!ran.get());
        assert!(sink.is_empty());
    }
}
