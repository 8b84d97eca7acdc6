//! Client-side store: a single immutable [`AppState`] snapshot replaced on
//! every dispatch, with change listeners and a hook for side effects.
//!
//! Everything here lives on the UI task. Listeners may dispatch or cancel
//! subscriptions (their own included) while a notification is running.

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::rc::{Rc, Weak};

use tracing::{debug, trace};

use crate::action::Action;
use crate::reducer;
use crate::types::{EmptyPackage, Installation, Origin, PackageVisibility, Profile, Project, Repository};

#[derive(Debug, Clone, Default)]
pub struct SessionState {
    pub token: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct CurrentUser {
    pub profile: Profile,
}

#[derive(Debug, Clone, Default)]
pub struct UsersState {
    pub current: CurrentUser,
}

#[derive(Debug, Clone, Default)]
pub struct OriginsState {
    pub current: Origin,
    pub current_members: Vec<String>,
    pub current_invitations: Vec<String>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LoadState {
    pub loading: bool,
}

#[derive(Debug, Clone, Default)]
pub struct GitHubUi {
    pub installations: LoadState,
    pub repositories: LoadState,
}

#[derive(Debug, Clone, Default)]
pub struct GitHubState {
    pub installations: Vec<Installation>,
    pub repositories: Vec<Repository>,
    /// Plan path -> whether it exists in the selected repository
    pub files: BTreeMap<String, bool>,
    pub ui: GitHubUi,
}

#[derive(Debug, Clone, Default)]
pub struct CurrentProject {
    pub project: Option<Project>,
    /// Integration name -> settings
    pub settings: BTreeMap<String, BTreeMap<String, String>>,
    pub visibility: Option<PackageVisibility>,
}

#[derive(Debug, Clone, Default)]
pub struct ProjectsState {
    pub current: CurrentProject,
    pub list: Vec<Project>,
}

#[derive(Debug, Clone, Default)]
pub struct PackagesState {
    pub current: Option<EmptyPackage>,
}

#[derive(Debug, Clone, Default)]
pub struct AppState {
    pub session: SessionState,
    pub users: UsersState,
    pub origins: OriginsState,
    pub github: GitHubState,
    pub projects: ProjectsState,
    pub packages: PackagesState,
}

impl AppState {
    pub fn installations(&self) -> &[Installation] {
        &self.github.installations
    }

    pub fn repositories(&self) -> &[Repository] {
        &self.github.repositories
    }
}

/// Shared state that can be read as a snapshot and observed for changes.
pub trait Subscribable {
    type State: 'static;

    fn snapshot(&self) -> Rc<Self::State>;

    /// Register `listener` for every subsequent change. The listener gets
    /// its own subscription so it can cancel itself.
    fn on_change<F>(&self, listener: F) -> Subscription
    where
        F: FnMut(&Self::State, &Subscription) + 'static;
}

trait Unsubscribe {
    fn remove(&self, id: u64);
    fn contains(&self, id: u64) -> bool;
}

/// Cancel token for a registered listener. Cancelling is idempotent and
/// takes effect immediately, including for a notification in progress.
#[derive(Clone)]
pub struct Subscription {
    id: u64,
    registry: Weak<dyn Unsubscribe>,
}

impl Subscription {
    pub fn cancel(&self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.remove(self.id);
        }
    }

    pub fn is_active(&self) -> bool {
        self.registry
            .upgrade()
            .is_some_and(|registry| registry.contains(self.id))
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("active", &self.is_active())
            .finish()
    }
}

type Listener<S> = Rc<RefCell<dyn FnMut(&S, &Subscription)>>;

pub struct Listeners<S> {
    entries: RefCell<Vec<(u64, Listener<S>)>>,
    next_id: Cell<u64>,
}

impl<S: 'static> Listeners<S> {
    pub fn new() -> Rc<Self> {
        Rc::new(Self {
            entries: RefCell::new(Vec::new()),
            next_id: Cell::new(0),
        })
    }

    pub fn subscribe<F>(self: &Rc<Self>, listener: F) -> Subscription
    where
        F: FnMut(&S, &Subscription) + 'static,
    {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        let listener: Listener<S> = Rc::new(RefCell::new(listener));
        self.entries.borrow_mut().push((id, listener));
        trace!(id, "listener subscribed");
        self.token(id)
    }

    /// Call every live listener with the state returned by `current` at the
    /// moment it is called, so a listener always sees the newest snapshot
    /// even if an earlier listener dispatched.
    pub fn notify_with(self: &Rc<Self>, current: impl Fn() -> Rc<S>) {
        let listeners: Vec<(u64, Listener<S>)> = self.entries.borrow().clone();
        for (id, listener) in listeners {
            if !self.contains(id) {
                continue;
            }
            // A listener that is already running is skipped on re-entry.
            let Ok(mut f) = listener.try_borrow_mut() else {
                trace!(id, "skipping re-entrant listener");
                continue;
            };
            let state = current();
            f(&state, &self.token(id));
        }
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    fn token(self: &Rc<Self>, id: u64) -> Subscription {
        let registry: Weak<dyn Unsubscribe> = Rc::downgrade(self) as Weak<dyn Unsubscribe>;
        Subscription { id, registry }
    }
}

impl<S> Unsubscribe for Listeners<S> {
    fn remove(&self, id: u64) {
        let mut entries = self.entries.borrow_mut();
        let before = entries.len();
        entries.retain(|(entry_id, _)| *entry_id != id);
        if entries.len() != before {
            trace!(id, "listener unsubscribed");
        }
    }

    fn contains(&self, id: u64) -> bool {
        self.entries.borrow().iter().any(|(entry_id, _)| *entry_id == id)
    }
}

/// Side effects triggered by dispatched actions (REST calls and the like).
pub trait Effects {
    fn handle(&self, action: &Action);
}

/// Effects sink that ignores every action.
pub struct NoEffects;

impl Effects for NoEffects {
    fn handle(&self, _action: &Action) {}
}

pub struct Store {
    state: RefCell<Rc<AppState>>,
    listeners: Rc<Listeners<AppState>>,
    effects: Box<dyn Effects>,
}

impl Store {
    pub fn new(effects: impl Effects + 'static) -> Rc<Self> {
        Self::with_state(AppState::default(), effects)
    }

    pub fn with_state(state: AppState, effects: impl Effects + 'static) -> Rc<Self> {
        Rc::new(Self {
            state: RefCell::new(Rc::new(state)),
            listeners: Listeners::new(),
            effects: Box::new(effects),
        })
    }

    /// Reduce `action` into a new snapshot, notify listeners, then hand the
    /// action to the effects layer.
    pub fn dispatch(&self, action: Action) {
        debug!(action = ?ActionName(&action), "dispatch");
        let current = Rc::clone(&self.state.borrow());
        let next = reducer::reduce((*current).clone(), &action);
        *self.state.borrow_mut() = Rc::new(next);
        self.listeners.notify_with(|| self.snapshot());
        self.effects.handle(&action);
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }
}

impl Subscribable for Store {
    type State = AppState;

    fn snapshot(&self) -> Rc<AppState> {
        Rc::clone(&self.state.borrow())
    }

    fn on_change<F>(&self, listener: F) -> Subscription
    where
        F: FnMut(&AppState, &Subscription) + 'static,
    {
        self.listeners.subscribe(listener)
    }
}

/// Logs the variant name only; payloads can be large.
struct ActionName<'a>(&'a Action);

impl std::fmt::Debug for ActionName<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let full = format!("{:?}", self.0);
        let name = full
            .split(|c: char| !c.is_alphanumeric())
            .next()
            .unwrap_or_default();
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dispatch_notifies_every_listener() {
        let store = Store::new(NoEffects);
        let seen = Rc::new(Cell::new(0));
        let counter = Rc::clone(&seen);
        let _sub = store.on_change(move |_, _| counter.set(counter.get() + 1));

        store.dispatch(Action::FetchProfile);
        store.dispatch(Action::None);
        assert_eq!(seen.get(), 2);
    }

    #[test]
    fn listener_sees_new_snapshot() {
        let store = Store::new(NoEffects);
        let loading = Rc::new(Cell::new(false));
        let flag = Rc::clone(&loading);
        let _sub = store.on_change(move |state, _| flag.set(state.github.ui.installations.loading));

        store.dispatch(Action::FetchGitHubInstallations {
            username: "bob".into(),
        });
        assert!(loading.get());
        assert!(store.snapshot().github.ui.installations.loading);
    }

    #[test]
    fn cancel_is_idempotent() {
        let store = Store::new(NoEffects);
        let sub = store.on_change(|_, _| {});
        assert!(sub.is_active());
        sub.cancel();
        sub.cancel();
        assert!(!sub.is_active());
        assert_eq!(store.listener_count(), 0);
    }

    #[test]
    fn listener_can_cancel_itself() {
        let store = Store::new(NoEffects);
        let calls = Rc::new(Cell::new(0));
        let counter = Rc::clone(&calls);
        let sub = store.on_change(move |_, sub| {
            counter.set(counter.get() + 1);
            sub.cancel();
        });

        store.dispatch(Action::None);
        store.dispatch(Action::None);
        assert_eq!(calls.get(), 1);
        assert!(!sub.is_active());
    }

    #[test]
    fn cancelled_mid_notification_is_not_called() {
        let store = Store::new(NoEffects);
        let second_calls = Rc::new(Cell::new(0));
        let victim: Rc<RefCell<Option<Subscription>>> = Rc::new(RefCell::new(None));

        let target = Rc::clone(&victim);
        let _first = store.on_change(move |_, _| {
            if let Some(sub) = target.borrow().as_ref() {
                sub.cancel();
            }
        });
        let counter = Rc::clone(&second_calls);
        let second = store.on_change(move |_, _| counter.set(counter.get() + 1));
        *victim.borrow_mut() = Some(second);

        store.dispatch(Action::None);
        assert_eq!(second_calls.get(), 0);
    }

    #[test]
    fn nested_dispatch_delivers_latest_snapshot() {
        let store = Store::new(NoEffects);
        let weak = Rc::downgrade(&store);
        let _dispatcher = store.on_change(move |state, sub| {
            if !state.github.ui.installations.loading {
                return;
            }
            sub.cancel();
            if let Some(store) = weak.upgrade() {
                store.dispatch(Action::GitHubInstallationsLoaded(Vec::new()));
            }
        });

        let observed = Rc::new(RefCell::new(Vec::new()));
        let log = Rc::clone(&observed);
        let _observer =
            store.on_change(move |state, _| log.borrow_mut().push(state.github.ui.installations.loading));

        store.dispatch(Action::FetchGitHubInstallations {
            username: "bob".into(),
        });
        // The nested dispatch reaches the observer first; the outer
        // notification then delivers the same, newest snapshot.
        assert_eq!(*observed.borrow(), vec![false, false]);
    }

    #[test]
    fn effects_receive_dispatched_actions() {
        struct Recorder(Rc<RefCell<Vec<String>>>);
        impl Effects for Recorder {
            fn handle(&self, action: &Action) {
                self.0.borrow_mut().push(format!("{:?}", ActionName(action)));
            }
        }

        let log = Rc::new(RefCell::new(Vec::new()));
        let store = Store::new(Recorder(Rc::clone(&log)));
        store.dispatch(Action::FetchGitHubRepositories(3));
        assert_eq!(*log.borrow(), vec!["FetchGitHubRepositories".to_string()]);
    }
}
