//! Matching a stored connection (`org/repo`) against the installation and
//! repository lists, which load asynchronously and independently.
//!
//! Each list is watched through its own subscription. The first time a list
//! is non-empty the subscription cancels itself, scans the list once and
//! reports the first match. A list that never loads keeps its subscription
//! alive until the owner cancels it.

use std::rc::Rc;

use tracing::debug;

use crate::store::{AppState, Subscribable, Subscription};
use crate::types::{Installation, Repository};

/// `organization/name` reference to a previously connected repository
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetKey {
    pub organization: String,
    pub name: String,
}

impl TargetKey {
    /// Split on `/`. Only the first two segments are used; a key without a
    /// delimiter gets an empty `name`.
    pub fn parse(key: &str) -> Self {
        let mut parts = key.split('/');
        let organization = parts.next().unwrap_or_default().to_string();
        let name = parts.next().unwrap_or_default().to_string();
        Self { organization, name }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScanPolicy {
    /// Scan the first non-empty snapshot and stop, matched or not.
    #[default]
    Once,
    /// Keep watching non-empty snapshots until one contains a match.
    UntilMatched,
}

impl ScanPolicy {
    pub fn from_flag(until_matched: bool) -> Self {
        if until_matched {
            ScanPolicy::UntilMatched
        } else {
            ScanPolicy::Once
        }
    }
}

/// Watch one collection of `source` until it is populated, then hand the
/// first entry satisfying `is_match` to `on_match`.
pub fn watch_until_populated<S, T, M, F>(
    source: &S,
    policy: ScanPolicy,
    collection: fn(&S::State) -> &[T],
    is_match: M,
    mut on_match: F,
) -> Subscription
where
    S: Subscribable,
    T: 'static,
    M: Fn(&T) -> bool + 'static,
    F: FnMut(&T) + 'static,
{
    source.on_change(move |state, sub| {
        let items = collection(state);
        if items.is_empty() {
            return;
        }

        // Cancel before scanning so a dispatch made by `on_match` cannot
        // start a second scan.
        if policy == ScanPolicy::Once {
            sub.cancel();
        }

        match items.iter().find(|&item| is_match(item)) {
            Some(item) => {
                sub.cancel();
                on_match(item);
            }
            None if policy == ScanPolicy::Once => {
                debug!(entries = items.len(), "no match in first populated snapshot");
            }
            None => {}
        }
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListKind {
    Installations,
    Repositories,
}

/// Receives the selections a reconciliation makes.
pub trait ConnectionSink {
    fn pick_installation(&self, installation: &Installation);
    fn pick_repository(&self, repository: &Repository);
    /// Queue a post-render effect that scrolls the active row of `list`
    /// into view.
    fn scroll_into_view(&self, list: ListKind);
}

/// The two live watches of one reconciliation pass
#[derive(Debug)]
pub struct Reconciliation {
    pub installations: Subscription,
    pub repositories: Subscription,
}

impl Reconciliation {
    pub fn cancel(&self) {
        self.installations.cancel();
        self.repositories.cancel();
    }

    pub fn is_settled(&self) -> bool {
        !self.installations.is_active() && !self.repositories.is_active()
    }
}

/// Select the installation whose account is `key.organization` and the
/// repository named `key.name` once each list has loaded.
pub fn reconcile<S, K>(source: &S, key: &TargetKey, policy: ScanPolicy, sink: Rc<K>) -> Reconciliation
where
    S: Subscribable<State = AppState>,
    K: ConnectionSink + 'static,
{
    debug!(org = %key.organization, repo = %key.name, ?policy, "reconciling connection");

    let organization = key.organization.clone();
    let install_sink = Rc::clone(&sink);
    let installations = watch_until_populated(
        source,
        policy,
        AppState::installations,
        move |install: &Installation| install.account.login == organization,
        move |install| {
            install_sink.pick_installation(install);
            install_sink.scroll_into_view(ListKind::Installations);
        },
    );

    let name = key.name.clone();
    let repositories = watch_until_populated(
        source,
        policy,
        AppState::repositories,
        move |repo: &Repository| repo.name == name,
        move |repo| {
            sink.pick_repository(repo);
            sink.scroll_into_view(ListKind::Repositories);
        },
    );

    Reconciliation {
        installations,
        repositories,
    }
}
