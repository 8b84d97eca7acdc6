use std::rc::Rc;

use ratatui::widgets::ListState;
use tracing::debug;

use crate::action::Action;
use crate::store::{Store, Subscribable};

/// Members tab of an origin.
pub struct OriginMembersTab {
    store: Rc<Store>,
    pub origin: String,
    pub list: ListState,
    /// Account being typed into the invite box
    pub invite: Option<String>,
}

impl OriginMembersTab {
    pub fn new(store: Rc<Store>, origin: String) -> Self {
        Self {
            store,
            origin,
            list: ListState::default(),
            invite: None,
        }
    }

    pub fn open(&mut self) {
        self.list.select(None);
        self.store
            .dispatch(Action::FetchOriginMembers(self.origin.clone()));
    }

    pub fn members(&self) -> Vec<String> {
        self.store.snapshot().origins.current_members.clone()
    }

    pub fn invitations(&self) -> Vec<String> {
        self.store.snapshot().origins.current_invitations.clone()
    }

    pub fn can_manage(&self) -> bool {
        let state = self.store.snapshot();
        state.users.current.profile.id == state.origins.current.owner_id
    }

    pub fn select_next(&mut self) {
        let len = self.members().len();
        if len == 0 {
            return;
        }
        let i = self.list.selected().map_or(0, |i| (i + 1).min(len - 1));
        self.list.select(Some(i));
    }

    pub fn select_prev(&mut self) {
        let i = self.list.selected().map_or(0, |i| i.saturating_sub(1));
        self.list.select(Some(i));
    }

    pub fn selected_member(&self) -> Option<String> {
        self.list
            .selected()
            .and_then(|i| self.members().get(i).cloned())
    }

    /// Remove `member` from the origin. Owners only.
    pub fn remove(&self, member: &str) -> bool {
        if !self.can_manage() {
            debug!(member, "not the origin owner, ignoring remove");
            return false;
        }
        self.store.dispatch(Action::DeleteOriginMember {
            origin: self.origin.clone(),
            member: member.to_string(),
        });
        true
    }

    pub fn invite(&mut self, account: &str) -> bool {
        let account = account.trim();
        if account.is_empty() || !self.can_manage() {
            return false;
        }
        self.store.dispatch(Action::InviteOriginMember {
            origin: self.origin.clone(),
            account: account.to_string(),
        });
        self.invite = None;
        true
    }
}
