use std::rc::Rc;

use tokio::sync::mpsc;

use crate::action::Action;
use crate::error::{ConsoleError, Result};
use crate::store::Store;

/// Popup that creates an empty package in the current origin.
pub struct PackageCreateDialog {
    store: Rc<Store>,
    tx: mpsc::UnboundedSender<Action>,
    pub origin: String,
    pub input: String,
    pub error: Option<String>,
}

impl PackageCreateDialog {
    pub fn new(store: Rc<Store>, tx: mpsc::UnboundedSender<Action>, origin: String) -> Self {
        Self {
            store,
            tx,
            origin,
            input: String::new(),
            error: None,
        }
    }

    pub fn cancel(&self) {
        self.tx.send(Action::DialogClosed { created: false }).ok();
    }

    pub fn submit(&mut self) {
        let name = self.input.trim().to_string();
        if let Err(e) = validate_package_name(&name) {
            self.error = Some(e.to_string());
            return;
        }
        self.error = None;
        self.store.dispatch(Action::CreateEmptyPackage {
            origin: self.origin.clone(),
            name,
        });
        self.tx.send(Action::DialogClosed { created: true }).ok();
    }
}

pub fn validate_package_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(ConsoleError::Validation("package name is required".into()));
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Err(ConsoleError::Validation(format!(
            "'{}' may only contain letters, digits, '_' and '-'",
            name
        )));
    }
    Ok(())
}
