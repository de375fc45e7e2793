//! Process-wide page state captured into events.

use parking_lot::RwLock;

/// Tab focus, page location, and referrer as last reported by the host.
pub struct PageContext {
    client_version: String,
    tab_active: RwLock<Option<bool>>,
    location: RwLock<Option<String>>,
    referrer: RwLock<Option<String>>,
}

impl PageContext {
    pub fn new(client_version: impl Into<String>) -> Self {
        Self {
            client_version: client_version.into(),
            tab_active: RwLock::new(None),
            location: RwLock::new(None),
            referrer: RwLock::new(None),
        }
    }

    pub fn client_version(&self) -> &str {
        &self.client_version
    }

    /// `None` when focus is unknown.
    pub fn set_tab_active(&self, active: Option<bool>) {
        *self.tab_active.write() = active;
    }

    pub fn tab_active(&self) -> Option<bool> {
        *self.tab_active.read()
    }

    /// Record a navigation.
    pub fn set_page(&self, location: Option<String>, referrer: Option<String>) {
        *self.location.write() = location;
        *self.referrer.write() = referrer;
    }

    pub fn location(&self) -> Option<String> {
        self.location.read().clone()
    }

    pub fn referrer(&self) -> Option<String> {
        self.referrer.read().clone()
    }
}
