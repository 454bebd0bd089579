//! Entities created during a run
//!
//! A [`User`] or [`Schedule`] is built locally, mutated at most once on the
//! success path of its action, and only then moved into a [`Registry`].

use std::fmt;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};

use crate::agent::Agent;

/// A virtual user with its own agent (cookie jar)
pub struct User {
    /// Assigned by the target on signup
    pub id: Option<String>,
    pub email: String,
    pub nickname: String,
    pub created_at: Option<DateTime<Utc>>,
    /// Log in with wrong credentials and expect a rejection
    pub fail_on_login: bool,
    pub agent: Box<dyn Agent>,
}

impl User {
    pub fn new(email: String, nickname: String, fail_on_login: bool, agent: Box<dyn Agent>) -> Self {
        Self {
            id: None,
            email,
            nickname,
            created_at: None,
            fail_on_login,
            agent,
        }
    }

    pub fn is_registered(&self) -> bool {
        self.id.is_some()
    }
}

impl fmt::Debug for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("User")
            .field("id", &self.id)
            .field("email", &self.email)
            .field("nickname", &self.nickname)
            .field("created_at", &self.created_at)
            .field("fail_on_login", &self.fail_on_login)
            .finish_non_exhaustive()
    }
}

/// A capacity-bounded schedule owned by the staff user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schedule {
    pub id: Option<String>,
    pub title: String,
    pub capacity: u32,
    pub created_at: Option<DateTime<Utc>>,
}

impl Schedule {
    pub fn new(title: String, capacity: u32) -> Self {
        Self {
            id: None,
            title,
            capacity,
            created_at: None,
        }
    }

    pub fn is_created(&self) -> bool {
        self.id.is_some()
    }
}

/// Append-only, index-stable collection shared between workers
///
/// Indices handed out by [`Registry::add`] never change; any index below a
/// previously observed [`Registry::count`] stays readable.
#[derive(Debug)]
pub struct Registry<T> {
    items: RwLock<Vec<Arc<T>>>,
}

impl<T> Default for Registry<T> {
    fn default() -> Self {
        Self {
            items: RwLock::new(Vec::new()),
        }
    }
}

impl<T> Registry<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `item` and return its index
    pub fn add(&self, item: T) -> usize {
        let mut items = self.items.write().unwrap_or_else(|e| e.into_inner());
        items.push(Arc::new(item));
        items.len() - 1
    }

    pub fn get(&self, index: usize) -> Option<Arc<T>> {
        let items = self.items.read().unwrap_or_else(|e| e.into_inner());
        items.get(index).cloned()
    }

    pub fn count(&self) -> usize {
        self.items.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.count() == 0
    }

    /// Every entry currently registered, in insertion order
    pub fn snapshot(&self) -> Vec<Arc<T>> {
        self.items.read().unwrap_or_else(|e| e.into_inner()).clone()
    }
}
