//! Vault contents: the stored group tree and the flat entry snapshots
//! handed to the session.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// One credential as shown to the user.
///
/// String fields are zeroized on drop, so dropping the entry list is enough
/// to scrub decrypted material.
#[derive(Clone, Default, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct CredentialEntry {
    pub title: String,
    pub username: String,
    pub secret: String,
    pub url: String,
    pub notes: String,
    /// `/`-joined names of the groups above this entry, empty at the root.
    pub group_path: String,
    #[zeroize(skip)]
    pub created_at: Option<DateTime<Utc>>,
    #[zeroize(skip)]
    pub modified_at: Option<DateTime<Utc>>,
    /// Identity of the stored entry this snapshot came from.
    #[zeroize(skip)]
    pub id: Uuid,
}

impl CredentialEntry {
    pub fn new(
        title: impl Into<String>,
        username: impl Into<String>,
        secret: impl Into<String>,
    ) -> Self {
        // No struct update syntax here: the type implements Drop.
        Self {
            title: title.into(),
            username: username.into(),
            secret: secret.into(),
            url: String::new(),
            notes: String::new(),
            group_path: String::new(),
            created_at: None,
            modified_at: None,
            id: Uuid::new_v4(),
        }
    }
}

impl std::fmt::Debug for CredentialEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never log the secret itself
        f.debug_struct("CredentialEntry")
            .field("id", &self.id)
            .field("title", &self.title)
            .field("username", &self.username)
            .field("secret", &"[REDACTED]")
            .field("group_path", &self.group_path)
            .finish()
    }
}

/// A credential as persisted inside the encrypted payload.
#[derive(Clone, Default, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct StoredEntry {
    #[zeroize(skip)]
    pub id: Uuid,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    #[zeroize(skip)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    #[zeroize(skip)]
    pub modified_at: Option<DateTime<Utc>>,
}

impl StoredEntry {
    pub fn new(
        title: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            title: title.into(),
            username: username.into(),
            password: password.into(),
            url: String::new(),
            notes: String::new(),
            created_at: Some(now),
            modified_at: Some(now),
        }
    }
}

/// A named group holding entries and nested groups.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct Group {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub entries: Vec<StoredEntry>,
    #[serde(default)]
    pub groups: Vec<Group>,
}

impl Group {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_entry(mut self, entry: StoredEntry) -> Self {
        self.entries.push(entry);
        self
    }

    pub fn with_group(mut self, group: Group) -> Self {
        self.groups.push(group);
        self
    }
}

/// Everything inside the encrypted container.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct VaultPayload {
    pub root: Group,
}

impl VaultPayload {
    pub fn new(root: Group) -> Self {
        Self { root }
    }

    /// Flatten the group tree depth-first, entries before subgroups.
    ///
    /// The root group's own name is not part of any path.
    pub fn flatten(&self) -> Vec<CredentialEntry> {
        let mut out = Vec::new();
        collect_entries(&self.root, "", &mut out);
        out
    }
}

fn collect_entries(group: &Group, group_path: &str, out: &mut Vec<CredentialEntry>) {
    for stored in &group.entries {
        out.push(CredentialEntry {
            title: stored.title.clone(),
            username: stored.username.clone(),
            secret: stored.password.clone(),
            url: stored.url.clone(),
            notes: stored.notes.clone(),
            group_path: group_path.to_string(),
            created_at: stored.created_at,
            modified_at: stored.modified_at,
            id: stored.id,
        });
    }

    for sub in &group.groups {
        let sub_path = match (group_path.is_empty(), sub.name.is_empty()) {
            (_, true) => group_path.to_string(),
            (true, false) => sub.name.clone(),
            (false, false) => format!("{}/{}", group_path, sub.name),
        };
        collect_entries(sub, &sub_path, out);
    }
}
