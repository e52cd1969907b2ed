use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

use super::document::{current_timestamp, load_document, save_document};
use super::member_feed::{MemberFeed, MemberSnapshot, MemberSubscription};
use crate::error::{ClubError, Result};

/// A club member
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Member {
    /// Identity provider subject
    pub id: String,

    pub display_name: String,

    pub is_admin: bool,

    /// Amount owed (positive means the member owes money)
    pub balance: i64,

    /// Informational only
    pub debt_active_since: DateTime<Utc>,
}

impl Member {
    /// Record created on a member's first sign-in
    pub fn new(id: String, display_name: String, initial_balance: i64) -> Self {
        Self {
            id,
            display_name,
            is_admin: false,
            balance: initial_balance,
            debt_active_since: Utc::now(),
        }
    }

    pub fn owes(&self) -> bool {
        self.balance > 0
    }
}

/// Mutation applied to a stored member
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberUpdate {
    AddToBalance(i64),
    SetBalance(i64),
    SetAdmin(bool),
}

impl MemberUpdate {
    fn apply(self, member: &mut Member) -> Result<()> {
        match self {
            MemberUpdate::AddToBalance(delta) => {
                member.balance = member
                    .balance
                    .checked_add(delta)
                    .ok_or_else(|| ClubError::validation("Amount is out of range"))?;
            }
            MemberUpdate::SetBalance(balance) => member.balance = balance,
            MemberUpdate::SetAdmin(is_admin) => member.is_admin = is_admin,
        }
        Ok(())
    }
}

/// Member record store
#[async_trait]
pub trait MemberStore: Send + Sync {
    async fn get(&self, member_id: &str) -> Result<Option<Member>>;

    /// Insert a member unless one with the same id exists; returns the stored record
    async fn create(&self, member: Member) -> Result<Member>;

    async fn update(&self, member_id: &str, update: MemberUpdate) -> Result<Member>;

    /// All members, ordered by display name
    async fn list(&self) -> Result<Vec<Member>>;

    /// Live stream of the full member list
    async fn subscribe(&self) -> Result<MemberSubscription>;
}

pub type SharedMemberStore = Arc<dyn MemberStore>;

/// On-disk member document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemberDatabase {
    /// Schema version
    pub version: u32,

    /// Last update timestamp
    pub last_updated: u64,

    /// Member ID -> member
    pub members: HashMap<String, Member>,
}

impl Default for MemberDatabase {
    fn default() -> Self {
        Self {
            version: 1,
            last_updated: current_timestamp(),
            members: HashMap::new(),
        }
    }
}

impl MemberDatabase {
    fn snapshot(&self) -> MemberSnapshot {
        let mut members: Vec<Member> = self.members.values().cloned().collect();
        members.sort_by(|a, b| {
            a.display_name
                .cmp(&b.display_name)
                .then_with(|| a.id.cmp(&b.id))
        });
        members
    }
}

/// Member store persisted to a JSON file (or kept in memory only when no path is given)
pub struct FileMemberStore {
    db: RwLock<MemberDatabase>,
    path: Option<String>,
    feed: MemberFeed,
}

impl FileMemberStore {
    /// Open the store at `path`, starting empty if the file does not exist
    pub async fn open(path: &str) -> Result<Self> {
        let db = load_document::<MemberDatabase>(path)
            .await?
            .unwrap_or_default();
        info!("Loaded {} members from {}", db.members.len(), path);

        Ok(Self {
            db: RwLock::new(db),
            path: Some(path.to_string()),
            feed: MemberFeed::new(64),
        })
    }

    pub fn in_memory() -> Self {
        Self {
            db: RwLock::new(MemberDatabase::default()),
            path: None,
            feed: MemberFeed::new(64),
        }
    }

    pub fn open_subscriptions(&self) -> usize {
        self.feed.open_subscriptions()
    }

    /// Pick up writes made by another process on the same file (`--grant-admin`)
    async fn reload(&self, db: &mut MemberDatabase) -> Result<()> {
        let path = match &self.path {
            Some(path) => path,
            None => return Ok(()),
        };
        if let Some(on_disk) = load_document::<MemberDatabase>(path).await? {
            if on_disk.members != db.members {
                debug!("Member file {} changed on disk, reloading", path);
                *db = on_disk;
                self.feed.publish(db.snapshot());
            }
        }
        Ok(())
    }

    /// Persist `next` and swap it in; the stored state is untouched if saving fails
    async fn commit(&self, db: &mut MemberDatabase, mut next: MemberDatabase) -> Result<()> {
        next.last_updated = current_timestamp();
        if let Some(path) = &self.path {
            save_document(path, &next).await?;
        }
        *db = next;
        self.feed.publish(db.snapshot());
        Ok(())
    }
}

#[async_trait]
impl MemberStore for FileMemberStore {
    async fn get(&self, member_id: &str) -> Result<Option<Member>> {
        let mut db = self.db.write().await;
        self.reload(&mut db).await?;
        Ok(db.members.get(member_id).cloned())
    }

    async fn create(&self, member: Member) -> Result<Member> {
        let mut db = self.db.write().await;
        self.reload(&mut db).await?;
        if let Some(existing) = db.members.get(&member.id) {
            return Ok(existing.clone());
        }

        let mut next = db.clone();
        next.members.insert(member.id.clone(), member.clone());
        self.commit(&mut db, next).await?;

        debug!("Created member {} ({})", member.display_name, member.id);
        Ok(member)
    }

    async fn update(&self, member_id: &str, update: MemberUpdate) -> Result<Member> {
        let mut db = self.db.write().await;
        self.reload(&mut db).await?;
        let mut next = db.clone();

        let member = next
            .members
            .get_mut(member_id)
            .ok_or_else(|| ClubError::MemberNotFound {
                member_id: member_id.to_string(),
            })?;
        update.apply(member)?;
        let updated = member.clone();

        self.commit(&mut db, next).await?;
        Ok(updated)
    }

    async fn list(&self) -> Result<Vec<Member>> {
        let mut db = self.db.write().await;
        self.reload(&mut db).await?;
        Ok(db.snapshot())
    }

    async fn subscribe(&self) -> Result<MemberSubscription> {
        // Hold the lock so no write slips between the snapshot and the subscription
        let mut db = self.db.write().await;
        self.reload(&mut db).await?;
        Ok(self.feed.subscribe(db.snapshot()))
    }
}

pub fn create_shared_member_store(store: FileMemberStore) -> SharedMemberStore {
    Arc::new(store)
}
