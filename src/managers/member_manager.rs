use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::error::{ClubError, Result};
use crate::session::{Identity, MemberSession};
use crate::state::{Member, MemberSubscription, MemberUpdate, SharedMemberStore};

/// Member provisioning, balances and the admin member list
pub struct MemberManager {
    members: SharedMemberStore,

    /// Balance given to members created on first sign-in
    initial_balance: i64,
}

impl MemberManager {
    pub fn new(members: SharedMemberStore, initial_balance: i64) -> Self {
        Self {
            members,
            initial_balance,
        }
    }

    /// Fetch the member for a fresh sign-in, creating the record on first visit
    pub async fn ensure_member(&self, identity: &Identity) -> Result<Member> {
        if let Some(member) = self.members.get(&identity.id).await? {
            debug!("Member {} ({}) signed in", member.display_name, member.id);
            return Ok(member);
        }

        let member = self
            .members
            .create(Member::new(
                identity.id.clone(),
                identity.display_name.clone(),
                self.initial_balance,
            ))
            .await?;
        info!(
            "Registered new member {} ({}) with balance {}",
            member.display_name, member.id, member.balance
        );
        Ok(member)
    }

    /// Current record of the signed-in member
    pub async fn current_member(&self, session: &MemberSession) -> Result<Member> {
        self.members
            .get(&session.member_id)
            .await?
            .ok_or_else(|| ClubError::MemberNotFound {
                member_id: session.member_id.clone(),
            })
    }

    /// Pay off the signed-in member's balance
    pub async fn settle(&self, session: &MemberSession) -> Result<Member> {
        let member = self
            .members
            .update(&session.member_id, MemberUpdate::SetBalance(0))
            .await?;
        info!("Member {} settled their balance", member.id);
        Ok(member)
    }

    /// Add a signed amount to a member's balance. Admins only.
    ///
    /// `raw_amount` is the text typed into the admin form; it is validated
    /// before the store is touched.
    pub async fn adjust_balance(
        &self,
        session: &MemberSession,
        member_id: &str,
        raw_amount: &str,
    ) -> Result<Member> {
        require_admin(session)?;
        let delta = parse_amount(raw_amount)?;

        let member = self
            .members
            .update(member_id, MemberUpdate::AddToBalance(delta))
            .await?;
        info!(
            "Admin {} adjusted balance of {} by {} (now {})",
            session.member_id, member.id, delta, member.balance
        );
        Ok(member)
    }

    pub async fn list_members(&self, session: &MemberSession) -> Result<Vec<Member>> {
        require_admin(session)?;
        self.members.list().await
    }

    /// Live member list for the admin panel
    pub async fn subscribe_members(&self, session: &MemberSession) -> Result<MemberSubscription> {
        require_admin(session)?;
        let subscription = self.members.subscribe().await?;
        debug!(
            "Admin {} opened member subscription {}",
            session.member_id,
            subscription.id()
        );
        Ok(subscription)
    }

    /// Promote a member to admin (command-line only)
    pub async fn grant_admin(&self, member_id: &str) -> Result<Member> {
        let member = self
            .members
            .update(member_id, MemberUpdate::SetAdmin(true))
            .await?;
        info!("Granted admin to {} ({})", member.display_name, member.id);
        Ok(member)
    }
}

fn require_admin(session: &MemberSession) -> Result<()> {
    if session.is_admin {
        Ok(())
    } else {
        warn!(
            "Member {} attempted an admin action without permission",
            session.member_id
        );
        Err(ClubError::PermissionDenied {
            message: "administrator access required".to_string(),
        })
    }
}

/// Parse a whole, optionally negative, amount
pub fn parse_amount(raw: &str) -> Result<i64> {
    let raw = raw.trim();
    let digits = raw.strip_prefix('-').unwrap_or(raw);
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(ClubError::validation("Please enter a valid number."));
    }
    raw.parse()
        .map_err(|_| ClubError::validation("Amount is out of range."))
}

pub type SharedMemberManager = Arc<MemberManager>;

pub fn create_shared_member_manager(
    members: SharedMemberStore,
    initial_balance: i64,
) -> SharedMemberManager {
    Arc::new(MemberManager::new(members, initial_balance))
}
