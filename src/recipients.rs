//! Recipient resolution: who gets told about an alert for a given elder.
//!
//! Two independent sets. Caregivers come from active duty assignments;
//! the single family recipient comes from the billing subscription. The
//! asymmetry is deliberate: family contact is scoped to the subscription
//! relationship, caregiver contact to active assignment.

use std::sync::Arc;

use uuid::Uuid;

use crate::directory::CareDirectory;
use crate::errors::Result;
use crate::model::{Recipient, RecipientRole, ResolvedRecipients, UserRole};

pub struct RecipientResolver {
    directory: Arc<dyn CareDirectory>,
}

impl RecipientResolver {
    pub fn new(directory: Arc<dyn CareDirectory>) -> Self {
        Self { directory }
    }

    /// Resolved fresh on every dispatch; assignments change between alerts.
    pub async fn resolve(&self, elder_id: Uuid) -> Result<ResolvedRecipients> {
        let mut caregivers = Vec::new();
        for assignment in self.directory.find_active_assignments(elder_id).await? {
            // Inactive accounts are excluded outright, not soft-included.
            match self.directory.find_user(assignment.caregiver_id).await? {
                Some(user) if user.active => caregivers.push(Recipient {
                    user_id: user.id,
                    name: user.full_name,
                    email: user.email,
                    role: RecipientRole::Caregiver,
                }),
                _ => {}
            }
        }

        // At most one family recipient, and only when the subscription user
        // really is a family member — the elder's own account linked through
        // the same subscription does not qualify.
        let family = match self.directory.find_subscription_user(elder_id).await? {
            Some(user) if user.role == UserRole::FamilyMember => Some(Recipient {
                user_id: user.id,
                name: user.full_name,
                email: user.email,
                role: RecipientRole::Family,
            }),
            _ => None,
        };

        let resolved = ResolvedRecipients { caregivers, family };
        if let Some(warning) = resolved.warning() {
            tracing::warn!(%elder_id, %warning, "recipient resolution found nobody to notify");
        }
        Ok(resolved)
    }
}
