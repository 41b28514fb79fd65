pub mod analysis;
pub mod entities;

use crate::database::{CampaignOps, Database};
use crate::error::{AppError, AppResult};

/// Every campaign-scoped handler starts here. Non-owners get exactly
/// the same `NotFound` a nonexistent campaign would (§7).
pub async fn require_owner(db: &Database, campaign_id: &str, user_id: &str) -> AppResult<()> {
    if db.is_owner(campaign_id, user_id).await? {
        Ok(())
    } else {
        Err(AppError::NotFound)
    }
}
