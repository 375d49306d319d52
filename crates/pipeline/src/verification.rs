//! Admin verify/flag/reject, applied atomically with the inventory settlement.

use serde::Serialize;

use kiosk_core::error::CoreError;
use kiosk_core::types::DbId;
use kiosk_core::verification::{plan_admin_action, ActorContext, AdminAction};
use kiosk_db::models::inventory::Inventory;
use kiosk_db::repositories::{InventoryRepo, TransactionRepo};

use crate::error::{PipelineError, PipelineResult};
use crate::status::StatusSnapshot;
use crate::Pipeline;

#[derive(Debug, Clone, Serialize)]
pub struct AdminActionResult {
    pub action: AdminAction,
    pub message: &'static str,
    pub snapshot: StatusSnapshot,
    /// Post-settlement counters when this action checked the unit back in.
    pub inventory: Option<Inventory>,
}

impl Pipeline {
    /// Apply an admin decision. The transaction row is locked for the whole
    /// unit of work; any failure rolls back every write.
    pub async fn apply_admin_action(
        &self,
        transaction_id: DbId,
        action: AdminAction,
        notes: Option<&str>,
        ctx: &ActorContext,
    ) -> PipelineResult<AdminActionResult> {
        let mut tx = self.pool().begin().await?;

        let transaction = TransactionRepo::lock_by_id(&mut tx, transaction_id)
            .await?
            .ok_or_else(|| PipelineError::not_found("transaction", transaction_id))?;

        let decision = plan_admin_action(&transaction.state(), action, notes, ctx)?;

        let inventory = match decision.settlement {
            Some(settlement) => {
                let row = InventoryRepo::settle_return(
                    &mut tx,
                    transaction.equipment_id,
                    settlement.damaged,
                )
                .await?
                .ok_or_else(|| {
                    CoreError::ConcurrencyConflict(format!(
                        "Inventory for equipment {} could not be updated.",
                        transaction.equipment_id
                    ))
                })?;
                Some(row)
            }
            None => None,
        };

        TransactionRepo::apply_admin_decision(&mut tx, transaction_id, &decision)
            .await?
            .ok_or_else(|| {
                CoreError::ConcurrencyConflict(format!(
                    "Transaction {transaction_id} changed during the update."
                ))
            })?;

        tx.commit().await?;

        tracing::info!(
            transaction_id,
            action = action.as_str(),
            actor_id = ctx.actor_id,
            verification_status = decision.verification_status.as_str(),
            inventory_settled = inventory.is_some(),
            "Admin action applied",
        );

        let snapshot = self
            .snapshot(transaction_id)
            .await?
            .ok_or_else(|| PipelineError::not_found("transaction", transaction_id))?;

        Ok(AdminActionResult {
            action,
            message: decision.message,
            snapshot,
            inventory,
        })
    }
}
