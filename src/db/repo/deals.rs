//! Deal operations for the repository.

use crate::domain::{Deal, DealId, DealState, TaxProfile};
use sqlx::Row;
use std::str::FromStr;

use super::{from_json, now_ms, to_json, Repository};

impl Repository {
    /// Insert a new deal.
    ///
    /// # Errors
    /// Returns an error if the insert fails, including on a duplicate id.
    pub async fn insert_deal(&self, deal: &Deal) -> Result<(), sqlx::Error> {
        let now = now_ms();
        let tax_profile = deal.tax_profile.as_ref().map(to_json).transpose()?;
        sqlx::query(
            r#"
            INSERT INTO deals (
                id, state, customer_id, vin, tax_jurisdiction, tax_profile,
                created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(deal.id.as_str())
        .bind(deal.state.as_str())
        .bind(deal.customer_id.as_deref())
        .bind(deal.vin.as_deref())
        .bind(deal.tax_jurisdiction.as_deref())
        .bind(tax_profile)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Fetch a deal by id.
    ///
    /// # Errors
    /// Returns an error if the query fails or a stored column cannot be decoded.
    pub async fn get_deal(&self, id: &DealId) -> Result<Option<Deal>, sqlx::Error> {
        let row = sqlx::query(
            r#"
            SELECT id, state, customer_id, vin, tax_jurisdiction, tax_profile
            FROM deals
            WHERE id = ?
            "#,
        )
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let state_str: String = row.get("state");
        let state = DealState::from_str(&state_str)
            .map_err(|e| sqlx::Error::Decode(e.into()))?;
        let tax_profile: Option<String> = row.get("tax_profile");
        let tax_profile = tax_profile.as_deref().map(from_json).transpose()?;

        Ok(Some(Deal {
            id: DealId::new(row.get::<String, _>("id")),
            state,
            customer_id: row.get("customer_id"),
            vin: row.get("vin"),
            tax_jurisdiction: row.get("tax_jurisdiction"),
            tax_profile,
        }))
    }

    /// Move a deal from `from` to `to`.
    ///
    /// Returns false if no deal has this id or it is no longer in `from`.
    pub async fn update_deal_state(
        &self,
        id: &DealId,
        from: DealState,
        to: DealState,
    ) -> Result<bool, sqlx::Error> {
        let result =
            sqlx::query("UPDATE deals SET state = ?, updated_at = ? WHERE id = ? AND state = ?")
                .bind(to.as_str())
                .bind(now_ms())
                .bind(id.as_str())
                .bind(from.as_str())
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Store the tax profile last computed for a deal.
    pub async fn set_deal_tax_profile(
        &self,
        id: &DealId,
        profile: &TaxProfile,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("UPDATE deals SET tax_profile = ?, updated_at = ? WHERE id = ?")
            .bind(to_json(profile)?)
            .bind(now_ms())
            .bind(id.as_str())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
