//! Scenario and audit log operations for the repository.

use crate::domain::{
    AuditLogEntry, DealId, FieldName, SaveId, Scenario, ScenarioId, TimeMs, UserId,
};
use sqlx::Row;

use super::{from_json, now_ms, to_json, Repository};

impl Repository {
    /// Insert a new scenario.
    ///
    /// # Errors
    /// Returns an error if the insert fails or the parent deal does not exist.
    pub async fn insert_scenario(&self, scenario: &Scenario) -> Result<(), sqlx::Error> {
        let now = now_ms();
        sqlx::query(
            r#"
            INSERT INTO scenarios (id, deal_id, scenario_type, body, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(scenario.id.as_str())
        .bind(scenario.deal_id.as_str())
        .bind(scenario.scenario_type().as_str())
        .bind(to_json(scenario)?)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get_scenario(&self, id: &ScenarioId) -> Result<Option<Scenario>, sqlx::Error> {
        let row = sqlx::query("SELECT body FROM scenarios WHERE id = ?")
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await?;

        row.map(|row| from_json(&row.get::<String, _>("body")))
            .transpose()
    }

    pub async fn list_scenarios(&self, deal_id: &DealId) -> Result<Vec<Scenario>, sqlx::Error> {
        let rows = sqlx::query("SELECT body FROM scenarios WHERE deal_id = ? ORDER BY created_at, id")
            .bind(deal_id.as_str())
            .fetch_all(&self.pool)
            .await?;

        rows.iter()
            .map(|row| from_json(&row.get::<String, _>("body")))
            .collect()
    }

    /// Whether a save with this id has already been applied.
    pub async fn is_save_applied(&self, save_id: &SaveId) -> Result<bool, sqlx::Error> {
        let row = sqlx::query("SELECT 1 FROM applied_saves WHERE save_id = ?")
            .bind(save_id.as_str())
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }

    /// Overwrite a scenario body and append its audit entries atomically.
    ///
    /// With a `save_id`, a replay of an already applied save writes nothing and
    /// returns false.
    ///
    /// # Errors
    /// Returns an error if the transaction fails; nothing is written in that case.
    pub async fn save_scenario_with_audit(
        &self,
        scenario: &Scenario,
        change_log: &[AuditLogEntry],
        save_id: Option<&SaveId>,
    ) -> Result<bool, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        if let Some(save_id) = save_id {
            let claimed = sqlx::query(
                "INSERT OR IGNORE INTO applied_saves (save_id, scenario_id, applied_at) VALUES (?, ?, ?)",
            )
            .bind(save_id.as_str())
            .bind(scenario.id.as_str())
            .bind(now_ms())
            .execute(&mut *tx)
            .await?;
            if claimed.rows_affected() == 0 {
                return Ok(false);
            }
        }

        let result = sqlx::query("UPDATE scenarios SET body = ?, updated_at = ? WHERE id = ?")
            .bind(to_json(scenario)?)
            .bind(now_ms())
            .bind(scenario.id.as_str())
            .execute(&mut *tx)
            .await?;
        if result.rows_affected() == 0 {
            return Err(sqlx::Error::RowNotFound);
        }

        for entry in change_log {
            sqlx::query(
                r#"
                INSERT INTO scenario_audit_log (
                    deal_id, scenario_id, field_name, old_value, new_value,
                    acting_user_id, timestamp_ms
                ) VALUES (?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(scenario.deal_id.as_str())
            .bind(scenario.id.as_str())
            .bind(entry.field_name.as_str())
            .bind(to_json(&entry.old_value)?)
            .bind(to_json(&entry.new_value)?)
            .bind(entry.acting_user_id.as_str())
            .bind(entry.timestamp.as_ms())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(true)
    }

    /// Audit entries for a scenario, oldest first.
    pub async fn query_audit_log(
        &self,
        scenario_id: &ScenarioId,
    ) -> Result<Vec<AuditLogEntry>, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            SELECT field_name, old_value, new_value, acting_user_id, timestamp_ms
            FROM scenario_audit_log
            WHERE scenario_id = ?
            ORDER BY id ASC
            "#,
        )
        .bind(scenario_id.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                let field_name: String = row.get("field_name");
                let field_name: FieldName =
                    serde_json::from_value(serde_json::Value::String(field_name))
                        .map_err(|e| sqlx::Error::Decode(Box::new(e)))?;
                Ok(AuditLogEntry {
                    field_name,
                    old_value: from_json(&row.get::<String, _>("old_value"))?,
                    new_value: from_json(&row.get::<String, _>("new_value"))?,
                    acting_user_id: UserId::new(row.get::<String, _>("acting_user_id")),
                    timestamp: TimeMs::new(row.get("timestamp_ms")),
                })
            })
            .collect()
    }
}
