//! Jurisdiction tax rate operations for the repository.

use crate::domain::{Decimal, TaxMethod, TaxProfile, TaxRules};
use sqlx::Row;
use std::str::FromStr;

use super::Repository;

impl Repository {
    /// Insert or replace the tax profile for a jurisdiction.
    pub async fn upsert_tax_rate(&self, profile: &TaxProfile) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO tax_rates (
                jurisdiction, combined_rate, method,
                trade_in_reduces_base, fees_taxable, rebates_taxable
            ) VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(jurisdiction) DO UPDATE SET
                combined_rate = excluded.combined_rate,
                method = excluded.method,
                trade_in_reduces_base = excluded.trade_in_reduces_base,
                fees_taxable = excluded.fees_taxable,
                rebates_taxable = excluded.rebates_taxable
            "#,
        )
        .bind(profile.jurisdiction.as_str())
        .bind(profile.combined_rate.to_canonical_string())
        .bind(profile.method.as_str())
        .bind(profile.rules.trade_in_reduces_base)
        .bind(profile.rules.fees_taxable)
        .bind(profile.rules.rebates_taxable)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Look up the tax profile for a jurisdiction.
    ///
    /// # Errors
    /// Returns an error if the query fails or a stored rate or method is malformed.
    pub async fn get_tax_rate(&self, jurisdiction: &str) -> Result<Option<TaxProfile>, sqlx::Error> {
        let row = sqlx::query(
            r#"
            SELECT jurisdiction, combined_rate, method,
                   trade_in_reduces_base, fees_taxable, rebates_taxable
            FROM tax_rates
            WHERE jurisdiction = ?
            "#,
        )
        .bind(jurisdiction)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let rate_str: String = row.get("combined_rate");
        let combined_rate =
            Decimal::from_str(&rate_str).map_err(|e| sqlx::Error::Decode(Box::new(e)))?;
        let method_str: String = row.get("method");
        let method = TaxMethod::from_str(&method_str).map_err(|e| sqlx::Error::Decode(e.into()))?;

        Ok(Some(TaxProfile {
            jurisdiction: row.get("jurisdiction"),
            combined_rate,
            method,
            rules: TaxRules {
                trade_in_reduces_base: row.get("trade_in_reduces_base"),
                fees_taxable: row.get("fees_taxable"),
                rebates_taxable: row.get("rebates_taxable"),
            },
        }))
    }
}

#[cfg(test)]
mod tests {
    use crate::db::repo::test_support::repo;
    use crate::domain::{Decimal, TaxMethod, TaxProfile, TaxRules};

    fn profile(rate: &str, method: TaxMethod) -> TaxProfile {
        TaxProfile {
            jurisdiction: "CA-LA".to_string(),
            combined_rate: Decimal::from_str_canonical(rate).unwrap(),
            method,
            rules: TaxRules {
                trade_in_reduces_base: true,
                fees_taxable: false,
                rebates_taxable: true,
            },
        }
    }

    #[tokio::test]
    async fn test_upsert_replaces_existing_rate() {
        let (_dir, repo) = repo().await;
        repo.upsert_tax_rate(&profile("0.095", TaxMethod::OnPayment))
            .await
            .unwrap();
        repo.upsert_tax_rate(&profile("0.1025", TaxMethod::OnCapCost))
            .await
            .unwrap();

        let loaded = repo.get_tax_rate("CA-LA").await.unwrap();
        assert_eq!(loaded, Some(profile("0.1025", TaxMethod::OnCapCost)));
        assert_eq!(repo.get_tax_rate("NV").await.unwrap(), None);
    }
}
