//! Field-level audit trail entries.

use crate::domain::{FieldName, FieldValue, TimeMs, UserId};
use serde::{Deserialize, Serialize};

/// One changed field in one save.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditLogEntry {
    pub field_name: FieldName,
    pub old_value: FieldValue,
    pub new_value: FieldValue,
    pub acting_user_id: UserId,
    pub timestamp: TimeMs,
}

impl AuditLogEntry {
    /// Build an entry, or `None` when the value did not actually change.
    pub fn diff(
        field_name: FieldName,
        old_value: FieldValue,
        new_value: FieldValue,
        acting_user_id: &UserId,
        timestamp: TimeMs,
    ) -> Option<Self> {
        if old_value == new_value {
            return None;
        }
        Some(Self {
            field_name,
            old_value,
            new_value,
            acting_user_id: acting_user_id.clone(),
            timestamp,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Decimal;
    use std::str::FromStr;

    #[test]
    fn test_diff_skips_unchanged_values() {
        let user = UserId::new("u1");
        let value = FieldValue::Amount(Decimal::from_str("100").unwrap());
        assert!(AuditLogEntry::diff(
            FieldName::TotalFees,
            value.clone(),
            value,
            &user,
            TimeMs::new(1)
        )
        .is_none());
    }

    #[test]
    fn test_entry_wire_format() {
        let entry = AuditLogEntry::diff(
            FieldName::TermMonths,
            FieldValue::Months(60),
            FieldValue::Months(72),
            &UserId::new("u1"),
            TimeMs::new(1_700_000_000_000),
        )
        .unwrap();
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["fieldName"], "termMonths");
        assert_eq!(json["oldValue"], serde_json::json!({"kind": "months", "value": 60}));
        assert_eq!(json["actingUserId"], "u1");
        assert_eq!(json["timestamp"], 1_700_000_000_000i64);
    }
}
