use chrono::{DateTime, Months, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============================================================================
// Warranty Value Objects
// ============================================================================

/// Warranty package as configured in the catalog, snapshotted onto order lines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WarrantyPackage {
    pub id: Uuid,
    pub name: String,
    pub duration_months: u32,
}

/// Longest coverage a catalog package may offer.
pub const MAX_WARRANTY_MONTHS: u32 = 120;

impl WarrantyPackage {
    pub fn has_valid_duration(&self) -> bool {
        (1..=MAX_WARRANTY_MONTHS).contains(&self.duration_months)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WarrantyStatus {
    Active,
}

/// Coverage interval `[starts_at, ends_at)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WarrantyWindow {
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("Warranty of {months} months starting at {start} is out of the representable range")]
pub struct WarrantyRangeError {
    pub start: DateTime<Utc>,
    pub months: u32,
}

impl WarrantyWindow {
    /// Calendar-month arithmetic: Jan 31 + 1 month is the last day of February.
    pub fn starting_at(start: DateTime<Utc>, duration_months: u32) -> Result<Self, WarrantyRangeError> {
        let ends_at = start
            .checked_add_months(Months::new(duration_months))
            .ok_or(WarrantyRangeError { start, months: duration_months })?;

        Ok(Self { starts_at: start, ends_at })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_window_uses_calendar_months() {
        let start = Utc.with_ymd_and_hms(2024, 3, 15, 9, 30, 0).unwrap();
        let window = WarrantyWindow::starting_at(start, 12).unwrap();

        assert_eq!(window.ends_at, Utc.with_ymd_and_hms(2025, 3, 15, 9, 30, 0).unwrap());
    }

    #[test]
    fn test_month_end_is_clamped() {
        let start = Utc.with_ymd_and_hms(2024, 1, 31, 0, 0, 0).unwrap();
        let window = WarrantyWindow::starting_at(start, 1).unwrap();

        // 2024 is a leap year
        assert_eq!(window.ends_at, Utc.with_ymd_and_hms(2024, 2, 29, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_longest_package_fits_any_start() {
        let package = WarrantyPackage {
            id: Uuid::new_v4(),
            name: "Ten years".to_string(),
            duration_months: MAX_WARRANTY_MONTHS,
        };
        assert!(package.has_valid_duration());
        assert!(WarrantyWindow::starting_at(Utc::now(), package.duration_months).is_ok());

        assert!(!WarrantyPackage { duration_months: 0, ..package.clone() }.has_valid_duration());
        assert!(!WarrantyPackage { duration_months: u32::MAX, ..package }.has_valid_duration());
    }
}
