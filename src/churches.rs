use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

/// How a church accepts donations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "web/types/")]
#[serde(rename_all = "snake_case")]
pub enum DonationType {
    OneTime,
    Subscription,
    Both,
}

/// Recurring donation billing interval
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "web/types/")]
#[serde(rename_all = "snake_case")]
pub enum DonationFrequency {
    Week,
    Month,
    Year,
}

impl DonationFrequency {
    pub fn as_str(&self) -> &'static str {
        match self {
            DonationFrequency::Week => "week",
            DonationFrequency::Month => "month",
            DonationFrequency::Year => "year",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "week" => Some(DonationFrequency::Week),
            "month" => Some(DonationFrequency::Month),
            "year" => Some(DonationFrequency::Year),
            _ => None,
        }
    }
}

/// Per-church donation settings, stored as JSONB on the churches row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "web/types/")]
#[serde(rename_all = "camelCase", default)]
pub struct DonationConfiguration {
    pub donation_type: DonationType,
    pub allowed_frequencies: Vec<DonationFrequency>,
    pub preset_amounts_cents: Vec<i32>,
    pub allow_custom_amount: bool,
}

impl Default for DonationConfiguration {
    fn default() -> Self {
        Self {
            donation_type: DonationType::Both,
            allowed_frequencies: vec![DonationFrequency::Month],
            preset_amounts_cents: vec![2_500, 5_000, 10_000],
            allow_custom_amount: true,
        }
    }
}

impl DonationConfiguration {
    pub fn allows_one_time(&self) -> bool {
        matches!(self.donation_type, DonationType::OneTime | DonationType::Both)
    }

    pub fn allows_subscription(&self) -> bool {
        matches!(
            self.donation_type,
            DonationType::Subscription | DonationType::Both
        )
    }

    pub fn allows_frequency(&self, frequency: DonationFrequency) -> bool {
        self.allowed_frequencies.contains(&frequency)
    }

    /// An amount is acceptable if it matches a preset or custom amounts are
    /// permitted. Non-positive amounts are never acceptable.
    pub fn allows_amount(&self, amount_cents: i32) -> bool {
        if amount_cents <= 0 {
            return false;
        }
        self.allow_custom_amount || self.preset_amounts_cents.contains(&amount_cents)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.preset_amounts_cents.iter().any(|&a| a <= 0) {
            return Err("Preset amounts must be greater than 0".to_string());
        }
        if self.allows_subscription() && self.allowed_frequencies.is_empty() {
            return Err(
                "At least one frequency is required when subscriptions are enabled".to_string(),
            );
        }
        if !self.allow_custom_amount && self.preset_amounts_cents.is_empty() {
            return Err(
                "Preset amounts are required when custom amounts are disabled".to_string(),
            );
        }
        Ok(())
    }
}

/// API model for churches
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Church {
    pub id: Uuid,
    pub user_id: Uuid,
    pub org_name: String,
    pub org_site: Option<String>,
    pub org_email: Option<String>,
    pub org_phone: Option<String>,
    pub org_address: Option<String>,
    pub org_city: Option<String>,
    pub org_state: Option<String>,
    pub org_zip: Option<String>,
    pub org_country: Option<String>,
    pub org_description: Option<String>,
    pub org_logo: Option<String>,
    pub org_banner: Option<String>,
    pub donation_config: DonationConfiguration,
    pub is_stripe_connected: bool,
    pub stripe_account_id: Option<String>,
    pub stripe_account_status: Option<String>,
    pub stripe_account_type: Option<String>,
    pub stripe_account_capabilities: Option<serde_json::Value>,
    pub stripe_account_requirements: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Diesel model for the churches table
#[derive(Debug, Clone, Queryable, Selectable, Serialize, Deserialize)]
#[diesel(table_name = crate::schema::churches)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct ChurchModel {
    pub id: Uuid,
    pub user_id: Uuid,
    pub org_name: String,
    pub org_site: Option<String>,
    pub org_email: Option<String>,
    pub org_phone: Option<String>,
    pub org_address: Option<String>,
    pub org_city: Option<String>,
    pub org_state: Option<String>,
    pub org_zip: Option<String>,
    pub org_country: Option<String>,
    pub org_description: Option<String>,
    pub org_logo: Option<String>,
    pub org_banner: Option<String>,
    pub donation_config: serde_json::Value,
    pub is_stripe_connected: bool,
    pub stripe_account_id: Option<String>,
    pub stripe_account_status: Option<String>,
    pub stripe_account_type: Option<String>,
    pub stripe_account_capabilities: Option<serde_json::Value>,
    pub stripe_account_requirements: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Insert model for new churches
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = crate::schema::churches)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct NewChurch {
    pub user_id: Uuid,
    pub org_name: String,
    pub org_site: Option<String>,
    pub org_email: Option<String>,
    pub org_phone: Option<String>,
    pub org_address: Option<String>,
    pub org_city: Option<String>,
    pub org_state: Option<String>,
    pub org_zip: Option<String>,
    pub org_country: Option<String>,
    pub org_description: Option<String>,
    pub org_logo: Option<String>,
    pub org_banner: Option<String>,
    pub donation_config: serde_json::Value,
}

/// Changeset for church profile updates; None fields are left untouched
#[derive(Debug, Clone, Default, AsChangeset)]
#[diesel(table_name = crate::schema::churches)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct ChurchChangeset {
    pub org_name: Option<String>,
    pub org_site: Option<String>,
    pub org_email: Option<String>,
    pub org_phone: Option<String>,
    pub org_address: Option<String>,
    pub org_city: Option<String>,
    pub org_state: Option<String>,
    pub org_zip: Option<String>,
    pub org_country: Option<String>,
    pub org_description: Option<String>,
    pub org_logo: Option<String>,
    pub org_banner: Option<String>,
}

impl From<ChurchModel> for Church {
    fn from(model: ChurchModel) -> Self {
        // Unknown or missing JSONB content falls back to the default config
        let donation_config =
            serde_json::from_value(model.donation_config).unwrap_or_default();
        Self {
            id: model.id,
            user_id: model.user_id,
            org_name: model.org_name,
            org_site: model.org_site,
            org_email: model.org_email,
            org_phone: model.org_phone,
            org_address: model.org_address,
            org_city: model.org_city,
            org_state: model.org_state,
            org_zip: model.org_zip,
            org_country: model.org_country,
            org_description: model.org_description,
            org_logo: model.org_logo,
            org_banner: model.org_banner,
            donation_config,
            is_stripe_connected: model.is_stripe_connected,
            stripe_account_id: model.stripe_account_id,
            stripe_account_status: model.stripe_account_status,
            stripe_account_type: model.stripe_account_type,
            stripe_account_capabilities: model.stripe_account_capabilities,
            stripe_account_requirements: model.stripe_account_requirements,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_allows_both_modes() {
        let config = DonationConfiguration::default();
        assert!(config.allows_one_time());
        assert!(config.allows_subscription());
        assert!(config.allows_frequency(DonationFrequency::Month));
        assert!(!config.allows_frequency(DonationFrequency::Week));
    }

    #[test]
    fn amounts_respect_custom_amount_flag() {
        let mut config = DonationConfiguration::default();
        assert!(config.allows_amount(1_234));
        assert!(!config.allows_amount(0));
        assert!(!config.allows_amount(-500));

        config.allow_custom_amount = false;
        assert!(config.allows_amount(2_500));
        assert!(!config.allows_amount(1_234));
    }

    #[test]
    fn validation_rejects_subscription_without_frequencies() {
        let config = DonationConfiguration {
            donation_type: DonationType::Subscription,
            allowed_frequencies: vec![],
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn validation_rejects_nonpositive_presets() {
        let config = DonationConfiguration {
            preset_amounts_cents: vec![1_000, 0],
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn config_round_trips_through_json() {
        let config = DonationConfiguration {
            donation_type: DonationType::OneTime,
            allowed_frequencies: vec![DonationFrequency::Week, DonationFrequency::Year],
            preset_amounts_cents: vec![500],
            allow_custom_amount: false,
        };
        let value = serde_json::to_value(&config).unwrap();
        let parsed: DonationConfiguration = serde_json::from_value(value).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn frequency_parses_known_intervals_only() {
        assert_eq!(DonationFrequency::parse("month"), Some(DonationFrequency::Month));
        assert_eq!(DonationFrequency::parse("day"), None);
        assert_eq!(DonationFrequency::Month.as_str(), "month");
    }
}
