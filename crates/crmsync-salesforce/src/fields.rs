//! Field-set plans for the queried Salesforce objects.

use chrono::{DateTime, Utc};
use crmsync_connector::{FieldSet, FieldSetPlan};

use crate::models::IntegrationType;

pub const CONTACT_OBJECT: &str = "Contact";
pub const CAMPAIGN_OBJECT: &str = "Campaign";
/// Practifi stores campaigns as campaign interactions.
pub const PRACTIFI_CAMPAIGN_OBJECT: &str = "practifi__Campaign_Interaction__c";

const CONTACT_FIELDS: &[&str] = &[
    "Id",
    "FirstName",
    "LastName",
    "Email",
    "Phone",
    "Birthdate",
    "BirthDate__c",
    "MailingStreet",
    "MailingCity",
    "MailingState",
    "MailingPostalCode",
];

const CONTACT_STANDARD_FIELDS: &[&str] = &[
    "Id",
    "FirstName",
    "LastName",
    "Email",
    "Phone",
    "Birthdate",
    "MailingStreet",
    "MailingCity",
    "MailingState",
    "MailingPostalCode",
];

const CONTACT_MINIMAL_FIELDS: &[&str] = &["Id", "FirstName", "LastName", "Email"];

/// Contact query: every field, then without the custom birthdate, then the
/// fields the integration cannot work without.
#[must_use]
pub fn contact_plan(modified_since: Option<DateTime<Utc>>) -> FieldSetPlan {
    FieldSetPlan::new(CONTACT_OBJECT, FieldSet::new("all", CONTACT_FIELDS))
        .with_fallback(FieldSet::new("standard", CONTACT_STANDARD_FIELDS))
        .with_fallback(FieldSet::new("minimal", CONTACT_MINIMAL_FIELDS))
        .modified_since(modified_since)
}

/// Campaign query for the party's integration flavour.
#[must_use]
pub fn campaign_plan(integration_type: IntegrationType) -> FieldSetPlan {
    let resource = match integration_type {
        IntegrationType::Practifi => PRACTIFI_CAMPAIGN_OBJECT,
        _ => CAMPAIGN_OBJECT,
    };
    FieldSetPlan::new(resource, FieldSet::new("campaign", &["Id", "Name"]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contact_plan_order() {
        let plan = contact_plan(None);
        let labels: Vec<&str> = plan.field_sets().iter().map(|f| f.label.as_str()).collect();
        assert_eq!(labels, ["all", "standard", "minimal"]);
        assert!(plan.field_sets()[0].fields.iter().any(|f| f == "BirthDate__c"));
        assert!(!plan.field_sets()[1].fields.iter().any(|f| f == "BirthDate__c"));
    }

    #[test]
    fn test_campaign_plan_resource() {
        assert_eq!(campaign_plan(IntegrationType::Salesforce).resource, "Campaign");
        assert_eq!(
            campaign_plan(IntegrationType::Practifi).resource,
            PRACTIFI_CAMPAIGN_OBJECT
        );
    }
}
