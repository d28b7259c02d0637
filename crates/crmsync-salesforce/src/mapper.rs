//! Salesforce contact to local contact mapping.

use crate::models::{MappedAddress, MappedContact, SalesforceContact};

const NAME_MAX: usize = 50;
const EMAIL_MAX: usize = 250;
const PHONE_MAX: usize = 20;
const ADDRESS_MAX: usize = 100;
const POSTAL_CODE_MAX: usize = 20;

const US_STATES: &[(&str, &str)] = &[
    ("alabama", "AL"),
    ("alaska", "AK"),
    ("arizona", "AZ"),
    ("arkansas", "AR"),
    ("california", "CA"),
    ("colorado", "CO"),
    ("connecticut", "CT"),
    ("delaware", "DE"),
    ("district of columbia", "DC"),
    ("florida", "FL"),
    ("georgia", "GA"),
    ("hawaii", "HI"),
    ("idaho", "ID"),
    ("illinois", "IL"),
    ("indiana", "IN"),
    ("iowa", "IA"),
    ("kansas", "KS"),
    ("kentucky", "KY"),
    ("louisiana", "LA"),
    ("maine", "ME"),
    ("maryland", "MD"),
    ("massachusetts", "MA"),
    ("michigan", "MI"),
    ("minnesota", "MN"),
    ("mississippi", "MS"),
    ("missouri", "MO"),
    ("montana", "MT"),
    ("nebraska", "NE"),
    ("nevada", "NV"),
    ("new hampshire", "NH"),
    ("new jersey", "NJ"),
    ("new mexico", "NM"),
    ("new york", "NY"),
    ("north carolina", "NC"),
    ("north dakota", "ND"),
    ("ohio", "OH"),
    ("oklahoma", "OK"),
    ("oregon", "OR"),
    ("pennsylvania", "PA"),
    ("rhode island", "RI"),
    ("south carolina", "SC"),
    ("south dakota", "SD"),
    ("tennessee", "TN"),
    ("texas", "TX"),
    ("utah", "UT"),
    ("vermont", "VT"),
    ("virginia", "VA"),
    ("washington", "WA"),
    ("west virginia", "WV"),
    ("wisconsin", "WI"),
    ("wyoming", "WY"),
];

/// Map a Salesforce contact into the local contact model.
#[must_use]
pub fn map_contact(contact: &SalesforceContact) -> MappedContact {
    MappedContact {
        remote_id: contact.id.clone(),
        first_name: truncate(contact.first_name.as_deref(), NAME_MAX),
        last_name: truncate(contact.last_name.as_deref(), NAME_MAX),
        email_address: truncate(contact.email.as_deref(), EMAIL_MAX),
        phone: truncate(contact.phone.as_deref(), PHONE_MAX),
        birth_date: contact.birthdate.or(contact.birth_date_c),
        address: map_address(contact),
    }
}

fn map_address(contact: &SalesforceContact) -> Option<MappedAddress> {
    let parts = [
        &contact.mailing_street,
        &contact.mailing_city,
        &contact.mailing_state,
        &contact.mailing_postal_code,
    ];
    if parts.iter().all(|part| is_blank(part.as_deref())) {
        return None;
    }

    Some(MappedAddress {
        address1: truncate(contact.mailing_street.as_deref(), ADDRESS_MAX),
        address2: String::new(),
        city: truncate(contact.mailing_city.as_deref(), ADDRESS_MAX),
        state: truncate(contact.mailing_state.as_deref(), ADDRESS_MAX)
            .map(|state| state_abbreviation(&state)),
        postal_code: truncate(contact.mailing_postal_code.as_deref(), POSTAL_CODE_MAX),
    })
}

/// Two-letter code for a US state name; anything else is returned as is.
#[must_use]
pub fn state_abbreviation(state: &str) -> String {
    let needle = state.trim().to_lowercase();
    US_STATES
        .iter()
        .find(|(name, _)| *name == needle)
        .map_or_else(|| state.to_string(), |(_, code)| (*code).to_string())
}

/// Cut `value` to at most `max` characters.
fn truncate(value: Option<&str>, max: usize) -> Option<String> {
    value.map(|v| v.chars().take(max).collect())
}

fn is_blank(value: Option<&str>) -> bool {
    value.map_or(true, |v| v.trim().is_empty())
}
