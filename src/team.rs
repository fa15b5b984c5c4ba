//! Team-member lists stored in a project's `team_assigned` column.
//!
//! The column holds a JSON array of members. Older rows may hold a
//! comma-separated list of names instead. Anything else reads as an empty
//! team: parsing never fails.

use serde::{Deserialize, Serialize};
use tracing::debug;

/// A member assigned to a project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamMember {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
}

impl TeamMember {
    pub fn new(id: impl Into<String>, name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            email: email.into(),
            avatar: None,
        }
    }

    /// Same person: matching id, or matching non-empty email.
    pub fn same_as(&self, other: &TeamMember) -> bool {
        self.id == other.id || (!self.email.is_empty() && self.email == other.email)
    }
}

/// Parse a serialized team list.
pub fn parse_team_members(raw: Option<&str>) -> Vec<TeamMember> {
    let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return Vec::new();
    };

    match serde_json::from_str::<Vec<TeamMember>>(raw) {
        Ok(members) => members,
        Err(err) => {
            if raw.contains(',') && !raw.starts_with('[') && !raw.starts_with('{') {
                return raw
                    .split(',')
                    .map(str::trim)
                    .filter(|name| !name.is_empty())
                    .map(|name| TeamMember::new(name, name, ""))
                    .collect();
            }
            debug!(error = %err, "Ignoring malformed team_assigned payload");
            Vec::new()
        }
    }
}

/// Serialize a team list for the `team_assigned` column. Empty teams become `None`.
pub fn serialize_team_members(members: &[TeamMember]) -> Option<String> {
    if members.is_empty() {
        return None;
    }
    serde_json::to_string(members).ok()
}

/// Whether a raw `team_assigned` value is a well-formed member list.
pub fn is_valid_team_payload(raw: &str) -> bool {
    serde_json::from_str::<Vec<TeamMember>>(raw.trim()).is_ok()
}

/// Avatar initials: first letter of the first two words, uppercased.
pub fn initials(name: &str) -> String {
    name.split_whitespace()
        .filter_map(|word| word.chars().next())
        .flat_map(char::to_uppercase)
        .take(2)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_json_list() {
        let raw = r#"[{"id":"1","name":"John Doe","email":"john@example.com","avatar":null},
                      {"id":"2","name":"Jane Smith","email":"jane@example.com"}]"#;
        let members = parse_team_members(Some(raw));
        assert_eq!(members.len(), 2);
        assert_eq!(members[0].name, "John Doe");
        assert_eq!(members[0].avatar, None);
        assert_eq!(members[1].email, "jane@example.com");
    }

    #[test]
    fn test_malformed_payload_is_empty() {
        assert!(parse_team_members(Some("not json")).is_empty());
        assert!(parse_team_members(Some("{\"id\": 1}")).is_empty());
        assert!(parse_team_members(Some("[{broken")).is_empty());
        assert!(parse_team_members(Some("")).is_empty());
        assert!(parse_team_members(None).is_empty());
    }

    #[test]
    fn test_comma_separated_fallback() {
        let members = parse_team_members(Some("Ada Lovelace, Alan Turing,"));
        assert_eq!(members.len(), 2);
        assert_eq!(members[0].id, "Ada Lovelace");
        assert_eq!(members[1].name, "Alan Turing");
        assert!(members[1].email.is_empty());
    }

    #[test]
    fn test_serialize_empty_team_is_none() {
        assert_eq!(serialize_team_members(&[]), None);

        let raw = serialize_team_members(&[TeamMember::new("1", "Ada", "ada@example.com")])
            .expect("non-empty team serializes");
        assert!(is_valid_team_payload(&raw));
        assert!(!is_valid_team_payload("Ada, Alan"));
    }

    #[test]
    fn test_initials() {
        assert_eq!(initials("John Doe"), "JD");
        assert_eq!(initials("sarah  jane williams"), "SJ");
        assert_eq!(initials("Prince"), "P");
        assert_eq!(initials(""), "");
    }

    #[test]
    fn test_same_member_by_email() {
        let a = TeamMember::new("1", "Ada", "ada@example.com");
        let b = TeamMember::new("99", "A. Lovelace", "ada@example.com");
        let c = TeamMember::new("2", "Alan", "");
        let d = TeamMember::new("3", "Grace", "");
        assert!(a.same_as(&b));
        assert!(!c.same_as(&d));
    }
}
