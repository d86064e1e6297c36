use serde::{Deserialize, Serialize};
use hotelier_shared::Masked;

/// Caller identity as supplied by the authentication collaborator. Trusted verbatim.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Identity {
    pub user_id: String,
    pub email: Masked<String>,
    pub name: Option<String>,
}

impl Identity {
    pub fn new(user_id: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            email: Masked(email.into()),
            name: None,
        }
    }

    /// Name shown to the payment provider; falls back to the e-mail local part.
    pub fn display_name(&self) -> String {
        if let Some(name) = self.name.as_ref().filter(|n| !n.trim().is_empty()) {
            return name.clone();
        }
        self.email
            .expose()
            .split('@')
            .next()
            .unwrap_or_default()
            .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_name_fallback() {
        let mut identity = Identity::new("user-1", "ayu@example.com");
        assert_eq!(identity.display_name(), "ayu");

        identity.name = Some("Ayu Lestari".to_string());
        assert_eq!(identity.display_name(), "Ayu Lestari");
    }
}
