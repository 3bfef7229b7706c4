/// Sender identity: a configured outbound mail account owned by a user.
use anyhow::Result;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, Default)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum Provider {
    Gmail,
    Outlook,
    #[default]
    Custom,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Gmail => "gmail",
            Self::Outlook => "outlook",
            Self::Custom => "custom",
        }
    }

    /// Default SMTP endpoint for known providers.
    pub fn default_smtp(&self) -> Option<(&'static str, u16)> {
        match self {
            Self::Gmail => Some(("smtp.gmail.com", 587)),
            Self::Outlook => Some(("smtp.office365.com", 587)),
            Self::Custom => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct SenderIdentity {
    pub id: String,
    pub owner_id: String,
    pub provider: Provider,
    pub email: String,
    #[serde(skip_serializing)]
    pub credentials: String, // base64 "email:secret"
    pub display_name: String,
    pub smtp_host: Option<String>,
    pub smtp_port: Option<u16>,
    pub is_default: bool,
    pub is_active: bool,
    pub daily_limit: i64,
    pub daily_sent: i64,
    pub last_reset_at: i64,
    pub created_at: i64,
    pub updated_at: i64,
}

impl SenderIdentity {
    /// Encode credentials (simple base64, upgrade to a real secret store later).
    pub fn encode_credentials(email: &str, secret: &str) -> String {
        use base64::Engine;
        let creds = format!("{}:{}", email, secret);
        base64::engine::general_purpose::STANDARD.encode(creds.as_bytes())
    }

    pub fn decode_credentials(encoded: &str) -> Result<(String, String)> {
        use base64::Engine;
        let decoded = base64::engine::general_purpose::STANDARD.decode(encoded)?;
        let creds = String::from_utf8(decoded)?;
        let parts: Vec<&str> = creds.splitn(2, ':').collect();
        if parts.len() != 2 {
            anyhow::bail!("Invalid credentials format");
        }
        Ok((parts[0].to_string(), parts[1].to_string()))
    }

    /// The mail-provider secret (app password) for this identity.
    pub fn secret(&self) -> Result<String> {
        let (_, secret) = Self::decode_credentials(&self.credentials)?;
        Ok(secret)
    }

    /// SMTP host/port to dial: explicit override first, then the provider default.
    pub fn smtp_endpoint(&self) -> Result<(String, u16)> {
        if let Some(host) = self.smtp_host.as_deref().filter(|h| !h.is_empty()) {
            return Ok((host.to_string(), self.smtp_port.unwrap_or(587)));
        }
        match self.provider.default_smtp() {
            Some((host, port)) => Ok((host.to_string(), port)),
            None => anyhow::bail!(
                "sender identity {} has no smtp_host configured",
                self.email
            ),
        }
    }

    pub fn remaining_quota(&self) -> i64 {
        (self.daily_limit - self.daily_sent).max(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credentials_roundtrip() {
        let enc = SenderIdentity::encode_credentials("a@b.test", "s3cr:et");
        let (email, secret) = SenderIdentity::decode_credentials(&enc).unwrap();
        assert_eq!(email, "a@b.test");
        assert_eq!(secret, "s3cr:et");
    }

    #[test]
    fn decode_rejects_garbage() {
        assert!(SenderIdentity::decode_credentials("not base64!!").is_err());
    }
}
