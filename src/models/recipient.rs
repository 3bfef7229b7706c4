use serde::{Deserialize, Serialize};

/// The nine canonical recipient field keys. The set is closed: templates can
/// only reference these names.
pub const FIELD_KEYS: [&str; 9] = [
    "xxx", "yyy", "mail", "ttt", "zzz", "www", "uuu", "vvv", "rrr",
];

/// Fixed-width record of per-recipient values used for personalization.
/// The columns are generically named in imported sheets: identifier, name,
/// email, role, code, address, phone, company, note.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct RecipientFields {
    pub xxx: Option<String>,
    pub yyy: Option<String>,
    pub mail: Option<String>,
    pub ttt: Option<String>,
    pub zzz: Option<String>,
    pub www: Option<String>,
    pub uuu: Option<String>,
    pub vvv: Option<String>,
    pub rrr: Option<String>,
}

impl RecipientFields {
    pub fn get(&self, key: &str) -> Option<&str> {
        match key {
            "xxx" => self.xxx.as_deref(),
            "yyy" => self.yyy.as_deref(),
            "mail" => self.mail.as_deref(),
            "ttt" => self.ttt.as_deref(),
            "zzz" => self.zzz.as_deref(),
            "www" => self.www.as_deref(),
            "uuu" => self.uuu.as_deref(),
            "vvv" => self.vvv.as_deref(),
            "rrr" => self.rrr.as_deref(),
            _ => None,
        }
    }

    /// Destination address for this recipient. Imported sheets sometimes put
    /// the address in the name column, so fall back from `mail` to `yyy`.
    /// Compatibility shim, not a contract.
    pub fn address(&self) -> Option<&str> {
        self.mail
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .or_else(|| self.yyy.as_deref().filter(|s| !s.trim().is_empty()))
    }
}

/// A stored recipient row, owned by a user.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Recipient {
    pub id: String,
    pub owner_id: String,
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub fields: RecipientFields,
    pub created_at: i64,
}
