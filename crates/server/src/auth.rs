use pairchat_shared::validation::{identity_eq, normalize_user_key, validate_identity};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub display_name: String,
    pub user_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("Name and ID are required")]
    MissingCredentials,
    #[error("Invalid credentials. Only authorized users can access this chat.")]
    Rejected,
}

/// Fixed allow-list of `(name, secret)` pairs. Matching is trimmed and
/// case-insensitive on both fields. An empty list admits any well-formed
/// identity.
#[derive(Debug, Clone, Default)]
pub struct AllowList {
    entries: Vec<(String, String)>,
}

impl AllowList {
    pub fn new(entries: Vec<(String, String)>) -> Self {
        Self { entries }
    }

    pub fn is_open(&self) -> bool {
        self.entries.is_empty()
    }

    /// Checks a name/secret pair. The resulting user id is the normalized
    /// name, never the secret.
    pub fn authenticate(&self, name: &str, secret: &str) -> Result<Identity, AuthError> {
        let user_id = normalize_user_key(name);
        validate_identity(name, &user_id).map_err(|_| AuthError::MissingCredentials)?;

        let identity = Identity {
            display_name: name.trim().to_string(),
            user_id,
        };

        if self.is_open() {
            return Ok(identity);
        }
        if secret.trim().is_empty() {
            return Err(AuthError::MissingCredentials);
        }

        self.entries
            .iter()
            .find(|(n, s)| identity_eq(n, name) && identity_eq(s, secret))
            .map(|_| identity)
            .ok_or(AuthError::Rejected)
    }

    /// Admission for a socket `join`. An open list takes the claimed
    /// identity as-is; a closed one requires the secret.
    pub fn admit(
        &self,
        display_name: &str,
        user_id: &str,
        secret: Option<&str>,
    ) -> Result<Identity, AuthError> {
        if !self.is_open() {
            return self.authenticate(display_name, secret.unwrap_or(""));
        }
        validate_identity(display_name, user_id).map_err(|_| AuthError::MissingCredentials)?;
        Ok(Identity {
            display_name: display_name.trim().to_string(),
            user_id: user_id.trim().to_string(),
        })
    }
}
