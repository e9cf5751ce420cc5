//! Identity scoping for cached and remote data.

/// The identity whose saved items the engine is currently managing.
///
/// All local cache keys and remote paths derive from this value, so two
/// identities can never observe each other's entries.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub enum Identity {
    /// No authenticated user; the single anonymous scope
    #[default]
    Anonymous,
    /// An authenticated user, by provider-assigned id
    User(String),
}

impl Identity {
    /// Create an authenticated identity.
    pub fn user(id: impl Into<String>) -> Self {
        Self::User(id.into())
    }

    /// True for the anonymous scope.
    #[must_use]
    pub fn is_anonymous(&self) -> bool {
        matches!(self, Self::Anonymous)
    }

    /// The user id, if authenticated.
    #[must_use]
    pub fn id(&self) -> Option<&str> {
        match self {
            Self::Anonymous => None,
            Self::User(id) => Some(id),
        }
    }

    /// Derive the cache namespace for this identity.
    ///
    /// The anonymous scope uses the base key as-is; authenticated identities
    /// get `{base}_{id}`. This is a pure function of the identity, which is
    /// what keeps namespaces from ever crossing between users.
    #[must_use]
    pub fn namespace(&self, base: &str) -> String {
        match self {
            Self::Anonymous => base.to_string(),
            Self::User(id) => format!("{base}_{id}"),
        }
    }
}

impl std::fmt::Display for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Anonymous => write!(f, "anonymous"),
            Self::User(id) => write!(f, "user:{id}"),
        }
    }
}
