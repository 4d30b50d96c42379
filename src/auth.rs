use std::collections::HashSet;

/// Built-in credential used when `ALLOWED_TOKENS` is not set.
/// Deployments are expected to override it.
pub const DEFAULT_ALLOWED_TOKENS: &str = "aAr#th;}11t.M^1SU8~6)R)71YTh9jsE";

/// Static allow-set of credentials for the send endpoint.
#[derive(Debug, Clone)]
pub struct AllowedTokens {
    tokens: HashSet<String>,
}

impl AllowedTokens {
    /// Parse a comma-separated list. Entries are trimmed and empty entries dropped.
    pub fn from_csv(raw: &str) -> Self {
        let tokens = raw
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect();
        Self { tokens }
    }

    /// Exact, case-sensitive membership. The presented token is not normalized.
    pub fn is_authorized(&self, token: &str) -> bool {
        !token.is_empty() && self.tokens.contains(token)
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

/// Render a token for logs: at most four leading characters and never more
/// than a quarter of the token.
pub fn mask_token(token: &str) -> String {
    let len = token.chars().count();
    let shown = (len / 4).min(4);
    let prefix: String = token.chars().take(shown).collect();
    format!("{prefix}***")
}
