use log::debug;

/// Environment variable consulted for a hosting API token by default.
pub const DEFAULT_TOKEN_ENV_VAR: &str = "GITHUB_TOKEN";

/// Read an API token from the environment variable `var`.
///
/// Unset, empty, or non-UTF-8 values all mean anonymous access.
#[must_use]
pub fn github_token(var: &str) -> Option<String> {
    let token = std::env::var(var).ok()?;
    let token = token.trim();
    if token.is_empty() {
        debug!("{var} is set but empty, using anonymous API access");
        return None;
    }
    Some(token.to_string())
}
