use base64::engine::general_purpose::STANDARD;
use base64::Engine;

/// Header carrying the caller's user uid when the gateway is bypassed.
/// Older backends read the same value from `jwt-sub`.
pub const JWT_SUB_HEADER: &str = "Instill-User-Uid";

/// How requests authenticate against the backend.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum AuthMode {
    #[default]
    Anonymous,
    /// `Authorization: Bearer {token}`, e.g. an access token from the login endpoint.
    Bearer(String),
    /// `Authorization: Basic base64(user:password)`.
    Basic { user: String, password: String },
    /// Trusted user-uid header with the caller's uuid.
    JwtSub(String),
}

impl AuthMode {
    /// Picks a mode from whatever credentials are configured: a token wins over
    /// a jwt subject, which wins over a user/password pair.
    pub fn from_parts(
        token: Option<String>,
        jwt_sub: Option<String>,
        user: Option<String>,
        password: Option<String>,
    ) -> Self {
        if let Some(t) = token.filter(|t| !t.is_empty()) {
            return AuthMode::Bearer(t);
        }
        if let Some(sub) = jwt_sub.filter(|s| !s.is_empty()) {
            return AuthMode::JwtSub(sub);
        }
        match (user, password) {
            (Some(user), Some(password)) if !user.is_empty() => AuthMode::Basic { user, password },
            _ => AuthMode::Anonymous,
        }
    }

    /// Header name/value pairs to attach to every request.
    pub fn headers(&self) -> Vec<(&'static str, String)> {
        match self {
            AuthMode::Anonymous => vec![],
            AuthMode::Bearer(token) => vec![("Authorization", format!("Bearer {token}"))],
            AuthMode::Basic { user, password } => {
                let encoded = STANDARD.encode(format!("{user}:{password}"));
                vec![("Authorization", format!("Basic {encoded}"))]
            }
            AuthMode::JwtSub(sub) => vec![(JWT_SUB_HEADER, sub.clone())],
        }
    }

    pub fn describe(&self) -> &'static str {
        match self {
            AuthMode::Anonymous => "anonymous",
            AuthMode::Bearer(_) => "bearer",
            AuthMode::Basic { .. } => "basic",
            AuthMode::JwtSub(_) => "jwt-sub",
        }
    }
}
