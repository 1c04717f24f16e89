mod token;

pub use token::Token;

/// How requests to the report service authenticate.
#[derive(Debug, Clone, Default)]
pub enum Credentials {
    #[default]
    Anonymous,
    Bearer(Token),
    Basic { username: String, password: Token },
}

impl Credentials {
    /// A bearer token takes precedence over a username/password pair.
    pub fn resolve(
        token: Option<&str>,
        username: Option<&str>,
        password: Option<&str>,
    ) -> Self {
        match (token, username) {
            (Some(token), _) if !token.is_empty() => Self::Bearer(Token::from(token)),
            (_, Some(username)) if !username.is_empty() => Self::Basic {
                username: username.to_string(),
                password: Token::from(password.unwrap_or_default()),
            },
            _ => Self::Anonymous,
        }
    }

    pub fn apply(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self {
            Self::Anonymous => request,
            Self::Bearer(token) => request.bearer_auth(token.as_str()),
            Self::Basic { username, password } => {
                request.basic_auth(username, Some(password.as_str()))
            }
        }
    }
}
