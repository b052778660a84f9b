/// The authenticated caller of a request.
///
/// The access token is forwarded to the hosted database so row-level security applies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserContext {
    user_id: String,
    access_token: String,
}

impl UserContext {
    pub fn new(user_id: impl Into<String>, access_token: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            access_token: access_token.into(),
        }
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn access_token(&self) -> &str {
        &self.access_token
    }
}
