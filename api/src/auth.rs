use crate::database::Database;
use poem::{error::ResponseError, http::StatusCode, FromRequest, Request, RequestBody};
use std::fmt;
use std::sync::Arc;

/// Header carrying the id of a user authenticated by the upstream proxy
pub const USER_ID_HEADER: &str = "X-User-Id";
/// Header carrying the id of a link share authenticated by the upstream proxy
pub const LINK_SHARE_ID_HEADER: &str = "X-Link-Share-Id";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser {
    pub id: i64,
    pub username: String,
    /// IANA timezone from the user's profile, empty if unset
    pub timezone: String,
}

/// Identity derived from a project link share; it can only ever see the
/// project the share belongs to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkShareIdentity {
    pub id: i64,
    pub project_id: i64,
}

/// The acting identity of a request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Principal {
    User(AuthenticatedUser),
    LinkShare(LinkShareIdentity),
}

impl Principal {
    pub fn user(&self) -> Option<&AuthenticatedUser> {
        match self {
            Principal::User(user) => Some(user),
            Principal::LinkShare(_) => None,
        }
    }
}

#[derive(Debug)]
pub enum AuthError {
    MissingHeader(String),
    InvalidFormat(String),
    UnknownIdentity(String),
    InternalError(String),
}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            AuthError::MissingHeader(h) => write!(f, "Missing required header: {}", h),
            AuthError::InvalidFormat(msg) => write!(f, "Invalid format: {}", msg),
            AuthError::UnknownIdentity(msg) => write!(f, "Unknown identity: {}", msg),
            AuthError::InternalError(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for AuthError {}

impl ResponseError for AuthError {
    fn status(&self) -> StatusCode {
        match self {
            AuthError::MissingHeader(_) => StatusCode::UNAUTHORIZED,
            AuthError::InvalidFormat(_) => StatusCode::BAD_REQUEST,
            AuthError::UnknownIdentity(_) => StatusCode::UNAUTHORIZED,
            AuthError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

fn header_id(req: &Request, name: &str) -> Result<Option<i64>, AuthError> {
    req.headers()
        .get(name)
        .map(|v| {
            v.to_str()
                .ok()
                .and_then(|s| s.trim().parse::<i64>().ok())
                .ok_or_else(|| AuthError::InvalidFormat(format!("{} must be an integer", name)))
        })
        .transpose()
}

/// Resolve the principal from the identity headers set by the
/// authentication proxy in front of this service
impl FromRequest<'_> for Principal {
    async fn from_request(req: &Request, _body: &mut RequestBody) -> poem::Result<Self> {
        let database = req
            .data::<Arc<Database>>()
            .ok_or_else(|| AuthError::InternalError("database not configured".to_string()))?;

        if let Some(share_id) = header_id(req, LINK_SHARE_ID_HEADER)? {
            let share = database
                .get_link_share(share_id)
                .await
                .map_err(|e| AuthError::InternalError(e.to_string()))?
                .ok_or_else(|| AuthError::UnknownIdentity(format!("link share {}", share_id)))?;
            return Ok(Principal::LinkShare(share));
        }

        let user_id = header_id(req, USER_ID_HEADER)?
            .ok_or_else(|| AuthError::MissingHeader(USER_ID_HEADER.to_string()))?;
        let user = database
            .get_user(user_id)
            .await
            .map_err(|e| AuthError::InternalError(e.to_string()))?
            .ok_or_else(|| AuthError::UnknownIdentity(format!("user {}", user_id)))?;

        Ok(Principal::User(user))
    }
}
