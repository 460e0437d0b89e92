// src/auth/mod.rs
// Session identity, tokens and role-based route gating

mod access;
mod jwt;
mod session;

pub use access::{authorize, Access, Route, HOME_PATH, LOGIN_PATH};
pub use jwt::{decode_claims, is_expired, Claims};
pub use session::{Role, SessionContext, TokenStore, Tokens, UserProfile};
