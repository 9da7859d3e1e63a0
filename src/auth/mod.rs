//! Credentials and sessions: password hashing, JWT issuance and the
//! authenticated-request extractor.

pub mod claims;
pub mod cookies;
pub mod extractors;
pub mod jwt;
pub mod password;
