//! Command-line front end for `ras-identity-keycloak`.

pub mod cli;
pub mod error;
