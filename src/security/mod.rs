//! Input validation for names interpolated into SQL.

pub mod validator;

pub use validator::{IdentifierValidator, trim_statement};
