//! HOTP and TOTP one time passwords, and bulk import of them.

mod mechanism;
pub mod migration;
mod parser;

pub use self::{
    mechanism::{OathAlgorithm, OathKind, OathMechanism, OathTokenCode},
    parser::OathRegistrationUri,
};
