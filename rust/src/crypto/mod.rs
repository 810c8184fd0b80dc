//! Cryptography for the credential record and task fields. Password digests,
//! the installation vault, and the field cipher are kept in separate modules
//! so each has one key and one job.

pub mod fields;
pub mod integrity;
pub mod passwords;
pub mod secrets;
