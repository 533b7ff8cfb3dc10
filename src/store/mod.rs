// Linkauth — Store Module
//
// Credential records kept as `user:<username>` hashes in a keyed store.
// Passwords are argon2id hashes, redacted from every read path, and every
// operation is reported to the audit trail.

pub mod backend;
mod error;
mod hashing;
mod manager;
mod models;
mod redis_store;

pub use backend::{HashReply, KeyedStore, Pipeline, ResponseTransform, ResponseTransforms};
pub use error::StoreError;
pub use hashing::{hash_password, verify_password};
#[cfg(test)]
pub(crate) use hashing::cheap_hash;
pub use manager::{CredentialManager, KEY_PREFIX};
pub use models::{
    encode_flag, parse_flag, redact_password, validate_username, CredentialView, NewUser,
    UserChanges, DEFAULT_ENCRYPTED, DEFAULT_SYSTEM, PASSWORD_FIELD, SYSTEM_FIELD, USERNAME_FIELD,
};
pub use redis_store::RedisStore;
