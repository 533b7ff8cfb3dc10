// Linkauth — Credential Manager
//
// Owns the `user:<username>` hashes in the keyed store and publishes one
// audit event per operation. Store I/O always happens first, then the
// publish; a messenger that has exhausted its retries fails the operation.
//
// Read paths hand out `CredentialView`s built from pipelines whose HGETALL
// replies are redacted inside pipeline execution. Only `authenticate` reads
// the raw hash, and it never returns it.

use std::sync::Arc;

use zeroize::Zeroizing;

use super::backend::{HashReply, KeyedStore};
use super::hashing;
use super::models::{
    encode_flag, redact_password, stored_value, validate_username, CredentialRecord,
    CredentialView, NewUser, UserChanges, PASSWORD_FIELD, SYSTEM_FIELD, USERNAME_FIELD,
};
use super::StoreError;
use crate::messenger::Messenger;

/// Prefix of every credential key.
pub const KEY_PREFIX: &str = "user:";

pub struct CredentialManager {
    store: Arc<dyn KeyedStore>,
    messenger: Messenger,
}

impl CredentialManager {
    pub fn new(store: Arc<dyn KeyedStore>, messenger: Messenger) -> Self {
        Self { store, messenger }
    }

    /// Storage key for a username.
    pub fn key(username: &str) -> String {
        format!("{}{}", KEY_PREFIX, username)
    }

    pub fn messenger(&self) -> &Messenger {
        &self.messenger
    }

    /// Create a user. Fails if the username is invalid or already taken.
    ///
    /// The existence check and the write are separate commands; two
    /// concurrent adds of the same name can both pass the check.
    pub async fn add(&self, user: NewUser) -> Result<String, StoreError> {
        if !validate_username(&user.username) {
            return Err(StoreError::BadUsername(user.username));
        }
        if self.exists(&user.username).await? {
            return Err(StoreError::UserAlreadyExists(user.username));
        }

        let password = if user.encrypted {
            user.password.clone()
        } else {
            hash_off_thread(user.password.clone()).await?
        };

        let mut fields = vec![
            (USERNAME_FIELD.to_string(), user.username.clone()),
            (PASSWORD_FIELD.to_string(), password),
            (SYSTEM_FIELD.to_string(), encode_flag(user.system).to_string()),
        ];
        fields.extend(user.extra.iter().map(|(name, value)| (name.clone(), stored_value(value))));

        self.store.hset_multiple(&Self::key(&user.username), &fields).await?;
        self.messenger.added(&user.username).await?;

        tracing::info!(username = %user.username, system = user.system, "User added");
        Ok(user.username)
    }

    /// Write a subset of fields for a user, returning the store's
    /// acknowledgment. Existence is not checked: changing a missing user
    /// creates a partial record.
    pub async fn modify(&self, changes: UserChanges) -> Result<bool, StoreError> {
        if !validate_username(&changes.username) {
            return Err(StoreError::BadUsername(changes.username));
        }

        let mut fields = Vec::new();
        if let Some(password) = &changes.password {
            let password = if changes.encrypted {
                password.clone()
            } else {
                hash_off_thread(password.clone()).await?
            };
            fields.push((PASSWORD_FIELD.to_string(), password));
        }
        if let Some(system) = changes.system {
            fields.push((SYSTEM_FIELD.to_string(), encode_flag(system).to_string()));
        }
        fields.extend(
            changes
                .extra
                .iter()
                .map(|(name, value)| (name.clone(), stored_value(value))),
        );

        if fields.is_empty() {
            return Err(StoreError::Validation(format!(
                "No fields to change for user {:?}",
                changes.username
            )));
        }

        let ack = self
            .store
            .hset_multiple(&Self::key(&changes.username), &fields)
            .await?;

        let names: Vec<String> = fields.into_iter().map(|(name, _)| name).collect();
        self.messenger.changed(&changes.username, &names).await?;

        tracing::info!(username = %changes.username, fields = ?names, "User changed");
        Ok(ack)
    }

    /// Remove a user unconditionally. Returns the number of records removed.
    pub async fn delete(&self, username: &str) -> Result<u64, StoreError> {
        let removed = self.store.del(&Self::key(username)).await?;
        if removed > 0 {
            self.messenger.removed(username).await?;
            tracing::info!(username = %username, "User removed");
        }
        Ok(removed)
    }

    pub async fn exists(&self, username: &str) -> Result<bool, StoreError> {
        let exists = self.store.exists(&Self::key(username)).await?;
        self.messenger.exists(username, exists).await?;
        Ok(exists)
    }

    /// Like `exists`, but absence is a `UserNotFound` error.
    pub async fn ensure_exists(&self, username: &str) -> Result<(), StoreError> {
        if self.exists(username).await? {
            Ok(())
        } else {
            Err(StoreError::UserNotFound(username.to_string()))
        }
    }

    /// Check a password, optionally requiring a system account.
    ///
    /// When `system` is requested and the stored record is not a system
    /// account, the password is never compared: scope gating comes first.
    pub async fn authenticate(&self, username: &str, password: &str, system: bool) -> Result<bool, StoreError> {
        let record = match self.fetch_record(username).await? {
            Some(record) => record,
            None => {
                self.messenger.failed(username, None).await?;
                tracing::warn!(username = %username, "Authentication failed: no such user");
                return Ok(false);
            }
        };

        let stored_system = record.system();
        if system && stored_system != Some(true) {
            self.messenger.failed(username, stored_system).await?;
            tracing::warn!(username = %username, "Authentication failed: not a system account");
            return Ok(false);
        }

        self.messenger.authorized(username, stored_system).await?;

        let verified = match record.password_hash() {
            Some(hash) => verify_off_thread(password.to_string(), hash.to_string()).await?,
            None => false,
        };
        if !verified {
            tracing::warn!(username = %username, "Authentication failed: password mismatch");
        }
        Ok(verified)
    }

    /// The safe view of one user, or `None` if it does not exist.
    pub async fn get(&self, username: &str) -> Result<Option<CredentialView>, StoreError> {
        let mut pipeline = self.store.pipeline();
        pipeline
            .set_hgetall_transform(redact_password)
            .hgetall(Self::key(username));

        let reply = first_reply(self.store.execute(pipeline).await?);
        self.messenger.viewed(username).await?;
        Ok(CredentialView::from_reply(reply))
    }

    /// A single field of a user. The password field is never readable.
    pub async fn get_one_field(&self, username: &str, field: &str) -> Result<Option<String>, StoreError> {
        if field == PASSWORD_FIELD {
            return Err(StoreError::FieldNotFound(field.to_string()));
        }

        let value = self.store.hget(&Self::key(username), field).await?;
        self.messenger.viewed_field(username, field).await?;
        Ok(value)
    }

    /// Safe views of every user.
    ///
    /// Keys are enumerated first and fetched in a second step, so a user
    /// removed in between is skipped.
    pub async fn list_users(&self) -> Result<Vec<CredentialView>, StoreError> {
        let mut keys = self.store.keys(&format!("{}*", KEY_PREFIX)).await?;
        keys.sort();

        let mut pipeline = self.store.pipeline();
        pipeline.set_hgetall_transform(redact_password);
        for key in keys {
            pipeline.hgetall(key);
        }

        let users: Vec<CredentialView> = self
            .store
            .execute(pipeline)
            .await?
            .into_iter()
            .filter_map(CredentialView::from_reply)
            .collect();

        self.messenger.viewed_listing().await?;
        Ok(users)
    }

    /// Close the broker connection.
    pub async fn shutdown(&self) -> Result<(), StoreError> {
        self.messenger.disconnect().await?;
        Ok(())
    }

    /// The unredacted record, for the password comparison only. No audit event.
    async fn fetch_record(&self, username: &str) -> Result<Option<CredentialRecord>, StoreError> {
        let mut pipeline = self.store.pipeline();
        pipeline.hgetall(Self::key(username));
        let reply = first_reply(self.store.execute(pipeline).await?);
        Ok(CredentialRecord::from_reply(reply))
    }
}

fn first_reply(replies: Vec<HashReply>) -> HashReply {
    replies.into_iter().next().unwrap_or_default()
}

/// Argon2 is CPU-bound; keep it off the async workers.
async fn hash_off_thread(password: String) -> Result<String, StoreError> {
    let password = Zeroizing::new(password);
    tokio::task::spawn_blocking(move || hashing::hash_password(&password))
        .await
        .map_err(|e| StoreError::Hashing(e.to_string()))?
}

async fn verify_off_thread(password: String, hash: String) -> Result<bool, StoreError> {
    let password = Zeroizing::new(password);
    tokio::task::spawn_blocking(move || hashing::verify_password(&password, &hash))
        .await
        .map_err(|e| StoreError::Hashing(e.to_string()))
}

// ─── Tests ───────────────────────────────────────────────────────────────────
