// Linkauth — Redis keyed store
//
// One multiplexed connection shared by every call; each command clones the
// handle, which only clones the sender side of the connection.

use std::collections::BTreeMap;

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;

use super::backend::{HashReply, KeyedStore, Pipeline};
use super::StoreError;

pub struct RedisStore {
    conn: MultiplexedConnection,
}

impl RedisStore {
    /// Open a multiplexed connection to the server at `url`.
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let client = redis::Client::open(url)?;
        let conn = client.get_multiplexed_async_connection().await?;
        tracing::info!("Connected to keyed store");
        Ok(Self { conn })
    }
}

#[async_trait]
impl KeyedStore for RedisStore {
    async fn execute(&self, pipeline: Pipeline) -> Result<Vec<HashReply>, StoreError> {
        if pipeline.is_empty() {
            return Ok(Vec::new());
        }

        let mut pipe = redis::pipe();
        pipe.atomic();
        for key in pipeline.keys() {
            pipe.hgetall(key);
        }

        let mut conn = self.conn.clone();
        let raw: Vec<BTreeMap<String, String>> = pipe.query_async(&mut conn).await?;
        Ok(pipeline.finish(raw))
    }

    async fn hset_multiple(&self, key: &str, fields: &[(String, String)]) -> Result<bool, StoreError> {
        let mut conn = self.conn.clone();
        Ok(conn.hset_multiple(key, fields).await?)
    }

    async fn hget(&self, key: &str, field: &str) -> Result<Option<String>, StoreError> {
        let mut conn = self.conn.clone();
        Ok(conn.hget(key, field).await?)
    }

    async fn del(&self, key: &str) -> Result<u64, StoreError> {
        let mut conn = self.conn.clone();
        Ok(conn.del(key).await?)
    }

    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        let mut conn = self.conn.clone();
        Ok(conn.exists(key).await?)
    }

    async fn keys(&self, pattern: &str) -> Result<Vec<String>, StoreError> {
        let mut conn = self.conn.clone();
        Ok(conn.keys(pattern).await?)
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
//
// These run against a live server and are ignored by default:
//   LINKAUTH_TEST_REDIS_URL=redis://127.0.0.1:6379/15 cargo test -- --ignored

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::messenger::mock::MockConnector;
    use crate::messenger::{Messenger, RetryPolicy, Topology};
    use crate::store::{
        cheap_hash, redact_password, CredentialManager, NewUser, PASSWORD_FIELD, SYSTEM_FIELD,
    };

    async fn live_store() -> Option<RedisStore> {
        let url = std::env::var("LINKAUTH_TEST_REDIS_URL").ok()?;
        Some(RedisStore::connect(&url).await.expect("connect to test redis"))
    }

    fn unique_name(prefix: &str) -> String {
        format!("{}-{}", prefix, uuid::Uuid::new_v4().simple())
    }

    #[tokio::test]
    #[ignore = "needs a live Redis at LINKAUTH_TEST_REDIS_URL"]
    async fn test_hash_commands_round_trip() {
        let Some(store) = live_store().await else { return };
        let key = format!("user:{}", unique_name("raw"));

        let fields = vec![
            ("username".to_string(), "raw".to_string()),
            ("password".to_string(), "secret".to_string()),
        ];
        assert!(store.hset_multiple(&key, &fields).await.unwrap());
        assert!(store.exists(&key).await.unwrap());
        assert_eq!(store.hget(&key, "username").await.unwrap().as_deref(), Some("raw"));
        assert_eq!(store.hget(&key, "nope").await.unwrap(), None);

        let mut pipeline = store.pipeline();
        pipeline.set_hgetall_transform(redact_password);
        pipeline.hgetall(key.clone());
        let replies = store.execute(pipeline).await.unwrap();
        assert_eq!(replies.len(), 1);
        assert_eq!(replies[0].get("username"), Some(&Some("raw".to_string())));
        assert_eq!(replies[0].get("password"), Some(&None));

        assert_eq!(store.del(&key).await.unwrap(), 1);
        assert_eq!(store.del(&key).await.unwrap(), 0);
        assert!(!store.exists(&key).await.unwrap());
    }

    #[tokio::test]
    #[ignore = "needs a live Redis at LINKAUTH_TEST_REDIS_URL"]
    async fn test_empty_pipeline_skips_the_server() {
        let Some(store) = live_store().await else { return };
        let replies = store.execute(store.pipeline()).await.unwrap();
        assert!(replies.is_empty());
    }

    #[tokio::test]
    #[ignore = "needs a live Redis at LINKAUTH_TEST_REDIS_URL"]
    async fn test_manager_add_get_list() {
        let Some(store) = live_store().await else { return };
        let messenger = Messenger::open(
            Box::new(MockConnector::new()),
            Topology::default(),
            RetryPolicy::default(),
        )
        .await
        .unwrap();
        let manager = CredentialManager::new(Arc::new(store), messenger);

        let username = unique_name("svc");
        manager
            .add(NewUser::new(username.clone(), cheap_hash("p@ss")).encrypted(true).system(true))
            .await
            .unwrap();

        let view = manager.get(&username).await.unwrap().expect("user was just added");
        assert_eq!(view.username(), Some(username.as_str()));
        assert!(view.system());
        assert_eq!(view.get(PASSWORD_FIELD), None);
        assert_eq!(manager.get_one_field(&username, SYSTEM_FIELD).await.unwrap().as_deref(), Some("True"));

        let listed = manager.list_users().await.unwrap();
        let ours = listed
            .iter()
            .find(|user| user.username() == Some(username.as_str()))
            .expect("listing includes the new user");
        assert_eq!(ours.get(PASSWORD_FIELD), None);

        assert!(manager.authenticate(&username, "p@ss", true).await.unwrap());
        assert_eq!(manager.delete(&username).await.unwrap(), 1);
        assert!(!manager.exists(&username).await.unwrap());
    }
}
