use std::{collections::BTreeMap, sync::Arc, time::SystemTime};

use futures::future::BoxFuture;
use reqwest::{Client, Method, StatusCode};
use serde::{Serialize, de::DeserializeOwned};
use serde_json::from_value;
use uuid::Uuid;

use crate::dao::{
    battle_store::BattleStore,
    models::{BattleEntity, PlayerEntity, SoundEntity},
    storage::StorageResult,
};

use super::{
    config::CouchConfig,
    error::{CouchDaoError, CouchResult},
    models::{
        AllDocsResponse, BATTLE_PREFIX, CouchDocument, END_SUFFIX, SOUND_PREFIX, battle_doc_id,
        player_doc_id, sound_doc_id,
    },
};

/// Read-modify-write attempts before a contended document update gives up.
const MAX_MODIFY_ATTEMPTS: u32 = 3;

/// [`BattleStore`] backed by a CouchDB database over its HTTP API.
#[derive(Clone)]
pub struct CouchBattleStore {
    client: Client,
    base_url: Arc<str>,
    database: Arc<str>,
    auth: Option<(Arc<str>, Arc<str>)>,
}

impl CouchBattleStore {
    /// Establish a connection to CouchDB and ensure the database exists.
    pub async fn connect(config: CouchConfig) -> CouchResult<Self> {
        let client = Client::builder()
            .build()
            .map_err(|source| CouchDaoError::ClientBuilder { source })?;

        let store = Self {
            client,
            base_url: Arc::<str>::from(config.base_url.trim_end_matches('/')),
            database: Arc::<str>::from(config.database),
            auth: config
                .credentials
                .map(|(u, p)| (Arc::<str>::from(u), Arc::<str>::from(p))),
        };

        store.ensure_database().await?;
        Ok(store)
    }

    fn authorized(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.auth {
            Some((ref user, ref pass)) => builder.basic_auth(user.as_ref(), Some(pass.as_ref())),
            None => builder,
        }
    }

    fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        let url = format!("{}/{}/{}", self.base_url, self.database, path);
        self.authorized(self.client.request(method, url))
    }

    fn database_url(&self) -> String {
        format!("{}/{}", self.base_url, self.database)
    }

    async fn ensure_database(&self) -> CouchResult<()> {
        let database = self.database.to_string();
        let url = self.database_url();

        let response = self
            .authorized(self.client.get(&url))
            .send()
            .await
            .map_err(|source| CouchDaoError::DatabaseQuery {
                database: database.clone(),
                source,
            })?;

        match response.status() {
            StatusCode::OK => Ok(()),
            StatusCode::NOT_FOUND => {
                let create = self
                    .authorized(self.client.put(&url))
                    .send()
                    .await
                    .map_err(|source| CouchDaoError::DatabaseCreate {
                        database: database.clone(),
                        source,
                    })?;
                if create.status().is_success() {
                    Ok(())
                } else {
                    Err(CouchDaoError::DatabaseStatus {
                        database,
                        status: create.status(),
                    })
                }
            }
            other => Err(CouchDaoError::DatabaseStatus {
                database,
                status: other,
            }),
        }
    }

    async fn get_document<T>(&self, doc_id: &str) -> CouchResult<Option<CouchDocument<T>>>
    where
        T: DeserializeOwned,
    {
        let response = self
            .request(Method::GET, doc_id)
            .send()
            .await
            .map_err(|source| CouchDaoError::RequestSend {
                path: doc_id.to_string(),
                source,
            })?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => response
                .json::<CouchDocument<T>>()
                .await
                .map(Some)
                .map_err(|source| CouchDaoError::DecodeResponse {
                    path: doc_id.to_string(),
                    source,
                }),
            other => Err(CouchDaoError::RequestStatus {
                path: doc_id.to_string(),
                status: other,
            }),
        }
    }

    /// PUT a document. A stale or missing `_rev` on an existing document yields
    /// [`CouchDaoError::RevisionConflict`].
    async fn put_document<T>(&self, document: &CouchDocument<T>) -> CouchResult<()>
    where
        T: Serialize,
    {
        let response = self
            .request(Method::PUT, &document.id)
            .json(document)
            .send()
            .await
            .map_err(|source| CouchDaoError::RequestSend {
                path: document.id.clone(),
                source,
            })?;

        match response.status() {
            status if status.is_success() => Ok(()),
            StatusCode::CONFLICT => Err(CouchDaoError::RevisionConflict {
                path: document.id.clone(),
            }),
            other => Err(CouchDaoError::RequestStatus {
                path: document.id.clone(),
                status: other,
            }),
        }
    }

    /// Replace a document regardless of its current revision.
    async fn upsert_document<T>(&self, doc_id: String, body: T) -> CouchResult<()>
    where
        T: Serialize + DeserializeOwned,
    {
        let rev = self
            .get_document::<T>(&doc_id)
            .await?
            .and_then(|existing| existing.rev);
        self.put_document(&CouchDocument::new(doc_id, rev, body)).await
    }

    async fn list_documents<T>(&self, prefix: &str) -> CouchResult<Vec<CouchDocument<T>>>
    where
        T: DeserializeOwned,
    {
        const ALL_DOCS: &str = "_all_docs";
        let query = [
            ("include_docs", "true".to_string()),
            ("startkey", format!("\"{}\"", prefix)),
            ("endkey", format!("\"{}{}\"", prefix, END_SUFFIX)),
        ];

        let response = self
            .request(Method::GET, ALL_DOCS)
            .query(&query)
            .send()
            .await
            .map_err(|source| CouchDaoError::RequestSend {
                path: ALL_DOCS.to_string(),
                source,
            })?;

        if !response.status().is_success() {
            return Err(CouchDaoError::RequestStatus {
                path: ALL_DOCS.to_string(),
                status: response.status(),
            });
        }

        let payload = response.json::<AllDocsResponse>().await.map_err(|source| {
            CouchDaoError::DecodeResponse {
                path: ALL_DOCS.to_string(),
                source,
            }
        })?;

        payload
            .rows
            .into_iter()
            .filter_map(|row| row.doc)
            .map(|doc| {
                from_value(doc).map_err(|source| CouchDaoError::DeserializeValue {
                    path: ALL_DOCS.to_string(),
                    source,
                })
            })
            .collect()
    }

    async fn increment_sound_use(&self, id: Uuid) -> CouchResult<bool> {
        let doc_id = sound_doc_id(id);
        for _ in 0..MAX_MODIFY_ATTEMPTS {
            let Some(mut document) = self.get_document::<SoundEntity>(&doc_id).await? else {
                return Ok(false);
            };
            document.body.use_count += 1;
            match self.put_document(&document).await {
                Ok(()) => return Ok(true),
                Err(CouchDaoError::RevisionConflict { .. }) => continue,
                Err(err) => return Err(err),
            }
        }
        Err(CouchDaoError::Conflict { entity: "sound", id })
    }

    /// Set `last_active_at` and optionally the taste profile against the current `_rev`,
    /// creating the player when absent. Other fields keep their stored values.
    async fn modify_player(
        &self,
        id: Uuid,
        now: SystemTime,
        taste_profile: Option<BTreeMap<String, f64>>,
    ) -> CouchResult<PlayerEntity> {
        let doc_id = player_doc_id(id);
        for _ in 0..MAX_MODIFY_ATTEMPTS {
            let mut document = match self.get_document::<PlayerEntity>(&doc_id).await? {
                Some(document) => document,
                None => CouchDocument::new(
                    doc_id.clone(),
                    None,
                    PlayerEntity {
                        id,
                        taste_profile: BTreeMap::new(),
                        created_at: now,
                        last_active_at: now,
                    },
                ),
            };
            document.body.last_active_at = now;
            if let Some(profile) = &taste_profile {
                document.body.taste_profile = profile.clone();
            }
            match self.put_document(&document).await {
                Ok(()) => return Ok(document.body),
                Err(CouchDaoError::RevisionConflict { .. }) => continue,
                Err(err) => return Err(err),
            }
        }
        Err(CouchDaoError::Conflict { entity: "player", id })
    }

    async fn update_battle_if(&self, battle: BattleEntity, expected_version: u64) -> CouchResult<()> {
        let id = battle.id;
        let doc_id = battle_doc_id(id);
        let Some(existing) = self.get_document::<BattleEntity>(&doc_id).await? else {
            return Err(CouchDaoError::Conflict { entity: "battle", id });
        };
        if existing.body.version != expected_version {
            return Err(CouchDaoError::Conflict { entity: "battle", id });
        }

        // The `_rev` guard catches writers that slipped in after the version check.
        let document = CouchDocument::new(doc_id, existing.rev, battle);
        match self.put_document(&document).await {
            Err(CouchDaoError::RevisionConflict { .. }) => {
                Err(CouchDaoError::Conflict { entity: "battle", id })
            }
            other => other,
        }
    }
}

impl BattleStore for CouchBattleStore {
    fn save_player(&self, player: PlayerEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .upsert_document(player_doc_id(player.id), player)
                .await
                .map_err(Into::into)
        })
    }

    fn find_player(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<PlayerEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let document = store
                .get_document::<PlayerEntity>(&player_doc_id(id))
                .await?;
            Ok(document.map(|doc| doc.body))
        })
    }

    fn touch_player(
        &self,
        id: Uuid,
        now: SystemTime,
    ) -> BoxFuture<'static, StorageResult<PlayerEntity>> {
        let store = self.clone();
        Box::pin(async move { store.modify_player(id, now, None).await.map_err(Into::into) })
    }

    fn set_taste_profile(
        &self,
        id: Uuid,
        taste_profile: BTreeMap<String, f64>,
        now: SystemTime,
    ) -> BoxFuture<'static, StorageResult<PlayerEntity>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .modify_player(id, now, Some(taste_profile))
                .await
                .map_err(Into::into)
        })
    }

    fn save_sound(&self, sound: SoundEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .upsert_document(sound_doc_id(sound.id), sound)
                .await
                .map_err(Into::into)
        })
    }

    fn find_sound(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<SoundEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let document = store.get_document::<SoundEntity>(&sound_doc_id(id)).await?;
            Ok(document.map(|doc| doc.body))
        })
    }

    fn list_sounds(&self) -> BoxFuture<'static, StorageResult<Vec<SoundEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let documents = store.list_documents::<SoundEntity>(SOUND_PREFIX).await?;
            Ok(documents.into_iter().map(|doc| doc.body).collect())
        })
    }

    fn increment_sound_use(&self, id: Uuid) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move { store.increment_sound_use(id).await.map_err(Into::into) })
    }

    fn create_battle(&self, battle: BattleEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let id = battle.id;
            let document = CouchDocument::new(battle_doc_id(id), None, battle);
            match store.put_document(&document).await {
                Err(CouchDaoError::RevisionConflict { .. }) => {
                    Err(CouchDaoError::Conflict { entity: "battle", id }.into())
                }
                other => other.map_err(Into::into),
            }
        })
    }

    fn find_battle(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<BattleEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let document = store
                .get_document::<BattleEntity>(&battle_doc_id(id))
                .await?;
            Ok(document.map(|doc| doc.body))
        })
    }

    fn update_battle_if(
        &self,
        battle: BattleEntity,
        expected_version: u64,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .update_battle_if(battle, expected_version)
                .await
                .map_err(Into::into)
        })
    }

    fn list_battles_since(
        &self,
        since: SystemTime,
    ) -> BoxFuture<'static, StorageResult<Vec<BattleEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let documents = store.list_documents::<BattleEntity>(BATTLE_PREFIX).await?;
            Ok(documents
                .into_iter()
                .map(|doc| doc.body)
                .filter(|battle| battle.created_at >= since)
                .collect())
        })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let url = store.database_url();
            let response = store
                .authorized(store.client.get(&url))
                .send()
                .await
                .map_err(|source| CouchDaoError::RequestSend {
                    path: url.clone(),
                    source,
                })?;

            if response.status().is_success() {
                Ok(())
            } else {
                Err(CouchDaoError::RequestStatus {
                    path: url,
                    status: response.status(),
                }
                .into())
            }
        })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.ensure_database().await.map_err(Into::into) })
    }
}
