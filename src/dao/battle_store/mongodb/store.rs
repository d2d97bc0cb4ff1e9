use std::{collections::BTreeMap, sync::Arc, time::SystemTime};

use futures::{TryStreamExt, future::BoxFuture};
use mongodb::{
    Client, Collection, Database,
    bson::{Bson, DateTime, Document, doc},
    error::{Error as MongoError, ErrorKind, WriteFailure},
    options::{IndexOptions, ReturnDocument},
};
use tokio::{sync::RwLock, time::sleep};
use tracing::{debug, info};
use uuid::Uuid;

use super::{
    config::MongoConfig,
    error::{MongoDaoError, MongoResult},
    models::{
        MongoBattleDocument, MongoPlayerDocument, MongoSoundDocument, doc_id, version_as_i64,
    },
};
use crate::dao::{
    battle_store::BattleStore,
    models::{BattleEntity, PlayerEntity, SoundEntity},
    storage::StorageResult,
};

const PLAYER_COLLECTION_NAME: &str = "players";
const SOUND_COLLECTION_NAME: &str = "sounds";
const BATTLE_COLLECTION_NAME: &str = "battles";
const DUPLICATE_KEY_CODE: i32 = 11000;

#[derive(Clone)]
pub struct MongoBattleStore {
    inner: Arc<MongoInner>,
}

struct MongoInner {
    state: RwLock<MongoState>,
    config: MongoConfig,
}

struct MongoState {
    #[allow(dead_code)]
    client: Client,
    database: Database,
}

impl MongoInner {
    async fn ping(&self) -> MongoResult<()> {
        let database = {
            let guard = self.state.read().await;
            guard.database.clone()
        };

        database
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|source| MongoDaoError::HealthPing { source })?;
        Ok(())
    }

    async fn reconnect(&self) -> MongoResult<()> {
        let state = MongoState::open(&self.config).await?;
        *self.state.write().await = state;
        Ok(())
    }
}

impl MongoState {
    /// Build a client and ping the database until it answers or the configured
    /// attempts run out, doubling the delay between pings.
    async fn open(config: &MongoConfig) -> MongoResult<Self> {
        let client = Client::with_options(config.options.clone())
            .map_err(|source| MongoDaoError::ClientConstruction { source })?;
        let database = client.database(&config.database_name);

        let mut delay = config.retry.initial_delay;
        let mut attempts = 0;
        while let Err(source) = database.run_command(doc! { "ping": 1 }).await {
            attempts += 1;
            if attempts >= config.retry.max_attempts {
                return Err(MongoDaoError::InitialPing { attempts, source });
            }
            debug!(attempts, delay_ms = delay.as_millis() as u64, "MongoDB not answering yet");
            sleep(delay).await;
            delay = (delay * 2).min(config.retry.max_delay);
        }

        info!(database = %config.database_name, "connected to MongoDB");
        Ok(Self { client, database })
    }
}

impl MongoBattleStore {
    /// Establish a connection to MongoDB and ensure indexes are present.
    pub async fn connect(config: MongoConfig) -> MongoResult<Self> {
        let MongoState { client, database } = MongoState::open(&config).await?;

        let inner = Arc::new(MongoInner {
            state: RwLock::new(MongoState { client, database }),
            config,
        });

        let store = Self { inner };
        store.ensure_indexes().await?;
        Ok(store)
    }

    async fn ensure_indexes(&self) -> MongoResult<()> {
        // Trending scans battles by creation time.
        let collection = self.battles().await;
        let index = mongodb::IndexModel::builder()
            .keys(doc! {"created_at": -1})
            .options(
                IndexOptions::builder()
                    .name(Some("battle_created_at_idx".to_owned()))
                    .build(),
            )
            .build();

        collection
            .create_index(index)
            .await
            .map_err(|source| MongoDaoError::EnsureIndex {
                collection: BATTLE_COLLECTION_NAME,
                index: "created_at",
                source,
            })?;

        Ok(())
    }

    async fn database(&self) -> Database {
        let guard = self.inner.state.read().await;
        guard.database.clone()
    }

    async fn players(&self) -> Collection<MongoPlayerDocument> {
        self.database()
            .await
            .collection::<MongoPlayerDocument>(PLAYER_COLLECTION_NAME)
    }

    async fn sounds(&self) -> Collection<MongoSoundDocument> {
        self.database()
            .await
            .collection::<MongoSoundDocument>(SOUND_COLLECTION_NAME)
    }

    async fn battles(&self) -> Collection<MongoBattleDocument> {
        self.database()
            .await
            .collection::<MongoBattleDocument>(BATTLE_COLLECTION_NAME)
    }

    async fn save_player(&self, player: PlayerEntity) -> MongoResult<()> {
        let id = player.id;
        let document: MongoPlayerDocument = player.into();
        self.players()
            .await
            .replace_one(doc_id(id), &document)
            .upsert(true)
            .await
            .map_err(|source| MongoDaoError::SavePlayer { id, source })?;
        Ok(())
    }

    async fn find_player(&self, id: Uuid) -> MongoResult<Option<PlayerEntity>> {
        let document = self
            .players()
            .await
            .find_one(doc_id(id))
            .await
            .map_err(|source| MongoDaoError::LoadPlayer { id, source })?;
        document.map(TryInto::try_into).transpose()
    }

    /// Apply `update` to the player document, inserting it when absent.
    async fn upsert_player(&self, id: Uuid, update: Document) -> MongoResult<PlayerEntity> {
        let document = self
            .players()
            .await
            .find_one_and_update(doc_id(id), update)
            .upsert(true)
            .return_document(ReturnDocument::After)
            .await
            .map_err(|source| MongoDaoError::SavePlayer { id, source })?
            .ok_or_else(|| MongoDaoError::MalformedDocument {
                id: id.to_string(),
                reason: "upsert returned no player",
            })?;
        document.try_into()
    }

    async fn touch_player(&self, id: Uuid, now: SystemTime) -> MongoResult<PlayerEntity> {
        let now = DateTime::from_system_time(now);
        let update = doc! {
            "$set": {"last_active_at": now},
            "$setOnInsert": {"taste_profile": {}, "created_at": now},
        };
        self.upsert_player(id, update).await
    }

    async fn set_taste_profile(
        &self,
        id: Uuid,
        taste_profile: BTreeMap<String, f64>,
        now: SystemTime,
    ) -> MongoResult<PlayerEntity> {
        let now = DateTime::from_system_time(now);
        let taste_profile: Document = taste_profile
            .into_iter()
            .map(|(genre, weight)| (genre, Bson::Double(weight)))
            .collect();
        let update = doc! {
            "$set": {"taste_profile": taste_profile, "last_active_at": now},
            "$setOnInsert": {"created_at": now},
        };
        self.upsert_player(id, update).await
    }

    async fn save_sound(&self, sound: SoundEntity) -> MongoResult<()> {
        let id = sound.id;
        let document: MongoSoundDocument = sound.into();
        self.sounds()
            .await
            .replace_one(doc_id(id), &document)
            .upsert(true)
            .await
            .map_err(|source| MongoDaoError::SaveSound { id, source })?;
        Ok(())
    }

    async fn find_sound(&self, id: Uuid) -> MongoResult<Option<SoundEntity>> {
        let document = self
            .sounds()
            .await
            .find_one(doc_id(id))
            .await
            .map_err(|source| MongoDaoError::LoadSound { id, source })?;
        document.map(TryInto::try_into).transpose()
    }

    async fn list_sounds(&self) -> MongoResult<Vec<SoundEntity>> {
        let documents: Vec<MongoSoundDocument> = self
            .sounds()
            .await
            .find(doc! {})
            .await
            .map_err(|source| MongoDaoError::ListSounds { source })?
            .try_collect()
            .await
            .map_err(|source| MongoDaoError::ListSounds { source })?;

        documents.into_iter().map(TryInto::try_into).collect()
    }

    async fn increment_sound_use(&self, id: Uuid) -> MongoResult<bool> {
        let result = self
            .sounds()
            .await
            .update_one(doc_id(id), doc! {"$inc": {"use_count": 1_i64}})
            .await
            .map_err(|source| MongoDaoError::SaveSound { id, source })?;
        Ok(result.matched_count > 0)
    }

    async fn create_battle(&self, battle: BattleEntity) -> MongoResult<()> {
        let id = battle.id;
        let document: MongoBattleDocument = battle.into();
        match self.battles().await.insert_one(&document).await {
            Ok(_) => Ok(()),
            Err(err) if is_duplicate_key(&err) => Err(MongoDaoError::BattleConflict { id }),
            Err(source) => Err(MongoDaoError::SaveBattle { id, source }),
        }
    }

    async fn find_battle(&self, id: Uuid) -> MongoResult<Option<BattleEntity>> {
        let document = self
            .battles()
            .await
            .find_one(doc_id(id))
            .await
            .map_err(|source| MongoDaoError::LoadBattle { id, source })?;
        document.map(TryInto::try_into).transpose()
    }

    async fn update_battle_if(&self, battle: BattleEntity, expected_version: u64) -> MongoResult<()> {
        let id = battle.id;
        let document: MongoBattleDocument = battle.into();
        let filter = doc! {
            "_id": id.to_string(),
            "version": version_as_i64(expected_version),
        };

        let result = self
            .battles()
            .await
            .replace_one(filter, &document)
            .await
            .map_err(|source| MongoDaoError::SaveBattle { id, source })?;

        if result.matched_count == 0 {
            return Err(MongoDaoError::BattleConflict { id });
        }
        Ok(())
    }

    async fn list_battles_since(&self, since: SystemTime) -> MongoResult<Vec<BattleEntity>> {
        let filter = doc! {"created_at": {"$gte": DateTime::from_system_time(since)}};
        let documents: Vec<MongoBattleDocument> = self
            .battles()
            .await
            .find(filter)
            .await
            .map_err(|source| MongoDaoError::ListBattles { source })?
            .try_collect()
            .await
            .map_err(|source| MongoDaoError::ListBattles { source })?;

        documents.into_iter().map(TryInto::try_into).collect()
    }
}

fn is_duplicate_key(err: &MongoError) -> bool {
    matches!(
        err.kind.as_ref(),
        ErrorKind::Write(WriteFailure::WriteError(write_error))
            if write_error.code == DUPLICATE_KEY_CODE
    )
}

impl BattleStore for MongoBattleStore {
    fn save_player(&self, player: PlayerEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.save_player(player).await.map_err(Into::into) })
    }

    fn find_player(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<PlayerEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.find_player(id).await.map_err(Into::into) })
    }

    fn touch_player(
        &self,
        id: Uuid,
        now: SystemTime,
    ) -> BoxFuture<'static, StorageResult<PlayerEntity>> {
        let store = self.clone();
        Box::pin(async move { store.touch_player(id, now).await.map_err(Into::into) })
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
                .set_taste_profile(id, taste_profile, now)
                .await
                .map_err(Into::into)
        })
    }

    fn save_sound(&self, sound: SoundEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.save_sound(sound).await.map_err(Into::into) })
    }

    fn find_sound(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<SoundEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.find_sound(id).await.map_err(Into::into) })
    }

    fn list_sounds(&self) -> BoxFuture<'static, StorageResult<Vec<SoundEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.list_sounds().await.map_err(Into::into) })
    }

    fn increment_sound_use(&self, id: Uuid) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move { store.increment_sound_use(id).await.map_err(Into::into) })
    }

    fn create_battle(&self, battle: BattleEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.create_battle(battle).await.map_err(Into::into) })
    }

    fn find_battle(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<BattleEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.find_battle(id).await.map_err(Into::into) })
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
        Box::pin(async move { store.list_battles_since(since).await.map_err(Into::into) })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.ping().await.map_err(Into::into) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.reconnect().await.map_err(Into::into) })
    }
}
