//! redb implementation of [`ZooStore`].

use super::{ActiveSession, Session, StoreStats, TaskFilter};
use crate::cache::LruCache;
use crate::model::{Animal, Habitat, Task, TaskStatus, Treatment, User};
use crate::password::{burn_verification, hash_password, verify_password};
use crate::primitives::{SESSION_CACHE_SIZE, SESSION_TOKEN_BYTES};
use crate::validation::{
    AnimalInput, HabitatInput, NewUser, TaskInput, TreatmentInput, UserUpdate,
};
use crate::{
    AnimalId, HabitatId, Result, TaskId, Timestamp, TreatmentId, UserId, ZooError,
};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::RngCore;
use redb::{
    Database, Key, ReadableDatabase, ReadableTable, ReadableTableMetadata, Table, TableDefinition, Value,
    WriteTransaction,
};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

// =============================================================================
// TABLES
// =============================================================================

type RowTable = TableDefinition<'static, u64, &'static [u8]>;

const USERS: RowTable = TableDefinition::new("users");
const ANIMALS: RowTable = TableDefinition::new("animals");
const HABITATS: RowTable = TableDefinition::new("habitats");
const TREATMENTS: RowTable = TableDefinition::new("treatments");
const TASKS: RowTable = TableDefinition::new("tasks");

/// Lowercase email -> user id.
const USER_EMAILS: TableDefinition<&str, u64> = TableDefinition::new("user_emails");
/// Habitat number -> habitat id.
const HABITAT_NUMBERS: TableDefinition<u32, u64> = TableDefinition::new("habitat_numbers");
/// Token -> session row.
const SESSIONS: TableDefinition<&str, &[u8]> = TableDefinition::new("sessions");
/// Table name -> last allocated id.
const COUNTERS: TableDefinition<&str, u64> = TableDefinition::new("counters");

// =============================================================================
// ROW HELPERS
// =============================================================================

fn read_row<T, Tbl>(table: &Tbl, id: u64) -> Result<Option<T>>
where
    T: DeserializeOwned,
    Tbl: ReadableTable<u64, &'static [u8]>,
{
    match table.get(id)? {
        Some(bytes) => Ok(Some(postcard::from_bytes(bytes.value())?)),
        None => Ok(None),
    }
}

fn require_row<T, Tbl>(table: &Tbl, id: u64, entity: &'static str) -> Result<T>
where
    T: DeserializeOwned,
    Tbl: ReadableTable<u64, &'static [u8]>,
{
    read_row(table, id)?.ok_or(ZooError::NotFound { entity, id })
}

fn read_rows<T, Tbl>(table: &Tbl) -> Result<Vec<T>>
where
    T: DeserializeOwned,
    Tbl: ReadableTable<u64, &'static [u8]>,
{
    let mut rows = Vec::new();
    for entry in table.iter()? {
        let (_, bytes) = entry?;
        rows.push(postcard::from_bytes(bytes.value())?);
    }
    Ok(rows)
}

fn write_row<T: Serialize>(
    table: &mut Table<'_, u64, &'static [u8]>,
    id: u64,
    row: &T,
) -> Result<()> {
    let bytes = postcard::to_allocvec(row)?;
    table.insert(id, bytes.as_slice())?;
    Ok(())
}

fn next_id(txn: &WriteTransaction, counter: &str) -> Result<u64> {
    let mut counters = txn.open_table(COUNTERS)?;
    let last = counters.get(counter)?.map_or(0, |v| v.value());
    let next = last.saturating_add(1);
    counters.insert(counter, next)?;
    Ok(next)
}

fn ensure_exists(
    txn: &WriteTransaction,
    table: RowTable,
    id: u64,
    entity: &'static str,
) -> Result<()> {
    let table = txn.open_table(table)?;
    if table.get(id)?.is_none() {
        return Err(ZooError::NotFound { entity, id });
    }
    Ok(())
}

fn reset_table<K: Key + 'static, V: Value + 'static>(
    txn: &WriteTransaction,
    table: TableDefinition<'static, K, V>,
) -> Result<()> {
    txn.delete_table(table)?;
    txn.open_table(table)?;
    Ok(())
}

fn new_token() -> String {
    let mut bytes = [0u8; SESSION_TOKEN_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

// =============================================================================
// STORE
// =============================================================================

/// Zoo records in a redb file, with an in-memory session cache.
pub struct ZooStore {
    db: Database,
    sessions: Mutex<LruCache<String, ActiveSession>>,
}

impl std::fmt::Debug for ZooStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ZooStore").finish_non_exhaustive()
    }
}

impl ZooStore {
    /// Open the database at `path`, creating the file and tables if needed.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let db = Database::create(path.as_ref())?;

        let txn = db.begin_write()?;
        txn.open_table(USERS)?;
        txn.open_table(ANIMALS)?;
        txn.open_table(HABITATS)?;
        txn.open_table(TREATMENTS)?;
        txn.open_table(TASKS)?;
        txn.open_table(USER_EMAILS)?;
        txn.open_table(HABITAT_NUMBERS)?;
        txn.open_table(SESSIONS)?;
        txn.open_table(COUNTERS)?;
        txn.commit()?;

        Ok(Self {
            db,
            sessions: Mutex::new(LruCache::new(SESSION_CACHE_SIZE)),
        })
    }

    /// Lock order: this guard first, then any redb write transaction.
    fn cache(&self) -> MutexGuard<'_, LruCache<String, ActiveSession>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn read_all<T: DeserializeOwned>(&self, table: RowTable) -> Result<Vec<T>> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(table)?;
        read_rows(&table)
    }

    fn read_one<T: DeserializeOwned>(
        &self,
        table: RowTable,
        id: u64,
        entity: &'static str,
    ) -> Result<T> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(table)?;
        require_row(&table, id, entity)
    }

    // -------------------------------------------------------------------------
    // Users
    // -------------------------------------------------------------------------

    /// Create an account. The email must not be taken.
    pub fn create_user(&self, input: &NewUser, now: Timestamp) -> Result<User> {
        self.insert_user(input, hash_password(&input.password)?, now)
    }

    /// Create an account with an already-hashed password.
    pub fn insert_user(&self, input: &NewUser, password_hash: String, now: Timestamp) -> Result<User> {
        let txn = self.db.begin_write()?;
        let email = input.email.trim().to_lowercase();
        {
            let emails = txn.open_table(USER_EMAILS)?;
            if emails.get(email.as_str())?.is_some() {
                return Err(email_conflict());
            }
        }
        let id = next_id(&txn, "users")?;
        let user = User {
            id: UserId(id),
            name: input.name.clone(),
            email,
            password_hash,
            role: input.role,
            created_at: now,
            updated_at: now,
        };
        {
            let mut users = txn.open_table(USERS)?;
            write_row(&mut users, id, &user)?;
            let mut emails = txn.open_table(USER_EMAILS)?;
            emails.insert(user.email.as_str(), id)?;
        }
        txn.commit()?;
        Ok(user)
    }

    /// Edit an account. Live sessions of the user pick up the change.
    pub fn update_user(&self, id: UserId, input: &UserUpdate, now: Timestamp) -> Result<User> {
        let password_hash = input.password.as_deref().map(hash_password).transpose()?;
        let mut cache = self.cache();
        let txn = self.db.begin_write()?;
        let user = {
            let mut users = txn.open_table(USERS)?;
            let mut user: User = require_row(&users, id.0, "user")?;
            let email = input.email.trim().to_lowercase();

            let mut emails = txn.open_table(USER_EMAILS)?;
            let owner = emails.get(email.as_str())?.map(|v| v.value());
            match owner {
                Some(other) if other != id.0 => return Err(email_conflict()),
                Some(_) => {}
                None => {
                    emails.remove(user.email.as_str())?;
                    emails.insert(email.as_str(), id.0)?;
                }
            }

            user.name = input.name.clone();
            user.email = email;
            user.role = input.role;
            if let Some(hash) = password_hash {
                user.password_hash = hash;
            }
            user.updated_at = now;
            write_row(&mut users, id.0, &user)?;
            user
        };
        txn.commit()?;
        cache.remove_where(|active| active.user.id == id);
        Ok(user)
    }

    pub fn get_user(&self, id: UserId) -> Result<User> {
        self.read_one(USERS, id.0, "user")
    }

    /// Look up an account by email (case-insensitive).
    pub fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let email = email.trim().to_lowercase();
        let txn = self.db.begin_read()?;
        let emails = txn.open_table(USER_EMAILS)?;
        let Some(id) = emails.get(email.as_str())?.map(|v| v.value()) else {
            return Ok(None);
        };
        let users = txn.open_table(USERS)?;
        read_row(&users, id)
    }

    /// The account for these credentials, if they match.
    ///
    /// Unknown emails still pay for one hash verification.
    pub fn authenticate(&self, email: &str, password: &str) -> Result<Option<User>> {
        let Some(user) = self.find_user_by_email(email)? else {
            burn_verification(password);
            return Ok(None);
        };
        Ok(verify_password(password, &user.password_hash).then_some(user))
    }

    /// All accounts, oldest first.
    pub fn list_users(&self) -> Result<Vec<User>> {
        self.read_all(USERS)
    }

    pub fn count_users(&self) -> Result<u64> {
        let txn = self.db.begin_read()?;
        Ok(txn.open_table(USERS)?.len()?)
    }

    // -------------------------------------------------------------------------
    // Animals
    // -------------------------------------------------------------------------

    /// Register an animal. Arrival is recorded as `now`.
    pub fn create_animal(&self, input: &AnimalInput, now: Timestamp) -> Result<Animal> {
        self.insert_animal(Animal {
            id: AnimalId(0),
            name: input.name.clone(),
            species: input.species.clone(),
            common_name: input.common_name.clone(),
            age: input.age,
            sex: input.sex,
            weight: input.weight,
            image_url: input.image_url.clone(),
            health_status: input.health_status,
            habitat_id: input.habitat_id,
            arrival_date: now,
            created_at: now,
            updated_at: now,
        })
    }

    /// Store a fully-formed animal under a fresh id. Used by seeding to
    /// write historical arrival dates.
    pub fn insert_animal(&self, mut animal: Animal) -> Result<Animal> {
        let txn = self.db.begin_write()?;
        if let Some(habitat) = animal.habitat_id {
            ensure_exists(&txn, HABITATS, habitat.0, "habitat")?;
        }
        animal.id = AnimalId(next_id(&txn, "animals")?);
        {
            let mut animals = txn.open_table(ANIMALS)?;
            ensure_unique_animal(&animals, &animal.name, &animal.species, None)?;
            write_row(&mut animals, animal.id.0, &animal)?;
        }
        txn.commit()?;
        Ok(animal)
    }

    /// Replace an animal's editable fields.
    pub fn update_animal(&self, id: AnimalId, input: &AnimalInput, now: Timestamp) -> Result<Animal> {
        let txn = self.db.begin_write()?;
        if let Some(habitat) = input.habitat_id {
            ensure_exists(&txn, HABITATS, habitat.0, "habitat")?;
        }
        let animal = {
            let mut animals = txn.open_table(ANIMALS)?;
            let mut animal: Animal = require_row(&animals, id.0, "animal")?;
            ensure_unique_animal(&animals, &input.name, &input.species, Some(id))?;
            animal.name = input.name.clone();
            animal.species = input.species.clone();
            animal.common_name = input.common_name.clone();
            animal.age = input.age;
            animal.sex = input.sex;
            animal.weight = input.weight;
            animal.image_url = input.image_url.clone();
            animal.health_status = input.health_status;
            animal.habitat_id = input.habitat_id;
            animal.updated_at = now;
            write_row(&mut animals, id.0, &animal)?;
            animal
        };
        txn.commit()?;
        Ok(animal)
    }

    pub fn get_animal(&self, id: AnimalId) -> Result<Animal> {
        self.read_one(ANIMALS, id.0, "animal")
    }

    /// All animals, oldest first.
    pub fn list_animals(&self) -> Result<Vec<Animal>> {
        self.read_all(ANIMALS)
    }

    /// Delete an animal with its treatments. Tasks that pointed at either
    /// are kept but unlinked.
    pub fn delete_animal(&self, id: AnimalId) -> Result<()> {
        let txn = self.db.begin_write()?;
        {
            let mut animals = txn.open_table(ANIMALS)?;
            if animals.remove(id.0)?.is_none() {
                return Err(ZooError::NotFound {
                    entity: "animal",
                    id: id.0,
                });
            }

            let mut treatments = txn.open_table(TREATMENTS)?;
            let doomed: BTreeSet<TreatmentId> = read_rows::<Treatment, _>(&treatments)?
                .into_iter()
                .filter(|t| t.animal_id == id)
                .map(|t| t.id)
                .collect();
            for treatment in &doomed {
                treatments.remove(treatment.0)?;
            }

            let mut tasks = txn.open_table(TASKS)?;
            for mut task in read_rows::<Task, _>(&tasks)? {
                let mut changed = false;
                if task.animal_id == Some(id) {
                    task.animal_id = None;
                    changed = true;
                }
                if task.treatment_id.is_some_and(|t| doomed.contains(&t)) {
                    task.treatment_id = None;
                    changed = true;
                }
                if changed {
                    write_row(&mut tasks, task.id.0, &task)?;
                }
            }
        }
        txn.commit()?;
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Habitats
    // -------------------------------------------------------------------------

    /// Add a habitat with its map outline. The number must be free.
    pub fn insert_habitat(
        &self,
        input: &HabitatInput,
        coordinates: Vec<i32>,
        now: Timestamp,
    ) -> Result<Habitat> {
        let txn = self.db.begin_write()?;
        {
            let numbers = txn.open_table(HABITAT_NUMBERS)?;
            if numbers.get(input.number)?.is_some() {
                return Err(number_conflict());
            }
        }
        let id = next_id(&txn, "habitats")?;
        let habitat = Habitat {
            id: HabitatId(id),
            number: input.number,
            name: input.name.clone(),
            kind: input.kind.clone(),
            capacity: input.capacity,
            coordinates,
            color: input.color.clone(),
            closed: input.closed,
            created_at: now,
            updated_at: now,
        };
        {
            let mut habitats = txn.open_table(HABITATS)?;
            write_row(&mut habitats, id, &habitat)?;
            let mut numbers = txn.open_table(HABITAT_NUMBERS)?;
            numbers.insert(habitat.number, id)?;
        }
        txn.commit()?;
        Ok(habitat)
    }

    /// Edit a habitat. The outline is left as is.
    pub fn update_habitat(&self, id: HabitatId, input: &HabitatInput, now: Timestamp) -> Result<Habitat> {
        let txn = self.db.begin_write()?;
        let habitat = {
            let mut habitats = txn.open_table(HABITATS)?;
            let mut habitat: Habitat = require_row(&habitats, id.0, "habitat")?;

            let mut numbers = txn.open_table(HABITAT_NUMBERS)?;
            let owner = numbers.get(input.number)?.map(|v| v.value());
            match owner {
                Some(other) if other != id.0 => return Err(number_conflict()),
                Some(_) => {}
                None => {
                    numbers.remove(habitat.number)?;
                    numbers.insert(input.number, id.0)?;
                }
            }

            habitat.number = input.number;
            habitat.name = input.name.clone();
            habitat.kind = input.kind.clone();
            habitat.capacity = input.capacity;
            habitat.color = input.color.clone();
            habitat.closed = input.closed;
            habitat.updated_at = now;
            write_row(&mut habitats, id.0, &habitat)?;
            habitat
        };
        txn.commit()?;
        Ok(habitat)
    }

    pub fn get_habitat(&self, id: HabitatId) -> Result<Habitat> {
        self.read_one(HABITATS, id.0, "habitat")
    }

    /// All habitats, ordered by number.
    pub fn list_habitats(&self) -> Result<Vec<Habitat>> {
        let mut habitats: Vec<Habitat> = self.read_all(HABITATS)?;
        habitats.sort_by_key(|h| h.number);
        Ok(habitats)
    }

    /// Number of animals living in each habitat.
    pub fn habitat_residents(&self) -> Result<BTreeMap<HabitatId, u32>> {
        let mut counts = BTreeMap::new();
        for animal in self.list_animals()? {
            if let Some(habitat) = animal.habitat_id {
                *counts.entry(habitat).or_insert(0u32) += 1;
            }
        }
        Ok(counts)
    }

    // -------------------------------------------------------------------------
    // Treatments
    // -------------------------------------------------------------------------

    /// Record a treatment against an existing animal.
    pub fn create_treatment(
        &self,
        input: &TreatmentInput,
        created_by: UserId,
        now: Timestamp,
    ) -> Result<Treatment> {
        let txn = self.db.begin_write()?;
        ensure_exists(&txn, ANIMALS, input.animal_id.0, "animal")?;
        let id = next_id(&txn, "treatments")?;
        let treatment = Treatment {
            id: TreatmentId(id),
            animal_id: input.animal_id,
            title: input.title.clone(),
            notes: input.notes.clone(),
            date: input.date,
            created_by,
            created_at: now,
        };
        {
            let mut treatments = txn.open_table(TREATMENTS)?;
            write_row(&mut treatments, id, &treatment)?;
        }
        txn.commit()?;
        Ok(treatment)
    }

    pub fn get_treatment(&self, id: TreatmentId) -> Result<Treatment> {
        self.read_one(TREATMENTS, id.0, "treatment")
    }

    /// All treatments, oldest first.
    pub fn list_treatments(&self) -> Result<Vec<Treatment>> {
        self.read_all(TREATMENTS)
    }

    /// Treatments of one animal, most recent date first.
    pub fn treatments_for_animal(&self, animal: AnimalId) -> Result<Vec<Treatment>> {
        let mut treatments: Vec<Treatment> = self
            .list_treatments()?
            .into_iter()
            .filter(|t| t.animal_id == animal)
            .collect();
        treatments.sort_by(|a, b| b.date.cmp(&a.date).then(b.id.cmp(&a.id)));
        Ok(treatments)
    }

    /// Delete a treatment and unlink tasks that referenced it.
    pub fn delete_treatment(&self, id: TreatmentId) -> Result<()> {
        let txn = self.db.begin_write()?;
        {
            let mut treatments = txn.open_table(TREATMENTS)?;
            if treatments.remove(id.0)?.is_none() {
                return Err(ZooError::NotFound {
                    entity: "treatment",
                    id: id.0,
                });
            }
            let mut tasks = txn.open_table(TASKS)?;
            for mut task in read_rows::<Task, _>(&tasks)? {
                if task.treatment_id == Some(id) {
                    task.treatment_id = None;
                    write_row(&mut tasks, task.id.0, &task)?;
                }
            }
        }
        txn.commit()?;
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Tasks
    // -------------------------------------------------------------------------

    /// Create a task in `TODO`. Every linked record must exist.
    pub fn create_task(&self, input: &TaskInput, created_by: UserId, now: Timestamp) -> Result<Task> {
        let task = Task {
            id: TaskId(0),
            title: input.title.clone(),
            description: input.description.clone(),
            kind: input.kind,
            status: TaskStatus::Todo,
            priority: input.priority,
            due_date: input.due_date,
            start_at: None,
            completed_at: None,
            assigned_to: input.assigned_to,
            created_by,
            animal_id: input.animal_id,
            habitat_id: input.habitat_id,
            treatment_id: input.treatment_id,
            created_at: now,
            updated_at: now,
        };
        self.insert_task(task)
    }

    /// Store a fully-formed task under a fresh id. Used by seeding to write
    /// tasks with historical status and timestamps.
    pub fn insert_task(&self, mut task: Task) -> Result<Task> {
        let txn = self.db.begin_write()?;
        ensure_task_links(&txn, &task)?;
        ensure_exists(&txn, USERS, task.created_by.0, "user")?;
        task.id = TaskId(next_id(&txn, "tasks")?);
        {
            let mut tasks = txn.open_table(TASKS)?;
            write_row(&mut tasks, task.id.0, &task)?;
        }
        txn.commit()?;
        Ok(task)
    }

    /// Replace a task's editable fields. Status and lifecycle stamps are kept.
    pub fn update_task(&self, id: TaskId, input: &TaskInput, now: Timestamp) -> Result<Task> {
        let txn = self.db.begin_write()?;
        let mut task: Task = {
            let tasks = txn.open_table(TASKS)?;
            require_row(&tasks, id.0, "task")?
        };
        task.title = input.title.clone();
        task.description = input.description.clone();
        task.kind = input.kind;
        task.priority = input.priority;
        task.due_date = input.due_date;
        task.assigned_to = input.assigned_to;
        task.animal_id = input.animal_id;
        task.habitat_id = input.habitat_id;
        task.treatment_id = input.treatment_id;
        task.updated_at = now;
        ensure_task_links(&txn, &task)?;
        {
            let mut tasks = txn.open_table(TASKS)?;
            write_row(&mut tasks, id.0, &task)?;
        }
        txn.commit()?;
        Ok(task)
    }

    /// Move a task to `status`, stamping start and completion times.
    pub fn set_task_status(&self, id: TaskId, status: TaskStatus, now: Timestamp) -> Result<Task> {
        let txn = self.db.begin_write()?;
        let task = {
            let mut tasks = txn.open_table(TASKS)?;
            let mut task: Task = require_row(&tasks, id.0, "task")?;
            task.apply_status(status, now);
            write_row(&mut tasks, id.0, &task)?;
            task
        };
        txn.commit()?;
        Ok(task)
    }

    pub fn get_task(&self, id: TaskId) -> Result<Task> {
        self.read_one(TASKS, id.0, "task")
    }

    pub fn delete_task(&self, id: TaskId) -> Result<()> {
        let txn = self.db.begin_write()?;
        {
            let mut tasks = txn.open_table(TASKS)?;
            if tasks.remove(id.0)?.is_none() {
                return Err(ZooError::NotFound {
                    entity: "task",
                    id: id.0,
                });
            }
        }
        txn.commit()?;
        Ok(())
    }

    /// Tasks matching `filter`, most recently updated first.
    pub fn list_tasks(&self, filter: TaskFilter) -> Result<Vec<Task>> {
        let mut tasks: Vec<Task> = self
            .read_all::<Task>(TASKS)?
            .into_iter()
            .filter(|task| match filter {
                TaskFilter::All => true,
                TaskFilter::CreatedBy(user) => task.created_by == user,
                TaskFilter::AssignedTo(user) => task.assigned_to == Some(user),
            })
            .collect();
        tasks.sort_by(|a, b| b.updated_at.cmp(&a.updated_at).then(b.id.cmp(&a.id)));
        Ok(tasks)
    }

    // -------------------------------------------------------------------------
    // Sessions
    // -------------------------------------------------------------------------

    /// Start a session for `user` lasting `ttl_secs`.
    pub fn create_session(&self, user: UserId, ttl_secs: i64, now: Timestamp) -> Result<Session> {
        let session = Session {
            token: new_token(),
            user_id: user,
            created_at: now,
            expires_at: now.plus_seconds(ttl_secs.max(1)),
        };
        let bytes = postcard::to_allocvec(&session)?;
        let txn = self.db.begin_write()?;
        ensure_exists(&txn, USERS, user.0, "user")?;
        {
            let mut sessions = txn.open_table(SESSIONS)?;
            sessions.insert(session.token.as_str(), bytes.as_slice())?;
        }
        txn.commit()?;
        Ok(session)
    }

    /// The live session behind `token`. Expired sessions are removed.
    ///
    /// The cache lock is held across the database read, so a concurrent
    /// [`Self::delete_session`] can never have its removal undone by a
    /// lookup that read the row before the delete committed.
    pub fn resolve_session(&self, token: &str, now: Timestamp) -> Result<Option<ActiveSession>> {
        let key = token.to_string();
        let mut cache = self.cache();
        if let Some(active) = cache.get(&key) {
            if !active.session.is_expired(now) {
                return Ok(Some(active));
            }
            cache.remove(&key);
            self.remove_session_row(token)?;
            return Ok(None);
        }

        let found = {
            let txn = self.db.begin_read()?;
            let sessions = txn.open_table(SESSIONS)?;
            let session: Option<Session> = match sessions.get(token)? {
                Some(bytes) => Some(postcard::from_bytes(bytes.value())?),
                None => None,
            };
            match session {
                Some(session) => {
                    let users = txn.open_table(USERS)?;
                    let user: Option<User> = read_row(&users, session.user_id.0)?;
                    Some((session, user))
                }
                None => None,
            }
        };

        match found {
            None => Ok(None),
            Some((session, Some(user))) if !session.is_expired(now) => {
                let active = ActiveSession { session, user };
                cache.insert(key, active.clone());
                Ok(Some(active))
            }
            Some(_) => {
                self.remove_session_row(token)?;
                Ok(None)
            }
        }
    }

    /// End a session. Unknown tokens are ignored.
    pub fn delete_session(&self, token: &str) -> Result<()> {
        let mut cache = self.cache();
        self.remove_session_row(token)?;
        cache.remove(&token.to_string());
        Ok(())
    }

    /// Callers hold the cache lock.
    fn remove_session_row(&self, token: &str) -> Result<()> {
        let txn = self.db.begin_write()?;
        {
            let mut sessions = txn.open_table(SESSIONS)?;
            sessions.remove(token)?;
        }
        txn.commit()?;
        Ok(())
    }

    /// Remove every expired session. Returns how many were removed.
    pub fn purge_expired_sessions(&self, now: Timestamp) -> Result<usize> {
        let mut cache = self.cache();
        let txn = self.db.begin_write()?;
        let removed = {
            let mut sessions = txn.open_table(SESSIONS)?;
            let mut expired = Vec::new();
            for entry in sessions.iter()? {
                let (token, bytes) = entry?;
                let session: Session = postcard::from_bytes(bytes.value())?;
                if session.is_expired(now) {
                    expired.push(token.value().to_string());
                }
            }
            for token in &expired {
                sessions.remove(token.as_str())?;
            }
            expired.len()
        };
        txn.commit()?;
        cache.remove_where(|active| active.session.is_expired(now));
        Ok(removed)
    }

    // -------------------------------------------------------------------------
    // Maintenance
    // -------------------------------------------------------------------------

    /// Delete every record and reset id counters.
    pub fn clear_all(&self) -> Result<()> {
        let mut cache = self.cache();
        let txn = self.db.begin_write()?;
        reset_table(&txn, USERS)?;
        reset_table(&txn, ANIMALS)?;
        reset_table(&txn, HABITATS)?;
        reset_table(&txn, TREATMENTS)?;
        reset_table(&txn, TASKS)?;
        reset_table(&txn, USER_EMAILS)?;
        reset_table(&txn, HABITAT_NUMBERS)?;
        reset_table(&txn, SESSIONS)?;
        reset_table(&txn, COUNTERS)?;
        txn.commit()?;
        cache.clear();
        Ok(())
    }

    /// Row counts plus session cache counters.
    pub fn stats(&self) -> Result<StoreStats> {
        let txn = self.db.begin_read()?;
        Ok(StoreStats {
            users: txn.open_table(USERS)?.len()?,
            animals: txn.open_table(ANIMALS)?.len()?,
            habitats: txn.open_table(HABITATS)?.len()?,
            treatments: txn.open_table(TREATMENTS)?.len()?,
            tasks: txn.open_table(TASKS)?.len()?,
            sessions: txn.open_table(SESSIONS)?.len()?,
            session_cache: self.cache().stats(),
        })
    }
}

// =============================================================================
// CONSTRAINTS
// =============================================================================

fn email_conflict() -> ZooError {
    ZooError::Conflict {
        field: "email",
        message: "User with this email already exists!".to_string(),
    }
}

fn number_conflict() -> ZooError {
    ZooError::Conflict {
        field: "number",
        message: "Habitat with this number already exists!".to_string(),
    }
}

fn ensure_unique_animal<Tbl>(
    animals: &Tbl,
    name: &str,
    species: &str,
    current: Option<AnimalId>,
) -> Result<()>
where
    Tbl: ReadableTable<u64, &'static [u8]>,
{
    let clash = read_rows::<Animal, _>(animals)?.into_iter().any(|animal| {
        Some(animal.id) != current && animal.name == name && animal.species == species
    });
    if clash {
        return Err(ZooError::Conflict {
            field: "name",
            message: "Animal with this name and species already exists!".to_string(),
        });
    }
    Ok(())
}

fn ensure_task_links(txn: &WriteTransaction, task: &Task) -> Result<()> {
    if let Some(user) = task.assigned_to {
        ensure_exists(txn, USERS, user.0, "user")?;
    }
    if let Some(animal) = task.animal_id {
        ensure_exists(txn, ANIMALS, animal.0, "animal")?;
    }
    if let Some(habitat) = task.habitat_id {
        ensure_exists(txn, HABITATS, habitat.0, "habitat")?;
    }
    if let Some(treatment) = task.treatment_id {
        ensure_exists(txn, TREATMENTS, treatment.0, "treatment")?;
    }
    Ok(())
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::model::{HealthStatus, Role, Sex, TaskPriority, TaskType};
    use tempfile::TempDir;

    fn open_store() -> (TempDir, ZooStore) {
        let dir = TempDir::new().unwrap();
        let store = ZooStore::open(dir.path().join("zoo.redb")).unwrap();
        (dir, store)
    }

    fn lion() -> AnimalInput {
        AnimalInput {
            name: "Simba".to_string(),
            species: "Panthera leo".to_string(),
            common_name: "Lion".to_string(),
            age: 4,
            sex: Sex::Male,
            health_status: HealthStatus::Healthy,
            weight: Some(190.5),
            image_url: None,
            habitat_id: None,
        }
    }

    #[test]
    fn ids_are_sequential_per_table() {
        let (_dir, store) = open_store();
        let a = store.create_animal(&lion(), Timestamp(1)).unwrap();
        let b = store
            .create_animal(
                &AnimalInput {
                    name: "Nala".to_string(),
                    ..lion()
                },
                Timestamp(2),
            )
            .unwrap();
        assert_eq!(a.id, AnimalId(1));
        assert_eq!(b.id, AnimalId(2));
    }

    #[test]
    fn duplicate_animal_is_a_conflict() {
        let (_dir, store) = open_store();
        store.create_animal(&lion(), Timestamp(1)).unwrap();
        let err = store.create_animal(&lion(), Timestamp(2)).unwrap_err();
        assert!(matches!(err, ZooError::Conflict { field: "name", .. }));
    }

    #[test]
    fn failed_write_rolls_back_counter() {
        let (_dir, store) = open_store();
        store.create_animal(&lion(), Timestamp(1)).unwrap();
        assert!(store.create_animal(&lion(), Timestamp(2)).is_err());
        let nala = store
            .create_animal(
                &AnimalInput {
                    name: "Nala".to_string(),
                    ..lion()
                },
                Timestamp(3),
            )
            .unwrap();
        assert_eq!(nala.id, AnimalId(2));
    }

    #[test]
    fn unknown_habitat_is_rejected() {
        let (_dir, store) = open_store();
        let input = AnimalInput {
            habitat_id: Some(HabitatId(99)),
            ..lion()
        };
        let err = store.create_animal(&input, Timestamp(1)).unwrap_err();
        assert!(matches!(err, ZooError::NotFound { entity: "habitat", id: 99 }));
    }

    #[test]
    fn sessions_expire() {
        let (_dir, store) = open_store();
        let user = store
            .create_user(
                &NewUser {
                    name: "Keeper".to_string(),
                    email: "keeper@zoo.com".to_string(),
                    password: "keeper123".to_string(),
                    role: Role::Staff,
                },
                Timestamp(0),
            )
            .unwrap();
        let session = store.create_session(user.id, 60, Timestamp(100)).unwrap();

        let live = store.resolve_session(&session.token, Timestamp(150)).unwrap();
        assert_eq!(live.map(|a| a.user.id), Some(user.id));

        assert!(store.resolve_session(&session.token, Timestamp(160)).unwrap().is_none());
        assert_eq!(store.stats().unwrap().sessions, 0);
    }

    #[test]
    fn task_links_must_exist() {
        let (_dir, store) = open_store();
        let input = TaskInput {
            title: "Feed".to_string(),
            description: None,
            kind: TaskType::General,
            priority: TaskPriority::Low,
            due_date: None,
            assigned_to: Some(UserId(7)),
            animal_id: None,
            habitat_id: None,
            treatment_id: None,
        };
        let err = store.create_task(&input, UserId(1), Timestamp(0)).unwrap_err();
        assert!(matches!(err, ZooError::NotFound { entity: "user", id: 7 }));
    }
}
