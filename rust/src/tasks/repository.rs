//! Owner-scoped task access.
//!
//! The repository resolves the principal from the credential store on every
//! call, stamps it into new tasks, and refuses to return or modify tasks
//! whose `user_id` differs. Title and description are encrypted with the
//! principal's field key before they reach the backend.

use tracing::{info, warn};
use uuid::Uuid;

use super::backend::TaskBackend;
use super::model::Task;
use super::TaskError;
use crate::credentials::CredentialStore;
use crate::crypto::fields::FieldCipher;
use crate::crypto::secrets::SecretVault;
use crate::store::PreferenceStore;

fn system_clock() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

pub struct SecureTaskRepository<'a, B: TaskBackend, S: PreferenceStore> {
    backend: B,
    credentials: &'a CredentialStore<S>,
    installation: &'a SecretVault,
    clock: fn() -> i64,
}

fn slots(task_id: &str) -> (String, String) {
    (format!("{task_id}/title"), format!("{task_id}/description"))
}

struct Session {
    principal: String,
    cipher: FieldCipher,
}

impl<'a, B: TaskBackend, S: PreferenceStore> SecureTaskRepository<'a, B, S> {
    pub fn new(backend: B, credentials: &'a CredentialStore<S>, installation: &'a SecretVault) -> Self {
        Self {
            backend,
            credentials,
            installation,
            clock: system_clock,
        }
    }

    /// Replaces the millisecond clock used for timestamps.
    pub fn with_clock(mut self, clock: fn() -> i64) -> Self {
        self.clock = clock;
        self
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    fn session(&self) -> Result<Option<Session>, TaskError> {
        let Some(principal) = self.credentials.principal()? else {
            return Ok(None);
        };
        let cipher = FieldCipher::for_user(self.installation, &principal)?;
        Ok(Some(Session { principal, cipher }))
    }

    fn require_session(&self) -> Result<Session, TaskError> {
        self.session()?.ok_or(TaskError::NotAuthenticated)
    }

    /// Loads a stored task and checks that `session` owns it.
    fn owned(&self, session: &Session, id: &str) -> Result<Task, TaskError> {
        let stored = self
            .backend
            .get(id)?
            .ok_or_else(|| TaskError::NotFound(id.to_string()))?;
        if stored.user_id != session.principal {
            warn!(task = id, principal = %session.principal, "rejected access to foreign task");
            return Err(TaskError::NotAuthorized(id.to_string()));
        }
        Ok(stored)
    }

    fn reveal(session: &Session, mut task: Task) -> Task {
        if task.is_encrypted {
            let (title_slot, description_slot) = slots(&task.id);
            task.title = session.cipher.decrypt_slot_lenient(&task.title, &title_slot);
            task.description = session.cipher.decrypt_slot_lenient(&task.description, &description_slot);
        }
        task
    }

    /// Text fields are bound to the task id, so ciphertext moved to another
    /// task or field no longer decrypts.
    fn conceal(session: &Session, mut task: Task) -> Result<Task, TaskError> {
        let (title_slot, description_slot) = slots(&task.id);
        task.title = session.cipher.encrypt_slot(&task.title, &title_slot)?;
        task.description = session.cipher.encrypt_slot(&task.description, &description_slot)?;
        task.is_encrypted = true;
        Ok(task)
    }

    /// The principal's tasks, newest first. Empty when nobody is signed in.
    pub fn list_tasks(&self) -> Result<Vec<Task>, TaskError> {
        let Some(session) = self.session()? else {
            return Ok(Vec::new());
        };
        let mut tasks: Vec<Task> = self
            .backend
            .list()?
            .into_iter()
            .filter(|task| task.user_id == session.principal)
            .map(|task| Self::reveal(&session, task))
            .collect();
        tasks.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(tasks)
    }

    /// `None` when the task is missing, foreign, or nobody is signed in.
    pub fn get_task(&self, id: &str) -> Result<Option<Task>, TaskError> {
        let Some(session) = self.session()? else {
            return Ok(None);
        };
        match self.owned(&session, id) {
            Ok(task) => Ok(Some(Self::reveal(&session, task))),
            Err(TaskError::NotFound(_)) | Err(TaskError::NotAuthorized(_)) => Ok(None),
            Err(err) => Err(err),
        }
    }

    /// Stores a new task for the principal and returns its generated id.
    /// Any id, owner, or timestamps on `task` are replaced.
    pub fn add_task(&mut self, task: Task) -> Result<String, TaskError> {
        let session = self.require_session()?;
        let id = Uuid::new_v4().to_string();
        let task = Task {
            id: id.clone(),
            user_id: session.principal.clone(),
            created_at: (self.clock)(),
            updated_at: None,
            ..task
        };
        self.backend.put(Self::conceal(&session, task)?)?;
        info!(task = %id, principal = %session.principal, "added task");
        Ok(id)
    }

    /// Replaces the stored task with the same id. Owner and creation time
    /// are kept from the stored record.
    pub fn update_task(&mut self, task: Task) -> Result<(), TaskError> {
        let session = self.require_session()?;
        let stored = self.owned(&session, &task.id)?;
        let task = Task {
            user_id: stored.user_id,
            created_at: stored.created_at,
            updated_at: Some((self.clock)()),
            ..task
        };
        let id = task.id.clone();
        self.backend.put(Self::conceal(&session, task)?)?;
        info!(task = %id, "updated task");
        Ok(())
    }

    pub fn delete_task(&mut self, id: &str) -> Result<(), TaskError> {
        let session = self.require_session()?;
        self.owned(&session, id)?;
        self.backend.delete(id)?;
        info!(task = id, "deleted task");
        Ok(())
    }

    /// Flips the completion flag and returns the updated task.
    pub fn toggle_completion(&mut self, id: &str) -> Result<Task, TaskError> {
        let session = self.require_session()?;
        let mut stored = self.owned(&session, id)?;
        stored.is_completed = !stored.is_completed;
        stored.updated_at = Some((self.clock)());
        self.backend.put(stored.clone())?;
        info!(task = id, completed = stored.is_completed, "toggled task");
        Ok(Self::reveal(&session, stored))
    }
}

#[cfg(test)]
mod tests {
    use super::SecureTaskRepository;
    use crate::credentials::CredentialStore;
    use crate::crypto::fields::FieldCipher;
    use crate::crypto::passwords::PasswordScheme;
    use crate::crypto::secrets::SecretVault;
    use crate::store::MemoryPreferences;
    use crate::tasks::backend::{MemoryTaskBackend, TaskBackend};
    use crate::tasks::model::{Task, TaskPriority};
    use crate::tasks::TaskError;

    use serde_json::json;
    use std::sync::atomic::{AtomicI64, Ordering};

    static TICK: AtomicI64 = AtomicI64::new(1_000);

    fn ticking_clock() -> i64 {
        TICK.fetch_add(1, Ordering::SeqCst)
    }

    fn signed_in(username: &str) -> CredentialStore<MemoryPreferences> {
        let mut creds = CredentialStore::new(MemoryPreferences::new(), PasswordScheme::Sha256);
        creds.register(username, "pw", username).unwrap();
        assert!(creds.login(username, "pw").unwrap());
        creds
    }

    fn vault() -> SecretVault {
        SecretVault::from_key_bytes(&[11u8; 32]).unwrap()
    }

    #[test]
    fn adds_and_reads_back_decrypted_tasks() {
        let creds = signed_in("alice");
        let vault = vault();
        let mut repo = SecureTaskRepository::new(MemoryTaskBackend::new(), &creds, &vault).with_clock(ticking_clock);

        let mut task = Task::new("Buy milk", "2 litres, semi-skimmed");
        task.priority = TaskPriority::High;
        task.user_id = "mallory".to_string();
        let id = repo.add_task(task).unwrap();

        let stored = repo.backend().get(&id).unwrap().unwrap();
        assert!(stored.is_encrypted);
        assert_ne!(stored.title, "Buy milk");
        assert!(!stored.description.contains("litres"));
        assert_eq!(stored.user_id, "alice");

        let read = repo.get_task(&id).unwrap().unwrap();
        assert_eq!(read.title, "Buy milk");
        assert_eq!(read.description, "2 litres, semi-skimmed");
        assert_eq!(read.priority, TaskPriority::High);
        assert!(read.created_at >= 1_000);
    }

    #[test]
    fn lists_newest_first_and_only_own_tasks() {
        let creds = signed_in("alice");
        let vault = vault();
        let mut backend = MemoryTaskBackend::new();
        backend
            .put(Task {
                id: "foreign".to_string(),
                user_id: "bob".to_string(),
                created_at: i64::MAX,
                ..Task::new("bob's", "")
            })
            .unwrap();

        let mut repo = SecureTaskRepository::new(backend, &creds, &vault).with_clock(ticking_clock);
        repo.add_task(Task::new("first", "")).unwrap();
        repo.add_task(Task::new("second", "")).unwrap();

        let titles: Vec<String> = repo.list_tasks().unwrap().into_iter().map(|t| t.title).collect();
        assert_eq!(titles, vec!["second", "first"]);
    }

    #[test]
    fn foreign_tasks_are_invisible_and_immutable() {
        let creds = signed_in("alice");
        let vault = vault();
        let mut backend = MemoryTaskBackend::new();
        backend
            .put(Task {
                id: "b1".to_string(),
                user_id: "bob".to_string(),
                ..Task::new("bob's", "")
            })
            .unwrap();
        let mut repo = SecureTaskRepository::new(backend, &creds, &vault);

        assert_eq!(repo.get_task("b1").unwrap(), None);
        assert!(matches!(repo.toggle_completion("b1"), Err(TaskError::NotAuthorized(_))));
        assert!(matches!(repo.delete_task("b1"), Err(TaskError::NotAuthorized(_))));
        let forged = Task {
            id: "b1".to_string(),
            ..Task::new("hijacked", "")
        };
        assert!(matches!(repo.update_task(forged), Err(TaskError::NotAuthorized(_))));
        assert_eq!(repo.backend().get("b1").unwrap().unwrap().title, "bob's");
    }

    #[test]
    fn update_keeps_owner_and_creation_time() {
        let creds = signed_in("alice");
        let vault = vault();
        let mut repo = SecureTaskRepository::new(MemoryTaskBackend::new(), &creds, &vault).with_clock(ticking_clock);
        let id = repo.add_task(Task::new("draft", "")).unwrap();
        let original = repo.get_task(&id).unwrap().unwrap();

        let edited = Task {
            title: "final".to_string(),
            user_id: "bob".to_string(),
            created_at: 0,
            ..original.clone()
        };
        repo.update_task(edited).unwrap();

        let read = repo.get_task(&id).unwrap().unwrap();
        assert_eq!(read.title, "final");
        assert_eq!(read.user_id, "alice");
        assert_eq!(read.created_at, original.created_at);
        assert!(read.updated_at.unwrap() > original.created_at);
    }

    #[test]
    fn toggles_and_deletes() {
        let creds = signed_in("alice");
        let vault = vault();
        let mut repo = SecureTaskRepository::new(MemoryTaskBackend::new(), &creds, &vault);
        let id = repo.add_task(Task::new("walk dog", "")).unwrap();

        let toggled = repo.toggle_completion(&id).unwrap();
        assert!(toggled.is_done());
        assert_eq!(toggled.title, "walk dog");
        assert!(!repo.toggle_completion(&id).unwrap().is_done());

        repo.delete_task(&id).unwrap();
        assert_eq!(repo.get_task(&id).unwrap(), None);
        assert!(matches!(repo.delete_task(&id), Err(TaskError::NotFound(_))));
    }

    #[test]
    fn requires_a_signed_in_principal() {
        let mut creds = signed_in("alice");
        creds.logout().unwrap();
        let vault = vault();
        let mut repo = SecureTaskRepository::new(MemoryTaskBackend::new(), &creds, &vault);

        assert!(repo.list_tasks().unwrap().is_empty());
        assert_eq!(repo.get_task("any").unwrap(), None);
        assert!(matches!(repo.add_task(Task::new("x", "")), Err(TaskError::NotAuthenticated)));
        assert!(matches!(repo.toggle_completion("any"), Err(TaskError::NotAuthenticated)));
    }

    #[test]
    fn legacy_plaintext_tasks_read_through() {
        let creds = signed_in("alice");
        let vault = vault();
        let mut backend = MemoryTaskBackend::new();
        backend
            .put(Task {
                id: "old".to_string(),
                user_id: "alice".to_string(),
                is_encrypted: true,
                ..Task::new("written before encryption", "")
            })
            .unwrap();
        let repo = SecureTaskRepository::new(backend, &creds, &vault);
        assert_eq!(repo.get_task("old").unwrap().unwrap().title, "written before encryption");
    }

    #[test]
    fn moved_ciphertext_does_not_decrypt() {
        let creds = signed_in("alice");
        let vault = vault();
        let mut repo = SecureTaskRepository::new(MemoryTaskBackend::new(), &creds, &vault).with_clock(ticking_clock);
        let rent = repo.add_task(Task::new("Pay rent", "")).unwrap();
        let other = repo.add_task(Task::new("Water plants", "")).unwrap();

        let mut stored = repo.backend().get(&other).unwrap().unwrap();
        stored.title = repo.backend().get(&rent).unwrap().unwrap().title;
        stored.description = stored.title.clone();
        repo.backend.put(stored.clone()).unwrap();

        let read = repo.get_task(&other).unwrap().unwrap();
        assert_ne!(read.title, "Pay rent");
        assert_eq!(read.title, stored.title);
        assert_eq!(read.description, stored.title);
        assert_eq!(repo.get_task(&rent).unwrap().unwrap().title, "Pay rent");
    }

    #[test]
    fn documents_without_encryption_flag_are_decrypted() {
        let creds = signed_in("alice");
        let vault = vault();
        let cipher = FieldCipher::for_user(&vault, "alice").unwrap();
        let document = json!({
            "id": "k1",
            "userId": "alice",
            "title": cipher.encrypt_slot("Book dentist", "k1/title").unwrap(),
        });
        let mut backend = MemoryTaskBackend::new();
        backend.put(serde_json::from_value(document).unwrap()).unwrap();

        let repo = SecureTaskRepository::new(backend, &creds, &vault);
        assert_eq!(repo.get_task("k1").unwrap().unwrap().title, "Book dentist");
    }

    #[test]
    fn survives_restart_on_disk() {
        use crate::store::EncryptedPreferences;
        use crate::tasks::backend::JsonTaskBackend;

        let dir = tempfile::tempdir().unwrap();
        let prefs_path = dir.path().join("secure_prefs.json");
        let tasks_path = dir.path().join("tasks.json");
        let vault = vault();

        let id = {
            let prefs = EncryptedPreferences::open(&prefs_path, &vault).unwrap();
            let mut creds = CredentialStore::new(prefs, PasswordScheme::Sha256);
            creds.register("alice", "pw", "Alice").unwrap();
            assert!(creds.login("alice", "pw").unwrap());
            let backend = JsonTaskBackend::open(&tasks_path).unwrap();
            let mut repo = SecureTaskRepository::new(backend, &creds, &vault);
            repo.add_task(Task::new("Renew passport", "bring two photos")).unwrap()
        };

        let on_disk = std::fs::read_to_string(&tasks_path).unwrap();
        assert!(!on_disk.contains("passport"));
        assert!(on_disk.contains("\"userId\": \"alice\""));

        let prefs = EncryptedPreferences::open(&prefs_path, &vault).unwrap();
        let creds = CredentialStore::new(prefs, PasswordScheme::Sha256);
        let backend = JsonTaskBackend::open(&tasks_path).unwrap();
        let repo = SecureTaskRepository::new(backend, &creds, &vault);
        let task = repo.get_task(&id).unwrap().unwrap();
        assert_eq!(task.title, "Renew passport");
        assert_eq!(task.description, "bring two photos");
    }
}
