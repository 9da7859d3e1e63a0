//! In-process stand-ins for the database and media storage, used by unit tests.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Mutex,
};

use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::storage::{MediaKind, UploadFile, Uploader};
use crate::users::repo::{StoreResult, StoreError, UserStore};
use crate::users::repo_types::{MediaField, NewUser, User};

#[derive(Default)]
pub struct MemoryUserStore {
    users: Mutex<Vec<User>>,
}

impl MemoryUserStore {
    pub fn len(&self) -> usize {
        self.users.lock().unwrap().len()
    }

    pub fn get(&self, id: Uuid) -> Option<User> {
        self.users.lock().unwrap().iter().find(|u| u.id == id).cloned()
    }

    fn update<F>(&self, id: Uuid, f: F) -> Option<User>
    where
        F: FnOnce(&mut User),
    {
        let mut users = self.users.lock().unwrap();
        let user = users.iter_mut().find(|u| u.id == id)?;
        f(user);
        user.updated_at = OffsetDateTime::now_utc();
        Some(user.clone())
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<User>> {
        Ok(self.get(id))
    }

    async fn find_by_username_or_email(
        &self,
        username: Option<&str>,
        email: Option<&str>,
    ) -> StoreResult<Option<User>> {
        let users = self.users.lock().unwrap();
        Ok(users
            .iter()
            .find(|u| Some(u.username.as_str()) == username || Some(u.email.as_str()) == email)
            .cloned())
    }

    async fn create(&self, new: NewUser) -> StoreResult<User> {
        let mut users = self.users.lock().unwrap();
        if users
            .iter()
            .any(|u| u.username == new.username || u.email == new.email)
        {
            return Err(StoreError::Conflict);
        }
        let now = OffsetDateTime::now_utc();
        let user = User {
            id: Uuid::new_v4(),
            username: new.username,
            email: new.email,
            full_name: new.full_name,
            avatar: new.avatar,
            cover_image: new.cover_image,
            password_hash: new.password_hash,
            refresh_token: None,
            created_at: now,
            updated_at: now,
        };
        users.push(user.clone());
        Ok(user)
    }

    async fn set_refresh_token(&self, id: Uuid, token: Option<&str>) -> StoreResult<bool> {
        Ok(self
            .update(id, |u| u.refresh_token = token.map(str::to_string))
            .is_some())
    }

    async fn rotate_refresh_token(
        &self,
        id: Uuid,
        current: &str,
        next: &str,
    ) -> StoreResult<bool> {
        let mut users = self.users.lock().unwrap();
        match users
            .iter_mut()
            .find(|u| u.id == id && u.refresh_token.as_deref() == Some(current))
        {
            Some(user) => {
                user.refresh_token = Some(next.to_string());
                user.updated_at = OffsetDateTime::now_utc();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn set_password(&self, id: Uuid, password_hash: &str) -> StoreResult<bool> {
        Ok(self
            .update(id, |u| u.password_hash = password_hash.to_string())
            .is_some())
    }

    async fn update_details(
        &self,
        id: Uuid,
        full_name: &str,
        email: &str,
    ) -> StoreResult<Option<User>> {
        {
            let users = self.users.lock().unwrap();
            if users.iter().any(|u| u.id != id && u.email == email) {
                return Err(StoreError::Conflict);
            }
        }
        Ok(self.update(id, |u| {
            u.full_name = full_name.to_string();
            u.email = email.to_string();
        }))
    }

    async fn set_media(
        &self,
        id: Uuid,
        field: MediaField,
        url: &str,
    ) -> StoreResult<Option<User>> {
        Ok(self.update(id, |u| match field {
            MediaField::Avatar => u.avatar = url.to_string(),
            MediaField::CoverImage => u.cover_image = url.to_string(),
        }))
    }
}

/// Uploader that keeps nothing and records what it handed out and was asked to remove.
#[derive(Default)]
pub struct FakeUploader {
    pub fail: AtomicBool,
    /// Rejects only uploads of this kind.
    pub fail_kind: Mutex<Option<MediaKind>>,
    pub uploaded: Mutex<Vec<String>>,
    pub removed: Mutex<Vec<String>>,
}

#[async_trait]
impl Uploader for FakeUploader {
    async fn upload(&self, kind: MediaKind, file: UploadFile) -> anyhow::Result<String> {
        if self.fail.load(Ordering::SeqCst) {
            anyhow::bail!("upload rejected");
        }
        if *self.fail_kind.lock().unwrap() == Some(kind) {
            anyhow::bail!("upload rejected for {:?}", kind);
        }
        anyhow::ensure!(!file.body.is_empty(), "empty file");
        let key = crate::storage::object_key(kind, &file);
        let url = format!("https://media.test/{}", key);
        self.uploaded.lock().unwrap().push(url.clone());
        Ok(url)
    }

    async fn remove(&self, url: &str) -> anyhow::Result<()> {
        self.removed.lock().unwrap().push(url.to_string());
        Ok(())
    }
}
