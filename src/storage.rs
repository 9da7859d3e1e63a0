use anyhow::Context;
use async_trait::async_trait;
use aws_config::{defaults, BehaviorVersion};
use aws_credential_types::Credentials;
use aws_sdk_s3::{
    config::{Builder as S3ConfigBuilder, Region},
    Client,
};
use aws_smithy_types::byte_stream::ByteStream;
use bytes::Bytes;
use tracing::debug;
use uuid::Uuid;

use crate::config::StorageConfig;

/// A file received from a client, held in memory until uploaded.
#[derive(Debug, Clone)]
pub struct UploadFile {
    pub file_name: Option<String>,
    pub content_type: String,
    pub body: Bytes,
}

/// Folder an uploaded object is filed under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Avatar,
    CoverImage,
}

impl MediaKind {
    fn prefix(self) -> &'static str {
        match self {
            MediaKind::Avatar => "avatars",
            MediaKind::CoverImage => "covers",
        }
    }
}

/// Media hosting capability: store a file and hand back a URL clients can load.
#[async_trait]
pub trait Uploader: Send + Sync {
    async fn upload(&self, kind: MediaKind, file: UploadFile) -> anyhow::Result<String>;
    /// Drop a previously uploaded object. URLs this uploader did not issue are ignored.
    async fn remove(&self, url: &str) -> anyhow::Result<()>;
}

#[derive(Clone)]
pub struct Storage {
    client: Client,
    bucket: String,
    public_url: String,
}

impl Storage {
    pub async fn new(cfg: &StorageConfig) -> anyhow::Result<Self> {
        let shared = defaults(BehaviorVersion::latest())
            .region(Region::new(cfg.region.clone()))
            .credentials_provider(Credentials::new(
                &cfg.access_key,
                &cfg.secret_key,
                None,
                None,
                "static",
            ))
            .endpoint_url(&cfg.endpoint)
            .load()
            .await;

        let conf = S3ConfigBuilder::from(&shared)
            .endpoint_url(&cfg.endpoint)
            .force_path_style(true)
            .build();

        Ok(Self {
            client: Client::from_conf(conf),
            bucket: cfg.bucket.clone(),
            public_url: cfg.public_url.trim_end_matches('/').to_string(),
        })
    }

    async fn put_object(&self, key: &str, body: Bytes, content_type: &str) -> anyhow::Result<()> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(body))
            .content_type(content_type)
            .send()
            .await
            .context("s3 put_object")?;
        Ok(())
    }

    async fn delete_object(&self, key: &str) -> anyhow::Result<()> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .context("s3 delete_object")?;
        Ok(())
    }
}

#[async_trait]
impl Uploader for Storage {
    async fn upload(&self, kind: MediaKind, file: UploadFile) -> anyhow::Result<String> {
        anyhow::ensure!(!file.body.is_empty(), "empty file");
        let key = object_key(kind, &file);
        self.put_object(&key, file.body, &file.content_type)
            .await
            .with_context(|| format!("put_object {}", key))?;
        debug!(%key, "media uploaded");
        Ok(format!("{}/{}", self.public_url, key))
    }

    async fn remove(&self, url: &str) -> anyhow::Result<()> {
        let Some(key) = key_from_url(&self.public_url, url) else {
            return Ok(());
        };
        self.delete_object(key)
            .await
            .with_context(|| format!("delete_object {}", key))
    }
}

pub(crate) fn object_key(kind: MediaKind, file: &UploadFile) -> String {
    let by_mime: Option<&str> = ext_from_mime(&file.content_type);
    let ext = by_mime
        .or_else(|| {
            file.file_name
                .as_deref()
                .and_then(|n| n.rsplit_once('.'))
                .map(|(_, ext)| ext)
                .filter(|ext| !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()))
        })
        .unwrap_or("bin")
        .to_ascii_lowercase();
    format!("users/{}/{}.{}", kind.prefix(), Uuid::new_v4(), ext)
}

pub(crate) fn key_from_url<'a>(public_url: &str, url: &'a str) -> Option<&'a str> {
    url.strip_prefix(public_url)
        .and_then(|rest| rest.strip_prefix('/'))
        .filter(|key| !key.is_empty())
}

fn ext_from_mime(ct: &str) -> Option<&'static str> {
    match ct {
        "image/jpeg" | "image/jpg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/webp" => Some("webp"),
        "image/gif" => Some("gif"),
        "image/heic" => Some("heic"),
        _ => None,
    }
}
