// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Outbound side effects: push notifications, email, uploaded files.
//!
//! Each collaborator is a trait object on `AppState` so deployments can swap
//! in real providers. The bundled implementations log or write locally.

use std::path::PathBuf;

use anyhow::Context;
use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use uuid::Uuid;

/// Fire-and-forget push notifications.
pub trait Notifier: Send + Sync {
    fn notify(&self, device_tokens: Vec<String>, title: &str, body: &str);
}

/// Notifier that only logs what it would send.
#[derive(Debug, Clone, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, device_tokens: Vec<String>, title: &str, body: &str) {
        if device_tokens.is_empty() {
            return;
        }
        tracing::info!(
            recipients = device_tokens.len(),
            title,
            body,
            "Push notification (log only)"
        );
    }
}

/// Outbound email.
pub trait Mailer: Send + Sync {
    fn send<'a>(
        &'a self,
        to: &'a str,
        subject: &'a str,
        body: &'a str,
    ) -> BoxFuture<'a, anyhow::Result<()>>;
}

/// Mailer that writes messages to the log.
#[derive(Debug, Clone, Default)]
pub struct ConsoleMailer;

impl Mailer for ConsoleMailer {
    fn send<'a>(
        &'a self,
        to: &'a str,
        subject: &'a str,
        body: &'a str,
    ) -> BoxFuture<'a, anyhow::Result<()>> {
        async move {
            tracing::info!(to, subject, body, "Email (development mode)");
            Ok(())
        }
        .boxed()
    }
}

/// Storage for uploaded documents. Returns a URL for the stored file.
pub trait MediaStore: Send + Sync {
    fn store<'a>(
        &'a self,
        owner: Uuid,
        extension: &'a str,
        bytes: Vec<u8>,
    ) -> BoxFuture<'a, anyhow::Result<String>>;
}

/// Writes uploads under a local directory served as static files.
#[derive(Debug, Clone)]
pub struct LocalMediaStore {
    root: PathBuf,
    public_prefix: String,
}

impl LocalMediaStore {
    pub fn new(root: impl Into<PathBuf>, public_prefix: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            public_prefix: public_prefix.into().trim_end_matches('/').to_string(),
        }
    }
}

impl MediaStore for LocalMediaStore {
    fn store<'a>(
        &'a self,
        owner: Uuid,
        extension: &'a str,
        bytes: Vec<u8>,
    ) -> BoxFuture<'a, anyhow::Result<String>> {
        async move {
            tokio::fs::create_dir_all(&self.root)
                .await
                .with_context(|| format!("creating {}", self.root.display()))?;

            let file_name = format!("{owner}_{}.{extension}", Uuid::new_v4().simple());
            let path = self.root.join(&file_name);
            tokio::fs::write(&path, &bytes)
                .await
                .with_context(|| format!("writing {}", path.display()))?;

            tracing::debug!(path = %path.display(), size = bytes.len(), "Stored upload");
            Ok(format!("{}/{file_name}", self.public_prefix))
        }
        .boxed()
    }
}
