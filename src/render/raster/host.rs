//! Off-screen hosts for the raster backend.
//!
//! A [`Stage`] tracks every mounted host. An [`OffscreenHost`] is acquired
//! for one render, owns its layout task and unmounts itself on drop, so a
//! host never outlives the render that created it, even on error.

use super::component::Component;
use super::layout::{self, HostLayout};
use crate::error::RenderError;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use uuid::Uuid;

pub type HostId = Uuid;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HostInfo {
    pub width: f32,
    pub height: f32,
    /// Whether the host may be seen by anyone looking at the stage.
    pub visible: bool,
}

/// Registry of mounted hosts. Cheap to clone; clones share state.
#[derive(Debug, Clone, Default)]
pub struct Stage {
    hosts: Arc<Mutex<HashMap<HostId, HostInfo>>>,
}

impl Stage {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<HostId, HostInfo>> {
        self.hosts
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn mounted(&self) -> usize {
        self.lock().len()
    }

    pub fn visible(&self) -> usize {
        self.lock().values().filter(|h| h.visible).count()
    }

    pub fn get(&self, id: HostId) -> Option<HostInfo> {
        self.lock().get(&id).copied()
    }

    fn attach(&self, info: HostInfo) -> HostId {
        let id = Uuid::new_v4();
        self.lock().insert(id, info);
        id
    }

    fn detach(&self, id: HostId) {
        self.lock().remove(&id);
    }
}

type Published = Option<Arc<HostLayout>>;

/// One off-screen rendering surface.
pub struct OffscreenHost {
    id: HostId,
    stage: Stage,
    sender: Option<watch::Sender<Published>>,
    receiver: watch::Receiver<Published>,
    task: Option<JoinHandle<()>>,
}

impl OffscreenHost {
    /// Attach a `width` x `height` host to `stage`.
    pub fn acquire(stage: &Stage, width: f32, height: f32, hidden: bool) -> Self {
        let id = stage.attach(HostInfo {
            width,
            height,
            visible: !hidden,
        });
        let (sender, receiver) = watch::channel(None);
        log::debug!(
            "Mounted host {} ({:.0}x{:.0} px, hidden: {})",
            id, width, height, hidden
        );

        Self {
            id,
            stage: stage.clone(),
            sender: Some(sender),
            receiver,
            task: None,
        }
    }

    pub fn id(&self) -> HostId {
        self.id
    }

    /// Lay `pages` out on the blocking pool. Must run inside a tokio runtime.
    pub fn mount(&mut self, pages: Vec<Component>) {
        let Some(sender) = self.sender.take() else {
            log::warn!("Host {} already has content mounted", self.id);
            return;
        };
        let id = self.id;

        self.task = Some(tokio::task::spawn_blocking(move || {
            let host = layout::layout(&pages);
            log::debug!("Host {} laid out: {} chars of text", id, host.text_len);
            // A closed channel means the host was dropped mid-layout.
            let _ = sender.send(Some(Arc::new(host)));
        }));
    }

    /// Wait until the host shows at least `min_text_len` characters.
    ///
    /// Fails with [`RenderError::RenderTimeout`] when the threshold is not
    /// met within `timeout`, or when layout finished short of it.
    pub async fn wait_until_live(
        &mut self,
        min_text_len: usize,
        timeout: Duration,
    ) -> Result<Arc<HostLayout>, RenderError> {
        let started = Instant::now();
        let ready = |published: &Published| match published {
            Some(host) => host.text_len >= min_text_len,
            None => false,
        };

        let outcome = tokio::time::timeout(timeout, self.receiver.wait_for(ready)).await;
        let waited_ms = started.elapsed().as_millis() as u64;

        match outcome {
            Ok(Ok(published)) => match published.as_ref() {
                Some(host) => Ok(Arc::clone(host)),
                None => Err(RenderError::RenderTimeout { waited_ms }),
            },
            Ok(Err(_)) => {
                log::warn!(
                    "Host {} finished layout below {} chars",
                    self.id, min_text_len
                );
                Err(RenderError::RenderTimeout { waited_ms })
            }
            Err(_) => {
                log::warn!("Host {} not ready after {} ms", self.id, waited_ms);
                Err(RenderError::RenderTimeout { waited_ms })
            }
        }
    }
}

impl Drop for OffscreenHost {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
        self.stage.detach(self.id);
        log::debug!("Unmounted host {}", self.id);
    }
}
