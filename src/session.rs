// src/session.rs
//
// Wires the capture, checkpoint and resolver loops around one buffer and one
// shutdown signal.

use std::sync::Arc;

use anyhow::Context;
use tokio::task::JoinSet;

use crate::config::Config;
use crate::core::{FrameBuffer, Shutdown};
use crate::jobs::{JobQueue, JobResolver};
use crate::producers::{FrameProducer, ProducerHandle, build_source};
use crate::publish::PublisherSet;
use crate::recorder::{Checkpointer, FrameStore, FsFrameStore};

/// The three loops of one capture session, ready to run.
pub struct Session {
    buffer: Arc<FrameBuffer>,
    producer: FrameProducer,
    checkpointer: Checkpointer,
    resolver: JobResolver,
    shutdown: Shutdown,
}

impl Session {
    pub fn new(
        buffer: Arc<FrameBuffer>,
        producer: FrameProducer,
        checkpointer: Checkpointer,
        resolver: JobResolver,
        shutdown: Shutdown,
    ) -> Self {
        Self {
            buffer,
            producer,
            checkpointer,
            resolver,
            shutdown,
        }
    }

    /// Build every collaborator from `cfg`. The job queue is passed in so the
    /// caller decides where jobs come from.
    pub async fn from_config(
        cfg: &Config,
        queue: Arc<dyn JobQueue>,
        shutdown: Shutdown,
    ) -> anyhow::Result<Self> {
        let buffer = Arc::new(FrameBuffer::new(cfg.buffer.capacity));

        let fs_store = FsFrameStore::new(cfg.checkpoint.output_dir.clone());
        let session_dir = fs_store
            .prepare(&cfg.session)
            .await
            .with_context(|| format!("creating session directory for '{}'", cfg.session))?;
        log::info!("[session] writing frames to {}", session_dir.display());
        let store: Arc<dyn FrameStore> = Arc::new(fs_store);

        let source = build_source(&cfg.capture)?;
        log::info!(
            "[session] capture source '{}' every {:?}",
            source.name(),
            cfg.capture.interval()
        );

        let producer = FrameProducer::new(
            source,
            buffer.clone(),
            cfg.capture.interval(),
            shutdown.clone(),
        );
        let checkpointer = Checkpointer::new(
            buffer.clone(),
            store.clone(),
            &cfg.session,
            cfg.checkpoint.interval(),
            shutdown.clone(),
        );
        let resolver = JobResolver::new(
            queue,
            buffer.clone(),
            store,
            Arc::new(PublisherSet::from_config(&cfg.publish)),
            &cfg.session,
            cfg.jobs.batch_size,
            cfg.jobs.poll_interval(),
            shutdown.clone(),
        );

        Ok(Self::new(buffer, producer, checkpointer, resolver, shutdown))
    }

    pub fn buffer(&self) -> Arc<FrameBuffer> {
        self.buffer.clone()
    }

    pub fn producer_handle(&self) -> ProducerHandle {
        self.producer.handle()
    }

    pub fn shutdown(&self) -> Shutdown {
        self.shutdown.clone()
    }

    pub async fn run(self) -> anyhow::Result<()> {
        run_session(self.producer, self.checkpointer, self.resolver, self.shutdown).await
    }
}

/// Runs the loops as separate tasks until all of them have returned.
///
/// The first loop to fail (or panic) triggers `shutdown` for the others; its
/// error is what this returns once every loop has stopped.
pub async fn run_session(
    producer: FrameProducer,
    checkpointer: Checkpointer,
    resolver: JobResolver,
    shutdown: Shutdown,
) -> anyhow::Result<()> {
    let mut loops: JoinSet<(&'static str, anyhow::Result<()>)> = JoinSet::new();
    loops.spawn(async move { ("capture", producer.run().await.map_err(anyhow::Error::from)) });
    loops.spawn(async move { ("checkpoint", checkpointer.run().await) });
    loops.spawn(async move { ("jobs", resolver.run().await) });

    let mut first_error: Option<anyhow::Error> = None;

    while let Some(joined) = loops.join_next().await {
        let (name, result) = match joined {
            Ok(outcome) => outcome,
            Err(e) => ("task", Err(anyhow::Error::new(e).context("loop task panicked"))),
        };

        match result {
            Ok(()) => log::info!("[session] {} loop finished", name),
            Err(e) => {
                log::error!("[session] {} loop failed: {:#}", name, e);
                shutdown.trigger();
                if first_error.is_none() {
                    first_error = Some(e.context(format!("{} loop failed", name)));
                }
            }
        }
    }

    match first_error {
        Some(e) => Err(e),
        None => Ok(()),
    }
}
