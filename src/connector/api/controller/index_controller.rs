use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::domain::{Repository, Stage};

use super::super::Container;

/// Drives a full or incremental ingestion pass, rendering the
/// `ProgressEvent` stream to a terminal progress bar instead of serializing
/// it as SSE the way a remote client would consume it.
pub struct IndexController<'a> {
    container: &'a Container,
}

impl<'a> IndexController<'a> {
    pub fn new(container: &'a Container) -> Self {
        Self { container }
    }

    pub async fn index(&self, path: String, name: Option<String>, incremental: bool) -> Result<String> {
        let (tx, mut rx) = mpsc::channel(64);
        let cancellation = CancellationToken::new();

        let bar = ProgressBar::new(100);
        bar.set_style(
            ProgressStyle::with_template("{spinner} [{bar:40}] {pos}/100 {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar()),
        );

        let run = if incremental {
            let use_case = self.container.incremental_index_use_case();
            let repo_cancel = cancellation.clone();
            tokio::spawn(async move { use_case.execute(&path, repo_cancel, tx).await })
        } else {
            let use_case = self.container.index_use_case();
            let repo_cancel = cancellation.clone();
            tokio::spawn(async move { use_case.execute(&path, name.as_deref(), repo_cancel, tx).await })
        };

        loop {
            tokio::select! {
                event = rx.recv() => {
                    let Some(event) = event else { break };
                    bar.set_position(event.percentage as u64);
                    bar.set_message(format!("{:?}: {}", event.stage, event.message));
                    if event.stage == Stage::Failed {
                        bar.abandon();
                    }
                }
                _ = tokio::signal::ctrl_c() => {
                    bar.println("cancelling (finishing current batch)...");
                    cancellation.cancel();
                }
            }
        }

        let repository = run
            .await
            .map_err(|e| anyhow::anyhow!("ingestion task panicked: {e}"))??;

        bar.finish_and_clear();
        Ok(self.format_index_success(&repository))
    }

    fn format_index_success(&self, repo: &Repository) -> String {
        format!(
            "Successfully indexed repository: {} ({} files, {} chunks)",
            repo.name(),
            repo.file_count(),
            repo.chunk_count()
        )
    }
}
