use crate::{
    models::{ApiError, ScanRequest},
    pipeline::Pipeline,
    security::AuthContext,
};
use serde::Serialize;
use std::{collections::HashMap, sync::Arc};
use tokio::{
    sync::{Mutex, mpsc},
    task::JoinHandle,
};
use uuid::Uuid;

/// Single-worker queue for scans submitted asynchronously; statuses are kept
/// in memory for the lifetime of the process.
#[derive(Clone)]
pub struct JobQueue {
    tx: mpsc::Sender<Job>,
    statuses: Arc<Mutex<HashMap<Uuid, JobState>>>,
}

#[derive(Clone)]
struct Job {
    id: Uuid,
    request: ScanRequest,
    context: AuthContext,
}

#[derive(Clone, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum JobState {
    Queued,
    Running,
    Completed {
        result: crate::models::ScanResponse,
    },
    Failed {
        error: String,
        stage: Option<String>,
    },
}

#[derive(Clone, Serialize)]
pub struct JobInfo {
    pub id: String,
    #[serde(flatten)]
    pub state: JobState,
}

impl JobQueue {
    pub fn spawn(pipeline: Pipeline) -> (Self, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::channel::<Job>(queue_capacity_from_env());
        let statuses = Arc::new(Mutex::new(HashMap::new()));
        let statuses_bg = statuses.clone();

        let handle = tokio::spawn(async move {
            while let Some(job) = rx.recv().await {
                {
                    let mut guard = statuses_bg.lock().await;
                    guard.insert(job.id, JobState::Running);
                }

                let result = pipeline.run(job.request, Some(job.context)).await;
                let mut guard = statuses_bg.lock().await;
                match result {
                    Ok(resp) => {
                        guard.insert(job.id, JobState::Completed { result: resp });
                    }
                    Err(err) => {
                        guard.insert(
                            job.id,
                            JobState::Failed {
                                error: err.detail().to_string(),
                                stage: Some(err.stage().to_string()),
                            },
                        );
                    }
                }
            }
        });

        (Self { tx, statuses }, handle)
    }

    pub async fn enqueue_scan(
        &self,
        request: ScanRequest,
        context: AuthContext,
    ) -> Result<Uuid, ApiError> {
        let id = Uuid::new_v4();
        {
            let mut guard = self.statuses.lock().await;
            guard.insert(id, JobState::Queued);
        }
        let job = Job {
            id,
            request,
            context,
        };
        self.tx.send(job).await.map_err(|_| ApiError {
            error: "queue_send_failed".into(),
            detail: Some("worker not available".into()),
        })?;
        Ok(id)
    }

    pub async fn get(&self, id: Uuid) -> Option<JobInfo> {
        let guard = self.statuses.lock().await;
        guard.get(&id).cloned().map(|state| JobInfo {
            id: id.to_string(),
            state,
        })
    }
}

fn queue_capacity_from_env() -> usize {
    std::env::var("QUEUE_CAPACITY")
        .ok()
        .and_then(|v| v.parse::<usize>().ok())
        .filter(|v| *v > 0)
        .unwrap_or(64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{MarketplaceId, ScanMethod, ScanOverrides};

    fn demo_context() -> AuthContext {
        AuthContext {
            org_id: "demo-org".to_string(),
            api_key_id: "key-01".to_string(),
        }
    }

    fn demo_request() -> ScanRequest {
        ScanRequest {
            image_url: Some("https://example.com/item.jpg".to_string()),
            barcode: None,
            scan_method: ScanMethod::Image,
            marketplace: MarketplaceId::EbayUs,
            lookback_days: None,
            include_parts: false,
            overrides: Some(ScanOverrides {
                product_name: Some("Sony Walkman WM-10".to_string()),
                snapshot: None,
            }),
            dry_run: false,
        }
    }

    #[tokio::test]
    async fn enqueued_scan_eventually_completes() {
        let (queue, _worker) = JobQueue::spawn(Pipeline::demo());
        let id = queue
            .enqueue_scan(demo_request(), demo_context())
            .await
            .expect("enqueue");

        for _ in 0..50 {
            if let Some(info) = queue.get(id).await
                && matches!(info.state, JobState::Completed { .. })
            {
                return;
            }
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        }
        panic!("job did not complete");
    }

    #[tokio::test]
    async fn unknown_job_id_is_none() {
        let (queue, _worker) = JobQueue::spawn(Pipeline::demo());
        assert!(queue.get(Uuid::new_v4()).await.is_none());
    }
}
