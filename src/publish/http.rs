use std::time::Duration;

use async_trait::async_trait;

use crate::core::{Frame, PublishError};
use crate::publish::{FramePublisher, object_key};

/// Uploads frames with `PUT <base_url>/<object key>`.
///
/// ureq is blocking, so each upload runs on tokio's blocking pool.
pub struct HttpPublisher {
    base_url: String,
    token: Option<String>,
    agent: ureq::Agent,
}

impl HttpPublisher {
    pub fn new(base_url: &str, token: Option<String>, timeout: Duration) -> Self {
        // keine trailing slash
        let base_url = base_url.trim_end_matches('/').to_string();
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(Duration::from_secs(5))
            .timeout(timeout)
            .build();
        Self {
            base_url,
            token,
            agent,
        }
    }

    pub fn url_for(&self, key: &str) -> String {
        format!("{}/{}", self.base_url, key)
    }
}

#[async_trait]
impl FramePublisher for HttpPublisher {
    async fn publish_frame(&self, session: &str, frame: &Frame) -> Result<String, PublishError> {
        let key = object_key(session, frame);
        let url = self.url_for(&key);
        let agent = self.agent.clone();
        let token = self.token.clone();
        let payload = frame.payload.clone();
        let content_type = frame.format.content_type();

        let upload_key = key.clone();
        let upload_url = url.clone();
        tokio::task::spawn_blocking(move || {
            let mut request = agent.put(&upload_url).set("Content-Type", content_type);
            if let Some(token) = &token {
                request = request.set("Authorization", &format!("Bearer {}", token));
            }

            match request.send_bytes(&payload) {
                Ok(_) => Ok(()),
                Err(ureq::Error::Status(status, resp)) => {
                    let body = resp.into_string().unwrap_or_default();
                    Err(PublishError::Status {
                        key: upload_key,
                        status,
                        body,
                    })
                }
                Err(e) => Err(PublishError::Transport {
                    key: upload_key,
                    message: e.to_string(),
                }),
            }
        })
        .await
        .map_err(|e| PublishError::with_context(format!("upload task for {}", key), e))??;

        log::info!("[publish] frame uploaded: {}", url);
        Ok(url)
    }
}
