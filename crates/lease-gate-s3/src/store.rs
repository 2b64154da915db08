use std::sync::Arc;

use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client as S3Client;
use lease_gate_core::ops::StoreOpener;
use lease_gate_core::{GateError, ObjectStore};
use tracing::{debug, instrument};

/// S3-compatible object store bound to one bucket.
///
/// Works against AWS S3, Cloudflare R2, and MinIO (the latter two via a
/// custom endpoint). All lease-protocol state lives in this bucket: lease
/// objects under `locks/` and the counter object.
#[derive(Clone)]
pub struct S3Store {
    client: S3Client,
    bucket: String,
}

impl S3Store {
    pub fn new(client: S3Client, bucket: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
        }
    }
}

#[async_trait]
impl ObjectStore for S3Store {
    fn store_name(&self) -> &'static str {
        "s3"
    }

    #[instrument(skip(self), level = "debug")]
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, GateError> {
        let result = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await;

        match result {
            Ok(output) => {
                let bytes = output
                    .body
                    .collect()
                    .await
                    .map_err(|e| {
                        GateError::Store(format!("Failed to read S3 object body: {}", e))
                    })?
                    .into_bytes();
                debug!("GET {} ({} bytes)", key, bytes.len());
                Ok(Some(bytes.to_vec()))
            }
            Err(e) => {
                let service_error = e.into_service_error();
                if service_error.is_no_such_key() {
                    Ok(None)
                } else {
                    Err(GateError::Store(format!(
                        "S3 get_object error: {}",
                        service_error
                    )))
                }
            }
        }
    }

    #[instrument(skip(self, data), level = "debug", fields(data_len = data.len()))]
    async fn put(&self, key: &str, data: &[u8]) -> Result<(), GateError> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(data.to_vec()))
            .send()
            .await
            .map_err(|e| GateError::Store(format!("S3 put_object error: {}", e)))?;
        debug!("PUT {} ({} bytes)", key, data.len());
        Ok(())
    }

    #[instrument(skip(self), level = "debug")]
    async fn delete(&self, key: &str) -> Result<bool, GateError> {
        // S3 DeleteObject succeeds whether or not the key exists and gives
        // no feedback either way.
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| GateError::Store(format!("S3 delete_object error: {}", e)))?;
        debug!("DELETE {}", key);
        Ok(true)
    }

    #[instrument(skip(self), level = "debug")]
    async fn list(&self, prefix: &str) -> Result<Vec<String>, GateError> {
        let mut keys = Vec::new();
        let mut continuation_token: Option<String> = None;

        loop {
            let mut request = self
                .client
                .list_objects_v2()
                .bucket(&self.bucket)
                .prefix(prefix);

            if let Some(token) = continuation_token.take() {
                request = request.continuation_token(token);
            }

            let output = request
                .send()
                .await
                .map_err(|e| GateError::Store(format!("S3 list_objects error: {}", e)))?;

            if let Some(contents) = output.contents {
                for obj in contents {
                    if let Some(key) = obj.key {
                        keys.push(key);
                    }
                }
            }

            if output.is_truncated.unwrap_or(false) {
                continuation_token = output.next_continuation_token;
            } else {
                break;
            }
        }

        debug!("LIST {} -> {} keys", prefix, keys.len());
        Ok(keys)
    }
}

/// Opens the event's `bucket_name` as an [`S3Store`] sharing one client.
pub struct S3Opener {
    client: S3Client,
}

impl S3Opener {
    pub fn new(client: S3Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl StoreOpener for S3Opener {
    async fn open(&self, container: &str) -> Result<Arc<dyn ObjectStore>, GateError> {
        Ok(Arc::new(S3Store::new(self.client.clone(), container)) as Arc<dyn ObjectStore>)
    }
}
