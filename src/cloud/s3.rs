use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use lazy_static::lazy_static;
use log::{debug, info};
use regex::Regex;
use rusoto_core::{ByteStream, RusotoError};
use rusoto_s3::{HeadBucketRequest, HeadObjectRequest, PutObjectRequest, S3Client, S3};

use crate::cloud::{RemoteObject, RemoteStore, UploadOptions};
use crate::errors::ServiceError;
use crate::models::ArtifactMetadata;

const SSE_AES256: &str = "AES256";

lazy_static! {
    static ref XML_CODE: Regex = Regex::new(r"<Code>([^<]+)</Code>").unwrap();
    static ref XML_MESSAGE: Regex = Regex::new(r"<Message>([^<]+)</Message>").unwrap();
}

/// Amazon S3 (or compatible) bucket as a [`RemoteStore`].
pub struct S3Store {
    client: Arc<S3Client>,
    bucket: String,
}

impl S3Store {
    pub fn new(client: Arc<S3Client>, bucket: &str) -> Self {
        Self {
            client,
            bucket: bucket.to_string(),
        }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    fn object_url(&self, key: &str) -> String {
        format!("s3://{}/{}", self.bucket, key)
    }
}

/// Build a [`ServiceError`] from a raw S3 HTTP response.
///
/// HEAD requests carry no body, so the status alone has to do.
fn from_http_response(action: &str, status: u16, body: &str) -> ServiceError {
    let code = XML_CODE.captures(body).map(|c| c[1].to_string());
    let detail = match XML_MESSAGE.captures(body) {
        Some(c) => c[1].to_string(),
        None => match status {
            403 => "access denied".to_string(),
            404 => "no such bucket or key".to_string(),
            429 => "too many requests".to_string(),
            503 => "slow down".to_string(),
            _ => "no error details".to_string(),
        },
    };

    let service = ServiceError::new(format!("{} returned HTTP {}: {}", action, status, detail))
        .with_status(status);
    match code {
        Some(code) => service.with_code(code),
        None => service,
    }
}

/// Map a rusoto failure into a classifiable [`anyhow::Error`].
pub(crate) fn map_rusoto_error<E>(err: RusotoError<E>, action: &str) -> anyhow::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    let service = match err {
        RusotoError::Service(e) => ServiceError::new(format!("{} rejected: {:?}", action, e)),
        RusotoError::HttpDispatch(e) => {
            ServiceError::new(format!("network error during {}: {}", action, e))
        }
        RusotoError::Credentials(e) => {
            ServiceError::new(format!("unauthorized: no usable AWS credentials: {}", e.message))
                .with_code("EAUTH")
        }
        RusotoError::Validation(msg) => {
            ServiceError::new(format!("{} request validation: {}", action, msg))
        }
        RusotoError::Unknown(resp) => {
            from_http_response(action, resp.status.as_u16(), &resp.body_as_str())
        }
        other => ServiceError::new(format!("{}: {}", action, other)),
    };
    anyhow::Error::new(service)
}

#[async_trait]
impl RemoteStore for S3Store {
    async fn verify_connection(&self) -> Result<()> {
        let request = HeadBucketRequest {
            bucket: self.bucket.clone(),
            ..Default::default()
        };
        self.client
            .head_bucket(request)
            .await
            .map_err(|e| map_rusoto_error(e, "bucket check"))?;
        debug!("Bucket {} is reachable", self.bucket);
        Ok(())
    }

    async fn upload(
        &self,
        bytes: &[u8],
        metadata: &ArtifactMetadata,
        options: &UploadOptions,
    ) -> Result<RemoteObject> {
        let key = options.object_key(&metadata.name);

        let mut object_metadata = HashMap::new();
        object_metadata.insert("sha256".to_string(), metadata.checksum.clone());
        object_metadata.insert("format".to_string(), metadata.format.to_string());
        object_metadata.insert("original-size".to_string(), metadata.original_size.to_string());

        let request = PutObjectRequest {
            bucket: self.bucket.clone(),
            key: key.clone(),
            body: Some(ByteStream::from(bytes.to_vec())),
            content_length: Some(bytes.len() as i64),
            content_type: Some(metadata.content_type().to_string()),
            server_side_encryption: options.encrypt.then(|| SSE_AES256.to_string()),
            metadata: Some(object_metadata),
            ..Default::default()
        };

        debug!("Putting {} bytes to {}", bytes.len(), self.object_url(&key));
        self.client
            .put_object(request)
            .await
            .map_err(|e| map_rusoto_error(e, "object put"))?;

        let head = self
            .client
            .head_object(HeadObjectRequest {
                bucket: self.bucket.clone(),
                key: key.clone(),
                ..Default::default()
            })
            .await
            .map_err(|e| map_rusoto_error(e, "object head"))?;

        let size = head.content_length.unwrap_or(0).max(0) as u64;
        info!("Stored {} ({} bytes)", self.object_url(&key), size);

        Ok(RemoteObject {
            remote_url: self.object_url(&key),
            remote_id: key,
            size,
        })
    }
}
