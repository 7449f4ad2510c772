//! AWS SDK setup and the S3-backed [`Storage`].

#[cfg(feature = "cli")]
use crate::config::cli::LocalStorage;
use crate::config::toml_config::AwsConfig;
use crate::domain::ports::Storage;
use crate::utils::error::{AnalysisError, Result};
use aws_config::sts::AssumeRoleProvider;
use aws_config::{BehaviorVersion, Region, SdkConfig};
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::ServerSideEncryption;
use aws_sdk_s3::Client as S3Client;

const ROLE_SESSION_NAME: &str = "med-record-analysis";

/// Shared SDK configuration pinned to the configured region. With a
/// cross-account role set, credentials come from STS AssumeRole.
pub async fn load_sdk_config(aws: &AwsConfig) -> SdkConfig {
    let region = Region::new(aws.region.clone());
    let base = aws_config::defaults(BehaviorVersion::latest())
        .region(region.clone())
        .load()
        .await;

    match &aws.cross_account_role_arn {
        Some(role_arn) => {
            tracing::info!("Assuming cross-account role {}", role_arn);
            let provider = AssumeRoleProvider::builder(role_arn)
                .session_name(ROLE_SESSION_NAME)
                .configure(&base)
                .build()
                .await;
            aws_config::defaults(BehaviorVersion::latest())
                .region(region)
                .credentials_provider(provider)
                .load()
                .await
        }
        None => base,
    }
}

/// S3 client honouring an endpoint override (LocalStack and similar).
pub fn s3_client(sdk: &SdkConfig, aws: &AwsConfig) -> S3Client {
    let mut builder = aws_sdk_s3::config::Builder::from(sdk);
    if let Some(endpoint) = &aws.s3_endpoint_url {
        tracing::info!("Using S3 endpoint override {}", endpoint);
        builder = builder.endpoint_url(endpoint).force_path_style(true);
    }
    S3Client::from_conf(builder.build())
}

#[derive(Debug, Clone)]
pub struct S3Storage {
    client: S3Client,
    bucket: String,
}

impl S3Storage {
    pub fn new(client: S3Client, bucket: String) -> Self {
        Self { client, bucket }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }
}

fn s3_error<E>(operation: &str, key: &str, err: &E) -> AnalysisError
where
    E: std::error::Error + 'static,
{
    let err = AnalysisError::storage(format!(
        "{} failed for '{}': {}",
        operation,
        key,
        DisplayErrorContext(err)
    ));
    tracing::error!("{}", err);
    err
}

impl Storage for S3Storage {
    async fn read_file(&self, path: &str) -> Result<Vec<u8>> {
        let resp = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(path)
            .send()
            .await
            .map_err(|e| s3_error("GetObject", path, &e))?;

        let data = resp
            .body
            .collect()
            .await
            .map_err(|e| s3_error("GetObject body", path, &e))?;

        Ok(data.into_bytes().to_vec())
    }

    async fn write_file(&self, path: &str, data: &[u8]) -> Result<()> {
        let content_type = if path.ends_with(".json") {
            "application/json"
        } else {
            "application/octet-stream"
        };

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(path)
            .content_type(content_type)
            .server_side_encryption(ServerSideEncryption::Aes256)
            .body(ByteStream::from(data.to_vec()))
            .send()
            .await
            .map_err(|e| s3_error("PutObject", path, &e))?;

        tracing::debug!("Wrote {} bytes to s3://{}/{}", data.len(), self.bucket, path);
        Ok(())
    }

    async fn list_keys(&self, prefix: &str) -> Result<Vec<String>> {
        let mut pages = self
            .client
            .list_objects_v2()
            .bucket(&self.bucket)
            .prefix(prefix)
            .into_paginator()
            .send();

        let mut keys = Vec::new();
        while let Some(page) = pages.next().await {
            let page = page.map_err(|e| s3_error("ListObjectsV2", prefix, &e))?;
            keys.extend(page.contents().iter().filter_map(|o| o.key().map(str::to_string)));
        }
        Ok(keys)
    }
}

/// Storage picked at startup: S3, or a local directory for the CLI.
#[derive(Debug, Clone)]
pub enum StorageBackend {
    S3(S3Storage),
    #[cfg(feature = "cli")]
    Local(LocalStorage),
}

impl Storage for StorageBackend {
    async fn read_file(&self, path: &str) -> Result<Vec<u8>> {
        match self {
            Self::S3(s3) => s3.read_file(path).await,
            #[cfg(feature = "cli")]
            Self::Local(local) => local.read_file(path).await,
        }
    }

    async fn write_file(&self, path: &str, data: &[u8]) -> Result<()> {
        match self {
            Self::S3(s3) => s3.write_file(path, data).await,
            #[cfg(feature = "cli")]
            Self::Local(local) => local.write_file(path, data).await,
        }
    }

    async fn list_keys(&self, prefix: &str) -> Result<Vec<String>> {
        match self {
            Self::S3(s3) => s3.list_keys(prefix).await,
            #[cfg(feature = "cli")]
            Self::Local(local) => local.list_keys(prefix).await,
        }
    }
}

impl StorageBackend {
    pub fn describe(&self) -> String {
        match self {
            Self::S3(s3) => format!("s3://{}", s3.bucket()),
            #[cfg(feature = "cli")]
            Self::Local(local) => local.base_path().to_string(),
        }
    }
}
