//! AWS Bedrock embedding provider.
//!
//! Calls the Bedrock Runtime `InvokeModel` API for Amazon Titan text
//! embedding models, one request per text. Requests are signed with
//! [AWS Signature Version 4](https://docs.aws.amazon.com/IAM/latest/UserGuide/reference_aws-signing.html)
//! using `hmac` + `sha2`, so no AWS SDK is needed.
//!
//! # Configuration
//!
//! ```toml
//! [embedding]
//! provider = "bedrock"
//! model = "amazon.titan-embed-text-v2:0"
//! dims = 1024
//! region = "us-east-1"
//! # url = "https://vpce-123.bedrock-runtime.us-east-1.vpce.amazonaws.com"
//! ```
//!
//! # Environment Variables
//!
//! - `AWS_ACCESS_KEY_ID`: required
//! - `AWS_SECRET_ACCESS_KEY`: required
//! - `AWS_SESSION_TOKEN`: optional (temporary credentials / IAM roles)
//! - `AWS_REGION` / `AWS_DEFAULT_REGION`: used when `region` is not configured

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

use super::{http_client, json_floats, send_with_retry, EmbeddingProvider};
use crate::config::EmbeddingConfig;

type HmacSha256 = Hmac<Sha256>;

const SERVICE: &str = "bedrock";

/// AWS credentials loaded from environment variables.
#[derive(Clone)]
struct AwsCredentials {
    access_key_id: String,
    secret_access_key: String,
    session_token: Option<String>,
}

impl AwsCredentials {
    fn from_env() -> Result<Self> {
        let access_key_id = std::env::var("AWS_ACCESS_KEY_ID")
            .context("AWS_ACCESS_KEY_ID environment variable not set")?;
        let secret_access_key = std::env::var("AWS_SECRET_ACCESS_KEY")
            .context("AWS_SECRET_ACCESS_KEY environment variable not set")?;
        let session_token = std::env::var("AWS_SESSION_TOKEN").ok();

        Ok(Self {
            access_key_id,
            secret_access_key,
            session_token,
        })
    }
}

/// Embedding provider backed by Amazon Titan models on Bedrock.
pub struct BedrockProvider {
    model: String,
    dims: usize,
    region: String,
    /// Scheme-less host used both for the URL and the signed `host` header.
    host: String,
    creds: AwsCredentials,
    max_retries: u32,
    client: reqwest::Client,
}

impl BedrockProvider {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow::anyhow!("embedding.model required for Bedrock provider"))?;
        let region = config
            .region
            .clone()
            .or_else(|| std::env::var("AWS_REGION").ok())
            .or_else(|| std::env::var("AWS_DEFAULT_REGION").ok())
            .ok_or_else(|| {
                anyhow::anyhow!("embedding.region (or AWS_REGION) required for Bedrock provider")
            })?;
        let host = bedrock_host(config.url.as_deref(), &region)?;

        Ok(Self {
            model,
            dims: config.dims.unwrap_or(0),
            region,
            host,
            creds: AwsCredentials::from_env()?,
            max_retries: config.max_retries,
            client: http_client(config)?,
        })
    }

    async fn embed_one(&self, text: &str) -> Result<Vec<f32>> {
        let mut body = serde_json::json!({ "inputText": text });
        if self.dims > 0 {
            body["dimensions"] = serde_json::json!(self.dims);
            body["normalize"] = serde_json::json!(true);
        }
        let payload = serde_json::to_vec(&body)?;
        let path = format!("/model/{}/invoke", uri_encode(&self.model));
        let url = format!("https://{}{}", self.host, path);

        let json = send_with_retry("Bedrock", self.max_retries, || {
            let signed = sign_request(
                &self.creds,
                &self.region,
                &self.host,
                &canonical_uri(&path),
                &payload,
                Utc::now(),
            );

            let mut req = self
                .client
                .post(&url)
                .header("Content-Type", "application/json")
                .header("Accept", "application/json")
                .header("x-amz-date", &signed.amz_date)
                .header("Authorization", &signed.authorization)
                .body(payload.clone());
            if let Some(ref token) = self.creds.session_token {
                req = req.header("x-amz-security-token", token);
            }
            Ok(req)
        })
        .await?;

        parse_titan_response(&json)
    }
}

#[async_trait]
impl EmbeddingProvider for BedrockProvider {
    fn model_name(&self) -> &str {
        &self.model
    }
    fn dims(&self) -> usize {
        self.dims
    }
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            out.push(self.embed_one(text).await?);
        }
        Ok(out)
    }
}

fn parse_titan_response(json: &serde_json::Value) -> Result<Vec<f32>> {
    let embedding = json
        .get("embedding")
        .and_then(|e| e.as_array())
        .ok_or_else(|| anyhow::anyhow!("Invalid Bedrock response: missing embedding array"))?;
    json_floats(embedding)
}

// ============ AWS SigV4 Helpers ============

/// Headers produced by signing a request.
struct SignedRequest {
    amz_date: String,
    authorization: String,
}

/// Compute the Bedrock Runtime hostname, or strip `https://` from a custom
/// endpoint. Requests are always sent over HTTPS, so other schemes are errors.
fn bedrock_host(endpoint: Option<&str>, region: &str) -> Result<String> {
    let Some(endpoint) = endpoint else {
        return Ok(format!("bedrock-runtime.{}.amazonaws.com", region));
    };
    let host = endpoint.strip_prefix("https://").unwrap_or(endpoint);
    if host.contains("://") {
        anyhow::bail!(
            "embedding.url for the Bedrock provider must be an https:// endpoint, got '{}'",
            endpoint
        );
    }
    Ok(host.trim_end_matches('/').to_string())
}

/// Sign a JSON `POST` with SigV4.
fn sign_request(
    creds: &AwsCredentials,
    region: &str,
    host: &str,
    canonical_uri: &str,
    payload: &[u8],
    now: DateTime<Utc>,
) -> SignedRequest {
    let date_stamp = now.format("%Y%m%d").to_string();
    let amz_date = now.format("%Y%m%dT%H%M%SZ").to_string();
    let payload_hash = hex_sha256(payload);

    let mut headers = vec![
        ("content-type".to_string(), "application/json".to_string()),
        ("host".to_string(), host.to_string()),
        ("x-amz-date".to_string(), amz_date.clone()),
    ];
    if let Some(ref token) = creds.session_token {
        headers.push(("x-amz-security-token".to_string(), token.clone()));
    }
    headers.sort_by(|a, b| a.0.cmp(&b.0));

    let signed_headers: String = headers
        .iter()
        .map(|(k, _)| k.as_str())
        .collect::<Vec<_>>()
        .join(";");

    let canonical_headers: String = headers
        .iter()
        .map(|(k, v)| format!("{}:{}\n", k, v))
        .collect();

    let canonical_request = format!(
        "POST\n{}\n\n{}\n{}\n{}",
        canonical_uri, canonical_headers, signed_headers, payload_hash
    );

    let credential_scope = format!("{}/{}/{}/aws4_request", date_stamp, region, SERVICE);
    let string_to_sign = format!(
        "AWS4-HMAC-SHA256\n{}\n{}\n{}",
        amz_date,
        credential_scope,
        hex_sha256(canonical_request.as_bytes())
    );

    let signing_key = derive_signing_key(&creds.secret_access_key, &date_stamp, region, SERVICE);
    let signature = hex::encode(hmac_sha256(&signing_key, string_to_sign.as_bytes()));

    SignedRequest {
        amz_date,
        authorization: format!(
            "AWS4-HMAC-SHA256 Credential={}/{}, SignedHeaders={}, Signature={}",
            creds.access_key_id, credential_scope, signed_headers, signature
        ),
    }
}

/// Canonical URI for non-S3 services: each already-encoded segment is encoded again.
fn canonical_uri(path: &str) -> String {
    path.split('/').map(uri_encode).collect::<Vec<_>>().join("/")
}

fn hex_sha256(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC can take key of any size");
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}

/// Derive the AWS SigV4 signing key for a given date, region, and service.
///
/// ```text
/// kDate    = HMAC("AWS4" + secret, dateStamp)
/// kRegion  = HMAC(kDate, region)
/// kService = HMAC(kRegion, service)
/// kSigning = HMAC(kService, "aws4_request")
/// ```
fn derive_signing_key(secret_key: &str, date_stamp: &str, region: &str, service: &str) -> Vec<u8> {
    let k_date = hmac_sha256(
        format!("AWS4{}", secret_key).as_bytes(),
        date_stamp.as_bytes(),
    );
    let k_region = hmac_sha256(&k_date, region.as_bytes());
    let k_service = hmac_sha256(&k_region, service.as_bytes());
    hmac_sha256(&k_service, b"aws4_request")
}

/// URI-encode a string per RFC 3986; only `A-Z a-z 0-9 - _ . ~` pass through.
fn uri_encode(s: &str) -> String {
    let mut result = String::new();
    for byte in s.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                result.push(byte as char);
            }
            _ => {
                result.push_str(&format!("%{:02X}", byte));
            }
        }
    }
    result
}
