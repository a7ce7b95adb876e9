//! Implements the Publisher trait for the Android Publisher v3 API
use async_trait::async_trait;
use log::*;
use reqwest::{
    Body, Client, Request, Response, StatusCode, Url,
    header::{
        AUTHORIZATION, CONTENT_LENGTH, CONTENT_TYPE, HeaderMap, HeaderValue,
    },
};
use secrecy::ExposeSecret;
use serde::de::DeserializeOwned;
use std::path::Path;
use tokio::fs::File;

use crate::{
    config::PublisherConfig,
    credentials::{AccessToken, ServiceAccountCredentials},
    error::{PublishError, Result, UploadStage},
    publisher::{
        traits::Publisher,
        types::{AppEdit, Bundle, Track},
    },
};

const BUNDLE_MIME_TYPE: &str = "application/octet-stream";
const API_PATH: [&str; 3] = ["androidpublisher", "v3", "applications"];
const UPLOAD_PATH: [&str; 4] =
    ["upload", "androidpublisher", "v3", "applications"];

/// Google Play client using reqwest for the edits, bundles, and tracks
/// resources of a single application.
pub struct GooglePlay {
    config: PublisherConfig,
    client: Client,
}

impl GooglePlay {
    /// Authenticate with the service account and build a client scoped to
    /// the configured package.
    pub async fn new(
        config: PublisherConfig,
        credentials: &ServiceAccountCredentials,
    ) -> Result<Self> {
        let auth_client = Client::builder().timeout(config.timeout).build()?;

        info!(
            "authenticating as {} for {}",
            credentials.client_email(),
            config.package_name
        );

        let token = credentials.fetch_token(&auth_client).await?;

        Self::with_token(config, token)
    }

    /// Build a client around an already issued access token.
    ///
    /// The client only bounds connecting and each read. JSON calls get the
    /// full request timeout on top; bundle uploads do not, so a large bundle
    /// on a slow link can still finish.
    pub fn with_token(
        config: PublisherConfig,
        token: AccessToken,
    ) -> Result<Self> {
        let mut headers = HeaderMap::new();

        let mut token_value = HeaderValue::from_str(
            format!("Bearer {}", token.token.expose_secret()).as_str(),
        )?;
        token_value.set_sensitive(true);

        headers.append(AUTHORIZATION, token_value);

        let client = Client::builder()
            .default_headers(headers)
            .connect_timeout(config.timeout)
            .read_timeout(config.timeout)
            .build()?;

        Ok(Self { config, client })
    }

    /// Url under the package resource. Each segment is percent-encoded on
    /// its own, so `/`, `?` and `#` in a track name or edit id stay inside
    /// that segment.
    fn resource_url(&self, root: &[&str], segments: &[&str]) -> Result<Url> {
        let mut url = self.config.api_url.clone();

        {
            let mut path = url.path_segments_mut().map_err(|_| {
                PublishError::invalid_config(format!(
                    "api url cannot carry a path: {}",
                    self.config.api_url
                ))
            })?;
            path.pop_if_empty().extend(root);
            path.push(path_segment(&self.config.package_name)?);
            for segment in segments {
                path.push(path_segment(segment)?);
            }
        }

        Ok(url)
    }

    fn edits_url(&self) -> Result<Url> {
        self.resource_url(&API_PATH, &["edits"])
    }

    fn edit_url(&self, edit_id: &str) -> Result<Url> {
        self.resource_url(&API_PATH, &["edits", edit_id])
    }

    fn commit_url(&self, edit_id: &str) -> Result<Url> {
        let commit = format!("{}:commit", path_segment(edit_id)?);
        self.resource_url(&API_PATH, &["edits", commit.as_str()])
    }

    fn track_url(&self, edit_id: &str, track: &str) -> Result<Url> {
        self.resource_url(&API_PATH, &["edits", edit_id, "tracks", track])
    }

    fn bundle_upload_url(&self, edit_id: &str) -> Result<Url> {
        let mut url =
            self.resource_url(&UPLOAD_PATH, &["edits", edit_id, "bundles"])?;
        url.query_pairs_mut().append_pair("uploadType", "media");
        Ok(url)
    }

    fn insert_edit_request(&self) -> Result<Request> {
        Ok(self
            .client
            .post(self.edits_url()?)
            .timeout(self.config.timeout)
            .json(&serde_json::json!({}))
            .build()?)
    }

    async fn upload_bundle_request(
        &self,
        edit_id: &str,
        bundle_path: &Path,
    ) -> Result<Request> {
        let read_error =
            |source: std::io::Error| PublishError::BundleReadError {
                path: bundle_path.to_path_buf(),
                source,
            };

        let file = File::open(bundle_path).await.map_err(read_error)?;
        let size = file.metadata().await.map_err(read_error)?.len();

        debug!("uploading {} ({size} bytes)", bundle_path.display());

        Ok(self
            .client
            .post(self.bundle_upload_url(edit_id)?)
            .header(CONTENT_TYPE, BUNDLE_MIME_TYPE)
            .header(CONTENT_LENGTH, size)
            .body(Body::from(file))
            .build()?)
    }

    fn update_track_request(
        &self,
        edit_id: &str,
        track: &Track,
    ) -> Result<Request> {
        Ok(self
            .client
            .put(self.track_url(edit_id, &track.track)?)
            .timeout(self.config.timeout)
            .json(track)
            .build()?)
    }

    fn commit_edit_request(&self, edit_id: &str) -> Result<Request> {
        Ok(self
            .client
            .post(self.commit_url(edit_id)?)
            .timeout(self.config.timeout)
            .header(CONTENT_LENGTH, 0)
            .build()?)
    }

    fn delete_edit_request(&self, edit_id: &str) -> Result<Request> {
        Ok(self
            .client
            .delete(self.edit_url(edit_id)?)
            .timeout(self.config.timeout)
            .build()?)
    }
}

/// Empty and dot segments cannot name a resource.
fn path_segment(value: &str) -> Result<&str> {
    match value {
        "" | "." | ".." => Err(PublishError::invalid_config(format!(
            "{value:?} is not a usable path segment"
        ))),
        _ => Ok(value),
    }
}

/// Turn a Play API response into `T`, or into an error tagged with `stage`.
async fn parse_response<T: DeserializeOwned>(
    stage: UploadStage,
    response: Response,
) -> Result<T> {
    let status = response.status();
    let body = response.text().await?;

    if !status.is_success() {
        return Err(status_error(stage, status, &body));
    }

    debug!("{stage} response: {body}");

    Ok(serde_json::from_str(&body)?)
}

fn status_error(
    stage: UploadStage,
    status: StatusCode,
    body: &str,
) -> PublishError {
    let message = api_error_message(body);

    if status == StatusCode::UNAUTHORIZED {
        return PublishError::Unauthorized { stage, message };
    }

    PublishError::api(stage, status.as_u16(), message)
}

/// Google wraps failures as `{"error": {"message": ...}}`; fall back to the
/// raw body for anything else.
fn api_error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|value| {
            value["error"]["message"].as_str().map(|m| m.to_string())
        })
        .unwrap_or_else(|| body.trim().to_string())
}

#[async_trait]
impl Publisher for GooglePlay {
    fn package_name(&self) -> String {
        self.config.package_name.clone()
    }

    async fn insert_edit(&self) -> Result<AppEdit> {
        let request = self.insert_edit_request()?;
        let response = self.client.execute(request).await?;
        parse_response(UploadStage::OpenEdit, response).await
    }

    async fn upload_bundle(
        &self,
        edit_id: &str,
        bundle_path: &Path,
    ) -> Result<Bundle> {
        let request = self.upload_bundle_request(edit_id, bundle_path).await?;
        let response = self.client.execute(request).await?;
        parse_response(UploadStage::UploadBundle, response).await
    }

    async fn update_track(&self, edit_id: &str, track: Track) -> Result<Track> {
        let request = self.update_track_request(edit_id, &track)?;
        let response = self.client.execute(request).await?;
        parse_response(UploadStage::UpdateTrack, response).await
    }

    async fn commit_edit(&self, edit_id: &str) -> Result<AppEdit> {
        let request = self.commit_edit_request(edit_id)?;
        let response = self.client.execute(request).await?;
        parse_response(UploadStage::CommitEdit, response).await
    }

    async fn delete_edit(&self, edit_id: &str) -> Result<()> {
        let request = self.delete_edit_request(edit_id)?;
        let response = self.client.execute(request).await?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(status_error(UploadStage::DiscardEdit, status, &body));
        }

        Ok(())
    }
}
