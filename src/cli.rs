//! CLI argument parsing and publisher configuration.
use clap::Parser;
use std::{path::PathBuf, time::Duration};

use crate::{
    Result,
    config::{
        DEFAULT_API_URL, DEFAULT_CREDENTIALS_ENV, DEFAULT_PACKAGE_NAME,
        DEFAULT_TIMEOUT_SECS, DEFAULT_TRACK, PublisherConfig,
    },
    uploader::UploadRequest,
};

/// Bundle produced by the Android release build.
pub const DEFAULT_BUNDLE_PATH: &str = "src-tauri/gen/android/app/build/outputs/bundle/universalRelease/app-universal-release.aab";
/// Releases published from the command line start as drafts.
pub const DEFAULT_CLI_STATUS: &str = "draft";

/// Publish an Android app bundle to a Google Play track.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
    #[arg(long, default_value = DEFAULT_BUNDLE_PATH)]
    /// Path to the .aab file to upload.
    pub bundle: PathBuf,

    #[arg(long, default_value = DEFAULT_TRACK)]
    /// Track to assign the release to (internal, alpha, beta, production,
    /// or a custom closed track).
    pub track: String,

    #[arg(long, default_value = DEFAULT_CLI_STATUS)]
    /// Release status (draft, completed, inProgress, halted).
    pub status: String,

    #[arg(long, default_value = DEFAULT_PACKAGE_NAME)]
    /// Application package name.
    pub package_name: String,

    #[arg(long, default_value = DEFAULT_CREDENTIALS_ENV)]
    /// Env var holding the service-account JSON key.
    pub credentials_env: String,

    #[arg(long, default_value = DEFAULT_API_URL)]
    /// Android Publisher API base url.
    pub api_url: String,

    #[arg(long)]
    /// Token endpoint override. Defaults to the token_uri in the key.
    pub token_uri: Option<String>,

    #[arg(long, default_value_t = DEFAULT_TIMEOUT_SECS)]
    /// Connect/read timeout in seconds for API requests.
    pub timeout_secs: u64,

    #[arg(long, default_value_t = false)]
    /// Delete the open edit if a later step fails.
    pub discard_on_failure: bool,

    #[arg(long, default_value_t = false)]
    /// Enable debug logging.
    pub debug: bool,
}

impl Args {
    /// Resolve arguments into the publisher configuration.
    pub fn publisher_config(&self) -> Result<PublisherConfig> {
        PublisherConfig::builder()
            .package_name(self.package_name.clone())
            .api_url(self.api_url.clone())
            .token_uri(self.token_uri.clone())
            .timeout(Duration::from_secs(self.timeout_secs))
            .credentials_env(self.credentials_env.clone())
            .discard_on_failure(self.discard_on_failure)
            .build()
    }

    /// The bundle, track, and status to publish.
    pub fn upload_request(&self) -> UploadRequest {
        UploadRequest::new(self.bundle.clone())
            .with_track(self.track.clone())
            .with_status(self.status.clone())
    }
}
