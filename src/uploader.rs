//! Publishes one bundle through a single Play edit.
//!
//! The sequence is fixed: open an edit, upload the bundle under it, assign
//! the new version code to a track, commit. Each step needs the result of the
//! one before it and nothing is retried. A failure after the edit is opened
//! leaves that edit uncommitted on the remote side unless discarding was
//! requested.
use color_eyre::eyre::eyre;
use log::*;
use std::{fmt, path::PathBuf};

use crate::{
    Result,
    config::{DEFAULT_STATUS, DEFAULT_TRACK},
    error::UploadStage,
    publisher::{
        traits::Publisher,
        types::{Track, VersionCode},
    },
};


/// What to publish and where.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadRequest {
    pub bundle_path: PathBuf,
    /// Distribution channel, passed through to the API unvalidated.
    pub track: String,
    /// Release status, passed through to the API unvalidated.
    pub status: String,
}

impl UploadRequest {
    /// Request targeting the `internal` track with status `completed`.
    pub fn new(bundle_path: impl Into<PathBuf>) -> Self {
        Self {
            bundle_path: bundle_path.into(),
            track: DEFAULT_TRACK.to_string(),
            status: DEFAULT_STATUS.to_string(),
        }
    }

    pub fn with_track(mut self, track: impl Into<String>) -> Self {
        self.track = track.into();
        self
    }

    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = status.into();
        self
    }
}

/// Progress through a single publish run.
#[derive(Debug, Clone, PartialEq)]
pub enum UploadState {
    Start,
    EditOpened {
        edit_id: String,
    },
    BundleUploaded {
        edit_id: String,
        version_code: VersionCode,
    },
    TrackUpdated {
        edit_id: String,
        version_code: VersionCode,
    },
    Committed(UploadOutcome),
    Failed {
        stage: UploadStage,
        edit_id: Option<String>,
    },
}

impl UploadState {
    /// The step that runs next from this state.
    fn next_stage(&self) -> Option<UploadStage> {
        match self {
            UploadState::Start => Some(UploadStage::OpenEdit),
            UploadState::EditOpened { .. } => Some(UploadStage::UploadBundle),
            UploadState::BundleUploaded { .. } => {
                Some(UploadStage::UpdateTrack)
            }
            UploadState::TrackUpdated { .. } => Some(UploadStage::CommitEdit),
            UploadState::Committed(_) | UploadState::Failed { .. } => None,
        }
    }

    fn edit_id(&self) -> Option<&str> {
        match self {
            UploadState::Start | UploadState::Committed(_) => None,
            UploadState::EditOpened { edit_id }
            | UploadState::BundleUploaded { edit_id, .. }
            | UploadState::TrackUpdated { edit_id, .. } => Some(edit_id),
            UploadState::Failed { edit_id, .. } => edit_id.as_deref(),
        }
    }

    fn failed(&self) -> UploadState {
        UploadState::Failed {
            stage: self.next_stage().unwrap_or(UploadStage::OpenEdit),
            edit_id: self.edit_id().map(|id| id.to_string()),
        }
    }
}

/// Result of a committed publish run.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadOutcome {
    pub edit_id: String,
    pub version_code: VersionCode,
    pub commit_id: String,
    pub track: String,
    pub status: String,
}

impl fmt::Display for UploadOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Version code {} has been uploaded.", self.version_code)?;
        write!(f, "Edit {} has been committed", self.commit_id)
    }
}

/// Diagnostic printed when the bundle upload fails.
pub fn upload_failure_message(package_name: &str) -> String {
    format!(
        "There was an error while uploading a new version of {package_name}"
    )
}

/// Drives a [`Publisher`] through one edit for one bundle.
pub struct ReleaseUploader {
    publisher: Box<dyn Publisher>,
    discard_on_failure: bool,
}

impl ReleaseUploader {
    pub fn new(
        publisher: Box<dyn Publisher>,
        discard_on_failure: bool,
    ) -> Self {
        Self {
            publisher,
            discard_on_failure,
        }
    }

    pub fn package_name(&self) -> String {
        self.publisher.package_name()
    }

    /// Run the whole sequence. Errors are returned exactly as the publisher
    /// produced them.
    pub async fn upload(
        &self,
        request: &UploadRequest,
    ) -> Result<UploadOutcome> {
        let mut state = UploadState::Start;

        loop {
            state = match self.step(state.clone(), request).await {
                Ok(UploadState::Committed(outcome)) => return Ok(outcome),
                Ok(next) => next,
                Err(err) => {
                    let failed = state.failed();
                    self.handle_failure(&failed).await;
                    return Err(err);
                }
            };
        }
    }

    async fn step(
        &self,
        state: UploadState,
        request: &UploadRequest,
    ) -> Result<UploadState> {
        match state {
            UploadState::Start => {
                info!("Sending edit request...");
                let edit = self.publisher.insert_edit().await?;
                info!("Edit {} opened for {}", edit.id, self.package_name());
                debug!("edit expires at {:?}", edit.expiry_time_seconds);
                Ok(UploadState::EditOpened { edit_id: edit.id })
            }
            UploadState::EditOpened { edit_id } => {
                info!("Uploading bundle...");
                let bundle = match self
                    .publisher
                    .upload_bundle(&edit_id, &request.bundle_path)
                    .await
                {
                    Ok(bundle) => bundle,
                    Err(err) => {
                        let package_name = self.package_name();
                        error!("{}", upload_failure_message(&package_name));
                        return Err(err);
                    }
                };
                info!("Version code {} has been uploaded", bundle.version_code);
                if let Some(sha256) = bundle.sha256.as_deref() {
                    debug!("bundle sha256: {sha256}");
                }
                Ok(UploadState::BundleUploaded {
                    edit_id,
                    version_code: bundle.version_code,
                })
            }
            UploadState::BundleUploaded {
                edit_id,
                version_code,
            } => {
                let track = Track::single_release(
                    &request.track,
                    version_code,
                    &request.status,
                );
                info!("Updating track {}...", request.track);
                let response =
                    self.publisher.update_track(&edit_id, track).await?;
                info!("{}", serde_json::to_string(&response)?);
                Ok(UploadState::TrackUpdated {
                    edit_id,
                    version_code,
                })
            }
            UploadState::TrackUpdated {
                edit_id,
                version_code,
            } => {
                let commit = self.publisher.commit_edit(&edit_id).await?;
                info!(
                    "Edit {} has been committed to track {}",
                    commit.id, request.track
                );
                Ok(UploadState::Committed(UploadOutcome {
                    edit_id,
                    version_code,
                    commit_id: commit.id,
                    track: request.track.clone(),
                    status: request.status.clone(),
                }))
            }
            UploadState::Committed(_) | UploadState::Failed { .. } => {
                Err(eyre!("publish run already finished: {state:?}").into())
            }
        }
    }

    async fn handle_failure(&self, failed: &UploadState) {
        let UploadState::Failed { stage, edit_id } = failed else {
            return;
        };

        error!("publish failed during {stage}");

        let Some(edit_id) = edit_id else {
            return;
        };

        if !self.discard_on_failure {
            warn!("edit {edit_id} was left uncommitted");
            return;
        }

        info!("discarding edit {edit_id}");

        if let Err(err) = self.publisher.delete_edit(edit_id).await {
            warn!("failed to discard edit {edit_id}: {err}");
        }
    }
}
