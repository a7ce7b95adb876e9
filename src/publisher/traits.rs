//! Trait over the remote edits API used to publish a bundle
use async_trait::async_trait;
use std::path::Path;

#[cfg(test)]
use mockall::automock;

use crate::{
    Result,
    publisher::types::{AppEdit, Bundle, Track},
};

/// Operations on a Play edit. Every call after `insert_edit` must receive
/// the id that `insert_edit` returned.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait Publisher: Send + Sync {
    /// Application package every call is scoped to.
    fn package_name(&self) -> String;
    async fn insert_edit(&self) -> Result<AppEdit>;
    async fn upload_bundle(
        &self,
        edit_id: &str,
        bundle_path: &Path,
    ) -> Result<Bundle>;
    async fn update_track(&self, edit_id: &str, track: Track) -> Result<Track>;
    async fn commit_edit(&self, edit_id: &str) -> Result<AppEdit>;
    async fn delete_edit(&self, edit_id: &str) -> Result<()>;
}
