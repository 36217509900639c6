//! Read-only exercise catalog and workout history
//!
//! These endpoints share the gateway and its error classification but sit
//! outside the session state machine.

use std::sync::Arc;

use url::Url;

use crate::gateway::HttpGateway;
use crate::models::{Exercise, HistoryDay};
use crate::Result;

#[derive(Clone)]
pub struct Catalog {
    gateway: Arc<HttpGateway>,
}

impl Catalog {
    pub fn new(gateway: Arc<HttpGateway>) -> Self {
        Self { gateway }
    }

    /// Muscle group names, `GET /groups`
    pub async fn groups(&self) -> Result<Vec<String>> {
        self.gateway.get("/groups", None).await
    }

    /// `GET /exercises/bygroup/:group`
    pub async fn exercises_by_group(&self, group: &str) -> Result<Vec<Exercise>> {
        let exercises: Vec<Exercise> = self
            .gateway
            .get_resource("/exercises/bygroup", &[group], None)
            .await?;

        tracing::debug!(group = %group, count = exercises.len(), "Loaded exercises");

        Ok(exercises)
    }

    /// `GET /exercises/:id`
    pub async fn exercise(&self, exercise_id: &str) -> Result<Exercise> {
        self.gateway
            .get_resource("/exercises", &[exercise_id], None)
            .await
    }

    /// Workout history grouped by day, `GET /history`
    pub async fn history(&self) -> Result<Vec<HistoryDay>> {
        self.gateway.get("/history", None).await
    }

    pub fn demo_url(&self, exercise: &Exercise) -> Result<Url> {
        self.gateway.exercise_demo_url(&exercise.demo)
    }

    pub fn thumb_url(&self, exercise: &Exercise) -> Result<Url> {
        self.gateway.exercise_thumb_url(&exercise.thumb)
    }
}
