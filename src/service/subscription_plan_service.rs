use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use crate::{
    domain::{CreatePlanRequest, SubscriptionPlan, UpdatePlanRequest},
    error::{AppError, Result},
    repository::SubscriptionPlanRepository,
};

pub struct SubscriptionPlanService {
    repo: Arc<dyn SubscriptionPlanRepository>,
}

impl SubscriptionPlanService {
    pub fn new(repo: Arc<dyn SubscriptionPlanRepository>) -> Self {
        Self { repo }
    }

    /// List all plans, newest first
    pub async fn list(&self) -> Result<Vec<SubscriptionPlan>> {
        self.repo.list().await
    }

    pub async fn get(&self, id: Uuid) -> Result<SubscriptionPlan> {
        self.repo
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Plan not found".to_string()))
    }

    pub async fn create(&self, request: CreatePlanRequest) -> Result<SubscriptionPlan> {
        request.validate()?;

        if self.repo.find_by_name(&request.name).await?.is_some() {
            return Err(AppError::Conflict(format!(
                "Plan with name '{}' already exists",
                request.name.trim()
            )));
        }

        let plan = self.repo.create(request).await?;
        tracing::info!("Created subscription plan {} ({})", plan.name, plan.id);
        Ok(plan)
    }

    pub async fn update(&self, id: Uuid, request: UpdatePlanRequest) -> Result<SubscriptionPlan> {
        request.validate()?;

        // Renaming onto another plan's name
        if let Some(ref name) = request.name {
            if let Some(existing) = self.repo.find_by_name(name).await? {
                if existing.id != id {
                    return Err(AppError::Conflict(format!(
                        "Plan with name '{}' already exists",
                        name.trim()
                    )));
                }
            }
        }

        self.repo.update(id, request).await
    }

    pub async fn delete(&self, id: Uuid) -> Result<()> {
        if !self.repo.delete(id).await? {
            return Err(AppError::NotFound("Plan not found".to_string()));
        }
        tracing::info!("Deleted subscription plan {}", id);
        Ok(())
    }
}
