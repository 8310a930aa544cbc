use tracing::instrument;

use classbook_classes::{Class, ClassPatch, NewClass};
use classbook_core::{ClassId, DomainError, Page, PageRequest};

use crate::audit::{AuditAction, AuditEvent};
use crate::error::ServiceResult;
use crate::store::ClassFilter;

use super::{ServiceContext, observe};

/// Class offerings. Sessions inherit their capacity from here.
#[derive(Debug, Clone)]
pub struct ClassCatalog {
    ctx: ServiceContext,
}

impl ClassCatalog {
    pub fn new(ctx: ServiceContext) -> Self {
        Self { ctx }
    }

    #[instrument(skip(self, input), fields(name = %input.name))]
    pub async fn create_class(&self, input: NewClass) -> ServiceResult<Class> {
        let now = self.ctx.clock().now();
        let result: ServiceResult<Class> = async {
            let class = Class::create(ClassId::new(), input, now)?;
            let mut tx = self.ctx.store().begin().await?;
            tx.insert_class(&class).await?;
            tx.commit().await?;
            Ok(class)
        }
        .await;

        let class = observe("create_class", result)?;
        tracing::info!(class_id = %class.id, "class created");
        self.ctx
            .record(AuditEvent::new(AuditAction::ClassCreated, "class", class.id, now));
        Ok(class)
    }

    /// Partial update; nothing is written unless the whole patch validates.
    #[instrument(skip(self, patch), fields(class_id = %id))]
    pub async fn update_class(&self, id: ClassId, patch: ClassPatch) -> ServiceResult<Class> {
        let now = self.ctx.clock().now();
        let result: ServiceResult<Class> = async {
            let mut tx = self.ctx.store().begin().await?;
            let mut class = tx
                .get_class(id)
                .await?
                .ok_or_else(|| DomainError::not_found("class", id))?;
            class.apply_patch(patch, now)?;
            tx.update_class(&class).await?;
            tx.commit().await?;
            Ok(class)
        }
        .await;

        let class = observe("update_class", result)?;
        tracing::info!(status = class.status.as_str(), "class updated");
        self.ctx
            .record(AuditEvent::new(AuditAction::ClassUpdated, "class", id, now));
        Ok(class)
    }

    #[instrument(skip(self), fields(class_id = %id))]
    pub async fn get_class(&self, id: ClassId) -> ServiceResult<Class> {
        let result: ServiceResult<Class> = async {
            let mut tx = self.ctx.store().begin().await?;
            let class = tx
                .get_class(id)
                .await?
                .ok_or_else(|| DomainError::not_found("class", id))?;
            tx.commit().await?;
            Ok(class)
        }
        .await;
        observe("get_class", result)
    }

    /// Ordered by name.
    #[instrument(skip(self))]
    pub async fn list_classes(&self, filter: ClassFilter, page: PageRequest) -> ServiceResult<Page<Class>> {
        let result: ServiceResult<Page<Class>> = async {
            let mut tx = self.ctx.store().begin().await?;
            let page = tx.list_classes(&filter, page).await?;
            tx.commit().await?;
            Ok(page)
        }
        .await;
        observe("list_classes", result)
    }

    /// Archived classes stay readable; their sessions are left untouched.
    #[instrument(skip(self), fields(class_id = %id))]
    pub async fn archive_class(&self, id: ClassId) -> ServiceResult<Class> {
        let now = self.ctx.clock().now();
        let result: ServiceResult<Class> = async {
            let mut tx = self.ctx.store().begin().await?;
            let mut class = tx
                .get_class(id)
                .await?
                .ok_or_else(|| DomainError::not_found("class", id))?;
            class.archive(now);
            tx.update_class(&class).await?;
            tx.commit().await?;
            Ok(class)
        }
        .await;

        let class = observe("archive_class", result)?;
        tracing::info!("class archived");
        self.ctx.record(
            AuditEvent::new(AuditAction::ClassUpdated, "class", id, now).with_details("archived"),
        );
        Ok(class)
    }
}
