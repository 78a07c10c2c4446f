//! Delivery boundary for single and bulk entity notifications.

use crate::Result;
use crate::model::{BulkReport, EntityDetail, ExportRow};
use tracing::info;

/// Receives assembled entities for outbound delivery (mail, webhooks, ...).
///
/// Transports live outside this crate; failures are reported as
/// [`CatalogError::Delivery`](crate::CatalogError::Delivery).
#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
    async fn deliver_one(&self, detail: &EntityDetail) -> Result<()>;

    async fn deliver_bulk(&self, report: &BulkReport) -> Result<()>;
}

/// Notifier that only records deliveries in the trace log.
#[derive(Debug, Clone)]
pub struct LogNotifier {
    recipient: String,
}

impl LogNotifier {
    pub fn new(recipient: impl Into<String>) -> Self {
        Self {
            recipient: recipient.into(),
        }
    }
}

#[async_trait::async_trait]
impl Notifier for LogNotifier {
    async fn deliver_one(&self, detail: &EntityDetail) -> Result<()> {
        let row = ExportRow::from(detail);
        info!(
            recipient = %self.recipient,
            id = row.id,
            name = %row.name,
            category = %row.category_label,
            image = %row.image_url,
            "Notification delivered"
        );
        Ok(())
    }

    async fn deliver_bulk(&self, report: &BulkReport) -> Result<()> {
        let ids: Vec<u32> = report.entities.iter().map(|detail| detail.id).collect();
        info!(
            recipient = %self.recipient,
            count = report.count,
            ids = ?ids,
            "Bulk notification delivered"
        );
        Ok(())
    }
}
