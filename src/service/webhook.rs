use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

use crate::error::{AppError, AppResult};
use crate::models::{CurrentUser, DeliveryWithRelations, References, VerificationOutcome, VerifyInvoiceRequest};
use crate::service::permissions::{self, Action, Module};
use crate::service::reconciliation::ReconciliationService;

/// Uploaded invoice file
#[derive(Debug, Clone)]
pub struct InvoicePdf {
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl InvoicePdf {
    pub fn is_pdf(&self) -> bool {
        self.content_type.as_deref() == Some("application/pdf")
            || self.file_name.to_ascii_lowercase().ends_with(".pdf")
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceUploadResult {
    pub uploaded: bool,
    pub verification: Option<VerificationOutcome>,
}

/// Forwards invoice PDFs to the store's processing webhook, then re-verifies
pub struct InvoiceUploader {
    http: Client,
    reconciliation: Arc<ReconciliationService>,
}

impl InvoiceUploader {
    pub fn new(reconciliation: Arc<ReconciliationService>) -> Self {
        Self {
            http: Client::new(),
            reconciliation,
        }
    }

    pub async fn upload(
        &self,
        user: &CurrentUser,
        delivery_id: i64,
        pdf: InvoicePdf,
    ) -> AppResult<InvoiceUploadResult> {
        permissions::require(user, Module::Reconciliation, Action::Edit)?;
        if !pdf.is_pdf() {
            return Err(AppError::Validation("the invoice must be a PDF file".to_string()));
        }

        let delivery = self.reconciliation.load(user, delivery_id).await?;
        let url = delivery
            .group
            .webhook()
            .ok_or_else(|| AppError::VerificationUnavailable {
                store: delivery.group.name.clone(),
            })?
            .to_string();

        let size = pdf.bytes.len();
        self.post(&url, &delivery, pdf).await?;
        info!(delivery_id, bytes = size, "invoice pdf forwarded");

        self.reconciliation.invalidate(&delivery).await?;
        let verification = self.reverify(user, &delivery).await;

        Ok(InvoiceUploadResult {
            uploaded: true,
            verification,
        })
    }

    async fn post(&self, url: &str, delivery: &DeliveryWithRelations, pdf: InvoicePdf) -> AppResult<()> {
        let settings = self.reconciliation.settings();

        let part = Part::bytes(pdf.bytes)
            .file_name(pdf.file_name)
            .mime_str("application/pdf")
            .map_err(|e| AppError::Internal(e.to_string()))?;
        let form = Form::new()
            .part("file", part)
            .text("supplier", delivery.supplier.name.clone())
            .text("blNumber", delivery.delivery.bl_number.clone().unwrap_or_default())
            .text("type", "Facture");

        let sent = tokio::time::timeout(
            settings.webhook_timeout(),
            self.http.post(url).multipart(form).send(),
        )
        .await;

        let response = match sent {
            Err(_) => {
                warn!(
                    delivery_id = delivery.delivery.id,
                    timeout_secs = settings.webhook_timeout_secs,
                    "invoice webhook timed out"
                );
                return Err(AppError::WebhookTimeout(settings.webhook_timeout_secs));
            }
            Ok(Err(e)) => return Err(AppError::WebhookFailed(e.to_string())),
            Ok(Ok(response)) => response,
        };

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::WebhookFailed(format!(
                "webhook answered {}: {}",
                status.as_u16(),
                body.trim()
            )));
        }
        Ok(())
    }

    /// Failures here never fail the upload
    async fn reverify(
        &self,
        user: &CurrentUser,
        delivery: &DeliveryWithRelations,
    ) -> Option<VerificationOutcome> {
        let refs = References::of_delivery(&delivery.delivery)?;
        delivery
            .group
            .ledger_mapping(delivery.nocodb_config.as_ref())?;

        tokio::time::sleep(self.reconciliation.settings().reverify_delay()).await;
        let request = VerifyInvoiceRequest {
            invoice_reference: refs.invoice_reference,
            bl_number: refs.bl_number,
            force_refresh: true,
        };
        match self
            .reconciliation
            .verify(user, delivery.delivery.id, &request)
            .await
        {
            Ok(outcome) => Some(outcome),
            Err(e) => {
                warn!(delivery_id = delivery.delivery.id, error = %e, "re-verification after upload failed");
                None
            }
        }
    }
}
