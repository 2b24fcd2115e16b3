use async_trait::async_trait;

use scholar_types::api::{MessageResponse, PaymentSubmission};
use scholar_types::{Payment, PaymentKind};

use crate::api::HttpClient;
use crate::error::ClientError;

#[async_trait]
pub trait PaymentsApi: Send + Sync {
    /// Newest first.
    async fn history(&self) -> Result<Vec<Payment>, ClientError>;
    async fn submit(
        &self,
        kind: PaymentKind,
        control_number: &str,
    ) -> Result<MessageResponse, ClientError>;
}

#[async_trait]
impl PaymentsApi for HttpClient {
    async fn history(&self) -> Result<Vec<Payment>, ClientError> {
        self.get_json("/payment/history").await
    }

    async fn submit(
        &self,
        kind: PaymentKind,
        control_number: &str,
    ) -> Result<MessageResponse, ClientError> {
        let control_number = Some(control_number.to_string());
        let (path, body) = match kind {
            PaymentKind::University => (
                "/payment/submit-fee",
                PaymentSubmission {
                    fee_control_number: control_number,
                    ..Default::default()
                },
            ),
            PaymentKind::Nhif => (
                "/payment/submit-nhif",
                PaymentSubmission {
                    nhif_control_number: control_number,
                    ..Default::default()
                },
            ),
        };
        self.post_json(path, &body).await
    }
}
