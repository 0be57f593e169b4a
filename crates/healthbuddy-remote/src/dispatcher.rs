//! HTTP implementation of IRemoteDispatcher
//!
//! Resolves each queued operation through the route table, sends it with
//! its idempotency key and classifies the result. No error crosses this
//! boundary: every failure becomes a [`DispatchOutcome`].

use async_trait::async_trait;
use tracing::{debug, info, warn};

use healthbuddy_core::domain::{newtypes::LogicalPath, DispatchOutcome, QueuedOperation};
use healthbuddy_core::ports::IRemoteDispatcher;

use crate::{client::ApiClient, routes, ApiError};

/// Dispatches queued operations to the HealthBuddy API over HTTP
#[derive(Clone)]
pub struct HttpDispatcher {
    client: ApiClient,
}

impl HttpDispatcher {
    /// Creates a dispatcher using `client`
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    /// Returns the underlying API client
    pub fn client(&self) -> &ApiClient {
        &self.client
    }

    async fn try_dispatch(
        &self,
        operation: &QueuedOperation,
    ) -> Result<serde_json::Value, ApiError> {
        let method = routes::resolve(operation.method(), operation.target())?;

        let body = self
            .client
            .send_json(
                method,
                operation.target().as_str(),
                operation.payload(),
                Some(&operation.idempotency_key()),
            )
            .await;

        match body {
            Ok(Some(value)) => Ok(value),
            // 204 or an empty 2xx: the remote accepted the payload as sent
            Ok(None) => Ok(operation.payload().clone()),
            Err(ApiError::InvalidResponse(reason)) => {
                warn!(
                    queue_id = %operation.queue_id(),
                    %reason,
                    "Unparseable success body, keeping queued payload"
                );
                Ok(operation.payload().clone())
            }
            Err(e) => Err(e),
        }
    }
}

#[async_trait]
impl IRemoteDispatcher for HttpDispatcher {
    async fn dispatch(&self, operation: &QueuedOperation) -> DispatchOutcome {
        debug!(
            queue_id = %operation.queue_id(),
            method = %operation.method(),
            target = %operation.target(),
            retry_count = operation.retry_count(),
            "Dispatching operation"
        );

        match self.try_dispatch(operation).await {
            Ok(value) => {
                info!(
                    queue_id = %operation.queue_id(),
                    target = %operation.target(),
                    "Operation accepted"
                );
                DispatchOutcome::Success(value)
            }
            Err(err) => {
                let transient = err.is_transient();
                warn!(
                    queue_id = %operation.queue_id(),
                    target = %operation.target(),
                    transient,
                    error = %err,
                    "Operation failed"
                );
                err.into_outcome()
            }
        }
    }

    async fn fetch(&self, target: &LogicalPath) -> DispatchOutcome {
        if let Err(err) = routes::resolve_fetch(target) {
            return err.into_outcome();
        }

        match self.client.get_json(target.as_str()).await {
            Ok(value) => DispatchOutcome::Success(value),
            Err(err) => {
                debug!(%target, error = %err, "Fetch failed");
                err.into_outcome()
            }
        }
    }
}
