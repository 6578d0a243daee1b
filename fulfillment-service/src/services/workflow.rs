//! Fulfillment workflow: load from the repositories, run the core
//! operation, persist the result.
//!
//! Every write reports whether it reached the remote store. A result that
//! only reached the local cache is returned as [`Freshness::Cached`], never
//! dropped.

use crate::error::{FulfillmentError, Result};
use crate::models::{
    Challan, Color, CreateRequestItem, CustomerRef, ItemStatus, ManufacturingOrder, NewPayment,
    Order, Quality, Request, RequestItem, TaxSummary,
};
use crate::services::challan_ledger::{ChallanLedger, ChallanSource};
use crate::services::conversion::{ConversionEngine, ConversionOutcome};
use crate::services::export::DocumentExporter;
use crate::services::images::{ImageStore, ImageUpload};
use crate::services::item_state::{ItemStateMachine, TransitionPayload};
use crate::services::metrics::{ERRORS_TOTAL, ORDERS_TOTAL};
use crate::services::repository::{Fetched, Freshness, Repository};
use crate::services::tax::TaxCalculator;
use chrono::{NaiveDate, Utc};
use service_core::error::AppError;
use std::sync::Arc;
use tracing::{info, instrument, warn};

fn track(err: &FulfillmentError) {
    ERRORS_TOTAL.with_label_values(&[err.kind()]).inc();
}

/// Repositories the workflow reads and writes.
#[derive(Clone)]
pub struct Repositories {
    pub requests: Arc<dyn Repository<Request>>,
    pub orders: Arc<dyn Repository<Order>>,
    pub challans: Arc<dyn Repository<Challan>>,
    pub qualities: Arc<dyn Repository<Quality>>,
}

#[derive(Clone)]
pub struct FulfillmentService {
    repos: Repositories,
    ledger: ChallanLedger,
    conversion: ConversionEngine,
    images: Arc<dyn ImageStore>,
    exporter: Arc<dyn DocumentExporter>,
}

impl FulfillmentService {
    pub fn new(
        repos: Repositories,
        ledger: ChallanLedger,
        conversion: ConversionEngine,
        images: Arc<dyn ImageStore>,
        exporter: Arc<dyn DocumentExporter>,
    ) -> Self {
        Self {
            repos,
            ledger,
            conversion,
            images,
            exporter,
        }
    }

    pub fn repositories(&self) -> &Repositories {
        &self.repos
    }

    // Requests

    #[instrument(skip(self, customer, items), fields(customer_id = %customer.customer_id))]
    pub async fn create_request(
        &self,
        customer: CustomerRef,
        items: Vec<CreateRequestItem>,
    ) -> Result<Fetched<Request>> {
        let mut request = Request::new(customer);
        request.items = items
            .into_iter()
            .map(RequestItem::new)
            .collect::<Result<Vec<_>>>()
            .inspect_err(track)?;

        let created = self.repos.requests.create(request).await.inspect_err(track)?;
        info!(request_id = %created.value.id, items = created.value.items.len(), "Request created");
        Ok(created)
    }

    pub async fn list_requests(&self, include_archived: bool) -> Result<Fetched<Vec<Request>>> {
        let all = self.repos.requests.load_all().await.inspect_err(track)?;
        Ok(all.map(|requests| {
            requests
                .into_iter()
                .filter(|r| include_archived || !r.archived)
                .collect()
        }))
    }

    pub async fn add_item(
        &self,
        request_id: &str,
        input: CreateRequestItem,
    ) -> Result<Fetched<Request>> {
        let item = RequestItem::new(input).inspect_err(track)?;
        let loaded = self.repos.requests.find(request_id).await.inspect_err(track)?;

        let mut request = loaded.value;
        request.items.push(item);
        request.updated_utc = Utc::now();
        self.save_request(request, loaded.freshness).await
    }

    #[instrument(skip(self, payload))]
    pub async fn transition_item(
        &self,
        request_id: &str,
        item_id: &str,
        target: ItemStatus,
        payload: TransitionPayload,
    ) -> Result<Fetched<Request>> {
        self.change_item(request_id, item_id, |item| {
            ItemStateMachine::transition(item, target, &payload)
        })
        .await
    }

    #[instrument(skip(self, payload))]
    pub async fn override_item(
        &self,
        request_id: &str,
        item_id: &str,
        target: ItemStatus,
        operator: &str,
        payload: TransitionPayload,
    ) -> Result<Fetched<Request>> {
        self.change_item(request_id, item_id, |item| {
            ItemStateMachine::override_transition(item, target, operator, &payload)
        })
        .await
    }

    pub async fn attach_image(
        &self,
        request_id: &str,
        item_id: &str,
        image: ImageUpload,
    ) -> Result<Fetched<Request>> {
        let loaded = self.repos.requests.find(request_id).await.inspect_err(track)?;
        let mut item = loaded
            .value
            .item(item_id)
            .cloned()
            .ok_or_else(|| FulfillmentError::not_found("request item", item_id))
            .inspect_err(track)?;

        let folder = format!("requests/{}", request_id);
        let url = self
            .images
            .upload(image, &folder)
            .await
            .map_err(|e| match e {
                AppError::BadRequest(reason) => {
                    FulfillmentError::ValidationError(reason.to_string())
                }
                other => FulfillmentError::Store(other),
            })
            .inspect_err(track)?;

        item.images.push(url);
        item.updated_utc = Utc::now();
        let mut request = loaded.value;
        request.replace_item(item);
        self.save_request(request, loaded.freshness).await
    }

    /// Convert the request's approved items into vendor orders.
    ///
    /// On a partial failure the updated request is still persisted before
    /// the error is returned.
    #[instrument(skip(self))]
    pub async fn convert_request(&self, request_id: &str) -> Result<ConversionOutcome> {
        let loaded = self.repos.requests.find(request_id).await.inspect_err(track)?;

        match self
            .conversion
            .convert_approved(&loaded.value, self.repos.orders.as_ref())
            .await
        {
            Ok(mut outcome) => {
                let saved = self
                    .repos
                    .requests
                    .replace(outcome.request.clone())
                    .await
                    .inspect_err(track)?;
                outcome.degraded |= saved.is_degraded() || loaded.is_degraded();
                outcome.request = saved.value;
                Ok(outcome)
            }
            Err(FulfillmentError::PartialConversionFailure {
                failed_vendors,
                succeeded_order_ids,
                orders,
                request,
            }) => {
                let saved = self
                    .repos
                    .requests
                    .replace(*request)
                    .await
                    .inspect_err(track)?;
                let err = FulfillmentError::PartialConversionFailure {
                    failed_vendors,
                    succeeded_order_ids,
                    orders,
                    request: Box::new(saved.value),
                };
                track(&err);
                Err(err)
            }
            Err(e) => {
                track(&e);
                Err(e)
            }
        }
    }

    pub async fn archive_request(&self, request_id: &str) -> Result<Fetched<Request>> {
        let loaded = self.repos.requests.find(request_id).await.inspect_err(track)?;
        let mut request = loaded.value;
        request.archived = true;
        request.updated_utc = Utc::now();
        self.save_request(request, loaded.freshness).await
    }

    /// Hard delete. Only for an explicit operator action.
    #[instrument(skip(self))]
    pub async fn delete_request(&self, request_id: &str, operator: &str) -> Result<Fetched<()>> {
        if operator.trim().is_empty() {
            return Err(FulfillmentError::ValidationError(
                "operator is required to delete a request".to_string(),
            ));
        }
        self.repos.requests.find(request_id).await.inspect_err(track)?;
        warn!(request_id, operator, "Request deleted");
        self.repos.requests.delete(request_id).await.inspect_err(track)
    }

    // Challans

    #[instrument(skip(self))]
    pub async fn issue_challan_for_request(
        &self,
        request_id: &str,
        date: NaiveDate,
    ) -> Result<Fetched<Challan>> {
        let loaded = self.repos.requests.find(request_id).await.inspect_err(track)?;
        if let Some(link) = &loaded.value.challan {
            let err = FulfillmentError::ValidationError(format!(
                "request {} already has challan {}",
                request_id, link.challan_number
            ));
            track(&err);
            return Err(err);
        }

        let issued = self
            .issue(ChallanSource::Request(&loaded.value), date)
            .await?;
        let request = ChallanLedger::link_request(&loaded.value, &issued.value).inspect_err(track)?;
        let saved = self
            .repos
            .requests
            .replace(request)
            .await
            .inspect_err(track)?;

        Ok(Fetched {
            freshness: issued.freshness.combine(saved.freshness),
            value: issued.value,
        })
    }

    pub async fn issue_challan_for_order(
        &self,
        order_id: &str,
        date: NaiveDate,
    ) -> Result<Fetched<Challan>> {
        let order = self.repos.orders.find(order_id).await.inspect_err(track)?;
        let issued = self.issue(ChallanSource::Order(&order.value), date).await?;
        Ok(Fetched {
            freshness: issued.freshness.combine(order.freshness),
            value: issued.value,
        })
    }

    pub async fn issue_challan_for_manufacturing(
        &self,
        production: &ManufacturingOrder,
        date: NaiveDate,
    ) -> Result<Fetched<Challan>> {
        self.issue(ChallanSource::ManufacturingOrder(production), date)
            .await
    }

    async fn issue(&self, source: ChallanSource<'_>, date: NaiveDate) -> Result<Fetched<Challan>> {
        let existing = self.repos.challans.load_all().await.inspect_err(track)?;
        let number = ChallanLedger::next_challan_number(&existing.value, date);
        let challan = self
            .ledger
            .create_from_source(source, number, date)
            .inspect_err(track)?;
        let created = self.repos.challans.create(challan).await.inspect_err(track)?;
        Ok(Fetched {
            freshness: created.freshness.combine(existing.freshness),
            value: created.value,
        })
    }

    #[instrument(skip(self, payment), fields(amount = %payment.amount))]
    pub async fn record_payment(
        &self,
        challan_id: &str,
        payment: NewPayment,
    ) -> Result<Fetched<Challan>> {
        let loaded = self.repos.challans.find(challan_id).await.inspect_err(track)?;
        let updated = self
            .ledger
            .record_payment(&loaded.value, payment)
            .inspect_err(track)?;
        self.save_challan(updated, loaded.freshness).await
    }

    /// Convert a paid challan into a finalized order. The order is written
    /// before the challan, so a failed order write leaves the challan paid.
    #[instrument(skip(self))]
    pub async fn convert_challan(&self, challan_id: &str) -> Result<Fetched<(Challan, Order)>> {
        let loaded = self.repos.challans.find(challan_id).await.inspect_err(track)?;
        let (challan, order) = self
            .ledger
            .convert_to_invoice(&loaded.value)
            .inspect_err(track)?;

        let order = self.repos.orders.create(order).await.inspect_err(track)?;
        ORDERS_TOTAL
            .with_label_values(&[order.value.vendor.kind(), "challan"])
            .inc();
        let challan = self
            .save_challan(challan, loaded.freshness.combine(order.freshness))
            .await?;

        Ok(challan.map(|c| (c, order.value)))
    }

    #[instrument(skip(self))]
    pub async fn cancel_challan(&self, challan_id: &str) -> Result<Fetched<Challan>> {
        let loaded = self.repos.challans.find(challan_id).await.inspect_err(track)?;
        let cancelled = self.ledger.cancel(&loaded.value).inspect_err(track)?;
        self.save_challan(cancelled, loaded.freshness).await
    }

    pub async fn export_challan(&self, challan_id: &str) -> Result<Vec<u8>> {
        let loaded = self.repos.challans.find(challan_id).await.inspect_err(track)?;
        Ok(self.exporter.export_challan(&loaded.value)?)
    }

    pub async fn export_order(&self, order_id: &str) -> Result<Vec<u8>> {
        let loaded = self.repos.orders.find(order_id).await.inspect_err(track)?;
        Ok(self.exporter.export_order(&loaded.value)?)
    }

    pub async fn tax_summary(&self, from: NaiveDate, to: NaiveDate) -> Result<Fetched<TaxSummary>> {
        if from > to {
            return Err(FulfillmentError::ValidationError(format!(
                "invalid period {} to {}",
                from, to
            )));
        }
        let challans = self.repos.challans.load_all().await.inspect_err(track)?;
        Ok(challans.map(|all| TaxCalculator::summarize(&all, from, to)))
    }

    // Quality catalog

    pub async fn create_quality(
        &self,
        name: &str,
        colors: Vec<Color>,
    ) -> Result<Fetched<Quality>> {
        let quality = Quality::new(name, colors).inspect_err(track)?;
        self.repos.qualities.create(quality).await.inspect_err(track)
    }

    pub async fn add_color(&self, quality_id: &str, color: Color) -> Result<Fetched<Quality>> {
        let loaded = self.repos.qualities.find(quality_id).await.inspect_err(track)?;
        let mut quality = loaded.value;
        quality.add_color(color).inspect_err(track)?;
        let saved = self.repos.qualities.replace(quality).await.inspect_err(track)?;
        Ok(Fetched {
            freshness: saved.freshness.combine(loaded.freshness),
            value: saved.value,
        })
    }

    async fn change_item<F>(
        &self,
        request_id: &str,
        item_id: &str,
        change: F,
    ) -> Result<Fetched<Request>>
    where
        F: FnOnce(&RequestItem) -> Result<RequestItem>,
    {
        let loaded = self.repos.requests.find(request_id).await.inspect_err(track)?;
        let item = loaded
            .value
            .item(item_id)
            .ok_or_else(|| FulfillmentError::not_found("request item", item_id))
            .inspect_err(track)?;
        let updated = change(item).inspect_err(track)?;

        let mut request = loaded.value;
        request.replace_item(updated);
        self.save_request(request, loaded.freshness).await
    }

    async fn save_request(&self, request: Request, read: Freshness) -> Result<Fetched<Request>> {
        let saved = self.repos.requests.replace(request).await.inspect_err(track)?;
        Ok(Fetched {
            freshness: saved.freshness.combine(read),
            value: saved.value,
        })
    }

    async fn save_challan(&self, challan: Challan, read: Freshness) -> Result<Fetched<Challan>> {
        let saved = self.repos.challans.replace(challan).await.inspect_err(track)?;
        Ok(Fetched {
            freshness: saved.freshness.combine(read),
            value: saved.value,
        })
    }
}
