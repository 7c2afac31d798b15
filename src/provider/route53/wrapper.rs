#![cfg_attr(test, allow(dead_code))]

use aws_config::{meta::region::RegionProviderChain, BehaviorVersion};
use aws_sdk_route53::{
    config::Region,
    error::DisplayErrorContext,
    types::{Change, ChangeAction, ChangeBatch, ResourceRecordSet},
    Client,
};
use log::{debug, trace};
use tokio::runtime::Runtime;

use super::Route53ProviderConfig;
use crate::provider::{ProviderError, RecordSet, RecordType};

// Route53 is a global service, but the SDK still wants a region to sign requests with
const ROUTE53_FALLBACK_REGION: &str = "us-east-1";
const ROUTE53_RECORD_PAGE_SIZE: i32 = 300;
const ROUTE53_HOSTED_ZONE_PREFIX: &str = "/hostedzone/";

/// A single page returned by a paginated Route53 listing, plus the position of the next page (if any)
struct Page<R, T> {
    items: Vec<R>,
    next: Option<T>,
}

// Perform a paged request by repeatedly calling the provided request fun.
// The callback receives the continuation token of the previous page (None for the first one).
// Stops once no token is returned or at least `limit` items have been collected.
fn paged_request<R, T>(
    limit: Option<usize>,
    request: &mut dyn FnMut(Option<T>) -> Result<Page<R, T>, ProviderError>,
) -> Result<Vec<R>, ProviderError> {
    // Initial failures are never good, return quickly
    let mut page = request(None)?;
    let mut items = page.items;

    while let Some(next) = page.next {
        if limit.is_some_and(|l| items.len() >= l) {
            break;
        }
        page = request(Some(next))?;
        items.append(&mut page.items);
    }
    if let Some(l) = limit {
        items.truncate(l);
    }
    Ok(items)
}

/// Internal wrapper around the Route53 API. Blocks on the async SDK and follows paginated listings.
///
/// The AWS SDK is async-only. The wrapper owns a single-threaded runtime and blocks on every call,
/// so that the rest of the crate stays synchronous.
pub struct Route53Wrapper {
    client: Client,
    runtime: Runtime,
}

impl Route53Wrapper {
    pub fn find_zone_id(&self, domain: &str) -> Result<Option<String>, ProviderError> {
        let wanted = domain.trim_end_matches('.');
        let response = self
            .runtime
            .block_on(
                self.client
                    .list_hosted_zones_by_name()
                    .dns_name(wanted)
                    .send(),
            )
            .map_err(|e| format!("Unable to list hosted zones: {}", DisplayErrorContext(e)))?;
        trace!("Hosted zones by name {}: {:?}", wanted, response.hosted_zones());

        // Zones are sorted by name starting at `wanted`, so an exact match is always on the first page
        Ok(response
            .hosted_zones()
            .iter()
            .find(|z| z.name().trim_end_matches('.').eq_ignore_ascii_case(wanted))
            .map(|z| {
                z.id()
                    .strip_prefix(ROUTE53_HOSTED_ZONE_PREFIX)
                    .unwrap_or(z.id())
                    .to_owned()
            }))
    }

    pub fn list_record_sets(
        &self,
        zone_id: &str,
        start: Option<(String, RecordType)>,
        limit: Option<usize>,
    ) -> Result<Vec<RecordSet>, ProviderError> {
        let page_size = limit
            .and_then(|l| i32::try_from(l).ok())
            .map_or(ROUTE53_RECORD_PAGE_SIZE, |l| l.min(ROUTE53_RECORD_PAGE_SIZE));

        let sets = paged_request::<ResourceRecordSet, (String, String)>(limit, &mut |position| {
            let mut request = self
                .client
                .list_resource_record_sets()
                .hosted_zone_id(zone_id)
                .max_items(page_size);
            match (&position, &start) {
                (Some((name, kind)), _) => {
                    request = request
                        .start_record_name(name)
                        .start_record_type(kind.as_str().into());
                }
                (None, Some((name, kind))) => {
                    request = request
                        .start_record_name(name)
                        .start_record_type((*kind).into());
                }
                (None, None) => {}
            }

            let response = self.runtime.block_on(request.send()).map_err(|e| {
                format!(
                    "Unable to list record sets of zone {}: {}",
                    zone_id,
                    DisplayErrorContext(e)
                )
            })?;

            let next = match (response.is_truncated(), response.next_record_name()) {
                (true, Some(name)) => response
                    .next_record_type()
                    .map(|kind| (name.to_owned(), kind.as_str().to_owned())),
                _ => None,
            };
            Ok(Page {
                items: response.resource_record_sets().to_vec(),
                next,
            })
        })?;
        trace!("Collected {} raw record sets from zone {}", sets.len(), zone_id);

        Ok(sets
            .iter()
            .filter_map(|s| RecordSet::try_from(s).ok())
            .collect())
    }

    pub fn upsert_record_sets(
        &self,
        zone_id: &str,
        records: Vec<RecordSet>,
    ) -> Result<(), ProviderError> {
        let changes = records
            .iter()
            .map(|r| {
                Change::builder()
                    .action(ChangeAction::Upsert)
                    .resource_record_set(r.try_into()?)
                    .build()
                    .map_err(|e| ProviderError::from(e.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;
        let batch = ChangeBatch::builder()
            .set_changes(Some(changes))
            .build()
            .map_err(|e| e.to_string())?;

        let response = self
            .runtime
            .block_on(
                self.client
                    .change_resource_record_sets()
                    .hosted_zone_id(zone_id)
                    .change_batch(batch)
                    .send(),
            )
            .map_err(|e| {
                format!(
                    "Unable to change record sets in zone {}: {}",
                    zone_id,
                    DisplayErrorContext(e)
                )
            })?;
        debug!("Change submitted to zone {}: {:?}", zone_id, response.change_info());
        Ok(())
    }

    pub fn try_new(config: &Route53ProviderConfig) -> Result<Route53Wrapper, ProviderError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| format!("Unable to start runtime for the AWS SDK: {}", e))?;

        let region = RegionProviderChain::first_try(config.region.clone().map(Region::new))
            .or_default_provider()
            .or_else(Region::from_static(ROUTE53_FALLBACK_REGION));
        let mut loader = aws_config::defaults(BehaviorVersion::latest()).region(region);
        if let Some(profile) = &config.profile {
            loader = loader.profile_name(profile);
        }
        let sdk_config = runtime.block_on(loader.load());

        Ok(Route53Wrapper {
            client: Client::new(&sdk_config),
            runtime,
        })
    }
}

#[cfg(test)]
use mockall::mock;

#[cfg(test)]
mock! {
    pub Route53Wrapper {
        pub fn find_zone_id(&self, domain: &str) -> Result<Option<String>, ProviderError>;
        pub fn list_record_sets(
            &self,
            zone_id: &str,
            start: Option<(String, RecordType)>,
            limit: Option<usize>,
        ) -> Result<Vec<RecordSet>, ProviderError>;
        pub fn upsert_record_sets(
            &self,
            zone_id: &str,
            records: Vec<RecordSet>,
        ) -> Result<(), ProviderError>;
        pub fn try_new(config: &Route53ProviderConfig) -> Result<MockRoute53Wrapper, ProviderError>;
    }
}
