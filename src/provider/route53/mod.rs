mod util;
mod wrapper;

use itertools::Itertools;
use log::{debug, info, trace};
use mockall_double::double;

use super::{Provider, ProviderError, RecordSet, RecordType};

#[double]
use self::wrapper::Route53Wrapper;

/// A [`Provider`] connecting to the AWS Route53 API for looking up zones and upserting record sets.
///
/// Credentials are taken from the default AWS credential chain (environment, shared config files, instance roles...).
///
/// To create a provider, use the [`Route53Provider::from_config()`] function.
#[non_exhaustive]
pub struct Route53Provider {
    api: Route53Wrapper,
    dry_run: bool,
}

/// Configuration object for a [`Route53Provider`]. Must be supplied when creating a provider.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Route53ProviderConfig {
    /// AWS region to sign requests for. Falls back to the AWS default chain, then `us-east-1`
    pub region: Option<String>,
    /// Named profile from the shared AWS config files
    pub profile: Option<String>,
    /// Only log the changes that would be made
    pub dry_run: bool,
}

impl Route53Provider {
    pub fn from_config(config: &Route53ProviderConfig) -> Result<Box<dyn Provider>, ProviderError> {
        let api = Route53Wrapper::try_new(config)?;

        Ok(Box::new(Route53Provider {
            api,
            dry_run: config.dry_run,
        }))
    }
}

impl Provider for Route53Provider {
    fn dry_run(&self) -> bool {
        self.dry_run
    }

    fn zone_id(&self, domain: &str) -> Result<Option<String>, ProviderError> {
        let zone = self.api.find_zone_id(domain)?;
        match &zone {
            Some(id) => debug!("Domain {} is hosted in zone {}", domain, id),
            None => debug!("No hosted zone found for domain {}", domain),
        }
        Ok(zone)
    }

    fn record(
        &self,
        zone_id: &str,
        name: &str,
        kind: RecordType,
    ) -> Result<Option<RecordSet>, ProviderError> {
        let name = util::normalize_name(name);
        // Listing starts at (name, kind), so the first set returned is either ours or the next one in the zone
        let record = self
            .api
            .list_record_sets(zone_id, Some((name.clone(), kind)), Some(1))?
            .into_iter()
            .find(|r| r.name == name && r.kind == kind);
        trace!("Current {} record for {}: {:?}", kind, name, record);
        Ok(record)
    }

    fn records(&self, zone_id: &str) -> Result<Vec<RecordSet>, ProviderError> {
        debug!("Reading record sets of zone {} from Route53", zone_id);
        let records = self.api.list_record_sets(zone_id, None, None)?;
        trace!("Collected Records: {:?}", records);
        Ok(records)
    }

    fn upsert(&self, zone_id: &str, records: Vec<RecordSet>) -> Result<(), ProviderError> {
        if records.is_empty() {
            return Ok(());
        }
        if self.dry_run {
            info!(
                "[dry-run] Would upsert in zone {}: {}",
                zone_id,
                records.iter().join("; ")
            );
            return Ok(());
        }
        let count = records.len();
        self.api.upsert_record_sets(zone_id, records)?;
        debug!("Upserted {} record set(s) in zone {}", count, zone_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use mockall::predicate::{always, eq};

    use super::*;

    fn provider(api: Route53Wrapper, dry_run: bool) -> Route53Provider {
        Route53Provider { api, dry_run }
    }

    fn txt(name: &str, value: &str) -> RecordSet {
        RecordSet::new(name, RecordType::Txt, 3600, vec![value.to_owned()])
    }

    #[test]
    fn should_return_zone_id() {
        let mut api = Route53Wrapper::default();
        api.expect_find_zone_id()
            .with(eq("example.com"))
            .times(1)
            .returning(|_| Ok(Some("Z0123".to_owned())));

        let p = provider(api, false);
        assert_eq!(p.zone_id("example.com").unwrap(), Some("Z0123".to_owned()));
    }

    #[test]
    fn should_return_matching_record() {
        let mut api = Route53Wrapper::default();
        api.expect_list_record_sets()
            .with(
                eq("Z0123"),
                eq(Some(("_dmarc.example.com".to_owned(), RecordType::Txt))),
                eq(Some(1)),
            )
            .times(1)
            .returning(|_, _, _| Ok(vec![txt("_dmarc.example.com", "\"v=DMARC1\"")]));

        let p = provider(api, false);
        let record = p
            .record("Z0123", "_dmarc.example.com.", RecordType::Txt)
            .unwrap();
        assert_eq!(record, Some(txt("_dmarc.example.com", "\"v=DMARC1\"")));
    }

    #[test]
    fn should_ignore_following_record() {
        let mut api = Route53Wrapper::default();
        api.expect_list_record_sets()
            .returning(|_, _, _| Ok(vec![txt("www.example.com", "\"hello\"")]));

        let p = provider(api, false);
        let record = p
            .record("Z0123", "_dmarc.example.com", RecordType::Txt)
            .unwrap();
        assert_eq!(record, None);
    }

    #[test]
    fn should_list_whole_zone() {
        let mut api = Route53Wrapper::default();
        api.expect_list_record_sets()
            .with(eq("Z0123"), eq(None), eq(None))
            .times(1)
            .returning(|_, _, _| {
                Ok(vec![
                    txt("example.com", "\"v=spf1 include:simplelogin.co ~all\""),
                    txt("_dmarc.example.com", "\"v=DMARC1\""),
                ])
            });

        let records = provider(api, false).records("Z0123").unwrap();
        assert_eq!(
            records.iter().map(|r| r.name.as_str()).collect_vec(),
            vec!["example.com", "_dmarc.example.com"]
        );
    }

    #[test]
    fn should_upsert_all_records_at_once() {
        let records = vec![txt("a.example.com", "\"a\""), txt("b.example.com", "\"b\"")];
        let mut api = Route53Wrapper::default();
        api.expect_upsert_record_sets()
            .with(eq("Z0123"), eq(records.clone()))
            .times(1)
            .returning(|_, _| Ok(()));

        let p = provider(api, false);
        assert!(p.upsert("Z0123", records).is_ok());
    }

    #[test]
    fn should_support_dry_run() {
        let mut api = Route53Wrapper::default();
        api.expect_upsert_record_sets().never();

        let p = provider(api, true);
        assert!(p.dry_run());
        assert!(p.upsert("Z0123", vec![txt("example.com", "\"x\"")]).is_ok());
    }

    #[test]
    fn should_skip_empty_upserts() {
        let mut api = Route53Wrapper::default();
        api.expect_upsert_record_sets().never();

        assert!(provider(api, false).upsert("Z0123", vec![]).is_ok());
    }

    #[test]
    fn should_pass_through_errors() {
        let mut api = Route53Wrapper::default();
        api.expect_upsert_record_sets()
            .with(always(), always())
            .returning(|_, _| Err("throttled".to_owned().into()));

        let err = provider(api, false)
            .upsert("Z0123", vec![txt("example.com", "\"x\"")])
            .unwrap_err();
        assert_eq!(err.to_string(), "throttled");
    }
}
