use aws_sdk_route53::types::{ResourceRecord, ResourceRecordSet, RrType};

use crate::provider::{ProviderError, RecordSet, RecordType};

impl From<RecordType> for RrType {
    fn from(t: RecordType) -> Self {
        match t {
            RecordType::Mx => RrType::Mx,
            RecordType::Txt => RrType::Txt,
            RecordType::Cname => RrType::Cname,
        }
    }
}

impl TryFrom<&RrType> for RecordType {
    type Error = String;

    fn try_from(t: &RrType) -> Result<Self, Self::Error> {
        match t {
            RrType::Mx => Ok(RecordType::Mx),
            RrType::Txt => Ok(RecordType::Txt),
            RrType::Cname => Ok(RecordType::Cname),
            _ => Err(format!("Unsupported record type: {}", t.as_str())),
        }
    }
}

impl TryFrom<&ResourceRecordSet> for RecordSet {
    type Error = String;

    fn try_from(r: &ResourceRecordSet) -> Result<Self, Self::Error> {
        // Alias targets (and other routing policies) have no TTL or plain values, we never manage those
        let ttl = r
            .ttl()
            .ok_or_else(|| format!("Record set {} has no TTL", r.name()))?;
        Ok(RecordSet {
            name: normalize_name(r.name()),
            kind: RecordType::try_from(r.r#type())?,
            ttl: u32::try_from(ttl).map_err(|e| e.to_string())?,
            values: r
                .resource_records()
                .iter()
                .map(|v| v.value().to_owned())
                .collect(),
        })
    }
}

impl TryFrom<&RecordSet> for ResourceRecordSet {
    type Error = ProviderError;

    fn try_from(r: &RecordSet) -> Result<Self, Self::Error> {
        let records = r
            .values
            .iter()
            .map(|v| ResourceRecord::builder().value(v).build())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| ProviderError::from(e.to_string()))?;
        ResourceRecordSet::builder()
            .name(&r.name)
            .r#type(r.kind.into())
            .ttl(i64::from(r.ttl))
            .set_resource_records(Some(records))
            .build()
            .map_err(|e| ProviderError::from(e.to_string()))
    }
}

/// Route53 returns fully qualified names with a trailing dot and escapes `*` as `\052`
pub fn normalize_name(name: &str) -> String {
    name.trim_end_matches('.')
        .replace("\\052", "*")
        .to_lowercase()
}
