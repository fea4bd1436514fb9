//! Execution descriptors handed to the reader by the surrounding pipeline.
//!
//! An [`Execution`] pairs a data source (where rows come from) with a
//! destination (which marketing API they are uploaded to). The reader only
//! inspects the source; the destination is carried through untouched so the
//! downstream uploader knows what to do with each row.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ReaderError;

/// Where the rows of an execution live.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SourceType {
    /// A warehouse table, addressed as `dataset.table`.
    BigQuery,
    /// A CSV file in object storage.
    Csv,
}

impl SourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceType::BigQuery => "BIG_QUERY",
            SourceType::Csv => "CSV",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Result<Self, ReaderError> {
        match s {
            "BIG_QUERY" => Ok(SourceType::BigQuery),
            "CSV" => Ok(SourceType::Csv),
            other => Err(ReaderError::InvalidArgument(format!(
                "unknown source type: {other}"
            ))),
        }
    }
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Upload target of an execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DestinationType {
    AdsSsdUpload,
    AdsCustomerMatchContactInfoUpload,
    AdsCustomerMatchMobileDeviceIdUpload,
    AdsCustomerMatchUserIdUpload,
    AdsOfflineConversion,
    GaUserListUpload,
    GaDataImport,
    GaMeasurementProtocol,
    #[serde(rename = "GA_4_MEASUREMENT_PROTOCOL")]
    Ga4MeasurementProtocol,
    CmOfflineConversion,
    AppsflyerS2sEvents,
}

impl DestinationType {
    pub const ALL: [DestinationType; 11] = [
        DestinationType::AdsSsdUpload,
        DestinationType::AdsCustomerMatchContactInfoUpload,
        DestinationType::AdsCustomerMatchMobileDeviceIdUpload,
        DestinationType::AdsCustomerMatchUserIdUpload,
        DestinationType::AdsOfflineConversion,
        DestinationType::GaUserListUpload,
        DestinationType::GaDataImport,
        DestinationType::GaMeasurementProtocol,
        DestinationType::Ga4MeasurementProtocol,
        DestinationType::CmOfflineConversion,
        DestinationType::AppsflyerS2sEvents,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DestinationType::AdsSsdUpload => "ADS_SSD_UPLOAD",
            DestinationType::AdsCustomerMatchContactInfoUpload => {
                "ADS_CUSTOMER_MATCH_CONTACT_INFO_UPLOAD"
            }
            DestinationType::AdsCustomerMatchMobileDeviceIdUpload => {
                "ADS_CUSTOMER_MATCH_MOBILE_DEVICE_ID_UPLOAD"
            }
            DestinationType::AdsCustomerMatchUserIdUpload => "ADS_CUSTOMER_MATCH_USER_ID_UPLOAD",
            DestinationType::AdsOfflineConversion => "ADS_OFFLINE_CONVERSION",
            DestinationType::GaUserListUpload => "GA_USER_LIST_UPLOAD",
            DestinationType::GaDataImport => "GA_DATA_IMPORT",
            DestinationType::GaMeasurementProtocol => "GA_MEASUREMENT_PROTOCOL",
            DestinationType::Ga4MeasurementProtocol => "GA_4_MEASUREMENT_PROTOCOL",
            DestinationType::CmOfflineConversion => "CM_OFFLINE_CONVERSION",
            DestinationType::AppsflyerS2sEvents => "APPSFLYER_S2S_EVENTS",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Result<Self, ReaderError> {
        DestinationType::ALL
            .into_iter()
            .find(|d| d.as_str() == s)
            .ok_or_else(|| ReaderError::InvalidArgument(format!("unknown destination type: {s}")))
    }
}

impl fmt::Display for DestinationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Data source of an execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    pub source_name: String,
    pub source_type: SourceType,
    /// For warehouse sources: `[dataset, table, ...]`.
    #[serde(default)]
    pub source_metadata: Vec<String>,
}

impl Source {
    /// The `(dataset, table)` pair at the head of the metadata.
    pub fn dataset_and_table(&self) -> Result<(&str, &str), ReaderError> {
        match self.source_metadata.as_slice() {
            [dataset, table, ..] => Ok((dataset.as_str(), table.as_str())),
            other => Err(ReaderError::MalformedMetadata {
                expected: 2,
                found: other.len(),
            }),
        }
    }
}

/// Upload destination of an execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Destination {
    pub destination_name: String,
    pub destination_type: DestinationType,
    #[serde(default)]
    pub destination_metadata: Vec<String>,
}

/// One configured source → destination pairing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Execution {
    pub source: Source,
    pub destination: Destination,
}

impl fmt::Display for Execution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Origin name: {}. Action: {}. Destination name: {}",
            self.source.source_name,
            self.destination.destination_type,
            self.destination.destination_name
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn execution(metadata: &[&str]) -> Execution {
        Execution {
            source: Source {
                source_name: "events".into(),
                source_type: SourceType::BigQuery,
                source_metadata: metadata.iter().map(|s| s.to_string()).collect(),
            },
            destination: Destination {
                destination_name: "ga4-web".into(),
                destination_type: DestinationType::Ga4MeasurementProtocol,
                destination_metadata: vec![],
            },
        }
    }

    #[test]
    fn test_dataset_and_table() {
        let exec = execution(&["marketing", "events", "ignored"]);
        assert_eq!(
            exec.source.dataset_and_table().unwrap(),
            ("marketing", "events")
        );
    }

    #[test]
    fn test_dataset_and_table_too_short() {
        let err = execution(&["marketing"]).source.dataset_and_table().unwrap_err();
        assert!(matches!(
            err,
            ReaderError::MalformedMetadata {
                expected: 2,
                found: 1
            }
        ));
        let err = execution(&[]).source.dataset_and_table().unwrap_err();
        assert!(matches!(err, ReaderError::MalformedMetadata { found: 0, .. }));
    }

    #[test]
    fn test_destination_type_str_roundtrip() {
        for dest in DestinationType::ALL {
            assert_eq!(DestinationType::from_str(dest.as_str()).unwrap(), dest);
        }
        assert!(DestinationType::from_str("FAX").is_err());
    }

    #[test]
    fn test_serde_names_match_as_str() {
        for dest in DestinationType::ALL {
            let json = serde_json::to_value(dest).unwrap();
            assert_eq!(json, serde_json::Value::String(dest.as_str().into()));
        }
        for source in [SourceType::BigQuery, SourceType::Csv] {
            let json = serde_json::to_value(source).unwrap();
            assert_eq!(json, serde_json::Value::String(source.as_str().into()));
        }
    }

    #[test]
    fn test_execution_from_json() {
        let exec: Execution = serde_json::from_str(
            r#"{
                "source": {"source_name": "events", "source_type": "BIG_QUERY",
                           "source_metadata": ["marketing", "events"]},
                "destination": {"destination_name": "ga4-web",
                                "destination_type": "GA_4_MEASUREMENT_PROTOCOL"}
            }"#,
        )
        .unwrap();
        assert_eq!(exec, execution(&["marketing", "events"]));
    }

    #[test]
    fn test_execution_display() {
        assert_eq!(
            execution(&["marketing", "events"]).to_string(),
            "Origin name: events. Action: GA_4_MEASUREMENT_PROTOCOL. Destination name: ga4-web"
        );
    }

    #[test]
    fn test_source_type_str_roundtrip() {
        for source in [SourceType::BigQuery, SourceType::Csv] {
            assert_eq!(SourceType::from_str(source.as_str()).unwrap(), source);
        }
        assert!(SourceType::from_str("SHEETS").is_err());
    }
}
