//! Column maps between classic Application Insights tables and resource-centric tables
//!
//! Every telemetry kind is described by a chain of layers that are merged in
//! order: the base layer shared by all kinds, the common layer
//! (`customMeasurements`, `itemCount`) for most kinds, and a kind-specific
//! layer. Custom metrics and performance counters skip the common layer.

use indexmap::IndexMap;
use std::fmt;
use std::str::FromStr;

/// A single layer of `(classic column, resource-centric expression)` pairs
pub type FieldLayer = &'static [(&'static str, &'static str)];

/// Merged, ordered column map for one telemetry kind
pub type FieldMap = IndexMap<&'static str, &'static str>;

/// Telemetry kinds, in the order their let-statements are emitted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TelemetryKind {
    Requests,
    Dependencies,
    Exceptions,
    CustomEvents,
    Traces,
    Availability,
    PageViews,
    CustomMetrics,
    PerformanceCounters,
    BrowserTimings,
}

/// Static description of how one kind maps onto its resource-centric table
#[derive(Debug)]
pub struct TableDefinition {
    pub kind: TelemetryKind,
    /// Classic table name, used as the let-statement alias
    pub alias: &'static str,
    /// Resource-centric source table
    pub source_table: &'static str,
    /// Layers merged left to right
    pub layers: &'static [FieldLayer],
}

impl TelemetryKind {
    pub const ALL: [TelemetryKind; 10] = [
        TelemetryKind::Requests,
        TelemetryKind::Dependencies,
        TelemetryKind::Exceptions,
        TelemetryKind::CustomEvents,
        TelemetryKind::Traces,
        TelemetryKind::Availability,
        TelemetryKind::PageViews,
        TelemetryKind::CustomMetrics,
        TelemetryKind::PerformanceCounters,
        TelemetryKind::BrowserTimings,
    ];

    pub fn definition(self) -> &'static TableDefinition {
        &TABLE_DEFINITIONS[self as usize]
    }

    pub fn alias(self) -> &'static str {
        self.definition().alias
    }

    pub fn source_table(self) -> &'static str {
        self.definition().source_table
    }

    /// Look up a kind by its classic table alias (e.g. `requests`)
    pub fn from_alias(alias: &str) -> Option<Self> {
        TABLE_DEFINITIONS
            .iter()
            .find(|def| def.alias == alias)
            .map(|def| def.kind)
    }

    /// Merge this kind's layers into a single ordered map
    pub fn field_map(self) -> FieldMap {
        merge_layers(self.definition().layers)
    }
}

impl fmt::Display for TelemetryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.alias())
    }
}

impl FromStr for TelemetryKind {
    type Err = crate::KqlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_alias(s).ok_or_else(|| crate::KqlError::UnknownTable(s.to_string()))
    }
}

/// Ordered merge of layers.
///
/// A key seen again in a later layer keeps its first position and takes the
/// later value.
pub fn merge_layers(layers: &[FieldLayer]) -> FieldMap {
    let mut merged = FieldMap::new();
    for layer in layers {
        for (column, expression) in layer.iter() {
            merged.insert(*column, *expression);
        }
    }
    merged
}

// Indexed by `TelemetryKind as usize`; keep in enum order.
static TABLE_DEFINITIONS: [TableDefinition; 10] = [
    TableDefinition {
        kind: TelemetryKind::Requests,
        alias: "requests",
        source_table: "AppRequests",
        layers: &[BASE, COMMON, REQUESTS],
    },
    TableDefinition {
        kind: TelemetryKind::Dependencies,
        alias: "dependencies",
        source_table: "AppDependencies",
        layers: &[BASE, COMMON, DEPENDENCIES],
    },
    TableDefinition {
        kind: TelemetryKind::Exceptions,
        alias: "exceptions",
        source_table: "AppExceptions",
        layers: &[BASE, COMMON, EXCEPTIONS],
    },
    TableDefinition {
        kind: TelemetryKind::CustomEvents,
        alias: "customEvents",
        source_table: "AppEvents",
        layers: &[BASE, COMMON, CUSTOM_EVENTS],
    },
    TableDefinition {
        kind: TelemetryKind::Traces,
        alias: "traces",
        source_table: "AppTraces",
        layers: &[BASE, COMMON, TRACES],
    },
    TableDefinition {
        kind: TelemetryKind::Availability,
        alias: "availabilityResults",
        source_table: "AppAvailabilityResults",
        layers: &[BASE, COMMON, AVAILABILITY],
    },
    TableDefinition {
        kind: TelemetryKind::PageViews,
        alias: "pageViews",
        source_table: "AppPageViews",
        layers: &[BASE, COMMON, PAGE_VIEWS],
    },
    TableDefinition {
        kind: TelemetryKind::CustomMetrics,
        alias: "customMetrics",
        source_table: "AppMetrics",
        layers: &[BASE, CUSTOM_METRICS],
    },
    TableDefinition {
        kind: TelemetryKind::PerformanceCounters,
        alias: "performanceCounters",
        source_table: "AppPerformanceCounters",
        layers: &[BASE, PERFORMANCE_COUNTERS],
    },
    TableDefinition {
        kind: TelemetryKind::BrowserTimings,
        alias: "browserTimings",
        source_table: "AppBrowserTimings",
        layers: &[BASE, COMMON, BROWSER_TIMINGS],
    },
];

pub const BASE: FieldLayer = &[
    ("timestamp", "TimeGenerated"),
    ("customDimensions", "Properties"),
    (
        "operation_Name",
        r#"iff(isempty(OperationName), column_ifexists("Name", ""), OperationName)"#,
    ),
    ("operation_Id", "OperationId"),
    ("operation_ParentId", "ParentId"),
    ("operation_SyntheticSource", "SyntheticSource"),
    ("session_Id", "SessionId"),
    ("user_Id", "UserId"),
    ("user_AuthenticatedId", "UserAuthenticatedId"),
    ("user_AccountId", "UserAccountId"),
    ("application_Version", "AppVersion"),
    ("cloud_RoleName", "AppRoleName"),
    ("cloud_RoleInstance", "AppRoleInstance"),
    ("client_Type", "ClientType"),
    ("client_Model", "ClientModel"),
    ("client_OS", "ClientOS"),
    ("client_IP", "ClientIP"),
    ("client_City", "ClientCity"),
    ("client_StateOrProvince", "ClientStateOrProvince"),
    ("client_CountryOrRegion", "ClientCountryOrRegion"),
    ("client_Browser", "ClientBrowser"),
    ("iKey", "IKey"),
    ("sdkVersion", "SDKVersion"),
    ("appId", "_ResourceId"),
    ("itemId", "_ItemId"),
    ("_ResourceId", "_ResourceId"),
];

pub const COMMON: FieldLayer = &[
    ("customMeasurements", "Measurements"),
    ("itemCount", "iff(isempty(ItemCount), 1, ItemCount)"),
];

/// Bucketed duration for requests and dependencies that predate `PerformanceBucket`
const DURATION_BUCKET: &str = r#"iff(isempty(PerformanceBucket), case(
    DurationMs < 250, "<250ms",
    DurationMs < 500, "250ms-500ms",
    DurationMs < 1000, "500ms-1sec",
    DurationMs < 3000, "1sec-3sec",
    DurationMs < 7000, "3sec-7sec",
    DurationMs < 15000, "7sec-15sec",
    DurationMs < 30000, "15sec-30sec",
    DurationMs < 60000, "30sec-1min",
    DurationMs < 120000, "1min-2min",
    DurationMs < 300000, "2min-5min",
    ">=5min"), PerformanceBucket)"#;

const REQUESTS: FieldLayer = &[
    ("itemType", r#""request""#),
    ("id", "Id"),
    ("resultCode", "ResultCode"),
    ("success", "tostring(Success)"),
    ("duration", "DurationMs"),
    ("source", "Source"),
    ("url", "Url"),
    ("name", "Name"),
    ("performanceBucket", DURATION_BUCKET),
];

const DEPENDENCIES: FieldLayer = &[
    ("itemType", r#""dependency""#),
    ("id", "Id"),
    ("target", "Target"),
    ("type", "DependencyType"),
    ("resultCode", "ResultCode"),
    ("success", "tostring(Success)"),
    ("duration", "DurationMs"),
    ("name", "Name"),
    ("data", "Data"),
    ("performanceBucket", DURATION_BUCKET),
];

const EXCEPTIONS: FieldLayer = &[
    ("itemType", r#""exception""#),
    ("problemId", "iff(isempty(ProblemId), ExceptionType, ProblemId)"),
    ("handledAt", "HandledAt"),
    ("message", "Message"),
    ("type", "ExceptionType"),
    ("assembly", "Assembly"),
    ("method", "Method"),
    ("details", "Details"),
    ("severityLevel", "SeverityLevel"),
    ("outerMessage", "OuterMessage"),
    ("outerAssembly", "OuterAssembly"),
    ("outerMethod", "OuterMethod"),
    ("outerType", "OuterType"),
    ("innermostMessage", "InnermostMessage"),
    ("innermostAssembly", "InnermostAssembly"),
    ("innermostMethod", "InnermostMethod"),
    ("innermostType", "InnermostType"),
];

const TRACES: FieldLayer = &[
    ("itemType", r#""trace""#),
    ("message", "Message"),
    ("severityLevel", "SeverityLevel"),
];

const CUSTOM_EVENTS: FieldLayer = &[("itemType", r#""customEvent""#), ("name", "Name")];

const AVAILABILITY: FieldLayer = &[
    ("itemType", r#""availabilityResult""#),
    ("name", "Name"),
    ("location", "Location"),
    ("success", "tostring(Success)"),
    ("message", "Message"),
    ("duration", "DurationMs"),
    ("id", "Id"),
];

const PAGE_VIEWS: FieldLayer = &[
    ("itemType", r#""pageView""#),
    ("id", "Id"),
    ("name", "Name"),
    ("url", "Url"),
    ("duration", "DurationMs"),
    ("performanceBucket", "PerformanceBucket"),
];

const CUSTOM_METRICS: FieldLayer = &[
    ("itemType", r#""customMetric""#),
    ("valueCount", "iff(isempty(ItemCount), 1, ItemCount)"),
    ("name", "Name"),
    ("valueSum", "Sum"),
    ("valueMin", "Min"),
    ("valueMax", "Max"),
];

const PERFORMANCE_COUNTERS: FieldLayer = &[
    ("itemType", r#""performanceCounter""#),
    ("name", "Name"),
    ("category", "Category"),
    ("counter", "Counter"),
    ("instance", "Instance"),
    ("value", "Value"),
];

const BROWSER_TIMINGS: FieldLayer = &[
    ("itemType", r#""browserTiming""#),
    ("name", "Name"),
    ("url", "Url"),
    ("performanceBucket", "PerformanceBucket"),
    ("networkDuration", "NetworkDurationMs"),
    ("sendDuration", "SendDurationMs"),
    ("receiveDuration", "ReceiveDurationMs"),
    ("processingDuration", "ProcessingDurationMs"),
    ("totalDuration", "TotalDurationMs"),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_definitions_follow_enum_order() {
        for kind in TelemetryKind::ALL {
            assert_eq!(kind.definition().kind, kind);
        }
    }

    #[test]
    fn test_from_alias() {
        assert_eq!(
            TelemetryKind::from_alias("availabilityResults"),
            Some(TelemetryKind::Availability)
        );
        assert_eq!(TelemetryKind::from_alias("Requests"), None);
        assert!("bogus".parse::<TelemetryKind>().is_err());
    }

    #[test]
    fn test_request_map_starts_with_base_columns() {
        let map = TelemetryKind::Requests.field_map();
        let columns: Vec<_> = map.keys().take(3).copied().collect();
        assert_eq!(
            columns,
            vec!["timestamp", "customDimensions", "operation_Name"]
        );
        assert_eq!(map.len(), BASE.len() + COMMON.len() + REQUESTS.len());
    }

    #[test]
    fn test_metrics_and_counters_skip_common_layer() {
        for kind in [
            TelemetryKind::CustomMetrics,
            TelemetryKind::PerformanceCounters,
        ] {
            let map = kind.field_map();
            assert!(!map.contains_key("customMeasurements"));
            assert!(!map.contains_key("itemCount"));
        }
        assert!(TelemetryKind::Traces
            .field_map()
            .contains_key("customMeasurements"));
    }

    #[test]
    fn test_later_layer_overrides_in_place() {
        const FIRST: FieldLayer = &[("a", "1"), ("b", "2")];
        const SECOND: FieldLayer = &[("c", "3"), ("a", "4")];

        let merged = merge_layers(&[FIRST, SECOND]);
        let entries: Vec<_> = merged.into_iter().collect();
        assert_eq!(entries, vec![("a", "4"), ("b", "2"), ("c", "3")]);
    }
}
