//! Keys never copied into a record.
//!
//! Decoders fault or return meaningless data for several GRIB2 section keys,
//! and the geographic coordinate arrays need an iterator this crate does not
//! use. The list is a plain table: append to it when a new incompatibility
//! turns up. Callers can add keys per invocation with [`KeyFilter::with_extra`].

use std::collections::HashSet;

/// End-of-message sentinel, reported by decoders as a key.
pub const END_MARKER: &str = "7777";

/// Keys excluded from every record.
pub const EXCLUDED_KEYS: &[&str] = &[
    // Data representation section
    "dataRepresentationTemplateNumber",
    "packingType",
    "referenceValue",
    "binaryScaleFactor",
    "decimalScaleFactor",
    "bitsPerValue",
    "typeOfOriginalFieldValues",
    // Bitmap section
    "bitMapIndicator",
    "bitmapPresent",
    // Statistical processing
    "numberOfTimeRange",
    "numberOfMissingInStatisticalProcess",
    "typeOfStatisticalProcessing",
    "typeOfTimeIncrement",
    "indicatorOfUnitForTimeRange",
    "lengthOfTimeRange",
    "indicatorOfUnitForTimeIncrement",
    "timeIncrement",
    "yearOfEndOfOverallTimeInterval",
    "monthOfEndOfOverallTimeInterval",
    "dayOfEndOfOverallTimeInterval",
    "hourOfEndOfOverallTimeInterval",
    "minuteOfEndOfOverallTimeInterval",
    "secondOfEndOfOverallTimeInterval",
    // Derived forecasts
    "derivedForecast",
    // Ensemble (EPS) information
    "typeOfEnsembleForecast",
    "perturbationNumber",
    "numberOfForecastsInEnsemble",
    // Geographic coordinates, need a geo-iterator
    "latitudes",
    "longitudes",
    "distinctLatitudes",
    "distinctLongitudes",
];

/// Exclusion policy for record extraction.
#[derive(Debug, Clone, Default)]
pub struct KeyFilter {
    extra: HashSet<String>,
}

impl KeyFilter {
    /// The fixed table only.
    pub fn new() -> Self {
        Self::default()
    }

    /// The fixed table plus `extra` keys.
    pub fn with_extra<I, S>(extra: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            extra: extra.into_iter().map(Into::into).collect(),
        }
    }

    pub fn is_excluded(&self, key: &str) -> bool {
        key == END_MARKER || EXCLUDED_KEYS.contains(&key) || self.extra.contains(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_table() {
        let filter = KeyFilter::new();
        assert!(filter.is_excluded("7777"));
        assert!(filter.is_excluded("packingType"));
        assert!(filter.is_excluded("distinctLongitudes"));
        assert!(filter.is_excluded("perturbationNumber"));
        assert!(!filter.is_excluded("shortName"));
        assert!(!filter.is_excluded("values"));
    }

    #[test]
    fn test_names_are_case_sensitive() {
        let filter = KeyFilter::new();
        assert!(!filter.is_excluded("Latitudes"));
        assert!(!filter.is_excluded("PACKINGTYPE"));
    }

    #[test]
    fn test_extra_keys() {
        let filter = KeyFilter::with_extra(["pv", "NV"]);
        assert!(filter.is_excluded("pv"));
        assert!(filter.is_excluded("NV"));
        assert!(filter.is_excluded("bitmapPresent"));
        assert!(!KeyFilter::new().is_excluded("pv"));
    }
}
