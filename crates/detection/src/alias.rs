//! Entity-type alias and compatibility tables. Detectors across pattern
//! matching, secrets, and NER models each emit their own label for the same
//! underlying concept (e.g. `PERSON`, `PER`, `FIRSTNAME` all mean a name);
//! this module collapses them to one canonical vocabulary before scoring
//! ever sees them.

use once_cell::sync::Lazy;
use std::collections::{HashMap, HashSet};

/// Groups of canonical types considered interchangeable for merge/dedup
/// purposes — two spans of types in the same group are treated as the same
/// entity family even though they are not byte-identical labels.
pub static COMPATIBLE_TYPE_GROUPS: &[&[&str]] = &[
    &["NAME", "NAME_PATIENT", "NAME_PROVIDER", "NAME_RELATIVE", "NAME_FAMILY"],
    &["ADDRESS", "STREET", "STREET_ADDRESS", "CITY", "STATE", "ZIP", "LOCATION"],
    &["DATE", "DATE_DOB", "DATE_ADMISSION", "DATE_DISCHARGE"],
    &["PHONE", "FAX", "PHONE_MOBILE", "PHONE_HOME", "PHONE_WORK"],
    &["SSN", "SSN_PARTIAL"],
    &["MRN", "PATIENT_ID", "MEDICAL_RECORD"],
    &["HEALTH_PLAN_ID", "MEMBER_ID", "INSURANCE_ID"],
    &["EMPLOYER", "ORGANIZATION", "COMPANY"],
];

static TYPE_TO_GROUP: Lazy<HashMap<&'static str, usize>> = Lazy::new(|| {
    let mut map = HashMap::new();
    for (group_id, group) in COMPATIBLE_TYPE_GROUPS.iter().enumerate() {
        for entity_type in *group {
            map.insert(*entity_type, group_id);
        }
    }
    map
});

/// Raw detector label -> canonical type. Sourced from the label vocabularies
/// of the pattern/regex tier, a secrets tier, and the NER models this
/// pipeline escalates to (i2b2-style clinical labels, AI4Privacy-style PII
/// component labels, and generic PHI labels).
static TYPE_NORMALIZE: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([
        // Names
        ("PERSON", "NAME"),
        ("PER", "NAME"),
        ("PATIENT", "NAME_PATIENT"),
        ("DOCTOR", "NAME_PROVIDER"),
        ("PHYSICIAN", "NAME_PROVIDER"),
        ("NURSE", "NAME_PROVIDER"),
        ("STAFF", "NAME_PROVIDER"),
        ("HCW", "NAME_PROVIDER"),
        ("RELATIVE", "NAME_RELATIVE"),
        ("FAMILY", "NAME_RELATIVE"),
        ("FIRSTNAME", "NAME"),
        ("LASTNAME", "NAME"),
        ("MIDDLENAME", "NAME"),
        ("PREFIX", "NAME"),
        ("SUFFIX", "NAME"),
        ("FULLNAME", "NAME"),
        ("USERNAME", "USERNAME"),
        // Locations
        ("GPE", "ADDRESS"),
        ("LOC", "ADDRESS"),
        ("STREET_ADDRESS", "ADDRESS"),
        ("STREET", "ADDRESS"),
        ("CITY", "ADDRESS"),
        ("STATE", "ADDRESS"),
        ("COUNTRY", "ADDRESS"),
        ("COUNTY", "ADDRESS"),
        ("LOCATION_OTHER", "ADDRESS"),
        ("SECONDARYADDRESS", "ADDRESS"),
        ("BUILDINGNUMBER", "ADDRESS"),
        ("ZIPCODE", "ADDRESS"),
        ("ZIP_CODE", "ADDRESS"),
        ("ZIP", "ADDRESS"),
        ("POSTCODE", "ADDRESS"),
        ("GPS", "GPS_COORDINATE"),
        ("COORDINATE", "GPS_COORDINATE"),
        ("COORDINATES", "GPS_COORDINATE"),
        ("LATITUDE", "GPS_COORDINATE"),
        ("LONGITUDE", "GPS_COORDINATE"),
        ("NEARBYGPSCOORDINATE", "GPS_COORDINATE"),
        // Identifiers
        ("ID", "MRN"),
        ("US_SSN", "SSN"),
        ("SOCIAL_SECURITY", "SSN"),
        ("SOCIALSECURITYNUMBER", "SSN"),
        ("SSN_PARTIAL", "SSN"),
        ("UKNINUMBER", "SSN"),
        ("MEDICAL_RECORD", "MRN"),
        ("MEDICALRECORD", "MRN"),
        ("HEALTHPLAN", "HEALTH_PLAN_ID"),
        ("HEALTH_PLAN", "HEALTH_PLAN_ID"),
        ("MEMBERID", "HEALTH_PLAN_ID"),
        ("MEMBER_ID", "HEALTH_PLAN_ID"),
        ("CREDIT_CARD_NUMBER", "CREDIT_CARD"),
        ("CREDITCARDNUMBER", "CREDIT_CARD"),
        ("CREDITCARD", "CREDIT_CARD"),
        ("CC", "CREDIT_CARD"),
        ("IBAN_CODE", "IBAN"),
        ("IBANCODE", "IBAN"),
        ("ACCOUNTNUMBER", "ACCOUNT_NUMBER"),
        ("BANK_ACCOUNT", "ACCOUNT_NUMBER"),
        ("BITCOINADDRESS", "ACCOUNT_NUMBER"),
        ("LITECOINADDRESS", "ACCOUNT_NUMBER"),
        ("ETHEREUMADDRESS", "ACCOUNT_NUMBER"),
        ("BIC", "ACCOUNT_NUMBER"),
        ("SWIFT", "ACCOUNT_NUMBER"),
        ("ROUTING", "ABA_ROUTING"),
        ("ROUTING_NUMBER", "ABA_ROUTING"),
        ("BANK_ROUTING", "ABA_ROUTING"),
        ("US_DRIVER_LICENSE", "DRIVER_LICENSE"),
        ("DRIVER_LICENSE_NUMBER", "DRIVER_LICENSE"),
        ("DRIVERSLICENSE", "DRIVER_LICENSE"),
        ("LICENSE", "DRIVER_LICENSE"),
        ("US_PASSPORT", "PASSPORT"),
        ("PASSPORT_NUMBER", "PASSPORT"),
        ("PASSPORTNUMBER", "PASSPORT"),
        ("ACCOUNT", "ACCOUNT_NUMBER"),
        ("NATIONAL_PROVIDER_IDENTIFIER", "NPI"),
        ("PROVIDER_NPI", "NPI"),
        ("DEA_NUMBER", "DEA"),
        ("PRESCRIBER_DEA", "DEA"),
        // Contact
        ("PHONE_NUMBER", "PHONE"),
        ("PHONENUMBER", "PHONE"),
        ("US_PHONE_NUMBER", "PHONE"),
        ("TELEPHONE", "PHONE"),
        ("TEL", "PHONE"),
        ("MOBILE", "PHONE"),
        ("CELL", "PHONE"),
        ("EMAIL_ADDRESS", "EMAIL"),
        ("EMAILADDRESS", "EMAIL"),
        ("FAX_NUMBER", "FAX"),
        ("FAXNUMBER", "FAX"),
        ("PAGER", "PHONE"),
        ("PAGER_NUMBER", "PHONE"),
        // Network/device
        ("IP", "IP_ADDRESS"),
        ("IPADDRESS", "IP_ADDRESS"),
        ("IPV4", "IP_ADDRESS"),
        ("IPV6", "IP_ADDRESS"),
        ("MAC", "MAC_ADDRESS"),
        ("MACADDRESS", "MAC_ADDRESS"),
        ("IMEI", "DEVICE_ID"),
        ("DEVICE", "DEVICE_ID"),
        ("BIOID", "DEVICE_ID"),
        ("USERAGENT", "DEVICE_ID"),
        ("USER_AGENT", "DEVICE_ID"),
        ("PHONEIMEI", "DEVICE_ID"),
        // Dates
        ("DATE_TIME", "DATE"),
        ("DATETIME", "DATE"),
        ("TIME", "DATE"),
        ("BIRTHDAY", "DATE_DOB"),
        ("DOB", "DATE_DOB"),
        ("DATEOFBIRTH", "DATE_DOB"),
        ("DATE_OF_BIRTH", "DATE_DOB"),
        ("BIRTH_DATE", "DATE_DOB"),
        ("BIRTHDATE", "DATE_DOB"),
        ("BIRTH_YEAR", "BIRTH_YEAR"),
        ("YEAR_OF_BIRTH", "BIRTH_YEAR"),
        // Vehicles
        ("VEHICLEVIN", "VIN"),
        ("VEHICLE_VIN", "VIN"),
        ("VEHICLE_IDENTIFICATION", "VIN"),
        ("VEHICLEVRM", "LICENSE_PLATE"),
        ("VEHICLE_PLATE", "LICENSE_PLATE"),
        ("PLATE_NUMBER", "LICENSE_PLATE"),
        ("VEHICLE", "VIN"),
        // Professional
        ("PROFESSION", "PROFESSION"),
        ("OCCUPATION", "PROFESSION"),
        ("JOB", "PROFESSION"),
        ("JOB_TITLE", "PROFESSION"),
        ("JOBTITLE", "PROFESSION"),
        ("JOBAREA", "PROFESSION"),
        ("JOBTYPE", "PROFESSION"),
        // Employer
        ("COMPANYNAME", "EMPLOYER"),
        ("COMPANY", "EMPLOYER"),
        ("ORG", "EMPLOYER"),
        ("ORGANIZATION", "EMPLOYER"),
        // Clinical context-only
        ("HOSPITAL", "FACILITY"),
        ("VENDOR", "FACILITY"),
        // Medication
        ("DRUG", "MEDICATION"),
        ("MEDICINE", "MEDICATION"),
        ("RX", "MEDICATION"),
    ])
});

/// Entity types that are never dropped by confidence thresholding in Stage 3,
/// regardless of context score — they carry enough standalone risk that a
/// false negative is worse than a false positive.
pub static HIGH_VALUE_ALWAYS_KEEP: Lazy<HashSet<&'static str>> =
    Lazy::new(|| HashSet::from(["SSN", "CREDIT_CARD", "API_KEY", "PASSWORD", "AWS_SECRET_KEY", "PRIVATE_KEY"]));

/// Entity types for which a low-confidence Stage-1 hit (or a total absence
/// of NAME-class hits) triggers NER escalation.
pub static ML_BENEFICIAL_TYPES: Lazy<HashSet<&'static str>> =
    Lazy::new(|| HashSet::from(["NAME", "NAME_PATIENT", "NAME_PROVIDER", "NAME_RELATIVE", "ADDRESS", "DIAGNOSIS", "MEDICATION"]));

/// Normalizes a raw detector label to its canonical type, passing unknown
/// labels through unchanged (a detector may already emit a canonical type).
pub fn normalize_type(entity_type: &str) -> &str {
    TYPE_NORMALIZE.get(entity_type).copied().unwrap_or(entity_type)
}

/// Whether two (already-normalized) types should be treated as the same
/// entity family for overlap merging and resolution.
pub fn types_compatible(t1: &str, t2: &str) -> bool {
    if t1 == t2 {
        return true;
    }
    if t1.starts_with(t2) || t2.starts_with(t1) {
        return true;
    }
    match (TYPE_TO_GROUP.get(t1), TYPE_TO_GROUP.get(t2)) {
        (Some(g1), Some(g2)) => g1 == g2,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_known_aliases() {
        assert_eq!(normalize_type("PERSON"), "NAME");
        assert_eq!(normalize_type("FIRSTNAME"), "NAME");
        assert_eq!(normalize_type("US_SSN"), "SSN");
    }

    #[test]
    fn passes_through_unknown_labels() {
        assert_eq!(normalize_type("ALREADY_CANONICAL"), "ALREADY_CANONICAL");
    }

    #[test]
    fn group_membership_makes_types_compatible() {
        assert!(types_compatible("CITY", "STREET"));
        assert!(!types_compatible("CITY", "SSN"));
    }

    #[test]
    fn prefix_match_makes_types_compatible() {
        assert!(types_compatible("NAME", "NAME_PATIENT"));
    }
}
