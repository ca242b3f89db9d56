//! Identifiers of the raw queries the retention library sends to the
//! [`QueryExecutor`](cohort_eval::QueryExecutor), and the argument names they carry.

/// Patients retained on ART three months after initiation.
pub const RETAINED_ON_ART_3_MONTHS: &str = "RETAINED_ON_ART_3_MONTHS";

/// Pregnant women enrolled on ART in the period.
pub const PREGNANT_ENROLLED_ON_ART: &str = "PREGNANT_ENROLLED_ON_ART";

/// Breastfeeding women newly enrolled on ART.
pub const TX_NEW_BREASTFEEDING: &str = "TX_NEW_BREASTFEEDING";

/// Patients whose age at `endDate` is within `minAge..=maxAge` years.
pub const AGE_BRACKET: &str = "AGE_BRACKET";

/// Argument names attached to the query specs.
pub mod args {
    /// ARV pharmacy encounter type.
    pub const ARV_PHARMACY_ENCOUNTER_TYPE: &str = "arvPharmacyEncounterType";
    /// Adult follow-up encounter type.
    pub const ADULT_FOLLOW_UP_ENCOUNTER_TYPE: &str = "adultFollowUpEncounterType";
    /// Pediatric follow-up encounter type.
    pub const PEDIATRIC_FOLLOW_UP_ENCOUNTER_TYPE: &str = "pediatricFollowUpEncounterType";
    /// ARV plan concept.
    pub const ARV_PLAN_CONCEPT: &str = "arvPlanConcept";
    /// Start drugs concept.
    pub const START_DRUGS_CONCEPT: &str = "startDrugsConcept";
    /// Historical drug start date concept.
    pub const HISTORICAL_DRUG_START_DATE_CONCEPT: &str = "historicalDrugStartDateConcept";
    /// ART program.
    pub const ART_PROGRAM: &str = "artProgram";
    /// Transferred-from-other-facility workflow state.
    pub const TRANSFERRED_FROM_OTHER_FACILITY_STATE: &str = "transferredFromOtherFacilityState";
    /// Lower age bound in years.
    pub const MIN_AGE: &str = "minAge";
    /// Upper age bound in years.
    pub const MAX_AGE: &str = "maxAge";
}
