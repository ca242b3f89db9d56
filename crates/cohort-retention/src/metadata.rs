//! HIV program metadata used to parameterize the retention queries.

use serde::{Deserialize, Serialize};

use crate::error::{RetentionError, RetentionResult};

/// Source of the database ids the retention queries filter on.
///
/// Implementations typically look the ids up in the clinical database once
/// at startup; [`StaticHivMetadata`] reads them from configuration.
pub trait HivMetadata: Send + Sync {
    /// Encounter type of ARV pharmacy pickups.
    fn arv_pharmacy_encounter_type(&self) -> i64;
    /// Encounter type of adult follow-up visits.
    fn adult_follow_up_encounter_type(&self) -> i64;
    /// Encounter type of pediatric follow-up visits.
    fn pediatric_follow_up_encounter_type(&self) -> i64;
    /// Concept recording the ARV plan.
    fn arv_plan_concept(&self) -> i64;
    /// Concept for the "start drugs" answer of the ARV plan.
    fn start_drugs_concept(&self) -> i64;
    /// Concept holding a historical ARV start date.
    fn historical_drug_start_date_concept(&self) -> i64;
    /// The ART program.
    fn art_program(&self) -> i64;
    /// Workflow state of patients transferred in from another facility.
    fn transferred_from_other_facility_state(&self) -> i64;
}

/// Metadata ids held in memory, loadable from JSON.
///
/// # Example
///
/// ```rust
/// use cohort_retention::{HivMetadata, StaticHivMetadata};
///
/// let metadata = StaticHivMetadata::from_json(r#"{ "artProgram": 7 }"#).unwrap();
/// assert_eq!(metadata.art_program(), 7);
/// assert_eq!(metadata.arv_pharmacy_encounter_type(), 18);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct StaticHivMetadata {
    /// See [`HivMetadata::arv_pharmacy_encounter_type`].
    pub arv_pharmacy_encounter_type: i64,
    /// See [`HivMetadata::adult_follow_up_encounter_type`].
    pub adult_follow_up_encounter_type: i64,
    /// See [`HivMetadata::pediatric_follow_up_encounter_type`].
    pub pediatric_follow_up_encounter_type: i64,
    /// See [`HivMetadata::arv_plan_concept`].
    pub arv_plan_concept: i64,
    /// See [`HivMetadata::start_drugs_concept`].
    pub start_drugs_concept: i64,
    /// See [`HivMetadata::historical_drug_start_date_concept`].
    pub historical_drug_start_date_concept: i64,
    /// See [`HivMetadata::art_program`].
    pub art_program: i64,
    /// See [`HivMetadata::transferred_from_other_facility_state`].
    pub transferred_from_other_facility_state: i64,
}

impl Default for StaticHivMetadata {
    fn default() -> Self {
        Self {
            arv_pharmacy_encounter_type: 18,
            adult_follow_up_encounter_type: 6,
            pediatric_follow_up_encounter_type: 9,
            arv_plan_concept: 1255,
            start_drugs_concept: 1256,
            historical_drug_start_date_concept: 1190,
            art_program: 2,
            transferred_from_other_facility_state: 29,
        }
    }
}

impl StaticHivMetadata {
    /// Parses metadata from JSON; absent fields keep their defaults.
    ///
    /// # Errors
    ///
    /// `Metadata` if the JSON is malformed, names an unknown field, or holds
    /// a non-positive id.
    pub fn from_json(json: &str) -> RetentionResult<Self> {
        let metadata: Self =
            serde_json::from_str(json).map_err(|e| RetentionError::Metadata(e.to_string()))?;
        metadata.validate()?;
        Ok(metadata)
    }

    /// Serializes the metadata to pretty-printed JSON.
    pub fn to_json(&self) -> RetentionResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| RetentionError::Metadata(e.to_string()))
    }

    fn validate(&self) -> RetentionResult<()> {
        let ids = [
            ("arvPharmacyEncounterType", self.arv_pharmacy_encounter_type),
            ("adultFollowUpEncounterType", self.adult_follow_up_encounter_type),
            ("pediatricFollowUpEncounterType", self.pediatric_follow_up_encounter_type),
            ("arvPlanConcept", self.arv_plan_concept),
            ("startDrugsConcept", self.start_drugs_concept),
            ("historicalDrugStartDateConcept", self.historical_drug_start_date_concept),
            ("artProgram", self.art_program),
            ("transferredFromOtherFacilityState", self.transferred_from_other_facility_state),
        ];
        match ids.iter().find(|(_, id)| *id <= 0) {
            Some((field, id)) => Err(RetentionError::Metadata(format!(
                "{} must be a positive id, got {}",
                field, id
            ))),
            None => Ok(()),
        }
    }
}

impl HivMetadata for StaticHivMetadata {
    fn arv_pharmacy_encounter_type(&self) -> i64 {
        self.arv_pharmacy_encounter_type
    }

    fn adult_follow_up_encounter_type(&self) -> i64 {
        self.adult_follow_up_encounter_type
    }

    fn pediatric_follow_up_encounter_type(&self) -> i64 {
        self.pediatric_follow_up_encounter_type
    }

    fn arv_plan_concept(&self) -> i64 {
        self.arv_plan_concept
    }

    fn start_drugs_concept(&self) -> i64 {
        self.start_drugs_concept
    }

    fn historical_drug_start_date_concept(&self) -> i64 {
        self.historical_drug_start_date_concept
    }

    fn art_program(&self) -> i64 {
        self.art_program
    }

    fn transferred_from_other_facility_state(&self) -> i64 {
        self.transferred_from_other_facility_state
    }
}
