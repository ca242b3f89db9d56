//! Cohort definitions of the early ART retention report.

use std::sync::Arc;

use cohort_eval::{
    CohortDefinition, CohortQuery, CompositionCohort, ParameterSpec, QuerySpec, LOCATION,
};

use crate::error::{RetentionError, RetentionResult};
use crate::metadata::HivMetadata;
use crate::queries::{self, args};

const PERIOD: &str = "startDate=${startDate},endDate=${endDate},location=${location}";
const PERIOD_AS_ENROLLMENT: &str =
    "onOrAfter=${startDate},onOrBefore=${endDate},location=${location}";
const AGE_AT_END: &str = "endDate=${endDate},location=${location}";

/// Children age bracket in years.
pub const CHILDREN_AGES: (i64, i64) = (0, 14);
/// Adults age bracket in years.
pub const ADULT_AGES: (i64, i64) = (15, 200);

/// The retention report's cohort definitions.
///
/// Definitions are built once from the metadata and shared through `Arc`;
/// every accessor hands out the same immutable tree.
///
/// # Example
///
/// ```ignore
/// use cohort_eval::{CohortEvaluator, ParameterBinding};
/// use cohort_retention::{RetentionCohorts, StaticHivMetadata};
///
/// let cohorts = RetentionCohorts::new(&StaticHivMetadata::default())?;
/// let evaluator = CohortEvaluator::new(&executor);
///
/// for (segment, definition) in cohorts.all_segments() {
///     let result = evaluator.evaluate(&definition, &binding)?;
///     println!("{}: {}", segment, result.count());
/// }
/// ```
#[derive(Debug, Clone)]
pub struct RetentionCohorts {
    retained_on_art: Arc<CohortDefinition>,
    pregnant_enrolled_on_art: Arc<CohortDefinition>,
    breastfeeding_enrolled: Arc<CohortDefinition>,
    pregnant: Arc<CohortDefinition>,
    breastfeeding: Arc<CohortDefinition>,
    children: Arc<CohortDefinition>,
    adults: Arc<CohortDefinition>,
}

impl RetentionCohorts {
    /// Builds every definition of the report.
    pub fn new(metadata: &dyn HivMetadata) -> RetentionResult<Self> {
        let retained_on_art = shared(retained_on_art_query(metadata));
        let pregnant_enrolled_on_art = shared(pregnant_enrolled_on_art_query());
        let breastfeeding_enrolled = shared(breastfeeding_enrolled_query());

        let pregnant = shared(
            CompositionCohort::builder("Pregnant women retained on ART for 3 months")
                .parameters(ParameterSpec::reporting_period())
                .search("all", retained_on_art.clone(), PERIOD)
                .search("pregnant", pregnant_enrolled_on_art.clone(), PERIOD)
                .composition("all AND pregnant")
                .build()?,
        );

        let breastfeeding = shared(
            CompositionCohort::builder("Breastfeeding women retained on ART for 3 months")
                .parameters(ParameterSpec::reporting_period())
                .search("all", retained_on_art.clone(), PERIOD)
                .search("breastfeeding", breastfeeding_enrolled.clone(), PERIOD_AS_ENROLLMENT)
                .composition("all AND breastfeeding")
                .build()?,
        );

        let children = segment(
            "Children retained on ART for 3 months",
            "children",
            age_bracket_query(CHILDREN_AGES.0, CHILDREN_AGES.1)?,
            &retained_on_art,
            &pregnant,
            &breastfeeding,
        )?;
        let adults = segment(
            "Adults retained on ART for 3 months",
            "adults",
            age_bracket_query(ADULT_AGES.0, ADULT_AGES.1)?,
            &retained_on_art,
            &pregnant,
            &breastfeeding,
        )?;

        log::debug!(
            "Built retention cohorts (ART program {}, ARV plan concept {})",
            metadata.art_program(),
            metadata.arv_plan_concept()
        );

        Ok(Self {
            retained_on_art,
            pregnant_enrolled_on_art,
            breastfeeding_enrolled,
            pregnant,
            breastfeeding,
            children,
            adults,
        })
    }

    /// All patients retained on ART three months after initiation.
    pub fn retained_on_art(&self) -> Arc<CohortDefinition> {
        self.retained_on_art.clone()
    }

    /// Pregnant women enrolled on ART (`startDate`, `endDate`, `location`).
    pub fn pregnant_enrolled_on_art(&self) -> Arc<CohortDefinition> {
        self.pregnant_enrolled_on_art.clone()
    }

    /// Breastfeeding women newly enrolled (`onOrAfter`, `onOrBefore`, `location`).
    pub fn breastfeeding_enrolled(&self) -> Arc<CohortDefinition> {
        self.breastfeeding_enrolled.clone()
    }

    /// Patients aged `min..=max` years at `endDate` (`endDate`, `location`).
    pub fn age_bracket(&self, min: i64, max: i64) -> RetentionResult<Arc<CohortDefinition>> {
        age_bracket_query(min, max).map(shared)
    }

    /// `all AND pregnant`
    pub fn pregnant(&self) -> Arc<CohortDefinition> {
        self.pregnant.clone()
    }

    /// `all AND breastfeeding`
    pub fn breastfeeding(&self) -> Arc<CohortDefinition> {
        self.breastfeeding.clone()
    }

    /// `all AND children AND NOT(pregnant OR breastfeeding)`
    pub fn children(&self) -> Arc<CohortDefinition> {
        self.children.clone()
    }

    /// `all AND adults AND NOT(pregnant OR breastfeeding)`
    pub fn adults(&self) -> Arc<CohortDefinition> {
        self.adults.clone()
    }

    /// The report's segments in report order.
    pub fn all_segments(&self) -> Vec<(&'static str, Arc<CohortDefinition>)> {
        vec![
            ("all", self.retained_on_art()),
            ("pregnant", self.pregnant()),
            ("breastfeeding", self.breastfeeding()),
            ("children", self.children()),
            ("adults", self.adults()),
        ]
    }
}

fn shared(definition: impl Into<CohortDefinition>) -> Arc<CohortDefinition> {
    Arc::new(definition.into())
}

fn retained_on_art_query(metadata: &dyn HivMetadata) -> CohortQuery {
    let query = QuerySpec::new(queries::RETAINED_ON_ART_3_MONTHS)
        .with_argument(args::ARV_PHARMACY_ENCOUNTER_TYPE, metadata.arv_pharmacy_encounter_type())
        .with_argument(
            args::ADULT_FOLLOW_UP_ENCOUNTER_TYPE,
            metadata.adult_follow_up_encounter_type(),
        )
        .with_argument(
            args::PEDIATRIC_FOLLOW_UP_ENCOUNTER_TYPE,
            metadata.pediatric_follow_up_encounter_type(),
        )
        .with_argument(args::ARV_PLAN_CONCEPT, metadata.arv_plan_concept())
        .with_argument(args::START_DRUGS_CONCEPT, metadata.start_drugs_concept())
        .with_argument(
            args::HISTORICAL_DRUG_START_DATE_CONCEPT,
            metadata.historical_drug_start_date_concept(),
        )
        .with_argument(args::ART_PROGRAM, metadata.art_program())
        .with_argument(
            args::TRANSFERRED_FROM_OTHER_FACILITY_STATE,
            metadata.transferred_from_other_facility_state(),
        );

    CohortQuery::new(
        "Retained on ART for 3 months from initiation",
        ParameterSpec::reporting_period(),
        query,
    )
}

fn pregnant_enrolled_on_art_query() -> CohortQuery {
    CohortQuery::new(
        "Pregnant women enrolled on ART",
        ParameterSpec::reporting_period(),
        QuerySpec::new(queries::PREGNANT_ENROLLED_ON_ART),
    )
}

fn breastfeeding_enrolled_query() -> CohortQuery {
    CohortQuery::new(
        "Breastfeeding women enrolled on ART",
        vec![
            ParameterSpec::date("onOrAfter", "On or after"),
            ParameterSpec::date("onOrBefore", "On or before"),
            ParameterSpec::location(LOCATION, "Location"),
        ],
        QuerySpec::new(queries::TX_NEW_BREASTFEEDING),
    )
}

fn age_bracket_query(min: i64, max: i64) -> RetentionResult<CohortQuery> {
    if min < 0 || min > max {
        return Err(RetentionError::InvalidAgeBracket { min, max });
    }
    Ok(CohortQuery::new(
        format!("Patients aged {} to {} years", min, max),
        vec![
            ParameterSpec::date(cohort_eval::END_DATE, "End Date"),
            ParameterSpec::location(LOCATION, "Location"),
        ],
        QuerySpec::new(queries::AGE_BRACKET)
            .with_argument(args::MIN_AGE, min)
            .with_argument(args::MAX_AGE, max),
    ))
}

fn segment(
    name: &str,
    age_search: &str,
    age: CohortQuery,
    all: &Arc<CohortDefinition>,
    pregnant: &Arc<CohortDefinition>,
    breastfeeding: &Arc<CohortDefinition>,
) -> RetentionResult<Arc<CohortDefinition>> {
    let composition = CompositionCohort::builder(name)
        .parameters(ParameterSpec::reporting_period())
        .search("all", all.clone(), PERIOD)
        .search(age_search, shared(age), AGE_AT_END)
        .search("pregnant", pregnant.clone(), PERIOD)
        .search("breastfeeding", breastfeeding.clone(), PERIOD)
        .composition(&format!(
            "all AND {} AND NOT(pregnant OR breastfeeding)",
            age_search
        ))
        .build()?;
    Ok(shared(composition))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::StaticHivMetadata;
    use cohort_eval::EvaluationPlan;

    fn cohorts() -> RetentionCohorts {
        RetentionCohorts::new(&StaticHivMetadata::default()).unwrap()
    }

    #[test]
    fn test_retained_on_art_carries_metadata() {
        let metadata = StaticHivMetadata {
            art_program: 5,
            ..StaticHivMetadata::default()
        };
        let cohorts = RetentionCohorts::new(&metadata).unwrap();
        match cohorts.retained_on_art().as_ref() {
            CohortDefinition::Query(query) => {
                assert_eq!(query.query().id(), queries::RETAINED_ON_ART_3_MONTHS);
                assert_eq!(query.query().argument(args::ART_PROGRAM), Some(5));
                assert_eq!(query.query().argument(args::ARV_PLAN_CONCEPT), Some(1255));
                assert_eq!(query.query().arguments().count(), 8);
            }
            other => panic!("expected raw query, got {:?}", other),
        }
    }

    #[test]
    fn test_segment_compositions() {
        let cohorts = cohorts();
        let expression = |definition: Arc<CohortDefinition>| match definition.as_ref() {
            CohortDefinition::Composition(c) => c.expression().to_string(),
            CohortDefinition::Query(_) => String::new(),
        };
        assert_eq!(expression(cohorts.pregnant()), "all AND pregnant");
        assert_eq!(expression(cohorts.breastfeeding()), "all AND breastfeeding");
        assert_eq!(
            expression(cohorts.children()),
            "all AND children AND NOT(pregnant OR breastfeeding)"
        );
        assert_eq!(
            expression(cohorts.adults()),
            "all AND adults AND NOT(pregnant OR breastfeeding)"
        );
    }

    #[test]
    fn test_breastfeeding_mapping_renames_period() {
        let cohorts = cohorts();
        let CohortDefinition::Composition(composition) = cohorts.breastfeeding().as_ref().clone()
        else {
            panic!("expected composition");
        };
        let mappings = composition.search("breastfeeding").unwrap().mappings.to_string();
        assert!(mappings.contains("onOrAfter=${startDate}"));
        assert!(mappings.contains("onOrBefore=${endDate}"));
    }

    #[test]
    fn test_segments_share_definitions() {
        let cohorts = cohorts();
        let CohortDefinition::Composition(children) = cohorts.children().as_ref().clone() else {
            panic!("expected composition");
        };
        assert!(Arc::ptr_eq(
            &children.search("all").unwrap().definition,
            &cohorts.retained_on_art()
        ));
    }

    #[test]
    fn test_children_plan() {
        let plan = EvaluationPlan::for_definition(&cohorts().children());
        assert_eq!(plan.query_count(), 6);
        assert_eq!(plan.composition_count(), 3);
    }

    #[test]
    fn test_age_bracket() {
        let cohorts = cohorts();
        let definition = cohorts.age_bracket(15, 49).unwrap();
        assert_eq!(definition.name(), "Patients aged 15 to 49 years");
        assert_eq!(definition.parameters().len(), 2);

        assert!(matches!(
            cohorts.age_bracket(15, 14),
            Err(RetentionError::InvalidAgeBracket { min: 15, max: 14 })
        ));
        assert!(cohorts.age_bracket(-1, 4).is_err());
    }

    #[test]
    fn test_all_segments_order() {
        let names: Vec<&str> = cohorts().all_segments().into_iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["all", "pregnant", "breastfeeding", "children", "adults"]);
    }
}
