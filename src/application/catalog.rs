//! Fetch plans for every known collection, plus per-collection accessors.

use std::collections::BTreeMap;

use omnia_types::{FetchPlan, HydratedItem, LegacyFormat, ReferenceSpec, ResourceId};
use once_cell::sync::Lazy;
use tokio_util::sync::CancellationToken;

use super::error::HydrateError;
use super::flight::HydratedCollection;
use super::hydrate::{Hydrator, Resource};

static STANDARD: Lazy<Catalog> = Lazy::new(Catalog::standard);

/// Named set of fetch plans.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    plans: BTreeMap<String, FetchPlan>,
}

impl Catalog {
    /// The built-in catalog.
    pub fn global() -> &'static Catalog {
        &STANDARD
    }

    pub fn new(plans: impl IntoIterator<Item = FetchPlan>) -> Self {
        Self {
            plans: plans
                .into_iter()
                .map(|plan| (plan.name().to_owned(), plan))
                .collect(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&FetchPlan> {
        self.plans.get(name)
    }

    pub fn plan(&self, name: &str) -> Result<&FetchPlan, HydrateError> {
        self.get(name).ok_or_else(|| HydrateError::unknown(name))
    }

    pub fn plans(&self) -> impl Iterator<Item = &FetchPlan> {
        self.plans.values()
    }

    pub fn len(&self) -> usize {
        self.plans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plans.is_empty()
    }

    fn standard() -> Self {
        let people = |source: &str, target: &str| {
            ReferenceSpec::array(source, target, "actants").or_from("students")
        };
        let keywords =
            || ReferenceSpec::array("keywordIds", "keywords", "keywords").legacy(LegacyFormat::Csv);

        Self::new([
            FetchPlan::builder("universities")
                .item_type("university")
                .build(),
            FetchPlan::builder("laboratories")
                .item_type("laboratory")
                .reference(ReferenceSpec::single(
                    "universityId",
                    "university",
                    "universities",
                ))
                .build(),
            FetchPlan::builder("doctoralSchools")
                .item_type("doctoralSchool")
                .reference(ReferenceSpec::single(
                    "universityId",
                    "university",
                    "universities",
                ))
                .build(),
            FetchPlan::builder("keywords").item_type("keyword").build(),
            FetchPlan::builder("actants")
                .item_type("actant")
                .reference(ReferenceSpec::array(
                    "universityIds",
                    "universities",
                    "universities",
                ))
                .reference(ReferenceSpec::array(
                    "laboratoryIds",
                    "laboratories",
                    "laboratories",
                ))
                .reference(ReferenceSpec::array(
                    "doctoralSchoolIds",
                    "doctoralSchools",
                    "doctoralSchools",
                ))
                .build(),
            FetchPlan::builder("students")
                .item_type("student")
                .reference(ReferenceSpec::single(
                    "universityId",
                    "university",
                    "universities",
                ))
                .reference(ReferenceSpec::single(
                    "doctoralSchoolId",
                    "doctoralSchool",
                    "doctoralSchools",
                ))
                .reference(ReferenceSpec::array("supervisorIds", "supervisors", "actants"))
                .build(),
            FetchPlan::builder("conferences")
                .item_type("conference")
                .reference(ReferenceSpec::single("actantId", "actant", "actants"))
                .reference(keywords())
                .build(),
            FetchPlan::builder("seminars")
                .item_type("seminar")
                .reference(
                    ReferenceSpec::array("actantIds", "actants", "actants")
                        .legacy(LegacyFormat::Csv),
                )
                .reference(keywords())
                .build(),
            FetchPlan::builder("studyDays")
                .item_type("studyDay")
                .reference(
                    ReferenceSpec::array("actantIds", "actants", "actants")
                        .legacy(LegacyFormat::Csv),
                )
                .reference(keywords())
                .build(),
            FetchPlan::builder("citations")
                .item_type("citation")
                .reference(ReferenceSpec::single("actantId", "actant", "actants"))
                .reference(ReferenceSpec::single(
                    "conferenceId",
                    "conference",
                    "conferences",
                ))
                .build(),
            FetchPlan::builder("bibliographies")
                .item_type("bibliography")
                .reference(people("creatorIds", "creators"))
                .build(),
            FetchPlan::builder("mediagraphies")
                .item_type("mediagraphy")
                .reference(people("creatorIds", "creators"))
                .build(),
            FetchPlan::builder("works")
                .item_type("work")
                .reference(people("contributorIds", "contributors"))
                .reference(keywords())
                .build(),
            FetchPlan::builder("recitsArtistiques")
                .item_type("recitArtistique")
                .reference(people("contributorIds", "contributors"))
                .reference(keywords())
                .reference(ReferenceSpec::array("workIds", "works", "works"))
                .build(),
        ])
    }
}

/// Typed entry points over a [`Hydrator`] and a [`Catalog`].
#[derive(Clone)]
pub struct Resources {
    hydrator: Hydrator,
    catalog: &'static Catalog,
}

impl Resources {
    pub fn new(hydrator: Hydrator) -> Self {
        Self::with_catalog(hydrator, Catalog::global())
    }

    pub fn with_catalog(hydrator: Hydrator, catalog: &'static Catalog) -> Self {
        Self { hydrator, catalog }
    }

    pub fn hydrator(&self) -> &Hydrator {
        &self.hydrator
    }

    pub async fn resource(
        &self,
        name: &str,
        id: Option<ResourceId>,
    ) -> Result<Resource, HydrateError> {
        let plan = self.catalog.plan(name)?;
        self.hydrator.get_resource(plan, id).await
    }

    pub async fn resource_with(
        &self,
        name: &str,
        id: Option<ResourceId>,
        cancel: &CancellationToken,
    ) -> Result<Resource, HydrateError> {
        let plan = self.catalog.plan(name)?;
        self.hydrator.get_resource_with(plan, id, cancel).await
    }

    pub async fn all(&self, name: &str) -> Result<HydratedCollection, HydrateError> {
        let plan = self.catalog.plan(name)?;
        self.hydrator.get_all(plan).await
    }

    pub async fn one(
        &self,
        name: &str,
        id: impl Into<ResourceId>,
    ) -> Result<Option<HydratedItem>, HydrateError> {
        let plan = self.catalog.plan(name)?;
        self.hydrator.get_one(plan, id).await
    }
}

macro_rules! collection_accessors {
    ($($name:literal => $all:ident, $one:ident;)*) => {
        impl Resources {
            $(
                #[doc = concat!("Every hydrated record of `", $name, "`.")]
                pub async fn $all(&self) -> Result<HydratedCollection, HydrateError> {
                    self.all($name).await
                }

                #[doc = concat!("One hydrated record of `", $name, "`, if present.")]
                pub async fn $one(
                    &self,
                    id: impl Into<ResourceId>,
                ) -> Result<Option<HydratedItem>, HydrateError> {
                    self.one($name, id).await
                }
            )*
        }

        #[cfg(test)]
        const ACCESSOR_COLLECTIONS: &[&str] = &[$($name),*];
    };
}

collection_accessors! {
    "universities" => universities, university;
    "laboratories" => laboratories, laboratory;
    "doctoralSchools" => doctoral_schools, doctoral_school;
    "keywords" => keywords, keyword;
    "actants" => actants, actant;
    "students" => students, student;
    "conferences" => conferences, conference;
    "seminars" => seminars, seminar;
    "studyDays" => study_days, study_day;
    "citations" => citations, citation;
    "bibliographies" => bibliographies, bibliography;
    "mediagraphies" => mediagraphies, mediagraphy;
    "works" => works, work;
    "recitsArtistiques" => recits_artistiques, recit_artistique;
}
