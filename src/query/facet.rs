use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::error::Error;
use crate::query::predicate::Column;

/// Facet value meaning "unconstrained".
pub const ALL: &str = "All";

/// A user-selectable filter dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Facet {
    RelationshipType,
    Driving,
    Lag,
    FreeFloat,
    Project,
}

impl Facet {
    pub const ALL: [Facet; 5] = [
        Facet::RelationshipType,
        Facet::Driving,
        Facet::Lag,
        Facet::FreeFloat,
        Facet::Project,
    ];

    /// Query parameter name used by the dashboard.
    pub fn param_name(self) -> &'static str {
        match self {
            Facet::RelationshipType => "relationship_type",
            Facet::Driving => "driving",
            Facet::Lag => "lag",
            Facet::FreeFloat => "free_float",
            Facet::Project => "project_id",
        }
    }

    pub fn column(self) -> Column {
        match self {
            Facet::RelationshipType => Column::RelationshipType,
            Facet::Driving => Column::Driving,
            Facet::Lag => Column::Lag,
            Facet::FreeFloat => Column::FreeFloat,
            Facet::Project => Column::ProjectId,
        }
    }

    pub fn for_column(column: Column) -> Option<Facet> {
        Facet::ALL.into_iter().find(|f| f.column() == column)
    }

    pub fn is_numeric(self) -> bool {
        self.column().is_numeric()
    }
}

impl fmt::Display for Facet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.param_name())
    }
}

impl FromStr for Facet {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "relationship_type" | "type" => Ok(Facet::RelationshipType),
            "driving" => Ok(Facet::Driving),
            "lag" => Ok(Facet::Lag),
            "free_float" | "freefloat" => Ok(Facet::FreeFloat),
            "project_id" | "project" => Ok(Facet::Project),
            _ => Err(Error::Config(format!("unknown facet: {s}"))),
        }
    }
}

/// The facet values chosen for one request. Absent facets are unconstrained.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FacetSelection {
    values: BTreeMap<Facet, String>,
}

impl FacetSelection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Constrain `facet` to `value`. "All" and blank values clear the facet.
    pub fn with(mut self, facet: Facet, value: &str) -> Self {
        let value = value.trim();
        if value.is_empty() || value == ALL {
            self.values.remove(&facet);
        } else {
            self.values.insert(facet, value.to_string());
        }
        self
    }

    pub fn relationship_type(self, value: &str) -> Self {
        self.with(Facet::RelationshipType, value)
    }

    pub fn driving(self, value: &str) -> Self {
        self.with(Facet::Driving, value)
    }

    pub fn lag(self, value: &str) -> Self {
        self.with(Facet::Lag, value)
    }

    pub fn free_float(self, value: &str) -> Self {
        self.with(Facet::FreeFloat, value)
    }

    pub fn project(self, value: &str) -> Self {
        self.with(Facet::Project, value)
    }

    /// Build a selection from request parameters. Parameters that do not
    /// name a facet are ignored.
    pub fn from_params<'a, I>(params: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        params
            .into_iter()
            .fold(Self::new(), |selection, (name, value)| {
                match Facet::ALL.into_iter().find(|f| f.param_name() == name) {
                    Some(facet) => selection.with(facet, value),
                    None => selection,
                }
            })
    }

    pub fn get(&self, facet: Facet) -> Option<&str> {
        self.values.get(&facet).map(String::as_str)
    }

    pub fn is_constrained(&self, facet: Facet) -> bool {
        self.values.contains_key(&facet)
    }

    pub fn is_unconstrained(&self) -> bool {
        self.values.is_empty()
    }

    /// The same selection with `facet` released.
    pub fn without(&self, facet: Facet) -> Self {
        let mut values = self.values.clone();
        values.remove(&facet);
        Self { values }
    }

    pub fn iter(&self) -> impl Iterator<Item = (Facet, &str)> {
        self.values.iter().map(|(f, v)| (*f, v.as_str()))
    }
}
