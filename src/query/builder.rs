use crate::error::Error;
use crate::metrics::MetricDescriptor;
use crate::query::facet::{Facet, FacetSelection};
use crate::query::predicate::{Operand, Operator, Predicate, PredicateList};

/// Which question a predicate list answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Scope {
    /// Rows listed for the metric; also the option-catalog scope.
    #[default]
    List,
    /// KPI numerator: the list scope plus the metric's subset-only clause.
    Subset,
    /// KPI denominator ("remaining" relationships).
    Superset,
}

/// Turns a metric descriptor and a facet selection into predicate clauses.
#[derive(Debug, Clone)]
pub struct PredicateBuilder<'a> {
    descriptor: &'a MetricDescriptor,
    selection: &'a FacetSelection,
    scope: Scope,
}

impl<'a> PredicateBuilder<'a> {
    pub fn new(descriptor: &'a MetricDescriptor, selection: &'a FacetSelection) -> Self {
        Self {
            descriptor,
            selection,
            scope: Scope::List,
        }
    }

    pub fn scope(mut self, scope: Scope) -> Self {
        self.scope = scope;
        self
    }

    /// Compose the clauses: status, mandatory base, relationship type
    /// (explicit or default), then every other constrained facet.
    pub fn build(&self) -> PredicateList {
        let d = self.descriptor;
        let superset = self.scope == Scope::Superset;
        let mut list = PredicateList::new();

        list.push(d.status.clone());

        if !superset {
            for clause in &d.base {
                list.push(clause.clone());
            }
        }

        if !superset || d.superset_keeps_type {
            match self.selection.get(Facet::RelationshipType) {
                Some(value) => list.push(facet_predicate(Facet::RelationshipType, value)),
                None => {
                    if let Some(default) = &d.default_type {
                        list.push(default.clone());
                    }
                }
            }
        }

        for facet in [Facet::Driving, Facet::Lag, Facet::FreeFloat, Facet::Project] {
            let Some(value) = self.selection.get(facet) else {
                continue;
            };
            if superset && d.defining_columns.contains(&facet.column()) {
                continue;
            }
            list.push(facet_predicate(facet, value));
        }

        if self.scope == Scope::Subset {
            if let Some(clause) = &d.subset_clause {
                self.apply_subset_clause(clause, &mut list);
            }
        }

        list
    }

    /// An explicit choice on the clause's column replaces the clause. If the
    /// chosen value lies outside the clause's domain nothing can match.
    fn apply_subset_clause(&self, clause: &Predicate, list: &mut PredicateList) {
        let explicit = Facet::for_column(clause.column)
            .and_then(|facet| self.selection.get(facet).map(|value| (facet, value)));

        match explicit {
            None => list.push(clause.clone()),
            Some((facet, value)) => {
                if clause.admits(&facet_operand(facet, value)) == Some(false) {
                    log::debug!(
                        "{}: {}={value} excludes every subset row",
                        self.descriptor.metric,
                        facet
                    );
                    list.mark_unsatisfiable();
                }
            }
        }
    }
}

/// The bound form of a selected facet value. Numeric facets take a number
/// when the value parses; otherwise the literal text is compared.
pub(crate) fn facet_operand(facet: Facet, value: &str) -> Operand {
    if facet.is_numeric() {
        match value.trim().parse::<f64>() {
            Ok(n) if n.is_finite() => return Operand::Number(n),
            _ => log::debug!(
                "{}",
                Error::MalformedFacetValue {
                    facet: facet.to_string(),
                    value: value.to_string(),
                }
            ),
        }
    }
    Operand::Text(value.to_string())
}

/// Equality clause for one selected facet value.
pub(crate) fn facet_predicate(facet: Facet, value: &str) -> Predicate {
    Predicate::new(facet.column(), Operator::Eq, facet_operand(facet, value))
}
