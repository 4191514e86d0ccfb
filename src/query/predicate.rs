use rusqlite::types::ToSql;

use crate::config::quote_ident;

/// Columns of the relationship fact table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Column {
    PredId,
    SuccId,
    PredName,
    SuccName,
    RelationshipType,
    Lag,
    Driving,
    FreeFloat,
    Lead,
    ExcessiveLag,
    Status,
    ProjectId,
}

impl Column {
    /// Projection order shared by every row listing.
    pub const PROJECTED: [Column; 11] = [
        Column::PredId,
        Column::SuccId,
        Column::PredName,
        Column::SuccName,
        Column::RelationshipType,
        Column::Lag,
        Column::Driving,
        Column::FreeFloat,
        Column::Lead,
        Column::ExcessiveLag,
        Column::Status,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Column::PredId => "Activity_ID",
            Column::SuccId => "Activity_ID2",
            Column::PredName => "Activity_Name",
            Column::SuccName => "Activity_Name2",
            Column::RelationshipType => "RelationshipType",
            Column::Lag => "Lag",
            Column::Driving => "Driving",
            Column::FreeFloat => "FreeFloat",
            Column::Lead => "Lead",
            Column::ExcessiveLag => "ExcessiveLag",
            Column::Status => "Relationship_Status",
            Column::ProjectId => "ProjectID",
        }
    }

    /// Numeric columns may hold text; comparisons cast them to REAL.
    pub fn is_numeric(self) -> bool {
        matches!(self, Column::Lag | Column::FreeFloat)
    }

    pub(crate) fn sql(self) -> String {
        quote_ident(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Eq,
    Ne,
    Lt,
    Gt,
    In,
    NotIn,
    /// NULL or blank text.
    Missing,
    /// Neither NULL nor blank text.
    Present,
    /// Missing, or not equal to the operand.
    MissingOrNe,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    None,
    Number(f64),
    Text(String),
    List(Vec<String>),
}

/// One (column, operator, value) clause. Values are only ever bound as
/// statement parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    pub column: Column,
    pub op: Operator,
    pub operand: Operand,
}

impl Predicate {
    pub fn new(column: Column, op: Operator, operand: Operand) -> Self {
        Self { column, op, operand }
    }

    pub fn text_eq(column: Column, value: &str) -> Self {
        Self::new(column, Operator::Eq, Operand::Text(value.to_string()))
    }

    pub fn number(column: Column, op: Operator, value: f64) -> Self {
        Self::new(column, op, Operand::Number(value))
    }

    pub fn in_set(column: Column, values: &[String]) -> Self {
        Self::new(column, Operator::In, Operand::List(values.to_vec()))
    }

    pub fn not_in_set(column: Column, values: &[String]) -> Self {
        Self::new(column, Operator::NotIn, Operand::List(values.to_vec()))
    }

    pub fn present(column: Column) -> Self {
        Self::new(column, Operator::Present, Operand::None)
    }

    pub fn missing_or_ne(column: Column, value: f64) -> Self {
        Self::new(column, Operator::MissingOrNe, Operand::Number(value))
    }

    /// Whether a row whose `column` equals `value` could satisfy this
    /// predicate. `None` when that cannot be decided without the store.
    pub fn admits(&self, value: &Operand) -> Option<bool> {
        match (&self.operand, value) {
            (Operand::Number(bound), Operand::Number(v)) => match self.op {
                Operator::Eq => Some(v == bound),
                Operator::Ne => Some(v != bound),
                Operator::Lt => Some(v < bound),
                Operator::Gt => Some(v > bound),
                Operator::Present => Some(true),
                Operator::MissingOrNe => Some(v != bound),
                Operator::Missing | Operator::In | Operator::NotIn => None,
            },
            (Operand::Text(bound), Operand::Text(v)) => match self.op {
                Operator::Eq => Some(v == bound),
                Operator::Ne => Some(v != bound),
                _ => None,
            },
            (Operand::List(set), Operand::Text(v)) => match self.op {
                Operator::In => Some(set.contains(v)),
                Operator::NotIn => Some(!set.contains(v)),
                _ => None,
            },
            (Operand::None, Operand::Number(_)) if self.op == Operator::Present => Some(true),
            (Operand::None, Operand::Number(_)) if self.op == Operator::Missing => Some(false),
            _ => None,
        }
    }

    /// Render as a SQL condition, appending bound values to `params`.
    pub(crate) fn render(&self, params: &mut Vec<Box<dyn ToSql>>) -> String {
        let col = self.column.sql();
        let numeric = self.column.is_numeric() && matches!(self.operand, Operand::Number(_));
        let lhs = if numeric {
            format!("CAST({col} AS REAL)")
        } else {
            col.clone()
        };

        match self.op {
            Operator::Missing => format!("({col} IS NULL OR TRIM({col}) = '')"),
            Operator::Present => format!("({col} IS NOT NULL AND TRIM({col}) <> '')"),
            Operator::MissingOrNe => {
                let idx = bind(params, &self.operand);
                format!("({col} IS NULL OR TRIM({col}) = '' OR {lhs} <> ?{idx})")
            }
            Operator::In | Operator::NotIn => {
                let values: &[String] = match &self.operand {
                    Operand::List(values) => values.as_slice(),
                    _ => &[],
                };
                if values.is_empty() {
                    // IN () is not valid SQLite
                    return if self.op == Operator::In { "0".into() } else { "1".into() };
                }
                let placeholders: Vec<String> = values
                    .iter()
                    .map(|v| {
                        params.push(Box::new(v.clone()));
                        format!("?{}", params.len())
                    })
                    .collect();
                let keyword = if self.op == Operator::In { "IN" } else { "NOT IN" };
                format!("{col} {keyword} ({})", placeholders.join(", "))
            }
            Operator::Eq | Operator::Ne | Operator::Lt | Operator::Gt => {
                let sym = match self.op {
                    Operator::Eq => "=",
                    Operator::Ne => "<>",
                    Operator::Lt => "<",
                    _ => ">",
                };
                let idx = bind(params, &self.operand);
                format!("{lhs} {sym} ?{idx}")
            }
        }
    }
}

fn bind(params: &mut Vec<Box<dyn ToSql>>, operand: &Operand) -> usize {
    match operand {
        Operand::Number(n) => params.push(Box::new(*n)),
        Operand::Text(s) => params.push(Box::new(s.clone())),
        Operand::List(values) => params.push(Box::new(values.join(","))),
        Operand::None => params.push(Box::new(rusqlite::types::Null)),
    }
    params.len()
}

/// Ordered, deduplicated clauses for one query. An unsatisfiable list
/// matches no rows and is never sent to the store.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PredicateList {
    predicates: Vec<Predicate>,
    unsatisfiable: bool,
}

impl PredicateList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `predicate` unless an identical clause is already present.
    pub fn push(&mut self, predicate: Predicate) {
        if !self.predicates.contains(&predicate) {
            self.predicates.push(predicate);
        }
    }

    pub fn mark_unsatisfiable(&mut self) {
        self.unsatisfiable = true;
    }

    pub fn is_unsatisfiable(&self) -> bool {
        self.unsatisfiable
    }

    pub fn as_slice(&self) -> &[Predicate] {
        &self.predicates
    }

    pub fn len(&self) -> usize {
        self.predicates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.predicates.is_empty()
    }

    pub fn constrains(&self, column: Column) -> bool {
        self.predicates.iter().any(|p| p.column == column)
    }

    /// ` WHERE ...` clause (empty when there is nothing to filter) and its
    /// parameters, numbered from `?1`.
    pub(crate) fn where_sql(&self) -> (String, Vec<Box<dyn ToSql>>) {
        let mut params: Vec<Box<dyn ToSql>> = Vec::new();
        if self.unsatisfiable {
            return (" WHERE 0".to_string(), params);
        }
        let wheres: Vec<String> = self
            .predicates
            .iter()
            .map(|p| p.render(&mut params))
            .collect();
        if wheres.is_empty() {
            (String::new(), params)
        } else {
            (format!(" WHERE {}", wheres.join(" AND ")), params)
        }
    }
}

impl<'a> IntoIterator for &'a PredicateList {
    type Item = &'a Predicate;
    type IntoIter = std::slice::Iter<'a, Predicate>;

    fn into_iter(self) -> Self::IntoIter {
        self.predicates.iter()
    }
}
