use rusqlite::{params, Connection};

use crate::query::scalar::Scalar;

/// A relationship row to load into an in-memory store.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct NewRelationship {
    pub pred_id: String,
    pub succ_id: String,
    pub pred_name: String,
    pub succ_name: String,
    pub relationship_type: String,
    pub lag: Scalar,
    pub driving: Scalar,
    pub free_float: Scalar,
    pub lead: Scalar,
    pub excessive_lag: Scalar,
    pub status: String,
    pub project_id: Scalar,
}

impl NewRelationship {
    /// An incomplete relationship `pred -> succ` of the given type and lag.
    pub fn new(pred: &str, succ: &str, relationship_type: &str, lag: impl Into<Scalar>) -> Self {
        Self {
            pred_id: pred.to_string(),
            succ_id: succ.to_string(),
            pred_name: format!("Activity {pred}"),
            succ_name: format!("Activity {succ}"),
            relationship_type: relationship_type.to_string(),
            lag: lag.into(),
            driving: Scalar::Null,
            free_float: Scalar::Null,
            lead: Scalar::Null,
            excessive_lag: Scalar::Null,
            status: "Incomplete".to_string(),
            project_id: Scalar::Null,
        }
    }

    pub fn status(mut self, status: &str) -> Self {
        self.status = status.to_string();
        self
    }

    pub fn driving(mut self, driving: &str) -> Self {
        self.driving = driving.into();
        self
    }

    pub fn free_float(mut self, free_float: impl Into<Scalar>) -> Self {
        self.free_float = free_float.into();
        self
    }

    pub fn lead(mut self, lead: &str) -> Self {
        self.lead = lead.into();
        self
    }

    pub fn excessive_lag(mut self, flag: &str) -> Self {
        self.excessive_lag = flag.into();
        self
    }

    pub fn project(mut self, project_id: &str) -> Self {
        self.project_id = project_id.into();
        self
    }
}

pub(crate) fn insert_relationship(conn: &Connection, rel: &NewRelationship) -> Result<(), rusqlite::Error> {
    conn.execute(
        "INSERT INTO ActivityRelationshipView (
            Activity_ID, Activity_ID2, Activity_Name, Activity_Name2,
            RelationshipType, Lag, Driving, FreeFloat, Lead, ExcessiveLag,
            Relationship_Status, ProjectID
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
        params![
            rel.pred_id,
            rel.succ_id,
            rel.pred_name,
            rel.succ_name,
            rel.relationship_type,
            rel.lag,
            rel.driving,
            rel.free_float,
            rel.lead,
            rel.excessive_lag,
            rel.status,
            rel.project_id,
        ],
    )?;
    Ok(())
}

pub(crate) fn insert_project(conn: &Connection, id: &str, short_name: &str) -> Result<(), rusqlite::Error> {
    conn.execute(
        "INSERT OR REPLACE INTO PROJECT (proj_id, proj_short_name) VALUES (?1, ?2)",
        params![id, short_name],
    )?;
    Ok(())
}

/// In-memory stores seeded with relationship fixtures.
pub(crate) mod fixtures {
    use super::*;
    use crate::storage::Database;

    pub async fn store_with(rows: Vec<NewRelationship>) -> Database {
        let db = Database::open_memory().await.unwrap();
        db.writer()
            .unwrap()
            .call(move |conn| {
                for row in &rows {
                    insert_relationship(conn, row)?;
                }
                Ok::<(), rusqlite::Error>(())
            })
            .await
            .unwrap();
        db
    }

    /// Three incomplete relationships: FS lag 0, FS lag 5, FS-1 lag -2.
    pub async fn example_store() -> Database {
        store_with(vec![
            NewRelationship::new("A", "B", "FS", 0i64),
            NewRelationship::new("B", "C", "FS", 5i64),
            NewRelationship::new("C", "D", "FS-1", -2i64),
        ])
        .await
    }

    /// A mixed schedule covering every metric.
    pub async fn schedule_store() -> Database {
        let db = store_with(vec![
            NewRelationship::new("A100", "A110", "PR_FS", 0i64).driving("Yes").free_float(0i64).project("P1"),
            NewRelationship::new("A110", "A120", "PR_FS", 3i64).driving("Yes").free_float(2i64).project("P1"),
            NewRelationship::new("A120", "A130", "PR_FS1", "10").driving("No").free_float("5").project("P1")
                .excessive_lag("Excessive Lag"),
            NewRelationship::new("A130", "A140", "PR_SS", -1i64).driving("No").free_float("n/a").project("P2")
                .lead("Lead"),
            NewRelationship::new("A140", "A150", "PR_FF", Scalar::Null).driving("Yes").project("P2"),
            NewRelationship::new("A150", "A160", "PR_SS", 0i64).driving("No").project("P2"),
            NewRelationship::new("A160", "A170", "PR_FS", -4i64).driving("No").free_float(1i64).project("P2")
                .lead("Lead"),
            NewRelationship::new("A170", "A180", "PR_FS", 2i64).status("Complete").project("P1"),
            NewRelationship::new("A180", "A190", "PR_FF", "TBD").driving("Yes").project("P1"),
            NewRelationship::new("A190", "A200", "PR_SF", 30i64).driving("No").project("P2")
                .excessive_lag("Excessive Lag"),
        ])
        .await;
        db.writer()
            .unwrap()
            .call(|conn| {
                insert_project(conn, "P1", "Tower Block")?;
                insert_project(conn, "P2", "Car Park")?;
                Ok::<(), rusqlite::Error>(())
            })
            .await
            .unwrap();
        db
    }

    /// Table name used by `text_store`.
    pub const TEXT_TABLE: &str = "TextRelationships";

    /// Schedule export whose Lag and FreeFloat columns are declared TEXT, so
    /// numbers, blanks and words are all stored as strings.
    pub async fn text_store() -> Database {
        let db = Database::open_memory().await.unwrap();
        db.writer()
            .unwrap()
            .call(|conn| {
                conn.execute_batch(
                    "CREATE TABLE TextRelationships (
                        Activity_ID TEXT, Activity_ID2 TEXT, Activity_Name TEXT,
                        Activity_Name2 TEXT, RelationshipType TEXT, Lag TEXT,
                        Driving TEXT, FreeFloat TEXT, Lead TEXT, ExcessiveLag TEXT,
                        Relationship_Status TEXT, ProjectID TEXT
                    );
                    INSERT INTO TextRelationships VALUES
                        ('T1', 'T2', 't1', 't2', 'PR_FS',  '5',   'Yes', '5',   NULL, NULL, 'Incomplete', 'P1'),
                        ('T2', 'T3', 't2', 't3', 'PR_FS',  '0',   'No',  '0',   NULL, NULL, 'Incomplete', 'P1'),
                        ('T3', 'T4', 't3', 't4', 'PR_FS1', '-2',  'No',  '',    'Lead', NULL, 'Incomplete', 'P1'),
                        ('T4', 'T5', 't4', 't5', 'PR_SS',  '',    'Yes', 'TBD', NULL, NULL, 'Incomplete', 'P2'),
                        ('T5', 'T6', 't5', 't6', 'PR_FF',  'TBD', 'No',  '-1',  NULL, NULL, 'Incomplete', 'P2'),
                        ('T6', 'T7', 't6', 't7', 'PR_FS',  '5.0', 'Yes', '2',   NULL, NULL, 'Incomplete', 'P2'),
                        ('T7', 'T8', 't7', 't8', 'PR_SS',  '10',  'No',  NULL,  NULL, 'Excessive Lag', 'Incomplete', 'P2'),
                        ('T8', 'T9', 't8', 't9', 'PR_FS1', 'TBD', 'Yes', 'n/a', NULL, NULL, 'Incomplete', 'P1'),
                        ('T9', 'TA', 't9', 'ta', 'PR_FS',  '7',   'Yes', '3',   NULL, NULL, 'Complete',   'P1');",
                )?;
                Ok::<(), rusqlite::Error>(())
            })
            .await
            .unwrap();
        db
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;

    #[tokio::test]
    async fn test_relationship_round_trip() {
        let db = store_with(vec![NewRelationship::new("A", "B", "PR_FS", "  ")
            .driving("Yes")
            .free_float(1.5)
            .project("P9")])
        .await;

        let row: (String, Scalar, Scalar, String, String) = db
            .read(|conn| {
                Ok(conn.query_row(
                    "SELECT Activity_Name, Lag, FreeFloat, Relationship_Status, ProjectID
                     FROM ActivityRelationshipView",
                    [],
                    |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?)),
                )?)
            })
            .await
            .unwrap();

        assert_eq!(row.0, "Activity A");
        assert!(row.1.is_missing());
        assert_eq!(row.2, Scalar::Real(1.5));
        assert_eq!(row.3, "Incomplete");
        assert_eq!(row.4, "P9");
    }

    #[tokio::test]
    async fn test_numeric_text_lag_is_stored_as_number() {
        let db = store_with(vec![NewRelationship::new("A", "B", "PR_FS", "10")]).await;
        let lag: Scalar = db
            .read(|conn| {
                Ok(conn.query_row("SELECT Lag FROM ActivityRelationshipView", [], |row| row.get(0))?)
            })
            .await
            .unwrap();
        assert_eq!(lag, Scalar::Integer(10));
    }
}
