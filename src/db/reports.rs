use super::*;

/// One of the four append-only report tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportTable {
    Brand,
    Product,
    Store,
    UserAccount,
}

impl ReportTable {
    fn table(self) -> (&'static str, &'static str) {
        match self {
            ReportTable::Brand => ("brand_report", "brand_id"),
            ReportTable::Product => ("product_report", "product_id"),
            ReportTable::Store => ("store_report", "store_id"),
            ReportTable::UserAccount => ("user_account_report", "user_account_id"),
        }
    }
}

impl CatalogDb {
    // =========================================================================
    // Reports
    // =========================================================================

    /// Append a report row and return it.
    pub fn insert_report(
        &self,
        table: ReportTable,
        target_id: i64,
        reporter_id: i64,
        report_type: i64,
        comment: Option<&str>,
    ) -> Result<DbReport, DbError> {
        let (name, column) = table.table();
        let now = Self::now();
        let sql = format!(
            "INSERT INTO {} ({}, reporter_id, report_type, comment, creation_timestamp)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            name, column
        );
        self.conn
            .execute(&sql, params![target_id, reporter_id, report_type, comment, now])?;
        Ok(DbReport {
            id: self.last_id(),
            target_id,
            reporter_id,
            report_type,
            comment: comment.map(str::to_string),
            creation_timestamp: now,
        })
    }

    pub fn reports_for(&self, table: ReportTable, target_id: i64) -> Result<Vec<DbReport>, DbError> {
        let (name, column) = table.table();
        let sql = format!(
            "SELECT id, {}, reporter_id, report_type, comment, creation_timestamp
             FROM {} WHERE {} = ?1 ORDER BY id",
            column, name, column
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params![target_id], |row| {
            Ok(DbReport {
                id: row.get(0)?,
                target_id: row.get(1)?,
                reporter_id: row.get(2)?,
                report_type: row.get(3)?,
                comment: row.get(4)?,
                creation_timestamp: row.get(5)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }
}

#[cfg(test)]
mod tests {
    use super::ReportTable;
    use crate::db::test_utils::{seed_account, test_db};

    #[test]
    fn test_reports_append() {
        let db = test_db();
        let owner = seed_account(&db, "owner");
        let reporter = seed_account(&db, "reporter");
        let brand = db.insert_brand("acme", "Acme", owner).unwrap();

        let report = db
            .insert_report(ReportTable::Brand, brand, reporter, 1, Some("dupe of acme2"))
            .unwrap();
        assert_eq!(report.target_id, brand);
        db.insert_report(ReportTable::Brand, brand, reporter, 1, None)
            .unwrap();

        let rows = db.reports_for(ReportTable::Brand, brand).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].comment.as_deref(), Some("dupe of acme2"));
        assert!(db.reports_for(ReportTable::UserAccount, owner).unwrap().is_empty());
    }
}
