//! Lab service catalog database operations.

use rusqlite::{params, OptionalExtension, Row};

use super::{Database, DbResult};
use crate::models::LabService;

const SERVICE_COLUMNS: &str =
    "id, code, name, category, price, sample_type, reference_range, unit, active";

impl Database {
    /// Insert a catalog entry.
    pub fn insert_service(&self, service: &LabService) -> DbResult<()> {
        self.conn.execute(
            r#"
            INSERT INTO lab_services (
                id, code, name, category, price, sample_type,
                reference_range, unit, active
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
            params![
                service.id,
                service.code,
                service.name,
                service.category,
                service.price,
                service.sample_type,
                service.reference_range,
                service.unit,
                service.active,
            ],
        )?;
        Ok(())
    }

    /// Get a catalog entry by ID.
    pub fn get_service(&self, id: i64) -> DbResult<Option<LabService>> {
        self.conn
            .query_row(
                &format!("SELECT {} FROM lab_services WHERE id = ?", SERVICE_COLUMNS),
                [id],
                service_from_row,
            )
            .optional()
            .map_err(Into::into)
    }

    /// List catalog entries ordered by name.
    pub fn list_catalog(&self, active_only: bool) -> DbResult<Vec<LabService>> {
        let sql = if active_only {
            format!(
                "SELECT {} FROM lab_services WHERE active = 1 ORDER BY name",
                SERVICE_COLUMNS
            )
        } else {
            format!("SELECT {} FROM lab_services ORDER BY name", SERVICE_COLUMNS)
        };

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([], service_from_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// Withdraw a service from new orders. Existing orders keep their snapshot.
    pub fn deactivate_service(&self, id: i64) -> DbResult<bool> {
        let rows_affected = self
            .conn
            .execute("UPDATE lab_services SET active = 0 WHERE id = ?", [id])?;
        Ok(rows_affected > 0)
    }
}

fn service_from_row(row: &Row<'_>) -> rusqlite::Result<LabService> {
    Ok(LabService {
        id: row.get(0)?,
        code: row.get(1)?,
        name: row.get(2)?,
        category: row.get(3)?,
        price: row.get(4)?,
        sample_type: row.get(5)?,
        reference_range: row.get(6)?,
        unit: row.get(7)?,
        active: row.get(8)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_and_get() {
        let db = Database::open_in_memory().unwrap();
        let mut service = LabService::new(
            7,
            "FBS".into(),
            "Fasting Blood Sugar".into(),
            "biochemistry".into(),
            85_000,
        );
        service.reference_range = Some("70-100".into());
        service.unit = Some("mg/dL".into());
        db.insert_service(&service).unwrap();

        let retrieved = db.get_service(7).unwrap().unwrap();
        assert_eq!(retrieved, service);
        assert!(db.get_service(8).unwrap().is_none());
    }

    #[test]
    fn test_deactivate_hides_from_active_listing() {
        let db = Database::open_in_memory().unwrap();
        db.insert_service(&LabService::new(1, "CBC".into(), "Complete Blood Count".into(), "hematology".into(), 120_000))
            .unwrap();
        db.insert_service(&LabService::new(2, "TSH".into(), "Thyroid Stimulating Hormone".into(), "hormones".into(), 200_000))
            .unwrap();

        assert!(db.deactivate_service(2).unwrap());

        assert_eq!(db.list_catalog(true).unwrap().len(), 1);
        assert_eq!(db.list_catalog(false).unwrap().len(), 2);
    }
}
