use rusqlite::{params, Row};

use super::CatalogDb;
use crate::error::PersistenceError;
use crate::types::{ContactState, ContactType, EmergencyContact};

impl CatalogDb {
    // =========================================================================
    // Contacts
    // =========================================================================

    /// Insert or update a contact, all fields at once (atomic record replace).
    ///
    /// The partial UNIQUE index on `(phoneNumber, type)` rejects a second
    /// active contact with the same pair; the constraint violation surfaces
    /// as a `PersistenceError` and nothing is written.
    pub fn upsert_contact(&self, contact: &EmergencyContact) -> Result<(), PersistenceError> {
        self.conn.execute(
            "INSERT INTO contacts (
                id, name, phoneNumber, type, state, isDefault, isActive,
                description, relationship, notes
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
             ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                phoneNumber = excluded.phoneNumber,
                type = excluded.type,
                state = excluded.state,
                isActive = excluded.isActive,
                description = excluded.description,
                relationship = excluded.relationship,
                notes = excluded.notes",
            params![
                contact.id,
                contact.name,
                contact.phone_number,
                contact.contact_type.as_str(),
                contact.state,
                contact.is_default as i64,
                contact.status.to_flag(),
                contact.description,
                contact.relationship,
                contact.notes,
            ],
        )?;
        Ok(())
    }

    /// Seed bundled defaults. `INSERT OR IGNORE` so re-seeding after an app
    /// update never clobbers a user's soft-deletes or edits.
    pub fn seed_default_contacts(
        &self,
        contacts: &[EmergencyContact],
    ) -> Result<usize, PersistenceError> {
        let mut inserted = 0;
        for contact in contacts {
            inserted += self.conn.execute(
                "INSERT OR IGNORE INTO contacts (
                    id, name, phoneNumber, type, state, isDefault, isActive, description
                 ) VALUES (?1, ?2, ?3, ?4, ?5, 1, 1, ?6)",
                params![
                    contact.id,
                    contact.name,
                    contact.phone_number,
                    contact.contact_type.as_str(),
                    contact.state,
                    contact.description,
                ],
            )?;
        }
        Ok(inserted)
    }

    /// Look up a contact by id, soft-deleted included.
    pub fn get_contact(&self, id: i64) -> Result<Option<EmergencyContact>, PersistenceError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, phoneNumber, type, state, isDefault, isActive,
                    description, relationship, notes
             FROM contacts WHERE id = ?1",
        )?;
        let mut rows = stmt.query_map(params![id], Self::map_contact_row)?;
        match rows.next() {
            Some(row) => Ok(Some(row?)),
            None => Ok(None),
        }
    }

    /// Every stored contact, soft-deleted included. Unordered; the merge
    /// engine owns presentation order.
    pub fn all_contacts(&self) -> Result<Vec<EmergencyContact>, PersistenceError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, phoneNumber, type, state, isDefault, isActive,
                    description, relationship, notes
             FROM contacts",
        )?;
        let rows = stmt.query_map([], Self::map_contact_row)?;
        Ok(rows.collect::<Result<_, _>>()?)
    }

    /// User-added contacts only (`isDefault = 0`), soft-deleted included.
    pub fn user_contacts(&self) -> Result<Vec<EmergencyContact>, PersistenceError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, phoneNumber, type, state, isDefault, isActive,
                    description, relationship, notes
             FROM contacts WHERE isDefault = 0",
        )?;
        let rows = stmt.query_map([], Self::map_contact_row)?;
        Ok(rows.collect::<Result<_, _>>()?)
    }

    /// Soft-delete: flip to inactive, keep the row. Used for default
    /// contacts, which are never physically removed.
    pub fn soft_delete_contact(&self, id: i64) -> Result<bool, PersistenceError> {
        let changed = self
            .conn
            .execute("UPDATE contacts SET isActive = 0 WHERE id = ?1", params![id])?;
        Ok(changed > 0)
    }

    /// Hard-delete a row. Used for user-added contacts.
    pub fn hard_delete_contact(&self, id: i64) -> Result<bool, PersistenceError> {
        let changed = self
            .conn
            .execute("DELETE FROM contacts WHERE id = ?1", params![id])?;
        Ok(changed > 0)
    }

    /// Remove every user-added contact and reactivate the defaults.
    /// The bulk-reset path.
    pub fn reset_contacts(&self) -> Result<(), PersistenceError> {
        self.conn.execute("DELETE FROM contacts WHERE isDefault = 0", [])?;
        self.conn.execute("UPDATE contacts SET isActive = 1 WHERE isDefault = 1", [])?;
        Ok(())
    }

    fn map_contact_row(row: &Row) -> rusqlite::Result<EmergencyContact> {
        let type_str: String = row.get(3)?;
        let active_flag: i64 = row.get(6)?;
        Ok(EmergencyContact {
            id: row.get(0)?,
            name: row.get(1)?,
            phone_number: row.get(2)?,
            contact_type: ContactType::parse(&type_str),
            state: row.get(4)?,
            is_default: row.get::<_, i64>(5)? != 0,
            status: ContactState::from_flag(active_flag),
            description: row.get(7)?,
            relationship: row.get(8)?,
            notes: row.get(9)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::NATIONAL;

    fn contact(id: i64, name: &str, phone: &str, ctype: ContactType, default: bool) -> EmergencyContact {
        EmergencyContact {
            id,
            name: name.to_string(),
            phone_number: phone.to_string(),
            contact_type: ctype,
            state: NATIONAL.to_string(),
            is_default: default,
            status: ContactState::Active,
            description: None,
            relationship: None,
            notes: None,
        }
    }

    #[test]
    fn test_upsert_and_get_round_trip() {
        let db = CatalogDb::open_in_memory();
        let c = contact(1000, "Dr. Okafor", "+234-803-1111", ContactType::Doctor, false);
        db.upsert_contact(&c).expect("upsert");

        let stored = db.get_contact(1000).expect("get").expect("present");
        assert_eq!(stored.name, "Dr. Okafor");
        assert_eq!(stored.contact_type, ContactType::Doctor);
        assert!(stored.status.is_active());
        assert!(db.get_contact(9999).expect("get").is_none());
    }

    #[test]
    fn test_unique_phone_type_rejected_for_active() {
        let db = CatalogDb::open_in_memory();
        db.upsert_contact(&contact(1000, "A", "911", ContactType::Ambulance, false))
            .expect("first");
        let dup = contact(1001, "B", "911", ContactType::Ambulance, false);
        assert!(db.upsert_contact(&dup).is_err(), "active duplicate must be rejected");

        // Same phone, different type is fine
        db.upsert_contact(&contact(1002, "C", "911", ContactType::Police, false))
            .expect("different type");
    }

    #[test]
    fn test_soft_delete_keeps_row_hard_delete_removes_it() {
        let db = CatalogDb::open_in_memory();
        db.seed_default_contacts(&[contact(1, "Police", "911", ContactType::Police, true)])
            .expect("seed");
        db.upsert_contact(&contact(1000, "Me", "0800", ContactType::Personal, false))
            .expect("user");

        let total = |db: &CatalogDb| -> i64 {
            db.conn_ref()
                .query_row("SELECT COUNT(*) FROM contacts", [], |r| r.get(0))
                .expect("count")
        };

        assert_eq!(total(&db), 2);
        db.soft_delete_contact(1).expect("soft delete");
        assert_eq!(total(&db), 2, "default contact row survives deletion");
        let stored = db.get_contact(1).expect("get").expect("present");
        assert_eq!(stored.status, ContactState::SoftDeleted);

        db.hard_delete_contact(1000).expect("hard delete");
        assert_eq!(total(&db), 1, "user contact row is physically removed");
    }

    #[test]
    fn test_seed_is_idempotent_and_preserves_soft_deletes() {
        let db = CatalogDb::open_in_memory();
        let defaults = vec![contact(1, "Police", "911", ContactType::Police, true)];
        assert_eq!(db.seed_default_contacts(&defaults).expect("seed"), 1);
        db.soft_delete_contact(1).expect("soft delete");

        assert_eq!(db.seed_default_contacts(&defaults).expect("reseed"), 0);
        let stored = db.get_contact(1).expect("get").expect("present");
        assert_eq!(stored.status, ContactState::SoftDeleted, "reseed must not resurrect");
    }

    #[test]
    fn test_reset_contacts() {
        let db = CatalogDb::open_in_memory();
        db.seed_default_contacts(&[contact(1, "Police", "911", ContactType::Police, true)])
            .expect("seed");
        db.soft_delete_contact(1).expect("soft delete");
        db.upsert_contact(&contact(1000, "Me", "0800", ContactType::Personal, false))
            .expect("user");

        db.reset_contacts().expect("reset");
        assert_eq!(db.user_contacts().expect("users").len(), 0);
        let police = db.get_contact(1).expect("get").expect("present");
        assert!(police.status.is_active(), "defaults reactivated");
    }
}
