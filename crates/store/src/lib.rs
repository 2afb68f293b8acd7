//! `absentia-store` — SQLite implementation of the canonical voter store.
//!
//! One connection per ingest worker; WAL mode keeps concurrent workers out
//! of each other's way. Logs are stored as a JSON array per voter.

use std::path::Path;

use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension, Row};

use absentia_core::{BallotStatus, IdentityMapping, Party, RejectReason, VoterRecord};
use absentia_recon::store::{CountyRejection, RejectionUpdate, StoreError, VoterStore};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS voters (
    registration_number INTEGER PRIMARY KEY,
    county TEXT NOT NULL,
    last_name TEXT NOT NULL,
    first_name TEXT NOT NULL,
    middle_name TEXT,
    name_suffix TEXT,
    date_of_birth TEXT,
    political_party TEXT NOT NULL,
    resident_address TEXT NOT NULL,
    resident_city TEXT,
    resident_zip TEXT,
    mailing_address TEXT,
    request_date TEXT,
    receive_date TEXT,
    absentee_issue_method TEXT,
    absentee_receive_method TEXT,
    ballot_status TEXT,
    is_void INTEGER NOT NULL DEFAULT 0,
    reject_date TEXT,
    cure_date TEXT,
    number_of_rejections INTEGER NOT NULL DEFAULT 0,
    was_ever_rejected INTEGER NOT NULL DEFAULT 0,
    currently_rejected INTEGER NOT NULL DEFAULT 0,
    reject_reason TEXT,
    number_of_rows INTEGER NOT NULL DEFAULT 0,
    has_voided_ballot INTEGER NOT NULL DEFAULT 0,
    was_removed INTEGER NOT NULL DEFAULT 0,
    county_sourced INTEGER NOT NULL DEFAULT 0,
    logs TEXT NOT NULL DEFAULT '[]'
);

CREATE INDEX IF NOT EXISTS idx_voters_identity
    ON voters (last_name, first_name, county);

CREATE INDEX IF NOT EXISTS idx_voters_county_status
    ON voters (county) WHERE ballot_status IS NOT NULL;

CREATE TABLE IF NOT EXISTS identity_mappings (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    last_name TEXT NOT NULL,
    first_name TEXT NOT NULL,
    middle_name TEXT,
    address_prefix TEXT,
    registration_number INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_identity_mappings_name
    ON identity_mappings (last_name, first_name);

CREATE TABLE IF NOT EXISTS meta (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
"#;

/// Every voter column, in the order the row mapper expects.
const VOTER_COLUMNS: &str = "registration_number, county, last_name, first_name, middle_name, \
     name_suffix, date_of_birth, political_party, resident_address, resident_city, resident_zip, \
     mailing_address, request_date, receive_date, absentee_issue_method, absentee_receive_method, \
     ballot_status, is_void, reject_date, cure_date, number_of_rejections, was_ever_rejected, \
     currently_rejected, reject_reason, number_of_rows, has_voided_ballot, was_removed, \
     county_sourced, logs";

pub struct SqliteStore {
    conn: Connection,
}

fn db_err(e: rusqlite::Error) -> StoreError {
    StoreError(e.to_string())
}

const SQL_DATE: &str = "%Y-%m-%d";

fn date_to_sql(date: Option<NaiveDate>) -> Option<String> {
    date.map(|d| d.format(SQL_DATE).to_string())
}

fn date_from_sql(value: Option<String>) -> Option<NaiveDate> {
    value.and_then(|v| NaiveDate::parse_from_str(&v, SQL_DATE).ok())
}

fn party_from_sql(code: &str) -> Party {
    match code {
        "DEM" => Party::Dem,
        "REP" => Party::Rep,
        _ => Party::Oth,
    }
}

fn status_from_sql(value: Option<String>) -> Option<BallotStatus> {
    value.and_then(|v| BallotStatus::classify(&v))
}

fn reason_from_sql(value: Option<String>) -> Option<RejectReason> {
    match value.as_deref() {
        Some("Deficient") => Some(RejectReason::Deficient),
        Some("Defective") => Some(RejectReason::Defective),
        Some("Both") => Some(RejectReason::Both),
        _ => None,
    }
}

fn logs_from_sql(value: String) -> Vec<String> {
    serde_json::from_str(&value).unwrap_or_default()
}

fn logs_to_sql(logs: &[String]) -> String {
    serde_json::to_string(logs).unwrap_or_else(|_| "[]".to_string())
}

fn row_to_record(row: &Row<'_>) -> rusqlite::Result<VoterRecord> {
    Ok(VoterRecord {
        registration_number: row.get(0)?,
        county: row.get(1)?,
        last_name: row.get(2)?,
        first_name: row.get(3)?,
        middle_name: row.get(4)?,
        name_suffix: row.get(5)?,
        date_of_birth: date_from_sql(row.get(6)?),
        political_party: party_from_sql(&row.get::<_, String>(7)?),
        resident_address: row.get(8)?,
        resident_city: row.get(9)?,
        resident_zip: row.get(10)?,
        mailing_address: row.get(11)?,
        request_date: date_from_sql(row.get(12)?),
        receive_date: date_from_sql(row.get(13)?),
        absentee_issue_method: row.get(14)?,
        absentee_receive_method: row.get(15)?,
        ballot_status: status_from_sql(row.get(16)?),
        is_void: row.get(17)?,
        reject_date: date_from_sql(row.get(18)?),
        cure_date: date_from_sql(row.get(19)?),
        number_of_rejections: row.get(20)?,
        was_ever_rejected: row.get(21)?,
        currently_rejected: row.get(22)?,
        reject_reason: reason_from_sql(row.get(23)?),
        number_of_rows: row.get(24)?,
        has_voided_ballot: row.get(25)?,
        was_removed: row.get(26)?,
        county_sourced: row.get(27)?,
        logs: logs_from_sql(row.get(28)?),
    })
}

impl SqliteStore {
    /// Open (or create) the store at `path` and ensure the schema exists.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path).map_err(db_err)?;
        // WAL lets the ingest workers' connections write without tripping
        // over each other's read locks
        conn.pragma_update(None, "journal_mode", "WAL").map_err(db_err)?;
        conn.busy_timeout(std::time::Duration::from_secs(30)).map_err(db_err)?;
        conn.execute_batch(SCHEMA).map_err(db_err)?;
        Ok(Self { conn })
    }

    fn append_log(&mut self, registration_number: i64, line: &str) -> Result<(), StoreError> {
        let logs: String = self
            .conn
            .query_row(
                "SELECT logs FROM voters WHERE registration_number = ?1",
                params![registration_number],
                |row| row.get(0),
            )
            .map_err(db_err)?;
        let mut logs = logs_from_sql(logs);
        logs.push(line.to_string());
        self.conn
            .execute(
                "UPDATE voters SET logs = ?1 WHERE registration_number = ?2",
                params![logs_to_sql(&logs), registration_number],
            )
            .map_err(db_err)?;
        Ok(())
    }
}

impl VoterStore for SqliteStore {
    fn get(&self, registration_number: i64) -> Result<Option<VoterRecord>, StoreError> {
        self.conn
            .query_row(
                &format!("SELECT {VOTER_COLUMNS} FROM voters WHERE registration_number = ?1"),
                params![registration_number],
                row_to_record,
            )
            .optional()
            .map_err(db_err)
    }

    fn insert(&mut self, record: &VoterRecord) -> Result<(), StoreError> {
        self.conn
            .execute(
                &format!(
                    "INSERT INTO voters ({VOTER_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, \
                     ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20, ?21, ?22, \
                     ?23, ?24, ?25, ?26, ?27, ?28, ?29)"
                ),
                params![
                    record.registration_number,
                    record.county,
                    record.last_name,
                    record.first_name,
                    record.middle_name,
                    record.name_suffix,
                    date_to_sql(record.date_of_birth),
                    record.political_party.code(),
                    record.resident_address,
                    record.resident_city,
                    record.resident_zip,
                    record.mailing_address,
                    date_to_sql(record.request_date),
                    date_to_sql(record.receive_date),
                    record.absentee_issue_method,
                    record.absentee_receive_method,
                    record.ballot_status.map(|s| s.as_str()),
                    record.is_void,
                    date_to_sql(record.reject_date),
                    date_to_sql(record.cure_date),
                    record.number_of_rejections,
                    record.was_ever_rejected,
                    record.currently_rejected,
                    record.reject_reason.map(|r| r.as_str()),
                    record.number_of_rows,
                    record.has_voided_ballot,
                    record.was_removed,
                    record.county_sourced,
                    logs_to_sql(&record.logs),
                ],
            )
            .map_err(db_err)?;
        Ok(())
    }

    fn update_extract_fields(&mut self, record: &VoterRecord) -> Result<(), StoreError> {
        // full overwrite of the comparable fields only; bookkeeping columns
        // are owned by the targeted setters
        self.conn
            .execute(
                "UPDATE voters SET county = ?1, last_name = ?2, first_name = ?3, \
                 middle_name = ?4, name_suffix = ?5, date_of_birth = ?6, political_party = ?7, \
                 resident_address = ?8, resident_city = ?9, resident_zip = ?10, \
                 mailing_address = ?11, request_date = ?12, receive_date = ?13, \
                 absentee_issue_method = ?14, absentee_receive_method = ?15, \
                 ballot_status = ?16, is_void = ?17, county_sourced = ?18, logs = ?19 \
                 WHERE registration_number = ?20",
                params![
                    record.county,
                    record.last_name,
                    record.first_name,
                    record.middle_name,
                    record.name_suffix,
                    date_to_sql(record.date_of_birth),
                    record.political_party.code(),
                    record.resident_address,
                    record.resident_city,
                    record.resident_zip,
                    record.mailing_address,
                    date_to_sql(record.request_date),
                    date_to_sql(record.receive_date),
                    record.absentee_issue_method,
                    record.absentee_receive_method,
                    record.ballot_status.map(|s| s.as_str()),
                    record.is_void,
                    record.county_sourced,
                    logs_to_sql(&record.logs),
                    record.registration_number,
                ],
            )
            .map_err(db_err)?;
        Ok(())
    }

    fn set_number_of_rows(&mut self, reg: i64, n: u32) -> Result<(), StoreError> {
        self.conn
            .execute(
                "UPDATE voters SET number_of_rows = ?1 WHERE registration_number = ?2",
                params![n, reg],
            )
            .map_err(db_err)?;
        Ok(())
    }

    fn set_has_voided_ballot(&mut self, reg: i64) -> Result<(), StoreError> {
        self.conn
            .execute(
                "UPDATE voters SET has_voided_ballot = 1 WHERE registration_number = ?1",
                params![reg],
            )
            .map_err(db_err)?;
        Ok(())
    }

    fn clear_was_removed(&mut self, reg: i64) -> Result<(), StoreError> {
        self.conn
            .execute(
                "UPDATE voters SET was_removed = 0 WHERE registration_number = ?1",
                params![reg],
            )
            .map_err(db_err)?;
        Ok(())
    }

    fn mark_removed(&mut self, reg: i64, log_line: &str) -> Result<(), StoreError> {
        self.conn
            .execute(
                "UPDATE voters SET was_removed = 1 WHERE registration_number = ?1",
                params![reg],
            )
            .map_err(db_err)?;
        self.append_log(reg, log_line)
    }

    fn set_rejection(&mut self, reg: i64, update: &RejectionUpdate) -> Result<(), StoreError> {
        self.conn
            .execute(
                "UPDATE voters SET reject_date = ?1, number_of_rejections = ?2, \
                 was_ever_rejected = 1, currently_rejected = ?3, reject_reason = ?4, \
                 cure_date = NULL WHERE registration_number = ?5",
                params![
                    date_to_sql(Some(update.reject_date)),
                    update.number_of_rejections,
                    update.currently_rejected,
                    update.reject_reason.map(|r| r.as_str()),
                    reg,
                ],
            )
            .map_err(db_err)?;
        Ok(())
    }

    fn set_reject_reason(&mut self, reg: i64, reason: RejectReason) -> Result<(), StoreError> {
        self.conn
            .execute(
                "UPDATE voters SET reject_reason = ?1 WHERE registration_number = ?2",
                params![reason.as_str(), reg],
            )
            .map_err(db_err)?;
        Ok(())
    }

    fn set_currently_rejected(&mut self, reg: i64, value: bool) -> Result<(), StoreError> {
        self.conn
            .execute(
                "UPDATE voters SET currently_rejected = ?1 WHERE registration_number = ?2",
                params![value, reg],
            )
            .map_err(db_err)?;
        Ok(())
    }

    fn set_cured(&mut self, reg: i64, cure_date: NaiveDate) -> Result<(), StoreError> {
        self.conn
            .execute(
                "UPDATE voters SET cure_date = ?1, currently_rejected = 0 \
                 WHERE registration_number = ?2",
                params![date_to_sql(Some(cure_date)), reg],
            )
            .map_err(db_err)?;
        Ok(())
    }

    fn apply_county_rejection(
        &mut self,
        reg: i64,
        rejection: &CountyRejection,
    ) -> Result<(), StoreError> {
        if rejection.default_receive_method_mail {
            // the state file never specified a receive method; assume Mail
            self.conn
                .execute(
                    "UPDATE voters SET absentee_receive_method = 'Mail' \
                     WHERE registration_number = ?1 AND absentee_receive_method IS NULL",
                    params![reg],
                )
                .map_err(db_err)?;
        }
        self.conn
            .execute(
                "UPDATE voters SET reject_date = ?1, cure_date = NULL, \
                 number_of_rejections = ?2, was_ever_rejected = 1, currently_rejected = 1, \
                 reject_reason = ?3, ballot_status = ?4 WHERE registration_number = ?5",
                params![
                    date_to_sql(Some(rejection.reject_date)),
                    rejection.number_of_rejections,
                    rejection.reject_reason.as_str(),
                    rejection.ballot_status.as_str(),
                    reg,
                ],
            )
            .map_err(db_err)?;
        self.append_log(reg, &rejection.log_line)
    }

    fn apply_county_cure(
        &mut self,
        reg: i64,
        cure_date: NaiveDate,
        log_line: &str,
    ) -> Result<(), StoreError> {
        self.conn
            .execute(
                "UPDATE voters SET cure_date = ?1, currently_rejected = 0, ballot_status = NULL \
                 WHERE registration_number = ?2",
                params![date_to_sql(Some(cure_date)), reg],
            )
            .map_err(db_err)?;
        self.append_log(reg, log_line)
    }

    fn removal_scan(&self) -> Result<Vec<(i64, bool)>, StoreError> {
        let mut stmt = self
            .conn
            .prepare("SELECT registration_number, was_removed FROM voters")
            .map_err(db_err)?;
        let rows = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))
            .map_err(db_err)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(db_err)
    }

    fn rejected_ids_for_county(&self, county: &str) -> Result<Vec<i64>, StoreError> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT registration_number FROM voters \
                 WHERE county = ?1 AND ballot_status IS NOT NULL",
            )
            .map_err(db_err)?;
        let rows = stmt.query_map(params![county], |row| row.get(0)).map_err(db_err)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(db_err)
    }

    fn find_candidates(
        &self,
        last_name: &str,
        first_name: &str,
        county: &str,
    ) -> Result<Vec<VoterRecord>, StoreError> {
        let mut stmt = self
            .conn
            .prepare(&format!(
                "SELECT {VOTER_COLUMNS} FROM voters \
                 WHERE last_name = ?1 AND first_name = ?2 AND county = ?3"
            ))
            .map_err(db_err)?;
        let rows = stmt
            .query_map(params![last_name, first_name, county], row_to_record)
            .map_err(db_err)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(db_err)
    }

    fn lookup_identity_by_address(
        &self,
        last_name: &str,
        first_name: &str,
        address_prefix: &str,
    ) -> Result<Option<i64>, StoreError> {
        self.conn
            .query_row(
                "SELECT registration_number FROM identity_mappings \
                 WHERE last_name = ?1 AND first_name = ?2 AND address_prefix = ?3 \
                 ORDER BY id LIMIT 1",
                params![last_name, first_name, address_prefix],
                |row| row.get(0),
            )
            .optional()
            .map_err(db_err)
    }

    fn lookup_identity_by_name(
        &self,
        last_name: &str,
        first_name: &str,
        middle_name: Option<&str>,
    ) -> Result<Option<i64>, StoreError> {
        self.conn
            .query_row(
                "SELECT registration_number FROM identity_mappings \
                 WHERE last_name = ?1 AND first_name = ?2 \
                 AND (middle_name = ?3 OR (middle_name IS NULL AND ?3 IS NULL)) \
                 ORDER BY id LIMIT 1",
                params![last_name, first_name, middle_name],
                |row| row.get(0),
            )
            .optional()
            .map_err(db_err)
    }

    fn record_identity_mapping(&mut self, mapping: &IdentityMapping) -> Result<(), StoreError> {
        // append-only: leave any existing entry for this identity in place
        let exists: Option<i64> = self
            .conn
            .query_row(
                "SELECT id FROM identity_mappings \
                 WHERE last_name = ?1 AND first_name = ?2 \
                 AND (middle_name = ?3 OR (middle_name IS NULL AND ?3 IS NULL)) \
                 AND (address_prefix = ?4 OR (address_prefix IS NULL AND ?4 IS NULL)) \
                 LIMIT 1",
                params![
                    mapping.last_name,
                    mapping.first_name,
                    mapping.middle_name,
                    mapping.address_prefix,
                ],
                |row| row.get(0),
            )
            .optional()
            .map_err(db_err)?;
        if exists.is_some() {
            return Ok(());
        }
        self.conn
            .execute(
                "INSERT INTO identity_mappings \
                 (last_name, first_name, middle_name, address_prefix, registration_number) \
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    mapping.last_name,
                    mapping.first_name,
                    mapping.middle_name,
                    mapping.address_prefix,
                    mapping.registration_number,
                ],
            )
            .map_err(db_err)?;
        Ok(())
    }

    fn watermark(&self, source: &str) -> Result<Option<NaiveDate>, StoreError> {
        let value: Option<String> = self
            .conn
            .query_row(
                "SELECT value FROM meta WHERE key = ?1",
                params![format!("watermark:{source}")],
                |row| row.get(0),
            )
            .optional()
            .map_err(db_err)?;
        Ok(date_from_sql(value))
    }

    fn set_watermark(&mut self, source: &str, label: NaiveDate) -> Result<(), StoreError> {
        self.conn
            .execute(
                "INSERT INTO meta (key, value) VALUES (?1, ?2) \
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value",
                params![format!("watermark:{source}"), label.format(SQL_DATE).to_string()],
            )
            .map_err(db_err)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use absentia_core::CanonicalCandidate;

    fn open_temp() -> (tempfile::TempDir, SqliteStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteStore::open(&dir.path().join("voters.db")).unwrap();
        (dir, store)
    }

    fn record(reg: i64) -> VoterRecord {
        let cand = CanonicalCandidate {
            registration_number: reg,
            county: "Story".into(),
            last_name: "Doe".into(),
            first_name: "Jane".into(),
            middle_name: Some("Q".into()),
            name_suffix: None,
            date_of_birth: NaiveDate::from_ymd_opt(1960, 1, 2),
            political_party: Party::Dem,
            resident_address: "100 Main St".into(),
            resident_city: Some("Ames".into()),
            resident_zip: Some("50010".into()),
            mailing_address: None,
            request_date: NaiveDate::from_ymd_opt(2020, 10, 5),
            receive_date: NaiveDate::from_ymd_opt(2020, 10, 9),
            absentee_issue_method: Some("Mail".into()),
            absentee_receive_method: None,
            ballot_status: None,
            is_void: false,
        };
        let mut rec = VoterRecord::from_candidate(&cand);
        rec.number_of_rows = 1;
        rec.logs = vec!["SoS-10-26.csv | Ballot Count: 1 | INSERT".into()];
        rec
    }

    #[test]
    fn insert_and_get_round_trip() {
        let (_dir, mut store) = open_temp();
        let rec = record(100);
        store.insert(&rec).unwrap();
        let loaded = store.get(100).unwrap().unwrap();
        assert_eq!(loaded, rec);
        assert_eq!(store.get(999).unwrap(), None);
    }

    #[test]
    fn targeted_setters() {
        let (_dir, mut store) = open_temp();
        store.insert(&record(100)).unwrap();

        store.set_number_of_rows(100, 3).unwrap();
        store.set_has_voided_ballot(100).unwrap();
        store
            .set_rejection(
                100,
                &RejectionUpdate {
                    reject_date: NaiveDate::from_ymd_opt(2020, 10, 26).unwrap(),
                    number_of_rejections: 1,
                    currently_rejected: true,
                    reject_reason: Some(RejectReason::Deficient),
                },
            )
            .unwrap();

        let v = store.get(100).unwrap().unwrap();
        assert_eq!(v.number_of_rows, 3);
        assert!(v.has_voided_ballot);
        assert!(v.was_ever_rejected);
        assert!(v.currently_rejected);
        assert_eq!(v.reject_reason, Some(RejectReason::Deficient));
        assert_eq!(v.reject_date, NaiveDate::from_ymd_opt(2020, 10, 26));

        store.set_cured(100, NaiveDate::from_ymd_opt(2020, 10, 28).unwrap()).unwrap();
        let v = store.get(100).unwrap().unwrap();
        assert!(!v.currently_rejected);
        assert_eq!(v.cure_date, NaiveDate::from_ymd_opt(2020, 10, 28));
    }

    #[test]
    fn mark_removed_appends_log() {
        let (_dir, mut store) = open_temp();
        store.insert(&record(100)).unwrap();
        store.mark_removed(100, "SoS-10-27.csv | REMOVE").unwrap();
        let v = store.get(100).unwrap().unwrap();
        assert!(v.was_removed);
        assert_eq!(v.logs.last().map(String::as_str), Some("SoS-10-27.csv | REMOVE"));
    }

    #[test]
    fn county_rejection_and_cure() {
        let (_dir, mut store) = open_temp();
        store.insert(&record(100)).unwrap();

        let rejection = CountyRejection {
            reject_date: NaiveDate::from_ymd_opt(2020, 10, 26).unwrap(),
            ballot_status: BallotStatus::DeficientAffidavit,
            reject_reason: RejectReason::Deficient,
            number_of_rejections: 1,
            default_receive_method_mail: true,
            log_line: "Polk-10-26.csv | UPDATE | Ballot Status | None => Deficient Affidavit/Incomplete".into(),
        };
        store.apply_county_rejection(100, &rejection).unwrap();

        let v = store.get(100).unwrap().unwrap();
        assert_eq!(v.ballot_status, Some(BallotStatus::DeficientAffidavit));
        assert_eq!(v.absentee_receive_method.as_deref(), Some("Mail"));
        assert!(v.currently_rejected);
        assert_eq!(store.rejected_ids_for_county("Story").unwrap(), vec![100]);

        store
            .apply_county_cure(100, NaiveDate::from_ymd_opt(2020, 10, 27).unwrap(), "line")
            .unwrap();
        let v = store.get(100).unwrap().unwrap();
        assert_eq!(v.ballot_status, None);
        assert!(!v.currently_rejected);
        assert!(store.rejected_ids_for_county("Story").unwrap().is_empty());
    }

    #[test]
    fn identity_mappings_are_append_only() {
        let (_dir, mut store) = open_temp();
        let mapping = IdentityMapping {
            last_name: "Doe".into(),
            first_name: "Jane".into(),
            middle_name: None,
            address_prefix: Some("100 main".into()),
            registration_number: 100,
        };
        store.record_identity_mapping(&mapping).unwrap();

        // a second write for the same identity must not overwrite
        let clobber = IdentityMapping { registration_number: 200, ..mapping.clone() };
        store.record_identity_mapping(&clobber).unwrap();

        assert_eq!(
            store.lookup_identity_by_address("Doe", "Jane", "100 main").unwrap(),
            Some(100)
        );
        assert_eq!(store.lookup_identity_by_address("Doe", "Jane", "200 oak").unwrap(), None);
    }

    #[test]
    fn watermark_round_trip() {
        let (_dir, mut store) = open_temp();
        assert_eq!(store.watermark("sos").unwrap(), None);
        let d = NaiveDate::from_ymd_opt(2020, 10, 26).unwrap();
        store.set_watermark("sos", d).unwrap();
        assert_eq!(store.watermark("sos").unwrap(), Some(d));
        let d2 = NaiveDate::from_ymd_opt(2020, 10, 27).unwrap();
        store.set_watermark("sos", d2).unwrap();
        assert_eq!(store.watermark("sos").unwrap(), Some(d2));
    }

    #[test]
    fn update_extract_fields_leaves_bookkeeping_alone() {
        let (_dir, mut store) = open_temp();
        let rec = record(100);
        store.insert(&rec).unwrap();
        store.set_number_of_rows(100, 2).unwrap();

        let mut updated = rec.clone();
        updated.resident_address = "200 Oak Ave".into();
        updated.logs.push("SoS-10-27.csv | Ballot Count: 2 | UPDATE | Resident Address | 100 Main St => 200 Oak Ave".into());
        store.update_extract_fields(&updated).unwrap();

        let v = store.get(100).unwrap().unwrap();
        assert_eq!(v.resident_address, "200 Oak Ave");
        assert_eq!(v.number_of_rows, 2);
        assert_eq!(v.logs.len(), 2);
    }
}
