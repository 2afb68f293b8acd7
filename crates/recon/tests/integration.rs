use std::collections::BTreeMap;
use std::collections::BTreeSet;

use chrono::NaiveDate;

use absentia_core::{
    BallotStatus, CanonicalCandidate, CountyFormat, CountyRow, MemorySink, Party, VoterRecord,
};
use absentia_recon::pipeline::process_voter_group;
use absentia_recon::{
    check_watermark, ingest_county, ingest_state, run_removal_pass, CancelToken, IdentityResolver,
    IngestContext, MemoryStore, PartialRatio, PromptAnswer, ReconError, Resolution, VoterOutcome,
    VoterStore,
};
use absentia_recon::identity::SeededPrompt;

fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2020, 10, d).unwrap()
}

fn state_ctx(d: u32) -> IngestContext {
    IngestContext {
        source_file: format!("SoS-10-{d:02}.csv"),
        label_date: day(d),
        non_reporting: ["Polk", "Cerro Gordo", "Des Moines"]
            .iter()
            .map(|s| s.to_string())
            .collect(),
    }
}

fn county_ctx(county: &str, d: u32) -> IngestContext {
    IngestContext {
        source_file: format!("{county}-10-{d:02}.csv"),
        ..state_ctx(d)
    }
}

fn cand(reg: i64) -> CanonicalCandidate {
    CanonicalCandidate {
        registration_number: reg,
        county: "Story".into(),
        last_name: "Doe".into(),
        first_name: "Jane".into(),
        middle_name: None,
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
    }
}

fn voided(mut c: CanonicalCandidate) -> CanonicalCandidate {
    c.is_void = true;
    c
}

fn with_status(mut c: CanonicalCandidate, status: BallotStatus) -> CanonicalCandidate {
    c.ballot_status = Some(status);
    c
}

fn ingest_one(
    store: &mut MemoryStore,
    sink: &MemorySink,
    ctx: &IngestContext,
    reg: i64,
    rows: &[CanonicalCandidate],
) -> VoterOutcome {
    process_voter_group(store, sink, ctx, reg, rows).unwrap()
}

fn seed_voter(store: &mut MemoryStore, c: &CanonicalCandidate) {
    let mut rec = VoterRecord::from_candidate(c);
    rec.number_of_rows = 1;
    store.insert(&rec).unwrap();
}

// -------------------------------------------------------------------------
// Insert cases
// -------------------------------------------------------------------------

#[test]
fn insert_writes_record_and_audit_trail() {
    let mut store = MemoryStore::new();
    let sink = MemorySink::new();

    let outcome = ingest_one(&mut store, &sink, &state_ctx(26), 100, &[cand(100)]);
    assert_eq!(outcome, VoterOutcome::Inserted);

    let v = store.get(100).unwrap().unwrap();
    assert_eq!(v.number_of_rows, 1);
    assert!(!v.has_voided_ballot);
    assert_eq!(v.logs, vec!["SoS-10-26.csv | Ballot Count: 1 | INSERT".to_string()]);
    assert_eq!(sink.lines(), v.logs);
}

#[test]
fn insert_with_rejected_active_row_stamps_reject_date() {
    let mut store = MemoryStore::new();
    let sink = MemorySink::new();

    let rows = [with_status(cand(100), BallotStatus::DeficientAffidavit)];
    ingest_one(&mut store, &sink, &state_ctx(26), 100, &rows);

    let v = store.get(100).unwrap().unwrap();
    assert_eq!(v.reject_date, Some(day(26)));
    assert_eq!(v.number_of_rejections, 1);
    assert!(v.was_ever_rejected);
    assert!(v.currently_rejected);
    assert_eq!(v.logs, vec!["SoS-10-26.csv | Ballot Count: 1 | INSERT REJECT".to_string()]);
}

#[test]
fn case_b_all_void_promotes_the_last_row() {
    let mut store = MemoryStore::new();
    let sink = MemorySink::new();

    let mut first = voided(cand(100));
    first.resident_address = "1 First St".into();
    let mut second = voided(cand(100));
    second.resident_address = "2 Second St".into();

    ingest_one(&mut store, &sink, &state_ctx(26), 100, &[first, second]);

    let v = store.get(100).unwrap().unwrap();
    assert!(v.is_void);
    assert_eq!(v.resident_address, "2 Second St");
    assert_eq!(v.number_of_rows, 2);
    assert!(v.has_voided_ballot);
    assert_eq!(
        v.logs,
        vec![
            "SoS-10-26.csv | Ballot Count: 2 | INSERT VOID".to_string(),
            "SoS-10-26.csv | Ballot Count: 2 | INSERT VOID".to_string(),
        ]
    );
}

#[test]
fn case_c_multiple_active_rows_never_inflate_the_count() {
    let mut store = MemoryStore::new();
    let sink = MemorySink::new();

    let mut early = cand(100);
    early.receive_date = NaiveDate::from_ymd_opt(2020, 10, 1);
    early.resident_address = "1 Early St".into();
    let mut late = cand(100);
    late.receive_date = NaiveDate::from_ymd_opt(2020, 10, 8);
    late.resident_address = "2 Late St".into();

    ingest_one(&mut store, &sink, &state_ctx(26), 100, &[early, late, voided(cand(100))]);

    let v = store.get(100).unwrap().unwrap();
    // most recent receive date wins; count stays void_count + 1
    assert_eq!(v.resident_address, "2 Late St");
    assert_eq!(v.number_of_rows, 2);
}

// -------------------------------------------------------------------------
// Case A scenario + idempotence
// -------------------------------------------------------------------------

#[test]
fn case_a_new_void_row_appends_one_void_flavored_entry() {
    let mut store = MemoryStore::new();
    let sink = MemorySink::new();

    ingest_one(&mut store, &sink, &state_ctx(26), 100, &[cand(100)]);
    let before = store.get(100).unwrap().unwrap();
    let lines_before = sink.lines().len();

    let day2 = [
        cand(100),
        with_status(voided(cand(100)), BallotStatus::DeficientAffidavit),
    ];
    ingest_one(&mut store, &sink, &state_ctx(27), 100, &day2);

    let v = store.get(100).unwrap().unwrap();
    assert_eq!(v.number_of_rows, 2);
    assert!(v.has_voided_ballot);
    // the active row itself is untouched
    assert_eq!(v.resident_address, before.resident_address);
    assert_eq!(v.receive_date, before.receive_date);
    assert!(!v.is_void);

    let new_lines: Vec<String> = sink.lines()[lines_before..].to_vec();
    assert_eq!(
        new_lines,
        vec!["SoS-10-27.csv | Ballot Count: 2 | UPDATE VOID | new ballot(s) added".to_string()]
    );

    // the rejected void row bumps the rejection counter but not the flag
    assert_eq!(v.number_of_rejections, 1);
    assert!(v.was_ever_rejected);
    assert!(!v.currently_rejected);
}

#[test]
fn reingesting_the_same_extract_is_idempotent() {
    let mut store = MemoryStore::new();
    let sink = MemorySink::new();

    // one plain voter, one with a rejected active row
    let plain = [cand(100)];
    let rejected = [with_status(cand(200), BallotStatus::DefectiveAffidavit)];

    ingest_one(&mut store, &sink, &state_ctx(26), 100, &plain);
    ingest_one(&mut store, &sink, &state_ctx(26), 200, &rejected);

    let snapshot_100 = store.get(100).unwrap().unwrap();
    let snapshot_200 = store.get(200).unwrap().unwrap();
    let lines = sink.lines().len();

    // same extract, run again
    assert_eq!(ingest_one(&mut store, &sink, &state_ctx(26), 100, &plain), VoterOutcome::Unchanged);
    assert_eq!(
        ingest_one(&mut store, &sink, &state_ctx(26), 200, &rejected),
        VoterOutcome::Unchanged
    );

    assert_eq!(store.get(100).unwrap().unwrap(), snapshot_100);
    assert_eq!(store.get(200).unwrap().unwrap(), snapshot_200);
    assert_eq!(sink.lines().len(), lines);

    // and the removal pass adds nothing either
    let seen: BTreeSet<i64> = [100, 200].into_iter().collect();
    let marked = run_removal_pass(&mut store, &sink, &state_ctx(26), &seen).unwrap();
    assert_eq!(marked, 0);
    assert_eq!(sink.lines().len(), lines);
}

// -------------------------------------------------------------------------
// Field updates
// -------------------------------------------------------------------------

#[test]
fn changed_fields_are_logged_and_overwritten() {
    let mut store = MemoryStore::new();
    let sink = MemorySink::new();

    ingest_one(&mut store, &sink, &state_ctx(26), 100, &[cand(100)]);

    let mut moved = cand(100);
    moved.resident_address = "200 Oak Ave".into();
    ingest_one(&mut store, &sink, &state_ctx(27), 100, &[moved]);

    let v = store.get(100).unwrap().unwrap();
    assert_eq!(v.resident_address, "200 Oak Ave");
    assert_eq!(
        v.logs.last().map(String::as_str),
        Some("SoS-10-27.csv | Ballot Count: 1 | UPDATE | Resident Address | 100 Main St => 200 Oak Ave")
    );
}

#[test]
fn date_changes_compare_by_month_and_day_only() {
    let mut store = MemoryStore::new();
    let sink = MemorySink::new();

    ingest_one(&mut store, &sink, &state_ctx(26), 100, &[cand(100)]);
    let before = store.get(100).unwrap().unwrap();

    // same month/day, different year: not a real change
    let mut same = cand(100);
    same.receive_date = NaiveDate::from_ymd_opt(2019, 10, 9);
    let outcome = ingest_one(&mut store, &sink, &state_ctx(27), 100, &[same]);
    assert_eq!(outcome, VoterOutcome::Unchanged);
    assert_eq!(store.get(100).unwrap().unwrap().logs, before.logs);
}

#[test]
fn void_transition_is_logged_with_void_qualifier() {
    let mut store = MemoryStore::new();
    let sink = MemorySink::new();

    ingest_one(&mut store, &sink, &state_ctx(26), 100, &[cand(100)]);

    // the next day the same single row arrives voided
    let outcome = ingest_one(&mut store, &sink, &state_ctx(27), 100, &[voided(cand(100))]);
    assert_eq!(outcome, VoterOutcome::Updated);

    let v = store.get(100).unwrap().unwrap();
    assert!(v.is_void);
    assert!(v.has_voided_ballot);
    assert_eq!(
        v.logs.last().map(String::as_str),
        Some("SoS-10-27.csv | Ballot Count: 1 | UPDATE VOID | Void | false => true")
    );
}

#[test]
fn row_shrink_is_tolerated_with_remove_row_entries() {
    let mut store = MemoryStore::new();
    let sink = MemorySink::new();

    ingest_one(&mut store, &sink, &state_ctx(26), 100, &[cand(100), voided(cand(100))]);
    assert_eq!(store.get(100).unwrap().unwrap().number_of_rows, 2);

    let lines_before = sink.lines().len();
    let outcome = ingest_one(&mut store, &sink, &state_ctx(27), 100, &[cand(100)]);
    assert_eq!(outcome, VoterOutcome::Unchanged);

    let v = store.get(100).unwrap().unwrap();
    assert_eq!(v.number_of_rows, 1);
    // sticky: history is never forgotten
    assert!(v.has_voided_ballot);
    let new_lines: Vec<String> = sink.lines()[lines_before..].to_vec();
    assert_eq!(new_lines, vec!["SoS-10-27.csv | Ballot Count: 1 | REMOVE ROW".to_string()]);
}

#[test]
fn losing_void_status_without_new_rows_is_fatal_for_that_voter() {
    let mut store = MemoryStore::new();
    let sink = MemorySink::new();

    // voter stored from an all-void snapshot
    ingest_one(&mut store, &sink, &state_ctx(26), 100, &[voided(cand(100)), voided(cand(100))]);
    assert!(store.get(100).unwrap().unwrap().is_void);

    // next snapshot claims two rows again, one now active: same count, no
    // new rows, but the voter would lose void status
    let err = process_voter_group(
        &mut store,
        &sink,
        &state_ctx(27),
        100,
        &[cand(100), voided(cand(100))],
    )
    .unwrap_err();
    assert!(matches!(err, ReconError::VoidStatusLost { registration_number: 100 }));
}

// -------------------------------------------------------------------------
// Reject / cure lifecycle
// -------------------------------------------------------------------------

#[test]
fn rejection_count_is_monotonic_and_conflicting_reasons_become_both() {
    let mut store = MemoryStore::new();
    let sink = MemorySink::new();

    // day 1: rejected active row, Deficient
    ingest_one(
        &mut store,
        &sink,
        &state_ctx(26),
        100,
        &[with_status(cand(100), BallotStatus::DeficientAffidavit)],
    );
    let v = store.get(100).unwrap().unwrap();
    assert_eq!(v.number_of_rejections, 1);
    assert_eq!(v.reject_reason, Some(absentia_core::RejectReason::Deficient));

    // day 2: same count, different reason => Both, count untouched
    ingest_one(
        &mut store,
        &sink,
        &state_ctx(27),
        100,
        &[with_status(cand(100), BallotStatus::DefectiveAffidavit)],
    );
    let v = store.get(100).unwrap().unwrap();
    assert_eq!(v.number_of_rejections, 1);
    assert_eq!(v.reject_reason, Some(absentia_core::RejectReason::Both));

    // day 3: an extra rejected void row pushes the count up
    ingest_one(
        &mut store,
        &sink,
        &state_ctx(28),
        100,
        &[
            with_status(cand(100), BallotStatus::DefectiveAffidavit),
            with_status(voided(cand(100)), BallotStatus::DefectiveAffidavit),
        ],
    );
    let v = store.get(100).unwrap().unwrap();
    assert_eq!(v.number_of_rejections, 2);
    assert_eq!(v.reject_date, Some(day(28)));
}

#[test]
fn cure_requires_prior_rejection() {
    let mut store = MemoryStore::new();
    let sink = MemorySink::new();

    // a voter that was never rejected just keeps updating
    ingest_one(&mut store, &sink, &state_ctx(26), 100, &[cand(100)]);
    ingest_one(&mut store, &sink, &state_ctx(27), 100, &[cand(100)]);

    let v = store.get(100).unwrap().unwrap();
    assert_eq!(v.cure_date, None);
    assert!(!v.was_ever_rejected);
}

#[test]
fn rejected_then_clean_extract_cures_the_voter() {
    let mut store = MemoryStore::new();
    let sink = MemorySink::new();

    ingest_one(
        &mut store,
        &sink,
        &state_ctx(26),
        100,
        &[with_status(cand(100), BallotStatus::DeficientAffidavit)],
    );
    let v = store.get(100).unwrap().unwrap();
    assert!(v.was_ever_rejected && v.currently_rejected);

    // next extract: status cleared, ballot received
    ingest_one(&mut store, &sink, &state_ctx(28), 100, &[cand(100)]);

    let v = store.get(100).unwrap().unwrap();
    assert_eq!(v.cure_date, Some(day(28)));
    assert!(!v.currently_rejected);
    assert_eq!(v.ballot_status, None);
    // cure invariant: reject_date survives, status is null
    assert!(v.reject_date.is_some());
    assert!(v.was_ever_rejected);

    // further identical extracts change nothing
    let snapshot = v.clone();
    ingest_one(&mut store, &sink, &state_ctx(29), 100, &[cand(100)]);
    assert_eq!(store.get(100).unwrap().unwrap(), snapshot);
}

// -------------------------------------------------------------------------
// Removal / reappearance
// -------------------------------------------------------------------------

#[test]
fn removal_and_reappearance_round_trip() {
    let mut store = MemoryStore::new();
    let sink = MemorySink::new();

    ingest_one(&mut store, &sink, &state_ctx(26), 100, &[cand(100)]);
    ingest_one(&mut store, &sink, &state_ctx(26), 200, &[cand(200)]);

    // day 27: voter 200 is absent
    ingest_one(&mut store, &sink, &state_ctx(27), 100, &[cand(100)]);
    let seen: BTreeSet<i64> = [100].into_iter().collect();
    let marked = run_removal_pass(&mut store, &sink, &state_ctx(27), &seen).unwrap();
    assert_eq!(marked, 1);

    let v = store.get(200).unwrap().unwrap();
    assert!(v.was_removed);
    assert_eq!(v.logs.last().map(String::as_str), Some("SoS-10-27.csv | REMOVE"));

    // a second pass for the same day marks nothing new
    assert_eq!(run_removal_pass(&mut store, &sink, &state_ctx(27), &seen).unwrap(), 0);

    // day 28: voter 200 reappears, fields unchanged
    let lines_before = sink.lines().len();
    let outcome = ingest_one(&mut store, &sink, &state_ctx(28), 200, &[cand(200)]);
    assert_eq!(outcome, VoterOutcome::Unchanged);

    let v = store.get(200).unwrap().unwrap();
    assert!(!v.was_removed);
    // no spurious field-diff entries beyond the removal clear
    assert_eq!(sink.lines().len(), lines_before);
}

// -------------------------------------------------------------------------
// Ballot count invariant
// -------------------------------------------------------------------------

#[test]
fn number_of_rows_always_equals_voids_plus_active_slot() {
    let mut store = MemoryStore::new();
    let sink = MemorySink::new();

    let cases: Vec<Vec<CanonicalCandidate>> = vec![
        vec![cand(1)],
        vec![cand(2), voided(cand(2))],
        vec![voided(cand(3)), voided(cand(3))],
        vec![cand(4), cand(4), voided(cand(4))],
        vec![cand(5), voided(cand(5)), voided(cand(5)), voided(cand(5))],
    ];

    for rows in &cases {
        let reg = rows[0].registration_number;
        ingest_one(&mut store, &sink, &state_ctx(26), reg, rows);
        let v = store.get(reg).unwrap().unwrap();
        let void_count = rows.iter().filter(|r| r.is_void).count() as u32;
        let has_active = rows.iter().any(|r| !r.is_void);
        let expected = if has_active { void_count + 1 } else { void_count };
        assert_eq!(v.number_of_rows, expected, "voter {reg}");
    }
}

// -------------------------------------------------------------------------
// County authority
// -------------------------------------------------------------------------

#[test]
fn state_ingest_leaves_county_sourced_records_alone() {
    let mut store = MemoryStore::new();
    let sink = MemorySink::new();

    let mut rec = VoterRecord::from_candidate(&cand(100));
    rec.number_of_rows = 1;
    rec.county_sourced = true;
    store.insert(&rec).unwrap();

    let mut moved = cand(100);
    moved.resident_address = "999 Elsewhere Rd".into();
    let outcome = ingest_one(&mut store, &sink, &state_ctx(26), 100, &[moved]);
    assert_eq!(outcome, VoterOutcome::SkippedCountyAuthority);
    assert_eq!(store.get(100).unwrap().unwrap().resident_address, "100 Main St");
}

#[test]
fn non_reporting_county_keeps_its_ballot_status_on_state_updates() {
    let mut store = MemoryStore::new();
    let sink = MemorySink::new();

    // Polk voter, rejected via the county list earlier
    let mut polk = cand(100);
    polk.county = "Polk".into();
    seed_voter(&mut store, &polk);
    store
        .apply_county_rejection(
            100,
            &absentia_recon::store::CountyRejection {
                reject_date: day(25),
                ballot_status: BallotStatus::DeficientAffidavit,
                reject_reason: absentia_core::RejectReason::Deficient,
                number_of_rejections: 1,
                default_receive_method_mail: false,
                log_line: "Polk-10-25.csv | UPDATE | Ballot Status | None => Deficient Affidavit/Incomplete".into(),
            },
        )
        .unwrap();

    // the state extract says nothing about the rejection and moves the voter
    let mut moved = polk.clone();
    moved.resident_address = "200 Oak Ave".into();
    let outcome = ingest_one(&mut store, &sink, &state_ctx(26), 100, &[moved]);
    assert_eq!(outcome, VoterOutcome::Updated);

    let v = store.get(100).unwrap().unwrap();
    assert_eq!(v.resident_address, "200 Oak Ave");
    // county-owned status survives the overwrite, and no REJECT entry appears
    assert_eq!(v.ballot_status, Some(BallotStatus::DeficientAffidavit));
    assert!(sink.lines().iter().all(|l| !l.contains("REJECT")));
    // and the state-side cure machinery never ran for Polk
    assert_eq!(v.cure_date, None);
}

#[test]
fn county_list_rejects_and_cures() {
    let mut store = MemoryStore::new();
    let sink = MemorySink::new();

    let mut a = cand(100);
    a.county = "Polk".into();
    a.last_name = "Doe".into();
    seed_voter(&mut store, &a);

    let mut b = cand(200);
    b.county = "Polk".into();
    b.last_name = "Roe".into();
    seed_voter(&mut store, &b);

    let rows = vec![CountyRow {
        last_name: "Doe".into(),
        first_name: "Jane".into(),
        middle_name: None,
        address: Some("100 Main St".into()),
        situation: BallotStatus::DeficientAffidavit,
        registration_number: None,
    }];

    let scorer = PartialRatio;
    let mut prompt = SeededPrompt::new(vec![]);
    let mut resolver = IdentityResolver::new(&scorer, &mut prompt);

    // day 26: Doe is rejected
    let summary = ingest_county(
        &mut store,
        &sink,
        &county_ctx("Polk", 26),
        CountyFormat::Polk,
        &rows,
        &mut resolver,
    )
    .unwrap();
    assert_eq!(summary.rejected_marked, 1);
    assert_eq!(summary.cured, 0);
    assert_eq!(summary.unresolved, 0);

    let v = store.get(100).unwrap().unwrap();
    assert_eq!(v.ballot_status, Some(BallotStatus::DeficientAffidavit));
    assert!(v.currently_rejected);
    assert_eq!(v.reject_date, Some(day(26)));
    assert_eq!(v.number_of_rejections, 1);
    assert_eq!(v.absentee_receive_method.as_deref(), Some("Mail"));
    assert_eq!(
        v.logs.last().map(String::as_str),
        Some("Polk-10-26.csv | UPDATE | Ballot Status | None => Deficient Affidavit/Incomplete")
    );

    // day 27: Doe is off the list => cured
    let mut prompt = SeededPrompt::new(vec![]);
    let mut resolver = IdentityResolver::new(&scorer, &mut prompt);
    let summary = ingest_county(
        &mut store,
        &sink,
        &county_ctx("Polk", 27),
        CountyFormat::Polk,
        &[],
        &mut resolver,
    )
    .unwrap();
    assert_eq!(summary.cured, 1);

    let v = store.get(100).unwrap().unwrap();
    assert_eq!(v.ballot_status, None);
    assert!(!v.currently_rejected);
    assert_eq!(v.cure_date, Some(day(27)));
    assert_eq!(
        v.logs.last().map(String::as_str),
        Some("Polk-10-27.csv | UPDATE | Ballot Status | Deficient Affidavit/Incomplete => None")
    );
}

#[test]
fn des_moines_rows_bypass_identity_resolution() {
    let mut store = MemoryStore::new();
    let sink = MemorySink::new();

    let mut dm = cand(100);
    dm.county = "Des Moines".into();
    seed_voter(&mut store, &dm);

    let rows = vec![CountyRow {
        last_name: String::new(),
        first_name: String::new(),
        middle_name: None,
        address: None,
        situation: BallotStatus::DefectiveAffidavit,
        registration_number: Some(100),
    }];

    let scorer = PartialRatio;
    let mut prompt = SeededPrompt::new(vec![]);
    let mut resolver = IdentityResolver::new(&scorer, &mut prompt);
    let summary = ingest_county(
        &mut store,
        &sink,
        &county_ctx("Des Moines", 26),
        CountyFormat::DesMoines,
        &rows,
        &mut resolver,
    )
    .unwrap();

    assert_eq!(summary.rejected_marked, 1);
    assert_eq!(prompt.asked, 0);
    let v = store.get(100).unwrap().unwrap();
    assert_eq!(v.ballot_status, Some(BallotStatus::DefectiveAffidavit));
}

// -------------------------------------------------------------------------
// Identity resolution
// -------------------------------------------------------------------------

fn county_row(address: &str) -> CountyRow {
    CountyRow {
        last_name: "Doe".into(),
        first_name: "Jane".into(),
        middle_name: None,
        address: Some(address.into()),
        situation: BallotStatus::DeficientAffidavit,
        registration_number: None,
    }
}

#[test]
fn fuzzy_fallback_separates_lookalike_addresses() {
    let mut store = MemoryStore::new();

    let mut a = cand(1);
    a.county = "Polk".into();
    a.resident_address = "100 Main St".into();
    seed_voter(&mut store, &a);

    let mut b = cand(2);
    b.county = "Polk".into();
    b.resident_address = "100 Main Street Apt 2".into();
    seed_voter(&mut store, &b);

    let scorer = PartialRatio;
    let mut prompt = SeededPrompt::new(vec![]);
    let mut resolver = IdentityResolver::new(&scorer, &mut prompt);

    let resolution = resolver
        .resolve(&mut store, &county_row("100 Main St Apt 2"), "Polk")
        .unwrap();

    // both share the "100 main" prefix, but only one clears the >= 90 bar;
    // no escalation to the manual channel
    let Resolution::Resolved(v) = resolution else {
        panic!("expected a resolved identity");
    };
    assert_eq!(v.registration_number, 1);
    assert_eq!(prompt.asked, 0);

    // the fuzzy resolution was memoized
    assert_eq!(store.mappings().len(), 1);
    assert_eq!(store.mappings()[0].registration_number, 1);
}

#[test]
fn ambiguous_identity_escalates_and_memoizes_the_answer() {
    let mut store = MemoryStore::new();

    // two voters whose addresses both contain the incoming one
    for (reg, addr) in [(1, "100 Main St Apt 1"), (2, "100 Main St Apt 2")] {
        let mut v = cand(reg);
        v.county = "Polk".into();
        v.resident_address = addr.into();
        seed_voter(&mut store, &v);
    }

    let scorer = PartialRatio;
    let mut prompt = SeededPrompt::new(vec![PromptAnswer::Registration(2)]);
    let mut resolver = IdentityResolver::new(&scorer, &mut prompt);

    let row = county_row("100 Main St");
    let Resolution::Resolved(v) = resolver.resolve(&mut store, &row, "Polk").unwrap() else {
        panic!("expected manual resolution to succeed");
    };
    assert_eq!(v.registration_number, 2);
    assert_eq!(prompt.asked, 1);

    // the same ambiguous case later hits the mapping, never the prompt
    let mut prompt = SeededPrompt::new(vec![]);
    let mut resolver = IdentityResolver::new(&scorer, &mut prompt);
    let Resolution::Resolved(v) = resolver.resolve(&mut store, &row, "Polk").unwrap() else {
        panic!("expected mapping hit");
    };
    assert_eq!(v.registration_number, 2);
    assert_eq!(prompt.asked, 0);
}

#[test]
fn skipped_manual_resolution_leaves_the_row_unresolved() {
    let mut store = MemoryStore::new();

    let scorer = PartialRatio;
    let mut prompt = SeededPrompt::new(vec![PromptAnswer::Skip]);
    let mut resolver = IdentityResolver::new(&scorer, &mut prompt);

    let resolution = resolver
        .resolve(&mut store, &county_row("100 Main St"), "Polk")
        .unwrap();
    assert_eq!(resolution, Resolution::Unresolved);
    assert_eq!(prompt.asked, 1);
    assert!(store.mappings().is_empty());
}

#[test]
fn unique_exact_prefix_match_skips_fuzzy_and_prompt() {
    let mut store = MemoryStore::new();

    let mut a = cand(1);
    a.county = "Polk".into();
    a.resident_address = "742 Evergreen Terrace".into();
    seed_voter(&mut store, &a);

    let scorer = PartialRatio;
    let mut prompt = SeededPrompt::new(vec![]);
    let mut resolver = IdentityResolver::new(&scorer, &mut prompt);

    let Resolution::Resolved(v) = resolver
        .resolve(&mut store, &county_row("742 Evergreen Terrace"), "Polk")
        .unwrap()
    else {
        panic!("expected prefix match");
    };
    assert_eq!(v.registration_number, 1);
    assert_eq!(prompt.asked, 0);
    // exact matches are deterministic and not memoized
    assert!(store.mappings().is_empty());
}

// -------------------------------------------------------------------------
// Orchestrator
// -------------------------------------------------------------------------

#[test]
fn pipeline_isolates_per_voter_failures() {
    let shared = MemoryStore::new();
    let sink = MemorySink::new();
    let ctx = state_ctx(26);

    // voter 300 is pre-stored as all-void; its incoming group will fail the
    // void-loss integrity check
    {
        let mut handle = shared.clone();
        ingest_one(&mut handle, &sink, &state_ctx(25), 300, &[voided(cand(300)), voided(cand(300))]);
    }

    let mut groups: BTreeMap<i64, Vec<CanonicalCandidate>> = BTreeMap::new();
    for reg in [100, 200] {
        groups.insert(reg, vec![cand(reg)]);
    }
    groups.insert(300, vec![cand(300), voided(cand(300))]);

    let cancel = CancelToken::new();
    let summary = ingest_state(
        || Ok(shared.clone()),
        &groups,
        &ctx,
        &sink,
        2,
        &cancel,
    );

    assert_eq!(summary.voters_processed, 3);
    assert_eq!(summary.inserted, 2);
    assert_eq!(summary.failures, 1);
    assert!(!summary.cancelled);

    // the failing voter did not block the others
    assert!(shared.get(100).unwrap().is_some());
    assert!(shared.get(200).unwrap().is_some());
}

#[test]
fn cancellation_stops_new_groups_but_keeps_committed_work() {
    let shared = MemoryStore::new();
    let sink = MemorySink::new();

    let mut groups: BTreeMap<i64, Vec<CanonicalCandidate>> = BTreeMap::new();
    for reg in 1..=10 {
        groups.insert(reg, vec![cand(reg)]);
    }

    let cancel = CancelToken::new();
    cancel.cancel();

    let summary = ingest_state(
        || Ok(shared.clone()),
        &groups,
        &state_ctx(26),
        &sink,
        2,
        &cancel,
    );

    assert!(summary.cancelled);
    assert_eq!(summary.voters_processed, 0);
    assert!(shared.is_empty());
}

#[test]
fn watermark_refuses_older_extracts_but_allows_reruns() {
    let mut store = MemoryStore::new();
    assert!(check_watermark(&store, "sos", day(26)).is_ok());

    store.set_watermark("sos", day(26)).unwrap();
    // same label: re-running is the recovery mechanism
    assert!(check_watermark(&store, "sos", day(26)).is_ok());
    assert!(check_watermark(&store, "sos", day(27)).is_ok());

    let err = check_watermark(&store, "sos", day(25)).unwrap_err();
    assert!(matches!(err, ReconError::StaleExtract { .. }));
}
