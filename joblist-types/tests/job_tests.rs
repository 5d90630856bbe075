use joblist_types::{DetailSnapshot, Error, JobIdSet, JobRecord, JobRef};
use pretty_assertions::assert_eq;
use std::collections::HashSet;

// ── JobRef ────────────────────────────────────────────────────────

#[test]
fn job_ref_equality_is_by_pair() {
    let a = JobRef::new("web", "default");
    let b = JobRef::new("web", "default");
    let c = JobRef::new("web", "prod");
    assert_eq!(a, b);
    assert_ne!(a, c);

    let mut set = HashSet::new();
    set.insert(a);
    set.insert(b);
    set.insert(c);
    assert_eq!(set.len(), 2);
}

#[test]
fn job_ref_token_form() {
    let job = JobRef::new("web", "default");
    assert_eq!(job.to_string(), "default.web");
    assert_eq!(job.to_token().as_str(), "default.web");
}

#[test]
fn job_ref_parse_keeps_dots_in_id() {
    let job: JobRef = "default.batch.periodic-1".parse().unwrap();
    assert_eq!(job, JobRef::new("batch.periodic-1", "default"));
}

#[test]
fn job_ref_parse_rejects_malformed() {
    assert!(matches!("nodot".parse::<JobRef>(), Err(Error::InvalidJobRef(_))));
    assert!(".web".parse::<JobRef>().is_err());
    assert!("default.".parse::<JobRef>().is_err());
}

// ── JobIdSet ──────────────────────────────────────────────────────

fn ids(names: &[&str]) -> JobIdSet {
    names.iter().map(|n| JobRef::new(*n, "default")).collect()
}

#[test]
fn same_members_respects_order() {
    assert!(ids(&["a", "b"]).same_members(&ids(&["a", "b"])));
    assert!(!ids(&["a", "b"]).same_members(&ids(&["b", "a"])));
    assert!(!ids(&["a"]).same_members(&ids(&["a", "b"])));
}

#[test]
fn id_set_from_records_preserves_server_order() {
    let records = vec![
        JobRecord::new("zeta", "default"),
        JobRecord::new("alpha", "default"),
    ];
    let set = JobIdSet::from_records(&records);
    assert_eq!(set.first(), Some(&JobRef::new("zeta", "default")));
    assert_eq!(set.last(), Some(&JobRef::new("alpha", "default")));
    assert_eq!(set.len(), 2);
}

// ── JobRecord ─────────────────────────────────────────────────────

#[test]
fn record_parses_server_json() {
    let json = r#"[{
        "ID": "web",
        "Namespace": "default",
        "Name": "web",
        "Status": "running",
        "Type": "service",
        "Priority": 50,
        "NodePool": "default",
        "Allocs": [{"ID": "a1", "ClientStatus": "running"}]
    }]"#;
    let records = JobRecord::parse_list(json).unwrap();
    assert_eq!(records.len(), 1);
    let record = &records[0];
    assert_eq!(record.job_ref(), JobRef::new("web", "default"));
    assert_eq!(record.status.as_deref(), Some("running"));
    assert_eq!(record.job_type.as_deref(), Some("service"));
    assert_eq!(record.priority, Some(50));
    assert!(record.extra.contains_key("Allocs"));
}

#[test]
fn record_tolerates_missing_columns() {
    let records = JobRecord::parse_list(r#"[{"ID":"x","Namespace":"ns"}]"#).unwrap();
    assert_eq!(records[0].name, "");
    assert!(records[0].status.is_none());
}

#[test]
fn record_parse_error_is_serialization() {
    assert!(matches!(
        JobRecord::parse_list("{not json"),
        Err(Error::Serialization(_))
    ));
}

// ── DetailSnapshot ────────────────────────────────────────────────

#[test]
fn snapshot_keyed_by_ref() {
    let snapshot = DetailSnapshot::from_records(vec![
        JobRecord::new("web", "default").with_status("running"),
        JobRecord::new("web", "prod").with_status("dead"),
    ]);
    assert_eq!(snapshot.len(), 2);
    let prod = snapshot.get(&JobRef::new("web", "prod")).unwrap();
    assert_eq!(prod.status.as_deref(), Some("dead"));
}

#[test]
fn snapshot_equality_detects_content_change() {
    let a = DetailSnapshot::from_records(vec![JobRecord::new("web", "default").with_status("pending")]);
    let b = DetailSnapshot::from_records(vec![JobRecord::new("web", "default").with_status("pending")]);
    let c = DetailSnapshot::from_records(vec![JobRecord::new("web", "default").with_status("running")]);
    assert_eq!(a, b);
    assert_ne!(a, c);
}
