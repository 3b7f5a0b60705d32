use super::*;
use crate::queue::job::{JobFiles, StoredFile};
use crate::render::settings::RenderSettings;

fn job(id: &str, status: JobStatus) -> Job {
    let mut job = Job::new(
        id,
        JobFiles {
            replay: StoredFile::at(format!("/uploads/{id}.osr")),
            skin: None,
            beatmap: None,
        },
        RenderSettings::default(),
    );
    job.status = status;
    job
}

fn exercise_basic_contract(store: &dyn JobStore) {
    assert_eq!(store.get("a").unwrap(), None);
    store.save(&job("a", JobStatus::Queued)).unwrap();
    store.save(&job("b", JobStatus::Queued)).unwrap();

    let updated = store
        .update("a", &mut |j| j.progress = 0.5)
        .unwrap()
        .unwrap();
    assert_eq!(updated.progress, 0.5);
    assert!(updated.updated_at >= updated.created_at);
    assert_eq!(store.get("a").unwrap().unwrap().progress, 0.5);
    assert_eq!(store.update("missing", &mut |_| {}).unwrap(), None);

    store.append_log("b", "hello").unwrap();
    let b = store.get("b").unwrap().unwrap();
    assert_eq!(b.logs.len(), 1);
    assert_eq!(b.logs[0].message, "hello");

    let ids: Vec<String> = store.list().unwrap().into_iter().map(|j| j.id).collect();
    assert_eq!(ids, vec!["a".to_string(), "b".to_string()]);
}

fn exercise_recovery(store: &dyn JobStore) {
    store.save(&job("q", JobStatus::Queued)).unwrap();
    store.save(&job("p", JobStatus::Processing)).unwrap();
    store.save(&job("c", JobStatus::Completed)).unwrap();
    let finished_at = chrono::DateTime::parse_from_rfc3339("2024-05-01T12:00:00Z")
        .unwrap()
        .with_timezone(&Utc);
    let mut with_error = job("e", JobStatus::Processing);
    with_error.error = Some("earlier".to_string());
    with_error.completed_at = Some(finished_at);
    store.save(&with_error).unwrap();

    assert_eq!(store.mark_interrupted().unwrap(), 3);
    for id in ["q", "p"] {
        let j = store.get(id).unwrap().unwrap();
        assert_eq!(j.status, JobStatus::Failed);
        assert_eq!(j.error.as_deref(), Some(INTERRUPTED_ERROR));
        assert!(j.completed_at.is_some());
    }
    let e = store.get("e").unwrap().unwrap();
    assert_eq!(e.error.as_deref(), Some("earlier"));
    assert_eq!(e.completed_at, Some(finished_at));
    assert_eq!(
        store.get("c").unwrap().unwrap().status,
        JobStatus::Completed
    );
    assert_eq!(store.mark_interrupted().unwrap(), 0);
}

#[test]
fn memory_store_contract() {
    exercise_basic_contract(&MemoryJobStore::new());
}

#[test]
fn memory_store_recovery() {
    exercise_recovery(&MemoryJobStore::new());
}

#[test]
fn json_store_contract() {
    let dir = tempfile::tempdir().unwrap();
    let store = JsonDirJobStore::open(dir.path().join("jobs")).unwrap();
    exercise_basic_contract(&store);
    assert!(store.dir().join("a.json").is_file());
    assert!(!store.dir().join("a.json.tmp").exists());
}

#[test]
fn json_store_recovery() {
    let dir = tempfile::tempdir().unwrap();
    exercise_recovery(&JsonDirJobStore::open(dir.path()).unwrap());
}

#[test]
fn json_store_survives_reopen_and_skips_garbage() {
    let dir = tempfile::tempdir().unwrap();
    {
        let store = JsonDirJobStore::open(dir.path()).unwrap();
        store.save(&job("keep", JobStatus::Completed)).unwrap();
    }
    std::fs::write(dir.path().join("broken.json"), "{ nope").unwrap();
    std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

    let store = JsonDirJobStore::open(dir.path()).unwrap();
    let jobs = store.list().unwrap();
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].id, "keep");
    assert!(matches!(
        store.get("broken").unwrap_err(),
        RenderError::Serde(_)
    ));
}

#[test]
fn json_store_rejects_path_like_ids() {
    let dir = tempfile::tempdir().unwrap();
    let store = JsonDirJobStore::open(dir.path()).unwrap();
    for id in ["", "../x", "a/b", "a.b"] {
        assert!(matches!(
            store.get(id).unwrap_err(),
            RenderError::Validation(_)
        ));
    }
}
