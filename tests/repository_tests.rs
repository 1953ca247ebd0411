use creator_portal::{
    models::{NewSubmission, SubmissionStatus},
    repository::{InMemoryRepository, SubmissionRepository},
};
use std::sync::Arc;

fn new_submission(email: &str, nsfw: bool) -> NewSubmission {
    NewSubmission {
        first_name: "Test".into(),
        last_name: "Visitor".into(),
        email: email.into(),
        message: "hello".into(),
        interests: if nsfw {
            vec!["NSFW".into()]
        } else {
            vec!["Gaming".into()]
        },
        has_nsfw_interest: nsfw,
        origin_ip: "unknown".into(),
        user_agent: "unknown".into(),
        ..Default::default()
    }
}

#[tokio::test]
async fn create_assigns_sequential_ids_and_defaults() {
    let repo = InMemoryRepository::new();

    let first = repo.create(new_submission("a@example.com", false)).await.unwrap();
    let second = repo.create(new_submission("b@example.com", true)).await.unwrap();

    assert!(second.id > first.id);
    assert_eq!(first.status, SubmissionStatus::New);
    assert!(!first.nsfw_access_approved);
    assert!(first.read_at.is_none());
    assert!(first.approved_at.is_none());
    assert!(second.has_nsfw_interest);
}

#[tokio::test]
async fn list_is_newest_first() {
    let repo = InMemoryRepository::new();
    for i in 0..3 {
        repo.create(new_submission(&format!("v{i}@example.com"), false))
            .await
            .unwrap();
    }

    let listed = repo.list().await.unwrap();
    assert_eq!(listed.len(), 3);
    assert!(listed[0].id > listed[1].id && listed[1].id > listed[2].id);
}

#[tokio::test]
async fn set_status_stamps_timestamps_once() {
    let repo = InMemoryRepository::new();
    let created = repo.create(new_submission("a@example.com", false)).await.unwrap();

    let read = repo
        .set_status(created.id, SubmissionStatus::Read)
        .await
        .unwrap()
        .unwrap();
    let first_read_at = read.read_at.expect("stamped on first transition");

    let replied = repo
        .set_status(created.id, SubmissionStatus::Replied)
        .await
        .unwrap()
        .unwrap();
    assert!(replied.replied_at.is_some());
    assert_eq!(replied.read_at, Some(first_read_at));

    // Returning to `read` does not re-stamp.
    let re_read = repo
        .set_status(created.id, SubmissionStatus::Read)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(re_read.read_at, Some(first_read_at));
}

#[tokio::test]
async fn set_status_on_unknown_id_is_none() {
    let repo = InMemoryRepository::new();
    assert!(repo
        .set_status(42, SubmissionStatus::Archived)
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn approve_is_compare_and_set() {
    let repo = InMemoryRepository::new();
    let created = repo.create(new_submission("a@example.com", true)).await.unwrap();

    let approved = repo.approve_nsfw(created.id).await.unwrap().unwrap();
    assert!(approved.nsfw_access_approved);
    assert!(approved.approved_at.is_some());
    assert_eq!(approved.status, SubmissionStatus::Approved);

    // Second attempt finds the condition no longer holds.
    assert!(repo.approve_nsfw(created.id).await.unwrap().is_none());

    // And the record kept its original approval stamp.
    let row = repo.get(created.id).await.unwrap().unwrap();
    assert_eq!(row.approved_at, approved.approved_at);
}

#[tokio::test]
async fn approve_rejects_unrequested_and_unknown() {
    let repo = InMemoryRepository::new();
    let plain = repo.create(new_submission("a@example.com", false)).await.unwrap();

    assert!(repo.approve_nsfw(plain.id).await.unwrap().is_none());
    assert!(repo.approve_nsfw(999).await.unwrap().is_none());

    let row = repo.get(plain.id).await.unwrap().unwrap();
    assert!(!row.nsfw_access_approved);
    assert_eq!(row.status, SubmissionStatus::New);
}

#[tokio::test]
async fn concurrent_approvals_yield_exactly_one_success() {
    let repo = Arc::new(InMemoryRepository::new());
    let created = repo.create(new_submission("a@example.com", true)).await.unwrap();

    let (a, b) = tokio::join!(
        {
            let repo = repo.clone();
            let id = created.id;
            tokio::spawn(async move { repo.approve_nsfw(id).await.unwrap() })
        },
        {
            let repo = repo.clone();
            let id = created.id;
            tokio::spawn(async move { repo.approve_nsfw(id).await.unwrap() })
        }
    );

    let outcomes = [a.unwrap(), b.unwrap()];
    let successes = outcomes.iter().filter(|o| o.is_some()).count();
    assert_eq!(successes, 1);

    let row = repo.get(created.id).await.unwrap().unwrap();
    assert!(row.nsfw_access_approved);
    assert_eq!(row.status, SubmissionStatus::Approved);
}

#[tokio::test]
async fn stats_reflect_lifecycle() {
    let repo = InMemoryRepository::new();
    let nsfw = repo.create(new_submission("a@example.com", true)).await.unwrap();
    repo.create(new_submission("b@example.com", false)).await.unwrap();
    repo.create(new_submission("c@example.com", true)).await.unwrap();

    repo.approve_nsfw(nsfw.id).await.unwrap().unwrap();

    let stats = repo.stats().await.unwrap();
    assert_eq!(stats.total_contacts, 3);
    assert_eq!(stats.nsfw_requests, 2);
    // The approved one left `new`; the other two are still unread.
    assert_eq!(stats.unread, 2);
    assert_eq!(stats.pending_nsfw, 1);
}
