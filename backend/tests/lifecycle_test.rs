mod common;

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use time::{macros::datetime, Duration, OffsetDateTime};
use uuid::Uuid;

use placement_backend::{
    auth::{AuthUser, Role},
    clock::FixedClock,
    config::BootstrapConfig,
    error::AppError,
    lifecycle::AssignmentService,
    models::{
        assignment::{
            AssignmentListParams, AssignmentStatus, AssignmentView, CreateAssignmentRequest,
            UpdateAssignmentRequest,
        },
        notification::{Notification, NotificationKind},
    },
    notify::{NotificationEmitter, RecipientPolicy, StoreNotifier},
    provision::ensure_bootstrap,
    store::{
        AssignmentRepository, MemoryStore, NotificationRepository, StoreError, StoreResult,
    },
};

const NOW: OffsetDateTime = datetime!(2026-10-18 12:00 UTC);

struct World {
    store: Arc<MemoryStore>,
    clock: Arc<FixedClock>,
    service: AssignmentService,
    manager: AuthUser,
    member_id: Uuid,
    desk: Uuid,
    office: Uuid,
}

async fn world_with(
    policy: RecipientPolicy,
    emitter: impl FnOnce(Arc<MemoryStore>) -> Arc<dyn NotificationEmitter>,
) -> World {
    let store = Arc::new(MemoryStore::new());
    let clock = common::fixed_clock(NOW);
    let org_id = common::create_test_org(&store, "lifecycle").await;
    let manager_id =
        common::create_test_user(&store, org_id, Role::Manager, &common::unique_email("mgr")).await;
    let member_id =
        common::create_test_user(&store, org_id, Role::Member, &common::unique_email("member")).await;
    let desk = common::create_test_workplace(&store, org_id, "DESK-1").await;
    let office = common::create_test_workplace(&store, org_id, "OFFICE-2").await;

    let service = AssignmentService::new(store.clone(), emitter(store.clone()), policy, clock.clone());

    World {
        store,
        clock,
        service,
        manager: common::caller(manager_id, org_id, Role::Manager),
        member_id,
        desk,
        office,
    }
}

async fn world() -> World {
    world_with(RecipientPolicy::default(), |store| Arc::new(StoreNotifier::new(store))).await
}

fn request(
    user_id: Uuid,
    workplace_id: Uuid,
    starts_at: OffsetDateTime,
    ends_at: Option<OffsetDateTime>,
) -> CreateAssignmentRequest {
    CreateAssignmentRequest {
        org_id: None,
        user_id,
        workplace_id,
        starts_at,
        ends_at,
        status: None,
    }
}

impl World {
    async fn create(&self, starts_at: OffsetDateTime, ends_at: Option<OffsetDateTime>) -> AssignmentView {
        self.service
            .create(&self.manager, request(self.member_id, self.desk, starts_at, ends_at))
            .await
            .expect("create assignment")
    }

    async fn notifications(&self, assignment_id: Uuid) -> usize {
        self.store.count_notifications_for_assignment(assignment_id).await
    }
}

/// Emitter that refuses every delivery.
struct FailingEmitter;

#[async_trait]
impl NotificationEmitter for FailingEmitter {
    async fn notify(
        &self,
        _recipient_id: Uuid,
        _assignment: &AssignmentView,
        _kind: NotificationKind,
        _at: OffsetDateTime,
    ) -> StoreResult<Notification> {
        Err(StoreError::MissingReference("notification sink unavailable".into()))
    }
}

/// Emitter that records deliveries and otherwise forwards to the store.
struct RecordingEmitter {
    inner: StoreNotifier,
    seen: Arc<Mutex<Vec<(Uuid, NotificationKind)>>>,
}

#[async_trait]
impl NotificationEmitter for RecordingEmitter {
    async fn notify(
        &self,
        recipient_id: Uuid,
        assignment: &AssignmentView,
        kind: NotificationKind,
        at: OffsetDateTime,
    ) -> StoreResult<Notification> {
        self.seen.lock().unwrap().push((recipient_id, kind));
        self.inner.notify(recipient_id, assignment, kind, at).await
    }
}

#[tokio::test]
async fn started_yesterday_is_active_and_current() {
    let w = world().await;
    let view = w.create(NOW - Duration::days(1), None).await;

    assert_eq!(view.status, AssignmentStatus::Active);
    assert_eq!(view.stored_status, AssignmentStatus::Active);

    let current = w.service.current_for_user(&w.manager, w.member_id).await.unwrap();
    assert_eq!(current.map(|c| c.id), Some(view.id));
}

#[tokio::test]
async fn starting_tomorrow_is_planned_until_the_clock_reaches_it() {
    let w = world().await;
    let view = w.create(NOW + Duration::days(1), None).await;

    assert_eq!(view.status, AssignmentStatus::Planned);
    assert!(w.service.current_for_user(&w.manager, w.member_id).await.unwrap().is_none());

    w.clock.advance(Duration::days(1));
    let read = w.service.get(&w.manager, view.id).await.unwrap();
    assert_eq!(read.status, AssignmentStatus::Active);
    // The stored hint is untouched by reads
    assert_eq!(read.stored_status, AssignmentStatus::Planned);
    let current = w.service.current_for_user(&w.manager, w.member_id).await.unwrap();
    assert_eq!(current.map(|c| c.id), Some(view.id));
}

#[tokio::test]
async fn past_window_is_completed_and_never_current() {
    let w = world().await;
    let view = w
        .create(NOW - Duration::days(10), Some(NOW - Duration::days(3)))
        .await;

    assert_eq!(view.status, AssignmentStatus::Completed);
    assert!(w.service.current_for_user(&w.manager, w.member_id).await.unwrap().is_none());

    let history = w.service.history_for_user(&w.manager, w.member_id, None).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].id, view.id);
}

#[tokio::test]
async fn end_boundary_is_exclusive() {
    let w = world().await;
    let view = w.create(NOW - Duration::hours(2), Some(NOW + Duration::hours(1))).await;
    assert_eq!(view.status, AssignmentStatus::Active);

    w.clock.set(NOW + Duration::hours(1));
    let read = w.service.get(&w.manager, view.id).await.unwrap();
    assert_eq!(read.status, AssignmentStatus::Completed);
    assert!(w.service.current_for_user(&w.manager, w.member_id).await.unwrap().is_none());
}

#[tokio::test]
async fn earliest_start_wins_among_overlapping_windows() {
    let w = world().await;
    let later = w.create(NOW - Duration::days(1), None).await;
    let earlier = w
        .service
        .create(
            &w.manager,
            request(w.member_id, w.office, NOW - Duration::days(5), Some(NOW + Duration::days(5))),
        )
        .await
        .unwrap();

    let current = w.service.current_for_user(&w.manager, w.member_id).await.unwrap();
    assert_eq!(current.as_ref().map(|c| c.id), Some(earlier.id));

    let snapshot = w
        .service
        .current_workplace(&w.manager, w.member_id, None)
        .await
        .unwrap();
    assert_eq!(snapshot.workplace.map(|wp| wp.code), Some("OFFICE-2".to_string()));
    // The other running window is neither current nor history
    assert!(snapshot.history.iter().all(|h| h.id != later.id && h.id != earlier.id));
}

#[tokio::test]
async fn archived_is_never_current() {
    let w = world().await;
    let view = w.create(NOW - Duration::days(1), None).await;

    let updated = w
        .service
        .update(
            &w.manager,
            view.id,
            UpdateAssignmentRequest {
                status: Some(AssignmentStatus::Archived),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.status, AssignmentStatus::Archived);

    assert!(w.service.current_for_user(&w.manager, w.member_id).await.unwrap().is_none());
    let history = w.service.history_for_user(&w.manager, w.member_id, None).await.unwrap();
    assert_eq!(history.iter().map(|h| h.id).collect::<Vec<_>>(), vec![view.id]);
}

#[tokio::test]
async fn history_is_newest_first_and_limited() {
    let w = world().await;
    for weeks in 1..=4 {
        let start = NOW - Duration::weeks(weeks * 2);
        w.create(start, Some(start + Duration::days(3))).await;
    }
    let current = w.create(NOW - Duration::days(1), None).await;

    let history = w.service.history_for_user(&w.manager, w.member_id, Some(3)).await.unwrap();
    assert_eq!(history.len(), 3);
    assert!(history.windows(2).all(|p| p[0].starts_at > p[1].starts_at));
    assert!(history.iter().all(|h| h.id != current.id));

    // Out-of-range limits are clamped rather than rejected
    let all = w.service.history_for_user(&w.manager, w.member_id, Some(500)).await.unwrap();
    assert_eq!(all.len(), 4);
    let one = w.service.history_for_user(&w.manager, w.member_id, Some(0)).await.unwrap();
    assert_eq!(one.len(), 1);
}

#[tokio::test]
async fn create_rejects_inverted_window_before_touching_storage() {
    let w = world().await;
    let calls = w.store.calls();

    for end in [NOW, NOW - Duration::minutes(1)] {
        let err = w
            .service
            .create(&w.manager, request(w.member_id, w.desk, NOW, Some(end)))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)), "got {:?}", err);
    }

    assert_eq!(w.store.calls(), calls);
    let page = w
        .service
        .list(&w.manager, AssignmentListParams::default())
        .await
        .unwrap();
    assert_eq!(page.meta.total, 0);
}

#[tokio::test]
async fn create_rejects_unknown_user_and_workplace() {
    let w = world().await;

    let err = w
        .service
        .create(&w.manager, request(Uuid::new_v4(), w.desk, NOW, None))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));

    let err = w
        .service
        .create(&w.manager, request(w.member_id, Uuid::new_v4(), NOW, None))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
async fn create_notifies_the_assignee_once() {
    let w = world().await;
    let view = w.create(NOW, None).await;

    assert_eq!(w.notifications(view.id).await, 1);
    let notes = w.store.list_notifications(w.member_id, 10).await.unwrap();
    assert_eq!(notes.len(), 1);
    assert_eq!(notes[0].kind, NotificationKind::AssignmentCreated);
    assert_eq!(notes[0].payload.workplace_code, "DESK-1");
    assert_eq!(notes[0].created_at, NOW);
    assert!(notes[0].message.contains("DESK-1"));
}

#[tokio::test]
async fn only_workplace_or_status_changes_notify() {
    let w = world().await;
    let view = w.create(NOW - Duration::days(1), None).await;
    assert_eq!(w.notifications(view.id).await, 1);

    // Moving the window alone is silent
    w.service
        .update(
            &w.manager,
            view.id,
            UpdateAssignmentRequest {
                starts_at: Some(NOW - Duration::days(2)),
                ends_at: Some(Some(NOW + Duration::days(7))),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(w.notifications(view.id).await, 1);

    let moved = w
        .service
        .update(
            &w.manager,
            view.id,
            UpdateAssignmentRequest {
                workplace_id: Some(w.office),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(moved.workplace.code, "OFFICE-2");
    assert_eq!(w.notifications(view.id).await, 2);

    w.service
        .update(
            &w.manager,
            view.id,
            UpdateAssignmentRequest {
                status: Some(AssignmentStatus::Archived),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(w.notifications(view.id).await, 3);

    // Same workplace and status again: nothing changed, nothing sent
    w.service
        .update(
            &w.manager,
            view.id,
            UpdateAssignmentRequest {
                workplace_id: Some(w.office),
                status: Some(AssignmentStatus::Archived),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(w.notifications(view.id).await, 3);
}

#[tokio::test]
async fn update_validates_the_merged_window() {
    let w = world().await;
    let view = w.create(NOW, Some(NOW + Duration::days(5))).await;

    // Only starts_at is sent, but it lands after the stored end
    let err = w
        .service
        .update(
            &w.manager,
            view.id,
            UpdateAssignmentRequest {
                starts_at: Some(NOW + Duration::days(6)),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));

    let stored = w.store.find_assignment(view.id).await.unwrap().unwrap();
    assert_eq!(stored.starts_at, NOW);
    assert_eq!(stored.ends_at, Some(NOW + Duration::days(5)));
}

#[tokio::test]
async fn update_of_missing_assignment_is_not_found() {
    let w = world().await;

    let err = w
        .service
        .update(&w.manager, Uuid::new_v4(), UpdateAssignmentRequest::default())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
async fn remove_clears_notifications_first() {
    let w = world().await;
    let view = w.create(NOW, None).await;
    w.service
        .update(
            &w.manager,
            view.id,
            UpdateAssignmentRequest {
                workplace_id: Some(w.office),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(w.notifications(view.id).await, 2);

    w.service.remove(&w.manager, view.id).await.unwrap();

    assert_eq!(w.notifications(view.id).await, 0);
    assert!(w.store.find_assignment(view.id).await.unwrap().is_none());

    let err = w.service.remove(&w.manager, view.id).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
async fn list_rejects_bad_parameters_before_touching_storage() {
    let w = world().await;
    let calls = w.store.calls();

    let err = w
        .service
        .list(
            &w.manager,
            AssignmentListParams {
                from: Some(NOW),
                to: Some(NOW - Duration::days(1)),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));

    let err = w
        .service
        .list(
            &w.manager,
            AssignmentListParams {
                page_size: Some(101),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));

    assert_eq!(w.store.calls(), calls);
}

#[tokio::test]
async fn list_range_selects_overlapping_windows() {
    let w = world().await;
    let old = w.create(NOW - Duration::days(30), Some(NOW - Duration::days(20))).await;
    let running = w.create(NOW - Duration::days(1), None).await;

    let page = w
        .service
        .list(
            &w.manager,
            AssignmentListParams {
                from: Some(NOW - Duration::days(2)),
                to: Some(NOW),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    let ids: Vec<Uuid> = page.data.iter().map(|a| a.id).collect();
    assert_eq!(ids, vec![running.id]);

    let page = w
        .service
        .list(
            &w.manager,
            AssignmentListParams {
                status: Some(AssignmentStatus::Completed),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(page.data.iter().map(|a| a.id).collect::<Vec<_>>(), vec![old.id]);
}

#[tokio::test]
async fn failed_delivery_does_not_fail_the_mutation() {
    let w = world_with(RecipientPolicy::default(), |_| Arc::new(FailingEmitter)).await;

    let view = w.create(NOW, None).await;
    let updated = w
        .service
        .update(
            &w.manager,
            view.id,
            UpdateAssignmentRequest {
                workplace_id: Some(w.office),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(updated.workplace_id, w.office);
    let stored = w.store.find_assignment(view.id).await.unwrap().unwrap();
    assert_eq!(stored.workplace_id, w.office);
    assert_eq!(w.notifications(view.id).await, 0);
}

#[tokio::test]
async fn recipient_policy_adds_actor_and_admins_without_duplicates() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let recorder = seen.clone();
    let policy = RecipientPolicy {
        actor: true,
        org_admins: true,
    };
    let w = world_with(policy, move |store| {
        Arc::new(RecordingEmitter {
            inner: StoreNotifier::new(store),
            seen: recorder,
        })
    })
    .await;

    let org_id = w.manager.org_id;
    let admin_id =
        common::create_test_user(&w.store, org_id, Role::OrgAdmin, &common::unique_email("admin")).await;
    let other_admin_id =
        common::create_test_user(&w.store, org_id, Role::OrgAdmin, &common::unique_email("admin2")).await;
    let admin = common::caller(admin_id, org_id, Role::OrgAdmin);

    // The actor is also an org admin and must be notified only once
    let view = w
        .service
        .create(&admin, request(w.member_id, w.desk, NOW, None))
        .await
        .unwrap();

    let mut recipients: Vec<Uuid> = seen.lock().unwrap().iter().map(|(id, _)| *id).collect();
    recipients.sort();
    let mut expected = vec![w.member_id, admin_id, other_admin_id];
    expected.sort();
    assert_eq!(recipients, expected);
    assert_eq!(w.notifications(view.id).await, 3);
}

#[tokio::test]
async fn provisioning_is_idempotent() {
    let store = MemoryStore::new();
    let cfg = BootstrapConfig {
        org_name: "Head Office".into(),
        org_slug: "head-office".into(),
        org_timezone: "Europe/Moscow".into(),
        admin_email: "Root@Example.com".into(),
        admin_password: "correct-horse".into(),
        admin_name: Some("Root".into()),
    };

    let first = ensure_bootstrap(&store, &cfg).await.unwrap();
    assert!(first.organization_created);
    assert!(first.admin_created);
    assert_eq!(first.admin.role, Role::SuperAdmin);
    assert_eq!(first.admin.email, "root@example.com");
    assert_eq!(first.organization.timezone, "Europe/Moscow");

    let second = ensure_bootstrap(&store, &cfg).await.unwrap();
    assert!(!second.organization_created);
    assert!(!second.admin_created);
    assert_eq!(second.organization.id, first.organization.id);
    assert_eq!(second.admin.id, first.admin.id);
}
