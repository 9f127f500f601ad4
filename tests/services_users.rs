mod support;

use agora::{
    application::{error::ServiceError, pagination::Paging, users::CreateUserInput},
    domain::error::DomainError,
};
use support::{Harness, uuid};
use uuid::Uuid;

fn domain(err: ServiceError) -> DomainError {
    match err {
        ServiceError::Domain(err) => err,
        other => panic!("expected a domain error, got {other:?}"),
    }
}

#[tokio::test]
async fn duplicate_username_is_rejected() {
    let harness = Harness::new();
    harness.user("alice").await;

    let err = harness
        .services
        .users
        .create(
            CreateUserInput {
                email: "other@example.com".into(),
                name: "alice".into(),
            },
            None,
        )
        .await
        .expect_err("name is taken");

    assert_eq!(domain(err), DomainError::UsernameAlreadyTaken);
    assert_eq!(harness.backend.world().users.len(), 1);
}

#[tokio::test]
async fn malformed_email_fails_validation_before_storage() {
    let harness = Harness::new();

    let err = harness
        .services
        .users
        .create(
            CreateUserInput {
                email: "no-at-sign".into(),
                name: "alice".into(),
            },
            None,
        )
        .await
        .expect_err("invalid email");

    assert!(matches!(err, ServiceError::Validation(_)));
    assert_eq!(harness.counters().begins(), 0);
}

#[tokio::test]
async fn follow_then_follow_again_conflicts() {
    let harness = Harness::new();
    let alice = harness.user("alice").await;
    let bobby = harness.user("bobby").await;
    let users = &harness.services.users;

    users.follow(&alice, &bobby).await.expect("first follow");
    assert!(
        users
            .is_followed_by_user(&bobby, &alice)
            .await
            .expect("check follow")
    );

    let err = users.follow(&alice, &bobby).await.expect_err("second follow");
    assert_eq!(domain(err), DomainError::AlreadyFollowingUser);

    users.unfollow(&alice, &bobby).await.expect("unfollow");
    let err = users
        .unfollow(&alice, &bobby)
        .await
        .expect_err("second unfollow");
    assert_eq!(domain(err), DomainError::NotFollowingUser);
}

#[tokio::test]
async fn users_cannot_follow_themselves() {
    let harness = Harness::new();
    let alice = harness.user("alice").await;

    let err = harness
        .services
        .users
        .follow(&alice, &alice)
        .await
        .expect_err("self follow");

    assert_eq!(domain(err), DomainError::CannotFollowSelf);
    assert_eq!(harness.counters().begins(), 1, "only the signup opened a transaction");
}

#[tokio::test]
async fn following_an_unknown_user_names_the_missing_id() {
    let harness = Harness::new();
    let alice = harness.user("alice").await;
    let ghost = Uuid::new_v4();

    let err = harness
        .services
        .users
        .follow(&alice, &ghost.to_string())
        .await
        .expect_err("unknown user");

    assert_eq!(
        domain(err),
        DomainError::UsersNotFound {
            ids: vec![ghost.to_string()]
        }
    );
}

#[tokio::test]
async fn public_profile_reports_follow_state_for_the_viewer() {
    let harness = Harness::new();
    let alice = harness.user("alice").await;
    let bobby = harness.user("bobby").await;
    let users = &harness.services.users;
    users.follow(&alice, &bobby).await.expect("follow");

    let seen_by_alice = users
        .public_by_id(&bobby, Some(&alice))
        .await
        .expect("profile");
    assert_eq!(seen_by_alice.am_i_following, Some(true));
    assert_eq!(seen_by_alice.item.followers_count, 1);

    let anonymous = users.public_by_id(&bobby, None).await.expect("profile");
    assert_eq!(anonymous.am_i_following, None);

    let err = users
        .public_by_id(&Uuid::new_v4().to_string(), None)
        .await
        .expect_err("missing user");
    assert_eq!(domain(err), DomainError::UserNotFound);
}

#[tokio::test]
async fn followers_and_follows_are_listed_by_name() {
    let harness = Harness::new();
    let target = harness.user("target").await;
    let zed = harness.user("zedd").await;
    let amy = harness.user("amyy").await;
    let users = &harness.services.users;
    users.follow(&zed, &target).await.expect("zed follows");
    users.follow(&amy, &target).await.expect("amy follows");

    let followers = users
        .followers(&target, Paging::default(), Some(&amy))
        .await
        .expect("followers");
    let names: Vec<_> = followers.data.iter().map(|f| f.item.name.as_str()).collect();
    assert_eq!(names, vec!["amyy", "zedd"]);
    assert_eq!(followers.data[0].am_i_following, Some(false));

    let follows = users
        .follows(&zed, Paging::default(), None)
        .await
        .expect("follows");
    assert_eq!(follows.count, 1);
    assert_eq!(follows.data[0].item.id, uuid(&target));
}

#[tokio::test]
async fn search_rejects_overlong_queries() {
    let harness = Harness::new();
    let query = "x".repeat(36);
    let err = harness
        .services
        .users
        .search(Some(query.as_str()), Paging::default(), None)
        .await
        .expect_err("query too long");
    assert!(matches!(err, ServiceError::Validation(_)));
}

#[tokio::test]
async fn topic_ranking_positions_continue_on_the_second_page() {
    let harness = Harness::new();
    let mut authors = Vec::new();
    for n in 0..22 {
        let author = harness.user(&format!("author{n:02}")).await;
        harness
            .post(&author, &format!("Rust notes {n:02}"), &["rust", "compilers"])
            .await;
        authors.push(author);
    }
    // One author outside the topic keeps global and topic positions apart.
    let outsider = harness.user("outsider").await;
    harness
        .post(&outsider, "Go channels deep dive", &["go", "networking"])
        .await;

    let page = harness
        .services
        .users
        .ranking(Some("rust"), Paging::new(Some(20), Some(20)), None)
        .await
        .expect("ranking");

    let positions: Vec<_> = page.data.iter().map(|u| u.item.ranking_position).collect();
    assert_eq!(positions, vec![Some(21), Some(22)]);
    assert_eq!(page.current_page, 2);
    assert!(!page.has_more);
}

#[tokio::test]
async fn global_ranking_only_lists_publishing_authors() {
    let harness = Harness::new();
    let writer = harness.user("writer").await;
    harness.user("reader").await;
    harness
        .post(&writer, "Ownership explained", &["rust", "compilers"])
        .await;

    let page = harness
        .services
        .users
        .ranking(None, Paging::default(), None)
        .await
        .expect("ranking");

    assert_eq!(page.count, 1);
    assert_eq!(page.data[0].item.ranking_position, Some(1));
}

#[tokio::test]
async fn top_authors_for_topics_skips_repeats() {
    let harness = Harness::new();
    let writer = harness.user("writer").await;
    let reader = harness.user("reader").await;
    harness
        .post(&writer, "Ownership explained", &["rust", "compilers"])
        .await;

    let authors = harness
        .services
        .users
        .top_authors_for_topics(&["rust".to_string(), "compilers".to_string()], &reader)
        .await
        .expect("top authors");
    assert_eq!(authors.len(), 1);
    assert_eq!(authors[0].am_i_following, Some(false));

    let err = harness
        .services
        .users
        .top_authors_for_topics(&["cobol".to_string()], &reader)
        .await
        .expect_err("unknown topic");
    assert_eq!(
        domain(err),
        DomainError::TopicsNotFound {
            ids: vec!["cobol".to_string()]
        }
    );
}

#[tokio::test]
async fn ranking_rejects_malformed_topics_without_touching_storage() {
    let harness = Harness::new();
    harness.counters().reset();
    let users = &harness.services.users;
    let long = "x".repeat(500);

    let err = users
        .ranking(Some(&long), Paging::default(), None)
        .await
        .expect_err("overlong topic");
    assert!(matches!(err, ServiceError::Validation(_)));

    let err = users
        .top_authors_for_topics(&["rust".to_string(), String::new()], &Uuid::new_v4().to_string())
        .await
        .expect_err("empty topic");
    assert!(matches!(err, ServiceError::Validation(_)));

    assert_eq!(harness.counters().begins(), 0);
    assert_eq!(harness.counters().calls("userStats.ranking"), 0);
}
