use chrono::TimeDelta;
use std::sync::Arc;

use crate::common::test_service;
use userd::{ServiceConfig, ServiceError, UserSearchField};

#[tokio::test]
async fn test_signup_verify_login_flow() {
    // Given a service that requires verified emails
    let t = test_service(ServiceConfig::default());

    // When a user signs up
    let user_id = t
        .service
        .create_user("Dana", "dana@example.com", "dana", "hunter2")
        .await
        .unwrap();

    // Then login is refused until the address is confirmed
    assert!(matches!(
        t.service.authenticate("dana", "hunter2").await,
        Err(ServiceError::UserEmailMustBeVerified)
    ));

    t.service
        .check_and_set_email_verified(&user_id, "dana@example.com")
        .await
        .unwrap();

    assert_eq!(
        t.service.authenticate("dana", "hunter2").await.unwrap(),
        user_id
    );
    assert!(matches!(
        t.service.authenticate("dana", "hunter3").await,
        Err(ServiceError::InvalidCredentials)
    ));
    assert_eq!(
        t.event_tags(),
        vec![
            userd::USER_CREATED,
            userd::USER_EMAIL_VERIFIED,
            userd::USER_AUTHENTICATED
        ]
    );
}

#[tokio::test]
async fn test_forgotten_password_flow() {
    // Given a verified user who forgot the password
    let t = test_service(ServiceConfig::default());
    let user_id = t
        .service
        .create_user("Eli", "eli@example.com", "eli", "forgotten")
        .await
        .unwrap();
    t.service.set_email_verified(&user_id).await.unwrap();

    // When a token is requested and then redeemed the next morning
    let token = t
        .service
        .new_reset_login_credentials_token("eli@example.com")
        .await
        .unwrap();
    t.clock.advance(TimeDelta::hours(10));
    let reset_id = t
        .service
        .reset_credentials_with_token(&token, "eli.new", "remembered")
        .await
        .unwrap();

    // Then only the new credentials work and the token is spent
    assert_eq!(reset_id, user_id);
    assert_eq!(
        t.service.authenticate("eli.new", "remembered").await.unwrap(),
        user_id
    );
    assert!(t.service.authenticate("eli", "forgotten").await.unwrap_err().is_not_found());
    assert!(matches!(
        t.service
            .reset_credentials_with_token(&token, "eli.again", "again")
            .await,
        Err(ServiceError::InvalidArguments(_))
    ));
}

#[tokio::test]
async fn test_reset_token_expires_with_configured_window() {
    // Given a one hour window
    let t = test_service(ServiceConfig {
        auth_email_must_be_verified: false,
        reset_token_expiry: TimeDelta::hours(1),
    });
    t.service
        .create_user("Fay", "fay@example.com", "fay", "old")
        .await
        .unwrap();
    let token = t
        .service
        .new_reset_login_credentials_token_by(&[UserSearchField::LoginName("fay".to_string())])
        .await
        .unwrap();

    // When the window has passed
    t.clock.advance(TimeDelta::minutes(61));

    // Then the token is refused and a fresh one works
    assert!(matches!(
        t.service
            .reset_credentials_with_token(&token, "fay", "new")
            .await,
        Err(ServiceError::ResetPasswordTokenExpired)
    ));
    let token = t
        .service
        .new_reset_login_credentials_token("fay@example.com")
        .await
        .unwrap();
    t.service
        .reset_credentials_with_token(&token, "fay", "new")
        .await
        .unwrap();
    assert!(t.service.authenticate("fay", "new").await.is_ok());
}

#[tokio::test]
async fn test_account_changes_free_old_values() {
    // Given user A with login alice
    let t = test_service(ServiceConfig {
        auth_email_must_be_verified: false,
        ..ServiceConfig::default()
    });
    let a = t
        .service
        .create_user("Alice", "alice@example.com", "alice", "pw")
        .await
        .unwrap();

    // When A changes login name and email
    t.service
        .change_login_credentials(&a, "alice2", "pw2")
        .await
        .unwrap();
    t.service
        .change_email(&a, "alice2@example.com")
        .await
        .unwrap();

    // Then B can take the old values, but not the new ones
    let b = t
        .service
        .create_user("Bea", "alice@example.com", "alice", "pw")
        .await
        .unwrap();
    assert_ne!(a, b);
    assert!(
        t.service
            .create_user("Cy", "alice2@example.com", "cy", "pw")
            .await
            .unwrap_err()
            .is_email_already_taken()
    );
    assert!(
        t.service
            .create_user("Cy", "cy@example.com", "alice2", "pw")
            .await
            .unwrap_err()
            .is_login_name_already_taken()
    );
    assert_eq!(t.service.authenticate("alice2", "pw2").await.unwrap(), a);
    assert_eq!(t.service.authenticate("alice", "pw").await.unwrap(), b);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_signups_for_one_login_name() {
    // Given many callers racing for the same login name
    let t = test_service(ServiceConfig::default());
    let service = Arc::new(t.service);

    let mut handles = Vec::new();
    for i in 0..8 {
        let service = Arc::clone(&service);
        handles.push(tokio::spawn(async move {
            service
                .create_user("Racer", &format!("racer{i}@example.com"), "racer", "pw")
                .await
        }));
    }

    // Then exactly one wins and the rest see the conflict
    let mut winners = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => winners += 1,
            Err(e) => assert!(e.is_login_name_already_taken(), "unexpected error {e}"),
        }
    }
    assert_eq!(winners, 1);
}
