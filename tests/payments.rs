//! Payment lifecycle tests: checkout creation, free promos, retries.

mod common;
use common::*;

#[tokio::test]
async fn test_create_payment_redirects_to_gateway() {
    let ctx = setup();
    let user = create_test_user(&ctx.conn(), "buyer@example.com");

    let outcome = ctx.engine().create_payment(&user.id, None).await.unwrap();

    let CheckoutOutcome::Redirect {
        payment,
        redirect_url,
    } = outcome
    else {
        panic!("expected a gateway redirect");
    };
    assert_eq!(payment.status, PaymentStatus::Pending);
    assert_eq!(payment.amount, BASE_PRICE);
    assert_eq!(payment.gateway_order_id, payment.id);
    assert!(redirect_url.contains(&payment.id));
    assert_eq!(ctx.gateway.checkout_count(), 1);

    let sent = ctx.gateway.last_checkout().unwrap();
    assert_eq!(sent.order_id, payment.id);
    assert_eq!(sent.amount, BASE_PRICE);
    assert_eq!(sent.customer.email, "buyer@example.com");

    let stored = queries::get_payment_by_id(&ctx.conn(), &payment.id)
        .unwrap()
        .unwrap();
    assert_eq!(stored.status, PaymentStatus::Pending);
    assert_eq!(stored.gateway_token.as_deref(), Some(&*format!("snap-{}", payment.id)));
    assert_eq!(stored.redirect_url.as_deref(), Some(redirect_url.as_str()));

    // Still gated until the gateway confirms
    assert!(!ctx.engine().get_payment_status(&user.id).unwrap());
    let user = queries::get_user_by_id(&ctx.conn(), &user.id).unwrap().unwrap();
    assert!(!user.is_active);
}

#[tokio::test]
async fn test_create_payment_with_promo_links_code() {
    let ctx = setup();
    let (user, promo) = {
        let conn = ctx.conn();
        (
            create_test_user(&conn, "buyer@example.com"),
            create_test_promo(&conn, "HALF", DiscountType::Fixed, 250_000, 10),
        )
    };

    let outcome = ctx
        .engine()
        .create_payment(&user.id, Some(" HALF "))
        .await
        .unwrap();

    let payment = outcome.payment();
    assert_eq!(payment.amount, 250_000);
    assert_eq!(payment.promo_code.as_deref(), Some("HALF"));
    assert_eq!(payment.promo_code_id.as_deref(), Some(promo.id.as_str()));
    assert_eq!(ctx.gateway.last_checkout().unwrap().amount, 250_000);
}

#[tokio::test]
async fn test_free_promo_completes_without_gateway() {
    let ctx = setup();
    let user = {
        let conn = ctx.conn();
        let promo = create_test_promo(&conn, "FREE100", DiscountType::Percentage, 100, 5);
        use_promo_slots(&conn, &promo, 4);
        create_test_user(&conn, "free@example.com")
    };

    let outcome = ctx
        .engine()
        .create_payment(&user.id, Some("FREE100"))
        .await
        .unwrap();

    let CheckoutOutcome::Completed { payment } = outcome else {
        panic!("expected an immediate success");
    };
    assert_eq!(payment.status, PaymentStatus::Success);
    assert_eq!(payment.amount, 0);
    assert_eq!(ctx.gateway.checkout_count(), 0);

    let conn = ctx.conn();
    let user = queries::get_user_by_id(&conn, &user.id).unwrap().unwrap();
    assert!(user.is_active);

    let settings = queries::get_settings(&conn, &user.id).unwrap().unwrap();
    assert_eq!(settings.license_status, LicenseStatus::Active);
    let key = settings.license_key.unwrap();
    assert!(key.starts_with("LIC-"));
    assert_eq!(key.len(), 23);

    let promo = queries::get_promo_code_by_code(&conn, "FREE100").unwrap().unwrap();
    assert_eq!(promo.current_uses, 1);

    // That was the last slot
    drop(conn);
    let slots = ctx.engine().get_remaining_promo_slots("FREE100").unwrap();
    assert_eq!(slots.remaining_slots, 0);
}

#[tokio::test]
async fn test_duplicate_payment_refused_without_new_row() {
    let ctx = setup();
    let user = create_licensed_user(&ctx.conn(), "paid@example.com");
    assert_eq!(count_payments(&ctx.conn(), &user.id), 1);

    let err = ctx.engine().create_payment(&user.id, None).await.unwrap_err();

    assert!(matches!(err, AppError::DuplicatePayment));
    assert_eq!(count_payments(&ctx.conn(), &user.id), 1);
    assert_eq!(ctx.gateway.checkout_count(), 0);
}

#[tokio::test]
async fn test_create_payment_unknown_user() {
    let ctx = setup();

    let err = ctx
        .engine()
        .create_payment("no-such-user", None)
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
async fn test_invalid_promo_creates_no_payment() {
    let ctx = setup();
    let user = create_test_user(&ctx.conn(), "buyer@example.com");

    let err = ctx
        .engine()
        .create_payment(&user.id, Some("BOGUS"))
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::InvalidPromo));
    assert_eq!(count_payments(&ctx.conn(), &user.id), 0);
}

#[tokio::test]
async fn test_gateway_failure_leaves_retryable_pending_payment() {
    let ctx = setup();
    let user = create_test_user(&ctx.conn(), "buyer@example.com");
    ctx.gateway
        .fail_checkout
        .store(true, std::sync::atomic::Ordering::SeqCst);

    let err = ctx.engine().create_payment(&user.id, None).await.unwrap_err();
    assert!(err.is_retryable());

    let payments = queries::list_payments_for_user(&ctx.conn(), &user.id).unwrap();
    assert_eq!(payments.len(), 1);
    let pending = &payments[0];
    assert_eq!(pending.status, PaymentStatus::Pending);
    assert!(pending.redirect_url.is_none());

    ctx.gateway
        .fail_checkout
        .store(false, std::sync::atomic::Ordering::SeqCst);
    let outcome = ctx
        .engine()
        .retry_checkout(&user.id, &pending.id)
        .await
        .unwrap();

    assert_eq!(outcome.payment().id, pending.id);
    assert!(outcome.redirect_url().is_some());
    assert_eq!(ctx.gateway.last_checkout().unwrap().order_id, pending.id);
    assert_eq!(count_payments(&ctx.conn(), &user.id), 1);
}

#[tokio::test]
async fn test_retry_rejects_other_users_and_terminal_payments() {
    let ctx = setup();
    let (owner, other, failed) = {
        let conn = ctx.conn();
        let owner = create_test_user(&conn, "owner@example.com");
        let other = create_test_user(&conn, "other@example.com");
        let failed = create_test_payment(&conn, &owner.id, BASE_PRICE, PaymentStatus::Failed, None);
        (owner, other, failed)
    };
    let pending = create_test_payment(&ctx.conn(), &owner.id, BASE_PRICE, PaymentStatus::Pending, None);

    let err = ctx
        .engine()
        .retry_checkout(&other.id, &pending.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));

    let err = ctx
        .engine()
        .retry_checkout(&owner.id, &failed.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));

    assert_eq!(ctx.gateway.checkout_count(), 0);
}

#[tokio::test]
async fn test_payment_status_reflects_success() {
    let ctx = setup();
    let (paid, unpaid) = {
        let conn = ctx.conn();
        (
            create_licensed_user(&conn, "paid@example.com"),
            create_test_user(&conn, "unpaid@example.com"),
        )
    };

    assert!(ctx.engine().get_payment_status(&paid.id).unwrap());
    assert!(!ctx.engine().get_payment_status(&unpaid.id).unwrap());
    assert!(!ctx.engine().get_payment_status("no-such-user").unwrap());
}

#[test]
fn test_storage_allows_only_one_success_per_user() {
    let conn = setup_test_db();
    let user = create_test_user(&conn, "twice@example.com");
    create_test_payment(&conn, &user.id, BASE_PRICE, PaymentStatus::Success, None);

    let err = queries::create_payment(
        &conn,
        &CreatePayment {
            user_id: user.id.clone(),
            amount: BASE_PRICE,
            status: PaymentStatus::Success,
            promo_code: None,
            promo_code_id: None,
        },
    )
    .unwrap_err();
    assert!(queries::is_constraint_violation(&err));

    // Any number of pending / failed attempts is fine
    create_test_payment(&conn, &user.id, BASE_PRICE, PaymentStatus::Pending, None);
    create_test_payment(&conn, &user.id, BASE_PRICE, PaymentStatus::Failed, None);
    assert_eq!(count_payments(&conn, &user.id), 3);
}
