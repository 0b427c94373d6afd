//! Gateway notification reconciliation tests.

mod common;
use common::*;

use invoicely::billing::reconcile_payment;

/// Pending checkout for a fresh user, optionally carrying a promo.
fn pending_payment(ctx: &TestContext, email: &str, promo: Option<&PromoCode>) -> (User, Payment) {
    let conn = ctx.conn();
    let user = create_test_user(&conn, email);
    let payment = create_test_payment(&conn, &user.id, 250_000, PaymentStatus::Pending, promo);
    (user, payment)
}

fn reload(ctx: &TestContext, user: &User, payment: &Payment) -> (User, Payment) {
    let conn = ctx.conn();
    (
        queries::get_user_by_id(&conn, &user.id).unwrap().unwrap(),
        queries::get_payment_by_id(&conn, &payment.id).unwrap().unwrap(),
    )
}

#[tokio::test]
async fn test_settlement_activates_user_and_counts_promo() {
    let ctx = setup();
    let promo = create_test_promo(&ctx.conn(), "HALF", DiscountType::Fixed, 250_000, 10);
    let (user, payment) = pending_payment(&ctx, "buyer@example.com", Some(&promo));

    let notification = ctx.notify(&payment.gateway_order_id, "settlement", None);
    let updated = ctx.engine().handle_notification(&notification).await.unwrap();

    assert_eq!(updated.status, PaymentStatus::Success);
    assert_eq!(
        updated.transaction_id.as_deref(),
        Some(&*format!("txn-{}", payment.id))
    );

    let (user, _) = reload(&ctx, &user, &payment);
    assert!(user.is_active);
    assert!(ctx.engine().get_payment_status(&user.id).unwrap());

    let conn = ctx.conn();
    let settings = queries::get_settings(&conn, &user.id).unwrap().unwrap();
    assert_eq!(settings.license_status, LicenseStatus::Active);
    let promo = queries::get_promo_code_by_code(&conn, "HALF").unwrap().unwrap();
    assert_eq!(promo.current_uses, 1);
}

#[tokio::test]
async fn test_replayed_settlement_is_idempotent() {
    let ctx = setup();
    let promo = create_test_promo(&ctx.conn(), "HALF", DiscountType::Fixed, 250_000, 10);
    let (user, payment) = pending_payment(&ctx, "buyer@example.com", Some(&promo));

    let notification = ctx.notify(&payment.gateway_order_id, "settlement", None);
    let first = ctx.engine().handle_notification(&notification).await.unwrap();
    let license_key = queries::get_settings(&ctx.conn(), &user.id)
        .unwrap()
        .unwrap()
        .license_key;

    let second = ctx.engine().handle_notification(&notification).await.unwrap();

    assert_eq!(first.status, PaymentStatus::Success);
    assert_eq!(second.status, PaymentStatus::Success);
    assert_eq!(second.updated_at, first.updated_at);

    let conn = ctx.conn();
    let promo = queries::get_promo_code_by_code(&conn, "HALF").unwrap().unwrap();
    assert_eq!(promo.current_uses, 1);
    let settings = queries::get_settings(&conn, &user.id).unwrap().unwrap();
    assert_eq!(settings.license_key, license_key);
    assert!(queries::get_user_by_id(&conn, &user.id).unwrap().unwrap().is_active);
}

#[tokio::test]
async fn test_terminal_payment_ignores_later_notifications() {
    let ctx = setup();
    let (user, payment) = pending_payment(&ctx, "buyer@example.com", None);

    let expired = ctx.notify(&payment.gateway_order_id, "expire", None);
    let failed = ctx.engine().handle_notification(&expired).await.unwrap();
    assert_eq!(failed.status, PaymentStatus::Failed);

    // The gateway later claims settlement for the same order
    let settled = ctx.notify(&payment.gateway_order_id, "settlement", None);
    let after = ctx.engine().handle_notification(&settled).await.unwrap();

    assert_eq!(after.status, PaymentStatus::Failed);
    let (user, _) = reload(&ctx, &user, &payment);
    assert!(!user.is_active);
}

#[tokio::test]
async fn test_tampered_signature_never_mutates() {
    let ctx = setup();
    let promo = create_test_promo(&ctx.conn(), "HALF", DiscountType::Fixed, 250_000, 10);
    let (user, payment) = pending_payment(&ctx, "buyer@example.com", Some(&promo));

    for status in ["settlement", "capture", "deny", "expire", "pending"] {
        let mut notification = ctx.notify(&payment.gateway_order_id, status, Some("accept"));
        notification.signature_key = compute_signature(
            &payment.gateway_order_id,
            "200",
            "250000.00",
            "wrong-server-key",
        );

        let err = ctx
            .engine()
            .handle_notification(&notification)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidSignature), "{}", status);
    }

    // Forged amount under an otherwise valid signature
    let mut notification = ctx.notify(&payment.gateway_order_id, "settlement", None);
    notification.gross_amount = "1.00".to_string();
    let err = ctx
        .engine()
        .handle_notification(&notification)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidSignature));

    // Rejected before the gateway is even asked
    assert_eq!(ctx.gateway.status_count(), 0);

    let (user, stored) = reload(&ctx, &user, &payment);
    assert_eq!(stored.status, PaymentStatus::Pending);
    assert_eq!(stored.updated_at, payment.updated_at);
    assert!(!user.is_active);
    let promo = queries::get_promo_code_by_code(&ctx.conn(), "HALF").unwrap().unwrap();
    assert_eq!(promo.current_uses, 0);
}

#[tokio::test]
async fn test_status_mismatch_rejected() {
    let ctx = setup();
    let (user, payment) = pending_payment(&ctx, "buyer@example.com", None);

    // Gateway still says pending, notification claims settlement
    ctx.gateway.set_status(&payment.gateway_order_id, "pending", None);
    let notification = signed_notification(&payment.gateway_order_id, "settlement", None);

    let err = ctx
        .engine()
        .handle_notification(&notification)
        .await
        .unwrap_err();

    match err {
        AppError::StatusMismatch { claimed, actual } => {
            assert_eq!(claimed, "settlement");
            assert_eq!(actual, "pending");
        }
        other => panic!("expected StatusMismatch, got {:?}", other),
    }

    let (user, stored) = reload(&ctx, &user, &payment);
    assert_eq!(stored.status, PaymentStatus::Pending);
    assert!(!user.is_active);
}

#[tokio::test]
async fn test_gateway_status_error_propagates() {
    let ctx = setup();
    let (_, payment) = pending_payment(&ctx, "buyer@example.com", None);

    // No status registered: the mock gateway errors
    let notification = signed_notification(&payment.gateway_order_id, "settlement", None);
    let err = ctx
        .engine()
        .handle_notification(&notification)
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::Gateway { .. }));
}

#[tokio::test]
async fn test_unknown_order() {
    let ctx = setup();

    let notification = ctx.notify("ghost-order", "settlement", None);
    let err = ctx
        .engine()
        .handle_notification(&notification)
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::PaymentNotFound(ref id) if id == "ghost-order"));
}

#[tokio::test]
async fn test_status_table_through_engine() {
    let cases = [
        ("capture", Some("challenge"), PaymentStatus::Pending),
        ("capture", Some("accept"), PaymentStatus::Success),
        ("capture", Some("deny"), PaymentStatus::Failed),
        ("settlement", None, PaymentStatus::Success),
        ("pending", None, PaymentStatus::Pending),
        ("deny", None, PaymentStatus::Failed),
        ("cancel", None, PaymentStatus::Failed),
        ("expire", None, PaymentStatus::Failed),
        ("failure", None, PaymentStatus::Failed),
        ("authorize", None, PaymentStatus::Failed),
    ];

    let ctx = setup();
    for (i, (transaction_status, fraud_status, expected)) in cases.into_iter().enumerate() {
        let (user, payment) = pending_payment(&ctx, &format!("case{}@example.com", i), None);

        let notification = ctx.notify(&payment.gateway_order_id, transaction_status, fraud_status);
        let updated = ctx.engine().handle_notification(&notification).await.unwrap();

        assert_eq!(
            updated.status, expected,
            "{} / {:?}",
            transaction_status, fraud_status
        );
        let (user, _) = reload(&ctx, &user, &payment);
        assert_eq!(user.is_active, expected == PaymentStatus::Success);
    }
}

#[tokio::test]
async fn test_challenge_then_accept() {
    let ctx = setup();
    let (user, payment) = pending_payment(&ctx, "review@example.com", None);

    let challenged = ctx.notify(&payment.gateway_order_id, "capture", Some("challenge"));
    let held = ctx.engine().handle_notification(&challenged).await.unwrap();
    assert_eq!(held.status, PaymentStatus::Pending);

    let accepted = ctx.notify(&payment.gateway_order_id, "capture", Some("accept"));
    let done = ctx.engine().handle_notification(&accepted).await.unwrap();
    assert_eq!(done.status, PaymentStatus::Success);

    let (user, _) = reload(&ctx, &user, &payment);
    assert!(user.is_active);
}

#[tokio::test]
async fn test_second_success_for_same_user_is_refused() {
    let ctx = setup();
    let (user, first) = pending_payment(&ctx, "double@example.com", None);
    let second = create_test_payment(&ctx.conn(), &user.id, 250_000, PaymentStatus::Pending, None);

    let n1 = ctx.notify(&first.gateway_order_id, "settlement", None);
    ctx.engine().handle_notification(&n1).await.unwrap();

    let n2 = ctx.notify(&second.gateway_order_id, "settlement", None);
    let err = ctx.engine().handle_notification(&n2).await.unwrap_err();
    assert!(matches!(err, AppError::DuplicatePayment));

    // Rolled back: the second attempt is still pending
    let stored = queries::get_payment_by_id(&ctx.conn(), &second.id)
        .unwrap()
        .unwrap();
    assert_eq!(stored.status, PaymentStatus::Pending);
}

#[test]
fn test_reconcile_reads_status_inside_transaction() {
    let mut conn = setup_test_db();
    let user = create_test_user(&conn, "tx@example.com");
    let payment = create_test_payment(&conn, &user.id, 250_000, PaymentStatus::Pending, None);

    let first = reconcile_payment(&mut conn, &payment.id, PaymentStatus::Success, Some("t-1")).unwrap();
    assert_eq!(first.status, PaymentStatus::Success);
    assert_eq!(first.transaction_id.as_deref(), Some("t-1"));

    // A second delivery that lost the race sees the committed terminal state
    let second = reconcile_payment(&mut conn, &payment.id, PaymentStatus::Failed, Some("t-2")).unwrap();
    assert_eq!(second.status, PaymentStatus::Success);
    assert_eq!(second.transaction_id.as_deref(), Some("t-1"));
}

#[test]
fn test_reconcile_unknown_order_writes_nothing() {
    let mut conn = setup_test_db();

    let err = reconcile_payment(&mut conn, "missing", PaymentStatus::Success, None).unwrap_err();
    assert!(matches!(err, AppError::PaymentNotFound(_)));
}
