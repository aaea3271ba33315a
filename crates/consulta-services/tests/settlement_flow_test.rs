//! End-to-end service flows against the in-memory backend
//!
//! Exercises call settlement, withdrawals, payments and referrals through the
//! `Services` bundle exactly as the HTTP layer wires it.

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};
    use consulta_cache::MemoryCache;
    use consulta_core::config::{
        AuthConfig, DatabaseConfig, PaymentsConfig, PayoutsConfig, RedisConfig, RetryConfig,
        ServerConfig, SettlementConfig, VoiceConfig,
    };
    use consulta_core::models::{CallStatus, CompletionMode, ReferralStatus, WithdrawalStatus};
    use consulta_core::traits::CallRepository;
    use consulta_core::{AppConfig, AppError};
    use consulta_db::MemoryStore;
    use consulta_services::{sign_webhook, NewWithdrawal, PaymentWebhook, Services};
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use std::sync::Arc;
    use uuid::Uuid;

    const WEBHOOK_SECRET: &str = "integration-secret";

    struct World {
        store: MemoryStore,
        services: Services,
        company: Uuid,
        caller: Uuid,
        counselor: Uuid,
        referrer: Uuid,
    }

    fn config(company: Uuid) -> AppConfig {
        AppConfig {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 0,
                workers: 1,
                cors_origins: String::new(),
                json_logs: false,
            },
            database: DatabaseConfig {
                url: String::new(),
                max_connections: 1,
                acquire_timeout_secs: 1,
                run_migrations: false,
            },
            redis: RedisConfig {
                url: String::new(),
                earnings_ttl_secs: 60,
            },
            auth: AuthConfig {
                jwt_secret: "test".to_string(),
                jwt_expiration_secs: 60,
            },
            settlement: SettlementConfig {
                company_account_id: company,
                ..Default::default()
            },
            payments: PaymentsConfig {
                webhook_secret: WEBHOOK_SECRET.to_string(),
                credits_per_unit: Decimal::ONE,
            },
            payouts: PayoutsConfig::default(),
            retry: RetryConfig {
                max_retries: 2,
                initial_delay_ms: 1,
                max_delay_ms: 5,
            },
            voice: VoiceConfig::default(),
        }
    }

    fn world() -> World {
        let store = MemoryStore::new();
        let ids: Vec<Uuid> = (0..4).map(|_| Uuid::new_v4()).collect();
        for id in &ids {
            store.add_user(*id, Decimal::ZERO);
        }

        let services = Services::new(
            store.repositories(),
            Arc::new(MemoryCache::new()),
            &config(ids[0]),
        )
        .unwrap();

        World {
            store,
            services,
            company: ids[0],
            caller: ids[1],
            counselor: ids[2],
            referrer: ids[3],
        }
    }

    /// Create a call and mark it active `seconds` ago
    async fn call_running_for(w: &World, code: Option<&str>, seconds: i64) -> Uuid {
        let call = w
            .services
            .calls
            .create(w.caller, w.counselor, code)
            .await
            .unwrap();
        w.store
            .repositories()
            .calls
            .activate(call.id, Utc::now() - Duration::seconds(seconds))
            .await
            .unwrap()
            .unwrap();
        call.id
    }

    async fn balance(w: &World, user: Uuid) -> Decimal {
        w.services.balances.balance(user).await.unwrap()
    }

    #[tokio::test]
    async fn test_ten_minute_call_without_referrer() {
        let w = world();
        let call_id = call_running_for(&w, None, 600).await;

        let result = w.services.calls.end(call_id).await.unwrap();
        assert_eq!(result.call.status, CallStatus::Ended);
        assert_eq!(result.call.duration_seconds, Some(600));
        assert_eq!(result.call.cost, Some(dec!(1.4)));

        let settlement = result.settlement.unwrap();
        assert_eq!(settlement.total_cost, dec!(1.4));
        assert_eq!(settlement.counselor, dec!(0.84));
        assert_eq!(settlement.company, dec!(0.56));
        assert!(settlement.referrer.is_none());

        assert_eq!(balance(&w, w.counselor).await, dec!(0.84));
        assert_eq!(balance(&w, w.company).await, dec!(0.56));
    }

    #[tokio::test]
    async fn test_ten_minute_call_with_referrer() {
        let w = world();
        let referral = w
            .services
            .referrals
            .create(w.referrer, w.caller)
            .await
            .unwrap();
        let call_id = call_running_for(&w, Some(&referral.code), 600).await;

        let settlement = w.services.calls.end(call_id).await.unwrap().settlement.unwrap();
        assert_eq!(settlement.counselor, dec!(0.84));
        assert_eq!(settlement.referrer, Some(dec!(0.14)));
        assert_eq!(settlement.company, dec!(0.42));

        assert_eq!(balance(&w, w.referrer).await, dec!(0.14));

        let earnings = w.services.referrals.earnings(w.referrer).await.unwrap();
        assert_eq!(earnings.len(), 1);
        assert_eq!(earnings[0].referral_code, referral.code);
        assert_eq!(earnings[0].total_earnings, dec!(0.14));
        assert_eq!(earnings[0].total_calls, 1);
    }

    #[tokio::test]
    async fn test_referral_deactivated_before_end_pays_no_referrer() {
        let w = world();
        let referral = w
            .services
            .referrals
            .create(w.referrer, w.caller)
            .await
            .unwrap();
        let call_id = call_running_for(&w, Some(&referral.code), 600).await;

        w.services
            .referrals
            .set_status(referral.id, ReferralStatus::Inactive, w.company)
            .await
            .unwrap();

        let settlement = w.services.calls.end(call_id).await.unwrap().settlement.unwrap();
        assert!(!settlement.has_referrer);
        assert_eq!(settlement.company, dec!(0.56));
        assert_eq!(balance(&w, w.referrer).await, Decimal::ZERO);
    }

    #[tokio::test]
    async fn test_inactive_code_at_creation_is_ignored() {
        let w = world();
        let referral = w
            .services
            .referrals
            .create(w.referrer, w.caller)
            .await
            .unwrap();
        w.services
            .referrals
            .set_status(referral.id, ReferralStatus::Inactive, w.company)
            .await
            .unwrap();

        let call = w
            .services
            .calls
            .create(w.caller, w.counselor, Some(&referral.code))
            .await
            .unwrap();
        assert!(call.referral_id.is_none());
    }

    #[tokio::test]
    async fn test_end_twice_settles_once() {
        let w = world();
        let call_id = call_running_for(&w, None, 600).await;

        let first = w.services.calls.end(call_id).await.unwrap();
        let second = w.services.calls.end(call_id).await.unwrap();

        assert!(!first.already_settled);
        assert!(second.already_settled);
        assert_eq!(first.settlement, second.settlement);
        assert_eq!(w.store.settlements().len(), 2);
        assert_eq!(balance(&w, w.counselor).await, dec!(0.84));
    }

    #[tokio::test]
    async fn test_concurrent_end_settles_once() {
        let w = Arc::new(world());
        let call_id = call_running_for(&w, None, 600).await;

        let mut handles = Vec::new();
        for _ in 0..6 {
            let w = w.clone();
            handles.push(tokio::spawn(async move {
                w.services.calls.end(call_id).await
            }));
        }

        let mut fresh = 0;
        for handle in handles {
            let result = handle.await.unwrap().unwrap();
            if !result.already_settled {
                fresh += 1;
            }
            assert_eq!(result.settlement.unwrap().total_cost, dec!(1.4));
        }

        assert_eq!(fresh, 1);
        assert_eq!(w.store.settlements().len(), 2);
        assert_eq!(balance(&w, w.counselor).await, dec!(0.84));
    }

    #[tokio::test]
    async fn test_failed_end_can_be_repeated() {
        let w = world();
        let call_id = call_running_for(&w, None, 600).await;

        // The call read succeeds; every settle attempt (1 + 2 retries) fails
        w.store.fail_after(1, 3);
        let failed = w.services.calls.end(call_id).await;
        assert!(matches!(failed, Err(AppError::Pool(_))));
        assert!(w.store.settlements().is_empty());
        assert_eq!(
            w.services.calls.get(call_id).await.unwrap().status,
            CallStatus::Active
        );
        assert_eq!(balance(&w, w.counselor).await, Decimal::ZERO);

        let result = w.services.calls.end(call_id).await.unwrap();
        assert!(!result.already_settled);
        assert_eq!(result.call.status, CallStatus::Ended);
        assert_eq!(w.store.settlements().len(), 2);
        assert_eq!(balance(&w, w.company).await, dec!(0.56));
    }

    #[tokio::test]
    async fn test_settle_retries_past_transient_failure() {
        let w = world();
        let call_id = call_running_for(&w, None, 600).await;

        w.store.fail_after(1, 1);
        let result = w.services.calls.end(call_id).await.unwrap();

        assert!(!result.already_settled);
        assert_eq!(w.store.settlements().len(), 2);
        assert_eq!(balance(&w, w.counselor).await, dec!(0.84));
    }

    #[tokio::test]
    async fn test_cancelled_call_never_settles() {
        let w = world();
        let call_id = call_running_for(&w, None, 600).await;

        w.services.calls.cancel(call_id).await.unwrap();
        let result = w.services.calls.end(call_id).await.unwrap();

        assert_eq!(result.call.status, CallStatus::Cancelled);
        assert!(result.settlement.is_none());
        assert!(w.store.settlements().is_empty());
        assert_eq!(balance(&w, w.counselor).await, Decimal::ZERO);
    }

    #[tokio::test]
    async fn test_earnings_reflect_settlement() {
        let w = world();
        let before = w.services.earnings.summary(w.counselor).await.unwrap();
        assert_eq!(before.total, Decimal::ZERO);

        let call_id = call_running_for(&w, None, 600).await;
        w.services.calls.end(call_id).await.unwrap();

        let after = w.services.earnings.summary(w.counselor).await.unwrap();
        assert_eq!(after.counselor, dec!(0.84));
        assert_eq!(after.balance, dec!(0.84));
    }

    #[tokio::test]
    async fn test_payment_then_withdrawal_flow() {
        let w = world();
        let admin = w.company;

        let hook = PaymentWebhook {
            provider_tx_id: "pi_flow".to_string(),
            user_id: w.caller,
            amount: "25".to_string(),
            currency: "USD".to_string(),
            status: "completed".to_string(),
        };
        let signature = sign_webhook(WEBHOOK_SECRET, &hook).unwrap();
        w.services
            .payments
            .handle_webhook(&hook, &signature)
            .await
            .unwrap();
        let replay = w
            .services
            .payments
            .handle_webhook(&hook, &signature)
            .await
            .unwrap();
        assert!(replay.duplicate);
        assert_eq!(balance(&w, w.caller).await, dec!(25));

        let request = w
            .services
            .withdrawals
            .request(NewWithdrawal {
                user_id: w.caller,
                balance_amount: dec!(15),
                destination: "wallet-1".to_string(),
                network: "TRC20".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(request.status, WithdrawalStatus::Pending);
        assert_eq!(balance(&w, w.caller).await, dec!(25));

        let done = w
            .services
            .withdrawals
            .approve(request.id, admin, CompletionMode::Manual, None)
            .await
            .unwrap();
        assert_eq!(done.status, WithdrawalStatus::ManualCompleted);
        assert_eq!(balance(&w, w.caller).await, dec!(10));

        let reject_after = w
            .services
            .withdrawals
            .reject(request.id, admin, "too late")
            .await;
        assert!(matches!(reject_after, Err(AppError::Conflict(_))));
        assert_eq!(balance(&w, w.caller).await, dec!(10));
    }

    #[tokio::test]
    async fn test_forged_webhook_leaves_no_record() {
        let w = world();
        let hook = PaymentWebhook {
            provider_tx_id: "pi_forged".to_string(),
            user_id: w.caller,
            amount: "100".to_string(),
            currency: "USD".to_string(),
            status: "completed".to_string(),
        };

        let result = w
            .services
            .payments
            .handle_webhook(&hook, &sign_webhook("wrong", &hook).unwrap())
            .await;
        assert!(matches!(result, Err(AppError::InvalidSignature)));
        assert!(w.services.payments.find("pi_forged").await.unwrap().is_none());
        assert_eq!(balance(&w, w.caller).await, Decimal::ZERO);
    }
}
