//! Concurrent access tests
//!
//! Several threads share one `VaultContext` and mutate the same user's bank
//! list at once. Every write is a single-row statement, so none may be lost.
//!
//! Run with: cargo test --test concurrent_access_test -- --nocapture

use std::collections::HashSet;
use std::sync::{Arc, Barrier};
use std::thread;

use tempfile::TempDir;
use uuid::Uuid;

use bankvault_core::config::Config;
use bankvault_core::{BankFormValues, VaultContext};

/// Number of concurrent threads
const THREAD_COUNT: usize = 6;

/// Number of iterations per thread
const ITERATIONS_PER_THREAD: usize = 5;

fn create_context(temp_dir: &TempDir) -> Arc<VaultContext> {
    let config = Config::resolve(
        temp_dir.path(),
        Some("concurrency-test-key-0123456789a".to_string()),
        Some("vault.duckdb".to_string()),
    )
    .unwrap();
    Arc::new(VaultContext::new(config).unwrap())
}

fn form(label: &str) -> BankFormValues {
    BankFormValues {
        bank_name: format!("Bank {}", label),
        phone_for_otp: "+14155550100".to_string(),
        account_number: "ACCT-12345".to_string(),
        net_banking_username: "nb_user".to_string(),
        mobile_banking_username: "mb_user".to_string(),
        atm_pin: "1234".to_string(),
        ..Default::default()
    }
}

/// Concurrent adds for one user all persist
#[test]
fn test_concurrent_adds_on_one_user() {
    let temp_dir = TempDir::new().unwrap();
    let ctx = create_context(&temp_dir);
    let user_id = ctx
        .create_user("alice", "password123")
        .unwrap()
        .data
        .unwrap()
        .id;

    let barrier = Arc::new(Barrier::new(THREAD_COUNT));
    let mut handles = vec![];

    for thread_id in 0..THREAD_COUNT {
        let barrier = Arc::clone(&barrier);
        let ctx = Arc::clone(&ctx);

        handles.push(thread::spawn(move || {
            barrier.wait();
            for i in 0..ITERATIONS_PER_THREAD {
                let result = ctx
                    .add_bank(user_id, &form(&format!("t{}_i{}", thread_id, i)))
                    .unwrap();
                assert!(result.success, "add failed: {:?}", result.error);
            }
        }));
    }

    for handle in handles {
        handle.join().unwrap();
    }

    let banks = ctx.list_banks_for_user(user_id).unwrap().data.unwrap();
    assert_eq!(banks.len(), THREAD_COUNT * ITERATIONS_PER_THREAD);

    let names: HashSet<String> = banks.into_iter().map(|b| b.bank_name).collect();
    assert_eq!(names.len(), THREAD_COUNT * ITERATIONS_PER_THREAD);
    assert!(names.contains("Bank t0_i0"));
}

/// Deletes racing with adds neither resurrect deleted banks nor drop new ones
#[test]
fn test_concurrent_add_and_delete() {
    let temp_dir = TempDir::new().unwrap();
    let ctx = create_context(&temp_dir);
    let user_id = ctx
        .create_user("alice", "password123")
        .unwrap()
        .data
        .unwrap()
        .id;

    let doomed: Vec<Uuid> = (0..ITERATIONS_PER_THREAD)
        .map(|i| {
            ctx.add_bank(user_id, &form(&format!("doomed{}", i)))
                .unwrap()
                .data
                .unwrap()
                .id
        })
        .collect();

    let barrier = Arc::new(Barrier::new(2));

    let deleter = {
        let ctx = Arc::clone(&ctx);
        let barrier = Arc::clone(&barrier);
        thread::spawn(move || {
            barrier.wait();
            for id in doomed {
                assert!(ctx.delete_bank(user_id, id).unwrap().success);
            }
        })
    };

    let adder = {
        let ctx = Arc::clone(&ctx);
        let barrier = Arc::clone(&barrier);
        thread::spawn(move || {
            barrier.wait();
            for i in 0..ITERATIONS_PER_THREAD {
                assert!(ctx.add_bank(user_id, &form(&format!("kept{}", i))).unwrap().success);
            }
        })
    };

    deleter.join().unwrap();
    adder.join().unwrap();

    let banks = ctx.list_banks_for_user(user_id).unwrap().data.unwrap();
    assert_eq!(banks.len(), ITERATIONS_PER_THREAD);
    assert!(banks.iter().all(|b| b.bank_name.starts_with("Bank kept")));
}

/// Concurrent registrations of one name: exactly one wins
#[test]
fn test_concurrent_registration_single_winner() {
    let temp_dir = TempDir::new().unwrap();
    let ctx = create_context(&temp_dir);

    let barrier = Arc::new(Barrier::new(THREAD_COUNT));
    let handles: Vec<_> = (0..THREAD_COUNT)
        .map(|i| {
            let ctx = Arc::clone(&ctx);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                let name = if i % 2 == 0 { "Racer" } else { "racer" };
                ctx.create_user(name, "password123").unwrap().success
            })
        })
        .collect();

    let winners = handles
        .into_iter()
        .map(|h| h.join().unwrap())
        .filter(|won| *won)
        .count();
    assert_eq!(winners, 1);
}

/// Bank writes racing with password changes never make the change fail
#[test]
fn test_password_change_alongside_bank_writes() {
    const ROUNDS: usize = 40;

    let temp_dir = TempDir::new().unwrap();
    let ctx = create_context(&temp_dir);
    let user_id = ctx
        .create_user("alice", "password123")
        .unwrap()
        .data
        .unwrap()
        .id;

    let barrier = Arc::new(Barrier::new(2));

    let writer = {
        let ctx = Arc::clone(&ctx);
        let barrier = Arc::clone(&barrier);
        thread::spawn(move || {
            barrier.wait();
            for i in 0..ROUNDS {
                assert!(ctx.add_bank(user_id, &form(&format!("w{}", i))).unwrap().success);
            }
        })
    };

    barrier.wait();
    let passwords = ["password123", "password456"];
    for round in 0..ROUNDS {
        let current = passwords[round % 2];
        let next = passwords[(round + 1) % 2];
        let result = ctx
            .change_master_password(user_id, current, next, next)
            .unwrap();
        assert!(
            result.success,
            "round {} failed: {:?} {:?}",
            round,
            result.error_kind(),
            result.error
        );
    }

    writer.join().unwrap();

    let final_password = passwords[ROUNDS % 2];
    assert!(ctx.verify_master_password("alice", final_password).unwrap().success);
    assert_eq!(
        ctx.list_banks_for_user(user_id).unwrap().data.unwrap().len(),
        ROUNDS
    );
}
