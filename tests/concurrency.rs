use modotp::{
    otp::TokenRecord,
    store::{KeyStore, StoreError, KEY_NUM_FILE},
};
use modotp::otp::OtpError;
use std::{path::PathBuf, sync::Arc};
use uuid::Uuid;

fn temp_key_dir() -> PathBuf {
    let dir = std::env::temp_dir().join(format!("modotp-concurrency-{}", Uuid::new_v4()));
    std::fs::create_dir_all(&dir).expect("create key dir");
    dir
}

async fn provisioned_store() -> (Arc<KeyStore>, String, TokenRecord) {
    let dir = temp_key_dir();
    std::fs::write(dir.join(KEY_NUM_FILE), "cccccccccccc").expect("seed keynum");
    let store = Arc::new(KeyStore::new(dir));
    let key = store.new_key().await.expect("allocate");
    (store, key.name, key.record)
}

fn persisted_counter(store: &KeyStore, name: &str) -> u32 {
    let blob = std::fs::read(store.dir().join(format!("{name}.key"))).expect("read key file");
    TokenRecord::from_bytes(&blob.try_into().expect("32 bytes"))
        .expect("parse key file")
        .counter()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_two_codes_race_highest_counter_wins() {
    let (store, name, record) = provisioned_store().await;

    let mut device = record;
    let c1 = device.generate_code().expect("generate c1");
    let c2 = device.generate_code().expect("generate c2");
    let final_counter = device.counter();

    let r1 = tokio::spawn({
        let store = Arc::clone(&store);
        let c1 = c1.clone();
        async move { store.verify(&c1).await }
    });
    let r2 = tokio::spawn({
        let store = Arc::clone(&store);
        let c2 = c2.clone();
        async move { store.verify(&c2).await }
    });

    let r1 = r1.await.expect("join");
    let r2 = r2.await.expect("join");

    // The higher-counter code must land regardless of interleaving; the
    // lower one either got in first or is a replay.
    assert_eq!(r2.expect("c2 accepted"), final_counter);
    match r1 {
        Ok(counter) => assert!(counter < final_counter),
        Err(StoreError::Verify(OtpError::Replay)) => {}
        Err(other) => panic!("unexpected error: {other}"),
    }

    assert_eq!(persisted_counter(&store, &name), final_counter);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_code_storm_converges_to_highest_counter() {
    let (store, name, record) = provisioned_store().await;

    let mut device = record;
    let codes: Vec<String> = (0..8)
        .map(|_| device.generate_code().expect("generate"))
        .collect();
    let final_counter = device.counter();

    let mut handles = Vec::new();
    for code in codes {
        handles.push(tokio::spawn({
            let store = Arc::clone(&store);
            async move { store.verify(&code).await }
        }));
    }

    let mut accepted = 0;
    for handle in handles {
        match handle.await.expect("join") {
            Ok(_) => accepted += 1,
            Err(StoreError::Verify(OtpError::Replay)) => {}
            Err(other) => panic!("unexpected error: {other}"),
        }
    }

    // At least the last-processed highest code is accepted; every rejection
    // is a replay, and the persisted state carries the maximum counter.
    assert!(accepted >= 1);
    assert_eq!(persisted_counter(&store, &name), final_counter);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_distinct_keys_proceed_independently() {
    let dir = temp_key_dir();
    std::fs::write(dir.join(KEY_NUM_FILE), "cccccccccccc").expect("seed keynum");
    let store = Arc::new(KeyStore::new(dir));

    let first = store.new_key().await.expect("allocate");
    let second = store.new_key().await.expect("allocate");

    let mut d1 = first.record;
    let mut d2 = second.record;
    let c1 = d1.generate_code().expect("generate");
    let c2 = d2.generate_code().expect("generate");

    let r1 = tokio::spawn({
        let store = Arc::clone(&store);
        async move { store.verify(&c1).await }
    });
    let r2 = tokio::spawn({
        let store = Arc::clone(&store);
        async move { store.verify(&c2).await }
    });

    assert_eq!(r1.await.expect("join").expect("first accepted"), d1.counter());
    assert_eq!(r2.await.expect("join").expect("second accepted"), d2.counter());
}
