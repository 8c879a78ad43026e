use inferdb_driver::{
    LogicManager, Rule, RuleError, SchemaStorage, StoreTransaction, run_migrations,
};
use tempfile::TempDir;

const WHEN: &str = "$x has parent $y; $y has parent $z;";
const THEN: &str = "$x has grandparent $z;";

async fn setup_storage() -> (TempDir, SchemaStorage) {
    let dir = TempDir::new().expect("temp dir");
    let storage = SchemaStorage::new(&dir.path().join("schema.sqlite"))
        .await
        .expect("create storage");
    run_migrations(&storage).await.expect("run migrations");
    (dir, storage)
}

#[tokio::test]
async fn define_rename_delete_across_transactions() {
    let (_dir, storage) = setup_storage().await;
    let manager = LogicManager::new();

    // Define and commit.
    let tx = StoreTransaction::begin(&storage).await.expect("begin");
    let rule = manager
        .put_rule(&tx, "transitive-ownership", WHEN, THEN)
        .await
        .expect("put rule");
    tx.commit().await.expect("commit define");

    // Rename in a second transaction; the handle tracks the confirmed label.
    let tx = StoreTransaction::begin(&storage).await.expect("begin");
    rule.set_label(&tx, "transitive-ownership-v2")
        .await
        .expect("rename");
    assert_eq!(rule.label(), "transitive-ownership-v2");
    tx.commit().await.expect("commit rename");

    // The rename is visible to a fresh transaction under the new label only.
    let tx = StoreTransaction::begin(&storage).await.expect("begin");
    assert!(
        manager
            .get_rule(&tx, "transitive-ownership")
            .await
            .expect("get old label")
            .is_none()
    );
    let refetched = manager
        .get_rule(&tx, "transitive-ownership-v2")
        .await
        .expect("get new label")
        .expect("rule present");
    assert_eq!(refetched, rule);
    assert_eq!(refetched.when(), WHEN);
    assert_eq!(refetched.then(), THEN);

    // Delete and commit; a later transaction sees the rule gone.
    rule.delete(&tx).await.expect("delete");
    assert!(rule.is_deleted(&tx).await.expect("deleted in this view"));
    tx.commit().await.expect("commit delete");

    let tx = StoreTransaction::begin(&storage).await.expect("begin");
    assert!(rule.is_deleted(&tx).await.expect("deleted after commit"));
    let result = rule.set_label(&tx, "transitive-ownership-v3").await;
    assert!(matches!(result, Err(RuleError::NotFound { .. })));

    // Cached reads survive deletion with last-known values.
    assert_eq!(rule.label(), "transitive-ownership-v2");
    assert_eq!(rule.when(), WHEN);
    assert_eq!(rule.then(), THEN);
}

#[tokio::test]
async fn uncommitted_changes_stay_transaction_scoped() {
    let (_dir, storage) = setup_storage().await;
    let manager = LogicManager::new();

    let tx = StoreTransaction::begin(&storage).await.expect("begin");
    let rule = manager
        .put_rule(&tx, "transitive-ownership", WHEN, THEN)
        .await
        .expect("put rule");
    rule.set_label(&tx, "transitive-ownership-v2")
        .await
        .expect("rename");
    tx.rollback().await.expect("rollback");

    let tx = StoreTransaction::begin(&storage).await.expect("begin");
    assert!(
        manager
            .get_rules(&tx)
            .await
            .expect("list rules")
            .is_empty()
    );
}
